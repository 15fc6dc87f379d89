use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Every failure the simplifier can report.
///
/// Some variants are fatal for a whole phase (`Io`, `EmptyStore`,
/// `EmptyCandidateSet`, `Timeout`), the others describe a single line or
/// comparison and are collected into load and rewrite reports instead of
/// stopping the run.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot access '{}': {source}", .path.display())]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("line {line}: {reason}")]
    MalformedLine { line: usize, reason: String },

    #[error("vector has dimension {found}, expected {expected}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("vector has zero length")]
    DegenerateVector,

    #[error("duplicate word '{word}'")]
    DuplicateWord { word: String },

    #[error("no word vectors found")]
    EmptyStore,

    #[error("no vocabulary words have embeddings, nothing to match against")]
    EmptyCandidateSet,

    #[error("{phase} did not finish within {limit:?}")]
    Timeout { phase: &'static str, limit: Duration },

    #[error("cannot start worker threads: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl Error {
    pub(crate) fn file(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::File {
            path: path.into(),
            source,
        }
    }

    /// True for errors that only concern one line or one comparison.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::MalformedLine { .. }
                | Error::DimensionMismatch { .. }
                | Error::DegenerateVector
                | Error::DuplicateWord { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
