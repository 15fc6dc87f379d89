use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::deadline::{DEFAULT_TIMEOUT, Deadline};
use crate::error::{Error, Result};
use crate::matcher::BruteForce;
use crate::metric::Metric;
use crate::rewriter::{RewriteOptions, RewriteReport, TextRewriter};
use crate::store::{EmbeddingStore, LoadReport};
use crate::vocabulary::RestrictedVocabulary;

pub const DEFAULT_OUTPUT: &str = "out.txt";

/// Everything one simplification run needs.
#[derive(Debug, Clone)]
pub struct SimplifyConfig {
    pub embeddings: PathBuf,
    pub vocabulary: PathBuf,
    pub input: PathBuf,
    pub output: PathBuf,
    pub metric: Metric,
    /// bound on each phase: loading, restricting and rewriting
    pub timeout: Duration,
    pub lowercase_unmatched: bool,
    /// worker threads; rayon's default pool when None
    pub threads: Option<usize>,
}

impl Default for SimplifyConfig {
    fn default() -> Self {
        SimplifyConfig {
            embeddings: PathBuf::new(),
            vocabulary: PathBuf::new(),
            input: PathBuf::new(),
            output: PathBuf::from(DEFAULT_OUTPUT),
            metric: Metric::default(),
            timeout: DEFAULT_TIMEOUT,
            lowercase_unmatched: false,
            threads: None,
        }
    }
}

impl SimplifyConfig {
    pub fn new(
        embeddings: impl Into<PathBuf>,
        vocabulary: impl Into<PathBuf>,
        input: impl Into<PathBuf>,
    ) -> Self {
        SimplifyConfig {
            embeddings: embeddings.into(),
            vocabulary: vocabulary.into(),
            input: input.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug)]
pub struct RunReport {
    pub embeddings: LoadReport,
    pub vocabulary_size: usize,
    /// vocabulary words without an embedding
    pub missing_vocabulary: Vec<String>,
    pub rewrite: RewriteReport,
}

/// Load embeddings, restrict them to the vocabulary, rewrite the input.
///
/// The output file only appears once the whole input has been rewritten; on
/// any error an existing file at `config.output` is left untouched.
pub fn run(config: &SimplifyConfig) -> Result<RunReport> {
    match config.threads {
        Some(n) => rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build()?
            .install(|| run_phases(config)),
        None => run_phases(config),
    }
}

fn run_phases(config: &SimplifyConfig) -> Result<RunReport> {
    tracing::info!(
        embeddings = %config.embeddings.display(),
        vocabulary = %config.vocabulary.display(),
        metric = %config.metric,
        "loading"
    );
    let (store, embeddings) = EmbeddingStore::from_file(
        &config.embeddings,
        &Deadline::after("load embeddings", config.timeout),
    )?;
    let (vocabulary, missing_vocabulary) = RestrictedVocabulary::from_file(
        &store,
        &config.vocabulary,
        &Deadline::after("load vocabulary", config.timeout),
    )?;

    let rewriter = TextRewriter::new(&store, &vocabulary, BruteForce::new(config.metric))?
        .with_options(RewriteOptions {
            lowercase_unmatched: config.lowercase_unmatched,
        });

    let input = File::open(&config.input).map_err(|e| Error::file(&config.input, e))?;
    let partial = partial_path(&config.output);
    let output = File::create(&partial).map_err(|e| Error::file(&partial, e))?;

    let rewritten = rewriter.rewrite(
        BufReader::new(input),
        BufWriter::new(output),
        &Deadline::after("rewrite", config.timeout),
    );
    let rewrite = match rewritten {
        Ok(report) => report,
        Err(e) => {
            // best effort, the rewrite error is what gets reported
            let _ = fs::remove_file(&partial);
            return Err(e);
        }
    };
    fs::rename(&partial, &config.output).map_err(|e| Error::file(&config.output, e))?;

    tracing::info!(output = %config.output.display(), "output saved");
    Ok(RunReport {
        embeddings,
        vocabulary_size: vocabulary.len(),
        missing_vocabulary,
        rewrite,
    })
}

// `out.txt` is written as `out.txt.part` and renamed when complete.
fn partial_path(output: &Path) -> PathBuf {
    let mut name = OsString::from(output.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}
