//! Lexical simplification with word embeddings.
//!
//! Every word of a text that has an embedding is replaced by the closest
//! word of a small reference vocabulary (for example the Google-1000 list),
//! using cosine similarity or Euclidean distance between vectors.
//!
//! The pieces, in the order a run uses them:
//!
//! - [`EmbeddingStore`] - word vectors loaded in parallel from `word, v1, ..., vd` lines
//! - [`RestrictedVocabulary`] - the replacement targets that have vectors
//! - [`BruteForce`] - nearest-neighbour search under a [`Metric`]
//! - [`TextRewriter`] - line-by-line replacement, keeping word order
//! - [`pipeline::run`] - the three steps above over files

pub mod deadline;
pub mod error;
pub mod logging;
pub mod matcher;
pub mod metric;
pub mod pipeline;
pub mod rewriter;
pub mod store;
pub mod vocabulary;

pub use deadline::Deadline;
pub use error::{Error, Result};
pub use matcher::{BruteForce, Neighbor, NeighborSearch};
pub use metric::{Direction, Metric};
pub use pipeline::{RunReport, SimplifyConfig};
pub use rewriter::{MatchResult, RewriteOptions, RewriteReport, TextRewriter, TokenOutcome};
pub use store::{EmbeddingStore, LoadReport};
pub use vocabulary::RestrictedVocabulary;

/// The one normalization applied at every lookup: embeddings keys,
/// vocabulary words and text tokens.
pub fn normalize(word: &str) -> String {
    word.trim().to_lowercase()
}
