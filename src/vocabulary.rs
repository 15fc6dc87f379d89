use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::deadline::Deadline;
use crate::error::{Error, Result};
use crate::normalize;
use crate::store::EmbeddingStore;

// (word, index into store), or Err(word) when it has no embedding.
// None for blank lines.
type Resolved = Option<std::result::Result<(String, usize), String>>;

/// The replacement targets: words from the vocabulary list that also have an
/// embedding, with the same vectors as in the full store.
///
/// Entries are kept in lexicographic order, which is the order every
/// nearest-neighbour scan visits them in.
#[derive(Debug, Clone)]
pub struct RestrictedVocabulary {
    table: EmbeddingStore,
}

impl RestrictedVocabulary {
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn dims(&self) -> usize {
        self.table.dims()
    }

    pub fn contains(&self, word: &str) -> bool {
        self.table.contains(word)
    }

    pub fn get(&self, word: &str) -> Option<&[f64]> {
        self.table.get(word)
    }

    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.table.words()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.table.iter()
    }

    pub(crate) fn table(&self) -> &EmbeddingStore {
        &self.table
    }

    pub fn from_file(
        store: &EmbeddingStore,
        path: impl AsRef<Path>,
        deadline: &Deadline,
    ) -> Result<(RestrictedVocabulary, Vec<String>)> {
        let path = path.as_ref();
        let file = fs::File::open(path).map_err(|e| Error::file(path, e))?;
        let lines = BufReader::new(file)
            .lines()
            .collect::<std::io::Result<Vec<String>>>()
            .map_err(|e| Error::file(path, e))?;
        Self::restrict(store, &lines, deadline)
    }

    pub fn from_reader<R: BufRead>(
        store: &EmbeddingStore,
        reader: R,
        deadline: &Deadline,
    ) -> Result<(RestrictedVocabulary, Vec<String>)> {
        let lines = reader.lines().collect::<std::io::Result<Vec<String>>>()?;
        Self::restrict(store, &lines, deadline)
    }

    /// Keeps the candidate words (one per line) that `store` has vectors
    /// for. Returns the vocabulary together with the candidates that were
    /// dropped, in source order.
    ///
    /// An empty result is not an error at this point; the rewriter refuses
    /// to start without candidates.
    pub fn restrict<S>(
        store: &EmbeddingStore,
        lines: &[S],
        deadline: &Deadline,
    ) -> Result<(RestrictedVocabulary, Vec<String>)>
    where
        S: AsRef<str> + Sync,
    {
        let resolved: Vec<Resolved> = lines
            .par_iter()
            .map(|line| -> Result<Resolved> {
                deadline.check()?;
                let word = normalize(line.as_ref());
                if word.is_empty() {
                    return Ok(None);
                }
                Ok(Some(match store.get_index(&word) {
                    Some(idx) => Ok((word, idx)),
                    None => Err(word),
                }))
            })
            .collect::<Result<_>>()?;

        let mut found = BTreeMap::new();
        let mut missing = Vec::new();
        for entry in resolved.into_iter().flatten() {
            match entry {
                Ok((word, idx)) => {
                    found.insert(word, idx);
                }
                Err(word) => {
                    tracing::debug!(%word, "vocabulary word has no embedding");
                    missing.push(word);
                }
            }
        }

        let mut table = EmbeddingStore::with_dims(store.dims());
        for (word, idx) in found {
            table.push(word, store.get_vector(idx));
        }

        tracing::info!(
            "Vocabulary words loaded: {} ({} without embeddings)",
            table.len(),
            missing.len()
        );
        Ok((RestrictedVocabulary { table }, missing))
    }
}
