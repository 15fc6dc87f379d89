use rayon::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::deadline::Deadline;
use crate::error::{Error, Result};
use crate::normalize;

/// Word embeddings held in one contiguous buffer.
///
/// Words keep the order in which they first appeared in the source. Once
/// loaded the store is never mutated, so it can be shared by reference
/// between any number of matching tasks.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingStore {
    words: Vec<String>,               // index to word map
    word_map: HashMap<String, usize>, // word to index map
    vectors: Vec<f64>,                // all vector data, `dims` values per word
    dims: usize,
}

/// A source line that did not make it into the store.
#[derive(Debug)]
pub struct Rejected {
    pub line: usize,
    pub error: Error,
}

/// What happened during a bulk load.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// non-blank lines seen
    pub lines: usize,
    pub loaded: usize,
    pub rejected: Vec<Rejected>,
}

impl LoadReport {
    fn reject(&mut self, line: usize, error: Error) {
        tracing::warn!(line, %error, "skipping embeddings line");
        self.rejected.push(Rejected { line, error });
    }
}

impl EmbeddingStore {
    pub(crate) fn with_dims(dims: usize) -> Self {
        EmbeddingStore {
            dims,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn get_word(&self, idx: usize) -> &str {
        &self.words[idx]
    }

    /// Index of an already normalized word.
    pub fn get_index(&self, word: &str) -> Option<usize> {
        self.word_map.get(word).copied()
    }

    pub fn contains(&self, word: &str) -> bool {
        self.word_map.contains_key(word)
    }

    pub fn get(&self, word: &str) -> Option<&[f64]> {
        self.get_index(word).map(|idx| self.get_vector(idx))
    }

    /// Normalizes `token` and returns the stored word and its vector.
    pub fn lookup(&self, token: &str) -> Option<(&str, &[f64])> {
        let idx = self.get_index(&normalize(token))?;
        Some((self.get_word(idx), self.get_vector(idx)))
    }

    pub(crate) fn get_vector(&self, idx: usize) -> &[f64] {
        &self.vectors[idx * self.dims..(idx + 1) * self.dims]
    }

    pub(crate) fn vectors(&self) -> &[f64] {
        &self.vectors
    }

    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.words.iter().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.words
            .iter()
            .zip(self.vectors.chunks_exact(self.dims.max(1)))
            .map(|(w, v)| (w.as_str(), v))
    }

    // Callers guarantee a new, normalized word and `values.len() == dims`.
    pub(crate) fn push(&mut self, word: String, values: &[f64]) {
        debug_assert_eq!(values.len(), self.dims);
        self.word_map.insert(word.clone(), self.words.len());
        self.words.push(word);
        self.vectors.extend_from_slice(values);
    }

    /// Builds a store from in-memory entries with the same validation as a
    /// file load.
    pub fn from_entries<I, S>(entries: I) -> Result<(EmbeddingStore, LoadReport)>
    where
        I: IntoIterator<Item = (S, Vec<f64>)>,
        S: AsRef<str>,
    {
        let parsed = entries
            .into_iter()
            .enumerate()
            .map(|(i, (word, values))| Some(check_entry(i + 1, word.as_ref(), values)))
            .collect();
        assemble(parsed)
    }

    /// Read word vectors from a text file, one `word, v1, ..., vd` per line.
    pub fn from_file(
        path: impl AsRef<Path>,
        deadline: &Deadline,
    ) -> Result<(EmbeddingStore, LoadReport)> {
        let path = path.as_ref();
        let file = fs::File::open(path).map_err(|e| Error::file(path, e))?;
        let lines = BufReader::new(file)
            .lines()
            .collect::<std::io::Result<Vec<String>>>()
            .map_err(|e| Error::file(path, e))?;
        Self::load(&lines, deadline)
    }

    pub fn from_reader<R: BufRead>(
        reader: R,
        deadline: &Deadline,
    ) -> Result<(EmbeddingStore, LoadReport)> {
        let lines = reader.lines().collect::<std::io::Result<Vec<String>>>()?;
        Self::load(&lines, deadline)
    }

    /// Parses all lines in parallel, then assembles the store in source
    /// order.
    ///
    /// Bad lines are skipped and listed in the report. The dimension is set
    /// by the first line that parses; later lines of another length are
    /// rejected, as are zero vectors and repeated words (the first occurrence
    /// wins). An expired deadline fails the whole load.
    pub fn load<S>(lines: &[S], deadline: &Deadline) -> Result<(EmbeddingStore, LoadReport)>
    where
        S: AsRef<str> + Sync,
    {
        let parsed: Vec<Parsed> = lines
            .par_iter()
            .enumerate()
            .map(|(i, line)| -> Result<Parsed> {
                deadline.check()?;
                Ok(parse_line(i + 1, line.as_ref()))
            })
            .collect::<Result<_>>()?;

        let (store, report) = assemble(parsed)?;
        tracing::info!("Total words loaded: {}", store.len());
        Ok((store, report))
    }
}

// None for blank lines.
type Parsed = Option<Result<(String, Vec<f64>)>>;

fn parse_line(line_no: usize, line: &str) -> Parsed {
    if line.trim().is_empty() {
        return None;
    }
    let mut parts = line.split(',').map(str::trim);
    let word = parts.next().unwrap_or_default();
    let values = parts
        .map(|s| {
            s.parse::<f64>().map_err(|e| Error::MalformedLine {
                line: line_no,
                reason: format!("bad value '{s}': {e}"),
            })
        })
        .collect::<Result<Vec<f64>>>();
    Some(values.and_then(|values| check_entry(line_no, word, values)))
}

fn check_entry(line_no: usize, word: &str, values: Vec<f64>) -> Result<(String, Vec<f64>)> {
    let malformed = |reason: String| Error::MalformedLine {
        line: line_no,
        reason,
    };
    let word = normalize(word);
    if word.is_empty() {
        return Err(malformed("missing word".into()));
    }
    if word.chars().any(char::is_whitespace) {
        return Err(malformed(format!("word '{word}' contains whitespace")));
    }
    if values.is_empty() {
        return Err(malformed(format!("no vector for '{word}'")));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(malformed(format!("non-finite value in vector for '{word}'")));
    }
    if values.iter().all(|v| *v == 0.0) {
        return Err(Error::DegenerateVector);
    }
    Ok((word, values))
}

fn assemble(parsed: Vec<Parsed>) -> Result<(EmbeddingStore, LoadReport)> {
    let mut report = LoadReport::default();
    let mut store = EmbeddingStore::default();

    for (index, entry) in parsed.into_iter().enumerate() {
        let Some(entry) = entry else {
            continue;
        };
        let line = index + 1;
        report.lines += 1;

        let (word, values) = match entry {
            Ok(entry) => entry,
            Err(e) => {
                report.reject(line, e);
                continue;
            }
        };

        if store.dims == 0 {
            store.dims = values.len();
        } else if values.len() != store.dims {
            report.reject(
                line,
                Error::DimensionMismatch {
                    expected: store.dims,
                    found: values.len(),
                },
            );
            continue;
        }

        if store.contains(&word) {
            report.reject(line, Error::DuplicateWord { word });
            continue;
        }

        store.push(word, &values);
    }

    if store.is_empty() {
        return Err(Error::EmptyStore);
    }
    report.loaded = store.len();
    Ok((store, report))
}
