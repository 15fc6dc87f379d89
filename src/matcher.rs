//! Nearest-neighbour search over the restricted vocabulary.
//!
//! The only implementation is a brute-force scan: every query scores every
//! vocabulary vector, O(n * d) for n words of dimension d. That is fine for a
//! vocabulary of about a thousand words, and it is the part that stops
//! scaling first. [`NeighborSearch`] is where an indexed search would plug in.

use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::metric::{Direction, Metric};
use crate::vocabulary::RestrictedVocabulary;

/// A vocabulary word and its score against the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor<'v> {
    pub word: &'v str,
    pub score: f64,
}

pub trait NeighborSearch: Sync {
    /// The single best candidate for `query`.
    fn closest<'v>(
        &self,
        query: &[f64],
        candidates: &'v RestrictedVocabulary,
    ) -> Result<Neighbor<'v>>;

    /// Up to `n` candidates, best first.
    fn nearest<'v>(
        &self,
        query: &[f64],
        candidates: &'v RestrictedVocabulary,
        n: usize,
    ) -> Result<Vec<Neighbor<'v>>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BruteForce {
    pub metric: Metric,
    pub direction: Direction,
}

impl BruteForce {
    /// Search in the metric's natural direction.
    pub fn new(metric: Metric) -> Self {
        BruteForce {
            metric,
            direction: metric.direction(),
        }
    }

    pub fn with_direction(metric: Metric, direction: Direction) -> Self {
        BruteForce { metric, direction }
    }
}

impl Default for BruteForce {
    fn default() -> Self {
        BruteForce::new(Metric::default())
    }
}

impl NeighborSearch for BruteForce {
    fn closest<'v>(
        &self,
        query: &[f64],
        candidates: &'v RestrictedVocabulary,
    ) -> Result<Neighbor<'v>> {
        closest(query, candidates, self.metric, self.direction)
    }

    fn nearest<'v>(
        &self,
        query: &[f64],
        candidates: &'v RestrictedVocabulary,
        n: usize,
    ) -> Result<Vec<Neighbor<'v>>> {
        nearest(query, candidates, self.metric, self.direction, n)
    }
}

fn check_query(query: &[f64], candidates: &RestrictedVocabulary) -> Result<()> {
    if candidates.is_empty() {
        return Err(Error::EmptyCandidateSet);
    }
    if query.len() != candidates.dims() {
        return Err(Error::DimensionMismatch {
            expected: candidates.dims(),
            found: query.len(),
        });
    }
    Ok(())
}

// Keeps `best` unless `current` is strictly better, so ties go to the
// earlier candidate.
fn pick(
    direction: Direction,
    best: Option<(usize, f64)>,
    current: Option<(usize, f64)>,
) -> Option<(usize, f64)> {
    match (best, current) {
        (Some(b), Some(c)) if direction.is_better(c.1, b.1) => Some(c),
        (Some(b), _) => Some(b),
        (None, c) => c,
    }
}

/// Scans every candidate and returns the best one under `direction`.
///
/// Candidates are visited in the vocabulary's lexicographic order and the
/// reduction keeps the left operand on ties, so the parallel result is the
/// same as a sequential scan: the alphabetically first of equally scored
/// words wins.
pub fn closest<'v>(
    query: &[f64],
    candidates: &'v RestrictedVocabulary,
    metric: Metric,
    direction: Direction,
) -> Result<Neighbor<'v>> {
    check_query(query, candidates)?;
    let table = candidates.table();

    let best = table
        .vectors()
        .par_chunks_exact(table.dims())
        .enumerate()
        .map(|(i, v)| -> Result<Option<(usize, f64)>> {
            let score = metric.score(query, v)?;
            Ok((!score.is_nan()).then_some((i, score)))
        })
        .try_reduce(|| None, |best, current| Ok(pick(direction, best, current)))?;

    let (idx, score) = best.ok_or(Error::DegenerateVector)?;
    Ok(Neighbor {
        word: table.get_word(idx),
        score,
    })
}

/// Same scan as [`closest`], keeping the `n` best candidates.
pub fn nearest<'v>(
    query: &[f64],
    candidates: &'v RestrictedVocabulary,
    metric: Metric,
    direction: Direction,
    n: usize,
) -> Result<Vec<Neighbor<'v>>> {
    check_query(query, candidates)?;
    let table = candidates.table();

    let mut scores: Vec<(usize, f64)> = table
        .vectors()
        .par_chunks_exact(table.dims())
        .enumerate()
        .map(|(i, v)| -> Result<(usize, f64)> { Ok((i, metric.score(query, v)?)) })
        .collect::<Result<_>>()?;
    // NaN never ranks, same as in `closest`.
    scores.retain(|(_, score)| !score.is_nan());

    let by_rank = |a: &(usize, f64), b: &(usize, f64)| {
        let by_score = match direction {
            Direction::Maximize => b.1.total_cmp(&a.1),
            Direction::Minimize => a.1.total_cmp(&b.1),
        };
        by_score.then(a.0.cmp(&b.0))
    };

    // Partial sort first, only the head needs to be ordered.
    if n < scores.len() {
        scores.select_nth_unstable_by(n, by_rank);
        scores.truncate(n);
    }
    scores.sort_by(by_rank);

    Ok(scores
        .into_iter()
        .map(|(idx, score)| Neighbor {
            word: table.get_word(idx),
            score,
        })
        .collect())
}
