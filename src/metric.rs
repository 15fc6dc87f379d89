use std::fmt;

use crate::error::{Error, Result};

/// Whether a higher or a lower score means a closer word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Maximize,
    Minimize,
}

impl Direction {
    /// Strict comparison: equal scores are not an improvement, so the first
    /// candidate seen keeps a tie. NaN never wins.
    pub fn is_better(self, candidate: f64, best: f64) -> bool {
        match self {
            Direction::Maximize => candidate > best,
            Direction::Minimize => candidate < best,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Metric {
    /// dot(a, b) / (|a| |b|), higher is closer
    #[default]
    Cosine,
    /// sqrt(sum (a_i - b_i)^2), lower is closer
    Euclidean,
}

impl Metric {
    pub fn direction(self) -> Direction {
        match self {
            Metric::Cosine => Direction::Maximize,
            Metric::Euclidean => Direction::Minimize,
        }
    }

    pub fn score(self, a: &[f64], b: &[f64]) -> Result<f64> {
        if a.len() != b.len() {
            return Err(Error::DimensionMismatch {
                expected: a.len(),
                found: b.len(),
            });
        }
        match self {
            Metric::Cosine => cosine_similarity(a, b),
            Metric::Euclidean => Ok(euclidean_distance(a, b)),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Cosine => write!(f, "cosine"),
            Metric::Euclidean => write!(f, "euclidean"),
        }
    }
}

fn max_abs(v: impl Iterator<Item = f64>) -> f64 {
    v.fold(0.0_f64, |m, x| m.max(x.abs()))
}

// Callers check lengths first. Both vectors are scaled by their largest
// component so the squared norms neither overflow nor underflow.
fn cosine_similarity(a: &[f64], b: &[f64]) -> Result<f64> {
    let scale_a = max_abs(a.iter().copied());
    let scale_b = max_abs(b.iter().copied());
    if scale_a == 0.0 || scale_b == 0.0 {
        return Err(Error::DegenerateVector);
    }
    let (dot, norm_a, norm_b) = a
        .iter()
        .map(|x| x / scale_a)
        .zip(b.iter().map(|y| y / scale_b))
        .fold((0.0, 0.0, 0.0), |(dot, na, nb), (x, y)| {
            (dot + x * y, na + x * x, nb + y * y)
        });
    Ok((dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0))
}

fn euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
    let diffs = || a.iter().zip(b).map(|(x, y)| x - y);
    let scale = max_abs(diffs());
    if scale == 0.0 || scale.is_infinite() {
        return scale;
    }
    scale * diffs().map(|d| (d / scale) * (d / scale)).sum::<f64>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn cosine_of_self_is_one() {
        let v = [0.3, -1.2, 4.0, 0.5];
        let s = Metric::Cosine.score(&v, &v).unwrap();
        assert!((s - 1.0).abs() < EPS, "got {s}");
    }

    #[test]
    fn euclidean_of_self_is_zero() {
        let v = [0.3, -1.2, 4.0, 0.5];
        assert_eq!(Metric::Euclidean.score(&v, &v).unwrap(), 0.0);
    }

    #[test]
    fn known_values() {
        let a = [1.0, 0.0];
        let b = [0.0, 1.0];
        assert!(Metric::Cosine.score(&a, &b).unwrap().abs() < EPS);
        let d = Metric::Euclidean.score(&a, &b).unwrap();
        assert!((d - 2f64.sqrt()).abs() < EPS);

        let c = [-2.0, 0.0];
        assert!((Metric::Cosine.score(&a, &c).unwrap() + 1.0).abs() < EPS);
        assert!((Metric::Euclidean.score(&a, &c).unwrap() - 3.0).abs() < EPS);
    }

    #[test]
    fn mismatched_lengths_fail_for_both_metrics() {
        for metric in [Metric::Cosine, Metric::Euclidean] {
            match metric.score(&[1.0, 2.0], &[1.0, 2.0, 3.0]) {
                Err(Error::DimensionMismatch { expected, found }) => {
                    assert_eq!((expected, found), (2, 3));
                }
                other => panic!("{metric}: expected dimension mismatch, got {other:?}"),
            }
        }
    }

    #[test]
    fn cosine_rejects_zero_vectors() {
        assert!(matches!(
            Metric::Cosine.score(&[0.0, 0.0], &[1.0, 0.0]),
            Err(Error::DegenerateVector)
        ));
        // distance is still defined
        assert_eq!(Metric::Euclidean.score(&[0.0, 0.0], &[3.0, 4.0]).unwrap(), 5.0);
    }

    #[test]
    fn extreme_magnitudes_stay_finite() {
        let huge = [1e200, 1e199, -3e199];
        let tiny = [1e-200, 1e-201, -3e-201];
        for v in [&huge, &tiny] {
            let s = Metric::Cosine.score(v, v).unwrap();
            assert!((s - 1.0).abs() < EPS, "got {s}");
        }
        // same direction, wildly different lengths
        let s = Metric::Cosine.score(&huge, &tiny).unwrap();
        assert!((s - 1.0).abs() < EPS, "got {s}");

        let d = Metric::Euclidean.score(&[3e200, 0.0], &[0.0, 4e200]).unwrap();
        assert!((d / 5e200 - 1.0).abs() < EPS, "got {d}");
        let d = Metric::Euclidean.score(&[3e-200, 0.0], &[0.0, 4e-200]).unwrap();
        assert!((d / 5e-200 - 1.0).abs() < EPS, "got {d}");
    }

    #[test]
    fn directions_follow_the_metric() {
        assert_eq!(Metric::Cosine.direction(), Direction::Maximize);
        assert_eq!(Metric::Euclidean.direction(), Direction::Minimize);

        assert!(Direction::Maximize.is_better(0.9, 0.5));
        assert!(!Direction::Maximize.is_better(0.5, 0.5));
        assert!(Direction::Minimize.is_better(0.1, 0.5));
        assert!(!Direction::Minimize.is_better(0.5, 0.5));
        assert!(!Direction::Maximize.is_better(f64::NAN, 0.5));
        assert!(!Direction::Minimize.is_better(f64::NAN, 0.5));
    }
}
