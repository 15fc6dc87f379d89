use rayon::prelude::*;
use std::io::{BufRead, Write};

use crate::deadline::Deadline;
use crate::error::{Error, Result};
use crate::matcher::{BruteForce, NeighborSearch};
use crate::normalize;
use crate::store::EmbeddingStore;
use crate::vocabulary::RestrictedVocabulary;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteOptions {
    /// Write tokens without an embedding in their normalized (lower-case)
    /// form instead of as they appeared in the input.
    pub lowercase_unmatched: bool,
}

/// One replacement: the normalized token, the vocabulary word chosen for it
/// and that word's score.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub query: String,
    pub resolved: String,
    pub score: f64,
}

#[derive(Debug)]
pub enum TokenOutcome {
    Replaced(MatchResult),
    /// no embedding for the token
    Unknown,
    /// the token has an embedding but could not be compared
    Failed(Error),
}

#[derive(Debug, Default)]
pub struct RewriteReport {
    pub lines: usize,
    pub tokens: usize,
    pub replaced: usize,
    pub unknown: usize,
    /// (line, token, reason) for tokens left unchanged after an error
    pub failed: Vec<(usize, String, Error)>,
}

/// Rewrites text by replacing every word that has an embedding with its
/// nearest vocabulary word.
pub struct TextRewriter<'a, S = BruteForce> {
    store: &'a EmbeddingStore,
    vocabulary: &'a RestrictedVocabulary,
    search: S,
    options: RewriteOptions,
}

impl<'a, S: NeighborSearch> TextRewriter<'a, S> {
    /// Fails with `EmptyCandidateSet` when there is nothing to replace words
    /// with, before any text is read.
    pub fn new(
        store: &'a EmbeddingStore,
        vocabulary: &'a RestrictedVocabulary,
        search: S,
    ) -> Result<Self> {
        if vocabulary.is_empty() {
            return Err(Error::EmptyCandidateSet);
        }
        Ok(TextRewriter {
            store,
            vocabulary,
            search,
            options: RewriteOptions::default(),
        })
    }

    pub fn with_options(mut self, options: RewriteOptions) -> Self {
        self.options = options;
        self
    }

    pub fn match_token(&self, token: &str) -> TokenOutcome {
        let Some((word, vector)) = self.store.lookup(token) else {
            return TokenOutcome::Unknown;
        };
        match self.search.closest(vector, self.vocabulary) {
            Ok(best) => TokenOutcome::Replaced(MatchResult {
                query: word.to_string(),
                resolved: best.word.to_string(),
                score: best.score,
            }),
            Err(e) => TokenOutcome::Failed(e),
        }
    }

    /// Splits `line` on whitespace, matches the tokens in parallel and joins
    /// the results with single spaces.
    ///
    /// Results are collected by token position, so the output keeps the
    /// input word order whatever order the matches finish in.
    pub fn rewrite_line(
        &self,
        line: &str,
        deadline: &Deadline,
    ) -> Result<(String, Vec<TokenOutcome>)> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let outcomes: Vec<TokenOutcome> = tokens
            .par_iter()
            .map(|token| -> Result<TokenOutcome> {
                deadline.check()?;
                Ok(self.match_token(token))
            })
            .collect::<Result<_>>()?;

        let words: Vec<String> = tokens
            .iter()
            .zip(&outcomes)
            .map(|(token, outcome)| match outcome {
                TokenOutcome::Replaced(m) => m.resolved.clone(),
                _ if self.options.lowercase_unmatched => normalize(token),
                _ => token.to_string(),
            })
            .collect();

        Ok((words.join(" "), outcomes))
    }

    /// Streams `reader` to `writer`, one output line per input line.
    ///
    /// Tokens that fail to match are written unchanged and listed in the
    /// report; only I/O errors and an expired deadline stop the rewrite.
    pub fn rewrite<R: BufRead, W: Write>(
        &self,
        reader: R,
        mut writer: W,
        deadline: &Deadline,
    ) -> Result<RewriteReport> {
        let mut report = RewriteReport::default();

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            deadline.check()?;
            let (rewritten, outcomes) = self.rewrite_line(&line, deadline)?;
            writeln!(writer, "{rewritten}")?;

            report.lines += 1;
            report.tokens += outcomes.len();
            let tokens = line.split_whitespace();
            for (token, outcome) in tokens.zip(outcomes) {
                match outcome {
                    TokenOutcome::Replaced(_) => report.replaced += 1,
                    TokenOutcome::Unknown => report.unknown += 1,
                    TokenOutcome::Failed(error) => {
                        tracing::warn!(line = index + 1, token, %error, "token left unchanged");
                        report.failed.push((index + 1, token.to_string(), error));
                    }
                }
            }
        }
        writer.flush()?;

        tracing::info!(
            lines = report.lines,
            tokens = report.tokens,
            replaced = report.replaced,
            unknown = report.unknown,
            failed = report.failed.len(),
            "rewrite finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deadline::DEFAULT_TIMEOUT;
    use crate::metric::Metric;
    use std::time::Duration;

    fn deadline() -> Deadline {
        Deadline::after("rewrite", DEFAULT_TIMEOUT)
    }

    fn build(
        entries: &[(&str, Vec<f64>)],
        vocab_words: &[&str],
    ) -> (EmbeddingStore, RestrictedVocabulary) {
        let (store, _) = EmbeddingStore::from_entries(entries.iter().cloned()).unwrap();
        let (vocab, _) = RestrictedVocabulary::restrict(&store, vocab_words, &deadline()).unwrap();
        (store, vocab)
    }

    fn rewrite_text(rewriter: &TextRewriter<'_>, text: &str) -> (String, RewriteReport) {
        let mut out = Vec::new();
        let report = rewriter
            .rewrite(text.as_bytes(), &mut out, &deadline())
            .unwrap();
        (String::from_utf8(out).unwrap(), report)
    }

    #[test]
    fn replaces_word_with_vocabulary_synonym() {
        let (store, vocab) = build(
            &[("happy", vec![1.0, 1.0]), ("joyful", vec![1.0, 1.0])],
            &["joyful"],
        );
        for metric in [Metric::Cosine, Metric::Euclidean] {
            let rewriter = TextRewriter::new(&store, &vocab, BruteForce::new(metric)).unwrap();
            let (line, outcomes) = rewriter.rewrite_line("I am happy", &deadline()).unwrap();
            assert_eq!(line, "I am joyful", "{metric}");
            match &outcomes[2] {
                TokenOutcome::Replaced(m) => {
                    assert_eq!(m.query, "happy");
                    assert_eq!(m.resolved, "joyful");
                }
                other => panic!("expected a replacement, got {other:?}"),
            }
        }
    }

    #[test]
    fn unknown_tokens_pass_through() {
        let (store, vocab) = build(
            &[("happy", vec![1.0, 1.0]), ("joyful", vec![1.0, 1.0])],
            &["joyful"],
        );
        let rewriter = TextRewriter::new(&store, &vocab, BruteForce::default()).unwrap();
        let (line, outcomes) = rewriter.rewrite_line("I am xyzzy", &deadline()).unwrap();
        assert_eq!(line, "I am xyzzy");
        assert!(outcomes.iter().all(|o| matches!(o, TokenOutcome::Unknown)));

        let lower = TextRewriter::new(&store, &vocab, BruteForce::default())
            .unwrap()
            .with_options(RewriteOptions {
                lowercase_unmatched: true,
            });
        let (line, _) = lower.rewrite_line("I am XYZZY", &deadline()).unwrap();
        assert_eq!(line, "i am xyzzy");
    }

    #[test]
    fn case_is_folded_before_lookup() {
        let (store, vocab) = build(
            &[("happy", vec![1.0, 1.0]), ("joyful", vec![1.0, 1.0])],
            &["Joyful"],
        );
        let rewriter = TextRewriter::new(&store, &vocab, BruteForce::default()).unwrap();
        let (line, _) = rewriter.rewrite_line("So HAPPY", &deadline()).unwrap();
        assert_eq!(line, "So joyful");
    }

    #[test]
    fn vocabulary_text_is_a_fixed_point() {
        let (store, vocab) = build(
            &[
                ("big", vec![1.0, 0.1, 0.0]),
                ("small", vec![-1.0, 0.2, 0.0]),
                ("house", vec![0.1, 1.0, 0.3]),
                ("enormous", vec![0.9, 0.2, 0.0]),
            ],
            &["big", "small", "house"],
        );
        for metric in [Metric::Cosine, Metric::Euclidean] {
            let rewriter = TextRewriter::new(&store, &vocab, BruteForce::new(metric)).unwrap();
            let (once, _) = rewrite_text(&rewriter, "enormous house\nsmall big house\n");
            assert_eq!(once, "big house\nsmall big house\n", "{metric}");
            let (twice, report) = rewrite_text(&rewriter, &once);
            assert_eq!(twice, once, "{metric}");
            assert_eq!(report.replaced, 5);
        }
    }

    #[test]
    fn word_order_is_preserved() {
        // each source word has its own vocabulary target on a distinct axis
        let dims = 64;
        let mut entries = Vec::new();
        let mut targets = Vec::new();
        for i in 0..dims {
            let mut source = vec![0.0; dims];
            source[i] = 1.0;
            source[(i + 1) % dims] = 0.1;
            let mut target = vec![0.0; dims];
            target[i] = 1.0;
            entries.push((format!("src{i}"), source));
            entries.push((format!("dst{i}"), target));
            targets.push(format!("dst{i}"));
        }
        let (store, _) = EmbeddingStore::from_entries(entries).unwrap();
        let (vocab, _) = RestrictedVocabulary::restrict(&store, &targets, &deadline()).unwrap();
        let rewriter = TextRewriter::new(&store, &vocab, BruteForce::default()).unwrap();

        let order: Vec<usize> = (0..dims).rev().chain(0..dims).collect();
        let input: Vec<String> = order.iter().map(|i| format!("src{i}")).collect();
        let expected: Vec<String> = order.iter().map(|i| format!("dst{i}")).collect();

        let (line, _) = rewriter.rewrite_line(&input.join(" "), &deadline()).unwrap();
        assert_eq!(line, expected.join(" "));
    }

    #[test]
    fn whitespace_runs_collapse_and_lines_are_kept() {
        let (store, vocab) = build(&[("a", vec![1.0]), ("b", vec![2.0])], &["b"]);
        let rewriter = TextRewriter::new(&store, &vocab, BruteForce::new(Metric::Euclidean))
            .unwrap();
        let (out, report) = rewrite_text(&rewriter, "  a\t x   a  \n\nx\n");
        assert_eq!(out, "b x b\n\nx\n");
        assert_eq!(report.lines, 3);
        assert_eq!(report.tokens, 4);
        assert_eq!(report.replaced, 2);
        assert_eq!(report.unknown, 2);
    }

    #[test]
    fn empty_vocabulary_is_rejected_up_front() {
        let (store, vocab) = build(&[("a", vec![1.0])], &["zzz"]);
        assert!(matches!(
            TextRewriter::new(&store, &vocab, BruteForce::default()),
            Err(Error::EmptyCandidateSet)
        ));
    }

    #[test]
    fn comparison_failures_leave_token_unchanged() {
        let (store, _) = build(&[("word", vec![1.0, 0.0])], &[]);
        let (_, other_vocab) = build(&[("simple", vec![1.0, 0.0, 0.0])], &["simple"]);
        let rewriter = TextRewriter::new(&store, &other_vocab, BruteForce::default()).unwrap();

        let (out, report) = rewrite_text(&rewriter, "one word here\n");
        assert_eq!(out, "one word here\n");
        assert_eq!(report.failed.len(), 1);
        let (line, token, error) = &report.failed[0];
        assert_eq!((*line, token.as_str()), (1, "word"));
        assert!(matches!(
            error,
            Error::DimensionMismatch {
                expected: 3,
                found: 2
            }
        ));
    }

    #[test]
    fn expired_deadline_stops_rewrite() {
        let (store, vocab) = build(&[("a", vec![1.0])], &["a"]);
        let rewriter = TextRewriter::new(&store, &vocab, BruteForce::default()).unwrap();
        let expired = Deadline::after("rewrite", Duration::ZERO);
        let mut out = Vec::new();
        assert!(matches!(
            rewriter.rewrite("a a\n".as_bytes(), &mut out, &expired),
            Err(Error::Timeout { phase: "rewrite", .. })
        ));
    }
}
