use anyhow::Context;
use clap::Parser;
use simplify_rs::deadline::DEFAULT_TIMEOUT;
use simplify_rs::pipeline::{self, DEFAULT_OUTPUT, SimplifyConfig};
use simplify_rs::{Metric, logging};
use std::path::PathBuf;
use std::time::Duration;

/// Replace each word of a text with its nearest word from a small vocabulary.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Word embeddings, one `word, v1, v2, ...` per line
    #[arg(long, value_name = "FILE")]
    embeddings: PathBuf,

    /// Replacement vocabulary (e.g. Google-1000), one word per line
    #[arg(long, value_name = "FILE")]
    vocab_file: PathBuf,

    /// Text to simplify
    #[arg(long, value_name = "FILE")]
    input_file: PathBuf,

    #[arg(long, value_name = "FILE", default_value = DEFAULT_OUTPUT)]
    output_file: PathBuf,

    #[arg(long, value_enum, default_value_t = Metric::default())]
    metric: Metric,

    /// Seconds each phase may take before the run is abandoned
    #[arg(long, default_value_t = DEFAULT_TIMEOUT.as_secs())]
    timeout: u64,

    /// Worker threads (default: one per core)
    #[arg(long)]
    threads: Option<usize>,

    /// Lower-case words that are left unchanged
    #[arg(long)]
    lowercase_unmatched: bool,

    /// -v info, -vv debug, -vvv trace
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init(args.verbose);

    let config = SimplifyConfig {
        embeddings: args.embeddings,
        vocabulary: args.vocab_file,
        input: args.input_file,
        output: args.output_file,
        metric: args.metric,
        timeout: Duration::from_secs(args.timeout),
        lowercase_unmatched: args.lowercase_unmatched,
        threads: args.threads,
    };

    let report = pipeline::run(&config).with_context(|| {
        format!(
            "simplifying '{}' into '{}'",
            config.input.display(),
            config.output.display()
        )
    })?;

    eprintln!("Total words loaded: {}", report.embeddings.loaded);
    if !report.embeddings.rejected.is_empty() {
        eprintln!("Skipped embeddings lines: {}", report.embeddings.rejected.len());
    }
    eprintln!(
        "Vocabulary words loaded: {} ({} without embeddings)",
        report.vocabulary_size,
        report.missing_vocabulary.len()
    );
    let rw = &report.rewrite;
    eprintln!(
        "Rewrote {} lines: {} of {} words replaced, {} unknown, {} failed",
        rw.lines,
        rw.replaced,
        rw.tokens,
        rw.unknown,
        rw.failed.len()
    );
    eprintln!("Output saved to: {}", config.output.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn defaults_match_the_library() {
        Args::command().debug_assert();

        let args = Args::try_parse_from([
            "simplify",
            "--embeddings",
            "emb.txt",
            "--vocab-file",
            "google-1000.txt",
            "--input-file",
            "in.txt",
        ])
        .unwrap();
        let defaults = SimplifyConfig::default();
        assert_eq!(Duration::from_secs(args.timeout), defaults.timeout);
        assert_eq!(args.output_file, defaults.output);
        assert_eq!(args.metric, defaults.metric);
        assert_eq!(args.threads, defaults.threads);
    }
}
