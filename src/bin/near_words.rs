use anyhow::Context;
use clap::Parser;
use simplify_rs::deadline::DEFAULT_TIMEOUT;
use simplify_rs::{
    BruteForce, Deadline, EmbeddingStore, Metric, NeighborSearch, RestrictedVocabulary, logging,
};
use std::io::{self, Write};
use std::path::PathBuf;

/// Rank the vocabulary words nearest to a word or sentence.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(long, value_name = "FILE")]
    embeddings: PathBuf,

    #[arg(long, value_name = "FILE")]
    vocab_file: PathBuf,

    #[arg(long, value_enum, default_value_t = Metric::Cosine)]
    metric: Metric,

    /// Number of ranked words to show
    #[arg(long, default_value_t = 30)]
    top_n: usize,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn get_input() -> io::Result<Option<String>> {
    let mut s = String::new();
    if io::stdin().read_line(&mut s)? == 0 {
        return Ok(None);
    }
    Ok(Some(s.trim().to_string()))
}

// Mean of the given vectors, all of the same length.
fn centroid(vectors: &[&[f64]]) -> Vec<f64> {
    let mut target = vec![0.0; vectors[0].len()];
    for v in vectors {
        for (t, x) in target.iter_mut().zip(v.iter()) {
            *t += x;
        }
    }
    let n = vectors.len() as f64;
    target.iter_mut().for_each(|t| *t /= n);
    target
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init(args.verbose);

    let (store, _) = EmbeddingStore::from_file(
        &args.embeddings,
        &Deadline::after("load embeddings", DEFAULT_TIMEOUT),
    )
    .with_context(|| format!("loading {}", args.embeddings.display()))?;
    let (vocabulary, _) = RestrictedVocabulary::from_file(
        &store,
        &args.vocab_file,
        &Deadline::after("load vocabulary", DEFAULT_TIMEOUT),
    )
    .with_context(|| format!("loading {}", args.vocab_file.display()))?;
    let search = BruteForce::new(args.metric);

    println!("Near Words Tool - Type 'EXIT' to quit\n");
    loop {
        println!("\nRanking nearest vocabulary words to a word or sentence.");
        print!("Enter 1 or more words: ");
        io::stdout().flush()?;
        let Some(s) = get_input()? else {
            break;
        };
        if s == "EXIT" {
            println!("Goodbye!");
            break;
        }
        let words: Vec<&str> = s.split_whitespace().collect();
        if words.is_empty() {
            println!("No words were input. Try again");
            continue;
        }

        let oov_words: Vec<&str> = words
            .iter()
            .filter(|&&w| store.lookup(w).is_none())
            .copied()
            .collect();

        if !oov_words.is_empty() {
            for word in &oov_words {
                println!("'{word}' is out of vocabulary");
            }
            continue;
        }

        let vectors: Vec<&[f64]> = words
            .iter()
            .filter_map(|w| store.lookup(w).map(|(_, v)| v))
            .collect();
        let query = centroid(&vectors);

        let ranked = match search.nearest(&query, &vocabulary, args.top_n) {
            Ok(ranked) => ranked,
            Err(e) => {
                println!("No near words: {e}");
                continue;
            }
        };

        println!("\nNearest words to '{}' ({}):", words.join(" + "), args.metric);
        println!("{:>4} {:>10} Word", "Rank", "Score");
        println!("{}", "-".repeat(30));

        for (i, neighbor) in ranked.iter().enumerate() {
            println!("{:4}: {:10.6} {}", i + 1, neighbor.score, neighbor.word);
        }
    }

    Ok(())
}
