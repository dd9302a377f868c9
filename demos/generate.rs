//! Write new messages with a trained model
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release --example generate -- --checkpoint model.ckpt
//!
//! # Nudge the topic with a lead word, reproducibly
//! cargo run --release --example generate -- --lead nice --seed 7 --count 5
//! ```

use cardsmith::{default_seed, Checkpoint, Error, GenerationConfig, SequenceGenerator};
use clap::Parser;
use rand::{rngs::StdRng, SeedableRng};
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "generate", about = "Generate greeting-card messages")]
struct Args {
    /// Checkpoint written by the train example
    #[arg(long, default_value = "model.ckpt")]
    checkpoint: PathBuf,

    /// Number of messages
    #[arg(long, default_value_t = 10)]
    count: usize,

    /// Shortest acceptable message, in words
    #[arg(long, default_value_t = 3)]
    min_length: usize,

    /// Longest message, in words
    #[arg(long)]
    max_length: Option<usize>,

    /// Multinomial trials per word (1 = plain sampling)
    #[arg(long, default_value_t = 10)]
    samples: u64,

    /// Word placed before the seed to steer the message
    #[arg(long)]
    lead: Option<String>,

    /// Random seed; fresh entropy when omitted
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<(), Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();

    let checkpoint = Checkpoint::load(&args.checkpoint)?;
    let vocab = checkpoint
        .vocabulary
        .ok_or_else(|| Error::InvalidCheckpoint("checkpoint has no vocabulary".into()))?;
    let sentinels = vocab.sentinels();

    let lead = match args.lead.as_deref() {
        Some(word) => match vocab.index_of(word) {
            Some(index) => Some(index),
            None => {
                warn!(word, "Lead word is not in the vocabulary, ignoring it");
                None
            }
        },
        None => None,
    };
    let seed = default_seed(sentinels, lead);

    let config = GenerationConfig {
        sample_count: args.samples,
        min_length: args.min_length,
        max_length: args.max_length,
        ..GenerationConfig::default()
    };
    let generator = SequenceGenerator::new(&checkpoint.model, sentinels).with_config(config);

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    for _ in 0..args.count {
        match generator.generate_accepted(&seed, &mut rng) {
            Some(message) => {
                // An index the vocabulary cannot name prints as an empty message
                let words = vocab.decode(&message).unwrap_or_default();
                println!("{}\n", words.join(" "));
            }
            None => warn!(min_length = args.min_length, "No message long enough"),
        }
    }
    Ok(())
}
