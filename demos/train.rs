//! Train a greeting-card model from a message corpus
//!
//! The corpus is plain text in which every message is wrapped in sentinel
//! words:
//!
//! ```text
//! START_MESSAGE Happy birthday ! Have a great day . END_MESSAGE
//! START_MESSAGE Congrats on the new place ! END_MESSAGE
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Train from scratch, checkpointing at every evaluation
//! cargo run --release --example train -- --data training_data.txt
//!
//! # Keep training an existing checkpoint
//! cargo run --release --example train -- --resume model.ckpt --epochs 1000 --eval-every 10
//!
//! # More detail
//! RUST_LOG=debug cargo run --release --example train
//! ```

use cardsmith::vocab::{split_messages, tokenize, training_pairs};
use cardsmith::{
    random_baseline_loss, Checkpoint, Config, Error, RnnModel, Trainer, TrainingConfig,
    TrainingLogger, Vocabulary,
};
use clap::Parser;
use rand::{rngs::StdRng, SeedableRng};
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "train", about = "Train a recurrent greeting-card model")]
struct Args {
    /// Path to the message corpus
    #[arg(long, default_value = "training_data.txt")]
    data: PathBuf,

    /// Where to write the checkpoint
    #[arg(long, default_value = "model.ckpt")]
    checkpoint: PathBuf,

    /// Continue training from this checkpoint (model, vocabulary and state)
    #[arg(long)]
    resume: Option<PathBuf>,

    /// Hidden state width
    #[arg(long, default_value_t = Config::DEFAULT_HIDDEN_DIM)]
    hidden: usize,

    /// BPTT truncation depth
    #[arg(long, default_value_t = Config::DEFAULT_BPTT_TRUNCATE)]
    truncate: usize,

    /// Initial learning rate
    #[arg(long, default_value_t = 0.005)]
    lr: f64,

    /// Epochs to run
    #[arg(long, default_value_t = 100)]
    epochs: usize,

    /// Evaluate the loss every N epochs
    #[arg(long, default_value_t = 5)]
    eval_every: usize,

    /// Keep only the N most frequent words (sentinels included)
    #[arg(long)]
    max_vocab: Option<usize>,

    /// Seed for weight initialization
    #[arg(long, default_value_t = 10)]
    seed: u64,

    /// Also write evaluation rows to this CSV file
    #[arg(long)]
    log: Option<PathBuf>,
}

fn main() -> Result<(), Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();

    let text = fs::read_to_string(&args.data)?;
    let tokens = tokenize(&text);
    info!(path = %args.data.display(), tokens = tokens.len(), "Corpus loaded");

    let (mut model, vocab, state) = match &args.resume {
        Some(path) => {
            let checkpoint = Checkpoint::load(path)?;
            let vocab = checkpoint.vocabulary.ok_or_else(|| {
                Error::InvalidCheckpoint(
                    "cannot resume from a checkpoint without a vocabulary".into(),
                )
            })?;
            (checkpoint.model, vocab, Some(checkpoint.state))
        }
        None => {
            let vocab = Vocabulary::build(&tokens, args.max_vocab)?;
            let config = Config::new(vocab.len())
                .with_hidden_dim(args.hidden)
                .with_bptt_truncate(args.truncate);
            let model = RnnModel::new(&config, &mut StdRng::seed_from_u64(args.seed));
            (model, vocab, None)
        }
    };

    let messages = split_messages(&vocab.encode(&tokens), vocab.sentinels().end);
    let (inputs, targets) = training_pairs(&messages);
    info!(
        vocab_size = vocab.len(),
        messages = inputs.len(),
        parameters = model.count_parameters(),
        "Training set ready"
    );
    info!(
        expected = random_baseline_loss(vocab.len()),
        actual = model.mean_loss(&inputs, &targets),
        "Loss before training (expected is for uniform predictions)"
    );

    let logger = match &args.log {
        Some(path) => TrainingLogger::new(path)?,
        None => TrainingLogger::console_only(),
    };
    let config = TrainingConfig {
        learning_rate: args.lr,
        num_epochs: args.epochs,
        eval_interval: args.eval_every,
        checkpoint_path: Some(args.checkpoint.clone()),
    };

    let mut trainer = Trainer::new(config)?
        .with_logger(logger)
        .with_vocabulary(vocab.clone());
    if let Some(state) = state {
        trainer = trainer.resume_from(state)?;
    }

    let report = trainer.train(&mut model, &inputs, &targets)?;

    // Evaluations only checkpoint at epoch starts; keep the final weights too
    Checkpoint {
        model,
        vocabulary: Some(vocab),
        state: trainer.state().clone(),
    }
    .save(&args.checkpoint)?;

    info!(
        examples_seen = report.examples_seen,
        learning_rate = report.learning_rate,
        decays = report.decays,
        last_loss = ?report.loss_history.last().map(|&(_, loss)| loss),
        checkpoint = %args.checkpoint.display(),
        "Done"
    );
    Ok(())
}
