//! Verify BPTT against finite differences on a small random model
//!
//! ## Usage
//!
//! ```bash
//! cargo run --example gradient_check
//! cargo run --example gradient_check -- --vocab 100 --hidden 10 --length 6
//! ```

use cardsmith::{gradient_check, Config, GradientCheckConfig, RnnModel};
use clap::Parser;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gradient_check", about = "Check BPTT gradients numerically")]
struct Args {
    /// Vocabulary size of the test model
    #[arg(long, default_value_t = 100)]
    vocab: usize,

    /// Hidden width of the test model
    #[arg(long, default_value_t = 10)]
    hidden: usize,

    /// Length of the random example
    #[arg(long, default_value_t = 5)]
    length: usize,

    /// Finite-difference step
    #[arg(long, default_value_t = 0.001)]
    step: f64,

    /// Largest tolerated relative error
    #[arg(long, default_value_t = 0.01)]
    threshold: f64,

    #[arg(long, default_value_t = 10)]
    seed: u64,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    let mut rng = StdRng::seed_from_u64(args.seed);

    // Truncation must cover the whole example for BPTT to be exact
    let config = Config::new(args.vocab)
        .with_hidden_dim(args.hidden)
        .with_bptt_truncate(1000);
    let model = RnnModel::new(&config, &mut rng);

    let sequence: Vec<usize> = (0..=args.length)
        .map(|_| rng.random_range(0..args.vocab))
        .collect();
    let (x, y) = (&sequence[..args.length], &sequence[1..]);
    info!(?x, ?y, parameters = model.count_parameters(), "Checking gradients");

    let report = gradient_check(
        &model,
        x,
        y,
        &GradientCheckConfig {
            step_size: args.step,
            error_threshold: args.threshold,
        },
    );

    match report.failure {
        None => {
            println!("Gradient check passed for {:?}", report.passed);
            ExitCode::SUCCESS
        }
        Some(mismatch) => {
            println!("Gradient check failed: {}", mismatch);
            ExitCode::FAILURE
        }
    }
}
