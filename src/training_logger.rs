//! Training Logger
//!
//! Records one row per loss evaluation so a run can be inspected or plotted
//! afterwards, and reports the same numbers through `tracing`.
//!
//! ## Example
//!
//! ```rust,no_run
//! use cardsmith::TrainingLogger;
//!
//! let mut logger = TrainingLogger::new("training_log.csv")?;
//! logger.log(7000, 1, 0.005, 5.23)?;
//! # Ok::<(), cardsmith::Error>(())
//! ```
//!
//! ## CSV Format
//!
//! - `unix_time`: Wall-clock seconds since the Unix epoch
//! - `examples_seen`: SGD steps taken so far
//! - `epoch`: Epoch at whose start the evaluation ran
//! - `elapsed_seconds`: Time since the logger was created
//! - `learning_rate`: Rate in effect for the coming epoch
//! - `loss`: Mean per-token cross-entropy over the training set
//! - `perplexity`: exp(loss)
//!
//! ## Perplexity
//!
//! ```text
//! perplexity = exp(loss)
//! ```
//!
//! A model guessing uniformly over V words has perplexity V, so for a
//! vocabulary of 8000 an untrained network starts near 8000 (loss ≈ 8.99).

use crate::error::Result;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::info;

const HEADER: &str = "unix_time,examples_seen,epoch,elapsed_seconds,learning_rate,loss,perplexity";

/// Training progress logger
///
/// # Fields
///
/// - `log_file`: Optional CSV output; `None` logs through `tracing` only
/// - `start_time`: For elapsed time
/// - `last_log_time`: For the time between evaluations
pub struct TrainingLogger {
    log_file: Option<BufWriter<File>>,
    start_time: Instant,
    last_log_time: Instant,
}

impl TrainingLogger {
    /// Create a logger writing CSV rows to `log_path`
    ///
    /// The file is truncated and the header written immediately.
    pub fn new<P: AsRef<Path>>(log_path: P) -> Result<Self> {
        let mut log_file = BufWriter::new(File::create(log_path)?);
        writeln!(log_file, "{}", HEADER)?;
        log_file.flush()?;

        let now = Instant::now();
        Ok(Self {
            log_file: Some(log_file),
            start_time: now,
            last_log_time: now,
        })
    }

    /// Create a logger without a CSV file
    pub fn console_only() -> Self {
        let now = Instant::now();
        Self {
            log_file: None,
            start_time: now,
            last_log_time: now,
        }
    }

    /// Record one loss evaluation
    pub fn log(
        &mut self,
        examples_seen: usize,
        epoch: usize,
        learning_rate: f64,
        loss: f64,
    ) -> Result<()> {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        let perplexity = loss.exp();

        if let Some(file) = self.log_file.as_mut() {
            // A clock before 1970 is logged as 0
            let unix_time = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0);
            writeln!(
                file,
                "{},{},{},{:.2},{:.8},{:.6},{:.4}",
                unix_time, examples_seen, epoch, elapsed, learning_rate, loss, perplexity
            )?;
            // Flush each row so a crashed run keeps its history
            file.flush()?;
        }

        let since_last = self.last_log_time.elapsed().as_secs_f64();
        info!(
            examples_seen,
            epoch,
            elapsed_seconds = elapsed,
            since_last_seconds = since_last,
            learning_rate,
            loss,
            perplexity,
            "Loss evaluated"
        );

        self.last_log_time = Instant::now();
        Ok(())
    }

    /// Report a learning-rate halving
    pub fn log_decay(&self, learning_rate: f64) {
        info!(learning_rate, "Loss increased, learning rate halved");
    }
}
