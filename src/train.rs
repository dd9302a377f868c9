//! Training Loop
//!
//! Plain per-example SGD over a fixed training set:
//!
//! ```text
//! for epoch in 0..num_epochs:
//!     if epoch % eval_interval == 0:
//!         loss = mean_loss(X, Y)          record, log, checkpoint
//!         halve lr if loss went up since the last evaluation
//!     for (x, y) in (X, Y):               same order every epoch
//!         sgd_step(x, y, lr)
//! ```
//!
//! Evaluation happens at the *start* of an epoch, so the first recorded loss
//! is that of the untrained model and the last epoch's updates are never
//! evaluated by this loop.
//!
//! ## Resuming
//!
//! [`TrainingState`] is everything the loop carries between epochs. It is
//! stored in every checkpoint, and [`Trainer::resume_from`] picks a run up
//! where the checkpoint left it: same learning rate, same loss history, same
//! example count.
//!
//! ## Example
//!
//! ```rust,no_run
//! use cardsmith::{Config, RnnModel, Trainer, TrainingConfig};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! # let (inputs, targets): (Vec<Vec<usize>>, Vec<Vec<usize>>) = (vec![], vec![]);
//! let mut model = RnnModel::new(&Config::new(8000), &mut StdRng::seed_from_u64(10));
//! let config = TrainingConfig {
//!     checkpoint_path: Some("model.ckpt".into()),
//!     ..TrainingConfig::default()
//! };
//! let report = Trainer::new(config)?.train(&mut model, &inputs, &targets)?;
//! println!("final learning rate {}", report.learning_rate);
//! # Ok::<(), cardsmith::Error>(())
//! ```

use crate::checkpoint::save_snapshot;
use crate::error::{Error, Result};
use crate::model::RnnModel;
use crate::optimizer::decayed_learning_rate;
use crate::training_logger::TrainingLogger;
use crate::vocab::Vocabulary;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Training hyperparameters
#[derive(Clone, Debug, PartialEq)]
pub struct TrainingConfig {
    /// Initial SGD step size
    pub learning_rate: f64,
    /// Passes over the training set in this run
    pub num_epochs: usize,
    /// Evaluate the loss every this many epochs
    pub eval_interval: usize,
    /// Snapshot written at every evaluation, if set
    pub checkpoint_path: Option<PathBuf>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.005,
            num_epochs: 100,
            eval_interval: 5,
            checkpoint_path: None,
        }
    }
}

impl TrainingConfig {
    /// Reject settings that cannot produce a meaningful run
    pub fn validate(&self) -> Result<()> {
        if self.eval_interval == 0 {
            return Err(Error::InvalidConfig("eval_interval must be at least 1".into()));
        }
        validate_learning_rate(self.learning_rate)
    }
}

fn validate_learning_rate(learning_rate: f64) -> Result<()> {
    if !(learning_rate.is_finite() && learning_rate > 0.0) {
        return Err(Error::InvalidConfig(format!(
            "learning_rate must be positive and finite, got {}",
            learning_rate
        )));
    }
    Ok(())
}

/// Progress carried from one epoch to the next
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingState {
    /// SGD steps taken
    pub examples_seen: usize,
    /// Epochs completed
    pub epoch: usize,
    /// Rate for the next SGD step
    pub learning_rate: f64,
    /// `(examples_seen, mean loss)` at each evaluation, oldest first
    #[serde(with = "loss_bits")]
    pub loss_history: Vec<(usize, f64)>,
}

/// Losses as raw `f64` bits; JSON has no NaN or infinity
mod loss_bits {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        history: &[(usize, f64)],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        history
            .iter()
            .map(|&(seen, loss)| (seen, loss.to_bits()))
            .collect::<Vec<_>>()
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<(usize, f64)>, D::Error> {
        let bits = Vec::<(usize, u64)>::deserialize(deserializer)?;
        Ok(bits
            .into_iter()
            .map(|(seen, loss)| (seen, f64::from_bits(loss)))
            .collect())
    }
}

/// Summary of a finished [`Trainer::train`] call
#[derive(Clone, Debug, PartialEq)]
pub struct TrainingReport {
    /// Epochs run by this call
    pub epochs: usize,
    pub examples_seen: usize,
    /// Rate in effect when training stopped
    pub learning_rate: f64,
    /// Number of times the rate was halved during this call
    pub decays: usize,
    /// Largest per-example gradient norm seen during this call
    pub max_grad_norm: f64,
    pub loss_history: Vec<(usize, f64)>,
}

/// Runs SGD epochs over a model
pub struct Trainer {
    config: TrainingConfig,
    state: TrainingState,
    logger: TrainingLogger,
    vocabulary: Option<Vocabulary>,
    resumed: bool,
}

impl Trainer {
    /// Create a trainer for a fresh run
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `config` fails
    /// [`TrainingConfig::validate`].
    pub fn new(config: TrainingConfig) -> Result<Self> {
        config.validate()?;
        let state = TrainingState {
            learning_rate: config.learning_rate,
            ..TrainingState::default()
        };
        Ok(Self {
            config,
            state,
            logger: TrainingLogger::console_only(),
            vocabulary: None,
            resumed: false,
        })
    }

    pub fn with_logger(mut self, logger: TrainingLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Store `vocabulary` in every checkpoint this trainer writes
    pub fn with_vocabulary(mut self, vocabulary: Vocabulary) -> Self {
        self.vocabulary = Some(vocabulary);
        self
    }

    /// Continue from a saved state instead of starting over
    ///
    /// The saved learning rate replaces the configured one.
    pub fn resume_from(mut self, state: TrainingState) -> Result<Self> {
        validate_learning_rate(state.learning_rate)?;
        self.state = state;
        self.resumed = true;
        Ok(self)
    }

    pub fn state(&self) -> &TrainingState {
        &self.state
    }

    pub fn learning_rate(&self) -> f64 {
        self.state.learning_rate
    }

    pub fn loss_history(&self) -> &[(usize, f64)] {
        &self.state.loss_history
    }

    /// Train `model` for `num_epochs` epochs on `(inputs[i], targets[i])`
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `inputs` and `targets` differ in
    /// length, and any I/O error from logging or checkpointing.
    pub fn train(
        &mut self,
        model: &mut RnnModel,
        inputs: &[Vec<usize>],
        targets: &[Vec<usize>],
    ) -> Result<TrainingReport> {
        if inputs.len() != targets.len() {
            return Err(Error::InvalidConfig(format!(
                "{} input sequences but {} target sequences",
                inputs.len(),
                targets.len()
            )));
        }

        info!(
            examples = inputs.len(),
            parameters = model.count_parameters(),
            epochs = self.config.num_epochs,
            start_epoch = self.state.epoch,
            learning_rate = self.state.learning_rate,
            "Starting training"
        );

        let start = Instant::now();
        let first_epoch = self.state.epoch;
        let skip_first = std::mem::take(&mut self.resumed) && self.checkpoint_is_current();
        let mut decays = 0;
        let mut max_grad_norm = 0.0f64;

        for epoch in first_epoch..first_epoch + self.config.num_epochs {
            let already_evaluated = skip_first && epoch == first_epoch;
            if epoch % self.config.eval_interval == 0
                && !already_evaluated
                && self.evaluate(model, inputs, targets)?
            {
                decays += 1;
            }

            let epoch_start = Instant::now();
            let mut epoch_grad_norm = 0.0f64;
            for (x, y) in inputs.iter().zip(targets) {
                let grad_norm = model.sgd_step(x, y, self.state.learning_rate);
                epoch_grad_norm = epoch_grad_norm.max(grad_norm);
                self.state.examples_seen += 1;
            }
            max_grad_norm = max_grad_norm.max(epoch_grad_norm);
            self.state.epoch = epoch + 1;
            debug!(
                epoch,
                max_grad_norm = epoch_grad_norm,
                seconds = epoch_start.elapsed().as_secs_f64(),
                "Epoch complete"
            );
        }

        info!(
            epochs = self.config.num_epochs,
            examples_seen = self.state.examples_seen,
            max_grad_norm,
            seconds = start.elapsed().as_secs_f64(),
            "Training finished"
        );

        Ok(TrainingReport {
            epochs: self.config.num_epochs,
            examples_seen: self.state.examples_seen,
            learning_rate: self.state.learning_rate,
            decays,
            max_grad_norm,
            loss_history: self.state.loss_history.clone(),
        })
    }

    /// The restored history already holds the loss of the current weights
    fn checkpoint_is_current(&self) -> bool {
        self.state
            .loss_history
            .last()
            .is_some_and(|&(seen, _)| seen == self.state.examples_seen)
    }

    /// Record the loss, adapt the rate and checkpoint; true if the rate was halved
    fn evaluate(
        &mut self,
        model: &RnnModel,
        inputs: &[Vec<usize>],
        targets: &[Vec<usize>],
    ) -> Result<bool> {
        let loss = model.mean_loss(inputs, targets);
        if !loss.is_finite() {
            warn!(loss, "Loss is not finite; training has diverged");
        }
        self.state
            .loss_history
            .push((self.state.examples_seen, loss));

        let previous_rate = self.state.learning_rate;
        self.state.learning_rate = decayed_learning_rate(&self.state.loss_history, previous_rate);
        let decayed = self.state.learning_rate != previous_rate;

        self.logger.log(
            self.state.examples_seen,
            self.state.epoch,
            self.state.learning_rate,
            loss,
        )?;
        if decayed {
            self.logger.log_decay(self.state.learning_rate);
        }

        if let Some(path) = &self.config.checkpoint_path {
            save_snapshot(path, model, self.vocabulary.as_ref(), &self.state)?;
        }
        Ok(decayed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::Checkpoint;
    use crate::model::Config;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::fs;

    fn dataset() -> (Vec<Vec<usize>>, Vec<Vec<usize>>) {
        let messages = [vec![0, 2, 3, 1], vec![0, 4, 2, 5, 1], vec![0, 3, 1]];
        messages
            .iter()
            .map(|m| (m[..m.len() - 1].to_vec(), m[1..].to_vec()))
            .unzip()
    }

    fn model(seed: u64) -> RnnModel {
        let config = Config::new(6).with_hidden_dim(4);
        RnnModel::new(&config, &mut StdRng::seed_from_u64(seed))
    }

    fn config(learning_rate: f64, num_epochs: usize, eval_interval: usize) -> TrainingConfig {
        TrainingConfig {
            learning_rate,
            num_epochs,
            eval_interval,
            checkpoint_path: None,
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(matches!(Trainer::new(config(0.01, 1, 0)), Err(Error::InvalidConfig(_))));
        assert!(matches!(Trainer::new(config(0.0, 1, 1)), Err(Error::InvalidConfig(_))));
        assert!(matches!(Trainer::new(config(-0.1, 1, 1)), Err(Error::InvalidConfig(_))));
        assert!(matches!(Trainer::new(config(f64::NAN, 1, 1)), Err(Error::InvalidConfig(_))));

        let mut trainer = Trainer::new(config(0.01, 1, 1)).unwrap();
        let mut m = model(0);
        let before = m.clone();
        let result = trainer.train(&mut m, &[vec![0]], &[]);
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
        assert_eq!(m, before);
    }

    #[test]
    fn test_evaluates_at_interval_starts() {
        let (x, y) = dataset();
        let mut m = model(1);
        let initial_loss = m.mean_loss(&x, &y);

        let mut trainer = Trainer::new(config(0.005, 5, 2)).unwrap();
        let report = trainer.train(&mut m, &x, &y).unwrap();

        let seen: Vec<usize> = report.loss_history.iter().map(|&(s, _)| s).collect();
        assert_eq!(seen, vec![0, 6, 12]);
        assert_eq!(report.loss_history[0].1, initial_loss);
        assert_eq!(report.examples_seen, 15);
        assert_eq!(trainer.state().epoch, 5);
    }

    #[test]
    fn test_learning_rate_follows_loss_history() {
        // A large rate makes the loss bounce, so both branches get exercised
        for learning_rate in [0.005, 2.0] {
            let (x, y) = dataset();
            let mut m = model(2);
            let mut trainer = Trainer::new(config(learning_rate, 12, 1)).unwrap();
            let report = trainer.train(&mut m, &x, &y).unwrap();

            let mut expected = learning_rate;
            let mut decays = 0;
            for k in 1..report.loss_history.len() {
                let (_, previous) = report.loss_history[k - 1];
                let (_, latest) = report.loss_history[k];
                if latest > previous {
                    expected *= 0.5;
                    decays += 1;
                }
            }
            assert_eq!(report.learning_rate, expected);
            assert_eq!(report.decays, decays);
            if learning_rate == 2.0 {
                assert!(report.decays > 0, "{:?}", report.loss_history);
                assert!(report.learning_rate < learning_rate);
            }
        }
    }

    #[test]
    fn test_every_interval_evaluated_without_progress() {
        let mut m = model(5);
        let mut trainer = Trainer::new(config(0.005, 4, 1)).unwrap();
        let report = trainer.train(&mut m, &[], &[]).unwrap();

        let seen: Vec<usize> = report.loss_history.iter().map(|&(s, _)| s).collect();
        assert_eq!(seen, vec![0, 0, 0, 0]);
        assert_eq!(report.max_grad_norm, 0.0);
        assert_eq!(trainer.state().epoch, 4);
    }

    #[test]
    fn test_reports_gradient_norm() {
        let (x, y) = dataset();
        let mut m = model(6);
        let mut trainer = Trainer::new(config(0.005, 2, 1)).unwrap();
        let report = trainer.train(&mut m, &x, &y).unwrap();
        assert!(report.max_grad_norm > 0.0 && report.max_grad_norm.is_finite());
    }

    #[test]
    fn test_state_keeps_non_finite_losses() {
        let state = TrainingState {
            examples_seen: 9,
            epoch: 3,
            learning_rate: 0.0025,
            loss_history: vec![(0, 1.3), (3, f64::INFINITY), (6, f64::NAN)],
        };
        let json = serde_json::to_string(&state).unwrap();
        let back: TrainingState = serde_json::from_str(&json).unwrap();

        let bits = |s: &TrainingState| -> Vec<(usize, u64)> {
            s.loss_history.iter().map(|&(n, l)| (n, l.to_bits())).collect()
        };
        assert_eq!(bits(&back), bits(&state));
        assert_eq!(back.learning_rate, state.learning_rate);
    }

    #[test]
    fn test_loss_decreases_with_small_rate() {
        let (x, y) = dataset();
        let mut m = model(3);
        let mut trainer = Trainer::new(config(0.005, 10, 1)).unwrap();
        let report = trainer.train(&mut m, &x, &y).unwrap();

        let losses: Vec<f64> = report.loss_history.iter().map(|&(_, l)| l).collect();
        assert!(losses.windows(2).all(|w| w[1] < w[0]), "{losses:?}");
        assert_eq!(report.decays, 0);
        assert_eq!(report.learning_rate, 0.005);
    }

    #[test]
    fn test_checkpoint_and_resume() {
        let path =
            std::env::temp_dir().join(format!("cardsmith_train_{}.ckpt", std::process::id()));
        let (x, y) = dataset();
        let mut m = model(4);

        let mut trainer = Trainer::new(TrainingConfig {
            checkpoint_path: Some(path.clone()),
            ..config(0.005, 3, 2)
        })
        .unwrap();
        trainer.train(&mut m, &x, &y).unwrap();

        // Last evaluation ran at the start of epoch 2, before its updates
        let saved = Checkpoint::load(&path).unwrap();
        assert_eq!(saved.state.epoch, 2);
        assert_eq!(saved.state.examples_seen, 6);
        assert_eq!(saved.state.loss_history.len(), 2);
        assert!(saved.vocabulary.is_none());

        let mut resumed_model = saved.model.clone();
        let mut resumed = Trainer::new(config(0.005, 2, 2))
            .unwrap()
            .resume_from(saved.state.clone())
            .unwrap();
        let report = resumed.train(&mut resumed_model, &x, &y).unwrap();

        // Epoch 2 is not evaluated again; epoch 3 is not an interval start
        assert_eq!(report.loss_history.len(), 2);
        assert_eq!(report.examples_seen, 12);
        assert_eq!(resumed.state().epoch, 4);

        // Only the first epoch after a resume is skipped
        let report = resumed.train(&mut resumed_model, &x, &y).unwrap();
        let seen: Vec<usize> = report.loss_history.iter().map(|&(s, _)| s).collect();
        assert_eq!(seen, vec![0, 6, 12]);

        fs::remove_file(&path).unwrap();
    }
}
