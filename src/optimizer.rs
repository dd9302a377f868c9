//! Stochastic Gradient Descent
//!
//! The network is trained with plain SGD, one example at a time:
//!
//! ```text
//! grads = bptt(x, y)
//! θ = θ - lr · ∂L/∂θ      for θ in {U, V, W}
//! ```
//!
//! There is no momentum, no weight decay and no gradient clipping. The only
//! adaptive element is the learning-rate schedule in
//! [`decayed_learning_rate`]: the rate is halved whenever an evaluation
//! reports a higher loss than the one before it.
//!
//! ## Example
//!
//! ```rust
//! use cardsmith::{Config, RnnModel};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let config = Config::new(6).with_hidden_dim(4);
//! let mut model = RnnModel::new(&config, &mut StdRng::seed_from_u64(0));
//! let (x, y) = (vec![0, 1, 2], vec![1, 2, 5]);
//!
//! let before = model.sequence_loss(&x, &y);
//! model.sgd_step(&x, &y, 0.005);
//! assert!(model.sequence_loss(&x, &y) < before);
//! ```

use crate::gradients::{compute_grad_norm, RnnGradients};
use crate::model::{Parameter, RnnModel};

/// Factor applied to the learning rate when the loss goes up
pub const DECAY_FACTOR: f64 = 0.5;

/// Apply one SGD update with precomputed gradients
pub fn sgd_update(model: &mut RnnModel, grads: &RnnGradients, learning_rate: f64) {
    for parameter in Parameter::ALL {
        model
            .parameter_mut(parameter)
            .scaled_sub(grads.get(parameter), learning_rate);
    }
}

impl RnnModel {
    /// Backpropagate one example and update the parameters in place
    ///
    /// Returns the L2 norm of the gradients that were applied.
    pub fn sgd_step(&mut self, x: &[usize], y: &[usize], learning_rate: f64) -> f64 {
        let grads = self.bptt(x, y);
        sgd_update(self, &grads, learning_rate);
        compute_grad_norm(&grads)
    }
}

/// Learning rate after the latest evaluation
///
/// `losses` is the evaluation history as `(examples_seen, loss)` pairs, oldest
/// first. The rate is halved when the newest loss is strictly greater than the
/// one recorded before it, and returned unchanged otherwise.
pub fn decayed_learning_rate(losses: &[(usize, f64)], learning_rate: f64) -> f64 {
    match losses {
        [.., (_, previous), (_, latest)] if latest > previous => learning_rate * DECAY_FACTOR,
        _ => learning_rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Config;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_update_moves_against_gradient() {
        let config = Config::new(3).with_hidden_dim(2);
        let mut model = RnnModel::new(&config, &mut StdRng::seed_from_u64(1));
        let before = model.clone();

        let mut grads = RnnGradients::zeros(&config);
        grads.u.data[0] = 2.0;
        grads.w.data[3] = -1.0;
        sgd_update(&mut model, &grads, 0.1);

        assert!((model.u().data[0] - (before.u().data[0] - 0.2)).abs() < 1e-15);
        assert!((model.w().data[3] - (before.w().data[3] + 0.1)).abs() < 1e-15);
        assert_eq!(model.v(), before.v());
        assert_eq!(model.u().data[1..], before.u().data[1..]);
    }

    #[test]
    fn test_repeated_steps_reduce_loss() {
        let config = Config::new(8).with_hidden_dim(5);
        let mut model = RnnModel::new(&config, &mut StdRng::seed_from_u64(42));
        let x = vec![0, 3, 5, 2, 7];
        let y = vec![3, 5, 2, 7, 1];

        let mut previous = model.sequence_loss(&x, &y);
        for step in 0..20 {
            model.sgd_step(&x, &y, 0.005);
            let loss = model.sequence_loss(&x, &y);
            assert!(loss < previous, "step {step}: {loss} >= {previous}");
            previous = loss;
        }
    }

    #[test]
    fn test_step_returns_applied_gradient_norm() {
        let config = Config::new(6).with_hidden_dim(3);
        let mut model = RnnModel::new(&config, &mut StdRng::seed_from_u64(8));
        let (x, y) = (vec![0, 4, 2], vec![4, 2, 1]);

        let expected = compute_grad_norm(&model.bptt(&x, &y));
        assert!(expected > 0.0);
        assert_eq!(model.sgd_step(&x, &y, 0.005), expected);
    }

    #[test]
    fn test_rate_halves_only_when_loss_rises() {
        assert_eq!(decayed_learning_rate(&[], 0.005), 0.005);
        assert_eq!(decayed_learning_rate(&[(0, 3.0)], 0.005), 0.005);
        assert_eq!(decayed_learning_rate(&[(0, 3.0), (10, 2.5)], 0.005), 0.005);
        assert_eq!(decayed_learning_rate(&[(0, 3.0), (10, 3.0)], 0.005), 0.005);
        assert_eq!(decayed_learning_rate(&[(0, 3.0), (10, 3.2)], 0.005), 0.0025);
        // Only the last two evaluations matter
        assert_eq!(decayed_learning_rate(&[(0, 1.0), (10, 3.0), (20, 2.0)], 0.004), 0.004);
    }
}
