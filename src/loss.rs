//! Cross-Entropy Loss
//!
//! The training objective is the negative log-likelihood of each true next
//! token under the model's predicted distribution:
//!
//! ```text
//! L(x, y) = -Σ_t ln o_t[y_t]
//! total_loss(X, Y) = Σ_i L(x_i, y_i)
//! mean_loss(X, Y)  = total_loss(X, Y) / Σ_i |y_i|
//! ```
//!
//! `mean_loss` is the per-token cross-entropy the trainer watches. Its
//! exponential is the perplexity that [`crate::TrainingLogger`] records.
//!
//! ## Reference Point
//!
//! A model that predicts uniformly over `V` tokens has a per-token loss of
//! `ln V`. A freshly initialized model should start close to this, which
//! makes [`random_baseline_loss`] a quick sanity check before training.
//!
//! ## Parallelism
//!
//! Examples are independent, so their losses are computed in parallel with
//! Rayon over an immutable borrow of the model. The per-example values are
//! collected in order and summed sequentially, so the total is the same
//! number a single-threaded loop produces.

use crate::model::RnnModel;
use rayon::prelude::*;

/// Expected per-token loss of uniform predictions over `vocab_size` tokens
pub fn random_baseline_loss(vocab_size: usize) -> f64 {
    (vocab_size as f64).ln()
}

impl RnnModel {
    /// Negative log-likelihood of one example, summed over its steps
    pub fn sequence_loss(&self, x: &[usize], y: &[usize]) -> f64 {
        let pass = self.forward(x);
        -pass
            .outputs()
            .iter()
            .zip(y)
            .map(|(o, &target)| o[target].ln())
            .sum::<f64>()
    }

    /// Summed loss over a set of examples
    ///
    /// # Panics
    ///
    /// Panics if `inputs` and `targets` have different lengths
    pub fn total_loss(&self, inputs: &[Vec<usize>], targets: &[Vec<usize>]) -> f64 {
        assert_eq!(
            inputs.len(),
            targets.len(),
            "Every input sequence needs a target sequence"
        );

        let per_example: Vec<f64> = inputs
            .par_iter()
            .zip(targets.par_iter())
            .map(|(x, y)| self.sequence_loss(x, y))
            .collect();

        per_example.iter().sum()
    }

    /// Mean per-token loss over a set of examples
    ///
    /// Returns 0.0 when there are no target tokens at all.
    pub fn mean_loss(&self, inputs: &[Vec<usize>], targets: &[Vec<usize>]) -> f64 {
        let num_tokens: usize = targets.iter().map(Vec::len).sum();
        if num_tokens == 0 {
            return 0.0;
        }
        self.total_loss(inputs, targets) / num_tokens as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Config;
    use crate::tensor::Matrix;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// vocab 2, hidden 1, hand-picked weights
    fn toy_model() -> RnnModel {
        RnnModel::from_parameters(
            Config::new(2).with_hidden_dim(1),
            Matrix::new(vec![0.5, -0.3], 1, 2),
            Matrix::new(vec![1.0, -1.0], 2, 1),
            Matrix::new(vec![0.2], 1, 1),
        )
        .unwrap()
    }

    #[test]
    fn test_toy_model_matches_closed_form() {
        let model = toy_model();
        let x = vec![0, 1];
        let y = vec![1, 0];

        // Step 0: s0 = tanh(0.5), logits = [s0, -s0]
        let s0 = 0.5_f64.tanh();
        let p0 = (-s0).exp() / (s0.exp() + (-s0).exp());
        // Step 1: s1 = tanh(-0.3 + 0.2·s0), target 0
        let s1 = (-0.3 + 0.2 * s0).tanh();
        let p1 = s1.exp() / (s1.exp() + (-s1).exp());
        let expected = -p0.ln() - p1.ln();

        let loss = model.total_loss(&[x.clone()], &[y.clone()]);
        assert!((loss - expected).abs() < 1e-12, "{loss} vs {expected}");
        assert!((model.mean_loss(&[x], &[y]) - expected / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_total_is_sum_of_sequences() {
        let config = Config::new(6).with_hidden_dim(3);
        let model = RnnModel::new(&config, &mut StdRng::seed_from_u64(8));
        let inputs = vec![vec![0, 1, 2], vec![3, 4], vec![5]];
        let targets = vec![vec![1, 2, 3], vec![4, 5], vec![0]];

        let serial: f64 = inputs
            .iter()
            .zip(&targets)
            .map(|(x, y)| model.sequence_loss(x, y))
            .sum();
        assert_eq!(model.total_loss(&inputs, &targets), serial);
    }

    #[test]
    fn test_fresh_model_is_near_random_baseline() {
        let vocab_size = 50;
        let config = Config::new(vocab_size).with_hidden_dim(10);
        let model = RnnModel::new(&config, &mut StdRng::seed_from_u64(15));
        let inputs = vec![(0..20).collect::<Vec<usize>>()];
        let targets = vec![(1..21).collect::<Vec<usize>>()];

        let loss = model.mean_loss(&inputs, &targets);
        let baseline = random_baseline_loss(vocab_size);
        assert!((loss - baseline).abs() < 0.5, "{loss} vs {baseline}");
    }

    #[test]
    fn test_mean_loss_of_nothing_is_zero() {
        let model = toy_model();
        assert_eq!(model.mean_loss(&[], &[]), 0.0);
        assert_eq!(model.mean_loss(&[vec![]], &[vec![]]), 0.0);
    }
}
