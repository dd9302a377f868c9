//! Recurrent Network Parameters
//!
//! This module holds the parameter store of a vanilla (Elman) recurrent
//! network: three weight matrices and the hyperparameters that fix their
//! shapes.
//!
//! ## Architecture Overview
//!
//! ```text
//! token x_t (index into vocabulary)
//!     ↓
//! U[:, x_t]           input → hidden       [hidden_dim × vocab_size]
//!     + W · s_{t-1}   hidden → hidden      [hidden_dim × hidden_dim]
//!     ↓
//! s_t = tanh(...)     hidden state (s_{-1} = 0)
//!     ↓
//! V · s_t             hidden → logits      [vocab_size × hidden_dim]
//!     ↓
//! o_t = softmax(...)  next-token distribution
//! ```
//!
//! There are no biases, no embeddings separate from U, and no gating: the
//! whole model is `{U, V, W}`.
//!
//! ## Initialization
//!
//! Each matrix is drawn uniformly from `[-1/√n, 1/√n)` where `n` is the
//! fan-in of the matrix (vocab_size for U, hidden_dim for V and W). The
//! random source is passed in, so the same seed always gives the same model.
//!
//! ## Example
//!
//! ```rust
//! use cardsmith::{Config, RnnModel};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let config = Config::new(8000).with_hidden_dim(100);
//! let mut rng = StdRng::seed_from_u64(10);
//! let model = RnnModel::new(&config, &mut rng);
//! assert_eq!(model.u().shape(), (100, 8000));
//! ```

use crate::error::{Error, Result};
use crate::tensor::Matrix;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Model hyperparameters
///
/// These are the values needed to rebuild a model from its matrices, and
/// they travel inside every checkpoint.
///
/// # Fields
///
/// - `vocab_size`: Number of tokens in the vocabulary
/// - `hidden_dim`: Width of the recurrent hidden state
/// - `bptt_truncate`: How many steps back each error signal is propagated
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub vocab_size: usize,
    pub hidden_dim: usize,
    pub bptt_truncate: usize,
}

impl Config {
    /// Default hidden width of the greeting-card model
    pub const DEFAULT_HIDDEN_DIM: usize = 80;
    /// Default truncation depth for backpropagation through time
    pub const DEFAULT_BPTT_TRUNCATE: usize = 4;

    /// Create a configuration with the default hidden width and truncation
    ///
    /// # Arguments
    ///
    /// * `vocab_size` - Size of vocabulary (from [`crate::Vocabulary::len`])
    pub fn new(vocab_size: usize) -> Self {
        Self {
            vocab_size,
            hidden_dim: Self::DEFAULT_HIDDEN_DIM,
            bptt_truncate: Self::DEFAULT_BPTT_TRUNCATE,
        }
    }

    pub fn with_hidden_dim(mut self, hidden_dim: usize) -> Self {
        self.hidden_dim = hidden_dim;
        self
    }

    pub fn with_bptt_truncate(mut self, bptt_truncate: usize) -> Self {
        self.bptt_truncate = bptt_truncate;
        self
    }

    /// Expected `(rows, cols)` of a parameter matrix
    pub fn shape_of(&self, parameter: Parameter) -> (usize, usize) {
        match parameter {
            Parameter::U => (self.hidden_dim, self.vocab_size),
            Parameter::V => (self.vocab_size, self.hidden_dim),
            Parameter::W => (self.hidden_dim, self.hidden_dim),
        }
    }

    /// Total number of trainable scalars
    ///
    /// ```text
    /// 2 × vocab_size × hidden_dim + hidden_dim²
    /// ```
    pub fn count_parameters(&self) -> usize {
        Parameter::ALL
            .iter()
            .map(|&p| {
                let (rows, cols) = self.shape_of(p);
                rows * cols
            })
            .sum()
    }
}

/// Names the three weight matrices
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Parameter {
    /// Input to hidden
    U,
    /// Hidden to output
    V,
    /// Hidden to hidden
    W,
}

impl Parameter {
    /// All parameters in checkpoint and gradient-check order
    pub const ALL: [Parameter; 3] = [Parameter::U, Parameter::V, Parameter::W];

    pub fn name(self) -> &'static str {
        match self {
            Parameter::U => "U",
            Parameter::V => "V",
            Parameter::W => "W",
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A vanilla recurrent network: the parameter store
///
/// Read access is open to everyone; mutation goes through
/// [`RnnModel::parameter_mut`], which the optimizer and the gradient
/// checker's private probe copy use.
#[derive(Clone, Debug, PartialEq)]
pub struct RnnModel {
    pub(crate) u: Matrix,
    pub(crate) v: Matrix,
    pub(crate) w: Matrix,
    pub(crate) config: Config,
}

impl RnnModel {
    /// Create a randomly initialized model
    ///
    /// U, V and W are drawn in that order, each row-major.
    ///
    /// # Panics
    ///
    /// Panics if `vocab_size` or `hidden_dim` is zero
    pub fn new<R: Rng + ?Sized>(config: &Config, rng: &mut R) -> Self {
        assert!(config.vocab_size > 0, "vocab_size must be positive");
        assert!(config.hidden_dim > 0, "hidden_dim must be positive");

        let input_bound = (1.0 / config.vocab_size as f64).sqrt();
        let hidden_bound = (1.0 / config.hidden_dim as f64).sqrt();

        let (u_rows, u_cols) = config.shape_of(Parameter::U);
        let u = Matrix::random_uniform(u_rows, u_cols, input_bound, rng);
        let (v_rows, v_cols) = config.shape_of(Parameter::V);
        let v = Matrix::random_uniform(v_rows, v_cols, hidden_bound, rng);
        let (w_rows, w_cols) = config.shape_of(Parameter::W);
        let w = Matrix::random_uniform(w_rows, w_cols, hidden_bound, rng);

        Self {
            u,
            v,
            w,
            config: config.clone(),
        }
    }

    /// Assemble a model from existing matrices
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShapeMismatch`] if any matrix does not have the shape
    /// `config` implies.
    pub fn from_parameters(config: Config, u: Matrix, v: Matrix, w: Matrix) -> Result<Self> {
        for (parameter, matrix) in Parameter::ALL.iter().zip([&u, &v, &w]) {
            let expected = config.shape_of(*parameter);
            if matrix.shape() != expected {
                return Err(Error::ShapeMismatch {
                    parameter: parameter.name(),
                    expected,
                    found: matrix.shape(),
                });
            }
        }
        Ok(Self { u, v, w, config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn vocab_size(&self) -> usize {
        self.config.vocab_size
    }

    pub fn hidden_dim(&self) -> usize {
        self.config.hidden_dim
    }

    pub fn bptt_truncate(&self) -> usize {
        self.config.bptt_truncate
    }

    /// Input-to-hidden weights `[hidden_dim × vocab_size]`
    pub fn u(&self) -> &Matrix {
        &self.u
    }

    /// Hidden-to-output weights `[vocab_size × hidden_dim]`
    pub fn v(&self) -> &Matrix {
        &self.v
    }

    /// Recurrent weights `[hidden_dim × hidden_dim]`
    pub fn w(&self) -> &Matrix {
        &self.w
    }

    pub fn parameter(&self, parameter: Parameter) -> &Matrix {
        match parameter {
            Parameter::U => &self.u,
            Parameter::V => &self.v,
            Parameter::W => &self.w,
        }
    }

    pub fn parameter_mut(&mut self, parameter: Parameter) -> &mut Matrix {
        match parameter {
            Parameter::U => &mut self.u,
            Parameter::V => &mut self.v,
            Parameter::W => &mut self.w,
        }
    }

    pub fn count_parameters(&self) -> usize {
        self.config.count_parameters()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_shapes_follow_config() {
        let config = Config::new(7).with_hidden_dim(3);
        let mut rng = StdRng::seed_from_u64(1);
        let model = RnnModel::new(&config, &mut rng);

        assert_eq!(model.u().shape(), (3, 7));
        assert_eq!(model.v().shape(), (7, 3));
        assert_eq!(model.w().shape(), (3, 3));
        assert_eq!(model.count_parameters(), 2 * 7 * 3 + 9);
    }

    #[test]
    fn test_initialization_respects_fan_in_bounds() {
        let config = Config::new(16).with_hidden_dim(4);
        let mut rng = StdRng::seed_from_u64(2);
        let model = RnnModel::new(&config, &mut rng);

        let input_bound = 0.25; // 1/√16
        let hidden_bound = 0.5; // 1/√4
        assert!(model.u().data.iter().all(|v| v.abs() <= input_bound));
        assert!(model.v().data.iter().all(|v| v.abs() <= hidden_bound));
        assert!(model.w().data.iter().all(|v| v.abs() <= hidden_bound));
    }

    #[test]
    fn test_same_seed_same_model() {
        let config = Config::new(5).with_hidden_dim(2);
        let a = RnnModel::new(&config, &mut StdRng::seed_from_u64(3));
        let b = RnnModel::new(&config, &mut StdRng::seed_from_u64(3));
        let c = RnnModel::new(&config, &mut StdRng::seed_from_u64(4));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_from_parameters_rejects_bad_shape() {
        let config = Config::new(3).with_hidden_dim(2);
        let err = RnnModel::from_parameters(
            config,
            Matrix::zeros(2, 3),
            Matrix::zeros(3, 2),
            Matrix::zeros(2, 3),
        )
        .unwrap_err();

        match err {
            Error::ShapeMismatch {
                parameter,
                expected,
                found,
            } => {
                assert_eq!(parameter, "W");
                assert_eq!(expected, (2, 2));
                assert_eq!(found, (2, 3));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parameter_names() {
        let names: Vec<String> = Parameter::ALL.iter().map(|p| p.to_string()).collect();
        assert_eq!(names, vec!["U", "V", "W"]);
    }
}
