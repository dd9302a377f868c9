//! Gradient Accumulators
//!
//! [`RnnGradients`] holds `∂L/∂U`, `∂L/∂V` and `∂L/∂W` for one example. A
//! fresh, zeroed set is created by every BPTT call and owned by it until it
//! is returned; nothing is shared between calls.
//!
//! ## Gradient Norm
//!
//! The L2 norm over all three matrices is a cheap health signal during
//! training:
//!
//! ```text
//! norm = √(Σ dU² + Σ dV² + Σ dW²)
//! ```
//!
//! A norm that grows by orders of magnitude between evaluations is the usual
//! first symptom of exploding gradients in a vanilla RNN. Training here is
//! plain SGD without clipping, so the norm is only reported: `sgd_step`
//! returns it and the trainer logs the largest one of each epoch.

use crate::model::{Config, Parameter};
use crate::tensor::Matrix;

/// Gradients of the loss with respect to each weight matrix
#[derive(Clone, Debug, PartialEq)]
pub struct RnnGradients {
    pub u: Matrix,
    pub v: Matrix,
    pub w: Matrix,
}

impl RnnGradients {
    /// Zeroed accumulators shaped like the parameters of `config`
    pub fn zeros(config: &Config) -> Self {
        let shape = |p| config.shape_of(p);
        let (u_rows, u_cols) = shape(Parameter::U);
        let (v_rows, v_cols) = shape(Parameter::V);
        let (w_rows, w_cols) = shape(Parameter::W);
        Self {
            u: Matrix::zeros(u_rows, u_cols),
            v: Matrix::zeros(v_rows, v_cols),
            w: Matrix::zeros(w_rows, w_cols),
        }
    }

    pub fn get(&self, parameter: Parameter) -> &Matrix {
        match parameter {
            Parameter::U => &self.u,
            Parameter::V => &self.v,
            Parameter::W => &self.w,
        }
    }
}

/// Compute the L2 norm of all gradients
///
/// # Example
///
/// ```rust
/// use cardsmith::{compute_grad_norm, Config, RnnGradients};
///
/// let mut grads = RnnGradients::zeros(&Config::new(2).with_hidden_dim(1));
/// grads.w.data[0] = 3.0;
/// grads.v.data[1] = 4.0;
/// assert_eq!(compute_grad_norm(&grads), 5.0);
/// ```
pub fn compute_grad_norm(grads: &RnnGradients) -> f64 {
    Parameter::ALL
        .iter()
        .map(|&p| grads.get(p).sum_of_squares())
        .sum::<f64>()
        .sqrt()
}
