//! Truncated Backpropagation Through Time
//!
//! This module computes the analytic gradient of one example's loss with
//! respect to U, V and W.
//!
//! ## Unrolling
//!
//! A recurrent network applied to a sequence is a deep feed-forward network
//! with one layer per time step, all sharing the same weights. BPTT runs
//! ordinary backpropagation through that unrolled graph and sums the
//! per-step contributions into each shared matrix.
//!
//! ## Algorithm
//!
//! ```text
//! forward pass → o_t, s_t
//! for t = T-1 down to 0:
//!     δo      = o_t - onehot(y_t)               ∂L/∂logits (softmax + CE)
//!     dV     += δo ⊗ s_t
//!     δ       = (Vᵀ · δo) ⊙ (1 - s_t²)         into the pre-activation at t
//!     for k = t down to max(0, t - truncate):
//!         dW       += δ ⊗ s_{k-1}
//!         dU[:, x_k] += δ
//!         δ         = (Wᵀ · δ) ⊙ (1 - s_{k-1}²)  one step further back
//! ```
//!
//! ## Truncation
//!
//! Full BPTT costs O(T²) per example and, in a tanh network, the signal
//! shrinks geometrically on the way back anyway. `bptt_truncate` caps how
//! many steps each output's error travels: the inner loop visits at most
//! `truncate + 1` steps. With `truncate >= T - 1` the result is the exact
//! gradient, which is what the gradient checker compares against.

use crate::gradients::RnnGradients;
use crate::layers::tanh_backward;
use crate::model::RnnModel;

impl RnnModel {
    /// Gradients of `sequence_loss(x, y)` by truncated BPTT
    ///
    /// # Arguments
    ///
    /// * `x` - Input token indices
    /// * `y` - Target token indices, one per input
    ///
    /// # Panics
    ///
    /// Panics if `x` and `y` differ in length or hold an index
    /// `>= vocab_size`
    pub fn bptt(&self, x: &[usize], y: &[usize]) -> RnnGradients {
        assert_eq!(x.len(), y.len(), "Inputs and targets must have equal length");

        let pass = self.forward(x);
        let mut grads = RnnGradients::zeros(&self.config);

        for t in (0..y.len()).rev() {
            let mut delta_out = pass.output(t).to_vec();
            delta_out[y[t]] -= 1.0;

            grads.v.add_outer(&delta_out, pass.hidden(t));

            let mut delta = tanh_backward(&self.v.transpose_matvec(&delta_out), pass.hidden(t));

            let earliest = t.saturating_sub(self.config.bptt_truncate);
            for step in (earliest..=t).rev() {
                let previous = pass.previous_hidden(step);
                grads.w.add_outer(&delta, previous);
                grads.u.add_to_column(x[step], &delta);
                delta = tanh_backward(&self.w.transpose_matvec(&delta), previous);
            }
        }

        grads
    }
}
