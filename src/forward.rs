//! Forward Pass
//!
//! Runs the recurrence over one token sequence and keeps everything the
//! backward pass needs:
//!
//! ```text
//! s_{-1} = 0
//! for t in 0..T:
//!     s_t = tanh(U[:, x_t] + W · s_{t-1})
//!     o_t = softmax(V · s_t)
//! ```
//!
//! Every sequence starts from a zero hidden state; nothing carries over from
//! one call to the next. The pass is deterministic given the parameters.
//!
//! The result, [`ForwardPass`], doubles as the cache for BPTT: the output
//! distributions give the loss gradient at the logits, and the hidden states
//! give the tanh derivatives.

use crate::layers::{softmax, tanh_forward};
use crate::model::RnnModel;

/// Hidden and output trajectories of one forward pass
///
/// Hidden states are stored with the initial zero state in front, so
/// `hidden(t)` is `s_t` and `previous_hidden(t)` is `s_{t-1}` for every `t`,
/// including `t = 0`.
#[derive(Clone, Debug)]
pub struct ForwardPass {
    outputs: Vec<Vec<f64>>,
    hidden: Vec<Vec<f64>>,
}

impl ForwardPass {
    /// Number of time steps
    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Output distribution `o_t`
    pub fn output(&self, t: usize) -> &[f64] {
        &self.outputs[t]
    }

    /// All output distributions, one per step
    pub fn outputs(&self) -> &[Vec<f64>] {
        &self.outputs
    }

    /// Distribution after the final token, if any token was consumed
    pub fn last_output(&self) -> Option<&[f64]> {
        self.outputs.last().map(Vec::as_slice)
    }

    /// Hidden state `s_t`
    pub fn hidden(&self, t: usize) -> &[f64] {
        &self.hidden[t + 1]
    }

    /// Hidden state `s_{t-1}`; the zero vector when `t == 0`
    pub fn previous_hidden(&self, t: usize) -> &[f64] {
        &self.hidden[t]
    }
}

impl RnnModel {
    /// Run the network over `x`
    ///
    /// # Panics
    ///
    /// Panics if any token index is `>= vocab_size`
    pub fn forward(&self, x: &[usize]) -> ForwardPass {
        let hidden_dim = self.config.hidden_dim;

        let mut hidden = Vec::with_capacity(x.len() + 1);
        hidden.push(vec![0.0; hidden_dim]);
        let mut outputs = Vec::with_capacity(x.len());

        for &token in x {
            let recurrent = self.w.matvec(&hidden[hidden.len() - 1]);
            let pre_activation: Vec<f64> = self
                .u
                .column(token)
                .into_iter()
                .zip(recurrent)
                .map(|(a, b)| a + b)
                .collect();
            let state = tanh_forward(&pre_activation);

            outputs.push(softmax(&self.v.matvec(&state), 1.0));
            hidden.push(state);
        }

        ForwardPass { outputs, hidden }
    }

    /// Greedy next-token estimate at every step
    ///
    /// Returns the index of the most probable token after each prefix of
    /// `x`; ties go to the lowest index. This is a diagnostic, not how new
    /// messages are sampled (see [`crate::generate`]).
    pub fn predict(&self, x: &[usize]) -> Vec<usize> {
        self.forward(x).outputs.iter().map(|o| argmax(o)).collect()
    }
}

/// Index of the largest value; the first one wins ties
pub(crate) fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}
