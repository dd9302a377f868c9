//! Activation Functions
//!
//! The recurrence squashes its pre-activation with tanh:
//!
//! ```text
//! s_t = tanh(U[:, x_t] + W · s_{t-1})
//! ```
//!
//! ### Derivative
//!
//! tanh has the convenient property that its derivative is a function of its
//! own output:
//!
//! ```text
//! d/dz tanh(z) = 1 - tanh(z)²
//! ```
//!
//! so the backward pass never needs the pre-activation, only the hidden
//! states the forward pass already stored.

/// tanh activation (forward pass), element-wise
pub fn tanh_forward(z: &[f64]) -> Vec<f64> {
    z.iter().map(|&v| v.tanh()).collect()
}

/// tanh derivative (backward pass)
///
/// # Arguments
///
/// * `grad_out` - Gradient arriving at the activation output
/// * `activated` - The activation output `tanh(z)` from the forward pass
///
/// # Returns
///
/// `grad_out ⊙ (1 - activated²)`
pub fn tanh_backward(grad_out: &[f64], activated: &[f64]) -> Vec<f64> {
    assert_eq!(grad_out.len(), activated.len(), "tanh_backward length mismatch");
    grad_out
        .iter()
        .zip(activated)
        .map(|(&g, &s)| g * (1.0 - s * s))
        .collect()
}
