//! Network Nonlinearities
//!
//! The recurrent network has no trainable layers beyond its three weight
//! matrices; what it does have are two fixed nonlinearities, each with the
//! forward form and (for tanh) the derivative used by backpropagation.
//!
//! - **activation**: tanh hidden activation and its derivative
//! - **softmax**: output distribution over the vocabulary
//!
//! Softmax has no separate backward function: combined with the
//! cross-entropy loss its gradient with respect to the logits is simply
//! `probs - onehot(target)`, which the BPTT engine forms directly.

pub mod activation;
pub mod softmax;

pub use activation::{tanh_backward, tanh_forward};
pub use softmax::softmax;
