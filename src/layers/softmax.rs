//! Output Softmax
//!
//! Converts the output logits `V · s_t` into a distribution over the
//! vocabulary:
//!
//! ```text
//! softmax(w, T) = exp(w / T) / Σ exp(w / T)
//! ```
//!
//! ## No Max Subtraction
//!
//! This is the plain formula, without the usual `w - max(w)` shift. With the
//! weight scales this network is initialized and trained at, logits stay far
//! from the `exp` overflow point (about 709 for `f64`) and both forms agree.
//! Past that point the plain formula produces `inf / inf = NaN`; the
//! sequence generator treats such a distribution as a soft failure.

/// Softmax with temperature over a single logit vector
///
/// # Arguments
///
/// * `logits` - Unnormalized scores
/// * `temperature` - Divides every logit before exponentiation; `1.0` is
///   the training objective's distribution
///
/// # Example
///
/// ```rust
/// use cardsmith::layers::softmax;
///
/// let probs = softmax(&[0.0, 0.0], 1.0);
/// assert_eq!(probs, vec![0.5, 0.5]);
/// ```
pub fn softmax(logits: &[f64], temperature: f64) -> Vec<f64> {
    let exps: Vec<f64> = logits.iter().map(|&w| (w / temperature).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}
