//! Numeric Gradient Verification
//!
//! Compares the BPTT gradients against central finite differences of the
//! loss, one scalar parameter at a time:
//!
//! ```text
//! estimate = (L(θ + h) - L(θ - h)) / 2h
//! error    = |analytic - estimate| / (|analytic| + |estimate|)
//! ```
//!
//! The check walks U, V and W in that order, each row-major, and stops at the
//! first element whose relative error exceeds the threshold. Every probe is
//! made on a private copy of the model, so the caller's parameters are never
//! touched.
//!
//! BPTT is only exact when `bptt_truncate` reaches back over the whole
//! example. Check with `bptt_truncate >= x.len() - 1`, otherwise the W and U
//! gradients are expected to disagree.
//!
//! ## Example
//!
//! ```rust
//! use cardsmith::{gradient_check, Config, GradientCheckConfig, RnnModel};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let config = Config::new(4).with_hidden_dim(3).with_bptt_truncate(1000);
//! let model = RnnModel::new(&config, &mut StdRng::seed_from_u64(10));
//! let report = gradient_check(&model, &[0, 1, 2], &[1, 2, 3], &GradientCheckConfig::default());
//! assert!(report.is_ok());
//! ```

use crate::gradients::RnnGradients;
use crate::model::{Parameter, RnnModel};
use std::fmt;
use tracing::{debug, info, warn};

/// Finite-difference settings
#[derive(Clone, Debug, PartialEq)]
pub struct GradientCheckConfig {
    /// Perturbation `h` applied to each parameter
    pub step_size: f64,
    /// Largest tolerated relative error
    pub error_threshold: f64,
}

impl Default for GradientCheckConfig {
    fn default() -> Self {
        Self {
            step_size: 0.001,
            error_threshold: 0.01,
        }
    }
}

/// The first element whose analytic gradient disagrees with the estimate
#[derive(Clone, Debug, PartialEq)]
pub struct GradientMismatch {
    pub parameter: Parameter,
    pub row: usize,
    pub col: usize,
    /// Flat row-major index
    pub index: usize,
    pub loss_plus: f64,
    pub loss_minus: f64,
    pub estimated: f64,
    pub analytic: f64,
    pub relative_error: f64,
}

impl fmt::Display for GradientMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}, {}]: +h loss {:.6}, -h loss {:.6}, estimated {:.6e}, backprop {:.6e}, relative error {:.6e}",
            self.parameter,
            self.row,
            self.col,
            self.loss_plus,
            self.loss_minus,
            self.estimated,
            self.analytic,
            self.relative_error
        )
    }
}

/// Outcome of [`gradient_check`]
#[derive(Clone, Debug, PartialEq, Default)]
pub struct GradientCheckReport {
    /// Parameters whose every element passed, in check order
    pub passed: Vec<Parameter>,
    /// Set when checking stopped early
    pub failure: Option<GradientMismatch>,
}

impl GradientCheckReport {
    pub fn is_ok(&self) -> bool {
        self.failure.is_none()
    }
}

/// Relative error between two gradient values; 0 when both are zero
pub fn relative_error(analytic: f64, estimated: f64) -> f64 {
    let scale = analytic.abs() + estimated.abs();
    if scale == 0.0 {
        0.0
    } else {
        (analytic - estimated).abs() / scale
    }
}

/// Verify `model.bptt(x, y)` against central differences
pub fn gradient_check(
    model: &RnnModel,
    x: &[usize],
    y: &[usize],
    config: &GradientCheckConfig,
) -> GradientCheckReport {
    let analytic = model.bptt(x, y);
    check_against(model, x, y, &analytic, config)
}

fn check_against(
    model: &RnnModel,
    x: &[usize],
    y: &[usize],
    analytic: &RnnGradients,
    config: &GradientCheckConfig,
) -> GradientCheckReport {
    let h = config.step_size;
    let mut probe = model.clone();
    let mut report = GradientCheckReport::default();

    for parameter in Parameter::ALL {
        let len = probe.parameter(parameter).len();
        debug!(%parameter, elements = len, "Checking gradient");

        for index in 0..len {
            let original = probe.parameter(parameter).data[index];

            probe.parameter_mut(parameter).data[index] = original + h;
            let loss_plus = probe.sequence_loss(x, y);
            probe.parameter_mut(parameter).data[index] = original - h;
            let loss_minus = probe.sequence_loss(x, y);
            probe.parameter_mut(parameter).data[index] = original;

            let estimated = (loss_plus - loss_minus) / (2.0 * h);
            let backprop = analytic.get(parameter).data[index];
            let error = relative_error(backprop, estimated);

            if error > config.error_threshold {
                let (row, col) = probe.parameter(parameter).position(index);
                let mismatch = GradientMismatch {
                    parameter,
                    row,
                    col,
                    index,
                    loss_plus,
                    loss_minus,
                    estimated,
                    analytic: backprop,
                    relative_error: error,
                };
                warn!(%mismatch, "Gradient check failed");
                report.failure = Some(mismatch);
                return report;
            }
        }

        info!(%parameter, "Gradient check passed");
        report.passed.push(parameter);
    }

    report
}
