//! Error Type
//!
//! The numeric core (forward pass, BPTT, sampling) does not return errors:
//! its inputs are caller contracts, and its recoverable failures are reported
//! in-band (an empty generated message, a [`GradientCheckReport`] carrying a
//! mismatch). Everything that touches the outside world does:
//!
//! - Reading and writing checkpoints and vocabularies
//! - Validating a loaded snapshot against its declared shapes
//! - Validating training configuration before a run starts
//!
//! [`GradientCheckReport`]: crate::gradient_check::GradientCheckReport

use std::fmt;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by checkpoint I/O, vocabulary handling and configuration
#[derive(Debug)]
pub enum Error {
    /// Underlying file system failure
    Io(std::io::Error),
    /// A JSON section (config, vocabulary, training state) failed to parse
    Json(serde_json::Error),
    /// The file is not a checkpoint, or is truncated or inconsistent
    InvalidCheckpoint(String),
    /// The checkpoint was written by a format version this build cannot read
    UnsupportedVersion(u8),
    /// A parameter matrix does not have the shape its config implies
    ShapeMismatch {
        parameter: &'static str,
        expected: (usize, usize),
        found: (usize, usize),
    },
    /// Training or generation settings that cannot produce a valid run
    InvalidConfig(String),
    /// A word list that is missing sentinels or repeats a word
    InvalidVocabulary(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "{err}"),
            Self::Json(err) => write!(f, "{err}"),
            Self::InvalidCheckpoint(reason) => write!(f, "invalid checkpoint: {reason}"),
            Self::UnsupportedVersion(version) => {
                write!(f, "unsupported checkpoint version: {version}")
            }
            Self::ShapeMismatch {
                parameter,
                expected,
                found,
            } => write!(
                f,
                "parameter {parameter} has shape {}x{}, expected {}x{}",
                found.0, found.1, expected.0, expected.1
            ),
            Self::InvalidConfig(reason) => write!(f, "invalid configuration: {reason}"),
            Self::InvalidVocabulary(reason) => write!(f, "invalid vocabulary: {reason}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}
