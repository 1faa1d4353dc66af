use crate::kernel::{ConfigError, ExecInvariantViolation};
use core::{error, fmt};

/// Errors raised whilst computing node coherence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Argument passed into a function was invalid.
    InvalidArg {
        /// The invalid arg
        arg: String,
        /// Explaining why arg is invalid.
        reason: String,
    },
    /// The time axis is shorter than one FFT segment.
    InsufficientData {
        /// Samples available on the time axis.
        samples: usize,
        /// Requested segment length.
        nfft: usize,
    },
    /// Input rank, axis extent or segment length is unusable.
    ShapeMismatch {
        /// Explaining which shape is wrong.
        reason: String,
    },
    /// Execution was attempted with a violated kernel invariant.
    ExecInvariantViolation {
        /// Why execution could not proceed.
        reason: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArg { arg, reason } => {
                write!(f, "Invalid argument `{arg}`: {reason}")
            }
            Error::InsufficientData { samples, nfft } => write!(
                f,
                "Not enough time points ({samples}) to compute an FFT, given a window size of nfft={nfft}."
            ),
            Error::ShapeMismatch { reason } => write!(f, "Shape mismatch: {reason}"),
            Error::ExecInvariantViolation { reason } => {
                write!(f, "Execution invariant violation: {reason}")
            }
        }
    }
}

impl error::Error for Error {}

impl From<ConfigError> for Error {
    fn from(value: ConfigError) -> Self {
        match value {
            ConfigError::ShapeMismatch { arg, reason } => Error::ShapeMismatch {
                reason: format!("`{arg}`: {reason}"),
            },
            ConfigError::InvalidArgument { arg, reason } => Error::InvalidArg {
                arg: arg.to_string(),
                reason: reason.to_string(),
            },
            ConfigError::NonContiguous { arg } => Error::InvalidArg {
                arg: arg.to_string(),
                reason: "argument is not contiguous in memory".to_string(),
            },
            ConfigError::LengthMismatch { arg, expected, got } => Error::ShapeMismatch {
                reason: format!("`{arg}` expected length {expected}, got {got}"),
            },
        }
    }
}

impl From<ExecInvariantViolation> for Error {
    fn from(value: ExecInvariantViolation) -> Self {
        match value {
            ExecInvariantViolation::InsufficientData { samples, nfft } => {
                Error::InsufficientData { samples, nfft }
            }
            ExecInvariantViolation::Config(err) => err.into(),
            ExecInvariantViolation::ShapeMismatch { arg, expected, got } => Error::ShapeMismatch {
                reason: format!("`{arg}` expected shape {expected:?}, got {got:?}"),
            },
            other => Error::ExecInvariantViolation {
                reason: other.to_string(),
            },
        }
    }
}
