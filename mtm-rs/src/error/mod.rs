//! Error surface of the free-function API.
//!
//! Kernels report [`ConfigError`] and [`ExecInvariantViolation`]; the free
//! functions collapse both into [`Error`].

use crate::kernel::{ConfigError, ExecInvariantViolation};

pub use mtm_rs_core::{Error, Result};

impl From<ConfigError> for Error {
    fn from(value: ConfigError) -> Self {
        match value {
            ConfigError::LengthMismatch { arg, expected, got } => Error::ShapeMismatch {
                arg: arg.into(),
                expected: vec![expected],
                got: vec![got],
            },
            ConfigError::EmptyInput { arg }
            | ConfigError::InvalidArgument { arg, .. }
            | ConfigError::NonContiguous { arg } => Error::invalid_arg(arg, value.to_string()),
            ConfigError::TooManyTapers { .. } => Error::invalid_arg("n_tapers", value.to_string()),
            ConfigError::BandwidthOutOfRange { .. } => Error::invalid_arg("nw", value.to_string()),
        }
    }
}

impl From<ExecInvariantViolation> for Error {
    fn from(value: ExecInvariantViolation) -> Self {
        match value {
            ExecInvariantViolation::InvalidState { reason } => Error::ExecInvariantViolation {
                reason: reason.into(),
            },
            ExecInvariantViolation::LengthMismatch { arg, expected, got } => Error::ShapeMismatch {
                arg: arg.into(),
                expected: vec![expected],
                got: vec![got],
            },
            ExecInvariantViolation::ShapeMismatch { arg, expected, got } => Error::ShapeMismatch {
                arg: arg.into(),
                expected: vec![expected.0, expected.1],
                got: vec![got.0, got.1],
            },
            ExecInvariantViolation::Config(err) => err.into(),
        }
    }
}
