use core::{error, fmt};

/// Errors raised whilst running mtm-rs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Argument parsed into function were invalid.
    InvalidArg {
        /// The invalid arg
        arg: String,
        /// Explaining why arg is invalid.
        reason: String,
    },
    /// Two array arguments disagree on their shapes.
    ShapeMismatch {
        /// Name of the offending argument.
        arg: String,
        /// Shape required by the other operands.
        expected: Vec<usize>,
        /// Shape received.
        got: Vec<usize>,
    },
    /// Execution was attempted with a violated kernel invariant.
    ExecInvariantViolation {
        /// Why execution could not proceed.
        reason: String,
    },
}

impl Error {
    /// Shorthand for [`Error::InvalidArg`].
    pub fn invalid_arg(arg: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidArg {
            arg: arg.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArg { arg, reason } => {
                write!(f, "Invalid argument `{arg}`: {reason}")
            }
            Error::ShapeMismatch { arg, expected, got } => {
                write!(
                    f,
                    "Shape mismatch on `{arg}`. Expected {expected:?}, got {got:?}."
                )
            }
            Error::ExecInvariantViolation { reason } => {
                write!(f, "Execution invariant violation: {reason}")
            }
        }
    }
}

impl error::Error for Error {}

/// Result alias over [`Error`].
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_argument() {
        let err = Error::invalid_arg("sides", "expected `onesided` or `twosided`");
        assert_eq!(
            err.to_string(),
            "Invalid argument `sides`: expected `onesided` or `twosided`"
        );

        let err = Error::ShapeMismatch {
            arg: "ty".into(),
            expected: vec![5, 100],
            got: vec![10, 100],
        };
        assert_eq!(
            err.to_string(),
            "Shape mismatch on `ty`. Expected [5, 100], got [10, 100]."
        );
    }
}
