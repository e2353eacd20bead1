//! Shared trait-first kernel substrate.
//!
//! Every estimator stage is a kernel: a validated struct built through
//! [`KernelLifecycle::try_new`] whose capability trait (see
//! [`crate::signal::traits`]) runs it over borrowed inputs. Construction
//! failures surface as [`ConfigError`], run-time shape and state failures as
//! [`ExecInvariantViolation`].

mod errors;
mod io;
mod lifecycle;

pub use errors::*;
pub use io::*;
pub use lifecycle::*;
