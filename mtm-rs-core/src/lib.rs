//! Core primitives for `mtm-rs`.
//!
//! `num_rs` holds the numpy-flavoured building blocks the estimators lean on
//! (FFTs and correlations over [`ndarray`] containers). [`Error`] is the error
//! type returned by the public free functions of both crates.

mod error;

/// Numpy-like numeric routines.
pub mod num_rs;

pub use error::{Error, Result};
