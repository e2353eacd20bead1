//! Linear-algebra kernels.

mod tridiagonal;

pub use tridiagonal::*;
