//! Signal processing: tapers, multi-taper spectral estimation and AR test
//! signals.

pub mod ar;
pub mod spectral;
pub mod traits;
pub mod windows;
