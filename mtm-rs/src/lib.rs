//! Thomson multi-taper spectral estimation.
//!
//! Power- and cross-spectral density estimates of finite series built from
//! discrete prolate spheroidal sequences (Slepian tapers), with fixed or
//! adaptive taper weighting and jackknife variance.
//!
//! ```
//! use mtm_rs::signal::spectral::{multi_taper_psd, MultiTaperPsdConfig, Weighting};
//! use ndarray::Array2;
//!
//! let x = Array2::from_shape_fn((2, 1000), |(c, i)| ((c + 1) as f64 * 0.05 * i as f64).sin());
//! let config = MultiTaperPsdConfig {
//!     fs: 1.0,
//!     weighting: Weighting::adaptive(),
//!     jackknife: true,
//!     ..Default::default()
//! };
//! let est = multi_taper_psd(x.view(), &config).unwrap();
//! assert_eq!(est.psd.dim(), (2, 501));
//! assert!(est.jackknife_variance.is_some());
//! ```

pub mod kernel;
pub mod linalg;
pub mod signal;

mod error;

pub use error::{Error, Result};
