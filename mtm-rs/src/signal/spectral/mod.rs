//! Thomson multi-taper spectral estimation.
//!
//! The pipeline runs taper generation ([`crate::signal::windows`]) ->
//! [`tapered_spectra`] -> [`adaptive_weights`] or fixed eigenvalue weights ->
//! [`mtm_cross_spectrum`]. [`multi_taper_psd`] and [`multi_taper_csd`] tie the
//! stages together; [`jackknifed_sdf_variance`] adds delete-one variance.

mod combine;
mod jackknife;
mod multitaper;
mod transform;
mod weights;

pub use combine::*;
pub use jackknife::*;
pub use multitaper::*;
pub use transform::*;
pub use weights::*;

use core::fmt;
use core::str::FromStr;

use crate::Error;

/// Which half of the frequency axis an estimate covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sides {
    /// Non-negative frequencies only, `N/2 + 1` bins, power folded in from the
    /// negative half. Real input only.
    OneSided,
    /// All `N` FFT bins.
    TwoSided,
}

impl Sides {
    /// Number of output bins for a length-`n` transform.
    pub fn n_bins(self, n: usize) -> usize {
        match self {
            Sides::OneSided => n / 2 + 1,
            Sides::TwoSided => n,
        }
    }

    /// Multiplier applied at `bin` so a one-sided estimate carries the power of
    /// its mirrored negative frequency. DC and (for even `n`) Nyquist have no
    /// mirror.
    #[inline]
    pub(crate) fn fold_factor(self, bin: usize, n: usize) -> f64 {
        match self {
            Sides::OneSided if bin >= 1 && bin < (n + 1) / 2 => 2.0,
            _ => 1.0,
        }
    }

    /// Name accepted by [`FromStr`].
    pub fn as_str(self) -> &'static str {
        match self {
            Sides::OneSided => "onesided",
            Sides::TwoSided => "twosided",
        }
    }
}

impl fmt::Display for Sides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sides {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "onesided" => Ok(Sides::OneSided),
            "twosided" => Ok(Sides::TwoSided),
            other => Err(Error::invalid_arg(
                "sides",
                format!("expected `onesided` or `twosided`, got `{other}`"),
            )),
        }
    }
}
