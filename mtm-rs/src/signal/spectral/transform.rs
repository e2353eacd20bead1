use std::sync::Arc;

use mtm_rs_core::num_rs::fft_rows;
use ndarray::{s, Array2, ArrayView1, ArrayView2};
use rustfft::num_complex::Complex;

use super::Sides;
use crate::kernel::{ConfigError, ExecInvariantViolation, KernelLifecycle, Read1D};
use crate::signal::traits::TaperedSpectra1D;
use crate::signal::windows::TaperSet;

/// Sample types a spectrum can be estimated from.
pub trait SpectralSample: Copy + Send + Sync + 'static {
    /// Whether the type carries an imaginary part, which rules out one-sided
    /// spectra.
    const IS_COMPLEX: bool;

    /// Widen to a complex sample.
    fn to_complex(self) -> Complex<f64>;
}

impl SpectralSample for f64 {
    const IS_COMPLEX: bool = false;

    #[inline]
    fn to_complex(self) -> Complex<f64> {
        Complex::new(self, 0.0)
    }
}

impl SpectralSample for Complex<f64> {
    const IS_COMPLEX: bool = true;

    #[inline]
    fn to_complex(self) -> Complex<f64> {
        self
    }
}

/// Pick the side convention for sample type `T`: one-sided for real input,
/// two-sided for complex input unless overridden.
pub(crate) fn resolve_sides<T: SpectralSample>(
    requested: Option<Sides>,
) -> Result<Sides, ConfigError> {
    match requested {
        None if T::IS_COMPLEX => Ok(Sides::TwoSided),
        None => Ok(Sides::OneSided),
        Some(Sides::OneSided) if T::IS_COMPLEX => Err(ConfigError::InvalidArgument {
            arg: "sides",
            reason: "a one-sided spectrum discards the negative frequencies of complex input",
        }),
        Some(sides) => Ok(sides),
    }
}

// One-sided output is the two-sided transform truncated, so both agree bin for bin.
pub(crate) fn tapered_spectra_impl<T: SpectralSample>(
    signal: ArrayView1<T>,
    tapers: ArrayView2<f64>,
    sides: Sides,
) -> Array2<Complex<f64>> {
    let (k, n) = tapers.dim();
    let mut spectra =
        Array2::from_shape_fn((k, n), |(i, j)| signal[j].to_complex() * tapers[[i, j]]);
    fft_rows(&mut spectra);
    match sides {
        Sides::TwoSided => spectra,
        Sides::OneSided => spectra.slice_move(s![.., ..sides.n_bins(n)]),
    }
}

/// Constructor config for [`TaperedSpectraKernel`].
#[derive(Debug, Clone, PartialEq)]
pub struct TaperedSpectraConfig {
    /// Tapers to apply.
    pub tapers: Arc<TaperSet>,
    /// Side convention; `None` picks per sample type.
    pub sides: Option<Sides>,
}

/// Trait-first kernel producing one spectrum per taper.
#[derive(Debug, Clone, PartialEq)]
pub struct TaperedSpectraKernel {
    tapers: Arc<TaperSet>,
    sides: Option<Sides>,
}

impl KernelLifecycle for TaperedSpectraKernel {
    type Config = TaperedSpectraConfig;

    fn try_new(config: Self::Config) -> Result<Self, ConfigError> {
        if config.tapers.is_empty() {
            return Err(ConfigError::EmptyInput { arg: "tapers" });
        }
        Ok(Self {
            tapers: config.tapers,
            sides: config.sides,
        })
    }
}

impl<T: SpectralSample> TaperedSpectra1D<T> for TaperedSpectraKernel {
    fn run_alloc<I>(&self, input: &I) -> Result<Array2<Complex<f64>>, ExecInvariantViolation>
    where
        I: Read1D<T> + ?Sized,
    {
        let input = input.read_slice().map_err(ExecInvariantViolation::from)?;
        if input.len() != self.tapers.len() {
            return Err(ExecInvariantViolation::LengthMismatch {
                arg: "signal",
                expected: self.tapers.len(),
                got: input.len(),
            });
        }
        let sides = resolve_sides::<T>(self.sides)?;
        Ok(tapered_spectra_impl(
            ArrayView1::from(input),
            self.tapers.tapers(),
            sides,
        ))
    }
}

/// Fourier transform of `signal` under every taper of `tapers`.
///
/// Returns a `K x L` matrix, `L = N` for [`Sides::TwoSided`] or `N/2 + 1` for
/// [`Sides::OneSided`].
///
/// # Errors
/// Length mismatch between signal and tapers; one-sided request for complex
/// input.
pub fn tapered_spectra<T: SpectralSample>(
    signal: ArrayView1<T>,
    tapers: &TaperSet,
    sides: Sides,
) -> crate::Result<Array2<Complex<f64>>> {
    if signal.len() != tapers.len() {
        return Err(ExecInvariantViolation::LengthMismatch {
            arg: "signal",
            expected: tapers.len(),
            got: signal.len(),
        }
        .into());
    }
    let sides = resolve_sides::<T>(Some(sides))?;
    Ok(tapered_spectra_impl(signal, tapers.tapers(), sides))
}
