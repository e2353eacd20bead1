use ndarray::{Array1, ArrayView2};
use num_traits::Zero;
use rustfft::num_complex::Complex;

use super::{CrossWeights, Sides, TaperWeights};
use crate::kernel::{ConfigError, ExecInvariantViolation, KernelLifecycle, Read2D, Write1D};
use crate::signal::traits::MtmCombine;

/// Output of the spectral combiner.
#[derive(Debug, Clone, PartialEq)]
pub enum MtmSpectrum {
    /// Real, non-negative autospectrum.
    Auto(Array1<f64>),
    /// Complex cross-spectrum.
    Cross(Array1<Complex<f64>>),
}

impl MtmSpectrum {
    /// Number of frequency bins.
    pub fn len(&self) -> usize {
        match self {
            MtmSpectrum::Auto(s) => s.len(),
            MtmSpectrum::Cross(s) => s.len(),
        }
    }

    /// Whether the estimate has no bins.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow the autospectrum, if this is one.
    pub fn as_auto(&self) -> Option<&Array1<f64>> {
        match self {
            MtmSpectrum::Auto(s) => Some(s),
            MtmSpectrum::Cross(_) => None,
        }
    }

    /// Complex view of either variant.
    pub fn into_complex(self) -> Array1<Complex<f64>> {
        match self {
            MtmSpectrum::Auto(s) => s.mapv(|v| Complex::new(v, 0.0)),
            MtmSpectrum::Cross(s) => s,
        }
    }
}

fn output_bins(
    arg: &'static str,
    spectra: ArrayView2<Complex<f64>>,
    sides: Sides,
    n_fft: usize,
) -> Result<usize, ExecInvariantViolation> {
    let n_out = sides.n_bins(n_fft);
    if spectra.ncols() < n_out {
        return Err(ExecInvariantViolation::ShapeMismatch {
            arg,
            expected: (spectra.nrows(), n_out),
            got: spectra.dim(),
        });
    }
    Ok(n_out)
}

pub(crate) fn auto_impl(
    spectra: ArrayView2<Complex<f64>>,
    weights: &TaperWeights,
    sides: Sides,
    n_fft: usize,
) -> Result<Array1<f64>, ExecInvariantViolation> {
    let n_out = output_bins("tx", spectra, sides, n_fft)?;
    weights.check("weights", spectra.nrows(), n_out)?;
    let mut out = Array1::zeros(n_out);
    auto_into(spectra, weights, sides, n_fft, out.iter_mut());
    Ok(out)
}

// Bins where every weight vanishes (zero bandwidth, all-zero adaptive weights)
// fall back to the unweighted taper average instead of a silent zero.
fn auto_into<'o>(
    spectra: ArrayView2<Complex<f64>>,
    weights: &TaperWeights,
    sides: Sides,
    n_fft: usize,
    out: impl Iterator<Item = &'o mut f64>,
) {
    for (f, slot) in out.enumerate() {
        let column = spectra.column(f);
        let (mut num, mut den) = (0.0, 0.0);
        for (k, y) in column.iter().enumerate() {
            let w2 = weights.get(k, f).powi(2);
            num += w2 * y.norm_sqr();
            den += w2;
        }
        if den == 0.0 {
            num = column.iter().map(|y| y.norm_sqr()).sum();
            den = column.len() as f64;
        }
        *slot = if den > 0.0 {
            sides.fold_factor(f, n_fft) * num / den
        } else {
            0.0
        };
    }
}

pub(crate) fn cross_impl(
    tx: ArrayView2<Complex<f64>>,
    ty: ArrayView2<Complex<f64>>,
    weights: CrossWeights<'_>,
    sides: Sides,
    n_fft: usize,
) -> Result<Array1<Complex<f64>>, ExecInvariantViolation> {
    if tx.dim() != ty.dim() {
        return Err(ExecInvariantViolation::ShapeMismatch {
            arg: "ty",
            expected: tx.dim(),
            got: ty.dim(),
        });
    }
    let n_out = output_bins("tx", tx, sides, n_fft)?;
    let (wa, wb) = (weights.first(), weights.second());
    wa.check("weights", tx.nrows(), n_out)?;
    wb.check("weights", ty.nrows(), n_out)?;

    let out = Array1::from_shape_fn(n_out, |f| {
        let (xs, ys) = (tx.column(f), ty.column(f));
        let mut num = Complex::<f64>::zero();
        let mut den = 0.0;
        let mut all_zero = true;
        for (k, (x, y)) in xs.iter().zip(ys.iter()).enumerate() {
            let (a, b) = (wa.get(k, f), wb.get(k, f));
            num += (*x * a) * (*y * b).conj();
            den += a * b;
            all_zero &= a == 0.0 && b == 0.0;
        }
        if all_zero && !xs.is_empty() {
            let mean: Complex<f64> = xs.iter().zip(ys.iter()).map(|(x, y)| x * y.conj()).sum();
            mean * (sides.fold_factor(f, n_fft) / xs.len() as f64)
        } else if den != 0.0 {
            num * (sides.fold_factor(f, n_fft) / den)
        } else {
            Complex::<f64>::zero()
        }
    });
    Ok(out)
}

fn same_spectra(tx: &ArrayView2<Complex<f64>>, ty: &ArrayView2<Complex<f64>>) -> bool {
    if tx.dim() != ty.dim() {
        return false;
    }
    (tx.as_ptr() == ty.as_ptr() && tx.strides() == ty.strides()) || tx == ty
}

/// Combine tapered spectra into a cross-spectral estimate.
///
/// `tx` and `ty` hold two-sided spectra (`K x N`). For [`Sides::OneSided`] the
/// first `N/2 + 1` bins are kept and the bins with a negative-frequency mirror
/// are doubled. Identical spectra under [`CrossWeights::Shared`] yield
/// [`MtmSpectrum::Auto`].
///
/// # Errors
/// Shape mismatch between `tx` and `ty`; weight taper count differing from
/// the spectra; per-frequency weights with fewer columns than output bins.
pub fn mtm_cross_spectrum(
    tx: ArrayView2<Complex<f64>>,
    ty: ArrayView2<Complex<f64>>,
    weights: CrossWeights<'_>,
    sides: Sides,
) -> crate::Result<MtmSpectrum> {
    let n_fft = tx.ncols();
    match weights {
        CrossWeights::Shared(w) if same_spectra(&tx, &ty) => {
            Ok(MtmSpectrum::Auto(auto_impl(tx, w, sides, n_fft)?))
        }
        _ => Ok(MtmSpectrum::Cross(cross_impl(tx, ty, weights, sides, n_fft)?)),
    }
}

/// Autospectrum of two-sided tapered spectra `tx` (`K x N`).
pub fn mtm_auto_spectrum(
    tx: ArrayView2<Complex<f64>>,
    weights: &TaperWeights,
    sides: Sides,
) -> crate::Result<Array1<f64>> {
    Ok(auto_impl(tx, weights, sides, tx.ncols())?)
}

/// Constructor config for [`AutoSpectrumKernel`].
#[derive(Debug, Clone, PartialEq)]
pub struct AutoSpectrumConfig {
    /// Combination weights.
    pub weights: TaperWeights,
    /// Side convention of the output.
    pub sides: Sides,
    /// Transform length behind the spectra.
    pub n_fft: usize,
}

/// Trait-first autospectrum combiner.
#[derive(Debug, Clone, PartialEq)]
pub struct AutoSpectrumKernel {
    weights: TaperWeights,
    sides: Sides,
    n_fft: usize,
}

impl AutoSpectrumKernel {
    /// Number of output bins.
    pub fn n_bins(&self) -> usize {
        self.sides.n_bins(self.n_fft)
    }
}

impl KernelLifecycle for AutoSpectrumKernel {
    type Config = AutoSpectrumConfig;

    fn try_new(config: Self::Config) -> Result<Self, ConfigError> {
        if config.weights.n_tapers() == 0 {
            return Err(ConfigError::EmptyInput { arg: "weights" });
        }
        if config.n_fft == 0 {
            return Err(ConfigError::InvalidArgument {
                arg: "n_fft",
                reason: "n_fft must be positive",
            });
        }
        let n_bins = config.sides.n_bins(config.n_fft);
        if let Some(cols) = config.weights.n_freqs() {
            if cols < n_bins {
                return Err(ConfigError::LengthMismatch {
                    arg: "weights",
                    expected: n_bins,
                    got: cols,
                });
            }
        }
        Ok(Self {
            weights: config.weights,
            sides: config.sides,
            n_fft: config.n_fft,
        })
    }
}

impl MtmCombine for AutoSpectrumKernel {
    fn run_into<I, O>(&self, spectra: &I, out: &mut O) -> Result<(), ExecInvariantViolation>
    where
        I: Read2D<Complex<f64>> + ?Sized,
        O: Write1D<f64> + ?Sized,
    {
        let spectra = spectra.read_view();
        let n_out = output_bins("spectra", spectra, self.sides, self.n_fft)?;
        self.weights.check("weights", spectra.nrows(), n_out)?;
        let out = out.write_slice_mut().map_err(ExecInvariantViolation::from)?;
        if out.len() != n_out {
            return Err(ExecInvariantViolation::LengthMismatch {
                arg: "out",
                expected: n_out,
                got: out.len(),
            });
        }
        auto_into(spectra, &self.weights, self.sides, self.n_fft, out.iter_mut());
        Ok(())
    }

    fn run_alloc<I>(&self, spectra: &I) -> Result<Array1<f64>, ExecInvariantViolation>
    where
        I: Read2D<Complex<f64>> + ?Sized,
    {
        auto_impl(spectra.read_view(), &self.weights, self.sides, self.n_fft)
    }
}
