use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rustfft::num_complex::Complex;

use super::combine::auto_impl;
use super::weights::estimate_weights;
use super::{Sides, Weighting};
use crate::kernel::{ConfigError, ExecInvariantViolation};

pub(crate) fn jackknife_impl(
    spectra: ArrayView2<Complex<f64>>,
    eigenvalues: ArrayView1<f64>,
    weighting: Weighting,
    sides: Sides,
    n_fft: usize,
) -> Result<Array1<f64>, ExecInvariantViolation> {
    let k = spectra.nrows();
    if k < 2 {
        return Err(ConfigError::InvalidArgument {
            arg: "spectra",
            reason: "the jackknife needs at least two tapers",
        }
        .into());
    }
    if eigenvalues.len() != k {
        return Err(ExecInvariantViolation::LengthMismatch {
            arg: "eigenvalues",
            expected: k,
            got: eigenvalues.len(),
        });
    }

    let n_out = sides.n_bins(n_fft);
    let mut log_estimates = Array2::<f64>::zeros((k, n_out));
    for dropped in 0..k {
        let keep: Vec<usize> = (0..k).filter(|&i| i != dropped).collect();
        let sub_spectra = spectra.select(Axis(0), &keep);
        let sub_eigs = eigenvalues.select(Axis(0), &keep);
        let weights =
            estimate_weights(sub_spectra.view(), sub_eigs.view(), weighting, sides, n_fft)?.weights;
        let estimate = auto_impl(sub_spectra.view(), &weights, sides, n_fft)?;
        log_estimates
            .row_mut(dropped)
            .assign(&estimate.mapv(|v| v.max(f64::MIN_POSITIVE).ln()));
    }

    let scale = (k - 1) as f64 / k as f64;
    Ok(log_estimates.map_axis(Axis(0), |col| {
        let mean = col.sum() / k as f64;
        scale * col.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
    }))
}

/// Delete-one jackknife variance of the log spectral estimate.
///
/// Each of the `K` partial estimates drops one taper from the two-sided
/// spectra `spectra` (`K x N`) and recombines the rest, recomputing adaptive
/// weights per subset. The variance is
/// `(K-1)/K * sum_i (ln S_(i) - mean)^2` per bin.
///
/// # Errors
/// Fewer than two tapers; eigenvalue count differing from the taper count.
pub fn jackknifed_sdf_variance(
    spectra: ArrayView2<Complex<f64>>,
    eigenvalues: ArrayView1<f64>,
    sides: Sides,
    weighting: Weighting,
) -> crate::Result<Array1<f64>> {
    Ok(jackknife_impl(
        spectra,
        eigenvalues,
        weighting,
        sides,
        spectra.ncols(),
    )?)
}
