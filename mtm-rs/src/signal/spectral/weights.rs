use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rustfft::num_complex::Complex;

use super::Sides;
use crate::kernel::{ConfigError, ExecInvariantViolation, KernelLifecycle, Read2D};
use crate::signal::traits::TaperWeighting;

/// Bins whose initial estimate sits this far below the peak (150 dB) skip the
/// adaptive iteration.
const ADAPTIVE_FLOOR: f64 = 1e-15;

/// Per-taper combination weights.
#[derive(Debug, Clone, PartialEq)]
pub enum TaperWeights {
    /// One weight per taper, shared by every frequency bin.
    PerTaper(Array1<f64>),
    /// `K x L` weights, one column per frequency bin.
    PerFrequency(Array2<f64>),
}

impl TaperWeights {
    /// Fixed amplitude weights `sqrt(lambda_k)`.
    pub fn from_eigenvalues(eigenvalues: ArrayView1<f64>) -> Self {
        TaperWeights::PerTaper(eigenvalues.mapv(|l| l.max(0.0).sqrt()))
    }

    /// Number of tapers the weights cover.
    pub fn n_tapers(&self) -> usize {
        match self {
            TaperWeights::PerTaper(w) => w.len(),
            TaperWeights::PerFrequency(w) => w.nrows(),
        }
    }

    /// Number of frequency bins covered, `None` when broadcast.
    pub fn n_freqs(&self) -> Option<usize> {
        match self {
            TaperWeights::PerTaper(_) => None,
            TaperWeights::PerFrequency(w) => Some(w.ncols()),
        }
    }

    /// Weight of taper `k` at bin `f`.
    #[inline]
    pub fn get(&self, k: usize, f: usize) -> f64 {
        match self {
            TaperWeights::PerTaper(w) => w[k],
            TaperWeights::PerFrequency(w) => w[[k, f]],
        }
    }

    /// Keep the rows listed in `keep`.
    pub(crate) fn select(&self, keep: &[usize]) -> TaperWeights {
        match self {
            TaperWeights::PerTaper(w) => TaperWeights::PerTaper(w.select(Axis(0), keep)),
            TaperWeights::PerFrequency(w) => TaperWeights::PerFrequency(w.select(Axis(0), keep)),
        }
    }

    pub(crate) fn check(
        &self,
        arg: &'static str,
        n_tapers: usize,
        n_bins: usize,
    ) -> Result<(), ExecInvariantViolation> {
        if self.n_tapers() != n_tapers {
            return Err(ExecInvariantViolation::LengthMismatch {
                arg,
                expected: n_tapers,
                got: self.n_tapers(),
            });
        }
        match self.n_freqs() {
            Some(cols) if cols < n_bins => Err(ExecInvariantViolation::ShapeMismatch {
                arg,
                expected: (n_tapers, n_bins),
                got: (n_tapers, cols),
            }),
            _ => Ok(()),
        }
    }
}

/// Weights for the two operands of a cross-spectrum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CrossWeights<'a> {
    /// Both series use the same weights.
    Shared(&'a TaperWeights),
    /// Each series carries its own weights.
    PerSeries(&'a TaperWeights, &'a TaperWeights),
}

impl<'a> CrossWeights<'a> {
    /// Weights applied to the first series.
    pub fn first(&self) -> &'a TaperWeights {
        match *self {
            CrossWeights::Shared(w) | CrossWeights::PerSeries(w, _) => w,
        }
    }

    /// Weights applied to the second series.
    pub fn second(&self) -> &'a TaperWeights {
        match *self {
            CrossWeights::Shared(w) | CrossWeights::PerSeries(_, w) => w,
        }
    }
}

/// Stopping rule for the adaptive iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptiveConfig {
    /// Iteration cap per frequency bin.
    pub max_iter: usize,
    /// Relative change of the spectral estimate regarded as converged.
    pub rtol: f64,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            max_iter: 20,
            rtol: 1e-3,
        }
    }
}

/// How tapered spectra are weighted before combination.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Weighting {
    /// Fixed `sqrt(lambda_k)` weights.
    #[default]
    Eigenvalue,
    /// Thomson's adaptive weights.
    Adaptive(AdaptiveConfig),
}

impl Weighting {
    /// Adaptive weighting with the default stopping rule.
    pub fn adaptive() -> Self {
        Weighting::Adaptive(AdaptiveConfig::default())
    }
}

/// Weights together with their effective degrees of freedom.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightEstimate {
    /// Combination weights.
    pub weights: TaperWeights,
    /// `2 sum_k d_k(f)^2` per frequency bin.
    pub dof: Array1<f64>,
    /// Bins that hit the iteration cap. Always zero for fixed weights.
    pub unconverged: usize,
}

#[inline]
fn thomson_weight(lambda: f64, s: f64, bias: f64) -> f64 {
    let denom = lambda * s + bias;
    if denom > 0.0 {
        lambda.sqrt() * s / denom
    } else {
        lambda.sqrt()
    }
}

fn fixed_estimate(eigenvalues: ArrayView1<f64>, n_bins: usize) -> WeightEstimate {
    let weights = TaperWeights::from_eigenvalues(eigenvalues);
    let dof = 2.0 * eigenvalues.len() as f64;
    WeightEstimate {
        weights,
        dof: Array1::from_elem(n_bins, dof),
        unconverged: 0,
    }
}

fn check_spectra(
    spectra: ArrayView2<Complex<f64>>,
    eigenvalues: ArrayView1<f64>,
) -> Result<(), ExecInvariantViolation> {
    if spectra.is_empty() {
        return Err(ConfigError::EmptyInput { arg: "spectra" }.into());
    }
    if eigenvalues.len() != spectra.nrows() {
        return Err(ExecInvariantViolation::LengthMismatch {
            arg: "eigenvalues",
            expected: spectra.nrows(),
            got: eigenvalues.len(),
        });
    }
    Ok(())
}

pub(crate) fn estimate_weights(
    spectra: ArrayView2<Complex<f64>>,
    eigenvalues: ArrayView1<f64>,
    weighting: Weighting,
    sides: Sides,
    n_fft: usize,
) -> Result<WeightEstimate, ExecInvariantViolation> {
    check_spectra(spectra, eigenvalues)?;
    match weighting {
        Weighting::Eigenvalue => Ok(fixed_estimate(eigenvalues, spectra.ncols())),
        Weighting::Adaptive(config) => adaptive_impl(spectra, eigenvalues, config, sides, n_fft),
    }
}

// `spectra` may hold fewer than `n_fft` columns when already truncated to one side.
pub(crate) fn adaptive_impl(
    spectra: ArrayView2<Complex<f64>>,
    eigenvalues: ArrayView1<f64>,
    config: AdaptiveConfig,
    sides: Sides,
    n_fft: usize,
) -> Result<WeightEstimate, ExecInvariantViolation> {
    check_spectra(spectra, eigenvalues)?;
    let (k, n_bins) = spectra.dim();
    if k < 3 {
        tracing::warn!(
            n_tapers = k,
            "adaptive weighting needs at least three tapers; using eigenvalue weights"
        );
        return Ok(fixed_estimate(eigenvalues, n_bins));
    }
    if n_fft == 0 || n_bins < sides.n_bins(n_fft) {
        return Err(ExecInvariantViolation::ShapeMismatch {
            arg: "spectra",
            expected: (k, sides.n_bins(n_fft)),
            got: (k, n_bins),
        });
    }

    let lambda: Vec<f64> = eigenvalues.iter().map(|l| l.clamp(0.0, 1.0)).collect();
    let sdfs = spectra.mapv(|z| z.norm_sqr());

    let lambda_sum: f64 = lambda.iter().sum();
    let sigma2 = if lambda_sum > 0.0 {
        (0..sides.n_bins(n_fft))
            .map(|f| {
                let s: f64 = (0..k).map(|i| lambda[i] * sdfs[[i, f]]).sum();
                sides.fold_factor(f, n_fft) * s / lambda_sum
            })
            .sum::<f64>()
            / n_fft as f64
    } else {
        0.0
    };
    let bias: Vec<f64> = lambda.iter().map(|l| (1.0 - l) * sigma2).collect();

    let initial: Vec<f64> = (0..n_bins)
        .map(|f| {
            let num = lambda[0] * sdfs[[0, f]] + lambda[1] * sdfs[[1, f]];
            let den = lambda[0] + lambda[1];
            if den > 0.0 {
                num / den
            } else {
                0.0
            }
        })
        .collect();
    let floor = initial.iter().copied().fold(0.0f64, f64::max) * ADAPTIVE_FLOOR;

    let mut weights = Array2::<f64>::zeros((k, n_bins));
    let mut unconverged = 0usize;
    for f in 0..n_bins {
        let mut s = initial[f];
        if s <= floor {
            weights[[0, f]] = lambda[0].sqrt();
            weights[[1, f]] = lambda[1].sqrt();
            continue;
        }
        let mut converged = false;
        for _ in 0..config.max_iter {
            let (mut num, mut den) = (0.0, 0.0);
            for i in 0..k {
                let d2 = thomson_weight(lambda[i], s, bias[i]).powi(2);
                num += d2 * sdfs[[i, f]];
                den += d2;
            }
            let next = if den > 0.0 { num / den } else { s };
            let change = if s > 0.0 { (next - s).abs() / s } else { 0.0 };
            s = next;
            if change < config.rtol {
                converged = true;
                break;
            }
        }
        if !converged {
            unconverged += 1;
        }
        for i in 0..k {
            weights[[i, f]] = thomson_weight(lambda[i], s, bias[i]);
        }
    }
    if unconverged > 0 {
        tracing::warn!(
            unconverged,
            n_bins,
            max_iter = config.max_iter,
            "adaptive weights did not converge on every bin"
        );
    }

    let dof = weights.map_axis(Axis(0), |col| 2.0 * col.iter().map(|d| d * d).sum::<f64>());
    Ok(WeightEstimate {
        weights: TaperWeights::PerFrequency(weights),
        dof,
        unconverged,
    })
}

/// Constructor config for [`WeightEstimatorKernel`].
#[derive(Debug, Clone, PartialEq)]
pub struct WeightEstimatorConfig {
    /// Concentration eigenvalues of the tapers behind the spectra.
    pub eigenvalues: Array1<f64>,
    /// Fixed or adaptive weighting.
    pub weighting: Weighting,
    /// Side convention of the estimate the weights feed.
    pub sides: Sides,
    /// Transform length.
    pub n_fft: usize,
}

/// Trait-first weight estimator.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightEstimatorKernel {
    eigenvalues: Array1<f64>,
    weighting: Weighting,
    sides: Sides,
    n_fft: usize,
}

impl KernelLifecycle for WeightEstimatorKernel {
    type Config = WeightEstimatorConfig;

    fn try_new(config: Self::Config) -> Result<Self, ConfigError> {
        if config.eigenvalues.is_empty() {
            return Err(ConfigError::EmptyInput { arg: "eigenvalues" });
        }
        if config.n_fft == 0 {
            return Err(ConfigError::InvalidArgument {
                arg: "n_fft",
                reason: "n_fft must be positive",
            });
        }
        if let Weighting::Adaptive(adaptive) = config.weighting {
            if !(adaptive.rtol.is_finite() && adaptive.rtol > 0.0) {
                return Err(ConfigError::InvalidArgument {
                    arg: "rtol",
                    reason: "rtol must be finite and positive",
                });
            }
        }
        Ok(Self {
            eigenvalues: config.eigenvalues,
            weighting: config.weighting,
            sides: config.sides,
            n_fft: config.n_fft,
        })
    }
}

impl TaperWeighting for WeightEstimatorKernel {
    fn run_alloc<I>(&self, spectra: &I) -> Result<WeightEstimate, ExecInvariantViolation>
    where
        I: Read2D<Complex<f64>> + ?Sized,
    {
        estimate_weights(
            spectra.read_view(),
            self.eigenvalues.view(),
            self.weighting,
            self.sides,
            self.n_fft,
        )
    }
}

/// Thomson adaptive weights for two-sided tapered spectra `spectra` (`K x N`).
///
/// `sides` selects how the broadband power feeding the bias term is summed.
/// With fewer than three tapers the eigenvalue weights are returned.
///
/// # Errors
/// Empty spectra; eigenvalue count differing from the spectra's taper count.
pub fn adaptive_weights(
    spectra: ArrayView2<Complex<f64>>,
    eigenvalues: ArrayView1<f64>,
    sides: Sides,
) -> crate::Result<WeightEstimate> {
    Ok(adaptive_impl(
        spectra,
        eigenvalues,
        AdaptiveConfig::default(),
        sides,
        spectra.ncols(),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::spectral::tapered_spectra;
    use crate::signal::windows::dpss_windows;
    use approx::assert_relative_eq;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn noise(n: usize, seed: u64) -> Array1<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        Array1::from_shape_fn(n, |_| rng.random_range(-1.0..1.0))
    }

    #[test]
    fn eigenvalue_weights_are_square_roots() {
        let w = TaperWeights::from_eigenvalues(array![1.0, 0.81, 0.25].view());
        assert_eq!(w, TaperWeights::PerTaper(array![1.0, 0.9, 0.5]));
        assert_eq!(w.n_freqs(), None);
        assert_eq!(w.get(1, 17), 0.9);
    }

    #[test]
    fn weight_shape_checks() {
        let w = TaperWeights::PerFrequency(Array2::ones((3, 10)));
        assert!(w.check("weights", 3, 10).is_ok());
        assert!(matches!(
            w.check("weights", 3, 11),
            Err(ExecInvariantViolation::ShapeMismatch { .. })
        ));
        assert!(matches!(
            w.check("weights", 4, 10),
            Err(ExecInvariantViolation::LengthMismatch { .. })
        ));
    }

    #[test]
    fn adaptive_weights_are_bounded_and_dof_is_consistent() {
        let n = 256;
        let tapers = dpss_windows(n, 4.0, 7).expect("dpss");
        let x = noise(n, 7);
        let spectra = tapered_spectra(x.view(), &tapers, Sides::TwoSided).expect("spectra");
        let est = adaptive_weights(spectra.view(), tapers.eigenvalues(), Sides::TwoSided)
            .expect("adaptive weights");
        assert_eq!(est.weights.n_freqs(), Some(n));
        assert_eq!(est.dof.len(), n);
        let lambda = tapers.eigenvalues();
        for f in 0..n {
            let mut total = 0.0;
            for k in 0..7 {
                let d = est.weights.get(k, f);
                let cap = 1.0 / lambda[k].sqrt() + 1e-12;
                assert!((0.0..=cap).contains(&d), "weight {d} at ({k}, {f})");
                total += d * d;
            }
            assert_relative_eq!(est.dof[f], 2.0 * total, max_relative = 1e-12);
        }
    }

    #[test]
    fn white_noise_keeps_well_concentrated_tapers() {
        let n = 512;
        let tapers = dpss_windows(n, 4.0, 7).expect("dpss");
        let x = noise(n, 11);
        let spectra = tapered_spectra(x.view(), &tapers, Sides::TwoSided).expect("spectra");
        let est = adaptive_weights(spectra.view(), tapers.eigenvalues(), Sides::TwoSided)
            .expect("adaptive weights");
        // Flat spectra carry no leakage, so the first taper is barely down-weighted.
        let mean_first: f64 = (0..n).map(|f| est.weights.get(0, f)).sum::<f64>() / n as f64;
        assert!(mean_first > 0.95, "mean first-taper weight {mean_first}");
    }

    #[test]
    fn fewer_than_three_tapers_fall_back_to_fixed_weights() {
        let tapers = dpss_windows(64, 1.5, 2).expect("dpss");
        let x = noise(64, 3);
        let spectra = tapered_spectra(x.view(), &tapers, Sides::TwoSided).expect("spectra");
        let est = adaptive_weights(spectra.view(), tapers.eigenvalues(), Sides::TwoSided)
            .expect("fallback");
        assert_eq!(est.weights, TaperWeights::from_eigenvalues(tapers.eigenvalues()));
        assert!(est.dof.iter().all(|&v| v == 4.0));
    }

    #[test]
    fn zero_signal_keeps_initial_weights() {
        let tapers = dpss_windows(64, 2.5, 4).expect("dpss");
        let spectra = Array2::<Complex<f64>>::zeros((4, 64));
        let est = adaptive_weights(spectra.view(), tapers.eigenvalues(), Sides::OneSided)
            .expect("zero input");
        assert_eq!(est.unconverged, 0);
        assert!(est.weights.get(0, 5) > 0.0);
        assert_eq!(est.weights.get(3, 5), 0.0);
    }

    #[test]
    fn iteration_cap_is_reported_not_raised() {
        let n = 128;
        let tapers = dpss_windows(n, 4.0, 7).expect("dpss");
        let mut x = noise(n, 5);
        x.iter_mut()
            .enumerate()
            .for_each(|(i, v)| *v += 50.0 * (0.9 * i as f64).cos());
        let spectra = tapered_spectra(x.view(), &tapers, Sides::TwoSided).expect("spectra");
        let capped = AdaptiveConfig {
            max_iter: 1,
            rtol: 1e-15,
        };
        let est = adaptive_impl(spectra.view(), tapers.eigenvalues(), capped, Sides::TwoSided, n)
            .expect("capped iteration");
        assert!(est.unconverged > 0);
        assert_eq!(est.dof.len(), n);
    }

    #[test]
    fn kernel_validates_and_rejects_mismatched_eigenvalues() {
        assert!(WeightEstimatorKernel::try_new(WeightEstimatorConfig {
            eigenvalues: Array1::zeros(0),
            weighting: Weighting::Eigenvalue,
            sides: Sides::OneSided,
            n_fft: 8,
        })
        .is_err());

        let kernel = WeightEstimatorKernel::try_new(WeightEstimatorConfig {
            eigenvalues: array![0.99, 0.95, 0.9],
            weighting: Weighting::adaptive(),
            sides: Sides::TwoSided,
            n_fft: 8,
        })
        .expect("valid config");
        let spectra = Array2::<Complex<f64>>::ones((4, 8));
        assert!(matches!(
            kernel.run_alloc(&spectra),
            Err(ExecInvariantViolation::LengthMismatch { arg: "eigenvalues", .. })
        ));
    }
}
