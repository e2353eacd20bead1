use std::sync::Arc;

use ndarray::{s, Array1, Array2, Array3, ArrayView2};
use rustfft::num_complex::Complex;

use super::combine::{auto_impl, cross_impl};
use super::jackknife::jackknife_impl;
use super::transform::{resolve_sides, tapered_spectra_impl};
use super::weights::{estimate_weights, WeightEstimate};
use super::{CrossWeights, SpectralSample, Sides, Weighting};
use crate::kernel::{ConfigError, ExecInvariantViolation, KernelLifecycle, Read2D};
use crate::signal::traits::{MultiTaperCsd2D, MultiTaperPsd2D};
use crate::signal::windows::{cached_tapers, DpssConfig, DpssKernel, TaperSet};

/// Tapers with a concentration eigenvalue at or below this are dropped when
/// `low_bias` is set.
pub const LOW_BIAS_THRESHOLD: f64 = 0.9;

/// Analysis bandwidth of a multi-taper estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bandwidth {
    /// Time-half-bandwidth product `NW`.
    Nw(f64),
    /// Full bandwidth in the units of the sampling rate.
    Hz(f64),
}

impl Default for Bandwidth {
    fn default() -> Self {
        Bandwidth::Nw(4.0)
    }
}

impl Bandwidth {
    /// `NW` for a length-`n` series sampled at `fs`.
    pub fn nw(self, n: usize, fs: f64) -> f64 {
        match self {
            Bandwidth::Nw(nw) => nw,
            Bandwidth::Hz(bw) => bw / (2.0 * fs) * n as f64,
        }
    }

    fn value(self) -> f64 {
        match self {
            Bandwidth::Nw(v) | Bandwidth::Hz(v) => v,
        }
    }
}

/// Constructor config for [`MultiTaperPsdKernel`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MultiTaperPsdConfig {
    /// Sampling rate.
    pub fs: f64,
    /// Analysis bandwidth.
    pub bandwidth: Bandwidth,
    /// Taper count; `None` uses `floor(2 NW) - 1`.
    pub n_tapers: Option<usize>,
    /// Fixed or adaptive weights.
    pub weighting: Weighting,
    /// Also return the jackknife variance of the log estimate.
    pub jackknife: bool,
    /// Drop poorly concentrated tapers (`lambda <= 0.9`).
    pub low_bias: bool,
    /// Side convention; `None` is one-sided for real and two-sided for
    /// complex input.
    pub sides: Option<Sides>,
}

impl Default for MultiTaperPsdConfig {
    fn default() -> Self {
        Self {
            fs: 2.0 * core::f64::consts::PI,
            bandwidth: Bandwidth::default(),
            n_tapers: None,
            weighting: Weighting::Eigenvalue,
            jackknife: false,
            low_bias: true,
            sides: None,
        }
    }
}

/// Constructor config for [`MultiTaperCsdKernel`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MultiTaperCsdConfig {
    /// Sampling rate.
    pub fs: f64,
    /// Analysis bandwidth.
    pub bandwidth: Bandwidth,
    /// Taper count; `None` uses `floor(2 NW) - 1`.
    pub n_tapers: Option<usize>,
    /// Fixed or adaptive weights, estimated per series.
    pub weighting: Weighting,
    /// Drop poorly concentrated tapers (`lambda <= 0.9`).
    pub low_bias: bool,
    /// Side convention; `None` is one-sided for real and two-sided for
    /// complex input.
    pub sides: Option<Sides>,
}

impl Default for MultiTaperCsdConfig {
    fn default() -> Self {
        let psd = MultiTaperPsdConfig::default();
        Self {
            fs: psd.fs,
            bandwidth: psd.bandwidth,
            n_tapers: psd.n_tapers,
            weighting: psd.weighting,
            low_bias: psd.low_bias,
            sides: psd.sides,
        }
    }
}

/// Power spectral density estimates for `M` series.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiTaperPsd {
    /// Frequency of each bin, `k fs / N`.
    pub frequencies: Array1<f64>,
    /// `M x L` density estimates.
    pub psd: Array2<f64>,
    /// `M x L` effective degrees of freedom.
    pub dof: Array2<f64>,
    /// `M x L` jackknife variance of `ln psd`, when requested.
    pub jackknife_variance: Option<Array2<f64>>,
}

/// Cross-spectral density matrix for `M` series.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiTaperCsd {
    /// Frequency of each bin, `k fs / N`.
    pub frequencies: Array1<f64>,
    /// `M x M x L` estimates with `csd[[i, j, f]] == csd[[j, i, f]].conj()`.
    pub csd: Array3<Complex<f64>>,
}

// Shared by both estimators: everything fixed once `N` is known.
struct Plan {
    tapers: Arc<TaperSet>,
    sides: Sides,
    n: usize,
}

impl Plan {
    fn new<T: SpectralSample>(
        n: usize,
        fs: f64,
        bandwidth: Bandwidth,
        n_tapers: Option<usize>,
        low_bias: bool,
        sides: Option<Sides>,
    ) -> Result<Self, ExecInvariantViolation> {
        let sides = resolve_sides::<T>(sides)?;
        let nw = bandwidth.nw(n, fs);
        let n_tapers = match n_tapers {
            Some(k) => k,
            None => default_taper_count(nw)?,
        };
        let kernel = DpssKernel::try_new(DpssConfig { n, nw, n_tapers })?;
        let mut tapers = cached_tapers(&kernel)?;
        if low_bias
            && tapers
                .eigenvalues()
                .iter()
                .any(|&l| l <= LOW_BIAS_THRESHOLD)
        {
            tapers = Arc::new(tapers.low_bias(LOW_BIAS_THRESHOLD));
        }
        tracing::debug!(n, nw, n_tapers = tapers.n_tapers(), %sides, "multi-taper plan");
        Ok(Self { tapers, sides, n })
    }

    fn frequencies(&self, fs: f64) -> Array1<f64> {
        Array1::from_shape_fn(self.sides.n_bins(self.n), |k| {
            k as f64 * fs / self.n as f64
        })
    }
}

fn default_taper_count(nw: f64) -> Result<usize, ConfigError> {
    let k = (2.0 * nw).floor();
    if !k.is_finite() || k < 2.0 {
        return Err(ConfigError::InvalidArgument {
            arg: "n_tapers",
            reason: "bandwidth too narrow for the default taper count 2NW - 1",
        });
    }
    Ok(k as usize - 1)
}

fn validate_common(
    fs: f64,
    bandwidth: Bandwidth,
    n_tapers: Option<usize>,
    weighting: Weighting,
) -> Result<(), ConfigError> {
    if !(fs.is_finite() && fs > 0.0) {
        return Err(ConfigError::InvalidArgument {
            arg: "fs",
            reason: "fs must be finite and positive",
        });
    }
    let bw = bandwidth.value();
    if !(bw.is_finite() && bw >= 0.0) {
        return Err(ConfigError::InvalidArgument {
            arg: "bandwidth",
            reason: "bandwidth must be finite and non-negative",
        });
    }
    if n_tapers == Some(0) {
        return Err(ConfigError::InvalidArgument {
            arg: "n_tapers",
            reason: "at least one taper is required",
        });
    }
    if let Weighting::Adaptive(adaptive) = weighting {
        if !(adaptive.rtol.is_finite() && adaptive.rtol > 0.0) {
            return Err(ConfigError::InvalidArgument {
                arg: "rtol",
                reason: "rtol must be finite and positive",
            });
        }
    }
    Ok(())
}

fn check_signals<T>(signals: &ArrayView2<T>) -> Result<(), ExecInvariantViolation> {
    if signals.nrows() == 0 {
        return Err(ConfigError::EmptyInput { arg: "signals" }.into());
    }
    if signals.ncols() == 0 {
        return Err(ConfigError::EmptyInput { arg: "signal" }.into());
    }
    Ok(())
}

/// Trait-first multi-taper PSD estimator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MultiTaperPsdKernel {
    config: MultiTaperPsdConfig,
}

impl KernelLifecycle for MultiTaperPsdKernel {
    type Config = MultiTaperPsdConfig;

    fn try_new(config: Self::Config) -> Result<Self, ConfigError> {
        validate_common(
            config.fs,
            config.bandwidth,
            config.n_tapers,
            config.weighting,
        )?;
        if config.jackknife && config.n_tapers == Some(1) {
            return Err(ConfigError::InvalidArgument {
                arg: "jackknife",
                reason: "the jackknife needs at least two tapers",
            });
        }
        Ok(Self { config })
    }
}

impl<T: SpectralSample> MultiTaperPsd2D<T> for MultiTaperPsdKernel {
    fn run_alloc<I>(&self, signals: &I) -> Result<MultiTaperPsd, ExecInvariantViolation>
    where
        I: Read2D<T> + ?Sized,
    {
        let signals = signals.read_view();
        check_signals(&signals)?;
        let cfg = &self.config;
        let plan = Plan::new::<T>(
            signals.ncols(),
            cfg.fs,
            cfg.bandwidth,
            cfg.n_tapers,
            cfg.low_bias,
            cfg.sides,
        )?;
        let (m, n) = signals.dim();
        let n_out = plan.sides.n_bins(n);
        let eigenvalues = plan.tapers.eigenvalues();

        let mut psd = Array2::zeros((m, n_out));
        let mut dof = Array2::zeros((m, n_out));
        let mut variance = cfg.jackknife.then(|| Array2::zeros((m, n_out)));
        for (i, signal) in signals.rows().into_iter().enumerate() {
            let spectra = tapered_spectra_impl(signal, plan.tapers.tapers(), plan.sides);
            let est = estimate_weights(spectra.view(), eigenvalues, cfg.weighting, plan.sides, n)?;
            let sdf = auto_impl(spectra.view(), &est.weights, plan.sides, n)?;
            psd.row_mut(i).assign(&(sdf / cfg.fs));
            dof.row_mut(i).assign(&est.dof.slice(s![..n_out]));
            if let Some(variance) = variance.as_mut() {
                let var =
                    jackknife_impl(spectra.view(), eigenvalues, cfg.weighting, plan.sides, n)?;
                variance.row_mut(i).assign(&var);
            }
        }
        Ok(MultiTaperPsd {
            frequencies: plan.frequencies(cfg.fs),
            psd,
            dof,
            jackknife_variance: variance,
        })
    }
}

/// Trait-first multi-taper CSD estimator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MultiTaperCsdKernel {
    config: MultiTaperCsdConfig,
}

impl KernelLifecycle for MultiTaperCsdKernel {
    type Config = MultiTaperCsdConfig;

    fn try_new(config: Self::Config) -> Result<Self, ConfigError> {
        validate_common(
            config.fs,
            config.bandwidth,
            config.n_tapers,
            config.weighting,
        )?;
        Ok(Self { config })
    }
}

impl<T: SpectralSample> MultiTaperCsd2D<T> for MultiTaperCsdKernel {
    fn run_alloc<I>(&self, signals: &I) -> Result<MultiTaperCsd, ExecInvariantViolation>
    where
        I: Read2D<T> + ?Sized,
    {
        let signals = signals.read_view();
        check_signals(&signals)?;
        let cfg = &self.config;
        let plan = Plan::new::<T>(
            signals.ncols(),
            cfg.fs,
            cfg.bandwidth,
            cfg.n_tapers,
            cfg.low_bias,
            cfg.sides,
        )?;
        let (m, n) = signals.dim();
        let n_out = plan.sides.n_bins(n);
        let eigenvalues = plan.tapers.eigenvalues();

        let mut spectra = Vec::with_capacity(m);
        let mut weights: Vec<WeightEstimate> = Vec::with_capacity(m);
        for signal in signals.rows() {
            let tx = tapered_spectra_impl(signal, plan.tapers.tapers(), plan.sides);
            weights.push(estimate_weights(tx.view(), eigenvalues, cfg.weighting, plan.sides, n)?);
            spectra.push(tx);
        }

        let mut csd = Array3::<Complex<f64>>::zeros((m, m, n_out));
        for i in 0..m {
            let auto = auto_impl(spectra[i].view(), &weights[i].weights, plan.sides, n)?;
            csd.slice_mut(s![i, i, ..])
                .assign(&auto.mapv(|v| Complex::new(v / cfg.fs, 0.0)));
            for j in (i + 1)..m {
                let cross = cross_impl(
                    spectra[i].view(),
                    spectra[j].view(),
                    CrossWeights::PerSeries(&weights[i].weights, &weights[j].weights),
                    plan.sides,
                    n,
                )? / cfg.fs;
                csd.slice_mut(s![j, i, ..]).assign(&cross.mapv(|z| z.conj()));
                csd.slice_mut(s![i, j, ..]).assign(&cross);
            }
        }
        Ok(MultiTaperCsd {
            frequencies: plan.frequencies(cfg.fs),
            csd,
        })
    }
}

/// Multi-taper power spectral density of each row of `signals` (`M x N`).
///
/// # Errors
/// Invalid configuration; empty input; bandwidth outside `[0, N/2)`; a
/// jackknife over fewer than two tapers.
///
/// # Examples
/// ```
/// use mtm_rs::signal::spectral::{multi_taper_psd, MultiTaperPsdConfig};
/// use ndarray::{Array1, Axis};
///
/// let x = Array1::from_shape_fn(512, |i| (0.25 * i as f64).sin());
/// let est = multi_taper_psd(x.view().insert_axis(Axis(0)), &MultiTaperPsdConfig::default())
///     .unwrap();
/// assert_eq!(est.psd.dim(), (1, 257));
/// assert_eq!(est.frequencies.len(), 257);
/// ```
pub fn multi_taper_psd<T: SpectralSample>(
    signals: ArrayView2<T>,
    config: &MultiTaperPsdConfig,
) -> crate::Result<MultiTaperPsd> {
    let kernel = MultiTaperPsdKernel::try_new(*config)?;
    Ok(MultiTaperPsd2D::<T>::run_alloc(&kernel, &signals)?)
}

/// Multi-taper cross-spectral density matrix of the rows of `signals`
/// (`M x N`). The diagonal holds the autospectra.
///
/// # Errors
/// Invalid configuration; empty input; bandwidth outside `[0, N/2)`.
pub fn multi_taper_csd<T: SpectralSample>(
    signals: ArrayView2<T>,
    config: &MultiTaperCsdConfig,
) -> crate::Result<MultiTaperCsd> {
    let kernel = MultiTaperCsdKernel::try_new(*config)?;
    Ok(MultiTaperCsd2D::<T>::run_alloc(&kernel, &signals)?)
}
