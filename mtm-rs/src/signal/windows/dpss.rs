//! Discrete prolate spheroidal sequences.

use crate::kernel::{ConfigError, ExecInvariantViolation, KernelLifecycle};
use crate::linalg::{SymTridiagonal, TridiagonalEigenConfig, TridiagonalEigenKernel};
use crate::signal::traits::DpssGenerate;
use mtm_rs_core::num_rs::autocorrelate;
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, Axis};

/// `K` unit-energy tapers of length `N` and their concentration eigenvalues.
///
/// Rows of [`TaperSet::tapers`] are sorted by descending eigenvalue. Even
/// rows have a non-negative sum; odd rows have a non-negative partial sum up
/// to their largest-magnitude sample in the first half of the sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct TaperSet {
    tapers: Array2<f64>,
    eigenvalues: Array1<f64>,
    nw: f64,
}

impl TaperSet {
    /// `K x N` taper matrix.
    pub fn tapers(&self) -> ArrayView2<'_, f64> {
        self.tapers.view()
    }

    /// Concentration eigenvalues in `[0, 1]`, one per taper.
    pub fn eigenvalues(&self) -> ArrayView1<'_, f64> {
        self.eigenvalues.view()
    }

    /// Number of tapers `K`.
    pub fn n_tapers(&self) -> usize {
        self.tapers.nrows()
    }

    /// Sequence length `N`.
    pub fn len(&self) -> usize {
        self.tapers.ncols()
    }

    /// True when the set holds no tapers.
    pub fn is_empty(&self) -> bool {
        self.tapers.is_empty()
    }

    /// Time-half-bandwidth product the set was generated for.
    pub fn nw(&self) -> f64 {
        self.nw
    }

    /// Sub-set holding the rows listed in `keep`, in that order.
    pub fn select(&self, keep: &[usize]) -> TaperSet {
        TaperSet {
            tapers: self.tapers.select(Axis(0), keep),
            eigenvalues: self.eigenvalues.select(Axis(0), keep),
            nw: self.nw,
        }
    }

    /// Drop tapers whose eigenvalue is at or below `threshold`.
    ///
    /// The best-concentrated taper is always kept so the result is never
    /// empty.
    pub fn low_bias(&self, threshold: f64) -> TaperSet {
        let mut keep: Vec<usize> = self
            .eigenvalues
            .iter()
            .enumerate()
            .filter(|(_, &lam)| lam > threshold)
            .map(|(k, _)| k)
            .collect();
        if keep.is_empty() {
            tracing::warn!(
                threshold,
                n_tapers = self.n_tapers(),
                "no taper passes the low-bias threshold, keeping the first"
            );
            keep.push(0);
        }
        if keep.len() == self.n_tapers() {
            return self.clone();
        }
        tracing::debug!(kept = keep.len(), of = self.n_tapers(), "low-bias taper selection");
        self.select(&keep)
    }
}

/// Constructor config for [`DpssKernel`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DpssConfig {
    /// Sequence length `N`.
    pub n: usize,
    /// Time-half-bandwidth product `NW`.
    pub nw: f64,
    /// Number of tapers `K`.
    pub n_tapers: usize,
}

/// Trait-first DPSS generation kernel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DpssKernel {
    n: usize,
    nw: f64,
    n_tapers: usize,
}

impl KernelLifecycle for DpssKernel {
    type Config = DpssConfig;

    fn try_new(config: Self::Config) -> Result<Self, ConfigError> {
        if config.n == 0 {
            return Err(ConfigError::EmptyInput { arg: "n" });
        }
        if config.n_tapers == 0 {
            return Err(ConfigError::InvalidArgument {
                arg: "n_tapers",
                reason: "at least one taper is required",
            });
        }
        if config.n_tapers > config.n {
            return Err(ConfigError::TooManyTapers {
                requested: config.n_tapers,
                available: config.n,
            });
        }
        let limit = config.n as f64 / 2.0;
        if !config.nw.is_finite() || config.nw < 0.0 || config.nw >= limit {
            return Err(ConfigError::BandwidthOutOfRange {
                nw: config.nw,
                limit,
            });
        }
        Ok(Self {
            n: config.n,
            nw: config.nw,
            n_tapers: config.n_tapers,
        })
    }
}

impl DpssKernel {
    /// Key identifying the generated set; equal keys give identical sets.
    pub(crate) fn key(&self) -> (usize, u64, usize) {
        // -0.0 and 0.0 describe the same sequences.
        let nw = if self.nw == 0.0 { 0.0 } else { self.nw };
        (self.n, nw.to_bits(), self.n_tapers)
    }
}

impl DpssGenerate for DpssKernel {
    fn run_alloc(&self) -> Result<TaperSet, ExecInvariantViolation> {
        let n = self.n;
        let w = self.nw / n as f64;
        let operator = prolate_operator(n, w)?;
        let eig = TridiagonalEigenKernel::try_new(TridiagonalEigenConfig {
            n_largest: self.n_tapers,
            ..Default::default()
        })?;
        let mut tapers = eig.run(&operator)?.eigenvectors;

        fix_signs(&mut tapers);
        let eigenvalues = concentrations(&tapers, w);
        Ok(TaperSet {
            tapers,
            eigenvalues,
            nw: self.nw,
        })
    }
}

// Tridiagonal matrix commuting with the sinc-kernel concentration operator.
fn prolate_operator(n: usize, w: f64) -> Result<SymTridiagonal, ConfigError> {
    let cos_w = (2.0 * core::f64::consts::PI * w).cos();
    let diag = (0..n)
        .map(|i| ((n as f64 - 1.0 - 2.0 * i as f64) / 2.0).powi(2) * cos_w)
        .collect();
    let off = (1..n).map(|i| i as f64 * (n - i) as f64 / 2.0).collect();
    SymTridiagonal::try_new(diag, off)
}

fn fix_signs(tapers: &mut Array2<f64>) {
    let half = tapers.ncols() / 2;
    for (k, mut taper) in tapers.rows_mut().into_iter().enumerate() {
        let flip = if k % 2 == 0 {
            taper.sum() < 0.0
        } else {
            let head = taper.slice(s![..half]);
            let peak = head
                .iter()
                .enumerate()
                .fold((0, 0.0f64), |best, (i, v)| {
                    if v.abs() > best.1 {
                        (i, v.abs())
                    } else {
                        best
                    }
                })
                .0;
            head.slice(s![..peak]).sum() < 0.0
        };
        if flip {
            taper.mapv_inplace(|v| -v);
        }
    }
}

// lambda_k = sum_m r_k[m] s[m], with s the sinc kernel evaluated at lag m.
fn concentrations(tapers: &Array2<f64>, w: f64) -> Array1<f64> {
    let n = tapers.ncols();
    let kernel: Vec<f64> = (0..n)
        .map(|m| {
            let x = 2.0 * core::f64::consts::PI * w * m as f64;
            match m {
                0 => 2.0 * w,
                // sinc(0) = 1; only reached at zero bandwidth.
                _ if x == 0.0 => 4.0 * w,
                _ => 4.0 * w * x.sin() / x,
            }
        })
        .collect();
    // The m = 0 lag contributes once; positive lags stand for both signs.
    tapers
        .rows()
        .into_iter()
        .map(|taper| {
            let r = autocorrelate(taper);
            let lam: f64 = r.iter().zip(kernel.iter()).map(|(a, b)| a * b).sum();
            lam.clamp(0.0, 1.0)
        })
        .collect()
}

/// Compute `K` DPSS tapers of length `N` with time-half-bandwidth `NW`.
///
/// # Errors
/// Invalid argument when `N == 0`, `K == 0`, `K > N`, or `NW` is not in
/// `[0, N/2)`.
///
/// # Examples
/// ```
/// use mtm_rs::signal::windows::dpss_windows;
///
/// let set = dpss_windows(256, 4.0, 7).unwrap();
/// assert_eq!(set.tapers().dim(), (7, 256));
/// assert!(set.eigenvalues()[0] > 0.999);
/// ```
pub fn dpss_windows(n: usize, nw: f64, n_tapers: usize) -> crate::Result<TaperSet> {
    let kernel = DpssKernel::try_new(DpssConfig { n, nw, n_tapers })?;
    Ok(kernel.run_alloc()?)
}
