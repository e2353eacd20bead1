//! Symmetric tridiagonal eigen-solver.
//!
//! Selected eigenvalues come from Sturm-sequence bisection, their eigenvectors
//! from inverse iteration over a Thomas-algorithm solve. Both are `O(N)` per
//! step, so only the requested part of the spectrum is ever paid for.

use crate::kernel::{ConfigError, ExecInvariantViolation, KernelLifecycle};
use nalgebra::DVector;
use ndarray::Array2;

const BISECTION_MAX_ITER: usize = 256;

/// Symmetric tridiagonal matrix stored as its diagonal and first off-diagonal.
#[derive(Debug, Clone, PartialEq)]
pub struct SymTridiagonal {
    diag: Vec<f64>,
    off: Vec<f64>,
    off_sq: Vec<f64>,
    pivmin: f64,
    scale: f64,
}

impl SymTridiagonal {
    /// Build from `diag` (length `N`) and `off` (length `N - 1`), where
    /// `off[i]` couples rows `i` and `i + 1`.
    pub fn try_new(diag: Vec<f64>, off: Vec<f64>) -> Result<Self, ConfigError> {
        if diag.is_empty() {
            return Err(ConfigError::EmptyInput { arg: "diag" });
        }
        if off.len() + 1 != diag.len() {
            return Err(ConfigError::LengthMismatch {
                arg: "off",
                expected: diag.len() - 1,
                got: off.len(),
            });
        }
        if diag.iter().chain(off.iter()).any(|v| !v.is_finite()) {
            return Err(ConfigError::InvalidArgument {
                arg: "diag",
                reason: "matrix entries must be finite",
            });
        }
        let off_sq: Vec<f64> = off.iter().map(|e| e * e).collect();
        let max_off_sq = off_sq.iter().copied().fold(1.0, f64::max);
        let scale = diag
            .iter()
            .chain(off.iter())
            .fold(0.0f64, |acc, v| acc.max(v.abs()));
        Ok(Self {
            diag,
            off,
            off_sq,
            pivmin: f64::MIN_POSITIVE * max_off_sq,
            scale,
        })
    }

    /// Matrix order.
    pub fn len(&self) -> usize {
        self.diag.len()
    }

    /// Always false; construction rejects empty matrices.
    pub fn is_empty(&self) -> bool {
        self.diag.is_empty()
    }

    /// Gershgorin interval containing the whole spectrum.
    pub fn gershgorin_bounds(&self) -> (f64, f64) {
        let n = self.len();
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for i in 0..n {
            let mut radius = 0.0;
            if i > 0 {
                radius += self.off[i - 1].abs();
            }
            if i + 1 < n {
                radius += self.off[i].abs();
            }
            lo = lo.min(self.diag[i] - radius);
            hi = hi.max(self.diag[i] + radius);
        }
        let pad = 2.0 * f64::EPSILON * (hi - lo).max(self.scale) + self.pivmin;
        (lo - pad, hi + pad)
    }

    /// Number of eigenvalues strictly below `x` (Sturm count).
    pub fn count_below(&self, x: f64) -> usize {
        let mut count = 0;
        let mut q = self.diag[0] - x;
        if q.abs() < self.pivmin {
            q = -self.pivmin;
        }
        if q < 0.0 {
            count += 1;
        }
        for i in 1..self.len() {
            q = (self.diag[i] - x) - self.off_sq[i - 1] / q;
            if q.abs() < self.pivmin {
                q = -self.pivmin;
            }
            if q < 0.0 {
                count += 1;
            }
        }
        count
    }

    /// The `index`-th eigenvalue in ascending order, by bisection.
    pub fn eigenvalue(&self, index: usize) -> f64 {
        let (mut lo, mut hi) = self.gershgorin_bounds();
        for _ in 0..BISECTION_MAX_ITER {
            let mid = 0.5 * (lo + hi);
            let tol = 2.0 * f64::EPSILON * lo.abs().max(hi.abs()) + self.pivmin;
            if hi - lo <= tol || mid <= lo || mid >= hi {
                break;
            }
            if self.count_below(mid) > index {
                hi = mid;
            } else {
                lo = mid;
            }
        }
        0.5 * (lo + hi)
    }

    /// The `k` largest eigenvalues in descending order.
    pub fn largest_eigenvalues(&self, k: usize) -> Vec<f64> {
        let n = self.len();
        (0..k.min(n)).map(|i| self.eigenvalue(n - 1 - i)).collect()
    }

    /// Solve `(T - shift I) x = b` in place with the Thomas algorithm.
    ///
    /// No pivoting is done; a vanishing pivot is nudged to a tiny value of
    /// the same sign, which is exactly what inverse iteration wants when the
    /// shift sits on an eigenvalue.
    pub fn solve_shifted(&self, shift: f64, b: &mut [f64]) -> Result<(), ExecInvariantViolation> {
        let n = self.len();
        if b.len() != n {
            return Err(ExecInvariantViolation::LengthMismatch {
                arg: "b",
                expected: n,
                got: b.len(),
            });
        }
        let tiny = f64::EPSILON * self.scale.max(1.0);
        let guard = |p: f64| {
            if p.abs() < tiny {
                if p.is_sign_negative() {
                    -tiny
                } else {
                    tiny
                }
            } else {
                p
            }
        };

        let mut dw: Vec<f64> = self.diag.iter().map(|d| d - shift).collect();
        let mut ew = self.off.clone();
        dw[0] = guard(dw[0]);
        for k in 1..n {
            let t = ew[k - 1];
            ew[k - 1] = t / dw[k - 1];
            dw[k] = guard(dw[k] - t * ew[k - 1]);
        }
        for k in 1..n {
            b[k] -= ew[k - 1] * b[k - 1];
        }
        b[n - 1] /= dw[n - 1];
        for k in (0..n - 1).rev() {
            b[k] = b[k] / dw[k] - ew[k] * b[k + 1];
        }
        Ok(())
    }

    /// Eigenvector for the eigenvalue `shift` by inverse iteration from `x0`.
    ///
    /// Stops once the elementwise magnitudes move by less than `rtol` (in the
    /// 2-norm) between sweeps, or after `max_iter` sweeps. The result has unit
    /// norm; its sign is whatever the iteration produced.
    pub fn inverse_iteration(
        &self,
        shift: f64,
        x0: DVector<f64>,
        rtol: f64,
        max_iter: usize,
    ) -> Result<DVector<f64>, ExecInvariantViolation> {
        let n = self.len();
        if x0.len() != n {
            return Err(ExecInvariantViolation::LengthMismatch {
                arg: "x0",
                expected: n,
                got: x0.len(),
            });
        }
        let mut x = x0;
        if x.norm() == 0.0 {
            x.fill(1.0);
        }
        x.normalize_mut();

        for _ in 0..max_iter {
            let prev = x.abs();
            self.solve_shifted(shift, x.as_mut_slice())?;
            if x.norm() == 0.0 || !x.iter().all(|v| v.is_finite()) {
                return Err(ExecInvariantViolation::InvalidState {
                    reason: "inverse iteration diverged",
                });
            }
            x.normalize_mut();
            if (x.abs() - prev).norm() <= rtol {
                break;
            }
        }
        Ok(x)
    }
}

/// Constructor config for [`TridiagonalEigenKernel`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TridiagonalEigenConfig {
    /// How many of the largest eigenpairs to compute.
    pub n_largest: usize,
    /// Convergence threshold for inverse iteration.
    pub rtol: f64,
    /// Inverse iteration sweep cap.
    pub max_iter: usize,
}

impl Default for TridiagonalEigenConfig {
    fn default() -> Self {
        Self {
            n_largest: 1,
            rtol: 1e-8,
            max_iter: 100,
        }
    }
}

/// Trait-first kernel computing the largest eigenpairs of a [`SymTridiagonal`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TridiagonalEigenKernel {
    n_largest: usize,
    rtol: f64,
    max_iter: usize,
}

/// Largest eigenpairs, eigenvalues descending, eigenvectors as rows.
#[derive(Debug, Clone, PartialEq)]
pub struct TridiagonalEigenpairs {
    /// Eigenvalues, descending.
    pub eigenvalues: Vec<f64>,
    /// `n_largest x N`, row `k` pairs with `eigenvalues[k]`.
    pub eigenvectors: Array2<f64>,
}

impl KernelLifecycle for TridiagonalEigenKernel {
    type Config = TridiagonalEigenConfig;

    fn try_new(config: Self::Config) -> Result<Self, ConfigError> {
        if config.n_largest == 0 {
            return Err(ConfigError::InvalidArgument {
                arg: "n_largest",
                reason: "at least one eigenpair must be requested",
            });
        }
        if !config.rtol.is_finite() || config.rtol <= 0.0 {
            return Err(ConfigError::InvalidArgument {
                arg: "rtol",
                reason: "rtol must be finite and > 0",
            });
        }
        if config.max_iter == 0 {
            return Err(ConfigError::InvalidArgument {
                arg: "max_iter",
                reason: "max_iter must be > 0",
            });
        }
        Ok(Self {
            n_largest: config.n_largest,
            rtol: config.rtol,
            max_iter: config.max_iter,
        })
    }
}

impl TridiagonalEigenKernel {
    /// Compute the configured number of largest eigenpairs.
    ///
    /// Inverse iteration for the `k`-th pair starts from `sin((k + 1) t)` with
    /// `t` evenly spaced over `[0, pi]`, a vector with roughly the right
    /// number of sign changes for the smooth operators this is used on.
    pub fn run(
        &self,
        matrix: &SymTridiagonal,
    ) -> Result<TridiagonalEigenpairs, ExecInvariantViolation> {
        let n = matrix.len();
        if self.n_largest > n {
            return Err(ExecInvariantViolation::Config(ConfigError::TooManyTapers {
                requested: self.n_largest,
                available: n,
            }));
        }
        let eigenvalues = matrix.largest_eigenvalues(self.n_largest);
        let mut eigenvectors = Array2::zeros((self.n_largest, n));
        for (k, (&w, mut row)) in eigenvalues
            .iter()
            .zip(eigenvectors.rows_mut())
            .enumerate()
        {
            let x = matrix.inverse_iteration(w, start_vector(k, n), self.rtol, self.max_iter)?;
            for (dst, src) in row.iter_mut().zip(x.iter()) {
                *dst = *src;
            }
        }
        Ok(TridiagonalEigenpairs {
            eigenvalues,
            eigenvectors,
        })
    }
}

fn start_vector(k: usize, n: usize) -> DVector<f64> {
    if n == 1 {
        return DVector::from_element(1, 1.0);
    }
    let step = core::f64::consts::PI / (n - 1) as f64;
    DVector::from_fn(n, |i, _| ((k + 1) as f64 * step * i as f64).sin())
}
