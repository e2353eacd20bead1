//! Autoregressive test signals and rational filter frequency responses.
//!
//! Used to validate spectral estimators against a known density.

use ndarray::Array1;
use num_traits::Zero;
use rand::Rng;
use rustfft::num_complex::Complex;

use crate::kernel::{ConfigError, ExecInvariantViolation, KernelLifecycle, Read1D, Write1D};
use crate::signal::traits::FreqResponse1D;

/// AR(4) coefficients with two sharp spectral peaks.
pub const DEFAULT_AR_COEFS: [f64; 4] = [2.7607, -3.8106, 2.6535, -0.9238];

/// Parameters of [`ar_generator`].
#[derive(Debug, Clone, PartialEq)]
pub struct ArConfig {
    /// Output length.
    pub n: usize,
    /// Variance of the driving noise.
    pub sigma: f64,
    /// Coefficients `a_k` of `v[n] = sum_k a_k v[n-1-k] + u[n]`.
    pub coefs: Vec<f64>,
    /// Leading samples generated then discarded.
    pub drop_transients: usize,
}

impl Default for ArConfig {
    fn default() -> Self {
        Self {
            n: 1024,
            sigma: 1.0,
            coefs: DEFAULT_AR_COEFS.to_vec(),
            drop_transients: 0,
        }
    }
}

/// Output of [`ar_generator`].
#[derive(Debug, Clone, PartialEq)]
pub struct ArProcess {
    /// The AR sequence.
    pub signal: Array1<f64>,
    /// Driving noise aligned with `signal`.
    pub noise: Array1<f64>,
    /// Coefficients used.
    pub coefs: Array1<f64>,
}

fn standard_normals<R: Rng + ?Sized>(rng: &mut R, n: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(n + 1);
    while out.len() < n {
        // Box-Muller; 1 - u keeps the log argument in (0, 1].
        let u1: f64 = 1.0 - rng.random::<f64>();
        let u2: f64 = rng.random::<f64>();
        let r = (-2.0 * u1.ln()).sqrt();
        let theta = 2.0 * core::f64::consts::PI * u2;
        out.push(r * theta.cos());
        out.push(r * theta.sin());
    }
    out.truncate(n);
    out
}

/// Draw an autoregressive sequence driven by zero-mean Gaussian noise.
///
/// # Errors
/// `n == 0`; negative or non-finite `sigma`.
pub fn ar_generator<R: Rng + ?Sized>(config: &ArConfig, rng: &mut R) -> crate::Result<ArProcess> {
    if config.n == 0 {
        return Err(ConfigError::EmptyInput { arg: "n" }.into());
    }
    if !(config.sigma.is_finite() && config.sigma >= 0.0) {
        return Err(ConfigError::InvalidArgument {
            arg: "sigma",
            reason: "sigma must be finite and non-negative",
        }
        .into());
    }
    let total = config.n + config.drop_transients;
    let mut noise = standard_normals(rng, total);
    let mean = noise.iter().sum::<f64>() / total as f64;
    let scale = config.sigma.sqrt();
    noise.iter_mut().for_each(|u| *u = (*u - mean) * scale);

    let p = config.coefs.len();
    let mut signal = vec![0.0; total];
    for i in 0..total {
        let mut acc = noise[i];
        for (k, &a) in config.coefs.iter().enumerate().take(i.min(p)) {
            acc += a * signal[i - 1 - k];
        }
        signal[i] = acc;
    }

    let start = config.drop_transients;
    Ok(ArProcess {
        signal: Array1::from(signal.split_off(start)),
        noise: Array1::from(noise.split_off(start)),
        coefs: Array1::from(config.coefs.clone()),
    })
}

fn freq_response_impl(b: &[f64], a: &[f64], n_freqs: usize, w: &mut [f64], h: &mut [Complex<f64>]) {
    for i in 0..n_freqs {
        let omega = core::f64::consts::PI * i as f64 / n_freqs as f64;
        let z = Complex::from_polar(1.0, -omega);
        let poly = |coefs: &[f64]| -> Complex<f64> {
            coefs
                .iter()
                .rev()
                .fold(Complex::<f64>::zero(), |acc: Complex<f64>, &c: &f64| acc * z + c)
        };
        w[i] = omega;
        h[i] = poly(b) / poly(a);
    }
}

/// Constructor config for [`FreqResponseKernel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreqResponseConfig {
    /// Number of frequencies on `[0, pi)`.
    pub n_freqs: usize,
}

/// Trait-first frequency response evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreqResponseKernel {
    n_freqs: usize,
}

impl KernelLifecycle for FreqResponseKernel {
    type Config = FreqResponseConfig;

    fn try_new(config: Self::Config) -> Result<Self, ConfigError> {
        if config.n_freqs == 0 {
            return Err(ConfigError::InvalidArgument {
                arg: "n_freqs",
                reason: "n_freqs must be > 0",
            });
        }
        Ok(Self {
            n_freqs: config.n_freqs,
        })
    }
}

fn check_coefs(b: &[f64], a: &[f64]) -> Result<(), ExecInvariantViolation> {
    if b.is_empty() || a.is_empty() {
        return Err(ExecInvariantViolation::InvalidState {
            reason: "numerator and denominator must be non-empty",
        });
    }
    if a[0] == 0.0 {
        return Err(ExecInvariantViolation::InvalidState {
            reason: "leading denominator coefficient must be non-zero",
        });
    }
    Ok(())
}

impl FreqResponse1D for FreqResponseKernel {
    fn run_into<I1, I2, OW, OH>(
        &self,
        b: &I1,
        a: &I2,
        w: &mut OW,
        h: &mut OH,
    ) -> Result<(), ExecInvariantViolation>
    where
        I1: Read1D<f64> + ?Sized,
        I2: Read1D<f64> + ?Sized,
        OW: Write1D<f64> + ?Sized,
        OH: Write1D<Complex<f64>> + ?Sized,
    {
        let b = b.read_slice().map_err(ExecInvariantViolation::from)?;
        let a = a.read_slice().map_err(ExecInvariantViolation::from)?;
        check_coefs(b, a)?;
        let w_out = w.write_slice_mut().map_err(ExecInvariantViolation::from)?;
        if w_out.len() != self.n_freqs {
            return Err(ExecInvariantViolation::LengthMismatch {
                arg: "w",
                expected: self.n_freqs,
                got: w_out.len(),
            });
        }
        let h_out = h.write_slice_mut().map_err(ExecInvariantViolation::from)?;
        if h_out.len() != self.n_freqs {
            return Err(ExecInvariantViolation::LengthMismatch {
                arg: "h",
                expected: self.n_freqs,
                got: h_out.len(),
            });
        }
        freq_response_impl(b, a, self.n_freqs, w_out, h_out);
        Ok(())
    }

    fn run_alloc<I1, I2>(
        &self,
        b: &I1,
        a: &I2,
    ) -> Result<(Array1<f64>, Array1<Complex<f64>>), ExecInvariantViolation>
    where
        I1: Read1D<f64> + ?Sized,
        I2: Read1D<f64> + ?Sized,
    {
        let mut w = Array1::zeros(self.n_freqs);
        let mut h = Array1::zeros(self.n_freqs);
        self.run_into(b, a, &mut w, &mut h)?;
        Ok((w, h))
    }
}

/// Frequency response `B(e^{-iw}) / A(e^{-iw})` on `n_freqs` points of
/// `[0, pi)`.
///
/// # Errors
/// Empty coefficients; zero leading denominator; `n_freqs == 0`.
pub fn freq_response(
    b: &[f64],
    a: &[f64],
    n_freqs: usize,
) -> crate::Result<(Array1<f64>, Array1<Complex<f64>>)> {
    let kernel = FreqResponseKernel::try_new(FreqResponseConfig { n_freqs })?;
    Ok(kernel.run_alloc(b, a)?)
}

/// Two-sided spectrum `sigma |H(w)|^2` of an AR process with coefficients
/// `coefs` on `n_freqs` points of `[0, pi)`. Divide by the sampling rate for
/// a density.
pub fn ar_psd(
    coefs: &[f64],
    sigma: f64,
    n_freqs: usize,
) -> crate::Result<(Array1<f64>, Array1<f64>)> {
    let a: Vec<f64> = core::iter::once(1.0).chain(coefs.iter().map(|c| -c)).collect();
    let (w, h) = freq_response(&[1.0], &a, n_freqs)?;
    Ok((w, h.mapv(|z| sigma * z.norm_sqr())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn generator_is_reproducible_and_zero_mean() {
        let cfg = ArConfig {
            n: 4096,
            coefs: vec![0.5],
            drop_transients: 32,
            ..Default::default()
        };
        let a = ar_generator(&cfg, &mut StdRng::seed_from_u64(3)).expect("ar");
        let b = ar_generator(&cfg, &mut StdRng::seed_from_u64(3)).expect("ar");
        assert_eq!(a, b);
        assert_eq!(a.signal.len(), 4096);
        assert_eq!(a.noise.len(), 4096);
        assert!(a.noise.mean().expect("non-empty").abs() < 0.05);
    }

    #[test]
    fn signal_follows_the_recursion() {
        let cfg = ArConfig {
            n: 64,
            coefs: vec![0.6, -0.2],
            drop_transients: 10,
            ..Default::default()
        };
        let p = ar_generator(&cfg, &mut StdRng::seed_from_u64(9)).expect("ar");
        for i in 2..64 {
            let expected = p.noise[i] + 0.6 * p.signal[i - 1] - 0.2 * p.signal[i - 2];
            assert_abs_diff_eq!(p.signal[i], expected, epsilon = 1e-12);
        }
    }

    #[test]
    fn ar1_variance_matches_theory() {
        // var = sigma / (1 - a^2) for AR(1).
        let cfg = ArConfig {
            n: 1 << 16,
            sigma: 2.0,
            coefs: vec![0.5],
            drop_transients: 100,
        };
        let p = ar_generator(&cfg, &mut StdRng::seed_from_u64(17)).expect("ar");
        let var = p.signal.mapv(|v| v * v).mean().expect("non-empty");
        assert_relative_eq!(var, 2.0 / 0.75, max_relative = 0.05);
    }

    #[test]
    fn moving_average_response() {
        let (w, h) = freq_response(&[0.5, 0.5], &[1.0], 16).expect("response");
        assert_eq!(w.len(), 16);
        assert_abs_diff_eq!(h[0].re, 1.0, epsilon = 1e-12);
        // |H(w)| = |cos(w/2)|.
        for (wi, hi) in w.iter().zip(h.iter()) {
            assert_abs_diff_eq!(hi.norm(), (wi / 2.0).cos().abs(), epsilon = 1e-12);
        }
    }

    #[test]
    fn ar_psd_at_dc() {
        let (_, s) = ar_psd(&[0.5], 1.0, 8).expect("psd");
        assert_relative_eq!(s[0], 4.0, max_relative = 1e-12);
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        assert!(freq_response(&[], &[1.0], 8).is_err());
        assert!(freq_response(&[1.0], &[0.0, 1.0], 8).is_err());
        assert!(freq_response(&[1.0], &[1.0], 0).is_err());
        let cfg = ArConfig {
            n: 0,
            ..Default::default()
        };
        assert!(ar_generator(&cfg, &mut StdRng::seed_from_u64(1)).is_err());

        let kernel =
            FreqResponseKernel::try_new(FreqResponseConfig { n_freqs: 4 }).expect("config");
        let mut w = vec![0.0; 4];
        let mut h = vec![Complex::new(0.0, 0.0); 3];
        assert!(matches!(
            kernel.run_into(&[1.0], &[1.0], &mut w, &mut h),
            Err(ExecInvariantViolation::LengthMismatch { arg: "h", .. })
        ));
    }
}
