use ndarray::{Array1, ArrayView1};
use num_traits::Zero;
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

/// One-sided linear autocorrelation of a real sequence.
///
/// Returns `r[m] = sum_n x[n] * x[n + m]` for lags `m = 0..N`, which matches
/// numpy's `correlate(x, x, mode='full')[N - 1:]`. The sum is evaluated with a
/// zero-padded FFT so long sequences stay `O(N log N)`.
///
/// # Examples
/// ```
/// use ndarray::array;
/// use mtm_rs_core::num_rs::autocorrelate;
///
/// let r = autocorrelate(array![1., 2., 3.].view());
/// for (got, want) in r.iter().zip([14., 8., 3.]) {
///     assert!((got - want).abs() < 1e-12);
/// }
/// ```
pub fn autocorrelate(x: ArrayView1<f64>) -> Array1<f64> {
    let n = x.len();
    if n == 0 {
        return Array1::zeros(0);
    }
    // Padding to at least 2N - 1 keeps the circular correlation free of wrap-around.
    let nfft = (2 * n - 1).next_power_of_two();
    let mut buf = vec![Complex::<f64>::zero(); nfft];
    for (dst, src) in buf.iter_mut().zip(x.iter()) {
        *dst = Complex::new(*src, 0.0);
    }

    let mut planner = FftPlanner::<f64>::new();
    planner.plan_fft_forward(nfft).process(&mut buf);
    for z in buf.iter_mut() {
        *z = Complex::new(z.norm_sqr(), 0.0);
    }
    planner.plan_fft_inverse(nfft).process(&mut buf);

    let scale = 1.0 / nfft as f64;
    Array1::from_iter(buf.iter().take(n).map(|z| z.re * scale))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn direct(x: &[f64]) -> Vec<f64> {
        (0..x.len())
            .map(|m| (0..x.len() - m).map(|i| x[i] * x[i + m]).sum())
            .collect()
    }

    #[test]
    fn matches_direct_sum() {
        let x: Vec<f64> = (0..37).map(|i| ((i * 7) % 11) as f64 - 5.0).collect();
        let fast = autocorrelate(ArrayView1::from(x.as_slice()));
        for (got, want) in fast.iter().zip(direct(&x)) {
            assert_abs_diff_eq!(*got, want, epsilon = 1e-9);
        }
    }

    #[test]
    fn zero_lag_is_the_energy() {
        let x = array![3.0, -4.0];
        let r = autocorrelate(x.view());
        assert_abs_diff_eq!(r[0], 25.0, epsilon = 1e-12);
        assert_abs_diff_eq!(r[1], -12.0, epsilon = 1e-12);
    }

    #[test]
    fn empty_sequence() {
        let x: Array1<f64> = Array1::zeros(0);
        assert!(autocorrelate(x.view()).is_empty());
    }
}
