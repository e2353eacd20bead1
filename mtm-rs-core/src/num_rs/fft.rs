use ndarray::{Array1, Array2, ArrayView1};
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

/// Best effort parallel behaviour with numpy's `fft.fft`.
///
/// Returns the unnormalized discrete Fourier transform of a complex sequence of
/// arbitrary length.
///
/// # Parameters
/// * `x` : (N,) [[array_like]]([ndarray::Array1])  
///   Input sequence.
///
/// # Examples
/// ```
/// use ndarray::array;
/// use mtm_rs_core::num_rs::fft;
/// use rustfft::num_complex::Complex;
///
/// let x = array![Complex::new(1.0, 0.0), Complex::new(0.0, 0.0), Complex::new(0.0, 0.0)];
/// let spec = fft(x.view());
/// assert!(spec.iter().all(|z| (z.re - 1.0).abs() < 1e-12 && z.im.abs() < 1e-12));
/// ```
pub fn fft(x: ArrayView1<Complex<f64>>) -> Array1<Complex<f64>> {
    let mut buf = x.to_vec();
    if buf.is_empty() {
        return Array1::from(buf);
    }
    let mut planner = FftPlanner::<f64>::new();
    planner.plan_fft_forward(buf.len()).process(&mut buf);
    Array1::from(buf)
}

/// In-place forward FFT of every row of `a`, i.e. numpy's `fft.fft(a, axis=-1)`.
///
/// One plan is shared across rows. Standard-layout arrays are transformed in a
/// single pass over the backing buffer.
pub fn fft_rows(a: &mut Array2<Complex<f64>>) {
    let n = a.ncols();
    if n == 0 || a.nrows() == 0 {
        return;
    }
    let mut planner = FftPlanner::<f64>::new();
    let plan = planner.plan_fft_forward(n);
    if let Some(buf) = a.as_slice_mut() {
        plan.process(buf);
        return;
    }

    let mut scratch = vec![Complex::new(0.0, 0.0); n];
    for mut row in a.rows_mut() {
        for (dst, src) in scratch.iter_mut().zip(row.iter()) {
            *dst = *src;
        }
        plan.process(&mut scratch);
        row.assign(&ArrayView1::from(scratch.as_slice()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{s, Array2, ShapeBuilder};

    fn ramp(n: usize) -> Array1<Complex<f64>> {
        Array1::from_iter((0..n).map(|i| Complex::new(i as f64, 0.5 * i as f64)))
    }

    #[test]
    fn fft_matches_direct_dft() {
        let x = ramp(17);
        let spec = fft(x.view());
        for (k, got) in spec.iter().enumerate() {
            let want: Complex<f64> = x
                .iter()
                .enumerate()
                .map(|(n, v)| {
                    let phase = -2.0 * core::f64::consts::PI * (k * n) as f64 / 17.0;
                    v * Complex::from_polar(1.0, phase)
                })
                .sum();
            assert_abs_diff_eq!(got.re, want.re, epsilon = 1e-9);
            assert_abs_diff_eq!(got.im, want.im, epsilon = 1e-9);
        }
    }

    #[test]
    fn fft_dc_bin_is_the_sum() {
        let x = ramp(8);
        let spec = fft(x.view());
        assert_abs_diff_eq!(spec[0].re, 28.0, epsilon = 1e-12);
        assert_abs_diff_eq!(spec[0].im, 14.0, epsilon = 1e-12);
    }

    #[test]
    fn rows_match_single_transforms_for_any_layout() {
        let mut a = Array2::from_shape_fn((3, 10), |(r, c)| {
            Complex::new((r * 10 + c) as f64, (c as f64).sin())
        });
        let expected: Vec<_> = a.rows().into_iter().map(|row| fft(row)).collect();

        let mut fortran = Array2::zeros((3, 10).f());
        fortran.assign(&a);
        fft_rows(&mut a);
        fft_rows(&mut fortran);
        for (r, exp) in expected.iter().enumerate() {
            for (got, want) in a.slice(s![r, ..]).iter().zip(exp.iter()) {
                assert_abs_diff_eq!(got.re, want.re, epsilon = 1e-9);
                assert_abs_diff_eq!(got.im, want.im, epsilon = 1e-9);
            }
            for (got, want) in fortran.slice(s![r, ..]).iter().zip(exp.iter()) {
                assert_abs_diff_eq!(got.re, want.re, epsilon = 1e-9);
                assert_abs_diff_eq!(got.im, want.im, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn empty_input_is_a_no_op() {
        let x: Array1<Complex<f64>> = Array1::zeros(0);
        assert!(fft(x.view()).is_empty());
        let mut a: Array2<Complex<f64>> = Array2::zeros((0, 4));
        fft_rows(&mut a);
        assert_eq!(a.dim(), (0, 4));
    }
}
