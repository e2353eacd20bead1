//! Statistical properties of the multi-taper estimators on AR processes.

use approx::assert_relative_eq;
use mtm_rs::signal::ar::{ar_generator, ar_psd, ArConfig, DEFAULT_AR_COEFS};
use mtm_rs::signal::spectral::{
    adaptive_weights, multi_taper_csd, multi_taper_psd, mtm_cross_spectrum, tapered_spectra,
    Bandwidth, CrossWeights, MtmSpectrum, MultiTaperCsdConfig, MultiTaperPsdConfig, Sides,
    TaperWeights, Weighting,
};
use mtm_rs::signal::windows::dpss_windows;
use mtm_rs::Error;
use ndarray::{s, Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustfft::num_complex::Complex;

const PI: f64 = core::f64::consts::PI;

fn ar_series(n: usize, coefs: &[f64], seed: u64) -> Array1<f64> {
    let cfg = ArConfig {
        n,
        coefs: coefs.to_vec(),
        drop_transients: 1000,
        ..Default::default()
    };
    ar_generator(&cfg, &mut StdRng::seed_from_u64(seed))
        .expect("valid AR config")
        .signal
}

// Energy of the one-sided (or two-sided) mean-weighted estimate, integrated over
// frequency, against the time-domain variance.
fn energy_ratio(spectrum: &Array1<f64>, variance: f64) -> f64 {
    spectrum.sum() / spectrum.len() as f64 / variance
}

#[test]
fn two_sided_spectra_conserve_energy() {
    let n = 1 << 16;
    let nw = 4.0;
    let k = 7;
    let tapers = dpss_windows(n, nw, k).expect("dpss");
    let weights = TaperWeights::from_eigenvalues(tapers.eigenvalues());

    let r = ar_series(n, &DEFAULT_AR_COEFS, 1);
    let variance = r.mapv(|v| v * v).mean().expect("non-empty");
    let spectra = tapered_spectra(r.view(), &tapers, Sides::TwoSided).expect("spectra");
    let MtmSpectrum::Auto(sdf) = mtm_cross_spectrum(
        spectra.view(),
        spectra.view(),
        CrossWeights::Shared(&weights),
        Sides::TwoSided,
    )
    .expect("autospectrum") else {
        panic!("self pair must give an autospectrum");
    };
    assert_relative_eq!(energy_ratio(&sdf, variance), 1.0, max_relative = 0.05);

    // Complex series: real AR plus an independent AR in quadrature.
    let c = ar_series(n, &DEFAULT_AR_COEFS, 2);
    let z: Array1<Complex<f64>> = r
        .iter()
        .zip(c.iter())
        .map(|(&re, &im)| Complex::new(re, im))
        .collect();
    let z_variance = z.mapv(|v| v.norm_sqr()).mean().expect("non-empty");
    let spectra = tapered_spectra(z.view(), &tapers, Sides::TwoSided).expect("spectra");
    let MtmSpectrum::Auto(sdf) = mtm_cross_spectrum(
        spectra.view(),
        spectra.view(),
        CrossWeights::Shared(&weights),
        Sides::TwoSided,
    )
    .expect("autospectrum") else {
        panic!("self pair must give an autospectrum");
    };
    assert_relative_eq!(energy_ratio(&sdf, z_variance), 1.0, max_relative = 0.05);
}

#[test]
fn one_sided_psd_integrates_to_variance() {
    let n = 1 << 14;
    let x = ar_series(n, &[0.5], 3);
    let variance = x.mapv(|v| v * v).mean().expect("non-empty");
    let cfg = MultiTaperPsdConfig {
        fs: 1.0,
        ..Default::default()
    };
    let est = multi_taper_psd(x.view().insert_axis(Axis(0)), &cfg).expect("psd");
    // Riemann sum over [0, fs/2] with bin width fs / N.
    let integral = est.psd.row(0).sum() / n as f64;
    assert_relative_eq!(integral, variance, max_relative = 0.05);
}

#[test]
fn output_lengths_follow_sides() {
    let x = ar_series(1001, &[0.5], 4).insert_axis(Axis(0));
    let one = multi_taper_psd(x.view(), &MultiTaperPsdConfig::default()).expect("psd");
    assert_eq!(one.psd.ncols(), 501);
    let two = multi_taper_psd(
        x.view(),
        &MultiTaperPsdConfig {
            sides: Some(Sides::TwoSided),
            ..Default::default()
        },
    )
    .expect("psd");
    assert_eq!(two.psd.ncols(), 1001);
    assert_eq!(two.frequencies.len(), 1001);

    // The shared half of the two estimates differs only by folding.
    for f in 1..500 {
        assert_relative_eq!(one.psd[[0, f]], 2.0 * two.psd[[0, f]], max_relative = 1e-12);
    }
    assert_relative_eq!(one.psd[[0, 0]], two.psd[[0, 0]], max_relative = 1e-12);
}

#[test]
fn mismatched_spectra_are_rejected() {
    let tapers = dpss_windows(128, 3.0, 5).expect("dpss");
    let weights = TaperWeights::from_eigenvalues(tapers.eigenvalues());
    let x = ar_series(128, &[0.5], 5);
    let tx = tapered_spectra(x.view(), &tapers, Sides::TwoSided).expect("spectra");
    let ty = tx.slice(s![.., ..100]).to_owned();
    let err = mtm_cross_spectrum(
        tx.view(),
        ty.view(),
        CrossWeights::Shared(&weights),
        Sides::TwoSided,
    )
    .expect_err("length mismatch");
    assert!(matches!(err, Error::ShapeMismatch { .. }));

    let short = ar_series(127, &[0.5], 6);
    assert!(tapered_spectra(short.view(), &tapers, Sides::TwoSided).is_err());

    assert!(matches!(
        "both".parse::<Sides>(),
        Err(Error::InvalidArg { .. })
    ));
}

#[test]
fn psd_tracks_theoretical_density_for_all_modes() {
    let n = 4096;
    let coefs = [0.5];
    let trials = 10;
    let (_, theory) = ar_psd(&coefs, 1.0, n / 2).expect("theory");
    for weighting in [Weighting::Eigenvalue, Weighting::adaptive()] {
        for jackknife in [false, true] {
            let cfg = MultiTaperPsdConfig {
                fs: 2.0 * PI,
                weighting,
                jackknife,
                ..Default::default()
            };
            let mut ratio_sum = 0.0;
            for trial in 0..trials {
                let x = ar_series(n, &coefs, 100 + trial).insert_axis(Axis(0));
                let est = multi_taper_psd(x.view(), &cfg).expect("psd");
                // One-sided density at fs = 2 pi is 2 sigma |H|^2 / (2 pi).
                let ratios = (1..n / 2).map(|f| est.psd[[0, f]] / (2.0 * theory[f] / (2.0 * PI)));
                ratio_sum += ratios.sum::<f64>() / (n / 2 - 1) as f64;
                if jackknife {
                    let var = est.jackknife_variance.as_ref().expect("requested");
                    assert!(var.iter().all(|v| v.is_finite()));
                }
            }
            let mean_ratio = ratio_sum / trials as f64;
            assert!(
                (0.1..10.0).contains(&mean_ratio),
                "weighting {weighting:?}, jackknife {jackknife}: mean ratio {mean_ratio}"
            );
            assert_relative_eq!(mean_ratio, 1.0, max_relative = 0.1);
        }
    }
}

#[test]
fn csd_tracks_theoretical_density() {
    let n = 4096;
    let coefs = [0.5];
    let (_, theory) = ar_psd(&coefs, 1.0, n / 2).expect("theory");
    for weighting in [Weighting::Eigenvalue, Weighting::adaptive()] {
        let x = ar_series(n, &coefs, 7);
        let pair = ndarray::stack![Axis(0), x, x];
        let est = multi_taper_csd(
            pair.view(),
            &MultiTaperCsdConfig {
                weighting,
                ..Default::default()
            },
        )
        .expect("csd");
        let mean_ratio = (1..n / 2)
            .map(|f| est.csd[[0, 1, f]].re / (2.0 * theory[f] / (2.0 * PI)))
            .sum::<f64>()
            / (n / 2 - 1) as f64;
        assert!((0.1..10.0).contains(&mean_ratio), "mean ratio {mean_ratio}");
        // Identical channels give an identical cross term.
        for f in 0..est.csd.dim().2 {
            assert_relative_eq!(est.csd[[0, 1, f]].re, est.csd[[0, 0, f]].re, max_relative = 1e-9);
        }
    }
}

#[test]
fn ten_channel_regression() {
    let mut rng = StdRng::seed_from_u64(57);
    let data = Array2::from_shape_fn((10, 1000), |_| rng.random_range(-1.0..1.0));
    for weighting in [Weighting::Eigenvalue, Weighting::adaptive()] {
        for jackknife in [false, true] {
            let est = multi_taper_psd(
                data.view(),
                &MultiTaperPsdConfig {
                    weighting,
                    jackknife,
                    ..Default::default()
                },
            )
            .expect("psd");
            assert_eq!(est.psd.dim(), (10, 501));
            assert_eq!(est.jackknife_variance.is_some(), jackknife);
        }
    }
}

#[test]
fn complex_csd_is_hermitian() {
    let n = 512;
    let mut rng = StdRng::seed_from_u64(8);
    let z = Array2::from_shape_fn((3, n), |_| {
        Complex::new(rng.random_range(-1.0..1.0), rng.random_range(-1.0..1.0))
    });
    let est = multi_taper_csd(
        z.view(),
        &MultiTaperCsdConfig {
            bandwidth: Bandwidth::Hz(0.1),
            fs: 1.0,
            weighting: Weighting::adaptive(),
            ..Default::default()
        },
    )
    .expect("csd");
    assert_eq!(est.csd.dim(), (3, 3, n));
    for i in 0..3 {
        for j in 0..3 {
            for f in 0..n {
                assert_eq!(est.csd[[i, j, f]], est.csd[[j, i, f]].conj());
            }
        }
    }
}

#[test]
fn adaptive_weights_on_two_sided_ar_spectra() {
    let n = 2048;
    let tapers = dpss_windows(n, 4.0, 7).expect("dpss");
    let x = ar_series(n, &DEFAULT_AR_COEFS, 9);
    let spectra = tapered_spectra(x.view(), &tapers, Sides::TwoSided).expect("spectra");
    let est = adaptive_weights(spectra.view(), tapers.eigenvalues(), Sides::OneSided)
        .expect("adaptive");
    assert!(est.dof.iter().all(|&d| d > 0.0 && d.is_finite()));
    let MtmSpectrum::Auto(sdf) = mtm_cross_spectrum(
        spectra.view(),
        spectra.view(),
        CrossWeights::Shared(&est.weights),
        Sides::OneSided,
    )
    .expect("autospectrum") else {
        panic!("self pair must give an autospectrum");
    };
    assert_eq!(sdf.len(), n / 2 + 1);
    assert!(sdf.iter().all(|&v| v >= 0.0));
}
