//! Trait interfaces for multi-taper capabilities.
//!
//! These traits define the trait-first API shape used by the kernels.

use ndarray::{Array1, Array2};
use rustfft::num_complex::Complex;

use crate::kernel::{ExecInvariantViolation, Read1D, Read2D, Write1D};
use crate::signal::spectral::{MultiTaperCsd, MultiTaperPsd, WeightEstimate};
use crate::signal::windows::TaperSet;

/// DPSS taper generation capability.
pub trait DpssGenerate {
    /// Generate the configured taper set.
    fn run_alloc(&self) -> Result<TaperSet, ExecInvariantViolation>;
}

/// Per-taper Fourier transform capability.
pub trait TaperedSpectra1D<T> {
    /// Transform one series under every taper, `K x L` output.
    fn run_alloc<I>(&self, input: &I) -> Result<Array2<Complex<f64>>, ExecInvariantViolation>
    where
        I: Read1D<T> + ?Sized;
}

/// Taper weight estimation capability.
pub trait TaperWeighting {
    /// Estimate weights and degrees of freedom from `K x L` tapered spectra.
    fn run_alloc<I>(&self, spectra: &I) -> Result<WeightEstimate, ExecInvariantViolation>
    where
        I: Read2D<Complex<f64>> + ?Sized;
}

/// Weighted autospectrum combination capability.
pub trait MtmCombine {
    /// Combine tapered spectra into a caller-provided output buffer.
    fn run_into<I, O>(&self, spectra: &I, out: &mut O) -> Result<(), ExecInvariantViolation>
    where
        I: Read2D<Complex<f64>> + ?Sized,
        O: Write1D<f64> + ?Sized;

    /// Combine tapered spectra and allocate output.
    fn run_alloc<I>(&self, spectra: &I) -> Result<Array1<f64>, ExecInvariantViolation>
    where
        I: Read2D<Complex<f64>> + ?Sized;
}

/// Multi-series power spectral density capability.
pub trait MultiTaperPsd2D<T> {
    /// Estimate the PSD of every row of a `M x N` input.
    fn run_alloc<I>(&self, signals: &I) -> Result<MultiTaperPsd, ExecInvariantViolation>
    where
        I: Read2D<T> + ?Sized;
}

/// Multi-series cross-spectral density capability.
pub trait MultiTaperCsd2D<T> {
    /// Estimate the `M x M` CSD matrix of a `M x N` input.
    fn run_alloc<I>(&self, signals: &I) -> Result<MultiTaperCsd, ExecInvariantViolation>
    where
        I: Read2D<T> + ?Sized;
}

/// Filter frequency response capability.
pub trait FreqResponse1D {
    /// Evaluate the response into caller-provided frequency and response buffers.
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
        OH: Write1D<Complex<f64>> + ?Sized;

    /// Evaluate the response and allocate output.
    fn run_alloc<I1, I2>(
        &self,
        b: &I1,
        a: &I2,
    ) -> Result<(Array1<f64>, Array1<Complex<f64>>), ExecInvariantViolation>
    where
        I1: Read1D<f64> + ?Sized,
        I2: Read1D<f64> + ?Sized;
}
