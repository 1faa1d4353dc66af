//! Tapered per-segment FFT.

use super::segment::SegmentBatch;
use crate::kernel::ExecInvariantViolation;
use crate::signal::detrend::Detrend;
use crate::signal::windows::hamming;
use core::fmt;
use ndarray::{Array1, Array3, ArrayView3};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// Scale from the sample rate to the sample spacing of the time axis.
///
/// Series are recorded with a millisecond time axis, so the spacing passed to
/// [`fft_frequencies`] is `1000 / sample_rate`.
pub const MILLISECONDS_PER_SECOND: f64 = 1e3;

/// Sample spacing used for the frequency axis of a series.
pub fn sample_spacing(sample_rate: f64) -> f64 {
    MILLISECONDS_PER_SECOND / sample_rate
}

/// Discrete Fourier transform sample frequencies in standard FFT ordering.
///
/// Matches `numpy.fft.fftfreq(n, d)`: `[0, 1, ..., ceil(n/2) - 1, -floor(n/2), ..., -1] / (n d)`.
pub fn fft_frequencies(n: usize, d: f64) -> Array1<f64> {
    if n == 0 {
        return Array1::zeros(0);
    }
    let val = 1.0 / (n as f64 * d);
    let positive = n.div_ceil(2);
    Array1::from_shape_fn(n, |k| {
        if k < positive {
            k as f64 * val
        } else {
            -((n - k) as f64) * val
        }
    })
}

/// Applies the Hamming taper and FFT to every block of a [`SegmentBatch`].
///
/// The window and FFT plan are built once and reused for every slice of one
/// invocation.
pub struct SpectralTransform {
    window: Vec<f64>,
    detrend: Detrend,
    fft: Arc<dyn Fft<f64>>,
}

impl fmt::Debug for SpectralTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectralTransform")
            .field("nfft", &self.window.len())
            .field("detrend", &self.detrend)
            .finish()
    }
}

impl SpectralTransform {
    /// Plan a forward transform of length `nfft` with a symmetric Hamming taper.
    pub fn new(nfft: usize, detrend: Detrend) -> Self {
        let mut planner = FftPlanner::<f64>::new();
        Self {
            window: hamming(nfft, true),
            detrend,
            fft: planner.plan_fft_forward(nfft),
        }
    }

    /// Transform length.
    pub fn nfft(&self) -> usize {
        self.window.len()
    }

    /// Taper applied to each block.
    pub fn window(&self) -> &[f64] {
        &self.window
    }

    /// Detrend, taper and transform each block.
    pub fn apply(&self, batch: &SegmentBatch) -> Result<SpectralBatch, ExecInvariantViolation> {
        let blocks = batch.blocks();
        let (nodes, segments, nfft) = blocks.dim();
        if nfft != self.nfft() {
            return Err(ExecInvariantViolation::LengthMismatch {
                arg: "segments",
                expected: self.nfft(),
                got: nfft,
            });
        }

        let mut spectra = Array3::<Complex<f64>>::zeros((nodes, segments, nfft));
        let mut block = vec![0.0; nfft];
        for (src, mut dst) in blocks.rows().into_iter().zip(spectra.rows_mut()) {
            block.iter_mut().zip(src.iter()).for_each(|(b, s)| *b = *s);
            self.detrend.apply(&mut block);
            dst.iter_mut()
                .zip(block.iter().zip(self.window.iter()))
                .for_each(|(d, (x, w))| *d = Complex::new(x * w, 0.0));
        }

        // Every block is contiguous and `nfft` long, so one call transforms them all.
        let buffer = spectra
            .as_slice_mut()
            .ok_or(ExecInvariantViolation::InvalidState {
                reason: "spectral batch must be contiguous",
            })?;
        let mut scratch = vec![Complex::new(0.0, 0.0); self.fft.get_inplace_scratch_len()];
        self.fft.process_with_scratch(buffer, &mut scratch);

        Ok(SpectralBatch { spectra })
    }
}

/// Complex spectra of one slice, laid out `(node, segment, frequency)`.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralBatch {
    spectra: Array3<Complex<f64>>,
}

impl SpectralBatch {
    /// Borrow the spectra.
    pub fn spectra(&self) -> ArrayView3<'_, Complex<f64>> {
        self.spectra.view()
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.spectra.dim().0
    }

    /// Number of segments per node.
    pub fn segment_count(&self) -> usize {
        self.spectra.dim().1
    }

    /// Number of frequency bins, equal to `nfft`.
    pub fn nfft(&self) -> usize {
        self.spectra.dim().2
    }
}
