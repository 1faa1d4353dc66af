//! Pair-by-pair Welch coherence used as a reference for the batched kernel.
//!
//! Every node pair of every slice is estimated independently from one-sided
//! cross and auto spectral densities, so the cost is quadratic in the node
//! count with no shared FFTs.

use super::{positive_frequency_count, CoherenceResult, NodeCoherenceConfig};
use crate::error::Error;
use crate::kernel::{ConfigError, ExecInvariantViolation, KernelLifecycle, Read1D, Write1D};
use crate::series::MultiChannelTimeSeries;
use crate::signal::detrend::Detrend;
use crate::signal::traits::PairCoherence1D;
use crate::signal::windows::hamming;
use itertools::iproduct;
use ndarray::{s, Array1, Array5, ArrayView1};
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

fn rfft_real(x: &[f64], nfft: usize) -> Vec<Complex<f64>> {
    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(nfft);
    let mut buf = vec![Complex::new(0.0, 0.0); nfft];
    for (dst, src) in buf.iter_mut().zip(x.iter().copied()) {
        *dst = Complex::new(src, 0.0);
    }
    fft.process(&mut buf);
    buf
}

fn onesided_freqs(nfft: usize, fs: f64) -> Vec<f64> {
    let n_freq = nfft / 2 + 1;
    (0..n_freq).map(|k| k as f64 * fs / nfft as f64).collect()
}

fn onesided_scale(k: usize, nfft: usize) -> f64 {
    if k != 0 && !(nfft.is_multiple_of(2) && k == nfft / 2) {
        2.0
    } else {
        1.0
    }
}

fn segment_starts(len: usize, nfft: usize) -> Vec<usize> {
    (0..len / nfft).map(|seg| seg * nfft).collect()
}

fn tapered_segment(x: &[f64], start: usize, window: &[f64], detrend: Detrend) -> Vec<f64> {
    let mut segment = x[start..start + window.len()].to_vec();
    detrend.apply(&mut segment);
    segment.iter_mut().zip(window).for_each(|(s, w)| *s *= w);
    segment
}

fn welch_impl(x: &[f64], fs: f64, nfft: usize, detrend: Detrend) -> Vec<f64> {
    let starts = segment_starts(x.len(), nfft);
    let window = hamming(nfft, true);
    let win_norm = window.iter().map(|v| v * v).sum::<f64>();
    let n_freq = nfft / 2 + 1;
    let mut accum = vec![0.0; n_freq];

    for &start in &starts {
        let spec = rfft_real(&tapered_segment(x, start, &window, detrend), nfft);
        for (k, a) in accum.iter_mut().enumerate() {
            *a += spec[k].norm_sqr() / (fs * win_norm) * onesided_scale(k, nfft);
        }
    }

    let inv = 1.0 / starts.len() as f64;
    accum.iter_mut().for_each(|v| *v *= inv);
    accum
}

fn csd_impl(x: &[f64], y: &[f64], fs: f64, nfft: usize, detrend: Detrend) -> Vec<Complex<f64>> {
    let starts = segment_starts(x.len().min(y.len()), nfft);
    let window = hamming(nfft, true);
    let win_norm = window.iter().map(|v| v * v).sum::<f64>();
    let n_freq = nfft / 2 + 1;
    let mut accum = vec![Complex::new(0.0, 0.0); n_freq];

    for &start in &starts {
        let xfft = rfft_real(&tapered_segment(x, start, &window, detrend), nfft);
        let yfft = rfft_real(&tapered_segment(y, start, &window, detrend), nfft);
        for (k, a) in accum.iter_mut().enumerate() {
            *a += xfft[k] * yfft[k].conj() / (fs * win_norm) * onesided_scale(k, nfft);
        }
    }

    let inv = 1.0 / starts.len() as f64;
    accum.iter_mut().for_each(|v| *v *= inv);
    accum
}

/// Returns the strictly positive bins only; the DC bin is dropped.
fn coherence_impl(
    x: &[f64],
    y: &[f64],
    config: &PairCoherenceConfig,
) -> (Vec<f64>, Vec<f64>) {
    let fs = config.sample_rate / super::MILLISECONDS_PER_SECOND;
    let pxy = csd_impl(x, y, fs, config.nfft, config.detrend);
    let pxx = welch_impl(x, fs, config.nfft, config.detrend);
    let pyy = welch_impl(y, fs, config.nfft, config.detrend);
    let coh = pxy
        .iter()
        .zip(pxx.iter().zip(pyy.iter()))
        .skip(1)
        .map(|(pxy, (pxx, pyy))| {
            let denom = pxx * pyy;
            if denom <= 0.0 {
                return 0.0;
            }
            let num = if config.imaginary {
                pxy.im * pxy.im
            } else {
                pxy.norm_sqr()
            };
            num / denom
        })
        .collect();
    let freqs = onesided_freqs(config.nfft, fs).split_off(1);
    (freqs, coh)
}

/// Constructor config for [`PairCoherenceKernel`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairCoherenceConfig {
    /// Sampling rate of the series in samples per second.
    pub sample_rate: f64,
    /// Segment and FFT length.
    pub nfft: usize,
    /// Trend removed from each segment.
    pub detrend: Detrend,
    /// Keep only the imaginary part of the cross spectrum.
    pub imaginary: bool,
}

/// Trait-first pairwise coherence kernel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairCoherenceKernel {
    config: PairCoherenceConfig,
}

impl PairCoherenceKernel {
    fn check_inputs(&self, x: &[f64], y: &[f64]) -> Result<(), ExecInvariantViolation> {
        if x.len() != y.len() {
            return Err(ExecInvariantViolation::LengthMismatch {
                arg: "y",
                expected: x.len(),
                got: y.len(),
            });
        }
        if x.len() < self.config.nfft {
            return Err(ExecInvariantViolation::InsufficientData {
                samples: x.len(),
                nfft: self.config.nfft,
            });
        }
        Ok(())
    }
}

impl KernelLifecycle for PairCoherenceKernel {
    type Config = PairCoherenceConfig;

    fn try_new(config: Self::Config) -> Result<Self, ConfigError> {
        if !config.sample_rate.is_finite() || config.sample_rate <= 0.0 {
            return Err(ConfigError::InvalidArgument {
                arg: "sample_rate",
                reason: "sample_rate must be finite and > 0",
            });
        }
        if config.nfft == 0 {
            return Err(ConfigError::ShapeMismatch {
                arg: "nfft",
                reason: "nfft must be > 0",
            });
        }
        Ok(Self { config })
    }
}

impl PairCoherence1D<f64> for PairCoherenceKernel {
    fn run_into<I1, I2, OF, OC>(
        &self,
        x: &I1,
        y: &I2,
        freqs: &mut OF,
        coherence: &mut OC,
    ) -> Result<(), ExecInvariantViolation>
    where
        I1: Read1D<f64> + ?Sized,
        I2: Read1D<f64> + ?Sized,
        OF: Write1D<f64> + ?Sized,
        OC: Write1D<f64> + ?Sized,
    {
        let x = x.read_slice().map_err(ExecInvariantViolation::from)?;
        let y = y.read_slice().map_err(ExecInvariantViolation::from)?;
        self.check_inputs(x, y)?;

        let expected = positive_frequency_count(self.config.nfft);
        let f_out = freqs
            .write_slice_mut()
            .map_err(ExecInvariantViolation::from)?;
        if f_out.len() != expected {
            return Err(ExecInvariantViolation::LengthMismatch {
                arg: "freqs",
                expected,
                got: f_out.len(),
            });
        }
        let c_out = coherence
            .write_slice_mut()
            .map_err(ExecInvariantViolation::from)?;
        if c_out.len() != expected {
            return Err(ExecInvariantViolation::LengthMismatch {
                arg: "coherence",
                expected,
                got: c_out.len(),
            });
        }

        let (f, c) = coherence_impl(x, y, &self.config);
        f_out.copy_from_slice(&f);
        c_out.copy_from_slice(&c);
        Ok(())
    }

    fn run_alloc<I1, I2>(
        &self,
        x: &I1,
        y: &I2,
    ) -> Result<(Vec<f64>, Vec<f64>), ExecInvariantViolation>
    where
        I1: Read1D<f64> + ?Sized,
        I2: Read1D<f64> + ?Sized,
    {
        let x = x.read_slice().map_err(ExecInvariantViolation::from)?;
        let y = y.read_slice().map_err(ExecInvariantViolation::from)?;
        self.check_inputs(x, y)?;
        Ok(coherence_impl(x, y, &self.config))
    }
}

/// Node coherence computed one node pair at a time.
///
/// Produces the same layout as [`super::node_coherence`] and is intended for
/// cross-checking it.
pub fn node_coherence_naive(
    series: &MultiChannelTimeSeries,
    config: NodeCoherenceConfig,
) -> Result<CoherenceResult, Error> {
    let pair = PairCoherenceKernel::try_new(PairCoherenceConfig {
        sample_rate: series.sample_rate(),
        nfft: config.nfft,
        detrend: config.detrend,
        imaginary: config.imaginary,
    })?;
    let [_, n_sv, n_nodes, n_modes] = series.shape();
    let n_freq = positive_frequency_count(config.nfft);
    let mut coherence = Array5::<f64>::zeros([n_freq, n_nodes, n_nodes, n_sv, n_modes]);
    let mut frequencies = Array1::<f64>::zeros(n_freq);

    for (sv, mode) in iproduct!(0..n_sv, 0..n_modes) {
        let columns: Vec<Vec<f64>> = series
            .slice(sv, mode)
            .columns()
            .into_iter()
            .map(|c| c.to_vec())
            .collect();
        for (i, j) in iproduct!(0..n_nodes, 0..n_nodes) {
            let (f, c) = pair.run_alloc(&columns[i], &columns[j])?;
            coherence
                .slice_mut(s![.., i, j, sv, mode])
                .assign(&ArrayView1::from(&c[..]));
            frequencies.assign(&ArrayView1::from(&f[..]));
        }
    }

    Ok(CoherenceResult {
        coherence,
        frequencies,
    })
}
