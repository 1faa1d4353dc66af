//! Pairwise Welch coherence across the nodes of a four-axis time series.
//!
//! Every `(state_variable, mode)` slice is cut into non-overlapping blocks of
//! `nfft` samples, tapered with a symmetric Hamming window and transformed.
//! Cross and auto spectra are averaged over the blocks before normalization,
//! and only the strictly positive frequency bins are kept. The result is laid
//! out `(frequency, node, node, state_variable, mode)`.

use crate::error::Error;
use crate::kernel::{ConfigError, ExecInvariantViolation, KernelLifecycle, Write1D};
use crate::series::MultiChannelTimeSeries;
use crate::signal::detrend::Detrend;
use crate::signal::traits::{NodeCoherence4D, ResultShapeQuery};
use itertools::iproduct;
use ndarray::{s, Array1, Array3, Array5, ArrayBase, ArrayView3, DataMut, Ix5};

mod aggregate;
#[cfg(any(test, feature = "oracle"))]
mod naive;
mod segment;
mod select;
mod transform;

pub use aggregate::CrossCoherence;
#[cfg(any(test, feature = "oracle"))]
pub use naive::{node_coherence_naive, PairCoherenceConfig, PairCoherenceKernel};
pub use segment::{SegmentBatch, Segmenter};
pub use select::{positive_frequency_count, FrequencySelection, FrequencySelector};
pub use transform::{
    fft_frequencies, sample_spacing, SpectralBatch, SpectralTransform, MILLISECONDS_PER_SECOND,
};

/// Segment length used when none is given.
pub const DEFAULT_NFFT: usize = 256;

/// Constructor config for [`NodeCoherenceKernel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct NodeCoherenceConfig {
    /// Segment and FFT length in samples.
    pub nfft: usize,
    /// Keep only the imaginary part of the averaged cross spectrum.
    pub imaginary: bool,
    /// Trend removed from each segment before tapering.
    pub detrend: Detrend,
}

impl Default for NodeCoherenceConfig {
    fn default() -> Self {
        Self {
            nfft: DEFAULT_NFFT,
            imaginary: false,
            detrend: Detrend::None,
        }
    }
}

/// Coherence tensor and its frequency axis.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CoherenceResult {
    /// Coherence laid out `(frequency, node, node, state_variable, mode)`.
    pub coherence: Array5<f64>,
    /// Strictly increasing positive frequencies, one per leading row.
    pub frequencies: Array1<f64>,
}

impl CoherenceResult {
    /// Shapes of both outputs.
    pub fn shape(&self) -> CoherenceShape {
        let mut coherence = [0usize; 5];
        coherence.copy_from_slice(self.coherence.shape());
        CoherenceShape {
            coherence,
            frequencies: [self.frequencies.len()],
        }
    }

    /// `(frequency, node, node)` block of one slice.
    ///
    /// Panics if `state_variable` or `mode` is out of range.
    pub fn slice(&self, state_variable: usize, mode: usize) -> ArrayView3<'_, f64> {
        self.coherence.slice(s![.., .., .., state_variable, mode])
    }
}

/// Output shapes of a coherence run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CoherenceShape {
    /// `(frequency, node, node, state_variable, mode)`.
    pub coherence: [usize; 5],
    /// `(frequency,)`.
    pub frequencies: [usize; 1],
}

impl CoherenceShape {
    /// Bytes taken by both outputs as 64-bit floats, `None` on overflow.
    pub fn byte_size(&self) -> Option<usize> {
        let coherence = self
            .coherence
            .iter()
            .try_fold(1usize, |acc, d| acc.checked_mul(*d))?;
        let frequencies = self
            .frequencies
            .iter()
            .try_fold(1usize, |acc, d| acc.checked_mul(*d))?;
        coherence
            .checked_add(frequencies)?
            .checked_mul(size_of::<f64>())
    }
}

/// Trait-first node coherence kernel.
///
/// Slices are processed one at a time. Besides the output, a slice holds its
/// segmented samples, their spectra (`node × segment × nfft` complex) and the
/// averaged cross spectra (`node² × nfft` complex). With the `rayon` feature
/// every worker holds one slice and finished slices are buffered until all
/// are done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeCoherenceKernel {
    nfft: usize,
    imaginary: bool,
    detrend: Detrend,
}

impl NodeCoherenceKernel {
    /// Segment and FFT length.
    pub fn nfft(&self) -> usize {
        self.nfft
    }

    /// Whether only the imaginary part of the cross spectrum is kept.
    pub fn imaginary(&self) -> bool {
        self.imaginary
    }

    /// Trend removed from each segment.
    pub fn detrend(&self) -> Detrend {
        self.detrend
    }

    fn output_shape(&self, [_, n_sv, n_nodes, n_modes]: [usize; 4]) -> [usize; 5] {
        [
            positive_frequency_count(self.nfft),
            n_nodes,
            n_nodes,
            n_sv,
            n_modes,
        ]
    }

    fn slice_coherence(
        &self,
        series: &MultiChannelTimeSeries,
        transform: &SpectralTransform,
        aggregator: &CrossCoherence,
        state_variable: usize,
        mode: usize,
    ) -> Result<Array3<f64>, ExecInvariantViolation> {
        let batch = Segmenter::new(self.nfft).segment(series.slice(state_variable, mode))?;
        let spectra = transform.apply(&batch)?;
        tracing::trace!(
            state_variable,
            mode,
            segments = batch.segment_count(),
            "slice spectra"
        );
        Ok(aggregator.coherence(&spectra))
    }

    #[cfg(not(feature = "rayon"))]
    fn fill_slices<S>(
        &self,
        series: &MultiChannelTimeSeries,
        selector: &FrequencySelector,
        selection: &FrequencySelection,
        coherence: &mut ArrayBase<S, Ix5>,
    ) -> Result<(), ExecInvariantViolation>
    where
        S: DataMut<Elem = f64>,
    {
        let transform = SpectralTransform::new(self.nfft, self.detrend);
        let aggregator = CrossCoherence::new(self.imaginary);
        let [_, n_sv, _, n_modes] = series.shape();
        for (sv, mode) in iproduct!(0..n_sv, 0..n_modes) {
            let block = self.slice_coherence(series, &transform, &aggregator, sv, mode)?;
            selector.scatter(
                selection,
                block.view(),
                coherence.slice_mut(s![.., .., .., sv, mode]),
            )?;
        }
        Ok(())
    }

    #[cfg(feature = "rayon")]
    fn fill_slices<S>(
        &self,
        series: &MultiChannelTimeSeries,
        selector: &FrequencySelector,
        selection: &FrequencySelection,
        coherence: &mut ArrayBase<S, Ix5>,
    ) -> Result<(), ExecInvariantViolation>
    where
        S: DataMut<Elem = f64>,
    {
        use rayon::prelude::*;

        let transform = SpectralTransform::new(self.nfft, self.detrend);
        let aggregator = CrossCoherence::new(self.imaginary);
        let [_, n_sv, _, n_modes] = series.shape();
        let slices: Vec<(usize, usize)> = iproduct!(0..n_sv, 0..n_modes).collect();
        let blocks = slices
            .into_par_iter()
            .map(|(sv, mode)| {
                self.slice_coherence(series, &transform, &aggregator, sv, mode)
                    .map(|block| (sv, mode, block))
            })
            .collect::<Result<Vec<_>, _>>()?;
        for (sv, mode, block) in blocks {
            selector.scatter(
                selection,
                block.view(),
                coherence.slice_mut(s![.., .., .., sv, mode]),
            )?;
        }
        Ok(())
    }
}

impl KernelLifecycle for NodeCoherenceKernel {
    type Config = NodeCoherenceConfig;

    fn try_new(config: Self::Config) -> Result<Self, ConfigError> {
        if config.nfft == 0 {
            return Err(ConfigError::ShapeMismatch {
                arg: "nfft",
                reason: "nfft must be > 0",
            });
        }
        if !config.nfft.is_power_of_two() {
            tracing::info!(
                nfft = config.nfft,
                "nfft is not a power of two, the FFT will be slower"
            );
        }
        Ok(Self {
            nfft: config.nfft,
            imaginary: config.imaginary,
            detrend: config.detrend,
        })
    }
}

impl NodeCoherence4D for NodeCoherenceKernel {
    fn run_into<S, OF>(
        &self,
        series: &MultiChannelTimeSeries,
        coherence: &mut ArrayBase<S, Ix5>,
        freqs: &mut OF,
    ) -> Result<(), ExecInvariantViolation>
    where
        S: DataMut<Elem = f64>,
        OF: Write1D<f64> + ?Sized,
    {
        let segments = Segmenter::new(self.nfft).segment_count(series.time_len())?;

        let expected = self.output_shape(series.shape());
        if coherence.shape() != expected.as_slice() {
            return Err(ExecInvariantViolation::ShapeMismatch {
                arg: "coherence",
                expected: expected.to_vec(),
                got: coherence.shape().to_vec(),
            });
        }
        let f_out = freqs
            .write_slice_mut()
            .map_err(ExecInvariantViolation::from)?;
        if f_out.len() != expected[0] {
            return Err(ExecInvariantViolation::LengthMismatch {
                arg: "freqs",
                expected: expected[0],
                got: f_out.len(),
            });
        }

        let selector = FrequencySelector::new(self.nfft);
        let spacing = sample_spacing(series.sample_rate());
        let selection = selector.select(fft_frequencies(self.nfft, spacing).view())?;

        tracing::debug!(
            shape = ?expected,
            segments,
            imaginary = self.imaginary,
            detrend = ?self.detrend,
            "node coherence"
        );
        self.fill_slices(series, &selector, &selection, coherence)?;

        f_out
            .iter_mut()
            .zip(selection.frequencies().iter())
            .for_each(|(dst, f)| *dst = *f);
        Ok(())
    }

    fn run_alloc(
        &self,
        series: &MultiChannelTimeSeries,
    ) -> Result<CoherenceResult, ExecInvariantViolation> {
        Segmenter::new(self.nfft).segment_count(series.time_len())?;
        let shape = self.output_shape(series.shape());
        let mut coherence = Array5::<f64>::zeros(shape);
        let mut frequencies = Array1::<f64>::zeros(shape[0]);
        self.run_into(series, &mut coherence, &mut frequencies)?;
        Ok(CoherenceResult {
            coherence,
            frequencies,
        })
    }
}

impl ResultShapeQuery for NodeCoherenceKernel {
    fn result_shape(&self, input_shape: &[usize]) -> Result<CoherenceShape, ConfigError> {
        let input: [usize; 4] = input_shape
            .try_into()
            .map_err(|_| ConfigError::ShapeMismatch {
                arg: "input_shape",
                reason: "expected (time, state_variable, node, mode)",
            })?;
        let coherence = self.output_shape(input);
        Ok(CoherenceShape {
            coherence,
            frequencies: [coherence[0]],
        })
    }
}

/// Node coherence analysis bound to one time series.
///
/// ```
/// use ndarray::Array4;
/// use node_coherence::{MultiChannelTimeSeries, NodeCoherence};
///
/// let data = Array4::from_shape_fn((512, 1, 2, 1), |(t, _, n, _)| {
///     ((t * (n + 1)) as f64 * 0.1).sin()
/// });
/// let series = MultiChannelTimeSeries::try_new(data, 1000.0).unwrap();
/// let result = NodeCoherence::new(&series).evaluate().unwrap();
/// assert_eq!(result.coherence.shape(), &[128, 2, 2, 1, 1]);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct NodeCoherence<'a> {
    time_series: &'a MultiChannelTimeSeries,
    config: NodeCoherenceConfig,
}

impl<'a> NodeCoherence<'a> {
    /// Analysis with the default configuration.
    pub fn new(time_series: &'a MultiChannelTimeSeries) -> Self {
        Self::with_config(time_series, NodeCoherenceConfig::default())
    }

    /// Analysis with an explicit configuration.
    pub fn with_config(time_series: &'a MultiChannelTimeSeries, config: NodeCoherenceConfig) -> Self {
        Self {
            time_series,
            config,
        }
    }

    /// Replace the segment length.
    pub fn with_nfft(mut self, nfft: usize) -> Self {
        self.config.nfft = nfft;
        self
    }

    /// The bound time series.
    pub fn time_series(&self) -> &'a MultiChannelTimeSeries {
        self.time_series
    }

    /// Active configuration.
    pub fn config(&self) -> NodeCoherenceConfig {
        self.config
    }

    fn kernel(&self) -> Result<NodeCoherenceKernel, Error> {
        Ok(NodeCoherenceKernel::try_new(self.config)?)
    }

    /// Compute coherence for every node pair of every slice.
    pub fn evaluate(&self) -> Result<CoherenceResult, Error> {
        let result = self.kernel()?.run_alloc(self.time_series)?;
        let (min, max) = result
            .coherence
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(*v), hi.max(*v))
            });
        tracing::debug!(
            shape = ?result.coherence.shape(),
            min,
            max,
            "coherence result"
        );
        Ok(result)
    }

    /// Output shapes for an input of `input_shape`.
    pub fn result_shape(&self, input_shape: &[usize]) -> Result<CoherenceShape, Error> {
        Ok(self.kernel()?.result_shape(input_shape)?)
    }

    /// Bytes of output for an input of `input_shape`.
    pub fn result_size(&self, input_shape: &[usize]) -> Result<usize, Error> {
        Ok(self.kernel()?.result_size(input_shape)?)
    }

    /// Bytes of output including intermediates, equal to [`Self::result_size`].
    pub fn extended_result_size(&self, input_shape: &[usize]) -> Result<usize, Error> {
        Ok(self.kernel()?.extended_result_size(input_shape)?)
    }
}

/// Coherence of every node pair of `series` with segments of `nfft` samples.
pub fn node_coherence(
    series: &MultiChannelTimeSeries,
    nfft: usize,
) -> Result<CoherenceResult, Error> {
    NodeCoherence::new(series).with_nfft(nfft).evaluate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{Array2, Array4, Axis};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn noise_series(shape: [usize; 4], seed: u64) -> MultiChannelTimeSeries {
        let mut rng = StdRng::seed_from_u64(seed);
        let data = Array4::from_shape_fn(shape, |_| rng.random_range(-1.0..1.0));
        MultiChannelTimeSeries::try_new(data, 1000.0).expect("valid series")
    }

    fn assert_close(a: &CoherenceResult, b: &CoherenceResult, eps: f64) {
        assert_eq!(a.coherence.shape(), b.coherence.shape());
        for (x, y) in a.coherence.iter().zip(b.coherence.iter()) {
            assert_abs_diff_eq!(x, y, epsilon = eps);
        }
        for (x, y) in a.frequencies.iter().zip(b.frequencies.iter()) {
            assert_abs_diff_eq!(x, y, epsilon = 1e-12);
        }
    }

    #[test]
    fn sinusoid_and_copy_are_fully_coherent() {
        let mut rng = StdRng::seed_from_u64(42);
        let data = Array4::from_shape_fn((1024, 1, 4, 1), |(t, _, n, _)| {
            let tone = (2.0 * core::f64::consts::PI * 40.0 * t as f64 / 1000.0).sin();
            match n {
                0 | 1 => tone,
                _ => rng.random_range(-1.0..1.0),
            }
        });
        // Node 1 repeats node 0 with the same noise floor.
        let mut data = data;
        let floor: Vec<f64> = (0..1024).map(|_| 0.1 * rng.random_range(-1.0..1.0)).collect();
        for t in 0..1024 {
            data[[t, 0, 0, 0]] += floor[t];
            data[[t, 0, 1, 0]] += floor[t];
        }
        let series = MultiChannelTimeSeries::try_new(data, 1000.0).expect("series");

        let result = node_coherence(&series, 256).expect("coherence");
        assert_eq!(result.coherence.shape(), &[128, 4, 4, 1, 1]);
        assert_eq!(result.frequencies.len(), 128);

        for f in 0..128 {
            assert_abs_diff_eq!(result.coherence[[f, 0, 1, 0, 0]], 1.0, epsilon = 1e-9);
            for n in 0..4 {
                assert_abs_diff_eq!(result.coherence[[f, n, n, 0, 0]], 1.0, epsilon = 1e-9);
            }
        }
        assert!(result.frequencies.iter().all(|f| *f > 0.0));
        assert!(result
            .frequencies
            .windows(2)
            .into_iter()
            .all(|w| w[0] < w[1]));
        assert_abs_diff_eq!(result.frequencies[127], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn independent_noise_has_low_mean_coherence() {
        let series = noise_series([64 * 32, 1, 3, 1], 7);
        let result = node_coherence(&series, 64).expect("coherence");
        let block = result.slice(0, 0);
        let mut total = 0.0;
        let mut count = 0usize;
        for ((_, i, j), v) in block.indexed_iter() {
            if i != j {
                total += v;
                count += 1;
            }
        }
        assert!(total / (count as f64) < 0.3);
    }

    #[test]
    fn short_series_is_insufficient() {
        let series = noise_series([100, 1, 2, 1], 1);
        let err = node_coherence(&series, 256).expect_err("too short");
        assert_eq!(
            err,
            Error::InsufficientData {
                samples: 100,
                nfft: 256
            }
        );
        assert_eq!(
            err.to_string(),
            "Not enough time points (100) to compute an FFT, given a window size of nfft=256."
        );
    }

    #[test]
    fn shape_query_matches_evaluation() {
        let series = noise_series([1024, 2, 3, 2], 3);
        let analysis = NodeCoherence::new(&series);
        let shape = analysis
            .result_shape(&series.shape())
            .expect("shape query");
        assert_eq!(shape.coherence, [128, 3, 3, 2, 2]);
        assert_eq!(shape.frequencies, [128]);

        let result = analysis.evaluate().expect("coherence");
        assert_eq!(result.shape(), shape);
    }

    #[test]
    fn result_size_counts_both_outputs() {
        let series = noise_series([1024, 1, 4, 1], 3);
        let analysis = NodeCoherence::new(&series);
        let size = analysis.result_size(&[1024, 1, 4, 1]).expect("size");
        assert_eq!(size, (128 * 4 * 4 + 128) * 8);
        assert_eq!(
            analysis
                .extended_result_size(&[1024, 1, 4, 1])
                .expect("extended size"),
            size
        );
        assert!(matches!(
            analysis.result_shape(&[1024, 4, 1]),
            Err(Error::ShapeMismatch { .. })
        ));
        let huge = [1, usize::MAX, usize::MAX, 1];
        assert!(matches!(
            analysis.result_size(&huge),
            Err(Error::InvalidArg { .. })
        ));
    }

    #[test]
    fn zero_nfft_is_rejected() {
        assert!(matches!(
            NodeCoherenceKernel::try_new(NodeCoherenceConfig {
                nfft: 0,
                ..NodeCoherenceConfig::default()
            }),
            Err(ConfigError::ShapeMismatch { arg: "nfft", .. })
        ));
        let series = noise_series([64, 1, 2, 1], 1);
        assert!(matches!(
            node_coherence(&series, 0),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn run_into_checks_output_buffers() {
        let series = noise_series([128, 1, 2, 1], 5);
        let kernel = NodeCoherenceKernel::try_new(NodeCoherenceConfig {
            nfft: 32,
            ..NodeCoherenceConfig::default()
        })
        .expect("kernel");

        let mut coherence = Array5::<f64>::zeros([16, 2, 2, 1, 1]);
        let mut freqs = vec![0.0; 16];
        kernel
            .run_into(&series, &mut coherence, &mut freqs)
            .expect("run_into");
        let alloc = kernel.run_alloc(&series).expect("run_alloc");
        assert_eq!(coherence, alloc.coherence);
        assert_eq!(freqs, alloc.frequencies.to_vec());

        let mut wrong = Array5::<f64>::zeros([17, 2, 2, 1, 1]);
        let err = kernel
            .run_into(&series, &mut wrong, &mut freqs)
            .expect_err("wrong coherence shape");
        assert_eq!(
            err,
            ExecInvariantViolation::ShapeMismatch {
                arg: "coherence",
                expected: vec![16, 2, 2, 1, 1],
                got: vec![17, 2, 2, 1, 1],
            }
        );

        let mut short = vec![0.0; 15];
        let err = kernel
            .run_into(&series, &mut coherence, &mut short)
            .expect_err("wrong freqs length");
        assert!(matches!(
            err,
            ExecInvariantViolation::LengthMismatch { arg: "freqs", .. }
        ));
    }

    #[test]
    fn non_power_of_two_nfft_is_supported() {
        let series = noise_series([400, 1, 2, 1], 9);
        let result = node_coherence(&series, 100).expect("coherence");
        assert_eq!(result.coherence.shape(), &[50, 2, 2, 1, 1]);
        assert_abs_diff_eq!(result.frequencies[49], 0.5, epsilon = 1e-12);

        let odd = node_coherence(&series, 99).expect("coherence");
        assert_eq!(odd.coherence.shape(), &[49, 2, 2, 1, 1]);
    }

    #[test]
    fn slices_are_computed_independently() {
        let series = noise_series([512, 2, 3, 2], 17);
        let full = node_coherence(&series, 64).expect("coherence");

        for (sv, mode) in iproduct!(0..2, 0..2) {
            let single = series
                .data()
                .slice(s![.., sv..sv + 1, .., mode..mode + 1])
                .to_owned();
            let single = MultiChannelTimeSeries::try_new(single, series.sample_rate())
                .expect("single slice");
            let alone = node_coherence(&single, 64).expect("coherence");
            for (a, b) in full.slice(sv, mode).iter().zip(alone.slice(0, 0).iter()) {
                assert_abs_diff_eq!(a, b, epsilon = 1e-15);
            }
        }
    }

    #[test]
    fn input_series_is_not_modified() {
        let series = noise_series([256, 1, 2, 1], 23);
        let before = series.data().to_owned();
        let config = NodeCoherenceConfig {
            nfft: 64,
            detrend: Detrend::Linear,
            ..NodeCoherenceConfig::default()
        };
        NodeCoherence::with_config(&series, config)
            .evaluate()
            .expect("coherence");
        assert_eq!(series.data(), before.view());
    }

    #[test]
    fn linear_detrend_ignores_ramps() {
        let series = noise_series([512, 1, 3, 1], 31);
        let ramped = series.data().to_owned()
            + &Array4::from_shape_fn((512, 1, 3, 1), |(t, _, n, _)| {
                0.01 * t as f64 * (n + 1) as f64 - 2.0
            });
        let ramped = MultiChannelTimeSeries::try_new(ramped, 1000.0).expect("series");
        let config = NodeCoherenceConfig {
            nfft: 64,
            detrend: Detrend::Linear,
            ..NodeCoherenceConfig::default()
        };
        let a = NodeCoherence::with_config(&series, config)
            .evaluate()
            .expect("plain");
        let b = NodeCoherence::with_config(&ramped, config)
            .evaluate()
            .expect("ramped");
        assert_close(&a, &b, 1e-8);
    }

    #[test]
    fn batched_kernel_agrees_with_pairwise_reference() {
        let series = noise_series([512, 2, 3, 1], 77);
        for config in [
            NodeCoherenceConfig {
                nfft: 64,
                ..NodeCoherenceConfig::default()
            },
            NodeCoherenceConfig {
                nfft: 50,
                detrend: Detrend::Linear,
                ..NodeCoherenceConfig::default()
            },
            NodeCoherenceConfig {
                nfft: 64,
                imaginary: true,
                detrend: Detrend::Constant,
            },
        ] {
            let fast = NodeCoherence::with_config(&series, config)
                .evaluate()
                .expect("batched");
            let reference = node_coherence_naive(&series, config).expect("pairwise");
            assert_close(&fast, &reference, 1e-8);
        }
    }

    #[test]
    fn imaginary_coherence_has_zero_diagonal() {
        let series = noise_series([512, 1, 3, 1], 41);
        let config = NodeCoherenceConfig {
            nfft: 64,
            imaginary: true,
            ..NodeCoherenceConfig::default()
        };
        let imag = NodeCoherence::with_config(&series, config)
            .evaluate()
            .expect("imaginary");
        let magnitude = node_coherence(&series, 64).expect("magnitude");
        for ((f, i, j, sv, m), v) in imag.coherence.indexed_iter() {
            if i == j {
                assert_eq!(*v, 0.0);
            }
            assert!(*v <= magnitude.coherence[[f, i, j, sv, m]] + 1e-12);
        }
    }

    #[test]
    fn silent_node_yields_zero_not_nan() {
        let mut data = noise_series([256, 1, 3, 1], 2).into_data();
        data.index_axis_mut(Axis(2), 1).fill(0.0);
        let series = MultiChannelTimeSeries::try_new(data, 1000.0).expect("series");
        let result = node_coherence(&series, 64).expect("coherence");
        assert!(result.coherence.iter().all(|v| v.is_finite()));
        let block = result.slice(0, 0);
        for f in 0..32 {
            for n in 0..3 {
                assert_eq!(block[[f, 1, n]], 0.0);
                assert_eq!(block[[f, n, 1]], 0.0);
            }
        }
    }

    #[test]
    fn coherence_is_symmetric_and_bounded() {
        let series = noise_series([768, 2, 4, 1], 13);
        let result = node_coherence(&series, 128).expect("coherence");
        for ((f, i, j, sv, m), v) in result.coherence.indexed_iter() {
            assert!(*v >= 0.0 && *v <= 1.0 + 1e-12);
            assert_abs_diff_eq!(*v, result.coherence[[f, j, i, sv, m]], epsilon = 1e-15);
        }
    }

    #[test]
    fn frequencies_follow_sample_rate() {
        let data = noise_series([256, 1, 2, 1], 4).into_data();
        let series = MultiChannelTimeSeries::try_new(data, 250.0).expect("series");
        let result = node_coherence(&series, 64).expect("coherence");
        // Spacing of 4 time units per sample.
        for (k, f) in result.frequencies.iter().enumerate() {
            assert_abs_diff_eq!(*f, (k + 1) as f64 / 256.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn single_node_series_is_self_coherent() {
        let data = Array2::from_shape_fn((128, 1), |(t, _)| (t as f64 * 0.3).cos())
            .into_shape_with_order((128, 1, 1, 1))
            .expect("reshape");
        let series = MultiChannelTimeSeries::try_new(data, 1000.0).expect("series");
        let result = node_coherence(&series, 32).expect("coherence");
        assert_eq!(result.coherence.shape(), &[16, 1, 1, 1, 1]);
        assert!(result.coherence.iter().all(|v| *v >= 0.0 && *v <= 1.0 + 1e-12));
    }
}
