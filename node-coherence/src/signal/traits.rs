//! Trait interfaces for signal-processing capabilities.
//!
//! These traits define the trait-first API shape used by the kernels.

use crate::kernel::{ConfigError, ExecInvariantViolation, Write1D};
use crate::series::MultiChannelTimeSeries;
use crate::signal::coherence::{CoherenceResult, CoherenceShape};
use ndarray::{ArrayBase, DataMut, Ix5};

#[cfg(any(test, feature = "oracle"))]
use crate::kernel::Read1D;

/// Node-to-node coherence of every `(state_variable, mode)` slice of a
/// four-axis time series.
pub trait NodeCoherence4D {
    /// Run coherence into caller-provided buffers.
    ///
    /// `coherence` is laid out `(frequency, node, node, state_variable, mode)`
    /// and `freqs` holds one entry per frequency row.
    fn run_into<S, OF>(
        &self,
        series: &MultiChannelTimeSeries,
        coherence: &mut ArrayBase<S, Ix5>,
        freqs: &mut OF,
    ) -> Result<(), ExecInvariantViolation>
    where
        S: DataMut<Elem = f64>,
        OF: Write1D<f64> + ?Sized;

    /// Run coherence and allocate the result.
    fn run_alloc(
        &self,
        series: &MultiChannelTimeSeries,
    ) -> Result<CoherenceResult, ExecInvariantViolation>;
}

/// Output geometry of an analysis, known before it runs.
pub trait ResultShapeQuery {
    /// Shapes of the outputs produced for an input of `input_shape`.
    fn result_shape(&self, input_shape: &[usize]) -> Result<CoherenceShape, ConfigError>;

    /// Bytes needed to hold every output as 64-bit floats.
    fn result_size(&self, input_shape: &[usize]) -> Result<usize, ConfigError> {
        self.result_shape(input_shape)?
            .byte_size()
            .ok_or(ConfigError::InvalidArgument {
                arg: "input_shape",
                reason: "result size overflows usize",
            })
    }

    /// Bytes needed including intermediate results, equal to
    /// [`ResultShapeQuery::result_size`].
    fn extended_result_size(&self, input_shape: &[usize]) -> Result<usize, ConfigError> {
        self.result_size(input_shape)
    }
}

/// Coherence between two 1D signals.
#[cfg(any(test, feature = "oracle"))]
pub trait PairCoherence1D<T> {
    /// Run coherence into caller-provided frequency and coherence buffers.
    fn run_into<I1, I2, OF, OC>(
        &self,
        x: &I1,
        y: &I2,
        freqs: &mut OF,
        coherence: &mut OC,
    ) -> Result<(), ExecInvariantViolation>
    where
        I1: Read1D<T> + ?Sized,
        I2: Read1D<T> + ?Sized,
        OF: Write1D<T> + ?Sized,
        OC: Write1D<T> + ?Sized;

    /// Run coherence and allocate `(freqs, coherence)`.
    fn run_alloc<I1, I2>(&self, x: &I1, y: &I2) -> Result<(Vec<T>, Vec<T>), ExecInvariantViolation>
    where
        I1: Read1D<T> + ?Sized,
        I2: Read1D<T> + ?Sized;
}

/// Window generation capability.
pub trait WindowGenerate<T> {
    /// Run window generation into a caller-provided output buffer.
    fn run_into<O>(&self, out: &mut O) -> Result<(), ExecInvariantViolation>
    where
        O: Write1D<T> + ?Sized;

    /// Run window generation and allocate output samples.
    fn run_alloc(&self) -> Result<Vec<T>, ExecInvariantViolation>;
}
