//! Multichannel time series container.

use crate::kernel::ConfigError;
use ndarray::{Array4, ArrayD, ArrayView2, ArrayView4, Ix4};

/// Axis positions of the 4D series layout.
pub mod axis {
    /// Sample axis.
    pub const TIME: usize = 0;
    /// State variable axis.
    pub const STATE_VARIABLE: usize = 1;
    /// Node (channel) axis.
    pub const NODE: usize = 2;
    /// Mode axis.
    pub const MODE: usize = 3;
}

/// A uniformly sampled `(time, state_variable, node, mode)` series.
///
/// Coherence is measured between entries of the node axis. The state
/// variable and mode axes are carried through to the result unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiChannelTimeSeries {
    data: Array4<f64>,
    sample_rate: f64,
}

impl MultiChannelTimeSeries {
    /// Wrap a 4D array, validating axis extents and sample rate.
    pub fn try_new(data: Array4<f64>, sample_rate: f64) -> Result<Self, ConfigError> {
        if data.shape().iter().any(|&len| len == 0) {
            return Err(ConfigError::ShapeMismatch {
                arg: "data",
                reason: "every axis of the time series must be non-empty",
            });
        }
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(ConfigError::InvalidArgument {
                arg: "sample_rate",
                reason: "sample rate must be finite and > 0",
            });
        }
        Ok(Self { data, sample_rate })
    }

    /// Wrap a dynamic-rank array, which must have exactly four axes.
    pub fn try_from_dyn(data: ArrayD<f64>, sample_rate: f64) -> Result<Self, ConfigError> {
        let data = data
            .into_dimensionality::<Ix4>()
            .map_err(|_| ConfigError::ShapeMismatch {
                arg: "data",
                reason: "time series must have exactly four axes (time, state_variable, node, mode)",
            })?;
        Self::try_new(data, sample_rate)
    }

    /// Build from a flat row-major buffer.
    pub fn from_shape_vec(
        shape: [usize; 4],
        values: Vec<f64>,
        sample_rate: f64,
    ) -> Result<Self, ConfigError> {
        let expected = shape.iter().product();
        if values.len() != expected {
            return Err(ConfigError::LengthMismatch {
                arg: "values",
                expected,
                got: values.len(),
            });
        }
        let data = Array4::from_shape_vec(shape, values).map_err(|_| ConfigError::ShapeMismatch {
            arg: "shape",
            reason: "shape does not describe the value buffer",
        })?;
        Self::try_new(data, sample_rate)
    }

    /// Borrow the full 4D array.
    pub fn data(&self) -> ArrayView4<'_, f64> {
        self.data.view()
    }

    /// Consume the series and return the owned array.
    pub fn into_data(self) -> Array4<f64> {
        self.data
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// `[time, state_variable, node, mode]` extents.
    pub fn shape(&self) -> [usize; 4] {
        let s = self.data.shape();
        [s[0], s[1], s[2], s[3]]
    }

    /// Number of samples on the time axis.
    pub fn time_len(&self) -> usize {
        self.data.len_of(ndarray::Axis(axis::TIME))
    }

    /// Number of state variables.
    pub fn state_variable_count(&self) -> usize {
        self.data.len_of(ndarray::Axis(axis::STATE_VARIABLE))
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.data.len_of(ndarray::Axis(axis::NODE))
    }

    /// Number of modes.
    pub fn mode_count(&self) -> usize {
        self.data.len_of(ndarray::Axis(axis::MODE))
    }

    /// Read-only `(time, node)` view of one `(state_variable, mode)` slice.
    ///
    /// # Panics
    ///
    /// Panics when either index is out of bounds.
    pub fn slice(&self, state_variable: usize, mode: usize) -> ArrayView2<'_, f64> {
        self.data
            .index_axis(ndarray::Axis(axis::MODE), mode)
            .index_axis_move(ndarray::Axis(axis::STATE_VARIABLE), state_variable)
    }
}

#[cfg(test)]
mod tests {
    use super::MultiChannelTimeSeries;
    use crate::kernel::ConfigError;
    use ndarray::{Array4, ArrayD, IxDyn};

    #[test]
    fn rejects_rank_other_than_four() {
        let flat = ArrayD::<f64>::zeros(IxDyn(&[64, 2, 3]));
        let err = MultiChannelTimeSeries::try_from_dyn(flat, 1000.0).expect_err("rank 3");
        assert!(matches!(err, ConfigError::ShapeMismatch { arg: "data", .. }));
    }

    #[test]
    fn rejects_empty_axes_and_bad_sample_rate() {
        let empty = Array4::<f64>::zeros((64, 1, 0, 1));
        assert!(matches!(
            MultiChannelTimeSeries::try_new(empty, 1000.0),
            Err(ConfigError::ShapeMismatch { .. })
        ));

        for rate in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let data = Array4::<f64>::zeros((64, 1, 2, 1));
            assert!(matches!(
                MultiChannelTimeSeries::try_new(data, rate),
                Err(ConfigError::InvalidArgument {
                    arg: "sample_rate",
                    ..
                })
            ));
        }
    }

    #[test]
    fn slice_selects_state_variable_and_mode() {
        let data = Array4::from_shape_fn((8, 2, 3, 2), |(t, sv, n, m)| {
            (t * 1000 + sv * 100 + n * 10 + m) as f64
        });
        let series = MultiChannelTimeSeries::try_new(data, 256.0).expect("valid series");
        assert_eq!(series.shape(), [8, 2, 3, 2]);

        let slice = series.slice(1, 0);
        assert_eq!(slice.shape(), &[8, 3]);
        assert_eq!(slice[[5, 2]], 5120.0);
    }

    #[test]
    fn from_shape_vec_checks_buffer_length() {
        let err = MultiChannelTimeSeries::from_shape_vec([4, 1, 2, 1], vec![0.0; 7], 10.0)
            .expect_err("short buffer");
        assert_eq!(
            err,
            ConfigError::LengthMismatch {
                arg: "values",
                expected: 8,
                got: 7
            }
        );
    }
}
