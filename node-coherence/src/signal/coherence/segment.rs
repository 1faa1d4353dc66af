//! Non-overlapping block segmentation of one `(time, node)` slice.

use crate::kernel::{ConfigError, ExecInvariantViolation};
use ndarray::{Array3, ArrayView2, ArrayView3};

/// Splits the time axis into `floor(time_len / nfft)` consecutive blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segmenter {
    nfft: usize,
}

impl Segmenter {
    /// Segmenter producing blocks of `nfft` samples.
    pub fn new(nfft: usize) -> Self {
        Self { nfft }
    }

    /// Block length.
    pub fn nfft(&self) -> usize {
        self.nfft
    }

    /// Number of whole blocks that fit in `time_len` samples.
    pub fn segment_count(&self, time_len: usize) -> Result<usize, ExecInvariantViolation> {
        if self.nfft == 0 {
            return Err(ConfigError::ShapeMismatch {
                arg: "nfft",
                reason: "nfft must be > 0",
            }
            .into());
        }
        let count = time_len / self.nfft;
        if count < 1 {
            return Err(ExecInvariantViolation::InsufficientData {
                samples: time_len,
                nfft: self.nfft,
            });
        }
        Ok(count)
    }

    /// Lay a `(time, node)` slice out as `(node, segment, nfft)` blocks.
    ///
    /// Trailing samples that do not fill a block are dropped. The input is
    /// only read.
    pub fn segment(&self, slice: ArrayView2<'_, f64>) -> Result<SegmentBatch, ExecInvariantViolation> {
        let (time_len, nodes) = slice.dim();
        let count = self.segment_count(time_len)?;
        let nfft = self.nfft;
        let blocks = Array3::from_shape_fn((nodes, count, nfft), |(node, seg, t)| {
            slice[[seg * nfft + t, node]]
        });
        Ok(SegmentBatch { blocks })
    }
}

/// Segmented samples of one slice, laid out `(node, segment, nfft)`.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentBatch {
    blocks: Array3<f64>,
}

impl SegmentBatch {
    /// Borrow the blocks.
    pub fn blocks(&self) -> ArrayView3<'_, f64> {
        self.blocks.view()
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.blocks.dim().0
    }

    /// Number of blocks per node.
    pub fn segment_count(&self) -> usize {
        self.blocks.dim().1
    }

    /// Block length.
    pub fn nfft(&self) -> usize {
        self.blocks.dim().2
    }
}
