//! Strictly positive frequency bin selection.

use crate::kernel::ExecInvariantViolation;
use ndarray::{Array1, ArrayView1, ArrayView3, ArrayViewMut3, Axis};

/// Number of strictly positive frequency bins kept for a transform of length
/// `nfft`.
///
/// Bins `1..=nfft/2` are kept. For an even `nfft` the Nyquist bin, which the
/// standard FFT ordering reports as negative, is folded onto the positive
/// side.
pub fn positive_frequency_count(nfft: usize) -> usize {
    nfft / 2
}

/// Picks the strictly positive bins out of a full FFT spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrequencySelector {
    nfft: usize,
}

/// FFT bin indices kept by a [`FrequencySelector`] and their frequencies.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencySelection {
    bins: Vec<usize>,
    frequencies: Array1<f64>,
}

impl FrequencySelection {
    /// Kept FFT bin indices, increasing.
    pub fn bins(&self) -> &[usize] {
        &self.bins
    }

    /// Frequencies of the kept bins, strictly increasing.
    pub fn frequencies(&self) -> &Array1<f64> {
        &self.frequencies
    }

    /// Number of kept bins.
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    /// Whether no bin was kept.
    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }
}

impl FrequencySelector {
    /// Selector for spectra of length `nfft`.
    pub fn new(nfft: usize) -> Self {
        Self { nfft }
    }

    /// Keep the strictly positive entries of an FFT frequency axis.
    ///
    /// `frequencies` is in standard FFT ordering. The number of kept bins is
    /// checked against [`positive_frequency_count`].
    pub fn select(
        &self,
        frequencies: ArrayView1<'_, f64>,
    ) -> Result<FrequencySelection, ExecInvariantViolation> {
        if frequencies.len() != self.nfft {
            return Err(ExecInvariantViolation::LengthMismatch {
                arg: "frequencies",
                expected: self.nfft,
                got: frequencies.len(),
            });
        }
        let nyquist = self.nfft.is_multiple_of(2).then_some(self.nfft / 2);

        let (bins, kept): (Vec<usize>, Vec<f64>) = frequencies
            .iter()
            .enumerate()
            .map(|(k, &f)| if Some(k) == nyquist { (k, f.abs()) } else { (k, f) })
            .filter(|(_, f)| *f > 0.0)
            .unzip();

        let expected = positive_frequency_count(self.nfft);
        if bins.len() != expected {
            return Err(ExecInvariantViolation::LengthMismatch {
                arg: "positive_frequencies",
                expected,
                got: bins.len(),
            });
        }
        Ok(FrequencySelection {
            bins,
            frequencies: Array1::from(kept),
        })
    }

    /// Copy the selected bins of a `(node, node, nfft)` coherence block into
    /// a `(frequency, node, node)` output.
    pub fn scatter(
        &self,
        selection: &FrequencySelection,
        coherence: ArrayView3<'_, f64>,
        mut out: ArrayViewMut3<'_, f64>,
    ) -> Result<(), ExecInvariantViolation> {
        let (nodes, _, nfft) = coherence.dim();
        if nfft != self.nfft {
            return Err(ExecInvariantViolation::LengthMismatch {
                arg: "coherence",
                expected: self.nfft,
                got: nfft,
            });
        }
        let expected = vec![selection.len(), nodes, nodes];
        if out.shape() != expected.as_slice() {
            return Err(ExecInvariantViolation::ShapeMismatch {
                arg: "coherence_out",
                expected,
                got: out.shape().to_vec(),
            });
        }
        for (row, &bin) in selection.bins.iter().enumerate() {
            out.index_axis_mut(Axis(0), row)
                .assign(&coherence.index_axis(Axis(2), bin));
        }
        Ok(())
    }
}
