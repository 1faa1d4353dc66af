//! Segment-averaged cross spectra and their normalization to coherence.

use super::transform::SpectralBatch;
use ndarray::{s, Array1, Array3, ArrayView3, Axis, Zip};
use rustfft::num_complex::Complex;

/// Averages cross spectra over segments and normalizes them by the
/// autopowers.
///
/// For nodes `i`, `j` and bin `k`, with `<.>` the mean over segments,
/// `C[i, j, k] = |<F_i conj(F_j)>|^2 / (<|F_i|^2> <|F_j|^2>)`.
/// In imaginary mode the numerator keeps only `Im(<F_i conj(F_j)>)^2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CrossCoherence {
    imaginary: bool,
}

impl CrossCoherence {
    /// Aggregator for magnitude (`false`) or imaginary-part (`true`) coherence.
    pub fn new(imaginary: bool) -> Self {
        Self { imaginary }
    }

    /// Whether only the imaginary part of the cross spectrum is kept.
    pub fn imaginary(&self) -> bool {
        self.imaginary
    }

    /// Segment-averaged cross spectra laid out `(node, node, frequency)`.
    ///
    /// The diagonal holds the autopowers with a zero imaginary part. Entries
    /// below the diagonal are the conjugates of those above it.
    pub fn cross_spectra(&self, batch: &SpectralBatch) -> Array3<Complex<f64>> {
        let spectra = batch.spectra();
        let (nodes, segments, nfft) = spectra.dim();
        let scale = 1.0 / segments as f64;
        let mut cross = Array3::<Complex<f64>>::zeros((nodes, nodes, nfft));

        for i in 0..nodes {
            let fi = spectra.index_axis(Axis(0), i);
            let auto: Array1<f64> = fi.mapv(|c| c.norm_sqr()).sum_axis(Axis(0));
            cross
                .slice_mut(s![i, i, ..])
                .assign(&auto.mapv(|p| Complex::new(p * scale, 0.0)));

            for j in (i + 1)..nodes {
                let fj = spectra.index_axis(Axis(0), j);
                let mean = Zip::from(&fi)
                    .and(&fj)
                    .map_collect(|a, b| a * b.conj())
                    .sum_axis(Axis(0))
                    .mapv(|c| c * scale);
                cross
                    .slice_mut(s![j, i, ..])
                    .assign(&mean.mapv(|c| c.conj()));
                cross.slice_mut(s![i, j, ..]).assign(&mean);
            }
        }
        cross
    }

    /// Normalize averaged cross spectra to coherence.
    ///
    /// A bin where either autopower is zero has coherence 0.
    pub fn normalize(&self, cross: ArrayView3<'_, Complex<f64>>) -> Array3<f64> {
        let (nodes, _, nfft) = cross.dim();
        Array3::from_shape_fn((nodes, nodes, nfft), |(i, j, k)| {
            let denom = cross[[i, i, k]].re * cross[[j, j, k]].re;
            if denom <= 0.0 {
                return 0.0;
            }
            let g = cross[[i, j, k]];
            let num = if self.imaginary { g.im * g.im } else { g.norm_sqr() };
            num / denom
        })
    }

    /// Coherence of every node pair over every FFT bin, `(node, node, frequency)`.
    pub fn coherence(&self, batch: &SpectralBatch) -> Array3<f64> {
        let cross = self.cross_spectra(batch);
        self.normalize(cross.view())
    }
}

#[cfg(test)]
mod tests {
    use super::CrossCoherence;
    use crate::signal::coherence::segment::Segmenter;
    use crate::signal::coherence::transform::{SpectralBatch, SpectralTransform};
    use crate::signal::detrend::Detrend;
    use approx::assert_abs_diff_eq;
    use ndarray::Array2;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn spectra_of(slice: &Array2<f64>, nfft: usize) -> SpectralBatch {
        let batch = Segmenter::new(nfft)
            .segment(slice.view())
            .expect("segmentation");
        SpectralTransform::new(nfft, Detrend::None)
            .apply(&batch)
            .expect("transform")
    }

    fn noisy_slice(samples: usize, nodes: usize, seed: u64) -> Array2<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        Array2::from_shape_fn((samples, nodes), |_| rng.random_range(-1.0..1.0))
    }

    #[test]
    fn cross_spectra_are_hermitian() {
        let slice = noisy_slice(256, 3, 7);
        let cross = CrossCoherence::new(false).cross_spectra(&spectra_of(&slice, 32));
        let (n, _, nfft) = cross.dim();
        for i in 0..n {
            for j in 0..n {
                for k in 0..nfft {
                    let a = cross[[i, j, k]];
                    let b = cross[[j, i, k]].conj();
                    assert_eq!(a, b);
                }
            }
            for k in 0..nfft {
                assert_eq!(cross[[i, i, k]].im, 0.0);
                assert!(cross[[i, i, k]].re >= 0.0);
            }
        }
    }

    #[test]
    fn diagonal_is_one_where_power_is_present() {
        let slice = noisy_slice(512, 2, 11);
        let coh = CrossCoherence::new(false).coherence(&spectra_of(&slice, 64));
        for node in 0..2 {
            for k in 0..64 {
                assert_abs_diff_eq!(coh[[node, node, k]], 1.0, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn identical_nodes_are_fully_coherent() {
        let mut slice = noisy_slice(512, 2, 3);
        let first = slice.column(0).to_owned();
        slice.column_mut(1).assign(&first);
        let coh = CrossCoherence::new(false).coherence(&spectra_of(&slice, 64));
        for k in 0..64 {
            assert_abs_diff_eq!(coh[[0, 1, k]], 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn values_are_bounded_and_symmetric() {
        let slice = noisy_slice(1024, 4, 21);
        let coh = CrossCoherence::new(false).coherence(&spectra_of(&slice, 64));
        for ((i, j, k), v) in coh.indexed_iter() {
            assert!((0.0..=1.0 + 1e-12).contains(v));
            assert_abs_diff_eq!(*v, coh[[j, i, k]], epsilon = 1e-15);
        }
    }

    #[test]
    fn silent_node_has_zero_coherence() {
        let mut slice = noisy_slice(256, 2, 5);
        slice.column_mut(1).fill(0.0);
        let coh = CrossCoherence::new(false).coherence(&spectra_of(&slice, 32));
        assert!(coh.iter().all(|v| v.is_finite()));
        for k in 0..32 {
            assert_eq!(coh[[0, 1, k]], 0.0);
            assert_eq!(coh[[1, 1, k]], 0.0);
        }
    }

    #[test]
    fn imaginary_mode_zeroes_diagonal_and_is_bounded_by_magnitude() {
        let slice = noisy_slice(512, 3, 9);
        let spectra = spectra_of(&slice, 32);
        let magnitude = CrossCoherence::new(false).coherence(&spectra);
        let imaginary = CrossCoherence::new(true).coherence(&spectra);
        for ((i, j, k), v) in imaginary.indexed_iter() {
            if i == j {
                assert_eq!(*v, 0.0);
            }
            assert!(*v <= magnitude[[i, j, k]] + 1e-12);
        }
    }

    #[test]
    fn single_segment_is_trivially_coherent() {
        let slice = noisy_slice(32, 2, 13);
        let coh = CrossCoherence::new(false).coherence(&spectra_of(&slice, 32));
        for k in 1..16 {
            assert_abs_diff_eq!(coh[[0, 1, k]], 1.0, epsilon = 1e-9);
        }
    }
}
