//! Tapering windows for segment spectra.
//!
//! Only the Hamming window is used by the coherence estimator. The symmetric
//! and periodic variants follow the classical `scipy.signal.hamming`
//! convention, where a periodic window is only derived for even lengths.

use num_traits::{Float, FloatConst};

mod kernels;
pub use kernels::*;

/// Produce the samples of a window.
pub trait GetWindow<W = f64>
where
    W: Float,
{
    /// Materialize the window.
    fn get_window(&self) -> Vec<W>;
}

/// Hamming window, `0.54 - 0.46 cos(2 pi n / (M - 1))`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hamming {
    /// Number of points in the output window.
    pub m: usize,
    /// `true` for a symmetric window, `false` for a periodic (DFT-even)
    /// window when `m` is even.
    pub sym: bool,
}

impl Hamming {
    /// Create a Hamming window description.
    pub fn new(m: usize, sym: bool) -> Self {
        Self { m, sym }
    }
}

impl<W> GetWindow<W> for Hamming
where
    W: Float + FloatConst,
{
    fn get_window(&self) -> Vec<W> {
        if self.m < 1 {
            return Vec::new();
        }
        if self.m == 1 {
            return vec![W::one()];
        }

        let extend = !self.sym && self.m.is_multiple_of(2);
        let len = if extend { self.m + 1 } else { self.m };

        let alpha = cast::<W>(0.54);
        let beta = cast::<W>(0.46);
        let denom = cast::<W>((len - 1) as f64);
        let two_pi = W::PI() + W::PI();
        let mut w: Vec<W> = (0..len)
            .map(|n| alpha - beta * (two_pi * cast::<W>(n as f64) / denom).cos())
            .collect();

        if extend {
            w.truncate(self.m);
        }
        w
    }
}

/// Hamming window of length `m` as `f64` samples.
///
/// `sym = false` with an even `m` yields the periodic window used for
/// spectral analysis. See [`Hamming`].
pub fn hamming(m: usize, sym: bool) -> Vec<f64> {
    Hamming::new(m, sym).get_window()
}

fn cast<W: Float>(v: f64) -> W {
    W::from(v).unwrap_or_else(W::nan)
}
