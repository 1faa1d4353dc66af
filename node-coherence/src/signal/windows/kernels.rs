//! Trait-first window generation kernel.

use crate::kernel::{ConfigError, ExecInvariantViolation, KernelLifecycle, Write1D};
use crate::signal::traits::WindowGenerate;
use num_traits::{Float, FloatConst};

use super::{GetWindow, Hamming};

/// Constructor config for [`WindowKernel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WindowConfig {
    /// Output length.
    pub nx: usize,
    /// Symmetric (`true`) or periodic (`false`) window.
    pub sym: bool,
}

/// Trait-first Hamming window generation kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowKernel {
    window: Hamming,
}

impl WindowKernel {
    /// Number of samples produced by the kernel.
    pub fn len(&self) -> usize {
        self.window.m
    }

    /// Whether the kernel produces an empty window.
    pub fn is_empty(&self) -> bool {
        self.window.m == 0
    }
}

impl KernelLifecycle for WindowKernel {
    type Config = WindowConfig;

    // Every length is valid: zero yields an empty window.
    fn try_new(config: Self::Config) -> Result<Self, ConfigError> {
        Ok(Self {
            window: Hamming::new(config.nx, config.sym),
        })
    }
}

impl<F> WindowGenerate<F> for WindowKernel
where
    F: Float + FloatConst,
{
    fn run_into<O>(&self, out: &mut O) -> Result<(), ExecInvariantViolation>
    where
        O: Write1D<F> + ?Sized,
    {
        let out_slice = out
            .write_slice_mut()
            .map_err(ExecInvariantViolation::from)?;
        if out_slice.len() != self.window.m {
            return Err(ExecInvariantViolation::LengthMismatch {
                arg: "out",
                expected: self.window.m,
                got: out_slice.len(),
            });
        }
        let generated: Vec<F> = self.window.get_window();
        out_slice.copy_from_slice(&generated);
        Ok(())
    }

    fn run_alloc(&self) -> Result<Vec<F>, ExecInvariantViolation> {
        Ok(self.window.get_window())
    }
}
