#![warn(missing_docs)]
#![doc = include_str!("../../README.md")]

/// Crate-level error type.
pub mod error;
/// Trait-first kernel substrate.
pub mod kernel;
/// Four-axis time series container.
pub mod series;
/// Windows, detrending and the coherence estimator.
pub mod signal;

pub use error::Error;
pub use series::MultiChannelTimeSeries;
pub use signal::coherence::{
    node_coherence, CoherenceResult, CoherenceShape, NodeCoherence, NodeCoherenceConfig,
    NodeCoherenceKernel,
};
pub use signal::detrend::Detrend;
pub use signal::traits::{NodeCoherence4D, ResultShapeQuery};
