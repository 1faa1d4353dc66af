//! Signal processing building blocks for node coherence.

/// Pairwise node coherence.
pub mod coherence;
/// Per-segment trend removal.
pub mod detrend;
/// Trait-first capability interfaces.
pub mod traits;
/// Tapering windows.
pub mod windows;
