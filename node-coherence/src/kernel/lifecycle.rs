use super::ConfigError;

/// Constructor validation lifecycle shared by kernel structs.
///
/// Every kernel in this crate is built from a plain `*Config` record. All
/// argument validation happens in [`KernelLifecycle::try_new`], so a kernel
/// value that exists is always runnable.
pub trait KernelLifecycle: Sized {
    /// Kernel config type.
    type Config;

    /// Construct a validated kernel from config.
    fn try_new(config: Self::Config) -> Result<Self, ConfigError>;
}
