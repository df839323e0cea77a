//! Engine configuration and constants.

/// Key of the single persisted settings record.
pub const STORAGE_KEY: &str = "freecfd";

/// Timing policy for the redirect debouncer. All values in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterceptorConfig {
    /// A target redirected less than this long ago is not redirected again.
    pub debounce_window_ms: u64,
    /// Sweeps evict debounce entries older than this.
    pub stale_after_ms: u64,
    /// How often hosts should run the sweep.
    pub sweep_interval_ms: u64,
}

impl Default for InterceptorConfig {
    fn default() -> Self {
        Self {
            debounce_window_ms: 500,
            stale_after_ms: 5_000,
            sweep_interval_ms: 10_000,
        }
    }
}
