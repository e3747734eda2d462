//! Evaluation context configuration.
//!
//! One [`EvalConfig`] is passed explicitly into every entry point instead
//! of relying on process-wide defaults, so two concurrent evaluations can
//! run with different settings.

/// Configuration shared by collection, evaluation and scanning.
#[derive(Debug, Clone)]
pub struct EvalConfig {
    /// Suggested tile size (width, height) forwarded to catalog reads.
    /// Catalogs are free to ignore it.
    pub suggested_tile_size: (usize, usize),
    /// Fraction of a pixel scan between cancellation polls and progress
    /// events, in percent of the total pixel count. Clamped to [1, 50].
    pub scan_poll_percent: u8,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            suggested_tile_size: (512, 512),
            scan_poll_percent: 2,
        }
    }
}

impl EvalConfig {
    /// Set the suggested tile size for catalog reads.
    #[must_use]
    pub fn with_tile_size(mut self, width: usize, height: usize) -> Self {
        self.suggested_tile_size = (width, height);
        self
    }

    /// Set the scan poll interval as a percentage of the total scan.
    #[must_use]
    pub fn with_scan_poll_percent(mut self, percent: u8) -> Self {
        self.scan_poll_percent = percent.clamp(1, 50);
        self
    }
}
