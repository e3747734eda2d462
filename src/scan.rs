//! Whole-grid pixel scan evaluation.
//!
//! The scripted alternative to expression compilation: the caller
//! supplies a per-pixel function that sees the sample of every collected
//! coverage at the current pixel and returns the output sample. The scan
//! is synchronous and meant to be run on a dedicated worker; a shared
//! [`CancellationToken`] is polled at a bounded interval (a percentage of
//! the total pixel count), so cancellation is cooperative and in-flight
//! row batches finish before it takes effect.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ndarray::Array2;
use tracing::debug;

use crate::catalog::RasterCatalog;
use crate::collector::CoverageCollector;
use crate::config::EvalConfig;
use crate::error::{AlgebraError, Result};
use crate::geometry::Envelope;
use crate::raster::{DerivedRaster, RasterCoverage, SampleDimension};
use crate::resolution::ResolutionChoice;
use crate::warp::Warp;

/// Shared flag for cancelling a running scan from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. The scan stops at its next poll point.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// The samples of every collected coverage at one pixel, in collection
/// order.
pub struct ScanSamples<'a> {
    names: &'a [String],
    values: &'a [f64],
}

impl ScanSamples<'_> {
    /// Sample of the named coverage at the current pixel.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.values[i])
    }

    /// Samples in collection order.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        self.values
    }
}

/// Runs a caller-supplied per-pixel function over reconciled coverages.
pub struct PixelScanProcess<C: RasterCatalog, W: Warp> {
    catalog: C,
    warp: W,
    config: EvalConfig,
}

impl<C: RasterCatalog, W: Warp> PixelScanProcess<C, W> {
    #[must_use]
    pub fn new(catalog: C, warp: W, config: EvalConfig) -> Self {
        Self {
            catalog,
            warp,
            config,
        }
    }

    /// Collect the named coverages, then scan the whole shared grid,
    /// calling `script` once per pixel and writing its result into a
    /// single-band output.
    ///
    /// # Errors
    /// - [`AlgebraError::Cancelled`] when `token` is cancelled before or
    ///   during the scan
    /// - every collection error of [`CoverageCollector`]
    pub fn execute<S, F>(
        &self,
        names: &[S],
        mut script: F,
        roi: Option<Envelope>,
        policy: ResolutionChoice,
        token: &CancellationToken,
    ) -> Result<DerivedRaster>
    where
        S: AsRef<str>,
        F: FnMut(&ScanSamples<'_>) -> f64,
    {
        let mut collector = CoverageCollector::new(
            &self.catalog,
            &self.warp,
            policy,
            roi,
            self.config.clone(),
        );
        let collected = collector
            .collect(names)
            .and_then(|()| collector.coverages())
            .and_then(|sources| collector.grid_geometry().map(|g| (sources, g)));
        collector.dispose();
        let (sources, geometry) = collected?;

        // fixed input order for the whole scan
        let mut inputs: Vec<(String, RasterCoverage)> = sources.into_iter().collect();
        inputs.sort_by(|a, b| a.0.cmp(&b.0));
        let names: Vec<String> = inputs.iter().map(|(name, _)| name.clone()).collect();

        let (width, height) = (geometry.range.width, geometry.range.height);
        let total = (width * height) as u64;
        let poll_step =
            (total * u64::from(self.config.scan_poll_percent) / 100).max(1);

        debug!(width, height, inputs = names.len(), "pixel scan started");

        let mut output = Array2::zeros((height, width));
        let mut values = vec![0.0; inputs.len()];
        let mut since_poll: u64 = 0;
        let mut done: u64 = 0;

        if token.is_cancelled() {
            return Err(AlgebraError::Cancelled);
        }

        for row in 0..height {
            for col in 0..width {
                for (i, (_, coverage)) in inputs.iter().enumerate() {
                    values[i] = coverage.sample(0, col, row).unwrap_or(f64::NAN);
                }
                let samples = ScanSamples {
                    names: &names,
                    values: &values,
                };
                output[[row, col]] = script(&samples);
            }

            // poll at row boundaries, in-flight rows always complete
            done += width as u64;
            since_poll += width as u64;
            if since_poll >= poll_step {
                since_poll = 0;
                if token.is_cancelled() {
                    debug!(done, total, "pixel scan cancelled");
                    return Err(AlgebraError::Cancelled);
                }
                debug!(done, total, "pixel scan progress");
            }
        }

        debug!(total, "pixel scan finished");

        let coverage = RasterCoverage::from_band("derived", geometry, None, output)?;
        Ok(DerivedRaster {
            coverage,
            provenance: format!("pixel-scan({})", names.join(", ")),
            sample_dimension: SampleDimension::binary(),
        })
    }
}
