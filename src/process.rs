//! Top-level algebra entry points.
//!
//! [`RasterAlgebraProcess`] wires the collector and the processor
//! together for one evaluation: collect and reconcile the named
//! coverages, evaluate the expression, release every intermediate buffer,
//! return the derived raster. Buffer cleanup runs on the error paths too.

use tracing::debug;

use crate::catalog::RasterCatalog;
use crate::collector::{CoverageCollector, GridAlignedRasterMap};
use crate::config::EvalConfig;
use crate::error::Result;
use crate::expression::AlgebraExpression;
use crate::geometry::{Envelope, GridGeometry};
use crate::processor::CoverageProcessor;
use crate::raster::DerivedRaster;
use crate::resolution::ResolutionChoice;
use crate::warp::Warp;

/// Evaluates raster algebra requests against a catalog.
///
/// One instance can serve many requests; each request gets its own
/// collector/processor pair, so instances are safe to share behind a
/// reference as long as the catalog is.
pub struct RasterAlgebraProcess<C: RasterCatalog, W: Warp> {
    catalog: C,
    warp: W,
    config: EvalConfig,
}

impl<C: RasterCatalog, W: Warp> RasterAlgebraProcess<C, W> {
    /// Create a process over a catalog and a warp service.
    #[must_use]
    pub fn new(catalog: C, warp: W, config: EvalConfig) -> Self {
        Self {
            catalog,
            warp,
            config,
        }
    }

    /// Access the underlying catalog.
    #[must_use]
    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    /// Evaluate `expression` over the named coverages.
    ///
    /// The named coverages are reconciled onto a shared grid (optionally
    /// clipped by `roi`, with the pixel size arbitrated by `policy`), the
    /// expression is evaluated over the grid-aligned map, and every
    /// intermediate buffer is released before this returns, on failure
    /// paths included.
    ///
    /// # Errors
    /// Propagates the full collection/evaluation taxonomy; see
    /// [`crate::AlgebraError`].
    pub fn evaluate<S: AsRef<str>>(
        &self,
        names: &[S],
        expression: &AlgebraExpression,
        roi: Option<Envelope>,
        policy: ResolutionChoice,
    ) -> Result<DerivedRaster> {
        let expression = expression.clone().simplify();
        debug!(count = names.len(), expression = %expression, "algebra evaluation");

        let mut collector = CoverageCollector::new(
            &self.catalog,
            &self.warp,
            policy,
            roi,
            self.config.clone(),
        );
        let outcome = Self::run(&mut collector, names, &expression);
        collector.dispose();
        outcome
    }

    fn run<S: AsRef<str>>(
        collector: &mut CoverageCollector<'_>,
        names: &[S],
        expression: &AlgebraExpression,
    ) -> Result<DerivedRaster> {
        collector.collect(names)?;
        let sources = collector.coverages()?;
        let geometry = collector.grid_geometry()?;
        let processor = CoverageProcessor::new(sources, geometry)?;
        processor.evaluate(expression)
    }

    /// Collection-only entry point: reconcile the named coverages onto a
    /// caller-supplied grid geometry and return the aligned map.
    ///
    /// # Errors
    /// Propagates collection and read errors; see [`crate::AlgebraError`].
    pub fn collect<S: AsRef<str>>(
        &self,
        names: &[S],
        geometry: GridGeometry,
    ) -> Result<GridAlignedRasterMap> {
        let mut collector = CoverageCollector::with_grid_geometry(
            &self.catalog,
            &self.warp,
            geometry,
            self.config.clone(),
        );
        let outcome = collector
            .collect(names)
            .and_then(|()| collector.coverages());
        collector.dispose();
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;
    use crate::error::AlgebraError;
    use crate::expression::CompareOp;
    use crate::raster::RasterCoverage;
    use crate::warp::GridWarp;

    fn grid(min_x: f64, min_y: f64, max_x: f64, max_y: f64, px: f64) -> GridGeometry {
        GridGeometry::from_envelope(&Envelope::new(4326, min_x, min_y, max_x, max_y), px, px)
            .unwrap()
    }

    fn process() -> RasterAlgebraProcess<MemoryCatalog, GridWarp> {
        let mut catalog = MemoryCatalog::new();
        catalog.insert(RasterCoverage::constant(
            "dem",
            grid(0.0, 0.0, 10.0, 10.0, 1.0),
            10.0,
        ));
        catalog.insert(RasterCoverage::constant(
            "slope",
            grid(2.0, 2.0, 12.0, 12.0, 2.0),
            20.0,
        ));
        RasterAlgebraProcess::new(catalog, GridWarp::new(), EvalConfig::default())
    }

    #[test]
    fn test_end_to_end_evaluation() {
        let process = process();
        let expr = AlgebraExpression::and(vec![
            AlgebraExpression::compare("dem", CompareOp::Lt, 15.0),
            AlgebraExpression::compare("slope", CompareOp::Gt, 15.0),
        ]);
        let result = process
            .evaluate(&["dem", "slope"], &expr, None, ResolutionChoice::Min)
            .unwrap();

        let coverage = &result.coverage;
        // shared grid: intersection (2,2)..(10,10) at the finest size
        assert_eq!(coverage.grid.pixel_size(), (1.0, 1.0));
        assert_eq!(coverage.width(), 8);
        assert_eq!(coverage.height(), 8);
        for row in 0..coverage.height() {
            for col in 0..coverage.width() {
                assert_eq!(coverage.sample(0, col, row), Some(1.0));
            }
        }
        assert_eq!(result.sample_dimension.label, "binary");
    }

    #[test]
    fn test_evaluate_with_roi() {
        let process = process();
        let expr = AlgebraExpression::compare("dem", CompareOp::Gt, 5.0);
        let roi = Envelope::new(4326, 4.0, 4.0, 6.0, 6.0);
        let result = process
            .evaluate(&["dem", "slope"], &expr, Some(roi), ResolutionChoice::Min)
            .unwrap();
        assert_eq!(result.coverage.width(), 2);
        assert_eq!(result.coverage.height(), 2);
    }

    #[test]
    fn test_uncollected_reference_fails() {
        let process = process();
        let expr = AlgebraExpression::compare("slope", CompareOp::Gt, 0.0);
        let result = process.evaluate(&["dem"], &expr, None, ResolutionChoice::Min);
        assert!(matches!(result, Err(AlgebraError::UnknownCoverage(_))));
    }

    #[test]
    fn test_unknown_name_fails() {
        let process = process();
        let expr = AlgebraExpression::compare("dem", CompareOp::Gt, 0.0);
        let result = process.evaluate(&["dem", "missing"], &expr, None, ResolutionChoice::Min);
        assert!(matches!(result, Err(AlgebraError::UnknownCoverage(_))));
    }

    #[test]
    fn test_simplification_shapes_provenance() {
        let process = process();
        let expr = AlgebraExpression::not(AlgebraExpression::not(AlgebraExpression::compare(
            "dem",
            CompareOp::Gt,
            5.0,
        )));
        let result = process
            .evaluate(&["dem"], &expr, None, ResolutionChoice::Min)
            .unwrap();
        assert_eq!(result.provenance, "dem > 5");
    }

    #[test]
    fn test_collection_only_entry() {
        let process = process();
        let target = grid(0.0, 0.0, 10.0, 10.0, 1.0);
        let map = process.collect(&["dem", "slope"], target).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["dem"].grid, target);
        assert_eq!(map["slope"].grid, target);
        // slope only covers (2,2).. onward; the rest is background
        assert_eq!(map["slope"].sample(0, 5, 5), Some(20.0));
        assert_eq!(map["slope"].sample(0, 0, 9), Some(0.0));
    }
}
