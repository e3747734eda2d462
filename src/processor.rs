//! Raster algebra compilation.
//!
//! The processor walks an [`AlgebraExpression`] against a grid-aligned
//! coverage map and produces one derived raster. Comparisons compile into
//! per-pixel interval lookups (binarization); logical nodes fold their
//! operand masks pairwise; function calls dispatch into the fixed
//! operator vocabulary. The whole tree is resolved against the coverage
//! map before any pixel work starts, so a missing reference fails fast
//! instead of after sibling branches have already burned I/O.
//!
//! The algebra path works on the first band of each referenced coverage
//! and yields a single-band result. NoData is not carried through; the
//! output is tagged with a synthesized "binary" sample dimension.

use ndarray::Array2;
use tracing::debug;

use crate::collector::GridAlignedRasterMap;
use crate::error::{AlgebraError, Result};
use crate::expression::{AlgebraExpression, CompareOp};
use crate::geometry::GridGeometry;
use crate::operator;
use crate::raster::{DerivedRaster, RasterCoverage, SampleDimension};

/// A literal interval with independently inclusive bounds, used as the
/// binarization lookup: samples inside map to 1, everything else to 0.
#[derive(Debug, Clone, Copy)]
struct Interval {
    min: f64,
    min_inclusive: bool,
    max: f64,
    max_inclusive: bool,
}

impl Interval {
    fn contains(&self, value: f64) -> bool {
        let above = if self.min_inclusive {
            value >= self.min
        } else {
            value > self.min
        };
        let below = if self.max_inclusive {
            value <= self.max
        } else {
            value < self.max
        };
        above && below
    }

    /// The interval a comparison operator compiles to.
    ///
    /// NEQ compiles to the open upper interval `(v, +inf)` only: samples
    /// below `v` do not register as "not equal". Asymmetric with EQ, kept
    /// that way on purpose.
    fn for_compare(op: CompareOp, value: f64) -> Self {
        match op {
            CompareOp::Eq => Interval {
                min: value,
                min_inclusive: true,
                max: value,
                max_inclusive: true,
            },
            CompareOp::Neq | CompareOp::Gt => Interval {
                min: value,
                min_inclusive: false,
                max: f64::INFINITY,
                max_inclusive: false,
            },
            CompareOp::Gte => Interval {
                min: value,
                min_inclusive: true,
                max: f64::INFINITY,
                max_inclusive: false,
            },
            CompareOp::Lt => Interval {
                min: f64::NEG_INFINITY,
                min_inclusive: false,
                max: value,
                max_inclusive: false,
            },
            CompareOp::Lte => Interval {
                min: f64::NEG_INFINITY,
                min_inclusive: false,
                max: value,
                max_inclusive: true,
            },
        }
    }
}

/// Evaluates expressions against a grid-aligned coverage map.
pub struct CoverageProcessor {
    sources: GridAlignedRasterMap,
    geometry: GridGeometry,
}

impl CoverageProcessor {
    /// Create a processor over a coverage map that shares `geometry`.
    ///
    /// # Errors
    /// Returns [`AlgebraError::InvalidReader`] when a source coverage is
    /// not aligned with the shared grid.
    pub fn new(sources: GridAlignedRasterMap, geometry: GridGeometry) -> Result<Self> {
        for (name, coverage) in &sources {
            if coverage.grid.range != geometry.range {
                return Err(AlgebraError::InvalidReader {
                    name: name.clone(),
                    reason: format!(
                        "coverage grid {}x{} is not aligned with the shared grid {}x{}",
                        coverage.grid.range.width,
                        coverage.grid.range.height,
                        geometry.range.width,
                        geometry.range.height
                    ),
                });
            }
        }
        Ok(Self { sources, geometry })
    }

    /// Evaluate an expression into a derived raster on the shared grid.
    ///
    /// # Errors
    /// - [`AlgebraError::UnknownCoverage`] for references outside the map
    ///   (raised before any pixel work)
    /// - [`AlgebraError::UnknownOperator`] / [`AlgebraError::Arity`] for
    ///   bad function calls
    pub fn evaluate(&self, expression: &AlgebraExpression) -> Result<DerivedRaster> {
        self.validate_references(expression)?;
        debug!(expression = %expression, "evaluating");

        let band = self.eval_node(expression)?;
        let coverage =
            RasterCoverage::from_band("derived", self.geometry, None, band)?;
        Ok(DerivedRaster {
            coverage,
            provenance: expression.to_string(),
            sample_dimension: SampleDimension::binary(),
        })
    }

    /// Check every coverage reference in the tree before evaluation.
    fn validate_references(&self, expression: &AlgebraExpression) -> Result<()> {
        for name in expression.referenced_coverages() {
            if !self.sources.contains_key(&name) {
                return Err(AlgebraError::UnknownCoverage(name));
            }
        }
        Ok(())
    }

    fn eval_node(&self, expression: &AlgebraExpression) -> Result<Array2<f64>> {
        match expression {
            AlgebraExpression::And(children) => {
                let masks = self.eval_children(children)?;
                operator::lookup("AND")?.apply(&masks)
            }
            AlgebraExpression::Or(children) => {
                let masks = self.eval_children(children)?;
                operator::lookup("OR")?.apply(&masks)
            }
            AlgebraExpression::Not(child) => {
                let mask = self.eval_node(child)?;
                operator::lookup("NOT")?.apply(&[mask])
            }
            AlgebraExpression::Compare {
                op,
                property,
                value,
            } => {
                let source = self.fetch_band(property)?;
                Ok(binarize(&source, Interval::for_compare(*op, *value)))
            }
            AlgebraExpression::Between { property, lo, hi } => {
                let source = self.fetch_band(property)?;
                let interval = Interval {
                    min: *lo,
                    min_inclusive: true,
                    max: *hi,
                    max_inclusive: true,
                };
                Ok(binarize(&source, interval))
            }
            AlgebraExpression::Function { name, args } => {
                let op = operator::lookup(name)?;
                let mut sources = Vec::with_capacity(args.len());
                for arg in args {
                    sources.push(self.fetch_band(arg)?);
                }
                op.apply(&sources)
            }
            AlgebraExpression::Property(name) => self.fetch_band(name),
            AlgebraExpression::Literal(value) => Ok(Array2::from_elem(
                (self.geometry.range.height, self.geometry.range.width),
                *value,
            )),
        }
    }

    fn eval_children(&self, children: &[AlgebraExpression]) -> Result<Vec<Array2<f64>>> {
        let mut masks = Vec::with_capacity(children.len());
        for child in children {
            masks.push(self.eval_node(child)?);
        }
        Ok(masks)
    }

    /// First band of a referenced coverage.
    fn fetch_band(&self, name: &str) -> Result<Array2<f64>> {
        let coverage = self
            .sources
            .get(name)
            .ok_or_else(|| AlgebraError::UnknownCoverage(name.to_string()))?;
        Ok(coverage.band(0).to_owned())
    }
}

/// Per-pixel interval lookup producing a {0, 1} mask.
fn binarize(source: &Array2<f64>, interval: Interval) -> Array2<f64> {
    source.mapv(|v| if interval.contains(v) { 1.0 } else { 0.0 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Envelope;

    fn shared_grid() -> GridGeometry {
        let envelope = Envelope::new(4326, 0.0, 0.0, 2.0, 2.0);
        GridGeometry::from_envelope(&envelope, 1.0, 1.0).unwrap()
    }

    fn single_pixel_grid() -> GridGeometry {
        let envelope = Envelope::new(4326, 0.0, 0.0, 1.0, 1.0);
        GridGeometry::from_envelope(&envelope, 1.0, 1.0).unwrap()
    }

    fn processor_with(values: &[(&str, f64)], grid: GridGeometry) -> CoverageProcessor {
        let mut map = GridAlignedRasterMap::default();
        for (name, value) in values {
            map.insert(
                (*name).to_string(),
                RasterCoverage::constant(*name, grid, *value),
            );
        }
        CoverageProcessor::new(map, grid).unwrap()
    }

    fn evaluate_pixel(processor: &CoverageProcessor, expr: &AlgebraExpression) -> f64 {
        let result = processor.evaluate(expr).unwrap();
        result.coverage.sample(0, 0, 0).unwrap()
    }

    #[test]
    fn test_comparison_intervals_at_threshold() {
        let processor = processor_with(&[("v", 5.0)], single_pixel_grid());
        let cases = [
            (CompareOp::Eq, 1.0),
            (CompareOp::Gt, 0.0),
            (CompareOp::Gte, 1.0),
            (CompareOp::Lt, 0.0),
            (CompareOp::Lte, 1.0),
        ];
        for (op, expected) in cases {
            let expr = AlgebraExpression::compare("v", op, 5.0);
            assert_eq!(
                evaluate_pixel(&processor, &expr),
                expected,
                "operator {op} against equal value"
            );
        }
    }

    #[test]
    fn test_neq_is_upper_open_interval_only() {
        // above the literal registers as "not equal" ...
        let above = processor_with(&[("v", 7.0)], single_pixel_grid());
        let expr = AlgebraExpression::compare("v", CompareOp::Neq, 5.0);
        assert_eq!(evaluate_pixel(&above, &expr), 1.0);

        // ... below the literal does not
        let below = processor_with(&[("v", 3.0)], single_pixel_grid());
        assert_eq!(evaluate_pixel(&below, &expr), 0.0);

        let equal = processor_with(&[("v", 5.0)], single_pixel_grid());
        assert_eq!(evaluate_pixel(&equal, &expr), 0.0);
    }

    #[test]
    fn test_between_is_inclusive() {
        let processor = processor_with(&[("v", 10.0)], single_pixel_grid());
        assert_eq!(
            evaluate_pixel(&processor, &AlgebraExpression::between("v", 10.0, 20.0)),
            1.0
        );
        assert_eq!(
            evaluate_pixel(&processor, &AlgebraExpression::between("v", 0.0, 10.0)),
            1.0
        );
        assert_eq!(
            evaluate_pixel(&processor, &AlgebraExpression::between("v", 10.5, 20.0)),
            0.0
        );
    }

    #[test]
    fn test_function_and_or_over_masks() {
        let processor =
            processor_with(&[("a", 1.0), ("b", 1.0), ("c", 0.0)], single_pixel_grid());
        let args = vec!["a".to_string(), "b".to_string(), "c".to_string()];

        let expr = AlgebraExpression::function("AND", args.clone());
        assert_eq!(evaluate_pixel(&processor, &expr), 0.0);

        let expr = AlgebraExpression::function("OR", args);
        assert_eq!(evaluate_pixel(&processor, &expr), 1.0);
    }

    #[test]
    fn test_logical_expression_over_grid() {
        let processor = processor_with(&[("a", 10.0), ("b", 20.0)], shared_grid());
        let expr = AlgebraExpression::and(vec![
            AlgebraExpression::compare("a", CompareOp::Lt, 15.0),
            AlgebraExpression::compare("b", CompareOp::Gt, 15.0),
        ]);
        let result = processor.evaluate(&expr).unwrap();
        let coverage = &result.coverage;
        assert_eq!(coverage.bands(), 1);
        for row in 0..coverage.height() {
            for col in 0..coverage.width() {
                assert_eq!(coverage.sample(0, col, row), Some(1.0));
            }
        }
        assert_eq!(result.provenance, "(a < 15 AND b > 15)");
        assert_eq!(result.sample_dimension.label, "binary");
    }

    #[test]
    fn test_not() {
        let processor = processor_with(&[("a", 10.0)], single_pixel_grid());
        let expr = AlgebraExpression::not(AlgebraExpression::compare("a", CompareOp::Gt, 5.0));
        assert_eq!(evaluate_pixel(&processor, &expr), 0.0);
    }

    #[test]
    fn test_unknown_reference_fails_before_pixel_work() {
        let processor = processor_with(&[("a", 1.0)], single_pixel_grid());
        // the bad reference sits in the second branch; validation still
        // catches it up front
        let expr = AlgebraExpression::and(vec![
            AlgebraExpression::compare("a", CompareOp::Gt, 0.0),
            AlgebraExpression::compare("missing", CompareOp::Gt, 0.0),
        ]);
        match processor.evaluate(&expr) {
            Err(AlgebraError::UnknownCoverage(name)) => assert_eq!(name, "missing"),
            other => panic!("expected UnknownCoverage, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_operator_and_arity() {
        let processor = processor_with(&[("a", 1.0)], single_pixel_grid());

        let expr = AlgebraExpression::function("SOBEL", vec!["a".to_string()]);
        assert!(matches!(
            processor.evaluate(&expr),
            Err(AlgebraError::UnknownOperator(_))
        ));

        let expr = AlgebraExpression::function("NOT", vec!["a".to_string(), "a".to_string()]);
        assert!(matches!(
            processor.evaluate(&expr),
            Err(AlgebraError::Arity { .. })
        ));
    }

    #[test]
    fn test_property_root_passes_values_through() {
        let processor = processor_with(&[("a", 42.5)], single_pixel_grid());
        let expr = AlgebraExpression::Property("a".to_string());
        assert_eq!(evaluate_pixel(&processor, &expr), 42.5);
    }

    #[test]
    fn test_misaligned_source_rejected() {
        let grid = shared_grid();
        let other = single_pixel_grid();
        let mut map = GridAlignedRasterMap::default();
        map.insert("a".to_string(), RasterCoverage::constant("a", other, 1.0));
        assert!(matches!(
            CoverageProcessor::new(map, grid),
            Err(AlgebraError::InvalidReader { .. })
        ));
    }
}
