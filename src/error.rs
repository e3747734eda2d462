//! Error taxonomy for the raster algebra engine.
//!
//! Every failure the engine can surface is one of the variants below.
//! Geometric and configuration errors are not transient, so nothing here
//! is retried internally; errors propagate to the caller unmodified after
//! resource cleanup has run.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, AlgebraError>;

/// Errors surfaced by coverage collection and algebra evaluation.
#[derive(Debug, Error)]
pub enum AlgebraError {
    /// A coverage name could not be resolved from the catalog, or an
    /// expression referenced a name that was never collected.
    #[error("unknown coverage: {0}")]
    UnknownCoverage(String),

    /// A CRS transform failed while reconciling envelopes or coordinates.
    #[error("reprojection from EPSG:{source_crs} to EPSG:{target_crs} failed: {reason}")]
    Reprojection {
        source_crs: i32,
        target_crs: i32,
        reason: String,
    },

    /// The intersection of the input envelopes (and optional ROI) is empty.
    #[error("no overlapping region across input coverages")]
    EmptyIntersection,

    /// A coverage's grid-to-world mapping is not a simple affine transform
    /// with non-zero scales on both axes.
    #[error("unsupported grid-to-world transform: {0}")]
    UnsupportedTransform(String),

    /// The source behind a coverage could not be opened or read.
    #[error("unable to read coverage {name}: {reason}")]
    InvalidReader { name: String, reason: String },

    /// A function call named an operator outside the fixed vocabulary.
    #[error("unknown operator: {0}")]
    UnknownOperator(String),

    /// A function call supplied the wrong number of operands.
    #[error("operator {operator} expects {expected} operand(s), got {actual}")]
    Arity {
        operator: String,
        expected: String,
        actual: usize,
    },

    /// A pixel-scan evaluation was cancelled cooperatively.
    #[error("evaluation cancelled")]
    Cancelled,
}

impl AlgebraError {
    pub(crate) fn reprojection(source_crs: i32, target_crs: i32, reason: impl Into<String>) -> Self {
        AlgebraError::Reprojection {
            source_crs,
            target_crs,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AlgebraError::UnknownCoverage("dem".to_string());
        assert_eq!(err.to_string(), "unknown coverage: dem");

        let err = AlgebraError::reprojection(4326, 3857, "proj init failed");
        assert!(err.to_string().contains("EPSG:4326"));
        assert!(err.to_string().contains("EPSG:3857"));

        let err = AlgebraError::Arity {
            operator: "NOT".to_string(),
            expected: "1".to_string(),
            actual: 3,
        };
        assert!(err.to_string().contains("NOT"));
        assert!(err.to_string().contains('3'));
    }
}
