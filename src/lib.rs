//! # rastalg - Raster Algebra Evaluation Engine
//!
//! Reconciles named raster coverages that may differ in CRS, resolution
//! and extent onto one shared grid, then evaluates boolean/arithmetic
//! expressions over them to derive a new raster.
//!
//! ## Features
//!
//! - **Grid reconciliation**: envelope intersection across CRSs, pixel
//!   size arbitration (MIN/MAX/AVG/FIRST), north-up output grids
//! - **Expression compilation**: comparisons compile to per-pixel
//!   binarization, logical nodes fold pairwise, function calls dispatch
//!   into a fixed operator vocabulary
//! - **Provided-geometry collection**: window, resample, crop and
//!   background-fill coverages onto a caller-supplied grid
//! - **Deterministic cleanup**: every buffer read during an evaluation is
//!   released exactly once, on failure paths included
//! - **Pixel scans**: scripted per-pixel evaluation with cooperative
//!   cancellation
//! - **Pure Rust projections**: proj4rs + crs-definitions, no GDAL
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rastalg::{
//!     AlgebraExpression, CompareOp, EvalConfig, GridWarp, MemoryCatalog,
//!     RasterAlgebraProcess, ResolutionChoice,
//! };
//!
//! let mut catalog = MemoryCatalog::new();
//! catalog.insert(dem);
//! catalog.insert(slope);
//!
//! let process = RasterAlgebraProcess::new(catalog, GridWarp::new(), EvalConfig::default());
//! let expr = AlgebraExpression::and(vec![
//!     AlgebraExpression::compare("dem", CompareOp::Gt, 1000.0),
//!     AlgebraExpression::between("slope", 0.0, 30.0),
//! ]);
//! let derived = process.evaluate(&["dem", "slope"], &expr, None, ResolutionChoice::Min)?;
//! ```
//!
//! ## Architecture
//!
//! - [`collector`]: gathers inputs and reconciles them onto one grid
//! - [`processor`]: compiles the expression AST into pixel operations
//! - [`operator`]: the fixed pixel-wise operator vocabulary
//! - [`resolution`]: pixel-size arbitration policies
//! - [`lifecycle`]: scoped acquisition/release of raster buffers
//! - [`catalog`]: name resolution and windowed reads
//! - [`warp`]: reprojection/resampling/cropping primitives
//! - [`geometry`]: envelopes, grid geometries and EPSG projections
//! - [`scan`]: scripted per-pixel evaluation with cancellation

// ============================================================================
// Public modules
// ============================================================================

pub mod catalog;
pub mod collector;
pub mod config;
pub mod error;
pub mod expression;
pub mod geometry;
pub mod lifecycle;
pub mod operator;
pub mod process;
pub mod processor;
pub mod raster;
pub mod resolution;
pub mod scan;
pub mod warp;

// ============================================================================
// Entry Points
// ============================================================================

pub use process::RasterAlgebraProcess;
pub use scan::{CancellationToken, PixelScanProcess, ScanSamples};

// ============================================================================
// Core Types
// ============================================================================

pub use config::EvalConfig;
pub use error::{AlgebraError, Result};
pub use expression::{AlgebraExpression, CompareOp};
pub use raster::{DerivedRaster, RasterCoverage, SampleDimension};
pub use resolution::ResolutionChoice;

// ============================================================================
// Collection & Compilation
// ============================================================================

pub use collector::{CoverageCollector, GridAlignedRasterMap};
pub use lifecycle::{CoverageArena, CoverageHandle};
pub use processor::CoverageProcessor;

// ============================================================================
// Geometry & Projections
// ============================================================================

pub use geometry::projection::{
    get_proj_string,
    is_geographic_crs,
    project_point,
    reproject_envelope,
    CoordTransformer,
};
pub use geometry::{AffineTransform, Envelope, GridGeometry, GridRange};

// ============================================================================
// External Collaborators
// ============================================================================

pub use catalog::{CoverageDescriptor, MemoryCatalog, RasterCatalog};
pub use warp::{GridWarp, Warp};
