//! Coverage collection and grid reconciliation.
//!
//! The collector turns a list of coverage names into a grid-aligned
//! coverage map plus one shared [`GridGeometry`]. Internally it is a
//! three-phase state machine (collecting, grid geometry resolved,
//! coverages loaded) where each phase produces an immutable value
//! consumed by the next. Every loaded buffer is owned by a
//! [`CoverageArena`], so disposal is a single idempotent call that also
//! runs on drop.
//!
//! Two modes:
//! - **derived resolution**: the first collected coverage seeds the
//!   reference CRS and the running envelope; later envelopes are
//!   reprojected and intersected, and the shared pixel size is arbitrated
//!   by a [`ResolutionChoice`] over the accumulated candidates.
//! - **provided geometry**: the caller fixes the output grid up front;
//!   each coverage is windowed-read in its own CRS, resampled onto the
//!   reference grid, cropped to the reference envelope and, when it does
//!   not cover the whole grid, expanded onto it with background fill.

use ahash::AHashMap;
use tracing::{debug, warn};

use crate::catalog::{CoverageDescriptor, RasterCatalog};
use crate::config::EvalConfig;
use crate::error::{AlgebraError, Result};
use crate::geometry::{AffineTransform, Envelope, GridGeometry, GridRange};
use crate::lifecycle::{CoverageArena, CoverageHandle};
use crate::raster::RasterCoverage;
use crate::resolution::ResolutionChoice;
use crate::warp::Warp;

/// Mapping from coverage name to a coverage, all sharing one grid
/// geometry.
pub type GridAlignedRasterMap = AHashMap<String, RasterCoverage>;

enum Mode {
    Derived {
        policy: ResolutionChoice,
        roi: Option<Envelope>,
    },
    Provided {
        geometry: GridGeometry,
    },
}

/// Accumulator for the collecting phase.
struct CollectState {
    reference_crs: Option<i32>,
    final_envelope: Option<Envelope>,
    pixel_sizes_x: Vec<f64>,
    pixel_sizes_y: Vec<f64>,
    entries: Vec<CoverageDescriptor>,
}

impl CollectState {
    fn empty() -> Self {
        Self {
            reference_crs: None,
            final_envelope: None,
            pixel_sizes_x: Vec::new(),
            pixel_sizes_y: Vec::new(),
            entries: Vec::new(),
        }
    }
}

enum Phase {
    Collecting(CollectState),
    Resolved {
        geometry: GridGeometry,
        entries: Vec<CoverageDescriptor>,
    },
    Loaded {
        geometry: GridGeometry,
        map: AHashMap<String, CoverageHandle>,
    },
}

/// Gathers named coverages and reconciles them onto one shared grid.
///
/// A collector serves exactly one evaluation; it is not meant to be
/// reused across requests. After [`CoverageCollector::dispose`] the
/// collector yields empty results.
pub struct CoverageCollector<'a> {
    catalog: &'a dyn RasterCatalog,
    warp: &'a dyn Warp,
    config: EvalConfig,
    mode: Mode,
    phase: Phase,
    arena: CoverageArena,
}

impl<'a> CoverageCollector<'a> {
    /// Derived-resolution collector: the output grid is computed from the
    /// collected coverages, optionally clipped by `roi`.
    #[must_use]
    pub fn new(
        catalog: &'a dyn RasterCatalog,
        warp: &'a dyn Warp,
        policy: ResolutionChoice,
        roi: Option<Envelope>,
        config: EvalConfig,
    ) -> Self {
        Self {
            catalog,
            warp,
            config,
            mode: Mode::Derived { policy, roi },
            phase: Phase::Collecting(CollectState::empty()),
            arena: CoverageArena::new(),
        }
    }

    /// Provided-geometry collector: the caller supplies the output grid
    /// geometry up front.
    #[must_use]
    pub fn with_grid_geometry(
        catalog: &'a dyn RasterCatalog,
        warp: &'a dyn Warp,
        geometry: GridGeometry,
        config: EvalConfig,
    ) -> Self {
        let mut state = CollectState::empty();
        state.reference_crs = Some(geometry.crs);
        state.final_envelope = Some(geometry.envelope());
        Self {
            catalog,
            warp,
            config,
            mode: Mode::Provided { geometry },
            phase: Phase::Collecting(state),
            arena: CoverageArena::new(),
        }
    }

    /// Resolve every name against the catalog and fold its geometry into
    /// the running reconciliation.
    ///
    /// # Errors
    /// - [`AlgebraError::UnknownCoverage`] when `names` is empty or a
    ///   name does not resolve
    /// - [`AlgebraError::UnsupportedTransform`] when a coverage's
    ///   grid-to-world mapping is degenerate
    /// - [`AlgebraError::Reprojection`] when an envelope cannot be
    ///   carried into the reference CRS (derived mode)
    /// - [`AlgebraError::EmptyIntersection`] when the running envelope
    ///   intersection becomes empty (derived mode)
    pub fn collect<S: AsRef<str>>(&mut self, names: &[S]) -> Result<()> {
        if names.is_empty() {
            return Err(AlgebraError::UnknownCoverage(
                "(no coverage names supplied)".to_string(),
            ));
        }
        if !matches!(self.phase, Phase::Collecting(_)) {
            warn!("collect ignored: grid geometry already resolved");
            return Ok(());
        }
        for name in names {
            self.visit_coverage(name.as_ref())?;
        }
        Ok(())
    }

    fn visit_coverage(&mut self, name: &str) -> Result<()> {
        let descriptor = self.catalog.resolve(name)?;
        if descriptor.grid.transform.is_degenerate() {
            return Err(AlgebraError::UnsupportedTransform(format!(
                "coverage {name}"
            )));
        }

        let Phase::Collecting(state) = &mut self.phase else {
            unreachable!("checked by collect()");
        };

        match &self.mode {
            Mode::Derived { .. } => {
                if state.reference_crs.is_none() {
                    // first coverage seeds the reference
                    debug!(name, crs = descriptor.crs(), "reference coverage");
                    state.reference_crs = Some(descriptor.crs());
                    state.final_envelope = Some(descriptor.envelope);
                    let (sx, sy) = descriptor.pixel_size();
                    state.pixel_sizes_x.push(sx);
                    state.pixel_sizes_y.push(sy);
                } else {
                    let reference_crs = state.reference_crs.expect("reference seeded above");
                    let (envelope, reprojected) = if descriptor.crs() == reference_crs {
                        (descriptor.envelope, false)
                    } else {
                        (
                            self.warp
                                .reproject_envelope(&descriptor.envelope, reference_crs)?,
                            true,
                        )
                    };

                    let running = state
                        .final_envelope
                        .expect("envelope seeded with the reference coverage");
                    state.final_envelope = Some(running.intersection(&envelope)?);

                    if reprojected {
                        // simulate the reprojected resolution through a
                        // grid-to-envelope mapping
                        state
                            .pixel_sizes_x
                            .push(envelope.width() / descriptor.grid.range.width as f64);
                        state
                            .pixel_sizes_y
                            .push(envelope.height() / descriptor.grid.range.height as f64);
                    } else {
                        let (sx, sy) = descriptor.pixel_size();
                        state.pixel_sizes_x.push(sx);
                        state.pixel_sizes_y.push(sy);
                    }
                }
                state.entries.push(descriptor);
            }
            Mode::Provided { .. } => {
                let reference_crs = state.reference_crs.expect("fixed at construction");
                let envelope = if descriptor.crs() == reference_crs {
                    descriptor.envelope
                } else {
                    match self
                        .warp
                        .reproject_envelope(&descriptor.envelope, reference_crs)
                    {
                        Ok(envelope) => envelope,
                        Err(err) => {
                            warn!(name, %err, "skipping coverage: envelope reprojection failed");
                            return Ok(());
                        }
                    }
                };
                let reference_envelope =
                    state.final_envelope.expect("fixed at construction");
                if !envelope.intersects(&reference_envelope) {
                    warn!(name, "skipping coverage: does not intersect provided area");
                    return Ok(());
                }
                state.entries.push(descriptor);
            }
        }
        Ok(())
    }

    /// Compute the final grid geometry once. Later calls return the
    /// memoized value.
    ///
    /// # Errors
    /// - [`AlgebraError::EmptyIntersection`] when nothing was collected,
    ///   the ROI does not overlap the running envelope, or a pixel-size
    ///   list is empty
    /// - [`AlgebraError::Reprojection`] when the ROI cannot be carried
    ///   into the reference CRS
    pub fn prepare_final_grid_geometry(&mut self) -> Result<GridGeometry> {
        match &self.phase {
            Phase::Resolved { geometry, .. } | Phase::Loaded { geometry, .. } => {
                return Ok(*geometry)
            }
            Phase::Collecting(_) => {}
        }

        let Phase::Collecting(state) =
            std::mem::replace(&mut self.phase, Phase::Collecting(CollectState::empty()))
        else {
            unreachable!("checked above");
        };

        let outcome = self.resolve_geometry(&state);
        match outcome {
            Ok(geometry) => {
                debug!(
                    width = geometry.range.width,
                    height = geometry.range.height,
                    crs = geometry.crs,
                    "final grid geometry resolved"
                );
                self.phase = Phase::Resolved {
                    geometry,
                    entries: state.entries,
                };
                Ok(geometry)
            }
            Err(err) => {
                // keep the accumulated state so a caller can inspect it,
                // but the collector stays unresolved
                self.phase = Phase::Collecting(state);
                Err(err)
            }
        }
    }

    fn resolve_geometry(&self, state: &CollectState) -> Result<GridGeometry> {
        match &self.mode {
            Mode::Provided { geometry } => Ok(*geometry),
            Mode::Derived { policy, roi } => {
                let reference_crs = state
                    .reference_crs
                    .ok_or(AlgebraError::EmptyIntersection)?;
                let mut envelope = state
                    .final_envelope
                    .ok_or(AlgebraError::EmptyIntersection)?;

                if let Some(roi) = roi {
                    let roi = if roi.crs == reference_crs {
                        *roi
                    } else {
                        self.warp.reproject_envelope(roi, reference_crs)?
                    };
                    envelope = envelope.intersection(&roi)?;
                }
                if envelope.is_empty() {
                    return Err(AlgebraError::EmptyIntersection);
                }

                let scale_x = policy.compute(&state.pixel_sizes_x)?;
                let scale_y = policy.compute(&state.pixel_sizes_y)?;
                GridGeometry::from_envelope(&envelope, scale_x, scale_y)
            }
        }
    }

    /// The shared grid geometry, loading coverages on first use.
    ///
    /// # Errors
    /// Propagates every collection, resolution and read error.
    pub fn grid_geometry(&mut self) -> Result<GridGeometry> {
        self.load()?;
        match &self.phase {
            Phase::Loaded { geometry, .. } => Ok(*geometry),
            _ => unreachable!("load() leaves the collector in the loaded phase"),
        }
    }

    /// The grid-aligned coverage map. Returns copies of the internal
    /// coverages so callers cannot corrupt collector state.
    ///
    /// # Errors
    /// Propagates every collection, resolution and read error.
    pub fn coverages(&mut self) -> Result<GridAlignedRasterMap> {
        self.load()?;
        let Phase::Loaded { map, .. } = &self.phase else {
            unreachable!("load() leaves the collector in the loaded phase");
        };
        let mut out = GridAlignedRasterMap::default();
        for (name, handle) in map {
            if let Some(coverage) = self.arena.get(*handle) {
                out.insert(name.clone(), coverage.clone());
            }
        }
        Ok(out)
    }

    /// Load every collected coverage at the final grid geometry, once.
    fn load(&mut self) -> Result<()> {
        if matches!(self.phase, Phase::Loaded { .. }) {
            return Ok(());
        }
        let geometry = self.prepare_final_grid_geometry()?;

        let Phase::Resolved { entries, .. } =
            std::mem::replace(&mut self.phase, Phase::Collecting(CollectState::empty()))
        else {
            unreachable!("prepare_final_grid_geometry() resolved the phase");
        };

        let mut map = AHashMap::new();
        let result = self.load_entries(&entries, &geometry, &mut map);
        match result {
            Ok(()) => {
                self.phase = Phase::Loaded { geometry, map };
                Ok(())
            }
            Err(err) => {
                // partially loaded buffers stay in the arena for cleanup
                self.phase = Phase::Resolved { geometry, entries };
                Err(err)
            }
        }
    }

    fn load_entries(
        &mut self,
        entries: &[CoverageDescriptor],
        geometry: &GridGeometry,
        map: &mut AHashMap<String, CoverageHandle>,
    ) -> Result<()> {
        for descriptor in entries {
            let coverage = match &self.mode {
                Mode::Derived { .. } => self.catalog.read(
                    &descriptor.name,
                    geometry,
                    self.config.suggested_tile_size,
                )?,
                Mode::Provided { .. } => self.load_provided(descriptor, geometry)?,
            };
            let handle = self.arena.acquire(coverage);
            map.insert(descriptor.name.clone(), handle);
        }
        Ok(())
    }

    /// Provided-geometry load path: windowed read in the coverage's own
    /// CRS, resample onto the reference grid lattice, crop to the
    /// reference envelope, expand with background fill when the result
    /// does not cover the whole target grid.
    fn load_provided(
        &self,
        descriptor: &CoverageDescriptor,
        geometry: &GridGeometry,
    ) -> Result<RasterCoverage> {
        let reference_envelope = geometry.envelope();

        // sub-envelope of the request in the coverage's native CRS
        let native_request = if descriptor.crs() == geometry.crs {
            reference_envelope
        } else {
            self.warp
                .reproject_envelope(&reference_envelope, descriptor.crs())?
        };
        let native_window = native_request.intersection(&descriptor.envelope)?;
        let (nx, ny) = descriptor.pixel_size();
        let read_grid = GridGeometry::from_envelope(&native_window, nx, ny)?;
        let raster =
            self.catalog
                .read(&descriptor.name, &read_grid, self.config.suggested_tile_size)?;

        // resample onto a sub-grid aligned with the reference lattice
        let available = if descriptor.crs() == geometry.crs {
            native_window
        } else {
            self.warp.reproject_envelope(&native_window, geometry.crs)?
        };
        let aligned_grid = align_to_lattice(geometry, &available)?;
        let resampled = self.warp.resample(&raster, &aligned_grid)?;

        // confine to the reference envelope
        let cropped = self.warp.crop(&resampled, &reference_envelope)?;

        if cropped.grid.range == geometry.range {
            Ok(cropped)
        } else {
            let background = descriptor.nodata.unwrap_or_else(|| {
                debug!(name = %descriptor.name, "no declared NoData; expanding with 0");
                0.0
            });
            self.warp.expand_to_grid(&cropped, geometry, background)
        }
    }

    /// Release all held coverage buffers. Idempotent and safe after a
    /// failed or partial collection.
    pub fn dispose(&mut self) {
        self.arena.dispose();
    }

    /// Release accounting, exposed for verification.
    #[must_use]
    pub fn buffers_acquired(&self) -> usize {
        self.arena.acquired()
    }

    /// Release accounting, exposed for verification.
    #[must_use]
    pub fn buffers_released(&self) -> usize {
        self.arena.released()
    }
}

/// Snap `envelope` onto the pixel lattice of `reference`, returning the
/// covering sub-grid (which may extend beyond the reference range).
fn align_to_lattice(reference: &GridGeometry, envelope: &Envelope) -> Result<GridGeometry> {
    let tr = &reference.transform;
    let (c0, r0) = tr.world_to_pixel(envelope.min_x, envelope.max_y);
    let (c1, r1) = tr.world_to_pixel(envelope.max_x, envelope.min_y);

    let col0 = c0.min(c1).floor();
    let row0 = r0.min(r1).floor();
    let col1 = c0.max(c1).ceil();
    let row1 = r0.max(r1).ceil();

    let width = (col1 - col0).max(1.0) as usize;
    let height = (row1 - row0).max(1.0) as usize;
    let (origin_x, origin_y) = tr.pixel_to_world(col0, row0);
    GridGeometry::new(
        GridRange::new(width, height),
        AffineTransform::new(tr.scale_x, tr.scale_y, origin_x, origin_y),
        reference.crs,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;
    use crate::warp::GridWarp;
    use ndarray::Array2;

    fn grid(crs: i32, min_x: f64, min_y: f64, max_x: f64, max_y: f64, px: f64) -> GridGeometry {
        GridGeometry::from_envelope(&Envelope::new(crs, min_x, min_y, max_x, max_y), px, px)
            .unwrap()
    }

    fn flat(name: &str, grid: GridGeometry, value: f64) -> RasterCoverage {
        RasterCoverage::constant(name, grid, value)
    }

    /// dem: 0..10 square at 1.0/px, slope: 4..14 square at 2.0/px
    fn two_coverage_catalog() -> MemoryCatalog {
        let mut catalog = MemoryCatalog::new();
        catalog.insert(flat("dem", grid(4326, 0.0, 0.0, 10.0, 10.0, 1.0), 10.0));
        catalog.insert(flat("slope", grid(4326, 4.0, 4.0, 14.0, 14.0, 2.0), 20.0));
        catalog
    }

    #[test]
    fn test_derived_mode_intersection_and_min_resolution() {
        let catalog = two_coverage_catalog();
        let warp = GridWarp::new();
        let mut collector = CoverageCollector::new(
            &catalog,
            &warp,
            ResolutionChoice::Min,
            None,
            EvalConfig::default(),
        );
        collector.collect(&["dem", "slope"]).unwrap();

        let geometry = collector.grid_geometry().unwrap();
        let envelope = geometry.envelope();
        assert!((envelope.min_x - 4.0).abs() < 1e-9);
        assert!((envelope.min_y - 4.0).abs() < 1e-9);
        assert!((envelope.max_x - 10.0).abs() < 1e-9);
        assert!((envelope.max_y - 10.0).abs() < 1e-9);
        assert_eq!(geometry.pixel_size(), (1.0, 1.0));

        let coverages = collector.coverages().unwrap();
        assert_eq!(coverages.len(), 2);
        let dem = &coverages["dem"];
        let slope = &coverages["slope"];
        assert_eq!(dem.grid, geometry);
        assert_eq!(slope.grid, geometry);
        assert_eq!(dem.sample(0, 0, 0), Some(10.0));
        assert_eq!(slope.sample(0, 0, 0), Some(20.0));
    }

    #[test]
    fn test_derived_mode_is_order_independent_for_min() {
        let catalog = two_coverage_catalog();
        let warp = GridWarp::new();

        let mut forward = CoverageCollector::new(
            &catalog,
            &warp,
            ResolutionChoice::Min,
            None,
            EvalConfig::default(),
        );
        forward.collect(&["dem", "slope"]).unwrap();

        let mut reverse = CoverageCollector::new(
            &catalog,
            &warp,
            ResolutionChoice::Min,
            None,
            EvalConfig::default(),
        );
        reverse.collect(&["slope", "dem"]).unwrap();

        let a = forward.grid_geometry().unwrap();
        let b = reverse.grid_geometry().unwrap();
        assert_eq!(a.pixel_size(), b.pixel_size());
        assert_eq!(a.envelope(), b.envelope());
    }

    #[test]
    fn test_first_policy_is_order_dependent() {
        let catalog = two_coverage_catalog();
        let warp = GridWarp::new();

        let mut forward = CoverageCollector::new(
            &catalog,
            &warp,
            ResolutionChoice::First,
            None,
            EvalConfig::default(),
        );
        forward.collect(&["dem", "slope"]).unwrap();
        assert_eq!(forward.grid_geometry().unwrap().pixel_size(), (1.0, 1.0));

        let mut reverse = CoverageCollector::new(
            &catalog,
            &warp,
            ResolutionChoice::First,
            None,
            EvalConfig::default(),
        );
        reverse.collect(&["slope", "dem"]).unwrap();
        assert_eq!(reverse.grid_geometry().unwrap().pixel_size(), (2.0, 2.0));
    }

    #[test]
    fn test_unknown_name_fails() {
        let catalog = two_coverage_catalog();
        let warp = GridWarp::new();
        let mut collector = CoverageCollector::new(
            &catalog,
            &warp,
            ResolutionChoice::Min,
            None,
            EvalConfig::default(),
        );
        assert!(matches!(
            collector.collect(&["dem", "missing"]),
            Err(AlgebraError::UnknownCoverage(_))
        ));
        // cleanup still safe after the failure
        collector.dispose();
    }

    #[test]
    fn test_zero_names_fails() {
        let catalog = two_coverage_catalog();
        let warp = GridWarp::new();
        let mut collector = CoverageCollector::new(
            &catalog,
            &warp,
            ResolutionChoice::Min,
            None,
            EvalConfig::default(),
        );
        let names: [&str; 0] = [];
        assert!(matches!(
            collector.collect(&names),
            Err(AlgebraError::UnknownCoverage(_))
        ));
    }

    #[test]
    fn test_disjoint_envelopes_fail() {
        let mut catalog = MemoryCatalog::new();
        catalog.insert(flat("a", grid(4326, 0.0, 0.0, 5.0, 5.0, 1.0), 1.0));
        catalog.insert(flat("b", grid(4326, 20.0, 20.0, 30.0, 30.0, 1.0), 2.0));
        let warp = GridWarp::new();
        let mut collector = CoverageCollector::new(
            &catalog,
            &warp,
            ResolutionChoice::Min,
            None,
            EvalConfig::default(),
        );
        assert!(matches!(
            collector.collect(&["a", "b"]),
            Err(AlgebraError::EmptyIntersection)
        ));
    }

    #[test]
    fn test_roi_clips_final_envelope() {
        let catalog = two_coverage_catalog();
        let warp = GridWarp::new();
        let roi = Envelope::new(4326, 5.0, 5.0, 8.0, 8.0);
        let mut collector = CoverageCollector::new(
            &catalog,
            &warp,
            ResolutionChoice::Min,
            Some(roi),
            EvalConfig::default(),
        );
        collector.collect(&["dem", "slope"]).unwrap();
        let envelope = collector.grid_geometry().unwrap().envelope();
        assert!((envelope.min_x - 5.0).abs() < 1e-9);
        assert!((envelope.max_x - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_disjoint_roi_fails() {
        let catalog = two_coverage_catalog();
        let warp = GridWarp::new();
        let roi = Envelope::new(4326, 100.0, 100.0, 110.0, 110.0);
        let mut collector = CoverageCollector::new(
            &catalog,
            &warp,
            ResolutionChoice::Min,
            Some(roi),
            EvalConfig::default(),
        );
        collector.collect(&["dem", "slope"]).unwrap();
        assert!(matches!(
            collector.prepare_final_grid_geometry(),
            Err(AlgebraError::EmptyIntersection)
        ));
    }

    #[test]
    fn test_cross_crs_collection() {
        let mut catalog = MemoryCatalog::new();
        catalog.insert(flat("geo", grid(4326, 0.0, 0.0, 10.0, 10.0, 0.1), 1.0));
        // roughly the same area expressed in web mercator
        catalog.insert(flat(
            "merc",
            grid(3857, 0.0, 0.0, 1_113_194.9, 1_113_194.9, 10_000.0),
            2.0,
        ));
        let warp = GridWarp::new();
        let mut collector = CoverageCollector::new(
            &catalog,
            &warp,
            ResolutionChoice::Min,
            None,
            EvalConfig::default(),
        );
        collector.collect(&["geo", "merc"]).unwrap();

        let geometry = collector.grid_geometry().unwrap();
        // reference CRS comes from the first coverage
        assert_eq!(geometry.crs, 4326);
        let coverages = collector.coverages().unwrap();
        assert_eq!(coverages.len(), 2);
        assert_eq!(coverages["merc"].grid.crs, 4326);
    }

    #[test]
    fn test_dispose_twice_is_safe() {
        let catalog = two_coverage_catalog();
        let warp = GridWarp::new();
        let mut collector = CoverageCollector::new(
            &catalog,
            &warp,
            ResolutionChoice::Min,
            None,
            EvalConfig::default(),
        );
        collector.collect(&["dem", "slope"]).unwrap();
        let _ = collector.coverages().unwrap();

        assert_eq!(collector.buffers_acquired(), 2);
        collector.dispose();
        assert_eq!(collector.buffers_released(), 2);
        collector.dispose();
        assert_eq!(collector.buffers_released(), 2);

        // after disposal the collector yields empty results
        assert!(collector.coverages().unwrap().is_empty());
    }

    #[test]
    fn test_provided_mode_backfills_partial_coverage() {
        let mut catalog = MemoryCatalog::new();
        // coverage only spans the left half of the requested area
        let partial_grid = grid(4326, 0.0, 0.0, 5.0, 10.0, 1.0);
        let band = Array2::from_elem((10, 5), 7.0);
        catalog.insert(
            RasterCoverage::from_band("partial", partial_grid, Some(-1.0), band).unwrap(),
        );

        let warp = GridWarp::new();
        let target = grid(4326, 0.0, 0.0, 10.0, 10.0, 1.0);
        let mut collector = CoverageCollector::with_grid_geometry(
            &catalog,
            &warp,
            target,
            EvalConfig::default(),
        );
        collector.collect(&["partial"]).unwrap();

        let coverages = collector.coverages().unwrap();
        let out = &coverages["partial"];
        assert_eq!(out.grid, target);
        // covered half keeps its values
        assert_eq!(out.sample(0, 2, 5), Some(7.0));
        // uncovered half is filled with the declared NoData
        assert_eq!(out.sample(0, 7, 5), Some(-1.0));
    }

    #[test]
    fn test_provided_mode_skips_non_intersecting() {
        let mut catalog = MemoryCatalog::new();
        catalog.insert(flat("inside", grid(4326, 0.0, 0.0, 10.0, 10.0, 1.0), 1.0));
        catalog.insert(flat("outside", grid(4326, 50.0, 50.0, 60.0, 60.0, 1.0), 2.0));

        let warp = GridWarp::new();
        let target = grid(4326, 0.0, 0.0, 10.0, 10.0, 1.0);
        let mut collector = CoverageCollector::with_grid_geometry(
            &catalog,
            &warp,
            target,
            EvalConfig::default(),
        );
        collector.collect(&["inside", "outside"]).unwrap();

        let coverages = collector.coverages().unwrap();
        assert_eq!(coverages.len(), 1);
        assert!(coverages.contains_key("inside"));
    }

    #[test]
    fn test_degenerate_transform_rejected() {
        struct DegenerateCatalog;
        impl RasterCatalog for DegenerateCatalog {
            fn resolve(&self, name: &str) -> Result<CoverageDescriptor> {
                let grid = GridGeometry {
                    range: GridRange::new(10, 10),
                    transform: AffineTransform::new(0.0, -1.0, 0.0, 10.0),
                    crs: 4326,
                };
                Ok(CoverageDescriptor {
                    name: name.to_string(),
                    grid,
                    envelope: Envelope::new(4326, 0.0, 0.0, 10.0, 10.0),
                    nodata: None,
                    bands: 1,
                })
            }
            fn read(
                &self,
                name: &str,
                _target: &GridGeometry,
                _suggested_tile_size: (usize, usize),
            ) -> Result<RasterCoverage> {
                Err(AlgebraError::InvalidReader {
                    name: name.to_string(),
                    reason: "unreadable".to_string(),
                })
            }
        }

        let catalog = DegenerateCatalog;
        let warp = GridWarp::new();
        let mut collector = CoverageCollector::new(
            &catalog,
            &warp,
            ResolutionChoice::Min,
            None,
            EvalConfig::default(),
        );
        assert!(matches!(
            collector.collect(&["broken"]),
            Err(AlgebraError::UnsupportedTransform(_))
        ));
    }
}
