//! Coordinate/resampling service.
//!
//! The collector consumes these primitives through the [`Warp`] trait so
//! a deployment can swap in a different resampling engine. [`GridWarp`]
//! is the built-in implementation: inverse-mapping nearest-neighbor
//! resampling, envelope-window cropping and background-filled grid
//! expansion.

use ndarray::{s, Array3};

use crate::error::{AlgebraError, Result};
use crate::geometry::projection::{self, CoordTransformer};
use crate::geometry::{AffineTransform, Envelope, GridGeometry, GridRange};
use crate::raster::RasterCoverage;

/// Reprojection, resampling and cropping primitives.
pub trait Warp: Send + Sync {
    /// Reproject an envelope into another CRS.
    ///
    /// # Errors
    /// Returns [`AlgebraError::Reprojection`] on transform failure.
    fn reproject_envelope(&self, envelope: &Envelope, target_crs: i32) -> Result<Envelope>;

    /// Resample a coverage onto a target grid geometry (which may be in a
    /// different CRS). Pixels with no source sample are filled with the
    /// coverage's background value.
    ///
    /// # Errors
    /// Returns [`AlgebraError::Reprojection`] when the CRS pair cannot be
    /// transformed.
    fn resample(&self, raster: &RasterCoverage, target: &GridGeometry) -> Result<RasterCoverage>;

    /// Crop a coverage to the pixel window covering `envelope`.
    ///
    /// # Errors
    /// Returns [`AlgebraError::EmptyIntersection`] when the envelope does
    /// not overlap the coverage.
    fn crop(&self, raster: &RasterCoverage, envelope: &Envelope) -> Result<RasterCoverage>;

    /// Place a coverage onto a larger (or shifted) grid with the same CRS
    /// and pixel size, filling uncovered pixels with `nodata`.
    ///
    /// # Errors
    /// Returns [`AlgebraError::UnsupportedTransform`] when the grids are
    /// not aligned (different CRS or pixel size).
    fn expand_to_grid(
        &self,
        raster: &RasterCoverage,
        target: &GridGeometry,
        nodata: f64,
    ) -> Result<RasterCoverage>;
}

/// Built-in [`Warp`] implementation over in-memory buffers.
#[derive(Debug, Default, Clone, Copy)]
pub struct GridWarp;

impl GridWarp {
    #[must_use]
    pub fn new() -> Self {
        GridWarp
    }
}

/// Inverse-mapping nearest-neighbor resample of `source` onto `target`.
///
/// Walks every target pixel center back through the CRS transform (when
/// the CRSs differ) and the source grid-to-world transform, then takes
/// the nearest source sample. Pixels that land outside the source extent
/// keep the source's background value.
pub(crate) fn resample_grid(
    source: &RasterCoverage,
    target: &GridGeometry,
) -> Result<Array3<f64>> {
    let transformer = if source.grid.crs == target.crs {
        None
    } else {
        Some(CoordTransformer::new(target.crs, source.grid.crs)?)
    };

    let bands = source.bands();
    let (width, height) = (target.range.width, target.range.height);
    let background = source.background_value();
    let mut data = Array3::from_elem((bands, height, width), background);

    for row in 0..height {
        for col in 0..width {
            let (wx, wy) = target
                .transform
                .pixel_to_world(col as f64 + 0.5, row as f64 + 0.5);
            let (sx, sy) = match &transformer {
                Some(t) => match t.transform(wx, wy) {
                    Ok(point) => point,
                    // outside the projection's valid area: leave background
                    Err(_) => continue,
                },
                None => (wx, wy),
            };
            let (pc, pr) = source.grid.transform.world_to_pixel(sx, sy);
            if pc < 0.0 || pr < 0.0 {
                continue;
            }
            let (pc, pr) = (pc as usize, pr as usize);
            if pc >= source.width() || pr >= source.height() {
                continue;
            }
            for band in 0..bands {
                if let Some(value) = source.sample(band, pc, pr) {
                    data[[band, row, col]] = value;
                }
            }
        }
    }

    Ok(data)
}

impl Warp for GridWarp {
    fn reproject_envelope(&self, envelope: &Envelope, target_crs: i32) -> Result<Envelope> {
        projection::reproject_envelope(envelope, target_crs)
    }

    fn resample(&self, raster: &RasterCoverage, target: &GridGeometry) -> Result<RasterCoverage> {
        let data = resample_grid(raster, target)?;
        RasterCoverage::new(raster.name.clone(), *target, raster.nodata, data)
    }

    fn crop(&self, raster: &RasterCoverage, envelope: &Envelope) -> Result<RasterCoverage> {
        // bring the crop window into the raster's CRS first
        let envelope = if envelope.crs == raster.grid.crs {
            *envelope
        } else {
            projection::reproject_envelope(envelope, raster.grid.crs)?
        };

        let tr = &raster.grid.transform;
        let (px0, py0) = tr.world_to_pixel(envelope.min_x, envelope.max_y);
        let (px1, py1) = tr.world_to_pixel(envelope.max_x, envelope.min_y);

        let col0 = px0.min(px1).floor().max(0.0) as usize;
        let row0 = py0.min(py1).floor().max(0.0) as usize;
        let col1 = (px0.max(px1).ceil() as usize).min(raster.width());
        let row1 = (py0.max(py1).ceil() as usize).min(raster.height());

        if col0 >= col1 || row0 >= row1 {
            return Err(AlgebraError::EmptyIntersection);
        }

        let data = raster
            .data()
            .slice(s![.., row0..row1, col0..col1])
            .to_owned();
        let (origin_x, origin_y) = tr.pixel_to_world(col0 as f64, row0 as f64);
        let transform = AffineTransform::new(tr.scale_x, tr.scale_y, origin_x, origin_y);
        let grid = GridGeometry::new(
            GridRange::new(col1 - col0, row1 - row0),
            transform,
            raster.grid.crs,
        )?;
        RasterCoverage::new(raster.name.clone(), grid, raster.nodata, data)
    }

    fn expand_to_grid(
        &self,
        raster: &RasterCoverage,
        target: &GridGeometry,
        nodata: f64,
    ) -> Result<RasterCoverage> {
        if raster.grid.crs != target.crs {
            return Err(AlgebraError::UnsupportedTransform(format!(
                "cannot expand across CRSs (EPSG:{} onto EPSG:{})",
                raster.grid.crs, target.crs
            )));
        }
        let (sx, sy) = raster.grid.pixel_size();
        let (tx, ty) = target.pixel_size();
        if (sx - tx).abs() > 1e-9 * tx.abs() || (sy - ty).abs() > 1e-9 * ty.abs() {
            return Err(AlgebraError::UnsupportedTransform(format!(
                "cannot expand across pixel sizes (({sx}, {sy}) onto ({tx}, {ty}))"
            )));
        }

        // integer pixel offset of the raster's origin within the target grid
        let (col_off, row_off) = target.transform.world_to_pixel(
            raster.grid.transform.translate_x,
            raster.grid.transform.translate_y,
        );
        let col_off = col_off.round() as isize;
        let row_off = row_off.round() as isize;

        let bands = raster.bands();
        let mut data = Array3::from_elem(
            (bands, target.range.height, target.range.width),
            nodata,
        );

        for row in 0..raster.height() {
            let target_row = row as isize + row_off;
            if target_row < 0 || target_row as usize >= target.range.height {
                continue;
            }
            for col in 0..raster.width() {
                let target_col = col as isize + col_off;
                if target_col < 0 || target_col as usize >= target.range.width {
                    continue;
                }
                for band in 0..bands {
                    if let Some(value) = raster.sample(band, col, row) {
                        data[[band, target_row as usize, target_col as usize]] = value;
                    }
                }
            }
        }

        let mut out = RasterCoverage::new(raster.name.clone(), *target, raster.nodata, data)?;
        if out.nodata.is_none() {
            out.nodata = Some(nodata);
        }
        Ok(out)
    }
}
