//! Raster coverage data model.
//!
//! A [`RasterCoverage`] is a handle to pixel data plus the metadata needed
//! to reconcile it with other coverages: grid geometry, CRS, per-coverage
//! NoData. Buffers are `ndarray` arrays in `(bands, rows, cols)` order.
//! Ownership is exclusive and linear: a coverage is owned by exactly one
//! component at a time and handed off, never aliased mutably.

use ndarray::{Array2, Array3, ArrayView2};

use crate::error::{AlgebraError, Result};
use crate::geometry::GridGeometry;

/// A named raster with pixel data, grid geometry and NoData metadata.
#[derive(Debug, Clone)]
pub struct RasterCoverage {
    /// Coverage name as known to the catalog (or synthesized for derived
    /// results).
    pub name: String,
    /// Grid geometry shared by every band.
    pub grid: GridGeometry,
    /// Sentinel sample value meaning "no valid measurement", if declared.
    pub nodata: Option<f64>,
    data: Array3<f64>,
}

impl RasterCoverage {
    /// Wrap a pixel buffer into a coverage.
    ///
    /// # Errors
    /// Returns [`AlgebraError::InvalidReader`] when the buffer shape does
    /// not match the grid range.
    pub fn new(
        name: impl Into<String>,
        grid: GridGeometry,
        nodata: Option<f64>,
        data: Array3<f64>,
    ) -> Result<Self> {
        let name = name.into();
        let (_, rows, cols) = data.dim();
        if rows != grid.range.height || cols != grid.range.width {
            return Err(AlgebraError::InvalidReader {
                name,
                reason: format!(
                    "buffer shape {rows}x{cols} does not match grid range {}x{}",
                    grid.range.height, grid.range.width
                ),
            });
        }
        Ok(Self {
            name,
            grid,
            nodata,
            data,
        })
    }

    /// A single-band coverage filled with one constant value.
    #[must_use]
    pub fn constant(name: impl Into<String>, grid: GridGeometry, value: f64) -> Self {
        Self {
            name: name.into(),
            grid,
            nodata: None,
            data: Array3::from_elem((1, grid.range.height, grid.range.width), value),
        }
    }

    /// A single-band coverage from a 2D array.
    ///
    /// # Errors
    /// Returns [`AlgebraError::InvalidReader`] on shape mismatch.
    pub fn from_band(
        name: impl Into<String>,
        grid: GridGeometry,
        nodata: Option<f64>,
        band: Array2<f64>,
    ) -> Result<Self> {
        let (rows, cols) = band.dim();
        let data = band
            .into_shape_with_order((1, rows, cols))
            .expect("reshaping a 2D band into a single-band 3D buffer cannot fail");
        Self::new(name, grid, nodata, data)
    }

    /// Number of bands.
    #[inline]
    #[must_use]
    pub fn bands(&self) -> usize {
        self.data.dim().0
    }

    /// Raster width in pixels.
    #[inline]
    #[must_use]
    pub fn width(&self) -> usize {
        self.data.dim().2
    }

    /// Raster height in pixels.
    #[inline]
    #[must_use]
    pub fn height(&self) -> usize {
        self.data.dim().1
    }

    /// Sample one pixel, bounds-checked.
    #[must_use]
    pub fn sample(&self, band: usize, col: usize, row: usize) -> Option<f64> {
        let (bands, height, width) = self.data.dim();
        if band >= bands || col >= width || row >= height {
            return None;
        }
        Some(self.data[[band, row, col]])
    }

    /// View of one band.
    ///
    /// # Panics
    /// Panics if `band` is out of range; use [`Self::bands`] to check.
    #[must_use]
    pub fn band(&self, band: usize) -> ArrayView2<'_, f64> {
        self.data.index_axis(ndarray::Axis(0), band)
    }

    /// Borrow the full buffer.
    #[inline]
    #[must_use]
    pub fn data(&self) -> &Array3<f64> {
        &self.data
    }

    /// Take ownership of the full buffer, consuming the coverage.
    #[inline]
    #[must_use]
    pub fn into_data(self) -> Array3<f64> {
        self.data
    }

    /// The value used to fill pixels outside the source extent: the
    /// declared NoData, or 0 when none is declared.
    #[inline]
    #[must_use]
    pub fn background_value(&self) -> f64 {
        self.nodata.unwrap_or(0.0)
    }
}

/// Descriptor for one band of a derived result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleDimension {
    pub label: String,
}

impl SampleDimension {
    /// The synthesized descriptor tagged onto algebra results.
    #[must_use]
    pub fn binary() -> Self {
        Self {
            label: "binary".to_string(),
        }
    }
}

/// The output of an algebra evaluation: one coverage on the shared grid,
/// plus the expression it was derived from.
///
/// NoData metadata is not propagated through the algebra path; the
/// coverage's `nodata` is `None` and the single band is described by a
/// synthesized [`SampleDimension`].
#[derive(Debug, Clone)]
pub struct DerivedRaster {
    pub coverage: RasterCoverage,
    /// Textual rendering of the originating expression.
    pub provenance: String,
    pub sample_dimension: SampleDimension,
}
