//! Geometry primitives: envelopes, grid ranges and affine grid-to-world
//! transforms.
//!
//! Every raster in this crate maps pixel indices to real-world coordinates
//! through a [`GridGeometry`]: a pixel extent, an axis-aligned affine
//! transform and a CRS (an EPSG code). The transform follows the north-up
//! convention: the world origin sits at the top-left cell corner and the
//! Y scale is negative.

pub mod projection;

use crate::error::{AlgebraError, Result};

/// An axis-aligned bounding box tagged with a CRS.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    /// EPSG code of the coordinate reference system.
    pub crs: i32,
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Envelope {
    /// Create a new envelope.
    #[must_use]
    pub fn new(crs: i32, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            crs,
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Width of the envelope in CRS units.
    #[inline]
    #[must_use]
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Height of the envelope in CRS units.
    #[inline]
    #[must_use]
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// An envelope is empty when it has no positive extent on either axis.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }

    /// Whether this envelope overlaps `other` with positive area.
    ///
    /// Both envelopes must already be expressed in the same CRS.
    #[must_use]
    pub fn intersects(&self, other: &Envelope) -> bool {
        self.min_x < other.max_x
            && other.min_x < self.max_x
            && self.min_y < other.max_y
            && other.min_y < self.max_y
    }

    /// Geometric intersection of two same-CRS envelopes.
    ///
    /// # Errors
    /// Returns [`AlgebraError::EmptyIntersection`] when the envelopes do
    /// not overlap. An empty intersection is a hard failure, never a
    /// degenerate empty envelope.
    pub fn intersection(&self, other: &Envelope) -> Result<Envelope> {
        let result = Envelope {
            crs: self.crs,
            min_x: self.min_x.max(other.min_x),
            min_y: self.min_y.max(other.min_y),
            max_x: self.max_x.min(other.max_x),
            max_y: self.max_y.min(other.max_y),
        };
        if result.is_empty() {
            return Err(AlgebraError::EmptyIntersection);
        }
        Ok(result)
    }

    /// Whether this envelope fully contains `other`.
    #[must_use]
    pub fn contains(&self, other: &Envelope) -> bool {
        self.min_x <= other.min_x
            && self.min_y <= other.min_y
            && self.max_x >= other.max_x
            && self.max_y >= other.max_y
    }
}

/// Pixel extent of a raster grid, anchored at pixel (0, 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridRange {
    pub width: usize,
    pub height: usize,
}

impl GridRange {
    /// Create a new grid range.
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Total number of pixels.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Axis-aligned affine grid-to-world transform.
///
/// Maps the top-left corner of pixel `(col, row)` to world coordinates:
/// `x = translate_x + col * scale_x`, `y = translate_y + row * scale_y`.
/// For north-up rasters `scale_y` is negative and `translate_y` is the
/// envelope's upper edge. Rotation and shear are not representable;
/// sources with such mappings are rejected during collection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineTransform {
    pub scale_x: f64,
    pub scale_y: f64,
    pub translate_x: f64,
    pub translate_y: f64,
}

impl AffineTransform {
    /// Create a new transform. Degeneracy is checked when the transform
    /// is wrapped into a [`GridGeometry`].
    #[must_use]
    pub fn new(scale_x: f64, scale_y: f64, translate_x: f64, translate_y: f64) -> Self {
        Self {
            scale_x,
            scale_y,
            translate_x,
            translate_y,
        }
    }

    /// North-up transform anchored at the top-left corner of `envelope`
    /// with the given (positive) pixel sizes.
    #[must_use]
    pub fn north_up(envelope: &Envelope, pixel_size_x: f64, pixel_size_y: f64) -> Self {
        Self {
            scale_x: pixel_size_x,
            scale_y: -pixel_size_y,
            translate_x: envelope.min_x,
            translate_y: envelope.max_y,
        }
    }

    /// True when either axis has zero scale (or is not finite), which
    /// would collapse the grid.
    #[inline]
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.scale_x == 0.0
            || self.scale_y == 0.0
            || !self.scale_x.is_finite()
            || !self.scale_y.is_finite()
    }

    /// Absolute pixel size on both axes.
    #[inline]
    #[must_use]
    pub fn pixel_size(&self) -> (f64, f64) {
        (self.scale_x.abs(), self.scale_y.abs())
    }

    /// Convert pixel coordinates to world coordinates.
    #[inline]
    #[must_use]
    pub fn pixel_to_world(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.translate_x + col * self.scale_x,
            self.translate_y + row * self.scale_y,
        )
    }

    /// Convert world coordinates to (fractional) pixel coordinates.
    #[inline]
    #[must_use]
    pub fn world_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.translate_x) / self.scale_x,
            (y - self.translate_y) / self.scale_y,
        )
    }
}

/// A pixel extent plus an affine grid-to-world transform plus a CRS.
///
/// Defines how raster samples map to real-world coordinates. Once built
/// for an evaluation it is immutable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridGeometry {
    pub range: GridRange,
    pub transform: AffineTransform,
    pub crs: i32,
}

impl GridGeometry {
    /// Create a grid geometry, rejecting degenerate transforms.
    ///
    /// # Errors
    /// Returns [`AlgebraError::UnsupportedTransform`] when the transform
    /// has a zero or non-finite scale on either axis.
    pub fn new(range: GridRange, transform: AffineTransform, crs: i32) -> Result<Self> {
        if transform.is_degenerate() {
            return Err(AlgebraError::UnsupportedTransform(format!(
                "zero or non-finite scale ({}, {})",
                transform.scale_x, transform.scale_y
            )));
        }
        Ok(Self {
            range,
            transform,
            crs,
        })
    }

    /// Build a north-up grid geometry covering `envelope` at the given
    /// pixel sizes. The grid range is the smallest one that covers the
    /// whole envelope, never smaller than one pixel per axis.
    ///
    /// # Errors
    /// Returns [`AlgebraError::UnsupportedTransform`] on zero or
    /// non-finite pixel sizes.
    pub fn from_envelope(envelope: &Envelope, pixel_size_x: f64, pixel_size_y: f64) -> Result<Self> {
        let transform = AffineTransform::north_up(envelope, pixel_size_x, pixel_size_y);
        if transform.is_degenerate() {
            return Err(AlgebraError::UnsupportedTransform(format!(
                "zero or non-finite pixel size ({pixel_size_x}, {pixel_size_y})"
            )));
        }
        let width = (envelope.width() / pixel_size_x).ceil().max(1.0) as usize;
        let height = (envelope.height() / pixel_size_y).ceil().max(1.0) as usize;
        Ok(Self {
            range: GridRange::new(width, height),
            transform,
            crs: envelope.crs,
        })
    }

    /// The world-space envelope covered by the full grid range.
    #[must_use]
    pub fn envelope(&self) -> Envelope {
        let (x0, y0) = self.transform.pixel_to_world(0.0, 0.0);
        let (x1, y1) = self
            .transform
            .pixel_to_world(self.range.width as f64, self.range.height as f64);
        Envelope {
            crs: self.crs,
            min_x: x0.min(x1),
            min_y: y0.min(y1),
            max_x: x0.max(x1),
            max_y: y0.max(y1),
        }
    }

    /// Absolute pixel size on both axes.
    #[inline]
    #[must_use]
    pub fn pixel_size(&self) -> (f64, f64) {
        self.transform.pixel_size()
    }
}
