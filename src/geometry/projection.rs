//! Coordinate reprojection between EPSG codes using pure Rust
//! (proj4rs + crs-definitions).
//!
//! Point transforms drive envelope reprojection: an envelope is carried
//! into the target CRS by sampling densified points along its edges and
//! taking the bounding box of the results, which keeps curved edges
//! (e.g. mercator ↔ geographic) inside the reprojected envelope.

use proj4rs::proj::Proj;
use proj4rs::transform::transform;

use crate::error::{AlgebraError, Result};
use crate::geometry::Envelope;

/// Number of sample points per envelope edge used when reprojecting.
const EDGE_SAMPLES: usize = 20;

/// Get the PROJ4 string for an EPSG code using the crs-definitions database.
#[inline]
#[must_use]
pub fn get_proj_string(epsg: i32) -> Option<&'static str> {
    u16::try_from(epsg)
        .ok()
        .and_then(crs_definitions::from_code)
        .map(|def| def.proj4)
}

/// Check if an EPSG code represents a geographic (lon/lat) CRS.
#[inline]
#[must_use]
pub fn is_geographic_crs(epsg: i32) -> bool {
    // Geographic CRS codes are typically in the 4000-4999 range
    // but we check the proj string to be sure
    if let Some(proj_str) = get_proj_string(epsg) {
        proj_str.contains("+proj=longlat")
    } else {
        // Fallback: assume 4326 and similar are geographic
        epsg == 4326 || (4000..5000).contains(&epsg)
    }
}

/// Reusable point transformer between two EPSG codes.
///
/// Builds the projection objects once; use this instead of
/// [`project_point`] when transforming many points (per-pixel reads,
/// envelope densification).
pub struct CoordTransformer {
    source_proj: Proj,
    target_proj: Proj,
    /// True if source uses degrees (needs radian conversion)
    source_is_geographic: bool,
    /// True if target uses degrees (needs radian conversion)
    target_is_geographic: bool,
    source_epsg: i32,
    target_epsg: i32,
}

impl CoordTransformer {
    /// Create a transformer between two EPSG codes.
    ///
    /// # Errors
    /// Returns [`AlgebraError::Reprojection`] when either code is unknown
    /// or its projection definition fails to parse.
    pub fn new(source_epsg: i32, target_epsg: i32) -> Result<Self> {
        let source_str = get_proj_string(source_epsg).ok_or_else(|| {
            AlgebraError::reprojection(
                source_epsg,
                target_epsg,
                format!("EPSG:{source_epsg} is not in the crs-definitions database"),
            )
        })?;
        let target_str = get_proj_string(target_epsg).ok_or_else(|| {
            AlgebraError::reprojection(
                source_epsg,
                target_epsg,
                format!("EPSG:{target_epsg} is not in the crs-definitions database"),
            )
        })?;

        let source_proj = Proj::from_proj_string(source_str).map_err(|e| {
            AlgebraError::reprojection(
                source_epsg,
                target_epsg,
                format!("invalid source projection: {e:?}"),
            )
        })?;
        let target_proj = Proj::from_proj_string(target_str).map_err(|e| {
            AlgebraError::reprojection(
                source_epsg,
                target_epsg,
                format!("invalid target projection: {e:?}"),
            )
        })?;

        Ok(Self {
            source_proj,
            target_proj,
            source_is_geographic: is_geographic_crs(source_epsg),
            target_is_geographic: is_geographic_crs(target_epsg),
            source_epsg,
            target_epsg,
        })
    }

    /// Transform one point from the source CRS to the target CRS.
    ///
    /// # Errors
    /// Returns [`AlgebraError::Reprojection`] when the transform fails
    /// (e.g. a point outside the projection's valid area).
    pub fn transform(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        // proj4rs uses radians for geographic coordinates
        let (x_in, y_in) = if self.source_is_geographic {
            (x.to_radians(), y.to_radians())
        } else {
            (x, y)
        };

        let mut point = (x_in, y_in, 0.0);
        transform(&self.source_proj, &self.target_proj, &mut point).map_err(|e| {
            AlgebraError::reprojection(
                self.source_epsg,
                self.target_epsg,
                format!("transform failed: {e:?}"),
            )
        })?;

        if self.target_is_geographic {
            Ok((point.0.to_degrees(), point.1.to_degrees()))
        } else {
            Ok((point.0, point.1))
        }
    }
}

/// Project a point from one CRS to another.
///
/// Convenience wrapper that builds a [`CoordTransformer`] per call; prefer
/// the transformer for bulk work.
///
/// # Errors
/// Returns [`AlgebraError::Reprojection`] when an EPSG code is unknown or
/// the transform itself fails.
#[inline]
pub fn project_point(source_epsg: i32, target_epsg: i32, x: f64, y: f64) -> Result<(f64, f64)> {
    // No-op if same CRS
    if source_epsg == target_epsg {
        return Ok((x, y));
    }

    CoordTransformer::new(source_epsg, target_epsg)?.transform(x, y)
}

/// Reproject an envelope into `target_epsg`.
///
/// Samples densified points along each edge of the envelope, projects
/// every sample and returns the bounding box of the projected points
/// tagged with the target CRS.
///
/// # Errors
/// Returns [`AlgebraError::Reprojection`] when any sample point fails to
/// project or the projected extent collapses.
pub fn reproject_envelope(envelope: &Envelope, target_epsg: i32) -> Result<Envelope> {
    if envelope.crs == target_epsg {
        return Ok(*envelope);
    }

    let transformer = CoordTransformer::new(envelope.crs, target_epsg)?;

    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;

    let step_x = envelope.width() / EDGE_SAMPLES as f64;
    let step_y = envelope.height() / EDGE_SAMPLES as f64;

    for i in 0..=EDGE_SAMPLES {
        let x = envelope.min_x + i as f64 * step_x;
        let y = envelope.min_y + i as f64 * step_y;

        // one horizontal and one vertical sweep along each pair of edges
        for (sx, sy) in [
            (x, envelope.min_y),
            (x, envelope.max_y),
            (envelope.min_x, y),
            (envelope.max_x, y),
        ] {
            let (tx, ty) = transformer.transform(sx, sy)?;
            min_x = min_x.min(tx);
            min_y = min_y.min(ty);
            max_x = max_x.max(tx);
            max_y = max_y.max(ty);
        }
    }

    let result = Envelope::new(target_epsg, min_x, min_y, max_x, max_y);
    if result.is_empty() || !min_x.is_finite() || !max_y.is_finite() {
        return Err(AlgebraError::reprojection(
            envelope.crs,
            target_epsg,
            "reprojected envelope collapsed",
        ));
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < EPS
    }

    #[test]
    fn test_same_crs_is_noop() {
        let (x, y) = project_point(4326, 4326, 12.5, 41.9).unwrap();
        assert!(approx_eq(x, 12.5));
        assert!(approx_eq(y, 41.9));
    }

    #[test]
    fn test_lonlat_to_mercator_origin() {
        let (x, y) = project_point(4326, 3857, 0.0, 0.0).unwrap();
        assert!(approx_eq(x, 0.0));
        assert!(approx_eq(y, 0.0));
    }

    #[test]
    fn test_roundtrip_4326_3857() {
        let (mx, my) = project_point(4326, 3857, -122.4, 37.8).unwrap();
        let (lon, lat) = project_point(3857, 4326, mx, my).unwrap();
        assert!((lon - -122.4).abs() < 1e-6);
        assert!((lat - 37.8).abs() < 1e-6);
    }

    #[test]
    fn test_unknown_epsg_is_error() {
        let result = project_point(4326, 99_999, 0.0, 0.0);
        assert!(matches!(result, Err(crate::AlgebraError::Reprojection { .. })));
    }

    #[test]
    fn test_is_geographic() {
        assert!(is_geographic_crs(4326));
        assert!(!is_geographic_crs(3857));
    }

    #[test]
    fn test_transformer_matches_project_point() {
        let transformer = CoordTransformer::new(4326, 3857).unwrap();
        let (tx, ty) = transformer.transform(10.0, 45.0).unwrap();
        let (px, py) = project_point(4326, 3857, 10.0, 45.0).unwrap();
        assert!(approx_eq(tx, px));
        assert!(approx_eq(ty, py));
    }

    #[test]
    fn test_reproject_envelope_same_crs() {
        let env = Envelope::new(4326, 0.0, 0.0, 1.0, 1.0);
        let out = reproject_envelope(&env, 4326).unwrap();
        assert_eq!(out, env);
    }

    #[test]
    fn test_reproject_envelope_to_mercator() {
        let env = Envelope::new(4326, -10.0, -10.0, 10.0, 10.0);
        let out = reproject_envelope(&env, 3857).unwrap();
        assert_eq!(out.crs, 3857);
        // symmetric around the origin, roughly 1113 km per 10 degrees
        assert!((out.min_x + out.max_x).abs() < 1e-3);
        assert!((out.min_y + out.max_y).abs() < 1e-3);
        assert!(out.max_x > 1_000_000.0 && out.max_x < 1_200_000.0);
    }
}
