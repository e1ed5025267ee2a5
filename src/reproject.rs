//! Reprojection between WGS84, the target SRS, and tile (Web Mercator)
//! space (spec §4.1).
//!
//! Grounded in `reprojection.cpp`'s three concrete classes
//! (`latlon_reprojection_t`, `merc_reprojection_t`, `generic_reprojection_t`)
//! from the original implementation.

use crate::error::{CoreError, Result};

/// Circumference of the earth in metres, used for the Web Mercator
/// projection and tile math. Must stay bit-compatible with the expiry
/// engine (spec §4.3 design notes).
pub const EARTH_CIRCUMFERENCE: f64 = 40_075_016.68;
pub const HALF_EARTH_CIRCUMFERENCE: f64 = EARTH_CIRCUMFERENCE / 2.0;

pub const PROJ_LATLONG: i32 = 4326;
pub const PROJ_SPHERE_MERC: i32 = 3857;

/// A 2D coordinate pair, agnostic of which SRS it is expressed in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub x: f64,
    pub y: f64,
}

impl Coordinates {
    pub fn new(x: f64, y: f64) -> Self {
        Coordinates { x, y }
    }
}

/// An opaque external projection library, abstracted so the core has no
/// hard dependency on a specific proj implementation (spec §4.1, generic
/// variant).
pub trait Project {
    fn project(&self, src_srs: i32, dst_srs: i32, point: Coordinates) -> Result<Coordinates>;
}

/// Identity projector used when no generic reprojection is configured.
/// Only valid when `src_srs == dst_srs`; otherwise it is a programming
/// error to reach the generic variant without a real projector.
#[derive(Debug, Default)]
pub struct IdentityProject;

impl Project for IdentityProject {
    fn project(&self, _src_srs: i32, _dst_srs: i32, point: Coordinates) -> Result<Coordinates> {
        Ok(point)
    }
}

/// `proj`-crate-backed [`Project`] for any target SRS the built-in lat/lon
/// and Web Mercator variants don't cover (spec §4.1, generic variant).
#[cfg(feature = "proj")]
pub struct ProjProject;

#[cfg(feature = "proj")]
impl Project for ProjProject {
    fn project(&self, src_srs: i32, dst_srs: i32, point: Coordinates) -> Result<Coordinates> {
        let transform = proj::Proj::new_known_crs(
            &format!("EPSG:{src_srs}"),
            &format!("EPSG:{dst_srs}"),
            None,
        )
        .map_err(|e| {
            CoreError::ProjectionFailure(format!(
                "building transform from EPSG:{src_srs} to EPSG:{dst_srs}: {e}"
            ))
        })?;
        let (x, y) = transform.convert((point.x, point.y)).map_err(|e| {
            CoreError::ProjectionFailure(format!(
                "projecting ({}, {}) from EPSG:{src_srs} to EPSG:{dst_srs}: {e}",
                point.x, point.y
            ))
        })?;
        Ok(Coordinates::new(x, y))
    }
}

fn clamp_lat(lat: f64) -> f64 {
    lat.clamp(-89.99, 89.99)
}

/// Spherical Web Mercator projection of a WGS84 `(lon, lat)` pair, with
/// latitude clamped to ±89.99° (spec §4.1).
pub fn latlon_to_merc(lon: f64, lat: f64) -> Coordinates {
    let lat = clamp_lat(lat);
    let x = lon.to_radians() * HALF_EARTH_CIRCUMFERENCE / 180.0;
    let y = ((lat.to_radians() / 2.0 + std::f64::consts::FRAC_PI_4).tan()).ln()
        * HALF_EARTH_CIRCUMFERENCE
        / std::f64::consts::PI;
    Coordinates::new(x, y)
}

/// Reprojector contract (spec §4.1).
pub trait Reprojection: Send + Sync {
    /// Convert a WGS84 `(lon, lat)` pair to the target SRS.
    fn target_project(&self, lon: f64, lat: f64) -> Result<Coordinates>;

    /// Convert a target-SRS pair to tile space (Web Mercator).
    fn target_to_tile(&self, coords: Coordinates) -> Result<Coordinates>;

    fn target_srs(&self) -> i32;

    fn target_is_latlon(&self) -> bool;

    /// Project `(lon, lat)` all the way to a fractional tile position at
    /// the given `map_width` (spec §4.1).
    fn coords_to_tile(&self, lon: f64, lat: f64, map_width: f64) -> Result<Coordinates> {
        let target = self.target_project(lon, lat)?;
        let merc = self.target_to_tile(target)?;
        let tile_x = map_width * (0.5 + merc.x / EARTH_CIRCUMFERENCE);
        let tile_y = map_width * (0.5 - merc.y / EARTH_CIRCUMFERENCE);
        Ok(Coordinates::new(tile_x, tile_y))
    }
}

/// SRS 4326: lat/lon passthrough.
pub struct LatLonReprojection;

impl Reprojection for LatLonReprojection {
    fn target_project(&self, lon: f64, lat: f64) -> Result<Coordinates> {
        Ok(Coordinates::new(lon, lat))
    }

    fn target_to_tile(&self, coords: Coordinates) -> Result<Coordinates> {
        Ok(latlon_to_merc(coords.x, coords.y))
    }

    fn target_srs(&self) -> i32 {
        PROJ_LATLONG
    }

    fn target_is_latlon(&self) -> bool {
        true
    }
}

/// SRS 3857: Web Mercator.
pub struct MercReprojection;

impl Reprojection for MercReprojection {
    fn target_project(&self, lon: f64, lat: f64) -> Result<Coordinates> {
        Ok(latlon_to_merc(lon, lat))
    }

    fn target_to_tile(&self, coords: Coordinates) -> Result<Coordinates> {
        Ok(coords)
    }

    fn target_srs(&self) -> i32 {
        PROJ_SPHERE_MERC
    }

    fn target_is_latlon(&self) -> bool {
        false
    }
}

/// Any other SRS: delegate to an external projection library.
pub struct GenericReprojection {
    target_srs: i32,
    projector: Box<dyn Project + Send + Sync>,
}

impl GenericReprojection {
    pub fn new(target_srs: i32, projector: Box<dyn Project + Send + Sync>) -> Self {
        GenericReprojection {
            target_srs,
            projector,
        }
    }
}

impl Reprojection for GenericReprojection {
    fn target_project(&self, lon: f64, lat: f64) -> Result<Coordinates> {
        self.projector
            .project(PROJ_LATLONG, self.target_srs, Coordinates::new(lon, lat))
            .map_err(|_| {
                CoreError::ProjectionFailure(format!(
                    "failed to project ({lon}, {lat}) from 4326 to {}",
                    self.target_srs
                ))
            })
    }

    fn target_to_tile(&self, coords: Coordinates) -> Result<Coordinates> {
        self.projector
            .project(self.target_srs, PROJ_SPHERE_MERC, coords)
            .map_err(|_| {
                CoreError::ProjectionFailure(format!(
                    "failed to project tile coordinates from {} to 3857",
                    self.target_srs
                ))
            })
    }

    fn target_srs(&self) -> i32 {
        self.target_srs
    }

    fn target_is_latlon(&self) -> bool {
        false
    }
}

/// The projector used for a generic SRS when the caller hasn't supplied one:
/// the real `proj`-backed implementation when the `proj` feature is built,
/// an identity passthrough otherwise (spec §4.1 calls a generic variant out
/// as an integration point, not something the core must always link).
#[cfg(feature = "proj")]
fn default_projector() -> Box<dyn Project + Send + Sync> {
    Box::new(ProjProject)
}

#[cfg(not(feature = "proj"))]
fn default_projector() -> Box<dyn Project + Send + Sync> {
    Box::new(IdentityProject)
}

/// Construct the appropriate reprojector variant for `srs`, per spec §4.1.
pub fn create_reprojection(
    srs: i32,
    projector: Option<Box<dyn Project + Send + Sync>>,
) -> Box<dyn Reprojection> {
    match srs {
        PROJ_LATLONG => Box::new(LatLonReprojection),
        PROJ_SPHERE_MERC => Box::new(MercReprojection),
        other => Box::new(GenericReprojection::new(other, projector.unwrap_or_else(default_projector))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latlon_origin_projects_to_merc_origin() {
        let c = latlon_to_merc(0.0, 0.0);
        assert!(c.x.abs() < 1e-6);
        assert!(c.y.abs() < 1e-6);
    }

    #[test]
    fn latlon_clamped_at_poles() {
        let a = latlon_to_merc(0.0, 89.99);
        let b = latlon_to_merc(0.0, 89.999_999);
        assert!((a.y - b.y).abs() < 1e-3);
    }

    #[test]
    fn merc_reprojection_target_to_tile_is_identity() {
        let r = MercReprojection;
        let c = Coordinates::new(123.0, 456.0);
        assert_eq!(r.target_to_tile(c).unwrap(), c);
    }

    #[test]
    fn latlon_reprojection_project_is_identity() {
        let r = LatLonReprojection;
        let c = r.target_project(10.0, 20.0).unwrap();
        assert_eq!(c, Coordinates::new(10.0, 20.0));
    }

    #[test]
    fn coords_to_tile_centers_origin_at_half_map() {
        let r = MercReprojection;
        let c = r.coords_to_tile(0.0, 0.0, 4096.0).unwrap();
        assert!((c.x - 2048.0).abs() < 1e-6);
        assert!((c.y - 2048.0).abs() < 1e-6);
    }

    #[cfg(feature = "proj")]
    #[test]
    fn proj_backed_generic_reprojection_roundtrips_through_3857() {
        let r = create_reprojection(27700, None);
        // OSGB36 easting/northing for a point close to the Greenwich meridian.
        let projected = r.target_project(-0.0014, 51.4778).unwrap();
        assert!(projected.x.is_finite());
        assert!(projected.y.is_finite());
    }
}
