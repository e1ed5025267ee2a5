//! Geometry assembly from OSM references, and WKB encode/decode (spec §1.C,
//! §4.2).

pub mod line;
pub mod multipolygon;
pub mod point;
pub mod polygon;
pub mod types;
pub mod wkb;

use std::sync::Arc;

use crate::collab::{Location, Member, MemberType};
use crate::reproject::Reprojection;

pub use types::{Bbox, Geometry};

/// Default split length when the target SRS is lat/lon (spec §4.2).
pub const DEFAULT_SPLIT_LATLON: f64 = 1.0;
/// Default split length (metres) for any other target SRS.
pub const DEFAULT_SPLIT_METRES: f64 = 100_000.0;

/// Assembles points, linestrings, polygons, and multipolygons from OSM
/// node/way/relation references (spec §4.2).
pub struct GeometryBuilder {
    reprojector: Arc<dyn Reprojection>,
    srid: i32,
}

impl GeometryBuilder {
    pub fn new(reprojector: Arc<dyn Reprojection>) -> Self {
        let srid = reprojector.target_srs();
        GeometryBuilder { reprojector, srid }
    }

    pub fn srid(&self) -> i32 {
        self.srid
    }

    /// Default `split_at` for this target SRS (spec §4.2).
    pub fn default_split_at(&self) -> f64 {
        if self.reprojector.target_is_latlon() {
            DEFAULT_SPLIT_LATLON
        } else {
            DEFAULT_SPLIT_METRES
        }
    }

    /// Project a WGS84 location to the target SRS, or `None` if invalid or
    /// the projection fails (spec §7, `ProjectionFailure` is recoverable:
    /// the point is dropped).
    pub(crate) fn project(&self, loc: &Location) -> Option<(f64, f64)> {
        if !loc.valid {
            return None;
        }
        match self.reprojector.target_project(loc.lon, loc.lat) {
            Ok(c) => Some((c.x, c.y)),
            Err(e) => {
                log::warn!("dropping point ({}, {}): {e}", loc.lon, loc.lat);
                None
            }
        }
    }

    pub fn point_from_node(&self, location: &Location) -> Geometry {
        point::point_from_node(self, location)
    }

    pub fn line_from_way(&self, nodes: &[Location], split_at: f64) -> Geometry {
        line::line_from_way(self, nodes, split_at)
    }

    pub fn polygon_from_way(&self, nodes: &[Location]) -> Geometry {
        polygon::polygon_from_way(self, nodes)
    }

    pub fn multipolygon_from_relation(&self, way_node_lists: &[(Vec<Location>, String)]) -> Geometry {
        multipolygon::multipolygon_from_relation(self, way_node_lists)
    }

    pub fn multiline_from_relation(&self, way_node_lists: &[Vec<Location>]) -> Geometry {
        let mut lines = Vec::new();
        for nodes in way_node_lists {
            if let Geometry::MultiLineString(mls, _) =
                line::line_from_way(self, nodes, self.default_split_at())
            {
                lines.extend(mls.0);
            }
        }
        Geometry::MultiLineString(geo_types::MultiLineString(lines), self.srid)
    }
}

/// True if `member`'s role marks it as a candidate for multipolygon ring
/// assembly: `""`, `"outer"`, or `"inner"` (spec §4.2).
pub fn is_ring_member(member: &Member) -> bool {
    member.member_type == MemberType::Way
        && matches!(member.role.as_str(), "" | "outer" | "inner")
}

/// Remove consecutive duplicate points (spec §4.2, "line_from_way").
pub(crate) fn dedup_consecutive(points: Vec<(f64, f64)>) -> Vec<(f64, f64)> {
    let mut out: Vec<(f64, f64)> = Vec::with_capacity(points.len());
    for p in points {
        if out.last().map(|&last| last == p).unwrap_or(false) {
            continue;
        }
        out.push(p);
    }
    out
}

/// Validity policy (spec §4.2): a closed ring (`ring.first() ==
/// ring.last()`) whose outer WKB would yield a zero-area or
/// self-intersecting ring is rejected rather than emitted as degenerate
/// geometry (spec §7, `InvalidGeometry`: "degenerate ring... self-
/// intersecting polygon").
pub(crate) fn ring_is_valid(ring: &[(f64, f64)]) -> bool {
    if ring.len() < 4 {
        return false;
    }
    if shoelace_area(ring).abs() < f64::EPSILON {
        return false;
    }
    !ring_self_intersects(ring)
}

fn shoelace_area(ring: &[(f64, f64)]) -> f64 {
    let mut sum = 0.0;
    for pair in ring.windows(2) {
        let (x1, y1) = pair[0];
        let (x2, y2) = pair[1];
        sum += x1 * y2 - x2 * y1;
    }
    sum / 2.0
}

fn segments_cross(a1: (f64, f64), a2: (f64, f64), b1: (f64, f64), b2: (f64, f64)) -> bool {
    fn cross(o: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
        (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
    }
    let d1 = cross(b1, b2, a1);
    let d2 = cross(b1, b2, a2);
    let d3 = cross(a1, a2, b1);
    let d4 = cross(a1, a2, b2);
    ((d1 > 0.0) != (d2 > 0.0)) && ((d3 > 0.0) != (d4 > 0.0))
}

/// Pairwise segment-intersection test over a closed ring, skipping edges
/// that share an endpoint (adjacent edges, and the first/last edge pair).
fn ring_self_intersects(ring: &[(f64, f64)]) -> bool {
    let edges = ring.len() - 1;
    for i in 0..edges {
        for j in (i + 1)..edges {
            if j == i + 1 || (i == 0 && j == edges - 1) {
                continue;
            }
            if segments_cross(ring[i], ring[i + 1], ring[j], ring[j + 1]) {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod validity_tests {
    use super::ring_is_valid;

    #[test]
    fn a_square_is_valid() {
        let ring = vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0), (0.0, 0.0)];
        assert!(ring_is_valid(&ring));
    }

    #[test]
    fn a_degenerate_line_has_zero_area() {
        let ring = vec![(0.0, 0.0), (10.0, 0.0), (0.0, 0.0), (0.0, 0.0)];
        assert!(!ring_is_valid(&ring));
    }

    #[test]
    fn a_bowtie_self_intersects() {
        let ring = vec![(0.0, 0.0), (10.0, 10.0), (10.0, 0.0), (0.0, 10.0), (0.0, 0.0)];
        assert!(!ring_is_valid(&ring));
    }
}
