//! `polygon_from_way`: closed-ring validation (spec §4.2).

use geo_types::{LineString, Polygon};

use super::{dedup_consecutive, ring_is_valid, Geometry, GeometryBuilder};
use crate::collab::Location;

/// Build a polygon from a closed way. Returns [`Geometry::Null`] unless the
/// way is closed (first node location == last node location), has at
/// least four distinct points after projection and dedup, and the ring is
/// neither zero-area nor self-intersecting (spec §4.2, "Invariants" and
/// "Validity policy").
pub fn polygon_from_way(builder: &GeometryBuilder, nodes: &[Location]) -> Geometry {
    if nodes.len() < 4 {
        return Geometry::Null;
    }
    if nodes.first() != nodes.last() {
        return Geometry::Null;
    }

    let points: Vec<(f64, f64)> = nodes.iter().filter_map(|loc| builder.project(loc)).collect();
    let points = dedup_consecutive(points);

    if points.first() != points.last() {
        return Geometry::Null;
    }
    if !ring_is_valid(&points) {
        log::warn!("dropping degenerate or self-intersecting polygon ring");
        return Geometry::Null;
    }

    let ring = LineString::from(points);
    Geometry::Polygon(Polygon::new(ring, Vec::new()), builder.srid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reproject::LatLonReprojection;
    use std::sync::Arc;

    fn closed_square() -> Vec<Location> {
        vec![
            Location::new(0.0, 0.0),
            Location::new(10.0, 0.0),
            Location::new(10.0, 10.0),
            Location::new(0.0, 10.0),
            Location::new(0.0, 0.0),
        ]
    }

    #[test]
    fn closed_way_makes_a_polygon() {
        let builder = GeometryBuilder::new(Arc::new(LatLonReprojection));
        let g = polygon_from_way(&builder, &closed_square());
        match g {
            Geometry::Polygon(p, srid) => {
                assert_eq!(srid, 4326);
                assert_eq!(p.exterior().0.len(), 5);
            }
            _ => panic!("expected polygon"),
        }
    }

    #[test]
    fn open_way_is_null() {
        let builder = GeometryBuilder::new(Arc::new(LatLonReprojection));
        let mut nodes = closed_square();
        nodes.pop();
        let g = polygon_from_way(&builder, &nodes);
        assert_eq!(g, Geometry::Null);
    }

    #[test]
    fn too_few_points_is_null() {
        let builder = GeometryBuilder::new(Arc::new(LatLonReprojection));
        let nodes = vec![
            Location::new(0.0, 0.0),
            Location::new(1.0, 0.0),
            Location::new(0.0, 0.0),
        ];
        let g = polygon_from_way(&builder, &nodes);
        assert_eq!(g, Geometry::Null);
    }
}
