//! `point_from_node` (spec §4.2).

use geo_types::Point;

use super::{Geometry, GeometryBuilder};
use crate::collab::Location;

pub fn point_from_node(builder: &GeometryBuilder, location: &Location) -> Geometry {
    match builder.project(location) {
        Some((x, y)) => Geometry::Point(Point::new(x, y), builder.srid()),
        None => Geometry::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reproject::{LatLonReprojection, MercReprojection};
    use std::sync::Arc;

    #[test]
    fn valid_location_makes_a_point() {
        let builder = GeometryBuilder::new(Arc::new(LatLonReprojection));
        let g = point_from_node(&builder, &Location::new(10.0, 20.0));
        assert_eq!(g, Geometry::Point(Point::new(10.0, 20.0), 4326));
    }

    #[test]
    fn invalid_location_is_null() {
        let builder = GeometryBuilder::new(Arc::new(MercReprojection));
        let g = point_from_node(&builder, &Location::invalid());
        assert_eq!(g, Geometry::Null);
    }
}
