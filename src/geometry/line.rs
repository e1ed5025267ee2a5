//! `line_from_way`: project, dedup, and split by projected length (spec
//! §4.2), ported from the reference's `get_wkb_split`.

use geo_types::{LineString, MultiLineString};

use super::{dedup_consecutive, Geometry, GeometryBuilder};
use crate::collab::Location;

fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    (dx * dx + dy * dy).sqrt()
}

fn interpolate(a: (f64, f64), b: (f64, f64), frac: f64) -> (f64, f64) {
    (frac * (a.0 - b.0) + b.0, frac * (a.1 - b.1) + b.1)
}

/// Split a dedup'd polyline into components no longer than `split_at`
/// (target-SRS units), per spec §4.2.
pub(crate) fn split_by_length(points: &[(f64, f64)], split_at: f64) -> Vec<Vec<(f64, f64)>> {
    if points.len() < 2 {
        return Vec::new();
    }
    if split_at <= 0.0 {
        return vec![points.to_vec()];
    }

    let mut result = Vec::new();
    let mut current: Vec<(f64, f64)> = vec![points[0]];
    let mut dist = 0.0_f64;

    for window in points.windows(2) {
        let prev_pt = window[0];
        let this_pt = window[1];
        let delta = distance(prev_pt, this_pt);

        if dist + delta > split_at {
            let splits = ((dist + delta) / split_at).floor() as usize;
            let mut ipoint = this_pt;
            for j in 0..splits {
                let frac = ((j + 1) as f64 * split_at - dist) / delta;
                ipoint = interpolate(this_pt, prev_pt, frac);
                current.push(ipoint);
                if current.len() > 1 {
                    result.push(std::mem::take(&mut current));
                } else {
                    current.clear();
                }
                current.push(ipoint);
            }
            if this_pt == ipoint {
                dist = 0.0;
            } else {
                dist = distance(this_pt, ipoint);
            }
        } else {
            dist += delta;
        }
        current.push(this_pt);
    }

    if current.len() > 1 {
        result.push(current);
    }

    result
}

pub fn line_from_way(builder: &GeometryBuilder, nodes: &[Location], split_at: f64) -> Geometry {
    let points: Vec<(f64, f64)> = nodes.iter().filter_map(|loc| builder.project(loc)).collect();
    let points = dedup_consecutive(points);

    if points.len() < 2 {
        return Geometry::MultiLineString(MultiLineString(Vec::new()), builder.srid());
    }

    let components = split_by_length(&points, split_at);
    let lines: Vec<LineString<f64>> = components
        .into_iter()
        .filter(|c| c.len() >= 2)
        .map(LineString::from)
        .collect();

    Geometry::MultiLineString(MultiLineString(lines), builder.srid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reproject::MercReprojection;
    use std::sync::Arc;

    fn loc(x: f64, y: f64) -> Location {
        Location::new(x, y)
    }

    #[test]
    fn drops_consecutive_duplicates() {
        let builder = GeometryBuilder::new(Arc::new(MercReprojection));
        let nodes = vec![loc(0.0, 0.0), loc(0.0, 0.0), loc(1.0, 0.0)];
        if let Geometry::MultiLineString(mls, _) = line_from_way(&builder, &nodes, 0.0) {
            assert_eq!(mls.0.len(), 1);
            assert_eq!(mls.0[0].0.len(), 2);
        } else {
            panic!("expected multilinestring");
        }
    }

    #[test]
    fn fewer_than_two_points_is_empty() {
        let builder = GeometryBuilder::new(Arc::new(MercReprojection));
        let nodes = vec![loc(0.0, 0.0)];
        if let Geometry::MultiLineString(mls, _) = line_from_way(&builder, &nodes, 0.0) {
            assert!(mls.0.is_empty());
        } else {
            panic!("expected multilinestring");
        }
    }

    #[test]
    fn invalid_locations_are_dropped() {
        let builder = GeometryBuilder::new(Arc::new(MercReprojection));
        let nodes = vec![loc(0.0, 0.0), Location::invalid(), loc(1.0, 0.0)];
        if let Geometry::MultiLineString(mls, _) = line_from_way(&builder, &nodes, 0.0) {
            assert_eq!(mls.0[0].0.len(), 2);
        } else {
            panic!("expected multilinestring");
        }
    }

    #[test]
    fn splits_long_line_into_multiple_components() {
        let points = vec![(0.0, 0.0), (10.0, 0.0)];
        let parts = split_by_length(&points, 4.0);
        assert!(parts.len() >= 2);
        for part in &parts {
            for w in part.windows(2) {
                let d = distance(w[0], w[1]);
                assert!(d <= 4.0 + 1e-9);
            }
        }
    }

    #[test]
    fn no_split_when_split_at_is_zero() {
        let points = vec![(0.0, 0.0), (100.0, 0.0)];
        let parts = split_by_length(&points, 0.0);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].len(), 2);
    }
}
