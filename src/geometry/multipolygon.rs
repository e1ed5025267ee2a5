//! `multipolygon_from_relation`: ring assembly by shared-endpoint graph
//! walking, then outer/inner classification by nesting depth (spec §4.2).
//!
//! Grounded on the teacher's `extract_loops_to_render` (walk a pool of ways,
//! extending or reversing each candidate to match the open end of the
//! current chain, starting a fresh chain whenever nothing connects).

use std::collections::{HashMap, HashSet};

use geo::Contains;
use geo_types::{LineString, MultiPolygon, Point, Polygon};

use super::{dedup_consecutive, ring_is_valid, Geometry, GeometryBuilder};
use crate::collab::Location;

/// Round to a fixed-point key so shared endpoints compare equal despite
/// floating-point noise (spec §4.2, ring assembly uses exact location
/// equality; we key on the same fixed-point grid `Location::to_fixed` uses
/// for the middle).
const ENDPOINT_SCALE: f64 = 1e7;

fn endpoint_key(p: (f64, f64)) -> (i64, i64) {
    ((p.0 * ENDPOINT_SCALE).round() as i64, (p.1 * ENDPOINT_SCALE).round() as i64)
}

struct Way {
    points: Vec<(f64, f64)>,
}

/// Assemble a set of member ways (already projected point lists, with a
/// role that this pass ignores per the nesting-depth classification
/// decision) into a multipolygon.
pub fn multipolygon_from_relation(
    builder: &GeometryBuilder,
    way_node_lists: &[(Vec<Location>, String)],
) -> Geometry {
    let ways: Vec<Way> = way_node_lists
        .iter()
        .filter_map(|(nodes, _role)| {
            let points: Vec<(f64, f64)> =
                nodes.iter().filter_map(|loc| builder.project(loc)).collect();
            let points = dedup_consecutive(points);
            if points.len() < 2 {
                None
            } else {
                Some(Way { points })
            }
        })
        .collect();

    if ways.is_empty() {
        return Geometry::Null;
    }

    let rings = assemble_rings(ways);
    if rings.is_empty() {
        return Geometry::Null;
    }

    let polygons = classify_rings(rings);
    if polygons.is_empty() {
        return Geometry::Null;
    }

    Geometry::MultiPolygon(MultiPolygon(polygons), builder.srid())
}

/// Walk the way pool, gluing chains end-to-end at shared endpoints until
/// each produces a closed ring. Ways that never close are dropped (spec
/// §4.2, "Edge cases": an unclosed multipolygon member contributes nothing).
fn assemble_rings(ways: Vec<Way>) -> Vec<Vec<(f64, f64)>> {
    let mut segments: HashMap<(i64, i64), HashSet<usize>> = HashMap::new();
    for (idx, way) in ways.iter().enumerate() {
        let start = endpoint_key(*way.points.first().unwrap());
        let end = endpoint_key(*way.points.last().unwrap());
        segments.entry(start).or_default().insert(idx);
        segments.entry(end).or_default().insert(idx);
    }

    let mut unvisited: HashSet<usize> = (0..ways.len()).collect();
    let mut rings = Vec::new();

    while let Some(&start_idx) = unvisited.iter().next() {
        unvisited.remove(&start_idx);
        let mut chain = ways[start_idx].points.clone();

        loop {
            let tail = endpoint_key(*chain.last().unwrap());
            let next_idx = segments
                .get(&tail)
                .into_iter()
                .flatten()
                .find(|idx| unvisited.contains(idx))
                .copied();

            let Some(next_idx) = next_idx else { break };
            unvisited.remove(&next_idx);
            let candidate = &ways[next_idx].points;

            if endpoint_key(*candidate.first().unwrap()) == tail {
                chain.extend(candidate.iter().skip(1).copied());
            } else {
                chain.extend(candidate.iter().rev().skip(1).copied());
            }

            if endpoint_key(*chain.first().unwrap()) == endpoint_key(*chain.last().unwrap()) {
                break;
            }
        }

        let closed = chain.len() >= 4
            && endpoint_key(*chain.first().unwrap()) == endpoint_key(*chain.last().unwrap());
        if closed {
            rings.push(dedup_consecutive(chain));
        } else {
            log::warn!("dropping unclosed multipolygon ring ({} points)", chain.len());
        }
    }

    rings
}

/// Classify assembled rings as outer shells or inner holes by containment
/// depth: a ring nested inside an odd number of other rings is a hole of
/// its immediate (smallest-enclosing) parent; an even depth is an outer
/// shell (spec §4.2, "multipolygon_from_relation"). Zero-area or
/// self-intersecting rings are dropped per the validity policy (spec §4.2,
/// §7 `InvalidGeometry`).
fn classify_rings(rings: Vec<Vec<(f64, f64)>>) -> Vec<Polygon<f64>> {
    let polys: Vec<Polygon<f64>> = rings
        .into_iter()
        .filter(|r| {
            let valid = ring_is_valid(r);
            if !valid {
                log::warn!("dropping degenerate or self-intersecting multipolygon ring");
            }
            valid
        })
        .map(|r| Polygon::new(LineString::from(r), Vec::new()))
        .collect();

    let n = polys.len();
    let mut depth = vec![0usize; n];
    for i in 0..n {
        let probe = polys[i].exterior().0[0];
        let probe = Point::new(probe.x, probe.y);
        for j in 0..n {
            if i != j && polys[j].contains(&probe) {
                depth[i] += 1;
            }
        }
    }

    let mut outers: Vec<Polygon<f64>> = Vec::new();
    let mut outer_indices: Vec<usize> = Vec::new();
    for i in 0..n {
        if depth[i] % 2 == 0 {
            outer_indices.push(i);
            outers.push(Polygon::new(polys[i].exterior().clone(), Vec::new()));
        }
    }

    for i in 0..n {
        if depth[i] % 2 != 0 {
            // Immediate parent: the containing outer with the greatest depth
            // less than this ring's (the tightest enclosing shell).
            let probe = polys[i].exterior().0[0];
            let probe = Point::new(probe.x, probe.y);
            let parent = outer_indices
                .iter()
                .filter(|&&o| polys[o].contains(&probe))
                .max_by_key(|&&o| depth[o]);
            if let Some(&parent_idx) = parent {
                let slot = outer_indices.iter().position(|&o| o == parent_idx).unwrap();
                outers[slot].interiors_push(polys[i].exterior().clone());
            }
        }
    }

    outers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reproject::LatLonReprojection;
    use std::sync::Arc;

    fn loc(x: f64, y: f64) -> Location {
        Location::new(x, y)
    }

    #[test]
    fn single_closed_way_is_one_outer_polygon() {
        let builder = GeometryBuilder::new(Arc::new(LatLonReprojection));
        let square = vec![
            loc(0.0, 0.0),
            loc(10.0, 0.0),
            loc(10.0, 10.0),
            loc(0.0, 10.0),
            loc(0.0, 0.0),
        ];
        let g = multipolygon_from_relation(&builder, &[(square, "outer".to_string())]);
        match g {
            Geometry::MultiPolygon(mp, _) => assert_eq!(mp.0.len(), 1),
            _ => panic!("expected multipolygon"),
        }
    }

    #[test]
    fn two_half_rings_glue_into_one_ring() {
        let builder = GeometryBuilder::new(Arc::new(LatLonReprojection));
        let half_a = vec![loc(0.0, 0.0), loc(10.0, 0.0), loc(10.0, 10.0)];
        let half_b = vec![loc(10.0, 10.0), loc(0.0, 10.0), loc(0.0, 0.0)];
        let g = multipolygon_from_relation(
            &builder,
            &[(half_a, "outer".to_string()), (half_b, "outer".to_string())],
        );
        match g {
            Geometry::MultiPolygon(mp, _) => {
                assert_eq!(mp.0.len(), 1);
                assert_eq!(mp.0[0].interiors().len(), 0);
            }
            _ => panic!("expected multipolygon"),
        }
    }

    #[test]
    fn inner_ring_becomes_a_hole() {
        let builder = GeometryBuilder::new(Arc::new(LatLonReprojection));
        let outer = vec![
            loc(0.0, 0.0),
            loc(20.0, 0.0),
            loc(20.0, 20.0),
            loc(0.0, 20.0),
            loc(0.0, 0.0),
        ];
        let inner = vec![
            loc(5.0, 5.0),
            loc(15.0, 5.0),
            loc(15.0, 15.0),
            loc(5.0, 15.0),
            loc(5.0, 5.0),
        ];
        let g = multipolygon_from_relation(
            &builder,
            &[(outer, "outer".to_string()), (inner, "inner".to_string())],
        );
        match g {
            Geometry::MultiPolygon(mp, _) => {
                assert_eq!(mp.0.len(), 1);
                assert_eq!(mp.0[0].interiors().len(), 1);
            }
            _ => panic!("expected multipolygon"),
        }
    }

    #[test]
    fn unclosed_chain_is_dropped() {
        let builder = GeometryBuilder::new(Arc::new(LatLonReprojection));
        let open = vec![loc(0.0, 0.0), loc(10.0, 0.0), loc(10.0, 10.0)];
        let g = multipolygon_from_relation(&builder, &[(open, "outer".to_string())]);
        assert_eq!(g, Geometry::Null);
    }
}
