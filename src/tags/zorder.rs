//! The `highway` → z_order table and `add_z_order`, a data-for-data port of
//! `tagtransform-c.cpp`'s `layers[]` table (spec §4.6).

struct Layer {
    highway: &'static str,
    offset: i32,
    roads: bool,
}

const LAYERS: &[Layer] = &[
    Layer { highway: "proposed", offset: 1, roads: false },
    Layer { highway: "construction", offset: 2, roads: false },
    Layer { highway: "steps", offset: 10, roads: false },
    Layer { highway: "cycleway", offset: 10, roads: false },
    Layer { highway: "bridleway", offset: 10, roads: false },
    Layer { highway: "footway", offset: 10, roads: false },
    Layer { highway: "path", offset: 10, roads: false },
    Layer { highway: "track", offset: 11, roads: false },
    Layer { highway: "service", offset: 15, roads: false },
    Layer { highway: "tertiary_link", offset: 24, roads: false },
    Layer { highway: "secondary_link", offset: 25, roads: true },
    Layer { highway: "primary_link", offset: 27, roads: true },
    Layer { highway: "trunk_link", offset: 28, roads: true },
    Layer { highway: "motorway_link", offset: 29, roads: true },
    Layer { highway: "raceway", offset: 30, roads: false },
    Layer { highway: "pedestrian", offset: 31, roads: false },
    Layer { highway: "living_street", offset: 32, roads: false },
    Layer { highway: "road", offset: 33, roads: false },
    Layer { highway: "unclassified", offset: 33, roads: false },
    Layer { highway: "residential", offset: 33, roads: false },
    Layer { highway: "tertiary", offset: 34, roads: false },
    Layer { highway: "secondary", offset: 36, roads: true },
    Layer { highway: "primary", offset: 37, roads: true },
    Layer { highway: "trunk", offset: 38, roads: true },
    Layer { highway: "motorway", offset: 39, roads: true },
];

/// Compute `(z_order, roads)` for a tag list (spec §4.6, "z_order
/// computation"). `get` looks up a tag value by key.
pub fn compute_z_order<'a>(get: impl Fn(&str) -> Option<&'a str>) -> (i32, bool) {
    let layer: i32 = get("layer").and_then(|v| v.parse().ok()).unwrap_or(0);
    let mut z_order = 100 * layer;
    let mut roads = false;

    if let Some(highway) = get("highway") {
        if let Some(layer) = LAYERS.iter().find(|l| l.highway == highway) {
            z_order += layer.offset;
            roads = layer.roads;
        }
    }

    if get("railway").map(|v| !v.is_empty()).unwrap_or(false) {
        z_order += 35;
        roads = true;
    }

    if get("boundary") == Some("administrative") {
        roads = true;
    }

    if get("bridge").map(is_truthy).unwrap_or(false) {
        z_order += 100;
    }

    if get("tunnel").map(is_truthy).unwrap_or(false) {
        z_order -= 100;
    }

    (z_order, roads)
}

fn is_truthy(v: &str) -> bool {
    matches!(v, "yes" | "true" | "1" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(tags: &[(&str, &str)]) -> impl Fn(&str) -> Option<&str> + '_ {
        let map: HashMap<&str, &str> = tags.iter().copied().collect();
        move |k| map.get(k).copied()
    }

    #[test]
    fn motorway_is_roads_with_base_offset() {
        let (z, roads) = compute_z_order(lookup(&[("highway", "motorway")]));
        assert_eq!(z, 39);
        assert!(roads);
    }

    #[test]
    fn bridge_adds_100() {
        let (z, _) = compute_z_order(lookup(&[("highway", "residential"), ("bridge", "yes")]));
        assert_eq!(z, 133);
    }

    #[test]
    fn tunnel_subtracts_100() {
        let (z, _) = compute_z_order(lookup(&[("highway", "residential"), ("tunnel", "yes")]));
        assert_eq!(z, -67);
    }

    #[test]
    fn layer_multiplies_by_100() {
        let (z, _) = compute_z_order(lookup(&[("highway", "path"), ("layer", "2")]));
        assert_eq!(z, 210);
    }

    #[test]
    fn railway_forces_roads_and_adds_35() {
        let (z, roads) = compute_z_order(lookup(&[("railway", "rail")]));
        assert_eq!(z, 35);
        assert!(roads);
    }

    #[test]
    fn administrative_boundary_forces_roads() {
        let (_, roads) = compute_z_order(lookup(&[("boundary", "administrative")]));
        assert!(roads);
    }

    #[test]
    fn no_highway_has_zero_base() {
        let (z, roads) = compute_z_order(lookup(&[]));
        assert_eq!(z, 0);
        assert!(!roads);
    }
}
