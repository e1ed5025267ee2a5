//! Pure geometry-to-tile rasterisation helpers used by [`super::set::TileExpiry`]
//! (spec §4.3).
//!
//! These operate entirely in fractional tile-space coordinates and know
//! nothing about the dirty-tile set itself, so they are easy to test in
//! isolation.

/// Normalise a tile x-coordinate into `0..map_width`, wrapping around the
/// antimeridian (spec §4.3, "Normalisation").
pub fn normalise_x(x: i64, map_width: u32) -> u32 {
    let w = map_width as i64;
    let mut x = x % w;
    if x < 0 {
        x += w;
    }
    x as u32
}

/// Step size, in tile widths, used to raster a line segment (spec §4.3,
/// "from_line_segment"). Tunable, but changing it desynchronises
/// downstream tile caches (spec §9 design notes) — keep in sync with any
/// legacy consumer.
pub const LINE_STEP_TILES: f64 = 0.4;

/// Find the horizontal-line intersections of a closed ring (in fractional
/// tile-space coordinates) with the line `y == tile_y`, per the scanline
/// algorithm in spec §4.3 ("from_polygon_area").
///
/// `ring` must be closed (first == last) and given in tile-space.
pub fn build_tile_list(tile_x_list: &mut Vec<f64>, ring: &[(f64, f64)], tile_y: f64) {
    if ring.len() < 2 {
        return;
    }
    for i in 1..ring.len() {
        let (x1, y1) = ring[i];
        let (x2, y2) = ring[i - 1];
        if (y1 < tile_y && y2 >= tile_y) || (y2 < tile_y && y1 >= tile_y) {
            let pos = (tile_y - y1) / (y2 - y1) * (x2 - x1);
            tile_x_list.push(x1 + pos);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalise_wraps_negative() {
        assert_eq!(normalise_x(-1, 4096), 4095);
        assert_eq!(normalise_x(4096, 4096), 0);
        assert_eq!(normalise_x(10, 4096), 10);
    }

    #[test]
    fn build_tile_list_finds_two_crossings_for_a_square() {
        // A unit square from (0,0) to (10,10) in tile space, closed.
        let ring = vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0), (0.0, 0.0)];
        let mut xs = Vec::new();
        build_tile_list(&mut xs, &ring, 5.0);
        xs.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(xs, vec![0.0, 10.0]);
    }
}
