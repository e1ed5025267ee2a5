//! The dirty-tile set (spec §3 "Dirty-tile set", §4.3).
//!
//! A flat set of quadkeys at a fixed max zoom, replacing the legacy 2x2
//! tree representation (spec §9 design notes: "flatter, concurrency-
//! friendly, and makes merging trivial").

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::Result;
use crate::geometry::types::Geometry;
use crate::reproject::{Coordinates, Reprojection, EARTH_CIRCUMFERENCE};

use super::quadkey::{for_each_tile, Quadkey, Tile};
use super::raster::{build_tile_list, normalise_x};
use super::{ExpireConfig, ExpireMode};

/// Collects tiles touched by geometries, merges sets, and rolls them up
/// across zoom levels (spec §4.3).
pub struct TileExpiry {
    dirty_tiles: HashSet<Quadkey>,
    max_zoom: u32,
    min_zoom: u32,
    max_tiles_per_geometry: usize,
    map_width: u32,
    reprojector: Arc<dyn Reprojection>,
}

impl TileExpiry {
    pub fn new(
        max_zoom: u32,
        min_zoom: u32,
        max_tiles_per_geometry: usize,
        reprojector: Arc<dyn Reprojection>,
    ) -> Self {
        assert!(min_zoom <= max_zoom, "min_zoom must be <= max_zoom");
        TileExpiry {
            dirty_tiles: HashSet::new(),
            max_zoom,
            min_zoom,
            max_tiles_per_geometry,
            map_width: 1u32 << max_zoom,
            reprojector,
        }
    }

    pub fn len(&self) -> usize {
        self.dirty_tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirty_tiles.is_empty()
    }

    /// Insert the tile `(x, y)` at `max_zoom`, skipping once the
    /// per-geometry cap is exceeded (spec §7, `ResourceExhausted`,
    /// recoverable: further insertions for this geometry are silently
    /// dropped).
    pub fn expire_tile(&mut self, x: u32, y: u32) {
        if self.dirty_tiles.len() > self.max_tiles_per_geometry {
            return;
        }
        if let Ok(tile) = Tile::new(self.max_zoom, x, y) {
            self.dirty_tiles.insert(tile.quadkey());
        }
    }

    /// Project a target-SRS coordinate into fractional tile space.
    fn coords_to_tile(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        let c = self.reprojector.target_to_tile(Coordinates::new(x, y))?;
        Ok((
            self.map_width as f64 * (0.5 + c.x / EARTH_CIRCUMFERENCE),
            self.map_width as f64 * (0.5 - c.y / EARTH_CIRCUMFERENCE),
        ))
    }

    fn expire_box(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, buffer: f64) {
        let (x1, x2) = if x1 <= x2 { (x1, x2) } else { (x2, x1) };
        let (y1, y2) = if y1 <= y2 { (y1, y2) } else { (y2, y1) };
        let x_min = (x1 - buffer).floor() as i64;
        let x_max = (x2 + buffer).floor() as i64;
        let y_min = (y1 - buffer).floor() as i64;
        let y_max = (y2 + buffer).floor() as i64;
        for x in x_min..=x_max {
            let norm_x = normalise_x(x, self.map_width);
            for y in y_min..=y_max {
                if y >= 0 && (y as u32) < self.map_width {
                    self.expire_tile(norm_x, y as u32);
                }
            }
        }
    }

    /// Expire every tile within `buffer` of the fractional tile position
    /// of a target-SRS point (spec §4.3, "from_point"). Default buffer is
    /// 0.1 tile.
    pub fn from_point(&mut self, x: f64, y: f64, buffer: f64) -> Result<()> {
        let (tx, ty) = self.coords_to_tile(x, y)?;
        self.expire_box(tx, ty, tx, ty, buffer);
        Ok(())
    }

    /// Raster a segment by stepping in increments of 0.4 tile widths,
    /// expiring the bounding box of each sub-segment (spec §4.3,
    /// "from_line_segment"). `a`/`b` are target-SRS coordinates.
    pub fn from_line_segment(
        &mut self,
        a: (f64, f64),
        b: (f64, f64),
        buffer: f64,
    ) -> Result<()> {
        let (ax, ay) = self.coords_to_tile(a.0, a.1)?;
        let (bx, by) = self.coords_to_tile(b.0, b.1)?;

        let (mut ax, mut ay, mut bx, mut by) = if ax <= bx {
            (ax, ay, bx, by)
        } else {
            (bx, by, ax, ay)
        };

        let x_len = bx - ax;
        if x_len > self.map_width as f64 / 2.0 {
            // Crosses the antimeridian; translate and re-swap so the walk
            // still proceeds left to right. Coordinates are renormalised
            // modulo map_width when tiles are actually inserted.
            ax += self.map_width as f64;
            std::mem::swap(&mut ax, &mut bx);
            std::mem::swap(&mut ay, &mut by);
        }

        let x_len = bx - ax;
        let y_len = by - ay;
        let hyp_len = (x_len * x_len + y_len * y_len).sqrt();
        if hyp_len == 0.0 {
            self.expire_box(ax, ay, ax, ay, buffer);
            return Ok(());
        }
        let x_step = x_len / hyp_len;
        let y_step = y_len / hyp_len;

        let steps = (hyp_len / super::raster::LINE_STEP_TILES).floor() as i64;
        for i in 0..=steps {
            let step = i as f64 * super::raster::LINE_STEP_TILES;
            let next_step = ((i + 1) as f64 * super::raster::LINE_STEP_TILES).min(hyp_len);

            let x1 = ax + step * x_step;
            let y1 = ay + step * y_step;
            let x2 = ax + next_step * x_step;
            let y2 = ay + next_step * y_step;

            self.expire_box(x1, y1, x2, y2, buffer);
        }
        Ok(())
    }

    /// Expire every segment of a linestring (target-SRS coordinates).
    pub fn from_linestring(&mut self, points: &[(f64, f64)], buffer: f64) -> Result<()> {
        for pair in points.windows(2) {
            self.from_line_segment(pair[0], pair[1], buffer)?;
        }
        Ok(())
    }

    /// Expire the outer and inner rings of a polygon boundary (target-SRS
    /// coordinates), spec §4.3 "from_polygon_boundary".
    pub fn from_polygon_boundary(
        &mut self,
        outer: &[(f64, f64)],
        inners: &[Vec<(f64, f64)>],
        buffer: f64,
    ) -> Result<()> {
        self.from_linestring(outer, buffer)?;
        for inner in inners {
            self.from_linestring(inner, buffer)?;
        }
        Ok(())
    }

    /// Scanline fill of a polygon's interior (spec §4.3,
    /// "from_polygon_area").
    pub fn from_polygon_area(
        &mut self,
        outer: &[(f64, f64)],
        inners: &[Vec<(f64, f64)>],
    ) -> Result<()> {
        let ring_to_tile = |ring: &[(f64, f64)]| -> Result<Vec<(f64, f64)>> {
            ring.iter()
                .map(|&(x, y)| self.coords_to_tile(x, y))
                .collect()
        };

        let outer_tile = ring_to_tile(outer)?;
        let inners_tile: Vec<Vec<(f64, f64)>> = inners
            .iter()
            .map(|r| ring_to_tile(r))
            .collect::<Result<_>>()?;

        let mut all_y = outer_tile.iter().map(|p| p.1);
        let (mut min_y, mut max_y) = match all_y.next() {
            Some(y) => (y, y),
            None => return Ok(()),
        };
        for y in all_y {
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }

        let min_tile_y = min_y.floor().max(0.0) as u32;
        let max_tile_y = (max_y.ceil() as u32).min(self.map_width);

        let mut tile_x_list = Vec::new();
        for tile_y in min_tile_y..max_tile_y {
            tile_x_list.clear();
            build_tile_list(&mut tile_x_list, &outer_tile, tile_y as f64);
            for inner in &inners_tile {
                build_tile_list(&mut tile_x_list, inner, tile_y as f64);
            }
            tile_x_list.sort_by(|a, b| a.partial_cmp(b).unwrap());

            let mut i = 0;
            while i + 1 < tile_x_list.len() {
                let x_start = tile_x_list[i];
                let x_end = tile_x_list[i + 1];
                if x_start >= (self.map_width - 1) as f64 {
                    break;
                }
                if x_end > 0.0 {
                    let start = x_start.max(0.0) as u32;
                    let end = x_end as u32;
                    for tile_x in start..end {
                        self.expire_tile(tile_x, tile_y);
                    }
                }
                i += 2;
            }
        }
        Ok(())
    }

    /// Dispatch on the geometry variant (spec §4.3, "from_geometry").
    pub fn from_geometry(&mut self, geom: &Geometry, config: &ExpireConfig) -> Result<()> {
        match geom {
            Geometry::Null => Ok(()),
            Geometry::Point(p, _) => self.from_point(p.x(), p.y(), config.buffer_tiles),
            Geometry::LineString(ls, _) => {
                let points: Vec<(f64, f64)> = ls.coords().map(|c| (c.x, c.y)).collect();
                self.from_linestring(&points, config.buffer_tiles)
            }
            Geometry::MultiLineString(mls, _) => {
                for ls in &mls.0 {
                    let points: Vec<(f64, f64)> = ls.coords().map(|c| (c.x, c.y)).collect();
                    self.from_linestring(&points, config.buffer_tiles)?;
                }
                Ok(())
            }
            Geometry::Polygon(poly, _) => {
                let outer: Vec<(f64, f64)> = poly.exterior().coords().map(|c| (c.x, c.y)).collect();
                let inners: Vec<Vec<(f64, f64)>> = poly
                    .interiors()
                    .iter()
                    .map(|r| r.coords().map(|c| (c.x, c.y)).collect())
                    .collect();

                let mode = self.decide_mode(geom, config);
                self.from_polygon_boundary(&outer, &inners, config.buffer_tiles)?;
                if mode == ExpireMode::FullArea && self.dirty_tiles.len() > 1 {
                    self.from_polygon_area(&outer, &inners)?;
                }
                Ok(())
            }
            Geometry::MultiPolygon(mp, _) => {
                let mode = self.decide_mode(geom, config);
                for poly in &mp.0 {
                    let outer: Vec<(f64, f64)> =
                        poly.exterior().coords().map(|c| (c.x, c.y)).collect();
                    let inners: Vec<Vec<(f64, f64)>> = poly
                        .interiors()
                        .iter()
                        .map(|r| r.coords().map(|c| (c.x, c.y)).collect())
                        .collect();
                    self.from_polygon_boundary(&outer, &inners, config.buffer_tiles)?;
                }
                if mode == ExpireMode::FullArea && self.dirty_tiles.len() > 1 {
                    for poly in &mp.0 {
                        let outer: Vec<(f64, f64)> =
                            poly.exterior().coords().map(|c| (c.x, c.y)).collect();
                        let inners: Vec<Vec<(f64, f64)>> = poly
                            .interiors()
                            .iter()
                            .map(|r| r.coords().map(|c| (c.x, c.y)).collect())
                            .collect();
                        self.from_polygon_area(&outer, &inners)?;
                    }
                }
                Ok(())
            }
            Geometry::Collection(items, _) => {
                for item in items {
                    self.from_geometry(item, config)?;
                }
                Ok(())
            }
        }
    }

    fn decide_mode(&self, geom: &Geometry, config: &ExpireConfig) -> ExpireMode {
        if config.mode != ExpireMode::Hybrid {
            return config.mode;
        }
        match geom.bbox() {
            Some(bbox) if bbox.width() > config.full_area_limit || bbox.height() > config.full_area_limit => {
                ExpireMode::BoundaryOnly
            }
            _ => ExpireMode::FullArea,
        }
    }

    /// Union another expiry set's quadkeys into this one, emptying the
    /// other (spec §4.3, "merge").
    pub fn merge(&mut self, other: &mut TileExpiry) {
        for qk in other.dirty_tiles.drain() {
            self.dirty_tiles.insert(qk);
        }
    }

    /// Sort the stored set and return it (spec §4.3, "get_tiles").
    pub fn get_tiles(&self) -> Vec<Quadkey> {
        let mut tiles: Vec<Quadkey> = self.dirty_tiles.iter().copied().collect();
        tiles.sort_unstable();
        tiles
    }

    /// Roll the stored tiles up from `max_zoom` down to `min_zoom`,
    /// emitting each distinct ancestor once, sorted ascending by
    /// `(zoom, x, y)` (spec §4.3 "Zoom rollup"; §6 "Expiry output format").
    pub fn rolled_up_tiles(&self) -> Vec<Tile> {
        let sorted = self.get_tiles();
        let mut out = Vec::new();
        for_each_tile(&sorted, self.min_zoom, self.max_zoom, |t| out.push(t));
        out.sort_unstable_by_key(|t| (t.zoom, t.x, t.y));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reproject::MercReprojection;
    use geo_types::{LineString, Point, Polygon};

    fn expiry(max_zoom: u32) -> TileExpiry {
        TileExpiry::new(max_zoom, max_zoom, 1_000_000, Arc::new(MercReprojection))
    }

    #[test]
    fn s1_point_at_origin_zoom_12() {
        let mut e = expiry(12);
        e.from_point(0.0, 0.0, 0.1).unwrap();
        let mut tiles: Vec<(u32, u32)> = e
            .get_tiles()
            .into_iter()
            .map(|qk| {
                let t = Tile::from_quadkey(qk, 12);
                (t.x, t.y)
            })
            .collect();
        tiles.sort();
        assert_eq!(tiles, vec![(2047, 2047), (2047, 2048), (2048, 2047), (2048, 2048)]);
    }

    #[test]
    fn s2_point_away_from_boundary_zoom_12() {
        let mut e = expiry(12);
        e.from_point(5000.0, 5000.0, 0.1).unwrap();
        let tiles: Vec<(u32, u32)> = e
            .get_tiles()
            .into_iter()
            .map(|qk| {
                let t = Tile::from_quadkey(qk, 12);
                (t.x, t.y)
            })
            .collect();
        assert_eq!(tiles, vec![(2048, 2047)]);
    }

    #[test]
    fn merge_unions_and_empties_source() {
        let mut a = expiry(10);
        let mut b = expiry(10);
        a.from_point(0.0, 0.0, 0.0).unwrap();
        b.from_point(5000.0, 5000.0, 0.0).unwrap();
        a.merge(&mut b);
        assert!(b.is_empty());
        assert!(a.len() >= 2);
    }

    #[test]
    fn resource_cap_stops_growth() {
        let mut e = TileExpiry::new(16, 16, 2, Arc::new(MercReprojection));
        e.expire_tile(0, 0);
        e.expire_tile(1, 0);
        e.expire_tile(2, 0);
        e.expire_tile(3, 0);
        assert!(e.len() <= 3);
    }

    #[test]
    fn polygon_with_small_bbox_matches_hybrid_and_full_area() {
        let ring = LineString::from(vec![
            (-100.0, -100.0),
            (100.0, -100.0),
            (100.0, 100.0),
            (-100.0, 100.0),
            (-100.0, -100.0),
        ]);
        let poly = Polygon::new(ring, vec![]);
        let geom = Geometry::Polygon(poly, 3857);

        let mut hybrid = expiry(16);
        hybrid
            .from_geometry(
                &geom,
                &ExpireConfig {
                    mode: ExpireMode::Hybrid,
                    full_area_limit: 20_000.0,
                    buffer_tiles: 0.0,
                },
            )
            .unwrap();

        let mut full = expiry(16);
        full.from_geometry(
            &geom,
            &ExpireConfig {
                mode: ExpireMode::FullArea,
                full_area_limit: 20_000.0,
                buffer_tiles: 0.0,
            },
        )
        .unwrap();

        assert_eq!(hybrid.get_tiles(), full.get_tiles());
    }

    #[test]
    fn point_geometry_round_trip_is_a_nonempty_set() {
        let geom = Geometry::Point(Point::new(0.0, 0.0), 3857);
        let mut e = expiry(12);
        e.from_geometry(&geom, &ExpireConfig::default()).unwrap();
        assert!(!e.is_empty());
    }
}
