//! Quadkey-encoded tile identifiers (spec §3, "Fingerprinted tile"; §4.3).
//!
//! Bit-interleaving code ported from the reference implementation's
//! `src/tile.cpp`, itself adapted from Daniel Lemire's interleave routine.

use crate::error::{CoreError, Result};

pub const MAX_ZOOM: u32 = 32;

/// A 64-bit quadkey: x interleaved into even bit positions, y into odd.
pub type Quadkey = u64;

fn interleave_with_zeros(input: u32) -> u64 {
    let mut word = input as u64;
    word = (word ^ (word << 16)) & 0x0000_ffff_0000_ffff;
    word = (word ^ (word << 8)) & 0x00ff_00ff_00ff_00ff;
    word = (word ^ (word << 4)) & 0x0f0f_0f0f_0f0f_0f0f;
    word = (word ^ (word << 2)) & 0x3333_3333_3333_3333;
    word = (word ^ (word << 1)) & 0x5555_5555_5555_5555;
    word
}

fn deinterleave_low(word: u64) -> u32 {
    let mut word = word & 0x5555_5555_5555_5555;
    word = (word ^ (word >> 1)) & 0x3333_3333_3333_3333;
    word = (word ^ (word >> 2)) & 0x0f0f_0f0f_0f0f_0f0f;
    word = (word ^ (word >> 4)) & 0x00ff_00ff_00ff_00ff;
    word = (word ^ (word >> 8)) & 0x0000_ffff_0000_ffff;
    word = (word ^ (word >> 16)) & 0x0000_0000_ffff_ffff;
    word as u32
}

/// A tile in the usual web tile format: `0 <= zoom < 32`, `0 <= x,y < 2^zoom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tile {
    pub zoom: u32,
    pub x: u32,
    pub y: u32,
}

impl Tile {
    /// Construct a new tile, validating the invariants of spec §3.
    pub fn new(zoom: u32, x: u32, y: u32) -> Result<Self> {
        if zoom >= MAX_ZOOM {
            return Err(CoreError::InternalInvariant(format!(
                "zoom {zoom} out of range (must be < {MAX_ZOOM})"
            )));
        }
        let map_width = 1u64 << zoom;
        if x as u64 >= map_width || y as u64 >= map_width {
            return Err(CoreError::InternalInvariant(format!(
                "tile ({zoom}, {x}, {y}) out of range for map width {map_width}"
            )));
        }
        Ok(Tile { zoom, x, y })
    }

    /// Encode as a quadkey (spec §3): interleave bits of x (even) and y
    /// (odd), most significant bit at the deepest zoom level.
    pub fn quadkey(&self) -> Quadkey {
        interleave_with_zeros(self.x) | (interleave_with_zeros(self.y) << 1)
    }

    /// Decode a quadkey at the given zoom back into a tile.
    pub fn from_quadkey(quadkey: Quadkey, zoom: u32) -> Tile {
        Tile {
            zoom,
            x: deinterleave_low(quadkey),
            y: deinterleave_low(quadkey >> 1),
        }
    }

    /// The ancestor tile at `zoom - levels`, found by right-shifting the
    /// quadkey by `2*levels` bits (spec §3, property 1).
    pub fn ancestor_quadkey(quadkey: Quadkey, levels: u32) -> Quadkey {
        quadkey >> (levels * 2)
    }

    pub fn to_zxy(&self) -> String {
        format!("{}/{}/{}", self.zoom, self.x, self.y)
    }

    pub fn from_zxy(s: &str) -> Result<Tile> {
        let parts: Vec<&str> = s.split('/').collect();
        if parts.len() != 3 {
            return Err(CoreError::InvalidInput(format!("invalid tile '{s}'")));
        }
        let zoom: u32 = parts[0]
            .parse()
            .map_err(|_| CoreError::InvalidInput(format!("invalid zoom in '{s}'")))?;
        let x: u32 = parts[1]
            .parse()
            .map_err(|_| CoreError::InvalidInput(format!("invalid x in '{s}'")))?;
        let y: u32 = parts[2]
            .parse()
            .map_err(|_| CoreError::InvalidInput(format!("invalid y in '{s}'")))?;
        Tile::new(zoom, x, y)
    }
}

/// Iterate over `tiles_at_maxzoom` and invoke `output` once per distinct
/// ancestor at every zoom level from `maxzoom` down to `minzoom` (spec
/// §4.3, "Zoom rollup"). `tiles_at_maxzoom` must be sorted ascending.
pub fn for_each_tile(
    tiles_at_maxzoom: &[Quadkey],
    minzoom: u32,
    maxzoom: u32,
    mut output: impl FnMut(Tile),
) -> usize {
    assert!(minzoom <= maxzoom, "minzoom must be <= maxzoom");

    if minzoom == maxzoom {
        for &qk in tiles_at_maxzoom {
            output(Tile::from_quadkey(qk, maxzoom));
        }
        return tiles_at_maxzoom.len();
    }

    let mut last_quadkey: Quadkey = 0;
    let mut first = true;
    let mut count = 0;
    for &qk in tiles_at_maxzoom {
        for dz in 0..=(maxzoom - minzoom) {
            let current = Tile::ancestor_quadkey(qk, dz);
            let last = Tile::ancestor_quadkey(last_quadkey, dz);
            if first || current != last {
                output(Tile::from_quadkey(current, maxzoom - dz));
                count += 1;
            }
        }
        last_quadkey = qk;
        first = false;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quadkey_matches_spec_example_s3a() {
        let t = Tile::new(3, 3, 5).unwrap();
        assert_eq!(t.quadkey(), 0x27);
    }

    #[test]
    fn quadkey_matches_spec_example_s3b() {
        let t = Tile::new(18, 131_068, 131_068).unwrap();
        assert_eq!(t.quadkey(), 0x3_ffff_fff0);
    }

    #[test]
    fn quadkey_round_trips() {
        for zoom in [1u32, 5, 12, 18, 24] {
            let map_width = 1u32 << zoom;
            for (x, y) in [
                (0, 0),
                (map_width - 1, map_width - 1),
                (map_width / 2, map_width / 3),
            ] {
                let t = Tile::new(zoom, x, y).unwrap();
                let back = Tile::from_quadkey(t.quadkey(), zoom);
                assert_eq!(t, back);
            }
        }
    }

    #[test]
    fn ancestor_quadkey_is_parent_shift() {
        let t = Tile::new(10, 123, 456).unwrap();
        let parent_zoom = 9;
        let expected_parent = Tile::new(parent_zoom, 123 >> 1, 456 >> 1).unwrap();
        assert_eq!(
            Tile::ancestor_quadkey(t.quadkey(), 1),
            expected_parent.quadkey()
        );
    }

    #[test]
    fn zxy_round_trips() {
        let t = Tile::new(12, 2047, 2048).unwrap();
        let s = t.to_zxy();
        assert_eq!(s, "12/2047/2048");
        assert_eq!(Tile::from_zxy(&s).unwrap(), t);
    }

    #[test]
    fn rejects_out_of_range_tile() {
        assert!(Tile::new(3, 8, 0).is_err());
        assert!(Tile::new(32, 0, 0).is_err());
    }
}
