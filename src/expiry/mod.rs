//! The tile-expiry engine (spec §1.A, §4.3).

pub mod quadkey;
pub mod raster;
pub mod set;

pub use quadkey::{Quadkey, Tile, MAX_ZOOM};
pub use set::TileExpiry;

/// How a polygon's interior is rasterised, per spec §4.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpireMode {
    /// Expire the boundary only.
    BoundaryOnly,
    /// Expire the boundary and scanline-fill the interior.
    FullArea,
    /// Use `full_area` unless the geometry's bounding box exceeds
    /// `full_area_limit`, in which case fall back to `boundary_only`.
    Hybrid,
}

/// Per-call configuration for [`TileExpiry::from_geometry`] (spec §4.3).
#[derive(Debug, Clone, Copy)]
pub struct ExpireConfig {
    pub mode: ExpireMode,
    /// Max bounding-box side (in target-SRS metres) before hybrid mode
    /// falls back to boundary-only.
    pub full_area_limit: f64,
    /// How many tiles worth of space to leave either side of a feature.
    pub buffer_tiles: f64,
}

impl Default for ExpireConfig {
    fn default() -> Self {
        ExpireConfig {
            mode: ExpireMode::Hybrid,
            full_area_limit: 20_000.0,
            buffer_tiles: 0.1,
        }
    }
}

/// The parameters needed to build a fresh [`TileExpiry`]. Outputs keep one
/// of these instead of a built `TileExpiry` so that a stage-2 worker clone
/// (spec §5, "each worker gets a clone of the output") can start its own
/// empty expiry accumulator rather than sharing one across threads.
#[derive(Clone)]
pub struct ExpireSpec {
    pub max_zoom: u32,
    pub min_zoom: u32,
    pub max_tiles_per_geometry: usize,
    pub reprojector: std::sync::Arc<dyn crate::reproject::Reprojection>,
}

impl ExpireSpec {
    pub fn build(&self) -> TileExpiry {
        TileExpiry::new(
            self.max_zoom,
            self.min_zoom,
            self.max_tiles_per_geometry,
            self.reprojector.clone(),
        )
    }
}
