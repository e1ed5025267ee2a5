//! Middle: the id-indexed cache (spec §4.4).

pub mod flat_nodes;
pub mod persistent;
pub mod ram;

use crate::collab::{Location, RelationData, WayData};
use crate::error::Result;

pub use ram::RamMiddle;

/// Contract shared by the RAM and persistent backends (spec §4.4).
/// Methods take `&self` (not `&mut self`) so a `Middle` can be read-shared
/// across stage-2 worker threads (spec §5, "Shared resources"); backends
/// achieve interior mutability with their own locking.
pub trait Middle: Send + Sync {
    fn put_node(&self, id: i64, location: Location) -> Result<()>;
    fn get_node(&self, id: i64) -> Result<Option<Location>>;
    fn delete_node(&self, id: i64) -> Result<()>;

    fn put_way(&self, id: i64, way: WayData) -> Result<()>;
    fn get_way(&self, id: i64) -> Result<Option<WayData>>;
    /// Resolve a way's node ids to locations, in order. Ids with no known
    /// location come back as [`Location::invalid`] (spec §4.4,
    /// `get_way_nodes`).
    fn get_way_nodes(&self, id: i64) -> Result<Vec<Location>>;
    fn delete_way(&self, id: i64) -> Result<()>;

    fn put_relation(&self, id: i64, relation: RelationData) -> Result<()>;
    fn get_relation(&self, id: i64) -> Result<Option<RelationData>>;
    /// Resolve a relation's way members to `(resolved node locations, role)`
    /// pairs, ready for [`crate::geometry::GeometryBuilder::multipolygon_from_relation`]
    /// (spec §4.4, `get_way_members`).
    fn get_way_members(&self, id: i64) -> Result<Vec<(Vec<Location>, String)>>;
    fn delete_relation(&self, id: i64) -> Result<()>;

    fn ways_using_node(&self, id: i64) -> Result<Vec<i64>>;
    fn relations_using_node(&self, id: i64) -> Result<Vec<i64>>;
    fn relations_using_way(&self, id: i64) -> Result<Vec<i64>>;
}
