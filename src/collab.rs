//! External collaborator interfaces (spec §6) and the OSM primitive data
//! model (spec §3).
//!
//! The parser, the database driver, and the flat-node cache are explicitly
//! out of scope (spec §1); this module defines only the narrow interfaces
//! the core needs from them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A `(key, value)` tag pair, kept in arrival order per the data model.
pub type Tag = (String, String);

/// A member of a relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub member_type: MemberType,
    pub member_ref: i64,
    pub role: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemberType {
    Node,
    Way,
    Relation,
}

impl fmt::Display for MemberType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MemberType::Node => "node",
            MemberType::Way => "way",
            MemberType::Relation => "relation",
        };
        f.write_str(s)
    }
}

/// A location in WGS84 degrees, with a validity bit (spec §3, "Location").
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lon: f64,
    pub lat: f64,
    pub valid: bool,
}

impl Location {
    pub fn new(lon: f64, lat: f64) -> Self {
        Location {
            lon,
            lat,
            valid: true,
        }
    }

    pub fn invalid() -> Self {
        Location {
            lon: 0.0,
            lat: 0.0,
            valid: false,
        }
    }

    /// Pack into fixed-point microdegrees at the given scale, round-tripping
    /// through the middle (spec §3, "Location").
    pub fn to_fixed(&self, scale: i32) -> (i32, i32) {
        (
            (self.lon * scale as f64).round() as i32,
            (self.lat * scale as f64).round() as i32,
        )
    }

    pub fn from_fixed(x: i32, y: i32, scale: i32) -> Self {
        Location::new(x as f64 / scale as f64, y as f64 / scale as f64)
    }
}

/// A node primitive payload.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeData {
    pub location: Location,
    pub tags: Vec<Tag>,
}

/// A way primitive payload: an ordered sequence of node ids, length 2..2000.
#[derive(Debug, Clone, PartialEq)]
pub struct WayData {
    pub nodes: Vec<i64>,
    pub tags: Vec<Tag>,
}

/// A relation primitive payload: an ordered sequence of members.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationData {
    pub members: Vec<Member>,
    pub tags: Vec<Tag>,
}

/// Kind of change an event represents, per the unified `handle(event)`
/// design note in spec §9 (collapsing `*_add`/`*_modify`/`*_delete`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Add,
    Modify,
    Delete,
}

/// A single OSM primitive event as delivered by the [`Source`].
#[derive(Debug, Clone)]
pub struct PrimitiveEvent {
    pub id: i64,
    pub version: u32,
    pub kind: ChangeKind,
    pub payload: Primitive,
}

#[derive(Debug, Clone)]
pub enum Primitive {
    Node(NodeData),
    Way(WayData),
    Relation(RelationData),
    /// A deleted primitive carries no tags, location, nodes, or members
    /// (data model invariant).
    Deleted,
}

impl PrimitiveEvent {
    pub fn deleted(&self) -> bool {
        matches!(self.kind, ChangeKind::Delete) || matches!(self.payload, Primitive::Deleted)
    }
}

/// Callback-driven OSM primitive stream (spec §6, "Source interface").
///
/// A concrete implementation (XML, PBF, ...) is outside the core; the core
/// only needs to be handed events through this trait.
pub trait Source {
    /// Drive the stream, invoking `on_event` for every node/way/relation
    /// event and `on_changeset_end` once the stream is exhausted.
    fn run(
        &mut self,
        on_node: &mut dyn FnMut(PrimitiveEvent) -> crate::error::Result<()>,
        on_way: &mut dyn FnMut(PrimitiveEvent) -> crate::error::Result<()>,
        on_relation: &mut dyn FnMut(PrimitiveEvent) -> crate::error::Result<()>,
        on_changeset_end: &mut dyn FnMut() -> crate::error::Result<()>,
    ) -> crate::error::Result<()>;
}

/// A handle describing one output table (spec §3, "Row target").
#[derive(Debug, Clone)]
pub struct RowTarget {
    pub schema: Option<String>,
    pub name: String,
    pub columns: Vec<String>,
    pub srid: i32,
    pub append: bool,
}

/// Row-sink interface (spec §6). Abstracts the database driver and SQL
/// dialect; a concrete implementation is out of scope for the core.
///
/// `Send` so a sink can be wrapped in `Arc<Mutex<dyn RowSink>>` and shared
/// across stage-2 worker threads (spec §5, "typically one connection per
/// writer").
pub trait RowSink: Send {
    /// Issue DDL to create the target table.
    fn prepare_table(&mut self, target: &RowTarget) -> crate::error::Result<()>;

    /// Begin a bulk-copy batch against `target`.
    fn begin_copy(&mut self, target: &RowTarget) -> crate::error::Result<()>;

    /// Write one row within an open bulk-copy batch.
    fn write_row(&mut self, target: &RowTarget, values: &[String]) -> crate::error::Result<()>;

    /// Commit the open bulk-copy batch.
    fn end_copy(&mut self, target: &RowTarget) -> crate::error::Result<()>;

    /// Delete the row with the given id from `target` (diff application).
    fn delete_by_id(&mut self, target: &RowTarget, id: i64) -> crate::error::Result<()>;

    /// Fetch the previously-written WKB geometry for `id`, if any.
    fn select_wkb_by_id(
        &mut self,
        target: &RowTarget,
        id: i64,
    ) -> crate::error::Result<Option<Vec<u8>>>;

    /// Register a named prepared statement.
    fn prepare_statement(&mut self, name: &str, sql: &str) -> crate::error::Result<()>;

    /// Execute a named prepared statement.
    fn exec_prepared(&mut self, name: &str, params: &[String]) -> crate::error::Result<()>;
}
