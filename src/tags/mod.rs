//! TagTransform (spec §4.6): filter a primitive's tags, decide polygon/road
//! membership, and compute `z_order`.

pub mod script;
pub mod style;
pub mod zorder;

use crate::collab::Tag;
use crate::error::Result;

/// Which OSM object kind a tag filter call is being run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Node,
    Way,
    Relation,
}

/// Output of [`TagTransform::filter_tags`] (spec §4.6, "Contract").
#[derive(Debug, Clone, Default)]
pub struct FilterResult {
    pub tags: Vec<Tag>,
    pub polygon: bool,
    pub roads: bool,
    pub z_order: Option<i32>,
    /// `false` means "drop this object entirely" (spec §4.6).
    pub keep: bool,
    pub hstore: Vec<Tag>,
}

/// Output of [`TagTransform::filter_rel_member_tags`] (spec §4.6,
/// "Multipolygon/boundary post-processing").
#[derive(Debug, Clone, Default)]
pub struct RelationFilterResult {
    pub tags: Vec<Tag>,
    pub make_polygon: bool,
    pub make_boundary: bool,
    pub roads: bool,
    /// `false` means "drop the relation's own row; member ways still get
    /// their cloned tags".
    pub keep: bool,
}

/// Backend-agnostic contract (spec §4.6): either the built-in style-driven
/// backend ([`style::StyleTagTransform`]) or a script-driven backend
/// ([`script::ScriptTagTransform`]).
pub trait TagTransform: Send + Sync {
    fn filter_tags(&self, kind: ObjectKind, tags: &[Tag]) -> Result<FilterResult>;

    fn filter_rel_member_tags(&self, rel_tags: &[Tag]) -> Result<RelationFilterResult>;
}
