//! Script-driven `TagTransform` backend (spec §4.6, backend 2).
//!
//! The script engine itself (Lua, or any other embedding) is outside the
//! core; this module only defines the callback contract a host wires up.

use super::{FilterResult, ObjectKind, RelationFilterResult, TagTransform};
use crate::collab::Tag;
use crate::error::Result;

/// A user-provided callback that plays the role of the external script.
pub type FilterCallback = Box<dyn Fn(ObjectKind, &[Tag]) -> Result<FilterResult> + Send + Sync>;
pub type RelationFilterCallback =
    Box<dyn Fn(&[Tag]) -> Result<RelationFilterResult> + Send + Sync>;

/// Delegates every call to host-supplied closures (spec §4.6: "delegate
/// per-primitive to an external callback").
pub struct ScriptTagTransform {
    filter_tags: FilterCallback,
    filter_rel_member_tags: RelationFilterCallback,
}

impl ScriptTagTransform {
    pub fn new(filter_tags: FilterCallback, filter_rel_member_tags: RelationFilterCallback) -> Self {
        ScriptTagTransform {
            filter_tags,
            filter_rel_member_tags,
        }
    }
}

impl TagTransform for ScriptTagTransform {
    fn filter_tags(&self, kind: ObjectKind, tags: &[Tag]) -> Result<FilterResult> {
        (self.filter_tags)(kind, tags)
    }

    fn filter_rel_member_tags(&self, rel_tags: &[Tag]) -> Result<RelationFilterResult> {
        (self.filter_rel_member_tags)(rel_tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delegates_to_the_supplied_callback() {
        let t = ScriptTagTransform::new(
            Box::new(|_kind, tags| {
                Ok(FilterResult {
                    tags: tags.to_vec(),
                    polygon: false,
                    roads: false,
                    z_order: None,
                    keep: true,
                    hstore: Vec::new(),
                })
            }),
            Box::new(|_tags| Ok(RelationFilterResult::default())),
        );
        let tags = vec![("k".to_string(), "v".to_string())];
        let result = t.filter_tags(ObjectKind::Node, &tags).unwrap();
        assert!(result.keep);
        assert_eq!(result.tags, tags);
    }
}
