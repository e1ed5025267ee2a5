//! DependencyTracker (spec §4.5): propagate node/way changes to the ways
//! and relations that must be re-emitted in diff/append mode.

use std::collections::BTreeSet;
use std::sync::Mutex;

use crate::middle::Middle;
use crate::error::Result;

#[derive(Default)]
struct Pending {
    ways: BTreeSet<i64>,
    relations: BTreeSet<i64>,
}

/// Guarded by one lock each (spec §5, "Locking discipline": "held only
/// for insert and pop").
pub struct DependencyTracker {
    pending: Mutex<Pending>,
}

impl DependencyTracker {
    pub fn new() -> Self {
        DependencyTracker {
            pending: Mutex::new(Pending::default()),
        }
    }

    /// A node's location changed: propagate to the ways and relations that
    /// reference it (spec §4.5, `note_node_change`).
    pub fn note_node_change(&self, id: i64, middle: &dyn Middle) -> Result<()> {
        let ways = middle.ways_using_node(id)?;
        let relations = middle.relations_using_node(id)?;
        let mut pending = self.pending.lock().unwrap();
        pending.ways.extend(ways);
        pending.relations.extend(relations);
        Ok(())
    }

    /// A way changed directly: propagate to the relations that reference
    /// it (spec §4.5, `note_way_change`).
    pub fn note_way_change(&self, id: i64, middle: &dyn Middle) -> Result<()> {
        let relations = middle.relations_using_way(id)?;
        self.pending.lock().unwrap().relations.extend(relations);
        Ok(())
    }

    /// A relation changed directly (spec §4.5, `note_relation_change`).
    pub fn note_relation_change(&self, id: i64) {
        self.pending.lock().unwrap().relations.insert(id);
    }

    /// Drain the pending-ways set in ascending id order, exactly once each
    /// (spec §4.5, `drain_ways`).
    pub fn drain_ways(&self) -> Vec<i64> {
        std::mem::take(&mut self.pending.lock().unwrap().ways)
            .into_iter()
            .collect()
    }

    /// Drain the pending-relations set in ascending id order (spec §4.5,
    /// `drain_relations`).
    pub fn drain_relations(&self) -> Vec<i64> {
        std::mem::take(&mut self.pending.lock().unwrap().relations)
            .into_iter()
            .collect()
    }
}

impl Default for DependencyTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{Location, Member, MemberType, RelationData, WayData};
    use crate::middle::RamMiddle;

    #[test]
    fn note_node_change_propagates_to_ways_and_relations() {
        let middle = RamMiddle::new();
        middle.put_node(1, Location::new(0.0, 0.0)).unwrap();
        middle
            .put_way(10, WayData { nodes: vec![1, 2], tags: Vec::new() })
            .unwrap();
        middle
            .put_relation(
                100,
                RelationData {
                    members: vec![Member { member_type: MemberType::Node, member_ref: 1, role: String::new() }],
                    tags: Vec::new(),
                },
            )
            .unwrap();

        let tracker = DependencyTracker::new();
        tracker.note_node_change(1, &middle).unwrap();
        assert_eq!(tracker.drain_ways(), vec![10]);
        assert_eq!(tracker.drain_relations(), vec![100]);
    }

    #[test]
    fn note_way_change_propagates_to_relations() {
        let middle = RamMiddle::new();
        middle.put_way(10, WayData { nodes: vec![1], tags: Vec::new() }).unwrap();
        middle
            .put_relation(
                100,
                RelationData {
                    members: vec![Member { member_type: MemberType::Way, member_ref: 10, role: String::new() }],
                    tags: Vec::new(),
                },
            )
            .unwrap();

        let tracker = DependencyTracker::new();
        tracker.note_way_change(10, &middle).unwrap();
        assert_eq!(tracker.drain_relations(), vec![100]);
    }

    #[test]
    fn drain_is_exhaustive_and_sorted() {
        let tracker = DependencyTracker::new();
        tracker.note_relation_change(5);
        tracker.note_relation_change(1);
        tracker.note_relation_change(3);
        assert_eq!(tracker.drain_relations(), vec![1, 3, 5]);
        assert!(tracker.drain_relations().is_empty());
    }
}
