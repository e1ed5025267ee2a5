//! In-memory `Middle` backend, for initial imports (spec §4.4, "RAM
//! middle").

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use super::Middle;
use crate::collab::{Location, MemberType, RelationData, WayData};
use crate::error::Result;

#[derive(Default)]
struct Tables {
    nodes: HashMap<i64, Location>,
    ways: HashMap<i64, WayData>,
    relations: HashMap<i64, RelationData>,

    node_to_ways: HashMap<i64, HashSet<i64>>,
    node_to_relations: HashMap<i64, HashSet<i64>>,
    way_to_relations: HashMap<i64, HashSet<i64>>,
}

/// An in-memory id-indexed cache. Reverse-lookup indices are maintained
/// incrementally as ways/relations are put and deleted.
pub struct RamMiddle {
    tables: RwLock<Tables>,
}

impl RamMiddle {
    pub fn new() -> Self {
        RamMiddle {
            tables: RwLock::new(Tables::default()),
        }
    }
}

impl Default for RamMiddle {
    fn default() -> Self {
        Self::new()
    }
}

impl Middle for RamMiddle {
    fn put_node(&self, id: i64, location: Location) -> Result<()> {
        self.tables.write().unwrap().nodes.insert(id, location);
        Ok(())
    }

    fn get_node(&self, id: i64) -> Result<Option<Location>> {
        Ok(self.tables.read().unwrap().nodes.get(&id).copied())
    }

    fn delete_node(&self, id: i64) -> Result<()> {
        self.tables.write().unwrap().nodes.remove(&id);
        Ok(())
    }

    fn put_way(&self, id: i64, way: WayData) -> Result<()> {
        let mut tables = self.tables.write().unwrap();
        if let Some(old) = tables.ways.get(&id).cloned() {
            for nid in &old.nodes {
                if let Some(set) = tables.node_to_ways.get_mut(nid) {
                    set.remove(&id);
                }
            }
        }
        for nid in &way.nodes {
            tables.node_to_ways.entry(*nid).or_default().insert(id);
        }
        tables.ways.insert(id, way);
        Ok(())
    }

    fn get_way(&self, id: i64) -> Result<Option<WayData>> {
        Ok(self.tables.read().unwrap().ways.get(&id).cloned())
    }

    fn get_way_nodes(&self, id: i64) -> Result<Vec<Location>> {
        let tables = self.tables.read().unwrap();
        let Some(way) = tables.ways.get(&id) else {
            return Ok(Vec::new());
        };
        Ok(way
            .nodes
            .iter()
            .map(|nid| tables.nodes.get(nid).copied().unwrap_or_else(Location::invalid))
            .collect())
    }

    fn delete_way(&self, id: i64) -> Result<()> {
        let mut tables = self.tables.write().unwrap();
        if let Some(way) = tables.ways.remove(&id) {
            for nid in &way.nodes {
                if let Some(set) = tables.node_to_ways.get_mut(nid) {
                    set.remove(&id);
                }
            }
        }
        Ok(())
    }

    fn put_relation(&self, id: i64, relation: RelationData) -> Result<()> {
        let mut tables = self.tables.write().unwrap();
        if let Some(old) = tables.relations.get(&id).cloned() {
            for member in &old.members {
                match member.member_type {
                    MemberType::Node => {
                        if let Some(set) = tables.node_to_relations.get_mut(&member.member_ref) {
                            set.remove(&id);
                        }
                    }
                    MemberType::Way => {
                        if let Some(set) = tables.way_to_relations.get_mut(&member.member_ref) {
                            set.remove(&id);
                        }
                    }
                    MemberType::Relation => {}
                }
            }
        }
        for member in &relation.members {
            match member.member_type {
                MemberType::Node => {
                    tables
                        .node_to_relations
                        .entry(member.member_ref)
                        .or_default()
                        .insert(id);
                }
                MemberType::Way => {
                    tables
                        .way_to_relations
                        .entry(member.member_ref)
                        .or_default()
                        .insert(id);
                }
                MemberType::Relation => {}
            }
        }
        tables.relations.insert(id, relation);
        Ok(())
    }

    fn get_relation(&self, id: i64) -> Result<Option<RelationData>> {
        Ok(self.tables.read().unwrap().relations.get(&id).cloned())
    }

    fn get_way_members(&self, id: i64) -> Result<Vec<(Vec<Location>, String)>> {
        let tables = self.tables.read().unwrap();
        let Some(relation) = tables.relations.get(&id) else {
            return Ok(Vec::new());
        };
        let mut result = Vec::new();
        for member in &relation.members {
            if member.member_type != MemberType::Way {
                continue;
            }
            let Some(way) = tables.ways.get(&member.member_ref) else {
                continue;
            };
            let nodes = way
                .nodes
                .iter()
                .map(|nid| tables.nodes.get(nid).copied().unwrap_or_else(Location::invalid))
                .collect();
            result.push((nodes, member.role.clone()));
        }
        Ok(result)
    }

    fn delete_relation(&self, id: i64) -> Result<()> {
        let mut tables = self.tables.write().unwrap();
        if let Some(relation) = tables.relations.remove(&id) {
            for member in &relation.members {
                match member.member_type {
                    MemberType::Node => {
                        if let Some(set) = tables.node_to_relations.get_mut(&member.member_ref) {
                            set.remove(&id);
                        }
                    }
                    MemberType::Way => {
                        if let Some(set) = tables.way_to_relations.get_mut(&member.member_ref) {
                            set.remove(&id);
                        }
                    }
                    MemberType::Relation => {}
                }
            }
        }
        Ok(())
    }

    fn ways_using_node(&self, id: i64) -> Result<Vec<i64>> {
        let mut ids: Vec<i64> = self
            .tables
            .read()
            .unwrap()
            .node_to_ways
            .get(&id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        ids.sort_unstable();
        Ok(ids)
    }

    fn relations_using_node(&self, id: i64) -> Result<Vec<i64>> {
        let mut ids: Vec<i64> = self
            .tables
            .read()
            .unwrap()
            .node_to_relations
            .get(&id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        ids.sort_unstable();
        Ok(ids)
    }

    fn relations_using_way(&self, id: i64) -> Result<Vec<i64>> {
        let mut ids: Vec<i64> = self
            .tables
            .read()
            .unwrap()
            .way_to_relations
            .get(&id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        ids.sort_unstable();
        Ok(ids)
    }
}
