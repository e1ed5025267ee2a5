//! `PgsqlOutput`: the main output variant, writing through the abstracted
//! [`RowSink`] (spec §4.8, §9: `PgsqlOutput` in the design notes' variant
//! list).

use std::sync::{Arc, Mutex};

use super::Output;
use crate::collab::{ChangeKind, Primitive, PrimitiveEvent, RowSink, RowTarget};
use crate::error::Result;
use crate::expiry::{ExpireConfig, ExpireSpec, TileExpiry};
use crate::geometry::wkb::geom_to_ewkb;
use crate::geometry::{Geometry, GeometryBuilder};
use crate::middle::Middle;
use crate::tags::{FilterResult, ObjectKind, TagTransform};

/// The three row targets a `PgsqlOutput` writes through (point/line
/// features, polygon features, and the roads subset — spec §4.6/§4.8;
/// the roads table is a redundant projection used for low-zoom rendering,
/// matching the reference's point/line/polygon/roads table split).
#[derive(Clone)]
pub struct Targets {
    pub point: RowTarget,
    pub line: RowTarget,
    pub polygon: RowTarget,
    pub roads: RowTarget,
}

pub struct PgsqlOutput {
    middle: Arc<dyn Middle>,
    sink: Arc<Mutex<dyn RowSink>>,
    builder: Arc<GeometryBuilder>,
    transform: Arc<dyn TagTransform>,
    targets: Targets,
    expire: TileExpiry,
    expire_spec: ExpireSpec,
    expire_config: ExpireConfig,
    split_at: f64,
}

impl PgsqlOutput {
    pub fn new(
        middle: Arc<dyn Middle>,
        sink: Arc<Mutex<dyn RowSink>>,
        builder: Arc<GeometryBuilder>,
        transform: Arc<dyn TagTransform>,
        targets: Targets,
        expire_spec: ExpireSpec,
        expire_config: ExpireConfig,
    ) -> Self {
        let split_at = builder.default_split_at();
        let expire = expire_spec.build();
        PgsqlOutput {
            middle,
            sink,
            builder,
            transform,
            targets,
            expire,
            expire_spec,
            expire_config,
            split_at,
        }
    }

    fn write_geometry(&mut self, target: &RowTarget, id: i64, geom: &Geometry, tags_str: String) -> Result<()> {
        if geom.is_null() {
            return Ok(());
        }
        let wkb = geom_to_ewkb(geom, true);
        let wkb_hex = crate::geometry::wkb::encode_hex(&wkb);
        let mut sink = self.sink.lock().unwrap();
        sink.begin_copy(target)?;
        sink.write_row(target, &[id.to_string(), wkb_hex, tags_str])?;
        sink.end_copy(target)?;
        drop(sink);
        self.expire.from_geometry(geom, &self.expire_config)
    }

    fn delete_everywhere(&mut self, id: i64) -> Result<()> {
        let mut sink = self.sink.lock().unwrap();
        sink.delete_by_id(&self.targets.point, id)?;
        sink.delete_by_id(&self.targets.line, id)?;
        sink.delete_by_id(&self.targets.polygon, id)?;
        sink.delete_by_id(&self.targets.roads, id)
    }

    fn tags_to_string(result: &FilterResult) -> String {
        result
            .tags
            .iter()
            .map(|(k, v)| format!("{k}=>{v}"))
            .collect::<Vec<_>>()
            .join(",")
    }

    fn emit_way(&mut self, id: i64, nodes: &[crate::collab::Location], filter: &FilterResult) -> Result<()> {
        let tags_str = Self::tags_to_string(filter);
        if filter.polygon {
            let geom = self.builder.polygon_from_way(nodes);
            self.write_geometry(&self.targets.polygon.clone(), id, &geom, tags_str.clone())?;
        } else {
            let geom = self.builder.line_from_way(nodes, self.split_at);
            self.write_geometry(&self.targets.line.clone(), id, &geom, tags_str.clone())?;
        }
        if filter.roads {
            let geom = self.builder.line_from_way(nodes, self.split_at);
            self.write_geometry(&self.targets.roads.clone(), id, &geom, tags_str)?;
        }
        Ok(())
    }

    fn emit_relation(&mut self, id: i64) -> Result<()> {
        let Some(relation) = self.middle.get_relation(id)? else {
            return Ok(());
        };
        let filter = self.transform.filter_rel_member_tags(&relation.tags)?;
        if !filter.make_polygon && !filter.make_boundary {
            return Ok(());
        }

        let members = self.middle.get_way_members(id)?;
        let tags_str = filter
            .tags
            .iter()
            .map(|(k, v)| format!("{k}=>{v}"))
            .collect::<Vec<_>>()
            .join(",");

        let geom = self.builder.multipolygon_from_relation(&members);
        self.write_geometry(&self.targets.polygon.clone(), id, &geom, tags_str.clone())?;

        if filter.make_boundary {
            let lines: Vec<Vec<crate::collab::Location>> =
                members.into_iter().map(|(nodes, _role)| nodes).collect();
            let mline = self.builder.multiline_from_relation(&lines);
            self.write_geometry(&self.targets.line.clone(), id, &mline, tags_str)?;
        }

        Ok(())
    }
}

impl Output for PgsqlOutput {
    fn start(&mut self) -> Result<()> {
        let mut sink = self.sink.lock().unwrap();
        sink.prepare_table(&self.targets.point)?;
        sink.prepare_table(&self.targets.line)?;
        sink.prepare_table(&self.targets.polygon)?;
        sink.prepare_table(&self.targets.roads)
    }

    fn handle(&mut self, event: &PrimitiveEvent) -> Result<()> {
        if event.deleted() {
            return self.delete_everywhere(event.id);
        }

        if matches!(event.kind, ChangeKind::Modify) {
            self.delete_everywhere(event.id)?;
        }

        match &event.payload {
            Primitive::Node(node) => {
                let filter = self.transform.filter_tags(ObjectKind::Node, &node.tags)?;
                if !filter.keep {
                    return Ok(());
                }
                let geom = self.builder.point_from_node(&node.location);
                let tags_str = Self::tags_to_string(&filter);
                self.write_geometry(&self.targets.point.clone(), event.id, &geom, tags_str)
            }
            Primitive::Way(way) => {
                let filter = self.transform.filter_tags(ObjectKind::Way, &way.tags)?;
                if !filter.keep {
                    return Ok(());
                }
                let nodes = self.middle.get_way_nodes(event.id)?;
                self.emit_way(event.id, &nodes, &filter)
            }
            Primitive::Relation(_) => self.emit_relation(event.id),
            Primitive::Deleted => Ok(()),
        }
    }

    fn pending_way(&mut self, id: i64) -> Result<()> {
        self.delete_everywhere(id)?;
        let Some(way) = self.middle.get_way(id)? else {
            return Ok(());
        };
        let filter = self.transform.filter_tags(ObjectKind::Way, &way.tags)?;
        if !filter.keep {
            return Ok(());
        }
        let nodes = self.middle.get_way_nodes(id)?;
        self.emit_way(id, &nodes, &filter)
    }

    fn pending_relation(&mut self, id: i64) -> Result<()> {
        self.delete_everywhere(id)?;
        self.emit_relation(id)
    }

    fn stop(&mut self) -> Result<()> {
        self.sync()
    }

    fn sync(&mut self) -> Result<()> {
        Ok(())
    }

    fn merge_expire(&mut self, master: &mut TileExpiry) -> Result<()> {
        master.merge(&mut self.expire);
        Ok(())
    }

    fn clone_for_worker(&self) -> Box<dyn Output> {
        Box::new(PgsqlOutput::new(
            self.middle.clone(),
            self.sink.clone(),
            self.builder.clone(),
            self.transform.clone(),
            self.targets.clone(),
            self.expire_spec.clone(),
            self.expire_config,
        ))
    }
}
