//! `FlexOutput`: a generic, style-driven table output that projects one
//! column per style entry instead of a single tags blob (spec §9 design
//! notes, output variant list; style-file grammar per spec §4.7).

use std::sync::{Arc, Mutex};

use super::Output;
use crate::collab::{ChangeKind, Primitive, PrimitiveEvent, RowSink, RowTarget};
use crate::error::Result;
use crate::expiry::{ExpireConfig, ExpireSpec, TileExpiry};
use crate::geometry::wkb::{encode_hex, geom_to_ewkb};
use crate::geometry::GeometryBuilder;
use crate::middle::Middle;
use crate::style::Style;

/// `FlexOutput` writes one row per primitive into a single wide table whose
/// columns are the non-wildcard entries of the loaded style, in order.
pub struct FlexOutput {
    middle: Arc<dyn Middle>,
    sink: Arc<Mutex<dyn RowSink>>,
    builder: Arc<GeometryBuilder>,
    style: Arc<Style>,
    target: RowTarget,
    expire: TileExpiry,
    expire_spec: ExpireSpec,
    expire_config: ExpireConfig,
}

impl FlexOutput {
    pub fn new(
        middle: Arc<dyn Middle>,
        sink: Arc<Mutex<dyn RowSink>>,
        builder: Arc<GeometryBuilder>,
        style: Arc<Style>,
        target: RowTarget,
        expire_spec: ExpireSpec,
        expire_config: ExpireConfig,
    ) -> Self {
        let expire = expire_spec.build();
        FlexOutput {
            middle,
            sink,
            builder,
            style,
            target,
            expire,
            expire_spec,
            expire_config,
        }
    }

    fn column_keys(&self) -> Vec<&str> {
        self.style
            .entries
            .iter()
            .filter(|e| !e.is_wildcard())
            .map(|e| e.key.as_str())
            .collect()
    }

    fn project_tags(&self, tags: &[(String, String)]) -> Vec<String> {
        self.column_keys()
            .into_iter()
            .map(|key| {
                tags.iter()
                    .find(|(k, _)| k == key)
                    .map(|(_, v)| v.clone())
                    .unwrap_or_default()
            })
            .collect()
    }

    fn write_row(&mut self, id: i64, geom: &crate::geometry::Geometry, tags: &[(String, String)]) -> Result<()> {
        if geom.is_null() {
            return Ok(());
        }
        let wkb_hex = encode_hex(&geom_to_ewkb(geom, true));
        let mut columns = vec![id.to_string(), wkb_hex];
        columns.extend(self.project_tags(tags));

        let mut sink = self.sink.lock().unwrap();
        sink.begin_copy(&self.target)?;
        sink.write_row(&self.target, &columns)?;
        sink.end_copy(&self.target)?;
        drop(sink);

        self.expire.from_geometry(geom, &self.expire_config)
    }
}

impl Output for FlexOutput {
    fn start(&mut self) -> Result<()> {
        self.sink.lock().unwrap().prepare_table(&self.target)
    }

    fn handle(&mut self, event: &PrimitiveEvent) -> Result<()> {
        if event.deleted() {
            return self.sink.lock().unwrap().delete_by_id(&self.target, event.id);
        }
        if matches!(event.kind, ChangeKind::Modify) {
            self.sink.lock().unwrap().delete_by_id(&self.target, event.id)?;
        }
        match &event.payload {
            Primitive::Node(node) => {
                let geom = self.builder.point_from_node(&node.location);
                self.write_row(event.id, &geom, &node.tags)?;
            }
            Primitive::Way(way) => {
                let nodes = self.middle.get_way_nodes(event.id)?;
                let split_at = self.builder.default_split_at();
                let geom = self.builder.line_from_way(&nodes, split_at);
                self.write_row(event.id, &geom, &way.tags)?;
            }
            Primitive::Relation(_) | Primitive::Deleted => {}
        }
        Ok(())
    }

    fn pending_way(&mut self, id: i64) -> Result<()> {
        self.sink.lock().unwrap().delete_by_id(&self.target, id)?;
        let Some(way) = self.middle.get_way(id)? else {
            return Ok(());
        };
        let nodes = self.middle.get_way_nodes(id)?;
        let split_at = self.builder.default_split_at();
        let geom = self.builder.line_from_way(&nodes, split_at);
        self.write_row(id, &geom, &way.tags)
    }

    fn pending_relation(&mut self, _id: i64) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        Ok(())
    }

    fn merge_expire(&mut self, master: &mut TileExpiry) -> Result<()> {
        master.merge(&mut self.expire);
        Ok(())
    }

    fn clone_for_worker(&self) -> Box<dyn Output> {
        Box::new(FlexOutput::new(
            self.middle.clone(),
            self.sink.clone(),
            self.builder.clone(),
            self.style.clone(),
            self.target.clone(),
            self.expire_spec.clone(),
            self.expire_config,
        ))
    }
}
