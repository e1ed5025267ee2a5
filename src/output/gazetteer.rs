//! `GazetteerOutput`: minimal geocoding-oriented output (spec §9 design
//! notes, output variant list).
//!
//! Geocoding-specific ranking (address interpolation, name search rank,
//! place hierarchy) is out of scope (spec §1, "Non-goals" scope this core
//! to rendering/export geometry, not a Nominatim-style importer). This
//! variant only proves out the capability set against a single "placex"
//! style target: point/linestring/polygon features carrying their raw
//! tags, with no rank or address computation.

use std::sync::{Arc, Mutex};

use super::Output;
use crate::collab::{ChangeKind, Primitive, PrimitiveEvent, RowSink, RowTarget};
use crate::error::Result;
use crate::expiry::TileExpiry;
use crate::geometry::wkb::{encode_hex, geom_to_ewkb};
use crate::geometry::GeometryBuilder;
use crate::middle::Middle;

pub struct GazetteerOutput {
    middle: Arc<dyn Middle>,
    sink: Arc<Mutex<dyn RowSink>>,
    builder: Arc<GeometryBuilder>,
    target: RowTarget,
}

impl GazetteerOutput {
    pub fn new(
        middle: Arc<dyn Middle>,
        sink: Arc<Mutex<dyn RowSink>>,
        builder: Arc<GeometryBuilder>,
        target: RowTarget,
    ) -> Self {
        GazetteerOutput {
            middle,
            sink,
            builder,
            target,
        }
    }

    fn write_row(&mut self, id: i64, geom: &crate::geometry::Geometry, tags: &[(String, String)]) -> Result<()> {
        if geom.is_null() || tags.is_empty() {
            return Ok(());
        }
        let tags_str = tags
            .iter()
            .map(|(k, v)| format!("{k}=>{v}"))
            .collect::<Vec<_>>()
            .join(",");
        let wkb_hex = encode_hex(&geom_to_ewkb(geom, true));
        let mut sink = self.sink.lock().unwrap();
        sink.begin_copy(&self.target)?;
        sink.write_row(&self.target, &[id.to_string(), wkb_hex, tags_str])?;
        sink.end_copy(&self.target)
    }
}

impl Output for GazetteerOutput {
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
            Primitive::Node(node) => self.write_row(event.id, &self.builder.point_from_node(&node.location), &node.tags)?,
            Primitive::Way(way) => {
                let nodes = self.middle.get_way_nodes(event.id)?;
                let geom = self.builder.polygon_from_way(&nodes);
                let geom = if geom.is_null() {
                    self.builder.line_from_way(&nodes, self.builder.default_split_at())
                } else {
                    geom
                };
                self.write_row(event.id, &geom, &way.tags)?;
            }
            Primitive::Relation(_) | Primitive::Deleted => {}
        }
        Ok(())
    }

    fn pending_way(&mut self, _id: i64) -> Result<()> {
        Ok(())
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

    fn merge_expire(&mut self, _master: &mut TileExpiry) -> Result<()> {
        Ok(())
    }

    fn clone_for_worker(&self) -> Box<dyn Output> {
        Box::new(GazetteerOutput::new(
            self.middle.clone(),
            self.sink.clone(),
            self.builder.clone(),
            self.target.clone(),
        ))
    }
}
