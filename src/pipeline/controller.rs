//! Pipeline controller (spec §4.8): drives the three-stage import.

use std::collections::HashMap;
use std::sync::Arc;

use crate::collab::{Primitive, PrimitiveEvent, Source};
use crate::dependency::DependencyTracker;
use crate::error::{CoreError, Result};
use crate::expiry::{ExpireSpec, Tile};
use crate::middle::Middle;
use crate::output::Output;

use super::worker_pool::drain_parallel;

/// Node/way/relation ids live in independent namespaces; version tracking
/// is keyed on (kind, id) so a node and a way sharing a numeric id don't
/// collide (spec §3, "version is monotonic per (type, id)").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ObjectNamespace {
    Node,
    Way,
    Relation,
}

fn namespace_of(primitive: &Primitive) -> Option<ObjectNamespace> {
    match primitive {
        Primitive::Node(_) => Some(ObjectNamespace::Node),
        Primitive::Way(_) => Some(ObjectNamespace::Way),
        Primitive::Relation(_) => Some(ObjectNamespace::Relation),
        Primitive::Deleted => None,
    }
}

/// Orchestrates stage 1 (stream pass), stage 2 (pending drain, append
/// mode only), and stage 3 (shutdown) against one or more outputs (spec
/// §4.8).
pub struct PipelineController {
    middle: Arc<dyn Middle>,
    tracker: DependencyTracker,
    outputs: Vec<Box<dyn Output>>,
    append: bool,
    num_procs: u32,
    last_version: HashMap<(ObjectNamespace, i64), u32>,
    expire_spec: ExpireSpec,
    expired_tiles: Vec<Tile>,
}

impl PipelineController {
    /// `expire_spec` must match the zoom range every output's own
    /// `TileExpiry` was built with: the master accumulator's quadkeys are
    /// only meaningful decoded at the zoom they were encoded at (spec §4.3,
    /// `rolled_up_tiles`).
    pub fn new(
        middle: Arc<dyn Middle>,
        outputs: Vec<Box<dyn Output>>,
        append: bool,
        num_procs: u32,
        expire_spec: ExpireSpec,
    ) -> Self {
        PipelineController {
            middle,
            tracker: DependencyTracker::new(),
            outputs,
            append,
            num_procs,
            last_version: HashMap::new(),
            expire_spec,
            expired_tiles: Vec::new(),
        }
    }

    /// The rolled-up, `(zoom, x, y)`-sorted expiry list computed by stage 3
    /// (spec §4.8). Empty until [`PipelineController::run`] has completed.
    pub fn expired_tiles(&self) -> &[Tile] {
        &self.expired_tiles
    }

    /// Write the expiry list in the wire format of spec §6: one tile per
    /// line, `zoom/x/y\n`, already sorted ascending by `(zoom, x, y)`.
    pub fn write_expiry_list(&self, writer: &mut dyn std::io::Write) -> Result<()> {
        for tile in &self.expired_tiles {
            writeln!(writer, "{}/{}/{}", tile.zoom, tile.x, tile.y)
                .map_err(|e| CoreError::BackendFailure(e.to_string()))?;
        }
        Ok(())
    }

    /// Reject a version that does not strictly increase over the last one
    /// seen for this (type, id) (Open Question resolution: out-of-order
    /// diffs are rejected, not silently applied last-write-wins, since the
    /// data model states version is monotonic per (type, id)).
    fn check_version(&mut self, event: &PrimitiveEvent) -> Result<()> {
        let Some(namespace) = namespace_of(&event.payload) else {
            return Ok(());
        };
        let key = (namespace, event.id);
        if let Some(&last) = self.last_version.get(&key) {
            if event.version <= last {
                return Err(CoreError::InvalidInput(format!(
                    "out-of-order version {} for id {} (last seen {})",
                    event.version, event.id, last
                )));
            }
        }
        self.last_version.insert(key, event.version);
        Ok(())
    }

    /// Run the full import against `source` (spec §4.8).
    pub fn run(&mut self, source: &mut dyn Source) -> Result<()> {
        for out in &mut self.outputs {
            out.start()?;
        }

        self.run_stage1(source)?;

        if self.append {
            self.run_stage2()?;
        }

        self.run_stage3()
    }

    fn dispatch(&mut self, event: PrimitiveEvent) -> Result<()> {
        self.check_version(&event)?;
        apply_to_middle(&*self.middle, &event)?;

        if self.append {
            note_dependency(&self.tracker, &*self.middle, &event)?;
        }

        for out in &mut self.outputs {
            out.handle(&event)?;
        }
        Ok(())
    }

    /// Stage 1: single-threaded, source-driven stream pass (spec §5,
    /// "single-threaded cooperative in stage 1"). The source's three
    /// callbacks all funnel into the same dispatch so ordering across
    /// kinds matches arrival order, not node-then-way-then-relation
    /// batching (spec §9, "Duplicated side-effect entry points").
    fn run_stage1(&mut self, source: &mut dyn Source) -> Result<()> {
        let collected = std::cell::RefCell::new(Vec::<PrimitiveEvent>::new());
        {
            let on_primitive = |event: PrimitiveEvent| -> Result<()> {
                collected.borrow_mut().push(event);
                Ok(())
            };
            let mut on_node = |event: PrimitiveEvent| on_primitive(event);
            let mut on_way = |event: PrimitiveEvent| on_primitive(event);
            let mut on_relation = |event: PrimitiveEvent| on_primitive(event);
            let mut on_changeset_end = || -> Result<()> { Ok(()) };
            source.run(&mut on_node, &mut on_way, &mut on_relation, &mut on_changeset_end)?;
        }

        for event in collected.into_inner() {
            self.dispatch(event)?;
        }
        Ok(())
    }

    /// Stage 2: drain the dependency tracker's pending ways and relations
    /// across a fixed-size worker pool, one cloned output instance per
    /// thread (spec §4.8, §5).
    fn run_stage2(&mut self) -> Result<()> {
        let ways = self.tracker.drain_ways();
        let relations = self.tracker.drain_relations();
        let spec = self.expire_spec.clone();

        for out in &mut self.outputs {
            let workers = drain_parallel(
                ways.clone(),
                self.num_procs,
                || out.clone_for_worker(),
                |worker, id| worker.pending_way(id),
            )?;
            for mut worker in workers {
                merge_back(out.as_mut(), worker.as_mut(), &spec)?;
            }

            let workers = drain_parallel(
                relations.clone(),
                self.num_procs,
                || out.clone_for_worker(),
                |worker, id| worker.pending_relation(id),
            )?;
            for mut worker in workers {
                merge_back(out.as_mut(), worker.as_mut(), &spec)?;
            }
        }
        Ok(())
    }

    /// Stage 3: commit pending writes, merge expiry, roll it up across
    /// zoom levels (spec §4.8).
    fn run_stage3(&mut self) -> Result<()> {
        let mut master = self.expire_spec.build();
        for out in &mut self.outputs {
            out.merge_expire(&mut master)?;
            out.stop()?;
        }
        // The rolled-up list is retained on the controller (`expired_tiles`)
        // and can be written in the wire format of spec §6 via
        // `write_expiry_list`; the actual file/stream path is external
        // configuration, not something this core opens itself.
        self.expired_tiles = master.rolled_up_tiles();
        Ok(())
    }
}

fn merge_back(master: &mut dyn Output, worker: &mut dyn Output, spec: &ExpireSpec) -> Result<()> {
    let mut scratch = spec.build();
    worker.merge_expire(&mut scratch)?;
    master.merge_expire(&mut scratch)
}

fn apply_to_middle(middle: &dyn Middle, event: &PrimitiveEvent) -> Result<()> {
    if event.deleted() {
        match &event.payload {
            Primitive::Node(_) => middle.delete_node(event.id),
            Primitive::Way(_) => middle.delete_way(event.id),
            Primitive::Relation(_) => middle.delete_relation(event.id),
            Primitive::Deleted => Ok(()),
        }
    } else {
        match &event.payload {
            Primitive::Node(n) => middle.put_node(event.id, n.location),
            Primitive::Way(w) => middle.put_way(event.id, w.clone()),
            Primitive::Relation(r) => middle.put_relation(event.id, r.clone()),
            Primitive::Deleted => Ok(()),
        }
    }
}

fn note_dependency(tracker: &DependencyTracker, middle: &dyn Middle, event: &PrimitiveEvent) -> Result<()> {
    match &event.payload {
        Primitive::Node(_) => tracker.note_node_change(event.id, middle),
        Primitive::Way(_) => tracker.note_way_change(event.id, middle),
        Primitive::Relation(_) => {
            tracker.note_relation_change(event.id);
            Ok(())
        }
        Primitive::Deleted => Ok(()),
    }
}
