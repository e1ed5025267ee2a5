//! Output: the write side to the row sink (spec §4.8, §9 design notes).
//!
//! Per the "Polymorphism over middle and output" design note, an output is
//! a capability set — `{start, handle, pending_way, pending_relation, stop,
//! sync, merge_expire}` — wired by tagged-variant construction, not an
//! inheritance hierarchy.

pub mod flex;
pub mod gazetteer;
pub mod multi;
pub mod null;
pub mod pgsql;

use crate::collab::PrimitiveEvent;
use crate::error::Result;
use crate::expiry::TileExpiry;

pub use null::NullOutput;

/// Unifies `node_add/modify/delete`, `way_*`, `relation_*` into one
/// dispatch point (spec §9, "Duplicated side-effect entry points").
pub trait Output: Send {
    fn start(&mut self) -> Result<()>;

    /// Handle one primitive event from the source (spec §4.8, stage 1
    /// step 4).
    fn handle(&mut self, event: &PrimitiveEvent) -> Result<()>;

    /// Re-fetch way `id` from the middle and re-emit its geometry,
    /// deleting any existing row first (spec §4.8, stage 2).
    fn pending_way(&mut self, id: i64) -> Result<()>;

    /// Same as [`Output::pending_way`] for a relation.
    fn pending_relation(&mut self, id: i64) -> Result<()>;

    fn stop(&mut self) -> Result<()>;

    /// Commit any pending bulk-copy batch.
    fn sync(&mut self) -> Result<()>;

    /// Merge this output's expiry set into `master` (spec §4.8, stage 3).
    fn merge_expire(&mut self, master: &mut TileExpiry) -> Result<()>;

    /// Produce an independent clone sharing this output's row sink but
    /// starting with an empty expiry accumulator, for a stage-2 worker
    /// (spec §5, "each worker gets a clone of the output, sharing the
    /// same row sink").
    fn clone_for_worker(&self) -> Box<dyn Output>;
}
