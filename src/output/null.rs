//! `NullOutput`: discards every event (spec §9, output variant list).
//! Useful for dry runs and benchmarking the stream/middle path alone.

use super::Output;
use crate::collab::PrimitiveEvent;
use crate::error::Result;
use crate::expiry::TileExpiry;

#[derive(Default)]
pub struct NullOutput;

impl NullOutput {
    pub fn new() -> Self {
        NullOutput
    }
}

impl Output for NullOutput {
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn handle(&mut self, _event: &PrimitiveEvent) -> Result<()> {
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
        Box::new(NullOutput::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{ChangeKind, Primitive};

    #[test]
    fn discards_every_event() {
        let mut out = NullOutput::new();
        out.start().unwrap();
        out.handle(&PrimitiveEvent {
            id: 1,
            version: 1,
            kind: ChangeKind::Add,
            payload: Primitive::Deleted,
        })
        .unwrap();
        out.stop().unwrap();
    }
}
