//! `MultiOutput`: fan an event out to several sub-outputs (spec §9 design
//! notes, output variant list).

use super::Output;
use crate::collab::PrimitiveEvent;
use crate::error::Result;
use crate::expiry::TileExpiry;

pub struct MultiOutput {
    outputs: Vec<Box<dyn Output>>,
}

impl MultiOutput {
    pub fn new(outputs: Vec<Box<dyn Output>>) -> Self {
        MultiOutput { outputs }
    }
}

impl Output for MultiOutput {
    fn start(&mut self) -> Result<()> {
        for out in &mut self.outputs {
            out.start()?;
        }
        Ok(())
    }

    fn handle(&mut self, event: &PrimitiveEvent) -> Result<()> {
        for out in &mut self.outputs {
            out.handle(event)?;
        }
        Ok(())
    }

    fn pending_way(&mut self, id: i64) -> Result<()> {
        for out in &mut self.outputs {
            out.pending_way(id)?;
        }
        Ok(())
    }

    fn pending_relation(&mut self, id: i64) -> Result<()> {
        for out in &mut self.outputs {
            out.pending_relation(id)?;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        for out in &mut self.outputs {
            out.stop()?;
        }
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        for out in &mut self.outputs {
            out.sync()?;
        }
        Ok(())
    }

    fn merge_expire(&mut self, master: &mut TileExpiry) -> Result<()> {
        for out in &mut self.outputs {
            out.merge_expire(master)?;
        }
        Ok(())
    }

    fn clone_for_worker(&self) -> Box<dyn Output> {
        Box::new(MultiOutput::new(
            self.outputs.iter().map(|o| o.clone_for_worker()).collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::null::NullOutput;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingOutput(Arc<AtomicUsize>);

    impl Output for CountingOutput {
        fn start(&mut self) -> Result<()> {
            Ok(())
        }
        fn handle(&mut self, _event: &PrimitiveEvent) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
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
            Box::new(CountingOutput(self.0.clone()))
        }
    }

    #[test]
    fn fans_handle_out_to_every_sub_output() {
        use crate::collab::{ChangeKind, Primitive};

        let counter = Arc::new(AtomicUsize::new(0));
        let mut multi = MultiOutput::new(vec![
            Box::new(NullOutput::new()),
            Box::new(CountingOutput(counter.clone())),
            Box::new(CountingOutput(counter.clone())),
        ]);
        multi
            .handle(&PrimitiveEvent {
                id: 1,
                version: 1,
                kind: ChangeKind::Add,
                payload: Primitive::Deleted,
            })
            .unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
