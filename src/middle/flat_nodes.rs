//! Flat-node file: a dense, memory-mapped, node-id-addressed location
//! store that can substitute for the nodes table (spec §4.4).
//!
//! Each slot is 9 bytes: two little-endian `i32` fixed-point coordinates
//! at [`FIXED_POINT_SCALE`], plus a trailing validity byte (0 or 1) —
//! coordinates alone can't double as a sentinel since `(0, 0)` is a
//! legitimate location.

use std::fs::OpenOptions;
use std::path::Path;

use memmap2::MmapMut;

use crate::collab::Location;
use crate::error::{CoreError, Result};

/// Fixed-point scale applied to lon/lat before packing (spec §3,
/// "Location", `to_fixed`/`from_fixed`).
pub const FIXED_POINT_SCALE: i32 = 10_000_000;

const SLOT_BYTES: u64 = 9;

/// A fixed-size mmap'd array of packed node locations, addressed directly
/// by node id (spec §4.4, "flat-node file").
pub struct FlatNodeFile {
    mmap: MmapMut,
    capacity: i64,
}

impl FlatNodeFile {
    /// Open (creating if necessary) a flat-node file sized for node ids in
    /// `0..capacity`.
    pub fn open(path: &Path, capacity: i64) -> Result<Self> {
        let size = (capacity as u64) * SLOT_BYTES;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)
            .map_err(|e| CoreError::BackendFailure(format!("opening flat node file: {e}")))?;
        file.set_len(size)
            .map_err(|e| CoreError::BackendFailure(format!("sizing flat node file: {e}")))?;

        let mmap = unsafe {
            MmapMut::map_mut(&file)
                .map_err(|e| CoreError::BackendFailure(format!("mmap flat node file: {e}")))?
        };

        Ok(FlatNodeFile { mmap, capacity })
    }

    fn slot_offset(&self, id: i64) -> Result<usize> {
        if id < 0 || id >= self.capacity {
            return Err(CoreError::ResourceExhausted {
                message: format!(
                    "node id {id} out of flat-node file range (capacity {})",
                    self.capacity
                ),
                fatal: true,
            });
        }
        Ok((id as u64 * SLOT_BYTES) as usize)
    }

    pub fn set(&mut self, id: i64, location: Location) -> Result<()> {
        let offset = self.slot_offset(id)?;
        let (x, y) = location.to_fixed(FIXED_POINT_SCALE);
        self.mmap[offset..offset + 4].copy_from_slice(&x.to_le_bytes());
        self.mmap[offset + 4..offset + 8].copy_from_slice(&y.to_le_bytes());
        self.mmap[offset + 8] = 1;
        Ok(())
    }

    pub fn get(&self, id: i64) -> Result<Option<Location>> {
        let offset = self.slot_offset(id)?;
        if self.mmap[offset + 8] == 0 {
            return Ok(None);
        }
        let x = i32::from_le_bytes(self.mmap[offset..offset + 4].try_into().unwrap());
        let y = i32::from_le_bytes(self.mmap[offset + 4..offset + 8].try_into().unwrap());
        Ok(Some(Location::from_fixed(x, y, FIXED_POINT_SCALE)))
    }

    pub fn delete(&mut self, id: i64) -> Result<()> {
        let offset = self.slot_offset(id)?;
        self.mmap[offset..offset + 9].fill(0);
        Ok(())
    }

    /// Flush pending writes to disk (spec §5: read-write during stage 1,
    /// read-only during stage 2 — callers flush at the stage boundary).
    pub fn flush(&self) -> Result<()> {
        self.mmap
            .flush()
            .map_err(|e| CoreError::BackendFailure(format!("flushing flat node file: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn roundtrips_a_location() {
        let tmp = NamedTempFile::new().unwrap();
        let mut f = FlatNodeFile::open(tmp.path(), 100).unwrap();
        f.set(42, Location::new(13.5, -7.25)).unwrap();
        let loc = f.get(42).unwrap().unwrap();
        assert!((loc.lon - 13.5).abs() < 1e-6);
        assert!((loc.lat - (-7.25)).abs() < 1e-6);
    }

    #[test]
    fn unset_slot_is_none() {
        let tmp = NamedTempFile::new().unwrap();
        let f = FlatNodeFile::open(tmp.path(), 100).unwrap();
        assert_eq!(f.get(7).unwrap(), None);
    }

    #[test]
    fn delete_clears_the_slot() {
        let tmp = NamedTempFile::new().unwrap();
        let mut f = FlatNodeFile::open(tmp.path(), 100).unwrap();
        f.set(1, Location::new(1.0, 1.0)).unwrap();
        f.delete(1).unwrap();
        assert_eq!(f.get(1).unwrap(), None);
    }

    #[test]
    fn out_of_range_id_is_resource_exhausted() {
        let tmp = NamedTempFile::new().unwrap();
        let f = FlatNodeFile::open(tmp.path(), 10).unwrap();
        let err = f.get(10).unwrap_err();
        assert!(matches!(err, CoreError::ResourceExhausted { fatal: true, .. }));
        assert!(err.is_fatal());
    }
}
