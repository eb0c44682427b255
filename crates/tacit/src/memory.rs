//! The data segment and its fixed address windows.
//!
//! One 64 KiB buffer viewed as 16384 cells hosts three non-overlapping
//! windows in a single absolute-cell address space: the data stack, the
//! return stack, and the global heap. References carry absolute cell indices
//! and their region is a *derived* property — classification happens at
//! resolution time by comparing the index against the window bounds, never
//! stored in the reference itself.
//!
//! Bounds are enforced on every access; an out-of-bounds index is a fatal
//! invariant violation, never `NIL`.

use crate::error::{VmError, VmResult};
use crate::cell::Cell;

/// Total cells in the data segment (64 KiB of 4-byte cells).
pub const DATA_CELLS: usize = 16384;

/// Data stack window: `[STACK_BASE, STACK_LIMIT)`.
pub const STACK_BASE: usize = 0;
pub const STACK_LIMIT: usize = 4096;

/// Return stack window: `[RSTACK_BASE, RSTACK_LIMIT)`.
pub const RSTACK_BASE: usize = 4096;
pub const RSTACK_LIMIT: usize = 8192;

/// Global heap window: `[HEAP_BASE, HEAP_LIMIT)`.
pub const HEAP_BASE: usize = 8192;
pub const HEAP_LIMIT: usize = DATA_CELLS;

/// Root-frame local slots reserved above `RSTACK_BASE` at startup. Function
/// frames size their slot area exactly via `Reserve`; the root frame has no
/// prologue, so top-level `var`s draw from this fixed window and compound
/// payloads land above it.
pub const ROOT_LOCAL_CELLS: usize = 256;

/// Size of the code segment in bytes.
pub const CODE_SIZE: usize = 65536;

/// First emittable code address. Bytes below 128 are never emitted so that a
/// `CODE` payload below 128 always denotes a builtin opcode.
pub const CODE_START: usize = 128;

/// Size of the string segment in bytes.
pub const STRING_SIZE: usize = 65536;

/// Which window an absolute cell index falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Stack,
    Rstack,
    Global,
}

impl Region {
    /// Classifies an absolute cell index.
    #[must_use]
    pub fn of(index: usize) -> Option<Self> {
        match index {
            STACK_BASE..STACK_LIMIT => Some(Self::Stack),
            RSTACK_BASE..RSTACK_LIMIT => Some(Self::Rstack),
            HEAP_BASE..HEAP_LIMIT => Some(Self::Global),
            _ => None,
        }
    }
}

/// The unified 64 KiB data segment, cell-addressed.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DataSegment {
    cells: Vec<u32>,
}

impl Default for DataSegment {
    fn default() -> Self {
        Self::new()
    }
}

impl DataSegment {
    #[must_use]
    pub fn new() -> Self {
        Self { cells: vec![0; DATA_CELLS] }
    }

    /// Reads the cell at an absolute index.
    #[inline]
    pub fn read(&self, index: usize) -> VmResult<Cell> {
        self.cells
            .get(index)
            .map(|&bits| Cell::from_bits(bits))
            .ok_or(VmError::SegmentBounds { segment: "data", index, limit: DATA_CELLS })
    }

    /// Writes the cell at an absolute index.
    #[inline]
    pub fn write(&mut self, index: usize, cell: Cell) -> VmResult<()> {
        match self.cells.get_mut(index) {
            Some(slot) => {
                *slot = cell.bits();
                Ok(())
            }
            None => Err(VmError::SegmentBounds { segment: "data", index, limit: DATA_CELLS }),
        }
    }

    /// Copies `count` cells from `src` to `dst` with memmove semantics.
    pub fn copy_cells(&mut self, src: usize, dst: usize, count: usize) -> VmResult<()> {
        let src_end = src.checked_add(count).filter(|&e| e <= DATA_CELLS);
        let dst_end = dst.checked_add(count).filter(|&e| e <= DATA_CELLS);
        if src_end.is_none() || dst_end.is_none() {
            let index = src.max(dst) + count;
            return Err(VmError::SegmentBounds { segment: "data", index, limit: DATA_CELLS });
        }
        self.cells.copy_within(src..src + count, dst);
        Ok(())
    }

    /// Borrow of a cell range, bounds-checked.
    pub fn slice(&self, start: usize, count: usize) -> VmResult<&[u32]> {
        let end = start
            .checked_add(count)
            .filter(|&e| e <= DATA_CELLS)
            .ok_or(VmError::SegmentBounds { segment: "data", index: start + count, limit: DATA_CELLS })?;
        Ok(&self.cells[start..end])
    }

    /// Writes a span of raw cells starting at `start`.
    pub fn write_span(&mut self, start: usize, cells: &[u32]) -> VmResult<()> {
        let end = start
            .checked_add(cells.len())
            .filter(|&e| e <= DATA_CELLS)
            .ok_or(VmError::SegmentBounds { segment: "data", index: start + cells.len(), limit: DATA_CELLS })?;
        self.cells[start..end].copy_from_slice(cells);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_windows_partition_the_segment() {
        assert_eq!(Region::of(0), Some(Region::Stack));
        assert_eq!(Region::of(STACK_LIMIT - 1), Some(Region::Stack));
        assert_eq!(Region::of(RSTACK_BASE), Some(Region::Rstack));
        assert_eq!(Region::of(HEAP_BASE), Some(Region::Global));
        assert_eq!(Region::of(HEAP_LIMIT - 1), Some(Region::Global));
        assert_eq!(Region::of(DATA_CELLS), None);
    }

    #[test]
    fn test_bounds_are_fatal() {
        let mut seg = DataSegment::new();
        assert!(seg.read(DATA_CELLS).is_err());
        assert!(seg.write(DATA_CELLS, Cell::ZERO).is_err());
        assert!(seg.copy_cells(DATA_CELLS - 1, 0, 2).is_err());
    }

    #[test]
    fn test_copy_cells_handles_overlap() {
        let mut seg = DataSegment::new();
        for i in 0..4 {
            seg.write(i, Cell::int(i as i32 + 1)).unwrap();
        }
        // Overlapping forward copy: [1,2,3,4] at 0 -> copied to 1.
        seg.copy_cells(0, 1, 4).unwrap();
        for (i, expect) in [1.0, 1.0, 2.0, 3.0, 4.0].into_iter().enumerate() {
            assert_eq!(seg.read(i).unwrap().as_number(), Some(expect));
        }
    }
}
