//! The global heap: bump allocation, checkpointing, and global variables.
//!
//! The heap grows monotonically between checkpoints. `gmark` parks the
//! current dictionary head in the heap cell at GP and hands back
//! `DATA_REF(GP)` — one cell that `gsweep` uses to restore both GP and the
//! dictionary head, which is how the dictionary and the heap share a
//! checkpoint. Anything allocated past a swept mark is gone; references into
//! that region dangle and are the caller's responsibility.

use crate::cell::Cell;
use crate::error::{VmError, VmResult};
use crate::memory::{HEAP_BASE, HEAP_LIMIT, Region};
use crate::vm::Vm;

impl Vm {
    /// Copies a raw span onto the heap, returning the address of its top
    /// cell (the header, for a compound).
    pub(crate) fn heap_alloc(&mut self, span: &[u32]) -> VmResult<usize> {
        if self.gp + span.len() > HEAP_LIMIT {
            return Err(VmError::HeapOverflow { gp: self.gp });
        }
        self.data.write_span(self.gp, span)?;
        self.gp += span.len();
        Ok(self.gp - 1)
    }

    /// Parks the dictionary head at GP and returns the snapshot address.
    /// Shared by `gmark` and the compiler's dictionary mark.
    pub(crate) fn heap_mark(&mut self) -> VmResult<usize> {
        let snap = self.gp;
        if snap >= HEAP_LIMIT {
            return Err(VmError::HeapOverflow { gp: snap });
        }
        self.data.write(snap, self.dict_head)?;
        self.gp += 1;
        Ok(snap)
    }

    /// Restores GP and the dictionary head from a snapshot address.
    pub(crate) fn heap_restore(&mut self, snap: usize) -> VmResult<()> {
        if Region::of(snap) != Some(Region::Global) || snap > self.gp {
            return Err(VmError::SegmentBounds { segment: "heap", index: snap, limit: self.gp });
        }
        self.dict_head = self.data.read(snap)?;
        self.gp = snap;
        Ok(())
    }

    /// `gmark ( -- snap)`
    pub(crate) fn gmark(&mut self) -> VmResult<()> {
        let snap = self.heap_mark()?;
        self.push_cell(Cell::data_ref(snap as u16), "gmark")
    }

    /// `gsweep (snap -- )`
    pub(crate) fn gsweep(&mut self) -> VmResult<()> {
        let snap = self.pop_cell("gsweep")?;
        if !snap.is_ref() {
            return Err(VmError::TypeMismatch {
                word: "gsweep",
                expected: "a heap snapshot",
                found: self.describe(snap),
            });
        }
        self.heap_restore(usize::from(snap.payload()))
    }

    /// `gpush (v -- )` — copy a span from the data stack into the heap.
    pub(crate) fn gpush(&mut self) -> VmResult<()> {
        let span = self.pop_span("gpush")?;
        self.heap_alloc(&span)?;
        Ok(())
    }

    /// `gpeek ( -- v)` — materialize the topmost heap value.
    pub(crate) fn gpeek(&mut self) -> VmResult<()> {
        let top = self.heap_top()?;
        self.materialize_or_push(top, "gpeek")
    }

    /// `gpop ( -- v)` — gpeek, then rewind GP past the value.
    pub(crate) fn gpop(&mut self) -> VmResult<()> {
        let top = self.heap_top()?;
        let cell = self.data.read(top)?;
        let span = if cell.is_list() { usize::from(cell.payload()) + 1 } else { 1 };
        self.materialize_or_push(top, "gpop")?;
        self.gp -= span;
        Ok(())
    }

    fn heap_top(&self) -> VmResult<usize> {
        if self.gp <= HEAP_BASE {
            return Err(VmError::SegmentBounds { segment: "heap", index: self.gp, limit: HEAP_BASE });
        }
        Ok(self.gp - 1)
    }

    fn materialize_or_push(&mut self, addr: usize, word: &'static str) -> VmResult<()> {
        let cell = self.data.read(addr)?;
        if cell.is_list() {
            self.materialize(addr, word)
        } else {
            self.push_cell(cell, word)
        }
    }

    /// `InitGlobal slot` — pop the initializer into a global slot. A simple
    /// value is stored inline; a compound is copied onto the heap and the
    /// slot holds a reference to its header.
    pub(crate) fn init_global(&mut self, slot: u16) -> VmResult<()> {
        let addr = usize::from(slot);
        if Region::of(addr) != Some(Region::Global) {
            return Err(VmError::SegmentBounds { segment: "heap", index: addr, limit: HEAP_LIMIT });
        }
        let span = self.pop_span("global")?;
        if span.len() == 1 {
            self.data.write(addr, Cell::from_bits(span[0]))
        } else {
            let header = self.heap_alloc(&span)?;
            self.data.write(addr, Cell::data_ref(header as u16))
        }
    }
}
