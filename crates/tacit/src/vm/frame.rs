//! Call-frame locals.
//!
//! Locals occupy contiguous cells above BP on the return stack. `Reserve`
//! (patched by the compiler with the final local count) makes room at entry;
//! `InitVar` fills a slot the first time, moving compound payloads into the
//! frame and leaving a reference in the slot. Top-level `var`s live in the
//! root frame, which has no `Reserve`; their slots are claimed on first
//! initialization instead.

use crate::cell::Cell;
use crate::error::{VmError, VmResult};
use crate::memory::RSTACK_LIMIT;
use crate::vm::Vm;

impl Vm {
    /// `Reserve count` — advance RSP past the frame's local slots.
    pub(crate) fn reserve(&mut self, count: u16) -> VmResult<()> {
        let new_rsp = self.rsp + usize::from(count);
        if new_rsp > RSTACK_LIMIT {
            return Err(VmError::ReturnStackOverflow { word: "reserve" });
        }
        for slot in self.rsp..new_rsp {
            self.data.write(slot, Cell::NIL)?;
        }
        self.rsp = new_rsp;
        Ok(())
    }

    /// `VarRef slot` — push the address of a local slot.
    pub(crate) fn var_ref(&mut self, slot: u16) -> VmResult<()> {
        let addr = self.bp + usize::from(slot);
        if addr >= RSTACK_LIMIT {
            return Err(VmError::SegmentBounds { segment: "data", index: addr, limit: RSTACK_LIMIT });
        }
        self.push_cell(Cell::data_ref(addr as u16), "var")
    }

    /// `InitVar slot` — pop the initializer into a local slot. A compound
    /// initializer is moved above RSP and the slot holds a reference to its
    /// header.
    pub(crate) fn init_var(&mut self, slot: u16) -> VmResult<()> {
        let addr = self.bp + usize::from(slot);
        if addr >= self.rsp {
            return Err(VmError::SegmentBounds { segment: "data", index: addr, limit: self.rsp });
        }
        let span = self.pop_span("var")?;
        if span.len() == 1 {
            self.data.write(addr, Cell::from_bits(span[0]))
        } else {
            let payload_at = self.rsp;
            if payload_at + span.len() > RSTACK_LIMIT {
                return Err(VmError::ReturnStackOverflow { word: "var" });
            }
            self.data.write_span(payload_at, &span)?;
            self.rsp = payload_at + span.len();
            self.data.write(addr, Cell::data_ref((self.rsp - 1) as u16))
        }
    }

    /// `PlusStore (n ref -- )` — add into a numeric cell in place.
    pub(crate) fn plus_store(&mut self) -> VmResult<()> {
        let reference = self.pop_cell("+>")?;
        if !reference.is_ref() {
            return Err(VmError::TypeMismatch {
                word: "+>",
                expected: "a reference destination",
                found: self.describe(reference),
            });
        }
        let dest = self.ref_target(reference)?;
        let current = self.data.read(dest)?;
        let increment = self.pop_cell("+>")?;
        match (current.as_number(), increment.as_number()) {
            (Some(a), Some(b)) => self.data.write(dest, Cell::number(a + b)),
            _ => Err(VmError::TypeMismatch {
                word: "+>",
                expected: "numeric slot and increment",
                found: self.describe(if current.is_number() { increment } else { current }),
            }),
        }
    }
}
