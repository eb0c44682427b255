//! Span-aware data stack shuffles.
//!
//! A simple cell occupies one cell; a compound value (a list) occupies
//! `slotCount + 1` cells with its header on top. Every shuffle moves whole
//! spans atomically: `swap` of a number and a three-element list relocates
//! all four cells of the list. Scratch buffers give every move memmove
//! semantics.

use crate::cell::Cell;
use crate::error::{VmError, VmResult};
use crate::memory::STACK_BASE;
use crate::vm::Vm;

impl Vm {
    /// Span (in cells) of the value whose top cell is at `top - 1`.
    pub(crate) fn span_below(&self, top: usize, word: &'static str) -> VmResult<usize> {
        if top <= STACK_BASE {
            return Err(VmError::StackUnderflow { word, depth: self.depth() });
        }
        let cell = self.data.read(top - 1)?;
        let span = if cell.is_list() { usize::from(cell.payload()) + 1 } else { 1 };
        if top - STACK_BASE < span {
            return Err(VmError::StackUnderflow { word, depth: self.depth() });
        }
        Ok(span)
    }

    /// Start index of the top span.
    pub(crate) fn top_span_start(&self, word: &'static str) -> VmResult<usize> {
        Ok(self.sp - self.span_below(self.sp, word)?)
    }

    /// Start indices of the top `n` spans, topmost first.
    pub(crate) fn span_starts(&self, n: usize, word: &'static str) -> VmResult<Vec<usize>> {
        let mut starts = Vec::with_capacity(n);
        let mut top = self.sp;
        for _ in 0..n {
            let span = self.span_below(top, word)?;
            top -= span;
            starts.push(top);
        }
        Ok(starts)
    }

    /// Pops the top span into a scratch buffer (payload order preserved).
    pub(crate) fn pop_span(&mut self, word: &'static str) -> VmResult<Vec<u32>> {
        let start = self.top_span_start(word)?;
        let cells = self.data.slice(start, self.sp - start)?.to_vec();
        self.sp = start;
        Ok(cells)
    }

    /// Removes the single cell directly below the span starting at `start`,
    /// shifting the span down. Used by words whose non-list operand sits
    /// under a stack-resident list.
    pub(crate) fn extract_under(&mut self, start: usize, word: &'static str) -> VmResult<Cell> {
        if start <= STACK_BASE {
            return Err(VmError::StackUnderflow { word, depth: self.depth() });
        }
        let cell = self.data.read(start - 1)?;
        self.data.copy_cells(start, start - 1, self.sp - start)?;
        self.sp -= 1;
        Ok(cell)
    }

    /// `dup (v -- v v)`
    pub(crate) fn dup(&mut self) -> VmResult<()> {
        let start = self.top_span_start("dup")?;
        let span = self.data.slice(start, self.sp - start)?.to_vec();
        self.push_raw_span(&span, "dup")
    }

    /// `drop (v -- )`
    pub(crate) fn drop_top(&mut self) -> VmResult<()> {
        self.sp = self.top_span_start("drop")?;
        Ok(())
    }

    /// `swap (a b -- b a)`
    pub(crate) fn swap(&mut self) -> VmResult<()> {
        let starts = self.span_starts(2, "swap")?;
        let b_start = starts[0];
        let a_start = starts[1];
        let b = self.data.slice(b_start, self.sp - b_start)?.to_vec();
        self.data.copy_cells(a_start, a_start + b.len(), b_start - a_start)?;
        self.data.write_span(a_start, &b)?;
        Ok(())
    }

    /// `over (a b -- a b a)`
    pub(crate) fn over(&mut self) -> VmResult<()> {
        let starts = self.span_starts(2, "over")?;
        let a = self.data.slice(starts[1], starts[0] - starts[1])?.to_vec();
        self.push_raw_span(&a, "over")
    }

    /// `nip (a b -- b)`
    pub(crate) fn nip(&mut self) -> VmResult<()> {
        let starts = self.span_starts(2, "nip")?;
        let b_start = starts[0];
        let a_start = starts[1];
        let b_len = self.sp - b_start;
        self.data.copy_cells(b_start, a_start, b_len)?;
        self.sp = a_start + b_len;
        Ok(())
    }

    /// `tuck (a b -- b a b)`
    pub(crate) fn tuck(&mut self) -> VmResult<()> {
        let starts = self.span_starts(2, "tuck")?;
        let b_start = starts[0];
        let a_start = starts[1];
        let b = self.data.slice(b_start, self.sp - b_start)?.to_vec();
        if self.sp + b.len() > crate::memory::STACK_LIMIT {
            return Err(VmError::StackOverflow { word: "tuck", depth: self.depth() });
        }
        self.data.copy_cells(a_start, a_start + b.len(), self.sp - a_start)?;
        self.data.write_span(a_start, &b)?;
        self.sp += b.len();
        Ok(())
    }

    /// `rot (a b c -- b c a)`
    pub(crate) fn rot(&mut self) -> VmResult<()> {
        let starts = self.span_starts(3, "rot")?;
        let a_start = starts[2];
        let a = self.data.slice(a_start, starts[1] - a_start)?.to_vec();
        self.data.copy_cells(starts[1], a_start, self.sp - starts[1])?;
        self.data.write_span(self.sp - a.len(), &a)?;
        Ok(())
    }

    /// `-rot (a b c -- c a b)`
    pub(crate) fn rot_down(&mut self) -> VmResult<()> {
        let starts = self.span_starts(3, "-rot")?;
        let c_start = starts[0];
        let a_start = starts[2];
        let c = self.data.slice(c_start, self.sp - c_start)?.to_vec();
        self.data.copy_cells(a_start, a_start + c.len(), c_start - a_start)?;
        self.data.write_span(a_start, &c)?;
        Ok(())
    }

    /// `pick (n -- spanN)` — copies the n-th span from the top (0 = dup).
    pub(crate) fn pick(&mut self) -> VmResult<()> {
        let n_cell = self.pop_cell("pick")?;
        let n = self.expect_index(n_cell, "pick")?;
        let starts = self.span_starts(n + 1, "pick")?;
        let start = starts[n];
        let end = if n == 0 { self.sp } else { starts[n - 1] };
        let span = self.data.slice(start, end - start)?.to_vec();
        self.push_raw_span(&span, "pick")
    }
}
