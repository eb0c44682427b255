//! Ring buffers over the list allocation primitive.
//!
//! `N buffer` allocates an ordinary `LIST(N+2)` whose payload is
//! `[readPtr, writePtr, data0 .. dataN-1]` — allocate a list, then treat the
//! payload as raw memory. The pointers are monotonically incremented
//! counters; the physical slot is `ptr mod N`. Operations work directly on a
//! stack-resident header or through any reference to the buffer header,
//! which is how a buffer parked in a `var` keeps its state across words.

use crate::cell::Cell;
use crate::error::{VmError, VmResult};
use crate::vm::Vm;

/// A resolved buffer operand.
struct Buffer {
    /// Absolute address of the header cell.
    header: usize,
    /// Data capacity (slot count minus the two pointers).
    capacity: usize,
    /// Span start when the buffer itself sits on the stack.
    on_stack: Option<usize>,
}

impl Vm {
    /// `buffer (n -- buf)` — allocate and zero-initialize.
    pub(crate) fn new_buffer(&mut self) -> VmResult<()> {
        let n_cell = self.pop_cell("buffer")?;
        let n = self.expect_index(n_cell, "buffer")?;
        let slots = u16::try_from(n + 2)
            .map_err(|_| VmError::StackOverflow { word: "buffer", depth: self.depth() })?;
        for _ in 0..n + 2 {
            self.push_cell(Cell::number(0.0), "buffer")?;
        }
        self.push_cell(Cell::list(slots), "buffer")
    }

    fn resolve_buffer(&mut self, word: &'static str) -> VmResult<Buffer> {
        let top = self.peek_cell(word)?;
        let (header, on_stack) = if top.is_ref() {
            let reference = self.pop_cell(word)?;
            (self.ref_target(reference)?, None)
        } else if top.is_list() {
            let header = self.sp - 1;
            if header < usize::from(top.payload()) {
                return Err(VmError::StackUnderflow { word, depth: self.depth() });
            }
            (header, Some(header - usize::from(top.payload())))
        } else {
            return Err(VmError::TypeMismatch { word, expected: "a buffer", found: self.describe(top) });
        };
        let cell = self.data.read(header)?;
        if !cell.is_list() || cell.payload() < 2 {
            return Err(VmError::TypeMismatch { word, expected: "a buffer", found: self.describe(cell) });
        }
        Ok(Buffer {
            header,
            capacity: usize::from(cell.payload()) - 2,
            on_stack,
        })
    }

    fn pointers(&self, buf: &Buffer, word: &'static str) -> VmResult<(usize, usize, usize)> {
        let base = buf.header - buf.capacity - 2;
        let read = self.expect_index(self.data.read(base)?, word)?;
        let write = self.expect_index(self.data.read(base + 1)?, word)?;
        Ok((base, read, write))
    }

    /// Discards a stack-resident buffer operand once the operation is done.
    fn finish(&mut self, buf: &Buffer) {
        if let Some(start) = buf.on_stack {
            self.sp = start;
        }
    }

    /// `write (value buf -- )`
    pub(crate) fn buf_write(&mut self) -> VmResult<()> {
        let buf = self.resolve_buffer("write")?;
        let value = match buf.on_stack {
            Some(start) => self.extract_under(start, "write")?,
            None => self.pop_cell("write")?,
        };
        if value.is_list() {
            return Err(VmError::TypeMismatch {
                word: "write",
                expected: "a simple value",
                found: self.describe(value),
            });
        }
        // The extraction shifted a stack-resident span down one cell.
        let buf = match buf.on_stack {
            Some(start) => Buffer { header: buf.header - 1, on_stack: Some(start - 1), ..buf },
            None => buf,
        };
        let (base, read, write) = self.pointers(&buf, "write")?;
        if buf.capacity == 0 || write - read == buf.capacity {
            return Err(VmError::BufferFull { capacity: buf.capacity });
        }
        self.data.write(base + 2 + (write % buf.capacity), value)?;
        self.data.write(base + 1, Cell::int((write + 1) as i32))?;
        self.finish(&buf);
        Ok(())
    }

    /// `read (buf -- value)`
    pub(crate) fn buf_read(&mut self) -> VmResult<()> {
        let buf = self.resolve_buffer("read")?;
        let (base, read, write) = self.pointers(&buf, "read")?;
        if write == read {
            return Err(VmError::BufferEmpty);
        }
        let value = self.data.read(base + 2 + (read % buf.capacity))?;
        self.data.write(base, Cell::int((read + 1) as i32))?;
        self.finish(&buf);
        self.push_cell(value, "read")
    }

    /// `unwrite (buf -- )` — undo the most recent write.
    pub(crate) fn buf_unwrite(&mut self) -> VmResult<()> {
        let buf = self.resolve_buffer("unwrite")?;
        let (base, read, write) = self.pointers(&buf, "unwrite")?;
        if write == read {
            return Err(VmError::BufferEmpty);
        }
        self.data.write(base + 1, Cell::int((write - 1) as i32))?;
        self.finish(&buf);
        Ok(())
    }

    /// `is-empty (buf -- flag)`
    pub(crate) fn buf_is_empty(&mut self) -> VmResult<()> {
        let buf = self.resolve_buffer("is-empty")?;
        let (_, read, write) = self.pointers(&buf, "is-empty")?;
        self.finish(&buf);
        self.push_cell(Cell::int(i32::from(write == read)), "is-empty")
    }

    /// `is-full (buf -- flag)`
    pub(crate) fn buf_is_full(&mut self) -> VmResult<()> {
        let buf = self.resolve_buffer("is-full")?;
        let (_, read, write) = self.pointers(&buf, "is-full")?;
        let full = write - read == buf.capacity;
        self.finish(&buf);
        self.push_cell(Cell::int(i32::from(full)), "is-full")
    }

    /// `buf-size (buf -- n)` — unread element count.
    pub(crate) fn buf_size(&mut self) -> VmResult<()> {
        let buf = self.resolve_buffer("buf-size")?;
        let (_, read, write) = self.pointers(&buf, "buf-size")?;
        self.finish(&buf);
        self.push_cell(Cell::int((write - read) as i32), "buf-size")
    }
}
