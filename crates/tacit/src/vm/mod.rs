//! VM state and the interpreter loop.
//!
//! The VM owns every segment and register: the unified data segment (data
//! stack, return stack, global heap), the code segment, the string digest,
//! and the registers `IP`, `SP`, `RSP`, `BP`, `GP`, `err`, `inFinally`,
//! `listDepth`, plus the dictionary head and the compiler record.
//!
//! Execution is a plain fetch-decode-execute loop over the code segment.
//! Opcode bytes below 128 dispatch to builtin handlers; a byte with the high
//! bit set starts a two-byte user-code call. Every opcode completes fully
//! before the next begins; the only unwinding mechanism is the synchronous
//! `err`/`inFinally` protocol checked at each fetch.

mod buffer;
mod frame;
mod heap;
mod list;
mod math;
mod print;
mod stack;

use crate::bytecode::{CodeSegment, Op};
use crate::builtins;
use crate::cell::Cell;
use crate::compiler::Compiler;
use crate::digest::Digest;
use crate::error::{VmError, VmResult};
use crate::io::PrintWriter;
use crate::memory::{DataSegment, HEAP_BASE, ROOT_LOCAL_CELLS, RSTACK_BASE, RSTACK_LIMIT, STACK_BASE};

/// The virtual machine.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Vm {
    pub(crate) data: DataSegment,
    pub(crate) code: CodeSegment,
    pub(crate) digest: Digest,

    /// Instruction pointer: byte address in the code segment.
    pub(crate) ip: usize,
    /// Data stack pointer: absolute index of the first free cell.
    pub(crate) sp: usize,
    /// Return stack pointer: absolute index of the first free cell.
    pub(crate) rsp: usize,
    /// Base pointer of the current frame.
    pub(crate) bp: usize,
    /// Global heap pointer: absolute index of the next free heap cell.
    pub(crate) gp: usize,

    /// Pending user-level error; zero bits mean none.
    pub(crate) err: Cell,
    pub(crate) in_finally: bool,
    /// Runtime nesting depth of open `(` list constructions.
    pub(crate) list_depth: u16,

    /// Most recent dictionary entry, or NIL.
    pub(crate) dict_head: Cell,
    pub(crate) compiler: Compiler,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    /// Creates a VM with all builtins registered in the dictionary.
    #[must_use]
    pub fn new() -> Self {
        let mut vm = Self {
            data: DataSegment::new(),
            code: CodeSegment::new(),
            digest: Digest::new(),
            ip: 0,
            sp: STACK_BASE,
            rsp: RSTACK_BASE + ROOT_LOCAL_CELLS,
            bp: RSTACK_BASE,
            gp: HEAP_BASE,
            err: Cell::ZERO,
            in_finally: false,
            list_depth: 0,
            dict_head: Cell::NIL,
            compiler: Compiler::default(),
        };
        for slot in RSTACK_BASE..RSTACK_BASE + ROOT_LOCAL_CELLS {
            vm.data.write(slot, Cell::NIL).expect("root local window is in bounds");
        }
        builtins::register(&mut vm).expect("builtin registration cannot overflow a fresh heap");
        vm
    }

    // === Data stack primitives ===

    /// Cell depth of the data stack.
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.sp - STACK_BASE
    }

    #[inline]
    pub(crate) fn push_cell(&mut self, cell: Cell, word: &'static str) -> VmResult<()> {
        if self.sp >= crate::memory::STACK_LIMIT {
            return Err(VmError::StackOverflow { word, depth: self.depth() });
        }
        self.data.write(self.sp, cell)?;
        self.sp += 1;
        Ok(())
    }

    #[inline]
    pub(crate) fn pop_cell(&mut self, word: &'static str) -> VmResult<Cell> {
        if self.sp <= STACK_BASE {
            return Err(VmError::StackUnderflow { word, depth: 0 });
        }
        self.sp -= 1;
        self.data.read(self.sp)
    }

    #[inline]
    pub(crate) fn peek_cell(&self, word: &'static str) -> VmResult<Cell> {
        if self.sp <= STACK_BASE {
            return Err(VmError::StackUnderflow { word, depth: 0 });
        }
        self.data.read(self.sp - 1)
    }

    /// Pushes a raw span (payload order preserved).
    pub(crate) fn push_raw_span(&mut self, cells: &[u32], word: &'static str) -> VmResult<()> {
        if self.sp + cells.len() > crate::memory::STACK_LIMIT {
            return Err(VmError::StackOverflow { word, depth: self.depth() });
        }
        self.data.write_span(self.sp, cells)?;
        self.sp += cells.len();
        Ok(())
    }

    // === Return stack primitives ===

    #[inline]
    pub(crate) fn rpush(&mut self, cell: Cell, word: &'static str) -> VmResult<()> {
        if self.rsp >= RSTACK_LIMIT {
            return Err(VmError::ReturnStackOverflow { word });
        }
        self.data.write(self.rsp, cell)?;
        self.rsp += 1;
        Ok(())
    }

    #[inline]
    pub(crate) fn rpop(&mut self, word: &'static str) -> VmResult<Cell> {
        if self.rsp <= RSTACK_BASE {
            return Err(VmError::ReturnStackUnderflow { word });
        }
        self.rsp -= 1;
        self.data.read(self.rsp)
    }

    /// Reads a cell as a small non-negative integer (addresses, counts).
    pub(crate) fn expect_index(&self, cell: Cell, word: &'static str) -> VmResult<usize> {
        match cell.as_number() {
            Some(n) if n >= 0.0 && n.fract() == 0.0 => Ok(n as usize),
            _ => Err(VmError::TypeMismatch {
                word,
                expected: "a non-negative integer",
                found: self.describe(cell),
            }),
        }
    }

    /// Short human description of a cell, for error messages.
    #[must_use]
    pub(crate) fn describe(&self, cell: Cell) -> String {
        match cell.as_number() {
            Some(n) => format!("number {n}"),
            None => format!("{}", cell.tag()),
        }
    }

    // === Interpreter loop ===

    /// Runs from `start` until `Abort` or a fatal error.
    pub fn execute<P: PrintWriter>(&mut self, start: usize, print: &mut P) -> VmResult<()> {
        self.ip = start;
        loop {
            // err/inFinally unwinding: with an error pending and no cleanup
            // running, either the next instruction is a wrapper entering its
            // cleanup (execute it) or one frame unwinds per fetch.
            if self.err.bits() != 0 && !self.in_finally {
                let next = self.code.byte(self.ip)?;
                if next != Op::SetInFinally as u8 {
                    if self.bp <= RSTACK_BASE {
                        let rendered = self.render_cell(self.err);
                        self.err = Cell::ZERO;
                        return Err(VmError::Uncaught { err: rendered });
                    }
                    self.unwind_frame()?;
                    continue;
                }
            }

            let byte = self.code.byte(self.ip)?;
            self.ip += 1;

            if byte & 0x80 != 0 {
                let lo = self.code.byte(self.ip)?;
                self.ip += 1;
                let addr = (usize::from(byte & 0x7F) << 8) | usize::from(lo);
                self.call(addr)?;
                continue;
            }

            let op = Op::from_repr(byte).ok_or(VmError::InvalidOpcode { byte, ip: self.ip - 1 })?;
            if self.run_op(op, print)? {
                return Ok(());
            }
        }
    }

    /// Executes one builtin opcode. Returns `true` on `Abort`.
    pub(crate) fn run_op<P: PrintWriter>(&mut self, op: Op, print: &mut P) -> VmResult<bool> {
        if op.is_compile_only() {
            return Err(VmError::CompileOnlyWord { word: op.word() });
        }
        match op {
            Op::Abort => return Ok(true),

            Op::LiteralNumber => {
                let value = self.code.read_f32(self.ip)?;
                self.ip += 4;
                self.push_cell(Cell::number(value), "literal")?;
            }
            Op::LiteralString => {
                let offset = self.code.read_u16(self.ip)?;
                self.ip += 2;
                self.push_cell(Cell::string(offset), "literal")?;
            }
            Op::LiteralCode => {
                let addr = self.code.read_u16(self.ip)?;
                self.ip += 2;
                self.push_cell(Cell::code(addr, false), "literal")?;
            }
            Op::Nil => self.push_cell(Cell::NIL, "nil")?,

            Op::Branch => {
                let offset = self.code.read_i16(self.ip)?;
                self.ip = self.branch_target(offset);
            }
            Op::IfFalseBranch => {
                let offset = self.code.read_i16(self.ip)?;
                let target = self.branch_target(offset);
                self.ip += 2;
                let cond = self.pop_cell("if")?;
                if !cond.is_truthy() {
                    self.ip = target;
                }
            }
            Op::Call => {
                let addr = self.code.read_u16(self.ip)?;
                self.ip += 2;
                self.call(usize::from(addr))?;
            }
            Op::Exit => self.exit()?,
            Op::Eval => self.eval(print)?,
            Op::SetErr => self.set_err()?,
            Op::SetInFinally => self.in_finally = true,

            Op::Reserve => {
                let count = self.code.read_u16(self.ip)?;
                self.ip += 2;
                self.reserve(count)?;
            }
            Op::VarRef => {
                let slot = self.code.read_u16(self.ip)?;
                self.ip += 2;
                self.var_ref(slot)?;
            }
            Op::InitVar => {
                let slot = self.code.read_u16(self.ip)?;
                self.ip += 2;
                self.init_var(slot)?;
            }
            Op::GlobalRef => {
                let slot = self.code.read_u16(self.ip)?;
                self.ip += 2;
                self.push_cell(Cell::data_ref(slot), "global")?;
            }
            Op::InitGlobal => {
                let slot = self.code.read_u16(self.ip)?;
                self.ip += 2;
                self.init_global(slot)?;
            }

            Op::Fetch => self.fetch()?,
            Op::Load => self.load()?,
            Op::Store => self.store()?,
            Op::PlusStore => self.plus_store()?,

            Op::OpenList => self.open_list()?,
            Op::CloseList => self.close_list()?,

            Op::Dup => self.dup()?,
            Op::Drop => self.drop_top()?,
            Op::Swap => self.swap()?,
            Op::Over => self.over()?,
            Op::Nip => self.nip()?,
            Op::Tuck => self.tuck()?,
            Op::Rot => self.rot()?,
            Op::RotDown => self.rot_down()?,
            Op::Pick => self.pick()?,
            Op::Depth => {
                let depth = self.depth();
                self.push_cell(Cell::int(depth as i32), "depth")?;
            }

            Op::Add
            | Op::Sub
            | Op::Mul
            | Op::Div
            | Op::Mod
            | Op::Pow
            | Op::Eq
            | Op::Neq
            | Op::Lt
            | Op::Le
            | Op::Gt
            | Op::Ge
            | Op::And
            | Op::Or => self.binary_op(op)?,
            Op::Negate | Op::Abs | Op::Floor | Op::Ceil | Op::Round | Op::Not => self.unary_op(op)?,

            Op::Slots => self.slots()?,
            Op::Length => self.length()?,
            Op::Slot => self.slot()?,
            Op::Elem => self.elem()?,
            Op::Find => self.find()?,
            Op::Keys => self.keys()?,
            Op::Values => self.values()?,
            Op::Cons => self.cons()?,
            Op::Concat => self.concat()?,
            Op::Head => self.head()?,
            Op::Tail => self.tail()?,
            Op::Uncons => self.uncons()?,
            Op::Append => self.append()?,
            Op::Reverse => self.reverse()?,
            Op::Pack => self.pack()?,
            Op::Unpack => self.unpack()?,
            Op::Get => self.get()?,
            Op::Set => self.set()?,

            Op::GMark => self.gmark()?,
            Op::GSweep => self.gsweep()?,
            Op::GPush => self.gpush()?,
            Op::GPeek => self.gpeek()?,
            Op::GPop => self.gpop()?,

            Op::NewBuffer => self.new_buffer()?,
            Op::BufWrite => self.buf_write()?,
            Op::BufRead => self.buf_read()?,
            Op::BufUnwrite => self.buf_unwrite()?,
            Op::BufIsEmpty => self.buf_is_empty()?,
            Op::BufIsFull => self.buf_is_full()?,
            Op::BufSize => self.buf_size()?,

            Op::Print => self.print_top(print)?,

            _ => unreachable!("compile-only opcodes rejected above"),
        }
        Ok(false)
    }

    #[inline]
    fn branch_target(&self, offset: i16) -> usize {
        // Offsets are relative to the byte just past the i16 operand.
        let past = self.ip as i64 + 2;
        (past + i64::from(offset)) as usize
    }

    // === Frames ===

    /// Calls user code: saves the return IP and BP, opens a new frame.
    pub(crate) fn call(&mut self, addr: usize) -> VmResult<()> {
        self.rpush(Cell::int(self.ip as i32), "call")?;
        self.rpush(Cell::int(self.bp as i32), "call")?;
        self.bp = self.rsp;
        self.ip = addr;
        Ok(())
    }

    /// Function epilogue: restores RSP, BP and IP, clears `inFinally`.
    fn exit(&mut self) -> VmResult<()> {
        if self.bp < RSTACK_BASE + 2 || self.bp > self.rsp {
            return Err(VmError::FrameCorruption { saved: self.bp as u32, rsp: self.rsp });
        }
        self.rsp = self.bp;
        let saved_bp = self.rpop("exit")?;
        let saved_ip = self.rpop("exit")?;
        let bp = match saved_bp.as_number() {
            Some(n) if n >= 0.0 && n.fract() == 0.0 && (n as usize) <= self.rsp => n as usize,
            _ => return Err(VmError::FrameCorruption { saved: saved_bp.bits(), rsp: self.rsp }),
        };
        let ip = match saved_ip.as_number() {
            Some(n) if n >= 0.0 && n.fract() == 0.0 => n as usize,
            _ => return Err(VmError::FrameCorruption { saved: saved_ip.bits(), rsp: self.rsp }),
        };
        self.bp = bp;
        self.ip = ip;
        self.in_finally = false;
        Ok(())
    }

    /// Unwinds one frame during error propagation (an `Exit` without the
    /// next instruction getting a say).
    fn unwind_frame(&mut self) -> VmResult<()> {
        self.exit()
    }

    /// `Eval`: invoke a CODE value, builtin or user.
    fn eval<P: PrintWriter>(&mut self, print: &mut P) -> VmResult<()> {
        let cell = self.pop_cell("eval")?;
        if cell.tag() != crate::cell::Tag::Code {
            return Err(VmError::TypeMismatch {
                word: "eval",
                expected: "a code value",
                found: self.describe(cell),
            });
        }
        let addr = usize::from(cell.payload());
        if addr < 128 {
            let op = Op::from_repr(addr as u8).ok_or(VmError::InvalidOpcode { byte: addr as u8, ip: self.ip })?;
            self.run_op(op, print)?;
            Ok(())
        } else {
            self.call(addr)
        }
    }

    /// `SetErr`: pop into `err`. A pending error is never overwritten; a
    /// `SetErr` raised during cleanup instead leaves the cleanup region so
    /// the original error resumes unwinding.
    fn set_err(&mut self) -> VmResult<()> {
        let value = self.pop_cell("set-err")?;
        if self.err.bits() == 0 {
            self.err = value;
        } else if self.in_finally {
            self.in_finally = false;
        }
        Ok(())
    }
}
