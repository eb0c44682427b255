//! Opcode definitions for the bytecode VM.
//!
//! Opcodes occupy the byte range 0..128. A fetched byte with the high bit set
//! is not an opcode at all: together with the following byte it encodes a
//! user-code call address (`((b0 & 0x7F) << 8) | b1`, always >= 128 since
//! emission starts past the reserved low page).
//!
//! # Operand encoding
//!
//! - most opcodes: no operand
//! - `LiteralNumber`: f32 as 4 little-endian bytes
//! - `LiteralString`, `LiteralCode`, `Call`, `Reserve`, `VarRef`, `InitVar`,
//!   `GlobalRef`, `InitGlobal`: u16 little-endian
//! - `Branch`, `IfFalseBranch`: i16 little-endian, relative to the byte just
//!   past the operand
//!
//! Opcodes from `BeginDef` up are compile-only: the parser executes them as
//! immediate words and never emits them; evaluating one at runtime is fatal.

use strum::FromRepr;

/// One-byte instruction opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
#[repr(u8)]
pub enum Op {
    // === Control ===
    /// Stop execution.
    Abort = 0,
    /// Push a number. Operand: f32 (4 bytes LE).
    LiteralNumber = 1,
    /// Push an interned string. Operand: u16 offset.
    LiteralString = 2,
    /// Push a CODE value without calling it. Operand: u16 address.
    LiteralCode = 3,
    /// Push NIL.
    Nil = 4,
    /// Unconditional jump. Operand: i16 offset.
    Branch = 5,
    /// Pop; jump if falsy. Operand: i16 offset.
    IfFalseBranch = 6,
    /// Call user code: push frame, jump. Operand: u16 address.
    Call = 7,
    /// Function epilogue: unwind frame, return to saved IP.
    Exit = 8,
    /// Pop a CODE value and invoke it (builtin or user call).
    Eval = 9,
    /// Pop into the `err` register (no-op if an error is already pending).
    SetErr = 10,
    /// Enter a finally cleanup region: set `inFinally`.
    SetInFinally = 11,

    // === Frames & variables ===
    /// Advance RSP to make room for locals. Operand: u16 count.
    Reserve = 12,
    /// Push DATA_REF(BP + slot). Operand: u16 slot.
    VarRef = 13,
    /// Pop and initialize a local slot (compounds move to the frame).
    /// Operand: u16 slot.
    InitVar = 14,
    /// Push DATA_REF(slot) for a global slot. Operand: u16 absolute cell.
    GlobalRef = 15,
    /// Pop and initialize a global slot (compounds go to the heap).
    /// Operand: u16 absolute cell.
    InitGlobal = 16,

    // === Memory ===
    /// (ref -- value) Read one cell; materialize a list header.
    Fetch = 17,
    /// (x -- v) Value-by-default dereference.
    Load = 18,
    /// (value ref -- ) Write through a reference under compatibility rules.
    Store = 19,
    /// (n ref -- ) Add into a numeric cell in place.
    PlusStore = 20,

    // === Lists ===
    /// Open a list under construction: park SP, bump list depth.
    OpenList = 21,
    /// Close the innermost list: push its header.
    CloseList = 22,

    // === Stack shuffles (span-aware) ===
    Dup = 23,
    Drop = 24,
    Swap = 25,
    Over = 26,
    Nip = 27,
    Tuck = 28,
    Rot = 29,
    /// `-rot`
    RotDown = 30,
    /// (n -- spanN) Copy the n-th span from the top.
    Pick = 31,
    /// ( -- n) Cell depth of the data stack.
    Depth = 32,

    // === Binary numeric (broadcasting) ===
    Add = 33,
    Sub = 34,
    Mul = 35,
    Div = 36,
    Mod = 37,
    Pow = 38,
    Eq = 39,
    Neq = 40,
    Lt = 41,
    Le = 42,
    Gt = 43,
    Ge = 44,
    And = 45,
    Or = 46,

    // === Unary numeric (broadcasting) ===
    Negate = 47,
    Abs = 48,
    Floor = 49,
    Ceil = 50,
    Round = 51,
    Not = 52,

    // === List queries & structure ===
    /// (list -- n) Raw payload slot count.
    Slots = 53,
    /// (list -- n) Logical element count.
    Length = 54,
    /// (i list -- addr|nil) Address of the i-th payload cell.
    Slot = 55,
    /// (i list -- addr|nil) Address of the i-th logical element.
    Elem = 56,
    /// (key maplist -- addr|nil) Value address for a key, `default` fallback.
    Find = 57,
    /// (maplist -- list) Even-position elements.
    Keys = 58,
    /// (maplist -- list) Odd-position elements.
    Values = 59,
    /// (list value -- list') O(1) prepend.
    Cons = 60,
    Concat = 61,
    /// (list -- elem|nil)
    Head = 62,
    /// (list -- list')
    Tail = 63,
    /// (list -- tail head)
    Uncons = 64,
    /// (list value -- list') Append at the logical end.
    Append = 65,
    Reverse = 66,
    /// (items.. n -- list)
    Pack = 67,
    /// (list -- items..)
    Unpack = 68,
    /// (target path -- v|nil) Walk keys and indices.
    Get = 69,
    /// (value target path -- ) Store at a walked address.
    Set = 70,

    // === Global heap ===
    /// ( -- snap) Park the dictionary head, push DATA_REF(GP).
    GMark = 71,
    /// (snap -- ) Restore GP and the dictionary head.
    GSweep = 72,
    /// (v -- ) Copy a span onto the heap.
    GPush = 73,
    /// ( -- v) Materialize the value at the top of the heap.
    GPeek = 74,
    /// ( -- v) GPeek, then rewind GP past it.
    GPop = 75,

    // === Ring buffers ===
    /// (n -- buf) Allocate a buffer list with n data slots.
    NewBuffer = 76,
    /// (value buf -- )
    BufWrite = 77,
    /// (buf -- value)
    BufRead = 78,
    /// (buf -- ) Undo the last write.
    BufUnwrite = 79,
    /// (buf -- flag)
    BufIsEmpty = 80,
    /// (buf -- flag)
    BufIsFull = 81,
    /// (buf -- n) Unread element count.
    BufSize = 82,

    // === Output ===
    /// (v -- ) Render one value to the host writer.
    Print = 83,

    // === Compile-only immediate words (never emitted) ===
    BeginDef = 96,
    Terminator = 97,
    IfImm = 98,
    ElseImm = 99,
    WhenImm = 100,
    DoImm = 101,
    CaseImm = 102,
    OfImm = 103,
    DefaultImm = 104,
    VarImm = 105,
    AssignImm = 106,
    IncAssignImm = 107,
    GlobalImm = 108,
    FinallyImm = 109,
    ListOpen = 110,
    ListClose = 111,
}

impl Op {
    /// True for opcodes the parser executes at compile time and never emits.
    #[must_use]
    pub fn is_compile_only(self) -> bool {
        (self as u8) >= Self::BeginDef as u8
    }

    /// The word name used in error messages.
    #[must_use]
    pub fn word(self) -> &'static str {
        match self {
            Self::Abort => "abort",
            Self::LiteralNumber | Self::LiteralString | Self::LiteralCode => "literal",
            Self::Nil => "nil",
            Self::Branch | Self::IfFalseBranch => "branch",
            Self::Call => "call",
            Self::Exit => "exit",
            Self::Eval => "eval",
            Self::SetErr => "set-err",
            Self::SetInFinally => "finally",
            Self::Reserve => "reserve",
            Self::VarRef | Self::InitVar => "var",
            Self::GlobalRef | Self::InitGlobal => "global",
            Self::Fetch => "fetch",
            Self::Load => "load",
            Self::Store => "store",
            Self::PlusStore => "+>",
            Self::OpenList => "(",
            Self::CloseList => ")",
            Self::Dup => "dup",
            Self::Drop => "drop",
            Self::Swap => "swap",
            Self::Over => "over",
            Self::Nip => "nip",
            Self::Tuck => "tuck",
            Self::Rot => "rot",
            Self::RotDown => "-rot",
            Self::Pick => "pick",
            Self::Depth => "depth",
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Div => "div",
            Self::Mod => "mod",
            Self::Pow => "pow",
            Self::Eq => "eq",
            Self::Neq => "neq",
            Self::Lt => "lt",
            Self::Le => "le",
            Self::Gt => "gt",
            Self::Ge => "ge",
            Self::And => "and",
            Self::Or => "or",
            Self::Negate => "negate",
            Self::Abs => "abs",
            Self::Floor => "floor",
            Self::Ceil => "ceil",
            Self::Round => "round",
            Self::Not => "not",
            Self::Slots => "slots",
            Self::Length => "length",
            Self::Slot => "slot",
            Self::Elem => "elem",
            Self::Find => "find",
            Self::Keys => "keys",
            Self::Values => "values",
            Self::Cons => "cons",
            Self::Concat => "concat",
            Self::Head => "head",
            Self::Tail => "tail",
            Self::Uncons => "uncons",
            Self::Append => "append",
            Self::Reverse => "reverse",
            Self::Pack => "pack",
            Self::Unpack => "unpack",
            Self::Get => "get",
            Self::Set => "set",
            Self::GMark => "gmark",
            Self::GSweep => "gsweep",
            Self::GPush => "gpush",
            Self::GPeek => "gpeek",
            Self::GPop => "gpop",
            Self::NewBuffer => "buffer",
            Self::BufWrite => "write",
            Self::BufRead => "read",
            Self::BufUnwrite => "unwrite",
            Self::BufIsEmpty => "is-empty",
            Self::BufIsFull => "is-full",
            Self::BufSize => "buf-size",
            Self::Print => "print",
            Self::BeginDef => ":",
            Self::Terminator => ";",
            Self::IfImm => "if",
            Self::ElseImm => "else",
            Self::WhenImm => "when",
            Self::DoImm => "do",
            Self::CaseImm => "case",
            Self::OfImm => "of",
            Self::DefaultImm => "DEFAULT",
            Self::VarImm => "var",
            Self::AssignImm => "->",
            Self::IncAssignImm => "+>",
            Self::GlobalImm => "global",
            Self::FinallyImm => "finally",
            Self::ListOpen => "(",
            Self::ListClose => ")",
        }
    }
}
