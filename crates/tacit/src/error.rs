//! Error types for parsing and execution.
//!
//! Three layers, mirroring the propagation policy: [`ParseError`] aborts the
//! current submission and rolls the dictionary back to the pre-submission
//! mark; [`VmError`] is a fatal runtime or invariant violation that halts the
//! VM with a descriptive message; [`TacitError`] is the submission-level sum
//! the public API returns. Soft failures (missing key, out-of-range element)
//! are not errors at all: they push `NIL`.

use std::fmt;

/// Fatal runtime errors and invariant violations.
///
/// Every variant that can fire mid-execution carries the data/return stack
/// depths at raise time so the message doubles as a minimal core dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    /// Data stack has fewer cells than the operation's spans require.
    StackUnderflow { word: &'static str, depth: usize },
    /// Data stack window is exhausted.
    StackOverflow { word: &'static str, depth: usize },
    /// Return stack window is exhausted or empty.
    ReturnStackUnderflow { word: &'static str },
    ReturnStackOverflow { word: &'static str },
    /// A read or write fell outside a segment's bounds.
    SegmentBounds { segment: &'static str, index: usize, limit: usize },
    /// The saved BP cell found on epilogue is not a plausible frame base.
    FrameCorruption { saved: u32, rsp: usize },
    /// An operation received a cell of the wrong kind.
    TypeMismatch { word: &'static str, expected: &'static str, found: String },
    /// `fetch` requires a reference operand.
    FetchExpectsRef { found: String },
    /// `store` with a simple/compound mismatch or incompatible compounds.
    StoreIncompatible { reason: &'static str },
    /// Numeric operation over structurally incompatible operands.
    BroadcastMismatch { word: &'static str, found: String },
    /// Ring buffer capacity exhausted.
    BufferFull { capacity: usize },
    /// Ring buffer has no unread element.
    BufferEmpty,
    /// The code segment has no room for further emission.
    CodeSegmentFull,
    /// The string segment has no room for another interned string.
    StringSegmentFull,
    /// The global heap window is exhausted.
    HeapOverflow { gp: usize },
    /// A compile-only word was evaluated at runtime.
    CompileOnlyWord { word: &'static str },
    /// An undecodable opcode byte was fetched.
    InvalidOpcode { byte: u8, ip: usize },
    /// Unwinding emptied the return stack with `err` still set.
    Uncaught { err: String },
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StackUnderflow { word, depth } => {
                write!(f, "stack underflow in `{word}` (depth {depth})")
            }
            Self::StackOverflow { word, depth } => {
                write!(f, "stack overflow in `{word}` (depth {depth})")
            }
            Self::ReturnStackUnderflow { word } => write!(f, "return stack underflow in `{word}`"),
            Self::ReturnStackOverflow { word } => write!(f, "return stack overflow in `{word}`"),
            Self::SegmentBounds { segment, index, limit } => {
                write!(f, "{segment} segment access out of bounds: {index} >= {limit}")
            }
            Self::FrameCorruption { saved, rsp } => {
                write!(f, "corrupt frame: saved BP {saved:#x} with RSP {rsp}")
            }
            Self::TypeMismatch { word, expected, found } => {
                write!(f, "`{word}` expects {expected}, got {found}")
            }
            Self::FetchExpectsRef { found } => write!(f, "fetch expects reference, got {found}"),
            Self::StoreIncompatible { reason } => write!(f, "store: {reason}"),
            Self::BroadcastMismatch { word, found } => {
                write!(f, "broadcast type mismatch in `{word}`: {found}")
            }
            Self::BufferFull { capacity } => write!(f, "buffer full (capacity {capacity})"),
            Self::BufferEmpty => write!(f, "buffer empty"),
            Self::CodeSegmentFull => write!(f, "code segment full"),
            Self::StringSegmentFull => write!(f, "string segment full"),
            Self::HeapOverflow { gp } => write!(f, "global heap exhausted (GP {gp})"),
            Self::CompileOnlyWord { word } => write!(f, "`{word}` is compile-only"),
            Self::InvalidOpcode { byte, ip } => write!(f, "invalid opcode {byte:#04x} at {ip}"),
            Self::Uncaught { err } => write!(f, "uncaught error: {err}"),
        }
    }
}

impl std::error::Error for VmError {}

pub type VmResult<T> = Result<T, VmError>;

/// Compile-time errors.
///
/// Every variant names the construct; where a token is involved the token
/// text and its byte position in the submission are carried along.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    UnknownWord { word: String, position: usize },
    /// A `;` with no closer on the compile stack, or a non-closer on top.
    UnexpectedTerminator { position: usize },
    /// Opener left unclosed at end of input.
    Unclosed { construct: &'static str },
    /// `:` while a definition is already open.
    NestedDefinition { position: usize },
    /// A name was required (after `:`, `var`, `->`, `+>`, `global`).
    ExpectedName { after: &'static str, position: usize },
    /// `else` / `do` / `of` / `DEFAULT` found without its opener on top.
    MisplacedWord { word: &'static str, position: usize },
    DuplicateDefault { position: usize },
    /// Locals machinery used where no frame exists to host it.
    LocalOutsideDefinition { word: String, position: usize },
    /// Body locals referenced from a `finally` cleanup region.
    LocalInCleanup { word: String, position: usize },
    /// A top-level local referenced inside a definition body (its slot
    /// belongs to the root frame, not the function's).
    RootLocalInDefinition { word: String, position: usize },
    /// `global` inside a definition body.
    GlobalInsideDefinition { position: usize },
    /// `->` / `+>` target that is not assignable.
    BadAssignTarget { word: String, position: usize },
    /// Malformed literal (unterminated string, bad number, bad escape).
    BadToken { text: String, position: usize },
    /// Too many locals, too deep nesting, or a full code segment.
    Limit { what: &'static str },
    /// Compile-time machinery failed in a way user code cannot cause.
    Internal(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownWord { word, position } => {
                write!(f, "unknown word `{word}` at {position}")
            }
            Self::UnexpectedTerminator { position } => {
                write!(f, "`;` with nothing to close at {position}")
            }
            Self::Unclosed { construct } => write!(f, "unclosed {construct}"),
            Self::NestedDefinition { position } => {
                write!(f, "`:` inside a definition at {position}")
            }
            Self::ExpectedName { after, position } => {
                write!(f, "expected a name after `{after}` at {position}")
            }
            Self::MisplacedWord { word, position } => {
                write!(f, "`{word}` outside its construct at {position}")
            }
            Self::DuplicateDefault { position } => {
                write!(f, "duplicate DEFAULT clause at {position}")
            }
            Self::LocalOutsideDefinition { word, position } => {
                write!(f, "`{word}` needs a local frame at {position}")
            }
            Self::LocalInCleanup { word, position } => {
                write!(f, "local `{word}` is not visible in finally cleanup at {position}")
            }
            Self::RootLocalInDefinition { word, position } => {
                write!(f, "top-level local `{word}` is not visible inside a definition at {position}")
            }
            Self::GlobalInsideDefinition { position } => {
                write!(f, "`global` must be used at top level, at {position}")
            }
            Self::BadAssignTarget { word, position } => {
                write!(f, "`{word}` is not assignable at {position}")
            }
            Self::BadToken { text, position } => write!(f, "bad token `{text}` at {position}"),
            Self::Limit { what } => write!(f, "limit exceeded: {what}"),
            Self::Internal(s) => write!(f, "internal compile error: {s}"),
        }
    }
}

impl std::error::Error for ParseError {}

pub type ParseResult<T> = Result<T, ParseError>;

/// Submission-level error: either the parse failed (and the dictionary was
/// rolled back) or execution hit a fatal condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TacitError {
    Parse(ParseError),
    Run(VmError),
}

impl fmt::Display for TacitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "parse error: {e}"),
            Self::Run(e) => write!(f, "runtime error: {e}"),
        }
    }
}

impl std::error::Error for TacitError {}

impl From<ParseError> for TacitError {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

impl From<VmError> for TacitError {
    fn from(e: VmError) -> Self {
        Self::Run(e)
    }
}

pub type TacitResult<T> = Result<T, TacitError>;
