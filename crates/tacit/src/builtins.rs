//! Builtin word registry.
//!
//! Every builtin is an ordinary dictionary entry binding a name to
//! `CODE(opcode)`, with the meta bit set on immediate (compile-time) words.
//! The parser emits the opcode byte for runtime builtins and executes
//! immediate ones on the spot, so user definitions can shadow any of these
//! by name.

use crate::bytecode::Op;
use crate::cell::Cell;
use crate::error::VmResult;
use crate::vm::Vm;

/// Name, opcode, immediate flag.
pub const BUILTINS: &[(&str, Op, bool)] = &[
    // Stack
    ("dup", Op::Dup, false),
    ("drop", Op::Drop, false),
    ("swap", Op::Swap, false),
    ("over", Op::Over, false),
    ("nip", Op::Nip, false),
    ("tuck", Op::Tuck, false),
    ("rot", Op::Rot, false),
    ("-rot", Op::RotDown, false),
    ("pick", Op::Pick, false),
    ("depth", Op::Depth, false),
    // Arithmetic & comparison
    ("add", Op::Add, false),
    ("sub", Op::Sub, false),
    ("mul", Op::Mul, false),
    ("div", Op::Div, false),
    ("mod", Op::Mod, false),
    ("pow", Op::Pow, false),
    ("eq", Op::Eq, false),
    ("neq", Op::Neq, false),
    ("lt", Op::Lt, false),
    ("le", Op::Le, false),
    ("gt", Op::Gt, false),
    ("ge", Op::Ge, false),
    ("and", Op::And, false),
    ("or", Op::Or, false),
    ("negate", Op::Negate, false),
    ("abs", Op::Abs, false),
    ("floor", Op::Floor, false),
    ("ceil", Op::Ceil, false),
    ("round", Op::Round, false),
    ("not", Op::Not, false),
    // Values & memory
    ("nil", Op::Nil, false),
    ("fetch", Op::Fetch, false),
    ("load", Op::Load, false),
    ("store", Op::Store, false),
    ("eval", Op::Eval, false),
    ("raise", Op::SetErr, false),
    ("abort", Op::Abort, false),
    // Lists
    ("slots", Op::Slots, false),
    ("length", Op::Length, false),
    ("slot", Op::Slot, false),
    ("elem", Op::Elem, false),
    ("find", Op::Find, false),
    ("keys", Op::Keys, false),
    ("values", Op::Values, false),
    ("cons", Op::Cons, false),
    ("concat", Op::Concat, false),
    ("head", Op::Head, false),
    ("tail", Op::Tail, false),
    ("uncons", Op::Uncons, false),
    ("append", Op::Append, false),
    ("reverse", Op::Reverse, false),
    ("pack", Op::Pack, false),
    ("unpack", Op::Unpack, false),
    ("get", Op::Get, false),
    ("set", Op::Set, false),
    // Heap
    ("gmark", Op::GMark, false),
    ("gsweep", Op::GSweep, false),
    ("gpush", Op::GPush, false),
    ("gpeek", Op::GPeek, false),
    ("gpop", Op::GPop, false),
    // Buffers
    ("buffer", Op::NewBuffer, false),
    ("write", Op::BufWrite, false),
    ("read", Op::BufRead, false),
    ("unwrite", Op::BufUnwrite, false),
    ("is-empty", Op::BufIsEmpty, false),
    ("is-full", Op::BufIsFull, false),
    ("buf-size", Op::BufSize, false),
    ("push", Op::BufWrite, false),
    ("pop", Op::BufRead, false),
    // Output
    ("print", Op::Print, false),
    // Immediate (compile-time) words
    (":", Op::BeginDef, true),
    (";", Op::Terminator, true),
    ("if", Op::IfImm, true),
    ("else", Op::ElseImm, true),
    ("when", Op::WhenImm, true),
    ("do", Op::DoImm, true),
    ("case", Op::CaseImm, true),
    ("of", Op::OfImm, true),
    ("DEFAULT", Op::DefaultImm, true),
    ("var", Op::VarImm, true),
    ("->", Op::AssignImm, true),
    ("+>", Op::IncAssignImm, true),
    ("global", Op::GlobalImm, true),
    ("finally", Op::FinallyImm, true),
    ("(", Op::ListOpen, true),
    (")", Op::ListClose, true),
];

/// Mirrors every builtin into the dictionary. Called once at VM startup.
pub fn register(vm: &mut Vm) -> VmResult<()> {
    // `default` is pre-interned so maplist fallback keys have a stable
    // offset before any user code runs.
    vm.digest.intern("default")?;
    for &(name, op, immediate) in BUILTINS {
        vm.define(name, Cell::code(op as u16, immediate))?;
    }
    Ok(())
}
