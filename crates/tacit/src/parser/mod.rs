//! The single-pass compiler.
//!
//! The parser reads tokens and either emits opcodes or executes immediate
//! words. Immediate words are ordinary dictionary entries with the meta bit
//! set; they emit code themselves and coordinate through a compile-time
//! protocol on the VM's own data and return stacks — closers (sentinel
//! cells) mark open constructs, numbers park branch-operand positions. The
//! universal terminator `;` is one rule: evaluate the closer on top of the
//! stack, whatever construct it belongs to.

mod immediates;
pub mod lexer;

use crate::bytecode::Op;
use crate::cell::{Cell, Sentinel, Tag};
use crate::error::{ParseError, ParseResult};
use crate::vm::Vm;

use lexer::{Lexer, Token, TokenKind};

/// Compiles one submission into the code segment, ending with `Abort`.
///
/// On error the caller rolls the VM back to its pre-submission state.
pub fn compile(vm: &mut Vm, source: &str) -> ParseResult<()> {
    let mut lexer = Lexer::new(source);
    while let Some(token) = lexer.next_token()? {
        compile_token(vm, &mut lexer, token)?;
    }
    finalize(vm)?;
    vm.code.emit(Op::Abort)
}

fn compile_token(vm: &mut Vm, lexer: &mut Lexer<'_>, token: Token) -> ParseResult<()> {
    match token.kind {
        TokenKind::Number(value) => vm.code.emit_f32(Op::LiteralNumber, value),
        TokenKind::Str(s) | TokenKind::Symbol(s) => {
            let offset = intern(vm, &s)?;
            vm.code.emit_u16(Op::LiteralString, offset)
        }
        TokenKind::VarRef(name) => compile_var_ref(vm, &name, token.position),
        TokenKind::CodeRef(name) => compile_code_ref(vm, &name, token.position),
        TokenKind::Word(name) => compile_word(vm, lexer, &name, token.position),
    }
}

fn compile_word(vm: &mut Vm, lexer: &mut Lexer<'_>, name: &str, position: usize) -> ParseResult<()> {
    let binding = lookup(vm, name, position)?;
    match binding.tag() {
        Tag::Code if binding.meta() => {
            let op = Op::from_repr(binding.payload() as u8)
                .ok_or_else(|| ParseError::Internal(format!("bad immediate binding for `{name}`")))?;
            immediates::run(vm, lexer, op, position)
        }
        Tag::Code => {
            let addr = binding.payload();
            if addr < 128 {
                let op = Op::from_repr(addr as u8)
                    .ok_or_else(|| ParseError::Internal(format!("bad builtin binding for `{name}`")))?;
                vm.code.emit(op)
            } else {
                vm.code.emit_call_user(addr)
            }
        }
        Tag::Local => {
            let slot = check_local_scope(vm, name, position, binding)?;
            vm.code.emit_u16(Op::VarRef, slot)?;
            vm.code.emit(Op::Fetch)
        }
        Tag::DataRef => {
            vm.code.emit_u16(Op::GlobalRef, binding.payload())?;
            vm.code.emit(Op::Fetch)
        }
        _ => Err(ParseError::UnknownWord { word: name.to_owned(), position }),
    }
}

/// `&name` — push the address of a variable slot.
fn compile_var_ref(vm: &mut Vm, name: &str, position: usize) -> ParseResult<()> {
    let binding = lookup(vm, name, position)?;
    match binding.tag() {
        Tag::Local => {
            let slot = check_local_scope(vm, name, position, binding)?;
            vm.code.emit_u16(Op::VarRef, slot)
        }
        Tag::DataRef => vm.code.emit_u16(Op::GlobalRef, binding.payload()),
        _ => Err(ParseError::BadAssignTarget { word: format!("&{name}"), position }),
    }
}

/// `@name` — push the CODE value of a word without calling it.
fn compile_code_ref(vm: &mut Vm, name: &str, position: usize) -> ParseResult<()> {
    let binding = lookup(vm, name, position)?;
    match binding.tag() {
        Tag::Code if !binding.meta() => vm.code.emit_u16(Op::LiteralCode, binding.payload()),
        _ => Err(ParseError::BadToken { text: format!("@{name}"), position }),
    }
}

fn lookup(vm: &Vm, name: &str, position: usize) -> ParseResult<Cell> {
    vm.lookup(name)
        .map_err(|e| ParseError::Internal(e.to_string()))?
        .ok_or_else(|| ParseError::UnknownWord { word: name.to_owned(), position })
}

pub(crate) fn intern(vm: &mut Vm, s: &str) -> ParseResult<u16> {
    vm.digest.intern(s).map_err(|_| ParseError::Limit { what: "string segment" })
}

/// Locals resolve only inside the frame that owns their slots: not in a
/// finally cleanup region (which runs in the wrapper's frame), and root
/// locals not inside a definition.
fn check_local_scope(vm: &Vm, name: &str, position: usize, binding: Cell) -> ParseResult<u16> {
    if let Some(def) = vm.compiler.def.as_ref() {
        if def.in_cleanup {
            return Err(ParseError::LocalInCleanup { word: name.to_owned(), position });
        }
        if binding.meta() {
            return Err(ParseError::RootLocalInDefinition { word: name.to_owned(), position });
        }
    }
    Ok(binding.payload())
}

/// End-of-input checks: every opener needs its `;`, every `(` its `)`.
fn finalize(vm: &mut Vm) -> ParseResult<()> {
    if vm.compiler.def.is_some() {
        return Err(ParseError::Unclosed { construct: "DEFINITION" });
    }
    if vm.compiler.list_depth > 0 {
        return Err(ParseError::Unclosed { construct: "list" });
    }
    if vm.compiler.closer_depth > 0 {
        let construct = match vm.peek_cell("compile").ok().and_then(Cell::as_sentinel) {
            Some(Sentinel::EndIf) => "IF",
            Some(Sentinel::EndWhen) => "WHEN",
            Some(Sentinel::EndDo) => "DO",
            Some(Sentinel::EndCase) => "CASE",
            Some(Sentinel::EndOf) => "OF",
            _ => "control structure",
        };
        return Err(ParseError::Unclosed { construct });
    }
    Ok(())
}
