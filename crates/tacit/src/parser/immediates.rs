//! Immediate words: the compile-time control-flow protocol.
//!
//! Openers push a closer sentinel (and whatever fix-up state they need —
//! branch-operand positions as number cells, the compile-time RSP snapshot)
//! onto the data stack; multi-exit constructs park their forward-branch
//! operands on the return stack. The generic `;` pops the closer on top and
//! runs the matching epilogue, which is the single rule that closes
//! definitions, `if`, `when` and `case` alike.

use crate::bytecode::Op;
use crate::cell::{Cell, Sentinel, Tag};
use crate::compiler::DefState;
use crate::error::{ParseError, ParseResult, VmResult};
use crate::memory::HEAP_LIMIT;
use crate::parser::lexer::Lexer;
use crate::vm::Vm;

/// Executes one immediate word at compile time.
pub(crate) fn run(vm: &mut Vm, lexer: &mut Lexer<'_>, op: Op, position: usize) -> ParseResult<()> {
    match op {
        Op::BeginDef => begin_def(vm, lexer, position),
        Op::Terminator => terminator(vm, position),
        Op::IfImm => if_imm(vm),
        Op::ElseImm => else_imm(vm, position),
        Op::WhenImm => when_imm(vm),
        Op::DoImm => do_imm(vm, position),
        Op::CaseImm => case_imm(vm),
        Op::OfImm => of_imm(vm, position),
        Op::DefaultImm => default_imm(vm, position),
        Op::VarImm => var_imm(vm, lexer),
        Op::AssignImm => assign_imm(vm, lexer),
        Op::IncAssignImm => inc_assign_imm(vm, lexer),
        Op::GlobalImm => global_imm(vm, lexer),
        Op::FinallyImm => finally_imm(vm, position),
        Op::ListOpen => {
            vm.compiler.list_depth += 1;
            vm.code.emit(Op::OpenList)
        }
        Op::ListClose => {
            if vm.compiler.list_depth == 0 {
                return Err(ParseError::MisplacedWord { word: ")", position });
            }
            vm.compiler.list_depth -= 1;
            vm.code.emit(Op::CloseList)
        }
        other => Err(ParseError::Internal(format!("`{}` is not an immediate word", other.word()))),
    }
}

// === Compile-time stack helpers ===

fn ct<T>(result: VmResult<T>) -> ParseResult<T> {
    result.map_err(|e| ParseError::Internal(format!("compile-time stack: {e}")))
}

fn ct_push(vm: &mut Vm, cell: Cell) -> ParseResult<()> {
    ct(vm.push_cell(cell, "compile"))
}

fn ct_pop(vm: &mut Vm) -> ParseResult<Cell> {
    ct(vm.pop_cell("compile"))
}

fn ct_pop_pos(vm: &mut Vm) -> ParseResult<usize> {
    let cell = ct_pop(vm)?;
    match cell.as_number() {
        Some(n) if n >= 0.0 && n.fract() == 0.0 => Ok(n as usize),
        _ => Err(ParseError::Internal("expected a parked code position".to_owned())),
    }
}

fn top_closer(vm: &Vm) -> Option<Sentinel> {
    vm.peek_cell("compile").ok().and_then(Cell::as_sentinel)
}

fn entry_addr(vm: &Vm) -> ParseResult<u16> {
    u16::try_from(vm.code.here()).map_err(|_| ParseError::Limit { what: "user code address" })
}

// === Definitions ===

/// `: name` — forward branch over the body, a zero `Reserve` to patch, the
/// EndDefinition closer, and a dictionary mark so local names can be
/// forgotten at `;`.
fn begin_def(vm: &mut Vm, lexer: &mut Lexer<'_>, position: usize) -> ParseResult<()> {
    if vm.compiler.def.is_some() {
        return Err(ParseError::NestedDefinition { position });
    }
    let (name, _) = lexer.expect_name(":")?;
    let branch_pos = vm.code.emit_branch_placeholder(Op::Branch)?;
    let dict_mark = ct(vm.heap_mark())?;
    let entry = entry_addr(vm)?;
    vm.code.emit_u16(Op::Reserve, 0)?;
    let reserve_pos = usize::from(entry) + 1;
    ct_push(vm, Cell::sentinel(Sentinel::EndDefinition))?;
    vm.compiler.closer_depth += 1;
    vm.compiler.def = Some(DefState {
        name,
        entry,
        branch_pos,
        reserve_pos,
        dict_mark,
        local_count: 0,
        wrapper: None,
        in_cleanup: false,
    });
    Ok(())
}

/// `;` — evaluate the closer on top of the data stack.
fn terminator(vm: &mut Vm, position: usize) -> ParseResult<()> {
    if vm.compiler.closer_depth == 0 {
        return Err(ParseError::UnexpectedTerminator { position });
    }
    let closer = ct_pop(vm)?;
    vm.compiler.closer_depth -= 1;
    match closer.as_sentinel() {
        Some(Sentinel::EndDefinition) => end_definition(vm),
        Some(Sentinel::EndIf) => end_if(vm),
        Some(Sentinel::EndDo) => end_clause(vm),
        Some(Sentinel::EndOf) => end_clause(vm),
        Some(Sentinel::EndWhen) => end_when(vm, false),
        Some(Sentinel::EndCase) => end_when(vm, true),
        _ => Err(ParseError::UnexpectedTerminator { position }),
    }
}

/// EndDefinition: emit `Exit`, patch the skip branch and the reserve count,
/// forget local names, bind the new word.
fn end_definition(vm: &mut Vm) -> ParseResult<()> {
    let def = vm.compiler.def.take().ok_or(ParseError::UnexpectedTerminator { position: 0 })?;
    vm.code.emit(Op::Exit)?;
    vm.code.patch_branch(def.branch_pos)?;
    vm.code.patch_u16(def.reserve_pos, def.local_count);
    ct(vm.heap_restore(def.dict_mark))?;
    let target = def.wrapper.unwrap_or(def.entry);
    ct(vm.define(&def.name, Cell::code(target, false)))
}

// === if / else ===

/// `if` — a conditional branch to patch. Directly after a `when`-clause `do`
/// (the clause slot still unfilled) the branch belongs to that clause;
/// otherwise it opens a standalone IF.
fn if_imm(vm: &mut Vm) -> ParseResult<()> {
    if top_closer(vm) == Some(Sentinel::EndDo) {
        let slot = ct(vm.data.read(vm.sp - 2))?;
        if slot.is_nil() {
            let closer = ct_pop(vm)?;
            ct_pop(vm)?; // the unfilled slot
            let ph = vm.code.emit_branch_placeholder(Op::IfFalseBranch)?;
            ct_push(vm, Cell::int(ph as i32))?;
            return ct_push(vm, closer);
        }
    }
    let ph = vm.code.emit_branch_placeholder(Op::IfFalseBranch)?;
    ct_push(vm, Cell::int(ph as i32))?;
    ct_push(vm, Cell::sentinel(Sentinel::EndIf))?;
    vm.compiler.closer_depth += 1;
    Ok(())
}

/// `else` — exit branch for the true arm, then retarget the `if` branch here.
fn else_imm(vm: &mut Vm, position: usize) -> ParseResult<()> {
    if top_closer(vm) != Some(Sentinel::EndIf) {
        return Err(ParseError::MisplacedWord { word: "else", position });
    }
    ct_pop(vm)?; // EndIf
    let if_pos = ct_pop_pos(vm)?;
    let exit_pos = vm.code.emit_branch_placeholder(Op::Branch)?;
    vm.code.patch_branch(if_pos)?;
    ct_push(vm, Cell::int(exit_pos as i32))?;
    ct_push(vm, Cell::sentinel(Sentinel::EndIf))
}

fn end_if(vm: &mut Vm) -> ParseResult<()> {
    let pos = ct_pop_pos(vm)?;
    vm.code.patch_branch(pos)
}

// === when / do ===

/// `when` — snapshot the compile-time RSP (the fix-up list grows above it)
/// and open the construct.
fn when_imm(vm: &mut Vm) -> ParseResult<()> {
    ct_push(vm, Cell::int(vm.rsp as i32))?;
    ct_push(vm, Cell::sentinel(Sentinel::EndWhen))?;
    vm.compiler.closer_depth += 1;
    Ok(())
}

/// `do` — open a clause: duplicate the scrutinee for the guard and leave an
/// unfilled branch slot for the clause's `if`.
fn do_imm(vm: &mut Vm, position: usize) -> ParseResult<()> {
    if top_closer(vm) != Some(Sentinel::EndWhen) {
        return Err(ParseError::MisplacedWord { word: "do", position });
    }
    vm.code.emit(Op::Dup)?;
    ct_push(vm, Cell::NIL)?;
    ct_push(vm, Cell::sentinel(Sentinel::EndDo))?;
    vm.compiler.closer_depth += 1;
    Ok(())
}

/// Clause end (EndDo and EndOf behave identically): emit the forward exit
/// branch, park its operand on the return stack, patch the clause's
/// conditional branch to just past it.
fn end_clause(vm: &mut Vm) -> ParseResult<()> {
    let slot = ct_pop(vm)?;
    let exit_pos = vm.code.emit_branch_placeholder(Op::Branch)?;
    ct(vm.rpush(Cell::int(exit_pos as i32), "compile"))?;
    if !slot.is_nil() {
        let pos = match slot.as_number() {
            Some(n) if n >= 0.0 && n.fract() == 0.0 => n as usize,
            _ => return Err(ParseError::Internal("expected a parked code position".to_owned())),
        };
        vm.code.patch_branch(pos)?;
    }
    Ok(())
}

/// Construct end for `when` and `case`: patch every parked exit branch to
/// the common exit point and check the return stack came back to its
/// snapshot. `case` first emits the no-match `Drop` of the discriminant.
fn end_when(vm: &mut Vm, is_case: bool) -> ParseResult<()> {
    let saved = ct_pop_pos(vm)?;
    if is_case {
        vm.compiler.case_defaults.pop();
        vm.code.emit(Op::Drop)?;
    }
    while vm.rsp > saved {
        let pos = ct(vm.rpop("compile"))?;
        let pos = match pos.as_number() {
            Some(n) if n >= 0.0 && n.fract() == 0.0 => n as usize,
            _ => return Err(ParseError::Internal("expected a parked code position".to_owned())),
        };
        vm.code.patch_branch(pos)?;
    }
    if vm.rsp < saved {
        return Err(ParseError::Internal("control-structure fix-ups underflowed".to_owned()));
    }
    Ok(())
}

// === case / of ===

fn case_imm(vm: &mut Vm) -> ParseResult<()> {
    ct_push(vm, Cell::int(vm.rsp as i32))?;
    ct_push(vm, Cell::sentinel(Sentinel::EndCase))?;
    vm.compiler.closer_depth += 1;
    vm.compiler.case_defaults.push(false);
    Ok(())
}

/// `of` — compare the discriminant against the literal compiled just before:
/// copy it over the literal, test, and drop it on the matching path.
fn of_imm(vm: &mut Vm, position: usize) -> ParseResult<()> {
    if top_closer(vm) != Some(Sentinel::EndCase) {
        return Err(ParseError::MisplacedWord { word: "of", position });
    }
    vm.code.emit(Op::Over)?;
    vm.code.emit(Op::Eq)?;
    let ph = vm.code.emit_branch_placeholder(Op::IfFalseBranch)?;
    vm.code.emit(Op::Drop)?;
    ct_push(vm, Cell::int(ph as i32))?;
    ct_push(vm, Cell::sentinel(Sentinel::EndOf))?;
    vm.compiler.closer_depth += 1;
    Ok(())
}

/// `DEFAULT` — an unconditional clause; drops the discriminant. At most one
/// per `case`.
fn default_imm(vm: &mut Vm, position: usize) -> ParseResult<()> {
    if top_closer(vm) != Some(Sentinel::EndCase) {
        return Err(ParseError::MisplacedWord { word: "DEFAULT", position });
    }
    match vm.compiler.case_defaults.last_mut() {
        Some(seen) if *seen => return Err(ParseError::DuplicateDefault { position }),
        Some(seen) => *seen = true,
        None => return Err(ParseError::Internal("case without default tracking".to_owned())),
    }
    vm.code.emit(Op::Drop)?;
    ct_push(vm, Cell::NIL)?;
    ct_push(vm, Cell::sentinel(Sentinel::EndOf))?;
    vm.compiler.closer_depth += 1;
    Ok(())
}

// === Variables ===

/// `var name` — allocate a slot in the current frame, bind the name (meta
/// bit marks root-frame locals), emit the initializing store.
fn var_imm(vm: &mut Vm, lexer: &mut Lexer<'_>) -> ParseResult<()> {
    let (name, position) = lexer.expect_name("var")?;
    if vm.compiler.def.as_ref().is_some_and(|d| d.in_cleanup) {
        return Err(ParseError::LocalInCleanup { word: name, position });
    }
    let is_root = vm.compiler.def.is_none();
    if is_root && usize::from(vm.compiler.root_locals) >= crate::memory::ROOT_LOCAL_CELLS {
        return Err(ParseError::Limit { what: "top-level locals" });
    }
    let slot = vm.compiler.bump_locals();
    ct(vm.define(&name, Cell::tagged(Tag::Local, slot, is_root)))?;
    vm.code.emit_u16(Op::InitVar, slot)
}

/// `v -> name` — store through the variable's slot.
fn assign_imm(vm: &mut Vm, lexer: &mut Lexer<'_>) -> ParseResult<()> {
    let (name, position) = lexer.expect_name("->")?;
    let binding = super::lookup(vm, &name, position)?;
    match binding.tag() {
        Tag::Local => {
            let slot = super::check_local_scope(vm, &name, position, binding)?;
            vm.code.emit_u16(Op::VarRef, slot)?;
            vm.code.emit(Op::Store)
        }
        Tag::DataRef => {
            vm.code.emit_u16(Op::GlobalRef, binding.payload())?;
            vm.code.emit(Op::Store)
        }
        _ => Err(ParseError::BadAssignTarget { word: name, position }),
    }
}

/// `n +> name` — in-place numeric increment; locals only.
fn inc_assign_imm(vm: &mut Vm, lexer: &mut Lexer<'_>) -> ParseResult<()> {
    let (name, position) = lexer.expect_name("+>")?;
    let binding = super::lookup(vm, &name, position)?;
    match binding.tag() {
        Tag::Local => {
            let slot = super::check_local_scope(vm, &name, position, binding)?;
            vm.code.emit_u16(Op::VarRef, slot)?;
            vm.code.emit(Op::PlusStore)
        }
        _ => Err(ParseError::BadAssignTarget { word: name, position }),
    }
}

/// `value global name` — allocate a heap slot at compile time, bind the
/// name, emit the initializing store.
fn global_imm(vm: &mut Vm, lexer: &mut Lexer<'_>) -> ParseResult<()> {
    let (name, position) = lexer.expect_name("global")?;
    if vm.compiler.def.is_some() {
        return Err(ParseError::GlobalInsideDefinition { position });
    }
    if vm.gp >= HEAP_LIMIT {
        return Err(ParseError::Limit { what: "global heap" });
    }
    let slot = vm.gp as u16;
    vm.gp += 1;
    ct(vm.define(&name, Cell::data_ref(slot)))?;
    vm.code.emit_u16(Op::InitGlobal, slot)
}

// === finally ===

/// `finally` — close the body with `Exit` and start the wrapper inline:
/// call the body, mark the cleanup, compile the cleanup region after.
fn finally_imm(vm: &mut Vm, position: usize) -> ParseResult<()> {
    let Some(def) = vm.compiler.def.as_ref() else {
        return Err(ParseError::MisplacedWord { word: "finally", position });
    };
    if def.wrapper.is_some() {
        return Err(ParseError::MisplacedWord { word: "finally", position });
    }
    let entry = def.entry;
    vm.code.emit(Op::Exit)?;
    let wrapper = entry_addr(vm)?;
    vm.code.emit_u16(Op::Call, entry)?;
    vm.code.emit(Op::SetInFinally)?;
    let def = vm.compiler.def.as_mut().expect("definition checked above");
    def.wrapper = Some(wrapper);
    def.in_cleanup = true;
    Ok(())
}
