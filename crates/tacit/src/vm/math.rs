//! Arithmetic with list broadcasting.
//!
//! Binary and unary numeric operations decode to `f32`, compute, and
//! re-encode. When an operand is a list the operation broadcasts: scalar
//! against list maps over the elements, list against list pairs elements
//! with modulo cycling on the shorter side, nested lists recurse.
//! Broadcasting constructs new lists; inputs are never mutated.
//!
//! Operands are resolved value-by-default: a reference operand is read (and
//! materialized into scratch when compound) before the operation applies.

use crate::bytecode::Op;
use crate::cell::Cell;
use crate::error::{VmError, VmResult};
use crate::vm::Vm;
use crate::vm::list::element_spans;

impl Vm {
    /// Pops an operand span, resolving a reference to its current value.
    fn pop_operand(&mut self, word: &'static str) -> VmResult<Vec<u32>> {
        let top = self.peek_cell(word)?;
        if top.is_ref() {
            let reference = self.pop_cell(word)?;
            let addr = self.ref_target(reference)?;
            let cell = self.data.read(addr)?;
            if cell.is_list() {
                let slots = usize::from(cell.payload());
                return Ok(self.data.slice(addr - slots, slots + 1)?.to_vec());
            }
            return Ok(vec![cell.bits()]);
        }
        self.pop_span(word)
    }

    pub(crate) fn binary_op(&mut self, op: Op) -> VmResult<()> {
        let word = op.word();
        let b = self.pop_operand(word)?;
        let a = self.pop_operand(word)?;
        let result = broadcast_binary(op, &a, &b)?;
        self.push_raw_span(&result, word)
    }

    pub(crate) fn unary_op(&mut self, op: Op) -> VmResult<()> {
        let word = op.word();
        let a = self.pop_operand(word)?;
        let result = broadcast_unary(op, &a)?;
        self.push_raw_span(&result, word)
    }
}

/// Applies a binary op over two spans, recursing through lists.
fn broadcast_binary(op: Op, a: &[u32], b: &[u32]) -> VmResult<Vec<u32>> {
    let a_list = is_list_span(a);
    let b_list = is_list_span(b);
    if !a_list && !b_list {
        let cell = apply_binary(op, Cell::from_bits(a[0]), Cell::from_bits(b[0]))?;
        return Ok(vec![cell.bits()]);
    }

    let a_elems = spans_of(a);
    let b_elems = spans_of(b);
    let len = match (a_list, b_list) {
        (true, true) => a_elems.len().max(b_elems.len()),
        (true, false) => a_elems.len(),
        (false, true) => b_elems.len(),
        (false, false) => unreachable!(),
    };

    // Element results in logical order, then laid out in storage order
    // (last logical element at the lowest address).
    let mut elements = Vec::with_capacity(len);
    for i in 0..len {
        let ae = pick_element(a, &a_elems, a_list, i);
        let be = pick_element(b, &b_elems, b_list, i);
        elements.push(broadcast_binary(op, ae, be)?);
    }
    Ok(assemble_list(elements))
}

fn broadcast_unary(op: Op, a: &[u32]) -> VmResult<Vec<u32>> {
    if !is_list_span(a) {
        let cell = apply_unary(op, Cell::from_bits(a[0]))?;
        return Ok(vec![cell.bits()]);
    }
    let spans = spans_of(a);
    let mut elements = Vec::with_capacity(spans.len());
    for &(start, end) in &spans {
        elements.push(broadcast_unary(op, &a[start..end])?);
    }
    Ok(assemble_list(elements))
}

fn is_list_span(span: &[u32]) -> bool {
    Cell::from_bits(span[span.len() - 1]).is_list()
}

fn spans_of(span: &[u32]) -> Vec<(usize, usize)> {
    if is_list_span(span) { element_spans(span) } else { Vec::new() }
}

fn pick_element<'a>(span: &'a [u32], elems: &[(usize, usize)], is_list: bool, i: usize) -> &'a [u32] {
    if is_list {
        let (start, end) = elems[i % elems.len()];
        &span[start..end]
    } else {
        span
    }
}

/// Lays out element results (logical order) as one list span.
fn assemble_list(elements: Vec<Vec<u32>>) -> Vec<u32> {
    let total: usize = elements.iter().map(Vec::len).sum();
    let mut out = Vec::with_capacity(total + 1);
    for element in elements.iter().rev() {
        out.extend_from_slice(element);
    }
    out.push(Cell::list(total as u16).bits());
    out
}

fn flag(b: bool) -> f32 {
    if b { 1.0 } else { 0.0 }
}

fn apply_binary(op: Op, a: Cell, b: Cell) -> VmResult<Cell> {
    // Equality is defined for every simple cell: interned strings and
    // sentinels compare by identity, numbers by value.
    match op {
        Op::Eq if !(a.is_number() && b.is_number()) => {
            return Ok(Cell::int(i32::from(a == b)));
        }
        Op::Neq if !(a.is_number() && b.is_number()) => {
            return Ok(Cell::int(i32::from(a != b)));
        }
        _ => {}
    }

    let (x, y) = match (a.as_number(), b.as_number()) {
        (Some(x), Some(y)) => (x, y),
        _ => {
            let bad = if a.is_number() { b } else { a };
            return Err(VmError::BroadcastMismatch {
                word: op.word(),
                found: format!("{}", bad.tag()),
            });
        }
    };

    let result = match op {
        Op::Add => x + y,
        Op::Sub => x - y,
        Op::Mul => x * y,
        Op::Div => x / y,
        Op::Mod => x - y * (x / y).floor(),
        Op::Pow => x.powf(y),
        Op::Eq => flag(x == y),
        Op::Neq => flag(x != y),
        Op::Lt => flag(x < y),
        Op::Le => flag(x <= y),
        Op::Gt => flag(x > y),
        Op::Ge => flag(x >= y),
        Op::And => flag(x != 0.0 && y != 0.0),
        Op::Or => flag(x != 0.0 || y != 0.0),
        _ => unreachable!("non-binary opcode in apply_binary"),
    };
    Ok(Cell::number(result))
}

fn apply_unary(op: Op, a: Cell) -> VmResult<Cell> {
    let x = a.as_number().ok_or_else(|| VmError::BroadcastMismatch {
        word: op.word(),
        found: format!("{}", a.tag()),
    })?;
    let result = match op {
        Op::Negate => -x,
        Op::Abs => x.abs(),
        Op::Floor => x.floor(),
        Op::Ceil => x.ceil(),
        Op::Round => x.round(),
        Op::Not => flag(x == 0.0),
        _ => unreachable!("non-unary opcode in apply_unary"),
    };
    Ok(Cell::number(result))
}
