//! Host-facing values.
//!
//! [`TacitValue`] is the interchange type between the VM and its host:
//! embedders and tests read the data stack as a vector of these instead of
//! poking at raw cells. Lists carry their elements in payload address order,
//! which is the order the literal was written and the order `print` shows.

use std::fmt;

use crate::cell::{Cell, Sentinel, Tag};
use crate::vm::Vm;

/// A decoded VM value.
#[derive(Debug, Clone, PartialEq)]
pub enum TacitValue {
    Number(f32),
    /// An interned string or symbol.
    Str(String),
    /// A list, elements in payload address order.
    List(Vec<TacitValue>),
    /// A code value (builtin opcode below 128, user address otherwise).
    Code(u16),
    /// A reference carrying an absolute cell index.
    Ref(u16),
    Nil,
    /// Sentinels other than NIL (closers, DEFAULT).
    Marker(String),
}

impl fmt::Display for TacitValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e9 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
            Self::Str(s) => write!(f, "{s}"),
            Self::List(items) => {
                write!(f, "(")?;
                for item in items {
                    write!(f, " {item}")?;
                }
                write!(f, " )")
            }
            Self::Code(addr) => write!(f, "@{addr}"),
            Self::Ref(addr) => write!(f, "&{addr}"),
            Self::Nil => write!(f, "nil"),
            Self::Marker(name) => write!(f, "{name}"),
        }
    }
}

impl Vm {
    /// Decodes the data stack, bottom to top, one entry per span.
    #[must_use]
    pub fn stack_values(&self) -> Vec<TacitValue> {
        let mut spans = Vec::new();
        let mut top = self.sp;
        while top > crate::memory::STACK_BASE {
            let Ok(cell) = self.data.read(top - 1) else { break };
            let size = if cell.is_list() {
                (usize::from(cell.payload()) + 1).min(top)
            } else {
                1
            };
            spans.push((top - size, top));
            top -= size;
        }
        spans.reverse();
        spans.into_iter().map(|(_, end)| self.decode_span(end)).collect()
    }

    /// Decodes the value whose top cell is at `end - 1`.
    fn decode_span(&self, end: usize) -> TacitValue {
        let Ok(cell) = self.data.read(end - 1) else {
            return TacitValue::Nil;
        };
        if !cell.is_list() {
            return self.decode_cell(cell);
        }
        match self.element_spans_at(end - 1) {
            Ok(spans) => {
                // Logical spans come header-end first; display order is the
                // reverse.
                let items = spans.iter().rev().map(|&(_, e)| self.decode_span(e)).collect();
                TacitValue::List(items)
            }
            Err(_) => TacitValue::Nil,
        }
    }

    fn decode_cell(&self, cell: Cell) -> TacitValue {
        match cell.tag() {
            Tag::Number => TacitValue::Number(cell.as_number().unwrap_or(f32::NAN)),
            Tag::String => TacitValue::Str(self.digest.get(cell.payload()).to_owned()),
            Tag::Code => TacitValue::Code(cell.payload()),
            Tag::DataRef => TacitValue::Ref(cell.payload()),
            Tag::Sentinel => match cell.as_sentinel() {
                Some(Sentinel::Nil) | None => TacitValue::Nil,
                Some(Sentinel::Default) => TacitValue::Marker("default".to_owned()),
                Some(closer) => TacitValue::Marker(format!("{closer}")),
            },
            Tag::Local => TacitValue::Marker(format!("local:{}", cell.payload())),
            Tag::List => TacitValue::Marker(format!("list:{}", cell.payload())),
        }
    }
}
