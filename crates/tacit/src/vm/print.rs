//! Human-readable rendering of cells and spans.
//!
//! `print` resolves its operand value-by-default, renders it, and writes one
//! line to the host writer. Lists render in source order (payload address
//! order), numbers drop a trailing `.0` when integral.

use crate::bytecode::Op;
use crate::cell::{Cell, Sentinel, Tag};
use crate::error::VmResult;
use crate::io::PrintWriter;
use crate::vm::Vm;
use crate::vm::list::element_spans;

impl Vm {
    /// `print (v -- )`
    pub(crate) fn print_top<P: PrintWriter>(&mut self, print: &mut P) -> VmResult<()> {
        let top = self.peek_cell("print")?;
        let span = if top.is_ref() {
            let reference = self.pop_cell("print")?;
            let addr = self.ref_target(reference)?;
            let cell = self.data.read(addr)?;
            if cell.is_list() {
                let slots = usize::from(cell.payload());
                self.data.slice(addr - slots, slots + 1)?.to_vec()
            } else {
                vec![cell.bits()]
            }
        } else {
            self.pop_span("print")?
        };
        let rendered = self.render_span(&span);
        print.print_line(&rendered);
        Ok(())
    }

    /// Renders a scratch span (a value or a whole list).
    #[must_use]
    pub(crate) fn render_span(&self, span: &[u32]) -> String {
        let top = Cell::from_bits(span[span.len() - 1]);
        if !top.is_list() {
            return self.render_cell(top);
        }
        let mut out = String::from("(");
        // Source order: the reverse of logical element order.
        for &(start, end) in element_spans(span).iter().rev() {
            out.push(' ');
            out.push_str(&self.render_span(&span[start..end]));
        }
        out.push_str(" )");
        out
    }

    /// Renders a single cell without payload context.
    #[must_use]
    pub(crate) fn render_cell(&self, cell: Cell) -> String {
        match cell.tag() {
            Tag::Number => {
                let n = cell.as_number().unwrap_or(f32::NAN);
                if n.fract() == 0.0 && n.abs() < 1e9 {
                    format!("{}", n as i64)
                } else {
                    format!("{n}")
                }
            }
            Tag::String => self.digest.get(cell.payload()).to_owned(),
            Tag::Sentinel => match cell.as_sentinel() {
                Some(Sentinel::Nil) | None => "nil".to_owned(),
                Some(Sentinel::Default) => "default".to_owned(),
                Some(closer) => format!("{closer}"),
            },
            Tag::Code => {
                let addr = cell.payload();
                if addr < 128 {
                    match Op::from_repr(addr as u8) {
                        Some(op) => format!("@{}", op.word()),
                        None => format!("@{addr}"),
                    }
                } else {
                    format!("@{addr}")
                }
            }
            Tag::DataRef => format!("&{}", cell.payload()),
            Tag::Local => format!("local:{}", cell.payload()),
            Tag::List => format!("list:{}", cell.payload()),
        }
    }
}
