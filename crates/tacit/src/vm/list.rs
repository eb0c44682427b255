//! Lists, references, and the materialization/mutation rules.
//!
//! A list is a contiguous span: payload cells at lower addresses, the
//! `LIST(slotCount)` header on top. The logical first element sits directly
//! under the header (which is what makes `cons`, `head`, `tail` and `uncons`
//! O(1) at the header end); `slot`, `find`, `keys` and `values` index payload
//! positions from the base, so maplists written `( `k v `k v )` have keys at
//! even positions. Printing and the host value type present payload in
//! address order — the order the literal was written.
//!
//! References are absolute cell indices into the data segment. Query words
//! accept either a reference or a stack-resident list; a stack-resident
//! operand is left in place when the word pushes an address into it, so the
//! address stays valid for as long as the span does.

use crate::cell::{Cell, Tag};
use crate::error::{VmError, VmResult};
use crate::vm::Vm;

/// How a list operand was presented.
pub(crate) enum ListOperand {
    /// Header at `sp - 1`; the span is still on the stack.
    OnStack { start: usize },
    /// The operand was a reference; it has been popped.
    InMemory,
}

impl Vm {
    // === Operand resolution ===

    /// Follows a reference one level when it lands on another reference
    /// (a compound variable slot holds a ref to its payload).
    pub(crate) fn ref_target(&self, reference: Cell) -> VmResult<usize> {
        let addr = usize::from(reference.payload());
        let cell = self.data.read(addr)?;
        if cell.is_ref() {
            Ok(usize::from(cell.payload()))
        } else {
            Ok(addr)
        }
    }

    /// Resolves the top operand to a list header address without copying.
    ///
    /// A stack-resident list stays on the stack (the caller drops it when the
    /// operation consumes its operand); a reference operand is popped.
    pub(crate) fn classify_list(&mut self, word: &'static str) -> VmResult<(ListOperand, usize, u16)> {
        let top = self.peek_cell(word)?;
        if top.is_list() {
            let slots = top.payload();
            let header = self.sp - 1;
            if header < crate::memory::STACK_BASE + usize::from(slots) {
                return Err(VmError::StackUnderflow { word, depth: self.depth() });
            }
            return Ok((ListOperand::OnStack { start: header - usize::from(slots) }, header, slots));
        }
        if top.is_ref() {
            let reference = self.pop_cell(word)?;
            let header = self.ref_target(reference)?;
            let cell = self.data.read(header)?;
            if cell.is_list() {
                return Ok((ListOperand::InMemory, header, cell.payload()));
            }
            return Err(VmError::TypeMismatch { word, expected: "a list", found: self.describe(cell) });
        }
        Err(VmError::TypeMismatch { word, expected: "a list", found: self.describe(top) })
    }

    /// Consumes a stack-resident operand after a query that copied what it
    /// needed.
    fn consume_operand(&mut self, operand: &ListOperand) {
        if let ListOperand::OnStack { start } = operand {
            self.sp = *start;
        }
    }

    /// Pops the operand that sits under a stack-resident list, or on top
    /// once a reference operand has been popped. Extraction shifts a
    /// stack-resident span down one cell, so the adjusted header address is
    /// returned alongside the operand.
    fn operand_below(
        &mut self,
        operand: &ListOperand,
        header: usize,
        word: &'static str,
    ) -> VmResult<(Cell, usize)> {
        match operand {
            ListOperand::OnStack { start } => Ok((self.extract_under(*start, word)?, header - 1)),
            ListOperand::InMemory => Ok((self.pop_cell(word)?, header)),
        }
    }

    /// Pops a whole list span into a scratch buffer, materializing reference
    /// operands (payload first, header last).
    pub(crate) fn pop_list_span(&mut self, word: &'static str) -> VmResult<Vec<u32>> {
        let (operand, header, slots) = self.classify_list(word)?;
        let start = header - usize::from(slots);
        let cells = self.data.slice(start, usize::from(slots) + 1)?.to_vec();
        self.consume_operand(&operand);
        Ok(cells)
    }

    /// Element spans of the list at `header`, logical order (element 0 is
    /// the span directly under the header). Each span is `(start, end)` in
    /// absolute cells, with the element's top cell at `end - 1`.
    pub(crate) fn element_spans_at(&self, header: usize) -> VmResult<Vec<(usize, usize)>> {
        let slots = usize::from(self.data.read(header)?.payload());
        let base = header - slots;
        let mut spans = Vec::new();
        let mut top = header;
        while top > base {
            let cell = self.data.read(top - 1)?;
            let size = if cell.is_list() { usize::from(cell.payload()) + 1 } else { 1 };
            if top < base + size {
                return Err(VmError::SegmentBounds { segment: "data", index: top, limit: base + size });
            }
            spans.push((top - size, top));
            top -= size;
        }
        Ok(spans)
    }

    // === Construction ===

    /// `(` — park SP on the return stack and bump the list depth.
    pub(crate) fn open_list(&mut self) -> VmResult<()> {
        self.rpush(Cell::int(self.sp as i32), "(")?;
        self.list_depth += 1;
        Ok(())
    }

    /// `)` — count the payload cells since the mark, push the header.
    pub(crate) fn close_list(&mut self) -> VmResult<()> {
        let mark_cell = self.rpop(")")?;
        let mark = self.expect_index(mark_cell, ")")?;
        let count = self.sp - mark;
        let slots = u16::try_from(count)
            .map_err(|_| VmError::StackOverflow { word: ")", depth: self.depth() })?;
        self.list_depth = self.list_depth.saturating_sub(1);
        self.push_cell(Cell::list(slots), ")")
    }

    // === Materialization ===

    /// Copies the span at `header` onto the stack, payload first.
    pub(crate) fn materialize(&mut self, header: usize, word: &'static str) -> VmResult<()> {
        let cell = self.data.read(header)?;
        let slots = usize::from(cell.payload());
        let span = self.data.slice(header - slots, slots + 1)?.to_vec();
        self.push_raw_span(&span, word)
    }

    /// `fetch (ref -- value)` — read one cell; a list header materializes.
    pub(crate) fn fetch(&mut self) -> VmResult<()> {
        let reference = self.pop_cell("fetch")?;
        if !reference.is_ref() {
            return Err(VmError::FetchExpectsRef { found: self.describe(reference) });
        }
        let addr = usize::from(reference.payload());
        let cell = self.data.read(addr)?;
        if cell.is_list() {
            self.materialize(addr, "fetch")
        } else {
            self.push_cell(cell, "fetch")
        }
    }

    /// `load (x -- v)` — value-by-default dereference. Identity on non-refs;
    /// otherwise read once, follow at most one further ref, and materialize
    /// a list destination.
    pub(crate) fn load(&mut self) -> VmResult<()> {
        let x = self.pop_cell("load")?;
        if !x.is_ref() {
            return self.push_cell(x, "load");
        }
        let mut addr = usize::from(x.payload());
        let mut cell = self.data.read(addr)?;
        if cell.is_ref() {
            addr = usize::from(cell.payload());
            cell = self.data.read(addr)?;
        }
        if cell.is_list() {
            self.materialize(addr, "load")
        } else {
            self.push_cell(cell, "load")
        }
    }

    // === Mutation ===

    /// `store (value ref -- )`
    pub(crate) fn store(&mut self) -> VmResult<()> {
        let reference = self.pop_cell("store")?;
        if !reference.is_ref() {
            return Err(VmError::TypeMismatch {
                word: "store",
                expected: "a reference destination",
                found: self.describe(reference),
            });
        }
        let dest = self.ref_target(reference)?;
        self.store_at(dest)
    }

    /// Pops the source value from the stack and stores it at `dest` under
    /// the compatibility rules. A reference source is dereferenced once and
    /// copied via a scratch buffer (the direct-copy fast path); identity
    /// stores are a no-op.
    pub(crate) fn store_at(&mut self, dest: usize) -> VmResult<()> {
        let dcell = self.data.read(dest)?;
        let top = self.peek_cell("store")?;

        // Source presented as a reference: copy memory to memory.
        if top.is_ref() {
            let source = self.pop_cell("store")?;
            let saddr = self.ref_target(source)?;
            if saddr == dest {
                return Ok(());
            }
            let scell = self.data.read(saddr)?;
            return if scell.is_list() {
                let slots = usize::from(scell.payload());
                if !dcell.is_list() {
                    return Err(VmError::StoreIncompatible { reason: "compound value into simple destination" });
                }
                if dcell.payload() != scell.payload() {
                    return Err(VmError::StoreIncompatible { reason: "compound slot counts differ" });
                }
                let span = self.data.slice(saddr - slots, slots + 1)?.to_vec();
                self.data.write_span(dest - slots, &span)
            } else {
                if dcell.is_list() {
                    return Err(VmError::StoreIncompatible { reason: "simple value into compound destination" });
                }
                self.data.write(dest, scell)
            };
        }

        // Source on the stack.
        if top.is_list() {
            let span = self.pop_span("store")?;
            if !dcell.is_list() {
                return Err(VmError::StoreIncompatible { reason: "compound value into simple destination" });
            }
            if usize::from(dcell.payload()) + 1 != span.len() {
                return Err(VmError::StoreIncompatible { reason: "compound slot counts differ" });
            }
            let slots = usize::from(dcell.payload());
            self.data.write_span(dest - slots, &span)
        } else {
            let value = self.pop_cell("store")?;
            if dcell.is_list() {
                return Err(VmError::StoreIncompatible { reason: "simple value into compound destination" });
            }
            self.data.write(dest, value)
        }
    }

    // === Queries ===

    /// `slots (list -- n)`
    pub(crate) fn slots(&mut self) -> VmResult<()> {
        let (operand, _, slots) = self.classify_list("slots")?;
        self.consume_operand(&operand);
        self.push_cell(Cell::int(i32::from(slots)), "slots")
    }

    /// `length (list -- n)` — logical element count.
    pub(crate) fn length(&mut self) -> VmResult<()> {
        let (operand, header, _) = self.classify_list("length")?;
        let count = self.element_spans_at(header)?.len();
        self.consume_operand(&operand);
        self.push_cell(Cell::int(count as i32), "length")
    }

    /// `slot (i list -- addr|nil)` — O(1) address of the i-th payload cell,
    /// counted from the base. A stack-resident list stays put so the address
    /// remains valid.
    pub(crate) fn slot(&mut self) -> VmResult<()> {
        let (operand, header, slots) = self.classify_list("slot")?;
        let (index_cell, header) = self.operand_below(&operand, header, "slot")?;
        let result = match index_cell.as_number() {
            Some(n) if n >= 0.0 && n.fract() == 0.0 && (n as usize) < usize::from(slots) => {
                Cell::data_ref((header - usize::from(slots) + n as usize) as u16)
            }
            _ => Cell::NIL,
        };
        self.push_cell(result, "slot")
    }

    /// `elem (i list -- addr|nil)` — address of the i-th logical element's
    /// top cell (its header when the element is itself a list).
    pub(crate) fn elem(&mut self) -> VmResult<()> {
        let (operand, header, _) = self.classify_list("elem")?;
        let (index_cell, header) = self.operand_below(&operand, header, "elem")?;
        let spans = self.element_spans_at(header)?;
        let result = match index_cell.as_number() {
            Some(n) if n >= 0.0 && n.fract() == 0.0 && (n as usize) < spans.len() => {
                Cell::data_ref((spans[n as usize].1 - 1) as u16)
            }
            _ => Cell::NIL,
        };
        self.push_cell(result, "elem")
    }

    /// `find (key maplist -- addr|nil)` — scan (key, value) element pairs in
    /// source order; a `` `default `` key is the fallback. The returned
    /// address is the value element's top cell, so compound values resolve
    /// to their header.
    pub(crate) fn find(&mut self) -> VmResult<()> {
        let (operand, header, _) = self.classify_list("find")?;
        let (key, header) = self.operand_below(&operand, header, "find")?;
        let spans = self.element_spans_at(header)?;
        let default_key = self.digest.find("default").map(Cell::string);

        let mut found = Cell::NIL;
        let mut fallback = Cell::NIL;
        // Pairs run in source order, the reverse of logical order.
        let mut pairs = spans.iter().rev();
        while let (Some(&(ks, ke)), Some(&(_, ve))) = (pairs.next(), pairs.next()) {
            if ke - ks != 1 {
                continue;
            }
            let k = self.data.read(ks)?;
            if k == key {
                found = Cell::data_ref((ve - 1) as u16);
                break;
            }
            if fallback.is_nil() && Some(k) == default_key {
                fallback = Cell::data_ref((ve - 1) as u16);
            }
        }
        let result = if found.is_nil() { fallback } else { found };
        self.push_cell(result, "find")
    }

    /// `keys (maplist -- list)` / `values (maplist -- list)`
    pub(crate) fn keys(&mut self) -> VmResult<()> {
        self.project_pairs(0, "keys")
    }

    pub(crate) fn values(&mut self) -> VmResult<()> {
        self.project_pairs(1, "values")
    }

    /// Materializes every second element (counted from the base) as a new
    /// list, preserving source order.
    fn project_pairs(&mut self, parity: usize, word: &'static str) -> VmResult<()> {
        let span = self.pop_list_span(word)?;
        let spans = element_spans(&span);
        let mut payload: Vec<u32> = Vec::new();
        // `spans` is logical (header-end first); base order is its reverse.
        for (i, &(start, end)) in spans.iter().rev().enumerate() {
            if i % 2 == parity {
                payload.extend_from_slice(&span[start..end]);
            }
        }
        let slots = payload.len() as u16;
        self.push_raw_span(&payload, word)?;
        self.push_cell(Cell::list(slots), word)
    }

    // === Structural operations ===

    /// `cons (list value -- list')` — O(1) prepend at the header end.
    pub(crate) fn cons(&mut self) -> VmResult<()> {
        let value = self.pop_span("cons")?;
        let (operand, header, slots) = self.classify_list("cons")?;
        let new_slots = usize::from(slots) + value.len();
        let new_slots = u16::try_from(new_slots)
            .map_err(|_| VmError::StackOverflow { word: "cons", depth: self.depth() })?;
        match operand {
            ListOperand::OnStack { .. } => {
                self.pop_cell("cons")?; // old header
            }
            ListOperand::InMemory => {
                let base = header - usize::from(slots);
                let payload = self.data.slice(base, usize::from(slots))?.to_vec();
                self.push_raw_span(&payload, "cons")?;
            }
        }
        self.push_raw_span(&value, "cons")?;
        self.push_cell(Cell::list(new_slots), "cons")
    }

    /// `concat (a b -- ab)` — joins payloads in storage order, so
    /// `( 1 2 ) ( 3 4 ) concat` is structurally `( 1 2 3 4 )`.
    pub(crate) fn concat(&mut self) -> VmResult<()> {
        let b = self.pop_list_span("concat")?;
        let (operand, header, slots) = self.classify_list("concat")?;
        let b_slots = b.len() - 1;
        let total = usize::from(slots) + b_slots;
        let total = u16::try_from(total)
            .map_err(|_| VmError::StackOverflow { word: "concat", depth: self.depth() })?;
        match operand {
            ListOperand::OnStack { .. } => {
                self.pop_cell("concat")?; // a's header
            }
            ListOperand::InMemory => {
                let base = header - usize::from(slots);
                let payload = self.data.slice(base, usize::from(slots))?.to_vec();
                self.push_raw_span(&payload, "concat")?;
            }
        }
        self.push_raw_span(&b[..b_slots], "concat")?;
        self.push_cell(Cell::list(total), "concat")
    }

    /// `head (list -- elem|nil)`
    pub(crate) fn head(&mut self) -> VmResult<()> {
        let (operand, header, slots) = self.classify_list("head")?;
        if slots == 0 {
            self.consume_operand(&operand);
            return self.push_cell(Cell::NIL, "head");
        }
        let spans = self.element_spans_at(header)?;
        let (start, end) = spans[0];
        let element = self.data.slice(start, end - start)?.to_vec();
        self.consume_operand(&operand);
        self.push_raw_span(&element, "head")
    }

    /// `tail (list -- list')` — drops the first logical element; `( )` on
    /// the empty list.
    pub(crate) fn tail(&mut self) -> VmResult<()> {
        let (operand, header, slots) = self.classify_list("tail")?;
        if slots == 0 {
            if matches!(operand, ListOperand::InMemory) {
                self.push_cell(Cell::list(0), "tail")?;
            }
            return Ok(());
        }
        let spans = self.element_spans_at(header)?;
        let size = spans[0].1 - spans[0].0;
        let rest = slots - size as u16;
        match operand {
            ListOperand::OnStack { .. } => {
                self.pop_cell("tail")?; // header
                self.sp -= size;
                self.push_cell(Cell::list(rest), "tail")
            }
            ListOperand::InMemory => {
                let base = header - usize::from(slots);
                let payload = self.data.slice(base, usize::from(rest))?.to_vec();
                self.push_raw_span(&payload, "tail")?;
                self.push_cell(Cell::list(rest), "tail")
            }
        }
    }

    /// `uncons (list -- tail head)`
    pub(crate) fn uncons(&mut self) -> VmResult<()> {
        let (operand, header, slots) = self.classify_list("uncons")?;
        if slots == 0 {
            if matches!(operand, ListOperand::InMemory) {
                self.push_cell(Cell::list(0), "uncons")?;
            }
            return self.push_cell(Cell::NIL, "uncons");
        }
        let spans = self.element_spans_at(header)?;
        let (start, end) = spans[0];
        let element = self.data.slice(start, end - start)?.to_vec();
        let rest = slots - element.len() as u16;
        match operand {
            ListOperand::OnStack { .. } => {
                self.pop_cell("uncons")?; // header
                self.sp -= element.len();
            }
            ListOperand::InMemory => {
                let base = header - usize::from(slots);
                let payload = self.data.slice(base, usize::from(rest))?.to_vec();
                self.push_raw_span(&payload, "uncons")?;
            }
        }
        self.push_cell(Cell::list(rest), "uncons")?;
        self.push_raw_span(&element, "uncons")
    }

    /// `append (list value -- list')` — inserts at the logical end (the
    /// payload base).
    pub(crate) fn append(&mut self) -> VmResult<()> {
        let value = self.pop_span("append")?;
        let (operand, header, slots) = self.classify_list("append")?;
        let total = usize::from(slots) + value.len();
        let total_slots = u16::try_from(total)
            .map_err(|_| VmError::StackOverflow { word: "append", depth: self.depth() })?;
        match operand {
            ListOperand::OnStack { start } => {
                if self.sp + value.len() > crate::memory::STACK_LIMIT {
                    return Err(VmError::StackOverflow { word: "append", depth: self.depth() });
                }
                self.data.copy_cells(start, start + value.len(), self.sp - start)?;
                self.data.write_span(start, &value)?;
                self.sp += value.len();
                self.data.write(self.sp - 1, Cell::list(total_slots))
            }
            ListOperand::InMemory => {
                let base = header - usize::from(slots);
                let payload = self.data.slice(base, usize::from(slots))?.to_vec();
                self.push_raw_span(&value, "append")?;
                self.push_raw_span(&payload, "append")?;
                self.push_cell(Cell::list(total_slots), "append")
            }
        }
    }

    /// `reverse (list -- list')` — reverses the logical element order.
    pub(crate) fn reverse(&mut self) -> VmResult<()> {
        let span = self.pop_list_span("reverse")?;
        let spans = element_spans(&span);
        let mut payload: Vec<u32> = Vec::with_capacity(span.len() - 1);
        // Writing elements in logical order ascending flips the orientation.
        for &(start, end) in &spans {
            payload.extend_from_slice(&span[start..end]);
        }
        let slots = payload.len() as u16;
        self.push_raw_span(&payload, "reverse")?;
        self.push_cell(Cell::list(slots), "reverse")
    }

    /// `pack (items.. n -- list)` — headers the top n spans in place.
    pub(crate) fn pack(&mut self) -> VmResult<()> {
        let n_cell = self.pop_cell("pack")?;
        let n = self.expect_index(n_cell, "pack")?;
        let total = if n == 0 {
            0
        } else {
            let starts = self.span_starts(n, "pack")?;
            self.sp - starts[n - 1]
        };
        let slots = u16::try_from(total)
            .map_err(|_| VmError::StackOverflow { word: "pack", depth: self.depth() })?;
        self.push_cell(Cell::list(slots), "pack")
    }

    /// `unpack (list -- items..)` — strips the header, leaving the payload
    /// spans as stack items.
    pub(crate) fn unpack(&mut self) -> VmResult<()> {
        let (operand, header, slots) = self.classify_list("unpack")?;
        match operand {
            ListOperand::OnStack { .. } => {
                self.pop_cell("unpack")?;
                Ok(())
            }
            ListOperand::InMemory => {
                let base = header - usize::from(slots);
                let payload = self.data.slice(base, usize::from(slots))?.to_vec();
                self.push_raw_span(&payload, "unpack")
            }
        }
    }

    // === Path access ===

    /// `get (target path -- v|nil)` — walks string keys through maplists and
    /// numeric indices through elements. Any miss yields NIL.
    pub(crate) fn get(&mut self) -> VmResult<()> {
        let path = self.pop_list_span("get")?;
        let target = self.peek_cell("get")?;

        let (operand, start_addr) = if target.is_list() {
            let header = self.sp - 1;
            let start = header - usize::from(target.payload());
            (Some(start), header)
        } else if target.is_ref() {
            let reference = self.pop_cell("get")?;
            (None, self.ref_target(reference)?)
        } else {
            // A simple target answers only the empty path.
            let value = self.pop_cell("get")?;
            let result = if path.len() == 1 { value } else { Cell::NIL };
            return self.push_cell(result, "get");
        };

        let resolved = self.walk_path(start_addr, &path)?;
        let result: Vec<u32> = match resolved {
            Some(addr) => {
                let cell = self.data.read(addr)?;
                if cell.is_list() {
                    let slots = usize::from(cell.payload());
                    self.data.slice(addr - slots, slots + 1)?.to_vec()
                } else if cell.is_ref() {
                    let target = self.ref_target(cell)?;
                    let final_cell = self.data.read(target)?;
                    if final_cell.is_list() {
                        let slots = usize::from(final_cell.payload());
                        self.data.slice(target - slots, slots + 1)?.to_vec()
                    } else {
                        vec![final_cell.bits()]
                    }
                } else {
                    vec![cell.bits()]
                }
            }
            None => vec![Cell::NIL.bits()],
        };
        if let Some(start) = operand {
            self.sp = start;
        }
        self.push_raw_span(&result, "get")
    }

    /// `set (value target path -- )` — walks to an address and stores there.
    /// The target must be a reference (mutating a stack copy would be lost
    /// with the copy). An empty path or a missed step consumes the operands
    /// and does nothing.
    pub(crate) fn set(&mut self) -> VmResult<()> {
        let path = self.pop_list_span("set")?;
        let reference = self.pop_cell("set")?;
        if !reference.is_ref() {
            return Err(VmError::TypeMismatch {
                word: "set",
                expected: "a reference target",
                found: self.describe(reference),
            });
        }
        let start_addr = self.ref_target(reference)?;
        if path.len() == 1 {
            self.drop_top()?;
            return Ok(());
        }
        match self.walk_path(start_addr, &path)? {
            Some(addr) => self.store_at(addr),
            None => {
                self.drop_top()?;
                Ok(())
            }
        }
    }

    /// Walks a path span (a list in scratch form) from a header address.
    /// Returns the final cell address, or `None` when the path misses.
    fn walk_path(&self, start: usize, path: &[u32]) -> VmResult<Option<usize>> {
        let steps = element_spans(path);
        let mut addr = start;
        // Steps apply in source order: base order is the reverse of logical.
        for &(s, e) in steps.iter().rev() {
            if e - s != 1 {
                return Ok(None);
            }
            let step = Cell::from_bits(path[s]);
            let mut here = self.data.read(addr)?;
            if here.is_ref() {
                addr = usize::from(here.payload());
                here = self.data.read(addr)?;
            }
            if !here.is_list() {
                return Ok(None);
            }
            let next = match step.tag() {
                Tag::Number => {
                    let index = match step.as_number() {
                        Some(n) if n >= 0.0 && n.fract() == 0.0 => n as usize,
                        _ => return Ok(None),
                    };
                    let spans = self.element_spans_at(addr)?;
                    match spans.get(index) {
                        Some(&(_, end)) => end - 1,
                        None => return Ok(None),
                    }
                }
                Tag::String => {
                    let spans = self.element_spans_at(addr)?;
                    let mut found = None;
                    let mut pairs = spans.iter().rev();
                    while let (Some(&(ks, ke)), Some(&(_, ve))) = (pairs.next(), pairs.next()) {
                        if ke - ks == 1 && self.data.read(ks)? == step {
                            found = Some(ve - 1);
                            break;
                        }
                    }
                    match found {
                        Some(a) => a,
                        None => return Ok(None),
                    }
                }
                _ => return Ok(None),
            };
            addr = next;
        }
        Ok(Some(addr))
    }
}

/// Element spans within a scratch span slice (payload plus header, header
/// last). Logical order: element 0 first.
pub(crate) fn element_spans(span: &[u32]) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let header = span.len() - 1;
    let mut top = header;
    while top > 0 {
        let cell = Cell::from_bits(span[top - 1]);
        let size = if cell.is_list() { usize::from(cell.payload()) + 1 } else { 1 };
        let size = size.min(top);
        spans.push((top - size, top));
        top -= size;
    }
    spans
}
