//! The dictionary: a linked list of 3-cell records in the global heap.
//!
//! Each entry is a `LIST` of three cells allocated on the heap:
//!
//! ```text
//! cell 0: DATA_REF(previous entry) or NIL
//! cell 1: the binding (a tagged value: CODE, LOCAL, DATA_REF, ...)
//! cell 2: STRING(name offset)
//! cell 3: LIST(3) header
//! ```
//!
//! `dict_head` points at cell 0 of the most recent entry. Lookup walks the
//! chain newest-first, so redefinition shadows. The dictionary doubles as
//! the symbol table for builtins, colon definitions, global variables and
//! (during compilation) local names; forgetting to a heap mark removes local
//! entries and reclaims their cells in one step.

use crate::cell::Cell;
use crate::error::VmResult;
use crate::vm::Vm;

impl Vm {
    /// Defines `name`, shadowing any previous binding.
    pub fn define(&mut self, name: &str, value: Cell) -> VmResult<()> {
        let sym = self.digest.intern(name)?;
        let entry = [
            self.dict_head.bits(),
            value.bits(),
            Cell::string(sym).bits(),
            Cell::list(3).bits(),
        ];
        let header = self.heap_alloc(&entry)?;
        let first_cell = header - 3;
        self.dict_head = Cell::data_ref(first_cell as u16);
        Ok(())
    }

    /// Looks up `name`; the most recent definition wins.
    pub fn lookup(&self, name: &str) -> VmResult<Option<Cell>> {
        let Some(sym) = self.digest.find(name) else {
            return Ok(None);
        };
        let wanted = Cell::string(sym);
        let mut cursor = self.dict_head;
        while cursor.is_ref() {
            let entry = usize::from(cursor.payload());
            if self.data.read(entry + 2)? == wanted {
                return Ok(Some(self.data.read(entry + 1)?));
            }
            cursor = self.data.read(entry)?;
        }
        Ok(None)
    }
}
