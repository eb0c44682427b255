//! Stateful sessions.
//!
//! A [`Repl`] keeps one VM alive across submissions: definitions, globals and
//! the data stack persist, and each `feed` compiles only the newly supplied
//! text and executes it from there. A failed parse rolls the VM back to the
//! pre-submission mark (code, dictionary, heap and stacks), leaving earlier
//! definitions intact; a failed run keeps state for inspection but clears
//! the error machinery so the session stays usable.
//!
//! Sessions serialize: `dump` captures the whole VM image with postcard and
//! `load` restores it, rebuilding the string digest's dedup map.

use crate::error::{TacitError, TacitResult};
use crate::io::{NoPrint, PrintWriter};
use crate::parser;
use crate::value::TacitValue;
use crate::vm::Vm;

/// A live session around one VM.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Repl {
    vm: Vm,
}

impl Repl {
    #[must_use]
    pub fn new() -> Self {
        Self { vm: Vm::new() }
    }

    /// Compiles and runs one submission.
    pub fn feed<P: PrintWriter>(&mut self, source: &str, print: &mut P) -> TacitResult<()> {
        let mark = Mark::of(&self.vm);
        let start = self.vm.code.here();
        if let Err(parse_error) = parser::compile(&mut self.vm, source) {
            mark.restore(&mut self.vm);
            return Err(TacitError::Parse(parse_error));
        }
        match self.vm.execute(start, print) {
            Ok(()) => Ok(()),
            Err(run_error) => {
                // Discard whatever frames the failed run left behind so the
                // session stays usable; the data stack is kept for
                // inspection.
                self.vm.in_finally = false;
                self.vm.list_depth = 0;
                self.vm.bp = crate::memory::RSTACK_BASE;
                self.vm.rsp = mark.rsp;
                Err(TacitError::Run(run_error))
            }
        }
    }

    /// `feed` with output discarded.
    pub fn feed_no_print(&mut self, source: &str) -> TacitResult<()> {
        self.feed(source, &mut NoPrint)
    }

    /// The data stack, bottom to top.
    #[must_use]
    pub fn stack(&self) -> Vec<TacitValue> {
        self.vm.stack_values()
    }

    /// Borrow of the underlying VM.
    #[must_use]
    pub fn vm(&self) -> &Vm {
        &self.vm
    }

    /// Serializes the whole session to bytes.
    pub fn dump(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    /// Restores a session serialized with [`Repl::dump`].
    pub fn load(bytes: &[u8]) -> Result<Self, postcard::Error> {
        let mut repl: Self = postcard::from_bytes(bytes)?;
        repl.vm.digest.rehydrate();
        Ok(repl)
    }
}

/// Pre-submission state for parse-error rollback.
struct Mark {
    cp: usize,
    sp: usize,
    rsp: usize,
    gp: usize,
    dict_head: crate::cell::Cell,
    root_locals: u16,
}

impl Mark {
    fn of(vm: &Vm) -> Self {
        Self {
            cp: vm.code.here(),
            sp: vm.sp,
            rsp: vm.rsp,
            gp: vm.gp,
            dict_head: vm.dict_head,
            root_locals: vm.compiler.root_locals,
        }
    }

    fn restore(&self, vm: &mut Vm) {
        vm.code.rewind(self.cp);
        vm.sp = self.sp;
        vm.rsp = self.rsp;
        vm.gp = self.gp;
        vm.dict_head = self.dict_head;
        vm.compiler.root_locals = self.root_locals;
        vm.compiler.reset_transient();
    }
}
