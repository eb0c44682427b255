//! Compile-time state.
//!
//! The VM owns exactly one [`Compiler`]. Control-flow fix-up state lives on
//! the data and return stacks (closers and branch placeholders, see the
//! parser); the record here holds only what cannot: the open definition, the
//! persistent top-level local count, and bookkeeping used for diagnostics.

/// Compile-time state owned by the VM.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Compiler {
    /// Local slots allocated in the root frame by top-level `var`s. Persists
    /// across submissions, unlike definition-local counts.
    pub root_locals: u16,
    /// The currently open `:` definition, if any.
    pub def: Option<DefState>,
    /// Number of closers currently parked on the data stack. Used to report
    /// unclosed constructs at end of input.
    pub closer_depth: usize,
    /// One flag per nested open `case`: has DEFAULT been seen.
    pub case_defaults: Vec<bool>,
    /// Compile-time `(`/`)` balance, for unclosed-list diagnostics.
    pub list_depth: usize,
}

impl Compiler {
    /// Local count of the frame currently being compiled into.
    #[must_use]
    pub fn local_count(&self) -> u16 {
        match &self.def {
            Some(def) => def.local_count,
            None => self.root_locals,
        }
    }

    /// Allocates the next local slot in the current frame.
    pub fn bump_locals(&mut self) -> u16 {
        match &mut self.def {
            Some(def) => {
                let slot = def.local_count;
                def.local_count += 1;
                slot
            }
            None => {
                let slot = self.root_locals;
                self.root_locals += 1;
                slot
            }
        }
    }

    /// Drops all transient compile state. Called when a submission is rolled
    /// back after a parse error.
    pub fn reset_transient(&mut self) {
        self.def = None;
        self.closer_depth = 0;
        self.case_defaults.clear();
        self.list_depth = 0;
    }
}

/// State of an open `: name … ;` definition.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DefState {
    pub name: String,
    /// Entry address of the body (the `Reserve` instruction).
    pub entry: u16,
    /// Operand position of the forward branch that skips the definition.
    pub branch_pos: usize,
    /// Operand position of the `Reserve`, patched with the final local count.
    pub reserve_pos: usize,
    /// Heap snapshot taken at `:`; restored at `;` to forget local names.
    pub dict_mark: usize,
    pub local_count: u16,
    /// Entry address of the finally wrapper, when the body used `finally`.
    pub wrapper: Option<u16>,
    /// True once compilation is past `finally`, inside the cleanup region.
    pub in_cleanup: bool,
}
