//! Per-function run state threaded through every action and rule.
//!
//! Actions and rules are long-lived and shared by configuration, so nothing that belongs to
//! one function's run is stored on them. Instead an [`EngineContext`] is created for each
//! function and passed to every `apply`:
//!
//! - the monotonic change counter, from which actions derive how much they changed
//! - per-action pass counters, cleared when the owning action is reset
//! - the pass index of the dispatch sweep currently running, visible to rules
//! - the invariant-checking switch
//! - the function's [`EventLog`]

use std::collections::HashMap;

use crate::engine::events::EventLog;

/// Run state for analyzing one function.
#[derive(Debug, Default)]
pub struct EngineContext {
    changes: usize,
    passes: HashMap<String, usize>,
    pass: usize,
    check_invariants: bool,
    /// Events recorded while analyzing the function.
    pub events: EventLog,
}

impl EngineContext {
    /// Creates a fresh context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables verification of the IR after every committed rewrite.
    #[must_use]
    pub fn with_invariant_checks(mut self, on: bool) -> Self {
        self.check_invariants = on;
        self
    }

    /// Returns `true` if rewrites are verified as they commit.
    #[must_use]
    pub fn check_invariants(&self) -> bool {
        self.check_invariants
    }

    /// Total number of changes made so far.
    #[must_use]
    pub fn changes(&self) -> usize {
        self.changes
    }

    /// Records `n` committed changes.
    pub fn add_changes(&mut self, n: usize) {
        self.changes += n;
    }

    /// Pass index of the sweep currently running: how many complete sweeps its pool has
    /// performed on this function before.
    #[must_use]
    pub fn pass(&self) -> usize {
        self.pass
    }

    pub(crate) fn set_pass(&mut self, pass: usize) {
        self.pass = pass;
    }

    /// Number of completed passes of the named action.
    #[must_use]
    pub fn passes_of(&self, action: &str) -> usize {
        self.passes.get(action).copied().unwrap_or(0)
    }

    /// Counts one more completed pass of the named action.
    pub fn bump_passes(&mut self, action: &str) {
        *self.passes.entry(action.to_string()).or_insert(0) += 1;
    }

    /// Forgets the pass count of the named action.
    pub fn clear_passes(&mut self, action: &str) {
        self.passes.remove(action);
    }
}
