//! The rule/action rewrite engine.
//!
//! # Architecture
//!
//! - [`rule`] - The [`Rule`] contract: one local pattern-match and rewrite
//! - [`pool`] - [`ActionPool`]: opcode-dispatched application of a rule set
//! - [`action`] - The [`Action`] contract and its perform state machine
//! - [`group`] - [`ActionGroup`]: ordered sequencing of child actions
//! - [`restart`] - [`ActionRestartGroup`]: the bounded outer convergence loop
//! - [`grouplist`] - [`ActionGroupList`]: group tags selecting a profile's members
//! - [`context`] - [`EngineContext`]: change and pass accounting for one function's run
//! - [`database`] - [`ActionDatabase`]: profiles and the universal action tree
//! - [`options`] - [`OptionDatabase`]: the textual configuration protocol
//! - [`events`] - Structured, queryable event log
//! - [`session`] - [`Decompilation`]: one function's run, resumable after a breakpoint
//!
//! The [`Engine`] ties these together: it derives the configured profile's root action and
//! runs a private copy of it over each function, one function per rayon task in
//! [`Engine::decompile_all`].
//!
//! # Example
//!
//! ```rust
//! use pcodeopt::engine::{Engine, EngineConfig};
//! use pcodeopt::ir::{Address, FunctionBuilder, OpCode};
//!
//! # fn main() -> pcodeopt::Result<()> {
//! let mut b = FunctionBuilder::new("f", Address::ram(0x1000));
//! let v = b.input(4, Address::register(0));
//! let x = b.op(OpCode::IntXor, &[v, v], 4)?;
//! b.op_void(OpCode::Return, &[x])?;
//! let mut data = b.finish();
//!
//! let engine = Engine::new(EngineConfig::default())?;
//! let summary = engine.decompile(&mut data)?;
//! assert!(summary.changes > 0);
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod config;
pub mod context;
pub mod database;
pub mod events;
pub mod group;
pub mod grouplist;
pub mod options;
pub mod pool;
pub mod restart;
pub mod rule;
pub mod session;

pub use action::{find_action, Action, ActionBase, ActionFlags, ActionStats, ActionStatus, Outcome};
pub use config::EngineConfig;
pub use context::EngineContext;
pub use database::ActionDatabase;
pub use events::{DerivedStats, Event, EventKind, EventLog};
pub use group::ActionGroup;
pub use grouplist::ActionGroupList;
pub use options::OptionDatabase;
pub use pool::ActionPool;
pub use restart::ActionRestartGroup;
pub use rule::Rule;
pub use session::Decompilation;

use std::time::Duration;

use dashmap::DashMap;
use rayon::prelude::*;

use crate::{ir::Funcdata, Error, Result};

/// What happened to one function.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// The function's name.
    pub function: String,
    /// Number of changes committed.
    pub changes: usize,
    /// `true` if the run stopped at a breakpoint.
    pub halted: bool,
    /// Wall-clock time of the run.
    pub elapsed: Duration,
    /// Events recorded for this function.
    pub events: EventLog,
}

/// Runs a profile's root action over functions.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    root: Box<dyn Action>,
    groups: ActionGroupList,
    stats: DashMap<String, ActionStats>,
    events: EventLog,
}

impl Engine {
    /// Builds the universal tree, derives the configured profile and applies the
    /// configured option commands.
    ///
    /// # Errors
    ///
    /// Fails if the profile is unknown or an option command is rejected.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let mut db = ActionDatabase::new();
        db.set_max_restarts(config.max_restarts);
        db.universal_action();
        db.set_current(&config.current_action)?;
        {
            let mut options = OptionDatabase::new(&mut db);
            for command in &config.options {
                let msg = options
                    .parse_command(command)
                    .map_err(|e| e.context(format!("option '{}'", command)))?;
                tracing::debug!(command = %command, "{}", msg);
            }
        }
        Self::from_database(&db, config)
    }

    /// Uses the current root action of an already configured database.
    ///
    /// # Errors
    ///
    /// Fails if the database has no current root action.
    pub fn from_database(db: &ActionDatabase, config: EngineConfig) -> Result<Self> {
        let missing = || Error::UnknownAction("no current root action".to_string());
        let current = db.current().ok_or_else(missing)?;
        let groups = db.current_groups().cloned().ok_or_else(missing)?;
        let root = current.clone_action(&groups).ok_or_else(missing)?;
        Ok(Self {
            config,
            root,
            groups,
            stats: DashMap::new(),
            events: EventLog::new(),
        })
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The root action every function run is copied from.
    #[must_use]
    pub fn root(&self) -> &dyn Action {
        self.root.as_ref()
    }

    /// Starts a resumable run over one function.
    ///
    /// The returned [`Decompilation`] keeps the function's copy of the root action between
    /// calls to [`Decompilation::run`], so a run halted at a breakpoint can be continued.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownAction`] if the configured profile has no root.
    pub fn begin<'a>(&'a self, data: &'a mut Funcdata) -> Result<Decompilation<'a>> {
        Decompilation::new(self, data)
    }

    /// Analyzes one function until it completes or a breakpoint halts it.
    ///
    /// Errors are recorded as a function warning and returned with the function's name
    /// attached; the function is left as the failing rewrite found it. A halted run cannot
    /// be continued from here; use [`Engine::begin`] for that.
    ///
    /// # Errors
    ///
    /// Returns structural errors raised by actions or rules.
    pub fn decompile(&self, data: &mut Funcdata) -> Result<RunSummary> {
        self.begin(data)?.run()
    }

    /// Analyzes many functions in parallel. Each function gets its own copy of the root
    /// action and its own context; a failure affects only its own entry.
    pub fn decompile_all(&self, functions: &mut [Funcdata]) -> Vec<Result<RunSummary>> {
        functions
            .par_iter_mut()
            .map(|data| self.decompile(data))
            .collect()
    }

    /// Per-rule statistics accumulated over every function analyzed, sorted by name.
    #[must_use]
    pub fn rule_stats(&self) -> Vec<(String, ActionStats)> {
        let mut stats: Vec<(String, ActionStats)> = self
            .stats
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        stats.sort_by(|a, b| a.0.cmp(&b.0));
        stats
    }

    /// The engine-wide event log.
    #[must_use]
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Summary statistics over every function analyzed.
    #[must_use]
    pub fn derived_stats(&self) -> DerivedStats {
        DerivedStats::from_log(&self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Address, FunctionBuilder, OpCode};

    #[test]
    fn test_unknown_profile_rejected() {
        assert!(Engine::new(EngineConfig::default().with_action("nosuch")).is_err());
    }

    #[test]
    fn test_bad_option_rejected() {
        let config = EngineConfig::default().with_option("togglerule");
        assert!(matches!(
            Engine::new(config),
            Err(Error::Context { .. })
        ));
    }

    #[test]
    fn test_stats_accumulate() -> Result<()> {
        let engine = Engine::new(EngineConfig::checked())?;
        for _ in 0..2 {
            let mut b = FunctionBuilder::new("f", Address::ram(0x1000));
            let v = b.input(4, Address::register(0));
            let x = b.op(OpCode::IntXor, &[v, v], 4)?;
            b.op_void(OpCode::Return, &[x])?;
            let mut data = b.finish();
            let summary = engine.decompile(&mut data)?;
            assert!(!summary.halted);
        }
        let stats = engine.rule_stats();
        let trivial = stats
            .iter()
            .find(|(name, _)| name == "trivialarith")
            .map(|(_, s)| *s)
            .unwrap_or_default();
        assert_eq!(trivial.applies, 2);
        assert_eq!(engine.events().count_kind(EventKind::FunctionCompleted), 2);
        Ok(())
    }
}
