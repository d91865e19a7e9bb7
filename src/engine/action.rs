//! The action contract and its perform state machine.
//!
//! An [`Action`] is a named, composable unit of work. Leaves wrap a rule dispatch sweep or a
//! bespoke analysis; groups sequence children. Every action is driven through
//! [`Action::perform`], which layers the common behavior on top of the action's own
//! [`Action::apply`]:
//!
//! - repeat-apply: re-apply while the last application changed something
//! - completion: once-per-function and one-act-per-function actions stop running
//! - breakpoints: halt before the action starts or after it made a change, and resume
//!   exactly where the run stopped on the next `perform`
//! - warnings: report the first time a flagged action changes a function
//!
//! # Status transitions
//!
//! ```text
//! Start ──▶ (BreakStart) ──▶ apply ──▶ Repeat ──▶ apply ... ──▶ Start | Completed
//!                               │
//!                               ├─ halted inside ──▶ Running ──▶ resume apply
//!                               └─ break on change ──▶ ActionBreak ──▶ Repeat
//! ```
//!
//! How much an action changed is never stored on the action: `perform` takes the delta of
//! the context's monotonic change counter.

use bitflags::bitflags;

use crate::{
    engine::{events::EventKind, ActionGroupList, EngineContext},
    ir::Funcdata,
    Result,
};

bitflags! {
    /// Behavior flags of an action.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ActionFlags: u32 {
        /// Re-apply until an application makes no change.
        const REPEAT_APPLY = 1 << 0;
        /// Perform at most once per function.
        const ONCE_PER_FUNC = 1 << 1;
        /// Stop performing once a perform made a change.
        const ONE_ACT_PER_FUNC = 1 << 2;
        /// Report the first change made.
        const WARNINGS_ON = 1 << 3;
        /// The report has been issued.
        const WARNINGS_GIVEN = 1 << 4;
        /// Halt before the action starts.
        const BREAK_START = 1 << 5;
        /// Halt after the action made a change.
        const BREAK_ACTION = 1 << 6;
        /// Halt before the action starts, once.
        const TMP_BREAK = 1 << 7;
        /// Skip the action entirely.
        const DISABLED = 1 << 8;
    }
}

/// Where an action is in its perform cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ActionStatus {
    /// Ready to start a fresh perform.
    #[default]
    Start,
    /// Halted on a start breakpoint; the next perform applies.
    BreakStart,
    /// Between repeat-apply iterations.
    Repeat,
    /// Halted inside `apply`; the next perform resumes it.
    Running,
    /// Done for this function.
    Completed,
    /// Halted on an action breakpoint after a change.
    ActionBreak,
}

/// Result of applying or performing an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Ran to completion, making this many changes.
    Done(usize),
    /// Stopped at a breakpoint; performing again resumes the run.
    Halted,
}

impl Outcome {
    /// Returns `true` for [`Outcome::Halted`].
    #[must_use]
    pub fn is_halted(&self) -> bool {
        matches!(self, Outcome::Halted)
    }

    /// The change count, zero when halted.
    #[must_use]
    pub fn changes(&self) -> usize {
        match self {
            Outcome::Done(n) => *n,
            Outcome::Halted => 0,
        }
    }
}

/// How often an action (or rule) was tried and how often it changed something.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActionStats {
    /// Number of performs (rule: number of ops tested).
    pub tests: usize,
    /// Number of performs that changed something (rule: number of rewrites).
    pub applies: usize,
}

impl ActionStats {
    /// Adds `other` into `self`.
    pub fn merge(&mut self, other: &ActionStats) {
        self.tests += other.tests;
        self.applies += other.applies;
    }
}

/// State shared by every action.
#[derive(Debug, Clone, Default)]
pub struct ActionBase {
    /// Name used for lookup, toggling and diagnostics.
    pub name: String,
    /// Group tag deciding which profiles include the action.
    pub group: String,
    /// Behavior flags.
    pub flags: ActionFlags,
    /// Current position in the perform cycle.
    pub status: ActionStatus,
    /// Statistics across all functions.
    pub stats: ActionStats,
    count_start: usize,
    last_count: usize,
}

impl ActionBase {
    /// Creates the base state.
    #[must_use]
    pub fn new(flags: ActionFlags, name: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
            flags,
            ..Self::default()
        }
    }

    /// A copy for a newly cloned action: same identity and flags, fresh run state.
    #[must_use]
    pub fn fresh(&self) -> Self {
        Self::new(self.flags - ActionFlags::WARNINGS_GIVEN, &self.name, &self.group)
    }

    /// Returns to `Start` and forgets that warnings were given.
    pub fn reset(&mut self) {
        self.status = ActionStatus::Start;
        self.flags.remove(ActionFlags::WARNINGS_GIVEN);
    }

    fn check_start_break(&mut self) -> bool {
        if self.flags.intersects(ActionFlags::BREAK_START | ActionFlags::TMP_BREAK) {
            self.flags.remove(ActionFlags::TMP_BREAK);
            return true;
        }
        false
    }

    fn check_action_break(&self) -> bool {
        self.flags.contains(ActionFlags::BREAK_ACTION)
    }
}

/// A composable unit of work on a function.
pub trait Action: Send + Sync + std::fmt::Debug {
    /// Shared state.
    fn base(&self) -> &ActionBase;

    /// Shared state, mutably.
    fn base_mut(&mut self) -> &mut ActionBase;

    /// Runs one application. Implementations record every change with
    /// [`EngineContext::add_changes`] and return the number made.
    ///
    /// # Errors
    ///
    /// Returns structural errors from the IR or from rules.
    fn apply(&mut self, data: &mut Funcdata, ctx: &mut EngineContext) -> Result<Outcome>;

    /// Builds a fresh copy containing only members enabled by `groups`, or `None` if nothing
    /// survives.
    fn clone_action(&self, groups: &ActionGroupList) -> Option<Box<dyn Action>>;

    /// Prepares the action for a new function (or a restart of the current one).
    fn reset(&mut self, _data: &Funcdata, ctx: &mut EngineContext) {
        self.base_mut().reset();
        ctx.clear_passes(&self.base().name);
    }

    /// Child actions, for groups.
    fn children(&self) -> &[Box<dyn Action>] {
        &[]
    }

    /// Child actions, mutably.
    fn children_mut(&mut self) -> &mut [Box<dyn Action>] {
        &mut []
    }

    /// Enables or disables the rule `name` anywhere below this action. Returns `true` if a
    /// rule was found.
    fn set_rule_enabled(&mut self, name: &str, on: bool) -> bool {
        let mut found = false;
        for child in self.children_mut() {
            found |= child.set_rule_enabled(name, on);
        }
        found
    }

    /// Switches applied-once warnings for the rule `name` anywhere below this action.
    fn set_rule_warnings(&mut self, name: &str, on: bool) -> bool {
        let mut found = false;
        for child in self.children_mut() {
            found |= child.set_rule_warnings(name, on);
        }
        found
    }

    /// Changes the restart bound of every restart controller at or below this action.
    /// Returns `true` if one was found.
    fn set_max_restarts(&mut self, max: usize) -> bool {
        let mut found = false;
        for child in self.children_mut() {
            found |= child.set_max_restarts(max);
        }
        found
    }

    /// Appends per-rule statistics of every pool below this action.
    fn rule_stats(&self, out: &mut Vec<(String, ActionStats)>) {
        for child in self.children() {
            child.rule_stats(out);
        }
    }

    /// The action's name.
    fn name(&self) -> &str {
        &self.base().name
    }

    /// The action's group tag.
    fn group(&self) -> &str {
        &self.base().group
    }

    /// The action's status.
    fn status(&self) -> ActionStatus {
        self.base().status
    }

    /// Performs the action: applies it (repeatedly, if flagged) and updates status,
    /// statistics, warnings and breakpoints.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`Action::apply`].
    fn perform(&mut self, data: &mut Funcdata, ctx: &mut EngineContext) -> Result<Outcome> {
        if self.base().flags.contains(ActionFlags::DISABLED) {
            return Ok(Outcome::Done(0));
        }
        loop {
            let changes = ctx.changes();
            let base = self.base_mut();
            let run = match base.status {
                ActionStatus::Completed => return Ok(Outcome::Done(0)),
                ActionStatus::Start => {
                    base.count_start = changes;
                    if base.check_start_break() {
                        base.status = ActionStatus::BreakStart;
                        ctx.events
                            .record(EventKind::Breakpoint)
                            .function(data.name())
                            .source(base.name.as_str())
                            .message("break at start");
                        return Ok(Outcome::Halted);
                    }
                    base.stats.tests += 1;
                    base.last_count = changes;
                    true
                }
                ActionStatus::BreakStart | ActionStatus::Repeat => {
                    base.last_count = changes;
                    true
                }
                ActionStatus::Running => true,
                ActionStatus::ActionBreak => false,
            };

            if run {
                tracing::trace!(action = %self.name(), function = %data.name(), "apply");
                if self.apply(data, ctx)?.is_halted() {
                    self.base_mut().status = ActionStatus::Running;
                    return Ok(Outcome::Halted);
                }
                if ctx.changes() > self.base().last_count {
                    self.issue_warning(data, ctx);
                    self.base_mut().stats.applies += 1;
                    if self.base().check_action_break() {
                        self.base_mut().status = ActionStatus::ActionBreak;
                        ctx.events
                            .record(EventKind::Breakpoint)
                            .function(data.name())
                            .source(self.name())
                            .message("break after change");
                        return Ok(Outcome::Halted);
                    }
                }
            }

            let base = self.base_mut();
            base.status = ActionStatus::Repeat;
            let changed = ctx.changes() > base.last_count;
            if !(changed && base.flags.contains(ActionFlags::REPEAT_APPLY)) {
                break;
            }
        }

        let base = self.base_mut();
        let count = ctx.changes() - base.count_start;
        let once = base.flags.contains(ActionFlags::ONCE_PER_FUNC);
        let one_act = base.flags.contains(ActionFlags::ONE_ACT_PER_FUNC);
        base.status = if once || (one_act && count > 0) {
            ActionStatus::Completed
        } else {
            ActionStatus::Start
        };
        if count > 0 {
            ctx.events
                .record(EventKind::ActionApplied)
                .function(data.name())
                .source(base.name.as_str())
                .message(format!("{count} changes"));
        }
        Ok(Outcome::Done(count))
    }

    /// Issues the applied-once warning if warnings are on for this action.
    fn issue_warning(&mut self, data: &Funcdata, ctx: &mut EngineContext) {
        let base = self.base_mut();
        if base.flags & (ActionFlags::WARNINGS_ON | ActionFlags::WARNINGS_GIVEN)
            == ActionFlags::WARNINGS_ON
        {
            base.flags |= ActionFlags::WARNINGS_GIVEN;
            tracing::warn!(action = %base.name, function = %data.name(), "applied action");
            ctx.events
                .record(EventKind::Warning)
                .function(data.name())
                .source(base.name.as_str())
                .message(format!("Applied action {}", base.name));
        }
    }
}

/// Finds an action by name or by `:`-separated path below (and including) `root`.
///
/// A path may start at any level: `fullloop:mainloop` finds `mainloop` inside the first
/// `fullloop`. A bare name matches the first action with that name, depth first.
pub fn find_action<'a>(
    root: &'a mut (dyn Action + 'static),
    spec: &str,
) -> Option<&'a mut (dyn Action + 'static)> {
    if root.name() == spec {
        return Some(root);
    }
    let rest = match spec.split_once(':') {
        Some((head, rest)) if root.name() == head => rest,
        _ => spec,
    };
    for child in root.children_mut() {
        if let Some(found) = find_action(child.as_mut(), rest) {
            return Some(found);
        }
    }
    None
}
