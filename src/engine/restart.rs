//! The outer convergence loop.
//!
//! Some rewrites invalidate conclusions drawn earlier in the run, most notably resolving
//! an indirect call to a known function. Such a rewrite records what it learned on the
//! [`Funcdata`] (e.g. as a call override) and sets the restart flag. The
//! [`ActionRestartGroup`] notices the flag after a full pass of its children, throws away
//! the analysis, resets its children and runs them again on the pristine body, which now
//! picks up the recorded knowledge.
//!
//! The number of restarts is bounded. Running out of restarts is reported as a function
//! warning; the function keeps whatever the last pass produced.

use crate::{
    engine::{
        action::{Action, ActionBase, ActionFlags, ActionStatus, Outcome},
        events::EventKind,
        group::ActionGroup,
        ActionGroupList, EngineContext,
    },
    ir::Funcdata,
    Result,
};

/// Default bound on restarts per function.
pub const DEFAULT_MAX_RESTARTS: usize = 1;

/// Warning attached to a function that still wanted a restart when the bound was reached.
pub const RESTART_LIMIT_WARNING: &str = "Exceeded maximum restarts with more pending";

/// A group whose children are re-run from scratch while a restart is pending.
#[derive(Debug)]
pub struct ActionRestartGroup {
    group: ActionGroup,
    max_restarts: usize,
    current_restart: Option<usize>,
}

impl ActionRestartGroup {
    /// Creates an empty restart group allowing `max_restarts` restarts.
    #[must_use]
    pub fn new(flags: ActionFlags, name: impl Into<String>, max_restarts: usize) -> Self {
        Self {
            group: ActionGroup::new(flags, name),
            max_restarts,
            current_restart: Some(0),
        }
    }

    /// Appends a child action.
    pub fn add_action(&mut self, action: Box<dyn Action>) {
        self.group.add_action(action);
    }

    /// Builder form of [`ActionRestartGroup::add_action`].
    #[must_use]
    pub fn with(mut self, action: impl Action + 'static) -> Self {
        self.add_action(Box::new(action));
        self
    }

    /// The restart bound.
    #[must_use]
    pub fn max_restarts(&self) -> usize {
        self.max_restarts
    }

    /// Changes the restart bound.
    pub fn set_max_restarts(&mut self, max: usize) {
        self.max_restarts = max;
    }

    /// Restarts performed so far, `None` once the loop has finished for this function.
    #[must_use]
    pub fn current_restart(&self) -> Option<usize> {
        self.current_restart
    }
}

impl Action for ActionRestartGroup {
    fn base(&self) -> &ActionBase {
        self.group.base()
    }

    fn base_mut(&mut self) -> &mut ActionBase {
        self.group.base_mut()
    }

    fn apply(&mut self, data: &mut Funcdata, ctx: &mut EngineContext) -> Result<Outcome> {
        let Some(mut restart) = self.current_restart else {
            return Ok(Outcome::Done(0));
        };
        let start = ctx.changes();
        loop {
            if self.group.apply_children(data, ctx)?.is_halted() {
                return Ok(Outcome::Halted);
            }
            if !data.has_restart_pending() || data.is_jumptable_recovery_on() {
                if !data.has_restart_pending() {
                    self.current_restart = None;
                }
                return Ok(Outcome::Done(ctx.changes() - start));
            }

            restart += 1;
            if restart > self.max_restarts {
                data.warning_header(RESTART_LIMIT_WARNING);
                ctx.events
                    .record(EventKind::RestartLimit)
                    .function(data.name())
                    .source(self.name())
                    .message(format!("gave up after {} restarts", self.max_restarts));
                self.current_restart = None;
                return Ok(Outcome::Done(ctx.changes() - start));
            }
            self.current_restart = Some(restart);

            tracing::debug!(function = %data.name(), restart, "restarting analysis");
            ctx.events
                .record(EventKind::Restart)
                .function(data.name())
                .source(self.name())
                .message(format!("restart {restart}"));
            data.clear_analysis();
            self.group.reset_children(data, ctx);
            self.group.base_mut().status = ActionStatus::Start;
        }
    }

    fn clone_action(&self, groups: &ActionGroupList) -> Option<Box<dyn Action>> {
        let children = self.group.clone_children(groups);
        if children.is_empty() {
            return None;
        }
        let mut cloned = ActionRestartGroup::new(ActionFlags::empty(), "", self.max_restarts);
        *cloned.base_mut() = self.base().fresh();
        for child in children {
            cloned.add_action(child);
        }
        Some(Box::new(cloned))
    }

    fn reset(&mut self, data: &Funcdata, ctx: &mut EngineContext) {
        self.group.reset(data, ctx);
        self.current_restart = Some(0);
    }

    fn set_max_restarts(&mut self, max: usize) -> bool {
        self.max_restarts = max;
        true
    }

    fn children(&self) -> &[Box<dyn Action>] {
        self.group.children()
    }

    fn children_mut(&mut self) -> &mut [Box<dyn Action>] {
        self.group.children_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{empty_function, RestartRequester};

    #[test]
    fn test_no_restart_finishes() -> Result<()> {
        let mut data = empty_function();
        let mut ctx = EngineContext::new();
        let mut root = ActionRestartGroup::new(ActionFlags::ONCE_PER_FUNC, "universal", 3)
            .with(RestartRequester::new(0));
        root.perform(&mut data, &mut ctx)?;
        assert_eq!(root.current_restart(), None);
        assert!(data.warnings().is_empty());
        Ok(())
    }

    #[test]
    fn test_restart_bound_warns_once() -> Result<()> {
        let mut data = empty_function();
        let mut ctx = EngineContext::new();
        let mut root = ActionRestartGroup::new(ActionFlags::ONCE_PER_FUNC, "universal", 3)
            .with(RestartRequester::new(usize::MAX));
        root.perform(&mut data, &mut ctx)?;

        assert_eq!(root.current_restart(), None);
        assert_eq!(ctx.events.count_kind(EventKind::Restart), 3);
        assert_eq!(ctx.events.count_kind(EventKind::RestartLimit), 1);
        assert_eq!(data.warnings().len(), 1);
        assert_eq!(data.warnings()[0].message, RESTART_LIMIT_WARNING);

        assert_eq!(root.perform(&mut data, &mut ctx)?, Outcome::Done(0));
        assert_eq!(data.warnings().len(), 1);
        Ok(())
    }

    #[test]
    fn test_restart_then_settle() -> Result<()> {
        let mut data = empty_function();
        let mut ctx = EngineContext::new();
        let mut root = ActionRestartGroup::new(ActionFlags::ONCE_PER_FUNC, "universal", 3)
            .with(RestartRequester::new(2));
        root.perform(&mut data, &mut ctx)?;
        assert_eq!(ctx.events.count_kind(EventKind::Restart), 2);
        assert!(data.warnings().is_empty());
        Ok(())
    }

    #[test]
    fn test_reset_rearms() -> Result<()> {
        let mut data = empty_function();
        let mut ctx = EngineContext::new();
        let mut root = ActionRestartGroup::new(ActionFlags::ONCE_PER_FUNC, "universal", 1)
            .with(RestartRequester::new(0));
        root.perform(&mut data, &mut ctx)?;
        assert_eq!(root.current_restart(), None);
        root.reset(&data, &mut ctx);
        assert_eq!(root.current_restart(), Some(0));
        assert_eq!(root.status(), ActionStatus::Start);
        Ok(())
    }
}
