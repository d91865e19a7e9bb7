//! Sequencing of child actions.

use crate::{
    engine::{
        action::{Action, ActionBase, ActionFlags, Outcome},
        ActionGroupList, EngineContext,
    },
    ir::Funcdata,
    Result,
};

/// An action that performs its children in order.
///
/// One application performs every child once and reports the sum of their changes. If a
/// child halts at a breakpoint the group halts too and remembers the child, so that the
/// next `perform` resumes with that child instead of starting over.
#[derive(Debug)]
pub struct ActionGroup {
    base: ActionBase,
    children: Vec<Box<dyn Action>>,
    state: usize,
}

impl ActionGroup {
    /// Creates an empty group.
    #[must_use]
    pub fn new(flags: ActionFlags, name: impl Into<String>) -> Self {
        Self {
            base: ActionBase::new(flags, name, ""),
            children: Vec::new(),
            state: 0,
        }
    }

    /// Appends a child action.
    pub fn add_action(&mut self, action: Box<dyn Action>) {
        self.children.push(action);
    }

    /// Builder form of [`ActionGroup::add_action`].
    #[must_use]
    pub fn with(mut self, action: impl Action + 'static) -> Self {
        self.add_action(Box::new(action));
        self
    }

    pub(crate) fn clone_children(&self, groups: &ActionGroupList) -> Vec<Box<dyn Action>> {
        self.children
            .iter()
            .filter_map(|child| child.clone_action(groups))
            .collect()
    }

    /// Performs the children from the resume point on.
    pub(crate) fn apply_children(
        &mut self,
        data: &mut Funcdata,
        ctx: &mut EngineContext,
    ) -> Result<Outcome> {
        let start = ctx.changes();
        while self.state < self.children.len() {
            let child = &mut self.children[self.state];
            if child.perform(data, ctx)?.is_halted() {
                return Ok(Outcome::Halted);
            }
            self.state += 1;
        }
        self.state = 0;
        Ok(Outcome::Done(ctx.changes() - start))
    }

    pub(crate) fn reset_children(&mut self, data: &Funcdata, ctx: &mut EngineContext) {
        self.state = 0;
        for child in &mut self.children {
            child.reset(data, ctx);
        }
    }
}

impl Action for ActionGroup {
    fn base(&self) -> &ActionBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ActionBase {
        &mut self.base
    }

    fn apply(&mut self, data: &mut Funcdata, ctx: &mut EngineContext) -> Result<Outcome> {
        self.apply_children(data, ctx)
    }

    fn clone_action(&self, groups: &ActionGroupList) -> Option<Box<dyn Action>> {
        let children = self.clone_children(groups);
        if children.is_empty() {
            return None;
        }
        let mut group = ActionGroup::new(ActionFlags::empty(), "");
        group.base = self.base.fresh();
        group.children = children;
        Some(Box::new(group))
    }

    fn reset(&mut self, data: &Funcdata, ctx: &mut EngineContext) {
        self.base.reset();
        ctx.clear_passes(&self.base.name);
        self.reset_children(data, ctx);
    }

    fn children(&self) -> &[Box<dyn Action>] {
        &self.children
    }

    fn children_mut(&mut self) -> &mut [Box<dyn Action>] {
        &mut self.children
    }
}
