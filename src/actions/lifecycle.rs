//! Actions marking the phases of a function's processing.

use crate::{
    engine::{Action, ActionBase, ActionFlags, ActionGroupList, EngineContext, Outcome},
    ir::Funcdata,
    Result,
};

/// Prepares the function: baseline snapshot, call overrides, call-site descriptors.
#[derive(Debug, Clone)]
pub struct ActionStart {
    base: ActionBase,
}

impl ActionStart {
    /// Creates the action, tagged with `group`.
    #[must_use]
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            base: ActionBase::new(ActionFlags::empty(), "start", group),
        }
    }
}

impl Action for ActionStart {
    fn base(&self) -> &ActionBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ActionBase {
        &mut self.base
    }

    fn apply(&mut self, data: &mut Funcdata, _ctx: &mut EngineContext) -> Result<Outcome> {
        data.start_processing()?;
        Ok(Outcome::Done(0))
    }

    fn clone_action(&self, groups: &ActionGroupList) -> Option<Box<dyn Action>> {
        groups.contains(self.group()).then(|| {
            Box::new(Self {
                base: self.base.fresh(),
            }) as Box<dyn Action>
        })
    }
}

/// Finishes processing and purges dead ops and varnodes.
#[derive(Debug, Clone)]
pub struct ActionStop {
    base: ActionBase,
}

impl ActionStop {
    /// Creates the action, tagged with `group`.
    #[must_use]
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            base: ActionBase::new(ActionFlags::empty(), "stop", group),
        }
    }
}

impl Action for ActionStop {
    fn base(&self) -> &ActionBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ActionBase {
        &mut self.base
    }

    fn apply(&mut self, data: &mut Funcdata, _ctx: &mut EngineContext) -> Result<Outcome> {
        data.stop_processing()?;
        Ok(Outcome::Done(0))
    }

    fn clone_action(&self, groups: &ActionGroupList) -> Option<Box<dyn Action>> {
        groups.contains(self.group()).then(|| {
            Box::new(Self {
                base: self.base.fresh(),
            }) as Box<dyn Action>
        })
    }
}

/// Marks the start of the clean-up phase, after which rewrites favor readable forms.
#[derive(Debug, Clone)]
pub struct ActionStartCleanUp {
    base: ActionBase,
}

impl ActionStartCleanUp {
    /// Creates the action, tagged with `group`.
    #[must_use]
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            base: ActionBase::new(ActionFlags::empty(), "startcleanup", group),
        }
    }
}

impl Action for ActionStartCleanUp {
    fn base(&self) -> &ActionBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ActionBase {
        &mut self.base
    }

    fn apply(&mut self, data: &mut Funcdata, _ctx: &mut EngineContext) -> Result<Outcome> {
        data.start_clean_up();
        Ok(Outcome::Done(0))
    }

    fn clone_action(&self, groups: &ActionGroupList) -> Option<Box<dyn Action>> {
        groups.contains(self.group()).then(|| {
            Box::new(Self {
                base: self.base.fresh(),
            }) as Box<dyn Action>
        })
    }
}
