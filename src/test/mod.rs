//! Shared fixtures for unit tests: small functions, scripted actions and misbehaving rules.

use crate::{
    engine::{Action, ActionBase, ActionFlags, ActionGroupList, EngineContext, Outcome, Rule},
    ir::{Address, Funcdata, FunctionBuilder, OpCode, OpId, VarnodeId},
    Error, Result,
};

/// A function with a single empty block.
pub fn empty_function() -> Funcdata {
    FunctionBuilder::new("empty", Address::ram(0x1000)).finish()
}

/// The op defining `vn`.
pub fn def_of(data: &Funcdata, vn: VarnodeId) -> Result<OpId> {
    data.vn(vn)
        .def()
        .ok_or_else(|| Error::Error(format!("{} is not written", data.fmt_vn(vn))))
}

/// Applies `rule` to the op defining `vn`, outside of any pool.
pub fn apply_rule(rule: &dyn Rule, data: &mut Funcdata, vn: VarnodeId) -> Result<bool> {
    let op = def_of(data, vn)?;
    rule.apply_op(op, data, &EngineContext::new())
}

/// A leaf action that reports `per_apply` changes per application until it has reported
/// `max_total`.
#[derive(Debug, Clone)]
pub struct CountingAction {
    base: ActionBase,
    per_apply: usize,
    max_total: usize,
    total: usize,
}

/// Creates a [`CountingAction`] in group `test`.
pub fn counting_action(name: &str, flags: ActionFlags, per_apply: usize, max_total: usize) -> CountingAction {
    CountingAction {
        base: ActionBase::new(flags, name, "test"),
        per_apply,
        max_total,
        total: 0,
    }
}

impl Action for CountingAction {
    fn base(&self) -> &ActionBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ActionBase {
        &mut self.base
    }

    fn apply(&mut self, _data: &mut Funcdata, ctx: &mut EngineContext) -> Result<Outcome> {
        let n = self.per_apply.min(self.max_total - self.total);
        self.total += n;
        ctx.add_changes(n);
        Ok(Outcome::Done(n))
    }

    fn clone_action(&self, groups: &ActionGroupList) -> Option<Box<dyn Action>> {
        groups.contains(self.group()).then(|| {
            Box::new(Self {
                base: self.base.fresh(),
                total: 0,
                ..self.clone()
            }) as Box<dyn Action>
        })
    }
}

/// A leaf action that requests a restart on each of its first `n` applications.
///
/// The request count is kept across resets, so a restart group sees a settled function
/// once `n` restarts have been taken.
#[derive(Debug, Clone)]
pub struct RestartRequester {
    base: ActionBase,
    remaining: usize,
}

impl RestartRequester {
    pub fn new(n: usize) -> Self {
        Self {
            base: ActionBase::new(ActionFlags::empty(), "restarter", "test"),
            remaining: n,
        }
    }
}

impl Action for RestartRequester {
    fn base(&self) -> &ActionBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ActionBase {
        &mut self.base
    }

    fn apply(&mut self, data: &mut Funcdata, ctx: &mut EngineContext) -> Result<Outcome> {
        if self.remaining == 0 {
            return Ok(Outcome::Done(0));
        }
        self.remaining -= 1;
        data.set_restart_pending(true);
        ctx.add_changes(1);
        Ok(Outcome::Done(1))
    }

    fn clone_action(&self, groups: &ActionGroupList) -> Option<Box<dyn Action>> {
        groups.contains(self.group()).then(|| {
            Box::new(Self {
                base: self.base.fresh(),
                remaining: self.remaining,
            }) as Box<dyn Action>
        })
    }
}

/// A rule that rewrites `INT_XOR` into `INT_OR` but claims it did nothing.
#[derive(Debug, Clone)]
pub struct UnreportedRewrite;

impl Rule for UnreportedRewrite {
    fn name(&self) -> &str {
        "unreported"
    }

    fn group(&self) -> &str {
        "test"
    }

    fn op_list(&self) -> Vec<OpCode> {
        vec![OpCode::IntXor]
    }

    fn apply_op(&self, op: OpId, data: &mut Funcdata, _ctx: &EngineContext) -> Result<bool> {
        data.op_set_opcode(op, OpCode::IntOr);
        Ok(false)
    }
}
