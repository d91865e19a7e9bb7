//! Dead-code elimination.
//!
//! Liveness is computed backwards from the roots: ops with side effects, ops without an
//! output, and ops whose output must stay observable (address-tied, persistent, forced or
//! auto-live storage). Every op a live op reads from is live. Annotation inputs (`iop`
//! references) name an op but do not read its value, so they keep nothing alive.
//! Everything else is destroyed, readers before definitions.

use crate::{
    engine::{Action, ActionBase, ActionFlags, ActionGroupList, EngineContext, EventKind, Outcome},
    ir::{Funcdata, OpId},
    utils::BitSet,
    Result,
};

/// Removes ops whose results can never be observed.
#[derive(Debug, Clone)]
pub struct ActionDeadCode {
    base: ActionBase,
}

impl ActionDeadCode {
    /// Creates the action, tagged with `group`.
    #[must_use]
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            base: ActionBase::new(ActionFlags::empty(), "deadcode", group),
        }
    }

    fn is_root(data: &Funcdata, op: OpId) -> bool {
        let o = data.op(op);
        if o.has_side_effect() {
            return true;
        }
        match o.output() {
            None => true,
            Some(out) => {
                let v = data.vn(out);
                v.is_addr_tied() || v.is_persist() || v.is_auto_live()
            }
        }
    }

    /// Marks every op that contributes to a root.
    fn mark_live(data: &Funcdata, alive: &[OpId]) -> BitSet {
        let mut live = BitSet::new(data.num_ops());
        let mut worklist: Vec<OpId> = alive
            .iter()
            .copied()
            .filter(|&op| Self::is_root(data, op))
            .collect();
        for &op in &worklist {
            live.insert(op.index());
        }
        while let Some(op) = worklist.pop() {
            for &vn in data.op(op).inputs() {
                let Some(def) = data.vn(vn).def() else {
                    continue;
                };
                if live.insert(def.index()) {
                    worklist.push(def);
                }
            }
        }
        live
    }
}

impl Action for ActionDeadCode {
    fn base(&self) -> &ActionBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ActionBase {
        &mut self.base
    }

    fn apply(&mut self, data: &mut Funcdata, ctx: &mut EngineContext) -> Result<Outcome> {
        let alive = data.ops_alive();
        let live = Self::mark_live(data, &alive);

        let mut removed = 0;
        for &op in alive.iter().rev() {
            if live.contains(op.index()) {
                continue;
            }
            let addr = data.op(op).address();
            tracing::trace!(function = %data.name(), op = %data.fmt_op(op), "dead op");
            data.op_destroy(op)?;
            ctx.events
                .record(EventKind::OpRemoved)
                .at(data.name(), addr)
                .source(self.base.name.as_str());
            removed += 1;
        }
        if removed > 0 {
            data.clear_dead_varnodes();
            ctx.add_changes(removed);
        }
        Ok(Outcome::Done(removed))
    }

    fn clone_action(&self, groups: &ActionGroupList) -> Option<Box<dyn Action>> {
        groups.contains(self.group()).then(|| {
            Box::new(Self {
                base: self.base.fresh(),
            }) as Box<dyn Action>
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Address, FunctionBuilder, OpCode, VarnodeFlags};

    #[test]
    fn test_removes_unobserved_chain() -> Result<()> {
        let mut b = FunctionBuilder::new("f", Address::ram(0x1000));
        let x = b.input(4, Address::register(0));
        let one = b.constant(4, 1);
        let t = b.op(OpCode::IntAdd, &[x, one], 4)?;
        b.op(OpCode::IntNegate, &[t], 4)?;
        let kept = b.op(OpCode::IntNegate, &[x], 4)?;
        b.op_void(OpCode::Return, &[kept])?;
        let mut data = b.finish();

        let mut ctx = EngineContext::new();
        let outcome = ActionDeadCode::new("deadcode").perform(&mut data, &mut ctx)?;
        assert_eq!(outcome, Outcome::Done(2));
        assert_eq!(data.ops_alive().len(), 2);
        assert_eq!(ctx.events.count_kind(EventKind::OpRemoved), 2);
        data.verify()?;
        Ok(())
    }

    #[test]
    fn test_keeps_observable_outputs() -> Result<()> {
        let mut b = FunctionBuilder::new("f", Address::ram(0x1000));
        let x = b.input(4, Address::register(0));
        let global = b.varnode(4, Address::ram(0x8000));
        b.data_mut().vn_set_flags(global, VarnodeFlags::PERSIST);
        b.op_out(OpCode::Copy, &[x], global)?;
        let mut data = b.finish();

        let mut ctx = EngineContext::new();
        let outcome = ActionDeadCode::new("deadcode").perform(&mut data, &mut ctx)?;
        assert_eq!(outcome, Outcome::Done(0));
        assert_eq!(data.ops_alive().len(), 1);
        Ok(())
    }

    #[test]
    fn test_iop_reference_does_not_keep_target() -> Result<()> {
        let mut b = FunctionBuilder::new("f", Address::ram(0x1000));
        let x = b.input(4, Address::register(0));
        let unused = b.op(OpCode::IntNegate, &[x], 4)?;
        let target = b
            .data_mut()
            .vn(unused)
            .def()
            .ok_or_else(|| crate::Error::Error("missing def".into()))?;
        let iop = b.data_mut().new_varnode_iop(target);
        b.op_void(OpCode::Store, &[x, iop])?;
        let mut data = b.finish();

        let mut ctx = EngineContext::new();
        ActionDeadCode::new("deadcode").perform(&mut data, &mut ctx)?;
        assert!(data.op(target).is_destroyed());
        Ok(())
    }
}
