//! Common-subexpression elimination of `MULTIEQUAL`s.
//!
//! Two `MULTIEQUAL`s in the same block whose inputs are pairwise the same varnodes merge the
//! same values along the same edges, so the later one is redundant.

use crate::{
    engine::{Action, ActionBase, ActionFlags, ActionGroupList, EngineContext, EventKind, Outcome},
    ir::{BlockId, Funcdata, OpCode, OpId},
    Result,
};

/// Merges duplicate `MULTIEQUAL`s within a block.
#[derive(Debug, Clone)]
pub struct ActionMultiCse {
    base: ActionBase,
}

impl ActionMultiCse {
    /// Creates the action, tagged with `group`.
    #[must_use]
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            base: ActionBase::new(ActionFlags::empty(), "multicse", group),
        }
    }

    fn same_inputs(data: &Funcdata, a: OpId, b: OpId) -> bool {
        let (ia, ib) = (data.op(a).inputs(), data.op(b).inputs());
        ia.len() == ib.len() && ia.iter().zip(ib).all(|(x, y)| x == y)
    }

    /// Finds the first later `MULTIEQUAL` in `phis` duplicating an earlier one.
    fn find_match(data: &Funcdata, phis: &[OpId]) -> Option<(OpId, OpId)> {
        for (i, &earlier) in phis.iter().enumerate() {
            for &later in &phis[i + 1..] {
                let Some(out) = data.op(later).output() else {
                    continue;
                };
                let v = data.vn(out);
                if v.is_addr_tied() || v.is_persist() || v.is_auto_live() {
                    continue;
                }
                let same_size = data
                    .op(earlier)
                    .output()
                    .is_some_and(|o| data.vn(o).size() == v.size());
                if same_size && Self::same_inputs(data, earlier, later) {
                    return Some((earlier, later));
                }
            }
        }
        None
    }

    fn process_block(
        &self,
        data: &mut Funcdata,
        ctx: &mut EngineContext,
        block: usize,
    ) -> Result<usize> {
        let mut merged = 0;
        loop {
            let phis: Vec<OpId> = data
                .block(BlockId::new(block))
                .ops()
                .iter()
                .copied()
                .take_while(|&op| data.op(op).opcode() == OpCode::Multiequal)
                .collect();
            let Some((keep, drop)) = Self::find_match(data, &phis) else {
                return Ok(merged);
            };
            let (Some(kept_out), Some(dropped_out)) = (data.op(keep).output(), data.op(drop).output())
            else {
                return Ok(merged);
            };
            let addr = data.op(drop).address();
            data.total_replace(dropped_out, kept_out)?;
            data.op_destroy(drop)?;
            ctx.events
                .record(EventKind::CseMerged)
                .at(data.name(), addr)
                .source(self.base.name.as_str());
            merged += 1;
        }
    }
}

impl Action for ActionMultiCse {
    fn base(&self) -> &ActionBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ActionBase {
        &mut self.base
    }

    fn apply(&mut self, data: &mut Funcdata, ctx: &mut EngineContext) -> Result<Outcome> {
        let mut merged = 0;
        for block in 0..data.num_blocks() {
            merged += self.process_block(data, ctx, block)?;
        }
        ctx.add_changes(merged);
        Ok(Outcome::Done(merged))
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
    use crate::ir::{Address, FunctionBuilder};

    #[test]
    fn test_duplicate_multiequal_merged() -> Result<()> {
        let mut b = FunctionBuilder::new("f", Address::ram(0x1000));
        let x = b.input(4, Address::register(0));
        let y = b.input(4, Address::register(8));
        b.new_block();
        let first = b.op(OpCode::Multiequal, &[x, y], 4)?;
        let second = b.op(OpCode::Multiequal, &[x, y], 4)?;
        let other = b.op(OpCode::Multiequal, &[y, x], 4)?;
        let sum = b.op(OpCode::IntAdd, &[second, other], 4)?;
        b.op_void(OpCode::Return, &[sum, first])?;
        let mut data = b.finish();

        let mut ctx = EngineContext::new();
        let outcome = ActionMultiCse::new("analysis").perform(&mut data, &mut ctx)?;
        assert_eq!(outcome, Outcome::Done(1));
        assert!(data.vn(second).is_destroyed());
        let add = data
            .vn(sum)
            .def()
            .ok_or_else(|| crate::Error::Error("missing add".into()))?;
        assert_eq!(data.op(add).inputs(), &[first, other]);
        assert_eq!(ctx.events.count_kind(EventKind::CseMerged), 1);
        data.verify()?;

        assert_eq!(
            ActionMultiCse::new("analysis").perform(&mut data, &mut ctx)?,
            Outcome::Done(0)
        );
        Ok(())
    }
}
