//! Opcode-dispatched rule application.
//!
//! An [`ActionPool`] is the leaf action that runs rules. At registration each rule's
//! [`Rule::op_list`] is folded into a per-opcode table, so a sweep only tests an op against
//! the rules that declared interest in its opcode.
//!
//! A sweep visits every op that was live when the sweep started exactly once, in block
//! order. Ops created during the sweep are picked up by the next one. For each op the
//! candidate rules are tried in registration order and the first rewrite wins; the op is
//! then left for the next sweep. The pool is usually flagged `REPEAT_APPLY`, so sweeps
//! continue until one commits nothing.

use strum::EnumCount;

use crate::{
    engine::{
        action::{Action, ActionBase, ActionFlags, ActionStats, Outcome},
        events::EventKind,
        rule::Rule,
        ActionGroupList, EngineContext,
    },
    ir::{Funcdata, OpCode, OpId},
    Result,
};

#[derive(Debug)]
struct RuleEntry {
    rule: Box<dyn Rule>,
    enabled: bool,
    warnings_on: bool,
    warnings_given: bool,
    stats: ActionStats,
}

impl RuleEntry {
    fn new(rule: Box<dyn Rule>) -> Self {
        Self {
            rule,
            enabled: true,
            warnings_on: false,
            warnings_given: false,
            stats: ActionStats::default(),
        }
    }
}

/// A leaf action applying a set of rules through an opcode dispatch table.
#[derive(Debug)]
pub struct ActionPool {
    base: ActionBase,
    rules: Vec<RuleEntry>,
    perop: Vec<Vec<usize>>,
}

impl ActionPool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new(flags: ActionFlags, name: impl Into<String>) -> Self {
        Self {
            base: ActionBase::new(flags, name, ""),
            rules: Vec::new(),
            perop: vec![Vec::new(); OpCode::COUNT],
        }
    }

    /// Creates a pool holding `rules`, in order.
    #[must_use]
    pub fn with_rules(
        flags: ActionFlags,
        name: impl Into<String>,
        rules: impl IntoIterator<Item = Box<dyn Rule>>,
    ) -> Self {
        let mut pool = Self::new(flags, name);
        for rule in rules {
            pool.add_rule(rule);
        }
        pool
    }

    /// Registers `rule` after the rules already present.
    pub fn add_rule(&mut self, rule: Box<dyn Rule>) {
        let index = self.rules.len();
        let ops = rule.op_list();
        if ops.is_empty() {
            for slot in &mut self.perop {
                slot.push(index);
            }
        } else {
            for opc in ops {
                let slot = &mut self.perop[opc.index()];
                if !slot.contains(&index) {
                    slot.push(index);
                }
            }
        }
        self.rules.push(RuleEntry::new(rule));
    }

    /// Number of registered rules.
    #[must_use]
    pub fn num_rules(&self) -> usize {
        self.rules.len()
    }

    /// Names of the registered rules, in order.
    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|e| e.rule.name())
    }

    /// Returns `true` if the named rule is registered and enabled.
    #[must_use]
    pub fn is_rule_enabled(&self, name: &str) -> bool {
        self.rules
            .iter()
            .any(|e| e.enabled && e.rule.name() == name)
    }

    /// Tries the candidate rules on `op` until one commits.
    fn process_op(
        &mut self,
        op: OpId,
        data: &mut Funcdata,
        ctx: &mut EngineContext,
    ) -> Result<bool> {
        let opcode = data.op(op).opcode();
        for i in 0..self.perop[opcode.index()].len() {
            let index = self.perop[opcode.index()][i];
            let entry = &mut self.rules[index];
            if !entry.enabled {
                continue;
            }
            entry.stats.tests += 1;
            let seq = data.op(op).seq();
            let applied = entry
                .rule
                .apply_op(op, data, ctx)
                .map_err(|e| e.context(format!("rule {} at {}", entry.rule.name(), seq)))?;

            if !applied {
                let o = data.op(op);
                if !o.is_destroyed() && o.opcode() != opcode {
                    ctx.events
                        .record(EventKind::Error)
                        .at(data.name(), seq.pc)
                        .source(entry.rule.name())
                        .message(format!(
                            "changed {} to {} without reporting a change",
                            opcode,
                            o.opcode()
                        ));
                }
                continue;
            }

            entry.stats.applies += 1;
            ctx.add_changes(1);
            tracing::trace!(rule = %entry.rule.name(), function = %data.name(), at = %seq, "rule applied");
            ctx.events
                .record(EventKind::RuleApplied)
                .at(data.name(), seq.pc)
                .source(entry.rule.name())
                .message(format!("{}", opcode));
            if entry.warnings_on && !entry.warnings_given {
                entry.warnings_given = true;
                ctx.events
                    .record(EventKind::Warning)
                    .function(data.name())
                    .source(entry.rule.name())
                    .message(format!("Applied rule {}", entry.rule.name()));
            }
            if ctx.check_invariants() {
                data.verify().map_err(|e| {
                    e.context(format!("invariant broken by rule {} at {}", entry.rule.name(), seq))
                })?;
            }
            return Ok(true);
        }
        Ok(false)
    }
}

impl Action for ActionPool {
    fn base(&self) -> &ActionBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ActionBase {
        &mut self.base
    }

    fn apply(&mut self, data: &mut Funcdata, ctx: &mut EngineContext) -> Result<Outcome> {
        ctx.set_pass(ctx.passes_of(&self.base.name));
        let start = ctx.changes();
        for op in data.ops_alive() {
            let o = data.op(op);
            if o.is_destroyed() || o.is_dead() {
                continue;
            }
            self.process_op(op, data, ctx)?;
        }
        ctx.bump_passes(&self.base.name);
        let count = ctx.changes() - start;
        tracing::debug!(pool = %self.base.name, function = %data.name(), changes = count, "sweep done");
        Ok(Outcome::Done(count))
    }

    fn clone_action(&self, groups: &ActionGroupList) -> Option<Box<dyn Action>> {
        let mut pool = ActionPool::new(ActionFlags::empty(), "");
        pool.base = self.base.fresh();
        for entry in &self.rules {
            if let Some(rule) = entry.rule.clone_rule(groups) {
                pool.add_rule(rule);
                if let Some(last) = pool.rules.last_mut() {
                    last.enabled = entry.enabled;
                    last.warnings_on = entry.warnings_on;
                }
            }
        }
        if pool.rules.is_empty() {
            None
        } else {
            Some(Box::new(pool))
        }
    }

    fn reset(&mut self, _data: &Funcdata, ctx: &mut EngineContext) {
        self.base.reset();
        for entry in &mut self.rules {
            entry.warnings_given = false;
        }
        ctx.clear_passes(&self.base.name);
    }

    fn set_rule_enabled(&mut self, name: &str, on: bool) -> bool {
        let mut found = false;
        for entry in self.rules.iter_mut().filter(|e| e.rule.name() == name) {
            entry.enabled = on;
            found = true;
        }
        found
    }

    fn set_rule_warnings(&mut self, name: &str, on: bool) -> bool {
        let mut found = false;
        for entry in self.rules.iter_mut().filter(|e| e.rule.name() == name) {
            entry.warnings_on = on;
            found = true;
        }
        found
    }

    fn rule_stats(&self, out: &mut Vec<(String, ActionStats)>) {
        for entry in &self.rules {
            out.push((entry.rule.name().to_string(), entry.stats));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ir::{Address, FunctionBuilder},
        rules::{arith::RuleTrivialArith, flow::RuleEarlyRemoval, logic::RuleBxor2NotEqual},
        test::UnreportedRewrite,
    };

    fn xor_function() -> Result<(Funcdata, OpId)> {
        let mut b = FunctionBuilder::new("xor", Address::ram(0x1000));
        let v = b.input(4, Address::register(0));
        let x = b.op(OpCode::IntXor, &[v, v], 4)?;
        let xor = b.last_op().ok_or_else(|| crate::Error::Error("missing xor".into()))?;
        b.op_void(OpCode::Return, &[x])?;
        Ok((b.finish(), xor))
    }

    #[test]
    fn test_dispatch_by_opcode() -> Result<()> {
        let (mut data, xor) = xor_function()?;
        let mut pool = ActionPool::with_rules(
            ActionFlags::REPEAT_APPLY,
            "oppool",
            [
                Box::new(RuleBxor2NotEqual::new("analysis")) as Box<dyn Rule>,
                Box::new(RuleTrivialArith::new("analysis")),
            ],
        );
        assert_eq!(pool.perop[OpCode::IntXor.index()], vec![1]);
        assert_eq!(pool.perop[OpCode::BoolXor.index()], vec![0, 1]);

        let mut ctx = EngineContext::new().with_invariant_checks(true);
        let outcome = pool.perform(&mut data, &mut ctx)?;
        assert_eq!(outcome, Outcome::Done(1));
        assert_eq!(data.op(xor).opcode(), OpCode::Copy);

        let mut stats = Vec::new();
        pool.rule_stats(&mut stats);
        assert_eq!(stats[1].1.applies, 1);
        assert_eq!(stats[0].1.tests, 0);
        assert_eq!(ctx.passes_of("oppool"), 2);
        Ok(())
    }

    #[test]
    fn test_disabled_rule_is_skipped() -> Result<()> {
        let (mut data, xor) = xor_function()?;
        let mut pool = ActionPool::with_rules(
            ActionFlags::REPEAT_APPLY,
            "oppool",
            [Box::new(RuleTrivialArith::new("analysis")) as Box<dyn Rule>],
        );
        assert!(pool.set_rule_enabled("trivialarith", false));
        assert!(!pool.set_rule_enabled("nosuchrule", false));
        let mut ctx = EngineContext::new();
        assert_eq!(pool.perform(&mut data, &mut ctx)?, Outcome::Done(0));
        assert_eq!(data.op(xor).opcode(), OpCode::IntXor);
        Ok(())
    }

    #[test]
    fn test_first_pass_is_visible_to_rules() -> Result<()> {
        let mut b = FunctionBuilder::new("dead", Address::ram(0x1000));
        let v = b.input(4, Address::register(0));
        let one = b.constant(4, 1);
        b.op(OpCode::IntAdd, &[v, one], 4)?;
        let mut data = b.finish();

        let mut pool = ActionPool::with_rules(
            ActionFlags::empty(),
            "deadpool",
            [Box::new(RuleEarlyRemoval::new("deadcode")) as Box<dyn Rule>],
        );
        let mut ctx = EngineContext::new();
        assert_eq!(pool.perform(&mut data, &mut ctx)?, Outcome::Done(0));
        assert_eq!(pool.perform(&mut data, &mut ctx)?, Outcome::Done(1));
        assert!(data.ops_alive().is_empty());
        Ok(())
    }

    #[test]
    fn test_unreported_opcode_change_is_flagged() -> Result<()> {
        let (mut data, _) = xor_function()?;
        let mut pool = ActionPool::with_rules(
            ActionFlags::empty(),
            "oppool",
            [Box::new(UnreportedRewrite) as Box<dyn Rule>],
        );
        let mut ctx = EngineContext::new();
        pool.perform(&mut data, &mut ctx)?;
        assert_eq!(ctx.events.count_kind(EventKind::Error), 1);
        Ok(())
    }

    #[test]
    fn test_clone_drops_filtered_rules() {
        let pool = ActionPool::with_rules(
            ActionFlags::REPEAT_APPLY,
            "oppool",
            [
                Box::new(RuleTrivialArith::new("analysis")) as Box<dyn Rule>,
                Box::new(RuleEarlyRemoval::new("deadcode")),
            ],
        );
        let groups = ActionGroupList::from_groups(["analysis"]);
        let cloned = pool.clone_action(&groups);
        let mut stats = Vec::new();
        if let Some(cloned) = &cloned {
            cloned.rule_stats(&mut stats);
        }
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].0, "trivialarith");
        assert!(pool.clone_action(&ActionGroupList::new()).is_none());
    }
}
