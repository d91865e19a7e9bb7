//! The rule contract.
//!
//! A [`Rule`] is a single peephole law: it matches a small pattern centered on one op and,
//! if the pattern fully applies, commits exactly one semantically equivalent rewrite.
//!
//! # Contract
//!
//! - [`Rule::op_list`] names the opcodes the rule wants to see. It is queried once, when the
//!   rule is registered with an [`ActionPool`](crate::engine::pool::ActionPool); an empty
//!   list means every opcode.
//! - [`Rule::apply_op`] returns `Ok(false)` without touching the graph when the pattern does
//!   not apply, `Ok(true)` after committing one rewrite, and `Err` only for structural
//!   errors. Free varnodes are never merged into rewritten structure.
//! - [`Rule::clone_rule`] is construction-time gating: it yields a fresh instance only if
//!   the rule's group is enabled.
//!
//! Rules are stateless and shared; anything per-function lives in the
//! [`EngineContext`](crate::engine::EngineContext).

use crate::{
    engine::{ActionGroupList, EngineContext},
    ir::{Funcdata, OpCode, OpId},
    Result,
};

/// Object-safe cloning for rules.
pub trait RuleClone {
    /// Returns a boxed copy of this rule.
    fn box_clone(&self) -> Box<dyn Rule>;
}

impl<T> RuleClone for T
where
    T: Rule + Clone + 'static,
{
    fn box_clone(&self) -> Box<dyn Rule> {
        Box::new(self.clone())
    }
}

/// A local pattern-match-and-rewrite unit.
pub trait Rule: RuleClone + Send + Sync + std::fmt::Debug {
    /// Name the rule is registered and toggled under.
    fn name(&self) -> &str;

    /// The group tag deciding which profiles include this rule.
    fn group(&self) -> &str;

    /// Opcodes this rule is tried on. Empty means all opcodes.
    fn op_list(&self) -> Vec<OpCode>;

    /// Attempts one rewrite centered on `op`.
    ///
    /// # Errors
    ///
    /// Returns an error only if a structural invariant the rule relies on does not hold.
    fn apply_op(&self, op: OpId, data: &mut Funcdata, ctx: &EngineContext) -> Result<bool>;

    /// Returns a fresh instance if `groups` enables this rule's group.
    fn clone_rule(&self, groups: &ActionGroupList) -> Option<Box<dyn Rule>> {
        if groups.contains(self.group()) {
            Some(self.box_clone())
        } else {
            None
        }
    }
}
