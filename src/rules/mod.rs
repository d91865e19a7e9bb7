//! Concrete peephole rules.
//!
//! Each rule is one local algebraic or structural law. Rules are grouped by the kind of
//! operation they simplify:
//!
//! - [`arith`] - constant folding, identities and canonical forms of arithmetic
//! - [`shift`] - shifts, shift chains and sign extraction
//! - [`logic`] - bitwise masks and boolean logic
//! - [`compare`] - comparison canonicalization
//! - [`extend`] - zero/sign extension and piecing
//! - [`flow`] - copies, dataflow markers and dead ops
//!
//! [`analysis_rules`] and [`cleanup_rules`] list the rules in the order the default pools
//! try them.

pub mod arith;
pub mod compare;
pub mod extend;
pub mod flow;
pub mod logic;
pub mod shift;

use crate::{
    engine::Rule,
    ir::{Funcdata, OpCode, OpId, VarnodeId},
    utils::calc_mask,
    Result,
};

/// The rules of the main analysis pool, in dispatch order.
#[must_use]
pub fn analysis_rules() -> Vec<Box<dyn Rule>> {
    const A: &str = "analysis";
    vec![
        Box::new(flow::RuleEarlyRemoval::new("deadcode")),
        Box::new(arith::RuleTermOrder::new(A)),
        Box::new(flow::RuleSegment::new("segment")),
        Box::new(arith::RuleCollapseConstants::new(A)),
        Box::new(arith::RuleTrivialArith::new(A)),
        Box::new(shift::RuleTrivialShift::new(A)),
        Box::new(shift::RuleSignForm::new(A)),
        Box::new(shift::RuleSignForm2::new(A)),
        Box::new(arith::RuleIdentityEl::new(A)),
        Box::new(logic::RuleOrMask::new(A)),
        Box::new(logic::RuleAndMask::new(A)),
        Box::new(logic::RuleOrCollapse::new(A)),
        Box::new(logic::RuleAndOrLump::new(A)),
        Box::new(arith::RuleNegateIdentity::new(A)),
        Box::new(arith::RuleNegateNegate::new(A)),
        Box::new(arith::RuleCarryElim::new(A)),
        Box::new(arith::RuleSub2Add::new(A)),
        Box::new(arith::Rule2Comp2Mult::new(A)),
        Box::new(arith::RuleAddMultCollapse::new(A)),
        Box::new(shift::RuleDoubleShift::new(A)),
        Box::new(arith::RuleXorCollapse::new(A)),
        Box::new(logic::RuleBxor2NotEqual::new(A)),
        Box::new(logic::RuleBooleanNegate::new(A)),
        Box::new(logic::RuleBoolNegate::new(A)),
        Box::new(logic::RuleNotDistribute::new(A)),
        Box::new(compare::RuleLessOne::new(A)),
        Box::new(compare::RuleIntLessEqual::new(A)),
        Box::new(compare::RuleLessEqual::new(A)),
        Box::new(compare::RuleLessNotEqual::new(A)),
        Box::new(compare::RuleSLessToLess::new(A)),
        Box::new(compare::RuleEqual2Zero::new(A)),
        Box::new(compare::RuleEqual2Constant::new(A)),
        Box::new(extend::RuleZextEquality::new(A)),
        Box::new(extend::RulePiece2Zext::new(A)),
        Box::new(extend::RuleSubExtComm::new(A)),
        Box::new(flow::RulePropagateCopy::new(A)),
        Box::new(flow::RuleMultiCollapse::new(A)),
        Box::new(flow::RuleIndirectCollapse::new(A)),
    ]
}

/// The rules of the clean-up pool, which turn canonical forms back into readable ones.
#[must_use]
pub fn cleanup_rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(arith::RuleMultNegOne::new("cleanup")),
        Box::new(arith::Rule2Comp2Sub::new("cleanup")),
    ]
}

/// Value of input `slot` of `op`, if that input is a constant.
pub(crate) fn const_input(data: &Funcdata, op: OpId, slot: usize) -> Option<u64> {
    data.op(op)
        .input(slot)
        .and_then(|vn| data.vn(vn).constant_value())
}

/// The op defining input `slot` of `op`.
pub(crate) fn input_def(data: &Funcdata, op: OpId, slot: usize) -> Option<OpId> {
    data.op(op).input(slot).and_then(|vn| data.vn(vn).def())
}

/// The op defining input `slot` of `op`, if its opcode is `opcode`.
pub(crate) fn input_def_of(data: &Funcdata, op: OpId, slot: usize, opcode: OpCode) -> Option<OpId> {
    input_def(data, op, slot).filter(|&def| data.op(def).opcode() == opcode)
}

/// Size of the output of `op`.
pub(crate) fn out_size(data: &Funcdata, op: OpId) -> Option<usize> {
    data.op(op).output().map(|vn| data.vn(vn).size())
}

/// Returns `true` if `vn` may be wired into rewritten structure.
pub(crate) fn usable(data: &Funcdata, vn: VarnodeId) -> bool {
    data.vn(vn).is_heritage_known()
}

/// If `vn` is `-x`, as `INT_2COMP x` or `x * -1`, returns `x`.
pub(crate) fn negation_of(data: &Funcdata, vn: VarnodeId) -> Option<VarnodeId> {
    let def = data.vn(vn).def()?;
    let o = data.op(def);
    match o.opcode() {
        OpCode::Int2Comp => o.input(0),
        OpCode::IntMult if const_input(data, def, 1) == Some(calc_mask(data.vn(vn).size())) => {
            o.input(0)
        }
        _ => None,
    }
}

/// Replaces every input of `op`.
///
/// Unlike [`Funcdata::op_set_all_input`] this is safe when a new input is a constant the op
/// already reads: constants that have a reader are re-created before the old inputs are
/// detached.
pub(crate) fn set_inputs(data: &mut Funcdata, op: OpId, inputs: &[VarnodeId]) -> Result<()> {
    let mut fresh = Vec::with_capacity(inputs.len());
    for &vn in inputs {
        let v = data.vn(vn);
        let (val, size, read) = (v.constant_value(), v.size(), !v.has_no_descend());
        fresh.push(match val {
            Some(val) if read => data.new_constant(size, val),
            _ => vn,
        });
    }
    data.op_set_all_input(op, &fresh)
}

/// Turns `op` into `COPY vn`.
pub(crate) fn become_copy(data: &mut Funcdata, op: OpId, vn: VarnodeId) -> Result<()> {
    set_inputs(data, op, &[vn])?;
    data.op_set_opcode(op, OpCode::Copy);
    Ok(())
}

/// Turns `op` into a `COPY` of the constant `val`, sized like its output.
pub(crate) fn become_constant(data: &mut Funcdata, op: OpId, val: u64) -> Result<()> {
    let size = out_size(data, op).ok_or_else(|| lowlevel_error!("{} has no output", op))?;
    let c = data.new_constant(size, val);
    become_copy(data, op, c)
}

/// Rewrites `op` into `opcode` with `inputs`.
pub(crate) fn rewrite(data: &mut Funcdata, op: OpId, opcode: OpCode, inputs: &[VarnodeId]) -> Result<()> {
    set_inputs(data, op, inputs)?;
    data.op_set_opcode(op, opcode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::{
        engine::ActionGroupList,
        ir::{Address, FunctionBuilder},
    };

    #[test]
    fn test_rule_names_unique() {
        let mut names = HashSet::new();
        for rule in analysis_rules().iter().chain(cleanup_rules().iter()) {
            assert!(names.insert(rule.name().to_string()), "duplicate {}", rule.name());
        }
        assert_eq!(names.len(), 40);
    }

    #[test]
    fn test_groups_gate_rules() {
        let groups = ActionGroupList::from_groups(["analysis"]);
        let kept: Vec<String> = analysis_rules()
            .iter()
            .filter_map(|r| r.clone_rule(&groups))
            .map(|r| r.name().to_string())
            .collect();
        assert_eq!(kept.len(), 36);
        assert!(!kept.iter().any(|n| n == "earlyremoval" || n == "segment"));
    }

    #[test]
    fn test_become_copy_of_own_constant() -> Result<()> {
        let mut b = FunctionBuilder::new("f", Address::ram(0x1000));
        let x = b.input(4, Address::register(0));
        let c = b.constant(4, 5);
        let out = b.op(OpCode::IntAdd, &[x, c], 4)?;
        let op = b.last_op().ok_or_else(|| crate::Error::Error("no op".into()))?;
        b.op_void(OpCode::Return, &[out])?;
        let mut data = b.finish();

        become_copy(&mut data, op, c)?;
        assert_eq!(data.op(op).opcode(), OpCode::Copy);
        assert_eq!(const_input(&data, op, 0), Some(5));
        assert!(data.vn(x).has_no_descend());
        data.verify()?;
        Ok(())
    }
}
