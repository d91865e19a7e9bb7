//! Bitwise and boolean rules.
//!
//! The mask rules rely on the non-zero masks computed by the `nonzeromask` action. A mask is
//! always a safe over-approximation, so a stale mask only makes them miss.

use crate::{
    engine::{EngineContext, Rule},
    ir::{behavior::evaluate_binary, Funcdata, OpCode, OpId},
    rules::{become_constant, become_copy, const_input, input_def, input_def_of, out_size, rewrite, usable},
    utils::calc_mask,
    Result,
};

define_rule!(
    /// `x | all_ones => all_ones`.
    RuleOrMask,
    "ormask"
);

impl Rule for RuleOrMask {
    rule_identity!();

    fn op_list(&self) -> Vec<OpCode> {
        vec![OpCode::IntOr]
    }

    fn apply_op(&self, op: OpId, data: &mut Funcdata, _ctx: &EngineContext) -> Result<bool> {
        let Some(size) = out_size(data, op) else {
            return Ok(false);
        };
        if size > 8 || const_input(data, op, 1) != Some(calc_mask(size)) {
            return Ok(false);
        }
        become_constant(data, op, calc_mask(size))?;
        Ok(true)
    }
}

define_rule!(
    /// Removes an `INT_AND` made redundant by non-zero masks: if the inputs share no
    /// possibly-set bit the result is 0; if the constant mask covers every bit `x` may have
    /// set, the result is `x`.
    RuleAndMask,
    "andmask"
);

impl Rule for RuleAndMask {
    rule_identity!();

    fn op_list(&self) -> Vec<OpCode> {
        vec![OpCode::IntAnd]
    }

    fn apply_op(&self, op: OpId, data: &mut Funcdata, _ctx: &EngineContext) -> Result<bool> {
        let o = data.op(op);
        let (Some(a), Some(b)) = (o.input(0), o.input(1)) else {
            return Ok(false);
        };
        if out_size(data, op).map_or(true, |size| size > 8) {
            return Ok(false);
        }
        let mask_a = data.vn(a).nz_mask();
        let combined = mask_a & data.vn(b).nz_mask();
        if combined == 0 {
            become_constant(data, op, 0)?;
            return Ok(true);
        }
        if combined == mask_a && data.vn(b).is_constant() && !data.vn(a).is_constant() {
            if !usable(data, a) {
                return Ok(false);
            }
            become_copy(data, op, a)?;
            return Ok(true);
        }
        Ok(false)
    }
}

define_rule!(
    /// `x | c => c` when every bit `x` may have set is already set in `c`.
    RuleOrCollapse,
    "orcollapse"
);

impl Rule for RuleOrCollapse {
    rule_identity!();

    fn op_list(&self) -> Vec<OpCode> {
        vec![OpCode::IntOr]
    }

    fn apply_op(&self, op: OpId, data: &mut Funcdata, _ctx: &EngineContext) -> Result<bool> {
        let Some(c) = const_input(data, op, 1) else {
            return Ok(false);
        };
        let Some(x) = data.op(op).input(0) else {
            return Ok(false);
        };
        if data.vn(x).is_constant() || data.vn(x).nz_mask() & !c != 0 {
            return Ok(false);
        }
        become_constant(data, op, c)?;
        Ok(true)
    }
}

define_rule!(
    /// Merges constants across a repeated bitwise op: `(x & c1) & c2 => x & (c1 & c2)`,
    /// likewise for `|` and `^`.
    RuleAndOrLump,
    "andorlump"
);

impl Rule for RuleAndOrLump {
    rule_identity!();

    fn op_list(&self) -> Vec<OpCode> {
        vec![OpCode::IntAnd, OpCode::IntOr, OpCode::IntXor]
    }

    fn apply_op(&self, op: OpId, data: &mut Funcdata, _ctx: &EngineContext) -> Result<bool> {
        let opc = data.op(op).opcode();
        let Some(c2) = const_input(data, op, 1) else {
            return Ok(false);
        };
        let Some(inner) = input_def_of(data, op, 0, opc) else {
            return Ok(false);
        };
        let (Some(x), Some(c1)) = (data.op(inner).input(0), const_input(data, inner, 1)) else {
            return Ok(false);
        };
        if !usable(data, x) || data.vn(x).is_constant() {
            return Ok(false);
        }
        let size = data.vn(x).size();
        let Some(val) = evaluate_binary(opc, size, size, c1, c2) else {
            return Ok(false);
        };
        let c = data.new_constant(size, val);
        data.op_set_input(op, x, 0)?;
        data.op_set_input(op, c, 1)?;
        Ok(true)
    }
}

define_rule!(
    /// `BOOL_XOR` on booleans is inequality.
    RuleBxor2NotEqual,
    "bxor2notequal"
);

impl Rule for RuleBxor2NotEqual {
    rule_identity!();

    fn op_list(&self) -> Vec<OpCode> {
        vec![OpCode::BoolXor]
    }

    fn apply_op(&self, op: OpId, data: &mut Funcdata, _ctx: &EngineContext) -> Result<bool> {
        data.op_set_opcode(op, OpCode::IntNotequal);
        Ok(true)
    }
}

/// Returns `true` if `op`'s input `slot` only ever holds 0 or 1.
fn is_boolean_input(data: &Funcdata, op: OpId, slot: usize) -> bool {
    let Some(vn) = data.op(op).input(slot) else {
        return false;
    };
    data.vn(vn).size() == 1
        && input_def(data, op, slot).is_some_and(|def| data.op(def).is_boolean_output())
}

define_rule!(
    /// Simplifies comparisons of a boolean against a constant: `b == 0 => !b`,
    /// `b != 0 => b`, `b == 1 => b`, `b != 1 => !b`.
    RuleBooleanNegate,
    "booleannegate"
);

impl Rule for RuleBooleanNegate {
    rule_identity!();

    fn op_list(&self) -> Vec<OpCode> {
        vec![OpCode::IntEqual, OpCode::IntNotequal]
    }

    fn apply_op(&self, op: OpId, data: &mut Funcdata, _ctx: &EngineContext) -> Result<bool> {
        let Some(c) = const_input(data, op, 1) else {
            return Ok(false);
        };
        if c > 1 || !is_boolean_input(data, op, 0) {
            return Ok(false);
        }
        let Some(b) = data.op(op).input(0) else {
            return Ok(false);
        };
        let is_equal = data.op(op).opcode() == OpCode::IntEqual;
        if is_equal == (c == 1) {
            become_copy(data, op, b)?;
        } else {
            rewrite(data, op, OpCode::BoolNegate, &[b])?;
        }
        Ok(true)
    }
}

define_rule!(
    /// Absorbs `BOOL_NEGATE`s into the comparison they negate. Applies only when every reader
    /// of the comparison is a negation; the comparison is flipped and the negations become
    /// copies.
    RuleBoolNegate,
    "boolnegate"
);

impl Rule for RuleBoolNegate {
    rule_identity!();

    fn op_list(&self) -> Vec<OpCode> {
        vec![OpCode::BoolNegate]
    }

    fn apply_op(&self, op: OpId, data: &mut Funcdata, _ctx: &EngineContext) -> Result<bool> {
        let Some(cmp) = input_def(data, op, 0) else {
            return Ok(false);
        };
        let Some((flipped, swap)) = data.op(cmp).opcode().boolean_flip() else {
            return Ok(false);
        };
        let Some(out) = data.op(cmp).output() else {
            return Ok(false);
        };
        let v = data.vn(out);
        if v.is_addr_tied() || v.is_persist() || v.is_auto_live() {
            return Ok(false);
        }
        let mut readers = v.descend().to_vec();
        if readers
            .iter()
            .any(|&r| data.op(r).opcode() != OpCode::BoolNegate)
        {
            return Ok(false);
        }
        readers.sort_unstable();
        readers.dedup();

        data.op_set_opcode(cmp, flipped);
        if swap {
            data.op_swap_input(cmp, 0, 1)?;
        }
        for reader in readers {
            data.op_set_opcode(reader, OpCode::Copy);
        }
        Ok(true)
    }
}

define_rule!(
    /// Pushes a negation through `&&`/`||` (De Morgan): `!(a && b) => !a || !b`,
    /// `!(a || b) => !a && !b`.
    RuleNotDistribute,
    "notdistribute"
);

impl Rule for RuleNotDistribute {
    rule_identity!();

    fn op_list(&self) -> Vec<OpCode> {
        vec![OpCode::BoolNegate]
    }

    fn apply_op(&self, op: OpId, data: &mut Funcdata, _ctx: &EngineContext) -> Result<bool> {
        let Some(inner) = input_def(data, op, 0) else {
            return Ok(false);
        };
        let dual = match data.op(inner).opcode() {
            OpCode::BoolAnd => OpCode::BoolOr,
            OpCode::BoolOr => OpCode::BoolAnd,
            _ => return Ok(false),
        };
        let (Some(a), Some(b)) = (data.op(inner).input(0), data.op(inner).input(1)) else {
            return Ok(false);
        };
        if !usable(data, a) || !usable(data, b) {
            return Ok(false);
        }
        let not_a = data.new_op_before(op, OpCode::BoolNegate, &[a], 1)?;
        let not_b = data.new_op_before(op, OpCode::BoolNegate, &[b], 1)?;
        rewrite(data, op, dual, &[not_a, not_b])?;
        Ok(true)
    }
}
