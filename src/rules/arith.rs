//! Arithmetic rules: constant folding, identities and canonical operand order.

use strum::IntoEnumIterator;

use crate::{
    engine::{EngineContext, Rule},
    ir::{
        behavior::{evaluate_binary, evaluate_unary},
        Funcdata, OpCode, OpId,
    },
    rules::{
        become_constant, become_copy, const_input, input_def_of, negation_of, out_size, rewrite,
        usable,
    },
    utils::{calc_mask, uintb_negate},
    Result,
};

define_rule!(
    /// Folds an op whose inputs are all constants into a `COPY` of the result.
    RuleCollapseConstants,
    "collapseconstants"
);

impl Rule for RuleCollapseConstants {
    rule_identity!();

    fn op_list(&self) -> Vec<OpCode> {
        OpCode::iter()
            .filter(|&opc| opc.is_collapsible() && opc != OpCode::Copy)
            .collect()
    }

    fn apply_op(&self, op: OpId, data: &mut Funcdata, _ctx: &EngineContext) -> Result<bool> {
        let o = data.op(op);
        if o.is_no_collapse() {
            return Ok(false);
        }
        let Some(size) = out_size(data, op) else {
            return Ok(false);
        };
        let mut vals = Vec::with_capacity(o.num_inputs());
        for &vn in o.inputs() {
            match data.vn(vn).constant_value() {
                Some(val) => vals.push(val),
                None => return Ok(false),
            }
        }
        let Some(&first) = o.inputs().first() else {
            return Ok(false);
        };
        let in_size = data.vn(first).size();
        let folded = match vals.as_slice() {
            [a] => evaluate_unary(o.opcode(), size, in_size, *a),
            [a, b] => evaluate_binary(o.opcode(), size, in_size, *a, *b),
            _ => None,
        };
        let Some(val) = folded else {
            return Ok(false);
        };
        become_constant(data, op, val)?;
        Ok(true)
    }
}

define_rule!(
    /// Simplifies binary ops whose two inputs hold the same value: `x ^ x => 0`,
    /// `x == x => true`, `x & x => x`.
    RuleTrivialArith,
    "trivialarith"
);

impl Rule for RuleTrivialArith {
    rule_identity!();

    fn op_list(&self) -> Vec<OpCode> {
        vec![
            OpCode::IntXor,
            OpCode::IntSub,
            OpCode::BoolXor,
            OpCode::IntNotequal,
            OpCode::IntLess,
            OpCode::IntSless,
            OpCode::IntEqual,
            OpCode::IntLessequal,
            OpCode::IntSlessequal,
            OpCode::IntAnd,
            OpCode::IntOr,
            OpCode::BoolAnd,
            OpCode::BoolOr,
        ]
    }

    fn apply_op(&self, op: OpId, data: &mut Funcdata, _ctx: &EngineContext) -> Result<bool> {
        let o = data.op(op);
        let (Some(a), Some(b), 2) = (o.input(0), o.input(1), o.num_inputs()) else {
            return Ok(false);
        };
        if !data.functional_equality(a, b) {
            return Ok(false);
        }
        match o.opcode() {
            OpCode::IntXor
            | OpCode::IntSub
            | OpCode::BoolXor
            | OpCode::IntNotequal
            | OpCode::IntLess
            | OpCode::IntSless => become_constant(data, op, 0)?,
            OpCode::IntEqual | OpCode::IntLessequal | OpCode::IntSlessequal => {
                become_constant(data, op, 1)?;
            }
            _ => {
                if !usable(data, a) {
                    return Ok(false);
                }
                become_copy(data, op, a)?;
            }
        }
        Ok(true)
    }
}

define_rule!(
    /// Puts commutative ops in canonical order: a constant goes in slot 1, and for
    /// `INT_ADD` a negated operand goes in slot 1.
    RuleTermOrder,
    "termorder"
);

impl Rule for RuleTermOrder {
    rule_identity!();

    fn op_list(&self) -> Vec<OpCode> {
        OpCode::iter().filter(|opc| opc.is_commutative()).collect()
    }

    fn apply_op(&self, op: OpId, data: &mut Funcdata, _ctx: &EngineContext) -> Result<bool> {
        let o = data.op(op);
        let (Some(a), Some(b), 2) = (o.input(0), o.input(1), o.num_inputs()) else {
            return Ok(false);
        };
        let (ca, cb) = (data.vn(a).is_constant(), data.vn(b).is_constant());
        let swap = if ca {
            !cb
        } else {
            o.opcode() == OpCode::IntAdd
                && !cb
                && negation_of(data, a).is_some()
                && negation_of(data, b).is_none()
        };
        if !swap {
            return Ok(false);
        }
        data.op_swap_input(op, 0, 1)?;
        Ok(true)
    }
}

define_rule!(
    /// Removes identity elements: `x + 0`, `x ^ 0`, `x | 0`, `x * 1 => x` and `x * 0 => 0`.
    RuleIdentityEl,
    "identityel"
);

impl Rule for RuleIdentityEl {
    rule_identity!();

    fn op_list(&self) -> Vec<OpCode> {
        vec![OpCode::IntAdd, OpCode::IntXor, OpCode::IntOr, OpCode::IntMult]
    }

    fn apply_op(&self, op: OpId, data: &mut Funcdata, _ctx: &EngineContext) -> Result<bool> {
        let Some(c) = const_input(data, op, 1) else {
            return Ok(false);
        };
        let Some(x) = data.op(op).input(0) else {
            return Ok(false);
        };
        match (data.op(op).opcode(), c) {
            (OpCode::IntAdd | OpCode::IntXor | OpCode::IntOr, 0) | (OpCode::IntMult, 1) => {
                if !usable(data, x) {
                    return Ok(false);
                }
                become_copy(data, op, x)?;
            }
            (OpCode::IntMult, 0) => become_constant(data, op, 0)?,
            _ => return Ok(false),
        }
        Ok(true)
    }
}

define_rule!(
    /// Collapses constant chains: `(x + c1) + c2 => x + (c1 + c2)`,
    /// `(x * c1) * c2 => x * (c1 * c2)`.
    RuleAddMultCollapse,
    "addmultcollapse"
);

impl Rule for RuleAddMultCollapse {
    rule_identity!();

    fn op_list(&self) -> Vec<OpCode> {
        vec![OpCode::IntAdd, OpCode::IntMult]
    }

    fn apply_op(&self, op: OpId, data: &mut Funcdata, _ctx: &EngineContext) -> Result<bool> {
        let opc = data.op(op).opcode();
        let Some(c2) = const_input(data, op, 1) else {
            return Ok(false);
        };
        let Some(inner) = input_def_of(data, op, 0, opc) else {
            return Ok(false);
        };
        let Some(c1) = const_input(data, inner, 1) else {
            return Ok(false);
        };
        let Some(x) = data.op(inner).input(0) else {
            return Ok(false);
        };
        if !usable(data, x) || data.vn(x).is_constant() {
            return Ok(false);
        }
        let Some(size) = out_size(data, op) else {
            return Ok(false);
        };
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
    /// Canonicalizes subtraction: `a - b => a + b * -1`.
    RuleSub2Add,
    "sub2add"
);

impl Rule for RuleSub2Add {
    rule_identity!();

    fn op_list(&self) -> Vec<OpCode> {
        vec![OpCode::IntSub]
    }

    fn apply_op(&self, op: OpId, data: &mut Funcdata, _ctx: &EngineContext) -> Result<bool> {
        let Some(b) = data.op(op).input(1) else {
            return Ok(false);
        };
        if !usable(data, b) {
            return Ok(false);
        }
        let size = data.vn(b).size();
        let neg_one = data.new_constant(size, calc_mask(size));
        let prod = data.new_op_before(op, OpCode::IntMult, &[b, neg_one], size)?;
        data.op_set_input(op, prod, 1)?;
        data.op_set_opcode(op, OpCode::IntAdd);
        Ok(true)
    }
}

define_rule!(
    /// Canonicalizes negation: `-x => x * -1`.
    Rule2Comp2Mult,
    "2comp2mult"
);

impl Rule for Rule2Comp2Mult {
    rule_identity!();

    fn op_list(&self) -> Vec<OpCode> {
        vec![OpCode::Int2Comp]
    }

    fn apply_op(&self, op: OpId, data: &mut Funcdata, _ctx: &EngineContext) -> Result<bool> {
        let Some(size) = out_size(data, op) else {
            return Ok(false);
        };
        let neg_one = data.new_constant(size, calc_mask(size));
        data.op_insert_input(op, neg_one, 1)?;
        data.op_set_opcode(op, OpCode::IntMult);
        Ok(true)
    }
}

define_rule!(
    /// Moves an `INT_XOR` out of an equality test: `(x ^ c1) == c2 => x == (c1 ^ c2)` and
    /// `(x ^ y) == 0 => x == y`.
    RuleXorCollapse,
    "xorcollapse"
);

impl Rule for RuleXorCollapse {
    rule_identity!();

    fn op_list(&self) -> Vec<OpCode> {
        vec![OpCode::IntEqual, OpCode::IntNotequal]
    }

    fn apply_op(&self, op: OpId, data: &mut Funcdata, _ctx: &EngineContext) -> Result<bool> {
        let Some(c2) = const_input(data, op, 1) else {
            return Ok(false);
        };
        let Some(xor) = input_def_of(data, op, 0, OpCode::IntXor) else {
            return Ok(false);
        };
        let (Some(x), Some(y)) = (data.op(xor).input(0), data.op(xor).input(1)) else {
            return Ok(false);
        };
        if !usable(data, x) {
            return Ok(false);
        }
        let rhs = match data.vn(y).constant_value() {
            Some(c1) => {
                let size = data.vn(x).size();
                data.new_constant(size, c1 ^ c2)
            }
            None if c2 == 0 && usable(data, y) => y,
            None => return Ok(false),
        };
        data.op_set_input(op, x, 0)?;
        data.op_set_input(op, rhs, 1)?;
        Ok(true)
    }
}

define_rule!(
    /// Simplifies an op combining a value with its complement: `x & ~x => 0`,
    /// `x | ~x => -1`, `x ^ ~x => -1`.
    RuleNegateIdentity,
    "negateidentity"
);

impl Rule for RuleNegateIdentity {
    rule_identity!();

    fn op_list(&self) -> Vec<OpCode> {
        vec![OpCode::IntAnd, OpCode::IntOr, OpCode::IntXor]
    }

    fn apply_op(&self, op: OpId, data: &mut Funcdata, _ctx: &EngineContext) -> Result<bool> {
        for slot in 0..2 {
            let Some(neg) = input_def_of(data, op, slot, OpCode::IntNegate) else {
                continue;
            };
            if data.op(neg).input(0) != data.op(op).input(1 - slot) {
                continue;
            }
            let val = if data.op(op).opcode() == OpCode::IntAnd {
                0
            } else {
                u64::MAX
            };
            become_constant(data, op, val)?;
            return Ok(true);
        }
        Ok(false)
    }
}

define_rule!(
    /// Cancels double complements: `~~x => x`, `!!b => b`.
    RuleNegateNegate,
    "negatenegate"
);

impl Rule for RuleNegateNegate {
    rule_identity!();

    fn op_list(&self) -> Vec<OpCode> {
        vec![OpCode::IntNegate, OpCode::BoolNegate]
    }

    fn apply_op(&self, op: OpId, data: &mut Funcdata, _ctx: &EngineContext) -> Result<bool> {
        let opc = data.op(op).opcode();
        let Some(inner) = input_def_of(data, op, 0, opc) else {
            return Ok(false);
        };
        let Some(x) = data.op(inner).input(0) else {
            return Ok(false);
        };
        if !usable(data, x) {
            return Ok(false);
        }
        become_copy(data, op, x)?;
        Ok(true)
    }
}

define_rule!(
    /// Turns a carry test against a constant into a comparison: `CARRY(x, 0) => false`,
    /// `CARRY(x, c) => -c <= x`.
    RuleCarryElim,
    "carryelim"
);

impl Rule for RuleCarryElim {
    rule_identity!();

    fn op_list(&self) -> Vec<OpCode> {
        vec![OpCode::IntCarry]
    }

    fn apply_op(&self, op: OpId, data: &mut Funcdata, _ctx: &EngineContext) -> Result<bool> {
        let Some(c) = const_input(data, op, 1) else {
            return Ok(false);
        };
        let Some(x) = data.op(op).input(0) else {
            return Ok(false);
        };
        if data.vn(x).is_constant() || !usable(data, x) {
            return Ok(false);
        }
        if c == 0 {
            become_constant(data, op, 0)?;
            return Ok(true);
        }
        let size = data.vn(x).size();
        let bound = data.new_constant(size, uintb_negate(c, size));
        rewrite(data, op, OpCode::IntLessequal, &[bound, x])?;
        Ok(true)
    }
}

define_rule!(
    /// Restores negation in the clean-up phase: `x * -1 => -x`.
    RuleMultNegOne,
    "multnegone"
);

impl Rule for RuleMultNegOne {
    rule_identity!();

    fn op_list(&self) -> Vec<OpCode> {
        vec![OpCode::IntMult]
    }

    fn apply_op(&self, op: OpId, data: &mut Funcdata, _ctx: &EngineContext) -> Result<bool> {
        let Some(size) = out_size(data, op) else {
            return Ok(false);
        };
        if const_input(data, op, 1) != Some(calc_mask(size)) {
            return Ok(false);
        }
        if data
            .op(op)
            .input(0)
            .map_or(true, |x| data.vn(x).is_constant())
        {
            return Ok(false);
        }
        data.op_remove_input(op, 1)?;
        data.op_set_opcode(op, OpCode::Int2Comp);
        Ok(true)
    }
}

define_rule!(
    /// Restores subtraction in the clean-up phase: `a + -b => a - b`.
    Rule2Comp2Sub,
    "2comp2sub"
);

impl Rule for Rule2Comp2Sub {
    rule_identity!();

    fn op_list(&self) -> Vec<OpCode> {
        vec![OpCode::IntAdd]
    }

    fn apply_op(&self, op: OpId, data: &mut Funcdata, _ctx: &EngineContext) -> Result<bool> {
        for slot in [1, 0] {
            let Some(neg) = input_def_of(data, op, slot, OpCode::Int2Comp) else {
                continue;
            };
            let (Some(a), Some(b)) = (data.op(op).input(1 - slot), data.op(neg).input(0)) else {
                continue;
            };
            if !usable(data, b) {
                continue;
            }
            rewrite(data, op, OpCode::IntSub, &[a, b])?;
            return Ok(true);
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ir::{Address, FunctionBuilder},
        test::{apply_rule, def_of},
    };

    #[test]
    fn test_xor_self_becomes_zero() -> Result<()> {
        let mut b = FunctionBuilder::new("f", Address::ram(0x1000));
        let v = b.input(4, Address::register(0));
        let x = b.op(OpCode::IntXor, &[v, v], 4)?;
        b.op_void(OpCode::Return, &[x])?;
        let mut data = b.finish();

        assert!(apply_rule(&RuleTrivialArith::new("analysis"), &mut data, x)?);
        let op = def_of(&data, x)?;
        assert_eq!(data.op(op).opcode(), OpCode::Copy);
        assert_eq!(const_input(&data, op, 0), Some(0));
        let c = data.op(op).inputs()[0];
        assert_eq!(data.vn(c).size(), 4);
        assert!(data.vn(v).has_no_descend());
        data.verify()?;
        Ok(())
    }

    #[test]
    fn test_trivial_and_and_compare() -> Result<()> {
        let mut b = FunctionBuilder::new("f", Address::ram(0x1000));
        let v = b.input(4, Address::register(0));
        let and = b.op(OpCode::IntAnd, &[v, v], 4)?;
        let le = b.op(OpCode::IntLessequal, &[v, v], 1)?;
        b.op_void(OpCode::Return, &[and, le])?;
        let mut data = b.finish();
        let rule = RuleTrivialArith::new("analysis");

        assert!(apply_rule(&rule, &mut data, and)?);
        let op = def_of(&data, and)?;
        assert_eq!(data.op(op).inputs(), &[v]);
        assert!(apply_rule(&rule, &mut data, le)?);
        assert_eq!(const_input(&data, def_of(&data, le)?, 0), Some(1));
        data.verify()?;
        Ok(())
    }

    #[test]
    fn test_collapse_constants() -> Result<()> {
        let mut b = FunctionBuilder::new("f", Address::ram(0x1000));
        let c1 = b.constant(2, 0x1234);
        let c2 = b.constant(2, 0x0f0f);
        let and = b.op(OpCode::IntAnd, &[c1, c2], 2)?;
        let wide = b.op(OpCode::IntSext, &[and], 4)?;
        b.op_void(OpCode::Return, &[wide])?;
        let mut data = b.finish();
        let rule = RuleCollapseConstants::new("analysis");

        assert!(apply_rule(&rule, &mut data, and)?);
        assert_eq!(const_input(&data, def_of(&data, and)?, 0), Some(0x0204));
        assert!(!apply_rule(&rule, &mut data, wide)?);
        assert!(!rule.op_list().contains(&OpCode::Copy));
        data.verify()?;
        Ok(())
    }

    #[test]
    fn test_term_order() -> Result<()> {
        let mut b = FunctionBuilder::new("f", Address::ram(0x1000));
        let x = b.input(4, Address::register(0));
        let y = b.input(4, Address::register(8));
        let c = b.constant(4, 3);
        let sum = b.op(OpCode::IntAdd, &[c, x], 4)?;
        let neg = b.op(OpCode::Int2Comp, &[y], 4)?;
        let diff = b.op(OpCode::IntAdd, &[neg, x], 4)?;
        b.op_void(OpCode::Return, &[sum, diff])?;
        let mut data = b.finish();
        let rule = RuleTermOrder::new("analysis");

        assert!(apply_rule(&rule, &mut data, sum)?);
        assert_eq!(data.op(def_of(&data, sum)?).input(0), Some(x));
        assert!(!apply_rule(&rule, &mut data, sum)?);
        assert!(apply_rule(&rule, &mut data, diff)?);
        assert_eq!(data.op(def_of(&data, diff)?).inputs(), &[x, neg]);
        assert!(!apply_rule(&rule, &mut data, diff)?);
        Ok(())
    }

    #[test]
    fn test_identity_elements() -> Result<()> {
        let mut b = FunctionBuilder::new("f", Address::ram(0x1000));
        let x = b.input(4, Address::register(0));
        let zero = b.constant(4, 0);
        let one = b.constant(4, 1);
        let zero2 = b.constant(4, 0);
        let sum = b.op(OpCode::IntAdd, &[x, zero], 4)?;
        let prod = b.op(OpCode::IntMult, &[x, one], 4)?;
        let annihilated = b.op(OpCode::IntMult, &[x, zero2], 4)?;
        b.op_void(OpCode::Return, &[sum, prod, annihilated])?;
        let mut data = b.finish();
        let rule = RuleIdentityEl::new("analysis");

        assert!(apply_rule(&rule, &mut data, sum)?);
        assert_eq!(data.op(def_of(&data, sum)?).inputs(), &[x]);
        assert!(apply_rule(&rule, &mut data, prod)?);
        assert_eq!(data.op(def_of(&data, prod)?).inputs(), &[x]);
        assert!(apply_rule(&rule, &mut data, annihilated)?);
        assert_eq!(const_input(&data, def_of(&data, annihilated)?, 0), Some(0));
        data.verify()?;
        Ok(())
    }

    #[test]
    fn test_add_mult_collapse() -> Result<()> {
        let mut b = FunctionBuilder::new("f", Address::ram(0x1000));
        let x = b.input(1, Address::register(0));
        let c1 = b.constant(1, 0xf0);
        let inner = b.op(OpCode::IntAdd, &[x, c1], 1)?;
        let c2 = b.constant(1, 0x20);
        let outer = b.op(OpCode::IntAdd, &[inner, c2], 1)?;
        b.op_void(OpCode::Return, &[outer])?;
        let mut data = b.finish();

        assert!(apply_rule(&RuleAddMultCollapse::new("analysis"), &mut data, outer)?);
        let op = def_of(&data, outer)?;
        assert_eq!(data.op(op).input(0), Some(x));
        assert_eq!(const_input(&data, op, 1), Some(0x10));
        data.verify()?;
        Ok(())
    }

    #[test]
    fn test_sub_and_negate_canonical_forms() -> Result<()> {
        let mut b = FunctionBuilder::new("f", Address::ram(0x1000));
        let x = b.input(4, Address::register(0));
        let y = b.input(4, Address::register(8));
        let diff = b.op(OpCode::IntSub, &[x, y], 4)?;
        let neg = b.op(OpCode::Int2Comp, &[x], 4)?;
        b.op_void(OpCode::Return, &[diff, neg])?;
        let mut data = b.finish();

        assert!(apply_rule(&RuleSub2Add::new("analysis"), &mut data, diff)?);
        let add = def_of(&data, diff)?;
        assert_eq!(data.op(add).opcode(), OpCode::IntAdd);
        let prod = data.op(add).inputs()[1];
        assert_eq!(negation_of(&data, prod), Some(y));

        assert!(apply_rule(&Rule2Comp2Mult::new("analysis"), &mut data, neg)?);
        let mult = def_of(&data, neg)?;
        assert_eq!(data.op(mult).opcode(), OpCode::IntMult);
        assert_eq!(const_input(&data, mult, 1), Some(0xffff_ffff));
        data.verify()?;

        assert!(apply_rule(&RuleMultNegOne::new("cleanup"), &mut data, neg)?);
        assert_eq!(data.op(mult).opcode(), OpCode::Int2Comp);
        assert!(apply_rule(&RuleMultNegOne::new("cleanup"), &mut data, prod)?);
        assert!(apply_rule(&Rule2Comp2Sub::new("cleanup"), &mut data, diff)?);
        assert_eq!(data.op(add).opcode(), OpCode::IntSub);
        assert_eq!(data.op(add).inputs(), &[x, y]);
        data.verify()?;
        Ok(())
    }

    #[test]
    fn test_xor_collapse() -> Result<()> {
        let mut b = FunctionBuilder::new("f", Address::ram(0x1000));
        let x = b.input(4, Address::register(0));
        let y = b.input(4, Address::register(8));
        let c1 = b.constant(4, 0xff);
        let xc = b.op(OpCode::IntXor, &[x, c1], 4)?;
        let c2 = b.constant(4, 0x0f);
        let eq = b.op(OpCode::IntEqual, &[xc, c2], 1)?;
        let xy = b.op(OpCode::IntXor, &[x, y], 4)?;
        let zero = b.constant(4, 0);
        let ne = b.op(OpCode::IntNotequal, &[xy, zero], 1)?;
        b.op_void(OpCode::Return, &[eq, ne])?;
        let mut data = b.finish();
        let rule = RuleXorCollapse::new("analysis");

        assert!(apply_rule(&rule, &mut data, eq)?);
        let op = def_of(&data, eq)?;
        assert_eq!(data.op(op).input(0), Some(x));
        assert_eq!(const_input(&data, op, 1), Some(0xf0));
        assert!(apply_rule(&rule, &mut data, ne)?);
        assert_eq!(data.op(def_of(&data, ne)?).inputs(), &[x, y]);
        data.verify()?;
        Ok(())
    }

    #[test]
    fn test_negate_rules() -> Result<()> {
        let mut b = FunctionBuilder::new("f", Address::ram(0x1000));
        let x = b.input(4, Address::register(0));
        let not = b.op(OpCode::IntNegate, &[x], 4)?;
        let and = b.op(OpCode::IntAnd, &[not, x], 4)?;
        let or = b.op(OpCode::IntOr, &[x, not], 4)?;
        let notnot = b.op(OpCode::IntNegate, &[not], 4)?;
        b.op_void(OpCode::Return, &[and, or, notnot])?;
        let mut data = b.finish();

        let identity = RuleNegateIdentity::new("analysis");
        assert!(apply_rule(&identity, &mut data, and)?);
        assert_eq!(const_input(&data, def_of(&data, and)?, 0), Some(0));
        assert!(apply_rule(&identity, &mut data, or)?);
        assert_eq!(const_input(&data, def_of(&data, or)?, 0), Some(0xffff_ffff));
        assert!(apply_rule(&RuleNegateNegate::new("analysis"), &mut data, notnot)?);
        assert_eq!(data.op(def_of(&data, notnot)?).inputs(), &[x]);
        data.verify()?;
        Ok(())
    }

    #[test]
    fn test_carry_elim() -> Result<()> {
        let mut b = FunctionBuilder::new("f", Address::ram(0x1000));
        let x = b.input(1, Address::register(0));
        let zero = b.constant(1, 0);
        let never = b.op(OpCode::IntCarry, &[x, zero], 1)?;
        let c = b.constant(1, 0x10);
        let carry = b.op(OpCode::IntCarry, &[x, c], 1)?;
        b.op_void(OpCode::Return, &[never, carry])?;
        let mut data = b.finish();
        let rule = RuleCarryElim::new("analysis");

        assert!(apply_rule(&rule, &mut data, never)?);
        assert_eq!(const_input(&data, def_of(&data, never)?, 0), Some(0));
        assert!(apply_rule(&rule, &mut data, carry)?);
        let op = def_of(&data, carry)?;
        assert_eq!(data.op(op).opcode(), OpCode::IntLessequal);
        assert_eq!(const_input(&data, op, 0), Some(0xf0));
        assert_eq!(data.op(op).input(1), Some(x));
        data.verify()?;
        Ok(())
    }
}
