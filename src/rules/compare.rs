//! Comparison canonicalization.
//!
//! Comparisons are normalized towards strict `<` forms and towards a bare variable compared
//! against a constant, so that later rules and readers see one shape per condition.

use crate::{
    engine::{EngineContext, Rule},
    ir::{Funcdata, OpCode, OpId, VarnodeId},
    rules::{const_input, input_def, input_def_of, negation_of, rewrite, usable},
    utils::{calc_mask, signbit_negative, uintb_negate},
    Result,
};

define_rule!(
    /// Turns unsigned comparisons against the smallest values into equality:
    /// `x < 1 => x == 0` and `x <= 0 => x == 0`.
    RuleLessOne,
    "lessone"
);

impl Rule for RuleLessOne {
    rule_identity!();

    fn op_list(&self) -> Vec<OpCode> {
        vec![OpCode::IntLess, OpCode::IntLessequal]
    }

    fn apply_op(&self, op: OpId, data: &mut Funcdata, _ctx: &EngineContext) -> Result<bool> {
        let Some(c) = const_input(data, op, 1) else {
            return Ok(false);
        };
        let bound = match data.op(op).opcode() {
            OpCode::IntLess => 1,
            _ => 0,
        };
        let Some(x) = data.op(op).input(0) else {
            return Ok(false);
        };
        if c != bound || data.vn(x).is_constant() {
            return Ok(false);
        }
        let zero = data.new_constant(data.vn(x).size(), 0);
        rewrite(data, op, OpCode::IntEqual, &[x, zero])?;
        Ok(true)
    }
}

define_rule!(
    /// Converts non-strict comparisons with a constant into strict ones:
    /// `x <= c => x < c+1` and `c <= x => c-1 < x`, signed or unsigned, unless the adjusted
    /// constant would overflow.
    RuleIntLessEqual,
    "intlessequal"
);

impl Rule for RuleIntLessEqual {
    rule_identity!();

    fn op_list(&self) -> Vec<OpCode> {
        vec![OpCode::IntLessequal, OpCode::IntSlessequal]
    }

    fn apply_op(&self, op: OpId, data: &mut Funcdata, _ctx: &EngineContext) -> Result<bool> {
        let signed = data.op(op).opcode() == OpCode::IntSlessequal;
        let strict = if signed {
            OpCode::IntSless
        } else {
            OpCode::IntLess
        };
        let (Some(a), Some(b)) = (data.op(op).input(0), data.op(op).input(1)) else {
            return Ok(false);
        };
        let size = data.vn(a).size();
        if size > 8 {
            return Ok(false);
        }
        let mask = calc_mask(size);
        // Largest and smallest representable values in the comparison's domain.
        let (max, min) = if signed {
            (mask >> 1, (mask >> 1) + 1)
        } else {
            (mask, 0)
        };

        if let Some(c) = data.vn(b).constant_value() {
            if c == max || data.vn(a).is_constant() {
                return Ok(false);
            }
            let bumped = data.new_constant(size, c.wrapping_add(1) & mask);
            rewrite(data, op, strict, &[a, bumped])?;
            return Ok(true);
        }
        if let Some(c) = data.vn(a).constant_value() {
            if c == min {
                return Ok(false);
            }
            let lowered = data.new_constant(size, c.wrapping_sub(1) & mask);
            rewrite(data, op, strict, &[lowered, b])?;
            return Ok(true);
        }
        Ok(false)
    }
}

/// The inputs of the comparison defining input `slot` of `op`, with its opcode.
fn comparison_at(data: &Funcdata, op: OpId, slot: usize) -> Option<(OpCode, VarnodeId, VarnodeId)> {
    let def = input_def(data, op, slot)?;
    let o = data.op(def);
    Some((o.opcode(), o.input(0)?, o.input(1)?))
}

/// Returns `true` if `(a, b)` and `(c, d)` compare the same two values, in either order for
/// a symmetric comparison.
fn same_operands(
    data: &Funcdata,
    (a, b): (VarnodeId, VarnodeId),
    (c, d): (VarnodeId, VarnodeId),
    symmetric: bool,
) -> bool {
    (data.same_value(a, c) && data.same_value(b, d))
        || (symmetric && data.same_value(a, d) && data.same_value(b, c))
}

define_rule!(
    /// `(a < b) || (a == b) => a <= b`, for signed and unsigned comparisons.
    RuleLessEqual,
    "lessequal"
);

impl Rule for RuleLessEqual {
    rule_identity!();

    fn op_list(&self) -> Vec<OpCode> {
        vec![OpCode::BoolOr]
    }

    fn apply_op(&self, op: OpId, data: &mut Funcdata, _ctx: &EngineContext) -> Result<bool> {
        let (Some(first), Some(second)) =
            (comparison_at(data, op, 0), comparison_at(data, op, 1))
        else {
            return Ok(false);
        };
        let (less, equal) = if first.0 == OpCode::IntEqual {
            (second, first)
        } else {
            (first, second)
        };
        let combined = match less.0 {
            OpCode::IntLess => OpCode::IntLessequal,
            OpCode::IntSless => OpCode::IntSlessequal,
            _ => return Ok(false),
        };
        if equal.0 != OpCode::IntEqual
            || !same_operands(data, (less.1, less.2), (equal.1, equal.2), true)
            || !usable(data, less.1)
            || !usable(data, less.2)
        {
            return Ok(false);
        }
        rewrite(data, op, combined, &[less.1, less.2])?;
        Ok(true)
    }
}

define_rule!(
    /// `(a <= b) && (a != b) => a < b`, for signed and unsigned comparisons.
    RuleLessNotEqual,
    "lessnotequal"
);

impl Rule for RuleLessNotEqual {
    rule_identity!();

    fn op_list(&self) -> Vec<OpCode> {
        vec![OpCode::BoolAnd]
    }

    fn apply_op(&self, op: OpId, data: &mut Funcdata, _ctx: &EngineContext) -> Result<bool> {
        let (Some(first), Some(second)) =
            (comparison_at(data, op, 0), comparison_at(data, op, 1))
        else {
            return Ok(false);
        };
        let (le, ne) = if first.0 == OpCode::IntNotequal {
            (second, first)
        } else {
            (first, second)
        };
        let strict = match le.0 {
            OpCode::IntLessequal => OpCode::IntLess,
            OpCode::IntSlessequal => OpCode::IntSless,
            _ => return Ok(false),
        };
        if ne.0 != OpCode::IntNotequal
            || !same_operands(data, (le.1, le.2), (ne.1, ne.2), true)
            || !usable(data, le.1)
            || !usable(data, le.2)
        {
            return Ok(false);
        }
        rewrite(data, op, strict, &[le.1, le.2])?;
        Ok(true)
    }
}

define_rule!(
    /// Signed comparison of two values whose sign bits are known clear is unsigned
    /// comparison.
    RuleSLessToLess,
    "slesstoless"
);

impl Rule for RuleSLessToLess {
    rule_identity!();

    fn op_list(&self) -> Vec<OpCode> {
        vec![OpCode::IntSless, OpCode::IntSlessequal]
    }

    fn apply_op(&self, op: OpId, data: &mut Funcdata, _ctx: &EngineContext) -> Result<bool> {
        let o = data.op(op);
        let (Some(a), Some(b)) = (o.input(0), o.input(1)) else {
            return Ok(false);
        };
        let size = data.vn(a).size();
        if size > 8
            || signbit_negative(data.vn(a).nz_mask(), size)
            || signbit_negative(data.vn(b).nz_mask(), size)
        {
            return Ok(false);
        }
        let unsigned = match o.opcode() {
            OpCode::IntSless => OpCode::IntLess,
            _ => OpCode::IntLessequal,
        };
        data.op_set_opcode(op, unsigned);
        Ok(true)
    }
}

define_rule!(
    /// Moves an addition out of a comparison with zero: `a + c == 0 => a == -c` and
    /// `a + b*-1 == 0 => a == b`. Also applies to `!=`.
    RuleEqual2Zero,
    "equal2zero"
);

impl Rule for RuleEqual2Zero {
    rule_identity!();

    fn op_list(&self) -> Vec<OpCode> {
        vec![OpCode::IntEqual, OpCode::IntNotequal]
    }

    fn apply_op(&self, op: OpId, data: &mut Funcdata, _ctx: &EngineContext) -> Result<bool> {
        if const_input(data, op, 1) != Some(0) {
            return Ok(false);
        }
        let Some(add) = input_def_of(data, op, 0, OpCode::IntAdd) else {
            return Ok(false);
        };
        let (Some(a), Some(b)) = (data.op(add).input(0), data.op(add).input(1)) else {
            return Ok(false);
        };
        if !usable(data, a) || data.vn(a).is_constant() {
            return Ok(false);
        }
        let size = data.vn(a).size();
        let other = if let Some(c) = data.vn(b).constant_value() {
            data.new_constant(size, uintb_negate(c, size))
        } else if let Some(x) = negation_of(data, b).filter(|&x| usable(data, x)) {
            x
        } else {
            return Ok(false);
        };
        let opc = data.op(op).opcode();
        rewrite(data, op, opc, &[a, other])?;
        Ok(true)
    }
}

define_rule!(
    /// Solves a comparison with a constant for its variable: `a + c == d => a == d - c`,
    /// `-a == d => a == -d` and `~a == d => a == ~d`. The transformed expression must be
    /// read only by the comparison.
    RuleEqual2Constant,
    "equal2constant"
);

impl Rule for RuleEqual2Constant {
    rule_identity!();

    fn op_list(&self) -> Vec<OpCode> {
        vec![OpCode::IntEqual, OpCode::IntNotequal]
    }

    fn apply_op(&self, op: OpId, data: &mut Funcdata, _ctx: &EngineContext) -> Result<bool> {
        let Some(d) = const_input(data, op, 1) else {
            return Ok(false);
        };
        let Some(lhs) = data.op(op).input(0) else {
            return Ok(false);
        };
        let Some(def) = data.vn(lhs).def() else {
            return Ok(false);
        };
        if data.vn(lhs).lone_descend() != Some(op) {
            return Ok(false);
        }
        let size = data.vn(lhs).size();
        let mask = calc_mask(size);
        let (a, solved) = match data.op(def).opcode() {
            OpCode::IntAdd => match const_input(data, def, 1) {
                Some(c) => (data.op(def).input(0), d.wrapping_sub(c) & mask),
                None => return Ok(false),
            },
            OpCode::IntMult if const_input(data, def, 1) == Some(mask) => {
                (data.op(def).input(0), uintb_negate(d, size))
            }
            OpCode::IntNegate => (data.op(def).input(0), !d & mask),
            _ => return Ok(false),
        };
        let Some(a) = a.filter(|&a| usable(data, a) && !data.vn(a).is_constant()) else {
            return Ok(false);
        };
        let c = data.new_constant(size, solved);
        let opc = data.op(op).opcode();
        rewrite(data, op, opc, &[a, c])?;
        Ok(true)
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
    fn test_less_one() -> Result<()> {
        let mut b = FunctionBuilder::new("f", Address::ram(0x1000));
        let x = b.input(4, Address::register(0));
        let one = b.constant(4, 1);
        let lt = b.op(OpCode::IntLess, &[x, one], 1)?;
        let zero = b.constant(4, 0);
        let le = b.op(OpCode::IntLessequal, &[x, zero], 1)?;
        b.op_void(OpCode::Return, &[lt, le])?;
        let mut data = b.finish();
        let rule = RuleLessOne::new("analysis");

        for vn in [lt, le] {
            assert!(apply_rule(&rule, &mut data, vn)?);
            let op = def_of(&data, vn)?;
            assert_eq!(data.op(op).opcode(), OpCode::IntEqual);
            assert_eq!(const_input(&data, op, 1), Some(0));
        }
        data.verify()?;
        Ok(())
    }

    #[test]
    fn test_int_less_equal_bounds() -> Result<()> {
        let mut b = FunctionBuilder::new("f", Address::ram(0x1000));
        let x = b.input(1, Address::register(0));
        let ten = b.constant(1, 10);
        let le = b.op(OpCode::IntLessequal, &[x, ten], 1)?;
        let max = b.constant(1, 0x7f);
        let sle_max = b.op(OpCode::IntSlessequal, &[x, max], 1)?;
        let five = b.constant(1, 5);
        let ge = b.op(OpCode::IntSlessequal, &[five, x], 1)?;
        b.op_void(OpCode::Return, &[le, sle_max, ge])?;
        let mut data = b.finish();
        let rule = RuleIntLessEqual::new("analysis");

        assert!(apply_rule(&rule, &mut data, le)?);
        let op = def_of(&data, le)?;
        assert_eq!(data.op(op).opcode(), OpCode::IntLess);
        assert_eq!(const_input(&data, op, 1), Some(11));

        assert!(!apply_rule(&rule, &mut data, sle_max)?);

        assert!(apply_rule(&rule, &mut data, ge)?);
        let op = def_of(&data, ge)?;
        assert_eq!(data.op(op).opcode(), OpCode::IntSless);
        assert_eq!(const_input(&data, op, 0), Some(4));
        data.verify()?;
        Ok(())
    }

    #[test]
    fn test_less_equal_merge() -> Result<()> {
        let mut b = FunctionBuilder::new("f", Address::ram(0x1000));
        let x = b.input(4, Address::register(0));
        let y = b.input(4, Address::register(8));
        let eq = b.op(OpCode::IntEqual, &[y, x], 1)?;
        let lt = b.op(OpCode::IntSless, &[x, y], 1)?;
        let either = b.op(OpCode::BoolOr, &[eq, lt], 1)?;
        b.op_void(OpCode::Return, &[either])?;
        let mut data = b.finish();

        assert!(apply_rule(&RuleLessEqual::new("analysis"), &mut data, either)?);
        let op = def_of(&data, either)?;
        assert_eq!(data.op(op).opcode(), OpCode::IntSlessequal);
        assert_eq!(data.op(op).inputs(), &[x, y]);
        data.verify()?;
        Ok(())
    }

    #[test]
    fn test_less_not_equal_merge() -> Result<()> {
        let mut b = FunctionBuilder::new("f", Address::ram(0x1000));
        let x = b.input(4, Address::register(0));
        let y = b.input(4, Address::register(8));
        let le = b.op(OpCode::IntLessequal, &[x, y], 1)?;
        let ne = b.op(OpCode::IntNotequal, &[x, y], 1)?;
        let both = b.op(OpCode::BoolAnd, &[le, ne], 1)?;
        b.op_void(OpCode::Return, &[both])?;
        let mut data = b.finish();

        assert!(apply_rule(&RuleLessNotEqual::new("analysis"), &mut data, both)?);
        assert_eq!(data.op(def_of(&data, both)?).opcode(), OpCode::IntLess);
        Ok(())
    }

    #[test]
    fn test_sless_to_less() -> Result<()> {
        let mut b = FunctionBuilder::new("f", Address::ram(0x1000));
        let x = b.input(4, Address::register(0));
        let y = b.input(4, Address::register(8));
        let lt = b.op(OpCode::IntSless, &[x, y], 1)?;
        b.op_void(OpCode::Return, &[lt])?;
        let mut data = b.finish();
        let rule = RuleSLessToLess::new("analysis");

        assert!(!apply_rule(&rule, &mut data, lt)?);
        data.vn_set_nz_mask(x, 0xffff);
        data.vn_set_nz_mask(y, 0x7fff_ffff);
        assert!(apply_rule(&rule, &mut data, lt)?);
        assert_eq!(data.op(def_of(&data, lt)?).opcode(), OpCode::IntLess);
        Ok(())
    }

    #[test]
    fn test_equal2zero() -> Result<()> {
        let mut b = FunctionBuilder::new("f", Address::ram(0x1000));
        let x = b.input(4, Address::register(0));
        let y = b.input(4, Address::register(8));
        let three = b.constant(4, 3);
        let sum = b.op(OpCode::IntAdd, &[x, three], 4)?;
        let zero = b.constant(4, 0);
        let eq = b.op(OpCode::IntEqual, &[sum, zero], 1)?;
        let minus_one = b.constant(4, 0xffff_ffff);
        let neg = b.op(OpCode::IntMult, &[y, minus_one], 4)?;
        let diff = b.op(OpCode::IntAdd, &[x, neg], 4)?;
        let zero2 = b.constant(4, 0);
        let ne = b.op(OpCode::IntNotequal, &[diff, zero2], 1)?;
        b.op_void(OpCode::Return, &[eq, ne])?;
        let mut data = b.finish();
        let rule = RuleEqual2Zero::new("analysis");

        assert!(apply_rule(&rule, &mut data, eq)?);
        let op = def_of(&data, eq)?;
        assert_eq!(data.op(op).input(0), Some(x));
        assert_eq!(const_input(&data, op, 1), Some(0xffff_fffd));

        assert!(apply_rule(&rule, &mut data, ne)?);
        let op = def_of(&data, ne)?;
        assert_eq!(data.op(op).opcode(), OpCode::IntNotequal);
        assert_eq!(data.op(op).inputs(), &[x, y]);
        data.verify()?;
        Ok(())
    }

    #[test]
    fn test_equal2constant() -> Result<()> {
        let mut b = FunctionBuilder::new("f", Address::ram(0x1000));
        let x = b.input(2, Address::register(0));
        let two = b.constant(2, 2);
        let sum = b.op(OpCode::IntAdd, &[x, two], 2)?;
        let seven = b.constant(2, 7);
        let eq = b.op(OpCode::IntEqual, &[sum, seven], 1)?;
        let inv = b.op(OpCode::IntNegate, &[x], 2)?;
        let c = b.constant(2, 0x00ff);
        let eq2 = b.op(OpCode::IntEqual, &[inv, c], 1)?;
        b.op_void(OpCode::Return, &[eq, eq2])?;
        let mut data = b.finish();
        let rule = RuleEqual2Constant::new("analysis");

        assert!(apply_rule(&rule, &mut data, eq)?);
        let op = def_of(&data, eq)?;
        assert_eq!(data.op(op).input(0), Some(x));
        assert_eq!(const_input(&data, op, 1), Some(5));

        assert!(apply_rule(&rule, &mut data, eq2)?);
        assert_eq!(const_input(&data, def_of(&data, eq2)?, 1), Some(0xff00));
        data.verify()?;
        Ok(())
    }

    #[test]
    fn test_equal2constant_needs_lone_reader() -> Result<()> {
        let mut b = FunctionBuilder::new("f", Address::ram(0x1000));
        let x = b.input(2, Address::register(0));
        let two = b.constant(2, 2);
        let sum = b.op(OpCode::IntAdd, &[x, two], 2)?;
        let seven = b.constant(2, 7);
        let eq = b.op(OpCode::IntEqual, &[sum, seven], 1)?;
        b.op_void(OpCode::Return, &[eq, sum])?;
        let mut data = b.finish();

        assert!(!apply_rule(&RuleEqual2Constant::new("analysis"), &mut data, eq)?);
        Ok(())
    }
}
