//! Zero and sign extension, piecing and truncation.

use crate::{
    engine::{EngineContext, Rule},
    ir::{Funcdata, OpCode, OpId, VarnodeId},
    rules::{become_copy, const_input, input_def_of, rewrite, usable},
    utils::calc_mask,
    Result,
};

/// If `vn` is `zext(x)`, returns `x`.
fn zext_source(data: &Funcdata, vn: VarnodeId) -> Option<VarnodeId> {
    let def = data.vn(vn).def()?;
    let o = data.op(def);
    (o.opcode() == OpCode::IntZext).then(|| o.input(0)).flatten()
}

define_rule!(
    /// Drops zero extension from unsigned comparisons: `zext(x) == c => x == c` when `c`
    /// fits in `x`, and `zext(a) == zext(b) => a == b` when `a` and `b` have the same size.
    RuleZextEquality,
    "zextequality"
);

impl Rule for RuleZextEquality {
    rule_identity!();

    fn op_list(&self) -> Vec<OpCode> {
        vec![
            OpCode::IntEqual,
            OpCode::IntNotequal,
            OpCode::IntLess,
            OpCode::IntLessequal,
        ]
    }

    fn apply_op(&self, op: OpId, data: &mut Funcdata, _ctx: &EngineContext) -> Result<bool> {
        let opc = data.op(op).opcode();
        let (Some(in0), Some(in1)) = (data.op(op).input(0), data.op(op).input(1)) else {
            return Ok(false);
        };
        let (z0, z1) = (zext_source(data, in0), zext_source(data, in1));

        if let (Some(a), Some(b)) = (z0, z1) {
            if data.vn(a).size() != data.vn(b).size() || !usable(data, a) || !usable(data, b) {
                return Ok(false);
            }
            rewrite(data, op, opc, &[a, b])?;
            return Ok(true);
        }

        for (slot, src) in [(0, z0), (1, z1)] {
            let Some(x) = src else {
                continue;
            };
            let Some(c) = const_input(data, op, 1 - slot) else {
                continue;
            };
            let size = data.vn(x).size();
            if size > 8 || c & !calc_mask(size) != 0 || !usable(data, x) {
                continue;
            }
            let narrowed = data.new_constant(size, c);
            let inputs = if slot == 0 { [x, narrowed] } else { [narrowed, x] };
            rewrite(data, op, opc, &inputs)?;
            return Ok(true);
        }
        Ok(false)
    }
}

define_rule!(
    /// Concatenating zero on top is zero extension: `PIECE(0, x) => zext(x)`.
    RulePiece2Zext,
    "piece2zext"
);

impl Rule for RulePiece2Zext {
    rule_identity!();

    fn op_list(&self) -> Vec<OpCode> {
        vec![OpCode::Piece]
    }

    fn apply_op(&self, op: OpId, data: &mut Funcdata, _ctx: &EngineContext) -> Result<bool> {
        if const_input(data, op, 0) != Some(0) || data.op(op).num_inputs() != 2 {
            return Ok(false);
        }
        data.op_remove_input(op, 0)?;
        data.op_set_opcode(op, OpCode::IntZext);
        Ok(true)
    }
}

define_rule!(
    /// Truncation commutes with extension while it stays within the original value:
    /// `SUBPIECE(ext(x), c) => SUBPIECE(x, c)`, or `x` itself when the truncation takes all
    /// of it.
    RuleSubExtComm,
    "subextcomm"
);

impl Rule for RuleSubExtComm {
    rule_identity!();

    fn op_list(&self) -> Vec<OpCode> {
        vec![OpCode::Subpiece]
    }

    fn apply_op(&self, op: OpId, data: &mut Funcdata, _ctx: &EngineContext) -> Result<bool> {
        let Some(c) = const_input(data, op, 1) else {
            return Ok(false);
        };
        let Some(ext) = input_def_of(data, op, 0, OpCode::IntZext)
            .or_else(|| input_def_of(data, op, 0, OpCode::IntSext))
        else {
            return Ok(false);
        };
        let (Some(x), Some(out)) = (data.op(ext).input(0), data.op(op).output()) else {
            return Ok(false);
        };
        let (x_size, out_size) = (data.vn(x).size(), data.vn(out).size());
        if c as usize + out_size > x_size || !usable(data, x) {
            return Ok(false);
        }
        if c == 0 && out_size == x_size {
            become_copy(data, op, x)?;
        } else {
            let offset = data.new_constant(4, c);
            rewrite(data, op, OpCode::Subpiece, &[x, offset])?;
        }
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
    fn test_zext_compare_with_constant() -> Result<()> {
        let mut b = FunctionBuilder::new("f", Address::ram(0x1000));
        let x = b.input(1, Address::register(0));
        let wide = b.op(OpCode::IntZext, &[x], 4)?;
        let c = b.constant(4, 0x41);
        let eq = b.op(OpCode::IntEqual, &[c, wide], 1)?;
        let big = b.constant(4, 0x141);
        let lt = b.op(OpCode::IntLess, &[wide, big], 1)?;
        b.op_void(OpCode::Return, &[eq, lt])?;
        let mut data = b.finish();
        let rule = RuleZextEquality::new("analysis");

        assert!(apply_rule(&rule, &mut data, eq)?);
        let op = def_of(&data, eq)?;
        assert_eq!(data.op(op).input(1), Some(x));
        assert_eq!(const_input(&data, op, 0), Some(0x41));
        let narrowed = data.op(op).input(0).map(|vn| data.vn(vn).size());
        assert_eq!(narrowed, Some(1));

        assert!(!apply_rule(&rule, &mut data, lt)?);
        data.verify()?;
        Ok(())
    }

    #[test]
    fn test_zext_compare_both_sides() -> Result<()> {
        let mut b = FunctionBuilder::new("f", Address::ram(0x1000));
        let x = b.input(2, Address::register(0));
        let y = b.input(2, Address::register(2));
        let wx = b.op(OpCode::IntZext, &[x], 4)?;
        let wy = b.op(OpCode::IntZext, &[y], 4)?;
        let le = b.op(OpCode::IntLessequal, &[wx, wy], 1)?;
        b.op_void(OpCode::Return, &[le])?;
        let mut data = b.finish();

        assert!(apply_rule(&RuleZextEquality::new("analysis"), &mut data, le)?);
        let op = def_of(&data, le)?;
        assert_eq!(data.op(op).opcode(), OpCode::IntLessequal);
        assert_eq!(data.op(op).inputs(), &[x, y]);
        Ok(())
    }

    #[test]
    fn test_piece_of_zero() -> Result<()> {
        let mut b = FunctionBuilder::new("f", Address::ram(0x1000));
        let x = b.input(2, Address::register(0));
        let zero = b.constant(2, 0);
        let joined = b.op(OpCode::Piece, &[zero, x], 4)?;
        b.op_void(OpCode::Return, &[joined])?;
        let mut data = b.finish();

        assert!(apply_rule(&RulePiece2Zext::new("analysis"), &mut data, joined)?);
        let op = def_of(&data, joined)?;
        assert_eq!(data.op(op).opcode(), OpCode::IntZext);
        assert_eq!(data.op(op).inputs(), &[x]);
        data.verify()?;
        Ok(())
    }

    #[test]
    fn test_subpiece_through_extension() -> Result<()> {
        let mut b = FunctionBuilder::new("f", Address::ram(0x1000));
        let x = b.input(4, Address::register(0));
        let wide = b.op(OpCode::IntSext, &[x], 8)?;
        let zero = b.constant(4, 0);
        let whole = b.op(OpCode::Subpiece, &[wide, zero], 4)?;
        let one = b.constant(4, 1);
        let middle = b.op(OpCode::Subpiece, &[wide, one], 2)?;
        let four = b.constant(4, 4);
        let high = b.op(OpCode::Subpiece, &[wide, four], 4)?;
        b.op_void(OpCode::Return, &[whole, middle, high])?;
        let mut data = b.finish();
        let rule = RuleSubExtComm::new("analysis");

        assert!(apply_rule(&rule, &mut data, whole)?);
        let op = def_of(&data, whole)?;
        assert_eq!(data.op(op).opcode(), OpCode::Copy);
        assert_eq!(data.op(op).inputs(), &[x]);

        assert!(apply_rule(&rule, &mut data, middle)?);
        let op = def_of(&data, middle)?;
        assert_eq!(data.op(op).input(0), Some(x));
        assert_eq!(const_input(&data, op, 1), Some(1));

        assert!(!apply_rule(&rule, &mut data, high)?);
        data.verify()?;
        Ok(())
    }
}
