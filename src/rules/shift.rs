//! Shift rules.
//!
//! Multiplication by a power of two is treated as a left shift, so chains mixing the two
//! collapse as well.

use crate::{
    engine::{EngineContext, Rule},
    ir::{Funcdata, OpCode, OpId, VarnodeId},
    rules::{become_constant, become_copy, const_input, input_def, out_size, rewrite, usable},
    utils::{calc_mask, is_power_of_two},
    Result,
};

/// Direction and amount of a shift by a constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shift {
    Left(u64),
    Right(u64),
}

/// Decomposes `op` into `x` shifted by a constant amount.
fn as_shift(data: &Funcdata, op: OpId) -> Option<(VarnodeId, Shift)> {
    let o = data.op(op);
    let x = o.input(0)?;
    let c = const_input(data, op, 1)?;
    match o.opcode() {
        OpCode::IntLeft => Some((x, Shift::Left(c))),
        OpCode::IntRight => Some((x, Shift::Right(c))),
        OpCode::IntMult => is_power_of_two(c).map(|sa| (x, Shift::Left(u64::from(sa)))),
        _ => None,
    }
}

define_rule!(
    /// Removes trivial shifts: a shift by 0 is a `COPY`, a logical shift by the bit width or
    /// more is 0.
    RuleTrivialShift,
    "trivialshift"
);

impl Rule for RuleTrivialShift {
    rule_identity!();

    fn op_list(&self) -> Vec<OpCode> {
        vec![OpCode::IntLeft, OpCode::IntRight, OpCode::IntSright]
    }

    fn apply_op(&self, op: OpId, data: &mut Funcdata, _ctx: &EngineContext) -> Result<bool> {
        let Some(sa) = const_input(data, op, 1) else {
            return Ok(false);
        };
        let Some(x) = data.op(op).input(0) else {
            return Ok(false);
        };
        if sa == 0 {
            if !usable(data, x) {
                return Ok(false);
            }
            become_copy(data, op, x)?;
            return Ok(true);
        }
        let bits = 8 * data.vn(x).size() as u64;
        if sa >= bits && data.op(op).opcode() != OpCode::IntSright {
            become_constant(data, op, 0)?;
            return Ok(true);
        }
        Ok(false)
    }
}

define_rule!(
    /// Collapses two shifts by constants. Same-direction shifts add up:
    /// `(x << a) << b => x << (a + b)`, or 0 once the total reaches the bit width. Opposite
    /// shifts by the same amount clear bits: `(x << c) >> c => x & (mask >> c)`.
    RuleDoubleShift,
    "doubleshift"
);

impl Rule for RuleDoubleShift {
    rule_identity!();

    fn op_list(&self) -> Vec<OpCode> {
        vec![OpCode::IntLeft, OpCode::IntRight, OpCode::IntMult]
    }

    fn apply_op(&self, op: OpId, data: &mut Funcdata, _ctx: &EngineContext) -> Result<bool> {
        let Some((mid, outer)) = as_shift(data, op) else {
            return Ok(false);
        };
        let Some(inner_op) = input_def(data, op, 0) else {
            return Ok(false);
        };
        let Some((x, inner)) = as_shift(data, inner_op) else {
            return Ok(false);
        };
        let size = data.vn(mid).size();
        if data.vn(x).size() != size || out_size(data, op) != Some(size) || !usable(data, x) {
            return Ok(false);
        }
        let bits = 8 * size as u64;
        let mask = calc_mask(size);
        match (inner, outer) {
            (Shift::Left(a), Shift::Left(b)) | (Shift::Right(a), Shift::Right(b)) => {
                let total = a.saturating_add(b);
                if total >= bits {
                    become_constant(data, op, 0)?;
                } else {
                    let opc = if matches!(outer, Shift::Left(_)) {
                        OpCode::IntLeft
                    } else {
                        OpCode::IntRight
                    };
                    let sa = data.new_constant(4, total);
                    rewrite(data, op, opc, &[x, sa])?;
                }
            }
            (Shift::Left(a), Shift::Right(b)) if a == b && a < bits => {
                let c = data.new_constant(size, mask >> a);
                rewrite(data, op, OpCode::IntAnd, &[x, c])?;
            }
            (Shift::Right(a), Shift::Left(b)) if a == b && a < bits => {
                let c = data.new_constant(size, (mask << a) & mask);
                rewrite(data, op, OpCode::IntAnd, &[x, c])?;
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

define_rule!(
    /// Extracts a sign: `SUBPIECE(sext(x), c)` taking only extension bytes is
    /// `x s>> (8 * size - 1)`.
    RuleSignForm,
    "signform"
);

impl Rule for RuleSignForm {
    rule_identity!();

    fn op_list(&self) -> Vec<OpCode> {
        vec![OpCode::Subpiece]
    }

    fn apply_op(&self, op: OpId, data: &mut Funcdata, _ctx: &EngineContext) -> Result<bool> {
        let Some(c) = const_input(data, op, 1) else {
            return Ok(false);
        };
        let Some(sext) = input_def(data, op, 0) else {
            return Ok(false);
        };
        if data.op(sext).opcode() != OpCode::IntSext {
            return Ok(false);
        }
        let Some(x) = data.op(sext).input(0) else {
            return Ok(false);
        };
        let size = data.vn(x).size();
        if c < size as u64 || out_size(data, op) != Some(size) || !usable(data, x) {
            return Ok(false);
        }
        let sa = data.new_constant(4, 8 * size as u64 - 1);
        rewrite(data, op, OpCode::IntSright, &[x, sa])?;
        Ok(true)
    }
}

define_rule!(
    /// Sees through a widened product when only the sign is taken:
    /// `SUBPIECE(sext(x) * small, hi) s>> n => x s>> n`, where `n` selects the sign bit and
    /// `small` cannot carry into it.
    RuleSignForm2,
    "signform2"
);

impl Rule for RuleSignForm2 {
    rule_identity!();

    fn op_list(&self) -> Vec<OpCode> {
        vec![OpCode::IntSright]
    }

    fn apply_op(&self, op: OpId, data: &mut Funcdata, _ctx: &EngineContext) -> Result<bool> {
        let Some(input) = data.op(op).input(0) else {
            return Ok(false);
        };
        let size = data.vn(input).size();
        if const_input(data, op, 1) != Some(8 * size as u64 - 1) {
            return Ok(false);
        }
        let Some(sub) = input_def(data, op, 0) else {
            return Ok(false);
        };
        if data.op(sub).opcode() != OpCode::Subpiece {
            return Ok(false);
        }
        let (Some(prod), Some(c)) = (data.op(sub).input(0), const_input(data, sub, 1)) else {
            return Ok(false);
        };
        let prod_size = data.vn(prod).size();
        if c as usize + size != prod_size {
            return Ok(false);
        }
        let Some(mult) = data.vn(prod).def() else {
            return Ok(false);
        };
        if data.op(mult).opcode() != OpCode::IntMult {
            return Ok(false);
        }
        let Some(slot) = (0..2).find(|&s| {
            input_def(data, mult, s).is_some_and(|d| data.op(d).opcode() == OpCode::IntSext)
        }) else {
            return Ok(false);
        };
        let Some(x) = input_def(data, mult, slot).and_then(|d| data.op(d).input(0)) else {
            return Ok(false);
        };
        if !usable(data, x) || data.vn(x).size() != size {
            return Ok(false);
        }
        let Some(other) = data.op(mult).input(1 - slot) else {
            return Ok(false);
        };
        let small = match data.vn(other).constant_value() {
            Some(val) => val != 0 && val <= calc_mask(size) && 2 * size <= prod_size,
            None => data
                .vn(other)
                .def()
                .filter(|&d| data.op(d).opcode() == OpCode::IntZext)
                .and_then(|d| data.op(d).input(0))
                .is_some_and(|z| data.vn(z).size() + size <= prod_size),
        };
        if !small {
            return Ok(false);
        }
        data.op_set_input(op, x, 0)?;
        Ok(true)
    }
}
