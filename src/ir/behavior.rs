//! Constant evaluation of p-code opcodes.
//!
//! Used by constant folding. Evaluation works on raw `u64` bit patterns truncated to the
//! byte sizes involved. Floating-point operations and anything with side effects are
//! never evaluated; division by zero yields `None` so the op is left alone.

use crate::{
    ir::OpCode,
    utils::{calc_mask, popcount, sign_extend, signbit_negative, uintb_negate},
};

/// Evaluates a unary opcode on the constant `input` of `in_size` bytes.
///
/// Returns `None` if the opcode is not foldable.
#[must_use]
pub fn evaluate_unary(opc: OpCode, out_size: usize, in_size: usize, input: u64) -> Option<u64> {
    let out_mask = calc_mask(out_size);
    let input = input & calc_mask(in_size);
    let res = match opc {
        OpCode::Copy | OpCode::IntZext => input,
        OpCode::IntSext => sign_extend(input, in_size),
        OpCode::Int2Comp => uintb_negate(input, out_size),
        OpCode::IntNegate => !input,
        OpCode::BoolNegate => (input ^ 1) & 1,
        OpCode::Popcount => u64::from(popcount(input)),
        OpCode::Lzcount => {
            let bits = (in_size.min(8) * 8) as u32;
            u64::from(input.leading_zeros() - (64 - bits))
        }
        _ => return None,
    };
    Some(res & out_mask)
}

/// Evaluates a binary opcode on constants `a` and `b`.
///
/// `in_size` is the size of the first input. For `PIECE` the size of the second input is
/// `out_size - in_size`. Returns `None` if the opcode is not foldable or the operation is
/// undefined (division by zero).
#[must_use]
pub fn evaluate_binary(opc: OpCode, out_size: usize, in_size: usize, a: u64, b: u64) -> Option<u64> {
    let in_mask = calc_mask(in_size);
    let out_mask = calc_mask(out_size);
    let a = a & in_mask;
    let in_bits = (in_size.min(8) * 8) as u64;
    let signed = |v: u64| sign_extend(v, in_size) as i64;

    let res = match opc {
        OpCode::IntEqual => u64::from(a == (b & in_mask)),
        OpCode::IntNotequal => u64::from(a != (b & in_mask)),
        OpCode::IntLess => u64::from(a < (b & in_mask)),
        OpCode::IntLessequal => u64::from(a <= (b & in_mask)),
        OpCode::IntSless => u64::from(signed(a) < signed(b)),
        OpCode::IntSlessequal => u64::from(signed(a) <= signed(b)),
        OpCode::IntCarry => u64::from(a.wrapping_add(b & in_mask) & in_mask < a),
        OpCode::IntScarry => {
            let b = b & in_mask;
            let sum = a.wrapping_add(b) & in_mask;
            let sa = signbit_negative(a, in_size);
            u64::from(sa == signbit_negative(b, in_size) && sa != signbit_negative(sum, in_size))
        }
        OpCode::IntSborrow => {
            let b = b & in_mask;
            let diff = a.wrapping_sub(b) & in_mask;
            let sa = signbit_negative(a, in_size);
            u64::from(sa != signbit_negative(b, in_size) && sa != signbit_negative(diff, in_size))
        }
        OpCode::IntAdd => a.wrapping_add(b),
        OpCode::IntSub => a.wrapping_sub(b),
        OpCode::IntMult => a.wrapping_mul(b),
        OpCode::IntXor => a ^ b,
        OpCode::IntAnd => a & b,
        OpCode::IntOr => a | b,
        OpCode::IntLeft => {
            if b >= (out_size.min(8) * 8) as u64 {
                0
            } else {
                a << b
            }
        }
        OpCode::IntRight => {
            if b >= in_bits {
                0
            } else {
                a >> b
            }
        }
        OpCode::IntSright => {
            let shift = b.min(63);
            if b >= in_bits {
                if signbit_negative(a, in_size) {
                    u64::MAX
                } else {
                    0
                }
            } else {
                (signed(a) >> shift) as u64
            }
        }
        OpCode::IntDiv => a.checked_div(b & in_mask)?,
        OpCode::IntRem => a.checked_rem(b & in_mask)?,
        OpCode::IntSdiv => {
            let d = signed(b);
            if d == 0 {
                return None;
            }
            signed(a).wrapping_div(d) as u64
        }
        OpCode::IntSrem => {
            let d = signed(b);
            if d == 0 {
                return None;
            }
            signed(a).wrapping_rem(d) as u64
        }
        OpCode::BoolXor => (a ^ b) & 1,
        OpCode::BoolAnd => a & b & 1,
        OpCode::BoolOr => (a | b) & 1,
        OpCode::Piece => {
            let low_size = out_size.saturating_sub(in_size);
            if low_size >= 8 {
                b
            } else {
                (a << (low_size * 8)) | (b & calc_mask(low_size))
            }
        }
        OpCode::Subpiece => {
            if b >= 8 {
                0
            } else {
                a >> (b * 8)
            }
        }
        _ => return None,
    };
    Some(res & out_mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unary() {
        assert_eq!(evaluate_unary(OpCode::IntZext, 4, 1, 0x1ff), Some(0xff));
        assert_eq!(evaluate_unary(OpCode::IntSext, 4, 1, 0x80), Some(0xffff_ff80));
        assert_eq!(evaluate_unary(OpCode::Int2Comp, 1, 1, 1), Some(0xff));
        assert_eq!(evaluate_unary(OpCode::IntNegate, 2, 2, 0x00ff), Some(0xff00));
        assert_eq!(evaluate_unary(OpCode::BoolNegate, 1, 1, 1), Some(0));
        assert_eq!(evaluate_unary(OpCode::Popcount, 1, 4, 0xf0f0), Some(8));
        assert_eq!(evaluate_unary(OpCode::Lzcount, 1, 2, 0x00ff), Some(8));
        assert_eq!(evaluate_unary(OpCode::FloatNeg, 4, 4, 1), None);
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(evaluate_binary(OpCode::IntEqual, 1, 4, 5, 5), Some(1));
        assert_eq!(evaluate_binary(OpCode::IntLess, 1, 1, 0x80, 1), Some(0));
        assert_eq!(evaluate_binary(OpCode::IntSless, 1, 1, 0x80, 1), Some(1));
        assert_eq!(evaluate_binary(OpCode::IntCarry, 1, 1, 0xff, 1), Some(1));
        assert_eq!(evaluate_binary(OpCode::IntScarry, 1, 1, 0x7f, 1), Some(1));
        assert_eq!(evaluate_binary(OpCode::IntSborrow, 1, 1, 0x80, 1), Some(1));
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(evaluate_binary(OpCode::IntAdd, 1, 1, 0xff, 2), Some(1));
        assert_eq!(evaluate_binary(OpCode::IntSub, 4, 4, 0, 1), Some(0xffff_ffff));
        assert_eq!(evaluate_binary(OpCode::IntLeft, 1, 1, 1, 8), Some(0));
        assert_eq!(evaluate_binary(OpCode::IntSright, 1, 1, 0x80, 7), Some(0xff));
        assert_eq!(evaluate_binary(OpCode::IntSright, 1, 1, 0x80, 9), Some(0xff));
        assert_eq!(evaluate_binary(OpCode::IntDiv, 4, 4, 7, 0), None);
        assert_eq!(evaluate_binary(OpCode::IntSdiv, 1, 1, 0xfe, 2), Some(0xff));
        assert_eq!(evaluate_binary(OpCode::IntSrem, 1, 1, 0xf9, 2), Some(0xff));
    }

    #[test]
    fn test_piece_subpiece() {
        assert_eq!(evaluate_binary(OpCode::Piece, 4, 2, 0x1234, 0x5678), Some(0x1234_5678));
        assert_eq!(evaluate_binary(OpCode::Subpiece, 2, 4, 0x1234_5678, 2), Some(0x1234));
        assert_eq!(evaluate_binary(OpCode::Subpiece, 1, 4, 0x1234_5678, 9), Some(0));
    }
}
