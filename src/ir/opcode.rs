//! The p-code opcode set and its static properties.
//!
//! Every [`OpCode`] has a fixed set of [`OpCodeFlags`] describing its arity class and
//! semantics (commutative, boolean-valued, call, branch, marker, side effects). Rules and
//! the dispatch table consult these instead of hard-coding opcode lists.

use bitflags::bitflags;
use strum::{Display, EnumCount, EnumIter, EnumString, IntoStaticStr};

bitflags! {
    /// Static properties of an opcode.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OpCodeFlags: u32 {
        /// Takes exactly one input.
        const UNARY = 1 << 0;
        /// Takes exactly two inputs.
        const BINARY = 1 << 1;
        /// Variable or irregular arity.
        const SPECIAL = 1 << 2;
        /// Inputs may be swapped without changing the result.
        const COMMUTATIVE = 1 << 3;
        /// Produces a 1-byte boolean.
        const BOOLEAN_OUTPUT = 1 << 4;
        /// A sub-function call.
        const CALL = 1 << 5;
        /// Transfers control flow.
        const BRANCH = 1 << 6;
        /// Returns from the function.
        const RETURN = 1 << 7;
        /// A dataflow marker (`MULTIEQUAL`, `INDIRECT`) rather than an executable operation.
        const MARKER = 1 << 8;
        /// Operates on floating-point values.
        const FLOAT = 1 << 9;
        /// Has effects beyond defining its output.
        const SIDE_EFFECT = 1 << 10;
        /// Can be evaluated when all inputs are constant.
        const COLLAPSIBLE = 1 << 11;
    }
}

/// A p-code operation code.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    EnumCount,
    IntoStaticStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
#[allow(missing_docs)]
pub enum OpCode {
    Copy,
    Load,
    Store,
    Branch,
    Cbranch,
    Branchind,
    Call,
    Callind,
    Callother,
    Return,
    IntEqual,
    IntNotequal,
    IntSless,
    IntSlessequal,
    IntLess,
    IntLessequal,
    IntZext,
    IntSext,
    IntAdd,
    IntSub,
    IntCarry,
    IntScarry,
    IntSborrow,
    #[strum(serialize = "INT_2COMP")]
    Int2Comp,
    IntNegate,
    IntXor,
    IntAnd,
    IntOr,
    IntLeft,
    IntRight,
    IntSright,
    IntMult,
    IntDiv,
    IntSdiv,
    IntRem,
    IntSrem,
    BoolNegate,
    BoolXor,
    BoolAnd,
    BoolOr,
    FloatEqual,
    FloatNotequal,
    FloatLess,
    FloatLessequal,
    FloatNan,
    FloatAdd,
    FloatDiv,
    FloatMult,
    FloatSub,
    FloatNeg,
    FloatAbs,
    FloatSqrt,
    #[strum(serialize = "FLOAT_INT2FLOAT")]
    FloatInt2Float,
    #[strum(serialize = "FLOAT_FLOAT2FLOAT")]
    FloatFloat2Float,
    FloatTrunc,
    FloatCeil,
    FloatFloor,
    FloatRound,
    Multiequal,
    Indirect,
    Piece,
    Subpiece,
    Cast,
    Ptradd,
    Ptrsub,
    Segmentop,
    Cpoolref,
    New,
    Insert,
    Extract,
    Popcount,
    Lzcount,
}

impl OpCode {
    /// Returns the position of this opcode in dispatch tables.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Returns the static properties of this opcode.
    #[must_use]
    pub fn flags(self) -> OpCodeFlags {
        use OpCodeFlags as F;
        use OpCode::*;

        let fold = F::COLLAPSIBLE;
        let cmp = F::BINARY | F::BOOLEAN_OUTPUT | fold;
        match self {
            Copy => F::UNARY | fold,
            Load => F::BINARY,
            Store => F::SPECIAL | F::SIDE_EFFECT,
            Branch | Branchind => F::SPECIAL | F::BRANCH | F::SIDE_EFFECT,
            Cbranch => F::BINARY | F::BRANCH | F::SIDE_EFFECT,
            Call | Callind => F::SPECIAL | F::CALL | F::SIDE_EFFECT,
            Callother => F::SPECIAL | F::SIDE_EFFECT,
            Return => F::SPECIAL | F::RETURN | F::BRANCH | F::SIDE_EFFECT,
            IntEqual | IntNotequal => cmp | F::COMMUTATIVE,
            IntSless | IntSlessequal | IntLess | IntLessequal => cmp,
            IntCarry | IntScarry => cmp | F::COMMUTATIVE,
            IntSborrow => cmp,
            IntZext | IntSext | Int2Comp | IntNegate | Popcount | Lzcount => F::UNARY | fold,
            IntAdd | IntXor | IntAnd | IntOr | IntMult => F::BINARY | F::COMMUTATIVE | fold,
            IntSub | IntLeft | IntRight | IntSright | IntDiv | IntSdiv | IntRem | IntSrem => {
                F::BINARY | fold
            }
            BoolNegate => F::UNARY | F::BOOLEAN_OUTPUT | fold,
            BoolXor | BoolAnd | BoolOr => F::BINARY | F::COMMUTATIVE | F::BOOLEAN_OUTPUT | fold,
            FloatEqual | FloatNotequal => {
                F::BINARY | F::BOOLEAN_OUTPUT | F::COMMUTATIVE | F::FLOAT
            }
            FloatLess | FloatLessequal => F::BINARY | F::BOOLEAN_OUTPUT | F::FLOAT,
            FloatNan => F::UNARY | F::BOOLEAN_OUTPUT | F::FLOAT,
            FloatAdd | FloatMult => F::BINARY | F::COMMUTATIVE | F::FLOAT,
            FloatDiv | FloatSub => F::BINARY | F::FLOAT,
            FloatNeg | FloatAbs | FloatSqrt | FloatInt2Float | FloatFloat2Float | FloatTrunc
            | FloatCeil | FloatFloor | FloatRound => F::UNARY | F::FLOAT,
            Multiequal | Indirect => F::SPECIAL | F::MARKER,
            Piece => F::BINARY | fold,
            Subpiece => F::BINARY | fold,
            Cast => F::UNARY,
            Ptradd => F::SPECIAL,
            Ptrsub => F::BINARY,
            Segmentop | Cpoolref | Insert | Extract => F::SPECIAL,
            New => F::SPECIAL | F::SIDE_EFFECT,
        }
    }

    /// Returns `true` if the inputs of this opcode commute.
    #[must_use]
    pub fn is_commutative(self) -> bool {
        self.flags().contains(OpCodeFlags::COMMUTATIVE)
    }

    /// Returns `true` if this opcode always produces a boolean.
    #[must_use]
    pub fn is_boolean_output(self) -> bool {
        self.flags().contains(OpCodeFlags::BOOLEAN_OUTPUT)
    }

    /// Returns `true` for `CALL` and `CALLIND`.
    #[must_use]
    pub fn is_call(self) -> bool {
        self.flags().contains(OpCodeFlags::CALL)
    }

    /// Returns `true` for opcodes that transfer control.
    #[must_use]
    pub fn is_branch(self) -> bool {
        self.flags().contains(OpCodeFlags::BRANCH)
    }

    /// Returns `true` for `MULTIEQUAL` and `INDIRECT`.
    #[must_use]
    pub fn is_marker(self) -> bool {
        self.flags().contains(OpCodeFlags::MARKER)
    }

    /// Returns `true` if the op must be kept even when its output is unused.
    #[must_use]
    pub fn has_side_effect(self) -> bool {
        self.flags().contains(OpCodeFlags::SIDE_EFFECT)
    }

    /// Returns `true` if constant inputs can be folded into a constant output.
    #[must_use]
    pub fn is_collapsible(self) -> bool {
        self.flags().contains(OpCodeFlags::COLLAPSIBLE)
    }

    /// Returns the comparison computing the boolean negation of this one.
    ///
    /// The second element is `true` if the inputs must also be swapped, e.g.
    /// `!(a < b)` is `b <= a`. Returns `None` for non-comparisons.
    #[must_use]
    pub const fn boolean_flip(self) -> Option<(OpCode, bool)> {
        use OpCode::*;
        Some(match self {
            IntEqual => (IntNotequal, false),
            IntNotequal => (IntEqual, false),
            IntSless => (IntSlessequal, true),
            IntSlessequal => (IntSless, true),
            IntLess => (IntLessequal, true),
            IntLessequal => (IntLess, true),
            FloatEqual => (FloatNotequal, false),
            FloatNotequal => (FloatEqual, false),
            FloatLess => (FloatLessequal, true),
            FloatLessequal => (FloatLess, true),
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use strum::{EnumCount, IntoEnumIterator};

    use super::*;

    #[test]
    fn test_names_round_trip() {
        assert_eq!(OpCode::IntSlessequal.to_string(), "INT_SLESSEQUAL");
        assert_eq!(OpCode::Int2Comp.to_string(), "INT_2COMP");
        assert_eq!(OpCode::FloatInt2Float.to_string(), "FLOAT_INT2FLOAT");
        assert_eq!(OpCode::Multiequal.to_string(), "MULTIEQUAL");
        for opc in OpCode::iter() {
            assert_eq!(OpCode::from_str(&opc.to_string()).ok(), Some(opc));
        }
    }

    #[test]
    fn test_indices_are_dense() {
        for (i, opc) in OpCode::iter().enumerate() {
            assert_eq!(opc.index(), i);
        }
        assert_eq!(OpCode::Lzcount.index() + 1, OpCode::COUNT);
    }

    #[test]
    fn test_properties() {
        assert!(OpCode::IntAdd.is_commutative());
        assert!(!OpCode::IntSub.is_commutative());
        assert!(OpCode::IntLess.is_boolean_output());
        assert!(OpCode::Callind.is_call());
        assert!(OpCode::Multiequal.is_marker());
        assert!(OpCode::Store.has_side_effect());
        assert!(!OpCode::Load.has_side_effect());
        assert!(OpCode::IntCarry.is_collapsible());
        assert!(!OpCode::FloatAdd.is_collapsible());
    }

    #[test]
    fn test_boolean_flip() {
        assert_eq!(OpCode::IntLess.boolean_flip(), Some((OpCode::IntLessequal, true)));
        assert_eq!(OpCode::IntEqual.boolean_flip(), Some((OpCode::IntNotequal, false)));
        assert_eq!(OpCode::IntAdd.boolean_flip(), None);
    }
}
