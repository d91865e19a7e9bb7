//! P-code operations.

use std::fmt;

use bitflags::bitflags;

use crate::ir::{Address, BlockId, OpCode, VarnodeId};

bitflags! {
    /// Attribute flags on an operation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct OpFlags: u32 {
        /// A dataflow marker (`MULTIEQUAL`/`INDIRECT`).
        const MARKER = 1 << 0;
        /// Must not be collapsed by constant folding.
        const NO_COLLAPSE = 1 << 1;
        /// A constant-pool reference that has already been resolved.
        const CPOOL_TRANSFORMED = 1 << 2;
        /// A sub-function call.
        const CALL = 1 << 3;
        /// Produces a boolean.
        const BOOLEAN_OUTPUT = 1 << 4;
        /// Tombstone: the op no longer exists.
        const DESTROYED = 1 << 5;
        /// First op of its basic block.
        const STARTBASIC = 1 << 6;
    }
}

/// The address of the instruction an op was translated from, plus a unique counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeqNum {
    /// Instruction address.
    pub pc: Address,
    /// Unique within the function.
    pub uniq: u32,
}

impl fmt::Display for SeqNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}:{}", self.pc.offset, self.uniq)
    }
}

/// A single p-code operation.
#[derive(Debug, Clone, PartialEq)]
pub struct PcodeOp {
    pub(crate) opcode: OpCode,
    pub(crate) seq: SeqNum,
    pub(crate) order: u32,
    pub(crate) inputs: Vec<VarnodeId>,
    pub(crate) output: Option<VarnodeId>,
    pub(crate) parent: Option<BlockId>,
    pub(crate) flags: OpFlags,
}

impl PcodeOp {
    pub(crate) fn new(opcode: OpCode, seq: SeqNum, num_inputs: usize) -> Self {
        Self {
            opcode,
            seq,
            order: 0,
            inputs: Vec::with_capacity(num_inputs),
            output: None,
            parent: None,
            flags: Self::opcode_flags(opcode),
        }
    }

    pub(crate) fn opcode_flags(opcode: OpCode) -> OpFlags {
        let mut flags = OpFlags::empty();
        flags.set(OpFlags::MARKER, opcode.is_marker());
        flags.set(OpFlags::CALL, opcode.is_call());
        flags.set(OpFlags::BOOLEAN_OUTPUT, opcode.is_boolean_output());
        flags
    }

    /// The operation code.
    #[must_use]
    pub fn opcode(&self) -> OpCode {
        self.opcode
    }

    /// Sequence number.
    #[must_use]
    pub fn seq(&self) -> SeqNum {
        self.seq
    }

    /// Address of the originating instruction.
    #[must_use]
    pub fn address(&self) -> Address {
        self.seq.pc
    }

    /// Position within the parent block.
    #[must_use]
    pub fn order(&self) -> u32 {
        self.order
    }

    /// Input varnodes, in slot order.
    #[must_use]
    pub fn inputs(&self) -> &[VarnodeId] {
        &self.inputs
    }

    /// Number of inputs.
    #[must_use]
    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    /// Input in `slot`.
    #[must_use]
    pub fn input(&self, slot: usize) -> Option<VarnodeId> {
        self.inputs.get(slot).copied()
    }

    /// First slot reading `vn`.
    #[must_use]
    pub fn slot(&self, vn: VarnodeId) -> Option<usize> {
        self.inputs.iter().position(|&v| v == vn)
    }

    /// The output varnode.
    #[must_use]
    pub fn output(&self) -> Option<VarnodeId> {
        self.output
    }

    /// The block this op lives in, `None` once unlinked.
    #[must_use]
    pub fn parent(&self) -> Option<BlockId> {
        self.parent
    }

    /// Attribute flags.
    #[must_use]
    pub fn flags(&self) -> OpFlags {
        self.flags
    }

    /// Returns `true` if the op is not inserted in any block.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.parent.is_none()
    }

    /// Returns `true` once destroyed.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.flags.contains(OpFlags::DESTROYED)
    }

    /// Returns `true` for `MULTIEQUAL` and `INDIRECT`.
    #[must_use]
    pub fn is_marker(&self) -> bool {
        self.flags.contains(OpFlags::MARKER)
    }

    /// Returns `true` for calls.
    #[must_use]
    pub fn is_call(&self) -> bool {
        self.flags.contains(OpFlags::CALL)
    }

    /// Returns `true` for boolean-valued ops.
    #[must_use]
    pub fn is_boolean_output(&self) -> bool {
        self.flags.contains(OpFlags::BOOLEAN_OUTPUT)
    }

    /// Returns `true` if constant folding must leave the op alone.
    #[must_use]
    pub fn is_no_collapse(&self) -> bool {
        self.flags.contains(OpFlags::NO_COLLAPSE)
    }

    /// Returns `true` if the op must be kept regardless of its output's readers.
    #[must_use]
    pub fn has_side_effect(&self) -> bool {
        self.opcode.has_side_effect()
    }

    /// Returns `true` if the op ends its block with a transfer of control.
    #[must_use]
    pub fn is_flow_break(&self) -> bool {
        self.opcode.is_branch()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_flags_follow_opcode() {
        let seq = SeqNum {
            pc: Address::ram(0x40),
            uniq: 0,
        };
        let op = PcodeOp::new(OpCode::Multiequal, seq, 2);
        assert!(op.is_marker());
        assert!(op.is_dead());
        assert!(!op.is_call());
        let call = PcodeOp::new(OpCode::Callind, seq, 1);
        assert!(call.is_call());
        assert!(call.has_side_effect());
        assert_eq!(seq.to_string(), "0x40:0");
    }
}
