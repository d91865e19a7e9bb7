//! The per-function IR container.
//!
//! [`Funcdata`] owns every varnode, op, block and call-site descriptor of one function in
//! flat arenas addressed by handles. Removal never frees a slot: destroyed objects stay as
//! tombstones until the whole `Funcdata` is dropped, so a handle obtained from this function
//! can always be dereferenced.
//!
//! All graph mutation goes through the methods here. They maintain the dataflow invariants:
//!
//! - every input slot of a live op is recorded once in the reader list of its varnode
//! - a varnode has at most one defining op, and that op's output is the varnode
//! - constants have at most one reader; reading a constant that already has a reader
//!   transparently duplicates it
//! - constants and annotations that lose their last reader are destroyed immediately
//!
//! [`Funcdata::verify`] checks these invariants and is used by the dispatch loop when
//! invariant checking is enabled.
//!
//! # Processing lifecycle
//!
//! The first [`Funcdata::start_processing`] snapshots the raw body. A restart calls
//! [`Funcdata::clear_analysis`], which restores that snapshot while keeping warnings and
//! call-target overrides, so that the next `start_processing` re-applies the overrides to
//! the pristine body.

use std::{collections::BTreeMap, fmt, sync::Arc};

use bitflags::bitflags;

use crate::{
    ir::{
        Address, AddrSpace, Architecture, BasicBlock, BlockId, CallSpec, CallSpecId, OpCode,
        OpFlags, OpId, PcodeOp, SeqNum, Storage, Varnode, VarnodeFlags, VarnodeId,
    },
    utils::calc_mask,
    Result,
};

bitflags! {
    /// Processing state of a function.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FuncFlags: u32 {
        /// `start_processing` has run.
        const PROCESSING_STARTED = 1 << 0;
        /// `stop_processing` has run.
        const PROCESSING_COMPLETE = 1 << 1;
        /// The clean-up phase has begun.
        const CLEAN_UP_STARTED = 1 << 2;
        /// A rewrite invalidated earlier analysis; the restart controller should re-run.
        const RESTART_PENDING = 1 << 3;
        /// The function is being analyzed only to recover a jump-table.
        const JUMPTABLE_RECOVERY = 1 << 4;
    }
}

/// A non-fatal, user-visible annotation on a function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    /// The text of the warning.
    pub message: String,
    /// The site the warning refers to, `None` for function-level warnings.
    pub address: Option<Address>,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.address {
            Some(addr) => write!(f, "WARNING: {} (at {})", self.message, addr),
            None => write!(f, "WARNING: {}", self.message),
        }
    }
}

/// The arenas making up a function body.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct FuncBody {
    varnodes: Vec<Varnode>,
    ops: Vec<PcodeOp>,
    blocks: Vec<BasicBlock>,
    calls: Vec<CallSpec>,
    next_uniq: u32,
    next_unique: u64,
}

/// The IR of a single function plus its analysis state.
#[derive(Debug, Clone)]
pub struct Funcdata {
    name: String,
    entry: Address,
    arch: Arc<Architecture>,
    body: FuncBody,
    baseline: Option<FuncBody>,
    flags: FuncFlags,
    warnings: Vec<Warning>,
    overrides: BTreeMap<Address, Address>,
}

impl Funcdata {
    /// Creates an empty function.
    #[must_use]
    pub fn new(name: impl Into<String>, entry: Address, arch: Arc<Architecture>) -> Self {
        Self {
            name: name.into(),
            entry,
            arch,
            body: FuncBody::default(),
            baseline: None,
            flags: FuncFlags::empty(),
            warnings: Vec::new(),
            overrides: BTreeMap::new(),
        }
    }

    /// The function name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The entry point.
    #[must_use]
    pub fn entry(&self) -> Address {
        self.entry
    }

    /// The shared architecture description.
    #[must_use]
    pub fn arch(&self) -> &Architecture {
        &self.arch
    }

    /// Processing state flags.
    #[must_use]
    pub fn flags(&self) -> FuncFlags {
        self.flags
    }

    /// Returns the varnode behind `id`.
    #[must_use]
    pub fn vn(&self, id: VarnodeId) -> &Varnode {
        &self.body.varnodes[id.index()]
    }

    /// Returns the op behind `id`.
    #[must_use]
    pub fn op(&self, id: OpId) -> &PcodeOp {
        &self.body.ops[id.index()]
    }

    /// Returns the block behind `id`.
    #[must_use]
    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.body.blocks[id.index()]
    }

    fn vn_mut(&mut self, id: VarnodeId) -> &mut Varnode {
        &mut self.body.varnodes[id.index()]
    }

    fn op_mut(&mut self, id: OpId) -> &mut PcodeOp {
        &mut self.body.ops[id.index()]
    }

    /// Number of varnode slots, including destroyed ones.
    #[must_use]
    pub fn num_varnodes(&self) -> usize {
        self.body.varnodes.len()
    }

    /// Number of op slots, including destroyed ones.
    #[must_use]
    pub fn num_ops(&self) -> usize {
        self.body.ops.len()
    }

    /// Number of basic blocks.
    #[must_use]
    pub fn num_blocks(&self) -> usize {
        self.body.blocks.len()
    }

    /// Returns `true` if both functions have an identical graph.
    #[must_use]
    pub fn graph_eq(&self, other: &Funcdata) -> bool {
        self.body == other.body
    }

    // ---------------------------------------------------------------------------------------
    // Varnode creation
    // ---------------------------------------------------------------------------------------

    fn push_varnode(&mut self, loc: Storage, size: usize) -> VarnodeId {
        let id = VarnodeId::new(self.body.varnodes.len());
        self.body.varnodes.push(Varnode::new(loc, size, id.index()));
        id
    }

    /// Creates a free varnode of `size` bytes at `addr`.
    pub fn new_varnode(&mut self, size: usize, addr: Address) -> VarnodeId {
        if addr.is_constant() {
            return self.new_constant(size, addr.offset);
        }
        self.push_varnode(Storage::Memory(addr), size)
    }

    /// Creates a constant of `size` bytes. The value is truncated to the size.
    pub fn new_constant(&mut self, size: usize, val: u64) -> VarnodeId {
        self.push_varnode(
            Storage::Memory(Address::constant(val & calc_mask(size))),
            size,
        )
    }

    /// Creates a function input of `size` bytes at `addr`.
    pub fn new_input(&mut self, size: usize, addr: Address) -> VarnodeId {
        let vn = self.push_varnode(Storage::Memory(addr), size);
        self.vn_mut(vn).flags |= VarnodeFlags::INPUT;
        vn
    }

    /// Creates a fresh temporary of `size` bytes.
    pub fn new_unique(&mut self, size: usize) -> VarnodeId {
        let offset = self.arch.unique_base + self.body.next_unique;
        self.body.next_unique += size.max(1) as u64;
        self.push_varnode(Storage::Memory(Address::unique(offset)), size)
    }

    /// Creates a fresh temporary and makes it the output of `op`.
    ///
    /// # Errors
    ///
    /// Fails if `op` cannot take an output (see [`Funcdata::op_set_output`]).
    pub fn new_unique_out(&mut self, size: usize, op: OpId) -> Result<VarnodeId> {
        let vn = self.new_unique(size);
        self.op_set_output(op, vn)?;
        Ok(vn)
    }

    /// Creates a varnode at `addr` defined by `op`.
    ///
    /// # Errors
    ///
    /// Fails for constant addresses or if `op` cannot take an output.
    pub fn new_varnode_out(&mut self, size: usize, addr: Address, op: OpId) -> Result<VarnodeId> {
        let vn = self.new_varnode(size, addr);
        self.op_set_output(op, vn)?;
        Ok(vn)
    }

    /// Creates an annotation referencing `target`.
    pub fn new_varnode_iop(&mut self, target: OpId) -> VarnodeId {
        let size = self.arch.pointer_size;
        self.push_varnode(Storage::OpRef(target), size)
    }

    /// Creates an annotation referencing the call-site descriptor `call`.
    pub fn new_varnode_call_spec(&mut self, call: CallSpecId) -> VarnodeId {
        let size = self.arch.pointer_size;
        self.push_varnode(Storage::CallRef(call), size)
    }

    /// Sets attribute flags on a varnode.
    pub fn vn_set_flags(&mut self, vn: VarnodeId, flags: VarnodeFlags) {
        self.vn_mut(vn).flags |= flags;
    }

    /// Clears attribute flags on a varnode.
    pub fn vn_clear_flags(&mut self, vn: VarnodeId, flags: VarnodeFlags) {
        self.vn_mut(vn).flags &= !flags;
    }

    /// Replaces the non-zero mask of a varnode.
    pub fn vn_set_nz_mask(&mut self, vn: VarnodeId, mask: u64) {
        let size = self.vn(vn).size;
        self.vn_mut(vn).nz_mask = mask & calc_mask(size);
    }

    fn destroy_varnode(&mut self, vn: VarnodeId) {
        let v = self.vn_mut(vn);
        v.flags |= VarnodeFlags::DESTROYED;
        v.descend.clear();
        v.def = None;
    }

    fn check_vn(&self, vn: VarnodeId) -> Result<()> {
        if vn.index() >= self.body.varnodes.len() || self.vn(vn).is_destroyed() {
            return Err(lowlevel_error!("Use of destroyed varnode {}", vn));
        }
        Ok(())
    }

    fn check_op(&self, op: OpId) -> Result<()> {
        if op.index() >= self.body.ops.len() || self.op(op).is_destroyed() {
            return Err(lowlevel_error!("Use of destroyed op {}", op));
        }
        Ok(())
    }

    // ---------------------------------------------------------------------------------------
    // Op creation and dataflow edits
    // ---------------------------------------------------------------------------------------

    /// Creates a new, unlinked `COPY` op at `addr` with room for `num_inputs` inputs.
    ///
    /// Inputs are filled in slot order with [`Funcdata::op_set_input`] and the opcode set
    /// with [`Funcdata::op_set_opcode`]. The op does not execute until it is inserted.
    pub fn new_op(&mut self, num_inputs: usize, addr: Address) -> OpId {
        let seq = SeqNum {
            pc: addr,
            uniq: self.body.next_uniq,
        };
        self.body.next_uniq += 1;
        let id = OpId::new(self.body.ops.len());
        self.body.ops.push(PcodeOp::new(OpCode::Copy, seq, num_inputs));
        id
    }

    /// Creates an op with the given opcode and inputs, gives it a fresh temporary output of
    /// `out_size` bytes and inserts it right before `follow`.
    ///
    /// # Errors
    ///
    /// Fails if `follow` is not inserted in a block or an input is destroyed.
    pub fn new_op_before(
        &mut self,
        follow: OpId,
        opcode: OpCode,
        inputs: &[VarnodeId],
        out_size: usize,
    ) -> Result<VarnodeId> {
        let addr = self.op(follow).address();
        let op = self.new_op(inputs.len(), addr);
        self.op_set_opcode(op, opcode);
        for (slot, &vn) in inputs.iter().enumerate() {
            self.op_set_input(op, vn, slot)?;
        }
        let out = self.new_unique_out(out_size, op)?;
        self.op_insert_before(op, follow)?;
        Ok(out)
    }

    /// Changes the opcode of `op`, updating the opcode-derived flags.
    pub fn op_set_opcode(&mut self, op: OpId, opcode: OpCode) {
        let derived = OpFlags::MARKER | OpFlags::CALL | OpFlags::BOOLEAN_OUTPUT;
        let o = self.op_mut(op);
        o.opcode = opcode;
        o.flags = (o.flags & !derived) | PcodeOp::opcode_flags(opcode);
    }

    /// Sets attribute flags on an op.
    pub fn op_set_flags(&mut self, op: OpId, flags: OpFlags) {
        self.op_mut(op).flags |= flags;
    }

    /// Clears attribute flags on an op.
    pub fn op_clear_flags(&mut self, op: OpId, flags: OpFlags) {
        self.op_mut(op).flags &= !flags;
    }

    /// Removes one reader entry of `op` from `vn`, destroying constants and annotations that
    /// become unread.
    fn remove_descend(&mut self, vn: VarnodeId, op: OpId) {
        let v = self.vn_mut(vn);
        if let Some(pos) = v.descend.iter().position(|&o| o == op) {
            v.descend.swap_remove(pos);
        }
        let v = self.vn(vn);
        if v.has_no_descend() && !v.is_written() && (v.is_constant() || v.is_annotation()) {
            self.destroy_varnode(vn);
        }
    }

    /// Constants are never shared between readers.
    fn private_constant(&mut self, vn: VarnodeId) -> VarnodeId {
        let v = self.vn(vn);
        match v.constant_value() {
            Some(val) if !v.has_no_descend() => {
                let size = v.size;
                self.new_constant(size, val)
            }
            _ => vn,
        }
    }

    /// Makes `vn` input `slot` of `op`.
    ///
    /// `slot` may be one past the current last input, which appends.
    ///
    /// # Errors
    ///
    /// Fails if `slot` is out of range or either object is destroyed.
    pub fn op_set_input(&mut self, op: OpId, vn: VarnodeId, slot: usize) -> Result<()> {
        self.check_op(op)?;
        self.check_vn(vn)?;
        let len = self.op(op).inputs.len();
        if slot > len {
            return Err(lowlevel_error!(
                "Input slot {} out of range for {} with {} inputs",
                slot,
                op,
                len
            ));
        }
        if slot < len && self.op(op).inputs[slot] == vn {
            return Ok(());
        }
        let vn = self.private_constant(vn);
        if slot < len {
            let old = self.op(op).inputs[slot];
            self.op_mut(op).inputs[slot] = vn;
            self.remove_descend(old, op);
        } else {
            self.op_mut(op).inputs.push(vn);
        }
        self.vn_mut(vn).descend.push(op);
        Ok(())
    }

    /// Removes input `slot` of `op`, shifting later inputs down.
    ///
    /// # Errors
    ///
    /// Fails if `slot` is out of range.
    pub fn op_remove_input(&mut self, op: OpId, slot: usize) -> Result<()> {
        self.check_op(op)?;
        if slot >= self.op(op).inputs.len() {
            return Err(lowlevel_error!("Cannot remove missing input {} of {}", slot, op));
        }
        let old = self.op_mut(op).inputs.remove(slot);
        self.remove_descend(old, op);
        Ok(())
    }

    /// Inserts `vn` as input `slot` of `op`, shifting later inputs up.
    ///
    /// # Errors
    ///
    /// Fails if `slot` is beyond the end of the inputs.
    pub fn op_insert_input(&mut self, op: OpId, vn: VarnodeId, slot: usize) -> Result<()> {
        self.check_op(op)?;
        self.check_vn(vn)?;
        if slot > self.op(op).inputs.len() {
            return Err(lowlevel_error!("Cannot insert input at slot {} of {}", slot, op));
        }
        let vn = self.private_constant(vn);
        self.op_mut(op).inputs.insert(slot, vn);
        self.vn_mut(vn).descend.push(op);
        Ok(())
    }

    /// Swaps two inputs of `op`.
    ///
    /// # Errors
    ///
    /// Fails if either slot is out of range.
    pub fn op_swap_input(&mut self, op: OpId, slot1: usize, slot2: usize) -> Result<()> {
        let len = self.op(op).inputs.len();
        if slot1 >= len || slot2 >= len {
            return Err(lowlevel_error!("Cannot swap inputs {} and {} of {}", slot1, slot2, op));
        }
        self.op_mut(op).inputs.swap(slot1, slot2);
        Ok(())
    }

    /// Replaces all inputs of `op`.
    ///
    /// # Errors
    ///
    /// Fails if an input is destroyed.
    pub fn op_set_all_input(&mut self, op: OpId, inputs: &[VarnodeId]) -> Result<()> {
        self.check_op(op)?;
        while !self.op(op).inputs.is_empty() {
            let last = self.op(op).inputs.len() - 1;
            self.op_remove_input(op, last)?;
        }
        for (slot, &vn) in inputs.iter().enumerate() {
            self.op_set_input(op, vn, slot)?;
        }
        Ok(())
    }

    /// Makes `vn` the output of `op`, replacing any previous output.
    ///
    /// # Errors
    ///
    /// Fails if `vn` is already defined by another op, or is a constant, an annotation or a
    /// function input.
    pub fn op_set_output(&mut self, op: OpId, vn: VarnodeId) -> Result<()> {
        self.check_op(op)?;
        self.check_vn(vn)?;
        let v = self.vn(vn);
        if v.def == Some(op) {
            return Ok(());
        }
        if let Some(other) = v.def {
            return Err(lowlevel_error!("{} is already defined by {}", vn, other));
        }
        if v.is_constant() || v.is_annotation() || v.is_input() {
            return Err(lowlevel_error!("{} ({}) cannot be the output of {}", vn, v, op));
        }
        self.op_unset_output(op);
        self.op_mut(op).output = Some(vn);
        self.vn_mut(vn).def = Some(op);
        Ok(())
    }

    /// Detaches the output of `op`. The varnode becomes free.
    pub fn op_unset_output(&mut self, op: OpId) {
        if let Some(out) = self.op_mut(op).output.take() {
            self.vn_mut(out).def = None;
        }
    }

    // ---------------------------------------------------------------------------------------
    // Block placement
    // ---------------------------------------------------------------------------------------

    /// Creates a new, empty basic block.
    pub fn new_block(&mut self) -> BlockId {
        let id = BlockId::new(self.body.blocks.len());
        self.body.blocks.push(BasicBlock::default());
        id
    }

    fn renumber(&mut self, block: BlockId) {
        let ops = self.body.blocks[block.index()].ops.clone();
        for (i, op) in ops.into_iter().enumerate() {
            let o = self.op_mut(op);
            o.order = i as u32;
            o.flags.set(OpFlags::STARTBASIC, i == 0);
        }
    }

    fn insert_at(&mut self, op: OpId, block: BlockId, pos: usize) -> Result<()> {
        self.check_op(op)?;
        if let Some(parent) = self.op(op).parent {
            return Err(lowlevel_error!("{} is already inserted in {}", op, parent));
        }
        self.body.blocks[block.index()].ops.insert(pos, op);
        self.op_mut(op).parent = Some(block);
        self.renumber(block);
        Ok(())
    }

    fn position(&self, op: OpId) -> Result<(BlockId, usize)> {
        let block = self
            .op(op)
            .parent
            .ok_or_else(|| lowlevel_error!("{} is not inserted in a block", op))?;
        let pos = self
            .block(block)
            .ops
            .iter()
            .position(|&o| o == op)
            .ok_or_else(|| lowlevel_error!("{} missing from its block {}", op, block))?;
        Ok((block, pos))
    }

    /// Inserts the unlinked `op` immediately before `follow`.
    ///
    /// # Errors
    ///
    /// Fails if `op` is already inserted or `follow` is not.
    pub fn op_insert_before(&mut self, op: OpId, follow: OpId) -> Result<()> {
        let (block, pos) = self.position(follow)?;
        self.insert_at(op, block, pos)
    }

    /// Inserts the unlinked `op` immediately after `prev`.
    ///
    /// # Errors
    ///
    /// Fails if `op` is already inserted or `prev` is not.
    pub fn op_insert_after(&mut self, op: OpId, prev: OpId) -> Result<()> {
        let (block, pos) = self.position(prev)?;
        self.insert_at(op, block, pos + 1)
    }

    /// Inserts `op` at the start of `block`, after any leading `MULTIEQUAL`s unless `op` is
    /// itself a `MULTIEQUAL`.
    ///
    /// # Errors
    ///
    /// Fails if `op` is already inserted.
    pub fn op_insert_begin(&mut self, op: OpId, block: BlockId) -> Result<()> {
        let pos = if self.op(op).opcode == OpCode::Multiequal {
            0
        } else {
            self.block(block)
                .ops
                .iter()
                .take_while(|&&o| self.op(o).opcode == OpCode::Multiequal)
                .count()
        };
        self.insert_at(op, block, pos)
    }

    /// Inserts `op` at the end of `block`, before a trailing branch.
    ///
    /// # Errors
    ///
    /// Fails if `op` is already inserted.
    pub fn op_insert_end(&mut self, op: OpId, block: BlockId) -> Result<()> {
        let ops = &self.block(block).ops;
        let mut pos = ops.len();
        if let Some(&last) = ops.last() {
            if self.op(last).is_flow_break() && !self.op(op).is_flow_break() {
                pos -= 1;
            }
        }
        self.insert_at(op, block, pos)
    }

    /// Removes `op` from its block without touching its dataflow.
    pub fn op_uninsert(&mut self, op: OpId) {
        if let Some(block) = self.op_mut(op).parent.take() {
            self.body.blocks[block.index()].ops.retain(|&o| o != op);
            self.renumber(block);
        }
    }

    /// Detaches every input and the output of `op` and removes it from its block.
    ///
    /// # Errors
    ///
    /// Fails if `op` is destroyed.
    pub fn op_unlink(&mut self, op: OpId) -> Result<()> {
        self.op_set_all_input(op, &[])?;
        self.op_unset_output(op);
        self.op_uninsert(op);
        Ok(())
    }

    /// Destroys `op`.
    ///
    /// Inputs are detached. The output is destroyed when nothing reads it, otherwise it is
    /// left behind as a free varnode.
    ///
    /// # Errors
    ///
    /// Never fails for a live op; destroying twice is a no-op.
    pub fn op_destroy(&mut self, op: OpId) -> Result<()> {
        if self.op(op).is_destroyed() {
            return Ok(());
        }
        if let Some(out) = self.op(op).output {
            self.op_unset_output(op);
            if self.vn(out).has_no_descend() {
                self.destroy_varnode(out);
            }
        }
        self.op_set_all_input(op, &[])?;
        self.op_uninsert(op);
        self.op_mut(op).flags |= OpFlags::DESTROYED;
        Ok(())
    }

    /// Makes every reader of `vn` read `replacement` instead.
    ///
    /// # Errors
    ///
    /// Fails if `replacement` is destroyed.
    pub fn total_replace(&mut self, vn: VarnodeId, replacement: VarnodeId) -> Result<()> {
        if vn == replacement {
            return Ok(());
        }
        for op in self.distinct_readers(vn) {
            for slot in 0..self.op(op).inputs.len() {
                if self.op(op).inputs[slot] == vn {
                    self.op_set_input(op, replacement, slot)?;
                }
            }
        }
        Ok(())
    }

    /// Makes every non-marker reader of `vn` read the constant `val` instead.
    ///
    /// Markers keep reading `vn`: a constant cannot flow into a `MULTIEQUAL` or `INDIRECT`.
    ///
    /// # Errors
    ///
    /// Fails on a broken reader list.
    pub fn total_replace_constant(&mut self, vn: VarnodeId, val: u64) -> Result<()> {
        let size = self.vn(vn).size;
        for op in self.distinct_readers(vn) {
            if self.op(op).is_marker() {
                continue;
            }
            for slot in 0..self.op(op).inputs.len() {
                if self.op(op).inputs[slot] == vn {
                    let c = self.new_constant(size, val);
                    self.op_set_input(op, c, slot)?;
                }
            }
        }
        Ok(())
    }

    fn distinct_readers(&self, vn: VarnodeId) -> Vec<OpId> {
        let mut readers = self.vn(vn).descend.clone();
        readers.sort_unstable();
        readers.dedup();
        readers
    }

    /// Destroys varnodes that are neither read nor written, except function inputs.
    pub fn clear_dead_varnodes(&mut self) {
        for index in 0..self.body.varnodes.len() {
            let vn = VarnodeId::new(index);
            let v = self.vn(vn);
            if !v.is_destroyed() && v.has_no_descend() && !v.is_written() && !v.is_input() {
                self.destroy_varnode(vn);
            }
        }
    }

    /// Destroys every op that is no longer inserted in a block.
    ///
    /// # Errors
    ///
    /// Propagates failures from [`Funcdata::op_destroy`].
    pub fn destroy_dead_ops(&mut self) -> Result<()> {
        for op in self.dead_ops() {
            self.op_destroy(op)?;
        }
        Ok(())
    }

    // ---------------------------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------------------------

    /// Live ops in block order.
    #[must_use]
    pub fn ops_alive(&self) -> Vec<OpId> {
        self.body
            .blocks
            .iter()
            .flat_map(|b| b.ops.iter().copied())
            .collect()
    }

    /// Ops that exist but are not inserted in a block.
    #[must_use]
    pub fn dead_ops(&self) -> Vec<OpId> {
        (0..self.body.ops.len())
            .map(OpId::new)
            .filter(|&op| {
                let o = self.op(op);
                o.is_dead() && !o.is_destroyed()
            })
            .collect()
    }

    /// Live ops with the given opcode, in block order.
    #[must_use]
    pub fn ops_by_opcode(&self, opcode: OpCode) -> Vec<OpId> {
        self.ops_alive()
            .into_iter()
            .filter(|&op| self.op(op).opcode == opcode)
            .collect()
    }

    /// Live ops translated from the instruction at `addr`.
    #[must_use]
    pub fn ops_at(&self, addr: Address) -> Vec<OpId> {
        self.ops_alive()
            .into_iter()
            .filter(|&op| self.op(op).seq.pc == addr)
            .collect()
    }

    /// All varnodes that have not been destroyed.
    pub fn varnodes(&self) -> impl Iterator<Item = VarnodeId> + '_ {
        (0..self.body.varnodes.len())
            .map(VarnodeId::new)
            .filter(|&vn| !self.vn(vn).is_destroyed())
    }

    /// Live memory varnodes starting in `[start, end)`, sorted by location, size and
    /// creation order.
    #[must_use]
    pub fn varnodes_in_range(&self, start: Address, end: Address) -> Vec<VarnodeId> {
        let mut found: Vec<VarnodeId> = self
            .varnodes()
            .filter(|&vn| match self.vn(vn).address() {
                Some(addr) => {
                    addr.space == start.space && addr.offset >= start.offset && addr.offset < end.offset
                }
                None => false,
            })
            .collect();
        found.sort_by_key(|&vn| {
            let v = self.vn(vn);
            (v.loc, v.size, v.create_index)
        });
        found
    }

    /// Function inputs starting in `[start, end)`.
    #[must_use]
    pub fn inputs_in_range(&self, start: Address, end: Address) -> Vec<VarnodeId> {
        self.varnodes_in_range(start, end)
            .into_iter()
            .filter(|&vn| self.vn(vn).is_input())
            .collect()
    }

    /// Written varnodes starting in `[start, end)`.
    #[must_use]
    pub fn defs_in_range(&self, start: Address, end: Address) -> Vec<VarnodeId> {
        self.varnodes_in_range(start, end)
            .into_iter()
            .filter(|&vn| self.vn(vn).is_written())
            .collect()
    }

    /// Returns `true` if two ops provably compute the same value: same opcode, no side
    /// effects, and pairwise identical inputs (constants compared by value).
    #[must_use]
    pub fn is_cse_match(&self, a: OpId, b: OpId) -> bool {
        let (oa, ob) = (self.op(a), self.op(b));
        if oa.opcode != ob.opcode
            || oa.has_side_effect()
            || oa.is_marker()
            || matches!(oa.opcode, OpCode::Load | OpCode::Cpoolref | OpCode::New)
            || oa.inputs.len() != ob.inputs.len()
        {
            return false;
        }
        match (oa.output, ob.output) {
            (Some(x), Some(y)) if self.vn(x).size == self.vn(y).size => {}
            _ => return false,
        }
        oa.inputs
            .iter()
            .zip(ob.inputs.iter())
            .all(|(&x, &y)| self.same_value(x, y))
    }

    /// Returns `true` if `a` and `b` are the same varnode or equal constants of equal size.
    #[must_use]
    pub fn same_value(&self, a: VarnodeId, b: VarnodeId) -> bool {
        if a == b {
            return true;
        }
        let (va, vb) = (self.vn(a), self.vn(b));
        va.size == vb.size
            && va.constant_value().is_some()
            && va.constant_value() == vb.constant_value()
    }

    /// Returns `true` if two varnodes hold the same value: [`Funcdata::same_value`], or both
    /// are defined by CSE-matching ops.
    #[must_use]
    pub fn functional_equality(&self, a: VarnodeId, b: VarnodeId) -> bool {
        if self.same_value(a, b) {
            return true;
        }
        match (self.vn(a).def, self.vn(b).def) {
            (Some(da), Some(db)) => self.is_cse_match(da, db),
            _ => false,
        }
    }

    // ---------------------------------------------------------------------------------------
    // Calls
    // ---------------------------------------------------------------------------------------

    /// Number of call sites.
    #[must_use]
    pub fn num_calls(&self) -> usize {
        self.body.calls.len()
    }

    /// The `i`th call-site descriptor.
    #[must_use]
    pub fn call_specs(&self, i: usize) -> Option<&CallSpec> {
        self.body.calls.get(i)
    }

    /// The descriptor of the call made by `op`.
    #[must_use]
    pub fn call_spec_for_op(&self, op: OpId) -> Option<&CallSpec> {
        self.body.calls.iter().find(|c| c.op == op)
    }

    /// Records that the indirect call at `site` targets `target`.
    ///
    /// Overrides survive [`Funcdata::clear_analysis`] and are applied by
    /// [`Funcdata::start_processing`].
    pub fn set_call_override(&mut self, site: Address, target: Address) {
        self.overrides.insert(site, target);
    }

    /// The recorded target of the call at `site`.
    #[must_use]
    pub fn call_override(&self, site: &Address) -> Option<Address> {
        self.overrides.get(site).copied()
    }

    fn apply_call_overrides(&mut self) -> Result<()> {
        for op in self.ops_by_opcode(OpCode::Callind) {
            let site = self.op(op).address();
            let Some(target) = self.overrides.get(&site).copied() else {
                continue;
            };
            let Some(old) = self.op(op).input(0) else {
                return Err(lowlevel_error!("Indirect call {} has no target input", op));
            };
            let size = self.vn(old).size;
            let dest = self.new_varnode(size, target);
            self.op_set_opcode(op, OpCode::Call);
            self.op_set_input(op, dest, 0)?;
            if self.vn(old).is_free() && self.vn(old).has_no_descend() {
                self.destroy_varnode(old);
            }
            tracing::debug!(function = %self.name, site = %site, target = %target, "call override applied");
        }
        Ok(())
    }

    fn build_call_specs(&mut self) -> Result<()> {
        self.body.calls.clear();
        for op in self.ops_alive() {
            if !self.op(op).is_call() {
                continue;
            }
            let index = self.body.calls.len();
            let is_direct = self.op(op).opcode == OpCode::Call;
            let target = self.op(op).input(0);
            let entry = match target {
                Some(vn) if is_direct => self.vn(vn).address().filter(|a| !a.is_constant()),
                _ => None,
            };
            let name = entry
                .and_then(|e| self.arch.function_name(&e))
                .map(str::to_string);
            self.body.calls.push(CallSpec {
                op,
                entry,
                name,
                index,
            });
            if let (true, Some(vn)) = (is_direct, target) {
                if !self.vn(vn).is_annotation() {
                    let fspec = self.new_varnode_call_spec(CallSpecId::new(index));
                    self.op_set_input(op, fspec, 0)?;
                    if self.vn(vn).is_free() && self.vn(vn).has_no_descend() {
                        self.destroy_varnode(vn);
                    }
                }
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------------------------------
    // Processing lifecycle
    // ---------------------------------------------------------------------------------------

    /// Prepares the function for analysis.
    ///
    /// Takes the baseline snapshot on first use, applies call-target overrides and builds
    /// the call-site descriptors.
    ///
    /// # Errors
    ///
    /// Fails if processing has already started.
    pub fn start_processing(&mut self) -> Result<()> {
        if self.flags.contains(FuncFlags::PROCESSING_STARTED) {
            return Err(lowlevel_error!("Processing of {} already started", self.name));
        }
        self.flags |= FuncFlags::PROCESSING_STARTED;
        if self.baseline.is_none() {
            self.baseline = Some(self.body.clone());
        }
        self.apply_call_overrides()?;
        self.build_call_specs()?;
        tracing::debug!(function = %self.name, calls = self.num_calls(), "processing started");
        Ok(())
    }

    /// Marks the start of the clean-up phase.
    pub fn start_clean_up(&mut self) {
        self.flags |= FuncFlags::CLEAN_UP_STARTED;
    }

    /// Finishes processing and purges dead ops and varnodes.
    ///
    /// # Errors
    ///
    /// Propagates failures from [`Funcdata::destroy_dead_ops`].
    pub fn stop_processing(&mut self) -> Result<()> {
        self.flags |= FuncFlags::PROCESSING_COMPLETE;
        self.destroy_dead_ops()?;
        self.clear_dead_varnodes();
        tracing::debug!(function = %self.name, "processing complete");
        Ok(())
    }

    /// Throws away all analysis: restores the baseline body and clears the processing and
    /// restart flags. Warnings and call overrides are kept.
    pub fn clear_analysis(&mut self) {
        if let Some(baseline) = &self.baseline {
            self.body = baseline.clone();
        }
        self.flags.remove(
            FuncFlags::PROCESSING_STARTED
                | FuncFlags::PROCESSING_COMPLETE
                | FuncFlags::CLEAN_UP_STARTED
                | FuncFlags::RESTART_PENDING,
        );
        tracing::debug!(function = %self.name, "analysis cleared");
    }

    /// Returns `true` once processing has started.
    #[must_use]
    pub fn is_processing_started(&self) -> bool {
        self.flags.contains(FuncFlags::PROCESSING_STARTED)
    }

    /// Returns `true` once processing has completed.
    #[must_use]
    pub fn is_processing_complete(&self) -> bool {
        self.flags.contains(FuncFlags::PROCESSING_COMPLETE)
    }

    /// Returns `true` once the clean-up phase has started.
    #[must_use]
    pub fn is_clean_up_started(&self) -> bool {
        self.flags.contains(FuncFlags::CLEAN_UP_STARTED)
    }

    /// Returns `true` if a restart has been requested.
    #[must_use]
    pub fn has_restart_pending(&self) -> bool {
        self.flags.contains(FuncFlags::RESTART_PENDING)
    }

    /// Requests (or withdraws) a restart of the analysis.
    pub fn set_restart_pending(&mut self, pending: bool) {
        self.flags.set(FuncFlags::RESTART_PENDING, pending);
    }

    /// Returns `true` while analyzing only for jump-table recovery.
    #[must_use]
    pub fn is_jumptable_recovery_on(&self) -> bool {
        self.flags.contains(FuncFlags::JUMPTABLE_RECOVERY)
    }

    /// Switches jump-table recovery mode.
    pub fn set_jumptable_recovery(&mut self, on: bool) {
        self.flags.set(FuncFlags::JUMPTABLE_RECOVERY, on);
    }

    // ---------------------------------------------------------------------------------------
    // Diagnostics
    // ---------------------------------------------------------------------------------------

    /// Adds a function-level warning. Identical warnings are recorded once.
    pub fn warning_header(&mut self, msg: impl Into<String>) {
        self.push_warning(msg.into(), None);
    }

    /// Adds a warning attached to the instruction at `addr`.
    pub fn warning(&mut self, msg: impl Into<String>, addr: Address) {
        self.push_warning(msg.into(), Some(addr));
    }

    fn push_warning(&mut self, message: String, address: Option<Address>) {
        let warning = Warning { message, address };
        if !self.warnings.contains(&warning) {
            tracing::warn!(function = %self.name, "{}", warning);
            self.warnings.push(warning);
        }
    }

    /// All warnings recorded so far.
    #[must_use]
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Checks the dataflow and placement invariants of the whole function.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::Error::LowLevel`] describing the first violation found.
    pub fn verify(&self) -> Result<()> {
        for (index, o) in self.body.ops.iter().enumerate() {
            let op = OpId::new(index);
            if o.is_destroyed() {
                continue;
            }
            for &vn in &o.inputs {
                self.check_vn(vn)
                    .map_err(|e| e.context(format!("input of {}", op)))?;
                let slots = o.inputs.iter().filter(|&&v| v == vn).count();
                let reads = self.vn(vn).descend.iter().filter(|&&d| d == op).count();
                if slots != reads {
                    return Err(lowlevel_error!(
                        "{} reads {} in {} slots but is listed {} times",
                        op,
                        vn,
                        slots,
                        reads
                    ));
                }
            }
            if let Some(out) = o.output {
                self.check_vn(out)
                    .map_err(|e| e.context(format!("output of {}", op)))?;
                if self.vn(out).def != Some(op) {
                    return Err(lowlevel_error!("{} outputs {} which is not defined by it", op, out));
                }
            }
            if let Some(block) = o.parent {
                if !self.block(block).ops.contains(&op) {
                    return Err(lowlevel_error!("{} claims parent {} which lacks it", op, block));
                }
            }
        }
        for (index, v) in self.body.varnodes.iter().enumerate() {
            let vn = VarnodeId::new(index);
            if v.is_destroyed() {
                continue;
            }
            if let Some(def) = v.def {
                self.check_op(def)
                    .map_err(|e| e.context(format!("definition of {}", vn)))?;
                if self.op(def).output != Some(vn) {
                    return Err(lowlevel_error!("{} claims definition {} which outputs otherwise", vn, def));
                }
                if v.is_constant() || v.is_annotation() {
                    return Err(lowlevel_error!("{} is a written constant or annotation", vn));
                }
            }
            for &reader in &v.descend {
                if self.op(reader).is_destroyed() || !self.op(reader).inputs.contains(&vn) {
                    return Err(lowlevel_error!("{} lists reader {} which does not read it", vn, reader));
                }
            }
        }
        for (index, b) in self.body.blocks.iter().enumerate() {
            let block = BlockId::new(index);
            for (pos, &op) in b.ops.iter().enumerate() {
                let o = self.op(op);
                if o.parent != Some(block) || o.order as usize != pos {
                    return Err(lowlevel_error!("{} is misplaced in {}", op, block));
                }
            }
        }
        Ok(())
    }

    /// Formats a varnode for diagnostics.
    #[must_use]
    pub fn fmt_vn(&self, vn: VarnodeId) -> String {
        let v = self.vn(vn);
        match v.address() {
            Some(addr) if addr.space == AddrSpace::Constant => format!("#{:#x}:{}", addr.offset, v.size),
            _ => format!("{}({})", v, vn),
        }
    }

    /// Formats an op for diagnostics, e.g. `0x1000:2 vn5 = INT_ADD vn3, #0x1:4`.
    #[must_use]
    pub fn fmt_op(&self, op: OpId) -> String {
        let o = self.op(op);
        let inputs = o
            .inputs
            .iter()
            .map(|&vn| self.fmt_vn(vn))
            .collect::<Vec<_>>()
            .join(", ");
        match o.output {
            Some(out) => format!("{} {} = {} {}", o.seq, self.fmt_vn(out), o.opcode, inputs),
            None => format!("{} {} {}", o.seq, o.opcode, inputs),
        }
    }
}

impl fmt::Display for Funcdata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "function {} @ {}", self.name, self.entry)?;
        for (index, block) in self.body.blocks.iter().enumerate() {
            writeln!(f, "  {}:", BlockId::new(index))?;
            for &op in &block.ops {
                writeln!(f, "    {}", self.fmt_op(op))?;
            }
        }
        for warning in &self.warnings {
            writeln!(f, "  {}", warning)?;
        }
        Ok(())
    }
}
