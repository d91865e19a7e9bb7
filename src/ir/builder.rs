//! Fluent construction of raw p-code functions.

use std::sync::Arc;

use crate::{
    ir::{Address, Architecture, BlockId, Funcdata, OpCode, OpId, VarnodeId},
    Result,
};

/// Builds a [`Funcdata`] op by op.
///
/// Ops are appended to the current block. Each op gets its own instruction address,
/// starting at the entry point and advancing by 4 bytes, unless [`FunctionBuilder::at`]
/// moves the cursor.
#[derive(Debug)]
pub struct FunctionBuilder {
    data: Funcdata,
    block: BlockId,
    pc: Address,
    last: Option<OpId>,
}

impl FunctionBuilder {
    /// Starts a function with a default architecture.
    #[must_use]
    pub fn new(name: impl Into<String>, entry: Address) -> Self {
        Self::with_arch(name, entry, Arc::new(Architecture::default()))
    }

    /// Starts a function for `arch`.
    #[must_use]
    pub fn with_arch(name: impl Into<String>, entry: Address, arch: Arc<Architecture>) -> Self {
        let mut data = Funcdata::new(name, entry, arch);
        let block = data.new_block();
        Self {
            data,
            block,
            pc: entry,
            last: None,
        }
    }

    /// Moves the instruction cursor to `pc`.
    pub fn at(&mut self, pc: Address) -> &mut Self {
        self.pc = pc;
        self
    }

    /// Starts a new basic block and makes it current.
    pub fn new_block(&mut self) -> BlockId {
        self.block = self.data.new_block();
        self.block
    }

    /// Makes `block` current.
    pub fn switch_to(&mut self, block: BlockId) -> &mut Self {
        self.block = block;
        self
    }

    /// Declares a function input.
    pub fn input(&mut self, size: usize, addr: Address) -> VarnodeId {
        self.data.new_input(size, addr)
    }

    /// Creates a constant.
    pub fn constant(&mut self, size: usize, val: u64) -> VarnodeId {
        self.data.new_constant(size, val)
    }

    /// Creates an unwritten varnode at `addr`, e.g. to serve as an explicit op output.
    pub fn varnode(&mut self, size: usize, addr: Address) -> VarnodeId {
        self.data.new_varnode(size, addr)
    }

    fn append(&mut self, opcode: OpCode, inputs: &[VarnodeId]) -> Result<OpId> {
        let op = self.data.new_op(inputs.len(), self.pc);
        self.data.op_set_opcode(op, opcode);
        for (slot, &vn) in inputs.iter().enumerate() {
            self.data.op_set_input(op, vn, slot)?;
        }
        self.data.op_insert_end(op, self.block)?;
        self.pc = self.pc.add(4);
        self.last = Some(op);
        Ok(op)
    }

    /// Appends an op writing a fresh temporary of `out_size` bytes and returns the output.
    ///
    /// # Errors
    ///
    /// Fails if an input has been destroyed.
    pub fn op(&mut self, opcode: OpCode, inputs: &[VarnodeId], out_size: usize) -> Result<VarnodeId> {
        let op = self.append(opcode, inputs)?;
        self.data.new_unique_out(out_size, op)
    }

    /// Appends an op writing `out`.
    ///
    /// # Errors
    ///
    /// Fails if `out` is already defined, a constant or an input.
    pub fn op_out(&mut self, opcode: OpCode, inputs: &[VarnodeId], out: VarnodeId) -> Result<OpId> {
        let op = self.append(opcode, inputs)?;
        self.data.op_set_output(op, out)?;
        Ok(op)
    }

    /// Appends an op without output, e.g. `STORE` or `RETURN`.
    ///
    /// # Errors
    ///
    /// Fails if an input has been destroyed.
    pub fn op_void(&mut self, opcode: OpCode, inputs: &[VarnodeId]) -> Result<OpId> {
        self.append(opcode, inputs)
    }

    /// The most recently appended op.
    #[must_use]
    pub fn last_op(&self) -> Option<OpId> {
        self.last
    }

    /// Direct access to the function under construction.
    pub fn data_mut(&mut self) -> &mut Funcdata {
        &mut self.data
    }

    /// Finishes the function.
    #[must_use]
    pub fn finish(self) -> Funcdata {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_addresses_and_blocks() -> Result<()> {
        let mut b = FunctionBuilder::new("f", Address::ram(0x100));
        let x = b.input(4, Address::register(0));
        let y = b.op(OpCode::IntNegate, &[x], 4)?;
        let first = b.last_op();
        let next = b.new_block();
        let ret = b.op_void(OpCode::Return, &[y])?;
        let data = b.finish();

        let first = first.ok_or_else(|| crate::Error::Error("no op".into()))?;
        assert_eq!(data.op(first).address(), Address::ram(0x100));
        assert_eq!(data.op(ret).address(), Address::ram(0x104));
        assert_eq!(data.op(ret).parent(), Some(next));
        assert_eq!(data.vn(y).def(), Some(first));
        data.verify()?;
        Ok(())
    }
}
