//! The p-code intermediate representation.
//!
//! A function is a graph of [`Varnode`]s (SSA values) and [`PcodeOp`]s (operations) placed
//! in [`BasicBlock`]s, all owned by a [`Funcdata`]. Objects refer to each other through the
//! arena handles [`VarnodeId`], [`OpId`], [`BlockId`] and [`CallSpecId`].
//!
//! # Key Components
//!
//! - [`OpCode`] - the p-code operation set and its static properties
//! - [`Address`] / [`Storage`] - memory locations and reference-carrying storage
//! - [`Funcdata`] - the per-function container and its mutation API
//! - [`FunctionBuilder`] - a fluent constructor for raw p-code functions
//! - [`Architecture`] - shared, read-only target description
//!
//! # Example
//!
//! ```rust
//! use pcodeopt::ir::{Address, FunctionBuilder, OpCode};
//!
//! let mut b = FunctionBuilder::new("f", Address::ram(0x1000));
//! let x = b.input(4, Address::register(0));
//! let one = b.constant(4, 1);
//! let sum = b.op(OpCode::IntAdd, &[x, one], 4)?;
//! b.op_void(OpCode::Return, &[sum])?;
//! let data = b.finish();
//! assert_eq!(data.ops_alive().len(), 2);
//! data.verify()?;
//! # Ok::<(), pcodeopt::Error>(())
//! ```

mod address;
mod architecture;
pub mod behavior;
mod block;
mod builder;
mod funcdata;
mod op;
mod opcode;
mod varnode;

pub use address::{AddrSpace, Address, Storage};
pub use architecture::{Architecture, SegmentDef};
pub use block::{BasicBlock, CallSpec};
pub use builder::FunctionBuilder;
pub use funcdata::{FuncFlags, Funcdata, Warning};
pub use op::{OpFlags, PcodeOp, SeqNum};
pub use opcode::{OpCode, OpCodeFlags};
pub use varnode::{Varnode, VarnodeFlags};

arena_handle!(
    /// Handle to a [`Varnode`] in its function's arena.
    VarnodeId,
    "vn"
);

arena_handle!(
    /// Handle to a [`PcodeOp`] in its function's arena.
    OpId,
    "op"
);

arena_handle!(
    /// Handle to a [`BasicBlock`] in its function's arena.
    BlockId,
    "bb"
);

arena_handle!(
    /// Handle to a [`CallSpec`] in its function's call list.
    CallSpecId,
    "call"
);
