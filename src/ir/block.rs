//! Basic blocks and call-site descriptors.

use crate::ir::{Address, OpId};

/// A straight-line sequence of ops. The block owns op order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BasicBlock {
    pub(crate) ops: Vec<OpId>,
}

impl BasicBlock {
    /// The live ops of this block, in execution order.
    #[must_use]
    pub fn ops(&self) -> &[OpId] {
        &self.ops
    }

    /// Returns `true` if the block holds no ops.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// A call-site descriptor.
///
/// Built for every `CALL`/`CALLIND` when processing starts. A `CALL` carries a reference to
/// its descriptor in input 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSpec {
    /// The call op.
    pub op: OpId,
    /// The resolved target, if known.
    pub entry: Option<Address>,
    /// The callee's name, if known.
    pub name: Option<String>,
    /// Position in the function's call list.
    pub index: usize,
}

impl CallSpec {
    /// A display name for diagnostics: the callee name, else its address, else `<indirect>`.
    #[must_use]
    pub fn display_name(&self) -> String {
        match (&self.name, self.entry) {
            (Some(name), _) => name.clone(),
            (None, Some(addr)) => format!("func_{:#x}", addr.offset),
            (None, None) => "<indirect>".to_string(),
        }
    }
}
