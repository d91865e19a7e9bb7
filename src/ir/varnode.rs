//! Varnodes: the SSA values of a function.
//!
//! A [`Varnode`] is a sized value at a [`Storage`] location with at most one defining
//! operation and a multiset of reading operations. All state is owned by the function's
//! [`Funcdata`](crate::ir::Funcdata); varnodes are only mutated through its API, which keeps
//! the def/use links consistent.

use std::fmt;

use bitflags::bitflags;

use crate::{
    ir::{Address, OpId, Storage},
    utils::calc_mask,
};

bitflags! {
    /// Attribute flags on a varnode.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct VarnodeFlags: u32 {
        /// An input to the function, live on entry.
        const INPUT = 1 << 0;
        /// The value must be written to its storage even if it looks unused.
        const ADDRFORCE = 1 << 1;
        /// Storage is tied to memory that may be observed elsewhere.
        const ADDRTIED = 1 << 2;
        /// Global storage that persists beyond the function.
        const PERSIST = 1 << 3;
        /// The data-type is locked by the user.
        const TYPELOCK = 1 << 4;
        /// The name is locked by the user.
        const NAMELOCK = 1 << 5;
        /// Temporary mark used by graph walks.
        const MARK = 1 << 6;
        /// Kept alive regardless of readers.
        const AUTOLIVE = 1 << 7;
        /// Output of an `INDIRECT` created for a call side effect.
        const INDIRECT_CREATION = 1 << 8;
        /// Tombstone: the varnode no longer exists.
        const DESTROYED = 1 << 9;
    }
}

/// An SSA value.
#[derive(Debug, Clone, PartialEq)]
pub struct Varnode {
    pub(crate) loc: Storage,
    pub(crate) size: usize,
    pub(crate) flags: VarnodeFlags,
    pub(crate) def: Option<OpId>,
    pub(crate) descend: Vec<OpId>,
    pub(crate) nz_mask: u64,
    pub(crate) create_index: usize,
}

impl Varnode {
    pub(crate) fn new(loc: Storage, size: usize, create_index: usize) -> Self {
        let nz_mask = match loc {
            Storage::Memory(addr) if addr.is_constant() => addr.offset & calc_mask(size),
            _ => calc_mask(size),
        };
        Self {
            loc,
            size,
            flags: VarnodeFlags::empty(),
            def: None,
            descend: Vec::new(),
            nz_mask,
            create_index,
        }
    }

    /// Where the value lives.
    #[must_use]
    pub fn loc(&self) -> Storage {
        self.loc
    }

    /// The memory address, or `None` for annotations.
    #[must_use]
    pub fn address(&self) -> Option<Address> {
        self.loc.address()
    }

    /// Size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// The attribute flags.
    #[must_use]
    pub fn flags(&self) -> VarnodeFlags {
        self.flags
    }

    /// Creation order within the function, used as a stable tie breaker.
    #[must_use]
    pub fn create_index(&self) -> usize {
        self.create_index
    }

    /// The defining op, if any.
    #[must_use]
    pub fn def(&self) -> Option<OpId> {
        self.def
    }

    /// Reading ops. An op reading this varnode in two slots appears twice.
    #[must_use]
    pub fn descend(&self) -> &[OpId] {
        &self.descend
    }

    /// Bits that may be non-zero.
    #[must_use]
    pub fn nz_mask(&self) -> u64 {
        self.nz_mask
    }

    /// Returns `true` if this is a constant.
    #[must_use]
    pub fn is_constant(&self) -> bool {
        self.loc.is_constant()
    }

    /// Returns the value of a constant varnode.
    #[must_use]
    pub fn constant_value(&self) -> Option<u64> {
        match self.loc {
            Storage::Memory(addr) if addr.is_constant() => Some(addr.offset),
            _ => None,
        }
    }

    /// Returns `true` if `self` is a constant with value `val` (compared within its size).
    #[must_use]
    pub fn is_constant_value(&self, val: u64) -> bool {
        self.constant_value() == Some(val & calc_mask(self.size))
    }

    /// Returns `true` if some op defines this varnode.
    #[must_use]
    pub fn is_written(&self) -> bool {
        self.def.is_some()
    }

    /// Returns `true` for function inputs.
    #[must_use]
    pub fn is_input(&self) -> bool {
        self.flags.contains(VarnodeFlags::INPUT)
    }

    /// Returns `true` for reference-carrying `iop`/`fspec` varnodes.
    #[must_use]
    pub fn is_annotation(&self) -> bool {
        self.loc.is_annotation()
    }

    /// Returns `true` if the varnode is not yet tied into dataflow: it is not written, not an
    /// input, not a constant and not an annotation.
    #[must_use]
    pub fn is_free(&self) -> bool {
        !self.is_written() && !self.is_input() && !self.is_constant() && !self.is_annotation()
    }

    /// Returns `true` once the value's origin is fully determined.
    #[must_use]
    pub fn is_heritage_known(&self) -> bool {
        !self.is_free()
    }

    /// Returns the only reader if there is exactly one reader slot.
    #[must_use]
    pub fn lone_descend(&self) -> Option<OpId> {
        match self.descend.as_slice() {
            [op] => Some(*op),
            _ => None,
        }
    }

    /// Returns `true` if nothing reads this varnode.
    #[must_use]
    pub fn has_no_descend(&self) -> bool {
        self.descend.is_empty()
    }

    /// Returns `true` if the storage is tied to observable memory.
    #[must_use]
    pub fn is_addr_tied(&self) -> bool {
        self.flags.contains(VarnodeFlags::ADDRTIED)
    }

    /// Returns `true` if the value must be written to its storage.
    #[must_use]
    pub fn is_addr_force(&self) -> bool {
        self.flags.contains(VarnodeFlags::ADDRFORCE)
    }

    /// Returns `true` for persistent (global) storage.
    #[must_use]
    pub fn is_persist(&self) -> bool {
        self.flags.contains(VarnodeFlags::PERSIST)
    }

    /// Returns `true` if the value is kept alive independent of readers.
    #[must_use]
    pub fn is_auto_live(&self) -> bool {
        self.flags
            .intersects(VarnodeFlags::ADDRFORCE | VarnodeFlags::AUTOLIVE)
    }

    /// Returns `true` if the data-type is locked.
    #[must_use]
    pub fn is_type_locked(&self) -> bool {
        self.flags.contains(VarnodeFlags::TYPELOCK)
    }

    /// Returns `true` if the walk mark is set.
    #[must_use]
    pub fn is_mark(&self) -> bool {
        self.flags.contains(VarnodeFlags::MARK)
    }

    /// Returns `true` once the varnode has been destroyed.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.flags.contains(VarnodeFlags::DESTROYED)
    }

    /// Returns `true` if `self` and `other` occupy the same storage with the same size.
    #[must_use]
    pub fn same_storage(&self, other: &Varnode) -> bool {
        self.loc == other.loc && self.size == other.size
    }
}

impl fmt::Display for Varnode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.loc, self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_mask_and_value() {
        let vn = Varnode::new(Storage::Memory(Address::constant(0x1ff)), 1, 0);
        assert!(vn.is_constant());
        assert_eq!(vn.nz_mask(), 0xff);
        assert_eq!(vn.constant_value(), Some(0x1ff));
        assert!(vn.is_heritage_known());
    }

    #[test]
    fn test_free_predicates() {
        let mut vn = Varnode::new(Storage::Memory(Address::register(0)), 4, 1);
        assert!(vn.is_free());
        assert_eq!(vn.nz_mask(), 0xffff_ffff);
        vn.flags |= VarnodeFlags::INPUT;
        assert!(!vn.is_free());
        assert!(vn.has_no_descend());
        vn.descend.push(OpId::new(2));
        assert_eq!(vn.lone_descend(), Some(OpId::new(2)));
        vn.descend.push(OpId::new(2));
        assert_eq!(vn.lone_descend(), None);
    }

    #[test]
    fn test_annotation_is_never_free() {
        let vn = Varnode::new(Storage::OpRef(OpId::new(7)), 8, 2);
        assert!(vn.is_annotation());
        assert!(!vn.is_free());
        assert!(!vn.is_constant());
        assert_eq!(vn.to_string(), "iop[op7]:8");
    }
}
