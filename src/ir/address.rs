//! Address spaces, addresses and varnode storage.
//!
//! Ordinary values live at an [`Address`] in one of a handful of [`AddrSpace`]s. Some
//! varnodes instead carry a reference to another IR object, an operation (the `iop`
//! space) or a call-site descriptor (the `fspec` space). Those are modeled as separate
//! [`Storage`] variants so they can never be mistaken for a memory location.

use std::fmt;

use strum::{Display, EnumIter, EnumString};

use crate::ir::{CallSpecId, OpId};

/// The address spaces a memory-backed varnode can live in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, EnumIter,
)]
#[strum(serialize_all = "lowercase")]
pub enum AddrSpace {
    /// Constants; the offset is the value itself.
    #[strum(serialize = "const")]
    Constant,
    /// Processor registers.
    Register,
    /// Main memory.
    Ram,
    /// The local stack frame.
    Stack,
    /// Temporaries created by instruction translation and by rewriting.
    Unique,
}

/// A location in one of the memory address spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    /// The space the offset is relative to.
    pub space: AddrSpace,
    /// Byte offset within the space, or the value for constants.
    pub offset: u64,
}

impl Address {
    /// Creates an address in `space` at `offset`.
    #[must_use]
    pub const fn new(space: AddrSpace, offset: u64) -> Self {
        Self { space, offset }
    }

    /// A constant "address" carrying `value`.
    #[must_use]
    pub const fn constant(value: u64) -> Self {
        Self::new(AddrSpace::Constant, value)
    }

    /// An address in main memory.
    #[must_use]
    pub const fn ram(offset: u64) -> Self {
        Self::new(AddrSpace::Ram, offset)
    }

    /// A register address.
    #[must_use]
    pub const fn register(offset: u64) -> Self {
        Self::new(AddrSpace::Register, offset)
    }

    /// A stack frame address.
    #[must_use]
    pub const fn stack(offset: u64) -> Self {
        Self::new(AddrSpace::Stack, offset)
    }

    /// An address in the temporary space.
    #[must_use]
    pub const fn unique(offset: u64) -> Self {
        Self::new(AddrSpace::Unique, offset)
    }

    /// Returns `true` for the constant space.
    #[must_use]
    pub const fn is_constant(&self) -> bool {
        matches!(self.space, AddrSpace::Constant)
    }

    /// Returns this address advanced by `delta` bytes, wrapping within 64 bits.
    #[must_use]
    pub const fn add(self, delta: u64) -> Self {
        Self::new(self.space, self.offset.wrapping_add(delta))
    }

    /// Returns `true` if the `size`-byte range at `self` overlaps the `other_size`-byte
    /// range at `other`.
    #[must_use]
    pub fn overlaps(&self, size: usize, other: &Address, other_size: usize) -> bool {
        if self.space != other.space {
            return false;
        }
        let a_end = self.offset.saturating_add(size as u64);
        let b_end = other.offset.saturating_add(other_size as u64);
        self.offset < b_end && other.offset < a_end
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:#x}", self.space, self.offset)
    }
}

/// Where a varnode's value lives.
///
/// `OpRef` and `CallRef` are annotations: they reference another IR object and are never
/// heritaged, folded, removed as dead code independently of their reader, or printed as an
/// address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Storage {
    /// An ordinary location (or constant) in a memory space.
    Memory(Address),
    /// A reference to a p-code operation, e.g. the blocking op of an `INDIRECT`.
    OpRef(OpId),
    /// A reference to a call-site descriptor, carried as input 0 of a `CALL`.
    CallRef(CallSpecId),
}

impl Storage {
    /// Returns the memory address, or `None` for annotations.
    #[must_use]
    pub const fn address(&self) -> Option<Address> {
        match self {
            Storage::Memory(addr) => Some(*addr),
            _ => None,
        }
    }

    /// Returns `true` for the reference-carrying `iop` and `fspec` storage.
    #[must_use]
    pub const fn is_annotation(&self) -> bool {
        !matches!(self, Storage::Memory(_))
    }

    /// Returns `true` if this is a constant.
    #[must_use]
    pub const fn is_constant(&self) -> bool {
        matches!(
            self,
            Storage::Memory(Address {
                space: AddrSpace::Constant,
                ..
            })
        )
    }
}

impl fmt::Display for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Storage::Memory(addr) if addr.is_constant() => write!(f, "#{:#x}", addr.offset),
            Storage::Memory(addr) => write!(f, "{addr}"),
            Storage::OpRef(op) => write!(f, "iop[{op}]"),
            Storage::CallRef(call) => write!(f, "fspec[{}]", call.index()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_space_names() {
        assert_eq!(AddrSpace::Constant.to_string(), "const");
        assert_eq!(AddrSpace::Register.to_string(), "register");
        assert_eq!(AddrSpace::from_str("unique").ok(), Some(AddrSpace::Unique));
    }

    #[test]
    fn test_address_display_and_overlap() {
        let a = Address::ram(0x1000);
        assert_eq!(a.to_string(), "ram:0x1000");
        assert!(a.overlaps(4, &Address::ram(0x1003), 1));
        assert!(!a.overlaps(4, &Address::ram(0x1004), 4));
        assert!(!a.overlaps(4, &Address::register(0x1000), 4));
    }

    #[test]
    fn test_reference_storage_is_not_memory() {
        let iop = Storage::OpRef(OpId::new(12));
        let fspec = Storage::CallRef(CallSpecId::new(3));
        assert_eq!(iop.to_string(), "iop[op12]");
        assert_eq!(fspec.to_string(), "fspec[3]");
        assert!(iop.is_annotation());
        assert!(!iop.is_constant());
        assert_eq!(fspec.address(), None);
        assert!(Storage::Memory(Address::constant(5)).is_constant());
    }
}
