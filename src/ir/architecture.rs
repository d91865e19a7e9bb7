//! Read-only description of the target the functions were lifted from.

use std::collections::BTreeMap;

use crate::{ir::Address, utils::calc_mask};

/// Definition of a segmented addressing operator used by `SEGMENTOP`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentDef {
    /// Name of the operator, for diagnostics.
    pub name: String,
    /// Left shift applied to the segment base before adding the offset.
    pub base_shift: u32,
    /// Size in bytes of the resulting address.
    pub output_size: usize,
}

impl SegmentDef {
    /// Creates a segment definition.
    #[must_use]
    pub fn new(name: impl Into<String>, base_shift: u32, output_size: usize) -> Self {
        Self {
            name: name.into(),
            base_shift,
            output_size,
        }
    }

    /// Computes the flat address for `base:offset`.
    #[must_use]
    pub fn execute(&self, base: u64, offset: u64) -> u64 {
        let shifted = base.checked_shl(self.base_shift).unwrap_or(0);
        shifted.wrapping_add(offset) & calc_mask(self.output_size)
    }
}

/// Architecture data shared, read-only, by every function being analyzed.
#[derive(Debug, Clone)]
pub struct Architecture {
    /// Name of the processor description.
    pub name: String,
    /// Size of a pointer in bytes.
    pub pointer_size: usize,
    /// Base offset of temporaries created during rewriting.
    pub unique_base: u64,
    functions: BTreeMap<Address, String>,
    segments: BTreeMap<u64, SegmentDef>,
}

impl Default for Architecture {
    fn default() -> Self {
        Self::new("default")
    }
}

impl Architecture {
    /// Creates an architecture with 8-byte pointers and no known symbols.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pointer_size: 8,
            unique_base: 0x1000_0000,
            functions: BTreeMap::new(),
            segments: BTreeMap::new(),
        }
    }

    /// Registers a function entry point.
    #[must_use]
    pub fn with_function(mut self, entry: Address, name: impl Into<String>) -> Self {
        self.functions.insert(entry, name.into());
        self
    }

    /// Registers the segment operator with id `index`.
    #[must_use]
    pub fn with_segment(mut self, index: u64, def: SegmentDef) -> Self {
        self.segments.insert(index, def);
        self
    }

    /// Returns the name of the function starting at `entry`.
    #[must_use]
    pub fn function_name(&self, entry: &Address) -> Option<&str> {
        self.functions.get(entry).map(String::as_str)
    }

    /// Returns the segment operator with id `index`.
    #[must_use]
    pub fn segment(&self, index: u64) -> Option<&SegmentDef> {
        self.segments.get(&index)
    }
}
