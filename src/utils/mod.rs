//! Shared helpers: bit arithmetic for sized values and a compact index set.

pub mod bits;
mod bitset;

pub use bits::{
    calc_mask, coveringmask, is_power_of_two, leastsigbit_set, mostsigbit_set, popcount,
    sign_extend, signbit_negative, uintb_negate, zero_extend,
};
pub use bitset::BitSet;
