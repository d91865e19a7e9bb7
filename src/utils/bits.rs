//! Bit arithmetic on values of a given byte size.
//!
//! P-code values are at most 8 bytes wide and are carried around as `u64`. Every helper in
//! this module takes the byte size of the value it operates on and keeps the result within
//! that size.

/// Returns the mask covering all bits of a value that is `size` bytes wide.
///
/// Sizes of 8 bytes or more produce a full 64-bit mask, a size of 0 produces an empty mask.
///
/// # Examples
///
/// ```rust
/// use pcodeopt::utils::calc_mask;
///
/// assert_eq!(calc_mask(1), 0xff);
/// assert_eq!(calc_mask(4), 0xffff_ffff);
/// assert_eq!(calc_mask(8), u64::MAX);
/// ```
#[must_use]
pub const fn calc_mask(size: usize) -> u64 {
    if size >= 8 {
        u64::MAX
    } else {
        (1u64 << (size * 8)) - 1
    }
}

/// Returns `true` if the sign bit of the `size`-byte value `val` is set.
#[must_use]
pub const fn signbit_negative(val: u64, size: usize) -> bool {
    if size == 0 {
        return false;
    }
    let bits = if size >= 8 { 64 } else { size * 8 };
    (val >> (bits - 1)) & 1 == 1
}

/// Sign-extends the `size`-byte value `val` to the full 64 bits.
#[must_use]
pub const fn sign_extend(val: u64, size: usize) -> u64 {
    if size >= 8 || size == 0 {
        return val;
    }
    let mask = calc_mask(size);
    if signbit_negative(val, size) {
        val | !mask
    } else {
        val & mask
    }
}

/// Truncates `val` to `size` bytes.
#[must_use]
pub const fn zero_extend(val: u64, size: usize) -> u64 {
    val & calc_mask(size)
}

/// Returns the two's complement negation of the `size`-byte value `val`.
#[must_use]
pub const fn uintb_negate(val: u64, size: usize) -> u64 {
    (!val).wrapping_add(1) & calc_mask(size)
}

/// Returns the index of the least significant set bit, or `None` for zero.
#[must_use]
pub const fn leastsigbit_set(val: u64) -> Option<u32> {
    if val == 0 {
        None
    } else {
        Some(val.trailing_zeros())
    }
}

/// Returns the index of the most significant set bit, or `None` for zero.
#[must_use]
pub const fn mostsigbit_set(val: u64) -> Option<u32> {
    if val == 0 {
        None
    } else {
        Some(63 - val.leading_zeros())
    }
}

/// Returns a mask with every bit at or below the most significant set bit of `val` set.
///
/// ```rust
/// use pcodeopt::utils::coveringmask;
///
/// assert_eq!(coveringmask(0), 0);
/// assert_eq!(coveringmask(0x10), 0x1f);
/// assert_eq!(coveringmask(0x8000_0000_0000_0000), u64::MAX);
/// ```
#[must_use]
pub const fn coveringmask(val: u64) -> u64 {
    match mostsigbit_set(val) {
        None => 0,
        Some(63) => u64::MAX,
        Some(bit) => (1u64 << (bit + 1)) - 1,
    }
}

/// Returns the number of set bits in `val`.
#[must_use]
pub const fn popcount(val: u64) -> u32 {
    val.count_ones()
}

/// Checks if a value is a power of two and returns the exponent.
///
/// Returns `Some(n)` if `value == 2^n`, `None` otherwise. The value is treated as unsigned.
///
/// ```rust
/// use pcodeopt::utils::is_power_of_two;
///
/// assert_eq!(is_power_of_two(1), Some(0));
/// assert_eq!(is_power_of_two(8), Some(3));
/// assert_eq!(is_power_of_two(0), None);
/// assert_eq!(is_power_of_two(6), None);
/// ```
#[must_use]
pub const fn is_power_of_two(value: u64) -> Option<u32> {
    if value.is_power_of_two() {
        Some(value.trailing_zeros())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calc_mask() {
        assert_eq!(calc_mask(0), 0);
        assert_eq!(calc_mask(1), 0xff);
        assert_eq!(calc_mask(2), 0xffff);
        assert_eq!(calc_mask(3), 0xff_ffff);
        assert_eq!(calc_mask(8), u64::MAX);
        assert_eq!(calc_mask(16), u64::MAX);
    }

    #[test]
    fn test_sign_extend() {
        assert_eq!(sign_extend(0x80, 1), 0xffff_ffff_ffff_ff80);
        assert_eq!(sign_extend(0x7f, 1), 0x7f);
        assert_eq!(sign_extend(0x1ff, 1), u64::MAX);
        assert_eq!(sign_extend(0x8000_0000, 4), 0xffff_ffff_8000_0000);
        assert_eq!(sign_extend(5, 8), 5);
    }

    #[test]
    fn test_signbit_and_negate() {
        assert!(signbit_negative(0x80, 1));
        assert!(!signbit_negative(0x7f, 1));
        assert!(signbit_negative(u64::MAX, 8));
        assert_eq!(uintb_negate(1, 1), 0xff);
        assert_eq!(uintb_negate(0, 4), 0);
        assert_eq!(uintb_negate(5, 8), 5u64.wrapping_neg());
    }

    #[test]
    fn test_bit_scanning() {
        assert_eq!(leastsigbit_set(0), None);
        assert_eq!(leastsigbit_set(0b1000), Some(3));
        assert_eq!(mostsigbit_set(0b1010), Some(3));
        assert_eq!(mostsigbit_set(u64::MAX), Some(63));
        assert_eq!(popcount(0xf0f0), 8);
    }

    #[test]
    fn test_is_power_of_two() {
        assert_eq!(is_power_of_two(1), Some(0));
        assert_eq!(is_power_of_two(2), Some(1));
        assert_eq!(is_power_of_two(1024), Some(10));
        assert_eq!(is_power_of_two(1 << 63), Some(63));
        assert_eq!(is_power_of_two(12), None);
    }
}
