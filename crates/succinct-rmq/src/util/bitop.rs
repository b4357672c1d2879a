//! Bitwise operations module.

/// Floor of the binary logarithm of `x`.
///
/// `x` must be greater than zero.
#[inline]
#[must_use]
pub const fn log2_floor(x: usize) -> usize {
    debug_assert!(x > 0);
    x.ilog2() as usize
}

pub mod u8 {
    const BITS: u32 = u8::BITS;
    const MAX: u8 = u8::MAX;

    /// Generates a mask with only the bit at `pos` set.
    #[inline]
    #[must_use]
    pub const fn bit(pos: usize) -> u8 {
        debug_assert!(pos < BITS as usize);
        1 << pos
    }

    /// Clears the lowest `n` bits of given value.
    ///
    /// The `n` must be less than `BITS`.
    #[inline]
    #[must_use]
    pub const fn clear_low(value: u8, n: usize) -> u8 {
        debug_assert!(n < BITS as usize);
        value & (MAX << n)
    }

    /// Position of the least significant set bit, or `None` if no bit is set.
    #[inline]
    #[must_use]
    pub const fn lsb(value: u8) -> Option<usize> {
        if value == 0 {
            None
        } else {
            Some(value.trailing_zeros() as usize)
        }
    }

    #[cfg(test)]
    #[cfg_attr(coverage_nightly, coverage(off))]
    mod tests {
        use super::*;

        #[test]
        fn test_bit() {
            assert_eq!(bit(0), 0b0000_0001);
            assert_eq!(bit(3), 0b0000_1000);
            assert_eq!(bit(7), 0b1000_0000);
        }

        #[test]
        fn test_clear_low() {
            assert_eq!(clear_low(0b1010_1010, 0), 0b1010_1010);
            assert_eq!(clear_low(0b1010_1010, 1), 0b1010_1010);
            assert_eq!(clear_low(0b1010_1010, 2), 0b1010_1000);
            assert_eq!(clear_low(0b1010_1010, 4), 0b1010_0000);
            assert_eq!(clear_low(0b1111_1111, 7), 0b1000_0000);
        }

        #[test]
        fn test_lsb() {
            assert_eq!(lsb(0), None);
            assert_eq!(lsb(0b0000_0001), Some(0));
            assert_eq!(lsb(0b0110_0000), Some(5));
            assert_eq!(lsb(0b1000_0000), Some(7));
        }
    }
}
