use std::ops::RangeInclusive;

/// Bit manipulation helpers for the primitive words the core handles.
///
/// Indexes go from lsb to msb (right to left), so bit 0 is the least
/// significant one.
pub trait Bits: Copy {
    const WIDTH: u8;

    fn get_bit(self, bit_idx: u8) -> bool;

    fn set_bit(&mut self, bit_idx: u8, value: bool);

    /// Extracts `bits_range` and moves it down to bit 0.
    fn get_bits(self, bits_range: RangeInclusive<u8>) -> Self;

    /// Returns a sign-extended copy of the lowest `number_of_bits` bits.
    fn sign_extended(self, number_of_bits: u8) -> Self;
}

macro_rules! impl_bits {
    ($t:ty, $signed:ty) => {
        impl Bits for $t {
            const WIDTH: u8 = <$t>::BITS as u8;

            #[inline]
            fn get_bit(self, bit_idx: u8) -> bool {
                debug_assert!(bit_idx < Self::WIDTH, "bit index {bit_idx} out of range");
                (self >> bit_idx) & 1 == 1
            }

            #[inline]
            fn set_bit(&mut self, bit_idx: u8, value: bool) {
                debug_assert!(bit_idx < Self::WIDTH, "bit index {bit_idx} out of range");
                let mask: $t = 1 << bit_idx;
                if value {
                    *self |= mask;
                } else {
                    *self &= !mask;
                }
            }

            #[inline]
            fn get_bits(self, bits_range: RangeInclusive<u8>) -> Self {
                let start = *bits_range.start();
                let end = *bits_range.end();
                debug_assert!(start <= end && end < Self::WIDTH);

                let length = end - start + 1;
                if length == Self::WIDTH {
                    return self;
                }

                (self >> start) & ((1 << length) - 1)
            }

            #[inline]
            fn sign_extended(self, number_of_bits: u8) -> Self {
                debug_assert!(number_of_bits > 0 && number_of_bits <= Self::WIDTH);

                // Move the sign bit up to the msb, then let the arithmetic
                // shift bring it back down replicating it.
                let unused = Self::WIDTH - number_of_bits;
                (((self << unused) as $signed) >> unused) as $t
            }
        }
    };
}

impl_bits!(u16, i16);
impl_bits!(u32, i32);
impl_bits!(u64, i64);
