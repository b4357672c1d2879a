//! Element types that can be indexed

use std::{cmp::Ordering, fmt::Debug};

use zerocopy::{
    FromBytes, Immutable, IntoBytes, Unaligned,
    byteorder::{BigEndian, F32, F64, I32, I64, U32},
};

/// A scalar element of an indexed sequence.
///
/// Elements are compared by a total order, so floating point values (including NaN and signed
/// zeros) never make the index inconsistent. Integer arithmetic wraps: a prefix sum that
/// overflows still yields the original elements when two consecutive sums are subtracted.
pub trait Scalar: Copy + PartialEq + Debug + Send + Sync + 'static {
    /// Big-endian representation used in persisted indexes.
    type Encoded: FromBytes + IntoBytes + Immutable + Unaligned + Copy;

    /// Width in bytes of the persisted representation.
    const WIDTH: usize = std::mem::size_of::<Self::Encoded>();

    const ZERO: Self;

    fn total_cmp(&self, other: &Self) -> Ordering;

    /// Addition, wrapping on overflow for integers.
    fn add(self, rhs: Self) -> Self;

    /// Subtraction, wrapping on overflow for integers.
    fn sub(self, rhs: Self) -> Self;

    fn encode(self) -> Self::Encoded;

    fn decode(encoded: Self::Encoded) -> Self;
}

macro_rules! impl_scalar_for_int {
    ($($int_type:ty => $encoded:ident),*) => {
        $(
            impl Scalar for $int_type {
                type Encoded = $encoded<BigEndian>;

                const ZERO: Self = 0;

                fn total_cmp(&self, other: &Self) -> Ordering {
                    Ord::cmp(self, other)
                }

                fn add(self, rhs: Self) -> Self {
                    self.wrapping_add(rhs)
                }

                fn sub(self, rhs: Self) -> Self {
                    self.wrapping_sub(rhs)
                }

                fn encode(self) -> Self::Encoded {
                    $encoded::new(self)
                }

                fn decode(encoded: Self::Encoded) -> Self {
                    encoded.get()
                }
            }
        )*
    };
}

impl_scalar_for_int!(i32 => I32, i64 => I64, u32 => U32);

macro_rules! impl_scalar_for_float {
    ($($float_type:ty => $encoded:ident),*) => {
        $(
            impl Scalar for $float_type {
                type Encoded = $encoded<BigEndian>;

                const ZERO: Self = 0.0;

                fn total_cmp(&self, other: &Self) -> Ordering {
                    <$float_type>::total_cmp(self, other)
                }

                fn add(self, rhs: Self) -> Self {
                    self + rhs
                }

                fn sub(self, rhs: Self) -> Self {
                    self - rhs
                }

                fn encode(self) -> Self::Encoded {
                    $encoded::new(self)
                }

                fn decode(encoded: Self::Encoded) -> Self {
                    encoded.get()
                }
            }
        )*
    };
}

impl_scalar_for_float!(f32 => F32, f64 => F64);
