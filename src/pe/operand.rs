// Fixed-width operand arithmetic for the processing element

use num_traits::{WrappingAdd, WrappingMul, Zero};
use serde::Serialize;
use std::fmt::{Debug, Display};

/// Scalar carried on the operand streams.
///
/// Every implementation is a fixed-width integer and all accumulation wraps
/// around on overflow. There is no checked or saturating mode.
pub trait Operand:
  Copy + PartialEq + Debug + Display + Send + Sync + Zero + WrappingAdd + WrappingMul + Serialize + 'static
{
  /// Name of the type as used in configuration files (`"i32"`, `"u8"`, ...)
  const WIDTH_NAME: &'static str;

  /// Truncate a host-side value into this width, two's-complement style
  fn from_i64_wrapping(value: i64) -> Self;

  /// `acc + lhs * rhs` with wraparound on both the product and the sum
  fn mac(acc: Self, lhs: Self, rhs: Self) -> Self {
    acc.wrapping_add(&lhs.wrapping_mul(&rhs))
  }
}

macro_rules! impl_operand {
  ($($ty:ty => $name:literal),* $(,)?) => {
    $(
      impl Operand for $ty {
        const WIDTH_NAME: &'static str = $name;

        fn from_i64_wrapping(value: i64) -> Self {
          value as $ty
        }
      }
    )*
  };
}

impl_operand!(
  i8 => "i8",
  i16 => "i16",
  i32 => "i32",
  i64 => "i64",
  u8 => "u8",
  u16 => "u16",
  u32 => "u32",
  u64 => "u64",
);

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_mac_wraps_i8() {
    assert_eq!(i8::mac(0, 100, 100), 16);
    assert_eq!(i8::mac(120, 2, 5), -126);
  }

  #[test]
  fn test_mac_plain() {
    assert_eq!(i32::mac(10, 3, 4), 22);
    assert_eq!(u16::mac(0, 300, 300), (90_000u32 % 65_536) as u16);
  }

  #[test]
  fn test_from_i64_wrapping() {
    assert_eq!(i8::from_i64_wrapping(200), -56);
    assert_eq!(u8::from_i64_wrapping(-1), 255);
    assert_eq!(i64::from_i64_wrapping(-7), -7);
    assert_eq!(<i16 as Operand>::WIDTH_NAME, "i16");
  }
}
