use std::{
    fmt::{Debug, Display},
    ops::{BitAnd, BitOr, BitXor, Not},
};

#[cfg(feature = "cuda")]
use cudarc::driver::DeviceRepr;
use rand::distr::uniform::SampleUniform;

pub use random::RandDispatch;

mod random;

/// Scalar semantics of the arithmetic operators, shared by every backend.
///
/// Integer arithmetic wraps. Integer division and modulo by zero produce 0.
/// Floor division rounds toward negative infinity and modulo takes the sign
/// of the divisor, for integers and floats alike.
pub trait DTypeOps: Copy {
    fn add(self, rhs: Self) -> Self;
    fn sub(self, rhs: Self) -> Self;
    fn mul(self, rhs: Self) -> Self;
    fn div(self, rhs: Self) -> Self;
    fn floor_div(self, rhs: Self) -> Self;
    fn rem(self, rhs: Self) -> Self;
    fn pow(self, rhs: Self) -> Self;
}

macro_rules! signed_ops {
    ($t:ident) => {
        impl DTypeOps for $t {
            fn add(self, rhs: Self) -> Self {
                self.wrapping_add(rhs)
            }
            fn sub(self, rhs: Self) -> Self {
                self.wrapping_sub(rhs)
            }
            fn mul(self, rhs: Self) -> Self {
                self.wrapping_mul(rhs)
            }
            fn div(self, rhs: Self) -> Self {
                if rhs == 0 {
                    return 0;
                }
                self.wrapping_div(rhs)
            }
            fn floor_div(self, rhs: Self) -> Self {
                if rhs == 0 {
                    return 0;
                }
                let q = self.wrapping_div(rhs);
                if self.wrapping_rem(rhs) != 0 && ((self < 0) != (rhs < 0)) {
                    q.wrapping_sub(1)
                } else {
                    q
                }
            }
            fn rem(self, rhs: Self) -> Self {
                if rhs == 0 {
                    return 0;
                }
                let r = self.wrapping_rem(rhs);
                if r != 0 && ((r < 0) != (rhs < 0)) {
                    r.wrapping_add(rhs)
                } else {
                    r
                }
            }
            fn pow(self, rhs: Self) -> Self {
                if rhs < 0 {
                    return (self as f64).powf(rhs as f64) as $t;
                }
                self.wrapping_pow(u32::try_from(rhs).unwrap_or(u32::MAX))
            }
        }
    };
}

macro_rules! unsigned_ops {
    ($t:ident) => {
        impl DTypeOps for $t {
            fn add(self, rhs: Self) -> Self {
                self.wrapping_add(rhs)
            }
            fn sub(self, rhs: Self) -> Self {
                self.wrapping_sub(rhs)
            }
            fn mul(self, rhs: Self) -> Self {
                self.wrapping_mul(rhs)
            }
            fn div(self, rhs: Self) -> Self {
                self.checked_div(rhs).unwrap_or(0)
            }
            fn floor_div(self, rhs: Self) -> Self {
                self.checked_div(rhs).unwrap_or(0)
            }
            fn rem(self, rhs: Self) -> Self {
                self.checked_rem(rhs).unwrap_or(0)
            }
            fn pow(self, rhs: Self) -> Self {
                self.wrapping_pow(u32::try_from(rhs).unwrap_or(u32::MAX))
            }
        }
    };
}

macro_rules! float_ops {
    ($t:ident) => {
        impl DTypeOps for $t {
            fn add(self, rhs: Self) -> Self {
                self + rhs
            }
            fn sub(self, rhs: Self) -> Self {
                self - rhs
            }
            fn mul(self, rhs: Self) -> Self {
                self * rhs
            }
            fn div(self, rhs: Self) -> Self {
                self / rhs
            }
            // Derived from the remainder so that `a == b * (a // b) + a % b`
            // holds, e.g. `1.0 // 0.1 == 9.0`.
            fn floor_div(self, rhs: Self) -> Self {
                if rhs == 0.0 {
                    return self / rhs;
                }
                let m = self % rhs;
                let mut div = (self - m) / rhs;
                if m != 0.0 && ((rhs < 0.0) != (m < 0.0)) {
                    div -= 1.0;
                }
                if div == 0.0 {
                    return (0.0 as $t).copysign(self / rhs);
                }
                let floor = div.floor();
                if div - floor > 0.5 {
                    floor + 1.0
                } else {
                    floor
                }
            }
            fn rem(self, rhs: Self) -> Self {
                let r = self % rhs;
                if r != 0.0 && ((r < 0.0) != (rhs < 0.0)) {
                    r + rhs
                } else {
                    r
                }
            }
            fn pow(self, rhs: Self) -> Self {
                self.powf(rhs)
            }
        }
    };
}

signed_ops!(i32);
signed_ops!(i64);
unsigned_ops!(u8);
unsigned_ops!(u32);
float_ops!(f32);
float_ops!(f64);

#[cfg(feature = "cuda")]
pub trait DeviceReprLike: DeviceRepr {}

#[cfg(not(feature = "cuda"))]
pub trait DeviceReprLike {}

impl DeviceReprLike for u8 {}
impl DeviceReprLike for i32 {}
impl DeviceReprLike for u32 {}
impl DeviceReprLike for i64 {}
impl DeviceReprLike for f32 {}
impl DeviceReprLike for f64 {}

/// Marker trait for vector element types.
pub trait DType:
    Debug
    + Display
    + Copy
    + PartialEq
    + PartialOrd
    + Default
    + DTypeOps
    + DeviceReprLike
    + Send
    + Sync
    + 'static
{
    const ZERO: Self;
    const ONE: Self;
    const NAME: &'static str;
    const C_NAME: &'static str;
    const INTEGRAL: bool;

    fn to_f64(&self) -> f64;
    fn from_f64(x: f64) -> Self;
}

macro_rules! dtype {
    ($rt:ident, $zero:expr, $one:expr, $c_repr:expr, $integral:expr) => {
        impl DType for $rt {
            const ZERO: $rt = $zero;
            const ONE: $rt = $one;
            const NAME: &'static str = stringify!($rt);
            const C_NAME: &'static str = $c_repr;
            const INTEGRAL: bool = $integral;

            fn to_f64(&self) -> f64 {
                *self as f64
            }
            fn from_f64(x: f64) -> Self {
                x as $rt
            }
        }
    };
}

dtype!(u8, 0u8, 1u8, "uint8_t", true);
dtype!(u32, 0u32, 1u32, "uint32_t", true);
dtype!(i32, 0i32, 1i32, "int", true);
dtype!(i64, 0i64, 1i64, "int64_t", true);
dtype!(f32, 0f32, 1f32, "float", false);
dtype!(f64, 0f64, 1f64, "double", false);

/// Floating point element types. Required by operations whose result is
/// only meaningful with a fractional part (unit vectors, projections,
/// uniform sampling).
pub trait FloatDType: DType + SampleUniform + RandDispatch {}

impl FloatDType for f32 {}
impl FloatDType for f64 {}

/// Integer element types, which additionally support the bitwise family.
pub trait IntDType:
    DType + BitAnd<Output = Self> + BitOr<Output = Self> + BitXor<Output = Self> + Not<Output = Self>
{
}

impl IntDType for u8 {}
impl IntDType for u32 {}
impl IntDType for i32 {}
impl IntDType for i64 {}

#[cfg(test)]
mod tests {
    use super::DTypeOps;

    #[test]
    fn floor_div_rounds_down() {
        assert_eq!(DTypeOps::floor_div(7i32, 2), 3);
        assert_eq!(DTypeOps::floor_div(-7i32, 2), -4);
        assert_eq!(DTypeOps::floor_div(7i64, -2), -4);
        assert_eq!(DTypeOps::floor_div(-7.0f64, 2.0), -4.0);
        assert_eq!(DTypeOps::floor_div(7u32, 2), 3);
    }

    #[test]
    fn float_floor_div_agrees_with_rem() {
        assert_eq!(DTypeOps::floor_div(1.0f64, 0.1), 9.0);
        assert_eq!(DTypeOps::floor_div(-1.0f64, 0.1), -10.0);
        assert_eq!(DTypeOps::floor_div(7.5f64, -2.0), -4.0);
        assert_eq!(DTypeOps::floor_div(6.0f32, 3.0), 2.0);
        assert!(DTypeOps::floor_div(1.0f64, 0.0).is_infinite());
        assert!(DTypeOps::floor_div(-0.5f64, 2.0) == -1.0);
    }

    #[test]
    fn rem_takes_divisor_sign() {
        assert_eq!(DTypeOps::rem(-7i32, 3), 2);
        assert_eq!(DTypeOps::rem(7i32, -3), -2);
        assert_eq!(DTypeOps::rem(-7.5f64, 2.0), 0.5);
        assert_eq!(DTypeOps::rem(7.5f32, -2.0), -0.5);
    }

    #[test]
    fn integer_division_by_zero_is_zero() {
        assert_eq!(DTypeOps::div(5i32, 0), 0);
        assert_eq!(DTypeOps::floor_div(5i64, 0), 0);
        assert_eq!(DTypeOps::rem(5u8, 0), 0);
    }

    #[test]
    fn integer_pow() {
        assert_eq!(DTypeOps::pow(2i32, 10), 1024);
        assert_eq!(DTypeOps::pow(2i64, -1), 0);
        assert_eq!(DTypeOps::pow(-1i32, -3), -1);
        assert_eq!(DTypeOps::pow(3u8, 2), 9);
    }

    #[test]
    fn integer_arithmetic_wraps() {
        assert_eq!(DTypeOps::add(u8::MAX, 1), 0);
        assert_eq!(DTypeOps::sub(0u32, 1), u32::MAX);
    }
}
