use std::{cmp::Ordering, fmt};

use crate::{
    device::IntoDevice,
    ops::{BinaryOpType, BitwiseOpType, Operand},
    storage::Storage,
    DType, Device, Error, FloatDType, IntDType, Result,
};

/// Relative tolerance of [`Vector::is_parallel`].
pub const PARALLEL_RTOL: f64 = 1e-5;
/// Absolute tolerance of [`Vector::is_parallel`].
pub const PARALLEL_ATOL: f64 = 1e-8;

/// A fixed-length vector whose buffer lives on one [`Device`].
///
/// Every operation between two vectors requires both to be on the same
/// device and fails with [`Error::DeviceMismatch`] otherwise; nothing is ever
/// copied implicitly. Operations return new vectors on the operands' device.
/// Only [`Vector::set`] and [`Vector::change_device`] mutate a vector.
///
/// Operand lengths are not validated here. The backends reject mismatched
/// buffers with [`Error::LengthMismatch`].
pub struct Vector<T: DType> {
    storage: Storage<T>,
}

macro_rules! binary_family {
    ($($fn:ident, $rfn:ident, $op:ident, $doc:literal;)*) => {
        impl<T: DType> Vector<T> {
            $(
                #[doc = concat!("`self ", $doc, " rhs` for a scalar or a vector on the same device.")]
                pub fn $fn<'a>(&self, rhs: impl Into<Operand<'a, T>>) -> Result<Self> {
                    self.binary(rhs.into(), BinaryOpType::$op)
                }

                #[doc = concat!("Reflected form: `lhs ", $doc, " self`.")]
                pub fn $rfn<'a>(&self, lhs: impl Into<Operand<'a, T>>) -> Result<Self> {
                    self.reflected(lhs.into(), BinaryOpType::$op)
                }
            )*
        }
    };
}

binary_family! {
    add, radd, Add, "+";
    sub, rsub, Sub, "-";
    mul, rmul, Mul, "*";
    div, rdiv, Div, "/";
    floor_div, rfloor_div, FloorDiv, "//";
    pow, rpow, Pow, "**";
    rem, rrem, Rem, "%";
}

impl<T: DType> Vector<T> {
    /// Build a vector on the device named by `device` (`"cpu"` or `"cuda"`,
    /// case-insensitive, or a [`Device`]).
    ///
    /// Fails with [`Error::UnsupportedDevice`] for any other name and with
    /// [`Error::DeviceUnavailable`] when the accelerator cannot be used.
    pub fn new(components: &[T], device: impl IntoDevice) -> Result<Self> {
        let device = device.into_device()?;
        let storage = device.resolve()?.storage_from_slice(components)?;
        tracing::debug!(len = components.len(), %device, dtype = T::NAME, "created vector");
        Ok(Self { storage })
    }

    /// Build a vector in host memory.
    pub fn from_vec(components: Vec<T>) -> Self {
        Self {
            storage: Storage::Cpu(crate::cpu_storage::CpuStorage(components)),
        }
    }

    pub(crate) fn from_storage(storage: Storage<T>) -> Self {
        Self { storage }
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    pub fn device(&self) -> Device {
        self.storage.device()
    }

    /// The backend buffer.
    pub fn storage(&self) -> &Storage<T> {
        &self.storage
    }

    /// Copy the components into a host `Vec`.
    pub fn to_vec(&self) -> Result<Vec<T>> {
        self.storage.to_vec()
    }

    pub fn get(&self, index: usize) -> Result<T> {
        self.storage.get(index)
    }

    pub fn set(&mut self, index: usize, value: T) -> Result<()> {
        self.storage.set(index, value)
    }

    /// Move the buffer to `target` in place. Does nothing when the vector is
    /// already there. On error the vector is left untouched.
    pub fn change_device(&mut self, target: impl IntoDevice) -> Result<()> {
        let target = target.into_device()?;
        let from = self.device();
        if target == from {
            return Ok(());
        }
        self.storage = self.storage.to_device(target)?;
        tracing::debug!(%from, to = %target, len = self.len(), "migrated vector");
        Ok(())
    }

    fn same_device(&self, other: &Self, op: &'static str) -> Result<()> {
        if self.device() != other.device() {
            return Err(Error::DeviceMismatch {
                op,
                lhs: self.device(),
                rhs: other.device(),
            });
        }
        Ok(())
    }

    fn binary(&self, rhs: Operand<'_, T>, op: BinaryOpType) -> Result<Self> {
        let storage = match rhs {
            Operand::Scalar(rhs) => self.storage.binary_op_scalar(rhs, op)?,
            Operand::Vector(rhs) => {
                self.same_device(rhs, op.symbol())?;
                self.storage.binary_op(&rhs.storage, op)?
            }
            Operand::Unsupported(operand) => {
                return Err(Error::UnsupportedOperand {
                    op: op.symbol(),
                    operand,
                })
            }
        };
        Ok(Self::from_storage(storage))
    }

    fn reflected(&self, lhs: Operand<'_, T>, op: BinaryOpType) -> Result<Self> {
        match lhs {
            Operand::Scalar(lhs) => Ok(Self::from_storage(
                self.storage.binary_op_scalar_lhs(lhs, op)?,
            )),
            Operand::Vector(lhs) => lhs.binary(Operand::Vector(self), op),
            Operand::Unsupported(operand) => Err(Error::UnsupportedOperand {
                op: op.symbol(),
                operand,
            }),
        }
    }

    /// Dot product (the `@` operator). Both vectors must be on the same device.
    pub fn dot(&self, other: &Self) -> Result<T> {
        self.same_device(other, "@")?;
        self.storage.dot(&other.storage)
    }

    /// Multiply every component by `scalar`.
    pub fn scale(&self, scalar: T) -> Result<Self> {
        self.mul(scalar)
    }

    /// Euclidean norm, `sqrt(self . self)`, accumulated in `f64` so integer
    /// components never wrap.
    pub fn norm(&self) -> Result<f64> {
        Ok(self.storage.dot_f64(&self.storage)?.sqrt())
    }

    /// Compare magnitudes. See [`Vector::eq`].
    pub fn magnitude_cmp(&self, other: &Self) -> Result<Option<Ordering>> {
        Ok(self.norm()?.partial_cmp(&other.norm()?))
    }

    /// Magnitude equality: true when both norms are equal, whatever the
    /// components are. `[3, 4]` and `[5, 0]` are "equal". The whole
    /// comparison family (`eq`, `ne`, `gt`, `ge`, `lt`, `le`) orders vectors
    /// by norm, never componentwise, and does not require a shared device.
    #[allow(clippy::should_implement_trait)]
    pub fn eq(&self, other: &Self) -> Result<bool> {
        Ok(self.norm()? == other.norm()?)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn ne(&self, other: &Self) -> Result<bool> {
        Ok(self.norm()? != other.norm()?)
    }

    pub fn gt(&self, other: &Self) -> Result<bool> {
        Ok(self.norm()? > other.norm()?)
    }

    pub fn ge(&self, other: &Self) -> Result<bool> {
        Ok(self.norm()? >= other.norm()?)
    }

    pub fn lt(&self, other: &Self) -> Result<bool> {
        Ok(self.norm()? < other.norm()?)
    }

    pub fn le(&self, other: &Self) -> Result<bool> {
        Ok(self.norm()? <= other.norm()?)
    }

    /// Whether `self * reversed(other)` is close to `reversed(self) * other`
    /// elementwise (see [`PARALLEL_RTOL`], [`PARALLEL_ATOL`]).
    pub fn is_parallel(&self, other: &Self) -> Result<bool> {
        self.same_device(other, "is_parallel")?;
        let lhs = self
            .storage
            .binary_op(&other.storage.reverse()?, BinaryOpType::Mul)?;
        let rhs = self
            .storage
            .reverse()?
            .binary_op(&other.storage, BinaryOpType::Mul)?;
        lhs.allclose(&rhs, PARALLEL_RTOL, PARALLEL_ATOL)
    }

    /// True iff the dot product, accumulated in `f64`, is exactly zero.
    pub fn is_orthogonal(&self, other: &Self) -> Result<bool> {
        self.same_device(other, "is_orthogonal")?;
        Ok(self.storage.dot_f64(&other.storage)? == 0.0)
    }
}

impl<T: FloatDType> Vector<T> {
    /// `self / self.norm()`.
    pub fn unit(&self) -> Result<Self> {
        let norm = self.norm()?;
        self.div(T::from_f64(norm))
    }

    /// `(self * on) / on.norm()`, elementwise product scaled by the norm of `on`.
    pub fn project_onto(&self, on: &Self) -> Result<Self> {
        self.same_device(on, "project_onto")?;
        let norm = on.norm()?;
        self.mul(on)?.div(T::from_f64(norm))
    }
}

impl<T: IntDType> Vector<T> {
    fn bitwise(&self, rhs: Operand<'_, T>, op: BitwiseOpType) -> Result<Storage<T>> {
        match rhs {
            Operand::Scalar(rhs) => self.storage.bitwise_op_scalar(rhs, op),
            Operand::Vector(rhs) => {
                self.same_device(rhs, op.symbol())?;
                self.storage.bitwise_op(&rhs.storage, op)
            }
            Operand::Unsupported(operand) => Err(Error::UnsupportedOperand {
                op: op.symbol(),
                operand,
            }),
        }
    }

    fn reflected_bitwise(&self, lhs: Operand<'_, T>, op: BitwiseOpType) -> Result<Storage<T>> {
        match lhs {
            Operand::Vector(lhs) => lhs.bitwise(Operand::Vector(self), op),
            // The bitwise operators commute.
            other => self.bitwise(other, op),
        }
    }

    /// Bitwise AND. Returns the raw backend buffer rather than a vector.
    pub fn bitand<'a>(&self, rhs: impl Into<Operand<'a, T>>) -> Result<Storage<T>> {
        self.bitwise(rhs.into(), BitwiseOpType::And)
    }

    /// Bitwise OR (not a truthiness test). Returns the raw backend buffer.
    pub fn bitor<'a>(&self, rhs: impl Into<Operand<'a, T>>) -> Result<Storage<T>> {
        self.bitwise(rhs.into(), BitwiseOpType::Or)
    }

    /// Bitwise XOR. Returns the raw backend buffer.
    pub fn bitxor<'a>(&self, rhs: impl Into<Operand<'a, T>>) -> Result<Storage<T>> {
        self.bitwise(rhs.into(), BitwiseOpType::Xor)
    }

    pub fn rbitand<'a>(&self, lhs: impl Into<Operand<'a, T>>) -> Result<Storage<T>> {
        self.reflected_bitwise(lhs.into(), BitwiseOpType::And)
    }

    pub fn rbitor<'a>(&self, lhs: impl Into<Operand<'a, T>>) -> Result<Storage<T>> {
        self.reflected_bitwise(lhs.into(), BitwiseOpType::Or)
    }

    pub fn rbitxor<'a>(&self, lhs: impl Into<Operand<'a, T>>) -> Result<Storage<T>> {
        self.reflected_bitwise(lhs.into(), BitwiseOpType::Xor)
    }

    /// Bitwise NOT of every component. Returns the raw backend buffer.
    pub fn invert(&self) -> Result<Storage<T>> {
        self.storage.invert()
    }
}

impl<T: DType> fmt::Display for Vector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<vector size={} device={}>", self.len(), self.device())
    }
}

impl<T: DType> fmt::Debug for Vector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

macro_rules! binary_op_trait {
    ($trait:ident, $fn:ident) => {
        impl<T: DType> std::ops::$trait<&Vector<T>> for &Vector<T> {
            type Output = Result<Vector<T>>;
            fn $fn(self, rhs: &Vector<T>) -> Self::Output {
                Vector::$fn(self, rhs)
            }
        }

        impl<T: DType> std::ops::$trait<T> for &Vector<T> {
            type Output = Result<Vector<T>>;
            fn $fn(self, rhs: T) -> Self::Output {
                Vector::$fn(self, rhs)
            }
        }
    };
}

binary_op_trait!(Add, add);
binary_op_trait!(Sub, sub);
binary_op_trait!(Mul, mul);
binary_op_trait!(Div, div);
binary_op_trait!(Rem, rem);

macro_rules! reflected_op_traits {
    ($($t:ident),*) => {
        $(
            reflected_op_traits!(@one $t, Add, add, radd);
            reflected_op_traits!(@one $t, Sub, sub, rsub);
            reflected_op_traits!(@one $t, Mul, mul, rmul);
            reflected_op_traits!(@one $t, Div, div, rdiv);
            reflected_op_traits!(@one $t, Rem, rem, rrem);
        )*
    };
    (@one $t:ident, $trait:ident, $fn:ident, $rfn:ident) => {
        impl std::ops::$trait<&Vector<$t>> for $t {
            type Output = Result<Vector<$t>>;
            fn $fn(self, rhs: &Vector<$t>) -> Self::Output {
                rhs.$rfn(self)
            }
        }
    };
}

reflected_op_traits!(u8, u32, i32, i64, f32, f64);

macro_rules! bitwise_op_trait {
    ($trait:ident, $fn:ident) => {
        impl<T: IntDType> std::ops::$trait<&Vector<T>> for &Vector<T> {
            type Output = Result<Storage<T>>;
            fn $fn(self, rhs: &Vector<T>) -> Self::Output {
                Vector::$fn(self, rhs)
            }
        }

        impl<T: IntDType> std::ops::$trait<T> for &Vector<T> {
            type Output = Result<Storage<T>>;
            fn $fn(self, rhs: T) -> Self::Output {
                Vector::$fn(self, rhs)
            }
        }
    };
}

bitwise_op_trait!(BitAnd, bitand);
bitwise_op_trait!(BitOr, bitor);
bitwise_op_trait!(BitXor, bitxor);

impl<T: IntDType> std::ops::Not for &Vector<T> {
    type Output = Result<Storage<T>>;
    fn not(self) -> Self::Output {
        self.invert()
    }
}
