use std::borrow::Cow;

#[cfg(feature = "cuda")]
use crate::cuda_backend::CudaStorage;
use crate::{
    cpu_storage::CpuStorage,
    ops::{BinaryOpType, BitwiseOpType},
    DType, Device, Error, FloatDType, IntDType, Result,
};

/// A buffer materialized on exactly one placement.
pub enum Storage<T: DType> {
    Cpu(CpuStorage<T>),
    #[cfg(feature = "cuda")]
    Cuda(CudaStorage<T>),
}

/// Pick the matching backend pair or report the placements that disagree.
macro_rules! same_backend {
    ($op:expr, $lhs:expr, $rhs:expr, |$l:ident, $r:ident| $body:expr) => {
        match ($lhs, $rhs) {
            (Storage::Cpu($l), Storage::Cpu($r)) => $body,
            #[cfg(feature = "cuda")]
            (Storage::Cuda($l), Storage::Cuda($r)) => $body,
            #[allow(unreachable_patterns)]
            (l, r) => Err(Error::DeviceMismatch {
                op: $op,
                lhs: l.device(),
                rhs: r.device(),
            }),
        }
    };
}

/// Apply the same body to whichever backend holds the buffer.
macro_rules! each_backend {
    ($storage:expr, |$s:ident| $body:expr) => {
        match $storage {
            Storage::Cpu($s) => $body,
            #[cfg(feature = "cuda")]
            Storage::Cuda($s) => $body,
        }
    };
}

impl<T: DType> Storage<T> {
    pub fn device(&self) -> Device {
        match self {
            Self::Cpu(_) => Device::Cpu,
            #[cfg(feature = "cuda")]
            Self::Cuda(_) => Device::Cuda,
        }
    }

    pub fn len(&self) -> usize {
        each_backend!(self, |s| s.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy the buffer into host memory.
    pub fn to_vec(&self) -> Result<Vec<T>> {
        Ok(self.to_cpu_storage()?.into_owned().0)
    }

    pub(crate) fn to_cpu_storage(&self) -> Result<Cow<'_, CpuStorage<T>>> {
        each_backend!(self, |s| s.to_cpu_storage())
    }

    /// Copy the buffer onto `target`. Moving onto the accelerator checks
    /// availability first; moving back to the host never does.
    pub(crate) fn to_device(&self, target: Device) -> Result<Self> {
        match (self, target) {
            (Self::Cpu(cpu), Device::Cpu) => Ok(Self::Cpu(cpu.clone())),
            (Self::Cpu(cpu), Device::Cuda) => target.resolve()?.storage_from_slice(cpu.as_slice()),
            #[cfg(feature = "cuda")]
            (Self::Cuda(cuda), Device::Cpu) => Ok(Self::Cpu(cuda.to_cpu_storage()?.into_owned())),
            #[cfg(feature = "cuda")]
            (Self::Cuda(cuda), Device::Cuda) => Ok(Self::Cuda(cuda.try_clone()?)),
        }
    }

    pub(crate) fn get(&self, index: usize) -> Result<T> {
        each_backend!(self, |s| s.get(index))
    }

    pub(crate) fn set(&mut self, index: usize, value: T) -> Result<()> {
        each_backend!(self, |s| s.set(index, value))
    }

    pub(crate) fn binary_op(&self, rhs: &Self, op: BinaryOpType) -> Result<Self> {
        same_backend!(op.symbol(), self, rhs, |l, r| Ok(l.binary_op(r, op)?.into()))
    }

    pub(crate) fn binary_op_scalar(&self, rhs: T, op: BinaryOpType) -> Result<Self> {
        each_backend!(self, |s| Ok(s.binary_op_scalar(rhs, op)?.into()))
    }

    pub(crate) fn binary_op_scalar_lhs(&self, lhs: T, op: BinaryOpType) -> Result<Self> {
        each_backend!(self, |s| Ok(s.binary_op_scalar_lhs(lhs, op)?.into()))
    }

    pub(crate) fn dot(&self, rhs: &Self) -> Result<T> {
        same_backend!("@", self, rhs, |l, r| l.dot(r))
    }

    pub(crate) fn dot_f64(&self, rhs: &Self) -> Result<f64> {
        same_backend!("@", self, rhs, |l, r| l.dot_f64(r))
    }

    pub(crate) fn reverse(&self) -> Result<Self> {
        each_backend!(self, |s| Ok(s.reverse()?.into()))
    }

    pub(crate) fn allclose(&self, rhs: &Self, rtol: f64, atol: f64) -> Result<bool> {
        same_backend!("allclose", self, rhs, |l, r| l.allclose(r, rtol, atol))
    }
}

impl<T: IntDType> Storage<T> {
    pub(crate) fn bitwise_op(&self, rhs: &Self, op: BitwiseOpType) -> Result<Self> {
        same_backend!(op.symbol(), self, rhs, |l, r| Ok(l.bitwise_op(r, op)?.into()))
    }

    pub(crate) fn bitwise_op_scalar(&self, rhs: T, op: BitwiseOpType) -> Result<Self> {
        each_backend!(self, |s| Ok(s.bitwise_op_scalar(rhs, op)?.into()))
    }

    pub(crate) fn invert(&self) -> Result<Self> {
        each_backend!(self, |s| Ok(s.invert()?.into()))
    }
}

impl<T: DType> From<CpuStorage<T>> for Storage<T> {
    fn from(value: CpuStorage<T>) -> Self {
        Self::Cpu(value)
    }
}

#[cfg(feature = "cuda")]
impl<T: DType> From<CudaStorage<T>> for Storage<T> {
    fn from(value: CudaStorage<T>) -> Self {
        Self::Cuda(value)
    }
}

/// Buffer-level math for one placement. Implementations check that
/// elementwise operands have the same length and report
/// [`Error::LengthMismatch`] otherwise.
pub trait BackendStorage<T: DType>: Sized {
    fn len(&self) -> usize;

    fn to_cpu_storage(&self) -> Result<Cow<'_, CpuStorage<T>>>;

    fn get(&self, index: usize) -> Result<T>;

    fn set(&mut self, index: usize, value: T) -> Result<()>;

    /// `self[i] op rhs[i]`
    fn binary_op(&self, rhs: &Self, op: BinaryOpType) -> Result<Self>;

    /// `self[i] op rhs`
    fn binary_op_scalar(&self, rhs: T, op: BinaryOpType) -> Result<Self>;

    /// `lhs op self[i]`
    fn binary_op_scalar_lhs(&self, lhs: T, op: BinaryOpType) -> Result<Self>;

    fn dot(&self, rhs: &Self) -> Result<T>;

    /// Dot product accumulated in `f64`, so integer components never wrap.
    fn dot_f64(&self, rhs: &Self) -> Result<f64>;

    fn reverse(&self) -> Result<Self>;

    /// `|a - b| <= atol + rtol * |b|` for every pair. NaN is never close.
    fn allclose(&self, rhs: &Self, rtol: f64, atol: f64) -> Result<bool>;

    fn bitwise_op(&self, rhs: &Self, op: BitwiseOpType) -> Result<Self>
    where
        T: IntDType;

    fn bitwise_op_scalar(&self, rhs: T, op: BitwiseOpType) -> Result<Self>
    where
        T: IntDType;

    fn invert(&self) -> Result<Self>
    where
        T: IntDType;
}

/// Allocation on one placement.
pub trait BackendDevice {
    type Storage<X: DType>: BackendStorage<X>;

    fn storage_from_slice<T: DType>(&self, data: &[T]) -> Result<Self::Storage<T>>;

    /// `len` uniform draws from the unit interval. The same seed gives the
    /// same values on the same placement.
    fn rand_uniform<T: FloatDType>(
        &self,
        len: usize,
        seed: Option<u64>,
    ) -> Result<Self::Storage<T>>;
}
