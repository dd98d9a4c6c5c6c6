use std::borrow::Cow;

use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, Uniform};
use rayon::prelude::*;

use crate::{
    ops::{BinaryOpType, BitwiseOpType},
    storage::{BackendDevice, BackendStorage},
    Context, DType, Error, FloatDType, IntDType, Result,
};

/// Buffers at least this long are processed with rayon.
const PAR_THRESHOLD: usize = 1 << 15;

#[derive(Clone, Copy, Debug)]
pub struct CpuDevice;

#[derive(Clone, Debug, PartialEq)]
pub struct CpuStorage<T: DType>(pub(crate) Vec<T>);

impl<T: DType> CpuStorage<T> {
    pub fn as_slice(&self) -> &[T] {
        &self.0
    }
}

fn check_len(op: &'static str, lhs: usize, rhs: usize) -> Result<()> {
    if lhs != rhs {
        return Err(Error::LengthMismatch { op, lhs, rhs });
    }
    Ok(())
}

fn zip_map<T, F>(lhs: &[T], rhs: &[T], f: F) -> Vec<T>
where
    T: DType,
    F: Fn(T, T) -> T + Send + Sync,
{
    if lhs.len() >= PAR_THRESHOLD {
        lhs.par_iter()
            .zip(rhs.par_iter())
            .map(|(&l, &r)| f(l, r))
            .collect()
    } else {
        lhs.iter().zip(rhs).map(|(&l, &r)| f(l, r)).collect()
    }
}

fn map<T, F>(data: &[T], f: F) -> Vec<T>
where
    T: DType,
    F: Fn(T) -> T + Send + Sync,
{
    if data.len() >= PAR_THRESHOLD {
        data.par_iter().map(|&x| f(x)).collect()
    } else {
        data.iter().map(|&x| f(x)).collect()
    }
}

impl<T: DType> BackendStorage<T> for CpuStorage<T> {
    fn len(&self) -> usize {
        self.0.len()
    }

    fn to_cpu_storage(&self) -> Result<Cow<'_, CpuStorage<T>>> {
        Ok(Cow::Borrowed(self))
    }

    fn get(&self, index: usize) -> Result<T> {
        self.0.get(index).copied().ok_or(Error::IndexOutOfBounds {
            index,
            len: self.0.len(),
        })
    }

    fn set(&mut self, index: usize, value: T) -> Result<()> {
        let len = self.0.len();
        let slot = self
            .0
            .get_mut(index)
            .ok_or(Error::IndexOutOfBounds { index, len })?;
        *slot = value;
        Ok(())
    }

    fn binary_op(&self, rhs: &Self, op: BinaryOpType) -> Result<Self> {
        check_len(op.symbol(), self.0.len(), rhs.0.len())?;
        Ok(CpuStorage(zip_map(&self.0, &rhs.0, |l, r| op.apply(l, r))))
    }

    fn binary_op_scalar(&self, rhs: T, op: BinaryOpType) -> Result<Self> {
        Ok(CpuStorage(map(&self.0, |l| op.apply(l, rhs))))
    }

    fn binary_op_scalar_lhs(&self, lhs: T, op: BinaryOpType) -> Result<Self> {
        Ok(CpuStorage(map(&self.0, |r| op.apply(lhs, r))))
    }

    fn dot(&self, rhs: &Self) -> Result<T> {
        check_len("@", self.0.len(), rhs.0.len())?;
        let sum = if self.0.len() >= PAR_THRESHOLD {
            self.0
                .par_iter()
                .zip(rhs.0.par_iter())
                .map(|(&l, &r)| l.mul(r))
                .reduce(|| T::ZERO, |a, b| a.add(b))
        } else {
            self.0
                .iter()
                .zip(&rhs.0)
                .fold(T::ZERO, |acc, (&l, &r)| acc.add(l.mul(r)))
        };
        Ok(sum)
    }

    fn dot_f64(&self, rhs: &Self) -> Result<f64> {
        check_len("@", self.0.len(), rhs.0.len())?;
        let product = |(l, r): (&T, &T)| l.to_f64() * r.to_f64();
        let sum: f64 = if self.0.len() >= PAR_THRESHOLD {
            self.0.par_iter().zip(rhs.0.par_iter()).map(product).sum()
        } else {
            self.0.iter().zip(&rhs.0).map(product).sum()
        };
        Ok(sum)
    }

    fn reverse(&self) -> Result<Self> {
        Ok(CpuStorage(self.0.iter().rev().copied().collect()))
    }

    fn allclose(&self, rhs: &Self, rtol: f64, atol: f64) -> Result<bool> {
        check_len("allclose", self.0.len(), rhs.0.len())?;
        Ok(self.0.iter().zip(&rhs.0).all(|(l, r)| {
            let (a, b) = (l.to_f64(), r.to_f64());
            a == b || (a - b).abs() <= atol + rtol * b.abs()
        }))
    }

    fn bitwise_op(&self, rhs: &Self, op: BitwiseOpType) -> Result<Self>
    where
        T: IntDType,
    {
        check_len(op.symbol(), self.0.len(), rhs.0.len())?;
        Ok(CpuStorage(zip_map(&self.0, &rhs.0, |l, r| op.apply(l, r))))
    }

    fn bitwise_op_scalar(&self, rhs: T, op: BitwiseOpType) -> Result<Self>
    where
        T: IntDType,
    {
        Ok(CpuStorage(map(&self.0, |l| op.apply(l, rhs))))
    }

    fn invert(&self) -> Result<Self>
    where
        T: IntDType,
    {
        Ok(CpuStorage(map(&self.0, |x| !x)))
    }
}

impl BackendDevice for CpuDevice {
    type Storage<X: DType> = CpuStorage<X>;

    fn storage_from_slice<T: DType>(&self, data: &[T]) -> Result<Self::Storage<T>> {
        Ok(CpuStorage(data.to_vec()))
    }

    fn rand_uniform<T: FloatDType>(
        &self,
        len: usize,
        seed: Option<u64>,
    ) -> Result<Self::Storage<T>> {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let dist = Uniform::new(T::ZERO, T::ONE).context("building the unit uniform distribution")?;
        Ok(CpuStorage(dist.sample_iter(&mut rng).take(len).collect()))
    }
}
