//! Vector factories.

use crate::{device::IntoDevice, DType, FloatDType, Result, Vector};

/// Same as [`Vector::new`].
pub fn vector<T: DType>(components: &[T], device: impl IntoDevice) -> Result<Vector<T>> {
    Vector::new(components, device)
}

/// A vector of `size` zeros.
pub fn zeros<T: DType>(size: usize, device: impl IntoDevice) -> Result<Vector<T>> {
    Vector::new(&vec![T::ZERO; size], device)
}

/// A vector of `size` ones.
pub fn ones<T: DType>(size: usize, device: impl IntoDevice) -> Result<Vector<T>> {
    Vector::new(&vec![T::ONE; size], device)
}

/// A vector of `size` uniform draws from the unit interval.
///
/// The host draws from `[0, 1)`, the accelerator (cuRAND) from `(0, 1]`.
/// With a `seed`, repeated calls on the same device give the same values.
pub fn rand<T: FloatDType>(
    size: usize,
    seed: Option<u64>,
    device: impl IntoDevice,
) -> Result<Vector<T>> {
    let device = device.into_device()?;
    let storage = device.resolve()?.rand_uniform::<T>(size, seed)?;
    tracing::debug!(size, %device, ?seed, "drew random vector");
    Ok(Vector::from_storage(storage))
}

/// Zeros with the length and device of `like`.
pub fn zeros_like<T: DType>(like: &Vector<T>) -> Result<Vector<T>> {
    zeros(like.len(), like.device())
}

/// Ones with the length and device of `like`.
pub fn ones_like<T: DType>(like: &Vector<T>) -> Result<Vector<T>> {
    ones(like.len(), like.device())
}

/// Random draws with the length and device of `like`.
pub fn rand_like<T: FloatDType>(like: &Vector<T>, seed: Option<u64>) -> Result<Vector<T>> {
    rand(like.len(), seed, like.device())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Device;

    #[test]
    fn seeded_rand_repeats() {
        let a = rand::<f64>(64, Some(7), Device::Cpu).unwrap();
        let b = rand::<f64>(64, Some(7), Device::Cpu).unwrap();
        assert_eq!(a.to_vec().unwrap(), b.to_vec().unwrap());
    }

    #[test]
    fn rand_stays_in_unit_interval() {
        let a = rand::<f32>(1000, None, "cpu").unwrap();
        assert!(a.to_vec().unwrap().iter().all(|x| (0.0..1.0).contains(x)));
    }
}
