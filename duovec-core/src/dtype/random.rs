#[cfg(feature = "cuda")]
use {
    crate::{cuda_backend::error::WrapErr, Result},
    cudarc::{curand::CudaRng, driver::CudaSlice},
};

/// Dispatch uniform random fills on the accelerator based on the data type.
///
/// Only floating point types can be drawn, which is why this trait is a
/// supertrait of [`crate::FloatDType`] rather than of every dtype.
pub trait RandDispatch {
    /// Fill the slice with uniform random values in `(0, 1]` on the GPU.
    #[cfg(feature = "cuda")]
    fn cuda_fill_with_uniform(rng: &CudaRng, slice: &mut CudaSlice<Self>) -> Result<()>
    where
        Self: Sized;
}

macro_rules! rand_dispatch {
    ($t:ident) => {
        impl RandDispatch for $t {
            #[cfg(feature = "cuda")]
            fn cuda_fill_with_uniform(rng: &CudaRng, slice: &mut CudaSlice<Self>) -> Result<()> {
                rng.fill_with_uniform(slice).w()
            }
        }
    };
}

rand_dispatch!(f32);
rand_dispatch!(f64);
