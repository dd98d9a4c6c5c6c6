//! Duovec provides fixed-length numeric vectors that live either in host memory or on a CUDA device.
//!
//! Every vector carries its placement. Arithmetic, bitwise, and reduction operations run where the
//! data lives, and operations between two vectors on different placements are rejected instead of
//! silently copying data. Moving a vector is always explicit, through [`Vector::change_device`].
//!
//! The CUDA placement is compiled in with the `cuda` feature. Kernels are generated per operation and
//! element type, compiled with NVRTC on first use, and cached for the rest of the process. Without
//! the feature, or on a machine without a usable device, asking for `"cuda"` fails with
//! [`Error::DeviceUnavailable`].
//!
//! ## A quick guide
//! - Build vectors with [`Vector::new`] or the factories: [`vector`], [`zeros`], [`ones`], [`rand`].
//! - Combine them with the methods on [`Vector`] or with `+ - * / %` on references. Every operation
//!   returns a [`Result`].
//! - Comparisons order vectors by their Euclidean norm, not componentwise.
//! - Bitwise operators are available for integer element types and return the raw [`Storage`].
//!
//! ## What can you do with it?
//! ```
//! use duovec_core::{ones, Vector};
//!
//! let a = Vector::new(&[3.0f64, 4.0], "cpu").unwrap();
//! let b = ones::<f64>(2, "cpu").unwrap();
//!
//! let c = (&a + &b).unwrap();
//! assert_eq!(c.to_vec().unwrap(), vec![4.0, 5.0]);
//!
//! assert_eq!(a.dot(&b).unwrap(), 7.0);
//! assert_eq!(a.norm().unwrap(), 5.0);
//! assert_eq!(a.to_string(), "<vector size=2 device=cpu>");
//! ```

mod cpu_storage;
#[cfg(feature = "cuda")]
mod cuda_backend;
mod device;
mod dtype;
mod error;
mod init;
mod ops;
mod storage;
mod vector;

pub use cpu_storage::CpuStorage;
#[cfg(feature = "cuda")]
pub use cuda_backend::{CudaStorage, ORDINAL_ENV};
pub use device::{is_accelerator_available, Device, IntoDevice};
pub use dtype::{DType, DTypeOps, FloatDType, IntDType, RandDispatch};
pub use error::{Context, Error, Result};
pub use init::{ones, ones_like, rand, rand_like, vector, zeros, zeros_like};
pub use ops::{BinaryOpType, BitwiseOpType, Operand};
pub use storage::Storage;
pub use vector::{Vector, PARALLEL_ATOL, PARALLEL_RTOL};
