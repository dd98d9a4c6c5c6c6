//! Placements and the accelerator availability probe.

use std::{fmt, str::FromStr};

#[cfg(feature = "cuda")]
use crate::cuda_backend::CudaDevice;
use crate::{
    cpu_storage::CpuDevice,
    storage::{BackendDevice, Storage},
    DType, Error, FloatDType, Result,
};

/// Where a vector's buffer lives.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Device {
    /// Host memory. Always available.
    #[default]
    Cpu,
    /// Memory of the CUDA device selected by `DUOVEC_CUDA_ORDINAL` (0 by default).
    Cuda,
}

impl Device {
    /// Canonical lowercase name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Cuda => "cuda",
        }
    }

    /// Fail with [`Error::DeviceUnavailable`] unless this placement can be used right now.
    pub fn ensure_available(self) -> Result<()> {
        match self {
            Self::Cpu => Ok(()),
            Self::Cuda => {
                if is_accelerator_available()? {
                    Ok(())
                } else {
                    Err(self.unavailable())
                }
            }
        }
    }

    fn unavailable(self) -> Error {
        Error::DeviceUnavailable {
            device: self.name().to_string(),
        }
    }

    /// Check availability and obtain the backend handle for this placement.
    pub(crate) fn resolve(self) -> Result<Backend> {
        match self {
            Self::Cpu => Ok(Backend::Cpu(CpuDevice)),
            Self::Cuda => {
                self.ensure_available()?;
                #[cfg(feature = "cuda")]
                {
                    let cuda = CudaDevice::shared()?;
                    tracing::debug!(ordinal = cuda.ordinal(), "resolved cuda backend");
                    Ok(Backend::Cuda(cuda))
                }
                #[cfg(not(feature = "cuda"))]
                {
                    Err(self.unavailable())
                }
            }
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Device {
    type Err = Error;

    /// Device names are case-insensitive.
    fn from_str(s: &str) -> Result<Self> {
        let device = s.to_lowercase();
        match device.as_str() {
            "cpu" => Ok(Self::Cpu),
            "cuda" => Ok(Self::Cuda),
            _ => Err(Error::UnsupportedDevice { device }),
        }
    }
}

/// Anything that names a placement: a [`Device`] or its (case-insensitive) name.
pub trait IntoDevice {
    fn into_device(self) -> Result<Device>;
}

impl IntoDevice for Device {
    fn into_device(self) -> Result<Device> {
        Ok(self)
    }
}

impl IntoDevice for &str {
    fn into_device(self) -> Result<Device> {
        self.parse()
    }
}

impl IntoDevice for String {
    fn into_device(self) -> Result<Device> {
        self.parse()
    }
}

impl IntoDevice for &String {
    fn into_device(self) -> Result<Device> {
        self.parse()
    }
}

/// Whether the accelerator can be used right now.
///
/// `Ok(false)` covers a missing driver library and any driver error from the
/// device query. Only a malformed `DUOVEC_CUDA_ORDINAL` is returned as an
/// error. Without the `cuda` feature this is always `Ok(false)`.
pub fn is_accelerator_available() -> Result<bool> {
    #[cfg(feature = "cuda")]
    let available = crate::cuda_backend::probe()?;
    #[cfg(not(feature = "cuda"))]
    let available = false;

    tracing::debug!(available, "probed accelerator");
    Ok(available)
}

/// A live backend for one placement.
#[derive(Clone)]
pub(crate) enum Backend {
    Cpu(CpuDevice),
    #[cfg(feature = "cuda")]
    Cuda(CudaDevice),
}

impl Backend {
    pub(crate) fn storage_from_slice<T: DType>(&self, data: &[T]) -> Result<Storage<T>> {
        match self {
            Self::Cpu(cpu) => Ok(Storage::Cpu(cpu.storage_from_slice(data)?)),
            #[cfg(feature = "cuda")]
            Self::Cuda(cuda) => Ok(Storage::Cuda(cuda.storage_from_slice(data)?)),
        }
    }

    pub(crate) fn rand_uniform<T: FloatDType>(
        &self,
        len: usize,
        seed: Option<u64>,
    ) -> Result<Storage<T>> {
        match self {
            Self::Cpu(cpu) => Ok(Storage::Cpu(cpu.rand_uniform(len, seed)?)),
            #[cfg(feature = "cuda")]
            Self::Cuda(cuda) => Ok(Storage::Cuda(cuda.rand_uniform(len, seed)?)),
        }
    }
}
