use cudarc::{
    driver::{
        CudaContext, CudaFunction, CudaModule, CudaSlice, CudaStream, DriverError, LaunchConfig,
        PushKernelArg,
    },
    nvrtc::{CompileOptions, Ptx},
};
use error::{CudaError, WrapErr, WrapLoadErr};
use std::{
    borrow::Cow,
    collections::{HashMap, VecDeque},
    fs,
    path::Path,
    sync::{Arc, Mutex, RwLock},
};

use crate::{
    cpu_storage::CpuStorage,
    ops::{BinaryOpType, BitwiseOpType},
    storage::{BackendDevice, BackendStorage},
    Context, DType, Error, FloatDType, IntDType, Result,
};

pub(crate) mod error;

/// Environment variable selecting the CUDA ordinal used for the `cuda` placement.
pub const ORDINAL_ENV: &str = "DUOVEC_CUDA_ORDINAL";

const MAX_CACHED_KERNELS: usize = 128;
const REDUCE_BLOCK: u32 = 256;
const MAX_REDUCE_BLOCKS: usize = 1024;

fn ordinal() -> Result<usize> {
    match std::env::var(ORDINAL_ENV) {
        Ok(raw) => raw
            .trim()
            .parse::<usize>()
            .with_context(|| format!("parsing {ORDINAL_ENV}={raw}")),
        Err(_) => Ok(0),
    }
}

/// Query the driver for usable devices.
///
/// Any driver failure means "unavailable". Only configuration errors such as
/// a malformed ordinal are returned as errors.
pub(crate) fn probe() -> Result<bool> {
    #[allow(unused_unsafe)]
    let present = unsafe { cudarc::driver::sys::is_culib_present() };
    if !present {
        tracing::debug!("cuda driver library not found");
        return Ok(false);
    }
    let count = cudarc::driver::result::init()
        .and_then(|_| cudarc::driver::result::device::get_count());
    Ok(has_ordinal(count, ordinal()?))
}

fn has_ordinal(count: std::result::Result<i32, DriverError>, ordinal: usize) -> bool {
    match count {
        Ok(count) => usize::try_from(count).is_ok_and(|count| count > ordinal),
        Err(err) => {
            tracing::debug!(%err, "cuda driver reported no usable device");
            false
        }
    }
}

static SHARED: Mutex<Option<CudaDevice>> = Mutex::new(None);

#[derive(Clone)]
pub struct CudaDevice {
    ordinal: usize,
    context: Arc<CudaContext>,
    stream: Arc<CudaStream>,
    modules: Arc<RwLock<HashMap<String, Arc<CudaModule>>>>,
    module_cache_order: Arc<Mutex<VecDeque<String>>>,
}

impl CudaDevice {
    pub(crate) fn new(ordinal: usize) -> Result<Self> {
        let context = CudaContext::new(ordinal).w()?;
        let stream = context.default_stream();
        Ok(Self {
            ordinal,
            context,
            stream,
            modules: Arc::new(RwLock::new(HashMap::new())),
            module_cache_order: Arc::new(Mutex::new(VecDeque::new())),
        })
    }

    /// The process-wide device for the configured ordinal, created on first use.
    pub(crate) fn shared() -> Result<Self> {
        let mut shared = SHARED
            .lock()
            .map_err(|_| Error::msg("cuda device cache is poisoned"))?;
        if let Some(device) = shared.as_ref() {
            return Ok(device.clone());
        }
        let device = Self::new(ordinal()?)?;
        *shared = Some(device.clone());
        Ok(device)
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub(crate) fn stream(&self) -> Arc<CudaStream> {
        self.stream.clone()
    }

    fn cached_func(&self, function_name: &str) -> Result<Option<CudaFunction>> {
        let modules = self
            .modules
            .read()
            .map_err(|_| Error::msg("cuda module cache is poisoned"))?;
        match modules.get(function_name) {
            Some(module) => {
                tracing::trace!(function_name, "kernel cache hit");
                Ok(Some(module.load_function(function_name).w_load(function_name)?))
            }
            None => Ok(None),
        }
    }

    fn load_func(&self, function_name: &str, ptx: Ptx) -> Result<CudaFunction> {
        let module = self.context.load_module(ptx).w_load(function_name)?;
        let func = module.load_function(function_name).w_load(function_name)?;
        let mut modules = self
            .modules
            .write()
            .map_err(|_| Error::msg("cuda module cache is poisoned"))?;
        let mut order = self
            .module_cache_order
            .lock()
            .map_err(|_| Error::msg("cuda module cache is poisoned"))?;
        modules.insert(function_name.to_string(), module);
        order.push_back(function_name.to_string());
        if order.len() > MAX_CACHED_KERNELS {
            if let Some(old) = order.pop_front() {
                modules.remove(&old);
            }
        }
        Ok(func)
    }

    /// Compile `body` (a full kernel definition named `function_name`) for
    /// element type `T`, or fetch it from the module cache.
    fn kernel<T: DType>(&self, function_name: &str, body: &str) -> Result<CudaFunction> {
        if let Some(func) = self.cached_func(function_name)? {
            return Ok(func);
        }
        let helpers = if T::INTEGRAL {
            INT_HELPERS
        } else {
            FLOAT_HELPERS
        };
        let source = format!(
            r#"
            typedef unsigned char uint8_t;
            typedef unsigned int uint32_t;
            typedef long long int int64_t;
            typedef {} T;
            {helpers}
            {body}
            "#,
            T::C_NAME,
        );
        tracing::trace!(function_name, "compiling kernel");
        let ptx = compile_ptx(source)?;
        dump_ptx(function_name, &ptx)?;
        self.load_func(function_name, ptx)
    }

    fn alloc<T: DType>(&self, len: usize) -> Result<CudaSlice<T>> {
        self.stream.alloc_zeros::<T>(len).w()
    }

    fn wrap<T: DType>(&self, slice: CudaSlice<T>) -> CudaStorage<T> {
        CudaStorage {
            slice,
            device: self.clone(),
        }
    }
}

const INT_HELPERS: &str = r#"
__device__ T floordiv_int(T a, T b) {
    if (b == 0) return 0;
    T q = a / b;
    if (a % b != 0 && ((a < 0) != (b < 0))) q -= 1;
    return q;
}

__device__ T mod_int(T a, T b) {
    if (b == 0) return 0;
    T r = a % b;
    if (r != 0 && ((r < 0) != (b < 0))) r += b;
    return r;
}

__device__ T pow_int(T base, T exp) {
    if (exp < 0) return (T)pow((double)base, (double)exp);
    T r = 1;
    while (exp > 0) {
        if (exp & 1) r *= base;
        base *= base;
        exp >>= 1;
    }
    return r;
}
"#;

const FLOAT_HELPERS: &str = r#"
__device__ T floordiv_float(T a, T b) {
    if (b == 0) return a / b;
    T m = fmod(a, b);
    T d = (a - m) / b;
    if (m != 0 && ((b < 0) != (m < 0))) d -= 1;
    if (d == 0) return copysign((T)0, a / b);
    T f = floor(d);
    if (d - f > (T)0.5) f += 1;
    return f;
}

__device__ T mod_float(T a, T b) {
    T r = fmod(a, b);
    if (r != 0 && ((r < 0) != (b < 0))) r += b;
    return r;
}
"#;

/// How the two sides of an elementwise kernel are loaded.
#[derive(Clone, Copy)]
enum Operands {
    /// `lhs[i] op rhs[i]`
    Buffers,
    /// `lhs[i] op rhs`
    ScalarRhs,
    /// `lhs op rhs[i]`
    ScalarLhs,
}

impl Operands {
    fn tag(self) -> &'static str {
        match self {
            Self::Buffers => "vv",
            Self::ScalarRhs => "vs",
            Self::ScalarLhs => "sv",
        }
    }

    fn kernel_source(self, function_name: &str, expr: &str) -> String {
        let (lhs_param, rhs_param, a, b) = match self {
            Self::Buffers => ("const T *lhs", "const T *rhs", "lhs[i]", "rhs[i]"),
            Self::ScalarRhs => ("const T *lhs", "const T rhs", "lhs[i]", "rhs"),
            Self::ScalarLhs => ("const T lhs", "const T *rhs", "lhs", "rhs[i]"),
        };
        format!(
            r#"
            extern "C" __global__ void {function_name}({lhs_param}, {rhs_param}, T *out, const size_t numel) {{
                for (size_t i = blockIdx.x * blockDim.x + threadIdx.x; i < numel;
                    i += blockDim.x * gridDim.x) {{
                    T a = {a};
                    T b = {b};
                    out[i] = {expr};
                }}
            }}
            "#
        )
    }
}

fn map_source(function_name: &str, expr: &str) -> String {
    format!(
        r#"
        extern "C" __global__ void {function_name}(const T *inp, T *out, const size_t numel) {{
            for (size_t i = blockIdx.x * blockDim.x + threadIdx.x; i < numel;
                i += blockDim.x * gridDim.x) {{
                out[i] = {expr};
            }}
        }}
        "#
    )
}

/// Block reduction of `lhs[i] * rhs[i]` into one partial sum per block,
/// accumulated in `Acc`.
fn dot_source(function_name: &str, acc: &str) -> String {
    format!(
        r#"
        extern "C" __global__ void {function_name}(const T *lhs, const T *rhs, {acc} *partial, const size_t numel) {{
            extern __shared__ __align__(sizeof(double)) unsigned char shared_raw[];
            {acc} *shared = reinterpret_cast<{acc} *>(shared_raw);
            {acc} sum = 0;
            for (size_t i = blockIdx.x * blockDim.x + threadIdx.x; i < numel;
                i += blockDim.x * gridDim.x) {{
                sum += ({acc})lhs[i] * ({acc})rhs[i];
            }}
            shared[threadIdx.x] = sum;
            __syncthreads();
            for (unsigned int s = blockDim.x / 2; s > 0; s >>= 1) {{
                if (threadIdx.x < s) shared[threadIdx.x] += shared[threadIdx.x + s];
                __syncthreads();
            }}
            if (threadIdx.x == 0) partial[blockIdx.x] = shared[0];
        }}
        "#
    )
}

fn isclose_source(function_name: &str) -> String {
    format!(
        r#"
        extern "C" __global__ void {function_name}(const T *lhs, const T *rhs, uint8_t *flags, const double rtol, const double atol, const size_t numel) {{
            for (size_t i = blockIdx.x * blockDim.x + threadIdx.x; i < numel;
                i += blockDim.x * gridDim.x) {{
                double a = (double)lhs[i];
                double b = (double)rhs[i];
                flags[i] = (a == b || fabs(a - b) <= atol + rtol * fabs(b)) ? 1 : 0;
            }}
        }}
        "#
    )
}

fn compile_ptx(source: String) -> Result<Ptx> {
    // No fast math: pow/fmod/floor must match the host results.
    cudarc::nvrtc::compile_ptx_with_opts(source, CompileOptions::default())
        .map_err(|err| CudaError::PtxCompileError { err }.into())
}

/// Write the PTX under `~/.cache/duovec/ptx` so generated kernels can be inspected.
fn dump_ptx(function_name: &str, ptx: &Ptx) -> Result<()> {
    if let Some(home) = dirs::home_dir() {
        let path = format!("{}/.cache/duovec/ptx/{function_name}.ptx", home.display());
        let path = Path::new(&path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, ptx.to_src())?;
    }
    Ok(())
}

fn check_len(op: &'static str, lhs: usize, rhs: usize) -> Result<()> {
    if lhs != rhs {
        return Err(Error::LengthMismatch { op, lhs, rhs });
    }
    Ok(())
}

pub struct CudaStorage<T: DType> {
    slice: CudaSlice<T>,
    device: CudaDevice,
}

impl<T: DType> CudaStorage<T> {
    pub(crate) fn try_clone(&self) -> Result<Self> {
        Ok(self.device.wrap(self.slice.try_clone().w()?))
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.slice.len() {
            return Err(Error::IndexOutOfBounds {
                index,
                len: self.slice.len(),
            });
        }
        Ok(())
    }

    /// Run an elementwise kernel whose sides are loaded according to `operands`.
    fn launch_elementwise(
        &self,
        function_name: &str,
        expr: &str,
        operands: Operands,
        other: Elementwise<'_, T>,
    ) -> Result<Self> {
        let n = self.slice.len();
        let out = self.device.alloc::<T>(n)?;
        if n == 0 {
            return Ok(self.device.wrap(out));
        }
        let func = self
            .device
            .kernel::<T>(function_name, &operands.kernel_source(function_name, expr))?;
        let stream = self.device.stream();
        let mut builder = stream.launch_builder(&func);
        match (operands, &other) {
            (Operands::Buffers, Elementwise::Buffer(rhs)) => {
                builder.arg(&self.slice);
                builder.arg(*rhs);
            }
            (Operands::ScalarRhs, Elementwise::Scalar(rhs)) => {
                builder.arg(&self.slice);
                builder.arg(rhs);
            }
            (Operands::ScalarLhs, Elementwise::Scalar(lhs)) => {
                builder.arg(lhs);
                builder.arg(&self.slice);
            }
            _ => crate::bail!("elementwise kernel {function_name} launched with mismatched operands"),
        }
        let mut out = out;
        builder.arg(&mut out);
        builder.arg(&n);
        let cfg = LaunchConfig::for_num_elems(n as u32);
        unsafe { builder.launch(cfg).w()? };
        Ok(self.device.wrap(out))
    }

    fn launch_map(&self, function_name: &str, expr: &str) -> Result<Self> {
        let n = self.slice.len();
        let mut out = self.device.alloc::<T>(n)?;
        if n == 0 {
            return Ok(self.device.wrap(out));
        }
        let func = self
            .device
            .kernel::<T>(function_name, &map_source(function_name, expr))?;
        let stream = self.device.stream();
        let mut builder = stream.launch_builder(&func);
        builder.arg(&self.slice);
        builder.arg(&mut out);
        builder.arg(&n);
        let cfg = LaunchConfig::for_num_elems(n as u32);
        unsafe { builder.launch(cfg).w()? };
        Ok(self.device.wrap(out))
    }

    /// Launch the dot reduction accumulating in `A` (C type `acc`) and
    /// download the per-block partial sums.
    fn reduce_dot<A: DType>(&self, rhs: &Self, function_name: &str, acc: &str) -> Result<Vec<A>> {
        check_len("@", self.slice.len(), rhs.slice.len())?;
        let n = self.slice.len();
        if n == 0 {
            return Ok(Vec::new());
        }
        let func = self
            .device
            .kernel::<T>(function_name, &dot_source(function_name, acc))?;
        let blocks = n.div_ceil(REDUCE_BLOCK as usize).min(MAX_REDUCE_BLOCKS);
        let mut partial = self.device.alloc::<A>(blocks)?;
        let stream = self.device.stream();
        let mut builder = stream.launch_builder(&func);
        builder.arg(&self.slice);
        builder.arg(&rhs.slice);
        builder.arg(&mut partial);
        builder.arg(&n);
        let cfg = LaunchConfig {
            grid_dim: (blocks as u32, 1, 1),
            block_dim: (REDUCE_BLOCK, 1, 1),
            shared_mem_bytes: REDUCE_BLOCK * std::mem::size_of::<A>() as u32,
        };
        unsafe { builder.launch(cfg).w()? };
        stream.memcpy_dtov(&partial).w()
    }
}

enum Elementwise<'a, T: DType> {
    Buffer(&'a CudaSlice<T>),
    Scalar(T),
}

impl<T: DType> BackendStorage<T> for CudaStorage<T> {
    fn len(&self) -> usize {
        self.slice.len()
    }

    fn to_cpu_storage(&self) -> Result<Cow<'_, CpuStorage<T>>> {
        let data = self.device.stream().memcpy_dtov(&self.slice).w()?;
        Ok(Cow::Owned(CpuStorage(data)))
    }

    fn get(&self, index: usize) -> Result<T> {
        self.check_index(index)?;
        let view = self.slice.slice(index..index + 1);
        let data = self.device.stream().memcpy_dtov(&view).w()?;
        data.first()
            .copied()
            .ok_or_else(|| Error::msg(format!("empty read at index {index}")))
    }

    fn set(&mut self, index: usize, value: T) -> Result<()> {
        self.check_index(index)?;
        let stream = self.device.stream();
        let mut view = self.slice.slice_mut(index..index + 1);
        stream
            .memcpy_htod(std::slice::from_ref(&value), &mut view)
            .w()?;
        stream.synchronize().w()
    }

    fn binary_op(&self, rhs: &Self, op: BinaryOpType) -> Result<Self> {
        check_len(op.symbol(), self.slice.len(), rhs.slice.len())?;
        let operands = Operands::Buffers;
        let name = format!("binary_{op:?}_{}_{}", operands.tag(), T::NAME).to_lowercase();
        self.launch_elementwise(
            &name,
            op.as_c_expr(T::INTEGRAL),
            operands,
            Elementwise::Buffer(&rhs.slice),
        )
    }

    fn binary_op_scalar(&self, rhs: T, op: BinaryOpType) -> Result<Self> {
        let operands = Operands::ScalarRhs;
        let name = format!("binary_{op:?}_{}_{}", operands.tag(), T::NAME).to_lowercase();
        self.launch_elementwise(
            &name,
            op.as_c_expr(T::INTEGRAL),
            operands,
            Elementwise::Scalar(rhs),
        )
    }

    fn binary_op_scalar_lhs(&self, lhs: T, op: BinaryOpType) -> Result<Self> {
        let operands = Operands::ScalarLhs;
        let name = format!("binary_{op:?}_{}_{}", operands.tag(), T::NAME).to_lowercase();
        self.launch_elementwise(
            &name,
            op.as_c_expr(T::INTEGRAL),
            operands,
            Elementwise::Scalar(lhs),
        )
    }

    fn dot(&self, rhs: &Self) -> Result<T> {
        let partial = self.reduce_dot::<T>(rhs, &format!("dot_{}", T::NAME), "T")?;
        Ok(partial.into_iter().fold(T::ZERO, |acc, x| acc.add(x)))
    }

    fn dot_f64(&self, rhs: &Self) -> Result<f64> {
        let partial = self.reduce_dot::<f64>(rhs, &format!("dot_f64_{}", T::NAME), "double")?;
        Ok(partial.into_iter().sum())
    }

    fn reverse(&self) -> Result<Self> {
        self.launch_map(&format!("reverse_{}", T::NAME), "inp[numel - 1 - i]")
    }

    fn allclose(&self, rhs: &Self, rtol: f64, atol: f64) -> Result<bool> {
        check_len("allclose", self.slice.len(), rhs.slice.len())?;
        let n = self.slice.len();
        if n == 0 {
            return Ok(true);
        }
        let name = format!("isclose_{}", T::NAME);
        let func = self.device.kernel::<T>(&name, &isclose_source(&name))?;
        let stream = self.device.stream();
        let mut flags = stream.alloc_zeros::<u8>(n).w()?;
        let mut builder = stream.launch_builder(&func);
        builder.arg(&self.slice);
        builder.arg(&rhs.slice);
        builder.arg(&mut flags);
        builder.arg(&rtol);
        builder.arg(&atol);
        builder.arg(&n);
        let cfg = LaunchConfig::for_num_elems(n as u32);
        unsafe { builder.launch(cfg).w()? };
        let flags = stream.memcpy_dtov(&flags).w()?;
        Ok(flags.into_iter().all(|f| f == 1))
    }

    fn bitwise_op(&self, rhs: &Self, op: BitwiseOpType) -> Result<Self>
    where
        T: IntDType,
    {
        check_len(op.symbol(), self.slice.len(), rhs.slice.len())?;
        let operands = Operands::Buffers;
        let name = format!("bitwise_{op:?}_{}_{}", operands.tag(), T::NAME).to_lowercase();
        self.launch_elementwise(
            &name,
            op.as_c_expr(),
            operands,
            Elementwise::Buffer(&rhs.slice),
        )
    }

    fn bitwise_op_scalar(&self, rhs: T, op: BitwiseOpType) -> Result<Self>
    where
        T: IntDType,
    {
        let operands = Operands::ScalarRhs;
        let name = format!("bitwise_{op:?}_{}_{}", operands.tag(), T::NAME).to_lowercase();
        self.launch_elementwise(&name, op.as_c_expr(), operands, Elementwise::Scalar(rhs))
    }

    fn invert(&self) -> Result<Self>
    where
        T: IntDType,
    {
        self.launch_map(&format!("invert_{}", T::NAME), "~inp[i]")
    }
}

impl BackendDevice for CudaDevice {
    type Storage<X: DType> = CudaStorage<X>;

    fn storage_from_slice<T: DType>(&self, data: &[T]) -> Result<Self::Storage<T>> {
        let slice = self.stream.memcpy_stod(data).w()?;
        Ok(self.wrap(slice))
    }

    fn rand_uniform<T: FloatDType>(
        &self,
        len: usize,
        seed: Option<u64>,
    ) -> Result<Self::Storage<T>> {
        let seed = seed.unwrap_or_else(rand::random);
        let rng = cudarc::curand::CudaRng::new(seed, self.stream()).w()?;
        let mut slice = self.alloc::<T>(len)?;
        T::cuda_fill_with_uniform(&rng, &mut slice)?;
        Ok(self.wrap(slice))
    }
}

#[cfg(test)]
mod tests {
    use cudarc::driver::sys::CUresult;

    use super::*;

    #[test]
    fn any_driver_error_means_unavailable() {
        for code in [
            CUresult::CUDA_ERROR_NO_DEVICE,
            CUresult::CUDA_ERROR_UNKNOWN,
            CUresult::CUDA_ERROR_OPERATING_SYSTEM,
            CUresult::CUDA_ERROR_NOT_INITIALIZED,
        ] {
            assert!(!has_ordinal(Err(DriverError(code)), 0));
        }
    }

    #[test]
    fn ordinal_must_be_below_the_device_count() {
        assert!(has_ordinal(Ok(1), 0));
        assert!(!has_ordinal(Ok(1), 1));
        assert!(!has_ordinal(Ok(0), 0));
        assert!(!has_ordinal(Ok(-1), 0));
    }
}
