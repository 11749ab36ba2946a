//! Runtime-dispatched dense GEMM.
//!
//! One backend is selected per process from the hardware identity and
//! reused for every call: the vendor GPU family routes narrow-batch shapes
//! to dedicated skinny kernels, CPU hosts can route to a packed-weight
//! kernel, and everything else takes the faer dense path. Fast paths are
//! optional accelerations — any unmet precondition falls back to the dense
//! strategy silently.

use std::sync::{Arc, OnceLock};

use anyhow::Result;
use ndarray::Array1;

use crate::platform::PlatformProbe;
use crate::tensor::TypedTensor;
use crate::utils::linear_algebra::dense_linear;

/// Largest inner dimension the single-token kernel handles.
const SINGLE_TOKEN_MAX_K: usize = 8192;
/// Replica factor handed to the single-token kernel.
const SINGLE_TOKEN_REPLICAS: u32 = 4;

/// Vendor GPU kernel entry points, registered by the host. The dispatcher
/// treats these as opaque; it only picks which one to call.
pub trait VendorKernels: Send + Sync {
    /// Split-K skinny GEMM for `M > 8` and `1 <= N <= 4`.
    fn split_k(
        &self,
        weight: &TypedTensor,
        x: &TypedTensor,
        compute_units: u32,
    ) -> Result<TypedTensor>;

    /// Single-token GEMM for `N == 1`, `M % 4 == 0`, small K.
    fn single_token(
        &self,
        weight: &TypedTensor,
        x: &TypedTensor,
        replicas: u32,
    ) -> Result<TypedTensor>;
}

/// Packed-weight CPU linear kernel, registered by the host. Weight packing
/// happens out of band; this crate only trusts the per-layer flag.
pub trait PackedLinearKernel: Send + Sync {
    fn forward(
        &self,
        x: &TypedTensor,
        weight: &TypedTensor,
        bias: Option<&Array1<f32>>,
        transpose: bool,
    ) -> Result<TypedTensor>;
}

/// The native kernels available to the dispatcher. Entries are optional; a
/// missing entry simply disables its fast path.
#[derive(Default, Clone)]
pub struct KernelTable {
    pub vendor: Option<Arc<dyn VendorKernels>>,
    pub packed_linear: Option<Arc<dyn PackedLinearKernel>>,
}

/// Externally configured dispatch flags.
#[derive(Debug, Clone, Copy)]
pub struct GemmFlags {
    /// Enables the vendor skinny-GEMM fast paths.
    pub use_fast_paths: bool,
}

impl Default for GemmFlags {
    fn default() -> Self {
        Self {
            use_fast_paths: true,
        }
    }
}

impl GemmFlags {
    /// Reads flags from the environment. `SKORUN_USE_SKINNY_GEMM=0` (or
    /// `false`) disables the vendor fast paths; anything else leaves them
    /// on.
    pub fn from_env() -> Self {
        let use_fast_paths = match std::env::var("SKORUN_USE_SKINNY_GEMM") {
            Ok(v) => !matches!(v.trim(), "0" | "false" | "False"),
            Err(_) => true,
        };
        Self { use_fast_paths }
    }
}

/// Per-layer knobs consulted at call time.
#[derive(Debug, Clone, Copy, Default)]
pub struct LayerGemmConfig {
    /// Route this layer through the packed-weight CPU kernel. Only
    /// meaningful when the CPU backend was selected and the kernel is
    /// registered.
    pub use_packed_cpu: bool,
}

/// Vendor fast-path strategy: skinny kernels under narrow shape/dtype
/// constraints, dense otherwise.
pub struct VendorGemm {
    kernels: Option<Arc<dyn VendorKernels>>,
    use_fast_paths: bool,
    fast_path_family: bool,
    compute_units: u32,
}

impl VendorGemm {
    fn gemm(
        &self,
        x: &TypedTensor,
        weight: &TypedTensor,
        bias: Option<&Array1<f32>>,
    ) -> Result<TypedTensor> {
        if let Some(out) = self.try_fast_path(x, weight, bias)? {
            return Ok(out);
        }
        dense_linear(x, weight, bias)
    }

    /// Returns `None` whenever any fast-path precondition is unmet; the
    /// caller then takes the dense path. Shape errors surface from the
    /// dense path, not from here.
    fn try_fast_path(
        &self,
        x: &TypedTensor,
        weight: &TypedTensor,
        bias: Option<&Array1<f32>>,
    ) -> Result<Option<TypedTensor>> {
        let kernels = match &self.kernels {
            Some(k) => k,
            None => return Ok(None),
        };
        let w_shape = weight.shape();
        if w_shape.len() != 2 {
            return Ok(None);
        }
        let (m, k) = (w_shape[0], w_shape[1]);

        let eligible = self.use_fast_paths
            && self.fast_path_family
            && x.dtype().is_half_precision()
            && k % 8 == 0
            && bias.is_none();
        if !eligible {
            return Ok(None);
        }

        let x_shape = x.shape();
        if x_shape.last() != Some(&k) {
            return Ok(None);
        }
        let n: usize = x_shape[..x_shape.len() - 1].iter().product();

        let mut out_shape = x_shape[..x_shape.len() - 1].to_vec();
        out_shape.push(m);

        if m > 8 && n >= 1 && n <= 4 {
            let x_2d = x.reshaped(&[n, k])?;
            let out = kernels.split_k(weight, &x_2d, self.compute_units)?;
            return Ok(Some(out.reshaped(&out_shape)?));
        }
        if m % 4 == 0 && n == 1 && k <= SINGLE_TOKEN_MAX_K {
            let x_2d = x.reshaped(&[n, k])?;
            let out = kernels.single_token(weight, &x_2d, SINGLE_TOKEN_REPLICAS)?;
            return Ok(Some(out.reshaped(&out_shape)?));
        }
        Ok(None)
    }
}

/// CPU strategy: a two-way switch between the packed-weight kernel and the
/// dense path, driven by the per-layer flag.
pub struct CpuGemm {
    packed: Option<Arc<dyn PackedLinearKernel>>,
}

impl CpuGemm {
    fn gemm(
        &self,
        layer: &LayerGemmConfig,
        x: &TypedTensor,
        weight: &TypedTensor,
        bias: Option<&Array1<f32>>,
    ) -> Result<TypedTensor> {
        if layer.use_packed_cpu {
            if let Some(packed) = &self.packed {
                return packed.forward(x, weight, bias, true);
            }
        }
        dense_linear(x, weight, bias)
    }
}

/// The resolved GEMM strategy. Selected once per process, stateless per
/// invocation.
pub enum GemmBackend {
    VendorFastPath(VendorGemm),
    CpuPacked(CpuGemm),
    Default,
}

impl GemmBackend {
    /// `y = x W^T (+ b)`. Output has shape `x.shape[:-1] + [out_features]`
    /// and the same dtype as `x`. Kernel failures propagate unchanged.
    pub fn gemm(
        &self,
        layer: &LayerGemmConfig,
        x: &TypedTensor,
        weight: &TypedTensor,
        bias: Option<&Array1<f32>>,
    ) -> Result<TypedTensor> {
        match self {
            GemmBackend::VendorFastPath(v) => v.gemm(x, weight, bias),
            GemmBackend::CpuPacked(c) => c.gemm(layer, x, weight, bias),
            GemmBackend::Default => dense_linear(x, weight, bias),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            GemmBackend::VendorFastPath(_) => "vendor_fast_path",
            GemmBackend::CpuPacked(_) => "cpu",
            GemmBackend::Default => "default",
        }
    }
}

/// Shape-inference stand-in for the GEMM contract: allocates a
/// correctly-shaped output without invoking any kernel. For traced or
/// graph-captured execution that needs output shapes with no side effects.
pub fn gemm_shape_only(x: &TypedTensor, weight: &TypedTensor) -> TypedTensor {
    let x_shape = x.shape();
    let mut out_shape = x_shape[..x_shape.len().saturating_sub(1)].to_vec();
    out_shape.push(weight.shape()[0]);
    TypedTensor::zeros(x.dtype(), &out_shape)
}

/// Picks the GEMM strategy for the given hardware identity. Pure: the same
/// inputs always select the same backend, and selection itself cannot fail
/// because the dense strategy is a universal fallback.
pub fn select_gemm_backend(
    probe: &dyn PlatformProbe,
    flags: &GemmFlags,
    kernels: KernelTable,
) -> GemmBackend {
    if probe.is_vendor_gpu() {
        let backend = GemmBackend::VendorFastPath(VendorGemm {
            kernels: kernels.vendor,
            use_fast_paths: flags.use_fast_paths,
            fast_path_family: probe.is_fast_path_family(),
            compute_units: probe.compute_unit_count(),
        });
        log::debug!(
            "gemm backend: vendor fast path (fast_paths={}, sub_family={}, cu={})",
            flags.use_fast_paths,
            probe.is_fast_path_family(),
            probe.compute_unit_count()
        );
        backend
    } else if probe.is_cpu() {
        log::debug!(
            "gemm backend: cpu (packed kernel registered: {})",
            kernels.packed_linear.is_some()
        );
        GemmBackend::CpuPacked(CpuGemm {
            packed: kernels.packed_linear,
        })
    } else {
        log::debug!("gemm backend: default dense");
        GemmBackend::Default
    }
}

static RESOLVED_BACKEND: OnceLock<GemmBackend> = OnceLock::new();

/// Resolves the backend once per process and reuses it afterwards.
/// Hardware identity is static, so racing initializers compute the same
/// answer and only the first is kept.
pub fn resolved_gemm_backend(
    probe: &dyn PlatformProbe,
    flags: &GemmFlags,
    kernels: KernelTable,
) -> &'static GemmBackend {
    RESOLVED_BACKEND.get_or_init(|| select_gemm_backend(probe, flags, kernels))
}
