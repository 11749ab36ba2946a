//! Batched sampling penalties and hardware-dispatched GEMM for LLM
//! inference backends.
//!
//! Two independent components, no shared state:
//!
//! - [`penalties`]: per-sequence token histograms over a generated batch,
//!   and in-place presence / frequency / repetition penalty application to
//!   a `[num_seqs, vocab_size]` logits matrix.
//! - [`gemm`]: a once-per-process choice among dense-GEMM strategies
//!   (vendor skinny kernels, packed-weight CPU kernel, faer dense
//!   fallback), driven by a hardware-identity oracle the host supplies.

pub mod gemm;
pub mod penalties;
pub mod platform;
pub mod tensor;
pub mod utils;

// Re-export commonly used items
pub use crate::{
    gemm::{
        gemm_shape_only, resolved_gemm_backend, select_gemm_backend, GemmBackend, GemmFlags,
        KernelTable, LayerGemmConfig, PackedLinearKernel, VendorKernels,
    },
    penalties::{apply_penalties, token_bin_counts},
    platform::{PlatformProbe, StaticProbe},
    tensor::{DType, TypedTensor},
};
