//! Hardware identity seam for backend dispatch.
//!
//! Identity is resolved once per process by the host (driver probing is not
//! this crate's job) and consulted read-only through [`PlatformProbe`].

/// Read-only classification of the hardware this process runs on.
pub trait PlatformProbe: Send + Sync {
    /// True on the vendor GPU family that ships skinny-GEMM kernels.
    fn is_vendor_gpu(&self) -> bool;

    /// True on a general-purpose CPU host.
    fn is_cpu(&self) -> bool;

    /// Finer sub-family check gating the vendor fast paths. Only
    /// meaningful when `is_vendor_gpu()` is true.
    fn is_fast_path_family(&self) -> bool;

    /// Number of compute units reported by the device.
    fn compute_unit_count(&self) -> u32;
}

/// A fixed identity, for hosts that resolve the platform elsewhere and for
/// tests.
#[derive(Debug, Clone, Copy)]
pub struct StaticProbe {
    pub vendor_gpu: bool,
    pub cpu: bool,
    pub fast_path_family: bool,
    pub compute_units: u32,
}

impl StaticProbe {
    pub fn vendor_gpu(fast_path_family: bool, compute_units: u32) -> Self {
        Self {
            vendor_gpu: true,
            cpu: false,
            fast_path_family,
            compute_units,
        }
    }

    pub fn cpu() -> Self {
        Self {
            vendor_gpu: false,
            cpu: true,
            fast_path_family: false,
            compute_units: 0,
        }
    }

    /// An unrecognized device; the dispatcher treats it as default-GPU.
    pub fn generic() -> Self {
        Self {
            vendor_gpu: false,
            cpu: false,
            fast_path_family: false,
            compute_units: 0,
        }
    }
}

impl PlatformProbe for StaticProbe {
    fn is_vendor_gpu(&self) -> bool {
        self.vendor_gpu
    }

    fn is_cpu(&self) -> bool {
        self.cpu
    }

    fn is_fast_path_family(&self) -> bool {
        self.fast_path_family
    }

    fn compute_unit_count(&self) -> u32 {
        self.compute_units
    }
}
