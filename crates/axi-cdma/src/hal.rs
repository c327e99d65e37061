//! Platform hooks the driver depends on.
//!
//! The driver never touches caches or clocks itself; the platform
//! supplies both through [`Hal`]. On a cache-coherent host (and in the
//! tests against the simulated block) `dcache_range` is a no-op.

use core::time::Duration;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOp {
    /// Write back to memory
    Clean,
    /// Invalidate cache
    Invalidate,
    /// Clean and invalidate
    CleanAndInvalidate,
}

pub trait Hal {
    /// Perform a data-cache maintenance operation over `[addr, addr + size)`.
    ///
    /// Must be synchronous: when it returns, the operation is complete as
    /// observed by bus masters.
    fn dcache_range(op: CacheOp, addr: usize, size: usize);

    /// Monotonic time since boot, used to bound busy-waits.
    fn since_boot() -> Duration;
}
