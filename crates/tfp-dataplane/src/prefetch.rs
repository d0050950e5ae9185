//! Cache-line prefetch helpers.
//!
//! The RX and QMan polls issue prefetch sweeps over whole batches before
//! touching any single frame; the interleaving hides DMA-to-L1 latency
//! across the pipeline and is load-bearing for latency, not an
//! optimization. On targets without a prefetch instruction these compile
//! to nothing.

/// One cache line, in bytes.
pub const CACHE_LINE: usize = 64;

/// Hint that `ptr` will be read soon.
#[inline(always)]
pub fn prefetch_read<T>(ptr: *const T) {
    #[cfg(target_arch = "x86_64")]
    unsafe {
        use std::arch::x86_64::{_mm_prefetch, _MM_HINT_T0};
        _mm_prefetch(ptr as *const i8, _MM_HINT_T0);
    }

    #[cfg(not(target_arch = "x86_64"))]
    let _ = ptr;
}

/// Hint that the cache line `line` lines past `ptr` will be read soon.
#[inline(always)]
pub fn prefetch_line(ptr: *const u8, line: usize) {
    prefetch_read(ptr.wrapping_add(line * CACHE_LINE));
}
