//! Cycle counter access.

/// Read the CPU cycle counter.
///
/// Used only for busy-time accounting and for deriving the per-iteration
/// timestamp; never compared across cores. On non-x86 targets this falls
/// back to a monotonic nanosecond clock.
#[inline(always)]
pub fn cycle_counter() -> u64 {
    #[cfg(target_arch = "x86_64")]
    unsafe {
        core::arch::x86_64::_rdtsc()
    }

    #[cfg(not(target_arch = "x86_64"))]
    {
        use std::sync::OnceLock;
        use std::time::Instant;

        static BASE: OnceLock<Instant> = OnceLock::new();
        BASE.get_or_init(Instant::now).elapsed().as_nanos() as u64
    }
}
