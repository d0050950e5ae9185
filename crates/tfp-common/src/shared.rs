//! Process-wide state shared between the supervisor and the workers.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// State every dataplane worker can see.
///
/// Writer discipline:
/// - `exited` is written once, by the supervisor, to stop all workers.
/// - `cores_cur` is set by the supervisor before workers start and
///   thereafter updated only by worker 0 when it applies a scale request.
/// - `scale_to` is written by a control channel and consumed (cleared) by
///   worker 0 only. Zero means no request pending.
#[derive(Debug)]
pub struct SharedState {
    exited: AtomicBool,
    cores_cur: AtomicU32,
    scale_to: AtomicU32,
}

impl SharedState {
    /// Create shared state for an initial core count.
    pub fn new(cores: u32) -> Self {
        Self {
            exited: AtomicBool::new(false),
            cores_cur: AtomicU32::new(cores),
            scale_to: AtomicU32::new(0),
        }
    }

    /// True once shutdown has been requested. Checked at the top of every
    /// loop iteration; cancellation is cooperative.
    #[inline(always)]
    pub fn is_exited(&self) -> bool {
        self.exited.load(Ordering::Relaxed)
    }

    /// Request shutdown of all workers.
    pub fn request_exit(&self) {
        self.exited.store(true, Ordering::Release);
    }

    /// Current number of active fast-path cores.
    #[inline]
    pub fn cores(&self) -> u32 {
        self.cores_cur.load(Ordering::Acquire)
    }

    /// Publish a scale request. Consumed by worker 0.
    pub fn request_scale(&self, to: u32) {
        self.scale_to.store(to, Ordering::Release);
    }

    /// Pending scale request, zero if none. Worker 0 only.
    #[inline]
    pub fn scale_requested(&self) -> u32 {
        self.scale_to.load(Ordering::Acquire)
    }

    /// Publish the new core count and clear the request. Worker 0 only.
    pub fn scale_applied(&self, cores: u32) {
        self.cores_cur.store(cores, Ordering::Release);
        self.scale_to.store(0, Ordering::Release);
    }
}
