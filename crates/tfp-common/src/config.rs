//! Fast-path configuration.

use serde::{Deserialize, Serialize};

/// Configuration consumed by the dataplane workers.
///
/// Parsing (files, flags, environment) happens elsewhere; this struct is the
/// validated form handed to the engine before any worker starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FastPathConfig {
    /// Number of worker cores to start with.
    pub cores: u32,
    /// Upper bound on worker cores; scale requests above this are invalid.
    pub cores_max: u32,
    /// Enable the interrupt-armed idle wait.
    pub interrupts: bool,
    /// Consecutive idle time (timestamp units) before a worker arms
    /// interrupts and blocks.
    pub poll_cycle: u32,
    /// Capacity of each per-core flow forwarding ring. Must be a power of
    /// two.
    pub fwd_ring_capacity: usize,
    /// Pin each worker thread to its core index.
    pub pin_threads: bool,
}

impl Default for FastPathConfig {
    fn default() -> Self {
        Self {
            cores: available_cores().min(32),
            cores_max: 32,
            interrupts: true,
            poll_cycle: 10_000,
            fwd_ring_capacity: 32 * 1024,
            pin_threads: true,
        }
    }
}

fn available_cores() -> u32 {
    std::thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(4)
}

impl FastPathConfig {
    /// Check the invariants the dataplane relies on. Called once at engine
    /// construction; failures are fatal at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cores == 0 || self.cores > self.cores_max {
            return Err(ConfigError::CoreCount {
                got: self.cores,
                max: self.cores_max,
            });
        }
        if !self.fwd_ring_capacity.is_power_of_two() {
            return Err(ConfigError::FwdRingCapacity(self.fwd_ring_capacity));
        }
        if self.interrupts && self.poll_cycle == 0 {
            return Err(ConfigError::PollCycle);
        }
        Ok(())
    }
}

/// Configuration errors, fatal at startup.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Core count out of range.
    #[error("worker core count must be in 1..={max} (got {got})")]
    CoreCount {
        /// Requested core count.
        got: u32,
        /// Configured maximum.
        max: u32,
    },

    /// Forwarding ring capacity is not a power of two.
    #[error("forwarding ring capacity must be a power of two (got {0})")]
    FwdRingCapacity(usize),

    /// Idle threshold unusable with interrupts enabled.
    #[error("poll cycle must be nonzero when interrupts are enabled")]
    PollCycle,
}
