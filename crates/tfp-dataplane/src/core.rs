//! Engine supervisor and the worker loop.

use std::sync::Arc;
use std::thread;

use crossbeam::queue::ArrayQueue;

use tfp_common::{cycle_counter, ConfigError, FastPathConfig, SharedState};

use crate::appif::AppQueues;
use crate::context::{CoreParts, DataplaneContext, FlowRefOf, Platform};
use crate::events::{EventSet, PollTimeout, WakeChannel};
use crate::nic::NetChannel;
use crate::qman::QueueManager;
use crate::stats::{add, CoreStats};

/// Engine errors, fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// `start` was called while workers are running.
    #[error("engine already running")]
    AlreadyRunning,

    /// Worker thread creation failed.
    #[error("failed to spawn worker: {0}")]
    SpawnFailed(String),

    /// A core's collaborators reported no application contexts.
    #[error("core {0} has no application contexts")]
    NoAppContexts(u32),

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Per-core handle kept by the supervisor: enough to wake the worker,
/// hand it flow states, and read its counters.
pub struct CoreHandle<P: Platform> {
    /// Wake channel into the worker's idle wait.
    pub wake: P::Wake,
    /// Producer side of the worker's forwarding ring.
    pub fwd: Arc<ArrayQueue<FlowRefOf<P>>>,
    /// The worker's counters.
    pub stats: Arc<CoreStats>,
}

/// Supervisor for a pool of dataplane workers.
///
/// Spawns one pinned OS thread per core, each running [`Worker::run`]
/// until shutdown. Shutdown is cooperative: `stop` raises the shared
/// exit flag, wakes every worker out of a possible idle wait, and joins.
pub struct FastPathEngine<P: Platform> {
    config: FastPathConfig,
    shared: Arc<SharedState>,
    cores: Vec<CoreHandle<P>>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl<P: Platform> FastPathEngine<P> {
    /// Create an engine. Fails on invalid configuration.
    pub fn new(config: FastPathConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let shared = Arc::new(SharedState::new(config.cores));
        Ok(Self {
            config,
            shared,
            cores: Vec::new(),
            workers: Vec::new(),
        })
    }

    /// Spawn the workers. `parts` is called once per core to produce its
    /// collaborator bindings.
    pub fn start<F>(&mut self, mut parts: F) -> Result<(), EngineError>
    where
        F: FnMut(u32) -> CoreParts<P>,
    {
        if !self.workers.is_empty() {
            return Err(EngineError::AlreadyRunning);
        }

        for id in 0..self.config.cores {
            let parts = parts(id);
            if parts.apps.count() == 0 {
                return Err(EngineError::NoAppContexts(id));
            }

            let fwd = Arc::new(ArrayQueue::new(self.config.fwd_ring_capacity));
            let stats = Arc::new(CoreStats::default());
            self.cores.push(CoreHandle {
                wake: parts.wake.clone(),
                fwd: fwd.clone(),
                stats: stats.clone(),
            });

            let ctx = DataplaneContext::new(
                id,
                parts,
                fwd,
                stats,
                self.shared.clone(),
                &self.config,
            );
            let pin = self.config.pin_threads;

            let handle = thread::Builder::new()
                .name(format!("tfp-worker-{id}"))
                .spawn(move || {
                    if pin {
                        pin_current_thread(id);
                    }
                    Worker::new(ctx).run();
                })
                .map_err(|e| EngineError::SpawnFailed(e.to_string()))?;
            self.workers.push(handle);
        }

        tracing::info!(cores = self.config.cores, "fast path engine started");
        Ok(())
    }

    /// Stop and join all workers.
    pub fn stop(&mut self) {
        if self.workers.is_empty() {
            return;
        }

        self.shared.request_exit();
        for core in &self.cores {
            core.wake.notify();
        }
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        self.cores.clear();
        tracing::info!("fast path engine stopped");
    }

    /// True while workers are running.
    pub fn is_running(&self) -> bool {
        !self.workers.is_empty()
    }

    /// Process-wide shared state.
    pub fn shared(&self) -> &Arc<SharedState> {
        &self.shared
    }

    /// Per-core handles (wake channels, forwarding producers, stats).
    pub fn cores(&self) -> &[CoreHandle<P>] {
        &self.cores
    }

    /// Hand a flow state to `core` and wake it. Fails with the state when
    /// the target's forwarding ring is full.
    pub fn forward_flow(&self, core: usize, state: FlowRefOf<P>) -> Result<(), FlowRefOf<P>> {
        let target = &self.cores[core];
        target.fwd.push(state)?;
        target.wake.notify();
        Ok(())
    }

    /// Request a fast-path scale to `to` cores; worker 0 applies it.
    pub fn request_scale(&self, to: u32) {
        self.shared.request_scale(to);
        if let Some(core0) = self.cores.first() {
            core0.wake.notify();
        }
    }

    /// Emit per-core counter triples through `tracing`.
    pub fn log_stats(&self) {
        for (core, handle) in self.cores.iter().enumerate() {
            let s = handle.stats.snapshot();
            tracing::info!(
                core,
                rx_poll = s.rx_poll,
                rx_empty = s.rx_empty,
                rx_total = s.rx_total,
                qm_poll = s.qm_poll,
                qm_empty = s.qm_empty,
                qm_total = s.qm_total,
                qs_poll = s.qs_poll,
                qs_empty = s.qs_empty,
                qs_total = s.qs_total,
                sp_poll = s.sp_poll,
                sp_empty = s.sp_empty,
                sp_total = s.sp_total,
                tx_poll = s.tx_poll,
                tx_empty = s.tx_empty,
                tx_total = s.tx_total,
                cyc_busy = s.cyc_busy,
                "dataplane core stats"
            );
        }
    }
}

impl<P: Platform> Drop for FastPathEngine<P> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(target_os = "linux")]
fn pin_current_thread(core: u32) {
    if core as usize >= libc::CPU_SETSIZE as usize {
        return;
    }
    unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut set);
        libc::CPU_SET(core as usize, &mut set);
        libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set);
    }
    tracing::debug!(core, "pinned worker thread");
}

#[cfg(not(target_os = "linux"))]
fn pin_current_thread(_core: u32) {}

/// One dataplane worker: a run-to-completion loop over its context.
pub struct Worker<P: Platform> {
    ctx: DataplaneContext<P>,
    was_idle: bool,
    startwait: u32,
    cyc: u64,
}

impl<P: Platform> Worker<P> {
    /// Wrap a context for running.
    pub fn new(ctx: DataplaneContext<P>) -> Self {
        Self {
            ctx,
            was_idle: true,
            startwait: 0,
            cyc: cycle_counter(),
        }
    }

    /// The worker's context, for wiring and inspection.
    pub fn context(&self) -> &DataplaneContext<P> {
        &self.ctx
    }

    /// Run until the shared exit flag is raised. Outstanding TX is not
    /// drained at shutdown; channel teardown reclaims frames.
    pub fn run(&mut self) {
        tracing::debug!(core = self.ctx.id, "worker entering dataplane loop");
        while !self.ctx.shared.is_exited() {
            self.iteration();
        }
        tracing::debug!(core = self.ctx.id, "worker exiting dataplane loop");
    }

    /// One loop iteration: poll every work source, flush TX, then handle
    /// idleness.
    ///
    /// A single timestamp from the queue manager covers the whole
    /// iteration so pacing, timeouts, and RX acknowledgements share one
    /// clock. The previous iteration's cycle delta is credited to the
    /// busy counter only if that iteration found work.
    pub fn iteration(&mut self) {
        let prev_cyc = self.cyc;
        self.cyc = cycle_counter();
        if !self.was_idle {
            add(&self.ctx.stats.cyc_busy, self.cyc.wrapping_sub(prev_cyc));
        }

        let ts = self.ctx.qman.timestamp(self.cyc);

        let mut n = 0usize;
        let rx = self.ctx.poll_rx(ts);
        n += rx;
        self.ctx.tx_flush();
        n += self.ctx.poll_qman_fwd(ts);
        n += self.ctx.poll_qman(ts);
        n += self.ctx.poll_queues(ts);
        n += self.ctx.poll_slowpath(ts);
        self.ctx.tx_flush();

        if self.ctx.id == 0 {
            self.poll_scale();
        }

        if n == 0 {
            self.was_idle = true;
            if self.startwait == 0 {
                self.startwait = ts;
            } else if self.ctx.interrupts
                && ts.wrapping_sub(self.startwait) >= self.ctx.poll_cycle
            {
                self.idle_wait(ts);
                self.startwait = 0;
            }
        } else {
            self.was_idle = false;
            self.startwait = 0;
        }

        #[cfg(debug_assertions)]
        {
            self.ctx.check_invariants();
            if rx > 0 {
                debug_assert!(self.ctx.arx.is_empty());
            }
        }
    }

    /// Arm the NIC RX interrupt and block until an interrupt, an
    /// inter-core wakeup, or the next queue-manager deadline. A device
    /// that is not running keeps us in polling mode.
    fn idle_wait(&mut self, now: u32) {
        if self.ctx.net.rx_interrupt_ctl(true).is_err() {
            return;
        }

        let timeout = match self.ctx.qman.next_ts(now) {
            None => PollTimeout::Infinite,
            Some(us) => PollTimeout::Millis(us / 1000),
        };
        self.ctx.events.wait(timeout);

        let _ = self.ctx.net.rx_interrupt_ctl(false);
    }

    /// Apply a pending scale request. Worker 0 only. Loss of NIC
    /// configuration is unrecoverable, so a failed transition takes the
    /// process down.
    fn poll_scale(&mut self) {
        let to = self.ctx.shared.scale_requested();
        if to == 0 {
            return;
        }

        let cur = self.ctx.shared.cores();
        tracing::info!(from = cur, to, "scaling fast path");
        if to < cur {
            if self.ctx.net.scale_down(cur, to).is_err() {
                tracing::error!(from = cur, to, "NIC scale-down failed");
                std::process::abort();
            }
        } else if to > cur {
            if self.ctx.net.scale_up(cur, to).is_err() {
                tracing::error!(from = cur, to, "NIC scale-up failed");
                std::process::abort();
            }
        } else {
            tracing::warn!(to, "scale request matches current core count");
        }

        self.ctx.shared.scale_applied(to);
    }
}
