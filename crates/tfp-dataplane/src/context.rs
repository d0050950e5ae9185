//! The per-core dataplane context.

use std::sync::Arc;

use crossbeam::queue::ArrayQueue;

use tfp_common::{FastPathConfig, SharedState};

use crate::appif::{AppQueues, ArxEvent};
use crate::bufcache::BufCache;
use crate::buffer::BufHandle;
use crate::events::{EventSet, WakeChannel};
use crate::flows::{FlowEngine, TcpOpts};
use crate::nic::NetChannel;
use crate::qman::QueueManager;
use crate::slowpath::SlowPathAgent;
use crate::stats::CoreStats;
use crate::tx::TxStage;
use crate::BATCH_SIZE;

/// The collaborator bundle a dataplane worker is built against.
///
/// Production bindings implement these against the real NIC driver, queue
/// manager, flow machine, application shared-memory rings, and slow-path
/// agent; tests plug in stubs. The loop itself is identical either way.
pub trait Platform: 'static {
    /// NIC channel.
    type Net: NetChannel + Send + 'static;
    /// Queue manager.
    type Qman: QueueManager + Send + 'static;
    /// TCP flow machine.
    type Flows: FlowEngine + Send + 'static;
    /// Application-context queues.
    type Apps: AppQueues + Send + 'static;
    /// Slow-path agent.
    type Slow: SlowPathAgent + Send + 'static;
    /// Idle event-set.
    type Events: EventSet + Send + 'static;
    /// Cross-core wakeup channel.
    type Wake: WakeChannel;
}

/// Flow-state reference type of a platform's flow machine.
pub type FlowRefOf<P> = <<P as Platform>::Flows as FlowEngine>::FlowRef;

/// Collaborator instances for one core, produced by the caller's factory
/// when the engine starts.
pub struct CoreParts<P: Platform> {
    /// NIC channel for this core.
    pub net: P::Net,
    /// Queue manager for this core.
    pub qman: P::Qman,
    /// Flow machine binding for this core.
    pub flows: P::Flows,
    /// Application contexts multiplexed onto this core.
    pub apps: P::Apps,
    /// Slow-path agent channel for this core.
    pub slow: P::Slow,
    /// Idle event-set wired to the NIC interrupt and the wake channel.
    pub events: P::Events,
    /// Wake channel paired with `events`.
    pub wake: P::Wake,
}

/// Coalesced application-visible RX events awaiting flush.
pub(crate) struct ArxCache {
    entries: Vec<(usize, ArxEvent)>,
}

impl ArxCache {
    fn new() -> Self {
        Self {
            entries: Vec::with_capacity(BATCH_SIZE),
        }
    }

    #[inline]
    pub(crate) fn push(&mut self, actx: usize, event: ArxEvent) {
        debug_assert!(self.entries.len() < BATCH_SIZE);
        self.entries.push((actx, event));
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub(crate) fn entries(&self) -> &[(usize, ArxEvent)] {
        &self.entries
    }

    #[inline]
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    #[cfg(test)]
    pub(crate) fn new_for_test() -> Self {
        Self::new()
    }
}

/// Effect handle passed into collaborator callbacks.
///
/// Callbacks stage output frames and application RX events through this
/// instead of touching the context, which keeps every frame-handle
/// transfer an explicit move and the context borrows disjoint.
pub struct Emit<'a> {
    tx: &'a mut TxStage,
    arx: &'a mut ArxCache,
}

impl<'a> Emit<'a> {
    pub(crate) fn new(tx: &'a mut TxStage, arx: &'a mut ArxCache) -> Self {
        Self { tx, arx }
    }

    /// Stage a frame for transmission this iteration.
    #[inline]
    pub fn stage_tx(&mut self, frame: BufHandle) {
        self.tx.stage(frame);
    }

    /// Slots left in the TX stage.
    #[inline]
    pub fn tx_room(&self) -> usize {
        self.tx.room()
    }

    /// Record an application-visible RX event for context `actx`,
    /// delivered at the next ARX flush in insertion order.
    #[inline]
    pub fn arx_push(&mut self, actx: usize, event: ArxEvent) {
        self.arx.push(actx, event);
    }
}

/// Per-core state aggregate, owned by exactly one worker thread.
pub struct DataplaneContext<P: Platform> {
    /// Worker index, `0 <= id < cores_max`.
    pub id: u32,
    /// NIC channel.
    pub net: P::Net,
    /// Queue manager.
    pub qman: P::Qman,
    /// Flow machine.
    pub flows: P::Flows,
    /// Application contexts.
    pub apps: P::Apps,
    /// Slow-path agent.
    pub slow: P::Slow,
    /// Idle event-set.
    pub events: P::Events,

    pub(crate) fwd_ring: Arc<ArrayQueue<FlowRefOf<P>>>,
    pub(crate) tx: TxStage,
    pub(crate) bufcache: BufCache,
    pub(crate) arx: ArxCache,
    pub(crate) poll_next_ctx: usize,
    pub(crate) interrupts: bool,
    pub(crate) poll_cycle: u32,
    pub(crate) shared: Arc<SharedState>,
    pub(crate) stats: Arc<CoreStats>,

    // Scratch, allocated once so the fast path never does.
    pub(crate) q_ids: [u32; BATCH_SIZE],
    pub(crate) q_bytes: [u16; BATCH_SIZE],
    pub(crate) rx_frames: Vec<BufHandle>,
    pub(crate) rx_states: Vec<Option<FlowRefOf<P>>>,
    pub(crate) rx_opts: Vec<TcpOpts>,
    pub(crate) rx_free: Vec<BufHandle>,
    pub(crate) fetched: Vec<<P::Apps as AppQueues>::Desc>,
    pub(crate) arx_slots: Vec<<P::Apps as AppQueues>::ArxSlot>,
}

impl<P: Platform> DataplaneContext<P> {
    /// Assemble a context from its collaborators.
    ///
    /// The round-robin cursor starts at `id` so workers disperse over the
    /// application contexts instead of all hammering context 0.
    pub fn new(
        id: u32,
        parts: CoreParts<P>,
        fwd_ring: Arc<ArrayQueue<FlowRefOf<P>>>,
        stats: Arc<CoreStats>,
        shared: Arc<SharedState>,
        config: &FastPathConfig,
    ) -> Self {
        let appctx_num = parts.apps.count();
        debug_assert!(appctx_num > 0);

        Self {
            id,
            net: parts.net,
            qman: parts.qman,
            flows: parts.flows,
            apps: parts.apps,
            slow: parts.slow,
            events: parts.events,
            fwd_ring,
            tx: TxStage::new(),
            bufcache: BufCache::new(),
            arx: ArxCache::new(),
            poll_next_ctx: id as usize % appctx_num,
            interrupts: config.interrupts,
            poll_cycle: config.poll_cycle,
            shared,
            stats,
            q_ids: [0; BATCH_SIZE],
            q_bytes: [0; BATCH_SIZE],
            rx_frames: Vec::with_capacity(BATCH_SIZE),
            rx_states: Vec::with_capacity(BATCH_SIZE),
            rx_opts: Vec::with_capacity(BATCH_SIZE),
            rx_free: Vec::with_capacity(BATCH_SIZE),
            fetched: Vec::with_capacity(BATCH_SIZE),
            arx_slots: Vec::with_capacity(BATCH_SIZE),
        }
    }

    /// This worker's counters.
    pub fn stats(&self) -> &CoreStats {
        &self.stats
    }

    /// Flush staged TX frames to the NIC.
    #[inline]
    pub(crate) fn tx_flush(&mut self) {
        self.tx.flush(&mut self.net, &self.stats);
    }

    /// Invariants that must hold between iterations.
    #[cfg(debug_assertions)]
    pub(crate) fn check_invariants(&self) {
        debug_assert!(self.tx.len() <= crate::TXBUF_SIZE);
        debug_assert!(self.bufcache.len() <= crate::BUFCACHE_SIZE);
        debug_assert!(self.arx.len() <= BATCH_SIZE);
        debug_assert!(self.poll_next_ctx < self.apps.count());
    }
}
