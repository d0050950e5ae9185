//! Stub collaborators for unit tests.
//!
//! Frames carry a 32-bit tag in their first bytes so tests can follow
//! identity through the polls. Every stub records the calls it sees.

use std::collections::VecDeque;
use std::sync::Arc;

use crossbeam::queue::ArrayQueue;

use tfp_common::{FastPathConfig, SharedState};

use crate::appif::{AppQueues, ArxEvent, RxQueueFull};
use crate::buffer::{BufHandle, FramePool};
use crate::context::{CoreParts, DataplaneContext, Emit, Platform};
use crate::events::{EventSet, PollTimeout, WakeChannel};
use crate::flows::{FlowEngine, RxDisposition, TcpOpts};
use crate::nic::{NetChannel, NetError};
use crate::qman::QueueManager;
use crate::slowpath::{SlowPathAgent, SlowPathPoll};
use crate::stats::CoreStats;

pub(crate) fn tag_frame(frame: &mut BufHandle, tag: u32) {
    frame.buf_mut()[..4].copy_from_slice(&tag.to_ne_bytes());
    frame.set_offset(0);
    frame.set_len(64);
}

pub(crate) fn frame_tag(frame: &BufHandle) -> u32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&frame.payload()[..4]);
    u32::from_ne_bytes(b)
}

// ---------------------------------------------------------------------------
// NIC

pub(crate) struct StubNet {
    pub pool: FramePool,
    pub rx_queue: VecDeque<BufHandle>,
    pub rx_polls: usize,
    pub sent_tags: Vec<u32>,
    pub send_limit: Option<usize>,
    pub alloc_calls: usize,
    pub freed: usize,
    pub device_down: bool,
    pub irq_calls: Vec<bool>,
    pub scale_calls: Vec<(u32, u32)>,
}

impl StubNet {
    pub fn new(pool: FramePool) -> Self {
        Self {
            pool,
            rx_queue: VecDeque::new(),
            rx_polls: 0,
            sent_tags: Vec::new(),
            send_limit: None,
            alloc_calls: 0,
            freed: 0,
            device_down: false,
            irq_calls: Vec::new(),
            scale_calls: Vec::new(),
        }
    }
}

impl NetChannel for StubNet {
    fn poll(&mut self, max: usize, out: &mut Vec<BufHandle>) -> usize {
        self.rx_polls += 1;
        let n = max.min(self.rx_queue.len());
        for _ in 0..n {
            out.push(self.rx_queue.pop_front().expect("queued frame"));
        }
        n
    }

    fn send(&mut self, frames: &mut Vec<BufHandle>) -> usize {
        let n = match self.send_limit {
            Some(limit) => limit.min(frames.len()),
            None => frames.len(),
        };
        for frame in frames.drain(..n) {
            self.sent_tags.push(frame_tag(&frame));
            // TX completion returns the frame to the allocator.
            self.pool.free(frame);
        }
        n
    }

    fn alloc(&mut self, slots: &mut [Option<BufHandle>]) -> usize {
        self.alloc_calls += 1;
        let mut filled = 0;
        for slot in slots.iter_mut() {
            match self.pool.alloc() {
                Some(h) => {
                    debug_assert!(slot.is_none());
                    *slot = Some(h);
                    filled += 1;
                }
                None => break,
            }
        }
        filled
    }

    fn free(&mut self, frame: BufHandle) {
        self.freed += 1;
        self.pool.free(frame);
    }

    fn rx_interrupt_ctl(&mut self, enable: bool) -> Result<(), NetError> {
        self.irq_calls.push(enable);
        if self.device_down {
            return Err(NetError::DeviceDown);
        }
        Ok(())
    }

    fn scale_up(&mut self, from: u32, to: u32) -> Result<(), NetError> {
        self.scale_calls.push((from, to));
        Ok(())
    }

    fn scale_down(&mut self, from: u32, to: u32) -> Result<(), NetError> {
        self.scale_calls.push((from, to));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Queue manager

pub(crate) struct StubQman {
    pub clock: u32,
    pub deadline_us: Option<u32>,
    pub eligible: Vec<(u32, u16)>,
}

impl StubQman {
    fn new() -> Self {
        Self {
            clock: 0,
            deadline_us: None,
            eligible: Vec::new(),
        }
    }
}

impl QueueManager for StubQman {
    fn timestamp(&self, _cycles: u64) -> u32 {
        self.clock
    }

    fn poll(&mut self, max: usize, flow_ids: &mut [u32], bytes: &mut [u16]) -> usize {
        let n = max.min(self.eligible.len());
        for (i, (id, budget)) in self.eligible.drain(..n).enumerate() {
            flow_ids[i] = id;
            bytes[i] = budget;
        }
        n
    }

    fn next_ts(&mut self, _now: u32) -> Option<u32> {
        self.deadline_us
    }
}

// ---------------------------------------------------------------------------
// Flow machine

#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum RxBehavior {
    Free,
    Retain,
    SlowPath,
}

pub(crate) struct StubFlows {
    pub rx_behavior: RxBehavior,
    pub no_state_tags: Vec<u32>,
    pub arx_target: Option<usize>,
    pub seen_tags: Vec<u32>,
    pub segment_consume: bool,
    pub segmented: Vec<u32>,
    pub migrated: Vec<u32>,
}

impl StubFlows {
    fn new() -> Self {
        Self {
            rx_behavior: RxBehavior::Free,
            no_state_tags: Vec::new(),
            arx_target: None,
            seen_tags: Vec::new(),
            segment_consume: true,
            segmented: Vec::new(),
            migrated: Vec::new(),
        }
    }
}

impl FlowEngine for StubFlows {
    type FlowRef = u32;

    fn lookup(&mut self, frames: &[BufHandle], states: &mut Vec<Option<u32>>) {
        states.clear();
        for frame in frames {
            let tag = frame_tag(frame);
            if self.no_state_tags.contains(&tag) {
                states.push(None);
            } else {
                states.push(Some(tag));
            }
        }
    }

    fn parse(
        &mut self,
        frames: &[BufHandle],
        _states: &[Option<u32>],
        opts: &mut Vec<TcpOpts>,
    ) {
        opts.clear();
        opts.resize(frames.len(), TcpOpts::default());
    }

    fn packet(
        &mut self,
        emit: &mut Emit<'_>,
        frame: BufHandle,
        state: u32,
        _opts: &TcpOpts,
        _ts: u32,
    ) -> RxDisposition {
        self.seen_tags.push(state);
        if let Some(actx) = self.arx_target {
            emit.arx_push(
                actx,
                ArxEvent {
                    conn: state as u64,
                    rx_bump: frame.len() as u32,
                    ..Default::default()
                },
            );
        }
        match self.rx_behavior {
            RxBehavior::Free => RxDisposition::Free(frame),
            RxBehavior::Retain => {
                emit.stage_tx(frame);
                RxDisposition::Retained
            }
            RxBehavior::SlowPath => RxDisposition::SlowPath(frame),
        }
    }

    fn prefetch_states(&mut self, _flow_ids: &[u32]) {}

    fn prefetch_bufs(&mut self, _flow_ids: &[u32]) {}

    fn segment(
        &mut self,
        emit: &mut Emit<'_>,
        flow_id: u32,
        mut frame: BufHandle,
        _ts: u32,
    ) -> Option<BufHandle> {
        self.segmented.push(flow_id);
        if self.segment_consume {
            tag_frame(&mut frame, flow_id);
            emit.stage_tx(frame);
            None
        } else {
            Some(frame)
        }
    }

    fn migrate(&mut self, state: u32) {
        self.migrated.push(state);
    }
}

// ---------------------------------------------------------------------------
// Application contexts

pub(crate) struct StubApps {
    pub pending: Vec<VecDeque<u64>>,
    pub bumped: Vec<u64>,
    pub bump_fail: bool,
    pub probes: Vec<usize>,
    pub prefetches: Vec<usize>,
    pub kicks: Vec<(usize, u32)>,
    pub arx_fail: bool,
    pub arx_written: Vec<(usize, ArxEvent)>,
    next_slot: usize,
}

impl StubApps {
    pub fn new(contexts: usize) -> Self {
        Self {
            pending: vec![VecDeque::new(); contexts],
            bumped: Vec::new(),
            bump_fail: false,
            probes: Vec::new(),
            prefetches: Vec::new(),
            kicks: Vec::new(),
            arx_fail: false,
            arx_written: Vec::new(),
            next_slot: 0,
        }
    }
}

impl AppQueues for StubApps {
    type Desc = u64;
    type ArxSlot = usize;

    fn count(&self) -> usize {
        self.pending.len()
    }

    fn prefetch(&mut self, actx: usize) {
        self.prefetches.push(actx);
    }

    fn fetch(&mut self, actx: usize) -> Option<u64> {
        self.pending[actx].pop_front()
    }

    fn bump(
        &mut self,
        emit: &mut Emit<'_>,
        desc: u64,
        mut frame: BufHandle,
        _ts: u32,
    ) -> Option<BufHandle> {
        if self.bump_fail {
            return Some(frame);
        }
        self.bumped.push(desc);
        tag_frame(&mut frame, desc as u32);
        emit.stage_tx(frame);
        None
    }

    fn rxq_probe(&mut self, actx: usize) {
        self.probes.push(actx);
    }

    fn arx_reserve(&mut self, _actx: usize) -> Result<usize, RxQueueFull> {
        if self.arx_fail {
            return Err(RxQueueFull);
        }
        let slot = self.next_slot;
        self.next_slot += 1;
        Ok(slot)
    }

    fn arx_prefetch(&mut self, _slots: &[usize]) {}

    fn arx_write(&mut self, slot: usize, event: ArxEvent) {
        self.arx_written.push((slot, event));
    }

    fn kick(&mut self, actx: usize, ts: u32) {
        self.kicks.push((actx, ts));
    }
}

// ---------------------------------------------------------------------------
// Slow path

pub(crate) struct StubSlow {
    pub pending: usize,
    pub produce_packets: bool,
    pub polled: usize,
    pub rx_tags: Vec<u32>,
}

impl StubSlow {
    fn new() -> Self {
        Self {
            pending: 0,
            produce_packets: true,
            polled: 0,
            rx_tags: Vec::new(),
        }
    }
}

impl SlowPathAgent for StubSlow {
    fn poll(&mut self, emit: &mut Emit<'_>, mut frame: BufHandle, _ts: u32) -> SlowPathPoll {
        self.polled += 1;
        if self.pending == 0 {
            return SlowPathPoll::Stop(frame);
        }
        self.pending -= 1;
        if self.produce_packets {
            tag_frame(&mut frame, 0xdead);
            emit.stage_tx(frame);
            SlowPathPoll::Consumed
        } else {
            SlowPathPoll::Skip(frame)
        }
    }

    fn packet(&mut self, frame: BufHandle) {
        self.rx_tags.push(frame_tag(&frame));
        // The agent owns the frame now; recycling is its teardown's job.
        std::mem::forget(frame);
    }
}

// ---------------------------------------------------------------------------
// Events

pub(crate) struct StubEvents {
    pub waits: Vec<PollTimeout>,
}

impl EventSet for StubEvents {
    fn wait(&mut self, timeout: PollTimeout) -> usize {
        self.waits.push(timeout);
        0
    }
}

#[derive(Clone)]
pub(crate) struct StubWake(pub Arc<std::sync::atomic::AtomicU64>);

impl WakeChannel for StubWake {
    fn notify(&self) {
        self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// Assembly

pub(crate) struct StubPlatform;

impl Platform for StubPlatform {
    type Net = StubNet;
    type Qman = StubQman;
    type Flows = StubFlows;
    type Apps = StubApps;
    type Slow = StubSlow;
    type Events = StubEvents;
    type Wake = StubWake;
}

pub(crate) fn stub_parts(contexts: usize) -> CoreParts<StubPlatform> {
    CoreParts {
        net: StubNet::new(FramePool::new(2048)),
        qman: StubQman::new(),
        flows: StubFlows::new(),
        apps: StubApps::new(contexts),
        slow: StubSlow::new(),
        events: StubEvents { waits: Vec::new() },
        wake: StubWake(Arc::new(std::sync::atomic::AtomicU64::new(0))),
    }
}

pub(crate) fn stub_config() -> FastPathConfig {
    FastPathConfig {
        cores: 2,
        cores_max: 8,
        interrupts: true,
        poll_cycle: 100,
        fwd_ring_capacity: 1024,
        pin_threads: false,
    }
}

pub(crate) fn stub_ctx_with(core: u32, contexts: usize) -> DataplaneContext<StubPlatform> {
    let config = stub_config();
    DataplaneContext::new(
        core,
        stub_parts(contexts),
        Arc::new(ArrayQueue::new(config.fwd_ring_capacity)),
        Arc::new(CoreStats::default()),
        Arc::new(SharedState::new(config.cores)),
        &config,
    )
}

/// Worker-0 context with two application contexts.
pub(crate) fn stub_ctx() -> DataplaneContext<StubPlatform> {
    stub_ctx_with(0, 2)
}

pub(crate) fn stub_ctx_for_core(core: u32) -> DataplaneContext<StubPlatform> {
    stub_ctx_with(core, 2)
}

pub(crate) fn stub_ctx_with_appctx(contexts: usize) -> DataplaneContext<StubPlatform> {
    stub_ctx_with(0, contexts)
}

/// Queue `n` tagged frames for the next RX poll.
pub(crate) fn push_rx_frames(ctx: &mut DataplaneContext<StubPlatform>, n: usize) {
    for i in 0..n {
        let mut frame = ctx.net.pool.alloc().expect("pool frame");
        tag_frame(&mut frame, i as u32);
        ctx.net.rx_queue.push_back(frame);
    }
}

/// Fill the TX stage with `n` placeholder frames.
pub(crate) fn fill_tx(ctx: &mut DataplaneContext<StubPlatform>, n: usize) {
    for i in 0..n {
        let mut frame = ctx.net.pool.alloc().expect("pool frame");
        tag_frame(&mut frame, 0xf000 + i as u32);
        ctx.tx.stage(frame);
    }
}
