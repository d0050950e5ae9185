//! RX pipeline.
//!
//! The receive path is staged over the whole batch rather than per frame:
//! prefetch the first line of every frame, bulk flow lookup, prefetch the
//! second line (TCP options land there), bulk parse, then dispatch. The
//! interleaving keeps DMA-to-L1 misses overlapped across the batch and
//! must be preserved.

use crate::appif::AppQueues;
use crate::context::{DataplaneContext, Emit, Platform};
use crate::flows::{FlowEngine, RxDisposition};
use crate::nic::NetChannel;
use crate::prefetch::{prefetch_line, prefetch_read};
use crate::slowpath::SlowPathAgent;
use crate::stats::add;
use crate::BATCH_SIZE;

impl<P: Platform> DataplaneContext<P> {
    /// Receive one batch from the NIC and run the fast path over it.
    ///
    /// The batch is bounded by TX-stage room so acknowledgements and
    /// responses generated during dispatch always have space; with no
    /// room the poll is a no-op and the NIC is not touched.
    pub(crate) fn poll_rx(&mut self, ts: u32) -> usize {
        let max = BATCH_SIZE.min(self.tx.room());
        if max == 0 {
            return 0;
        }

        add(&self.stats.rx_poll, 1);

        debug_assert!(self.rx_frames.is_empty());
        let n = self.net.poll(max, &mut self.rx_frames);
        if n == 0 {
            add(&self.stats.rx_empty, 1);
            return 0;
        }
        add(&self.stats.rx_total, n as u64);

        for frame in &self.rx_frames {
            prefetch_read(frame.as_ptr());
        }

        self.flows.lookup(&self.rx_frames, &mut self.rx_states);
        debug_assert_eq!(self.rx_states.len(), n);

        for frame in &self.rx_frames {
            prefetch_line(frame.as_ptr(), 1);
        }

        self.flows
            .parse(&self.rx_frames, &self.rx_states, &mut self.rx_opts);
        debug_assert_eq!(self.rx_opts.len(), n);

        // Dispatch in NIC-delivery order. Frames the fast path consumed
        // are freed only after the ARX flush below.
        let mut emit = Emit::new(&mut self.tx, &mut self.arx);
        for (i, frame) in self.rx_frames.drain(..).enumerate() {
            match self.rx_states[i] {
                Some(state) => {
                    match self.flows.packet(&mut emit, frame, state, &self.rx_opts[i], ts) {
                        RxDisposition::Free(frame) => self.rx_free.push(frame),
                        RxDisposition::Retained => {}
                        RxDisposition::SlowPath(frame) => self.slow.packet(frame),
                    }
                }
                None => self.slow.packet(frame),
            }
        }

        arx_cache_flush(&mut self.apps, &mut self.arx, &mut self.arx_slots, ts);

        for frame in self.rx_free.drain(..) {
            self.bufcache.free(frame, &mut self.net);
        }

        n
    }
}

/// Flush the coalesced ARX cache into the target application RX rings.
///
/// One slot is reserved per record up front; the copies then land as a
/// prefetched, memory-level-parallel burst, and each affected context is
/// kicked with the iteration timestamp. A failed reservation aborts the
/// worker: there is no backpressure protocol across this boundary.
pub(crate) fn arx_cache_flush<A: AppQueues>(
    apps: &mut A,
    arx: &mut crate::context::ArxCache,
    slots: &mut Vec<A::ArxSlot>,
    ts: u32,
) {
    if arx.is_empty() {
        return;
    }

    debug_assert!(slots.is_empty());
    for &(actx, _) in arx.entries() {
        match apps.arx_reserve(actx) {
            Ok(slot) => slots.push(slot),
            Err(e) => {
                tracing::error!(actx, error = %e, "application RX queue overflow");
                panic!("application RX queue overflow on context {actx}");
            }
        }
    }

    apps.arx_prefetch(slots);

    for (slot, &(_, event)) in slots.drain(..).zip(arx.entries().iter()) {
        apps.arx_write(slot, event);
    }

    for &(actx, _) in arx.entries() {
        apps.kick(actx, ts);
    }

    arx.clear();
}
