//! Queue-manager interface and the polls fed by it.
//!
//! The queue manager is this core's egress scheduler: it paces flows
//! against rate and deadline policies and, when polled, names the flows
//! that are eligible to transmit. Its internals (timewheel, rate tables)
//! are not modeled here.

use crate::context::{DataplaneContext, Emit, Platform};
use crate::flows::FlowEngine;
use crate::prefetch::{prefetch_line, prefetch_read};
use crate::stats::add;
use crate::BATCH_SIZE;

/// Per-core egress scheduler.
pub trait QueueManager {
    /// Convert a raw cycle count into the scheduler's timestamp units.
    /// The whole iteration uses one such value so pacing, timeouts, and RX
    /// acknowledgements share a clock.
    fn timestamp(&self, cycles: u64) -> u32;

    /// Fill `flow_ids` and `bytes` with up to `max` flows eligible to send
    /// and their byte budgets. Returns the number of flows written.
    fn poll(&mut self, max: usize, flow_ids: &mut [u32], bytes: &mut [u16]) -> usize;

    /// Microseconds until the next scheduled event at `now`, or `None` if
    /// nothing is scheduled.
    fn next_ts(&mut self, now: u32) -> Option<u32>;
}

impl<P: Platform> DataplaneContext<P> {
    /// Ask the queue manager which flows may send and emit their segments.
    ///
    /// Buffer handles are pre-reserved before the scheduler is consulted;
    /// only the handles actually consumed by segment production are
    /// committed.
    pub(crate) fn poll_qman(&mut self, ts: u32) -> usize {
        let max = BATCH_SIZE.min(self.tx.room());
        if max == 0 {
            return 0;
        }

        add(&self.stats.qm_poll, 1);

        let mut res = self.bufcache.prealloc(max, &mut self.net);
        let max = res.len();

        let n = self
            .qman
            .poll(max, &mut self.q_ids[..max], &mut self.q_bytes[..max]);
        if n == 0 {
            add(&self.stats.qm_empty, 1);
            return 0;
        }
        add(&self.stats.qm_total, n as u64);

        // Two sweeps over the handle headers, then one over packet memory.
        for i in 0..n {
            prefetch_read(res.peek(i).frame_ptr());
        }
        for i in 0..n {
            prefetch_line(res.peek(i).frame_ptr() as *const u8, 1);
        }
        for i in 0..n {
            prefetch_read(res.peek(i).as_ptr());
        }

        self.flows.prefetch_states(&self.q_ids[..n]);
        self.flows.prefetch_bufs(&self.q_ids[..n]);

        let mut emit = Emit::new(&mut self.tx, &mut self.arx);
        for i in 0..n {
            let Some(frame) = res.take() else { break };
            if let Some(unused) = self.flows.segment(&mut emit, self.q_ids[i], frame, ts) {
                res.give_back(unused);
            }
        }

        n
    }

    /// Drain the cross-core forwarding ring, handing each flow state to
    /// the flow machine's migration callback in dequeue order.
    pub(crate) fn poll_qman_fwd(&mut self, _ts: u32) -> usize {
        let mut n = 0;
        while n < 4 * BATCH_SIZE {
            match self.fwd_ring.pop() {
                Some(state) => {
                    self.flows.migrate(state);
                    n += 1;
                }
                None => break,
            }
        }
        n
    }
}
