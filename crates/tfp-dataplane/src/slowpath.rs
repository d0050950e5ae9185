//! Slow-path agent interface and its poll.
//!
//! The slow path handles everything the fast path cannot: connection
//! setup and teardown, out-of-band control, and packets the flow machine
//! refuses. Its poll shares the reserve/commit buffer discipline of the
//! application-context poll but is capped hard per cycle so a flood of
//! control messages cannot starve bulk RX or scheduler work.

use crate::buffer::BufHandle;
use crate::context::{DataplaneContext, Emit, Platform};
use crate::stats::add;
use crate::BATCH_SIZE;

/// Messages processed per cycle cap.
const SLOWPATH_BUDGET: usize = 8;

/// Outcome of one slow-path poll step.
#[derive(Debug)]
pub enum SlowPathPoll {
    /// A message was processed and the frame consumed (a packet was
    /// produced and staged).
    Consumed,
    /// A message was processed without producing a packet; the handle
    /// comes back for the next message.
    Skip(BufHandle),
    /// No more messages this cycle; the handle comes back untouched.
    Stop(BufHandle),
}

/// Control-plane agent servicing this core.
pub trait SlowPathAgent {
    /// Process one pending control message, optionally producing a packet
    /// into `frame`.
    fn poll(&mut self, emit: &mut Emit<'_>, frame: BufHandle, ts: u32) -> SlowPathPoll;

    /// Accept a received frame the fast path will not handle.
    fn packet(&mut self, frame: BufHandle);
}

impl<P: Platform> DataplaneContext<P> {
    /// Drain pending slow-path control messages, at most eight frame
    /// consumptions per cycle.
    pub(crate) fn poll_slowpath(&mut self, ts: u32) -> usize {
        let max = BATCH_SIZE.min(self.tx.room());
        if max == 0 {
            return 0;
        }

        add(&self.stats.sp_poll, 1);

        let mut res = self
            .bufcache
            .prealloc(SLOWPATH_BUDGET.min(max), &mut self.net);

        let mut emit = Emit::new(&mut self.tx, &mut self.arx);
        let mut total = 0usize;
        loop {
            let Some(frame) = res.take() else { break };
            match self.slow.poll(&mut emit, frame, ts) {
                SlowPathPoll::Consumed => total += 1,
                SlowPathPoll::Skip(frame) => {
                    res.give_back(frame);
                    total += 1;
                }
                SlowPathPoll::Stop(frame) => {
                    res.give_back(frame);
                    break;
                }
            }
        }
        drop(res);

        add(&self.stats.sp_total, total as u64);
        if total == 0 {
            add(&self.stats.sp_empty, 1);
        }

        total
    }
}
