//! Application-context polling.

use crate::appif::AppQueues;
use crate::context::{DataplaneContext, Emit, Platform};
use crate::stats::add;
use crate::BATCH_SIZE;

impl<P: Platform> DataplaneContext<P> {
    /// Service the application TX queues in round-robin order.
    ///
    /// Two stages: fetch descriptors starting at `poll_next_ctx`, moving
    /// to the next context on the first empty fetch (the cursor advances
    /// exactly once per context scanned, so no context can starve the
    /// others), then turn each descriptor into a packet against a
    /// pre-reserved buffer handle. Handles are committed only for
    /// descriptors that actually produced a packet.
    pub(crate) fn poll_queues(&mut self, ts: u32) -> usize {
        let max = BATCH_SIZE.min(self.tx.room());
        if max == 0 {
            return 0;
        }

        add(&self.stats.qs_poll, 1);

        let mut res = self.bufcache.prealloc(max, &mut self.net);
        let max = res.len();
        let count = self.apps.count();

        for i in 0..count {
            self.apps.prefetch((self.poll_next_ctx + i) % count);
        }

        debug_assert!(self.fetched.is_empty());
        let mut total = 0usize;
        for _ in 0..count {
            if self.fetched.len() >= max {
                break;
            }
            for _ in 0..BATCH_SIZE {
                if self.fetched.len() >= max {
                    break;
                }
                match self.apps.fetch(self.poll_next_ctx) {
                    Some(desc) => {
                        self.fetched.push(desc);
                        total += 1;
                    }
                    None => break,
                }
            }
            self.poll_next_ctx = (self.poll_next_ctx + 1) % count;
        }

        let mut emit = Emit::new(&mut self.tx, &mut self.arx);
        for desc in self.fetched.drain(..) {
            let Some(frame) = res.take() else { break };
            if let Some(unused) = self.apps.bump(&mut emit, desc, frame, ts) {
                res.give_back(unused);
            }
        }
        drop(res);

        for actx in 0..count {
            self.apps.rxq_probe(actx);
        }

        add(&self.stats.qs_total, total as u64);
        if total == 0 {
            add(&self.stats.qs_empty, 1);
        }

        total
    }
}
