//! TX staging and flush.

use crate::buffer::BufHandle;
use crate::nic::NetChannel;
use crate::stats::{add, CoreStats};
use crate::TXBUF_SIZE;

/// Staging area for frames awaiting transmission.
///
/// Polls bound their batches by [`room`] before producing packets, so a
/// stage never overflows; frames stay in production order until the NIC
/// accepts them.
///
/// [`room`]: TxStage::room
pub struct TxStage {
    handles: Vec<BufHandle>,
}

impl TxStage {
    /// Create an empty stage with full capacity reserved up front.
    pub fn new() -> Self {
        Self {
            handles: Vec::with_capacity(TXBUF_SIZE),
        }
    }

    /// Frames currently staged.
    #[inline]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// True if nothing is staged.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Slots left before the stage is full.
    #[inline]
    pub fn room(&self) -> usize {
        TXBUF_SIZE - self.handles.len()
    }

    /// Stage one frame for transmission.
    #[inline]
    pub fn stage(&mut self, frame: BufHandle) {
        debug_assert!(self.handles.len() < TXBUF_SIZE);
        self.handles.push(frame);
    }

    /// Push staged frames to the NIC.
    ///
    /// On partial acceptance the unsent suffix moves to the front, in
    /// order, and the next flush retries it. A flush that moves nothing
    /// records an empty stat and leaves the stage untouched.
    pub fn flush<N: NetChannel>(&mut self, net: &mut N, stats: &CoreStats) {
        if self.handles.is_empty() {
            return;
        }

        add(&stats.tx_poll, 1);

        let before = self.handles.len();
        let sent = net.send(&mut self.handles);
        debug_assert_eq!(sent, before - self.handles.len());

        add(&stats.tx_total, sent as u64);
        if sent == 0 {
            add(&stats.tx_empty, 1);
        }
    }

    #[cfg(test)]
    pub(crate) fn frames(&self) -> &[BufHandle] {
        &self.handles
    }
}

impl Default for TxStage {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::FramePool;
    use crate::stub::{frame_tag, tag_frame, StubNet};

    fn stage_tagged(tx: &mut TxStage, net: &mut StubNet, n: usize) {
        for i in 0..n {
            let mut h = net.pool.alloc().unwrap();
            tag_frame(&mut h, i as u32);
            tx.stage(h);
        }
    }

    #[test]
    fn full_flush_clears_stage() {
        let mut net = StubNet::new(FramePool::new(64));
        let mut tx = TxStage::new();
        let stats = CoreStats::default();

        stage_tagged(&mut tx, &mut net, 32);
        tx.flush(&mut net, &stats);

        assert!(tx.is_empty());
        assert_eq!(net.sent_tags, (0..32).collect::<Vec<_>>());
        assert_eq!(stats.snapshot().tx_total, 32);
    }

    #[test]
    fn partial_flush_shifts_unsent_suffix_to_front() {
        let mut net = StubNet::new(FramePool::new(64));
        net.send_limit = Some(16);
        let mut tx = TxStage::new();
        let stats = CoreStats::default();

        stage_tagged(&mut tx, &mut net, 32);
        tx.flush(&mut net, &stats);

        assert_eq!(tx.len(), 16);
        let remaining: Vec<u32> = tx.frames().iter().map(frame_tag).collect();
        assert_eq!(remaining, (16..32).collect::<Vec<_>>());

        // Retry moves the rest.
        net.send_limit = None;
        tx.flush(&mut net, &stats);
        assert!(tx.is_empty());
        assert_eq!(net.sent_tags, (0..32).collect::<Vec<_>>());
    }

    #[test]
    fn failed_flush_leaves_state_and_records_empty() {
        let mut net = StubNet::new(FramePool::new(64));
        net.send_limit = Some(0);
        let mut tx = TxStage::new();
        let stats = CoreStats::default();

        stage_tagged(&mut tx, &mut net, 8);
        tx.flush(&mut net, &stats);

        assert_eq!(tx.len(), 8);
        let snap = stats.snapshot();
        assert_eq!(snap.tx_empty, 1);
        assert_eq!(snap.tx_total, 0);
    }

    #[test]
    fn empty_stage_flush_is_a_noop() {
        let mut net = StubNet::new(FramePool::new(4));
        let mut tx = TxStage::new();
        let stats = CoreStats::default();

        tx.flush(&mut net, &stats);
        assert_eq!(stats.snapshot().tx_poll, 0);
    }
}
