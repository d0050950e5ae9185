//! Per-core advisory counters.
//!
//! All counters use relaxed ordering and take no part in correctness;
//! they exist for operators and the load monitor. The block is cache-line
//! aligned so cores never share a counter line.

use std::sync::atomic::{AtomicU64, Ordering};

#[inline(always)]
pub(crate) fn add(counter: &AtomicU64, v: u64) {
    counter.fetch_add(v, Ordering::Relaxed);
}

/// Counters for one dataplane worker.
///
/// Each work source gets a (poll, empty, total) triple: polls issued,
/// polls that found nothing, and units of work produced.
#[derive(Debug, Default)]
#[repr(C, align(64))]
pub struct CoreStats {
    /// RX polls issued.
    pub rx_poll: AtomicU64,
    /// RX polls that returned no frames.
    pub rx_empty: AtomicU64,
    /// Frames received.
    pub rx_total: AtomicU64,

    /// Queue-manager polls issued.
    pub qm_poll: AtomicU64,
    /// Queue-manager polls with no eligible flows.
    pub qm_empty: AtomicU64,
    /// Eligible flows returned by the queue manager.
    pub qm_total: AtomicU64,

    /// Application-context polls issued.
    pub qs_poll: AtomicU64,
    /// Application-context polls that fetched nothing.
    pub qs_empty: AtomicU64,
    /// TX descriptors fetched from application contexts.
    pub qs_total: AtomicU64,

    /// Slow-path polls issued.
    pub sp_poll: AtomicU64,
    /// Slow-path polls that processed nothing.
    pub sp_empty: AtomicU64,
    /// Slow-path messages processed.
    pub sp_total: AtomicU64,

    /// TX flushes attempted with staged frames.
    pub tx_poll: AtomicU64,
    /// TX flushes the NIC fully rejected.
    pub tx_empty: AtomicU64,
    /// Frames accepted by the NIC.
    pub tx_total: AtomicU64,

    /// Cycles spent in non-idle iterations, for the load monitor.
    pub cyc_busy: AtomicU64,
}

impl CoreStats {
    /// Take a point-in-time copy of all counters.
    pub fn snapshot(&self) -> CoreStatsSnapshot {
        let ld = |c: &AtomicU64| c.load(Ordering::Relaxed);
        CoreStatsSnapshot {
            rx_poll: ld(&self.rx_poll),
            rx_empty: ld(&self.rx_empty),
            rx_total: ld(&self.rx_total),
            qm_poll: ld(&self.qm_poll),
            qm_empty: ld(&self.qm_empty),
            qm_total: ld(&self.qm_total),
            qs_poll: ld(&self.qs_poll),
            qs_empty: ld(&self.qs_empty),
            qs_total: ld(&self.qs_total),
            sp_poll: ld(&self.sp_poll),
            sp_empty: ld(&self.sp_empty),
            sp_total: ld(&self.sp_total),
            tx_poll: ld(&self.tx_poll),
            tx_empty: ld(&self.tx_empty),
            tx_total: ld(&self.tx_total),
            cyc_busy: ld(&self.cyc_busy),
        }
    }
}

/// Non-atomic copy of [`CoreStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct CoreStatsSnapshot {
    pub rx_poll: u64,
    pub rx_empty: u64,
    pub rx_total: u64,
    pub qm_poll: u64,
    pub qm_empty: u64,
    pub qm_total: u64,
    pub qs_poll: u64,
    pub qs_empty: u64,
    pub qs_total: u64,
    pub sp_poll: u64,
    pub sp_empty: u64,
    pub sp_total: u64,
    pub tx_poll: u64,
    pub tx_empty: u64,
    pub tx_total: u64,
    pub cyc_busy: u64,
}
