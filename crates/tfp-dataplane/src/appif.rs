//! Application-context ring protocol interface.

use crate::buffer::BufHandle;
use crate::context::Emit;

/// Application-visible RX event, staged in the ARX cache and copied into
/// the target context's RX ring on flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArxEvent {
    /// Application's connection identifier, passed through untouched.
    pub conn: u64,
    /// Receive-buffer bump (bytes newly available to the application).
    pub rx_bump: u32,
    /// Send-buffer bump (bytes newly freed for the application).
    pub tx_bump: u32,
    /// Event flags.
    pub flags: u16,
}

/// An application RX ring had no free slot.
///
/// There is no backpressure protocol across this boundary; the worker
/// aborts when it hits this during an ARX flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("application RX queue full")]
pub struct RxQueueFull;

/// The per-core set of application contexts: their TX descriptor queues,
/// RX event rings, and doorbells.
pub trait AppQueues {
    /// A TX request fetched from an application context.
    type Desc: Send + 'static;

    /// Reserved slot in an application RX ring, redeemed by `arx_write`.
    type ArxSlot: Copy + Send + 'static;

    /// Number of application contexts multiplexed onto this core.
    fn count(&self) -> usize;

    /// Prefetch the queue head of context `actx` ahead of the fetch pass.
    fn prefetch(&mut self, actx: usize);

    /// Fetch one TX descriptor from context `actx`, if one is pending.
    fn fetch(&mut self, actx: usize) -> Option<Self::Desc>;

    /// Turn a fetched descriptor into a packet in `frame`. Returns `None`
    /// when the frame was populated and staged (handle consumed), or the
    /// untouched handle when the descriptor could not be serviced.
    fn bump(
        &mut self,
        emit: &mut Emit<'_>,
        desc: Self::Desc,
        frame: BufHandle,
        ts: u32,
    ) -> Option<BufHandle>;

    /// Probe context `actx`'s RX ring for consumer progress (credit and
    /// backpressure updates).
    fn rxq_probe(&mut self, actx: usize);

    /// Reserve one slot in context `actx`'s RX ring.
    fn arx_reserve(&mut self, actx: usize) -> Result<Self::ArxSlot, RxQueueFull>;

    /// Prefetch previously reserved slots before they are written.
    fn arx_prefetch(&mut self, slots: &[Self::ArxSlot]);

    /// Write an event into a reserved slot.
    fn arx_write(&mut self, slot: Self::ArxSlot, event: ArxEvent);

    /// Ring context `actx`'s doorbell with the current timestamp.
    fn kick(&mut self, actx: usize, ts: u32);
}
