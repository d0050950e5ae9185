//! TCP flow machine interface.
//!
//! The flow state machine lives in shared memory and is owned by exactly
//! one core at a time; migration between cores happens through the
//! forwarding ring. This module defines only the surface the dataplane
//! loop consumes.

use crate::buffer::BufHandle;
use crate::context::Emit;

/// Parsed TCP timestamp option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpTimestamp {
    /// TSval from the sender.
    pub val: u32,
    /// TSecr echoed back.
    pub ecr: u32,
}

/// Summary of the TCP options relevant to the fast path, produced by the
/// bulk parse stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TcpOpts {
    /// Timestamp option, when present.
    pub ts: Option<TcpTimestamp>,
}

/// What the fast path decided about a received frame.
#[derive(Debug)]
pub enum RxDisposition {
    /// Contents consumed or acknowledged; the frame goes back to the
    /// buffer cache.
    Free(BufHandle),
    /// The flow machine kept the frame (staged for TX or handed to an
    /// application RX queue).
    Retained,
    /// The fast path cannot or will not handle this frame; it goes to the
    /// slow path.
    SlowPath(BufHandle),
}

/// Per-flow TCP fast path.
///
/// Lookup and parse are bulk operations over a whole RX batch so the
/// memory-level parallelism of the flow table and the option fields is
/// available to the hardware; per-frame processing follows.
pub trait FlowEngine {
    /// Reference to a flow state. Owned by one core at a time; sending one
    /// through a forwarding ring transfers that ownership.
    type FlowRef: Copy + Send + 'static;

    /// Bulk flow-state lookup over the 5-tuples of `frames`. Clears and
    /// fills `states`, one entry per frame, `None` for unknown flows.
    fn lookup(&mut self, frames: &[BufHandle], states: &mut Vec<Option<Self::FlowRef>>);

    /// Bulk TCP header/option parse. Clears and fills `opts`, one entry
    /// per frame.
    fn parse(
        &mut self,
        frames: &[BufHandle],
        states: &[Option<Self::FlowRef>],
        opts: &mut Vec<TcpOpts>,
    );

    /// Run the fast path for one received frame.
    fn packet(
        &mut self,
        emit: &mut Emit<'_>,
        frame: BufHandle,
        state: Self::FlowRef,
        opts: &TcpOpts,
        ts: u32,
    ) -> RxDisposition;

    /// Prefetch flow states for the given flow IDs ahead of segment
    /// production.
    fn prefetch_states(&mut self, flow_ids: &[u32]);

    /// Prefetch the send-buffer regions for the given flow IDs.
    fn prefetch_bufs(&mut self, flow_ids: &[u32]);

    /// Produce one segment for a flow the queue manager declared eligible.
    /// Returns `None` when a packet was written and the frame staged
    /// (handle consumed), or the untouched handle when the flow had
    /// nothing to send.
    fn segment(
        &mut self,
        emit: &mut Emit<'_>,
        flow_id: u32,
        frame: BufHandle,
        ts: u32,
    ) -> Option<BufHandle>;

    /// Accept a flow state handed off from another core.
    fn migrate(&mut self, state: Self::FlowRef);
}
