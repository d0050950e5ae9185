//! TFP Dataplane - per-core loop of a kernel-bypass TCP fast path
//!
//! Each worker owns one [`DataplaneContext`] and runs a single-threaded,
//! run-to-completion polling loop pinned to its core:
//!
//! ```text
//!          ┌──────────────────────────────────────────────────┐
//!          │                 worker iteration                 │
//!          │                                                  │
//!   NIC ──▶│ RX poll ─▶ TX flush ─▶ fwd ring ─▶ QMan poll     │
//!          │    │                                   │         │
//!          │    ▼                                   ▼         │
//!          │ app-ctx poll ─▶ slow path ─▶ TX flush ─▶ scale   │──▶ NIC
//!          │                                                  │
//!          │ idle? ─▶ arm RX interrupt, epoll-wait, disarm    │
//!          └──────────────────────────────────────────────────┘
//! ```
//!
//! The loop multiplexes five work sources (NIC receive, application TX
//! queues, queue-manager scheduler output, slow-path control messages, and
//! a cross-core forwarding ring), amortizes buffer management through a
//! per-core handle cache, coalesces application-visible RX events, and
//! drops into an interrupt-armed wait only when strictly idle.
//!
//! The NIC channel, queue manager, TCP flow machine, application-context
//! rings, and slow-path agent are external collaborators, plugged in
//! through the [`Platform`] trait bundle. Nothing on the fast path
//! allocates, locks, or blocks; the single suspension point is the idle
//! wait.

#![warn(missing_docs)]

pub mod appif;
pub mod bufcache;
pub mod buffer;
pub mod context;
pub mod core;
pub mod events;
pub mod flows;
pub mod nic;
pub mod prefetch;
pub mod qman;
pub mod queues;
pub mod rx;
pub mod slowpath;
pub mod stats;
pub mod tx;

#[cfg(test)]
pub(crate) mod stub;

pub use appif::{AppQueues, ArxEvent, RxQueueFull};
pub use bufcache::{BufCache, Reservation};
pub use buffer::{BufHandle, Frame, FramePool};
pub use context::{CoreParts, DataplaneContext, Emit, FlowRefOf, Platform};
pub use self::core::{CoreHandle, EngineError, FastPathEngine, Worker};
pub use events::{EventSet, PollTimeout, WakeChannel};
pub use flows::{FlowEngine, RxDisposition, TcpOpts};
pub use nic::{NetChannel, NetError};
pub use qman::QueueManager;
pub use slowpath::{SlowPathAgent, SlowPathPoll};
pub use stats::{CoreStats, CoreStatsSnapshot};

/// Frames per RX burst and per QMan burst; also the capacity of the ARX
/// coalescing cache.
pub const BATCH_SIZE: usize = 64;

/// Capacity of the per-core TX staging area.
pub const TXBUF_SIZE: usize = 128;

/// Capacity of the per-core buffer-handle cache. Must be a power of two.
pub const BUFCACHE_SIZE: usize = 512;

const _: () = assert!(BUFCACHE_SIZE.is_power_of_two());
const _: () = assert!(BATCH_SIZE <= TXBUF_SIZE);
