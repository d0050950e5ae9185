//! NIC channel interface.

use crate::buffer::BufHandle;

/// Errors surfaced by the NIC channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum NetError {
    /// The device is not running; interrupt control is unavailable.
    #[error("device not running")]
    DeviceDown,

    /// A reconfiguration step failed. Fatal for scale operations.
    #[error("NIC reconfiguration failed")]
    ReconfigFailed,
}

/// Per-core channel to the user-space NIC: RX/TX rings, the frame
/// allocator, and interrupt control.
///
/// Every method is non-blocking and bounded in work per call. Short reads
/// and short writes are normal operation, absorbed by the caller's retry
/// cadence.
pub trait NetChannel {
    /// Receive up to `max` frames, pushing their handles onto `out` in
    /// NIC-delivery order. Returns the number received.
    fn poll(&mut self, max: usize, out: &mut Vec<BufHandle>) -> usize;

    /// Transmit staged frames. The channel drains the prefix it accepted
    /// from `frames` (taking ownership) and returns its length; the unsent
    /// suffix is left in place, in order.
    fn send(&mut self, frames: &mut Vec<BufHandle>) -> usize;

    /// Allocate frames into the empty `slots`, filling from the front.
    /// Returns the number filled; fewer than requested is not an error.
    fn alloc(&mut self, slots: &mut [Option<BufHandle>]) -> usize;

    /// Return a frame to the allocator.
    fn free(&mut self, frame: BufHandle);

    /// Enable or disable the RX interrupt. `Err(NetError::DeviceDown)`
    /// means the device is not running and the caller should keep polling.
    fn rx_interrupt_ctl(&mut self, enable: bool) -> Result<(), NetError>;

    /// Grow the active RX/TX queue set from `from` to `to` cores.
    fn scale_up(&mut self, from: u32, to: u32) -> Result<(), NetError>;

    /// Shrink the active RX/TX queue set from `from` to `to` cores.
    fn scale_down(&mut self, from: u32, to: u32) -> Result<(), NetError>;
}
