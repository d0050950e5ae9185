//! Frame buffers and owning handles.
//!
//! Frames live in a pre-allocated, cache-line-aligned slab standing in for
//! the NIC's DMA region. A [`BufHandle`] is an owning reference to one
//! frame: it cannot be cloned, and every transfer of a frame between the
//! NIC, the buffer cache, TX staging, an application ring, or the slow
//! path is a move of the handle in the source. Whoever holds the handle
//! holds the frame.

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

/// Usable bytes per frame, headroom included.
pub const FRAME_SIZE: usize = 2048;

/// A single DMA-capable frame buffer.
#[repr(C, align(64))]
pub struct Frame {
    len: u16,
    off: u16,
    flags: u16,
    _pad: u16,
    data: [u8; FRAME_SIZE],
}

impl Frame {
    /// Packet length in bytes.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// True if no packet data is present.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Set the packet length.
    #[inline(always)]
    pub fn set_len(&mut self, len: u16) {
        debug_assert!(self.off as usize + len as usize <= FRAME_SIZE);
        self.len = len;
    }

    /// Offset of the packet within the frame.
    #[inline(always)]
    pub fn offset(&self) -> usize {
        self.off as usize
    }

    /// Set the packet offset within the frame.
    #[inline(always)]
    pub fn set_offset(&mut self, off: u16) {
        debug_assert!((off as usize) < FRAME_SIZE);
        self.off = off;
    }

    /// Packet bytes.
    #[inline(always)]
    pub fn payload(&self) -> &[u8] {
        let start = self.off as usize;
        &self.data[start..start + self.len as usize]
    }

    /// Mutable packet bytes.
    #[inline(always)]
    pub fn payload_mut(&mut self) -> &mut [u8] {
        let start = self.off as usize;
        let end = start + self.len as usize;
        &mut self.data[start..end]
    }

    /// Raw frame memory, independent of the current packet bounds.
    #[inline(always)]
    pub fn buf_mut(&mut self) -> &mut [u8; FRAME_SIZE] {
        &mut self.data
    }

    /// Pointer to the start of frame memory, for prefetching.
    #[inline(always)]
    pub fn as_ptr(&self) -> *const u8 {
        self.data.as_ptr()
    }

    /// Clear packet state. Frame memory is left as-is; producers overwrite.
    #[inline]
    pub fn reset(&mut self) {
        self.len = 0;
        self.off = 0;
        self.flags = 0;
    }
}

/// Owning handle to a frame. Not clonable; ownership moves by value.
pub struct BufHandle {
    frame: NonNull<Frame>,
}

// Frames are plain memory and a handle is the sole reference to its frame.
unsafe impl Send for BufHandle {}

impl BufHandle {
    /// Wrap a raw frame pointer.
    ///
    /// # Safety
    ///
    /// `frame` must point to a live frame that no other handle references,
    /// and the backing memory must outlive the handle.
    pub unsafe fn from_raw(frame: NonNull<Frame>) -> Self {
        Self { frame }
    }

    /// The raw frame pointer, for prefetch sweeps and pool bookkeeping.
    #[inline(always)]
    pub fn frame_ptr(&self) -> *const Frame {
        self.frame.as_ptr()
    }
}

impl Deref for BufHandle {
    type Target = Frame;

    #[inline(always)]
    fn deref(&self) -> &Frame {
        unsafe { self.frame.as_ref() }
    }
}

impl DerefMut for BufHandle {
    #[inline(always)]
    fn deref_mut(&mut self) -> &mut Frame {
        unsafe { self.frame.as_mut() }
    }
}

impl fmt::Debug for BufHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufHandle")
            .field("frame", &self.frame.as_ptr())
            .field("len", &self.len())
            .finish()
    }
}

/// Pre-allocated frame slab with a free list.
///
/// Single-owner, non-atomic: each NIC channel owns its pool, and a pool is
/// only ever touched from the core that owns the channel. The pool must
/// outlive every handle it has issued.
pub struct FramePool {
    base: NonNull<Frame>,
    size: usize,
    free: Vec<BufHandle>,
    layout: Layout,
}

unsafe impl Send for FramePool {}

impl FramePool {
    /// Allocate a pool of `size` frames.
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "frame pool must hold at least one frame");
        let layout = Layout::array::<Frame>(size).expect("frame slab layout");
        // Zeroed frames are valid frames; no per-field init pass needed.
        let ptr = unsafe { alloc_zeroed(layout) as *mut Frame };
        let base = NonNull::new(ptr).expect("frame slab allocation failed");

        let mut free = Vec::with_capacity(size);
        for i in 0..size {
            unsafe {
                let frame = NonNull::new_unchecked(base.as_ptr().add(i));
                free.push(BufHandle::from_raw(frame));
            }
        }

        Self {
            base,
            size,
            free,
            layout,
        }
    }

    /// Take a frame, if any are free.
    #[inline]
    pub fn alloc(&mut self) -> Option<BufHandle> {
        self.free.pop()
    }

    /// Return a frame to the pool.
    #[inline]
    pub fn free(&mut self, mut handle: BufHandle) {
        handle.reset();
        self.free.push(handle);
    }

    /// Frames currently free.
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Total frames in the pool.
    pub fn size(&self) -> usize {
        self.size
    }
}

impl Drop for FramePool {
    fn drop(&mut self) {
        // Outstanding handles dangle past this point; the pool is torn down
        // only after its channel is.
        self.free.clear();
        unsafe { dealloc(self.base.as_ptr() as *mut u8, self.layout) };
    }
}
