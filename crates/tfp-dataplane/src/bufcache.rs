//! Per-core buffer-handle cache.
//!
//! A ring of free frame handles sitting between the NIC allocator and the
//! polls that produce packets. Refills pull whole batches from the
//! allocator; frees recycle handles locally until the ring is full. The
//! occupied region is always the contiguous segment `[head, head + num)`
//! modulo the ring size.
//!
//! Reservation discipline: a poll pre-reserves handles with [`prealloc`],
//! takes them one at a time as its callbacks produce packets, and hands
//! back any handle a callback declined. Dropping the [`Reservation`]
//! commits exactly the handles still taken; a reservation nothing was
//! taken from has no effect. Partial failure therefore never leaks or
//! double-frees a handle.
//!
//! [`prealloc`]: BufCache::prealloc

use crate::buffer::BufHandle;
use crate::nic::NetChannel;
use crate::BUFCACHE_SIZE;

const MASK: usize = BUFCACHE_SIZE - 1;

/// Ring-buffered cache of free frame handles.
pub struct BufCache {
    slots: Box<[Option<BufHandle>]>,
    head: usize,
    num: usize,
}

impl BufCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        let mut slots = Vec::with_capacity(BUFCACHE_SIZE);
        slots.resize_with(BUFCACHE_SIZE, || None);
        Self {
            slots: slots.into_boxed_slice(),
            head: 0,
            num: 0,
        }
    }

    /// Cached handle count.
    #[inline]
    pub fn len(&self) -> usize {
        self.num
    }

    /// True if no handles are cached.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.num == 0
    }

    /// Reserve up to `num` handles, refilling from the NIC allocator
    /// first if the cache cannot cover the request.
    ///
    /// The refill writes into the ring tail; a write that would wrap is
    /// split into two allocator calls. The reservation covers the longest
    /// contiguous run starting at `head`, so it may be shorter than both
    /// `num` and the cache population; callers adapt to its length.
    pub fn prealloc<'a, N: NetChannel>(
        &'a mut self,
        num: usize,
        net: &mut N,
    ) -> Reservation<'a> {
        if self.num < num {
            let grow = BUFCACHE_SIZE - self.num;
            let tail = (self.head + self.num) & MASK;

            let got = if tail + grow <= BUFCACHE_SIZE {
                net.alloc(&mut self.slots[tail..tail + grow])
            } else {
                let first = BUFCACHE_SIZE - tail;
                let mut got = net.alloc(&mut self.slots[tail..]);
                if got == first {
                    got += net.alloc(&mut self.slots[..grow - first]);
                }
                got
            };

            self.num += got;
        }

        let contiguous = if self.head + self.num <= BUFCACHE_SIZE {
            self.num
        } else {
            BUFCACHE_SIZE - self.head
        };

        Reservation {
            avail: num.min(contiguous),
            taken: 0,
            cache: self,
        }
    }

    /// Return a handle to the cache, or to the NIC allocator when the
    /// cache is full. The frame's packet state is reset either way.
    pub fn free<N: NetChannel>(&mut self, mut handle: BufHandle, net: &mut N) {
        if self.num < BUFCACHE_SIZE {
            handle.reset();
            let slot = (self.head + self.num) & MASK;
            self.slots[slot] = Some(handle);
            self.num += 1;
        } else {
            net.free(handle);
        }
    }

    fn commit(&mut self, n: usize) {
        debug_assert!(n <= self.num);
        self.head = (self.head + n) & MASK;
        self.num -= n;
    }
}

impl Default for BufCache {
    fn default() -> Self {
        Self::new()
    }
}

/// A pending reservation of a contiguous run of cached handles.
///
/// Dropping the reservation commits the taken prefix; handles given back
/// before the drop are not committed.
pub struct Reservation<'a> {
    cache: &'a mut BufCache,
    avail: usize,
    taken: usize,
}

impl Reservation<'_> {
    /// Number of handles this reservation covers.
    #[inline]
    pub fn len(&self) -> usize {
        self.avail
    }

    /// True if the reservation covers no handles.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.avail == 0
    }

    /// Handles taken so far and not given back.
    #[inline]
    pub fn taken(&self) -> usize {
        self.taken
    }

    /// Borrow the `idx`-th reserved frame, e.g. for prefetching.
    #[inline]
    pub fn peek(&self, idx: usize) -> &BufHandle {
        debug_assert!(idx < self.avail);
        let slot = (self.cache.head + idx) & MASK;
        self.cache.slots[slot]
            .as_ref()
            .expect("reserved slot populated")
    }

    /// Take the next reserved handle, or `None` when the reservation is
    /// exhausted.
    #[inline]
    pub fn take(&mut self) -> Option<BufHandle> {
        if self.taken >= self.avail {
            return None;
        }
        let slot = (self.cache.head + self.taken) & MASK;
        let handle = self.cache.slots[slot].take();
        debug_assert!(handle.is_some());
        self.taken += 1;
        handle
    }

    /// Hand back a handle the callback declined; the next [`take`] returns
    /// it again.
    ///
    /// [`take`]: Reservation::take
    #[inline]
    pub fn give_back(&mut self, handle: BufHandle) {
        debug_assert!(self.taken > 0);
        self.taken -= 1;
        let slot = (self.cache.head + self.taken) & MASK;
        debug_assert!(self.cache.slots[slot].is_none());
        self.cache.slots[slot] = Some(handle);
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        self.cache.commit(self.taken);
    }
}
