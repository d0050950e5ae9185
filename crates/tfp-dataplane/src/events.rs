//! Idle wait and cross-core wakeup.
//!
//! The wakeup channel is a counted 8-byte semaphore: any party may force a
//! worker out of its idle wait by incrementing it, and the worker drains
//! the counter with one 8-byte read per wakeup. On Linux this is an
//! `eventfd` registered in an `epoll` set next to the NIC interrupt fd;
//! elsewhere a Condvar-backed pair provides the same observable behavior.

/// How long an idle wait may block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollTimeout {
    /// Block until an event arrives.
    Infinite,
    /// Block for at most this many milliseconds.
    Millis(u32),
}

/// The blocking side of the idle wait: an event-set covering the NIC
/// interrupt and the wakeup channel.
pub trait EventSet {
    /// Block until an event fires or the timeout elapses. Pending wakeups
    /// are drained before returning. Returns the number of events seen.
    fn wait(&mut self, timeout: PollTimeout) -> usize;
}

/// The signalling side: wake the owning worker from its idle wait.
pub trait WakeChannel: Clone + Send + Sync + 'static {
    /// Increment the wakeup counter by one.
    fn notify(&self);
}

#[cfg(target_os = "linux")]
pub use linux::{EventFd, EpollSet};

pub use fallback::{notify_pair, Notifier, NotifySet};

#[cfg(target_os = "linux")]
mod linux {
    //! eventfd/epoll backend.

    use super::{EventSet, PollTimeout, WakeChannel};
    use std::io;
    use std::os::unix::io::RawFd;
    use std::sync::Arc;

    #[derive(Debug)]
    struct OwnedFd(RawFd);

    impl Drop for OwnedFd {
        fn drop(&mut self) {
            unsafe { libc::close(self.0) };
        }
    }

    /// A counted wakeup semaphore backed by `eventfd(2)`.
    #[derive(Debug, Clone)]
    pub struct EventFd {
        fd: Arc<OwnedFd>,
    }

    impl EventFd {
        /// Create the eventfd with a zero counter.
        pub fn new() -> io::Result<Self> {
            let fd = unsafe { libc::eventfd(0, 0) };
            if fd < 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(Self {
                fd: Arc::new(OwnedFd(fd)),
            })
        }

        fn raw(&self) -> RawFd {
            self.fd.0
        }

        fn drain(&self) {
            let mut val = 0u64;
            unsafe {
                libc::read(
                    self.raw(),
                    &mut val as *mut u64 as *mut libc::c_void,
                    std::mem::size_of::<u64>(),
                )
            };
        }
    }

    impl WakeChannel for EventFd {
        fn notify(&self) {
            let val = 1u64;
            unsafe {
                libc::write(
                    self.raw(),
                    &val as *const u64 as *const libc::c_void,
                    std::mem::size_of::<u64>(),
                )
            };
        }
    }

    /// Event-set over the wakeup eventfd and, when present, the NIC
    /// interrupt fd.
    #[derive(Debug)]
    pub struct EpollSet {
        epfd: OwnedFd,
        wake: EventFd,
    }

    impl EpollSet {
        /// Build the epoll set. `irq_fd` is the NIC's interrupt fd, if the
        /// driver exposes one.
        pub fn new(wake: EventFd, irq_fd: Option<RawFd>) -> io::Result<Self> {
            let epfd = unsafe { libc::epoll_create1(0) };
            if epfd < 0 {
                return Err(io::Error::last_os_error());
            }
            let set = Self {
                epfd: OwnedFd(epfd),
                wake,
            };

            set.register(set.wake.raw())?;
            if let Some(fd) = irq_fd {
                set.register(fd)?;
            }
            Ok(set)
        }

        fn register(&self, fd: RawFd) -> io::Result<()> {
            let mut ev = libc::epoll_event {
                events: libc::EPOLLIN as u32,
                u64: fd as u64,
            };
            let r = unsafe { libc::epoll_ctl(self.epfd.0, libc::EPOLL_CTL_ADD, fd, &mut ev) };
            if r < 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        }
    }

    impl EventSet for EpollSet {
        fn wait(&mut self, timeout: PollTimeout) -> usize {
            let ms = match timeout {
                PollTimeout::Infinite => -1,
                PollTimeout::Millis(ms) => ms.min(i32::MAX as u32) as i32,
            };

            let mut events = [libc::epoll_event { events: 0, u64: 0 }; 2];
            let n = unsafe { libc::epoll_wait(self.epfd.0, events.as_mut_ptr(), 2, ms) };
            if n <= 0 {
                // Timeout or EINTR; the loop re-polls either way.
                return 0;
            }

            for ev in &events[..n as usize] {
                if ev.u64 == self.wake.raw() as u64 {
                    self.wake.drain();
                }
            }
            n as usize
        }
    }
}

mod fallback {
    //! Condvar-backed pair for targets without eventfd, with the same
    //! counted-semaphore semantics.

    use super::{EventSet, PollTimeout, WakeChannel};
    use parking_lot::{Condvar, Mutex};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Debug, Default)]
    struct Inner {
        pending: Mutex<u64>,
        cv: Condvar,
    }

    /// Waiter half of a [`notify_pair`].
    #[derive(Debug)]
    pub struct NotifySet {
        inner: Arc<Inner>,
    }

    /// Signalling half of a [`notify_pair`].
    #[derive(Debug, Clone)]
    pub struct Notifier {
        inner: Arc<Inner>,
    }

    /// Create a connected waiter/notifier pair.
    pub fn notify_pair() -> (NotifySet, Notifier) {
        let inner = Arc::new(Inner::default());
        (
            NotifySet {
                inner: inner.clone(),
            },
            Notifier { inner },
        )
    }

    impl EventSet for NotifySet {
        fn wait(&mut self, timeout: PollTimeout) -> usize {
            let mut pending = self.inner.pending.lock();
            if *pending == 0 {
                match timeout {
                    PollTimeout::Infinite => self.inner.cv.wait(&mut pending),
                    PollTimeout::Millis(ms) => {
                        let _ = self
                            .inner
                            .cv
                            .wait_for(&mut pending, Duration::from_millis(ms as u64));
                    }
                }
            }
            let woke = (*pending > 0) as usize;
            *pending = 0;
            woke
        }
    }

    impl WakeChannel for Notifier {
        fn notify(&self) {
            let mut pending = self.inner.pending.lock();
            *pending += 1;
            self.inner.cv.notify_one();
        }
    }
}
