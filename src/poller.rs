//! Thin wrapper over [`mio::Poll`], tracking per-fd interest so that
//! subscribe/unsubscribe calls can choose the right ADD/MOD/DEL operation.
//!
//! Grounded on `poller` in the original `bc::async::scheduler` header: an
//! `epoll_create1(EPOLL_CLOEXEC)` handle, a `focus_` vector of per-fd
//! interest resized by `std::bit_ceil`, and a templated `poll(duration)`
//! that treats an interrupted wait as "no events" rather than an error.

use std::os::fd::RawFd;
use std::time::Duration;

use mio::unix::SourceFd;
use mio::{Events, Poll, Token};

use crate::event::EventMask;

/// Maximum number of ready events drained from a single `epoll_wait` call.
/// The original has no analogous constant (it iterates the kernel's own
/// event buffer); `mio::Events` requires choosing a capacity up front.
const EVENT_BUFFER_CAPACITY: usize = 256;

pub struct Poller {
    poll: Poll,
    events: Events,
    focus: Vec<EventMask>,
}

impl Poller {
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            poll: Poll::new()?,
            events: Events::with_capacity(EVENT_BUFFER_CAPACITY),
            focus: Vec::new(),
        })
    }

    fn current_interest(&self, fd: RawFd) -> EventMask {
        let idx = fd as usize;
        self.focus.get(idx).copied().unwrap_or(EventMask::NONE)
    }

    fn set_interest(&mut self, fd: RawFd, mask: EventMask) {
        let idx = fd as usize;
        if idx >= self.focus.len() {
            let new_len = (idx + 1).next_power_of_two();
            self.focus.resize(new_len, EventMask::NONE);
        }
        self.focus[idx] = mask;
    }

    /// Sets the kernel-level interest for `fd` to exactly `mask`. Diffing
    /// against the previously known interest picks ADD, MOD, or (when
    /// `mask` is empty) DEL. A no-op call (same mask as before) makes no
    /// syscall, satisfying idempotence (R1).
    pub fn subscribe(&mut self, fd: RawFd, mask: EventMask) -> std::io::Result<()> {
        let previous = self.current_interest(fd);
        if previous == mask {
            return Ok(());
        }
        let mut source = SourceFd(&fd);
        let token = Token(fd as usize);
        match (previous.is_empty(), mask.is_empty()) {
            (true, false) => {
                let interest = mask.to_interest().unwrap_or(mio::Interest::READABLE);
                self.poll.registry().register(&mut source, token, interest)?;
            }
            (false, false) => {
                let interest = mask.to_interest().unwrap_or(mio::Interest::READABLE);
                self.poll.registry().reregister(&mut source, token, interest)?;
            }
            (false, true) => {
                self.poll.registry().deregister(&mut source)?;
            }
            (true, true) => {}
        }
        self.set_interest(fd, mask);
        Ok(())
    }

    /// Unsubscribes `fd` entirely, equivalent to `subscribe(fd, EventMask::NONE)`.
    pub fn unsubscribe(&mut self, fd: RawFd) -> std::io::Result<()> {
        self.subscribe(fd, EventMask::NONE)
    }

    /// Blocks up to `timeout`, then invokes `on_ready` once per ready fd
    /// with the observed event mask. An interrupted wait yields zero
    /// calls, not an error, mirroring the original's treatment of `EINTR`.
    pub fn poll(&mut self, timeout: Duration, mut on_ready: impl FnMut(RawFd, EventMask)) -> std::io::Result<()> {
        match self.poll.poll(&mut self.events, Some(timeout)) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => return Ok(()),
            Err(err) => return Err(err),
        }
        for event in &self.events {
            let fd = event.token().0 as RawFd;
            on_ready(fd, EventMask::from_mio_event(event));
        }
        Ok(())
    }
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller").field("tracked_fds", &self.focus.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsubscribing_an_unknown_fd_is_a_no_op() {
        let mut poller = Poller::new().unwrap();
        assert!(poller.unsubscribe(999).is_ok());
    }

    #[test]
    fn repeated_subscribe_with_same_mask_is_idempotent() {
        use std::net::TcpListener;
        use std::os::fd::AsRawFd;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let fd = listener.as_raw_fd();
        let mut poller = Poller::new().unwrap();
        poller.subscribe(fd, EventMask::READ).unwrap();
        // Second call with the same mask must not attempt a duplicate
        // mio registration (which would error).
        poller.subscribe(fd, EventMask::READ).unwrap();
        poller.unsubscribe(fd).unwrap();
    }
}
