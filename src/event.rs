//! Readiness event bits reported by the [`crate::poller::Poller`] and
//! consumed by [`crate::awaiters`].

use bitflags::bitflags;

bitflags! {
    /// Bitset of readiness conditions for a single fd. Named after the
    /// underlying epoll bits it mirrors; applications should match on the
    /// named constants, not specific numeric values.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EventMask: u32 {
        const NONE = 0;
        const READ = 0b0000_0001;
        const WRITE = 0b0000_0010;
        const ERROR = 0b0000_0100;
        const HANGUP = 0b0000_1000;
        const RDHANGUP = 0b0001_0000;
    }
}

impl EventMask {
    /// Translate to the `mio::Interest` this mask implies for subscribing
    /// with the poller. Returns `None` if the mask carries no interest the
    /// notifier can subscribe to (e.g. only `ERROR`, which the kernel
    /// reports unconditionally).
    #[must_use]
    pub fn to_interest(self) -> Option<mio::Interest> {
        let mut interest: Option<mio::Interest> = None;
        if self.contains(Self::READ) || self.contains(Self::RDHANGUP) || self.contains(Self::HANGUP) {
            interest = Some(mio::Interest::READABLE);
        }
        if self.contains(Self::WRITE) {
            interest = Some(interest.map_or(mio::Interest::WRITABLE, |i| i.add(mio::Interest::WRITABLE)));
        }
        interest
    }

    /// Translate observed `mio::event::Event` flags back into our mask.
    #[must_use]
    pub fn from_mio_event(event: &mio::event::Event) -> Self {
        let mut mask = Self::NONE;
        if event.is_readable() {
            mask |= Self::READ;
        }
        if event.is_writable() {
            mask |= Self::WRITE;
        }
        if event.is_error() {
            mask |= Self::ERROR;
        }
        if event.is_read_closed() || event.is_write_closed() {
            mask |= Self::RDHANGUP;
        }
        if event.is_read_closed() && event.is_write_closed() {
            mask |= Self::HANGUP;
        }
        mask
    }
}
