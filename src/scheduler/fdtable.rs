//! Per-fd waiter lists. Grounded on `scheduler::descriptor_node` and
//! `vector<list<descriptor_node>> descriptor_nodes_` in the original
//! `bc::async::scheduler` header, and on the dense power-of-two-growth
//! `focus_` resize strategy used by the poller in the same header.

use std::cell::Cell;
use std::os::fd::RawFd;
use std::rc::Rc;
use std::task::Waker;

use crate::event::EventMask;

/// An in-reactor step run during dispatch to decide whether a waiter is
/// actually satisfied. Returns `true` when finished (remove the waiter),
/// `false` to stay registered (handles spurious/partial readiness, e.g.
/// `accept()` returning `EAGAIN` after the fd was reported readable).
pub type Proxy = Box<dyn FnMut() -> bool>;

enum WaiterKind {
    Continuation(Waker),
    Proxy(Proxy),
}

pub struct FdWaiter {
    seq: u64,
    interest: EventMask,
    revent: Rc<Cell<EventMask>>,
    kind: WaiterKind,
}

/// Identifies one registration so [`FdTable::cancel`] can remove exactly
/// it, even though other waiters may have been added to or removed from
/// the same fd's list in the meantime.
#[derive(Debug, Clone, Copy)]
pub struct FdToken {
    fd: RawFd,
    seq: u64,
}

impl FdToken {
    #[must_use]
    pub fn raw_fd(self) -> RawFd {
        self.fd
    }
}

#[derive(Default)]
pub struct FdTable {
    /// Indexed by raw fd; grown to the next power of two on demand,
    /// mirroring the original's `std::bit_ceil`-sized `focus_` vector.
    waiters: Vec<Vec<FdWaiter>>,
    next_seq: u64,
    live_count: usize,
}

impl FdTable {
    fn ensure_capacity(&mut self, fd: RawFd) {
        let idx = fd as usize;
        if idx >= self.waiters.len() {
            self.waiters.resize_with((idx + 1).next_power_of_two(), Vec::new);
        }
    }

    /// Registers a continuation-based waiter (used by `read`/`write`: the
    /// fd is simply resumed, with no extra in-reactor step).
    pub fn register_continuation(
        &mut self,
        fd: RawFd,
        interest: EventMask,
        revent: Rc<Cell<EventMask>>,
        waker: Waker,
    ) -> FdToken {
        self.register(fd, interest, revent, WaiterKind::Continuation(waker))
    }

    /// Registers a proxy-based waiter (used by `accept`/`connect`: the
    /// proxy performs the syscall and decides whether the wait is over).
    pub fn register_proxy(
        &mut self,
        fd: RawFd,
        interest: EventMask,
        revent: Rc<Cell<EventMask>>,
        proxy: Proxy,
    ) -> FdToken {
        self.register(fd, interest, revent, WaiterKind::Proxy(proxy))
    }

    fn register(&mut self, fd: RawFd, interest: EventMask, revent: Rc<Cell<EventMask>>, kind: WaiterKind) -> FdToken {
        self.ensure_capacity(fd);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.waiters[fd as usize].push(FdWaiter { seq, interest, revent, kind });
        self.live_count += 1;
        FdToken { fd, seq }
    }

    /// Cancels a pending registration. No-op if it already fired (the
    /// token's `seq` will no longer be present in the fd's list).
    pub fn cancel(&mut self, token: FdToken) {
        let Some(list) = self.waiters.get_mut(token.fd as usize) else {
            return;
        };
        let before = list.len();
        list.retain(|w| w.seq != token.seq);
        if list.len() != before {
            self.live_count -= 1;
        }
    }

    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live_count
    }

    /// The union of interest across all waiters currently registered on
    /// `fd` (invariant 2: this is exactly what the poller should be
    /// subscribed to).
    #[must_use]
    pub fn union_interest(&self, fd: RawFd) -> EventMask {
        self.waiters
            .get(fd as usize)
            .map(|list| list.iter().fold(EventMask::NONE, |acc, w| acc | w.interest))
            .unwrap_or(EventMask::NONE)
    }

    #[must_use]
    pub fn has_waiters(&self, fd: RawFd) -> bool {
        self.waiters.get(fd as usize).is_some_and(|l| !l.is_empty())
    }

    /// Dispatches one readiness report for `fd`. Waiters whose interest
    /// intersects `observed` are evaluated in registration order (FIFO,
    /// P2); the rest are left registered untouched. Returns the new union
    /// interest for `fd` so the caller can update the poller subscription.
    pub fn dispatch(&mut self, fd: RawFd, observed: EventMask) -> EventMask {
        self.ensure_capacity(fd);
        let mut pending = std::mem::take(&mut self.waiters[fd as usize]);
        let mut remaining = Vec::with_capacity(pending.len());

        for mut waiter in pending.drain(..) {
            if (waiter.interest & observed).is_empty() {
                remaining.push(waiter);
                continue;
            }
            waiter.revent.set(observed);
            let finished = match &mut waiter.kind {
                WaiterKind::Continuation(waker) => {
                    waker.wake_by_ref();
                    true
                }
                WaiterKind::Proxy(proxy) => proxy(),
            };
            if finished {
                self.live_count -= 1;
            } else {
                remaining.push(waiter);
            }
        }

        // Splice anything newly registered during this dispatch (re-armed
        // waiters posted by code that just ran) after the ones we just
        // processed, not interleaved with them.
        let newly_registered = std::mem::take(&mut self.waiters[fd as usize]);
        remaining.extend(newly_registered);
        self.waiters[fd as usize] = remaining;

        self.union_interest(fd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct LogWake {
        label: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl std::task::Wake for LogWake {
        fn wake(self: Arc<Self>) {
            self.log.lock().unwrap().push(self.label);
        }
    }

    fn logging_waker(label: &'static str, log: &Arc<Mutex<Vec<&'static str>>>) -> Waker {
        Waker::from(Arc::new(LogWake { label, log: Arc::clone(log) }))
    }

    #[test]
    fn waiters_on_same_fd_resume_fifo() {
        let mut table = FdTable::default();
        let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
        let revent = Rc::new(Cell::new(EventMask::NONE));

        table.register_continuation(3, EventMask::READ, Rc::clone(&revent), logging_waker("first", &log));
        table.register_continuation(3, EventMask::READ, Rc::clone(&revent), logging_waker("second", &log));

        table.dispatch(3, EventMask::READ);
        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
        assert_eq!(table.live_count(), 0);
    }

    #[test]
    fn non_matching_interest_stays_registered() {
        let mut table = FdTable::default();
        let revent = Rc::new(Cell::new(EventMask::NONE));
        let waker = Waker::noop().clone();
        table.register_continuation(5, EventMask::WRITE, revent, waker);
        table.dispatch(5, EventMask::READ);
        assert_eq!(table.live_count(), 1);
        assert_eq!(table.union_interest(5), EventMask::WRITE);
    }

    #[test]
    fn proxy_returning_false_stays_registered() {
        let mut table = FdTable::default();
        let revent = Rc::new(Cell::new(EventMask::NONE));
        let mut calls = 0;
        let proxy: Proxy = Box::new(move || {
            calls += 1;
            false
        });
        table.register_proxy(7, EventMask::READ, revent, proxy);
        table.dispatch(7, EventMask::READ);
        assert_eq!(table.live_count(), 1);
    }

    #[test]
    fn cancel_removes_exact_registration() {
        let mut table = FdTable::default();
        let revent = Rc::new(Cell::new(EventMask::NONE));
        let token = table.register_continuation(2, EventMask::READ, Rc::clone(&revent), Waker::noop().clone());
        table.register_continuation(2, EventMask::READ, revent, Waker::noop().clone());
        assert_eq!(table.live_count(), 2);
        table.cancel(token);
        assert_eq!(table.live_count(), 1);
        assert_eq!(table.union_interest(2), EventMask::READ);
    }
}
