//! The run loop. Grounded on the `scheduler` class in
//! `bc::async::scheduler`: timers drain before fd dispatch each
//! iteration, the poll slice is clamped to the earliest pending timer (or
//! a 1s default), and the loop runs until no timer or fd waiter remains
//! (invariant 1).
//!
//! The `thread_local` + `Rc<RefCell<..>>` singleton below plays the role
//! of the original's `default_scheduler()` free function, adapted to
//! Rust's single-threaded non-goal: rather than a thread-agnostic global
//! that a multi-threaded embedder could in principle race against, this
//! is unreachable from any other thread by construction (see
//! `SPEC_FULL.md` §9, "Global singletons").

mod fdtable;
mod timer;

pub use fdtable::{FdToken, Proxy};
pub(crate) use timer::TimerToken;

use std::cell::{Cell, RefCell};
use std::os::fd::RawFd;
use std::rc::Rc;
use std::task::Waker;
use std::time::{Duration, Instant};

use crate::event::EventMask;
use crate::poller::Poller;

/// Poll slice used when no timer is due sooner. Matches the original's
/// `static s_period = 1s`.
const DEFAULT_SLICE: Duration = Duration::from_secs(1);

thread_local! {
    static SCHEDULER: Rc<RefCell<Scheduler>> = Rc::new(RefCell::new(
        Scheduler::new().expect("failed to create the default scheduler's poller")
    ));
}

/// Accesses the thread-local default scheduler, matching
/// `bc::async::default_scheduler()`.
pub fn with_default<R>(f: impl FnOnce(&mut Scheduler) -> R) -> R {
    SCHEDULER.with(|scheduler| f(&mut scheduler.borrow_mut()))
}

/// Drives the default scheduler until no timer or fd waiter remains.
///
/// A free function rather than a method on `Scheduler`: each iteration's
/// `with_default` borrow must be released before woken tasks are polled
/// (see `crate::task::drain_ready_queue`), so the loop cannot itself run
/// from inside a single `with_default` call without reintroducing the
/// reentrant-borrow bug that queue exists to avoid.
///
/// # Errors
/// Propagates fatal poller I/O failures only; errors surfaced to
/// individual tasks never abort the loop.
pub fn run() -> std::io::Result<()> {
    run_until(|| false)
}

/// Runs iterations until `condition` becomes true or no work remains.
/// Used by tests and by embedders that pump the loop alongside other
/// work instead of blocking inside `run()`.
///
/// # Errors
/// Propagates fatal poller I/O failures only.
pub fn run_until(mut condition: impl FnMut() -> bool) -> std::io::Result<()> {
    loop {
        if condition() {
            return Ok(());
        }
        let has_work = with_default(|scheduler| scheduler.coro_count() > 0);
        if !has_work {
            return Ok(());
        }
        with_default(Scheduler::run_one_iteration)?;
        // Polled outside any `Scheduler` borrow: a woken task may register
        // a brand new awaiter, which needs its own `with_default` call.
        crate::task::drain_ready_queue();
    }
}

pub struct Scheduler {
    poller: Poller,
    timers: timer::TimerHeap,
    fds: fdtable::FdTable,
}

impl Scheduler {
    fn new() -> std::io::Result<Self> {
        Ok(Self {
            poller: Poller::new()?,
            timers: timer::TimerHeap::default(),
            fds: fdtable::FdTable::default(),
        })
    }

    #[must_use]
    fn coro_count(&self) -> usize {
        self.timers.live_count() + self.fds.live_count()
    }

    pub fn post_timer(&mut self, deadline: Instant, waker: Waker) -> TimerToken {
        self.timers.push(deadline, waker)
    }

    pub fn cancel_timer(&mut self, token: &TimerToken) {
        self.timers.cancel(token);
    }

    pub fn post_fd_continuation(&mut self, fd: RawFd, interest: EventMask, revent: Rc<Cell<EventMask>>, waker: Waker) -> FdToken {
        let token = self.fds.register_continuation(fd, interest, revent, waker);
        self.resubscribe(fd);
        token
    }

    pub fn post_fd_proxy(&mut self, fd: RawFd, interest: EventMask, revent: Rc<Cell<EventMask>>, proxy: Proxy) -> FdToken {
        let token = self.fds.register_proxy(fd, interest, revent, proxy);
        self.resubscribe(fd);
        token
    }

    pub fn cancel_fd(&mut self, token: FdToken) {
        let fd = token.raw_fd();
        self.fds.cancel(token);
        self.resubscribe(fd);
    }

    fn resubscribe(&mut self, fd: RawFd) {
        let mask = self.fds.union_interest(fd);
        if let Err(err) = self.poller.subscribe(fd, mask) {
            tracing::warn!(?err, fd, "failed to update poller subscription");
        }
    }

    /// Unsubscribes `fd` unconditionally; called from `Socket`'s
    /// destructor before `close()` (invariant 4).
    pub fn unsubscribe(&mut self, fd: RawFd) {
        if let Err(err) = self.poller.unsubscribe(fd) {
            tracing::warn!(?err, fd, "failed to unsubscribe fd from poller");
        }
    }

    fn run_one_iteration(&mut self) -> std::io::Result<()> {
        // Step 1: drain all currently-expired timers; if any ran, loop
        // back immediately rather than falling through to a poll, since a
        // resumed task may have posted work with an even earlier deadline.
        loop {
            let now = Instant::now();
            if self.timers.drain_expired(now) == 0 {
                break;
            }
        }

        if self.coro_count() == 0 {
            return Ok(());
        }

        // Step 2: compute this iteration's slice.
        let now = Instant::now();
        let slice = match self.timers.next_deadline() {
            Some(deadline) if deadline <= now + DEFAULT_SLICE => deadline.saturating_duration_since(now),
            _ => DEFAULT_SLICE,
        };

        // Step 3: dispatch.
        if self.fds.live_count() > 0 {
            let mut updates: Vec<(RawFd, EventMask)> = Vec::new();
            self.poller.poll(slice, |fd, observed| {
                updates.push((fd, observed));
            })?;
            for (fd, observed) in updates {
                let new_union = self.fds.dispatch(fd, observed);
                if let Err(err) = self.poller.subscribe(fd, new_union) {
                    tracing::warn!(?err, fd, "failed to update poller subscription after dispatch");
                }
            }
        } else {
            std::thread::sleep(slice);
        }

        Ok(())
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("timers_live", &self.timers.live_count())
            .field("fd_waiters_live", &self.fds.live_count())
            .finish()
    }
}
