//! Timer min-heap. Grounded on `scheduler::time_node` /
//! `priority_queue<time_node, vector<time_node>, greater<time_node>>` in
//! the original `bc::async::scheduler` header.
//!
//! `std::priority_queue`'s tie-break for equal keys is implementation
//! defined; this port makes it explicit via a monotonically increasing
//! `seq` so two timers with the same deadline always resume in the order
//! they were posted (see REDESIGN FLAGS in `SPEC_FULL.md`).

use std::cell::Cell;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::rc::Rc;
use std::task::Waker;
use std::time::Instant;

/// Handle returned by [`TimerHeap::push`]; dropping an [`crate::awaiters::sleep::Sleep`]
/// before it fires calls [`TimerToken::cancel`] so the stale heap entry is
/// skipped (not invoked) when it is eventually popped.
#[derive(Debug, Clone)]
pub struct TimerToken {
    cancelled: Rc<Cell<bool>>,
}

impl TimerToken {
    pub fn cancel(&self) {
        self.cancelled.set(true);
    }
}

struct TimerNode {
    deadline: Instant,
    seq: u64,
    cancelled: Rc<Cell<bool>>,
    waker: Waker,
}

impl PartialEq for TimerNode {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}
impl Eq for TimerNode {}

impl PartialOrd for TimerNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerNode {
    /// Reversed so that `BinaryHeap` (a max-heap) surfaces the *earliest*
    /// deadline first, with ties broken by insertion order.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
pub struct TimerHeap {
    heap: BinaryHeap<TimerNode>,
    next_seq: u64,
    /// Count of live (non-cancelled) entries, used by the scheduler's
    /// `coro_count` accounting (invariant 1).
    live_count: usize,
}

impl TimerHeap {
    pub fn push(&mut self, deadline: Instant, waker: Waker) -> TimerToken {
        let cancelled = Rc::new(Cell::new(false));
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(TimerNode {
            deadline,
            seq,
            cancelled: Rc::clone(&cancelled),
            waker,
        });
        self.live_count += 1;
        TimerToken { cancelled }
    }

    /// Cancels a pending timer. No-op if it already fired.
    pub fn cancel(&mut self, token: &TimerToken) {
        if !token.cancelled.replace(true) {
            self.live_count -= 1;
        }
    }

    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live_count
    }

    #[must_use]
    pub fn next_deadline(&mut self) -> Option<Instant> {
        loop {
            match self.heap.peek() {
                Some(node) if node.cancelled.get() => {
                    self.heap_pop_cancelled();
                }
                Some(node) => return Some(node.deadline),
                None => return None,
            }
        }
    }

    fn heap_pop_cancelled(&mut self) {
        // Safe: only called right after `peek` confirmed the top is cancelled.
        self.heap.pop();
    }

    /// Pops and wakes every timer whose deadline has passed, returning how
    /// many were actually woken (cancelled entries are discarded silently
    /// and do not count).
    pub fn drain_expired(&mut self, now: Instant) -> usize {
        let mut woken = 0;
        while let Some(node) = self.heap.peek() {
            if node.cancelled.get() {
                self.heap.pop();
                continue;
            }
            if node.deadline > now {
                break;
            }
            let node = self.heap.pop().expect("peek confirmed Some");
            self.live_count -= 1;
            // Mark terminal so a `TimerToken::cancel` call racing with (or
            // arriving after) this firing — e.g. from the `Sleep` future's
            // `Drop` impl once it has already resolved — is a no-op
            // instead of double-decrementing `live_count`.
            node.cancelled.set(true);
            node.waker.wake();
            woken += 1;
        }
        woken
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

    fn noop_waker() -> Waker {
        Waker::noop().clone()
    }

    #[test]
    fn drains_in_deadline_order_with_fifo_ties() {
        let mut heap = TimerHeap::default();
        let base = Instant::now();
        let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

        heap.push(base + std::time::Duration::from_millis(10), logging_waker("a", &log));
        heap.push(base + std::time::Duration::from_millis(10), logging_waker("b", &log));
        heap.push(base + std::time::Duration::from_millis(5), logging_waker("c", &log));

        assert_eq!(heap.live_count(), 3);
        let woken = heap.drain_expired(base + std::time::Duration::from_millis(20));
        assert_eq!(woken, 3);
        assert_eq!(heap.live_count(), 0);
        assert_eq!(*log.lock().unwrap(), vec!["c", "a", "b"]);
    }

    #[test]
    fn cancelled_timer_is_skipped_and_not_double_counted() {
        let mut heap = TimerHeap::default();
        let deadline = Instant::now();
        let token = heap.push(deadline, noop_waker());
        assert_eq!(heap.live_count(), 1);
        heap.cancel(&token);
        assert_eq!(heap.live_count(), 0);
        let woken = heap.drain_expired(deadline + std::time::Duration::from_millis(1));
        assert_eq!(woken, 0);
    }
}
