//! `Task<T>`: a cooperative unit of work with its own frame, eagerly
//! polled once on spawn.
//!
//! Grounded on `promise<T>`/`task<T>` in `bc::async::task` — in particular
//! `initial_suspend() -> std::suspend_never`, which means a freshly
//! spawned task always runs until its first real suspension point before
//! `spawn` returns, and `task_awaiter`'s `await_suspend` setting
//! `handle.promise().prev`, which is the "a task's parent is set at most
//! once" invariant. Rust's native `async`/`.await` plays the role of the
//! generated coroutine state machine directly; `Task<T>` supplies the
//! piece C++ gets from the language (a `coroutine_handle`) and the
//! original's custom `scheduler` by hand: a resumable, reference-counted
//! frame plus a self-waking `Waker`.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

struct Inner<T> {
    weak_self: Weak<Inner<T>>,
    future: RefCell<Option<Pin<Box<dyn Future<Output = T>>>>>,
    result: RefCell<Option<T>>,
    done: Cell<bool>,
    /// Set by whatever task last `.await`ed this one (task.hpp's `prev`).
    parent: RefCell<Option<Waker>>,
}

impl<T: 'static> Inner<T> {
    fn new(future: Pin<Box<dyn Future<Output = T>>>) -> Rc<Self> {
        Rc::new_cyclic(|weak_self| Self {
            weak_self: weak_self.clone(),
            future: RefCell::new(Some(future)),
            result: RefCell::new(None),
            done: Cell::new(false),
            parent: RefCell::new(None),
        })
    }

    /// Drives the future forward exactly one step. Called eagerly at
    /// spawn time and again every time our own waker fires.
    fn poll_once(&self) {
        if self.done.get() {
            return;
        }
        // `take()` guards against the (spec-illegal but cheap to guard)
        // case of a waker firing reentrantly while we are already polling.
        let Some(mut future) = self.future.borrow_mut().take() else {
            return;
        };
        let waker = make_waker(self.weak_self.clone());
        let mut cx = Context::from_waker(&waker);
        match future.as_mut().poll(&mut cx) {
            Poll::Ready(value) => {
                self.done.set(true);
                *self.result.borrow_mut() = Some(value);
                if let Some(parent) = self.parent.borrow_mut().take() {
                    parent.wake();
                }
            }
            Poll::Pending => {
                *self.future.borrow_mut() = Some(future);
            }
        }
    }
}

/// A spawned, independently resumable unit of work producing a `T`.
///
/// Dropping a `Task<T>` that is still suspended drops its boxed future,
/// which drops whatever [`crate::awaiters`] value it was suspended
/// inside; each awaiter's own `Drop` impl purges its scheduler
/// registration (see `SPEC_FULL.md` §5). Because the scheduler only ever
/// holds a *weak* reference back to the task (see `make_waker` below),
/// nothing keeps a dropped task's frame alive.
pub struct Task<T> {
    inner: Rc<Inner<T>>,
}

impl<T: 'static> Task<T> {
    /// Spawns `future`, polling it once immediately (eager execution,
    /// matching `initial_suspend() -> suspend_never`).
    pub fn spawn(future: impl Future<Output = T> + 'static) -> Self {
        let inner = Inner::new(Box::pin(future));
        inner.poll_once();
        Self { inner }
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.inner.done.get()
    }

    /// Takes the result out if the task has completed; `None` otherwise
    /// or if already taken once.
    pub fn try_take(&self) -> Option<T> {
        self.inner.result.borrow_mut().take()
    }
}

impl<T: 'static> Future for Task<T> {
    type Output = T;

    /// `task_awaiter::await_ready`/`await_suspend`/`await_resume` folded
    /// into one `poll`: ready tasks resolve without touching `parent`;
    /// pending tasks record the awaiting waker.
    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        if self.inner.done.get() {
            return Poll::Ready(
                self.inner
                    .result
                    .borrow_mut()
                    .take()
                    .expect("Task marked done without a stored result"),
            );
        }
        *self.inner.parent.borrow_mut() = Some(cx.waker().clone());
        Poll::Pending
    }
}

/// Type-erased handle to an `Inner<T>`'s resumption step, so the ready
/// queue below doesn't need to be generic over every task's output type.
trait Pollable {
    fn resume(&self);
}

impl<T: 'static> Pollable for Inner<T> {
    fn resume(&self) {
        self.poll_once();
    }
}

thread_local! {
    /// Tasks woken since the last drain. A waker firing does not poll its
    /// task directly — it only enqueues it here — because wakers fire
    /// from inside `scheduler::Scheduler::run_one_iteration`, which runs
    /// with the thread-local scheduler already mutably borrowed; polling
    /// a task synchronously at that point would have it register a new
    /// awaiter (e.g. `async_read` re-arming itself) via
    /// `scheduler::with_default` while that borrow is still on the stack,
    /// panicking. `scheduler::run`/`run_until` drain this queue themselves
    /// once their per-iteration scheduler borrow has been released.
    static READY_QUEUE: RefCell<VecDeque<Weak<dyn Pollable>>> = RefCell::new(VecDeque::new());
}

fn enqueue<T: Pollable + 'static>(weak: Weak<T>) {
    let weak: Weak<dyn Pollable> = weak;
    READY_QUEUE.with(|queue| queue.borrow_mut().push_back(weak));
}

/// Polls every task woken since the last call, including any woken as a
/// side effect of polling one another (e.g. a task completing and waking
/// whatever awaited it). Must be called with no `Scheduler` borrow on the
/// stack.
pub(crate) fn drain_ready_queue() {
    loop {
        let next = READY_QUEUE.with(|queue| queue.borrow_mut().pop_front());
        let Some(weak) = next else { break };
        if let Some(task) = weak.upgrade() {
            task.resume();
        }
    }
}

/// Builds a `Waker` over a `Weak<Inner<T>>`. Using `Weak` rather than a
/// strong `Rc` is what makes cancellation-by-drop safe: if the user drops
/// their `Task<T>` while it is registered with the scheduler (as a timer
/// or fd waiter), the scheduler's copy of this waker cannot keep the
/// frame alive, so `Weak::upgrade` simply fails when the ready queue is
/// drained (if it is ever enqueued at all). No atomic refcounting is
/// needed since everything here runs on one thread.
fn make_waker<T: 'static>(weak: Weak<Inner<T>>) -> Waker {
    let boxed = Box::new(weak);
    let raw = RawWaker::new(Box::into_raw(boxed).cast::<()>(), vtable::<T>());
    // SAFETY: `vtable::<T>()` was built from functions matching this raw
    // waker's data layout (`Box<Weak<Inner<T>>>`), with `T` monomorphized
    // identically on both sides.
    unsafe { Waker::from_raw(raw) }
}

/// One vtable instance per concrete `T`: a `static` defined inside a
/// generic function is monomorphized alongside it, giving each
/// instantiation its own `'static` table instead of allocating one per
/// waker.
fn vtable<T: 'static>() -> &'static RawWakerVTable {
    static VTABLE: RawWakerVTable = RawWakerVTable::new(clone::<T>, wake::<T>, wake_by_ref::<T>, drop_ptr::<T>);
    &VTABLE
}

unsafe fn clone<T: 'static>(ptr: *const ()) -> RawWaker {
    let weak = unsafe { &*ptr.cast::<Weak<Inner<T>>>() };
    let boxed = Box::new(weak.clone());
    RawWaker::new(Box::into_raw(boxed).cast::<()>(), vtable::<T>())
}

unsafe fn wake<T: 'static>(ptr: *const ()) {
    let weak = unsafe { *Box::from_raw(ptr.cast_mut().cast::<Weak<Inner<T>>>()) };
    enqueue(weak);
}

unsafe fn wake_by_ref<T: 'static>(ptr: *const ()) {
    let weak = unsafe { &*ptr.cast::<Weak<Inner<T>>>() };
    enqueue(weak.clone());
}

unsafe fn drop_ptr<T: 'static>(ptr: *const ()) {
    drop(unsafe { Box::from_raw(ptr.cast_mut().cast::<Weak<Inner<T>>>()) });
}
