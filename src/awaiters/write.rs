//! Grounded on `detail::async_write_awaiter` in `bc::network::socket`. Same
//! continuation shape as [`crate::awaiters::read`]; interest omits
//! `RDHANGUP`, since a peer's read shutdown doesn't prevent us writing.

use std::cell::Cell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use crate::error::Error;
use crate::event::EventMask;
use crate::scheduler::{self, FdToken};
use crate::socket::Socket;

const INTEREST: EventMask = EventMask::WRITE.union(EventMask::ERROR).union(EventMask::HANGUP);

pub struct Write<'a> {
    socket: &'a Socket,
    buf: &'a [u8],
    revent: Rc<Cell<EventMask>>,
    token: Option<FdToken>,
}

/// Suspends until `socket` is writable (or errored/closed), then performs
/// one non-blocking write of `buf`. Matches `network::async_write`.
#[must_use]
pub fn async_write<'a>(socket: &'a Socket, buf: &'a [u8]) -> Write<'a> {
    Write { socket, buf, revent: Rc::new(Cell::new(EventMask::NONE)), token: None }
}

impl Future for Write<'_> {
    type Output = Result<usize, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if this.token.is_none() {
            let fd = this.socket.raw_fd();
            let waker = cx.waker().clone();
            let revent = Rc::clone(&this.revent);
            this.token = Some(scheduler::with_default(|s| s.post_fd_continuation(fd, INTEREST, revent, waker)));
            return Poll::Pending;
        }
        this.token = None;
        let observed = this.revent.get();
        if observed.contains(EventMask::ERROR) {
            return Poll::Ready(Err(Error::EpollError));
        }
        if observed.contains(EventMask::HANGUP) {
            return Poll::Ready(Err(Error::ClosedByPeer));
        }
        Poll::Ready(this.socket.try_write(this.buf))
    }
}

impl Drop for Write<'_> {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            scheduler::with_default(|s| s.cancel_fd(token));
        }
    }
}
