//! Grounded on `detail::async_read_awaiter` in `bc::network::socket`.
//! Continuation-based (unlike `accept`/`connect`): once the fd is
//! reported ready, the suspended task is simply resumed and decides for
//! itself whether to read again.

use std::cell::Cell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use crate::error::Error;
use crate::event::EventMask;
use crate::scheduler::{self, FdToken};
use crate::socket::Socket;

const INTEREST: EventMask = EventMask::READ.union(EventMask::ERROR).union(EventMask::HANGUP).union(EventMask::RDHANGUP);

pub struct Read<'a> {
    socket: &'a Socket,
    buf: &'a mut [u8],
    revent: Rc<Cell<EventMask>>,
    token: Option<FdToken>,
}

/// Suspends until `socket` is readable (or errored/closed), then performs
/// one non-blocking read into `buf`. Matches `network::async_read`.
#[must_use]
pub fn async_read<'a>(socket: &'a Socket, buf: &'a mut [u8]) -> Read<'a> {
    Read { socket, buf, revent: Rc::new(Cell::new(EventMask::NONE)), token: None }
}

impl Future for Read<'_> {
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
        // Checked before attempting the read, even if bytes may still be
        // buffered: kept as the original behaves (see `SPEC_FULL.md` §9,
        // "possibly-buggy source behavior"). The stricter alternative is
        // to attempt one more read first and only report `ClosedByPeer`
        // if that also yields zero bytes.
        if observed.contains(EventMask::ERROR) {
            return Poll::Ready(Err(Error::EpollError));
        }
        if observed.intersects(EventMask::HANGUP | EventMask::RDHANGUP) {
            return Poll::Ready(Err(Error::ClosedByPeer));
        }
        Poll::Ready(this.socket.try_read(this.buf))
    }
}

impl Drop for Read<'_> {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            scheduler::with_default(|s| s.cancel_fd(token));
        }
    }
}
