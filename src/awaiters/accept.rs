//! Grounded on `detail::async_accept_awaiter` in `bc::network::socket`: a
//! proxy-based waiter, since a reported-readable listening socket does
//! not guarantee a connection is still there to `accept()` by the time we
//! get to it (another waiter, or another process sharing the port via
//! `SO_REUSEPORT`, may have taken it first).

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::os::fd::RawFd;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use crate::error::Error;
use crate::event::EventMask;
use crate::scheduler::{self, FdToken};
use crate::socket::{accept_raw, Protocol, Socket};

pub struct Accept {
    fd: RawFd,
    protocol: Protocol,
    token: Option<FdToken>,
    result: Rc<RefCell<Option<Result<Socket, Error>>>>,
}

/// Suspends until a connection is accepted on `socket`, matching
/// `network::async_accept`.
#[must_use]
pub fn async_accept(socket: &Socket) -> Accept {
    Accept {
        fd: socket.raw_fd(),
        protocol: socket.protocol(),
        token: None,
        result: Rc::new(RefCell::new(None)),
    }
}

impl Future for Accept {
    type Output = Result<Socket, Error>;

    /// Always suspends on the first poll (the original's
    /// `await_ready() { return false; }`): accepting is only ever
    /// attempted from inside the proxy, during dispatch.
    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if let Some(result) = this.result.borrow_mut().take() {
            return Poll::Ready(result);
        }
        if this.token.is_none() {
            let fd = this.fd;
            let protocol = this.protocol;
            let result_slot = Rc::clone(&this.result);
            let waker = cx.waker().clone();
            let revent = Rc::new(Cell::new(EventMask::NONE));
            let proxy = make_proxy(fd, protocol, result_slot, waker);
            this.token = Some(scheduler::with_default(|s| s.post_fd_proxy(fd, EventMask::READ, revent, proxy)));
        }
        Poll::Pending
    }
}

fn make_proxy(
    fd: RawFd,
    protocol: Protocol,
    result_slot: Rc<RefCell<Option<Result<Socket, Error>>>>,
    waker: Waker,
) -> crate::scheduler::Proxy {
    Box::new(move || match accept_raw(fd) {
        Ok(Some(new_fd)) => {
            *result_slot.borrow_mut() = Some(Ok(Socket::wrap_accepted(new_fd, protocol)));
            waker.wake_by_ref();
            true
        }
        Ok(None) => false,
        Err(err) => {
            *result_slot.borrow_mut() = Some(Err(err.into()));
            waker.wake_by_ref();
            true
        }
    })
}

impl Drop for Accept {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            scheduler::with_default(|s| s.cancel_fd(token));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::SocketAddress;
    use crate::awaiters::connect::async_connect;
    use crate::scheduler;
    use crate::task::Task;

    #[test]
    #[serial_test::serial]
    fn accept_completes_once_a_client_connects() {
        let addr = SocketAddress::new("127.0.0.1", 0).unwrap();
        let listener = Socket::bind_and_listen(addr, Protocol::Tcp, 16).unwrap();
        let bound_addr = listener.local_addr().unwrap();

        let server: Task<bool> = Task::spawn(async move {
            let accepted = async_accept(&listener).await;
            accepted.is_ok()
        });
        let client: Task<()> = Task::spawn(async move {
            let _ = async_connect(bound_addr, Protocol::Tcp).await;
        });

        scheduler::run_until(|| server.is_done()).unwrap();
        assert!(server.try_take().unwrap());
        drop(client);
    }
}
