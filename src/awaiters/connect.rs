//! Grounded on `detail::async_connect_awaiter` in `bc::network::socket`,
//! built on [`Socket::start_connect`]/[`Socket::take_connect_error`].
//!
//! Non-blocking `connect(2)` resolves synchronously (loopback, usually) or
//! via a writability notification followed by an `SO_ERROR` check; unlike
//! `accept`, writable-while-connecting is never spurious, so a single
//! wakeup always finishes the wait.

use std::cell::Cell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use crate::address::SocketAddress;
use crate::error::Error;
use crate::event::EventMask;
use crate::scheduler::{self, FdToken};
use crate::socket::{Protocol, Socket};

const INTEREST: EventMask = EventMask::WRITE.union(EventMask::ERROR);

pub struct Connect {
    socket: Option<Socket>,
    resolved_error: Option<Error>,
    ready_immediately: bool,
    revent: Rc<Cell<EventMask>>,
    token: Option<FdToken>,
}

/// Begins connecting to `addr`, matching `network::async_connect`.
#[must_use]
pub fn async_connect(addr: SocketAddress, protocol: Protocol) -> Connect {
    match Socket::start_connect(addr, protocol) {
        Ok((socket, true)) => Connect {
            socket: Some(socket),
            resolved_error: None,
            ready_immediately: true,
            revent: Rc::new(Cell::new(EventMask::NONE)),
            token: None,
        },
        Ok((socket, false)) => Connect {
            socket: Some(socket),
            resolved_error: None,
            ready_immediately: false,
            revent: Rc::new(Cell::new(EventMask::NONE)),
            token: None,
        },
        Err(err) => Connect {
            socket: None,
            resolved_error: Some(err.into()),
            ready_immediately: true,
            revent: Rc::new(Cell::new(EventMask::NONE)),
            token: None,
        },
    }
}

impl Future for Connect {
    type Output = Result<Socket, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if this.ready_immediately {
            return Poll::Ready(match this.resolved_error.take() {
                Some(err) => Err(err),
                None => Ok(this.socket.take().expect("connected socket present when start_connect succeeded")),
            });
        }
        if this.token.is_none() {
            let socket = this.socket.as_ref().expect("socket present while connect is in progress");
            let fd = socket.raw_fd();
            let waker = cx.waker().clone();
            let revent = Rc::clone(&this.revent);
            this.token = Some(scheduler::with_default(|s| s.post_fd_continuation(fd, INTEREST, revent, waker)));
            return Poll::Pending;
        }
        this.token = None;
        let observed = this.revent.get();
        let socket = this.socket.take().expect("socket present on resume");
        if observed.contains(EventMask::ERROR) {
            return Poll::Ready(Err(Error::EpollError));
        }
        match socket.take_connect_error() {
            Ok(None) => Poll::Ready(Ok(socket)),
            Ok(Some(io_err)) => Poll::Ready(Err(io_err.into())),
            Err(io_err) => Poll::Ready(Err(io_err.into())),
        }
    }
}

impl Drop for Connect {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            scheduler::with_default(|s| s.cancel_fd(token));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::awaiters::accept::async_accept;
    use crate::scheduler;
    use crate::task::Task;

    #[test]
    #[serial_test::serial]
    fn connect_to_a_listening_socket_succeeds() {
        let addr = SocketAddress::new("127.0.0.1", 0).unwrap();
        let listener = Socket::bind_and_listen(addr, Protocol::Tcp, 16).unwrap();
        let bound_addr = listener.local_addr().unwrap();

        let server: Task<()> = Task::spawn(async move {
            let _ = async_accept(&listener).await;
        });
        let client: Task<bool> = Task::spawn(async move {
            async_connect(bound_addr, Protocol::Tcp).await.is_ok()
        });

        scheduler::run_until(|| client.is_done()).unwrap();
        assert!(client.try_take().unwrap());
        drop(server);
    }

    #[test]
    fn connecting_to_a_closed_port_fails() {
        // Nothing listens on this port; loopback refuses the connection.
        let addr = SocketAddress::new("127.0.0.1", 1).unwrap();
        let client: Task<bool> = Task::spawn(async move {
            async_connect(addr, Protocol::Tcp).await.is_err()
        });
        scheduler::run().unwrap();
        assert!(client.try_take().unwrap());
    }
}
