//! A single-threaded, cooperative async runtime for non-blocking TCP/UDP
//! I/O: an `epoll`-backed reactor (via `mio`), a timer heap, and a small
//! set of `Future`-returning suspension points (`sleep`, `accept`,
//! `connect`, `read`, `write`) that register with it.
//!
//! Tasks are spawned with [`task::Task::spawn`] and run to completion (or
//! dropped, which structurally cancels whatever they were suspended in)
//! by driving the thread-local scheduler singleton with [`scheduler::run`]
//! or [`scheduler::run_until`].
//!
//! ```no_run
//! use bc::address::SocketAddress;
//! use bc::awaiters::{async_accept, async_read};
//! use bc::scheduler;
//! use bc::socket::{Protocol, Socket};
//! use bc::task::Task;
//!
//! let addr = SocketAddress::new("127.0.0.1", 9000).unwrap();
//! let listener = Socket::bind_and_listen(addr, Protocol::Tcp, 128).unwrap();
//! let server: Task<()> = Task::spawn(async move {
//!     loop {
//!         let Ok(peer) = async_accept(&listener).await else { break };
//!         let mut buf = [0u8; 1024];
//!         let _ = async_read(&peer, &mut buf).await;
//!     }
//! });
//! scheduler::run().unwrap();
//! drop(server);
//! ```

pub mod address;
pub mod awaiters;
pub mod error;
pub mod event;
pub mod logging;
pub mod poller;
pub mod scheduler;
pub mod socket;
pub mod task;

pub use address::SocketAddress;
pub use error::Error;
pub use socket::{Protocol, Socket};
pub use task::Task;
