//! End-to-end scenario: dropping a task that's suspended inside
//! `async_accept` structurally cancels the registration, so the scheduler
//! has no leftover work and `run()` returns instead of blocking forever.

use std::time::{Duration, Instant};

use bc::awaiters::async_accept;
use bc::scheduler;
use bc::task::Task;
use bc::{Protocol, Socket, SocketAddress};

#[test]
#[serial_test::serial]
fn dropping_a_pending_accept_cancels_its_registration() {
    let addr = SocketAddress::new("127.0.0.1", 0).unwrap();
    let listener = Socket::bind_and_listen(addr, Protocol::Tcp, 16).unwrap();

    let task: Task<()> = Task::spawn(async move {
        let _ = async_accept(&listener).await;
    });
    assert!(!task.is_done());

    drop(task);

    let start = Instant::now();
    scheduler::run().unwrap();
    assert!(start.elapsed() < Duration::from_secs(1));
}
