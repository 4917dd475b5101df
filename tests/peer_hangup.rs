//! End-to-end scenario: a read suspended on a socket whose peer closes the
//! connection resolves to `ClosedByPeer` rather than hanging forever.

use bc::awaiters::{async_accept, async_connect, async_read};
use bc::error::Error;
use bc::scheduler;
use bc::task::Task;
use bc::{Protocol, Socket, SocketAddress};

#[test]
#[serial_test::serial]
fn read_on_a_hung_up_peer_reports_closed_by_peer() {
    let addr = SocketAddress::new("127.0.0.1", 0).unwrap();
    let listener = Socket::bind_and_listen(addr, Protocol::Tcp, 16).unwrap();
    let bound_addr = listener.local_addr().unwrap();

    let server: Task<Result<usize, Error>> = Task::spawn(async move {
        let peer = async_accept(&listener).await.unwrap();
        let mut buf = [0u8; 16];
        async_read(&peer, &mut buf).await
    });

    let client: Task<()> = Task::spawn(async move {
        let socket = async_connect(bound_addr, Protocol::Tcp).await.unwrap();
        drop(socket);
    });

    scheduler::run_until(|| server.is_done()).unwrap();
    assert!(matches!(server.try_take().unwrap(), Err(Error::ClosedByPeer)));
    drop(client);
}
