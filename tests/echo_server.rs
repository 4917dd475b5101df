//! End-to-end scenario: a spawned echo server accepts one connection and
//! bounces back whatever it reads until the peer closes its write side.

use bc::awaiters::{async_accept, async_connect, async_read, async_write};
use bc::scheduler;
use bc::task::Task;
use bc::{Protocol, Socket, SocketAddress};

#[test]
#[serial_test::serial]
fn echo_server_bounces_a_message_back() {
    let addr = SocketAddress::new("127.0.0.1", 0).unwrap();
    let listener = Socket::bind_and_listen(addr, Protocol::Tcp, 16).unwrap();
    let bound_addr = listener.local_addr().unwrap();

    let server: Task<()> = Task::spawn(async move {
        let Ok(peer) = async_accept(&listener).await else { return };
        let mut buf = [0u8; 64];
        loop {
            match async_read(&peer, &mut buf).await {
                Ok(0) => continue,
                Ok(n) => {
                    let mut written = 0;
                    while written < n {
                        match async_write(&peer, &buf[written..n]).await {
                            Ok(0) => continue,
                            Ok(w) => written += w,
                            Err(_) => return,
                        }
                    }
                }
                Err(_) => return,
            }
        }
    });

    let client: Task<Vec<u8>> = Task::spawn(async move {
        let client_socket = async_connect(bound_addr, Protocol::Tcp).await.unwrap();
        let mut written = 0;
        let message = b"hello, echo";
        while written < message.len() {
            match async_write(&client_socket, &message[written..]).await {
                Ok(0) => continue,
                Ok(w) => written += w,
                Err(_) => break,
            }
        }
        let mut reply = Vec::new();
        let mut buf = [0u8; 64];
        while reply.len() < message.len() {
            match async_read(&client_socket, &mut buf).await {
                Ok(0) => continue,
                Ok(n) => reply.extend_from_slice(&buf[..n]),
                Err(_) => break,
            }
        }
        reply
    });

    scheduler::run_until(|| client.is_done()).unwrap();
    assert_eq!(client.try_take().unwrap(), b"hello, echo");
    drop(server);
}
