//! End-to-end scenario: malformed addresses are rejected at parse time,
//! before any socket is ever created.

use bc::error::Error;
use bc::SocketAddress;

#[test]
fn out_of_range_ipv4_octet_is_rejected() {
    assert!(matches!(SocketAddress::new("999.0.0.1", 80), Err(Error::InvalidAddress)));
}

#[test]
fn double_elided_ipv6_is_rejected() {
    assert!(matches!(SocketAddress::new(":::1", 80), Err(Error::InvalidAddress)));
}

#[test]
fn well_formed_addresses_are_accepted() {
    assert!(SocketAddress::new("127.0.0.1", 8080).is_ok());
    assert!(SocketAddress::new("::1", 8080).is_ok());
}
