//! `SocketAddress`: a validated `(host, port)` pair accepted by
//! [`crate::socket::Socket::bind`]/`connect`.
//!
//! IPv4 parsing mirrors `address<domain::IPv4>::parse_ipv4` from the
//! original implementation (exactly four dot-separated decimal octets).
//! IPv6 support has no original counterpart — the library this was ported
//! from only ever implemented IPv4 — and is written fresh here in the same
//! validate-then-build style.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};

use crate::error::Error;

/// An address family-agnostic socket address, constructed from a textual
/// host and a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SocketAddress {
    inner: SocketAddr,
}

impl SocketAddress {
    /// Parse `hostname` as an IPv4 dotted-quad or IPv6 colon-hex literal
    /// and pair it with `port`. Returns [`Error::InvalidAddress`] if
    /// `hostname` is neither.
    pub fn new(hostname: &str, port: u16) -> Result<Self, Error> {
        if let Some(ip) = parse_ipv4(hostname) {
            return Ok(Self {
                inner: SocketAddr::V4(SocketAddrV4::new(ip, port)),
            });
        }
        if let Some(ip) = parse_ipv6(hostname) {
            return Ok(Self {
                inner: SocketAddr::V6(SocketAddrV6::new(ip, port, 0, 0)),
            });
        }
        Err(Error::InvalidAddress)
    }

    #[must_use]
    pub fn as_std(&self) -> SocketAddr {
        self.inner
    }

    #[must_use]
    pub fn is_ipv4(&self) -> bool {
        self.inner.is_ipv4()
    }
}

impl From<SocketAddr> for SocketAddress {
    fn from(inner: SocketAddr) -> Self {
        Self { inner }
    }
}

impl fmt::Display for SocketAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

/// Exactly four dot-separated decimal octets, each `0..=255`, no
/// surrounding whitespace. Ported from the original's `parse_ipv4`, which
/// rejects anything that is not all-digits-and-dots before splitting; a
/// leading zero in a segment (e.g. `"01"`) is accepted, matching the
/// original's `std::from_chars`-based parsing.
fn parse_ipv4(hostname: &str) -> Option<Ipv4Addr> {
    if hostname.is_empty() || !hostname.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
        return None;
    }
    let parts: Vec<&str> = hostname.split('.').collect();
    if parts.len() != 4 {
        return None;
    }
    let mut octets = [0u8; 4];
    for (slot, part) in octets.iter_mut().zip(parts.iter()) {
        if part.is_empty() {
            return None;
        }
        *slot = part.parse::<u8>().ok()?;
    }
    Some(Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]))
}

/// Colon-hex IPv6 literal with at most one `::` elision. Groups are 1-4 hex
/// digits; a bare `::` alone is the unspecified address.
fn parse_ipv6(hostname: &str) -> Option<Ipv6Addr> {
    if hostname.matches("::").count() > 1 {
        return None;
    }
    let (head, tail, elided) = match hostname.split_once("::") {
        Some((h, t)) => (h, t, true),
        None => (hostname, "", false),
    };

    let head_groups = split_groups(head)?;
    let tail_groups = if elided { split_groups(tail)? } else { Vec::new() };

    if elided {
        let total = head_groups.len() + tail_groups.len();
        if total > 7 {
            return None;
        }
        let mut groups = head_groups;
        groups.resize(8 - tail_groups.len(), 0);
        groups.extend(tail_groups);
        Some(groups_to_addr(&groups))
    } else {
        if head_groups.len() != 8 {
            return None;
        }
        Some(groups_to_addr(&head_groups))
    }
}

/// Splits a (possibly empty) run of colon-separated hex groups. An empty
/// input yields an empty group list (the elided side of a leading/trailing
/// `::`), not an error.
fn split_groups(segment: &str) -> Option<Vec<u16>> {
    if segment.is_empty() {
        return Some(Vec::new());
    }
    segment
        .split(':')
        .map(|group| {
            if group.is_empty() || group.len() > 4 {
                return None;
            }
            u16::from_str_radix(group, 16).ok()
        })
        .collect()
}

fn groups_to_addr(groups: &[u16]) -> Ipv6Addr {
    let g: [u16; 8] = groups.try_into().expect("exactly 8 groups by construction");
    Ipv6Addr::new(g[0], g[1], g[2], g[3], g[4], g[5], g[6], g[7])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_ipv4_parses() {
        let addr = SocketAddress::new("127.0.0.1", 12345).unwrap();
        assert!(addr.is_ipv4());
        assert_eq!(addr.to_string(), "127.0.0.1:12345");
    }

    #[test]
    fn ipv4_rejects_out_of_range_octet() {
        assert_eq!(SocketAddress::new("999.0.0.1", 80), Err(Error::InvalidAddress));
    }

    #[test]
    fn ipv4_accepts_leading_zero_like_the_original_from_chars_parser() {
        let addr = SocketAddress::new("127.0.0.01", 80).unwrap();
        assert_eq!(addr.to_string(), "127.0.0.1:80");
    }

    #[test]
    fn ipv4_rejects_wrong_segment_count() {
        assert_eq!(SocketAddress::new("127.0.1", 80), Err(Error::InvalidAddress));
    }

    #[test]
    fn valid_ipv6_parses() {
        let addr = SocketAddress::new("::1", 80).unwrap();
        assert!(!addr.is_ipv4());
        assert_eq!(addr.as_std().ip().to_string(), "::1");
    }

    #[test]
    fn full_ipv6_without_elision_parses() {
        let addr = SocketAddress::new("2001:db8:0:0:0:0:0:1", 80).unwrap();
        assert_eq!(addr.as_std().ip().to_string(), "2001:db8::1");
    }

    #[test]
    fn ipv6_rejects_double_elision() {
        assert_eq!(SocketAddress::new(":::1", 80), Err(Error::InvalidAddress));
    }

    #[test]
    fn round_trip_through_display_and_parse() {
        let original = SocketAddress::new("10.0.0.5", 9001).unwrap();
        let reparsed = SocketAddress::new("10.0.0.5", 9001).unwrap();
        assert_eq!(original, reparsed);
        assert_eq!(original.to_string(), "10.0.0.5:9001");
    }
}
