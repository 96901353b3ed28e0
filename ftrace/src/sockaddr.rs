//! # Socket Address Decoder
//!
//! Reconstructs an address and port from the raw values a connect/accept probe
//! dumps out of one register's memory block.
//!
//! The block is read twice, once as a `struct addrinfo` and once as a
//! `struct sockaddr_in`/`sockaddr_in6`. The first layout that carries an inet
//! family wins:
//!
//! 1. `info_family ∈ {AF_INET, AF_INET6}` and `info_socktype ∈ {STREAM, DGRAM, RAW}`
//! 2. `sock_family ∈ {AF_INET, AF_INET6}`
//! 3. otherwise nothing is resolved
//!
//! Values were fetched as host-order integers from network-order memory, so
//! every multi-byte field comes back byte-reversed.

use std::net::{Ipv4Addr, Ipv6Addr};

use log::warn;

use crate::domain::DecodeError;
use crate::event::Endpoint;
use crate::probes::ParameterKind;

/// Parameter names the decoder reads its inputs from
pub mod fields {
    pub const INFO_FAMILY: &str = "info_family";
    pub const INFO_SOCKTYPE: &str = "info_socktype";
    pub const INFO_IPV4: &str = "info_ipv4";
    pub const INFO_IPV6_HIGH: &str = "info_ipv6_high";
    pub const INFO_IPV6_LOW: &str = "info_ipv6_low";
    pub const INFO_PORT: &str = "info_port";
    pub const SOCK_IPV4: &str = "sock_ipv4";
    pub const SOCK_IPV6_HIGH: &str = "sock_ipv6_high";
    pub const SOCK_IPV6_LOW: &str = "sock_ipv6_low";
    pub const SOCK_FAMILY: &str = "sock_family";
    pub const SOCK_PORT: &str = "sock_port";
}

/// One candidate address layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawAddress {
    pub family: i64,
    pub ipv4: u64,
    pub ipv6_high: u64,
    pub ipv6_low: u64,
    pub port: i64,
}

/// Raw values of both candidate layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AddressInfo {
    pub info: RawAddress,
    pub info_socktype: i64,
    pub sock: RawAddress,
}

impl AddressInfo {
    /// Assemble from `(parameter name, kind, raw integer)` triples
    ///
    /// Names the decoder does not know are ignored; missing names stay zero.
    ///
    /// # Errors
    /// Returns [`DecodeError`] when a value does not fit the field it lands in.
    pub fn from_named<'a>(
        values: impl IntoIterator<Item = (&'a str, ParameterKind, i128)>,
    ) -> Result<Self, DecodeError> {
        let mut info = Self::default();

        for (name, kind, raw) in values {
            let signed = || i64::try_from(raw).map_err(|_| DecodeError::new(kind, raw.to_string()));
            let unsigned = || u64::try_from(raw).map_err(|_| DecodeError::new(kind, raw.to_string()));

            match name {
                fields::INFO_FAMILY => info.info.family = signed()?,
                fields::INFO_SOCKTYPE => info.info_socktype = signed()?,
                fields::INFO_IPV4 => info.info.ipv4 = unsigned()?,
                fields::INFO_IPV6_HIGH => info.info.ipv6_high = unsigned()?,
                fields::INFO_IPV6_LOW => info.info.ipv6_low = unsigned()?,
                fields::INFO_PORT => info.info.port = signed()?,
                fields::SOCK_FAMILY => info.sock.family = signed()?,
                fields::SOCK_IPV4 => info.sock.ipv4 = unsigned()?,
                fields::SOCK_IPV6_HIGH => info.sock.ipv6_high = unsigned()?,
                fields::SOCK_IPV6_LOW => info.sock.ipv6_low = unsigned()?,
                fields::SOCK_PORT => info.sock.port = signed()?,
                _ => {}
            }
        }

        Ok(info)
    }
}

fn is_inet(family: i64) -> bool {
    family == i64::from(libc::AF_INET) || family == i64::from(libc::AF_INET6)
}

fn is_socket_type(socktype: i64) -> bool {
    [libc::SOCK_STREAM, libc::SOCK_DGRAM, libc::SOCK_RAW]
        .iter()
        .any(|&t| socktype == i64::from(t))
}

/// Pick the populated layout and decode it
#[must_use]
pub fn resolve(info: &AddressInfo) -> Endpoint {
    if is_inet(info.info.family) && is_socket_type(info.info_socktype) {
        reconstruct(&info.info)
    } else if is_inet(info.sock.family) {
        reconstruct(&info.sock)
    } else {
        Endpoint::default()
    }
}

/// Decode one layout; address and port fail independently
#[must_use]
pub fn reconstruct(raw: &RawAddress) -> Endpoint {
    let address = if raw.family == i64::from(libc::AF_INET) {
        ipv4_from_word(raw.ipv4).map(|addr| addr.to_string())
    } else if raw.family == i64::from(libc::AF_INET6) {
        Some(ipv6_from_halves(raw.ipv6_high, raw.ipv6_low).to_string())
    } else {
        None
    };

    Endpoint { address, port: port_from_raw(raw.port) }
}

/// `0x0100007F` → `127.0.0.1`
#[must_use]
pub fn ipv4_from_word(word: u64) -> Option<Ipv4Addr> {
    match u32::try_from(word) {
        Ok(word) => Some(Ipv4Addr::from(word.to_le_bytes())),
        Err(_) => {
            warn!("IPv4 word {word:#x} does not fit in 32 bits");
            None
        }
    }
}

/// Join two byte-reversed 64-bit halves, high half first
#[must_use]
pub fn ipv6_from_halves(high: u64, low: u64) -> Ipv6Addr {
    let high = u128::from(high.swap_bytes());
    let low = u128::from(low.swap_bytes());
    Ipv6Addr::from((high << 64) | low)
}

/// 16-bit byte swap; values outside `u16` resolve to no port
#[must_use]
pub fn port_from_raw(raw: i64) -> Option<u16> {
    match u16::try_from(raw) {
        Ok(port) => Some(port.swap_bytes()),
        Err(_) => {
            warn!("Port value {raw} does not fit in 16 bits, reporting no port");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AF_INET: i64 = libc::AF_INET as i64;
    const AF_INET6: i64 = libc::AF_INET6 as i64;

    #[test]
    fn test_ipv4_byte_order() {
        assert_eq!(ipv4_from_word(0x0100_007F), Some(Ipv4Addr::new(127, 0, 0, 1)));
        assert_eq!(ipv4_from_word(0x0101_A8C0), Some(Ipv4Addr::new(192, 168, 1, 1)));
        assert_eq!(ipv4_from_word(1 << 32), None);
    }

    #[test]
    fn test_ipv6_loopback() {
        let addr = ipv6_from_halves(0, 0x0100_0000_0000_0000);
        assert_eq!(addr.to_string(), "::1");
    }

    #[test]
    fn test_ipv6_documentation_prefix() {
        // 2001:db8::1 as two little-endian reads of the in6_addr bytes
        let addr = ipv6_from_halves(0x0000_0000_B80D_0120, 0x0100_0000_0000_0000);
        assert_eq!(addr.to_string(), "2001:db8::1");
    }

    #[test]
    fn test_port_swap() {
        assert_eq!(port_from_raw(0x3905), Some(1337));
        assert_eq!(port_from_raw(0x5000), Some(80));
        assert_eq!(port_from_raw(65_536), None);
        assert_eq!(port_from_raw(-1), None);
    }

    #[test]
    fn test_resolve_prefers_addrinfo() {
        let info = AddressInfo {
            info: RawAddress { family: AF_INET, ipv4: 0x0100_007F, port: 0x3905, ..Default::default() },
            info_socktype: 1,
            sock: RawAddress { family: AF_INET, ipv4: 0x0101_A8C0, port: 0x5000, ..Default::default() },
        };
        let endpoint = resolve(&info);
        assert_eq!(endpoint.address.as_deref(), Some("127.0.0.1"));
        assert_eq!(endpoint.port, Some(1337));
    }

    #[test]
    fn test_resolve_falls_back_to_sockaddr() {
        let info = AddressInfo {
            info: RawAddress { family: AF_INET, ..Default::default() },
            info_socktype: 0,
            sock: RawAddress { family: AF_INET6, ipv6_low: 0x0100_0000_0000_0000, port: 0x5000, ..Default::default() },
        };
        let endpoint = resolve(&info);
        assert_eq!(endpoint.address.as_deref(), Some("::1"));
        assert_eq!(endpoint.port, Some(80));
    }

    #[test]
    fn test_resolve_unknown_family() {
        let info = AddressInfo {
            sock: RawAddress { family: 1, port: 0x3905, ..Default::default() },
            ..Default::default()
        };
        assert_eq!(resolve(&info), Endpoint::default());
    }

    #[test]
    fn test_port_overflow_keeps_address() {
        let raw = RawAddress { family: AF_INET, ipv4: 0x0100_007F, port: 70_000, ..Default::default() };
        let endpoint = reconstruct(&raw);
        assert_eq!(endpoint.address.as_deref(), Some("127.0.0.1"));
        assert_eq!(endpoint.port, None);
    }

    #[test]
    fn test_from_named_maps_fields() {
        let info = AddressInfo::from_named([
            (fields::SOCK_FAMILY, ParameterKind::Short, 2),
            (fields::SOCK_PORT, ParameterKind::UnsignedShort, 0x3905),
            (fields::SOCK_IPV4, ParameterKind::UnsignedInt, 0x0100_007F),
            ("unrelated", ParameterKind::Int, 7),
        ])
        .unwrap();
        assert_eq!(info.sock.family, 2);
        assert_eq!(info.sock.port, 0x3905);
        assert_eq!(info.sock.ipv4, 0x0100_007F);
        assert_eq!(info.info, RawAddress::default());
    }

    #[test]
    fn test_from_named_rejects_negative_word() {
        let err = AddressInfo::from_named([(fields::INFO_IPV4, ParameterKind::UnsignedInt, -1)])
            .unwrap_err();
        assert_eq!(err.kind, ParameterKind::UnsignedInt);
    }
}
