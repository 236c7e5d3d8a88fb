//! Blocking address resolution.

use std::fmt;
use std::net::SocketAddr;
use std::ops::BitOr;

use socket2::SockAddr;

use super::host::Host;
use super::spec::{Family, Protocol, Specification, SocketType};
use super::sys;
use crate::error::Error;

/// Hint flags for [`getaddrinfo`], mapped onto the platform constants.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GaiFlags(i32);

impl GaiFlags {
    /// No flags.
    pub const NONE: GaiFlags = GaiFlags(0);
    /// Resolve for binding (wildcard node allowed).
    pub const PASSIVE: GaiFlags = GaiFlags(sys::AI_PASSIVE);
    /// Request the canonical name of the host.
    pub const CANONNAME: GaiFlags = GaiFlags(sys::AI_CANONNAME);
    /// The node is a numeric address; do not resolve.
    pub const NUMERICHOST: GaiFlags = GaiFlags(sys::AI_NUMERICHOST);
    /// The service is a numeric port; do not resolve.
    pub const NUMERICSERV: GaiFlags = GaiFlags(sys::AI_NUMERICSERV);
    /// Map IPv4 results into IPv6 for IPv6 queries.
    pub const V4MAPPED: GaiFlags = GaiFlags(sys::AI_V4MAPPED);
    /// With V4MAPPED, return both native and mapped addresses.
    pub const ALL: GaiFlags = GaiFlags(sys::AI_ALL);
    /// Only return families configured on this machine.
    pub const ADDRCONFIG: GaiFlags = GaiFlags(sys::AI_ADDRCONFIG);

    /// The default hint set for connecting sockets.
    pub fn default_connect() -> GaiFlags {
        GaiFlags::V4MAPPED | GaiFlags::ADDRCONFIG | GaiFlags::ALL
    }

    /// The default hint set for binding sockets.
    pub fn default_bind() -> GaiFlags {
        GaiFlags::default_connect() | GaiFlags::PASSIVE
    }

    /// Whether all bits of `other` are set in `self`.
    pub fn contains(&self, other: GaiFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub(crate) fn bits(&self) -> i32 {
        self.0
    }

    pub(crate) fn from_bits(bits: i32) -> GaiFlags {
        GaiFlags(bits)
    }
}

impl BitOr for GaiFlags {
    type Output = GaiFlags;

    fn bitor(self, other: GaiFlags) -> GaiFlags {
        GaiFlags(self.0 | other.0)
    }
}

/// One resolved address, with the specification it resolves under and the
/// raw socket address storage.
#[derive(Clone)]
pub struct AddressInfo {
    /// Flags reported by resolution.
    pub flags: GaiFlags,
    /// Address family of the result.
    pub family: Family,
    /// Socket type of the result.
    pub socket_type: SocketType,
    /// Protocol of the result.
    pub protocol: Protocol,
    /// Canonical name, when `CANONNAME` was requested.
    pub canon_name: Option<String>,
    /// The socket address. The storage/length invariant is owned by
    /// `SockAddr`, whose buffer is large enough for IPv6.
    pub addr: SockAddr,
}

impl AddressInfo {
    /// Build an `AddressInfo` directly from a socket address, with the
    /// given specification.
    pub fn from_addr(addr: SocketAddr, spec: &Specification) -> AddressInfo {
        let (_, socket_type, protocol) = spec.resolved();
        AddressInfo {
            flags: GaiFlags::NONE,
            family: match addr {
                SocketAddr::V4(_) => Family::Inet,
                SocketAddr::V6(_) => Family::Inet6,
            },
            socket_type,
            protocol,
            canon_name: None,
            addr: SockAddr::from(addr),
        }
    }

    /// The address as a std `SocketAddr`, when it is an internet address.
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        self.addr.as_socket()
    }

    /// The numeric node/service form of the address.
    pub fn numeric_host(&self) -> Option<Host> {
        self.socket_addr().map(numeric_host)
    }
}

impl fmt::Display for AddressInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.socket_addr() {
            Some(addr) => addr.fmt(f),
            None => f.write_str("<non-inet>"),
        }
    }
}

impl fmt::Debug for AddressInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddressInfo")
            .field("family", &self.family)
            .field("socket_type", &self.socket_type)
            .field("protocol", &self.protocol)
            .field("canon_name", &self.canon_name)
            .field("addr", &self.socket_addr())
            .finish()
    }
}

/// The numeric `node:service` form of a socket address. Purely a
/// formatting operation; never performs a reverse lookup.
pub fn numeric_host(addr: SocketAddr) -> Host {
    Host::new(addr.ip().to_string(), addr.port().to_string())
}

fn family_bits(family: Family) -> i32 {
    match family {
        Family::Unspec => sys::AF_UNSPEC,
        Family::Inet => sys::AF_INET,
        Family::Inet6 => sys::AF_INET6,
    }
}

fn family_from_bits(bits: i32) -> Family {
    if bits == sys::AF_INET {
        Family::Inet
    } else if bits == sys::AF_INET6 {
        Family::Inet6
    } else {
        Family::Unspec
    }
}

fn socktype_bits(socket_type: SocketType) -> i32 {
    match socket_type {
        SocketType::Any => 0,
        SocketType::Stream => sys::SOCK_STREAM,
        SocketType::Datagram => sys::SOCK_DGRAM,
    }
}

fn socktype_from_bits(bits: i32) -> SocketType {
    if bits == sys::SOCK_STREAM {
        SocketType::Stream
    } else if bits == sys::SOCK_DGRAM {
        SocketType::Datagram
    } else {
        SocketType::Any
    }
}

fn protocol_bits(protocol: Protocol) -> i32 {
    match protocol {
        Protocol::Any => 0,
        Protocol::Tcp => sys::IPPROTO_TCP,
        Protocol::Udp => sys::IPPROTO_UDP,
    }
}

fn protocol_from_bits(bits: i32) -> Protocol {
    if bits == sys::IPPROTO_TCP {
        Protocol::Tcp
    } else if bits == sys::IPPROTO_UDP {
        Protocol::Udp
    } else {
        Protocol::Any
    }
}

/// Synchronous `getaddrinfo`. Empty node and service become wildcards, as
/// for [`Host`]. Results keep resolution order.
pub fn getaddrinfo(
    host: &Host,
    spec: &Specification,
    flags: GaiFlags,
) -> Result<Vec<AddressInfo>, Error> {
    let (family, socket_type, protocol) = spec.resolved();
    let node = if host.node.is_empty() {
        None
    } else {
        Some(host.node.as_str())
    };
    let service = if host.service.is_empty() {
        None
    } else {
        Some(host.service.as_str())
    };

    let raw = sys::getaddrinfo(
        node,
        service,
        flags.bits(),
        family_bits(family),
        socktype_bits(socket_type),
        protocol_bits(protocol),
    )
    .map_err(Error::new_resolve)?;

    debug!("resolved {} to {} addresses", host, raw.len());

    Ok(raw
        .into_iter()
        .map(|info| AddressInfo {
            flags: GaiFlags::from_bits(info.flags),
            family: family_from_bits(info.family),
            socket_type: socktype_from_bits(info.socktype),
            protocol: protocol_from_bits(info.protocol),
            canon_name: info.canon_name,
            addr: info.addr,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_compose() {
        let flags = GaiFlags::default_bind();
        assert!(flags.contains(GaiFlags::PASSIVE));
        assert!(flags.contains(GaiFlags::V4MAPPED));
        assert!(!flags.contains(GaiFlags::CANONNAME));
    }

    #[test]
    fn numeric_host_formats() {
        let host = numeric_host("127.0.0.1:8080".parse().unwrap());
        assert_eq!(host.node, "127.0.0.1");
        assert_eq!(host.service, "8080");
    }

    #[test]
    fn resolve_loopback() {
        let addrs = getaddrinfo(
            &Host::parse("127.0.0.1:80"),
            &Specification::new(Family::Inet, SocketType::Stream, Protocol::Tcp),
            GaiFlags::NUMERICHOST | GaiFlags::NUMERICSERV,
        )
        .expect("loopback resolves");
        assert!(!addrs.is_empty());
        assert_eq!(
            addrs[0].socket_addr().unwrap().to_string(),
            "127.0.0.1:80"
        );
    }
}
