//! Socket specifications: family, type, and protocol selection.

use socket2::{Domain, Protocol as SockProtocol, Type};

/// Address/protocol family. The two are interchangeable on every supported
/// platform, so a single enumeration covers both.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Family {
    /// Unspecified; lets resolution pick.
    Unspec,
    /// IPv4.
    Inet,
    /// IPv6 (dual-stack by default on sockets created by this crate).
    Inet6,
}

/// Kernel socket type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SocketType {
    /// Any type; lets resolution pick.
    Any,
    /// Connection-oriented stream.
    Stream,
    /// Datagram.
    Datagram,
}

/// Transport protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// Any protocol; lets resolution pick.
    Any,
    /// TCP.
    Tcp,
    /// UDP.
    Udp,
}

/// An immutable (family, type, protocol) triple. A `None` field is the
/// "default" sentinel, replaced during [`merge`](Specification::merge) or
/// resolved to the crate defaults (IPv6 stream TCP) at socket creation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Specification {
    /// Address/protocol family, `None` for default.
    pub family: Option<Family>,
    /// Socket type, `None` for default.
    pub socket_type: Option<SocketType>,
    /// Transport protocol, `None` for default.
    pub protocol: Option<Protocol>,
}

impl Specification {
    /// The crate default: IPv6, stream, TCP.
    pub const TCP: Specification = Specification {
        family: Some(Family::Inet6),
        socket_type: Some(SocketType::Stream),
        protocol: Some(Protocol::Tcp),
    };

    /// Build a fully-specified triple.
    pub fn new(family: Family, socket_type: SocketType, protocol: Protocol) -> Specification {
        Specification {
            family: Some(family),
            socket_type: Some(socket_type),
            protocol: Some(protocol),
        }
    }

    /// Replace default (unset) fields of `self` with the corresponding
    /// fields of `original`.
    pub fn merge(&self, original: &Specification) -> Specification {
        Specification {
            family: self.family.or(original.family),
            socket_type: self.socket_type.or(original.socket_type),
            protocol: self.protocol.or(original.protocol),
        }
    }

    /// Resolve remaining defaults to the concrete crate defaults.
    pub fn resolved(&self) -> (Family, SocketType, Protocol) {
        (
            self.family.unwrap_or(Family::Inet6),
            self.socket_type.unwrap_or(SocketType::Stream),
            self.protocol.unwrap_or(Protocol::Tcp),
        )
    }

    pub(crate) fn domain(&self) -> Domain {
        match self.resolved().0 {
            // UNSPEC only makes sense as a resolution hint; a concrete
            // socket needs a family.
            Family::Unspec | Family::Inet6 => Domain::IPV6,
            Family::Inet => Domain::IPV4,
        }
    }

    pub(crate) fn sock_type(&self) -> Type {
        match self.resolved().1 {
            SocketType::Any | SocketType::Stream => Type::STREAM,
            SocketType::Datagram => Type::DGRAM,
        }
    }

    pub(crate) fn sock_protocol(&self) -> Option<SockProtocol> {
        match self.resolved().2 {
            Protocol::Any => None,
            Protocol::Tcp => Some(SockProtocol::TCP),
            Protocol::Udp => Some(SockProtocol::UDP),
        }
    }
}
