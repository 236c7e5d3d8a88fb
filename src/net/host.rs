//! Node/service naming for internet addresses.

use std::fmt;

/// A node/service pair naming one endpoint, in `node:service` notation.
///
/// An empty node means "all interfaces" when binding; an empty service means
/// an ephemeral port. Both are passed as wildcards to address resolution.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Host {
    /// Hostname or numeric address.
    pub node: String,
    /// Service name or numeric port.
    pub service: String,
}

impl Host {
    /// Build from explicit node and service parts.
    pub fn new<N: Into<String>, S: Into<String>>(node: N, service: S) -> Host {
        Host {
            node: node.into(),
            service: service.into(),
        }
    }

    /// Parse `node:service` notation, splitting at the first `:`. A string
    /// without a colon is all node.
    pub fn parse(s: &str) -> Host {
        match s.find(':') {
            Some(at) => Host {
                node: s[..at].to_owned(),
                service: s[at + 1..].to_owned(),
            },
            None => Host {
                node: s.to_owned(),
                service: String::new(),
            },
        }
    }

    /// The numeric port, if the service is numeric.
    pub fn port(&self) -> Option<u16> {
        self.service.parse().ok()
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // A ':' appears only if there is a service, or the host is entirely
        // empty.
        if self.service.is_empty() {
            if self.node.is_empty() {
                f.write_str(":")
            } else {
                f.write_str(&self.node)
            }
        } else {
            write!(f, "{}:{}", self.node, self.service)
        }
    }
}

impl From<&str> for Host {
    fn from(s: &str) -> Host {
        Host::parse(s)
    }
}

impl From<(&str, u16)> for Host {
    fn from((node, port): (&str, u16)) -> Host {
        Host::new(node, port.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::Host;

    #[test]
    fn parse_splits_at_first_colon() {
        let host = Host::parse("example.com:25");
        assert_eq!(host.node, "example.com");
        assert_eq!(host.service, "25");
        assert_eq!(host.port(), Some(25));

        let host = Host::parse("a:b:c");
        assert_eq!(host.node, "a");
        assert_eq!(host.service, "b:c");
    }

    #[test]
    fn wildcards() {
        let host = Host::parse(":0");
        assert_eq!(host.node, "");
        assert_eq!(host.service, "0");

        let host = Host::parse("");
        assert_eq!(host.node, "");
        assert_eq!(host.service, "");
        assert_eq!(host.to_string(), ":");
    }

    #[test]
    fn display_round_trip() {
        for s in &["example.com:80", "example.com", ":0"] {
            assert_eq!(Host::parse(s).to_string(), *s);
        }
    }
}
