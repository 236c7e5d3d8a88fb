//! Client role: an outbound connected socket with bounded operations.

use std::sync::Arc;
use std::time::Duration;

use super::host::Host;
use super::resolve::{AddressInfo, GaiFlags};
use super::socket::Socket;
use super::spec::Specification;
use crate::error::{Error, Result};
use crate::time::Timeout;

/// Options for client connection establishment.
#[derive(Clone, Debug)]
pub struct ConnectOptions {
    /// Race all resolved addresses in parallel rather than serially.
    pub parallel: bool,
    /// Time allowed for the whole connect (per-address when serial).
    pub timeout: Duration,
    /// Resolution hints; defaults filled from the socket's specification.
    pub gai_spec: Specification,
    /// Resolution flags.
    pub gai_flags: GaiFlags,
}

impl Default for ConnectOptions {
    fn default() -> ConnectOptions {
        ConnectOptions {
            parallel: true,
            timeout: Duration::from_secs(60),
            gai_spec: Specification::default(),
            gai_flags: GaiFlags::default_connect(),
        }
    }
}

/// An outbound connection.
///
/// A client is a [`Socket`] with the listen/accept surface hidden by
/// convention. With finite timeouts (the defaults), every operation
/// completes in bounded wall time even against an unresponsive peer.
/// Movable, not copyable.
#[derive(Debug)]
pub struct Client {
    socket: Arc<Socket>,
}

impl Client {
    /// Create an unconnected client socket.
    pub fn new(spec: Specification, interruptable: bool) -> Result<Client> {
        Ok(Client {
            socket: Arc::new(Socket::new(spec, interruptable)?),
        })
    }

    /// Resolve `host` and connect, with the default TCP specification.
    pub fn connect(host: &Host, options: &ConnectOptions) -> Result<Client> {
        let client = Client::new(Specification::TCP, true)?;
        client.connect_host(host, options)?;
        Ok(client)
    }

    /// Resolve `host` and connect this client.
    pub fn connect_host(&self, host: &Host, options: &ConnectOptions) -> Result<()> {
        let timed_out = self.socket.connect_host(
            host,
            options.parallel,
            Timeout::new(options.timeout),
            &options.gai_spec,
            options.gai_flags,
        )?;
        if timed_out {
            return Err(Error::new_connect(crate::error::TimedOut));
        }
        Ok(())
    }

    /// Connect to pre-resolved addresses.
    pub fn connect_addrs(&self, addrs: &[AddressInfo], options: &ConnectOptions) -> Result<()> {
        let timed_out =
            self.socket
                .connect_addrs(addrs, options.parallel, Timeout::new(options.timeout))?;
        if timed_out {
            return Err(Error::new_connect(crate::error::TimedOut));
        }
        Ok(())
    }

    /// The underlying socket.
    pub fn socket(&self) -> &Socket {
        &self.socket
    }

    /// Take the socket out of the client, shared.
    pub fn into_socket(self) -> Arc<Socket> {
        self.socket
    }

    /// Graceful close; `true` on timeout. Safe to call repeatedly.
    pub fn close(&self, timeout: Timeout) -> Result<bool> {
        self.socket.close(timeout)
    }

    /// Immediate close.
    pub fn abort(&self) {
        self.socket.abort()
    }
}
