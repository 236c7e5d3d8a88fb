//! The HTTP client.

use super::request::Request;
use super::response::Response;
use crate::error::Result;
use crate::net::client::{self, ConnectOptions};
use crate::net::host::Host;
use crate::net::resolve::AddressInfo;
use crate::net::socket::Socket;
use crate::proto::Message;
use crate::stream::{SocketStream, StreamConfig};
use crate::time::Timeout;

/// A blocking HTTP client over one connection.
///
/// Requests are sent and responses received strictly in turn; a received
/// response's body borrows the client until it is read or dropped. With
/// the default finite timeouts, every operation completes in bounded wall
/// time even against an unresponsive peer.
#[derive(Debug)]
pub struct Client {
    stream: SocketStream,
}

impl Client {
    /// Connect to a host with default stream configuration.
    pub fn connect(host: &Host, options: &ConnectOptions) -> Result<Client> {
        Client::connect_with(host, options, StreamConfig::default())
    }

    /// Connect with explicit stream configuration.
    pub fn connect_with(
        host: &Host,
        options: &ConnectOptions,
        stream_config: StreamConfig,
    ) -> Result<Client> {
        let client = client::Client::connect(host, options)?;
        Ok(Client {
            stream: SocketStream::new(client.into_socket(), stream_config),
        })
    }

    /// Connect to pre-resolved addresses.
    pub fn connect_addrs(addrs: &[AddressInfo], options: &ConnectOptions) -> Result<Client> {
        let client = client::Client::new(crate::net::spec::Specification::TCP, true)?;
        client.connect_addrs(addrs, options)?;
        Ok(Client {
            stream: SocketStream::new(client.into_socket(), StreamConfig::default()),
        })
    }

    /// Send one request.
    pub fn send(&mut self, request: &mut Request<'_>) -> Result<()> {
        request.send_with(&mut self.stream)
    }

    /// Receive one response. Restarts the recv idle clock.
    pub fn recv(&mut self) -> Result<Response<'_>> {
        self.stream.reset_recv_deadline();
        Response::recv_with(&mut self.stream)
    }

    /// The underlying socket.
    pub fn socket(&self) -> &Socket {
        self.stream.socket()
    }

    /// Graceful close; `true` on timeout. Idempotent.
    pub fn close(&self, timeout: Timeout) -> Result<bool> {
        self.stream.socket().close(timeout)
    }

    /// Immediate close.
    pub fn abort(&self) {
        self.stream.socket().abort()
    }
}
