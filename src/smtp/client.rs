//! The SMTP client, including MX-directed connection.

use super::request::Request;
use super::response::Response;
use crate::error::{Error, Result};
use crate::net::client::{self, ConnectOptions};
use crate::net::dns;
use crate::net::host::Host;
use crate::net::resolve::{self, GaiFlags};
use crate::net::socket::Socket;
use crate::net::spec::Specification;
use crate::proto::Message;
use crate::stream::{SocketStream, StreamConfig};
use crate::time::Timeout;

/// A blocking SMTP client over one connection.
///
/// The protocol exchange (greeting, EHLO, and so on) is driven by the
/// caller with [`send`](Client::send) and [`recv`](Client::recv).
#[derive(Debug)]
pub struct Client {
    stream: SocketStream,
}

impl Client {
    /// Connect to an explicit host with default stream configuration.
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

    /// Connect to the mail exchangers of `domain`: query its MX records,
    /// resolve each exchanger in ascending preference order, and connect
    /// to the first that answers on port 25.
    pub fn connect_mx(domain: &str, options: &ConnectOptions) -> Result<Client> {
        let records = dns::lookup_mx(domain, Timeout::new(options.timeout))?;
        if records.is_empty() {
            return Err(Error::new_dns("domain has no MX records"));
        }

        let mut first_err: Option<Error> = None;
        for record in &records {
            debug!(
                "trying exchanger {} (preference {})",
                record.exchange, record.preference
            );
            let exchanger = Host::new(record.exchange.clone(), "25");
            let addrs = match resolve::getaddrinfo(
                &exchanger,
                &options.gai_spec.merge(&Specification::TCP),
                GaiFlags::default_connect(),
            ) {
                Ok(addrs) => addrs,
                Err(err) => {
                    if first_err.is_none() {
                        first_err = Some(err);
                    }
                    continue;
                }
            };

            let client = client::Client::new(Specification::TCP, true)?;
            match client.connect_addrs(&addrs, options) {
                Ok(()) => {
                    return Ok(Client {
                        stream: SocketStream::new(
                            client.into_socket(),
                            StreamConfig::default(),
                        ),
                    })
                }
                Err(err) => {
                    if first_err.is_none() {
                        first_err = Some(err);
                    }
                }
            }
        }

        Err(first_err.unwrap_or_else(|| Error::new_connect("no exchanger accepted")))
    }

    /// Send one command.
    pub fn send(&mut self, request: &mut Request) -> Result<()> {
        request.send_with(&mut self.stream)
    }

    /// Receive one (possibly multiline) reply. Restarts the recv idle
    /// clock.
    pub fn recv(&mut self) -> Result<Response> {
        self.stream.reset_recv_deadline();
        Response::recv_with(&mut self.stream)
    }

    /// Send one bare CRLF-terminated line, as the `AUTH` challenge
    /// exchanges require.
    pub fn send_line(&mut self, line: &str) -> Result<()> {
        use std::io::Write;
        write!(self.stream, "{}\r\n", line)?;
        self.stream.flush()?;
        Ok(())
    }

    /// Send a mail body after `DATA` was accepted, followed by the
    /// `CRLF . CRLF` terminator. Dot-stuffing is the caller's concern.
    pub fn send_data(&mut self, data: &[u8]) -> Result<()> {
        use std::io::Write;
        self.stream.write_all(data)?;
        self.stream.write_all(b"\r\n.\r\n")?;
        self.stream.flush()?;
        Ok(())
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
