//! The HTTP server: worker loop, handler dispatch, error mapping.

use std::io;
use std::sync::Arc;

use super::request::{self, Request};
use super::response::Response;
use super::status::StatusCode;
use super::version::Version;
use crate::error::{Kind, Parse, Result};
use crate::net::host::Host;
use crate::net::resolve::AddressInfo;
use crate::net::server::{self, ServeOptions};
use crate::net::spec::Specification;
use crate::proto::Message;
use crate::stream::{SocketStream, StreamConfig};
use crate::time::{Timeout, DEFAULT_TIMEOUT};

/// What a [`Handler`] wants done with one request: either no response and
/// an abortive close, or a response, optionally followed by closing.
#[derive(Debug)]
pub struct PreResponse {
    response: Option<Response<'static>>,
    close: bool,
}

impl PreResponse {
    /// Send no response and abort the connection.
    pub fn abort() -> PreResponse {
        PreResponse {
            response: None,
            close: true,
        }
    }

    /// Send a response and keep the connection open (subject to the
    /// protocol's own keep-alive rules).
    pub fn send(response: Response<'static>) -> PreResponse {
        PreResponse {
            response: Some(response),
            close: false,
        }
    }

    /// Send a response, then gracefully close.
    pub fn send_and_close(response: Response<'static>) -> PreResponse {
        PreResponse {
            response: Some(response),
            close: true,
        }
    }

    fn into_parts(self) -> (Option<Response<'static>>, bool) {
        (self.response, self.close)
    }
}

/// Application logic for an HTTP server.
///
/// The handler is shared across workers; per-connection state lives in
/// the request. A handler that panics aborts only its own connection.
pub trait Handler: Send + Sync + 'static {
    /// Produce the response for one request.
    fn handle(&self, request: &mut Request<'_>) -> PreResponse;
}

impl<F> Handler for F
where
    F: Fn(&mut Request<'_>) -> PreResponse + Send + Sync + 'static,
{
    fn handle(&self, request: &mut Request<'_>) -> PreResponse {
        (self)(request)
    }
}

/// An HTTP server: the socket-runtime [`server`](crate::net::Server)
/// specialized with the HTTP worker loop.
pub struct Server<H> {
    core: server::Server,
    handler: Arc<H>,
    stream_config: StreamConfig,
}

impl<H: Handler> Server<H> {
    /// A server with the default TCP specification, 1024 worker threads,
    /// and default stream configuration.
    pub fn new(handler: H) -> Result<Server<H>> {
        Server::with_config(
            Specification::TCP,
            1024,
            StreamConfig::default(),
            handler,
        )
    }

    /// Full-control constructor.
    pub fn with_config(
        spec: Specification,
        max_threads: usize,
        stream_config: StreamConfig,
        handler: H,
    ) -> Result<Server<H>> {
        Ok(Server {
            core: server::Server::new(spec, max_threads)?,
            handler: Arc::new(handler),
            stream_config,
        })
    }

    /// Bind, listen, and start accepting.
    pub fn serve(&self, host: &Host, options: ServeOptions) -> Result<()> {
        let handler = Arc::clone(&self.handler);
        let stream_config = self.stream_config.clone();
        self.core.serve(host, options, move |socket, peer| Worker {
            stream: SocketStream::new(socket, stream_config.clone()),
            peer,
            handler: Arc::clone(&handler),
        })
    }

    /// The numeric bound address.
    pub fn local_host(&self) -> Result<Host> {
        self.core.local_host()
    }

    /// The shared handler.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Graceful shutdown; `true` if draining timed out.
    pub fn close(&self, timeout: Timeout) -> bool {
        self.core.close(timeout)
    }

    /// Abortive shutdown.
    pub fn abort(&self) {
        self.core.abort()
    }

    /// Block until all workers finished; `true` on timeout.
    pub fn block_for_tasks(&self, timeout: Timeout) -> bool {
        self.core.block_for_tasks(timeout)
    }
}

impl<H> std::fmt::Debug for Server<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("http::Server").field("core", &self.core).finish()
    }
}

/// One HTTP connection session.
struct Worker<H> {
    stream: SocketStream,
    peer: AddressInfo,
    handler: Arc<H>,
}

impl<H: Handler> server::Worker for Worker<H> {
    fn on_work(&mut self) -> Result<()> {
        trace!("http worker for {}", self.peer);
        serve_connection(&mut self.stream, &*self.handler)
    }
}

/// The request/response loop over one connection.
fn serve_connection<H: Handler>(stream: &mut SocketStream, handler: &H) -> Result<()> {
    loop {
        stream.reset_recv_deadline();

        // The head is parsed on its own first: it is fully owned, so a
        // parse failure leaves the stream free for the error response.
        let head = match request::read_head(&mut *stream) {
            Ok(Some(head)) => head,
            // Peer finished cleanly between messages.
            Ok(None) => return Ok(()),
            Err(err) => return recv_error(stream, err),
        };

        let (pre, version, peer_wants_close) = {
            let mut request = Request::assemble(head, &mut *stream);
            let version = request.version;
            let pre = handler.handle(&mut request);
            // Drain whatever the handler left of the body, so the next
            // request starts at a message boundary.
            let _ = io::copy(&mut request.body, &mut io::sink());
            (pre, version, request.headers.connection_close())
        };

        let (response, close_after) = pre.into_parts();
        let mut response = match response {
            Some(response) => response,
            None => {
                stream.socket().abort();
                return Ok(());
            }
        };

        // A 0.9 request can only be answered in kind.
        if version == Version::Http09 {
            response.version = Version::Http09;
        }

        let close = close_after
            || version != Version::Http11
            || response.version != Version::Http11
            || peer_wants_close
            || response.headers.connection_close();

        response.send_with(stream)?;

        if close {
            stream.socket().close(Timeout::new(DEFAULT_TIMEOUT))?;
            return Ok(());
        }
    }
}

/// Map a failed request parse to the wire, then gracefully close:
/// unsupported version is 505, unknown method 405, malformed input 400,
/// anything else with a response still possible 500. Timeouts, interrupts,
/// and a peer that died mid-message abort without a response.
fn recv_error(stream: &mut SocketStream, err: crate::Error) -> Result<()> {
    if err.is_timeout() || err.is_incomplete_message() {
        stream.socket().abort();
        return Ok(());
    }

    let status = match err.kind() {
        Kind::Parse(Parse::Version) => StatusCode::HttpVersionNotSupported,
        Kind::Parse(Parse::Method) => StatusCode::MethodNotAllowed,
        Kind::Parse(_) => StatusCode::BadRequest,
        Kind::Io => {
            // The transport failed; nothing can be sent back.
            stream.socket().abort();
            return Err(err);
        }
        _ => StatusCode::InternalServerError,
    };
    debug!("request parse failed ({}), responding {}", err, status);

    let mut response = Response::new(status);
    if response.send_with(stream).is_ok() {
        let _ = stream.socket().close(Timeout::new(DEFAULT_TIMEOUT));
    } else {
        stream.socket().abort();
    }
    Ok(())
}
