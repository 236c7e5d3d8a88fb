//! The SMTP server: session state machine and per-verb dispatch.

use std::collections::HashSet;
use std::io::{self, BufRead};
use std::sync::Arc;

use super::auth::AuthMethod;
use super::body::DataReader;
use super::command::Command;
use super::mailbox::Mailbox;
use super::request::{Request, MAX_PARAMETER};
use super::response::Response;
use super::status::StatusCode;
use crate::error::{Error, Kind, Parse, Result};
use crate::net::host::Host;
use crate::net::resolve::AddressInfo;
use crate::net::server::{self, ServeOptions};
use crate::net::spec::Specification;
use crate::proto::Message;
use crate::stream::{SocketStream, StreamConfig};
use crate::time::{Timeout, DEFAULT_TIMEOUT};

/// Per-connection mail transaction state. `RSET` clears it.
#[derive(Debug, Default)]
pub struct Session {
    /// The envelope sender accepted by `MAIL FROM`.
    pub mail_from: Option<Mailbox>,
    /// The envelope recipients accepted by `RCPT TO`.
    pub rcpt_to: HashSet<Mailbox>,
}

impl Session {
    /// A fresh, empty transaction.
    pub fn new() -> Session {
        Session::default()
    }

    /// Forget the transaction in progress.
    pub fn reset(&mut self) {
        self.mail_from = None;
        self.rcpt_to.clear();
    }
}

/// What a handler wants done with one command: either no reply and an
/// abortive close, or a reply, optionally followed by closing.
#[derive(Debug)]
pub struct PreResponse {
    response: Option<Response>,
    close: bool,
}

impl PreResponse {
    /// Reply with just a status code (and its default reason phrase).
    pub fn reply(status: StatusCode) -> PreResponse {
        PreResponse {
            response: Some(Response::new(status)),
            close: false,
        }
    }

    /// Reply with a full response.
    pub fn reply_with(response: Response) -> PreResponse {
        PreResponse {
            response: Some(response),
            close: false,
        }
    }

    /// Reply, then gracefully close the connection.
    pub fn reply_and_close(response: Response) -> PreResponse {
        PreResponse {
            response: Some(response),
            close: true,
        }
    }

    /// Send nothing and abort.
    pub fn abort() -> PreResponse {
        PreResponse {
            response: None,
            close: true,
        }
    }

    fn into_parts(self) -> (Option<Response>, bool) {
        (self.response, self.close)
    }
}

/// Extract the mailbox from a `MAIL FROM:<a@b>` / `RCPT TO:<a@b>`
/// parameter.
fn mailbox_parameter(parameter: &str, prefix: &str) -> Result<Mailbox> {
    if parameter.len() < prefix.len() || !parameter[..prefix.len()].eq_ignore_ascii_case(prefix) {
        return Err(Parse::Mailbox.into());
    }
    let rest = parameter[prefix.len()..].trim();
    let inner = rest
        .strip_prefix('<')
        .and_then(|rest| rest.strip_suffix('>'))
        .ok_or_else(|| Error::from(Parse::Mailbox))?;
    inner.parse()
}

/// Application logic for an SMTP server, as per-verb hooks with the
/// protocol's default behaviors.
///
/// Every hook receives the live [`Session`]; overriding a hook replaces
/// the default entirely. Dot-stuffing of `DATA` bodies is not undone by
/// the reader handed to [`on_data`](Handler::on_data).
pub trait Handler: Send + Sync + 'static {
    /// `HELO`; default 250.
    fn on_helo(&self, _session: &mut Session, _request: &Request) -> PreResponse {
        PreResponse::reply(StatusCode::RequestCompleted)
    }

    /// `EHLO`; defaults to the `HELO` behavior.
    fn on_ehlo(&self, session: &mut Session, request: &Request) -> PreResponse {
        self.on_helo(session, request)
    }

    /// `MAIL FROM:<...>`; default records the sender and replies 250.
    fn on_mail(&self, session: &mut Session, request: &Request) -> PreResponse {
        match mailbox_parameter(&request.parameter, "FROM:") {
            Ok(mailbox) => {
                session.mail_from = Some(mailbox);
                PreResponse::reply(StatusCode::RequestCompleted)
            }
            Err(_) => PreResponse::reply(StatusCode::SyntaxErrorParameter),
        }
    }

    /// `RCPT TO:<...>` after the mailbox parsed; default records the
    /// recipient and replies 250. Reply 550 here to refuse a mailbox.
    fn on_rcpt_mailbox(&self, session: &mut Session, mailbox: Mailbox) -> PreResponse {
        session.rcpt_to.insert(mailbox);
        PreResponse::reply(StatusCode::RequestCompleted)
    }

    /// `RCPT TO:<...>`; default parses and delegates to
    /// [`on_rcpt_mailbox`](Handler::on_rcpt_mailbox).
    fn on_rcpt(&self, session: &mut Session, request: &Request) -> PreResponse {
        match mailbox_parameter(&request.parameter, "TO:") {
            Ok(mailbox) => self.on_rcpt_mailbox(session, mailbox),
            Err(_) => PreResponse::reply(StatusCode::SyntaxErrorParameter),
        }
    }

    /// The mail body after `DATA` was accepted with 354. The reader ends
    /// at the `CRLF . CRLF` boundary; the returned reply concludes the
    /// transaction. Default discards the data and fails the transaction.
    fn on_data(&self, _session: &mut Session, data: &mut dyn BufRead) -> PreResponse {
        let _ = io::copy(data, &mut io::sink());
        PreResponse::reply(StatusCode::TransactionFailed)
    }

    /// `RSET`; default clears the session and replies 250 OK.
    fn on_rset(&self, session: &mut Session, _request: &Request) -> PreResponse {
        session.reset();
        PreResponse::reply_with(Response::with_line(StatusCode::RequestCompleted, "OK"))
    }

    /// `NOOP`; default 250 OK.
    fn on_noop(&self, _session: &mut Session, _request: &Request) -> PreResponse {
        PreResponse::reply_with(Response::with_line(StatusCode::RequestCompleted, "OK"))
    }

    /// `QUIT`; default 221 then close.
    fn on_quit(&self, _session: &mut Session, _request: &Request) -> PreResponse {
        PreResponse::reply_and_close(Response::new(StatusCode::ServiceClosing))
    }

    /// `VRFY`; default 252.
    fn on_vrfy(&self, _session: &mut Session, _request: &Request) -> PreResponse {
        PreResponse::reply(StatusCode::CannotVerify)
    }

    /// `EXPN`; default 502.
    fn on_expn(&self, _session: &mut Session, _request: &Request) -> PreResponse {
        PreResponse::reply(StatusCode::CommandNotImplemented)
    }

    /// `HELP`; default 214.
    fn on_help(&self, _session: &mut Session, _request: &Request) -> PreResponse {
        PreResponse::reply(StatusCode::HelpMessage)
    }

    /// `SEND`; default 502.
    fn on_send(&self, _session: &mut Session, _request: &Request) -> PreResponse {
        PreResponse::reply(StatusCode::CommandNotImplemented)
    }

    /// `SOML`; default 502.
    fn on_soml(&self, _session: &mut Session, _request: &Request) -> PreResponse {
        PreResponse::reply(StatusCode::CommandNotImplemented)
    }

    /// `SAML`; default 502.
    fn on_saml(&self, _session: &mut Session, _request: &Request) -> PreResponse {
        PreResponse::reply(StatusCode::CommandNotImplemented)
    }

    /// `TURN`; default 502.
    fn on_turn(&self, _session: &mut Session, _request: &Request) -> PreResponse {
        PreResponse::reply(StatusCode::CommandNotImplemented)
    }

    /// `AUTH PLAIN`; default 504.
    fn on_auth_plain(&self, _session: &mut Session, _request: &Request) -> PreResponse {
        PreResponse::reply(StatusCode::ParameterNotImplemented)
    }

    /// `AUTH CRAM-MD5`; default 504.
    fn on_auth_cram_md5(&self, _session: &mut Session, _request: &Request) -> PreResponse {
        PreResponse::reply(StatusCode::ParameterNotImplemented)
    }

    /// `AUTH LOGIN` credentials after the challenge exchange; default
    /// rejects with 535. Reply 235 to accept.
    fn on_auth_login(&self, _username: &str, _password: &str) -> PreResponse {
        PreResponse::reply(StatusCode::AuthenticationInvalid)
    }
}

/// An SMTP server: the socket-runtime [`server`](crate::net::Server)
/// specialized with the SMTP worker state machine.
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
        f.debug_struct("smtp::Server").field("core", &self.core).finish()
    }
}

/// One SMTP connection session.
struct Worker<H> {
    stream: SocketStream,
    peer: AddressInfo,
    handler: Arc<H>,
}

impl<H: Handler> server::Worker for Worker<H> {
    fn on_work(&mut self) -> Result<()> {
        trace!("smtp worker for {}", self.peer);
        let mut session = Session::new();

        // The service-ready greeting opens the dialogue.
        Response::new(StatusCode::ServiceReady).send_with(&mut self.stream)?;

        loop {
            self.stream.reset_recv_deadline();
            let request = match Request::recv_with(&mut self.stream) {
                Ok(Some(request)) => request,
                Ok(None) => return Ok(()),
                Err(err) => return recv_error(&mut self.stream, err),
            };

            let pre = dispatch(&*self.handler, &mut session, &mut self.stream, &request)?;
            let (response, close) = pre.into_parts();
            match response {
                Some(mut response) => {
                    response.send_with(&mut self.stream)?;
                    if close {
                        self.stream.socket().close(Timeout::new(DEFAULT_TIMEOUT))?;
                        return Ok(());
                    }
                }
                None => {
                    if close {
                        self.stream.socket().abort();
                        return Ok(());
                    }
                }
            }
        }
    }
}

fn dispatch<H: Handler>(
    handler: &H,
    session: &mut Session,
    stream: &mut SocketStream,
    request: &Request,
) -> Result<PreResponse> {
    Ok(match request.command {
        Command::Helo => handler.on_helo(session, request),
        Command::Ehlo => handler.on_ehlo(session, request),
        Command::Mail => handler.on_mail(session, request),
        Command::Rcpt => handler.on_rcpt(session, request),
        Command::Data => {
            // The transaction must be set up before data is accepted.
            if session.mail_from.is_none() || session.rcpt_to.is_empty() {
                return Ok(PreResponse::reply(StatusCode::BadSequenceCommand));
            }
            Response::new(StatusCode::StartMailInput).send_with(stream)?;

            let mut data = DataReader::new(&mut *stream);
            let pre = handler.on_data(session, &mut data);
            // Drain to the terminator so the command stream realigns even
            // if the handler stopped early.
            let _ = io::copy(&mut data, &mut io::sink());
            pre
        }
        Command::Rset => handler.on_rset(session, request),
        Command::Noop => handler.on_noop(session, request),
        Command::Quit => handler.on_quit(session, request),
        Command::Vrfy => handler.on_vrfy(session, request),
        Command::Expn => handler.on_expn(session, request),
        Command::Help => handler.on_help(session, request),
        Command::Send => handler.on_send(session, request),
        Command::Soml => handler.on_soml(session, request),
        Command::Saml => handler.on_saml(session, request),
        Command::Turn => handler.on_turn(session, request),
        Command::Auth => {
            let method = request
                .parameter
                .split_whitespace()
                .next()
                .unwrap_or("")
                .parse::<AuthMethod>();
            match method {
                Ok(AuthMethod::Plain) => handler.on_auth_plain(session, request),
                Ok(AuthMethod::CramMd5) => handler.on_auth_cram_md5(session, request),
                Ok(AuthMethod::Login) => auth_login(handler, stream)?,
                Err(_) => PreResponse::reply(StatusCode::ParameterNotImplemented),
            }
        }
    })
}

/// The `AUTH LOGIN` challenge/response exchange: 334 with
/// base64("Username"), a credential line, 334 with base64("Password"),
/// another credential line, both base64-decoded for the handler.
fn auth_login<H: Handler>(handler: &H, stream: &mut SocketStream) -> Result<PreResponse> {
    let username = match challenge(stream, "Username")? {
        Some(line) => line,
        None => return Ok(PreResponse::abort()),
    };
    let password = match challenge(stream, "Password")? {
        Some(line) => line,
        None => return Ok(PreResponse::abort()),
    };

    match (decode_credential(&username), decode_credential(&password)) {
        (Some(username), Some(password)) => Ok(handler.on_auth_login(&username, &password)),
        _ => Ok(PreResponse::reply(StatusCode::SyntaxErrorParameter)),
    }
}

fn challenge(stream: &mut SocketStream, prompt: &str) -> Result<Option<String>> {
    Response::with_line(StatusCode::ServerChallenge, base64::encode(prompt))
        .send_with(stream)?;
    crate::proto::read_line(stream, MAX_PARAMETER, || Parse::Command.into())
}

fn decode_credential(line: &str) -> Option<String> {
    let bytes = base64::decode(line.trim()).ok()?;
    String::from_utf8(bytes).ok()
}

/// Map a failed command parse to the wire, then gracefully close: an
/// unrecognized verb is 500, other malformed input 554. Timeouts,
/// interrupts, and a peer that died mid-line abort without a reply.
fn recv_error(stream: &mut SocketStream, err: Error) -> Result<()> {
    if err.is_timeout() || err.is_incomplete_message() {
        stream.socket().abort();
        return Ok(());
    }

    let status = match err.kind() {
        Kind::Parse(Parse::Command) => StatusCode::SyntaxErrorCommand,
        Kind::Parse(_) => StatusCode::TransactionFailed,
        _ => {
            stream.socket().abort();
            return Err(err);
        }
    };
    debug!("command parse failed ({}), responding {}", err, status);

    if Response::new(status).send_with(stream).is_ok() {
        let _ = stream.socket().close(Timeout::new(DEFAULT_TIMEOUT));
    } else {
        stream.socket().abort();
    }
    Ok(())
}
