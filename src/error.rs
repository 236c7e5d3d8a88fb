//! Error and Result module.

use std::error::Error as StdError;
use std::fmt;
use std::io;

/// Result type often returned from methods that can have rain `Error`s.
pub type Result<T> = std::result::Result<T, Error>;

type Cause = Box<dyn StdError + Send + Sync>;

/// Represents errors that can occur handling connections and messages.
pub struct Error {
    inner: Box<ErrorImpl>,
}

struct ErrorImpl {
    kind: Kind,
    cause: Option<Cause>,
}

#[derive(Debug)]
pub(crate) enum Kind {
    /// A message failed to parse.
    Parse(Parse),
    /// A message reached EOF, but is not complete.
    IncompleteMessage,
    /// An `io::Error` that occurred while trying to read or write to a
    /// network stream.
    Io,
    /// Error occurred while connecting.
    Connect,
    /// Error creating or binding a listening socket.
    Listen,
    /// Error accepting a connection.
    Accept,
    /// Error resolving an address.
    Resolve,
    /// Error performing a DNS record query.
    Dns,
    /// An operation was attempted on an invalid (closed) socket.
    Closed,
    /// An invalid socket was passed to `poll`.
    PollInvalid,
    /// Error caused by user code.
    User(User),
}

#[derive(Debug)]
pub(crate) enum Parse {
    Method,
    Version,
    Status,
    Header,
    TooLarge,
    ContentLength,
    TransferEncoding(TransferEncoding),
    Command,
    Mailbox,
}

#[derive(Debug)]
pub(crate) enum TransferEncoding {
    Malformed,
    NotSupported,
    TooMany,
}

#[derive(Debug)]
pub(crate) enum User {
    /// User tried to interrupt a socket constructed without an interrupt
    /// pair.
    Uninterruptable,
}

// Sentinel type to indicate the error was caused by a timeout.
#[derive(Debug)]
pub(crate) struct TimedOut;

impl Error {
    /// Returns true if this was a protocol parse error.
    pub fn is_parse(&self) -> bool {
        matches!(self.inner.kind, Kind::Parse(_))
    }

    /// Returns true if this was a parse error caused by a message or header
    /// block that was too large.
    pub fn is_parse_too_large(&self) -> bool {
        matches!(self.inner.kind, Kind::Parse(Parse::TooLarge))
    }

    /// Returns true if the connection closed before a message could complete.
    pub fn is_incomplete_message(&self) -> bool {
        matches!(self.inner.kind, Kind::IncompleteMessage)
    }

    /// Returns true if this was an error from `connect`.
    pub fn is_connect(&self) -> bool {
        matches!(self.inner.kind, Kind::Connect)
    }

    /// Returns true if this error was caused by user code.
    pub fn is_user(&self) -> bool {
        matches!(self.inner.kind, Kind::User(_))
    }

    /// Returns true if the operation was attempted on a closed socket.
    pub fn is_closed(&self) -> bool {
        matches!(self.inner.kind, Kind::Closed)
    }

    /// Returns true if the error was caused by a timeout.
    pub fn is_timeout(&self) -> bool {
        if self.find_source::<TimedOut>().is_some() {
            return true;
        }
        self.find_source::<io::Error>()
            .map(|io| io.kind() == io::ErrorKind::TimedOut)
            .unwrap_or(false)
    }

    /// Consumes the error, returning its cause.
    pub fn into_cause(self) -> Option<Box<dyn StdError + Send + Sync>> {
        self.inner.cause
    }

    pub(crate) fn new(kind: Kind) -> Error {
        Error {
            inner: Box::new(ErrorImpl { kind, cause: None }),
        }
    }

    pub(crate) fn with<C: Into<Cause>>(mut self, cause: C) -> Error {
        self.inner.cause = Some(cause.into());
        self
    }

    pub(crate) fn kind(&self) -> &Kind {
        &self.inner.kind
    }

    pub(crate) fn find_source<E: StdError + 'static>(&self) -> Option<&E> {
        let mut cause = self.source();
        while let Some(err) = cause {
            if let Some(typed) = err.downcast_ref() {
                return Some(typed);
            }
            cause = err.source();
        }

        // else
        None
    }

    pub(crate) fn new_io(cause: io::Error) -> Error {
        Error::new(Kind::Io).with(cause)
    }

    pub(crate) fn new_incomplete() -> Error {
        Error::new(Kind::IncompleteMessage)
    }

    pub(crate) fn new_too_large() -> Error {
        Error::new(Kind::Parse(Parse::TooLarge))
    }

    pub(crate) fn new_connect<E: Into<Cause>>(cause: E) -> Error {
        Error::new(Kind::Connect).with(cause)
    }

    pub(crate) fn new_listen<E: Into<Cause>>(cause: E) -> Error {
        Error::new(Kind::Listen).with(cause)
    }

    pub(crate) fn new_accept<E: Into<Cause>>(cause: E) -> Error {
        Error::new(Kind::Accept).with(cause)
    }

    pub(crate) fn new_resolve<E: Into<Cause>>(cause: E) -> Error {
        Error::new(Kind::Resolve).with(cause)
    }

    pub(crate) fn new_dns(msg: &'static str) -> Error {
        Error::new(Kind::Dns).with(msg)
    }

    pub(crate) fn new_closed() -> Error {
        Error::new(Kind::Closed)
    }

    pub(crate) fn new_poll_invalid() -> Error {
        Error::new(Kind::PollInvalid)
    }

    pub(crate) fn new_uninterruptable() -> Error {
        Error::new(Kind::User(User::Uninterruptable))
    }

    /// The error's standalone message, without the message from the source.
    pub fn message(&self) -> impl fmt::Display + '_ {
        self.description()
    }

    fn description(&self) -> &str {
        match self.inner.kind {
            Kind::Parse(Parse::Method) => "invalid HTTP method parsed",
            Kind::Parse(Parse::Version) => "unsupported HTTP version parsed",
            Kind::Parse(Parse::Status) => "invalid status code parsed",
            Kind::Parse(Parse::Header) => "invalid header parsed",
            Kind::Parse(Parse::TooLarge) => "message head is too large",
            Kind::Parse(Parse::ContentLength) => "invalid content-length parsed",
            Kind::Parse(Parse::TransferEncoding(TransferEncoding::Malformed)) => {
                "invalid transfer-encoding parsed"
            }
            Kind::Parse(Parse::TransferEncoding(TransferEncoding::NotSupported)) => {
                "unsupported transfer-encoding parsed"
            }
            Kind::Parse(Parse::TransferEncoding(TransferEncoding::TooMany)) => {
                "too many transfer-encodings"
            }
            Kind::Parse(Parse::Command) => "invalid SMTP command parsed",
            Kind::Parse(Parse::Mailbox) => "invalid mailbox parsed",
            Kind::IncompleteMessage => "connection closed before message completed",
            Kind::Io => "connection error",
            Kind::Connect => "error trying to connect",
            Kind::Listen => "error creating server listener",
            Kind::Accept => "error accepting connection",
            Kind::Resolve => "error resolving address",
            Kind::Dns => "error querying DNS records",
            Kind::Closed => "socket is closed",
            Kind::PollInvalid => "an invalid socket was passed to poll",
            Kind::User(User::Uninterruptable) => {
                "attempted to interrupt an uninterruptable socket"
            }
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut f = f.debug_tuple("rain::Error");
        f.field(&self.inner.kind);
        if let Some(ref cause) = self.inner.cause {
            f.field(cause);
        }
        f.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref cause) = self.inner.cause {
            write!(f, "{}: {}", self.description(), cause)
        } else {
            f.write_str(self.description())
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner
            .cause
            .as_ref()
            .map(|cause| &**cause as &(dyn StdError + 'static))
    }
}

#[doc(hidden)]
impl From<Parse> for Error {
    fn from(err: Parse) -> Error {
        Error::new(Kind::Parse(err))
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::new_io(err)
    }
}

#[doc(hidden)]
trait AssertSendSync: Send + Sync + 'static {}
#[doc(hidden)]
impl AssertSendSync for Error {}

// ===== impl TimedOut =====

impl fmt::Display for TimedOut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("operation timed out")
    }
}

impl StdError for TimedOut {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem;

    #[test]
    fn error_size_of() {
        assert_eq!(mem::size_of::<Error>(), mem::size_of::<usize>());
    }

    #[test]
    fn timeout_detected_through_io_cause() {
        let err = Error::new_io(io::Error::new(io::ErrorKind::TimedOut, "slow peer"));
        assert!(err.is_timeout());

        let err = Error::new_connect(TimedOut);
        assert!(err.is_timeout());
        assert!(err.is_connect());

        let err = Error::new_io(io::Error::new(io::ErrorKind::Other, "nope"));
        assert!(!err.is_timeout());
    }

    #[test]
    fn parse_predicates() {
        let err = Error::from(Parse::Method);
        assert!(err.is_parse());
        assert!(!err.is_parse_too_large());

        let err = Error::new_too_large();
        assert!(err.is_parse());
        assert!(err.is_parse_too_large());
    }
}
