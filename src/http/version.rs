//! HTTP versions.

use std::fmt;

use self::Version::{Http09, Http10, Http11};
use crate::error::{Error, Parse};

/// A version of the HTTP protocol understood by this crate.
///
/// Anything else on the wire raises an unsupported-version error, which
/// workers surface as `505 HTTP Version Not Supported`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Version {
    /// `HTTP/0.9`: no headers, no status line, body is the whole stream.
    Http09,
    /// `HTTP/1.0`
    Http10,
    /// `HTTP/1.1`
    Http11,
}

impl Version {
    /// Parse a full `HTTP/x.y` token.
    pub(crate) fn from_token(token: &[u8]) -> Result<Version, Error> {
        match token {
            b"HTTP/0.9" => Ok(Http09),
            b"HTTP/1.0" => Ok(Http10),
            b"HTTP/1.1" => Ok(Http11),
            _ => Err(Parse::Version.into()),
        }
    }

    /// Whether a token has the shape `HTTP/x.y` at all, known or not.
    pub(crate) fn is_version_shaped(token: &[u8]) -> bool {
        token.len() == 8
            && token.starts_with(b"HTTP/")
            && token[5].is_ascii_digit()
            && token[6] == b'.'
            && token[7].is_ascii_digit()
    }
}

impl Default for Version {
    fn default() -> Version {
        Http11
    }
}

impl fmt::Display for Version {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(match *self {
            Http09 => "HTTP/0.9",
            Http10 => "HTTP/1.0",
            Http11 => "HTTP/1.1",
        })
    }
}
