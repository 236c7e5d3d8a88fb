//! HTTP response parsing and emission.

use std::io::{BufRead, Read, Write};
use std::mem;

use super::body::{self, Body};
use super::headers::Headers;
use super::status::StatusCode;
use super::version::Version;
use crate::error::{Error, Parse, Result};
use crate::proto::{self, Message};

const MAX_STATUS_LINE: usize = 1 << 12;
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream; charset=UTF-8";

/// An HTTP response.
///
/// An HTTP/0.9 response is bare body bytes with no status line or
/// headers; on receive, it is detected by the first token failing to
/// parse as a version, and the bytes consumed by that attempt are
/// preserved as the body's prefix.
#[derive(Debug)]
pub struct Response<'a> {
    /// Protocol version.
    pub version: Version,
    /// Status code.
    pub status: StatusCode,
    /// Reason phrase; when empty, the canonical phrase for the status
    /// code is emitted.
    pub reason: String,
    /// Header block; empty for 0.9.
    pub headers: Headers,
    /// Message body.
    pub body: Body<'a>,
}

impl Response<'static> {
    /// An empty HTTP/1.1 response with the given status.
    pub fn new(status: StatusCode) -> Response<'static> {
        Response {
            version: Version::default(),
            status,
            reason: String::new(),
            headers: Headers::new(),
            body: Body::empty(),
        }
    }

    /// An HTTP/1.1 response with a body.
    pub fn with_body<B: Into<Body<'static>>>(status: StatusCode, body: B) -> Response<'static> {
        let mut response = Response::new(status);
        response.body = body.into();
        response
    }
}

enum StartLine {
    Head(Version),
    Legacy(Vec<u8>),
}

/// Accumulate at most the nine bytes that could spell `"HTTP/x.y "`. On a
/// match the token and its space are consumed and gone; on a mismatch
/// every consumed byte is returned for reuse as the body prefix.
fn sniff_version<R: BufRead>(stream: &mut R) -> Result<StartLine> {
    let mut consumed: Vec<u8> = Vec::with_capacity(9);
    loop {
        let available = match stream.fill_buf() {
            Ok(available) => available,
            Err(ref err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(Error::new_io(err)),
        };
        if available.is_empty() {
            if consumed.is_empty() {
                return Err(Error::new_incomplete());
            }
            return Ok(StartLine::Legacy(consumed));
        }

        let mut used = 0;
        let mut found_space = false;
        for &byte in available {
            used += 1;
            consumed.push(byte);
            if byte == b' ' {
                found_space = true;
                break;
            }
            if consumed.len() == 9 {
                break;
            }
        }
        stream.consume(used);

        if found_space || consumed.len() >= 9 {
            if consumed.len() == 9 && consumed[8] == b' ' {
                let token = &consumed[..8];
                if Version::is_version_shaped(token) {
                    let version = Version::from_token(token)?;
                    if version == Version::Http09 {
                        // 0.9 responses have no status line to begin with.
                        return Err(Parse::Version.into());
                    }
                    return Ok(StartLine::Head(version));
                }
            }
            return Ok(StartLine::Legacy(consumed));
        }
    }
}

impl<'a> Response<'a> {
    /// Parse one response from the stream.
    pub fn recv_with<R: BufRead>(stream: &'a mut R) -> Result<Response<'a>>
    where
        R: 'a,
    {
        let version = match sniff_version(&mut *stream)? {
            StartLine::Head(version) => version,
            StartLine::Legacy(prefix) => {
                // The whole stream, already-consumed bytes first, is the
                // body of a 0.9 response.
                let body = Body::from_reader(std::io::Cursor::new(prefix).chain(stream));
                return Ok(Response {
                    version: Version::Http09,
                    status: StatusCode::Ok,
                    reason: String::new(),
                    headers: Headers::new(),
                    body,
                });
            }
        };

        let line = proto::read_line(&mut *stream, MAX_STATUS_LINE, || Parse::Status.into())?
            .ok_or_else(Error::new_incomplete)?;
        let (code, reason) = match line.split_once(' ') {
            Some((code, reason)) => (code, reason),
            None => (line.as_str(), ""),
        };
        if code.is_empty() || !code.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(Parse::Status.into());
        }
        let status = code
            .parse::<u16>()
            .map(StatusCode::from_u16)
            .map_err(|_| Error::from(Parse::Status))?;
        let reason = reason.trim_end().to_owned();

        let headers = Headers::read_from(&mut *stream)?;
        let encodings = headers.transfer_encoding()?;
        let content_length = headers.content_length()?;
        let body = body::decode(stream, &encodings, content_length);

        Ok(Response {
            version,
            status,
            reason,
            headers,
            body,
        })
    }
}

impl<'a> Message for Response<'a> {
    fn send_with(&mut self, stream: &mut dyn Write) -> Result<()> {
        let response_body = mem::replace(&mut self.body, Body::empty());

        if self.version == Version::Http09 {
            // Raw body; no status line, no headers.
            let mut response_body = response_body;
            std::io::copy(&mut response_body, stream).map_err(Error::new_io)?;
            stream.flush()?;
            return Ok(());
        }

        let framing = body::negotiate(&mut self.headers, response_body.len(), true)?;
        if !response_body.is_empty() && !self.headers.contains("Content-Type") {
            self.headers.set("Content-Type", DEFAULT_CONTENT_TYPE);
        }

        let reason = if self.reason.is_empty() {
            self.status.canonical_reason().unwrap_or("")
        } else {
            &self.reason
        };
        write!(stream, "{} {} {}\r\n", self.version, self.status, reason)?;
        self.headers.emit(stream)?;
        stream.write_all(b"\r\n")?;
        body::encode(stream, response_body, framing)?;
        stream.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_status_line() {
        let mut stream = Cursor::new(b"HTTP/1.1 200 OK\r\n\r\n".to_vec());
        let res = Response::recv_with(&mut stream).unwrap();
        assert_eq!(res.version, Version::Http11);
        assert_eq!(res.status, StatusCode::Ok);
        assert_eq!(res.reason, "OK");
    }

    #[test]
    fn keeps_custom_reason() {
        let mut stream = Cursor::new(b"HTTP/1.1 200 Howdy\r\n\r\n".to_vec());
        let res = Response::recv_with(&mut stream).unwrap();
        assert_eq!(res.reason, "Howdy");
    }

    #[test]
    fn legacy_response_preserves_prefix() {
        let mut stream = Cursor::new(b"hi there, whole stream is body".to_vec());
        let mut res = Response::recv_with(&mut stream).unwrap();
        assert_eq!(res.version, Version::Http09);
        let mut body = Vec::new();
        res.body.read_to_end(&mut body).unwrap();
        assert_eq!(body, b"hi there, whole stream is body");
    }

    #[test]
    fn short_legacy_response() {
        let mut stream = Cursor::new(b"hi".to_vec());
        let mut res = Response::recv_with(&mut stream).unwrap();
        assert_eq!(res.version, Version::Http09);
        let mut body = Vec::new();
        res.body.read_to_end(&mut body).unwrap();
        assert_eq!(body, b"hi");
    }

    #[test]
    fn explicit_09_status_line_is_malformed() {
        let mut stream = Cursor::new(b"HTTP/0.9 200 OK\r\n\r\n".to_vec());
        assert!(Response::recv_with(&mut stream).is_err());
    }

    #[test]
    fn unknown_version_rejected() {
        let mut stream = Cursor::new(b"HTTP/2.0 200 OK\r\n\r\n".to_vec());
        assert!(Response::recv_with(&mut stream).is_err());
    }

    #[test]
    fn unregistered_status_round_trips() {
        let mut stream = Cursor::new(b"HTTP/1.1 299 Custom\r\n\r\n".to_vec());
        let res = Response::recv_with(&mut stream).unwrap();
        assert_eq!(res.status, StatusCode::Unregistered(299));
    }

    #[test]
    fn chunked_body_decodes() {
        let wire = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n";
        let mut stream = Cursor::new(wire.to_vec());
        let mut res = Response::recv_with(&mut stream).unwrap();
        let mut body = Vec::new();
        res.body.read_to_end(&mut body).unwrap();
        assert_eq!(body, b"hello");
    }

    #[test]
    fn emit_defaults_reason_and_framing() {
        let mut res = Response::with_body(StatusCode::Ok, "/echo");
        let mut wire = Vec::new();
        res.send_with(&mut wire).unwrap();
        let text = String::from_utf8(wire).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Length: 5\r\n"));
        assert!(text.contains("Content-Type: application/octet-stream; charset=UTF-8\r\n"));
        assert!(text.ends_with("\r\n\r\n/echo"));
    }

    #[test]
    fn empty_response_gets_zero_length() {
        let mut res = Response::new(StatusCode::NoContent);
        let mut wire = Vec::new();
        res.send_with(&mut wire).unwrap();
        let text = String::from_utf8(wire).unwrap();
        assert!(text.contains("Content-Length: 0\r\n"));
        assert!(!text.contains("Content-Type"));
    }

    #[test]
    fn legacy_emit_is_bare_body() {
        let mut res = Response::with_body(StatusCode::Ok, "hi");
        res.version = Version::Http09;
        let mut wire = Vec::new();
        res.send_with(&mut wire).unwrap();
        assert_eq!(wire, b"hi");
    }
}
