//! HTTP request parsing and emission.

use std::io::{BufRead, Write};
use std::mem;

use super::body::{self, Body};
use super::headers::{Encoding, Headers};
use super::method::Method;
use super::version::Version;
use crate::error::{Error, Parse, Result};
use crate::proto::{self, Message};

const MAX_START_LINE: usize = 1 << 13;

/// An HTTP request.
///
/// An HTTP/0.9 request is only a method and target; headers and body
/// exist from 1.0 on. A received request's body lazily reads from the
/// connection, framed per the message's transfer encodings.
#[derive(Debug)]
pub struct Request<'a> {
    /// Request method.
    pub method: Method,
    /// Request target as it appeared on the start line.
    pub target: String,
    /// Protocol version.
    pub version: Version,
    /// Header block; empty for 0.9.
    pub headers: Headers,
    /// Message body; empty for 0.9.
    pub body: Body<'a>,
}

/// Everything of a request except the body: fully owned, so the head can
/// be parsed (and its errors handled against the same stream) before the
/// body borrows the connection.
pub(crate) struct Head {
    method: Method,
    target: String,
    version: Version,
    headers: Headers,
    encodings: Vec<Encoding>,
    content_length: Option<u64>,
}

/// Parse one request head. `None` means the peer closed cleanly before
/// sending anything. The body framing headers are validated here, so
/// attaching the body afterwards cannot fail.
pub(crate) fn read_head<R: BufRead>(stream: &mut R) -> Result<Option<Head>> {
    let line = match proto::read_line_bytes(stream, MAX_START_LINE)? {
        Some(line) => line,
        None => return Ok(None),
    };
    let line = std::str::from_utf8(&line).map_err(|_| Error::from(Parse::Header))?;

    let (method, rest) = match line.split_once(' ') {
        Some((method, rest)) => (method, rest),
        None => (line, ""),
    };
    let method: Method = method.parse()?;

    let (target, version) = match rest.rsplit_once(' ') {
        Some((target, tail)) if tail.starts_with("HTTP/") => {
            // An unknown version here is the 505 path, not 0.9.
            (target, Version::from_token(tail.as_bytes())?)
        }
        // No version token at all: a 0.9 simple request.
        _ => (rest, Version::Http09),
    };

    if version == Version::Http09 {
        return Ok(Some(Head {
            method,
            target: target.to_owned(),
            version,
            headers: Headers::new(),
            encodings: Vec::new(),
            content_length: None,
        }));
    }

    let headers = Headers::read_from(stream)?;
    let encodings = headers.transfer_encoding()?;
    let content_length = headers.content_length()?;

    Ok(Some(Head {
        method,
        target: target.to_owned(),
        version,
        headers,
        encodings,
        content_length,
    }))
}

impl Request<'static> {
    /// A bodiless HTTP/1.1 request.
    pub fn new<T: Into<String>>(method: Method, target: T) -> Request<'static> {
        Request {
            method,
            target: target.into(),
            version: Version::default(),
            headers: Headers::new(),
            body: Body::empty(),
        }
    }
}

impl<'a> Request<'a> {
    /// Attach the body reader to a parsed head.
    pub(crate) fn assemble<R: BufRead>(head: Head, stream: &'a mut R) -> Request<'a>
    where
        R: 'a,
    {
        let body = if head.version == Version::Http09 {
            Body::empty()
        } else {
            body::decode(stream, &head.encodings, head.content_length)
        };
        Request {
            method: head.method,
            target: head.target,
            version: head.version,
            headers: head.headers,
            body,
        }
    }

    /// Parse one request from the stream. `None` means the peer closed
    /// cleanly before sending anything.
    pub fn recv_with<R: BufRead>(stream: &'a mut R) -> Result<Option<Request<'a>>>
    where
        R: 'a,
    {
        match read_head(&mut *stream)? {
            Some(head) => Ok(Some(Request::assemble(head, stream))),
            None => Ok(None),
        }
    }
}

impl<'a> Message for Request<'a> {
    fn send_with(&mut self, stream: &mut dyn Write) -> Result<()> {
        if self.version == Version::Http09 {
            // Simple requests carry neither headers nor body.
            write!(stream, "{} {}\r\n", self.method, self.target)?;
            stream.flush()?;
            return Ok(());
        }

        let request_body = mem::replace(&mut self.body, Body::empty());
        let framing = body::negotiate(&mut self.headers, request_body.len(), false)?;

        write!(stream, "{} {} {}\r\n", self.method, self.target, self.version)?;
        self.headers.emit(stream)?;
        stream.write_all(b"\r\n")?;
        body::encode(stream, request_body, framing)?;
        stream.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};

    fn parse(raw: &[u8]) -> Result<Option<Request<'static>>> {
        let mut stream = Cursor::new(raw.to_vec());
        let received = Request::recv_with(&mut stream)?;
        match received {
            Some(req) => {
                // Detach the body so the request outlives the stream.
                let Request {
                    method,
                    target,
                    version,
                    headers,
                    mut body,
                } = req;
                let mut buf = Vec::new();
                body.read_to_end(&mut buf).unwrap();
                drop(body);
                Ok(Some(Request {
                    method,
                    target,
                    version,
                    headers,
                    body: Body::from(buf),
                }))
            }
            None => Ok(None),
        }
    }

    #[test]
    fn parses_full_request() {
        let req = parse(b"GET /echo HTTP/1.1\r\nHost: example.com\r\n\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(req.method, Method::Get);
        assert_eq!(req.target, "/echo");
        assert_eq!(req.version, Version::Http11);
        assert_eq!(req.headers.get("Host"), Some("example.com"));
    }

    #[test]
    fn missing_version_is_simple_request() {
        let req = parse(b"GET /\r\n").unwrap().unwrap();
        assert_eq!(req.version, Version::Http09);
        assert_eq!(req.target, "/");
        assert!(req.headers.is_empty());
    }

    #[test]
    fn unknown_method_rejected() {
        let err = parse(b"BREW /pot HTTP/1.1\r\n\r\n").unwrap_err();
        assert!(err.is_parse());
    }

    #[test]
    fn unknown_version_rejected() {
        let err = parse(b"GET / HTTP/2.0\r\n\r\n").unwrap_err();
        assert!(err.is_parse());
    }

    #[test]
    fn eof_before_request_is_none() {
        assert!(parse(b"").unwrap().is_none());
    }

    #[test]
    fn body_read_by_content_length() {
        let mut stream =
            Cursor::new(b"POST /u HTTP/1.1\r\nContent-Length: 5\r\n\r\nhelloextra".to_vec());
        let mut req = Request::recv_with(&mut stream).unwrap().unwrap();
        let mut body = Vec::new();
        req.body.read_to_end(&mut body).unwrap();
        assert_eq!(body, b"hello");
    }

    #[test]
    fn emits_sized_body() {
        let mut req = Request::new(Method::Post, "/u");
        req.body = Body::from("hello");
        let mut wire = Vec::new();
        req.send_with(&mut wire).unwrap();
        let text = String::from_utf8(wire).unwrap();
        assert!(text.starts_with("POST /u HTTP/1.1\r\n"));
        assert!(text.contains("Content-Length: 5\r\n"));
        assert!(text.ends_with("\r\n\r\nhello"));
    }

    #[test]
    fn emits_simple_request() {
        let mut req = Request::new(Method::Get, "/");
        req.version = Version::Http09;
        let mut wire = Vec::new();
        req.send_with(&mut wire).unwrap();
        assert_eq!(wire, b"GET /\r\n");
    }

    #[test]
    fn emits_chunked_for_unknown_length() {
        let mut req = Request::new(Method::Post, "/u");
        req.body = Body::from_reader(Cursor::new(b"stream".to_vec()));
        let mut wire = Vec::new();
        req.send_with(&mut wire).unwrap();
        let text = String::from_utf8(wire).unwrap();
        assert!(text.contains("Transfer-Encoding: chunked\r\n"));
        assert!(text.ends_with("0\r\n\r\n"));
    }

    #[test]
    fn round_trip() {
        let mut req = Request::new(Method::Put, "/res");
        req.headers.set("Host", "example.com");
        req.body = Body::from("payload");
        let mut wire = Vec::new();
        req.send_with(&mut wire).unwrap();

        let mut stream = Cursor::new(wire);
        let mut parsed = Request::recv_with(&mut stream).unwrap().unwrap();
        assert_eq!(parsed.method, Method::Put);
        assert_eq!(parsed.target, "/res");
        assert_eq!(parsed.headers.get("host"), Some("example.com"));
        let mut body = Vec::new();
        parsed.body.read_to_end(&mut body).unwrap();
        assert_eq!(body, b"payload");
    }
}
