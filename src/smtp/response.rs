//! SMTP response framing, including multiline replies.

use std::io::{BufRead, Write};

use super::status::StatusCode;
use crate::error::{Error, Parse, Result};
use crate::proto::{self, Message};

/// Cap on the summed text of one reply, across all of its lines.
pub const MAX_RESPONSE_PAYLOAD: usize = 1 << 12;

const MAX_LINE: usize = 1 << 10;

/// One SMTP reply: a status code and one or more text lines.
///
/// On the wire, every line but the last is `code-text`; the last is
/// `code text`. An empty line list emits the status code's default reason
/// phrase.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    /// The reply code.
    pub status: StatusCode,
    /// Reply text lines.
    pub lines: Vec<String>,
}

impl Response {
    /// A reply that will carry the default reason phrase.
    pub fn new(status: StatusCode) -> Response {
        Response {
            status,
            lines: Vec::new(),
        }
    }

    /// A reply with explicit text lines.
    pub fn with_lines<L: Into<Vec<String>>>(status: StatusCode, lines: L) -> Response {
        Response {
            status,
            lines: lines.into(),
        }
    }

    /// A single-line reply.
    pub fn with_line<L: Into<String>>(status: StatusCode, line: L) -> Response {
        Response {
            status,
            lines: vec![line.into()],
        }
    }

    /// Parse one reply, following continuation lines to the end.
    pub fn recv_with<R: BufRead>(stream: &mut R) -> Result<Response> {
        let mut status = None;
        let mut lines = Vec::new();
        let mut total = 0;

        loop {
            let line = proto::read_line(stream, MAX_LINE, || Parse::Status.into())?
                .ok_or_else(Error::new_incomplete)?;
            if line.len() < 3 || !line.as_bytes()[..3].iter().all(u8::is_ascii_digit) {
                return Err(Parse::Status.into());
            }
            let code: u16 = line[..3].parse().map_err(|_| Error::from(Parse::Status))?;
            status = Some(StatusCode::from_u16(code).ok_or_else(|| Error::from(Parse::Status))?);

            let (last, text) = match line.as_bytes().get(3) {
                None => (true, ""),
                Some(b' ') => (true, &line[4..]),
                Some(b'-') => (false, &line[4..]),
                Some(_) => return Err(Parse::Status.into()),
            };

            total += text.len();
            if total > MAX_RESPONSE_PAYLOAD {
                return Err(Error::new_too_large());
            }
            lines.push(text.to_owned());

            if last {
                // The final line's code is the reply's code.
                return Ok(Response {
                    status: status.take().ok_or_else(|| Error::from(Parse::Status))?,
                    lines,
                });
            }
        }
    }
}

impl Message for Response {
    fn send_with(&mut self, stream: &mut dyn Write) -> Result<()> {
        if self.lines.is_empty() {
            self.lines.push(self.status.reason_phrase().to_owned());
        }

        for line in &self.lines[..self.lines.len() - 1] {
            write!(stream, "{}-{}\r\n", self.status, line)?;
        }
        write!(
            stream,
            "{} {}\r\n",
            self.status,
            self.lines.last().map(String::as_str).unwrap_or("")
        )?;
        stream.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn single_line_reply() {
        let mut stream = Cursor::new(b"250 OK\r\n".to_vec());
        let res = Response::recv_with(&mut stream).unwrap();
        assert_eq!(res.status, StatusCode::RequestCompleted);
        assert_eq!(res.lines, vec!["OK"]);
    }

    #[test]
    fn multiline_reply() {
        let wire = b"250-first\r\n250-second\r\n250 last\r\n";
        let mut stream = Cursor::new(wire.to_vec());
        let res = Response::recv_with(&mut stream).unwrap();
        assert_eq!(res.lines, vec!["first", "second", "last"]);
    }

    #[test]
    fn bare_code_is_final_line() {
        let mut stream = Cursor::new(b"221\r\n".to_vec());
        let res = Response::recv_with(&mut stream).unwrap();
        assert_eq!(res.status, StatusCode::ServiceClosing);
        assert_eq!(res.lines, vec![""]);
    }

    #[test]
    fn unknown_code_rejected() {
        let mut stream = Cursor::new(b"299 odd\r\n".to_vec());
        assert!(Response::recv_with(&mut stream).is_err());
    }

    #[test]
    fn oversized_reply_rejected() {
        let mut wire = Vec::new();
        for _ in 0..8 {
            wire.extend_from_slice(b"250-");
            wire.extend_from_slice(&[b'x'; 1000]);
            wire.extend_from_slice(b"\r\n");
        }
        wire.extend_from_slice(b"250 end\r\n");
        let mut stream = Cursor::new(wire);
        let err = Response::recv_with(&mut stream).unwrap_err();
        assert!(err.is_parse_too_large());
    }

    #[test]
    fn emit_defaults_reason_phrase() {
        let mut res = Response::new(StatusCode::ServiceReady);
        let mut wire = Vec::new();
        res.send_with(&mut wire).unwrap();
        assert_eq!(wire, b"220 Service ready\r\n");
    }

    #[test]
    fn emit_multiline_framing() {
        let mut res = Response::with_lines(
            StatusCode::RequestCompleted,
            vec!["a".to_owned(), "b".to_owned()],
        );
        let mut wire = Vec::new();
        res.send_with(&mut wire).unwrap();
        assert_eq!(wire, b"250-a\r\n250 b\r\n");
    }

    #[test]
    fn round_trip() {
        let mut res = Response::with_lines(
            StatusCode::HelpMessage,
            vec!["commands:".to_owned(), "HELO MAIL RCPT".to_owned()],
        );
        let mut wire = Vec::new();
        res.send_with(&mut wire).unwrap();
        let mut stream = Cursor::new(wire);
        let parsed = Response::recv_with(&mut stream).unwrap();
        assert_eq!(parsed, res);
    }
}
