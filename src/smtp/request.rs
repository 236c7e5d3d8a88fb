//! SMTP request framing.

use std::io::{BufRead, Write};

use super::command::Command;
use crate::error::Result;
use crate::proto::{self, Message};

/// Longest accepted parameter.
pub const MAX_PARAMETER: usize = 1 << 10;

// Verb, separator, parameter.
const MAX_REQUEST_LINE: usize = 4 + 1 + MAX_PARAMETER;

/// One SMTP command line: a four-character verb and an optional
/// parameter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    /// The verb.
    pub command: Command,
    /// Everything after the verb's separating space; may be empty.
    pub parameter: String,
}

impl Request {
    /// A request without a parameter.
    pub fn new(command: Command) -> Request {
        Request {
            command,
            parameter: String::new(),
        }
    }

    /// A request with a parameter.
    pub fn with_parameter<P: Into<String>>(command: Command, parameter: P) -> Request {
        Request {
            command,
            parameter: parameter.into(),
        }
    }

    /// Parse one command line. `None` means the peer closed cleanly
    /// between commands.
    pub fn recv_with<R: BufRead>(stream: &mut R) -> Result<Option<Request>> {
        let line = match proto::read_line(stream, MAX_REQUEST_LINE, || {
            crate::error::Parse::Command.into()
        })? {
            Some(line) => line,
            None => return Ok(None),
        };

        let (command, parameter) = match line.split_once(' ') {
            Some((command, parameter)) => (command, parameter),
            None => (line.as_str(), ""),
        };
        Ok(Some(Request {
            command: command.parse()?,
            parameter: parameter.to_owned(),
        }))
    }
}

impl Message for Request {
    fn send_with(&mut self, stream: &mut dyn Write) -> Result<()> {
        if self.parameter.is_empty() {
            write!(stream, "{}\r\n", self.command)?;
        } else {
            write!(stream, "{} {}\r\n", self.command, self.parameter)?;
        }
        stream.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_command_and_parameter() {
        let mut stream = Cursor::new(b"MAIL FROM:<u@x>\r\n".to_vec());
        let req = Request::recv_with(&mut stream).unwrap().unwrap();
        assert_eq!(req.command, Command::Mail);
        assert_eq!(req.parameter, "FROM:<u@x>");
    }

    #[test]
    fn parses_bare_command() {
        let mut stream = Cursor::new(b"data\r\n".to_vec());
        let req = Request::recv_with(&mut stream).unwrap().unwrap();
        assert_eq!(req.command, Command::Data);
        assert_eq!(req.parameter, "");
    }

    #[test]
    fn eof_between_commands_is_none() {
        let mut stream = Cursor::new(Vec::new());
        assert!(Request::recv_with(&mut stream).unwrap().is_none());
    }

    #[test]
    fn over_long_parameter_rejected() {
        let mut line = b"NOOP ".to_vec();
        line.extend_from_slice(&vec![b'x'; MAX_PARAMETER + 8]);
        line.extend_from_slice(b"\r\n");
        let mut stream = Cursor::new(line);
        assert!(Request::recv_with(&mut stream).is_err());
    }

    #[test]
    fn round_trip() {
        let mut req = Request::with_parameter(Command::Rcpt, "TO:<v@y>");
        let mut wire = Vec::new();
        req.send_with(&mut wire).unwrap();
        assert_eq!(wire, b"RCPT TO:<v@y>\r\n");

        let mut stream = Cursor::new(wire);
        let parsed = Request::recv_with(&mut stream).unwrap().unwrap();
        assert_eq!(parsed, req);
    }
}
