//! The request/response framework shared by the protocol layers.
//!
//! A protocol message serializes itself onto an output stream via
//! [`Message::send_with`] and parses itself from an input stream via a
//! per-type `recv_with` constructor; both succeed fully or fail with a
//! typed error. A worker loops recv → dispatch → send until the peer
//! closes, the protocol requires closing, or the handler asks to close;
//! recv failures map to a protocol error response and a graceful close,
//! dispatch failures are consumed to the log and abort the session.

use std::io::{BufRead, Write};

use crate::error::{Error, Result};

/// A protocol message that can be written to a stream.
///
/// Implementations serialize completely (flushing at the end) or fail
/// with a typed error; there is no partial success. The parsing
/// counterpart is an inherent `recv_with` constructor on each message
/// type, since parsed messages may borrow the stream for their bodies.
pub trait Message {
    /// Serialize onto the stream and flush.
    fn send_with(&mut self, stream: &mut dyn Write) -> Result<()>;
}

/// Read one CRLF- (or bare-LF-) terminated line, without the terminator,
/// enforcing a length cap.
///
/// Returns `None` on EOF before any byte; EOF mid-line is an incomplete
/// message; a line longer than `max` is a too-large parse error.
pub(crate) fn read_line_bytes<R: BufRead>(stream: &mut R, max: usize) -> Result<Option<Vec<u8>>> {
    let mut line: Vec<u8> = Vec::new();
    loop {
        let (done, used) = {
            let available = match stream.fill_buf() {
                Ok(available) => available,
                Err(ref err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(Error::new_io(err)),
            };
            if available.is_empty() {
                if line.is_empty() {
                    return Ok(None);
                }
                return Err(Error::new_incomplete());
            }
            match available.iter().position(|&b| b == b'\n') {
                Some(at) => {
                    line.extend_from_slice(&available[..at]);
                    (true, at + 1)
                }
                None => {
                    line.extend_from_slice(available);
                    (false, available.len())
                }
            }
        };
        stream.consume(used);

        if line.len() > max {
            return Err(Error::new_too_large());
        }
        if done {
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            return Ok(Some(line));
        }
    }
}

/// `read_line_bytes`, decoded as UTF-8. Non-UTF-8 input is reported with
/// the supplied parse error.
pub(crate) fn read_line<R: BufRead>(
    stream: &mut R,
    max: usize,
    on_invalid: fn() -> Error,
) -> Result<Option<String>> {
    match read_line_bytes(stream, max)? {
        Some(line) => String::from_utf8(line)
            .map(Some)
            .map_err(|_| on_invalid()),
        None => Ok(None),
    }
}
