//! Message bodies: lazy readers over the connection and wire encoders.

use std::fmt;
use std::io::{self, BufRead, Cursor, Read, Write};

use bytes::Bytes;

use super::headers::Encoding;
use crate::error::{Error, Result};

/// A message body.
///
/// Owned bodies (`Bytes`, strings) know their length; streamed bodies are
/// lazy readers over the connection (or any reader) and do not. A body is
/// consumed by reading it, or by sending the message that owns it.
pub struct Body<'a> {
    kind: Kind<'a>,
}

enum Kind<'a> {
    Empty,
    Bytes(Cursor<Bytes>),
    Reader(Box<dyn Read + 'a>),
}

impl<'a> Body<'a> {
    /// A zero-length body.
    pub fn empty() -> Body<'static> {
        Body { kind: Kind::Empty }
    }

    /// A lazy body reading from `reader` until it ends.
    pub fn from_reader<R: Read + 'a>(reader: R) -> Body<'a> {
        Body {
            kind: Kind::Reader(Box::new(reader)),
        }
    }

    /// The remaining length, when known.
    pub fn len(&self) -> Option<u64> {
        match self.kind {
            Kind::Empty => Some(0),
            Kind::Bytes(ref cursor) => {
                let total = cursor.get_ref().len() as u64;
                Some(total - cursor.position().min(total))
            }
            Kind::Reader(_) => None,
        }
    }

    /// Whether the body is known to be empty.
    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// Read the whole remaining body into memory.
    pub fn into_bytes(mut self) -> Result<Bytes> {
        match self.kind {
            Kind::Empty => Ok(Bytes::new()),
            Kind::Bytes(ref mut cursor) => {
                let mut out = Vec::new();
                cursor.read_to_end(&mut out).map_err(Error::new_io)?;
                Ok(out.into())
            }
            Kind::Reader(ref mut reader) => {
                let mut out = Vec::new();
                reader.read_to_end(&mut out).map_err(Error::new_io)?;
                Ok(out.into())
            }
        }
    }
}

impl Default for Body<'static> {
    fn default() -> Body<'static> {
        Body::empty()
    }
}

impl From<Bytes> for Body<'static> {
    fn from(bytes: Bytes) -> Body<'static> {
        if bytes.is_empty() {
            Body::empty()
        } else {
            Body {
                kind: Kind::Bytes(Cursor::new(bytes)),
            }
        }
    }
}

impl From<Vec<u8>> for Body<'static> {
    fn from(bytes: Vec<u8>) -> Body<'static> {
        Body::from(Bytes::from(bytes))
    }
}

impl From<String> for Body<'static> {
    fn from(s: String) -> Body<'static> {
        Body::from(Bytes::from(s.into_bytes()))
    }
}

impl From<&'static str> for Body<'static> {
    fn from(s: &'static str) -> Body<'static> {
        Body::from(Bytes::from_static(s.as_bytes()))
    }
}

impl<'a> Read for Body<'a> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.kind {
            Kind::Empty => Ok(0),
            Kind::Bytes(ref mut cursor) => cursor.read(buf),
            Kind::Reader(ref mut reader) => reader.read(buf),
        }
    }
}

impl<'a> fmt::Debug for Body<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            Kind::Empty => f.write_str("Body(empty)"),
            Kind::Bytes(_) => write!(f, "Body(len={:?})", self.len()),
            Kind::Reader(_) => f.write_str("Body(reader)"),
        }
    }
}

/// Reads exactly the declared `Content-Length`, then reports EOF; also
/// EOFs early if the source ends first.
struct LimitedReader<R> {
    source: R,
    left: u64,
}

impl<R: Read> LimitedReader<R> {
    fn new(source: R, left: u64) -> LimitedReader<R> {
        LimitedReader { source, left }
    }
}

impl<R: Read> Read for LimitedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.left == 0 {
            return Ok(0);
        }
        let take = self.left.min(buf.len() as u64) as usize;
        let read = self.source.read(&mut buf[..take])?;
        self.left -= read as u64;
        Ok(read)
    }
}

/// Where a chunked decoder is within its stream.
enum ChunkState {
    /// Between chunks; a size header comes next.
    Header,
    /// Inside a chunk with this many data bytes left.
    Data(u64),
    /// The zero-size chunk and its trailing CRLF have been consumed.
    Done,
}

/// Decodes one layer of `chunked` framing.
///
/// Each chunk is a hex size line (extensions tolerated, ignored), that
/// many data bytes, and a CRLF; size zero ends the stream. The
/// end-of-stream CRLF is consumed with it, so the next message on the
/// connection starts aligned.
struct ChunkedDecoder<R> {
    source: R,
    state: ChunkState,
}

impl<R: Read> ChunkedDecoder<R> {
    fn new(source: R) -> ChunkedDecoder<R> {
        ChunkedDecoder {
            source,
            state: ChunkState::Header,
        }
    }

    fn next_byte(&mut self) -> io::Result<u8> {
        let mut byte = [0u8; 1];
        if self.source.read(&mut byte)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "chunked stream ended mid-frame",
            ));
        }
        Ok(byte[0])
    }

    fn expect_crlf(&mut self) -> io::Result<()> {
        if self.next_byte()? != b'\r' || self.next_byte()? != b'\n' {
            return Err(bad_chunk("chunk not followed by CRLF"));
        }
        Ok(())
    }

    /// Parse one `size [pad] [;extension] CRLF` header line. At least one
    /// hex digit is required; everything from `;` to the line end is an
    /// extension and skipped unread.
    fn read_header(&mut self) -> io::Result<u64> {
        let mut size: u64 = 0;
        let mut digits = 0;

        let mut byte = loop {
            let byte = self.next_byte()?;
            match hex_digit(byte) {
                Some(value) => {
                    digits += 1;
                    size = size
                        .checked_mul(16)
                        .and_then(|size| size.checked_add(value))
                        .ok_or_else(|| bad_chunk("chunk size overflows"))?;
                }
                None => break byte,
            }
        };
        if digits == 0 {
            return Err(bad_chunk("chunk size missing"));
        }

        // Padding may follow the digits; an extension runs to the line end
        // and its content is anybody's guess, so it is skipped blindly.
        let mut in_extension = false;
        loop {
            match byte {
                b'\r' => {
                    if self.next_byte()? != b'\n' {
                        return Err(bad_chunk("chunk header missing LF"));
                    }
                    trace!("chunk header, size={}", size);
                    return Ok(size);
                }
                b';' => in_extension = true,
                b' ' | b'\t' if !in_extension => {}
                _ if in_extension => {}
                _ => return Err(bad_chunk("chunk size not hex")),
            }
            byte = self.next_byte()?;
        }
    }
}

impl<R: Read> Read for ChunkedDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let left = match self.state {
            ChunkState::Done => return Ok(0),
            ChunkState::Data(left) => left,
            ChunkState::Header => {
                let size = self.read_header()?;
                if size == 0 {
                    // The empty trailer section's CRLF belongs to this
                    // stream, not the next message.
                    self.expect_crlf()?;
                    self.state = ChunkState::Done;
                    return Ok(0);
                }
                self.state = ChunkState::Data(size);
                size
            }
        };

        let take = left.min(buf.len() as u64) as usize;
        let read = self.source.read(&mut buf[..take])?;
        if read == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "chunk data cut short",
            ));
        }

        let left = left - read as u64;
        self.state = if left == 0 {
            self.expect_crlf()?;
            ChunkState::Header
        } else {
            ChunkState::Data(left)
        };
        Ok(read)
    }
}

fn hex_digit(byte: u8) -> Option<u64> {
    match byte {
        b'0'..=b'9' => Some((byte - b'0') as u64),
        b'a'..=b'f' => Some((byte - b'a' + 10) as u64),
        b'A'..=b'F' => Some((byte - b'A' + 10) as u64),
        _ => None,
    }
}

fn bad_chunk(what: &'static str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, what)
}

/// Compose the body reader for a received message from its (already
/// validated) `Transfer-Encoding` list and `Content-Length`.
///
/// Decoders wrap outermost to innermost, i.e. in reverse list order, over
/// the connection stream. Only the outermost identity framing consumes the
/// `Content-Length`; an inner identity is a pass-through that reads to its
/// source's end. An empty list is a single identity framing, so no length
/// and no chunking yields an empty body.
pub(crate) fn decode<'a, R: BufRead + 'a>(
    source: &'a mut R,
    encodings: &[Encoding],
    content_length: Option<u64>,
) -> Body<'a> {
    if encodings.is_empty() {
        return match content_length.unwrap_or(0) {
            0 => Body::empty(),
            len => Body::from_reader(LimitedReader::new(source, len)),
        };
    }

    let mut reader: Box<dyn Read + 'a> = Box::new(source);
    for (depth, encoding) in encodings.iter().rev().enumerate() {
        reader = match (encoding, depth) {
            (Encoding::Chunked, _) => Box::new(ChunkedDecoder::new(reader)),
            (Encoding::Identity, 0) => match content_length.unwrap_or(0) {
                0 => return Body::empty(),
                len => Box::new(LimitedReader::new(reader, len)),
            },
            // Inner identities transform nothing.
            (Encoding::Identity, _) => reader,
        };
    }
    Body::from_reader(reader)
}

/// The framing chosen for an outgoing body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Framing {
    /// No body bytes at all.
    Empty,
    /// `Content-Length`-delimited.
    Sized(u64),
    /// Chunked.
    Chunked,
}

/// Decide an outgoing message's body framing and make the headers agree
/// with it.
///
/// An explicit `chunked` transfer coding or `Content-Length` wins. A body
/// of known length defaults the `Content-Length` field; `allow_zero`
/// controls whether an empty body still gets `Content-Length: 0`
/// (responses) or no framing headers at all (requests). Unknown length
/// appends a `chunked` coding.
pub(crate) fn negotiate(
    headers: &mut super::headers::Headers,
    len: Option<u64>,
    allow_zero: bool,
) -> Result<Framing> {
    let mut encodings = headers.transfer_encoding()?;
    if encodings.contains(&Encoding::Chunked) {
        return Ok(Framing::Chunked);
    }
    if let Some(content_length) = headers.content_length()? {
        return Ok(Framing::Sized(content_length));
    }

    match len {
        Some(0) if !allow_zero => Ok(Framing::Empty),
        Some(len) => {
            headers.set_content_length(len);
            Ok(Framing::Sized(len))
        }
        None => {
            encodings.push(Encoding::Chunked);
            headers.set_transfer_encoding(&encodings);
            Ok(Framing::Chunked)
        }
    }
}

/// Write a body through the framing chosen by [`negotiate`].
///
/// Sized framing never writes past the declared length; a body that runs
/// out early simply ends short (the declared length was the caller's
/// claim). Chunked framing emits one chunk per source block and the
/// zero-size last chunk at the end.
pub(crate) fn encode(stream: &mut dyn Write, mut body: Body<'_>, framing: Framing) -> Result<()> {
    let mut block = [0u8; 8 * 1024];
    match framing {
        Framing::Empty => {}
        Framing::Sized(mut left) => {
            while left > 0 {
                let take = left.min(block.len() as u64) as usize;
                let read = body.read(&mut block[..take])?;
                if read == 0 {
                    break;
                }
                stream.write_all(&block[..read])?;
                left -= read as u64;
            }
        }
        Framing::Chunked => {
            loop {
                let read = body.read(&mut block)?;
                if read == 0 {
                    break;
                }
                trace!("chunked write, len={}", read);
                write!(stream, "{:X}\r\n", read)?;
                stream.write_all(&block[..read])?;
                stream.write_all(b"\r\n")?;
            }
            stream.write_all(b"0\r\n\r\n")?;
        }
    }
    Ok(())
}
