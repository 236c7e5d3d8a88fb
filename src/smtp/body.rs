//! The DATA body reader.

use std::io::{self, BufRead, Read};

/// The five-byte end-of-data sequence: a line holding only `.`.
const TERMINATOR: &[u8; 5] = b"\r\n.\r\n";

/// Compute the KMP partial-match (failure) table for a pattern.
fn partial_match_table(pattern: &[u8]) -> Vec<usize> {
    let mut table = vec![0; pattern.len()];
    let mut matched = 0;
    for i in 1..pattern.len() {
        while matched > 0 && pattern[i] != pattern[matched] {
            matched = table[matched - 1];
        }
        if pattern[i] == pattern[matched] {
            matched += 1;
        }
        table[i] = matched;
    }
    table
}

/// Streams a DATA body until the `CRLF . CRLF` terminator.
///
/// The terminator is detected with a KMP automaton whose state carries
/// across reads, so the boundary may be split across the underlying
/// socket reads arbitrarily. The terminator itself is not part of the
/// decoded body; after it, reads return EOF. Dot-stuffed lines are passed
/// through untransformed.
pub struct DataReader<R> {
    inner: R,
    table: Vec<usize>,
    // How much of the terminator the current input suffix matches.
    state: usize,
    out: Vec<u8>,
    out_pos: usize,
    done: bool,
}

impl<R: BufRead> DataReader<R> {
    /// Wrap a stream positioned just after the `DATA` command line.
    pub fn new(inner: R) -> DataReader<R> {
        DataReader {
            inner,
            table: partial_match_table(TERMINATOR),
            state: 0,
            out: Vec::new(),
            out_pos: 0,
            done: false,
        }
    }

    /// Whether the terminator has been seen.
    pub fn finished(&self) -> bool {
        self.done
    }

    /// Unwrap the underlying stream.
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn step(&mut self, byte: u8) {
        loop {
            if byte == TERMINATOR[self.state] {
                self.state += 1;
                if self.state == TERMINATOR.len() {
                    self.done = true;
                }
                return;
            }
            if self.state == 0 {
                self.out.push(byte);
                return;
            }
            // Fall back; bytes that leave the partial match were body
            // bytes after all, and they spell the terminator's prefix.
            let fallback = self.table[self.state - 1];
            self.out
                .extend_from_slice(&TERMINATOR[..self.state - fallback]);
            self.state = fallback;
        }
    }

    fn refill(&mut self) -> io::Result<()> {
        self.out.clear();
        self.out_pos = 0;

        while self.out.is_empty() && !self.done {
            let (eof, used) = {
                let available = match self.inner.fill_buf() {
                    Ok(available) => available,
                    Err(ref err) if err.kind() == io::ErrorKind::Interrupted => continue,
                    Err(err) => return Err(err),
                };
                if available.is_empty() {
                    (true, 0)
                } else {
                    // Bounded copy keeps the emit buffer near one block.
                    let take = available.len().min(1 << 10);
                    let chunk = available[..take].to_vec();
                    let mut processed = 0;
                    for byte in chunk {
                        self.step(byte);
                        processed += 1;
                        if self.done {
                            // Stop at the terminator; what follows is the
                            // next command.
                            break;
                        }
                    }
                    (false, processed)
                }
            };
            if eof {
                // Truncated stream: the partial match was body bytes.
                let state = std::mem::replace(&mut self.state, 0);
                self.out.extend_from_slice(&TERMINATOR[..state]);
                self.done = true;
                break;
            }
            self.inner.consume(used);
        }
        Ok(())
    }
}

impl<R: BufRead> Read for DataReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let take = available.len().min(buf.len());
        buf[..take].copy_from_slice(&available[..take]);
        self.consume(take);
        Ok(take)
    }
}

impl<R: BufRead> BufRead for DataReader<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.out_pos == self.out.len() && !self.done {
            self.refill()?;
        }
        Ok(&self.out[self.out_pos..])
    }

    fn consume(&mut self, amt: usize) {
        self.out_pos = (self.out_pos + amt).min(self.out.len());
    }
}

impl<R> std::fmt::Debug for DataReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataReader")
            .field("matched", &self.state)
            .field("finished", &self.done)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn decode(wire: &[u8]) -> Vec<u8> {
        let mut reader = DataReader::new(Cursor::new(wire.to_vec()));
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn table_matches_terminator() {
        assert_eq!(partial_match_table(TERMINATOR), vec![0, 0, 0, 1, 2]);
    }

    #[test]
    fn body_before_terminator() {
        assert_eq!(decode(b"hi\r\n.\r\n"), b"hi");
    }

    #[test]
    fn terminator_only_is_empty_body() {
        assert_eq!(decode(b"\r\n.\r\n"), b"");
    }

    #[test]
    fn dotted_lines_pass_through() {
        assert_eq!(decode(b"a\r\n..b\r\n.\r\n"), b"a\r\n..b");
    }

    #[test]
    fn near_terminator_prefixes_are_body() {
        assert_eq!(decode(b"a\r\n.b\r\n.\r\n"), b"a\r\n.b");
        assert_eq!(decode(b"\r\r\n.\r\r\n.\r\n"), b"\r\r\n.\r");
    }

    #[test]
    fn bytes_after_terminator_are_not_read() {
        let mut reader = DataReader::new(Cursor::new(b"x\r\n.\r\nQUIT\r\n".to_vec()));
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"x");
        assert!(reader.finished());
        // The command stream resumes exactly after the terminator.
        let mut rest = Vec::new();
        reader.into_inner().read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"QUIT\r\n");
    }

    #[test]
    fn split_reads_decode_identically() {
        // Feed the wire one byte at a time through a 1-byte BufReader to
        // force every boundary split.
        struct OneByte<R>(R);
        impl<R: Read> Read for OneByte<R> {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                if buf.is_empty() {
                    return Ok(0);
                }
                self.0.read(&mut buf[..1])
            }
        }

        let wire = b"line1\r\nline2 with . dot\r\n.\r\n";
        let reader = std::io::BufReader::with_capacity(
            1,
            OneByte(Cursor::new(wire.to_vec())),
        );
        let mut reader = DataReader::new(reader);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"line1\r\nline2 with . dot");
    }

    #[test]
    fn truncated_stream_flushes_partial_match() {
        assert_eq!(decode(b"abc\r\n."), b"abc\r\n.");
    }
}
