//! Buffered duplex stream adapter over a [`Socket`].

use std::io::{self, BufRead, Read, Write};
use std::sync::Arc;
use std::time::Duration;

use crate::net::socket::Socket;
use crate::time::Timeout;

/// Buffer sizes and timeout durations for a [`SocketStream`].
///
/// The two timeout knobs are deliberately distinct clocks: the recv idle
/// duration bounds the wall time from one message boundary to the next
/// (the deadline is absolute across however many reads one message takes),
/// while the send timeout applies to each unit of send progress.
#[derive(Clone, Debug)]
pub struct StreamConfig {
    /// User-space receive buffer length.
    pub recv_buffer_len: usize,
    /// User-space send buffer length.
    pub send_buffer_len: usize,
    /// Maximum idle time between whole received messages.
    pub max_recv_idle: Duration,
    /// Timeout applied to each `send_once` progress step.
    pub send_once_timeout: Duration,
}

impl Default for StreamConfig {
    fn default() -> StreamConfig {
        StreamConfig {
            recv_buffer_len: 1 << 10,
            send_buffer_len: 1 << 10,
            max_recv_idle: Duration::from_secs(60),
            send_once_timeout: Duration::from_secs(60),
        }
    }
}

/// An `io`-compatible duplex stream over a shared [`Socket`].
///
/// Reads pull through a fixed buffer with one `Socket::recv` per refill,
/// bounded by the current recv deadline; a timeout surfaces as
/// `io::ErrorKind::TimedOut` and peer FIN as EOF. Writes accumulate in a
/// fixed buffer; flushing loops `send_once` with a fresh per-progress
/// timeout, so sending a large body may take up to
/// `ceil(len / buffer) × send_once_timeout`.
pub struct SocketStream {
    socket: Arc<Socket>,
    config: StreamConfig,
    rbuf: Vec<u8>,
    rpos: usize,
    rcap: usize,
    wbuf: Vec<u8>,
    recv_deadline: Timeout,
    eof: bool,
}

impl SocketStream {
    /// Wrap a socket with the given configuration. The first recv deadline
    /// starts now.
    pub fn new(socket: Arc<Socket>, config: StreamConfig) -> SocketStream {
        let recv_deadline = Timeout::new(config.max_recv_idle);
        SocketStream {
            rbuf: vec![0; config.recv_buffer_len.max(1)],
            rpos: 0,
            rcap: 0,
            wbuf: Vec::with_capacity(config.send_buffer_len.max(1)),
            socket,
            config,
            recv_deadline,
            eof: false,
        }
    }

    /// The underlying socket.
    pub fn socket(&self) -> &Socket {
        &self.socket
    }

    /// A shared handle to the underlying socket.
    pub fn shared_socket(&self) -> Arc<Socket> {
        Arc::clone(&self.socket)
    }

    /// Restart the recv idle clock. Called at message boundaries.
    pub fn reset_recv_deadline(&mut self) {
        self.recv_deadline = Timeout::new(self.config.max_recv_idle);
    }

    /// Whether the peer has sent FIN and the buffer is exhausted.
    pub fn is_eof(&self) -> bool {
        self.eof && self.rpos == self.rcap
    }

    fn flush_wbuf(&mut self) -> io::Result<()> {
        let mut sent = 0;
        while sent < self.wbuf.len() {
            let once = self
                .socket
                .send_once(
                    &self.wbuf[sent..],
                    Timeout::new(self.config.send_once_timeout),
                )
                .map_err(other)?;
            if once == 0 {
                // No progress within one send timeout; the stream is
                // considered failed. Keep what remains unsent.
                self.wbuf.drain(..sent);
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "send made no progress within the timeout",
                ));
            }
            sent += once;
        }
        self.wbuf.clear();
        Ok(())
    }
}

impl BufRead for SocketStream {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.rpos == self.rcap && !self.eof {
            match self.socket.recv(&mut self.rbuf, self.recv_deadline) {
                Ok(None) => {
                    return Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        "recv idle deadline passed",
                    ));
                }
                Ok(Some(0)) => {
                    self.eof = true;
                }
                Ok(Some(read)) => {
                    self.rpos = 0;
                    self.rcap = read;
                }
                Err(err) => return Err(other(err)),
            }
        }
        Ok(&self.rbuf[self.rpos..self.rcap])
    }

    fn consume(&mut self, amt: usize) {
        self.rpos = (self.rpos + amt).min(self.rcap);
    }
}

impl Read for SocketStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let take = available.len().min(buf.len());
        buf[..take].copy_from_slice(&available[..take]);
        self.consume(take);
        Ok(take)
    }
}

impl Write for SocketStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut written = 0;
        while written < buf.len() {
            let room = self.config.send_buffer_len.max(1) - self.wbuf.len();
            if room == 0 {
                self.flush_wbuf()?;
                continue;
            }
            let take = room.min(buf.len() - written);
            self.wbuf.extend_from_slice(&buf[written..written + take]);
            written += take;
        }
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_wbuf()
    }
}

impl std::fmt::Debug for SocketStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketStream")
            .field("socket", &self.socket)
            .field("buffered_read", &(self.rcap - self.rpos))
            .field("buffered_write", &self.wbuf.len())
            .field("eof", &self.eof)
            .finish()
    }
}

fn other(err: crate::Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err)
}
