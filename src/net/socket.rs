//! RAII thread-safe socket with poll-emulated blocking and interrupts.

use std::io::{self, Read};
use std::net::{Ipv4Addr, Shutdown, SocketAddr};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use socket2::Socket as SysSocket;

use super::host::Host;
use super::resolve::{self, AddressInfo, GaiFlags};
use super::spec::{Family, Protocol, Specification, SocketType};
use super::sys;
use crate::error::{Error, Result};
use crate::time::Timeout;

/// Absorb mutex poisoning; these locks only guard plain state.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Readiness interest for a poll call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Interest(u8);

impl Interest {
    /// Interest in read readiness.
    pub const READABLE: Interest = Interest(0b01);
    /// Interest in write readiness.
    pub const WRITABLE: Interest = Interest(0b10);

    /// Combine two interests.
    pub const fn add(self, other: Interest) -> Interest {
        Interest(self.0 | other.0)
    }

    /// Whether `self` includes all of `other`.
    pub const fn contains(self, other: Interest) -> bool {
        self.0 & other.0 == other.0
    }

    fn poll_bits(self) -> i16 {
        let mut bits = 0;
        if self.contains(Interest::READABLE) {
            bits |= sys::POLL_READ;
        }
        if self.contains(Interest::WRITABLE) {
            bits |= sys::POLL_WRITE;
        }
        bits
    }
}

/// Readiness reported by a poll call. Empty readiness means the call timed
/// out (or an interrupt latched) without the polled event occurring.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Readiness(i16);

impl Readiness {
    /// No events: a timeout-like result.
    pub const NONE: Readiness = Readiness(0);

    /// Whether no event bits are set.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Whether the socket is readable.
    pub fn is_readable(&self) -> bool {
        self.0 & sys::POLL_READ != 0
    }

    /// Whether the socket is writable.
    pub fn is_writable(&self) -> bool {
        self.0 & sys::POLL_WRITE != 0
    }

    /// Whether an error condition was reported.
    pub fn is_error(&self) -> bool {
        self.0 & sys::POLL_ERR != 0
    }

    /// Whether the peer hung up.
    pub fn is_hang_up(&self) -> bool {
        self.0 & sys::POLL_HUP != 0
    }
}

/// Two mutually connected loopback sockets used as a latch to break polls.
///
/// The pair is shared, never exclusively owned: accepted sockets inherit a
/// clone, so interrupting a server interrupts every worker it spawned. One
/// byte written on the notify side is never drained, so once interrupted,
/// every future poll on a sharing socket reports not-ready immediately.
#[derive(Clone)]
pub struct InterruptPair {
    notify: Arc<Socket>,
    watch: Arc<Socket>,
}

impl InterruptPair {
    /// Create a connected pair via a one-shot loopback listener.
    ///
    /// The pair sockets are plain IPv4 and uninterruptable themselves.
    pub fn new() -> Result<InterruptPair> {
        let spec = Specification::new(Family::Inet, SocketType::Stream, Protocol::Tcp);
        let timeout = Timeout::new(Duration::from_secs(10));

        let listener = Socket::new(spec, false)?;
        let loopback = SocketAddr::from((Ipv4Addr::LOCALHOST, 0));
        listener.bind_addr(&AddressInfo::from_addr(loopback, &spec))?;
        listener.listen(1)?;
        let target = listener.local_addr()?;

        let connector = Socket::new(spec, false)?;
        if connector.connect_addr(&AddressInfo::from_addr(target, &spec), timeout)? {
            return Err(Error::new_connect("interrupt pair connect timed out"));
        }
        let (accepted, _) = listener
            .accept(timeout)?
            .ok_or_else(|| Error::new_accept("interrupt pair accept timed out"))?;

        Ok(InterruptPair {
            notify: Arc::new(accepted),
            watch: Arc::new(connector),
        })
    }

    /// Write the latch byte. It is deliberately never read back.
    pub fn issue(&self) -> Result<()> {
        self.notify.send(&[0], Timeout::INFINITE)?;
        Ok(())
    }

    fn watch(&self) -> &Socket {
        &self.watch
    }
}

impl std::fmt::Debug for InterruptPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("InterruptPair")
    }
}

struct State {
    sock: Option<SysSocket>,
    interrupt_pair: Option<InterruptPair>,
    shutdown_read: bool,
    shutdown_write: bool,
}

/// A thread-safe RAII wrapper over a kernel socket.
///
/// Sockets are always non-blocking at the kernel level; blocking semantics
/// are emulated with `poll` against a [`Timeout`]. Operations either
/// succeed, report a timeout sentinel, or fail with a typed error; none
/// silently partially fail. A state mutex guards the fields and is released
/// for the duration of any blocking poll; an operation mutex serializes
/// kernel operations on the same handle.
pub struct Socket {
    spec: Specification,
    state: Mutex<State>,
    // Serializes one logical kernel operation at a time.
    op: Mutex<()>,
}

impl Socket {
    /// Create a kernel socket from the specification and apply the default
    /// options: non-blocking, dual-stack for IPv6, and `SO_LINGER {on, 0}`
    /// so that a close without a prior graceful shutdown aborts the
    /// connection. With `interruptable`, a fresh [`InterruptPair`] is
    /// established.
    pub fn new(spec: Specification, interruptable: bool) -> Result<Socket> {
        let sys =
            SysSocket::new(spec.domain(), spec.sock_type(), spec.sock_protocol()).map_err(Error::new_io)?;
        configure(&sys, &spec, true).map_err(Error::new_io)?;

        let interrupt_pair = if interruptable {
            Some(InterruptPair::new()?)
        } else {
            None
        };

        Ok(Socket::from_parts(sys, spec, interrupt_pair))
    }

    fn from_parts(
        sys: SysSocket,
        spec: Specification,
        interrupt_pair: Option<InterruptPair>,
    ) -> Socket {
        Socket {
            spec,
            state: Mutex::new(State {
                sock: Some(sys),
                interrupt_pair,
                shutdown_read: false,
                shutdown_write: false,
            }),
            op: Mutex::new(()),
        }
    }

    /// The specification the socket was created with.
    pub fn specification(&self) -> Specification {
        self.spec
    }

    /// A socket becomes invalid once aborted (directly, via close, or via
    /// drop).
    pub fn is_valid(&self) -> bool {
        lock(&self.state).sock.is_some()
    }

    /// Whether this socket carries an interrupt pair.
    pub fn is_interruptable(&self) -> bool {
        lock(&self.state).interrupt_pair.is_some()
    }

    /// The shared interrupt pair, if any.
    pub fn interrupt_pair(&self) -> Option<InterruptPair> {
        lock(&self.state).interrupt_pair.clone()
    }

    /// Replace the interrupt pair. A latched pair cannot be un-latched;
    /// installing a fresh pair is the only way to restore blocking.
    pub fn set_interrupt_pair(&self, pair: Option<InterruptPair>) {
        lock(&self.state).interrupt_pair = pair;
    }

    fn raw(&self) -> Result<sys::RawSock> {
        let state = lock(&self.state);
        match state.sock {
            Some(ref sock) => Ok(raw_of(sock)),
            None => Err(Error::new_closed()),
        }
    }

    /// The local address the socket is bound or connected on.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        let state = lock(&self.state);
        let sock = state.sock.as_ref().ok_or_else(Error::new_closed)?;
        let addr = sock.local_addr().map_err(Error::new_io)?;
        addr.as_socket()
            .ok_or_else(|| Error::new_io(not_inet()))
    }

    /// The numeric node/service form of [`local_addr`](Socket::local_addr).
    pub fn local_host(&self) -> Result<Host> {
        Ok(resolve::numeric_host(self.local_addr()?))
    }

    /// The peer address of a connected socket.
    pub fn peer_addr(&self) -> Result<SocketAddr> {
        let state = lock(&self.state);
        let sock = state.sock.as_ref().ok_or_else(Error::new_closed)?;
        let addr = sock.peer_addr().map_err(Error::new_io)?;
        addr.as_socket()
            .ok_or_else(|| Error::new_io(not_inet()))
    }

    /// Poll several sockets at once, blocking up to `timeout`. State locks
    /// are not held across the kernel wait. Event bitmasks containing the
    /// invalid-descriptor bit raise a typed error.
    pub fn poll_many(entries: &[(&Socket, Interest)], timeout: Timeout) -> Result<Vec<Readiness>> {
        let mut fds = Vec::with_capacity(entries.len());
        for (socket, interest) in entries {
            fds.push(sys::poll_fd(socket.raw()?, interest.poll_bits()));
        }

        sys::poll(&mut fds, timeout.as_poll_ms()).map_err(Error::new_io)?;

        let mut readiness = Vec::with_capacity(fds.len());
        for fd in &fds {
            if fd.revents & sys::POLL_NVAL != 0 {
                return Err(Error::new_poll_invalid());
            }
            readiness.push(Readiness(fd.revents));
        }
        Ok(readiness)
    }

    /// Poll this socket, folding in the interrupt pair's watch side. After
    /// an interrupt has latched, every call returns [`Readiness::NONE`]
    /// within the timeout.
    pub fn poll(&self, interest: Interest, timeout: Timeout) -> Result<Readiness> {
        let pair = lock(&self.state).interrupt_pair.clone();
        match pair {
            Some(ref pair) => {
                let readiness = Socket::poll_many(
                    &[(self, interest), (pair.watch(), Interest::READABLE)],
                    timeout,
                )?;
                Ok(readiness[0])
            }
            None => Ok(Socket::poll_many(&[(self, interest)], timeout)?[0]),
        }
    }

    /// Connect to one address. Returns `false` on success, `true` on
    /// timeout (including a latched interrupt).
    pub fn connect_addr(&self, addr: &AddressInfo, timeout: Timeout) -> Result<bool> {
        let _op = lock(&self.op);
        self.connect_addr_locked(addr, timeout)
    }

    fn connect_addr_locked(&self, addr: &AddressInfo, timeout: Timeout) -> Result<bool> {
        {
            let state = lock(&self.state);
            let sock = state.sock.as_ref().ok_or_else(Error::new_closed)?;
            match sock.connect(&addr.addr) {
                // Non-blocking connect can complete immediately.
                Ok(()) => return Ok(false),
                Err(ref err) if connect_pending(err) => {}
                Err(err) => return Err(Error::new_connect(err)),
            }
        }

        // Pending: wait for writability under the timeout. Anything other
        // than clean writability is reported as a failure to connect.
        let readiness = self.poll(Interest::WRITABLE, timeout)?;
        Ok(!(readiness.is_writable() && !readiness.is_error()))
    }

    /// Connect to a list of addresses, serially or in parallel. Serial
    /// tries each address with the full timeout, remembering the first
    /// error and raising it only if every address fails. Parallel races one
    /// uninterruptable probe socket per address and swaps the first winning
    /// handle into `self`. Returns `true` on timeout or an empty list.
    pub fn connect_addrs(
        &self,
        addrs: &[AddressInfo],
        parallel: bool,
        timeout: Timeout,
    ) -> Result<bool> {
        let _op = lock(&self.op);
        self.connect_addrs_locked(addrs, parallel, timeout)
    }

    fn connect_addrs_locked(
        &self,
        addrs: &[AddressInfo],
        parallel: bool,
        timeout: Timeout,
    ) -> Result<bool> {
        if addrs.is_empty() {
            return Ok(true);
        }

        if parallel {
            let (tx, rx) = mpsc::channel::<SysSocket>();
            for addr in addrs {
                let tx = tx.clone();
                let addr = addr.clone();
                let spec = self.spec;
                thread::spawn(move || {
                    // Probe sockets skip interrupt pair creation.
                    let probe = match Socket::new(spec, false) {
                        Ok(probe) => probe,
                        Err(err) => {
                            debug!("parallel connect probe: {}", err);
                            return;
                        }
                    };
                    match probe.connect_addr(&addr, timeout) {
                        Ok(false) => {
                            if let Some(sys) = probe.take_sys() {
                                // First winner is kept; the rest hang up on
                                // the closed channel and destruct.
                                let _ = tx.send(sys);
                            }
                        }
                        Ok(true) => trace!("parallel connect timeout: {}", addr),
                        Err(err) => debug!("parallel connect {}: {}", addr, err),
                    }
                });
            }
            drop(tx);

            let winner = match timeout.remaining() {
                None => rx.recv().ok(),
                Some(remaining) => rx.recv_timeout(remaining).ok(),
            };
            match winner {
                Some(sys) => {
                    // Swap the winning handle in; the old handle closes.
                    let old = lock(&self.state).sock.replace(sys);
                    drop(old);
                    Ok(false)
                }
                None => Ok(true),
            }
        } else {
            let mut first_err: Option<Error> = None;
            for addr in addrs {
                match self.connect_addr_locked(addr, timeout) {
                    Ok(false) => return Ok(false),
                    // Timed out or refused; try the next address.
                    Ok(true) => {}
                    Err(err) => {
                        if first_err.is_none() {
                            first_err = Some(err);
                        }
                    }
                }
            }
            match first_err {
                Some(err) => Err(err),
                None => Ok(true),
            }
        }
    }

    /// Resolve a host and connect to the results. The socket's own
    /// specification fills any defaults left in `gai_spec`.
    pub fn connect_host(
        &self,
        host: &Host,
        parallel: bool,
        timeout: Timeout,
        gai_spec: &Specification,
        gai_flags: GaiFlags,
    ) -> Result<bool> {
        let spec = gai_spec.merge(&self.spec);
        let addrs = resolve::getaddrinfo(host, &spec, gai_flags)?;
        self.connect_addrs(&addrs, parallel, timeout)
    }

    /// Bind to one address.
    pub fn bind_addr(&self, addr: &AddressInfo) -> Result<()> {
        let _op = lock(&self.op);
        self.bind_addr_locked(addr)
    }

    fn bind_addr_locked(&self, addr: &AddressInfo) -> Result<()> {
        let state = lock(&self.state);
        let sock = state.sock.as_ref().ok_or_else(Error::new_closed)?;
        sock.bind(&addr.addr).map_err(Error::new_listen)
    }

    /// Bind to the first address in the list that accepts the binding,
    /// rethrowing the first failure if none does. Returns `true` on an
    /// empty list.
    pub fn bind_addrs(&self, addrs: &[AddressInfo]) -> Result<bool> {
        let _op = lock(&self.op);
        if addrs.is_empty() {
            return Ok(true);
        }

        let mut first_err = None;
        for addr in addrs {
            match self.bind_addr_locked(addr) {
                Ok(()) => return Ok(false),
                Err(err) => {
                    if first_err.is_none() {
                        first_err = Some(err);
                    }
                }
            }
        }
        // All addresses failed; the first error speaks for them.
        Err(first_err.expect("non-empty address list"))
    }

    /// Resolve a host (passively by default) and bind to the results.
    pub fn bind_host(
        &self,
        host: &Host,
        gai_spec: &Specification,
        gai_flags: GaiFlags,
    ) -> Result<bool> {
        let spec = gai_spec.merge(&self.spec);
        let addrs = resolve::getaddrinfo(host, &spec, gai_flags)?;
        self.bind_addrs(&addrs)
    }

    /// Listen on a bound socket.
    ///
    /// Very large and very small backlogs are both susceptible to SYN
    /// floods; the default used by the server layer is 200.
    pub fn listen(&self, backlog: i32) -> Result<()> {
        let _op = lock(&self.op);
        let state = lock(&self.state);
        let sock = state.sock.as_ref().ok_or_else(Error::new_closed)?;
        sock.listen(backlog).map_err(Error::new_listen)
    }

    /// Accept one connection on a listening socket. Returns `None` on
    /// timeout (or latched interrupt). The accepted socket has the default
    /// options re-applied and inherits this socket's interrupt pair.
    pub fn accept(&self, timeout: Timeout) -> Result<Option<(Socket, AddressInfo)>> {
        let _op = lock(&self.op);

        if self.poll(Interest::READABLE, timeout)?.is_empty() {
            return Ok(None);
        }

        let state = lock(&self.state);
        let sock = state.sock.as_ref().ok_or_else(Error::new_closed)?;
        let (sys, sockaddr) = match sock.accept() {
            Ok(accepted) => accepted,
            // The ready connection disappeared between poll and accept.
            Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(None),
            Err(err) => return Err(Error::new_accept(err)),
        };
        configure(&sys, &self.spec, false).map_err(Error::new_accept)?;

        let peer = AddressInfo {
            flags: GaiFlags::NONE,
            family: match sockaddr.as_socket() {
                Some(SocketAddr::V4(_)) => Family::Inet,
                Some(SocketAddr::V6(_)) => Family::Inet6,
                None => Family::Unspec,
            },
            socket_type: self.spec.resolved().1,
            protocol: self.spec.resolved().2,
            canon_name: None,
            addr: sockaddr,
        };
        let accepted = Socket::from_parts(sys, self.spec, state.interrupt_pair.clone());
        Ok(Some((accepted, peer)))
    }

    /// Wait for writability once, then issue a single send. Returns the
    /// bytes sent (possibly short), or `0` on timeout.
    pub fn send_once(&self, buf: &[u8], timeout: Timeout) -> Result<usize> {
        let _op = lock(&self.op);
        self.send_once_locked(buf, timeout)
    }

    fn send_once_locked(&self, buf: &[u8], timeout: Timeout) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            if self.poll(Interest::WRITABLE, timeout)?.is_empty() {
                return Ok(0);
            }

            let state = lock(&self.state);
            let sock = state.sock.as_ref().ok_or_else(Error::new_closed)?;
            match sock.send(buf) {
                Ok(sent) => return Ok(sent),
                // Readiness was stale; wait again under the same deadline.
                Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => {}
                Err(err) => return Err(Error::new_io(err)),
            }
        }
    }

    /// Send until all bytes are out or a [`send_once`](Socket::send_once)
    /// makes no progress within the timeout. Returns the bytes sent.
    pub fn send(&self, buf: &[u8], timeout: Timeout) -> Result<usize> {
        let _op = lock(&self.op);
        let mut sent = 0;
        while sent < buf.len() {
            let once = self.send_once_locked(&buf[sent..], timeout)?;
            if once == 0 {
                break;
            }
            sent += once;
        }
        Ok(sent)
    }

    /// Wait for readability, then issue a single recv. Returns `None` on
    /// timeout, `Some(0)` on peer FIN, otherwise the bytes read.
    pub fn recv(&self, buf: &mut [u8], timeout: Timeout) -> Result<Option<usize>> {
        let _op = lock(&self.op);
        self.recv_locked(buf, timeout)
    }

    fn recv_locked(&self, buf: &mut [u8], timeout: Timeout) -> Result<Option<usize>> {
        loop {
            if self.poll(Interest::READABLE, timeout)?.is_empty() {
                return Ok(None);
            }

            let state = lock(&self.state);
            let sock = state.sock.as_ref().ok_or_else(Error::new_closed)?;
            let mut reader: &SysSocket = sock;
            match reader.read(buf) {
                Ok(read) => return Ok(Some(read)),
                Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => {}
                Err(err) => return Err(Error::new_io(err)),
            }
        }
    }

    /// Shut down a direction of the connection; write by default sends the
    /// peer a FIN. Directions latch: repeated shutdowns are no-ops, and a
    /// peer that already aborted ("not connected") counts as shut down.
    pub fn shutdown(&self, how: Shutdown) -> Result<()> {
        let _op = lock(&self.op);
        let mut state = lock(&self.state);
        shutdown_locked(&mut state, how)
    }

    /// Graceful close: shut down write, drain the peer until FIN or
    /// timeout (consuming recv errors), then abort. Returns `true` on
    /// timeout. Idempotent.
    pub fn close(&self, timeout: Timeout) -> Result<bool> {
        let _op = lock(&self.op);

        {
            let mut state = lock(&self.state);
            if state.sock.is_none() {
                return Ok(false);
            }
            shutdown_locked(&mut state, Shutdown::Write)?;
        }

        // Drain until the peer acknowledges with its own FIN. Errors here
        // are expected when the peer aborts, and are consumed.
        let mut timed_out = false;
        let mut scratch = [0u8; 1024];
        loop {
            match self.recv_locked(&mut scratch, timeout) {
                Ok(None) => {
                    timed_out = true;
                    break;
                }
                Ok(Some(0)) => {
                    lock(&self.state).shutdown_read = true;
                    break;
                }
                Ok(Some(_)) => {}
                Err(err) => {
                    trace!("close drain: {}", err);
                    break;
                }
            }
        }

        lock(&self.state).sock.take();
        Ok(timed_out)
    }

    /// Close the kernel handle immediately, discarding unsent data (the
    /// sockets of this crate do not linger). Idempotent; never fails.
    pub fn abort(&self) {
        let _op = lock(&self.op);
        lock(&self.state).sock.take();
    }

    /// Latch the interrupt: every subsequent poll on any socket sharing
    /// this pair returns not-ready immediately. Fails with a typed error on
    /// an uninterruptable socket.
    pub fn interrupt(&self) -> Result<()> {
        let pair = lock(&self.state)
            .interrupt_pair
            .clone()
            .ok_or_else(Error::new_uninterruptable)?;
        pair.issue()
    }

    fn take_sys(&self) -> Option<SysSocket> {
        lock(&self.state).sock.take()
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        self.abort();
    }
}

impl std::fmt::Debug for Socket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("Socket")
            .field("valid", &state.sock.is_some())
            .field("interruptable", &state.interrupt_pair.is_some())
            .finish()
    }
}

fn shutdown_locked(state: &mut State, how: Shutdown) -> Result<()> {
    // Filter directions that already latched.
    let write = matches!(how, Shutdown::Write | Shutdown::Both) && !state.shutdown_write;
    let read = matches!(how, Shutdown::Read | Shutdown::Both) && !state.shutdown_read;
    state.shutdown_write |= write;
    state.shutdown_read |= read;

    let how = match (write, read) {
        (true, true) => Shutdown::Both,
        (true, false) => Shutdown::Write,
        (false, true) => Shutdown::Read,
        (false, false) => return Ok(()),
    };

    let sock = state.sock.as_ref().ok_or_else(Error::new_closed)?;
    match sock.shutdown(how) {
        Ok(()) => Ok(()),
        // The peer may have aborted already; its end of the work is done.
        Err(ref err) if err.kind() == io::ErrorKind::NotConnected => {
            state.shutdown_read = true;
            state.shutdown_write = true;
            Ok(())
        }
        Err(err) => Err(Error::new_io(err)),
    }
}

/// Default options for a fresh or freshly accepted socket.
fn configure(sock: &SysSocket, spec: &Specification, fresh: bool) -> io::Result<()> {
    sock.set_nonblocking(true)?;
    if fresh && spec.domain() == socket2::Domain::IPV6 {
        sock.set_only_v6(false)?;
    }
    sock.set_linger(Some(Duration::from_secs(0)))?;
    Ok(())
}

fn connect_pending(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::WouldBlock {
        return true;
    }
    #[cfg(unix)]
    {
        err.raw_os_error() == Some(libc::EINPROGRESS)
    }
    #[cfg(windows)]
    {
        // WSAEWOULDBLOCK / WSAEINPROGRESS.
        matches!(err.raw_os_error(), Some(10035) | Some(10036))
    }
}

fn not_inet() -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, "not an internet address")
}

#[cfg(unix)]
fn raw_of(sock: &SysSocket) -> sys::RawSock {
    use std::os::unix::io::AsRawFd;
    sock.as_raw_fd()
}

#[cfg(windows)]
fn raw_of(sock: &SysSocket) -> sys::RawSock {
    use std::os::windows::io::AsRawSocket;
    sock.as_raw_socket()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupt_latches_every_future_poll() {
        let pair = InterruptPair::new().expect("pair");
        let socket = Socket::new(Specification::TCP, false).expect("socket");
        socket.set_interrupt_pair(Some(pair));

        socket.interrupt().expect("interrupt");

        // Nothing was connected, so readable polls would otherwise block
        // for the full timeout; the latch returns them immediately.
        for _ in 0..3 {
            let readiness = socket
                .poll(Interest::READABLE, Timeout::new(Duration::from_secs(5)))
                .expect("poll");
            assert!(readiness.is_empty());
        }
    }

    #[test]
    fn interrupt_without_pair_is_misuse() {
        let socket = Socket::new(Specification::TCP, false).expect("socket");
        let err = socket.interrupt().expect_err("uninterruptable");
        assert!(err.is_user());
    }

    #[test]
    fn abort_is_idempotent() {
        let socket = Socket::new(Specification::TCP, false).expect("socket");
        assert!(socket.is_valid());
        socket.abort();
        assert!(!socket.is_valid());
        socket.abort();
        assert!(!socket.is_valid());
    }

    #[test]
    fn close_after_abort_is_a_no_op() {
        let socket = Socket::new(Specification::TCP, false).expect("socket");
        socket.abort();
        let timed_out = socket.close(Timeout::new(Duration::from_secs(1))).unwrap();
        assert!(!timed_out);
    }

    #[test]
    fn accepted_socket_inherits_interruptability() {
        let spec = Specification::new(Family::Inet, SocketType::Stream, Protocol::Tcp);
        let server = Socket::new(spec, true).expect("server");
        let loopback = SocketAddr::from((Ipv4Addr::LOCALHOST, 0));
        server
            .bind_addr(&AddressInfo::from_addr(loopback, &spec))
            .expect("bind");
        server.listen(16).expect("listen");

        let client = Socket::new(spec, false).expect("client");
        let target = AddressInfo::from_addr(server.local_addr().unwrap(), &spec);
        assert!(!client
            .connect_addr(&target, Timeout::new(Duration::from_secs(5)))
            .unwrap());

        let (worker, peer) = server
            .accept(Timeout::new(Duration::from_secs(5)))
            .expect("accept")
            .expect("not a timeout");
        assert!(worker.is_interruptable());
        assert!(peer.socket_addr().is_some());
    }

    #[test]
    fn connect_to_empty_address_list_times_out() {
        let socket = Socket::new(Specification::TCP, false).expect("socket");
        assert!(socket
            .connect_addrs(&[], true, Timeout::new(Duration::from_secs(1)))
            .unwrap());
    }
}
