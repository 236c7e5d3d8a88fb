//! Server role: accept loop, worker lifecycle, cooperative shutdown.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::host::Host;
use super::resolve::{AddressInfo, GaiFlags};
use super::socket::{lock, Socket};
use super::spec::Specification;
use crate::error::{Error, Result};
use crate::executor::{Executor, ExecutorHandle};
use crate::time::Timeout;

/// A per-connection session run by the server on one executor thread.
///
/// `on_work` is the protocol loop; when it returns the worker is dropped
/// and deregistered. Errors are consumed and logged by the server.
pub trait Worker: Send + 'static {
    /// Run the session to completion.
    fn on_work(&mut self) -> Result<()>;
}

/// Builds a [`Worker`] for each accepted connection.
///
/// The socket is shared: the server keeps a handle so that it can abort
/// stragglers at shutdown. Implemented for plain closures.
pub trait WorkerFactory: Send + Sync + 'static {
    /// The worker type produced.
    type Worker: Worker;

    /// Wrap one accepted connection.
    fn worker(&self, socket: Arc<Socket>, peer: AddressInfo) -> Self::Worker;
}

impl<F, W> WorkerFactory for F
where
    F: Fn(Arc<Socket>, AddressInfo) -> W + Send + Sync + 'static,
    W: Worker,
{
    type Worker = W;

    fn worker(&self, socket: Arc<Socket>, peer: AddressInfo) -> W {
        (self)(socket, peer)
    }
}

/// Options for [`Server::serve`].
#[derive(Clone, Debug)]
pub struct ServeOptions {
    /// Per-iteration accept timeout; the loop simply retries on expiry.
    pub accept_idle: Duration,
    /// Listen backlog.
    pub backlog: i32,
    /// Resolution hints for binding; defaults filled from the server's
    /// specification.
    pub gai_spec: Specification,
    /// Resolution flags for binding.
    pub gai_flags: GaiFlags,
}

impl Default for ServeOptions {
    fn default() -> ServeOptions {
        ServeOptions {
            accept_idle: Duration::from_secs(60),
            backlog: 200,
            gai_spec: Specification::default(),
            gai_flags: GaiFlags::default_bind(),
        }
    }
}

struct Registry {
    next_id: u64,
    live: HashMap<u64, Arc<Socket>>,
}

/// A listening socket plus a bounded executor and the set of live workers.
///
/// Interrupting the server's socket reaches every worker, because accepted
/// sockets share the server's interrupt pair. The server satisfies NBTA
/// with respect to a single controlling thread: `close` returns within its
/// timeout plus one accept-idle quantum.
pub struct Server {
    socket: Arc<Socket>,
    executor: Executor,
    registry: Arc<Mutex<Registry>>,
    closing: Arc<AtomicBool>,
}

impl Server {
    /// Create a server with an interruptable listening socket and a worker
    /// pool capped at `max_threads` (`0` = unbounded; the protocol servers
    /// default to 1024).
    pub fn new(spec: Specification, max_threads: usize) -> Result<Server> {
        Ok(Server {
            socket: Arc::new(Socket::new(spec, true)?),
            executor: Executor::new(max_threads),
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                live: HashMap::new(),
            })),
            closing: Arc::new(AtomicBool::new(false)),
        })
    }

    /// The listening socket.
    pub fn socket(&self) -> &Socket {
        &self.socket
    }

    /// The numeric address the server is bound on; useful after binding to
    /// an ephemeral port.
    pub fn local_host(&self) -> Result<Host> {
        self.socket.local_host()
    }

    /// Block until the executor is idle; `true` on timeout.
    pub fn block_for_tasks(&self, timeout: Timeout) -> bool {
        self.executor.block_for_tasks(timeout)
    }

    /// Bind, listen, and start the accept loop as an executor task. Each
    /// accepted connection becomes a worker from `factory`, run as its own
    /// task.
    pub fn serve<F>(&self, host: &Host, options: ServeOptions, factory: F) -> Result<()>
    where
        F: WorkerFactory,
    {
        if self
            .socket
            .bind_host(host, &options.gai_spec, options.gai_flags)?
        {
            return Err(Error::new_listen("host resolved to no addresses"));
        }
        self.socket.listen(options.backlog)?;
        debug!("serving on {}", self.socket.local_host()?);

        let socket = Arc::clone(&self.socket);
        let registry = Arc::clone(&self.registry);
        let closing = Arc::clone(&self.closing);
        let executor = self.executor.handle();
        let factory = Arc::new(factory);
        let accept_idle = options.accept_idle;
        self.executor.submit(move || {
            accept_loop(socket, registry, closing, executor, factory, accept_idle)
        });
        Ok(())
    }

    /// Graceful shutdown: latch closing, interrupt the shared pair
    /// (unblocking the accept loop and every worker's current poll), wait
    /// up to `timeout` for the executor to drain, abort any workers that
    /// remain, then abort the listening socket. Returns `true` if the
    /// drain timed out.
    pub fn close(&self, timeout: Timeout) -> bool {
        self.closing.store(true, Ordering::SeqCst);
        if let Err(err) = self.socket.interrupt() {
            debug!("server interrupt: {}", err);
        }
        let timed_out = self.executor.block_for_tasks(timeout);
        self.abort_workers();
        self.socket.abort();
        timed_out
    }

    /// Abortive shutdown: as [`close`](Server::close) but without waiting.
    pub fn abort(&self) {
        self.closing.store(true, Ordering::SeqCst);
        if let Err(err) = self.socket.interrupt() {
            debug!("server interrupt: {}", err);
        }
        self.abort_workers();
        self.socket.abort();
    }

    fn abort_workers(&self) {
        let stragglers: Vec<_> = lock(&self.registry).live.values().cloned().collect();
        for socket in stragglers {
            socket.abort();
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.abort();
        // The executor joins its threads when it drops after this.
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("socket", &self.socket)
            .field("workers", &lock(&self.registry).live.len())
            .field("closing", &self.closing.load(Ordering::SeqCst))
            .finish()
    }
}

/// Deregisters a worker's socket exactly once, even when the worker task
/// unwinds.
struct Deregister {
    registry: Arc<Mutex<Registry>>,
    id: u64,
}

impl Drop for Deregister {
    fn drop(&mut self) {
        lock(&self.registry).live.remove(&self.id);
    }
}

fn accept_loop<F>(
    socket: Arc<Socket>,
    registry: Arc<Mutex<Registry>>,
    closing: Arc<AtomicBool>,
    executor: ExecutorHandle,
    factory: Arc<F>,
    accept_idle: Duration,
) where
    F: WorkerFactory,
{
    loop {
        let accepted = match socket.accept(Timeout::new(accept_idle)) {
            Ok(accepted) => accepted,
            Err(err) => {
                if !closing.load(Ordering::SeqCst) {
                    error!("accept: {}", err);
                }
                return;
            }
        };
        if closing.load(Ordering::SeqCst) {
            return;
        }
        let (accepted, peer) = match accepted {
            Some(accepted) => accepted,
            // Accept-idle timeout; just retry.
            None => continue,
        };

        trace!("accepted connection from {}", peer);
        let accepted = Arc::new(accepted);
        let id = {
            let mut registry = lock(&registry);
            let id = registry.next_id;
            registry.next_id += 1;
            registry.live.insert(id, Arc::clone(&accepted));
            id
        };

        let mut worker = factory.worker(accepted, peer);
        let guard = Deregister {
            registry: Arc::clone(&registry),
            id,
        };
        executor.submit(move || {
            let _guard = guard;
            if let Err(err) = worker.on_work() {
                debug!("worker finished with error: {}", err);
            }
        });
    }
}
