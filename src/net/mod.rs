//! The socket runtime: specifications, resolution, the interruptable
//! `Socket`, and the server/worker/client role composition over it.

pub mod client;
pub mod dns;
pub mod host;
pub mod resolve;
pub mod server;
pub mod socket;
pub mod spec;
pub(crate) mod sys;

pub use self::client::{Client, ConnectOptions};
pub use self::dns::{lookup_mx, MxRecord};
pub use self::host::Host;
pub use self::resolve::{getaddrinfo, numeric_host, AddressInfo, GaiFlags};
pub use self::server::{ServeOptions, Server, Worker, WorkerFactory};
pub use self::socket::{Interest, InterruptPair, Readiness, Socket};
pub use self::spec::{Family, Protocol, Specification, SocketType};
