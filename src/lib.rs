#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![cfg_attr(test, deny(rust_2018_idioms))]

//! # rain
//!
//! A layered, interruptable socket runtime for blocking TCP services,
//! specialized upward into HTTP and SMTP clients and servers.
//!
//! The layers, bottom to top:
//!
//! - [`net`]: a thread-safe RAII [`net::Socket`] that is always
//!   non-blocking at the kernel level, with blocking semantics emulated
//!   through `poll` and a monotonic [`time::Timeout`]; address resolution
//!   (including MX lookup); and the server/worker/client role
//!   composition. Sockets may share an interrupt pair: one latched byte
//!   breaks every current and future poll, which is how servers shut
//!   their workers down cooperatively.
//! - [`executor`]: the bounded worker pool that servers run accept loops
//!   and per-connection workers on.
//! - [`stream`]: an `io`-compatible buffered duplex adapter with
//!   independent receive-idle and per-progress send timeouts.
//! - [`proto`]: the request/response message contract shared by the
//!   protocols.
//! - [`http`] and [`smtp`]: wire framing, typed message types, worker
//!   state machines, and clients.
//!
//! There is no async runtime here; each connection occupies one executor
//! thread, and every blocking operation takes a deadline.

#[macro_use]
extern crate log;

pub use crate::error::{Error, Result};
pub use crate::time::Timeout;

mod error;

pub mod executor;
pub mod http;
pub mod net;
pub mod proto;
pub mod smtp;
pub mod stream;
pub mod time;
