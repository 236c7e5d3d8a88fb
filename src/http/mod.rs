//! HTTP/0.9, 1.0, and 1.1 over the socket runtime.

pub mod body;
pub mod client;
pub mod headers;
pub mod method;
pub mod request;
pub mod response;
pub mod status;
pub mod version;
pub mod worker;

pub use self::body::Body;
pub use self::client::Client;
pub use self::headers::{Encoding, Headers, SetCookie};
pub use self::method::Method;
pub use self::request::Request;
pub use self::response::Response;
pub use self::status::StatusCode;
pub use self::version::Version;
pub use self::worker::{Handler, PreResponse, Server};
