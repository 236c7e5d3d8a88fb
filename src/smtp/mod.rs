//! SMTP over the socket runtime.

pub mod auth;
pub mod body;
pub mod client;
pub mod command;
pub mod mailbox;
pub mod request;
pub mod response;
pub mod status;
pub mod worker;

pub use self::auth::AuthMethod;
pub use self::body::DataReader;
pub use self::client::Client;
pub use self::command::Command;
pub use self::mailbox::Mailbox;
pub use self::request::Request;
pub use self::response::Response;
pub use self::status::{Category, StatusCode};
pub use self::worker::{Handler, PreResponse, Server, Session};
