//! The HTTP request method.

use std::fmt;
use std::str::FromStr;

use self::Method::{Connect, Delete, Get, Head, Options, Patch, Post, Put, Trace};
use crate::error::{Error, Parse};

/// The request method (verb).
///
/// The set is closed: parsing a method outside it is an error that workers
/// surface as `405 Method Not Allowed`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Method {
    /// OPTIONS
    Options,
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
    /// HEAD
    Head,
    /// TRACE
    Trace,
    /// CONNECT
    Connect,
    /// PATCH
    Patch,
}

impl Method {
    /// Whether a method is considered "safe", meaning the request is
    /// essentially read-only.
    pub fn safe(&self) -> bool {
        matches!(*self, Get | Head | Options | Trace)
    }

    /// Whether a method is considered "idempotent", meaning the request
    /// has the same result if executed multiple times.
    pub fn idempotent(&self) -> bool {
        self.safe() || matches!(*self, Put | Delete)
    }

    /// The canonical token.
    pub fn as_str(&self) -> &'static str {
        match *self {
            Options => "OPTIONS",
            Get => "GET",
            Post => "POST",
            Put => "PUT",
            Delete => "DELETE",
            Head => "HEAD",
            Trace => "TRACE",
            Connect => "CONNECT",
            Patch => "PATCH",
        }
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Method, Error> {
        match s {
            "OPTIONS" => Ok(Options),
            "GET" => Ok(Get),
            "POST" => Ok(Post),
            "PUT" => Ok(Put),
            "DELETE" => Ok(Delete),
            "HEAD" => Ok(Head),
            "TRACE" => Ok(Trace),
            "CONNECT" => Ok(Connect),
            "PATCH" => Ok(Patch),
            _ => Err(Parse::Method.into()),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::Method;
    use super::Method::{Get, Post, Put};

    #[test]
    fn test_safe() {
        assert!(Get.safe());
        assert!(!Post.safe());
    }

    #[test]
    fn test_idempotent() {
        assert!(Get.idempotent());
        assert!(Put.idempotent());
        assert!(!Post.idempotent());
    }

    #[test]
    fn test_from_str() {
        assert_eq!("GET".parse::<Method>().unwrap(), Get);
        let err = "MOVE".parse::<Method>().unwrap_err();
        assert!(err.is_parse());
    }

    #[test]
    fn test_fmt() {
        assert_eq!("GET", format!("{}", Get));
    }
}
