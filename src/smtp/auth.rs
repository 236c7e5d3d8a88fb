//! SMTP authentication methods.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Parse};

/// An authentication mechanism named by `AUTH`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum AuthMethod {
    /// AUTH PLAIN
    Plain,
    /// AUTH LOGIN
    Login,
    /// AUTH CRAM-MD5
    CramMd5,
}

impl AuthMethod {
    /// The canonical token.
    pub fn as_str(&self) -> &'static str {
        match *self {
            AuthMethod::Plain => "PLAIN",
            AuthMethod::Login => "LOGIN",
            AuthMethod::CramMd5 => "CRAM-MD5",
        }
    }
}

impl FromStr for AuthMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<AuthMethod, Error> {
        if s.eq_ignore_ascii_case("PLAIN") {
            Ok(AuthMethod::Plain)
        } else if s.eq_ignore_ascii_case("LOGIN") {
            Ok(AuthMethod::Login)
        } else if s.eq_ignore_ascii_case("CRAM-MD5") {
            Ok(AuthMethod::CramMd5)
        } else {
            Err(Parse::Command.into())
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_methods() {
        assert_eq!("login".parse::<AuthMethod>().unwrap(), AuthMethod::Login);
        assert_eq!("PLAIN".parse::<AuthMethod>().unwrap(), AuthMethod::Plain);
        assert_eq!(
            "cram-md5".parse::<AuthMethod>().unwrap(),
            AuthMethod::CramMd5
        );
        assert!("NTLM".parse::<AuthMethod>().is_err());
    }
}
