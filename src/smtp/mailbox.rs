//! Mailboxes: `local-part@domain`.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Parse};

/// A mail address, split at the last `@` (the local part may itself
/// contain quoted `@`s).
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Mailbox {
    /// The part before the last `@`.
    pub local: String,
    /// The domain after the last `@`.
    pub domain: String,
}

impl Mailbox {
    /// Build from explicit parts.
    pub fn new<L: Into<String>, D: Into<String>>(local: L, domain: D) -> Mailbox {
        Mailbox {
            local: local.into(),
            domain: domain.into(),
        }
    }
}

impl FromStr for Mailbox {
    type Err = Error;

    fn from_str(s: &str) -> Result<Mailbox, Error> {
        let at = s.rfind('@').ok_or_else(|| Error::from(Parse::Mailbox))?;
        let (local, domain) = (&s[..at], &s[at + 1..]);
        if local.is_empty() || domain.is_empty() {
            return Err(Parse::Mailbox.into());
        }
        Ok(Mailbox::new(local, domain))
    }
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.local, self.domain)
    }
}
