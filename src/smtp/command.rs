//! SMTP request commands.

use std::fmt;
use std::str::FromStr;

use self::Command::*;
use crate::error::{Error, Parse};

/// An SMTP command verb. Parsing is case-agnostic; the set is closed, and
/// an unrecognized verb is a syntax error answered with 500.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Command {
    /// HELO
    Helo,
    /// EHLO
    Ehlo,
    /// MAIL
    Mail,
    /// RCPT
    Rcpt,
    /// DATA
    Data,
    /// RSET
    Rset,
    /// NOOP
    Noop,
    /// QUIT
    Quit,
    /// SEND
    Send,
    /// SOML
    Soml,
    /// SAML
    Saml,
    /// VRFY
    Vrfy,
    /// EXPN
    Expn,
    /// HELP
    Help,
    /// TURN
    Turn,
    /// AUTH
    Auth,
}

impl Command {
    /// The canonical four-character token.
    pub fn as_str(&self) -> &'static str {
        match *self {
            Helo => "HELO",
            Ehlo => "EHLO",
            Mail => "MAIL",
            Rcpt => "RCPT",
            Data => "DATA",
            Rset => "RSET",
            Noop => "NOOP",
            Quit => "QUIT",
            Send => "SEND",
            Soml => "SOML",
            Saml => "SAML",
            Vrfy => "VRFY",
            Expn => "EXPN",
            Help => "HELP",
            Turn => "TURN",
            Auth => "AUTH",
        }
    }
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> Result<Command, Error> {
        const COMMANDS: [Command; 16] = [
            Helo, Ehlo, Mail, Rcpt, Data, Rset, Noop, Quit, Send, Soml, Saml, Vrfy, Expn,
            Help, Turn, Auth,
        ];
        COMMANDS
            .iter()
            .find(|command| command.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| Parse::Command.into())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_agnostic() {
        assert_eq!("helo".parse::<Command>().unwrap(), Helo);
        assert_eq!("Mail".parse::<Command>().unwrap(), Mail);
        assert_eq!("QUIT".parse::<Command>().unwrap(), Quit);
    }

    #[test]
    fn unknown_command_rejected() {
        assert!("WHAT".parse::<Command>().is_err());
        assert!("".parse::<Command>().is_err());
    }

    #[test]
    fn display_is_canonical() {
        assert_eq!(Ehlo.to_string(), "EHLO");
    }
}
