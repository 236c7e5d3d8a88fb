//! SMTP reply codes.

use std::fmt;

use self::StatusCode::*;

/// The broad classes of SMTP reply codes, by leading digit.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Category {
    /// 1yz.
    PositivePreliminary,
    /// 2yz.
    PositiveCompletion,
    /// 3yz.
    PositiveIntermediate,
    /// 4yz.
    TransientNegative,
    /// 5yz.
    PermanentNegative,
}

/// An SMTP reply code. The set is closed; a code outside it on the wire
/// is a parse error.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum StatusCode {
    /// 211 System status.
    SystemStatus,
    /// 214 Help message.
    HelpMessage,
    /// 220 Service ready.
    ServiceReady,
    /// 221 Service closing transmission channel.
    ServiceClosing,
    /// 235 Authentication succeeded.
    AuthenticationSucceeded,
    /// 250 Requested mail action okay, completed.
    RequestCompleted,
    /// 251 User not local; will forward.
    UserNotLocal,
    /// 252 Cannot verify user.
    CannotVerify,
    /// 334 Server challenge.
    ServerChallenge,
    /// 354 Start mail input.
    StartMailInput,
    /// 421 Service not available.
    ServiceNotAvailable,
    /// 450 Mailbox unavailable (temporary).
    MailboxUnavailable,
    /// 451 Local error in processing.
    LocalError,
    /// 452 Insufficient system storage.
    InsufficientStorage,
    /// 454 Temporary authentication failure.
    TemporaryAuthenticationFailure,
    /// 500 Syntax error, command unrecognized.
    SyntaxErrorCommand,
    /// 501 Syntax error in parameters or arguments.
    SyntaxErrorParameter,
    /// 502 Command not implemented.
    CommandNotImplemented,
    /// 503 Bad sequence of commands.
    BadSequenceCommand,
    /// 504 Command parameter not implemented.
    ParameterNotImplemented,
    /// 530 Authentication required.
    AuthenticationRequired,
    /// 535 Authentication credentials invalid.
    AuthenticationInvalid,
    /// 550 Mailbox unavailable (permanent).
    MailboxUnavailablePermanent,
    /// 551 User not local.
    UserNotLocalPermanent,
    /// 552 Exceeded storage allocation.
    ExceededStorage,
    /// 553 Mailbox name not allowed.
    MailboxNameNotAllowed,
    /// 554 Transaction failed.
    TransactionFailed,
}

impl StatusCode {
    /// Build from the numeric code, when it is in the supported set.
    pub fn from_u16(code: u16) -> Option<StatusCode> {
        Some(match code {
            211 => SystemStatus,
            214 => HelpMessage,
            220 => ServiceReady,
            221 => ServiceClosing,
            235 => AuthenticationSucceeded,
            250 => RequestCompleted,
            251 => UserNotLocal,
            252 => CannotVerify,
            334 => ServerChallenge,
            354 => StartMailInput,
            421 => ServiceNotAvailable,
            450 => MailboxUnavailable,
            451 => LocalError,
            452 => InsufficientStorage,
            454 => TemporaryAuthenticationFailure,
            500 => SyntaxErrorCommand,
            501 => SyntaxErrorParameter,
            502 => CommandNotImplemented,
            503 => BadSequenceCommand,
            504 => ParameterNotImplemented,
            530 => AuthenticationRequired,
            535 => AuthenticationInvalid,
            550 => MailboxUnavailablePermanent,
            551 => UserNotLocalPermanent,
            552 => ExceededStorage,
            553 => MailboxNameNotAllowed,
            554 => TransactionFailed,
            _ => return None,
        })
    }

    /// The numeric code.
    pub fn as_u16(&self) -> u16 {
        match *self {
            SystemStatus => 211,
            HelpMessage => 214,
            ServiceReady => 220,
            ServiceClosing => 221,
            AuthenticationSucceeded => 235,
            RequestCompleted => 250,
            UserNotLocal => 251,
            CannotVerify => 252,
            ServerChallenge => 334,
            StartMailInput => 354,
            ServiceNotAvailable => 421,
            MailboxUnavailable => 450,
            LocalError => 451,
            InsufficientStorage => 452,
            TemporaryAuthenticationFailure => 454,
            SyntaxErrorCommand => 500,
            SyntaxErrorParameter => 501,
            CommandNotImplemented => 502,
            BadSequenceCommand => 503,
            ParameterNotImplemented => 504,
            AuthenticationRequired => 530,
            AuthenticationInvalid => 535,
            MailboxUnavailablePermanent => 550,
            UserNotLocalPermanent => 551,
            ExceededStorage => 552,
            MailboxNameNotAllowed => 553,
            TransactionFailed => 554,
        }
    }

    /// The reply class, by leading digit.
    pub fn category(&self) -> Category {
        match self.as_u16() / 100 {
            1 => Category::PositivePreliminary,
            2 => Category::PositiveCompletion,
            3 => Category::PositiveIntermediate,
            4 => Category::TransientNegative,
            _ => Category::PermanentNegative,
        }
    }

    /// The default reason phrase.
    pub fn reason_phrase(&self) -> &'static str {
        match *self {
            SystemStatus => "System status",
            HelpMessage => "Help message",
            ServiceReady => "Service ready",
            ServiceClosing => "Service closing transmission channel",
            AuthenticationSucceeded => "Authentication succeeded",
            RequestCompleted => "Requested mail action okay, completed",
            UserNotLocal => "User not local; will forward",
            CannotVerify => "Cannot verify user",
            ServerChallenge => "Server challenge",
            StartMailInput => "Start mail input; end with <CRLF>.<CRLF>",
            ServiceNotAvailable => "Service not available, closing transmission channel",
            MailboxUnavailable => "Requested mail action not taken: mailbox unavailable",
            LocalError => "Requested action aborted: local error in processing",
            InsufficientStorage => "Requested action not taken: insufficient system storage",
            TemporaryAuthenticationFailure => "Temporary authentication failure",
            SyntaxErrorCommand => "Syntax error, command unrecognized",
            SyntaxErrorParameter => "Syntax error in parameters or arguments",
            CommandNotImplemented => "Command not implemented",
            BadSequenceCommand => "Bad sequence of commands",
            ParameterNotImplemented => "Command parameter not implemented",
            AuthenticationRequired => "Authentication required",
            AuthenticationInvalid => "Authentication credentials invalid",
            MailboxUnavailablePermanent => "Requested action not taken: mailbox unavailable",
            UserNotLocalPermanent => "User not local",
            ExceededStorage => "Requested mail action aborted: exceeded storage allocation",
            MailboxNameNotAllowed => "Requested action not taken: mailbox name not allowed",
            TransactionFailed => "Transaction failed",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}
