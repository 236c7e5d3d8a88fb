//! HTTP status codes.

use std::fmt;

use self::StatusCode::*;

/// An HTTP status code.
///
/// Codes this crate has no name for are carried as `Unregistered`, so a
/// response from any server round-trips; such codes simply have no
/// canonical reason phrase.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum StatusCode {
    /// 100 Continue
    Continue,
    /// 101 Switching Protocols
    SwitchingProtocols,
    /// 200 OK
    Ok,
    /// 201 Created
    Created,
    /// 202 Accepted
    Accepted,
    /// 204 No Content
    NoContent,
    /// 301 Moved Permanently
    MovedPermanently,
    /// 302 Found
    Found,
    /// 303 See Other
    SeeOther,
    /// 304 Not Modified
    NotModified,
    /// 307 Temporary Redirect
    TemporaryRedirect,
    /// 308 Permanent Redirect
    PermanentRedirect,
    /// 400 Bad Request
    BadRequest,
    /// 401 Unauthorized
    Unauthorized,
    /// 403 Forbidden
    Forbidden,
    /// 404 Not Found
    NotFound,
    /// 405 Method Not Allowed
    MethodNotAllowed,
    /// 406 Not Acceptable
    NotAcceptable,
    /// 408 Request Timeout
    RequestTimeout,
    /// 409 Conflict
    Conflict,
    /// 410 Gone
    Gone,
    /// 411 Length Required
    LengthRequired,
    /// 413 Payload Too Large
    PayloadTooLarge,
    /// 414 URI Too Long
    UriTooLong,
    /// 415 Unsupported Media Type
    UnsupportedMediaType,
    /// 429 Too Many Requests
    TooManyRequests,
    /// 431 Request Header Fields Too Large
    RequestHeaderFieldsTooLarge,
    /// 500 Internal Server Error
    InternalServerError,
    /// 501 Not Implemented
    NotImplemented,
    /// 502 Bad Gateway
    BadGateway,
    /// 503 Service Unavailable
    ServiceUnavailable,
    /// 504 Gateway Timeout
    GatewayTimeout,
    /// 505 HTTP Version Not Supported
    HttpVersionNotSupported,
    /// A status code not in the registry above.
    Unregistered(u16),
}

impl StatusCode {
    /// Build from the numeric code.
    pub fn from_u16(code: u16) -> StatusCode {
        match code {
            100 => Continue,
            101 => SwitchingProtocols,
            200 => Ok,
            201 => Created,
            202 => Accepted,
            204 => NoContent,
            301 => MovedPermanently,
            302 => Found,
            303 => SeeOther,
            304 => NotModified,
            307 => TemporaryRedirect,
            308 => PermanentRedirect,
            400 => BadRequest,
            401 => Unauthorized,
            403 => Forbidden,
            404 => NotFound,
            405 => MethodNotAllowed,
            406 => NotAcceptable,
            408 => RequestTimeout,
            409 => Conflict,
            410 => Gone,
            411 => LengthRequired,
            413 => PayloadTooLarge,
            414 => UriTooLong,
            415 => UnsupportedMediaType,
            429 => TooManyRequests,
            431 => RequestHeaderFieldsTooLarge,
            500 => InternalServerError,
            501 => NotImplemented,
            502 => BadGateway,
            503 => ServiceUnavailable,
            504 => GatewayTimeout,
            505 => HttpVersionNotSupported,
            _ => Unregistered(code),
        }
    }

    /// The numeric code.
    pub fn as_u16(&self) -> u16 {
        match *self {
            Continue => 100,
            SwitchingProtocols => 101,
            Ok => 200,
            Created => 201,
            Accepted => 202,
            NoContent => 204,
            MovedPermanently => 301,
            Found => 302,
            SeeOther => 303,
            NotModified => 304,
            TemporaryRedirect => 307,
            PermanentRedirect => 308,
            BadRequest => 400,
            Unauthorized => 401,
            Forbidden => 403,
            NotFound => 404,
            MethodNotAllowed => 405,
            NotAcceptable => 406,
            RequestTimeout => 408,
            Conflict => 409,
            Gone => 410,
            LengthRequired => 411,
            PayloadTooLarge => 413,
            UriTooLong => 414,
            UnsupportedMediaType => 415,
            TooManyRequests => 429,
            RequestHeaderFieldsTooLarge => 431,
            InternalServerError => 500,
            NotImplemented => 501,
            BadGateway => 502,
            ServiceUnavailable => 503,
            GatewayTimeout => 504,
            HttpVersionNotSupported => 505,
            Unregistered(code) => code,
        }
    }

    /// The canonical reason phrase, when the code has one.
    pub fn canonical_reason(&self) -> Option<&'static str> {
        match *self {
            Continue => Some("Continue"),
            SwitchingProtocols => Some("Switching Protocols"),
            Ok => Some("OK"),
            Created => Some("Created"),
            Accepted => Some("Accepted"),
            NoContent => Some("No Content"),
            MovedPermanently => Some("Moved Permanently"),
            Found => Some("Found"),
            SeeOther => Some("See Other"),
            NotModified => Some("Not Modified"),
            TemporaryRedirect => Some("Temporary Redirect"),
            PermanentRedirect => Some("Permanent Redirect"),
            BadRequest => Some("Bad Request"),
            Unauthorized => Some("Unauthorized"),
            Forbidden => Some("Forbidden"),
            NotFound => Some("Not Found"),
            MethodNotAllowed => Some("Method Not Allowed"),
            NotAcceptable => Some("Not Acceptable"),
            RequestTimeout => Some("Request Timeout"),
            Conflict => Some("Conflict"),
            Gone => Some("Gone"),
            LengthRequired => Some("Length Required"),
            PayloadTooLarge => Some("Payload Too Large"),
            UriTooLong => Some("URI Too Long"),
            UnsupportedMediaType => Some("Unsupported Media Type"),
            TooManyRequests => Some("Too Many Requests"),
            RequestHeaderFieldsTooLarge => Some("Request Header Fields Too Large"),
            InternalServerError => Some("Internal Server Error"),
            NotImplemented => Some("Not Implemented"),
            BadGateway => Some("Bad Gateway"),
            ServiceUnavailable => Some("Service Unavailable"),
            GatewayTimeout => Some("Gateway Timeout"),
            HttpVersionNotSupported => Some("HTTP Version Not Supported"),
            Unregistered(_) => None,
        }
    }

    /// 1xx.
    pub fn is_informational(&self) -> bool {
        (100..200).contains(&self.as_u16())
    }

    /// 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.as_u16())
    }

    /// 3xx.
    pub fn is_redirection(&self) -> bool {
        (300..400).contains(&self.as_u16())
    }

    /// 4xx.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.as_u16())
    }

    /// 5xx.
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.as_u16())
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_u16() {
        for code in &[200u16, 404, 405, 500, 505, 299] {
            assert_eq!(StatusCode::from_u16(*code).as_u16(), *code);
        }
    }

    #[test]
    fn unregistered_has_no_reason() {
        assert_eq!(StatusCode::from_u16(299), Unregistered(299));
        assert!(StatusCode::from_u16(299).canonical_reason().is_none());
        assert_eq!(StatusCode::Ok.canonical_reason(), Some("OK"));
    }

    #[test]
    fn classes() {
        assert!(StatusCode::Ok.is_success());
        assert!(StatusCode::NotFound.is_client_error());
        assert!(StatusCode::HttpVersionNotSupported.is_server_error());
        assert!(!StatusCode::Found.is_success());
    }
}
