//! The header container and typed accessors for common fields.

use std::fmt;
use std::io::{BufRead, Write};
use std::str::FromStr;

use unicase::UniCase;

use crate::error::{Error, Parse, TransferEncoding as TeError};
use crate::net::host::Host;
use crate::proto;

/// Total size cap for one received header block, terminators included.
pub const MAX_HEADERS_BLOCK: usize = 1 << 16;
/// Size cap for a single header line.
pub const MAX_HEADER_LINE: usize = 1 << 12;

const MAX_HEADERS: usize = 100;
const MAX_TRANSFER_ENCODINGS: usize = 1 << 8;

/// A transfer coding applied to a message body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Encoding {
    /// No transformation.
    Identity,
    /// Chunked framing.
    Chunked,
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match *self {
            Encoding::Identity => "identity",
            Encoding::Chunked => "chunked",
        })
    }
}

impl FromStr for Encoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Encoding, Error> {
        if UniCase::new(s) == UniCase::new("identity") {
            Ok(Encoding::Identity)
        } else if UniCase::new(s) == UniCase::new("chunked") {
            Ok(Encoding::Chunked)
        } else {
            Err(Parse::TransferEncoding(TeError::NotSupported).into())
        }
    }
}

/// One `Set-Cookie` header: name, value, and trailing attributes
/// (value-less attributes like `Secure` keep an empty value).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SetCookie {
    /// Cookie name.
    pub name: String,
    /// Cookie value.
    pub value: String,
    /// Attributes in order of appearance.
    pub attributes: Vec<(String, String)>,
}

impl SetCookie {
    fn parse(raw: &str) -> SetCookie {
        let mut parts = raw.split(';');
        let (name, value) = split_pair(parts.next().unwrap_or(""));
        let attributes = parts
            .map(|part| split_pair(part))
            .filter(|(name, _)| !name.is_empty())
            .collect();
        SetCookie {
            name,
            value,
            attributes,
        }
    }

    fn emit(&self) -> String {
        let mut raw = format!("{}={}", self.name, self.value);
        for (name, value) in &self.attributes {
            raw.push_str("; ");
            raw.push_str(name);
            if !value.is_empty() {
                raw.push('=');
                raw.push_str(value);
            }
        }
        raw
    }
}

fn split_pair(part: &str) -> (String, String) {
    match part.find('=') {
        Some(at) => (
            part[..at].trim().to_owned(),
            part[at + 1..].trim().to_owned(),
        ),
        None => (part.trim().to_owned(), String::new()),
    }
}

fn name_eq(a: &str, b: &str) -> bool {
    UniCase::new(a) == UniCase::new(b)
}

/// An ordered multimap of header fields with case-agnostic names.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// An empty header block.
    pub fn new() -> Headers {
        Headers::default()
    }

    /// Number of header fields (duplicates counted).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no fields.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// The first value for `name`, case-agnostic.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(entry, _)| name_eq(entry, name))
            .map(|(_, value)| value.as_str())
    }

    /// All values for `name`, in insertion order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> {
        self.entries
            .iter()
            .filter(move |(entry, _)| name_eq(entry, name))
            .map(|(_, value)| value.as_str())
    }

    /// Whether any field named `name` exists.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Replace `name` with a single value, removing any duplicates.
    pub fn set<V: Into<String>>(&mut self, name: &str, value: V) {
        self.remove(name);
        self.entries.push((name.to_owned(), value.into()));
    }

    /// Add a field without touching existing ones with the same name.
    pub fn append<V: Into<String>>(&mut self, name: &str, value: V) {
        self.entries.push((name.to_owned(), value.into()));
    }

    /// Remove all fields named `name`; returns whether any was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| !name_eq(entry, name));
        before != self.entries.len()
    }

    // Typed accessors. Getters return `None`/empty when the field is
    // absent and never create it.

    /// `Content-Length`, parsed as decimal.
    pub fn content_length(&self) -> Result<Option<u64>, Error> {
        match self.get("Content-Length") {
            Some(value) => value
                .trim()
                .parse::<u64>()
                .map(Some)
                .map_err(|_| Parse::ContentLength.into()),
            None => Ok(None),
        }
    }

    /// Set `Content-Length`.
    pub fn set_content_length(&mut self, len: u64) {
        let mut buf = itoa::Buffer::new();
        self.set("Content-Length", buf.format(len));
    }

    /// `Transfer-Encoding` as the ordered coding list. Unsupported tokens
    /// and empty list items are errors; so is an absurdly long list.
    pub fn transfer_encoding(&self) -> Result<Vec<Encoding>, Error> {
        let mut encodings = Vec::new();
        for value in self.get_all("Transfer-Encoding") {
            for token in value.split(',') {
                let token = token.trim();
                if token.is_empty() {
                    return Err(Parse::TransferEncoding(TeError::Malformed).into());
                }
                encodings.push(token.parse()?);
                if encodings.len() > MAX_TRANSFER_ENCODINGS {
                    return Err(Parse::TransferEncoding(TeError::TooMany).into());
                }
            }
        }
        Ok(encodings)
    }

    /// Set `Transfer-Encoding` from a coding list; removes the field when
    /// the list is empty.
    pub fn set_transfer_encoding(&mut self, encodings: &[Encoding]) {
        if encodings.is_empty() {
            self.remove("Transfer-Encoding");
            return;
        }
        let list = encodings
            .iter()
            .map(|encoding| encoding.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        self.set("Transfer-Encoding", list);
    }

    /// All `Set-Cookie` fields, parsed.
    pub fn set_cookie(&self) -> Vec<SetCookie> {
        self.get_all("Set-Cookie").map(SetCookie::parse).collect()
    }

    /// Replace the `Set-Cookie` fields.
    pub fn set_set_cookie(&mut self, cookies: &[SetCookie]) {
        self.remove("Set-Cookie");
        for cookie in cookies {
            self.append("Set-Cookie", cookie.emit());
        }
    }

    /// `Cookie` pairs in order of appearance.
    pub fn cookie(&self) -> Vec<(String, String)> {
        match self.get("Cookie") {
            Some(raw) => raw
                .split(';')
                .map(split_pair)
                .filter(|(name, _)| !name.is_empty())
                .collect(),
            None => Vec::new(),
        }
    }

    /// The `Host` field, parsed.
    pub fn host(&self) -> Option<Host> {
        self.get("Host").map(Host::parse)
    }

    /// Set the `Host` field.
    pub fn set_host(&mut self, host: &Host) {
        self.set("Host", host.to_string());
    }

    /// Whether any `Connection` field lists the `close` token.
    pub fn connection_close(&self) -> bool {
        self.get_all("Connection")
            .flat_map(|value| value.split(','))
            .any(|token| name_eq(token.trim(), "close"))
    }

    /// Write the block as `Name: value CRLF` lines, without the final
    /// empty line.
    pub fn emit<W: Write + ?Sized>(&self, stream: &mut W) -> std::io::Result<()> {
        for (name, value) in &self.entries {
            write!(stream, "{}: {}\r\n", name, value)?;
        }
        Ok(())
    }

    /// Read header lines until the empty line and parse them. Enforces
    /// the per-line and whole-block size caps.
    pub(crate) fn read_from<R: BufRead>(stream: &mut R) -> Result<Headers, Error> {
        let mut block: Vec<u8> = Vec::new();
        loop {
            let line = proto::read_line_bytes(stream, MAX_HEADER_LINE)?
                .ok_or_else(Error::new_incomplete)?;
            if line.is_empty() {
                break;
            }
            block.extend_from_slice(&line);
            block.extend_from_slice(b"\r\n");
            if block.len() > MAX_HEADERS_BLOCK {
                return Err(Error::new_too_large());
            }
        }
        block.extend_from_slice(b"\r\n");

        let mut parsed = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let headers = match httparse::parse_headers(&block, &mut parsed) {
            Ok(httparse::Status::Complete((_, headers))) => headers,
            Ok(httparse::Status::Partial) => return Err(Error::new_incomplete()),
            Err(httparse::Error::TooManyHeaders) => return Err(Error::new_too_large()),
            Err(err) => return Err(Error::new(crate::error::Kind::Parse(Parse::Header)).with(err)),
        };

        let mut out = Headers::new();
        for header in headers {
            let value = std::str::from_utf8(header.value)
                .map_err(|_| Error::from(Parse::Header))?;
            out.append(header.name, value.trim());
        }
        Ok(out)
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = (&'a str, &'a str);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a str)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in self.iter() {
            write!(f, "{}: {}\r\n", name, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(raw: &[u8]) -> Headers {
        Headers::read_from(&mut Cursor::new(raw.to_vec())).unwrap()
    }

    #[test]
    fn case_agnostic_lookup() {
        let headers = parse(b"Content-Type: text/plain\r\nHost: example.com\r\n\r\n");
        assert_eq!(headers.get("content-type"), Some("text/plain"));
        assert_eq!(headers.get("HOST"), Some("example.com"));
        assert!(headers.get("Cookie").is_none());
    }

    #[test]
    fn duplicates_form_a_multimap() {
        let headers = parse(b"Accept: a\r\naccept: b\r\n\r\n");
        let values: Vec<_> = headers.get_all("Accept").collect();
        assert_eq!(values, vec!["a", "b"]);
    }

    #[test]
    fn values_are_trimmed() {
        let headers = parse(b"Host:   example.com  \r\n\r\n");
        assert_eq!(headers.get("Host"), Some("example.com"));
    }

    #[test]
    fn emit_parse_idempotent() {
        let mut headers = Headers::new();
        headers.append("Accept", "a");
        headers.append("Host", "example.com");
        headers.append("accept", "b");

        let mut wire = Vec::new();
        headers.emit(&mut wire).unwrap();
        wire.extend_from_slice(b"\r\n");
        let reparsed = parse(&wire);

        let canonical = |h: &Headers| {
            let mut entries: Vec<_> = h
                .iter()
                .map(|(name, value)| (name.to_ascii_lowercase(), value.to_owned()))
                .collect();
            entries.sort();
            entries
        };
        assert_eq!(canonical(&headers), canonical(&reparsed));
    }

    #[test]
    fn block_size_cap() {
        let mut raw = Vec::new();
        for i in 0..40 {
            raw.extend_from_slice(format!("X-Filler-{}: ", i).as_bytes());
            raw.extend_from_slice(&[b'v'; 2048]);
            raw.extend_from_slice(b"\r\n");
        }
        raw.extend_from_slice(b"\r\n");
        let err = Headers::read_from(&mut Cursor::new(raw)).unwrap_err();
        assert!(err.is_parse_too_large());
    }

    #[test]
    fn line_size_cap() {
        let mut raw = b"X-Big: ".to_vec();
        raw.extend_from_slice(&[b'v'; MAX_HEADER_LINE + 1]);
        raw.extend_from_slice(b"\r\n\r\n");
        let err = Headers::read_from(&mut Cursor::new(raw)).unwrap_err();
        assert!(err.is_parse_too_large());
    }

    #[test]
    fn missing_colon_is_malformed() {
        let err = Headers::read_from(&mut Cursor::new(b"no colon here\r\n\r\n".to_vec()))
            .unwrap_err();
        assert!(err.is_parse());
    }

    #[test]
    fn content_length_parses() {
        let headers = parse(b"Content-Length: 42\r\n\r\n");
        assert_eq!(headers.content_length().unwrap(), Some(42));

        let headers = parse(b"Content-Length: nope\r\n\r\n");
        assert!(headers.content_length().is_err());

        assert_eq!(Headers::new().content_length().unwrap(), None);
    }

    #[test]
    fn transfer_encoding_list() {
        let headers = parse(b"Transfer-Encoding: Identity, chunked\r\n\r\n");
        assert_eq!(
            headers.transfer_encoding().unwrap(),
            vec![Encoding::Identity, Encoding::Chunked]
        );

        let headers = parse(b"Transfer-Encoding: gzip\r\n\r\n");
        assert!(headers.transfer_encoding().is_err());
    }

    #[test]
    fn set_cookie_round_trip() {
        let headers = parse(
            b"Set-Cookie: id=77; Path=/; Secure\r\nSet-Cookie: theme=dark\r\n\r\n",
        );
        let cookies = headers.set_cookie();
        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies[0].name, "id");
        assert_eq!(cookies[0].value, "77");
        assert_eq!(
            cookies[0].attributes,
            vec![
                ("Path".to_owned(), "/".to_owned()),
                ("Secure".to_owned(), String::new()),
            ]
        );

        let mut out = Headers::new();
        out.set_set_cookie(&cookies);
        assert_eq!(out.set_cookie(), cookies);
    }

    #[test]
    fn cookie_pairs() {
        let headers = parse(b"Cookie: a=1; b=2\r\n\r\n");
        assert_eq!(
            headers.cookie(),
            vec![
                ("a".to_owned(), "1".to_owned()),
                ("b".to_owned(), "2".to_owned()),
            ]
        );
    }

    #[test]
    fn connection_close_token() {
        let headers = parse(b"Connection: keep-alive, Close\r\n\r\n");
        assert!(headers.connection_close());
        let headers = parse(b"Connection: keep-alive\r\n\r\n");
        assert!(!headers.connection_close());
    }

    #[test]
    fn set_replaces_duplicates() {
        let mut headers = Headers::new();
        headers.append("Accept", "a");
        headers.append("Accept", "b");
        headers.set("accept", "c");
        let values: Vec<_> = headers.get_all("Accept").collect();
        assert_eq!(values, vec!["c"]);
    }
}
