//! MX record lookup for outbound mail.

use crate::error::Result;
use crate::time::Timeout;

/// One MX record: preference (lower is tried first) and exchanger host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MxRecord {
    /// Relative preference; ascending order is connect order.
    pub preference: u16,
    /// The mail exchanger's hostname.
    pub exchange: String,
}

/// Query the MX records for `domain`, sorted ascending by preference.
///
/// On Windows this uses the system DNS API. On POSIX systems the query is
/// made directly over UDP to the configured resolver, since there is no
/// portable binding for the libresolv record interfaces.
pub fn lookup_mx(domain: &str, timeout: Timeout) -> Result<Vec<MxRecord>> {
    let mut records = platform::query_mx(domain, timeout)?;
    records.sort_by(|a, b| {
        a.preference
            .cmp(&b.preference)
            .then_with(|| a.exchange.cmp(&b.exchange))
    });
    Ok(records)
}

#[cfg(any(unix, test))]
mod wire {
    //! Minimal DNS message encoding and decoding, enough for one MX
    //! question and its answer section.

    use crate::error::{Error, Result};

    pub(crate) const TYPE_MX: u16 = 15;
    pub(crate) const CLASS_IN: u16 = 1;

    /// Encode a recursion-desired query for `domain`'s MX records.
    pub(crate) fn encode_query(id: u16, domain: &str) -> Result<Vec<u8>> {
        let mut msg = Vec::with_capacity(12 + domain.len() + 6);
        msg.extend_from_slice(&id.to_be_bytes());
        // Flags: RD only.
        msg.extend_from_slice(&0x0100u16.to_be_bytes());
        // QD=1, AN/NS/AR=0.
        msg.extend_from_slice(&1u16.to_be_bytes());
        msg.extend_from_slice(&[0; 6]);

        for label in domain.trim_end_matches('.').split('.') {
            if label.is_empty() || label.len() > 63 {
                return Err(Error::new_dns("invalid label in domain"));
            }
            msg.push(label.len() as u8);
            msg.extend_from_slice(label.as_bytes());
        }
        msg.push(0);
        msg.extend_from_slice(&TYPE_MX.to_be_bytes());
        msg.extend_from_slice(&CLASS_IN.to_be_bytes());
        Ok(msg)
    }

    fn read_u16(msg: &[u8], pos: usize) -> Result<u16> {
        if pos + 2 > msg.len() {
            return Err(Error::new_dns("truncated response"));
        }
        Ok(u16::from_be_bytes([msg[pos], msg[pos + 1]]))
    }

    /// Decode a possibly-compressed domain name starting at `pos`.
    /// Returns the name and the position after the name's in-place bytes.
    pub(crate) fn read_name(msg: &[u8], mut pos: usize) -> Result<(String, usize)> {
        let mut name = String::new();
        let mut after = None;
        let mut jumps = 0;

        loop {
            let len = *msg
                .get(pos)
                .ok_or_else(|| Error::new_dns("truncated name"))? as usize;
            if len & 0xC0 == 0xC0 {
                // Compression pointer; only the first one advances the
                // caller's cursor.
                let target = ((len & 0x3F) << 8) | read_u16(msg, pos)? as usize & 0xFF;
                if after.is_none() {
                    after = Some(pos + 2);
                }
                jumps += 1;
                if jumps > 64 {
                    return Err(Error::new_dns("compression pointer loop"));
                }
                pos = target;
            } else if len == 0 {
                pos += 1;
                break;
            } else {
                if pos + 1 + len > msg.len() {
                    return Err(Error::new_dns("truncated label"));
                }
                if !name.is_empty() {
                    name.push('.');
                }
                name.push_str(&String::from_utf8_lossy(&msg[pos + 1..pos + 1 + len]));
                pos += 1 + len;
            }
        }

        Ok((name, after.unwrap_or(pos)))
    }

    /// Extract `(preference, exchange)` pairs from the answer section of a
    /// response to `encode_query(id, ..)`.
    pub(crate) fn decode_mx_response(msg: &[u8], id: u16) -> Result<Vec<(u16, String)>> {
        if msg.len() < 12 {
            return Err(Error::new_dns("response shorter than header"));
        }
        if read_u16(msg, 0)? != id {
            return Err(Error::new_dns("response id mismatch"));
        }
        let flags = read_u16(msg, 2)?;
        if flags & 0x8000 == 0 {
            return Err(Error::new_dns("response flag missing"));
        }
        if flags & 0x000F != 0 {
            return Err(Error::new_dns("resolver returned an error code"));
        }
        let questions = read_u16(msg, 4)?;
        let answers = read_u16(msg, 6)?;

        let mut pos = 12;
        for _ in 0..questions {
            let (_, next) = read_name(msg, pos)?;
            pos = next + 4;
        }

        let mut records = Vec::new();
        for _ in 0..answers {
            let (_, next) = read_name(msg, pos)?;
            pos = next;
            let rtype = read_u16(msg, pos)?;
            let rclass = read_u16(msg, pos + 2)?;
            let rdlen = read_u16(msg, pos + 8)? as usize;
            let rdata = pos + 10;
            if rdata + rdlen > msg.len() {
                return Err(Error::new_dns("truncated record data"));
            }
            if rtype == TYPE_MX && rclass == CLASS_IN && rdlen >= 3 {
                let preference = read_u16(msg, rdata)?;
                let (exchange, _) = read_name(msg, rdata + 2)?;
                records.push((preference, exchange));
            }
            pos = rdata + rdlen;
        }
        Ok(records)
    }
}

#[cfg(unix)]
mod platform {
    use std::fs;
    use std::net::{IpAddr, SocketAddr};
    use std::sync::atomic::{AtomicU16, Ordering};

    use super::wire;
    use super::MxRecord;
    use crate::error::{Error, Result};
    use crate::net::resolve::AddressInfo;
    use crate::net::socket::Socket;
    use crate::net::spec::{Family, Protocol, Specification, SocketType};
    use crate::time::Timeout;

    static QUERY_ID: AtomicU16 = AtomicU16::new(0);

    fn nameserver() -> Result<IpAddr> {
        let conf = fs::read_to_string("/etc/resolv.conf")
            .map_err(|_| Error::new_dns("cannot read /etc/resolv.conf"))?;
        for line in conf.lines() {
            let line = line.trim();
            if let Some(rest) = line.strip_prefix("nameserver") {
                if let Ok(addr) = rest.trim().parse() {
                    return Ok(addr);
                }
            }
        }
        Err(Error::new_dns("no nameserver configured"))
    }

    pub(super) fn query_mx(domain: &str, timeout: Timeout) -> Result<Vec<MxRecord>> {
        let id = QUERY_ID
            .fetch_add(1, Ordering::Relaxed)
            .wrapping_add(std::process::id() as u16);
        let query = wire::encode_query(id, domain)?;

        let ns = nameserver()?;
        let family = match ns {
            IpAddr::V4(_) => Family::Inet,
            IpAddr::V6(_) => Family::Inet6,
        };
        let spec = Specification::new(family, SocketType::Datagram, Protocol::Udp);

        let socket = Socket::new(spec, false)?;
        let target = AddressInfo::from_addr(SocketAddr::new(ns, 53), &spec);
        if socket.connect_addr(&target, timeout)? {
            return Err(Error::new_dns("timed out connecting to resolver"));
        }

        debug!("querying {} for MX {}", ns, domain);
        socket.send(&query, timeout)?;

        let mut response = [0u8; 4096];
        let read = match socket.recv(&mut response, timeout)? {
            Some(0) | None => return Err(Error::new_dns("timed out waiting for resolver")),
            Some(read) => read,
        };

        Ok(wire::decode_mx_response(&response[..read], id)?
            .into_iter()
            .map(|(preference, exchange)| MxRecord {
                preference,
                exchange,
            })
            .collect())
    }
}

#[cfg(windows)]
mod platform {
    use std::ffi::{CStr, CString};
    use std::ptr;

    use windows_sys::Win32::NetworkManagement::Dns as dns;

    use super::MxRecord;
    use crate::error::{Error, Result};
    use crate::time::Timeout;

    pub(super) fn query_mx(domain: &str, _timeout: Timeout) -> Result<Vec<MxRecord>> {
        // The system API is synchronous; the timeout is the resolver's own.
        let name = CString::new(domain).map_err(|_| Error::new_dns("invalid domain name"))?;

        let mut results: *mut dns::DNS_RECORDA = ptr::null_mut();
        let status = unsafe {
            dns::DnsQuery_A(
                name.as_ptr() as *const u8,
                dns::DNS_TYPE_MX,
                dns::DNS_QUERY_STANDARD,
                ptr::null_mut(),
                &mut results as *mut *mut dns::DNS_RECORDA as _,
                ptr::null_mut(),
            )
        };
        if status != 0 {
            return Err(Error::new_dns("DnsQuery failed"));
        }

        let mut records = Vec::new();
        let mut cur = results;
        while !cur.is_null() {
            let record = unsafe { &*cur };
            if record.wType == dns::DNS_TYPE_MX as u16 {
                let mx = unsafe { record.Data.MX };
                if !mx.pNameExchange.is_null() {
                    let exchange = unsafe { CStr::from_ptr(mx.pNameExchange as *const i8) }
                        .to_string_lossy()
                        .into_owned();
                    records.push(MxRecord {
                        preference: mx.wPreference,
                        exchange,
                    });
                }
            }
            cur = record.pNext;
        }
        unsafe {
            dns::DnsFree(results as _, dns::DnsFreeRecordList);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::wire::*;

    #[test]
    fn query_layout() {
        let query = encode_query(0x1234, "example.com").unwrap();
        assert_eq!(&query[..2], &[0x12, 0x34]);
        // One question, recursion desired.
        assert_eq!(&query[2..6], &[0x01, 0x00, 0x00, 0x01]);
        // 7"example"3"com"0, MX, IN.
        assert_eq!(
            &query[12..],
            b"\x07example\x03com\x00\x00\x0f\x00\x01" as &[u8]
        );
    }

    #[test]
    fn rejects_oversized_label() {
        let long = "a".repeat(64);
        assert!(encode_query(1, &format!("{}.com", long)).is_err());
    }

    fn canned_response() -> Vec<u8> {
        // Header: id 1, QR+RD+RA, 1 question, 2 answers.
        let mut msg = Vec::new();
        msg.extend_from_slice(&[0x00, 0x01, 0x81, 0x80, 0x00, 0x01, 0x00, 0x02]);
        msg.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
        // Question: example.com MX IN.
        msg.extend_from_slice(b"\x07example\x03com\x00\x00\x0f\x00\x01");
        // Answer 1: pointer to offset 12, MX IN, ttl 60, pref 20,
        // mail2.example.com (tail compressed to offset 12).
        msg.extend_from_slice(&[0xC0, 0x0C, 0x00, 0x0F, 0x00, 0x01, 0x00, 0x00, 0x00, 0x3C]);
        msg.extend_from_slice(&[0x00, 0x0A]);
        msg.extend_from_slice(&[0x00, 0x14]);
        msg.extend_from_slice(b"\x05mail2\xC0\x0C");
        // Answer 2: pref 10, mail.example.com.
        msg.extend_from_slice(&[0xC0, 0x0C, 0x00, 0x0F, 0x00, 0x01, 0x00, 0x00, 0x00, 0x3C]);
        msg.extend_from_slice(&[0x00, 0x09]);
        msg.extend_from_slice(&[0x00, 0x0A]);
        msg.extend_from_slice(b"\x04mail\xC0\x0C");
        msg
    }

    #[test]
    fn decodes_compressed_answers() {
        let records = decode_mx_response(&canned_response(), 1).unwrap();
        assert_eq!(
            records,
            vec![
                (20, "mail2.example.com".to_owned()),
                (10, "mail.example.com".to_owned()),
            ]
        );
    }

    #[test]
    fn id_mismatch_rejected() {
        assert!(decode_mx_response(&canned_response(), 2).is_err());
    }

    #[test]
    fn name_decompression() {
        let msg = canned_response();
        let (name, after) = read_name(&msg, 12).unwrap();
        assert_eq!(name, "example.com");
        assert_eq!(after, 12 + 13);
    }
}
