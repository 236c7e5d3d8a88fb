//! Platform shims for readiness polling and address resolution.
//!
//! Everything below fronts the same kernel interfaces on both platforms;
//! only names and integer widths differ. Higher layers see one API.

use socket2::SockAddr;

pub(crate) use self::platform::*;

/// One resolved address as reported by `getaddrinfo`, before conversion
/// into the crate's typed `AddressInfo`.
pub(crate) struct RawAddrInfo {
    pub flags: i32,
    pub family: i32,
    pub socktype: i32,
    pub protocol: i32,
    pub canon_name: Option<String>,
    pub addr: SockAddr,
}

/// Interpret a raw `sockaddr` as a std `SocketAddr`. The in-memory layouts
/// of `sockaddr_in` and `sockaddr_in6` are identical across the supported
/// platforms, so the fields are read positionally. Returns `None` for
/// non-internet families.
pub(crate) fn sockaddr_to_std(family: i32, raw: &[u8]) -> Option<std::net::SocketAddr> {
    use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};

    if family == AF_INET && raw.len() >= 8 {
        let port = u16::from_be_bytes([raw[2], raw[3]]);
        let ip = Ipv4Addr::new(raw[4], raw[5], raw[6], raw[7]);
        Some(SocketAddr::V4(SocketAddrV4::new(ip, port)))
    } else if family == AF_INET6 && raw.len() >= 28 {
        let port = u16::from_be_bytes([raw[2], raw[3]]);
        let flowinfo = u32::from_be_bytes([raw[4], raw[5], raw[6], raw[7]]);
        let mut segments = [0u16; 8];
        for (i, seg) in segments.iter_mut().enumerate() {
            *seg = u16::from_be_bytes([raw[8 + 2 * i], raw[9 + 2 * i]]);
        }
        let scope = u32::from_ne_bytes([raw[24], raw[25], raw[26], raw[27]]);
        let ip = Ipv6Addr::from(segments);
        Some(SocketAddr::V6(SocketAddrV6::new(ip, port, flowinfo, scope)))
    } else {
        None
    }
}

#[cfg(unix)]
mod platform {
    use std::ffi::{CStr, CString};
    use std::io;
    use std::os::unix::io::RawFd;
    use std::ptr;

    use socket2::SockAddr;

    use super::{sockaddr_to_std, RawAddrInfo};

    /// The native socket handle.
    pub(crate) type RawSock = RawFd;

    pub(crate) use libc::pollfd as PollFd;

    pub(crate) const POLL_READ: i16 = libc::POLLIN;
    pub(crate) const POLL_WRITE: i16 = libc::POLLOUT;
    pub(crate) const POLL_ERR: i16 = libc::POLLERR;
    pub(crate) const POLL_HUP: i16 = libc::POLLHUP;
    pub(crate) const POLL_NVAL: i16 = libc::POLLNVAL;

    pub(crate) const AF_UNSPEC: i32 = libc::AF_UNSPEC;
    pub(crate) const AF_INET: i32 = libc::AF_INET;
    pub(crate) const AF_INET6: i32 = libc::AF_INET6;
    pub(crate) const SOCK_STREAM: i32 = libc::SOCK_STREAM;
    pub(crate) const SOCK_DGRAM: i32 = libc::SOCK_DGRAM;
    pub(crate) const IPPROTO_TCP: i32 = libc::IPPROTO_TCP;
    pub(crate) const IPPROTO_UDP: i32 = libc::IPPROTO_UDP;

    pub(crate) const AI_PASSIVE: i32 = libc::AI_PASSIVE;
    pub(crate) const AI_CANONNAME: i32 = libc::AI_CANONNAME;
    pub(crate) const AI_NUMERICHOST: i32 = libc::AI_NUMERICHOST;
    pub(crate) const AI_NUMERICSERV: i32 = libc::AI_NUMERICSERV;
    pub(crate) const AI_V4MAPPED: i32 = libc::AI_V4MAPPED;
    pub(crate) const AI_ALL: i32 = libc::AI_ALL;
    pub(crate) const AI_ADDRCONFIG: i32 = libc::AI_ADDRCONFIG;

    pub(crate) fn poll_fd(fd: RawSock, events: i16) -> PollFd {
        PollFd {
            fd,
            events,
            revents: 0,
        }
    }

    /// Blocking `poll(2)`. Returns the number of descriptors with events; 0
    /// on timeout. Restarted on EINTR.
    pub(crate) fn poll(fds: &mut [PollFd], timeout_ms: i32) -> io::Result<usize> {
        loop {
            let ret = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms) };
            if ret >= 0 {
                return Ok(ret as usize);
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }

    /// Blocking `getaddrinfo(3)` with explicit hints.
    pub(crate) fn getaddrinfo(
        node: Option<&str>,
        service: Option<&str>,
        flags: i32,
        family: i32,
        socktype: i32,
        protocol: i32,
    ) -> io::Result<Vec<RawAddrInfo>> {
        let node = match node {
            Some(n) => Some(CString::new(n).map_err(invalid_name)?),
            None => None,
        };
        let service = match service {
            Some(s) => Some(CString::new(s).map_err(invalid_name)?),
            None => None,
        };

        let mut hints: libc::addrinfo = unsafe { std::mem::zeroed() };
        hints.ai_flags = flags;
        hints.ai_family = family;
        hints.ai_socktype = socktype;
        hints.ai_protocol = protocol;

        let mut results: *mut libc::addrinfo = ptr::null_mut();
        let ret = unsafe {
            libc::getaddrinfo(
                node.as_ref().map_or(ptr::null(), |n| n.as_ptr()),
                service.as_ref().map_or(ptr::null(), |s| s.as_ptr()),
                &hints,
                &mut results,
            )
        };
        if ret != 0 {
            if !results.is_null() {
                unsafe { libc::freeaddrinfo(results) };
            }
            let msg = unsafe { CStr::from_ptr(libc::gai_strerror(ret)) };
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("getaddrinfo: {}", msg.to_string_lossy()),
            ));
        }

        let mut infos = Vec::new();
        let mut cur = results;
        while !cur.is_null() {
            let entry = unsafe { &*cur };
            let raw = unsafe {
                std::slice::from_raw_parts(entry.ai_addr as *const u8, entry.ai_addrlen as usize)
            };
            if let Some(addr) = sockaddr_to_std(entry.ai_family, raw) {
                let canon_name = if entry.ai_canonname.is_null() {
                    None
                } else {
                    Some(
                        unsafe { CStr::from_ptr(entry.ai_canonname) }
                            .to_string_lossy()
                            .into_owned(),
                    )
                };
                infos.push(RawAddrInfo {
                    flags: entry.ai_flags,
                    family: entry.ai_family,
                    socktype: entry.ai_socktype,
                    protocol: entry.ai_protocol,
                    canon_name,
                    addr: SockAddr::from(addr),
                });
            }
            cur = entry.ai_next;
        }
        unsafe { libc::freeaddrinfo(results) };

        Ok(infos)
    }

    fn invalid_name(err: std::ffi::NulError) -> io::Error {
        io::Error::new(io::ErrorKind::InvalidInput, err)
    }
}

#[cfg(windows)]
mod platform {
    use std::ffi::{CStr, CString};
    use std::io;
    use std::os::windows::io::RawSocket;
    use std::ptr;

    use socket2::SockAddr;
    use windows_sys::Win32::Networking::WinSock as winsock;

    use super::{sockaddr_to_std, RawAddrInfo};

    /// The native socket handle.
    pub(crate) type RawSock = RawSocket;

    pub(crate) use winsock::WSAPOLLFD as PollFd;

    pub(crate) const POLL_READ: i16 = winsock::POLLRDNORM as i16;
    pub(crate) const POLL_WRITE: i16 = winsock::POLLWRNORM as i16;
    pub(crate) const POLL_ERR: i16 = winsock::POLLERR as i16;
    pub(crate) const POLL_HUP: i16 = winsock::POLLHUP as i16;
    pub(crate) const POLL_NVAL: i16 = winsock::POLLNVAL as i16;

    pub(crate) const AF_UNSPEC: i32 = winsock::AF_UNSPEC as i32;
    pub(crate) const AF_INET: i32 = winsock::AF_INET as i32;
    pub(crate) const AF_INET6: i32 = winsock::AF_INET6 as i32;
    pub(crate) const SOCK_STREAM: i32 = winsock::SOCK_STREAM as i32;
    pub(crate) const SOCK_DGRAM: i32 = winsock::SOCK_DGRAM as i32;
    pub(crate) const IPPROTO_TCP: i32 = winsock::IPPROTO_TCP;
    pub(crate) const IPPROTO_UDP: i32 = winsock::IPPROTO_UDP;

    pub(crate) const AI_PASSIVE: i32 = winsock::AI_PASSIVE as i32;
    pub(crate) const AI_CANONNAME: i32 = winsock::AI_CANONNAME as i32;
    pub(crate) const AI_NUMERICHOST: i32 = winsock::AI_NUMERICHOST as i32;
    pub(crate) const AI_NUMERICSERV: i32 = winsock::AI_NUMERICSERV as i32;
    pub(crate) const AI_V4MAPPED: i32 = winsock::AI_V4MAPPED as i32;
    pub(crate) const AI_ALL: i32 = winsock::AI_ALL as i32;
    pub(crate) const AI_ADDRCONFIG: i32 = winsock::AI_ADDRCONFIG as i32;

    pub(crate) fn poll_fd(fd: RawSock, events: i16) -> PollFd {
        PollFd {
            fd: fd as usize,
            events,
            revents: 0,
        }
    }

    /// Blocking `WSAPoll`. Returns the number of descriptors with events; 0
    /// on timeout.
    pub(crate) fn poll(fds: &mut [PollFd], timeout_ms: i32) -> io::Result<usize> {
        let ret = unsafe { winsock::WSAPoll(fds.as_mut_ptr(), fds.len() as u32, timeout_ms) };
        if ret == winsock::SOCKET_ERROR {
            return Err(io::Error::from_raw_os_error(unsafe {
                winsock::WSAGetLastError()
            }));
        }
        Ok(ret as usize)
    }

    /// Blocking `getaddrinfo` with explicit hints.
    pub(crate) fn getaddrinfo(
        node: Option<&str>,
        service: Option<&str>,
        flags: i32,
        family: i32,
        socktype: i32,
        protocol: i32,
    ) -> io::Result<Vec<RawAddrInfo>> {
        // The ANSI entry point; DNS names are not wide strings.
        let node = match node {
            Some(n) => Some(CString::new(n).map_err(invalid_name)?),
            None => None,
        };
        let service = match service {
            Some(s) => Some(CString::new(s).map_err(invalid_name)?),
            None => None,
        };

        let mut hints: winsock::ADDRINFOA = unsafe { std::mem::zeroed() };
        hints.ai_flags = flags;
        hints.ai_family = family;
        hints.ai_socktype = socktype;
        hints.ai_protocol = protocol;

        let mut results: *mut winsock::ADDRINFOA = ptr::null_mut();
        let ret = unsafe {
            winsock::getaddrinfo(
                node.as_ref()
                    .map_or(ptr::null(), |n| n.as_ptr() as *const u8),
                service
                    .as_ref()
                    .map_or(ptr::null(), |s| s.as_ptr() as *const u8),
                &hints,
                &mut results,
            )
        };
        if ret != 0 {
            if !results.is_null() {
                unsafe { winsock::freeaddrinfo(results) };
            }
            return Err(io::Error::from_raw_os_error(ret));
        }

        let mut infos = Vec::new();
        let mut cur = results;
        while !cur.is_null() {
            let entry = unsafe { &*cur };
            let raw = unsafe {
                std::slice::from_raw_parts(entry.ai_addr as *const u8, entry.ai_addrlen as usize)
            };
            if let Some(addr) = sockaddr_to_std(entry.ai_family, raw) {
                let canon_name = if entry.ai_canonname.is_null() {
                    None
                } else {
                    Some(
                        unsafe { CStr::from_ptr(entry.ai_canonname as *const i8) }
                            .to_string_lossy()
                            .into_owned(),
                    )
                };
                infos.push(RawAddrInfo {
                    flags: entry.ai_flags,
                    family: entry.ai_family,
                    socktype: entry.ai_socktype,
                    protocol: entry.ai_protocol,
                    canon_name,
                    addr: SockAddr::from(addr),
                });
            }
            cur = entry.ai_next;
        }
        unsafe { winsock::freeaddrinfo(results) };

        Ok(infos)
    }

    fn invalid_name(err: std::ffi::NulError) -> io::Error {
        io::Error::new(io::ErrorKind::InvalidInput, err)
    }
}
