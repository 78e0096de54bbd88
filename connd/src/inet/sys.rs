//! Raw kernel request structures and the control socket.
//!
//! Everything `unsafe` in the crate lives here. The rest of the `inet` layer
//! works with the safe wrappers below.

#![allow(unsafe_code)]

use std::io;
use std::mem;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

pub(crate) const IFNAMSIZ: usize = 16;

#[repr(C)]
#[derive(Clone, Copy)]
pub(crate) union IfReqData {
    addr: libc::sockaddr,
    flags: libc::c_short,
    ifindex: libc::c_int,
    // Matches the size of the kernel union on 64-bit targets.
    _pad: [u8; 24],
}

/// `struct ifreq`.
#[repr(C)]
#[derive(Clone, Copy)]
pub(crate) struct IfReq {
    name: [libc::c_char; IFNAMSIZ],
    data: IfReqData,
}

impl IfReq {
    pub(crate) fn zeroed() -> Self {
        // SAFETY: IfReq is plain old data; all-zero is a valid value.
        unsafe { mem::zeroed() }
    }

    pub(crate) fn with_name(name: &str) -> io::Result<Self> {
        if name.is_empty() || name.len() >= IFNAMSIZ || name.as_bytes().contains(&0) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid interface name {name:?}"),
            ));
        }
        let mut req = Self::zeroed();
        for (dst, src) in req.name.iter_mut().zip(name.bytes()) {
            *dst = src as libc::c_char;
        }
        Ok(req)
    }

    pub(crate) fn with_index(index: i32) -> Self {
        let mut req = Self::zeroed();
        req.data.ifindex = index;
        req
    }

    pub(crate) fn name(&self) -> String {
        let bytes: Vec<u8> = self
            .name
            .iter()
            .take_while(|c| **c != 0)
            .map(|c| *c as u8)
            .collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    pub(crate) fn name_ptr(&mut self) -> *mut libc::c_char {
        self.name.as_mut_ptr()
    }

    pub(crate) fn index(&self) -> i32 {
        // SAFETY: every bit pattern is a valid c_int.
        unsafe { self.data.ifindex }
    }

    pub(crate) fn flags(&self) -> libc::c_short {
        // SAFETY: every bit pattern is a valid c_short.
        unsafe { self.data.flags }
    }

    pub(crate) fn set_flags(&mut self, flags: libc::c_short) {
        self.data.flags = flags;
    }

    pub(crate) fn set_ipv4(&mut self, addr: Ipv4Addr) {
        self.data.addr = sockaddr_v4(addr);
    }

    pub(crate) fn ipv4(&self) -> Option<Ipv4Addr> {
        // SAFETY: every bit pattern is a valid sockaddr.
        let sa = unsafe { self.data.addr };
        ipv4_from_sockaddr(&sa)
    }

    /// Hardware type (`ARPHRD_*`) and the first six address bytes.
    pub(crate) fn hwaddr(&self) -> (u16, [u8; 6]) {
        // SAFETY: every bit pattern is a valid sockaddr.
        let sa = unsafe { self.data.addr };
        let mut mac = [0u8; 6];
        for (dst, src) in mac.iter_mut().zip(sa.sa_data.iter()) {
            *dst = *src as u8;
        }
        (sa.sa_family, mac)
    }
}

/// `struct in6_ifreq`.
#[repr(C)]
pub(crate) struct In6IfReq {
    pub addr: libc::in6_addr,
    pub prefixlen: u32,
    pub ifindex: libc::c_int,
}

impl In6IfReq {
    pub(crate) fn new(addr: Ipv6Addr, prefixlen: u8, index: i32) -> Self {
        Self {
            addr: in6_addr(addr),
            prefixlen: u32::from(prefixlen),
            ifindex: index,
        }
    }
}

/// `struct in6_rtmsg`.
#[repr(C)]
pub(crate) struct In6RtMsg {
    pub dst: libc::in6_addr,
    pub src: libc::in6_addr,
    pub gateway: libc::in6_addr,
    pub rtmsg_type: u32,
    pub dst_len: u16,
    pub src_len: u16,
    pub metric: u32,
    pub info: libc::c_ulong,
    pub flags: u32,
    pub ifindex: libc::c_int,
}

impl In6RtMsg {
    pub(crate) fn zeroed() -> Self {
        // SAFETY: In6RtMsg is plain old data; all-zero is a valid value.
        unsafe { mem::zeroed() }
    }
}

/// `struct rtentry` with IPv4 destination, gateway and mask.
pub(crate) struct RtEntry {
    inner: libc::rtentry,
}

impl RtEntry {
    pub(crate) fn new(flags: u16, dst: Ipv4Addr, gateway: Ipv4Addr, genmask: Ipv4Addr) -> Self {
        // SAFETY: rtentry is plain old data; all-zero is a valid value.
        let mut inner: libc::rtentry = unsafe { mem::zeroed() };
        inner.rt_flags = flags as _;
        inner.rt_dst = sockaddr_v4(dst);
        inner.rt_gateway = sockaddr_v4(gateway);
        inner.rt_genmask = sockaddr_v4(genmask);
        Self { inner }
    }

    /// Binds the route to an interface. `dev` must outlive the ioctl call.
    pub(crate) fn set_dev(&mut self, dev: *mut libc::c_char) {
        self.inner.rt_dev = dev;
    }

    pub(crate) fn raw(&mut self) -> &mut libc::rtentry {
        &mut self.inner
    }
}

pub(crate) fn in6_addr(addr: Ipv6Addr) -> libc::in6_addr {
    libc::in6_addr {
        s6_addr: addr.octets(),
    }
}

pub(crate) fn sockaddr_v4(addr: Ipv4Addr) -> libc::sockaddr {
    let sin = libc::sockaddr_in {
        sin_family: libc::AF_INET as libc::sa_family_t,
        sin_port: 0,
        sin_addr: libc::in_addr {
            s_addr: u32::from(addr).to_be(),
        },
        sin_zero: [0; 8],
    };
    // SAFETY: sockaddr_in and sockaddr have the same size and the kernel
    // reinterprets one as the other.
    unsafe { mem::transmute::<libc::sockaddr_in, libc::sockaddr>(sin) }
}

pub(crate) fn ipv4_from_sockaddr(sa: &libc::sockaddr) -> Option<Ipv4Addr> {
    if i32::from(sa.sa_family) != libc::AF_INET {
        return None;
    }
    // SAFETY: family is AF_INET, so the storage holds a sockaddr_in.
    let sin = unsafe { mem::transmute::<libc::sockaddr, libc::sockaddr_in>(*sa) };
    Some(Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr)))
}

/// A datagram socket used only as an ioctl handle. Closed on drop.
pub(crate) struct ControlSocket {
    fd: OwnedFd,
}

impl ControlSocket {
    pub(crate) fn ipv4() -> io::Result<Self> {
        Self::open(libc::AF_INET)
    }

    pub(crate) fn ipv6() -> io::Result<Self> {
        Self::open(libc::AF_INET6)
    }

    fn open(family: libc::c_int) -> io::Result<Self> {
        // SAFETY: plain socket(2) call; the result is checked below.
        let fd = unsafe { libc::socket(family, libc::SOCK_DGRAM | libc::SOCK_CLOEXEC, 0) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: fd is a freshly opened descriptor we exclusively own.
        let fd = unsafe { OwnedFd::from_raw_fd(fd) };
        Ok(Self { fd })
    }

    /// Issues `request` with `arg` as the in/out argument.
    pub(crate) fn ioctl<T>(&self, request: u64, arg: &mut T) -> io::Result<()> {
        // SAFETY: `arg` is a live, exclusively borrowed repr(C) request
        // structure of the type the kernel expects for `request`.
        let ret = unsafe { libc::ioctl(self.fd.as_raw_fd(), request as _, arg as *mut T) };
        if ret < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ifreq_name_round_trip() {
        let req = IfReq::with_name("wlan0").unwrap();
        assert_eq!(req.name(), "wlan0");
    }

    #[test]
    fn ifreq_rejects_long_names() {
        assert!(IfReq::with_name("averyveryverylongname").is_err());
        assert!(IfReq::with_name("").is_err());
    }

    #[test]
    fn ifreq_size_matches_kernel() {
        assert_eq!(mem::size_of::<IfReq>(), 40);
    }

    #[test]
    fn sockaddr_conversion() {
        let addr = Ipv4Addr::new(192, 168, 1, 10);
        let sa = sockaddr_v4(addr);
        assert_eq!(ipv4_from_sockaddr(&sa), Some(addr));

        let mut req = IfReq::zeroed();
        req.set_ipv4(addr);
        assert_eq!(req.ipv4(), Some(addr));
        assert_eq!(IfReq::zeroed().ipv4(), None);
    }

    #[test]
    fn index_field() {
        assert_eq!(IfReq::with_index(7).index(), 7);
    }
}
