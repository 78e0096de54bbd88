//! Host and default route manipulation.
//!
//! IPv4 routes go through `struct rtentry`, IPv6 routes through
//! `struct in6_rtmsg`. Failures are logged and returned.

use log::{debug, error};
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::api::models::ConnectionError;
use crate::inet::link::named_request;
use crate::inet::sys::{in6_addr, ControlSocket, In6RtMsg, RtEntry};
use crate::types::constants::kernel;
use crate::Result;

const HOST_PREFIX_V6: u16 = 128;

/// Whether an IPv4 route names its output interface.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Dev {
    Bind,
    Unbound,
}

// A vanished index fails before the routing table is touched.
fn v4_request(
    index: i32,
    dev: Dev,
    request: u64,
    flags: u16,
    dst: Ipv4Addr,
    gateway: Ipv4Addr,
    what: &str,
) -> Result<()> {
    let sk = ControlSocket::ipv4().map_err(|e| ConnectionError::kernel("open control socket", e))?;
    let mut rt = RtEntry::new(flags, dst, gateway, Ipv4Addr::UNSPECIFIED);

    // Holds the interface name the route points at for the ioctl duration.
    let mut req = named_request(&sk, index)?;
    debug!("ifname {}", req.name());
    if dev == Dev::Bind {
        rt.set_dev(req.name_ptr());
    }

    sk.ioctl(request, rt.raw()).map_err(|e| {
        error!("{} failed ({})", what, e);
        ConnectionError::kernel(what, e)
    })
}

fn v6_request(
    index: i32,
    request: u64,
    flags: u16,
    dst: Option<Ipv6Addr>,
    gateway: Option<Ipv6Addr>,
    what: &str,
) -> Result<()> {
    let mut rt = In6RtMsg::zeroed();
    if let Some(dst) = dst {
        rt.dst = in6_addr(dst);
        rt.dst_len = HOST_PREFIX_V6;
    }
    if let Some(gateway) = gateway {
        rt.gateway = in6_addr(gateway);
    }
    rt.flags = u32::from(flags);
    rt.metric = kernel::IPV6_ROUTE_METRIC;
    rt.ifindex = index;

    let sk = ControlSocket::ipv6().map_err(|e| ConnectionError::kernel("open control socket", e))?;
    sk.ioctl(request, &mut rt).map_err(|e| {
        error!("{} failed ({})", what, e);
        ConnectionError::kernel(what, e)
    })
}

/// Adds a host route to `host` through `index`, optionally via `gateway`.
pub fn add_host_route(index: i32, host: Ipv4Addr, gateway: Option<Ipv4Addr>) -> Result<()> {
    debug!("index {} host {} gateway {:?}", index, host, gateway);
    let mut flags = kernel::RTF_UP | kernel::RTF_HOST;
    if gateway.is_some() {
        flags |= kernel::RTF_GATEWAY;
    }
    v4_request(
        index,
        Dev::Bind,
        kernel::SIOCADDRT,
        flags,
        host,
        gateway.unwrap_or(Ipv4Addr::UNSPECIFIED),
        "adding host route",
    )
}

pub fn del_host_route(index: i32, host: Ipv4Addr) -> Result<()> {
    debug!("index {} host {}", index, host);
    v4_request(
        index,
        Dev::Bind,
        kernel::SIOCDELRT,
        kernel::RTF_UP | kernel::RTF_HOST,
        host,
        Ipv4Addr::UNSPECIFIED,
        "deleting host route",
    )
}

/// Installs the IPv4 default route via `gateway`.
pub fn set_gateway_address(index: i32, gateway: Ipv4Addr) -> Result<()> {
    debug!("index {} gateway {}", index, gateway);
    v4_request(
        index,
        Dev::Unbound,
        kernel::SIOCADDRT,
        kernel::RTF_UP | kernel::RTF_GATEWAY,
        Ipv4Addr::UNSPECIFIED,
        gateway,
        "setting default gateway route",
    )
}

pub fn clear_gateway_address(index: i32, gateway: Ipv4Addr) -> Result<()> {
    debug!("index {} gateway {}", index, gateway);
    v4_request(
        index,
        Dev::Unbound,
        kernel::SIOCDELRT,
        kernel::RTF_UP | kernel::RTF_GATEWAY,
        Ipv4Addr::UNSPECIFIED,
        gateway,
        "removing default gateway route",
    )
}

/// Installs an on-link IPv4 default route through the interface itself.
pub fn set_gateway_interface(index: i32) -> Result<()> {
    debug!("index {}", index);
    v4_request(
        index,
        Dev::Bind,
        kernel::SIOCADDRT,
        kernel::RTF_UP,
        Ipv4Addr::UNSPECIFIED,
        Ipv4Addr::UNSPECIFIED,
        "setting default interface route",
    )
}

pub fn clear_gateway_interface(index: i32) -> Result<()> {
    debug!("index {}", index);
    v4_request(
        index,
        Dev::Bind,
        kernel::SIOCDELRT,
        kernel::RTF_UP,
        Ipv4Addr::UNSPECIFIED,
        Ipv4Addr::UNSPECIFIED,
        "removing default interface route",
    )
}

pub fn add_ipv6_host_route(index: i32, host: Ipv6Addr, gateway: Option<Ipv6Addr>) -> Result<()> {
    debug!("index {} host {} gateway {:?}", index, host, gateway);
    let mut flags = kernel::RTF_UP | kernel::RTF_HOST;
    if gateway.is_some() {
        flags |= kernel::RTF_GATEWAY;
    }
    v6_request(
        index,
        kernel::SIOCADDRT,
        flags,
        Some(host),
        gateway,
        "adding IPv6 host route",
    )
}

pub fn del_ipv6_host_route(index: i32, host: Ipv6Addr) -> Result<()> {
    debug!("index {} host {}", index, host);
    v6_request(
        index,
        kernel::SIOCDELRT,
        kernel::RTF_UP | kernel::RTF_HOST,
        Some(host),
        None,
        "deleting IPv6 host route",
    )
}

pub fn set_ipv6_gateway_address(index: i32, gateway: Ipv6Addr) -> Result<()> {
    debug!("index {} gateway {}", index, gateway);
    v6_request(
        index,
        kernel::SIOCADDRT,
        kernel::RTF_UP | kernel::RTF_GATEWAY,
        None,
        Some(gateway),
        "setting default IPv6 gateway",
    )
}

pub fn clear_ipv6_gateway_address(index: i32, gateway: Ipv6Addr) -> Result<()> {
    debug!("index {} gateway {}", index, gateway);
    v6_request(
        index,
        kernel::SIOCDELRT,
        kernel::RTF_UP | kernel::RTF_GATEWAY,
        None,
        Some(gateway),
        "clearing default IPv6 gateway",
    )
}

/// Installs an on-link IPv6 default route through the interface.
pub fn set_ipv6_gateway_interface(index: i32) -> Result<()> {
    debug!("index {}", index);
    v6_request(
        index,
        kernel::SIOCADDRT,
        kernel::RTF_UP,
        None,
        None,
        "setting default IPv6 interface route",
    )
}

pub fn clear_ipv6_gateway_interface(index: i32) -> Result<()> {
    debug!("index {}", index);
    v6_request(
        index,
        kernel::SIOCDELRT,
        kernel::RTF_UP,
        None,
        None,
        "clearing default IPv6 interface route",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_interface_fails_before_touching_routes() {
        let err = add_host_route(i32::MAX, Ipv4Addr::new(10, 0, 0, 1), None).unwrap_err();
        assert!(matches!(err, ConnectionError::Kernel { .. }));
        assert!(set_gateway_interface(i32::MAX).is_err());
    }

    #[test]
    fn gateway_route_checks_interface_first() {
        let gateway = Ipv4Addr::new(10, 0, 0, 1);
        for result in [
            set_gateway_address(i32::MAX, gateway),
            clear_gateway_address(i32::MAX, gateway),
        ] {
            match result {
                Err(ConnectionError::Kernel { context, .. }) => {
                    assert!(context.starts_with("SIOCGIFNAME"), "{context}");
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }
}
