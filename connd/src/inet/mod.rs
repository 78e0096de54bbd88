//! Kernel interface, address and route control.
//!
//! Every function opens a short-lived datagram control socket, issues one or
//! more ioctls and closes the socket before returning. Calls are synchronous
//! and bounded by the kernel; none of them block on the network.
//!
//! Identities are derived on demand (index, name, hardware address,
//! classification) and never cached.

mod address;
mod link;
mod route;
mod sys;

pub use address::{
    AddressReport, AddressStep, clear_ipv4_address, clear_ipv6_address, compare_subnet,
    set_ipv4_address, set_ipv6_address,
};
pub use link::{
    InterfaceDescriptor, InterfaceFlags, InterfaceKind, classify, describe_interface,
    hardware_address, hardware_type, ident, ifdown, ifflags, ifindex, ifname, ifup, interface_kind,
    is_cfg80211,
};
pub use route::{
    add_host_route, add_ipv6_host_route, clear_gateway_address, clear_gateway_interface,
    clear_ipv6_gateway_address, clear_ipv6_gateway_interface, del_host_route,
    del_ipv6_host_route, set_gateway_address, set_gateway_interface, set_ipv6_gateway_address,
    set_ipv6_gateway_interface,
};
