//! Interface address configuration and subnet checks.

use log::debug;
use std::io;
use std::net::{IpAddr, Ipv4Addr};

use crate::api::models::ConnectionError;
use crate::core::ipconfig::IpAddress;
use crate::inet::link::named_request;
use crate::inet::sys::{ControlSocket, In6IfReq};
use crate::types::constants::kernel;
use crate::util::utils::{broadcast_for, netmask_from_prefix, same_subnet};
use crate::Result;

/// One independent step of setting an IPv4 address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressStep {
    Address,
    Netmask,
    Broadcast,
}

/// Outcome of [`set_ipv4_address`]. Each step is attempted regardless of
/// earlier failures; failed steps are listed here.
#[derive(Debug, Default)]
pub struct AddressReport {
    failures: Vec<(AddressStep, io::Error)>,
}

impl AddressReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed_steps(&self) -> impl Iterator<Item = AddressStep> + '_ {
        self.failures.iter().map(|(step, _)| *step)
    }

    /// Converts a failed address step into an error. Netmask and broadcast
    /// failures alone are tolerated.
    pub(crate) fn into_address_error(self) -> Option<ConnectionError> {
        self.failures
            .into_iter()
            .find(|(step, _)| *step == AddressStep::Address)
            .map(|(_, e)| ConnectionError::kernel("SIOCSIFADDR", e))
    }

    fn record(&mut self, step: AddressStep, result: io::Result<()>) {
        if let Err(e) = result {
            debug!("{:?} setting failed ({})", step, e);
            self.failures.push((step, e));
        }
    }
}

fn open_v4() -> Result<ControlSocket> {
    ControlSocket::ipv4().map_err(|e| ConnectionError::kernel("open control socket", e))
}

fn open_v6() -> Result<ControlSocket> {
    ControlSocket::ipv6().map_err(|e| ConnectionError::kernel("open control socket", e))
}

/// Sets an IPv4 address, netmask and broadcast on `index`.
///
/// The broadcast address defaults to the local address with all host bits
/// set. Only a missing interface or a non-IPv4 address fails the call.
pub fn set_ipv4_address(index: i32, address: &IpAddress) -> Result<AddressReport> {
    let IpAddr::V4(local) = address.local else {
        return Err(ConnectionError::InvalidArgument(format!(
            "{} is not an IPv4 address",
            address.local
        )));
    };

    let sk = open_v4()?;
    let mut req = named_request(&sk, index)?;
    debug!("ifname {} address {}/{}", req.name(), local, address.prefixlen);

    let mut report = AddressReport::default();

    req.set_ipv4(local);
    report.record(AddressStep::Address, sk.ioctl(kernel::SIOCSIFADDR, &mut req));

    req.set_ipv4(netmask_from_prefix(address.prefixlen));
    report.record(AddressStep::Netmask, sk.ioctl(kernel::SIOCSIFNETMASK, &mut req));

    let broadcast = address
        .broadcast
        .unwrap_or_else(|| broadcast_for(local, address.prefixlen));
    req.set_ipv4(broadcast);
    report.record(
        AddressStep::Broadcast,
        sk.ioctl(kernel::SIOCSIFBRDADDR, &mut req),
    );

    Ok(report)
}

/// Resets the IPv4 address of `index` to `0.0.0.0`.
///
/// An interface that had no address is not an error.
pub fn clear_ipv4_address(index: i32) -> Result<()> {
    let sk = open_v4()?;
    let mut req = named_request(&sk, index)?;
    debug!("ifname {}", req.name());

    req.set_ipv4(Ipv4Addr::UNSPECIFIED);
    match sk.ioctl(kernel::SIOCSIFADDR, &mut req) {
        Err(e) if e.raw_os_error() != Some(libc::EADDRNOTAVAIL) => {
            debug!("address removal failed ({})", e);
            Err(ConnectionError::kernel("SIOCSIFADDR", e))
        }
        _ => Ok(()),
    }
}

fn ipv6_request(index: i32, address: &IpAddress) -> Result<In6IfReq> {
    let IpAddr::V6(local) = address.local else {
        return Err(ConnectionError::InvalidArgument(format!(
            "{} is not an IPv6 address",
            address.local
        )));
    };
    Ok(In6IfReq::new(local, address.prefixlen, index))
}

pub fn set_ipv6_address(index: i32, address: &IpAddress) -> Result<()> {
    debug!("index {} address {}/{}", index, address.local, address.prefixlen);
    let mut req = ipv6_request(index, address)?;
    let sk = open_v6()?;
    sk.ioctl(kernel::SIOCSIFADDR, &mut req)
        .map_err(|e| ConnectionError::kernel("set IPv6 address", e))
}

pub fn clear_ipv6_address(index: i32, address: &IpAddress) -> Result<()> {
    debug!("index {} address {}/{}", index, address.local, address.prefixlen);
    let mut req = ipv6_request(index, address)?;
    let sk = open_v6()?;
    sk.ioctl(kernel::SIOCDIFADDR, &mut req)
        .map_err(|e| ConnectionError::kernel("clear IPv6 address", e))
}

/// Returns true if `host` is on the same subnet as the interface's IPv4
/// address.
pub fn compare_subnet(index: i32, host: Ipv4Addr) -> Result<bool> {
    let sk = open_v4()?;
    let mut req = named_request(&sk, index)?;

    sk.ioctl(kernel::SIOCGIFNETMASK, &mut req)
        .map_err(|e| ConnectionError::kernel("SIOCGIFNETMASK", e))?;
    let netmask = req
        .ipv4()
        .ok_or_else(|| ConnectionError::InvalidAddress("netmask".into()))?;

    sk.ioctl(kernel::SIOCGIFADDR, &mut req)
        .map_err(|e| ConnectionError::kernel("SIOCGIFADDR", e))?;
    let local = req
        .ipv4()
        .ok_or_else(|| ConnectionError::InvalidAddress("interface address".into()))?;

    Ok(same_subnet(local, netmask, host))
}
