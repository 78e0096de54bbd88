//! IP configuration values and the seam that applies them to the kernel.

use log::{debug, warn};
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use crate::api::models::{ConnectionError, IpConfigMethod};
use crate::inet;
use crate::Result;

/// An interface address: local address, prefix length and, for IPv4, an
/// optional broadcast address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpAddress {
    pub local: IpAddr,
    pub prefixlen: u8,
    pub broadcast: Option<Ipv4Addr>,
}

impl IpAddress {
    pub fn new(local: IpAddr, prefixlen: u8) -> Self {
        Self {
            local,
            prefixlen,
            broadcast: None,
        }
    }

    #[must_use]
    pub fn with_broadcast(mut self, broadcast: Ipv4Addr) -> Self {
        self.broadcast = Some(broadcast);
        self
    }

    pub fn is_ipv4(&self) -> bool {
        self.local.is_ipv4()
    }
}

impl FromStr for IpAddress {
    type Err = ConnectionError;

    /// Parses `address/prefix`. A bare address gets a host prefix.
    fn from_str(s: &str) -> Result<Self> {
        let (addr, prefix) = match s.split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (s, None),
        };
        let local: IpAddr = addr
            .parse()
            .map_err(|_| ConnectionError::InvalidAddress(s.to_string()))?;
        let max = if local.is_ipv4() { 32 } else { 128 };
        let prefixlen = match prefix {
            Some(p) => p
                .parse::<u8>()
                .ok()
                .filter(|p| *p <= max)
                .ok_or_else(|| ConnectionError::InvalidAddress(s.to_string()))?,
            None => max,
        };
        Ok(Self::new(local, prefixlen))
    }
}

/// IP configuration of one interface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IpConfig {
    pub index: Option<i32>,
    pub method: IpConfigMethod,
    pub address: Option<IpAddress>,
    pub gateway: Option<IpAddr>,
}

impl IpConfig {
    pub fn new(method: IpConfigMethod) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_index(mut self, index: i32) -> Self {
        self.index = Some(index);
        self
    }

    #[must_use]
    pub fn with_address(mut self, address: IpAddress) -> Self {
        self.address = Some(address);
        self
    }

    #[must_use]
    pub fn with_gateway(mut self, gateway: IpAddr) -> Self {
        self.gateway = Some(gateway);
        self
    }
}

/// Applies static IP configuration to interfaces.
pub trait AddressConfigurator {
    fn apply(&mut self, config: &IpConfig) -> Result<()>;
    fn clear(&mut self, config: &IpConfig) -> Result<()>;
}

/// Configurator backed by the kernel control layer.
#[derive(Debug, Default)]
pub struct KernelConfigurator;

impl AddressConfigurator for KernelConfigurator {
    fn apply(&mut self, config: &IpConfig) -> Result<()> {
        let (index, address) = require(config)?;
        debug!("index {} address {:?}", index, address);

        match address.local {
            IpAddr::V4(_) => {
                let report = inet::set_ipv4_address(index, &address)?;
                if let Some(err) = report.into_address_error() {
                    return Err(err);
                }
            }
            IpAddr::V6(_) => inet::set_ipv6_address(index, &address)?,
        }

        match config.gateway {
            Some(IpAddr::V4(gateway)) => {
                if !inet::compare_subnet(index, gateway).unwrap_or(false) {
                    inet::add_host_route(index, gateway, None)?;
                }
                inet::set_gateway_address(index, gateway)?;
            }
            Some(IpAddr::V6(gateway)) => inet::set_ipv6_gateway_address(index, gateway)?,
            None => {}
        }

        Ok(())
    }

    fn clear(&mut self, config: &IpConfig) -> Result<()> {
        let (index, address) = require(config)?;

        match config.gateway {
            Some(IpAddr::V4(gateway)) => {
                if let Err(e) = inet::clear_gateway_address(index, gateway) {
                    warn!("index {} gateway removal failed: {}", index, e);
                }
            }
            Some(IpAddr::V6(gateway)) => {
                if let Err(e) = inet::clear_ipv6_gateway_address(index, gateway) {
                    warn!("index {} gateway removal failed: {}", index, e);
                }
            }
            None => {}
        }

        match address.local {
            IpAddr::V4(_) => inet::clear_ipv4_address(index),
            IpAddr::V6(_) => inet::clear_ipv6_address(index, &address),
        }
    }
}

fn require(config: &IpConfig) -> Result<(i32, IpAddress)> {
    let index = config
        .index
        .ok_or_else(|| ConnectionError::InvalidArgument("interface index not set".into()))?;
    let address = config
        .address
        .ok_or_else(|| ConnectionError::InvalidArgument("no address configured".into()))?;
    Ok((index, address))
}
