//! Network driver registry.
//!
//! Drivers are kept in a list sorted by descending priority. When a network is
//! probed, every driver whose type matches the network (or whose type is
//! [`NetworkType::Unknown`], which acts as a wildcard) is tried in order and
//! the first one that accepts the network is bound to it.

use bitflags::bitflags;
use log::debug;
use std::rc::Rc;

use crate::api::models::{ConnectOutcome, ConnectionError, NetworkType};
use crate::core::network::Network;
use crate::types::constants::priority;
use crate::Result;

bitflags! {
    /// Optional operations a driver implements.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DriverOps: u8 {
        const CONNECT = 0b0001;
        const DISCONNECT = 0b0010;
        const SETUP = 0b0100;
        const REMOVE = 0b1000;
    }
}

/// A pluggable technology driver.
///
/// Only `probe` is mandatory. The other hooks are dispatched only when the
/// matching bit is present in [`operations`](NetworkDriver::operations);
/// otherwise the dispatcher reports [`ConnectionError::Unsupported`] without
/// touching the network.
pub trait NetworkDriver {
    fn name(&self) -> &str;

    /// Network type handled. `Unknown` matches every network.
    fn network_type(&self) -> NetworkType;

    fn priority(&self) -> i32 {
        priority::DEFAULT
    }

    fn operations(&self) -> DriverOps {
        DriverOps::all()
    }

    /// Decides whether this driver handles `network`.
    fn probe(&self, network: &mut Network) -> Result<()>;

    fn remove(&self, _network: &mut Network) {}

    /// Starts connecting. Returning [`ConnectOutcome::InProgress`] means the
    /// result is reported later through the manager. Any error is reported to
    /// the caller of the connect request as [`ConnectionError::AssociateFail`].
    fn connect(&self, _network: &mut Network) -> Result<ConnectOutcome> {
        Err(ConnectionError::Unsupported)
    }

    fn disconnect(&self, _network: &mut Network) -> Result<()> {
        Err(ConnectionError::Unsupported)
    }

    /// Called after a string property changed.
    fn setup(&self, _network: &mut Network, _key: &str) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct DriverRegistry {
    drivers: Vec<Rc<dyn NetworkDriver>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a driver after every driver of equal or higher priority.
    pub fn register(&mut self, driver: Rc<dyn NetworkDriver>) {
        debug!("driver {} priority {}", driver.name(), driver.priority());
        let position = self
            .drivers
            .iter()
            .position(|d| d.priority() < driver.priority())
            .unwrap_or(self.drivers.len());
        self.drivers.insert(position, driver);
    }

    /// Removes the given driver instance. Unknown drivers are ignored.
    pub fn unregister(&mut self, driver: &Rc<dyn NetworkDriver>) {
        debug!("driver {}", driver.name());
        if let Some(position) = self.drivers.iter().position(|d| same_driver(d, driver)) {
            self.drivers.remove(position);
        }
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }

    /// Drivers in dispatch order.
    pub fn iter(&self) -> impl Iterator<Item = &Rc<dyn NetworkDriver>> {
        self.drivers.iter()
    }

    /// Probes matching drivers in order and returns the first that accepts.
    pub fn bind(&self, network: &mut Network) -> Result<Rc<dyn NetworkDriver>> {
        for driver in self.drivers.iter() {
            if !matches(driver.as_ref(), network) {
                continue;
            }
            debug!("probing {} with driver {}", network.id(), driver.name());
            match driver.probe(network) {
                Ok(()) => return Ok(Rc::clone(driver)),
                Err(e) => debug!("driver {} declined: {}", driver.name(), e),
            }
        }
        Err(ConnectionError::NoDevice)
    }
}

fn matches(driver: &dyn NetworkDriver, network: &Network) -> bool {
    driver.network_type() == network.network_type()
        || driver.network_type() == NetworkType::Unknown
}

pub(crate) fn same_driver(a: &Rc<dyn NetworkDriver>, b: &Rc<dyn NetworkDriver>) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}
