//! Connection management core for a network daemon.
//!
//! This crate tracks connectable networks discovered by devices and drives
//! them from discovery to a configured link:
//!
//! - A [`Network`] entity with typed properties and a reference-counted
//!   lifetime inside a [`Manager`]
//! - A priority-ordered registry of pluggable [`NetworkDriver`]s
//! - The connect/associate/configure/disconnect state machine, reported to
//!   the service layer through [`ServiceLayer`]
//! - Kernel interface, address and route control in [`inet`]
//! - Captive portal probing and WPAD proxy discovery driven by an
//!   [`EventLoop`]
//!
//! # Example
//!
//! ```no_run
//! use std::rc::Rc;
//! use connd::{
//!     ConnectOutcome, DriverOps, LocalTransport, Manager, Network, NetworkDriver, NetworkType,
//! };
//! # use connd::{DeviceId, DeviceLayer, IpConfig, IpConfigMethod, NetworkId, ServiceId,
//! #     ServiceLayer, ServiceState};
//! # struct Services;
//! # impl ServiceLayer for Services {
//! #     fn lookup_from_network(&mut self, _: &Network) -> Option<ServiceId> { None }
//! #     fn indicate_state(&mut self, _: ServiceId, _: ServiceState) {}
//! #     fn ipconfig(&mut self, _: ServiceId) -> Option<IpConfig> { None }
//! #     fn create_ipconfig(&mut self, _: ServiceId, _: i32) {}
//! #     fn set_ipconfig_index(&mut self, _: ServiceId, _: i32) {}
//! #     fn set_method(&mut self, _: ServiceId, _: IpConfigMethod) {}
//! # }
//! # struct Devices;
//! # impl DeviceLayer for Devices {
//! #     fn path(&self, _: DeviceId) -> Option<String> { None }
//! #     fn increase_connections(&mut self, _: DeviceId) {}
//! #     fn decrease_connections(&mut self, _: DeviceId) {}
//! #     fn set_network(&mut self, _: DeviceId, _: Option<NetworkId>) {}
//! #     fn set_disconnected(&mut self, _: DeviceId, _: bool) {}
//! # }
//!
//! struct Wired;
//!
//! impl NetworkDriver for Wired {
//!     fn name(&self) -> &str { "wired" }
//!     fn network_type(&self) -> NetworkType { NetworkType::Ethernet }
//!     fn operations(&self) -> DriverOps { DriverOps::CONNECT | DriverOps::DISCONNECT }
//!     fn probe(&self, _: &mut Network) -> connd::Result<()> { Ok(()) }
//!     fn connect(&self, _: &mut Network) -> connd::Result<ConnectOutcome> {
//!         Ok(ConnectOutcome::Connected)
//!     }
//!     fn disconnect(&self, _: &mut Network) -> connd::Result<()> { Ok(()) }
//! }
//!
//! # fn main() -> connd::Result<()> {
//! let mut manager = Manager::new(
//!     Box::new(Services),
//!     Box::new(Devices),
//!     Box::new(LocalTransport::new()),
//! );
//! manager.register_driver(Rc::new(Wired));
//!
//! let id = manager.create_network(Some("eth0"), NetworkType::Ethernet);
//! manager.register_network(id)?;
//! manager.connect(id)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! All fallible operations return [`Result`] with a [`ConnectionError`].
//! [`ConnectionError::AlreadyInState`] is an idempotence signal rather than a
//! failure; [`ConnectionError::is_already`] identifies it.
//!
//! # Logging
//!
//! This crate uses the [`log`](https://docs.rs/log) facade. No logger is
//! installed; add one such as `env_logger` in the binary.

pub mod api;
mod core;
pub mod dbus;
pub mod inet;
mod types;
mod util;

pub use api::config::{DaemonConfig, PortalConfig, ProxyAddress};
pub use api::manager::Manager;
pub use api::models::{
    ConnectOutcome, ConnectionError, DeviceId, IpConfigMethod, NetworkErrorKind, NetworkId,
    NetworkProtocol, NetworkState, NetworkType, Privilege, PropertyValue, Released, ServiceId,
    ServiceState,
};
pub use crate::core::device::DeviceLayer;
pub use crate::core::element::{Element, ElementError, ElementKind};
pub use crate::core::event_loop::{Event, EventLoop};
pub use crate::core::ipconfig::{AddressConfigurator, IpAddress, IpConfig, KernelConfigurator};
pub use crate::core::network::{Network, WifiParams};
pub use crate::core::portal::{PortalContext, PortalResult};
pub use crate::core::{portal, wpad};
pub use crate::core::registry::{DriverOps, DriverRegistry, NetworkDriver};
pub use crate::core::scheduler::{Scheduler, Task};
pub use crate::core::service::ServiceLayer;
pub use crate::core::transport::{LocalTransport, PropertySnapshot, Signal, Transport};
pub use crate::core::wpad::{Resolver, SystemResolver, Wpad, WpadOutcome, WpadRequest};
pub use crate::types::constants;
pub use crate::util::utils::{format_hwaddr, hwaddr_ident, wifi_group_name};

/// A specialized `Result` type for connection management operations.
pub type Result<T> = std::result::Result<T, ConnectionError>;
