use log::{debug, warn};
use std::rc::Rc;

use crate::api::config::DaemonConfig;
use crate::api::models::{
    ConnectOutcome, DeviceId, IpConfigMethod, NetworkErrorKind, NetworkId, NetworkProtocol,
    NetworkType, PropertyValue, Released,
};
use crate::core::arena::NetworkArena;
use crate::core::device::DeviceLayer;
use crate::core::ipconfig::{AddressConfigurator, IpConfig, KernelConfigurator};
use crate::core::lifecycle;
use crate::core::network::Network;
use crate::core::registry::{DriverRegistry, NetworkDriver};
use crate::core::scheduler::{Scheduler, Task};
use crate::core::service::ServiceLayer;
use crate::core::transport::Transport;
use crate::types::constants::property;
use crate::util::utils::hidden_name;
use crate::Result;

/// Connection manager context.
///
/// Owns every network, the driver registry and the deferred task queue, and
/// talks to the rest of the daemon through the [`ServiceLayer`],
/// [`DeviceLayer`] and [`Transport`] seams.
///
/// The manager is single-threaded. Drivers report asynchronous completions
/// by calling back into it (usually through
/// [`EventLoop`](crate::EventLoop)), and work that must not run inside a
/// transition is queued and executed by [`run_pending`](Manager::run_pending).
///
/// # Example
///
/// ```no_run
/// use connd::{LocalTransport, Manager, NetworkType};
/// # use connd::{DeviceId, DeviceLayer, IpConfig, IpConfigMethod, Network, NetworkId,
/// #     ServiceId, ServiceLayer, ServiceState};
/// # struct Services;
/// # impl ServiceLayer for Services {
/// #     fn lookup_from_network(&mut self, _: &Network) -> Option<ServiceId> { None }
/// #     fn indicate_state(&mut self, _: ServiceId, _: ServiceState) {}
/// #     fn ipconfig(&mut self, _: ServiceId) -> Option<IpConfig> { None }
/// #     fn create_ipconfig(&mut self, _: ServiceId, _: i32) {}
/// #     fn set_ipconfig_index(&mut self, _: ServiceId, _: i32) {}
/// #     fn set_method(&mut self, _: ServiceId, _: IpConfigMethod) {}
/// # }
/// # struct Devices;
/// # impl DeviceLayer for Devices {
/// #     fn path(&self, _: DeviceId) -> Option<String> { None }
/// #     fn increase_connections(&mut self, _: DeviceId) {}
/// #     fn decrease_connections(&mut self, _: DeviceId) {}
/// #     fn set_network(&mut self, _: DeviceId, _: Option<NetworkId>) {}
/// #     fn set_disconnected(&mut self, _: DeviceId, _: bool) {}
/// # }
///
/// # fn main() -> connd::Result<()> {
/// let transport = LocalTransport::new();
/// let mut manager = Manager::new(
///     Box::new(Services),
///     Box::new(Devices),
///     Box::new(transport.clone()),
/// );
///
/// let id = manager.create_network(Some("cafe"), NetworkType::Wifi);
/// manager.register_network(id)?;
/// manager.connect(id)?;
/// manager.run_pending();
/// # Ok(())
/// # }
/// ```
pub struct Manager {
    pub(crate) config: DaemonConfig,
    pub(crate) networks: NetworkArena,
    pub(crate) drivers: DriverRegistry,
    pub(crate) scheduler: Scheduler,
    pub(crate) services: Box<dyn ServiceLayer>,
    pub(crate) devices: Box<dyn DeviceLayer>,
    pub(crate) transport: Box<dyn Transport>,
    pub(crate) configurator: Box<dyn AddressConfigurator>,
    hidden_counter: u64,
}

impl Manager {
    pub fn new(
        services: Box<dyn ServiceLayer>,
        devices: Box<dyn DeviceLayer>,
        transport: Box<dyn Transport>,
    ) -> Self {
        Self::with_config(DaemonConfig::default(), services, devices, transport)
    }

    pub fn with_config(
        config: DaemonConfig,
        services: Box<dyn ServiceLayer>,
        devices: Box<dyn DeviceLayer>,
        transport: Box<dyn Transport>,
    ) -> Self {
        Self {
            config,
            networks: NetworkArena::new(),
            drivers: DriverRegistry::new(),
            scheduler: Scheduler::new(),
            services,
            devices,
            transport,
            configurator: Box::new(KernelConfigurator),
            hidden_counter: 0,
        }
    }

    /// Replaces the component that applies static addresses.
    #[must_use]
    pub fn with_configurator(mut self, configurator: Box<dyn AddressConfigurator>) -> Self {
        self.configurator = configurator;
        self
    }

    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }

    // Drivers

    /// Adds a driver. Higher priorities are probed first; equal priorities
    /// keep registration order.
    pub fn register_driver(&mut self, driver: Rc<dyn NetworkDriver>) {
        self.drivers.register(driver);
    }

    pub fn unregister_driver(&mut self, driver: &Rc<dyn NetworkDriver>) {
        self.drivers.unregister(driver);
    }

    pub fn drivers(&self) -> &DriverRegistry {
        &self.drivers
    }

    // Networks

    /// Creates a network with one reference held by the caller.
    ///
    /// Without an identifier the network is hidden and named `hidden_<n>`.
    pub fn create_network(&mut self, identifier: Option<&str>, network_type: NetworkType) -> NetworkId {
        let (identifier, hidden) = match identifier {
            Some(identifier) => (identifier.to_string(), false),
            None => {
                let name = hidden_name(self.hidden_counter);
                self.hidden_counter += 1;
                (name, true)
            }
        };

        let id = self.networks.next_id();
        debug!("{} created as {} ({})", id, identifier, network_type);
        self.networks
            .insert(Network::new(id, identifier, network_type, hidden))
    }

    pub fn ref_network(&mut self, id: NetworkId) -> Result<usize> {
        self.networks.retain(id)
    }

    /// Drops a reference. The last one destroys the network, unpublishing it
    /// first if it is still registered.
    pub fn unref_network(&mut self, id: NetworkId) -> Result<Released> {
        let last = self.networks.refs(id) == Some(1);
        if last && self.networks.lookup(id)?.is_registered() {
            warn!("{} released while still registered", id);
            lifecycle::unregister_network(self, id)?;
        }

        match self.networks.release(id)? {
            (_, Some(mut network)) => {
                debug!("{} destroyed", id);
                network.release();
                Ok(Released::Destroyed)
            }
            (left, None) => Ok(Released::Alive(left)),
        }
    }

    pub fn network(&self, id: NetworkId) -> Result<&Network> {
        self.networks.lookup(id)
    }

    /// Direct mutable access. Published properties are not refreshed; use
    /// [`update_network`](Manager::update_network) for that.
    pub fn network_mut(&mut self, id: NetworkId) -> Result<&mut Network> {
        self.networks.lookup_mut(id)
    }

    pub fn networks(&self) -> impl Iterator<Item = &Network> {
        self.networks.iter()
    }

    /// Number of live references to `id`.
    pub fn refs(&self, id: NetworkId) -> Option<usize> {
        self.networks.refs(id)
    }

    /// Mutates a network and republishes its properties.
    pub fn update_network<R>(&mut self, id: NetworkId, f: impl FnOnce(&mut Network) -> R) -> Result<R> {
        let result = f(self.networks.lookup_mut(id)?);
        lifecycle::sync(self, id);
        Ok(result)
    }

    /// A changed `Name` of a published network is also signalled.
    pub fn set_string(&mut self, id: NetworkId, key: &str, value: &str) -> Result<()> {
        let before = self.networks.lookup(id)?.get_string(key).map(str::to_owned);
        self.update_network(id, |network| network.set_string(key, value))??;
        if key == property::NAME && before.as_deref() != Some(value) {
            lifecycle::signal(self, id, key, PropertyValue::String(value.to_string()));
        }
        Ok(())
    }

    pub fn set_blob(&mut self, id: NetworkId, key: &str, data: &[u8]) -> Result<()> {
        self.update_network(id, |network| network.set_blob(key, data))?
    }

    pub fn set_bool(&mut self, id: NetworkId, key: &str, value: bool) -> Result<()> {
        self.update_network(id, |network| network.set_bool(key, value))
    }

    /// A changed `Strength` of a published network is also signalled.
    pub fn set_u8(&mut self, id: NetworkId, key: &str, value: u8) -> Result<()> {
        let before = self.networks.lookup(id)?.get_u8(key);
        self.update_network(id, |network| network.set_u8(key, value))?;
        if key == property::STRENGTH && before != value {
            lifecycle::signal(self, id, key, PropertyValue::U8(value));
        }
        Ok(())
    }

    pub fn set_u16(&mut self, id: NetworkId, key: &str, value: u16) -> Result<()> {
        self.update_network(id, |network| network.set_u16(key, value))
    }

    pub fn set_available(&mut self, id: NetworkId, available: bool) -> Result<()> {
        self.networks.lookup_mut(id)?.set_available(available)
    }

    pub fn set_protocol(&mut self, id: NetworkId, protocol: NetworkProtocol) -> Result<()> {
        self.networks.lookup_mut(id)?.set_protocol(protocol);
        Ok(())
    }

    /// Attaches the network to its device. Must happen before registration
    /// for the network to be published below the device.
    pub fn set_device(&mut self, id: NetworkId, device: Option<DeviceId>) -> Result<()> {
        self.networks.lookup_mut(id)?.device = device;
        Ok(())
    }

    pub fn set_index(&mut self, id: NetworkId, index: i32) -> Result<()> {
        lifecycle::set_index(self, id, index)
    }

    pub fn set_group(&mut self, id: NetworkId, group: Option<&str>) -> Result<()> {
        lifecycle::set_group(self, id, group)
    }

    pub fn set_method(&mut self, id: NetworkId, method: IpConfigMethod) -> Result<()> {
        lifecycle::set_method(self, id, method)
    }

    /// Hands an IP configuration over to the network.
    pub fn set_ipconfig(&mut self, id: NetworkId, ipconfig: IpConfig) -> Result<()> {
        self.networks.lookup_mut(id)?.set_ipconfig(ipconfig);
        Ok(())
    }

    // Registration

    /// Probes drivers for the network and publishes it.
    ///
    /// Fails with [`ConnectionError::NoDevice`] when no driver accepts it.
    pub fn register_network(&mut self, id: NetworkId) -> Result<()> {
        lifecycle::register_network(self, id)
    }

    pub fn unregister_network(&mut self, id: NetworkId) -> Result<()> {
        lifecycle::unregister_network(self, id)
    }

    // Lifecycle

    pub fn connect(&mut self, id: NetworkId) -> Result<ConnectOutcome> {
        lifecycle::connect(self, id)
    }

    pub fn disconnect(&mut self, id: NetworkId) -> Result<()> {
        lifecycle::disconnect(self, id)
    }

    pub fn set_connected(&mut self, id: NetworkId, connected: bool) -> Result<()> {
        lifecycle::set_connected(self, id, connected)
    }

    pub fn set_associating(&mut self, id: NetworkId, associating: bool) -> Result<()> {
        lifecycle::set_associating(self, id, associating)
    }

    pub fn set_error(&mut self, id: NetworkId, kind: NetworkErrorKind) -> Result<()> {
        lifecycle::set_error(self, id, kind)
    }

    pub fn dhcp_bound(&mut self, id: NetworkId) -> Result<()> {
        lifecycle::dhcp_bound(self, id)
    }

    pub fn dhcp_failed(&mut self, id: NetworkId) -> Result<()> {
        lifecycle::dhcp_failed(self, id)
    }

    // Deferred work

    /// Queues a task for the next [`run_pending`](Manager::run_pending).
    pub fn schedule(&mut self, task: Task) {
        self.scheduler.schedule(task);
    }

    pub fn pending(&self) -> usize {
        self.scheduler.len()
    }

    /// Runs queued tasks until the queue is empty, including tasks queued
    /// by the tasks themselves. Returns the number of tasks run.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Some(task) = self.scheduler.pop() {
            task(self);
            ran += 1;
        }
        if ran > 0 {
            debug!("ran {} deferred tasks", ran);
        }
        ran
    }
}
