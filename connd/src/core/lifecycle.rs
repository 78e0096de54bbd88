//! Connection lifecycle of a network.
//!
//! These functions implement the state machine behind
//! [`Manager`]'s public operations:
//!
//! ```text
//! Idle -> Connecting -> Associating -> Configuration -> Ready
//!            \______________\_______________\--> Failure
//! Ready | Failure --disconnect--> Idle
//! ```
//!
//! Every transition is reported to the service layer through
//! [`ServiceLayer::indicate_state`](crate::ServiceLayer::indicate_state).
//! Device bookkeeping (connection count, current network) is only touched
//! when the network has a device.

use log::{debug, info, warn};

use crate::api::manager::Manager;
use crate::api::models::{
    ConnectOutcome, ConnectionError, DeviceId, IpConfigMethod, NetworkErrorKind, NetworkId,
    NetworkProtocol, NetworkState, NetworkType, PropertyValue, ServiceState,
};
use crate::core::element::{ElementError, ElementKind};
use crate::core::ipconfig::IpConfig;
use crate::core::network::Network;
use crate::core::registry::DriverOps;
use crate::types::constants::{dbus, property};
use crate::Result;

fn transition(network: &mut Network, state: NetworkState) {
    if network.state != state {
        debug!("{} {} -> {}", network.id(), network.state, state);
        network.state = state;
    }
}

fn clear_in_flight(network: &mut Network) {
    network.connecting = false;
    network.associating = false;
}

/// Tells the service wrapping `id` about a state change, if there is one.
fn notify(manager: &mut Manager, id: NetworkId, state: ServiceState) {
    let Ok(network) = manager.networks.lookup(id) else {
        return;
    };
    match manager.services.lookup_from_network(network) {
        Some(service) => manager.services.indicate_state(service, state),
        None => debug!("{} has no service for {:?}", id, state),
    }
}

/// Emits `PropertyChanged` for a published network.
pub(crate) fn signal(manager: &mut Manager, id: NetworkId, name: &str, value: PropertyValue) {
    let Ok(network) = manager.networks.lookup(id) else {
        return;
    };
    if let Some(path) = network.object_path.as_deref() {
        manager.transport.property_changed(path, name, &value);
    }
}

/// Refreshes the property set behind a published network.
pub(crate) fn sync(manager: &mut Manager, id: NetworkId) {
    let Ok(network) = manager.networks.lookup(id) else {
        return;
    };
    let Some(path) = network.object_path.as_deref() else {
        return;
    };
    let parent = network.device.and_then(|device| manager.devices.path(device));
    let snapshot = network.snapshot(parent.as_deref());
    manager.transport.update(path, snapshot);
}

/// Runs `task` on a later scheduler drain while holding a reference to `id`.
pub(crate) fn defer(
    manager: &mut Manager,
    id: NetworkId,
    task: impl FnOnce(&mut Manager) + 'static,
) -> Result<()> {
    manager.networks.retain(id)?;
    manager.scheduler.schedule(Box::new(move |manager: &mut Manager| {
        task(manager);
        if let Err(e) = manager.unref_network(id) {
            debug!("deferred release of {} failed: {}", id, e);
        }
    }));
    Ok(())
}

/// The configuration used to bring the network up: the service's, falling
/// back to the network's own. A missing index is taken from the network.
fn resolve_ipconfig(manager: &mut Manager, id: NetworkId) -> Result<IpConfig> {
    let network = manager.networks.lookup(id)?;
    let from_service = manager
        .services
        .lookup_from_network(network)
        .and_then(|service| manager.services.ipconfig(service));
    let mut ipconfig = from_service
        .or_else(|| network.ipconfig().cloned())
        .unwrap_or_default();
    if ipconfig.index.is_none() {
        ipconfig.index = network.index();
    }
    Ok(ipconfig)
}

pub(crate) fn set_associating(manager: &mut Manager, id: NetworkId, associating: bool) -> Result<()> {
    let network = manager.networks.lookup_mut(id)?;
    debug!("{} associating {}", id, associating);

    if network.associating == associating {
        return Err(ConnectionError::AlreadyInState);
    }
    network.associating = associating;

    if associating {
        network.connecting = false;
        transition(network, NetworkState::Associating);
        notify(manager, id, ServiceState::Association);
    }
    Ok(())
}

/// Records a failure reported by the driver.
///
/// `connecting` is always cleared. An unknown error changes nothing else;
/// an association failure only counts while associating.
pub(crate) fn set_error(manager: &mut Manager, id: NetworkId, kind: NetworkErrorKind) -> Result<()> {
    let network = manager.networks.lookup_mut(id)?;
    debug!("{} error {:?}", id, kind);

    network.connecting = false;

    match kind {
        NetworkErrorKind::Unknown => {
            if network.state == NetworkState::Connecting
                && !network.associating
                && !network.connected
            {
                transition(network, NetworkState::Idle);
            }
        }
        NetworkErrorKind::AssociateFail => {
            if !network.associating {
                return Ok(());
            }
            network.associating = false;
            transition(network, NetworkState::Failure);
            notify(manager, id, ServiceState::Failure);
        }
        NetworkErrorKind::ConfigureFail => {
            transition(network, NetworkState::Failure);
            notify(manager, id, ServiceState::Failure);
        }
    }
    Ok(())
}

fn set_configuration(manager: &mut Manager, id: NetworkId) -> Result<()> {
    let network = manager.networks.lookup_mut(id)?;
    transition(network, NetworkState::Configuration);

    if let Some(device) = network.device {
        if !network.device_accounted {
            network.device_accounted = true;
            manager.devices.increase_connections(device);
        }
        manager.devices.set_network(device, Some(id));
        manager.devices.set_disconnected(device, false);
    }

    notify(manager, id, ServiceState::Configuration);
    Ok(())
}

fn configure_fail(manager: &mut Manager, id: NetworkId) -> ConnectionError {
    if let Err(e) = set_error(manager, id, NetworkErrorKind::ConfigureFail) {
        debug!("{} configure failure not recorded: {}", id, e);
    }
    ConnectionError::ConfigureFail
}

fn connected_manual(manager: &mut Manager, id: NetworkId, ipconfig: &IpConfig) -> Result<()> {
    set_configuration(manager, id)?;

    if let Err(e) = manager.configurator.apply(ipconfig) {
        warn!("{} address configuration failed: {}", id, e);
        return Err(configure_fail(manager, id));
    }

    let network = manager.networks.lookup_mut(id)?;
    network.address_applied = true;
    clear_in_flight(network);
    transition(network, NetworkState::Ready);
    info!("{} ready ({})", id, ipconfig.method);
    notify(manager, id, ServiceState::Ready);
    Ok(())
}

fn connected_dhcp(manager: &mut Manager, id: NetworkId) -> Result<()> {
    let network = manager.networks.lookup_mut(id)?;
    if network.protocol() != NetworkProtocol::Ip {
        debug!("{} cannot run DHCP without IP protocol", id);
        return Err(configure_fail(manager, id));
    }
    network.element_mut().register_child(ElementKind::Dhcp);

    set_configuration(manager, id)?;

    let network = manager.networks.lookup_mut(id)?;
    clear_in_flight(network);
    Ok(())
}

fn disconnected(manager: &mut Manager, id: NetworkId) -> Result<()> {
    let network = manager.networks.lookup_mut(id)?;
    let removed = network.element_mut().unregister_children();
    debug!("{} disconnected, {} children removed", id, removed);

    network.hidden = false;
    let device = network.device;
    let accounted = std::mem::take(&mut network.device_accounted);
    let applied = std::mem::take(&mut network.address_applied);

    if let Some(device) = device {
        manager.devices.set_network(device, None);
        if accounted {
            manager.devices.decrease_connections(device);
        }
    }

    if applied {
        let ipconfig = resolve_ipconfig(manager, id)?;
        if let Err(e) = manager.configurator.clear(&ipconfig) {
            warn!("{} address removal failed: {}", id, e);
        }
    }

    let network = manager.networks.lookup_mut(id)?;
    clear_in_flight(network);
    transition(network, NetworkState::Idle);
    notify(manager, id, ServiceState::Idle);
    Ok(())
}

/// Runs the post-connect or post-disconnect sequence for the current value
/// of `connected`.
pub(crate) fn apply_connected(manager: &mut Manager, id: NetworkId) -> Result<()> {
    if !manager.networks.lookup(id)?.connected {
        return disconnected(manager, id);
    }

    let ipconfig = resolve_ipconfig(manager, id)?;
    debug!("{} method {}", id, ipconfig.method);

    match ipconfig.method {
        IpConfigMethod::Unknown | IpConfigMethod::Off => {
            let network = manager.networks.lookup_mut(id)?;
            clear_in_flight(network);
            transition(network, NetworkState::Ready);
            Ok(())
        }
        IpConfigMethod::Manual | IpConfigMethod::Fixed => connected_manual(manager, id, &ipconfig),
        IpConfigMethod::Dhcp => connected_dhcp(manager, id),
    }
}

/// Drives the `connected` flag.
///
/// A `false` report while an attempt is in flight cancels the attempt. When
/// the network is not published yet, the follow-up sequence runs from the
/// scheduler instead of inline.
pub(crate) fn set_connected(manager: &mut Manager, id: NetworkId, connected: bool) -> Result<()> {
    let network = manager.networks.lookup_mut(id)?;
    debug!("{} connected {}", id, connected);

    if !connected && (network.connecting || network.associating) {
        network
            .element_mut()
            .set_error(Some(ElementError::ConnectFailed));
        if let Err(e) = disconnect(manager, id) {
            debug!("{} cancel failed: {}", id, e);
            let network = manager.networks.lookup_mut(id)?;
            clear_in_flight(network);
            transition(network, NetworkState::Failure);
            notify(manager, id, ServiceState::Failure);
        }
        return Ok(());
    }

    if network.connected == connected {
        return Err(ConnectionError::AlreadyInState);
    }
    network.connected = connected;

    if !network.registered {
        return defer(manager, id, move |manager| {
            if let Err(e) = apply_connected(manager, id) {
                debug!("deferred connected sequence of {} failed: {}", id, e);
            }
        });
    }

    signal(manager, id, property::CONNECTED, connected.into());
    sync(manager, id);
    apply_connected(manager, id)
}

/// Disconnects every other network of `device` that is connected or
/// connecting.
fn disconnect_device(manager: &mut Manager, device: DeviceId, except: NetworkId) {
    manager.devices.disconnect(device);

    let busy: Vec<NetworkId> = manager
        .networks
        .iter()
        .filter(|n| n.device == Some(device) && n.id() != except)
        .filter(|n| n.connected || n.connecting || n.associating)
        .map(Network::id)
        .collect();

    for other in busy {
        if let Err(e) = disconnect(manager, other) {
            debug!("{} did not disconnect: {}", other, e);
        }
    }
}

/// Starts a connection attempt through the bound driver.
///
/// The flow:
/// 1. Reject networks that are connected, busy or cannot connect
/// 2. Disconnect whatever the device is serving
/// 3. Hand the network to the driver
/// 4. Either wait for association or run the post-connect sequence
///
/// Preconditions are checked before anything is mutated.
pub(crate) fn connect(manager: &mut Manager, id: NetworkId) -> Result<ConnectOutcome> {
    let network = manager.networks.lookup(id)?;
    if network.connected {
        return Err(ConnectionError::AlreadyConnected);
    }
    if network.connecting || network.associating {
        return Err(ConnectionError::AlreadyInProgress);
    }
    let driver = network.driver.clone().ok_or(ConnectionError::NoDriver)?;
    if !driver.operations().contains(DriverOps::CONNECT) {
        return Err(ConnectionError::Unsupported);
    }

    if let Some(device) = network.device {
        disconnect_device(manager, device, id);
    }

    let network = manager.networks.lookup_mut(id)?;
    debug!("{} connecting with driver {}", id, driver.name());
    network.connecting = true;
    network.element_mut().set_error(None);
    transition(network, NetworkState::Connecting);

    match driver.connect(network) {
        Ok(ConnectOutcome::InProgress) => {
            if let Err(e) = set_associating(manager, id, true) {
                debug!("{} associating: {}", id, e);
            }
            Ok(ConnectOutcome::InProgress)
        }
        Ok(ConnectOutcome::Connected) => {
            network.connected = true;
            if network.registered {
                signal(manager, id, property::CONNECTED, true.into());
                sync(manager, id);
            }
            apply_connected(manager, id)?;
            Ok(ConnectOutcome::Connected)
        }
        Err(e) => {
            warn!("{} connect failed: {}", id, e);
            network.hidden = false;
            clear_in_flight(network);
            transition(network, NetworkState::Failure);
            notify(manager, id, ServiceState::Failure);
            Err(ConnectionError::AssociateFail)
        }
    }
}

/// Tears a connection or an attempt down through the bound driver.
pub(crate) fn disconnect(manager: &mut Manager, id: NetworkId) -> Result<()> {
    let network = manager.networks.lookup_mut(id)?;
    if !network.connected && !network.connecting && !network.associating {
        return Err(ConnectionError::NotConnected);
    }
    let driver = network.driver.clone().ok_or(ConnectionError::NoDriver)?;
    if !driver.operations().contains(DriverOps::DISCONNECT) {
        return Err(ConnectionError::Unsupported);
    }

    debug!("{} disconnecting with driver {}", id, driver.name());
    network.connecting = false;
    driver.disconnect(network)?;
    network.associating = false;

    match set_connected(manager, id, false) {
        Err(ConnectionError::AlreadyInState) => disconnected(manager, id),
        other => other,
    }
}

/// DHCP acquired a lease for the network.
pub(crate) fn dhcp_bound(manager: &mut Manager, id: NetworkId) -> Result<()> {
    let network = manager.networks.lookup_mut(id)?;
    if !network.connected {
        return Err(ConnectionError::NotConnected);
    }
    clear_in_flight(network);
    transition(network, NetworkState::Ready);
    info!("{} ready (dhcp)", id);
    notify(manager, id, ServiceState::Ready);
    Ok(())
}

/// DHCP gave up. The lease child is dropped and the link is taken down.
pub(crate) fn dhcp_failed(manager: &mut Manager, id: NetworkId) -> Result<()> {
    let network = manager.networks.lookup_mut(id)?;
    warn!("{} DHCP failed", id);
    network.element_mut().set_error(Some(ElementError::DhcpFailed));

    if network.connected {
        network.element_mut().unregister_children();
        if let Some(device) = network.device {
            manager.devices.set_disconnected(device, true);
        }
    }

    let network = manager.networks.lookup(id)?;
    let can_disconnect = network
        .driver
        .as_ref()
        .is_some_and(|d| d.operations().contains(DriverOps::DISCONNECT));

    if can_disconnect {
        match disconnect(manager, id) {
            Err(ConnectionError::NotConnected) => Ok(()),
            other => other,
        }
    } else {
        let network = manager.networks.lookup_mut(id)?;
        if !network.connected {
            return Ok(());
        }
        network.connected = false;
        signal(manager, id, property::CONNECTED, false.into());
        sync(manager, id);
        disconnected(manager, id)
    }
}

fn groupable(network_type: NetworkType) -> bool {
    !matches!(network_type, NetworkType::Unknown | NetworkType::Vendor)
}

/// Binds a driver and publishes the network.
pub(crate) fn register_network(manager: &mut Manager, id: NetworkId) -> Result<()> {
    let network = manager.networks.lookup_mut(id)?;
    if network.registered {
        return Err(ConnectionError::AlreadyInState);
    }

    let driver = manager.drivers.bind(network)?;
    network.driver = Some(driver.clone());

    let parent = network.device.and_then(|device| manager.devices.path(device));
    let path = network.path(parent.as_deref().unwrap_or(dbus::ROOT_PATH));
    let snapshot = network.snapshot(parent.as_deref());

    if let Err(e) = manager.transport.register(&path, snapshot) {
        warn!("{} publication at {} failed: {}", id, path, e);
        if driver.operations().contains(DriverOps::REMOVE) {
            driver.remove(network);
        }
        network.driver = None;
        return Err(e);
    }

    debug!("{} registered at {} with driver {}", id, path, driver.name());
    network.registered = true;
    network.object_path = Some(path);

    if let Some(device) = network.device {
        manager.devices.networks_changed(device);
    }
    if network.group.is_some() && groupable(network.network_type()) {
        manager.services.add_network(network);
    }
    Ok(())
}

/// Unpublishes the network and releases its driver.
pub(crate) fn unregister_network(manager: &mut Manager, id: NetworkId) -> Result<()> {
    let network = manager.networks.lookup_mut(id)?;
    if !network.registered {
        return Err(ConnectionError::AlreadyInState);
    }

    if network.group.take().is_some() && groupable(network.network_type()) {
        manager.services.remove_network(id);
    }
    if let Some(path) = network.object_path.take() {
        manager.transport.unregister(&path);
    }
    network.registered = false;

    if let Some(driver) = network.driver.take() {
        if driver.operations().contains(DriverOps::REMOVE) {
            driver.remove(network);
        }
    }
    if let Some(device) = network.device {
        manager.devices.networks_changed(device);
    }
    debug!("{} unregistered", id);
    Ok(())
}

/// Moves the network between profile groups.
pub(crate) fn set_group(manager: &mut Manager, id: NetworkId, group: Option<&str>) -> Result<()> {
    let network = manager.networks.lookup_mut(id)?;
    if !groupable(network.network_type()) {
        return Ok(());
    }

    if network.group.as_deref() == group {
        if group.is_some() {
            manager.services.update_network(network);
        }
        return Ok(());
    }

    if network.group.take().is_some() {
        manager.services.remove_network(id);
    }
    network.group = group.map(str::to_string);
    if network.group.is_some() {
        manager.services.add_network(network);
    }
    Ok(())
}

/// Sets the interface index and keeps the service's IP configuration in
/// step with it.
pub(crate) fn set_index(manager: &mut Manager, id: NetworkId, index: i32) -> Result<()> {
    let network = manager.networks.lookup_mut(id)?;
    let had_index = network.index().is_some();

    if let Some(service) = manager.services.lookup_from_network(network) {
        if !had_index && manager.services.ipconfig(service).is_none() {
            manager.services.create_ipconfig(service, index);
        } else {
            manager.services.set_ipconfig_index(service, index);
        }
    }

    let network = manager.networks.lookup_mut(id)?;
    network.set_index_raw(Some(index));
    network.ipconfig_mut().index = Some(index);
    Ok(())
}

pub(crate) fn set_method(manager: &mut Manager, id: NetworkId, method: IpConfigMethod) -> Result<()> {
    let network = manager.networks.lookup_mut(id)?;
    network.ipconfig_mut().method = method;

    let Some(service) = manager.services.lookup_from_network(network) else {
        return Ok(());
    };
    if manager.services.ipconfig(service).is_some() {
        manager.services.set_method(service, method);
    }
    Ok(())
}
