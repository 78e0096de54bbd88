//! Seam towards the device layer.

use crate::api::models::{DeviceId, NetworkId};

/// Operations the core needs from the device that owns a network.
pub trait DeviceLayer {
    /// Object path of the device, used as the parent of its networks.
    fn path(&self, device: DeviceId) -> Option<String>;

    fn increase_connections(&mut self, device: DeviceId);

    fn decrease_connections(&mut self, device: DeviceId);

    /// Sets or clears the network the device currently serves.
    fn set_network(&mut self, device: DeviceId, network: Option<NetworkId>);

    fn set_disconnected(&mut self, device: DeviceId, disconnected: bool);

    /// Asked before a new connection attempt on `device`. Networks of the
    /// device known to the manager are disconnected by the manager itself.
    fn disconnect(&mut self, _device: DeviceId) {}

    /// The set of published networks of the device changed.
    fn networks_changed(&mut self, _device: DeviceId) {}
}
