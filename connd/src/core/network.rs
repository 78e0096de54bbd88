//! The network entity.
//!
//! A [`Network`] is one connectable candidate discovered by a device: an
//! access point, an Ethernet link, a cellular context. It owns its property
//! element, its Wi-Fi association parameters and its IP configuration, and it
//! carries the in-flight flags that the lifecycle functions in
//! [`lifecycle`](crate::core::lifecycle) drive.
//!
//! Property setters here only touch the entity and its bound driver. Anything
//! that involves the device, service or transport goes through
//! [`Manager`](crate::Manager).

use log::debug;
use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::api::models::{
    DeviceId, NetworkId, NetworkProtocol, NetworkState, NetworkType, Privilege, PropertyValue,
};
use crate::core::element::{Element, ElementKind};
use crate::core::ipconfig::IpConfig;
use crate::core::registry::{DriverOps, NetworkDriver};
use crate::core::transport::PropertySnapshot;
use crate::types::constants::{property, wifi};
use crate::util::utils::{format_hwaddr, path_component};
use crate::Result;

/// Association parameters of a Wi-Fi network.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WifiParams {
    pub ssid: Vec<u8>,
    pub mode: Option<String>,
    pub channel: u16,
    pub security: Option<String>,
    pub passphrase: Option<String>,
    pub eap: Option<String>,
    pub identity: Option<String>,
    pub ca_cert_path: Option<String>,
    pub client_cert_path: Option<String>,
    pub private_key_path: Option<String>,
    pub private_key_passphrase: Option<String>,
    pub phase2: Option<String>,
}

impl WifiParams {
    fn slot(&mut self, key: &str) -> Option<&mut Option<String>> {
        match key {
            property::WIFI_MODE => Some(&mut self.mode),
            property::WIFI_SECURITY => Some(&mut self.security),
            property::WIFI_PASSPHRASE => Some(&mut self.passphrase),
            property::WIFI_EAP => Some(&mut self.eap),
            property::WIFI_IDENTITY => Some(&mut self.identity),
            property::WIFI_CA_CERT_FILE => Some(&mut self.ca_cert_path),
            property::WIFI_CLIENT_CERT_FILE => Some(&mut self.client_cert_path),
            property::WIFI_PRIVATE_KEY_FILE => Some(&mut self.private_key_path),
            property::WIFI_PRIVATE_KEY_PASSPHRASE => Some(&mut self.private_key_passphrase),
            property::WIFI_PHASE2 => Some(&mut self.phase2),
            _ => None,
        }
    }

    fn get(&self, key: &str) -> Option<Option<&str>> {
        let value = match key {
            property::WIFI_MODE => &self.mode,
            property::WIFI_SECURITY => &self.security,
            property::WIFI_PASSPHRASE => &self.passphrase,
            property::WIFI_EAP => &self.eap,
            property::WIFI_IDENTITY => &self.identity,
            property::WIFI_CA_CERT_FILE => &self.ca_cert_path,
            property::WIFI_CLIENT_CERT_FILE => &self.client_cert_path,
            property::WIFI_PRIVATE_KEY_FILE => &self.private_key_path,
            property::WIFI_PRIVATE_KEY_PASSPHRASE => &self.private_key_passphrase,
            property::WIFI_PHASE2 => &self.phase2,
            _ => return None,
        };
        Some(value.as_deref())
    }
}

pub struct Network {
    id: NetworkId,
    identifier: String,
    network_type: NetworkType,
    protocol: NetworkProtocol,
    pub(crate) state: NetworkState,
    element: Element,

    available: bool,
    pub(crate) connected: bool,
    pub(crate) connecting: bool,
    pub(crate) associating: bool,
    pub(crate) hidden: bool,
    roaming: bool,
    pub(crate) registered: bool,
    pub(crate) object_path: Option<String>,
    /// Set while this network is counted in its device's active connections.
    pub(crate) device_accounted: bool,
    /// Set while a static address from the IP configuration is applied.
    pub(crate) address_applied: bool,

    strength: u8,
    frequency: u16,
    address: Option<String>,
    name: Option<String>,
    node: Option<String>,
    pub(crate) group: Option<String>,
    wifi: WifiParams,

    ipconfig: Option<IpConfig>,
    pub(crate) driver: Option<Rc<dyn NetworkDriver>>,
    driver_data: Option<Box<dyn Any>>,
    pub(crate) device: Option<DeviceId>,
}

impl fmt::Debug for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Network")
            .field("id", &self.id)
            .field("identifier", &self.identifier)
            .field("type", &self.network_type)
            .field("state", &self.state)
            .field("connected", &self.connected)
            .field("connecting", &self.connecting)
            .field("associating", &self.associating)
            .field("driver", &self.driver.as_ref().map(|d| d.name().to_string()))
            .finish_non_exhaustive()
    }
}

impl Network {
    pub(crate) fn new(
        id: NetworkId,
        identifier: String,
        network_type: NetworkType,
        hidden: bool,
    ) -> Self {
        let mut element = Element::new(ElementKind::Network, identifier.clone());
        if let Some(type_str) = network_type.as_str() {
            element.set(property::TYPE, type_str.into());
        }
        element.set(property::STRENGTH, PropertyValue::U8(0));

        Self {
            id,
            identifier,
            network_type,
            protocol: NetworkProtocol::Unknown,
            state: NetworkState::Idle,
            element,
            available: false,
            connected: false,
            connecting: false,
            associating: false,
            hidden,
            roaming: false,
            registered: false,
            object_path: None,
            device_accounted: false,
            address_applied: false,
            strength: 0,
            frequency: 0,
            address: None,
            name: None,
            node: None,
            group: None,
            wifi: WifiParams::default(),
            ipconfig: None,
            driver: None,
            driver_data: None,
            device: None,
        }
    }

    pub fn id(&self) -> NetworkId {
        self.id
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn network_type(&self) -> NetworkType {
        self.network_type
    }

    pub fn protocol(&self) -> NetworkProtocol {
        self.protocol
    }

    pub fn set_protocol(&mut self, protocol: NetworkProtocol) {
        self.protocol = protocol;
    }

    pub fn state(&self) -> NetworkState {
        self.state
    }

    pub fn index(&self) -> Option<i32> {
        self.element.index()
    }

    pub(crate) fn set_index_raw(&mut self, index: Option<i32>) {
        self.element.set_index(index);
    }

    pub fn element(&self) -> &Element {
        &self.element
    }

    pub fn element_mut(&mut self) -> &mut Element {
        &mut self.element
    }

    pub fn device(&self) -> Option<DeviceId> {
        self.device
    }

    /// Returns true if the network is available. Hidden networks always are.
    pub fn is_available(&self) -> bool {
        self.hidden || self.available
    }

    /// Marks the network as seen or gone.
    ///
    /// Returns [`AlreadyInState`](crate::ConnectionError::AlreadyInState) when
    /// the flag does not change.
    pub fn set_available(&mut self, available: bool) -> Result<()> {
        debug!("{} available {}", self.id, available);
        if self.available == available {
            return Err(crate::ConnectionError::AlreadyInState);
        }
        self.available = available;
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_connecting(&self) -> bool {
        self.connecting
    }

    pub fn is_associating(&self) -> bool {
        self.associating
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    /// Transport path while the network is published.
    pub fn object_path(&self) -> Option<&str> {
        self.object_path.as_deref()
    }

    pub fn is_roaming(&self) -> bool {
        self.roaming
    }

    pub fn strength(&self) -> u8 {
        self.strength
    }

    pub fn frequency(&self) -> u16 {
        self.frequency
    }

    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn node(&self) -> Option<&str> {
        self.node.as_deref()
    }

    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    pub fn wifi(&self) -> &WifiParams {
        &self.wifi
    }

    /// A weak network is an ad-hoc Wi-Fi cell or one with a faint but
    /// non-zero signal.
    pub fn is_weak(&self) -> bool {
        if self.network_type != NetworkType::Wifi {
            return false;
        }
        if self.wifi.mode.as_deref() == Some(wifi::MODE_ADHOC) {
            return true;
        }
        self.strength > 0 && self.strength < wifi::WEAK_STRENGTH
    }

    pub fn set_name(&mut self, name: &str) {
        debug!("{} name {}", self.id, name);
        self.name = Some(name.to_string());
        self.element.set(property::NAME, name.into());
    }

    pub fn set_strength(&mut self, strength: u8) {
        debug!("{} strength {}", self.id, strength);
        self.strength = strength;
        self.element.set(property::STRENGTH, PropertyValue::U8(strength));
    }

    pub fn set_roaming(&mut self, roaming: bool) {
        debug!("{} roaming {}", self.id, roaming);
        self.roaming = roaming;
        self.element.set(property::ROAMING, PropertyValue::Bool(roaming));
    }

    /// Sets the hardware address from its binary form.
    ///
    /// Only six byte addresses are accepted; anything else leaves the stored
    /// address untouched.
    pub fn set_address(&mut self, bytes: &[u8]) -> Result<()> {
        let address = format_hwaddr(bytes)?;
        debug!("{} address {}", self.id, address);
        self.element
            .set(property::ADDRESS, PropertyValue::String(address.clone()));
        self.address = Some(address);
        Ok(())
    }

    /// Sets a string property.
    ///
    /// Well-known keys update the typed field as well as the element. Any key
    /// other than `Name` is then passed to the bound driver's `setup` hook.
    pub fn set_string(&mut self, key: &str, value: &str) -> Result<()> {
        debug!("{} key {} value {}", self.id, key, redact(key, value));

        if key == property::NAME {
            self.set_name(value);
            return Ok(());
        }

        match key {
            property::ADDRESS => self.address = Some(value.to_string()),
            property::NODE => self.node = Some(value.to_string()),
            _ => {
                if let Some(slot) = self.wifi.slot(key) {
                    *slot = Some(value.to_string());
                }
            }
        }
        self.element.set(key, value.into());

        self.run_setup(key)
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        match key {
            property::ADDRESS => self.address.as_deref(),
            property::NAME => self.name.as_deref(),
            property::NODE => self.node.as_deref(),
            _ => match self.wifi.get(key) {
                Some(value) => value,
                None => self.element.get(key).and_then(PropertyValue::as_str),
            },
        }
    }

    pub fn set_bool(&mut self, key: &str, value: bool) {
        if key == property::ROAMING {
            self.set_roaming(value);
            return;
        }
        self.element.set(key, PropertyValue::Bool(value));
    }

    pub fn get_bool(&self, key: &str) -> bool {
        if key == property::ROAMING {
            return self.roaming;
        }
        self.element
            .get(key)
            .and_then(PropertyValue::as_bool)
            .unwrap_or(false)
    }

    pub fn set_u8(&mut self, key: &str, value: u8) {
        if key == property::STRENGTH {
            self.set_strength(value);
            return;
        }
        self.element.set(key, PropertyValue::U8(value));
    }

    pub fn get_u8(&self, key: &str) -> u8 {
        if key == property::STRENGTH {
            return self.strength;
        }
        self.element
            .get(key)
            .and_then(PropertyValue::as_u8)
            .unwrap_or(0)
    }

    /// Sets a 16-bit property. `Frequency` and `WiFi.Channel` update the
    /// typed fields; every key is mirrored into the element.
    pub fn set_u16(&mut self, key: &str, value: u16) {
        debug!("{} key {} value {}", self.id, key, value);
        match key {
            property::FREQUENCY => self.frequency = value,
            property::WIFI_CHANNEL => self.wifi.channel = value,
            _ => {}
        }
        self.element.set(key, PropertyValue::U16(value));
    }

    pub fn get_u16(&self, key: &str) -> u16 {
        match key {
            property::FREQUENCY => self.frequency,
            property::WIFI_CHANNEL => self.wifi.channel,
            _ => self
                .element
                .get(key)
                .and_then(PropertyValue::as_u16)
                .unwrap_or(0),
        }
    }

    pub fn set_blob(&mut self, key: &str, data: &[u8]) -> Result<()> {
        debug!("{} key {} size {}", self.id, key, data.len());
        match key {
            property::ADDRESS => return self.set_address(data),
            property::WIFI_SSID => self.wifi.ssid = data.to_vec(),
            _ => {}
        }
        self.element.set(key, PropertyValue::Blob(data.to_vec()));
        Ok(())
    }

    pub fn get_blob(&self, key: &str) -> Option<&[u8]> {
        if key == property::WIFI_SSID {
            return Some(&self.wifi.ssid);
        }
        self.element.get(key).and_then(PropertyValue::as_blob)
    }

    pub fn ipconfig(&self) -> Option<&IpConfig> {
        self.ipconfig.as_ref()
    }

    /// Hands an IP configuration over to the network.
    pub fn set_ipconfig(&mut self, ipconfig: IpConfig) {
        self.ipconfig = Some(ipconfig);
    }

    pub(crate) fn ipconfig_mut(&mut self) -> &mut IpConfig {
        self.ipconfig.get_or_insert_with(IpConfig::default)
    }

    pub fn driver(&self) -> Option<&Rc<dyn NetworkDriver>> {
        self.driver.as_ref()
    }

    /// Returns the driver's private data if it has the requested type.
    pub fn driver_data<T: Any>(&self) -> Option<&T> {
        self.driver_data.as_ref()?.downcast_ref()
    }

    pub fn driver_data_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.driver_data.as_mut()?.downcast_mut()
    }

    pub fn set_driver_data<T: Any>(&mut self, data: T) {
        self.driver_data = Some(Box::new(data));
    }

    pub fn take_driver_data(&mut self) -> Option<Box<dyn Any>> {
        self.driver_data.take()
    }

    /// Object path of this network below `parent`.
    pub fn path(&self, parent: &str) -> String {
        format!(
            "{}/{}",
            parent.trim_end_matches('/'),
            path_component(&self.identifier)
        )
    }

    /// Builds the property set published over the transport.
    pub fn snapshot(&self, device_path: Option<&str>) -> PropertySnapshot {
        let mut snapshot = PropertySnapshot::default();

        if let Some(path) = device_path {
            snapshot.insert(property::DEVICE, PropertyValue::ObjectPath(path.to_string()));
        }
        if let Some(address) = &self.address {
            snapshot.insert(property::ADDRESS, address.as_str().into());
        }
        if let Some(name) = &self.name {
            snapshot.insert(property::NAME, name.as_str().into());
        }
        snapshot.insert(property::CONNECTED, self.connected.into());
        if self.strength > 0 {
            snapshot.insert(property::STRENGTH, self.strength.into());
        }
        if self.frequency > 0 {
            snapshot.insert(property::FREQUENCY, self.frequency.into());
        }
        if !self.wifi.ssid.is_empty() {
            snapshot.insert(property::WIFI_SSID, self.wifi.ssid.clone().into());
        }
        if let Some(mode) = &self.wifi.mode {
            snapshot.insert(property::WIFI_MODE, mode.as_str().into());
        }
        if self.wifi.channel > 0 {
            snapshot.insert(property::WIFI_CHANNEL, self.wifi.channel.into());
        }
        if let Some(security) = &self.wifi.security {
            snapshot.insert(property::WIFI_SECURITY, security.as_str().into());
            if security == wifi::SECURITY_8021X {
                if let Some(eap) = &self.wifi.eap {
                    snapshot.insert(property::WIFI_EAP, eap.as_str().into());
                }
            }
        }
        if let Some(passphrase) = &self.wifi.passphrase {
            snapshot.insert_secret(property::WIFI_PASSPHRASE, passphrase.as_str().into());
        }

        snapshot
    }

    /// Properties as seen by a caller with the given privilege.
    pub fn properties(
        &self,
        device_path: Option<&str>,
        privilege: Privilege,
    ) -> Vec<(String, PropertyValue)> {
        self.snapshot(device_path).to_properties(privilege)
    }

    /// Drops everything the network owns. Called once, on final release.
    pub(crate) fn release(&mut self) {
        self.ipconfig = None;
        self.driver_data = None;
        self.driver = None;
        self.device = None;
        self.wifi = WifiParams::default();
        self.address = None;
        self.name = None;
        self.node = None;
        self.group = None;
        self.element.unregister_children();
    }

    fn run_setup(&mut self, key: &str) -> Result<()> {
        let Some(driver) = self.driver.clone() else {
            return Ok(());
        };
        if !driver.operations().contains(DriverOps::SETUP) {
            return Ok(());
        }
        driver.setup(self, key)
    }
}

fn redact<'a>(key: &str, value: &'a str) -> &'a str {
    match key {
        property::WIFI_PASSPHRASE | property::WIFI_PRIVATE_KEY_PASSPHRASE => "<hidden>",
        _ => value,
    }
}
