//! Core types shared by the network entity, drivers and collaborators.
//!
//! Identifiers, lifecycle states, property values and the crate error type
//! live here so that driver and collaborator implementations only need a
//! single import path.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use thiserror::Error;

/// Stable handle of a network inside the manager arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NetworkId(pub(crate) u64);

impl NetworkId {
    /// Returns the raw numeric value of this handle.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl Display for NetworkId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "network#{}", self.0)
    }
}

/// Identifier of a device owned by the device layer.
///
/// Networks keep this as a weak back-reference; it is only ever used to look
/// the device up again through [`DeviceLayer`](crate::DeviceLayer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub u32);

/// Identifier of a service owned by the service layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceId(pub u32);

/// Link technology of a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum NetworkType {
    #[default]
    Unknown,
    Ethernet,
    Wifi,
    Wimax,
    BluetoothPan,
    BluetoothDun,
    Cellular,
    Vendor,
}

impl NetworkType {
    /// Returns the string form exposed as the `Type` property.
    ///
    /// Unknown and vendor networks have no public type string.
    pub fn as_str(self) -> Option<&'static str> {
        match self {
            Self::Ethernet => Some("ethernet"),
            Self::Wifi => Some("wifi"),
            Self::Wimax => Some("wimax"),
            Self::BluetoothPan | Self::BluetoothDun => Some("bluetooth"),
            Self::Cellular => Some("cellular"),
            Self::Unknown | Self::Vendor => None,
        }
    }
}

impl Display for NetworkType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(s) => write!(f, "{s}"),
            None if *self == Self::Vendor => write!(f, "vendor"),
            None => write!(f, "unknown"),
        }
    }
}

/// Layer-3 protocol carried by a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NetworkProtocol {
    #[default]
    Unknown,
    Ip,
}

/// Lifecycle state of a single network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NetworkState {
    #[default]
    Idle,
    Connecting,
    Associating,
    Configuration,
    Ready,
    Failure,
}

impl Display for NetworkState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Connecting => write!(f, "connecting"),
            Self::Associating => write!(f, "associating"),
            Self::Configuration => write!(f, "configuration"),
            Self::Ready => write!(f, "ready"),
            Self::Failure => write!(f, "failure"),
        }
    }
}

/// State reported to the owning service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceState {
    Idle,
    Association,
    Configuration,
    Ready,
    Failure,
}

impl Display for ServiceState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Association => write!(f, "association"),
            Self::Configuration => write!(f, "configuration"),
            Self::Ready => write!(f, "ready"),
            Self::Failure => write!(f, "failure"),
        }
    }
}

/// How the IP layer of a connected network is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IpConfigMethod {
    #[default]
    Unknown,
    Off,
    Fixed,
    Manual,
    Dhcp,
}

impl Display for IpConfigMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Off => write!(f, "off"),
            Self::Fixed => write!(f, "fixed"),
            Self::Manual => write!(f, "manual"),
            Self::Dhcp => write!(f, "dhcp"),
        }
    }
}

/// Failure class a driver reports through `set_error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkErrorKind {
    Unknown,
    AssociateFail,
    ConfigureFail,
}

/// Outcome of a successful `connect` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// The driver finished synchronously and post-connect configuration ran.
    Connected,
    /// The driver is still associating; completion arrives through
    /// `set_connected` or `set_error`.
    InProgress,
}

/// Result of dropping a network reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Released {
    /// Other holders remain; carries the remaining count.
    Alive(usize),
    /// The last reference was dropped and the network was destroyed.
    Destroyed,
}

/// Access level of a transport caller reading properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Privilege {
    #[default]
    Public,
    /// May read secrets such as `WiFi.Passphrase`.
    Secret,
}

/// A typed property value stored in an element or sent over the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyValue {
    String(String),
    Bool(bool),
    U8(u8),
    U16(u16),
    Blob(Vec<u8>),
    ObjectPath(String),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::ObjectPath(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> Option<u8> {
        match self {
            Self::U8(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u16(&self) -> Option<u16> {
        match self {
            Self::U16(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            Self::Blob(b) => Some(b),
            _ => None,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<u8> for PropertyValue {
    fn from(v: u8) -> Self {
        Self::U8(v)
    }
}

impl From<u16> for PropertyValue {
    fn from(v: u16) -> Self {
        Self::U16(v)
    }
}

impl From<Vec<u8>> for PropertyValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Blob(v)
    }
}

/// Errors returned by network, driver and kernel operations.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The requested state already holds. Callers usually treat this as success.
    #[error("already in requested state")]
    AlreadyInState,

    /// `connect` was called on a connected network.
    #[error("network is already connected")]
    AlreadyConnected,

    /// `connect` was called while an attempt is in flight.
    #[error("connection attempt already in progress")]
    AlreadyInProgress,

    /// `disconnect` was called on an idle network.
    #[error("network is not connected")]
    NotConnected,

    /// The network has no bound driver.
    #[error("no driver bound to network")]
    NoDriver,

    /// The bound driver does not implement the requested operation.
    #[error("operation not supported by driver")]
    Unsupported,

    /// No registered driver accepted the network.
    #[error("no driver accepted the network")]
    NoDevice,

    /// An argument failed validation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Association with the network failed.
    #[error("association failed")]
    AssociateFail,

    /// IP configuration of the network failed.
    #[error("configuration failed")]
    ConfigureFail,

    /// The handle does not name a live network.
    #[error("unknown network: {0}")]
    UnknownNetwork(NetworkId),

    /// The transport refused to publish an object.
    #[error("failed to publish {0}")]
    Publish(String),

    /// A kernel request failed.
    #[error("{context}: {source}")]
    Kernel {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// An address string could not be parsed.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// A D-Bus communication error occurred.
    #[error("D-Bus error: {0}")]
    Dbus(#[from] zbus::Error),
}

impl ConnectionError {
    /// Returns true for the idempotence signal [`ConnectionError::AlreadyInState`].
    pub fn is_already(&self) -> bool {
        matches!(self, Self::AlreadyInState)
    }

    /// Returns the OS error code of a kernel failure, if any.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::Kernel { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }

    pub(crate) fn kernel(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Kernel {
            context: context.into(),
            source,
        }
    }
}
