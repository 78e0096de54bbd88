//! Constants for property keys, kernel request codes and probe defaults.
//!
//! The property keys form the fixed namespace that networks expose over the
//! transport. The kernel values are the Linux ioctl request numbers and
//! routing flags used by the `inet` layer.

/// Well-known network property keys.
pub mod property {
    pub const TYPE: &str = "Type";
    pub const NAME: &str = "Name";
    pub const ADDRESS: &str = "Address";
    pub const NODE: &str = "Node";
    pub const DEVICE: &str = "Device";
    pub const CONNECTED: &str = "Connected";
    pub const STRENGTH: &str = "Strength";
    pub const FREQUENCY: &str = "Frequency";
    pub const ROAMING: &str = "Roaming";
    pub const WIFI_SSID: &str = "WiFi.SSID";
    pub const WIFI_MODE: &str = "WiFi.Mode";
    pub const WIFI_CHANNEL: &str = "WiFi.Channel";
    pub const WIFI_SECURITY: &str = "WiFi.Security";
    pub const WIFI_PASSPHRASE: &str = "WiFi.Passphrase";
    pub const WIFI_EAP: &str = "WiFi.EAP";
    pub const WIFI_IDENTITY: &str = "WiFi.Identity";
    pub const WIFI_CA_CERT_FILE: &str = "WiFi.CACertFile";
    pub const WIFI_CLIENT_CERT_FILE: &str = "WiFi.ClientCertFile";
    pub const WIFI_PRIVATE_KEY_FILE: &str = "WiFi.PrivateKeyFile";
    pub const WIFI_PRIVATE_KEY_PASSPHRASE: &str = "WiFi.PrivateKeyPassphrase";
    pub const WIFI_PHASE2: &str = "WiFi.Phase2";
}

/// Values with special meaning inside property strings.
pub mod wifi {
    /// Mode string of an ad-hoc (IBSS) network.
    pub const MODE_ADHOC: &str = "adhoc";
    /// Security string that enables the `WiFi.EAP` property.
    pub const SECURITY_8021X: &str = "ieee8021x";
    /// Strength below which a non-zero signal is considered weak.
    pub const WEAK_STRENGTH: u8 = 20;
}

/// Driver priorities.
pub mod priority {
    pub const DEFAULT: i32 = 0;
}

/// D-Bus names used by the transport.
pub mod dbus {
    pub const NETWORK_INTERFACE: &str = "net.connman.Network";
    pub const ROOT_PATH: &str = "/net/connman";
    /// Unix uid allowed to read secret properties.
    pub const PRIVILEGED_UID: u32 = 0;
}

/// Captive portal probe defaults.
pub mod portal {
    use std::time::Duration;

    pub const HOST: &str = "connman.net";
    pub const PAGE: &str = "/";
    pub const ADDRESS: &str = "174.36.13.145";
    pub const PORT: u16 = 80;
    pub const PROXY_PORT: u16 = 911;
    pub const USER_AGENT: &str = "connd";

    /// Number of response header lines searched for a session cookie.
    pub const HEADER_LINES: usize = 12;

    /// Only the first chunk of the reply is read and classified.
    pub const READ_BUFFER: usize = 8192;

    const TIMEOUT_SECS: u64 = 120;

    /// Returns the default probe timeout.
    pub fn timeout() -> Duration {
        Duration::from_secs(TIMEOUT_SECS)
    }
}

/// WPAD discovery.
pub mod wpad {
    pub const HOST_PREFIX: &str = "wpad.";
    pub const URL_SUFFIX: &str = "/wpad.dat";
    /// Default port handed to the system resolver.
    pub const LOOKUP_PORT: u16 = 80;
}

/// Environment variables read by [`DaemonConfig::from_env`](crate::DaemonConfig::from_env).
pub mod env {
    pub const HTTP_PROXY: &str = "http_proxy";
    pub const RESOLV_DEBUG: &str = "CONND_RESOLV_DEBUG";
}

/// sysfs locations used to classify interfaces.
pub mod sysfs {
    pub const NET_CLASS: &str = "/sys/class/net";
    pub const PHY80211: &str = "phy80211";
    pub const WIMAX: &str = "wimax";
    pub const BRIDGE: &str = "bridge";
    pub const BONDING: &str = "bonding";
}

/// Linux socket ioctl request codes and routing flags.
pub mod kernel {
    pub const SIOCGIFNAME: u64 = 0x8910;
    pub const SIOCADDRT: u64 = 0x890B;
    pub const SIOCDELRT: u64 = 0x890C;
    pub const SIOCGIFFLAGS: u64 = 0x8913;
    pub const SIOCSIFFLAGS: u64 = 0x8914;
    pub const SIOCGIFADDR: u64 = 0x8915;
    pub const SIOCSIFADDR: u64 = 0x8916;
    pub const SIOCSIFBRDADDR: u64 = 0x891A;
    pub const SIOCGIFNETMASK: u64 = 0x891B;
    pub const SIOCSIFNETMASK: u64 = 0x891C;
    pub const SIOCDIFADDR: u64 = 0x8936;
    pub const SIOCGIFHWADDR: u64 = 0x8927;
    pub const SIOCGIFINDEX: u64 = 0x8933;
    pub const SIOCGIWNAME: u64 = 0x8B01;

    pub const RTF_UP: u16 = 0x0001;
    pub const RTF_GATEWAY: u16 = 0x0002;
    pub const RTF_HOST: u16 = 0x0004;

    pub const ARPHRD_ETHER: u16 = 1;
    pub const ARPHRD_LOOPBACK: u16 = 772;

    /// Metric used for IPv6 routes installed by the daemon.
    pub const IPV6_ROUTE_METRIC: u32 = 1;
}
