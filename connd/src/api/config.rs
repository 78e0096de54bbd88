//! Daemon configuration.
//!
//! Configuration values have defaults matching a stock installation and can be
//! adjusted with the `with_*` builder methods or read from the environment.
//!
//! # Example
//!
//! ```rust
//! use connd::{DaemonConfig, PortalConfig};
//! use std::time::Duration;
//!
//! let config = DaemonConfig::new()
//!     .with_portal(PortalConfig::new().with_timeout(Duration::from_secs(30)))
//!     .with_device_filter(vec!["docker0".into()]);
//! assert!(config.is_filtered("docker0"));
//! ```

use serde::Deserialize;
use std::env;
use std::time::Duration;

use crate::types::constants::{env as env_keys, portal};

/// An HTTP proxy endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProxyAddress {
    pub host: String,
    pub port: u16,
}

impl ProxyAddress {
    /// Parses an `http_proxy`-style value.
    ///
    /// The `http://` scheme is optional. Without an explicit port the
    /// conventional proxy port 911 is used. Returns `None` for empty input or
    /// an unparsable port.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        let value = value.strip_prefix("http://").unwrap_or(value);
        let value = value.trim_end_matches('/');
        if value.is_empty() {
            return None;
        }

        match value.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() => Some(Self {
                host: host.to_string(),
                port: port.parse().ok()?,
            }),
            Some(_) => None,
            None => Some(Self {
                host: value.to_string(),
                port: portal::PROXY_PORT,
            }),
        }
    }
}

/// Settings of the captive portal probe.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Host name sent in the `Host` header.
    pub host: String,
    /// Page requested from the host.
    pub page: String,
    /// Literal address connected to when no proxy is configured.
    pub address: String,
    pub port: u16,
    #[serde(with = "secs")]
    pub timeout: Duration,
    pub proxy: Option<ProxyAddress>,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            host: portal::HOST.to_string(),
            page: portal::PAGE.to_string(),
            address: portal::ADDRESS.to_string(),
            port: portal::PORT,
            timeout: portal::timeout(),
            proxy: None,
        }
    }
}

impl PortalConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    #[must_use]
    pub fn with_page(mut self, page: impl Into<String>) -> Self {
        self.page = page.into();
        self
    }

    #[must_use]
    pub fn with_address(mut self, address: impl Into<String>, port: u16) -> Self {
        self.address = address.into();
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_proxy(mut self, proxy: Option<ProxyAddress>) -> Self {
        self.proxy = proxy;
        self
    }
}

/// Top-level configuration of the connection manager.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub portal: PortalConfig,
    /// Interface names that are never turned into devices.
    pub device_filter: Vec<String>,
    /// Logs every WPAD lookup when set.
    pub resolver_debug: bool,
}

impl DaemonConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a configuration from defaults plus environment overrides.
    ///
    /// `http_proxy` sets the portal proxy and `CONND_RESOLV_DEBUG` enables
    /// resolver logging.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(value) = env::var(env_keys::HTTP_PROXY) {
            config.portal.proxy = ProxyAddress::parse(&value);
        }
        if env::var_os(env_keys::RESOLV_DEBUG).is_some() {
            config.resolver_debug = true;
        }
        config
    }

    #[must_use]
    pub fn with_portal(mut self, portal: PortalConfig) -> Self {
        self.portal = portal;
        self
    }

    #[must_use]
    pub fn with_device_filter(mut self, names: Vec<String>) -> Self {
        self.device_filter = names;
        self
    }

    #[must_use]
    pub fn with_resolver_debug(mut self, enabled: bool) -> Self {
        self.resolver_debug = enabled;
        self
    }

    /// Returns true if `ifname` is listed in the device filter.
    pub fn is_filtered(&self, ifname: &str) -> bool {
        self.device_filter.iter().any(|name| name == ifname)
    }
}

mod secs {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}
