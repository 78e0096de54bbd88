//! Utility functions for address formatting and subnet arithmetic.
//!
//! Provides helpers shared by the network entity and the kernel layer:
//! hardware address formatting, IPv4 prefix math and object path encoding.

use std::fmt::Write;
use std::net::Ipv4Addr;

use crate::api::models::ConnectionError;
use crate::Result;

/// Length of an Ethernet-style hardware address.
pub(crate) const HWADDR_LEN: usize = 6;

/// Formats a hardware address as upper-case colon separated octets.
///
/// Returns `InvalidArgument` unless `bytes` is exactly six octets long.
pub fn format_hwaddr(bytes: &[u8]) -> Result<String> {
    if bytes.len() != HWADDR_LEN {
        return Err(ConnectionError::InvalidArgument(format!(
            "hardware address must be {HWADDR_LEN} bytes, got {}",
            bytes.len()
        )));
    }

    Ok(bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(":"))
}

/// Builds a lower-case hex identity string, e.g. `wifi_0011223344aa`.
pub fn hwaddr_ident(bytes: &[u8], prefix: Option<&str>) -> String {
    let mut ident = String::with_capacity(prefix.map_or(0, str::len) + bytes.len() * 2);
    if let Some(prefix) = prefix {
        ident.push_str(prefix);
    }
    for b in bytes {
        let _ = write!(ident, "{b:02x}");
    }
    ident
}

/// Name given to a network created without an identifier.
pub(crate) fn hidden_name(counter: u64) -> String {
    format!("hidden_{counter}")
}

/// Converts an IPv4 prefix length to a netmask. Lengths above 32 saturate.
pub fn netmask_from_prefix(prefixlen: u8) -> Ipv4Addr {
    let bits = match prefixlen {
        0 => 0,
        p if p >= 32 => u32::MAX,
        p => u32::MAX << (32 - u32::from(p)),
    };
    Ipv4Addr::from(bits)
}

/// Default broadcast address: the local address with all host bits set.
pub fn broadcast_for(local: Ipv4Addr, prefixlen: u8) -> Ipv4Addr {
    let mask = u32::from(netmask_from_prefix(prefixlen));
    Ipv4Addr::from(u32::from(local) | !mask)
}

/// Returns true if `host` falls in the subnet of `local`/`netmask`.
pub fn same_subnet(local: Ipv4Addr, netmask: Ipv4Addr, host: Ipv4Addr) -> bool {
    let mask = u32::from(netmask);
    u32::from(local) & mask == u32::from(host) & mask
}

/// Maps an arbitrary identifier onto the D-Bus object path alphabet.
///
/// Characters outside `[A-Za-z0-9_]` become `_`.
pub(crate) fn path_component(ident: &str) -> String {
    if ident.is_empty() {
        return "_".to_string();
    }
    ident
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Macro to convert Result to Option with error logging.
/// Usage: `try_log!(result, "context message")`
#[macro_export]
macro_rules! try_log {
    ($result:expr, $context:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => {
                log::warn!("{}: {}", $context, e);
                return None;
            }
        }
    };
}

/// Builds the grouping key of a Wi-Fi network from its SSID, mode and security.
pub fn wifi_group_name(ssid: &[u8], mode: &str, security: &str) -> String {
    let ssid = if ssid.is_empty() {
        "hidden".to_string()
    } else {
        hwaddr_ident(ssid, None)
    };
    format!("{ssid}_{mode}_{security}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_six_byte_address() {
        let addr = format_hwaddr(&[0x00, 0x11, 0x22, 0xaa, 0xbb, 0xcc]).unwrap();
        assert_eq!(addr, "00:11:22:AA:BB:CC");
    }

    #[test]
    fn rejects_wrong_length_address() {
        assert!(matches!(
            format_hwaddr(&[1, 2, 3, 4, 5]),
            Err(ConnectionError::InvalidArgument(_))
        ));
        assert!(format_hwaddr(&[0; 7]).is_err());
        assert!(format_hwaddr(&[]).is_err());
    }

    #[test]
    fn ident_is_lower_hex_with_prefix() {
        let bytes = [0x00, 0x1b, 0x21, 0xAB, 0xCD, 0xEF];
        assert_eq!(hwaddr_ident(&bytes, Some("eth_")), "eth_001b21abcdef");
        assert_eq!(hwaddr_ident(&bytes, None), "001b21abcdef");
    }

    #[test]
    fn hidden_names_use_counter() {
        assert_eq!(hidden_name(0), "hidden_0");
        assert_eq!(hidden_name(42), "hidden_42");
    }

    #[test]
    fn prefix_netmask_conversion() {
        assert_eq!(netmask_from_prefix(24), Ipv4Addr::new(255, 255, 255, 0));
        assert_eq!(netmask_from_prefix(0), Ipv4Addr::new(0, 0, 0, 0));
        assert_eq!(netmask_from_prefix(32), Ipv4Addr::new(255, 255, 255, 255));
        assert_eq!(netmask_from_prefix(40), Ipv4Addr::new(255, 255, 255, 255));
    }

    #[test]
    fn broadcast_sets_host_bits() {
        let local = Ipv4Addr::new(192, 168, 1, 10);
        assert_eq!(broadcast_for(local, 24), Ipv4Addr::new(192, 168, 1, 255));
        assert_eq!(broadcast_for(local, 16), Ipv4Addr::new(192, 168, 255, 255));
    }

    #[test]
    fn subnet_comparison() {
        let local = Ipv4Addr::new(192, 168, 1, 10);
        let mask = netmask_from_prefix(24);
        assert!(same_subnet(local, mask, Ipv4Addr::new(192, 168, 1, 1)));
        assert!(!same_subnet(local, mask, Ipv4Addr::new(192, 168, 2, 1)));
    }

    #[test]
    fn path_components_are_sanitized() {
        assert_eq!(path_component("wifi_0011-22"), "wifi_0011_22");
        assert_eq!(path_component(""), "_");
    }

    #[test]
    fn group_name_from_ssid() {
        assert_eq!(wifi_group_name(b"ab", "managed", "psk"), "6162_managed_psk");
        assert_eq!(wifi_group_name(b"", "adhoc", "none"), "hidden_adhoc_none");
    }
}
