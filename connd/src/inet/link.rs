//! Interface lookup, link state and classification.

use bitflags::bitflags;
use log::{debug, info};
use std::path::Path;

use crate::api::config::DaemonConfig;
use crate::api::models::ConnectionError;
use crate::inet::sys::{ControlSocket, IfReq};
use crate::try_log;
use crate::types::constants::{kernel, sysfs};
use crate::util::utils::{format_hwaddr, hwaddr_ident};
use crate::Result;

bitflags! {
    /// Interface flags as reported by `SIOCGIFFLAGS`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct InterfaceFlags: u32 {
        const UP = libc::IFF_UP as u32;
        const BROADCAST = libc::IFF_BROADCAST as u32;
        const LOOPBACK = libc::IFF_LOOPBACK as u32;
        const POINTOPOINT = libc::IFF_POINTOPOINT as u32;
        const RUNNING = libc::IFF_RUNNING as u32;
        const NOARP = libc::IFF_NOARP as u32;
        const PROMISC = libc::IFF_PROMISC as u32;
        const MULTICAST = libc::IFF_MULTICAST as u32;
    }
}

/// What kind of link an interface is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceKind {
    Loopback,
    Ethernet,
    Wifi,
    Wimax,
    Bonding,
    Bridge,
    Vmware,
    VirtualBox,
    BluetoothPan,
    Unknown,
}

impl InterfaceKind {
    /// Interfaces the daemon never manages as devices.
    pub fn is_ignored(self) -> bool {
        !matches!(self, Self::Ethernet | Self::Wifi | Self::Wimax)
    }
}

/// Everything needed to create a device for an interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceDescriptor {
    pub index: i32,
    pub name: String,
    pub kind: InterfaceKind,
    pub ident: Option<String>,
    pub address: Option<String>,
}

fn kernel_err(context: String) -> impl FnOnce(std::io::Error) -> ConnectionError {
    move |e| ConnectionError::kernel(context, e)
}

pub fn ifindex(name: &str) -> Result<i32> {
    let sk = ControlSocket::ipv4().map_err(kernel_err("open control socket".into()))?;
    let mut req = IfReq::with_name(name).map_err(kernel_err(format!("interface {name}")))?;
    sk.ioctl(kernel::SIOCGIFINDEX, &mut req)
        .map_err(kernel_err(format!("SIOCGIFINDEX {name}")))?;
    Ok(req.index())
}

pub fn ifname(index: i32) -> Result<String> {
    let sk = ControlSocket::ipv4().map_err(kernel_err("open control socket".into()))?;
    name_of(&sk, index)
}

/// Looks up the name of `index` on an already open socket, returning the
/// request with its name filled in.
pub(crate) fn named_request(sk: &ControlSocket, index: i32) -> Result<IfReq> {
    let mut req = IfReq::with_index(index);
    sk.ioctl(kernel::SIOCGIFNAME, &mut req)
        .map_err(kernel_err(format!("SIOCGIFNAME {index}")))?;
    Ok(req)
}

fn name_of(sk: &ControlSocket, index: i32) -> Result<String> {
    named_request(sk, index).map(|req| req.name())
}

pub fn ifflags(index: i32) -> Result<InterfaceFlags> {
    let sk = ControlSocket::ipv4().map_err(kernel_err("open control socket".into()))?;
    let mut req = named_request(&sk, index)?;
    sk.ioctl(kernel::SIOCGIFFLAGS, &mut req)
        .map_err(kernel_err(format!("SIOCGIFFLAGS {index}")))?;
    Ok(InterfaceFlags::from_bits_truncate(req.flags() as u16 as u32))
}

/// Brings an interface up. Already-up interfaces yield
/// [`ConnectionError::AlreadyInState`].
pub fn ifup(index: i32) -> Result<()> {
    set_up(index, true)
}

/// Brings an interface down. Already-down interfaces yield
/// [`ConnectionError::AlreadyInState`].
pub fn ifdown(index: i32) -> Result<()> {
    set_up(index, false)
}

fn set_up(index: i32, up: bool) -> Result<()> {
    let sk = ControlSocket::ipv4().map_err(kernel_err("open control socket".into()))?;
    let mut req = named_request(&sk, index)?;
    sk.ioctl(kernel::SIOCGIFFLAGS, &mut req)
        .map_err(kernel_err(format!("SIOCGIFFLAGS {index}")))?;

    let flags = req.flags();
    let is_up = flags & libc::IFF_UP as libc::c_short != 0;
    if is_up == up {
        return Err(ConnectionError::AlreadyInState);
    }

    let flags = if up {
        flags | libc::IFF_UP as libc::c_short
    } else {
        flags & !(libc::IFF_UP as libc::c_short)
    };
    req.set_flags(flags);

    sk.ioctl(kernel::SIOCSIFFLAGS, &mut req)
        .map_err(kernel_err(format!("SIOCSIFFLAGS {index}")))?;
    debug!("index {} {}", index, if up { "up" } else { "down" });
    Ok(())
}

fn hwaddr(index: i32) -> Result<(u16, [u8; 6])> {
    let sk = ControlSocket::ipv4().map_err(kernel_err("open control socket".into()))?;
    let mut req = named_request(&sk, index)?;
    sk.ioctl(kernel::SIOCGIFHWADDR, &mut req)
        .map_err(kernel_err(format!("SIOCGIFHWADDR {index}")))?;
    Ok(req.hwaddr())
}

/// Link-layer type (`ARPHRD_*`) of an interface.
pub fn hardware_type(index: i32) -> Result<u16> {
    hwaddr(index).map(|(family, _)| family)
}

/// Hardware address as `AA:BB:CC:DD:EE:FF`.
pub fn hardware_address(index: i32) -> Result<String> {
    let (_, mac) = hwaddr(index)?;
    format_hwaddr(&mac)
}

/// Lower-case hex identity of the hardware address, with optional prefix.
pub fn ident(index: i32, prefix: Option<&str>) -> Result<String> {
    let (_, mac) = hwaddr(index)?;
    Ok(hwaddr_ident(&mac, prefix))
}

fn sysfs_dir(name: &str, entry: &str) -> bool {
    Path::new(sysfs::NET_CLASS).join(name).join(entry).is_dir()
}

/// Returns true if the interface is driven by a cfg80211 wireless driver.
pub fn is_cfg80211(index: i32) -> bool {
    match ifname(index) {
        Ok(name) => sysfs_dir(&name, sysfs::PHY80211),
        Err(_) => false,
    }
}

/// Classifies an interface from its name and link-layer type.
///
/// `has_dir` answers whether `/sys/class/net/<name>/<entry>` is a directory;
/// `is_wireless` is consulted last, for wireless-extension drivers without a
/// `phy80211` link.
pub fn classify(
    name: &str,
    hwtype: u16,
    has_dir: impl Fn(&str) -> bool,
    is_wireless: impl FnOnce() -> bool,
) -> InterfaceKind {
    if hwtype == kernel::ARPHRD_LOOPBACK {
        return InterfaceKind::Loopback;
    }
    if hwtype != kernel::ARPHRD_ETHER {
        return InterfaceKind::Unknown;
    }

    if name.starts_with("vmnet") {
        InterfaceKind::Vmware
    } else if name.starts_with("vboxnet") {
        InterfaceKind::VirtualBox
    } else if name.starts_with("bnep") {
        InterfaceKind::BluetoothPan
    } else if name.starts_with("wmx") || has_dir(sysfs::WIMAX) {
        InterfaceKind::Wimax
    } else if has_dir(sysfs::BRIDGE) {
        InterfaceKind::Bridge
    } else if has_dir(sysfs::BONDING) {
        InterfaceKind::Bonding
    } else if has_dir(sysfs::PHY80211) || is_wireless() {
        InterfaceKind::Wifi
    } else {
        InterfaceKind::Ethernet
    }
}

/// Classifies a live interface.
pub fn interface_kind(index: i32) -> Result<InterfaceKind> {
    let hwtype = hardware_type(index)?;
    let sk = ControlSocket::ipv4().map_err(kernel_err("open control socket".into()))?;
    let name = name_of(&sk, index)?;

    Ok(classify(
        &name,
        hwtype,
        |entry| sysfs_dir(&name, entry),
        || {
            let Ok(mut req) = IfReq::with_name(&name) else {
                return false;
            };
            sk.ioctl(kernel::SIOCGIWNAME, &mut req).is_ok()
        },
    ))
}

/// Gathers what the device layer needs to create a device for `index`.
///
/// Returns `None` for filtered, ignored or vanished interfaces.
pub fn describe_interface(index: i32, config: &DaemonConfig) -> Option<InterfaceDescriptor> {
    let name = try_log!(ifname(index), "Failed to look up interface name");

    if config.is_filtered(&name) {
        info!("Ignoring interface {} (filtered)", name);
        return None;
    }

    let kind = try_log!(interface_kind(index), "Failed to classify interface");
    if kind.is_ignored() {
        info!("Ignoring interface {} ({:?})", name, kind);
        return None;
    }

    Some(InterfaceDescriptor {
        index,
        name,
        kind,
        ident: ident(index, None).ok(),
        address: hardware_address(index).ok(),
    })
}
