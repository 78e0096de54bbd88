//! Web Proxy Auto-Discovery.
//!
//! For a service with a domain name `a.b.example.com` the lookup starts at
//! `wpad.a.b.example.com` and strips the leftmost label after each failure
//! until only two labels are left (`wpad.example.com`). The first name that
//! resolves yields the proxy auto-config URL.

use async_trait::async_trait;
use log::{debug, info};
use std::collections::HashMap;
use std::io;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::api::models::ServiceId;
use crate::core::event_loop::Event;
use crate::types::constants::wpad;

/// Name resolution used by discovery.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolves `hostname`, asking `nameserver` where the implementation
    /// supports choosing one.
    async fn lookup(&self, hostname: &str, nameserver: &str) -> io::Result<Vec<IpAddr>>;
}

/// Resolver backed by the system configuration.
///
/// The nameserver hint is ignored; queries go wherever the host resolver
/// sends them.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

#[async_trait]
impl Resolver for SystemResolver {
    async fn lookup(&self, hostname: &str, _nameserver: &str) -> io::Result<Vec<IpAddr>> {
        let addrs = tokio::net::lookup_host((hostname, wpad::LOOKUP_PORT)).await?;
        Ok(addrs.map(|addr| addr.ip()).collect())
    }
}

/// A discovered auto-config location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WpadOutcome {
    pub url: String,
    pub addresses: Vec<IpAddr>,
}

/// Returns the next, shorter candidate after `hostname` failed to resolve.
pub fn next_hostname(hostname: &str) -> Option<String> {
    if hostname.len() < 6 {
        return None;
    }
    let dot = hostname.get(5..)?.find('.')? + 5;
    let rest = &hostname[dot + 1..];
    if rest.is_empty() || !rest.contains('.') {
        return None;
    }
    Some(format!("{}{}", wpad::HOST_PREFIX, rest))
}

/// Walks the candidate names for `domain` until one resolves.
pub async fn discover(
    resolver: &dyn Resolver,
    domain: &str,
    nameserver: &str,
    debug_lookups: bool,
) -> Option<WpadOutcome> {
    let mut hostname = format!("{}{}", wpad::HOST_PREFIX, domain);

    loop {
        debug!("hostname {}", hostname);
        match resolver.lookup(&hostname, nameserver).await {
            Ok(addresses) => {
                if debug_lookups {
                    info!("RESOLV: {} -> {:?}", hostname, addresses);
                }
                if addresses.is_empty() {
                    return None;
                }
                return Some(WpadOutcome {
                    url: format!("http://{}{}", hostname, wpad::URL_SUFFIX),
                    addresses,
                });
            }
            Err(e) => {
                if debug_lookups {
                    info!("RESOLV: {} failed: {}", hostname, e);
                }
                hostname = next_hostname(&hostname)?;
            }
        }
    }
}

/// What [`Wpad::start`] needs to know about a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WpadRequest {
    pub service: ServiceId,
    pub index: Option<i32>,
    pub domain: Option<String>,
    pub nameserver: Option<String>,
}

/// Running discoveries, one per interface index.
pub struct Wpad {
    resolver: Arc<dyn Resolver>,
    debug_lookups: bool,
    running: HashMap<i32, JoinHandle<()>>,
}

impl Wpad {
    pub fn new(resolver: Arc<dyn Resolver>, debug_lookups: bool) -> Self {
        Self {
            resolver,
            debug_lookups,
            running: HashMap::new(),
        }
    }

    /// Starts discovery for a service. Services without an interface index,
    /// domain name or nameserver are skipped and `false` is returned.
    ///
    /// A discovery already running on the same index is replaced. Must be
    /// called from within a tokio runtime.
    pub fn start(&mut self, request: WpadRequest, events: UnboundedSender<Event>) -> bool {
        debug!("service {:?}", request.service);
        let (Some(index), Some(domain), Some(nameserver)) =
            (request.index, request.domain, request.nameserver)
        else {
            return false;
        };

        let resolver = Arc::clone(&self.resolver);
        let debug_lookups = self.debug_lookups;
        let service = request.service;

        let handle = tokio::spawn(async move {
            let Some(outcome) =
                discover(resolver.as_ref(), &domain, &nameserver, debug_lookups).await
            else {
                debug!("no proxy auto-config found for {}", domain);
                return;
            };
            let event = Event::ProxyAutoconfig {
                service,
                url: outcome.url,
            };
            if events.send(event).is_err() {
                debug!("event loop gone, dropping WPAD result");
            }
        });

        if let Some(previous) = self.running.insert(index, handle) {
            previous.abort();
        }
        true
    }

    pub fn stop(&mut self, index: i32) {
        if let Some(handle) = self.running.remove(&index) {
            debug!("index {}", index);
            handle.abort();
        }
    }

    pub fn is_running(&self, index: i32) -> bool {
        self.running
            .get(&index)
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for Wpad {
    fn drop(&mut self) {
        for (_, handle) in self.running.drain() {
            handle.abort();
        }
    }
}
