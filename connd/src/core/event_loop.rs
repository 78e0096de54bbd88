//! Event loop driving a [`Manager`].
//!
//! Drivers, DHCP clients and the portal and WPAD tasks never touch the
//! manager directly. They send an [`Event`] through a channel; the loop
//! applies it and then drains deferred work, so every callback runs on the
//! loop's task and never concurrently with another one.
//!
//! The manager is not `Send`, so the loop has to run on a current-thread
//! runtime or inside a [`tokio::task::LocalSet`].

use log::{debug, warn};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::api::manager::Manager;
use crate::api::models::{NetworkErrorKind, NetworkId, NetworkType, ServiceId};
use crate::core::portal::{self, PortalContext, PortalResult};
use crate::core::wpad::{Resolver, SystemResolver, Wpad, WpadRequest};
use crate::Result;

/// Something that happened outside the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Connect(NetworkId),
    Disconnect(NetworkId),
    Connected { network: NetworkId, connected: bool },
    Associating { network: NetworkId, associating: bool },
    Error { network: NetworkId, kind: NetworkErrorKind },
    DhcpBound(NetworkId),
    DhcpFailed(NetworkId),
    Portal { service: ServiceId, result: PortalResult },
    ProxyAutoconfig { service: ServiceId, url: String },
    Shutdown,
}

pub struct EventLoop {
    manager: Manager,
    tx: UnboundedSender<Event>,
    rx: UnboundedReceiver<Event>,
    wpad: Wpad,
}

impl EventLoop {
    pub fn new(manager: Manager) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let wpad = Wpad::new(Arc::new(SystemResolver), manager.config.resolver_debug);
        Self {
            manager,
            tx,
            rx,
            wpad,
        }
    }

    /// Replaces the resolver used for WPAD discovery.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.wpad = Wpad::new(resolver, self.manager.config.resolver_debug);
        self
    }

    /// A handle for reporting events from other tasks.
    pub fn sender(&self) -> UnboundedSender<Event> {
        self.tx.clone()
    }

    pub fn manager(&self) -> &Manager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut Manager {
        &mut self.manager
    }

    /// Applies one event and drains deferred work. Returns `false` once the
    /// loop should stop.
    pub fn handle(&mut self, event: Event) -> bool {
        debug!("event {:?}", event);
        if event == Event::Shutdown {
            return false;
        }
        if let Err(e) = self.dispatch(event) {
            if e.is_already() {
                debug!("event ignored: {}", e);
            } else {
                warn!("event failed: {}", e);
            }
        }
        self.manager.run_pending();
        true
    }

    fn dispatch(&mut self, event: Event) -> Result<()> {
        let manager = &mut self.manager;
        match event {
            Event::Connect(network) => manager.connect(network).map(|_| ()),
            Event::Disconnect(network) => manager.disconnect(network),
            Event::Connected { network, connected } => manager.set_connected(network, connected),
            Event::Associating {
                network,
                associating,
            } => manager.set_associating(network, associating),
            Event::Error { network, kind } => manager.set_error(network, kind),
            Event::DhcpBound(network) => manager.dhcp_bound(network),
            Event::DhcpFailed(network) => manager.dhcp_failed(network),
            Event::Portal { service, result } => {
                manager.services.portal_result(service, result);
                Ok(())
            }
            Event::ProxyAutoconfig { service, url } => {
                manager.services.set_proxy_autoconfig(service, &url);
                Ok(())
            }
            Event::Shutdown => Ok(()),
        }
    }

    /// Waits for the next event and applies it. Returns `false` on
    /// [`Event::Shutdown`].
    pub async fn run_once(&mut self) -> bool {
        match self.rx.recv().await {
            Some(event) => self.handle(event),
            None => false,
        }
    }

    /// Applies events until [`Event::Shutdown`] arrives, then hands the
    /// manager back.
    pub async fn run(mut self) -> Manager {
        while self.run_once().await {}
        debug!("event loop shutting down");
        self.manager
    }

    /// Starts a captive portal probe for `service`. Returns `false` for
    /// technologies that are not probed.
    pub fn start_portal(&self, service: ServiceId, network_type: NetworkType) -> bool {
        if !portal::should_probe(network_type) {
            return false;
        }
        let ctx = PortalContext::new(service, &self.manager.config.portal);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = portal::detect(&ctx).await;
            if tx.send(Event::Portal { service, result }).is_err() {
                debug!("event loop gone, dropping portal result");
            }
        });
        true
    }

    pub fn start_wpad(&mut self, request: WpadRequest) -> bool {
        self.wpad.start(request, self.tx.clone())
    }

    pub fn stop_wpad(&mut self, index: i32) {
        self.wpad.stop(index);
    }
}
