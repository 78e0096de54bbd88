//! Seam towards the service layer.
//!
//! A service is the user-facing wrapper around a network. The core only asks
//! the service layer to locate the service of a network and tells it about
//! state changes; it never owns services.

use crate::api::models::{IpConfigMethod, NetworkId, ServiceId, ServiceState};
use crate::core::ipconfig::IpConfig;
use crate::core::network::Network;
use crate::core::portal::PortalResult;

pub trait ServiceLayer {
    fn lookup_from_network(&mut self, network: &Network) -> Option<ServiceId>;

    fn indicate_state(&mut self, service: ServiceId, state: ServiceState);

    /// IP configuration owned by the service, if it has one.
    fn ipconfig(&mut self, service: ServiceId) -> Option<IpConfig>;

    fn create_ipconfig(&mut self, service: ServiceId, index: i32);

    fn set_ipconfig_index(&mut self, service: ServiceId, index: i32);

    fn set_method(&mut self, service: ServiceId, method: IpConfigMethod);

    /// A grouped network joined the profile.
    fn add_network(&mut self, _network: &Network) {}

    fn update_network(&mut self, _network: &Network) {}

    fn remove_network(&mut self, _network: NetworkId) {}

    /// A proxy auto-configuration URL was discovered for the service.
    fn set_proxy_autoconfig(&mut self, _service: ServiceId, _url: &str) {}

    fn portal_result(&mut self, _service: ServiceId, _result: PortalResult) {}
}
