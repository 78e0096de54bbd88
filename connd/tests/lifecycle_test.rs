//! Tests for the connect/associate/configure/disconnect state machine.
//!
//! All collaborators are in-process fakes, so these tests never touch the
//! kernel or a bus.

mod common;

use common::{Answer, Harness, TestDriver};
use connd::{
    ConnectOutcome, ConnectionError, DeviceId, DriverOps, ElementError, ElementKind, IpAddress,
    IpConfig, IpConfigMethod, NetworkErrorKind, NetworkProtocol, NetworkState, NetworkType,
    Privilege, PropertyValue, Released, ServiceState,
};

const DEVICE: DeviceId = DeviceId(1);

fn manual_ipconfig() -> IpConfig {
    let address: IpAddress = "192.168.1.10/24".parse().unwrap();
    IpConfig::new(IpConfigMethod::Manual)
        .with_address(address)
        .with_gateway("192.168.1.1".parse().unwrap())
}

#[test]
fn test_manual_connect_reaches_ready() {
    let mut h = Harness::new();
    let driver = h.driver(TestDriver::new("wired", NetworkType::Ethernet));
    let id = h.network("eth0", NetworkType::Ethernet, DEVICE);
    h.manager.set_index(id, 3).unwrap();
    h.use_ipconfig(manual_ipconfig());

    let outcome = h.manager.connect(id).unwrap();
    assert_eq!(outcome, ConnectOutcome::Connected);
    assert_eq!(driver.connects.get(), 1);

    let network = h.manager.network(id).unwrap();
    assert_eq!(network.state(), NetworkState::Ready);
    assert!(network.is_connected());
    assert!(!network.is_connecting());
    assert!(!network.is_associating());

    assert_eq!(
        h.services.borrow().state_list(),
        [ServiceState::Configuration, ServiceState::Ready]
    );

    let devices = h.devices.borrow();
    assert_eq!(devices.connections(DEVICE), 1);
    assert_eq!(devices.current(DEVICE), Some(id));
    assert_eq!(devices.disconnected.get(&DEVICE), Some(&false));

    let addresses = h.addresses.borrow();
    assert_eq!(addresses.applied.len(), 1);
    assert_eq!(addresses.applied[0].index, Some(3));

    let path = network.object_path().unwrap().to_string();
    assert_eq!(path, "/net/connman/device1/eth0");
    let signals = h.transport.signals();
    assert!(signals
        .iter()
        .any(|s| s.path == path && s.name == "Connected" && s.value == PropertyValue::Bool(true)));

    let props = h.transport.get_properties(&path, Privilege::Public).unwrap();
    assert!(props.contains(&("Connected".to_string(), PropertyValue::Bool(true))));
}

#[test]
fn test_in_progress_connect_completes_later() {
    let mut h = Harness::new();
    h.driver(TestDriver::new("wifi", NetworkType::Wifi).answering(Answer::InProgress));
    let id = h.network("home", NetworkType::Wifi, DEVICE);
    h.use_ipconfig(manual_ipconfig());

    assert_eq!(h.manager.connect(id).unwrap(), ConnectOutcome::InProgress);
    {
        let network = h.manager.network(id).unwrap();
        assert_eq!(network.state(), NetworkState::Associating);
        assert!(network.is_associating());
        assert!(!network.is_connecting());
        assert!(!network.is_connected());
    }
    assert_eq!(
        h.services.borrow().state_list(),
        [ServiceState::Association]
    );

    h.manager.set_connected(id, true).unwrap();

    let network = h.manager.network(id).unwrap();
    assert_eq!(network.state(), NetworkState::Ready);
    assert!(!network.is_associating());
    assert_eq!(
        h.services.borrow().state_list(),
        [
            ServiceState::Association,
            ServiceState::Configuration,
            ServiceState::Ready
        ]
    );
}

#[test]
fn test_connect_twice_is_rejected_without_side_effects() {
    let mut h = Harness::new();
    let driver = h.driver(TestDriver::new("wired", NetworkType::Ethernet));
    let id = h.network("eth0", NetworkType::Ethernet, DEVICE);
    h.use_ipconfig(manual_ipconfig());
    h.manager.connect(id).unwrap();

    let states_before = h.services.borrow().states.len();
    let err = h.manager.connect(id).unwrap_err();
    assert!(matches!(err, ConnectionError::AlreadyConnected));
    assert_eq!(driver.connects.get(), 1);
    assert_eq!(h.services.borrow().states.len(), states_before);
    assert_eq!(h.devices.borrow().connections(DEVICE), 1);
    assert_eq!(h.manager.network(id).unwrap().state(), NetworkState::Ready);
}

#[test]
fn test_connect_while_associating_is_in_progress() {
    let mut h = Harness::new();
    let driver = h.driver(TestDriver::new("wifi", NetworkType::Wifi).answering(Answer::InProgress));
    let id = h.network("home", NetworkType::Wifi, DEVICE);

    h.manager.connect(id).unwrap();
    let err = h.manager.connect(id).unwrap_err();
    assert!(matches!(err, ConnectionError::AlreadyInProgress));
    assert_eq!(driver.connects.get(), 1);
}

#[test]
fn test_connect_preconditions() {
    let mut h = Harness::new();
    let unbound = h.manager.create_network(Some("orphan"), NetworkType::Wifi);
    assert!(matches!(
        h.manager.connect(unbound),
        Err(ConnectionError::NoDriver)
    ));

    h.driver(TestDriver::new("scan-only", NetworkType::Cellular).with_operations(DriverOps::REMOVE));
    let id = h.network("ctx0", NetworkType::Cellular, DEVICE);
    assert!(matches!(
        h.manager.connect(id),
        Err(ConnectionError::Unsupported)
    ));
    let network = h.manager.network(id).unwrap();
    assert_eq!(network.state(), NetworkState::Idle);
    assert!(!network.is_connecting());
}

#[test]
fn test_disconnect_idle_network() {
    let mut h = Harness::new();
    let driver = h.driver(TestDriver::new("wired", NetworkType::Ethernet));
    let id = h.network("eth0", NetworkType::Ethernet, DEVICE);

    assert!(matches!(
        h.manager.disconnect(id),
        Err(ConnectionError::NotConnected)
    ));
    assert_eq!(driver.disconnects.get(), 0);
    assert!(h.services.borrow().states.is_empty());
}

#[test]
fn test_disconnect_tears_down_once() {
    let mut h = Harness::new();
    let driver = h.driver(TestDriver::new("wired", NetworkType::Ethernet));
    let id = h.network("eth0", NetworkType::Ethernet, DEVICE);
    h.manager.set_index(id, 2).unwrap();
    h.use_ipconfig(manual_ipconfig());
    h.manager.connect(id).unwrap();

    h.manager.disconnect(id).unwrap();
    assert_eq!(driver.disconnects.get(), 1);

    let network = h.manager.network(id).unwrap();
    assert_eq!(network.state(), NetworkState::Idle);
    assert!(!network.is_connected());

    let devices = h.devices.borrow();
    assert_eq!(devices.connections(DEVICE), 0);
    assert_eq!(devices.current(DEVICE), None);
    assert_eq!(h.addresses.borrow().cleared.len(), 1);

    let services = h.services.borrow();
    let idles = services
        .state_list()
        .into_iter()
        .filter(|s| *s == ServiceState::Idle)
        .count();
    assert_eq!(idles, 1);
    assert_eq!(services.last_state(), Some(ServiceState::Idle));
}

#[test]
fn test_cancel_during_association() {
    let mut h = Harness::new();
    let driver = h.driver(TestDriver::new("wifi", NetworkType::Wifi).answering(Answer::InProgress));
    let id = h.network("home", NetworkType::Wifi, DEVICE);
    h.manager.connect(id).unwrap();

    h.manager.set_connected(id, false).unwrap();
    assert_eq!(driver.disconnects.get(), 1);

    let network = h.manager.network(id).unwrap();
    assert_eq!(network.element().error(), Some(ElementError::ConnectFailed));
    assert_eq!(network.state(), NetworkState::Idle);
    assert!(!network.is_associating());
    assert!(!network.is_connecting());
    assert_eq!(
        h.services.borrow().state_list(),
        [ServiceState::Association, ServiceState::Idle]
    );
    assert!(!h.devices.borrow().connections.contains_key(&DEVICE));

    // A late report from the driver changes nothing.
    assert!(matches!(
        h.manager.set_connected(id, false),
        Err(ConnectionError::AlreadyInState)
    ));
    assert_eq!(h.services.borrow().states.len(), 2);
}

#[test]
fn test_failed_cancel_marks_failure() {
    let mut h = Harness::new();
    let driver = h.driver(TestDriver::new("wifi", NetworkType::Wifi).answering(Answer::InProgress));
    driver.fail_disconnect.set(true);
    let id = h.network("home", NetworkType::Wifi, DEVICE);
    h.manager.connect(id).unwrap();

    h.manager.set_connected(id, false).unwrap();
    let network = h.manager.network(id).unwrap();
    assert_eq!(network.state(), NetworkState::Failure);
    assert!(!network.is_associating());
    assert_eq!(h.services.borrow().last_state(), Some(ServiceState::Failure));
}

#[test]
fn test_driver_refusal_clears_hidden_flag() {
    let mut h = Harness::new();
    h.driver(TestDriver::new("wifi", NetworkType::Wifi).answering(Answer::Refuse));
    let id = h.manager.create_network(None, NetworkType::Wifi);
    h.manager.register_network(id).unwrap();
    assert!(h.manager.network(id).unwrap().is_hidden());

    let err = h.manager.connect(id).unwrap_err();
    assert!(matches!(err, ConnectionError::AssociateFail));

    let network = h.manager.network(id).unwrap();
    assert!(!network.is_hidden());
    assert!(!network.is_connecting());
    assert_eq!(network.state(), NetworkState::Failure);
    assert_eq!(h.services.borrow().state_list(), [ServiceState::Failure]);
}

#[test]
fn test_associate_failure_only_counts_while_associating() {
    let mut h = Harness::new();
    h.driver(TestDriver::new("wifi", NetworkType::Wifi).answering(Answer::InProgress));
    let id = h.network("home", NetworkType::Wifi, DEVICE);

    h.manager
        .set_error(id, NetworkErrorKind::AssociateFail)
        .unwrap();
    assert!(h.services.borrow().states.is_empty());

    h.manager.connect(id).unwrap();
    h.manager
        .set_error(id, NetworkErrorKind::AssociateFail)
        .unwrap();

    let network = h.manager.network(id).unwrap();
    assert!(!network.is_associating());
    assert_eq!(network.state(), NetworkState::Failure);
    assert_eq!(h.services.borrow().last_state(), Some(ServiceState::Failure));
}

#[test]
fn test_unknown_error_only_clears_connecting() {
    let mut h = Harness::new();
    h.driver(TestDriver::new("wifi", NetworkType::Wifi).answering(Answer::InProgress));
    let id = h.network("home", NetworkType::Wifi, DEVICE);
    h.manager.connect(id).unwrap();

    h.manager.set_error(id, NetworkErrorKind::Unknown).unwrap();
    let network = h.manager.network(id).unwrap();
    assert!(network.is_associating());
    assert_eq!(network.state(), NetworkState::Associating);
    assert_eq!(h.services.borrow().states.len(), 1);
}

#[test]
fn test_address_failure_is_configure_fail() {
    let mut h = Harness::new();
    h.driver(TestDriver::new("wired", NetworkType::Ethernet));
    let id = h.network("eth0", NetworkType::Ethernet, DEVICE);
    h.use_ipconfig(manual_ipconfig());
    h.addresses.borrow_mut().fail = true;

    let err = h.manager.connect(id).unwrap_err();
    assert!(matches!(err, ConnectionError::ConfigureFail));
    assert_eq!(h.manager.network(id).unwrap().state(), NetworkState::Failure);
    assert_eq!(
        h.services.borrow().state_list(),
        [ServiceState::Configuration, ServiceState::Failure]
    );
}

#[test]
fn test_method_off_skips_configuration() {
    let mut h = Harness::new();
    h.driver(TestDriver::new("wired", NetworkType::Ethernet));
    let id = h.network("eth0", NetworkType::Ethernet, DEVICE);

    h.manager.connect(id).unwrap();
    let network = h.manager.network(id).unwrap();
    assert!(network.is_connected());
    assert!(!network.is_connecting());
    assert!(h.services.borrow().states.is_empty());
    assert!(h.addresses.borrow().applied.is_empty());
    assert_eq!(h.devices.borrow().connections(DEVICE), 0);
}

#[test]
fn test_dhcp_connect_then_lease() {
    let mut h = Harness::new();
    h.driver(TestDriver::new("wired", NetworkType::Ethernet));
    let id = h.network("eth0", NetworkType::Ethernet, DEVICE);
    h.manager.set_protocol(id, NetworkProtocol::Ip).unwrap();
    h.use_ipconfig(IpConfig::new(IpConfigMethod::Dhcp));

    h.manager.connect(id).unwrap();
    {
        let network = h.manager.network(id).unwrap();
        assert_eq!(network.state(), NetworkState::Configuration);
        assert!(network.element().has_child(ElementKind::Dhcp));
    }
    assert_eq!(h.devices.borrow().connections(DEVICE), 1);

    h.manager.dhcp_bound(id).unwrap();
    assert_eq!(h.manager.network(id).unwrap().state(), NetworkState::Ready);
    assert_eq!(
        h.services.borrow().state_list(),
        [ServiceState::Configuration, ServiceState::Ready]
    );
}

#[test]
fn test_dhcp_requires_ip_protocol() {
    let mut h = Harness::new();
    h.driver(TestDriver::new("wired", NetworkType::Ethernet));
    let id = h.network("eth0", NetworkType::Ethernet, DEVICE);
    h.use_ipconfig(IpConfig::new(IpConfigMethod::Dhcp));

    let err = h.manager.connect(id).unwrap_err();
    assert!(matches!(err, ConnectionError::ConfigureFail));
    let network = h.manager.network(id).unwrap();
    assert_eq!(network.state(), NetworkState::Failure);
    assert!(!network.element().has_child(ElementKind::Dhcp));
}

#[test]
fn test_dhcp_failure_takes_link_down() {
    let mut h = Harness::new();
    let driver = h.driver(TestDriver::new("wired", NetworkType::Ethernet));
    let id = h.network("eth0", NetworkType::Ethernet, DEVICE);
    h.manager.set_protocol(id, NetworkProtocol::Ip).unwrap();
    h.use_ipconfig(IpConfig::new(IpConfigMethod::Dhcp));
    h.manager.connect(id).unwrap();

    h.manager.dhcp_failed(id).unwrap();
    assert_eq!(driver.disconnects.get(), 1);

    let network = h.manager.network(id).unwrap();
    assert_eq!(network.element().error(), Some(ElementError::DhcpFailed));
    assert!(!network.element().has_child(ElementKind::Dhcp));
    assert!(!network.is_connected());
    assert_eq!(network.state(), NetworkState::Idle);

    let devices = h.devices.borrow();
    assert_eq!(devices.disconnected.get(&DEVICE), Some(&true));
    assert_eq!(devices.connections(DEVICE), 0);
}

#[test]
fn test_dhcp_failure_without_disconnect_support() {
    let mut h = Harness::new();
    let driver = h.driver(
        TestDriver::new("wired", NetworkType::Ethernet).with_operations(DriverOps::CONNECT),
    );
    let id = h.network("eth0", NetworkType::Ethernet, DEVICE);
    h.manager.set_protocol(id, NetworkProtocol::Ip).unwrap();
    h.use_ipconfig(IpConfig::new(IpConfigMethod::Dhcp));
    h.manager.connect(id).unwrap();

    h.manager.dhcp_failed(id).unwrap();
    assert_eq!(driver.disconnects.get(), 0);
    let network = h.manager.network(id).unwrap();
    assert!(!network.is_connected());
    assert_eq!(network.state(), NetworkState::Idle);
    assert_eq!(h.services.borrow().last_state(), Some(ServiceState::Idle));
}

#[test]
fn test_connect_disconnects_sibling_on_same_device() {
    let mut h = Harness::new();
    let driver = h.driver(TestDriver::new("wifi", NetworkType::Wifi));
    let first = h.network("home", NetworkType::Wifi, DEVICE);
    let second = h.network("office", NetworkType::Wifi, DEVICE);
    let elsewhere = h.network("cafe", NetworkType::Wifi, DeviceId(2));
    h.use_ipconfig(manual_ipconfig());

    h.manager.connect(first).unwrap();
    h.manager.connect(elsewhere).unwrap();
    h.manager.connect(second).unwrap();

    assert_eq!(driver.disconnects.get(), 1);
    assert!(!h.manager.network(first).unwrap().is_connected());
    assert!(h.manager.network(second).unwrap().is_connected());
    assert!(h.manager.network(elsewhere).unwrap().is_connected());

    let devices = h.devices.borrow();
    assert_eq!(devices.connections(DEVICE), 1);
    assert_eq!(devices.current(DEVICE), Some(second));
    assert_eq!(devices.disconnect_requests, [DEVICE, DeviceId(2), DEVICE]);
}

#[test]
fn test_connected_before_registration_is_deferred() {
    let mut h = Harness::new();
    let id = h.manager.create_network(Some("eth0"), NetworkType::Ethernet);
    h.use_ipconfig(manual_ipconfig());

    h.manager.set_connected(id, true).unwrap();
    assert_eq!(h.manager.refs(id), Some(2));
    assert_eq!(h.manager.pending(), 1);
    assert_eq!(h.manager.network(id).unwrap().state(), NetworkState::Idle);
    assert!(h.services.borrow().states.is_empty());
    assert!(h.transport.signals().is_empty());

    assert_eq!(h.manager.run_pending(), 1);
    assert_eq!(h.manager.refs(id), Some(1));
    assert_eq!(h.manager.network(id).unwrap().state(), NetworkState::Ready);
    assert_eq!(
        h.services.borrow().state_list(),
        [ServiceState::Configuration, ServiceState::Ready]
    );
}

#[test]
fn test_deferred_task_keeps_network_alive() {
    let mut h = Harness::new();
    let id = h.manager.create_network(Some("eth0"), NetworkType::Ethernet);
    h.manager.set_connected(id, true).unwrap();

    assert_eq!(h.manager.unref_network(id).unwrap(), Released::Alive(1));
    assert!(h.manager.network(id).is_ok());

    h.manager.run_pending();
    assert!(matches!(
        h.manager.network(id),
        Err(ConnectionError::UnknownNetwork(_))
    ));
}

#[test]
fn test_set_associating_is_idempotent() {
    let mut h = Harness::new();
    let id = h.manager.create_network(Some("home"), NetworkType::Wifi);
    assert!(matches!(
        h.manager.set_associating(id, false),
        Err(ConnectionError::AlreadyInState)
    ));
    h.manager.set_associating(id, true).unwrap();
    assert!(h.manager.set_associating(id, true).unwrap_err().is_already());
}

#[test]
fn test_ref_unref_destroys_exactly_once() {
    let mut h = Harness::new();
    let id = h.manager.create_network(Some("eth0"), NetworkType::Ethernet);

    assert_eq!(h.manager.ref_network(id).unwrap(), 2);
    assert_eq!(h.manager.unref_network(id).unwrap(), Released::Alive(1));
    assert_eq!(h.manager.unref_network(id).unwrap(), Released::Destroyed);
    assert!(matches!(
        h.manager.unref_network(id),
        Err(ConnectionError::UnknownNetwork(_))
    ));
}

#[test]
fn test_final_unref_unpublishes() {
    let mut h = Harness::new();
    let driver = h.driver(TestDriver::new("wired", NetworkType::Ethernet));
    let id = h.network("eth0", NetworkType::Ethernet, DEVICE);
    let path = h.manager.network(id).unwrap().object_path().unwrap().to_string();
    assert!(h.transport.is_published(&path));

    assert_eq!(h.manager.unref_network(id).unwrap(), Released::Destroyed);
    assert!(!h.transport.is_published(&path));
    assert_eq!(driver.removes.get(), 1);
}

#[test]
fn test_hidden_networks_are_numbered_and_available() {
    let mut h = Harness::new();
    let a = h.manager.create_network(None, NetworkType::Wifi);
    let b = h.manager.create_network(None, NetworkType::Wifi);

    let first = h.manager.network(a).unwrap();
    assert_eq!(first.identifier(), "hidden_0");
    assert!(first.is_hidden());
    assert!(first.is_available());
    assert_eq!(h.manager.network(b).unwrap().identifier(), "hidden_1");

    let named = h.manager.create_network(Some("home"), NetworkType::Wifi);
    assert!(!h.manager.network(named).unwrap().is_available());
}

#[test]
fn test_set_available_reports_no_change() {
    let mut h = Harness::new();
    let id = h.manager.create_network(Some("home"), NetworkType::Wifi);
    h.manager.set_available(id, true).unwrap();
    assert!(matches!(
        h.manager.set_available(id, true),
        Err(ConnectionError::AlreadyInState)
    ));
    assert!(h.manager.network(id).unwrap().is_available());
}

#[test]
fn test_index_creates_then_updates_service_ipconfig() {
    let mut h = Harness::new();
    let id = h.manager.create_network(Some("eth0"), NetworkType::Ethernet);

    h.manager.set_index(id, 4).unwrap();
    h.manager.set_index(id, 5).unwrap();

    let services = h.services.borrow();
    assert_eq!(services.created_ipconfig.len(), 1);
    assert_eq!(services.created_ipconfig[0].1, 4);
    assert_eq!(services.ipconfig_index.len(), 1);
    assert_eq!(services.ipconfig_index[0].1, 5);
    assert_eq!(h.manager.network(id).unwrap().index(), Some(5));
}

#[test]
fn test_method_is_forwarded_to_service_ipconfig() {
    let mut h = Harness::new();
    let id = h.manager.create_network(Some("eth0"), NetworkType::Ethernet);

    h.manager.set_method(id, IpConfigMethod::Dhcp).unwrap();
    assert!(h.services.borrow().methods.is_empty());
    assert_eq!(
        h.manager.network(id).unwrap().ipconfig().map(|c| c.method),
        Some(IpConfigMethod::Dhcp)
    );

    h.use_ipconfig(IpConfig::new(IpConfigMethod::Off));
    h.manager.set_method(id, IpConfigMethod::Manual).unwrap();
    assert_eq!(h.services.borrow().methods.len(), 1);
    assert_eq!(h.services.borrow().methods[0].1, IpConfigMethod::Manual);
}

#[test]
fn test_own_ipconfig_is_used_without_service() {
    let mut h = Harness::new();
    h.driver(TestDriver::new("wired", NetworkType::Ethernet));
    let id = h.network("eth0", NetworkType::Ethernet, DEVICE);
    h.services.borrow_mut().without_service.push(id);
    h.manager
        .set_ipconfig(id, manual_ipconfig().with_index(7))
        .unwrap();

    h.manager.connect(id).unwrap();
    assert_eq!(h.manager.network(id).unwrap().state(), NetworkState::Ready);
    assert_eq!(h.addresses.borrow().applied[0].index, Some(7));
    assert!(h.services.borrow().states.is_empty());
}
