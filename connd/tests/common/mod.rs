//! Hand-written collaborators shared by the integration tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use connd::{
    AddressConfigurator, ConnectOutcome, ConnectionError, DaemonConfig, DeviceId, DeviceLayer,
    DriverOps, IpConfig, IpConfigMethod, LocalTransport, Manager, Network, NetworkDriver,
    NetworkId, NetworkType, PortalResult, ServiceId, ServiceLayer, ServiceState,
};

#[derive(Debug, Default)]
pub struct ServiceLog {
    /// Networks that have a service; all of them when empty.
    pub without_service: Vec<NetworkId>,
    pub states: Vec<(ServiceId, ServiceState)>,
    pub ipconfig: Option<IpConfig>,
    pub created_ipconfig: Vec<(ServiceId, i32)>,
    pub ipconfig_index: Vec<(ServiceId, i32)>,
    pub methods: Vec<(ServiceId, IpConfigMethod)>,
    pub added: Vec<NetworkId>,
    pub updated: Vec<NetworkId>,
    pub removed: Vec<NetworkId>,
    pub proxy_urls: Vec<(ServiceId, String)>,
    pub portal: Vec<(ServiceId, PortalResult)>,
}

impl ServiceLog {
    pub fn last_state(&self) -> Option<ServiceState> {
        self.states.last().map(|(_, state)| *state)
    }

    pub fn state_list(&self) -> Vec<ServiceState> {
        self.states.iter().map(|(_, state)| *state).collect()
    }
}

pub struct FakeServices(pub Rc<RefCell<ServiceLog>>);

pub fn service_of(id: NetworkId) -> ServiceId {
    ServiceId(id.as_u64() as u32)
}

impl ServiceLayer for FakeServices {
    fn lookup_from_network(&mut self, network: &Network) -> Option<ServiceId> {
        if self.0.borrow().without_service.contains(&network.id()) {
            return None;
        }
        Some(service_of(network.id()))
    }

    fn indicate_state(&mut self, service: ServiceId, state: ServiceState) {
        self.0.borrow_mut().states.push((service, state));
    }

    fn ipconfig(&mut self, _service: ServiceId) -> Option<IpConfig> {
        self.0.borrow().ipconfig.clone()
    }

    fn create_ipconfig(&mut self, service: ServiceId, index: i32) {
        self.0.borrow_mut().created_ipconfig.push((service, index));
    }

    fn set_ipconfig_index(&mut self, service: ServiceId, index: i32) {
        self.0.borrow_mut().ipconfig_index.push((service, index));
    }

    fn set_method(&mut self, service: ServiceId, method: IpConfigMethod) {
        self.0.borrow_mut().methods.push((service, method));
    }

    fn add_network(&mut self, network: &Network) {
        self.0.borrow_mut().added.push(network.id());
    }

    fn update_network(&mut self, network: &Network) {
        self.0.borrow_mut().updated.push(network.id());
    }

    fn remove_network(&mut self, network: NetworkId) {
        self.0.borrow_mut().removed.push(network);
    }

    fn set_proxy_autoconfig(&mut self, service: ServiceId, url: &str) {
        self.0.borrow_mut().proxy_urls.push((service, url.to_string()));
    }

    fn portal_result(&mut self, service: ServiceId, result: PortalResult) {
        self.0.borrow_mut().portal.push((service, result));
    }
}

#[derive(Debug, Default)]
pub struct DeviceLog {
    pub connections: HashMap<DeviceId, i32>,
    pub current: HashMap<DeviceId, Option<NetworkId>>,
    pub disconnected: HashMap<DeviceId, bool>,
    pub disconnect_requests: Vec<DeviceId>,
    pub networks_changed: usize,
}

impl DeviceLog {
    pub fn connections(&self, device: DeviceId) -> i32 {
        self.connections.get(&device).copied().unwrap_or(0)
    }

    pub fn current(&self, device: DeviceId) -> Option<NetworkId> {
        self.current.get(&device).copied().flatten()
    }
}

pub struct FakeDevices(pub Rc<RefCell<DeviceLog>>);

impl DeviceLayer for FakeDevices {
    fn path(&self, device: DeviceId) -> Option<String> {
        Some(format!("/net/connman/device{}", device.0))
    }

    fn increase_connections(&mut self, device: DeviceId) {
        *self.0.borrow_mut().connections.entry(device).or_default() += 1;
    }

    fn decrease_connections(&mut self, device: DeviceId) {
        *self.0.borrow_mut().connections.entry(device).or_default() -= 1;
    }

    fn set_network(&mut self, device: DeviceId, network: Option<NetworkId>) {
        self.0.borrow_mut().current.insert(device, network);
    }

    fn set_disconnected(&mut self, device: DeviceId, disconnected: bool) {
        self.0.borrow_mut().disconnected.insert(device, disconnected);
    }

    fn disconnect(&mut self, device: DeviceId) {
        self.0.borrow_mut().disconnect_requests.push(device);
    }

    fn networks_changed(&mut self, _device: DeviceId) {
        self.0.borrow_mut().networks_changed += 1;
    }
}

#[derive(Debug, Default)]
pub struct AddressLog {
    pub applied: Vec<IpConfig>,
    pub cleared: Vec<IpConfig>,
    pub fail: bool,
}

pub struct FakeConfigurator(pub Rc<RefCell<AddressLog>>);

impl AddressConfigurator for FakeConfigurator {
    fn apply(&mut self, config: &IpConfig) -> connd::Result<()> {
        let mut log = self.0.borrow_mut();
        if log.fail {
            return Err(ConnectionError::Kernel {
                context: "SIOCSIFADDR".into(),
                source: std::io::Error::from_raw_os_error(1),
            });
        }
        log.applied.push(config.clone());
        Ok(())
    }

    fn clear(&mut self, config: &IpConfig) -> connd::Result<()> {
        self.0.borrow_mut().cleared.push(config.clone());
        Ok(())
    }
}

/// How [`TestDriver::connect`] answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Connected,
    InProgress,
    Refuse,
}

pub struct TestDriver {
    pub name: &'static str,
    pub network_type: NetworkType,
    pub priority: i32,
    pub operations: DriverOps,
    pub accept: bool,
    pub answer: Cell<Answer>,
    pub fail_disconnect: Cell<bool>,
    pub probes: Cell<usize>,
    pub connects: Cell<usize>,
    pub disconnects: Cell<usize>,
    pub removes: Cell<usize>,
    pub setups: RefCell<Vec<String>>,
}

impl TestDriver {
    pub fn new(name: &'static str, network_type: NetworkType) -> Self {
        Self {
            name,
            network_type,
            priority: 0,
            operations: DriverOps::all(),
            accept: true,
            answer: Cell::new(Answer::Connected),
            fail_disconnect: Cell::new(false),
            probes: Cell::new(0),
            connects: Cell::new(0),
            disconnects: Cell::new(0),
            removes: Cell::new(0),
            setups: RefCell::new(Vec::new()),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_operations(mut self, operations: DriverOps) -> Self {
        self.operations = operations;
        self
    }

    pub fn declining(mut self) -> Self {
        self.accept = false;
        self
    }

    pub fn answering(self, answer: Answer) -> Self {
        self.answer.set(answer);
        self
    }
}

impl NetworkDriver for TestDriver {
    fn name(&self) -> &str {
        self.name
    }

    fn network_type(&self) -> NetworkType {
        self.network_type
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn operations(&self) -> DriverOps {
        self.operations
    }

    fn probe(&self, _network: &mut Network) -> connd::Result<()> {
        self.probes.set(self.probes.get() + 1);
        if self.accept {
            Ok(())
        } else {
            Err(ConnectionError::Unsupported)
        }
    }

    fn remove(&self, _network: &mut Network) {
        self.removes.set(self.removes.get() + 1);
    }

    fn connect(&self, _network: &mut Network) -> connd::Result<ConnectOutcome> {
        self.connects.set(self.connects.get() + 1);
        match self.answer.get() {
            Answer::Connected => Ok(ConnectOutcome::Connected),
            Answer::InProgress => Ok(ConnectOutcome::InProgress),
            Answer::Refuse => Err(ConnectionError::Kernel {
                context: "association".into(),
                source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
            }),
        }
    }

    fn disconnect(&self, _network: &mut Network) -> connd::Result<()> {
        self.disconnects.set(self.disconnects.get() + 1);
        if self.fail_disconnect.get() {
            Err(ConnectionError::Unsupported)
        } else {
            Ok(())
        }
    }

    fn setup(&self, _network: &mut Network, key: &str) -> connd::Result<()> {
        self.setups.borrow_mut().push(key.to_string());
        Ok(())
    }
}

pub struct Harness {
    pub manager: Manager,
    pub services: Rc<RefCell<ServiceLog>>,
    pub devices: Rc<RefCell<DeviceLog>>,
    pub addresses: Rc<RefCell<AddressLog>>,
    pub transport: LocalTransport,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(DaemonConfig::default())
    }

    pub fn with_config(config: DaemonConfig) -> Self {
        let services = Rc::new(RefCell::new(ServiceLog::default()));
        let devices = Rc::new(RefCell::new(DeviceLog::default()));
        let addresses = Rc::new(RefCell::new(AddressLog::default()));
        let transport = LocalTransport::new();

        let manager = Manager::with_config(
            config,
            Box::new(FakeServices(Rc::clone(&services))),
            Box::new(FakeDevices(Rc::clone(&devices))),
            Box::new(transport.clone()),
        )
        .with_configurator(Box::new(FakeConfigurator(Rc::clone(&addresses))));

        Self {
            manager,
            services,
            devices,
            addresses,
            transport,
        }
    }

    pub fn driver(&mut self, driver: TestDriver) -> Rc<TestDriver> {
        let driver = Rc::new(driver);
        self.manager.register_driver(driver.clone());
        driver
    }

    /// Creates and registers a network attached to `device`.
    pub fn network(&mut self, identifier: &str, network_type: NetworkType, device: DeviceId) -> NetworkId {
        let id = self.manager.create_network(Some(identifier), network_type);
        self.manager.set_device(id, Some(device)).unwrap();
        self.manager.register_network(id).unwrap();
        id
    }

    pub fn use_ipconfig(&self, ipconfig: IpConfig) {
        self.services.borrow_mut().ipconfig = Some(ipconfig);
    }
}
