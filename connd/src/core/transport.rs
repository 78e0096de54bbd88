//! Publication of network objects.
//!
//! A registered network is published at an object path together with a
//! [`PropertySnapshot`]. The snapshot keeps public properties apart from
//! secrets so that `GetProperties` can filter by caller privilege.

use log::debug;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::api::models::{ConnectionError, Privilege, PropertyValue};
use crate::Result;

/// Properties of one published network, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertySnapshot {
    public: Vec<(String, PropertyValue)>,
    secret: Vec<(String, PropertyValue)>,
}

impl PropertySnapshot {
    pub fn insert(&mut self, key: &str, value: PropertyValue) {
        upsert(&mut self.public, key, value);
    }

    /// Adds a property only visible to privileged callers.
    pub fn insert_secret(&mut self, key: &str, value: PropertyValue) {
        upsert(&mut self.secret, key, value);
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.public
            .iter()
            .chain(self.secret.iter())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.public.len() + self.secret.len()
    }

    pub fn is_empty(&self) -> bool {
        self.public.is_empty() && self.secret.is_empty()
    }

    /// The reply to `GetProperties` for a caller of the given privilege.
    pub fn to_properties(&self, privilege: Privilege) -> Vec<(String, PropertyValue)> {
        let mut properties = self.public.clone();
        if privilege == Privilege::Secret {
            properties.extend(self.secret.iter().cloned());
        }
        properties
    }
}

fn upsert(entries: &mut Vec<(String, PropertyValue)>, key: &str, value: PropertyValue) {
    match entries.iter_mut().find(|(k, _)| k == key) {
        Some(entry) => entry.1 = value,
        None => entries.push((key.to_string(), value)),
    }
}

/// Publishes network objects to clients.
pub trait Transport {
    /// Publishes an object. Fails if the path is taken or invalid.
    fn register(&mut self, path: &str, snapshot: PropertySnapshot) -> Result<()>;

    fn unregister(&mut self, path: &str);

    /// Replaces the property set behind an already published object.
    fn update(&mut self, path: &str, snapshot: PropertySnapshot);

    /// Emits a `PropertyChanged` signal.
    fn property_changed(&mut self, path: &str, name: &str, value: &PropertyValue);
}

/// A `PropertyChanged` emission recorded by [`LocalTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub path: String,
    pub name: String,
    pub value: PropertyValue,
}

#[derive(Debug, Default)]
struct LocalState {
    objects: HashMap<String, PropertySnapshot>,
    signals: Vec<Signal>,
    reject: bool,
}

/// In-process transport.
///
/// Clones share the same object table, so a handle kept outside the manager
/// observes everything the manager publishes.
#[derive(Debug, Clone, Default)]
pub struct LocalTransport {
    state: Rc<RefCell<LocalState>>,
}

impl LocalTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers `GetProperties` on `path`.
    pub fn get_properties(
        &self,
        path: &str,
        privilege: Privilege,
    ) -> Option<Vec<(String, PropertyValue)>> {
        self.state
            .borrow()
            .objects
            .get(path)
            .map(|snapshot| snapshot.to_properties(privilege))
    }

    pub fn is_published(&self, path: &str) -> bool {
        self.state.borrow().objects.contains_key(path)
    }

    pub fn published(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.state.borrow().objects.keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn signals(&self) -> Vec<Signal> {
        self.state.borrow().signals.clone()
    }

    /// Makes every following registration fail.
    pub fn reject_registrations(&self, reject: bool) {
        self.state.borrow_mut().reject = reject;
    }
}

impl Transport for LocalTransport {
    fn register(&mut self, path: &str, snapshot: PropertySnapshot) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.reject {
            return Err(ConnectionError::Publish(format!("{path} rejected")));
        }
        if state.objects.contains_key(path) {
            return Err(ConnectionError::Publish(format!("{path} already exists")));
        }
        debug!("publishing {}", path);
        state.objects.insert(path.to_string(), snapshot);
        Ok(())
    }

    fn unregister(&mut self, path: &str) {
        debug!("unpublishing {}", path);
        self.state.borrow_mut().objects.remove(path);
    }

    fn update(&mut self, path: &str, snapshot: PropertySnapshot) {
        if let Some(current) = self.state.borrow_mut().objects.get_mut(path) {
            *current = snapshot;
        }
    }

    fn property_changed(&mut self, path: &str, name: &str, value: &PropertyValue) {
        self.state.borrow_mut().signals.push(Signal {
            path: path.to_string(),
            name: name.to_string(),
            value: value.clone(),
        });
    }
}
