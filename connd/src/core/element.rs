//! Property substrate embedded in every network.
//!
//! An [`Element`] is a typed key/value store with an error slot and a list of
//! child elements. Networks use children for auxiliary state machines such as
//! DHCP lease negotiation.

use std::collections::BTreeMap;

use crate::api::models::PropertyValue;

/// Role of an element in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Network,
    Dhcp,
}

/// Failure recorded on an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementError {
    ConnectFailed,
    DhcpFailed,
}

#[derive(Debug, Clone)]
pub struct Element {
    kind: ElementKind,
    name: String,
    index: Option<i32>,
    error: Option<ElementError>,
    properties: BTreeMap<String, PropertyValue>,
    children: Vec<Element>,
}

impl Element {
    pub fn new(kind: ElementKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            index: None,
            error: None,
            properties: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> Option<i32> {
        self.index
    }

    pub fn set_index(&mut self, index: Option<i32>) {
        self.index = index;
    }

    pub fn error(&self) -> Option<ElementError> {
        self.error
    }

    pub fn set_error(&mut self, error: Option<ElementError>) {
        self.error = error;
    }

    pub fn set(&mut self, key: &str, value: PropertyValue) {
        self.properties.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<PropertyValue> {
        self.properties.remove(key)
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Attaches a child element inheriting this element's interface index.
    pub fn register_child(&mut self, kind: ElementKind) -> &Element {
        let mut child = Element::new(kind, format!("{}_{:?}", self.name, kind).to_lowercase());
        child.index = self.index;
        self.children.push(child);
        &self.children[self.children.len() - 1]
    }

    /// Removes every child element, returning how many were dropped.
    pub fn unregister_children(&mut self) -> usize {
        let count = self.children.len();
        self.children.clear();
        count
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    pub fn has_child(&self, kind: ElementKind) -> bool {
        self.children.iter().any(|c| c.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_typed_properties() {
        let mut element = Element::new(ElementKind::Network, "net");
        element.set("Strength", PropertyValue::U8(40));
        element.set("Name", "home".into());

        assert_eq!(element.get("Strength"), Some(&PropertyValue::U8(40)));
        assert_eq!(element.get("Name").and_then(PropertyValue::as_str), Some("home"));
        assert!(element.get("Missing").is_none());
        assert_eq!(element.properties().count(), 2);
    }

    #[test]
    fn children_inherit_index() {
        let mut element = Element::new(ElementKind::Network, "net");
        element.set_index(Some(3));

        let child = element.register_child(ElementKind::Dhcp);
        assert_eq!(child.index(), Some(3));
        assert_eq!(child.kind(), ElementKind::Dhcp);
        assert!(element.has_child(ElementKind::Dhcp));

        assert_eq!(element.unregister_children(), 1);
        assert!(element.children().is_empty());
    }

    #[test]
    fn error_slot() {
        let mut element = Element::new(ElementKind::Network, "net");
        assert!(element.error().is_none());
        element.set_error(Some(ElementError::ConnectFailed));
        assert_eq!(element.error(), Some(ElementError::ConnectFailed));
    }
}
