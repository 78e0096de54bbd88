//! `net.connman.Network` object served for every published network.

use log::{debug, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use zbus::message::Header;
use zbus::names::BusName;
use zbus::object_server::SignalEmitter;
use zbus::{Connection, fdo, interface};
use zvariant::{ObjectPath, OwnedValue, Value};

use crate::api::models::{Privilege, PropertyValue};
use crate::core::transport::PropertySnapshot;
use crate::types::constants::dbus;

/// Server side of one published network.
pub(crate) struct NetworkObject {
    snapshot: Arc<Mutex<PropertySnapshot>>,
}

impl NetworkObject {
    pub(crate) fn new(snapshot: Arc<Mutex<PropertySnapshot>>) -> Self {
        Self { snapshot }
    }
}

#[interface(name = "net.connman.Network")]
impl NetworkObject {
    /// Returns all properties. Secrets are only included for root callers.
    async fn get_properties(
        &self,
        #[zbus(header)] header: Header<'_>,
        #[zbus(connection)] conn: &Connection,
    ) -> fdo::Result<HashMap<String, OwnedValue>> {
        let privilege = caller_privilege(conn, &header).await;

        let properties = self
            .snapshot
            .lock()
            .map_err(|_| fdo::Error::Failed("property store unavailable".into()))?
            .to_properties(privilege);

        properties
            .into_iter()
            .map(|(key, value)| {
                let value = to_owned_value(&value).map_err(|e| fdo::Error::Failed(e.to_string()))?;
                Ok((key, value))
            })
            .collect()
    }

    #[zbus(signal)]
    pub(crate) async fn property_changed(
        emitter: &SignalEmitter<'_>,
        name: &str,
        value: Value<'_>,
    ) -> zbus::Result<()>;
}

/// Root callers may read secrets; everyone else, including callers whose
/// identity cannot be established, may not.
async fn caller_privilege(conn: &Connection, header: &Header<'_>) -> Privilege {
    let Some(sender) = header.sender() else {
        return Privilege::Public;
    };

    let proxy = match fdo::DBusProxy::new(conn).await {
        Ok(proxy) => proxy,
        Err(e) => {
            warn!("Failed to create bus proxy: {}", e);
            return Privilege::Public;
        }
    };

    match proxy
        .get_connection_unix_user(BusName::from(sender.to_owned()))
        .await
    {
        Ok(uid) if uid == dbus::PRIVILEGED_UID => Privilege::Secret,
        Ok(uid) => {
            debug!("caller {} has uid {}", sender, uid);
            Privilege::Public
        }
        Err(e) => {
            warn!("Failed to look up caller {}: {}", sender, e);
            Privilege::Public
        }
    }
}

/// Converts a property into its D-Bus variant form.
pub(crate) fn to_value(value: &PropertyValue) -> zvariant::Result<Value<'static>> {
    Ok(match value {
        PropertyValue::String(s) => Value::from(s.clone()),
        PropertyValue::Bool(b) => Value::from(*b),
        PropertyValue::U8(v) => Value::from(*v),
        PropertyValue::U16(v) => Value::from(*v),
        PropertyValue::Blob(bytes) => Value::from(bytes.clone()),
        PropertyValue::ObjectPath(path) => Value::from(ObjectPath::try_from(path.clone())?),
    })
}

pub(crate) fn to_owned_value(value: &PropertyValue) -> zvariant::Result<OwnedValue> {
    OwnedValue::try_from(to_value(value)?)
}
