//! Transport publishing networks on a D-Bus connection.

use log::{debug, error, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use zbus::Connection;
use zbus::object_server::SignalEmitter;
use zvariant::{OwnedObjectPath, OwnedValue, Value};

use crate::api::models::{ConnectionError, PropertyValue};
use crate::core::transport::{PropertySnapshot, Transport};
use crate::dbus::network::{NetworkObject, to_owned_value};
use crate::Result;

enum Command {
    Publish {
        path: OwnedObjectPath,
        object: NetworkObject,
    },
    Unpublish(OwnedObjectPath),
    Changed {
        path: OwnedObjectPath,
        name: String,
        value: OwnedValue,
    },
}

/// Serves `net.connman.Network` objects on a bus connection.
///
/// The manager calls into the transport synchronously; object server calls
/// are queued to a worker task that owns the connection. Property snapshots
/// are shared with the served objects, so `GetProperties` always sees the
/// latest published state.
///
/// Must be created inside a tokio runtime.
pub struct DbusTransport {
    objects: HashMap<String, Arc<Mutex<PropertySnapshot>>>,
    commands: UnboundedSender<Command>,
}

impl DbusTransport {
    pub fn new(conn: Connection) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        tokio::spawn(serve(conn, rx));
        Self {
            objects: HashMap::new(),
            commands,
        }
    }

    /// Connects to the system bus.
    pub async fn system() -> Result<Self> {
        let conn = Connection::system().await?;
        Ok(Self::new(conn))
    }

    pub fn is_published(&self, path: &str) -> bool {
        self.objects.contains_key(path)
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| ConnectionError::Publish("bus worker stopped".into()))
    }
}

fn object_path(path: &str) -> Result<OwnedObjectPath> {
    OwnedObjectPath::try_from(path)
        .map_err(|e| ConnectionError::Publish(format!("invalid object path {path}: {e}")))
}

impl Transport for DbusTransport {
    fn register(&mut self, path: &str, snapshot: PropertySnapshot) -> Result<()> {
        let owned = object_path(path)?;
        if self.objects.contains_key(path) {
            return Err(ConnectionError::Publish(format!("{path} already exists")));
        }

        let shared = Arc::new(Mutex::new(snapshot));
        self.send(Command::Publish {
            path: owned,
            object: NetworkObject::new(Arc::clone(&shared)),
        })?;
        self.objects.insert(path.to_string(), shared);
        Ok(())
    }

    fn unregister(&mut self, path: &str) {
        if self.objects.remove(path).is_none() {
            return;
        }
        match object_path(path) {
            Ok(owned) => {
                if let Err(e) = self.send(Command::Unpublish(owned)) {
                    warn!("Failed to unpublish {}: {}", path, e);
                }
            }
            Err(e) => warn!("{}", e),
        }
    }

    fn update(&mut self, path: &str, snapshot: PropertySnapshot) {
        let Some(shared) = self.objects.get(path) else {
            return;
        };
        match shared.lock() {
            Ok(mut current) => *current = snapshot,
            Err(_) => warn!("property store of {} unavailable", path),
        }
    }

    fn property_changed(&mut self, path: &str, name: &str, value: &PropertyValue) {
        let command = object_path(path).and_then(|path| {
            let value = to_owned_value(value)
                .map_err(|e| ConnectionError::InvalidArgument(e.to_string()))?;
            Ok(Command::Changed {
                path,
                name: name.to_string(),
                value,
            })
        });
        if let Err(e) = command.and_then(|command| self.send(command)) {
            warn!("Failed to signal {} on {}: {}", name, path, e);
        }
    }
}

async fn serve(conn: Connection, mut commands: UnboundedReceiver<Command>) {
    while let Some(command) = commands.recv().await {
        match command {
            Command::Publish { path, object } => {
                match conn.object_server().at(path.clone(), object).await {
                    Ok(true) => debug!("serving {}", path.as_str()),
                    Ok(false) => warn!("{} is already served", path.as_str()),
                    Err(e) => error!("Failed to serve {}: {}", path.as_str(), e),
                }
            }
            Command::Unpublish(path) => {
                if let Err(e) = conn
                    .object_server()
                    .remove::<NetworkObject, _>(path.clone())
                    .await
                {
                    warn!("Failed to remove {}: {}", path.as_str(), e);
                }
            }
            Command::Changed { path, name, value } => {
                let sent = match SignalEmitter::new(&conn, path.clone()) {
                    Ok(emitter) => {
                        NetworkObject::property_changed(&emitter, &name, Value::from(value)).await
                    }
                    Err(e) => Err(e),
                };
                if let Err(e) = sent {
                    warn!("Failed to emit {} on {}: {}", name, path.as_str(), e);
                }
            }
        }
    }
    debug!("bus worker finished");
}
