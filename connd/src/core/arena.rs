//! Reference-counted storage of networks.

use log::debug;
use std::collections::BTreeMap;

use crate::api::models::{ConnectionError, NetworkId};
use crate::core::network::Network;
use crate::Result;

struct Slot {
    network: Network,
    refs: usize,
}

/// Networks keyed by id. A network lives until its count drops to zero.
#[derive(Default)]
pub struct NetworkArena {
    slots: BTreeMap<NetworkId, Slot>,
    next_id: u64,
}

impl NetworkArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn next_id(&mut self) -> NetworkId {
        self.next_id += 1;
        NetworkId(self.next_id)
    }

    /// Stores a network with a count of one.
    pub(crate) fn insert(&mut self, network: Network) -> NetworkId {
        let id = network.id();
        self.slots.insert(id, Slot { network, refs: 1 });
        id
    }

    pub fn lookup(&self, id: NetworkId) -> Result<&Network> {
        self.slots
            .get(&id)
            .map(|slot| &slot.network)
            .ok_or(ConnectionError::UnknownNetwork(id))
    }

    pub fn lookup_mut(&mut self, id: NetworkId) -> Result<&mut Network> {
        self.slots
            .get_mut(&id)
            .map(|slot| &mut slot.network)
            .ok_or(ConnectionError::UnknownNetwork(id))
    }

    pub fn refs(&self, id: NetworkId) -> Option<usize> {
        self.slots.get(&id).map(|slot| slot.refs)
    }

    /// Takes another reference and returns the new count.
    pub(crate) fn retain(&mut self, id: NetworkId) -> Result<usize> {
        let slot = self
            .slots
            .get_mut(&id)
            .ok_or(ConnectionError::UnknownNetwork(id))?;
        slot.refs += 1;
        debug!("{} refs {}", id, slot.refs);
        Ok(slot.refs)
    }

    /// Drops a reference. The network is removed from the arena and handed
    /// back when the count reaches zero.
    pub(crate) fn release(&mut self, id: NetworkId) -> Result<(usize, Option<Network>)> {
        let slot = self
            .slots
            .get_mut(&id)
            .ok_or(ConnectionError::UnknownNetwork(id))?;
        slot.refs -= 1;
        debug!("{} refs {}", id, slot.refs);
        if slot.refs > 0 {
            return Ok((slot.refs, None));
        }
        Ok((0, self.slots.remove(&id).map(|slot| slot.network)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Network> {
        self.slots.values().map(|slot| &slot.network)
    }
}
