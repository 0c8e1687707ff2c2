use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::MidiError;

/// Stable identifier of an open port.
///
/// Ids are small integers handed out in creation order and never reused by
/// the table that issued them. Backend callbacks carry the id of the port
/// they belong to instead of a pointer to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PortId(u32);

impl PortId {
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "port#{}", self.0)
    }
}

/// Table from [`PortId`] to the port object owning the connection.
#[derive(Debug)]
pub struct PortTable<T> {
    entries: BTreeMap<PortId, T>,
    next_id: u32,
}

impl<T> Default for PortTable<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl<T> PortTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, value: T) -> PortId {
        match self.try_insert_with(|_| Ok::<_, std::convert::Infallible>(value)) {
            Ok(id) => id,
            Err(never) => match never {},
        }
    }

    /// Builds the entry with its id already known, which lets a backend hand
    /// the id to the connection callback. The id is only consumed on success.
    pub fn try_insert_with<E>(
        &mut self,
        build: impl FnOnce(PortId) -> Result<T, E>,
    ) -> Result<PortId, E> {
        let id = PortId(self.next_id);
        let value = build(id)?;
        self.next_id += 1;
        self.entries.insert(id, value);
        Ok(id)
    }

    pub fn get(&self, id: PortId) -> Option<&T> {
        self.entries.get(&id)
    }

    pub fn get_mut(&mut self, id: PortId) -> Option<&mut T> {
        self.entries.get_mut(&id)
    }

    pub fn remove(&mut self, id: PortId) -> Option<T> {
        self.entries.remove(&id)
    }

    pub fn retain(&mut self, mut keep: impl FnMut(PortId, &T) -> bool) {
        self.entries.retain(|id, value| keep(*id, value));
    }

    pub fn ids(&self) -> Vec<PortId> {
        self.entries.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PortId, &T)> {
        self.entries.iter().map(|(id, value)| (*id, value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Outbound half of a MIDI transport as seen by the keyboard model.
pub trait MidiTransport: Send {
    /// Send one message to a destination.
    fn send_message(&mut self, destination: PortId, bytes: &[u8]) -> Result<(), MidiError>;

    /// Destinations currently known to the transport.
    fn destinations(&self) -> Vec<PortId>;
}

/// Receives what a transport observes on its own threads. Implementations
/// must only hand the data off; they run on the backend's callback thread.
pub trait InboundSink: Send + Sync + 'static {
    fn message_received(&self, port: PortId, bytes: &[u8]);

    fn destinations_changed(&self, destinations: Vec<PortId>);
}

/// Transport with no destinations.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTransport;

impl MidiTransport for NullTransport {
    fn send_message(&mut self, destination: PortId, _bytes: &[u8]) -> Result<(), MidiError> {
        Err(MidiError::UnknownPort(destination))
    }

    fn destinations(&self) -> Vec<PortId> {
        Vec::new()
    }
}

/// In-memory transport that records everything sent to it.
///
/// Clones share the same log and destination list.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    inner: Arc<Mutex<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    destinations: Vec<PortId>,
    failing: Vec<PortId>,
    sent: Vec<(PortId, Vec<u8>)>,
}

impl MemoryTransport {
    pub fn with_destinations(destinations: impl IntoIterator<Item = PortId>) -> Self {
        let transport = Self::default();
        transport.set_destinations(destinations);
        transport
    }

    pub fn set_destinations(&self, destinations: impl IntoIterator<Item = PortId>) {
        self.inner.lock().destinations = destinations.into_iter().collect();
    }

    /// Make sends to `destination` fail with a backend error.
    pub fn fail_destination(&self, destination: PortId) {
        self.inner.lock().failing.push(destination);
    }

    /// Messages sent so far, in order.
    pub fn sent(&self) -> Vec<(PortId, Vec<u8>)> {
        self.inner.lock().sent.clone()
    }

    pub fn take_sent(&self) -> Vec<(PortId, Vec<u8>)> {
        std::mem::take(&mut self.inner.lock().sent)
    }
}

impl MidiTransport for MemoryTransport {
    fn send_message(&mut self, destination: PortId, bytes: &[u8]) -> Result<(), MidiError> {
        let mut state = self.inner.lock();
        if !state.destinations.contains(&destination) {
            return Err(MidiError::UnknownPort(destination));
        }
        if state.failing.contains(&destination) {
            return Err(MidiError::Backend(format!("{destination} rejected the message")));
        }
        state.sent.push((destination, bytes.to_vec()));
        Ok(())
    }

    fn destinations(&self) -> Vec<PortId> {
        self.inner.lock().destinations.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_ids_are_stable_and_not_reused() {
        let mut table = PortTable::new();
        let a = table.insert("a");
        let b = table.insert("b");
        assert_ne!(a, b);
        assert_eq!(table.remove(a), Some("a"));
        let c = table.insert("c");
        assert!(c > b);
        assert_eq!(table.get(b), Some(&"b"));
        assert_eq!(table.ids(), vec![b, c]);
    }

    #[test]
    fn failed_insert_does_not_consume_an_id() {
        let mut table: PortTable<&str> = PortTable::new();
        let failed = table.try_insert_with(|_| Err("no device"));
        assert_eq!(failed, Err("no device"));

        let mut seen = None;
        let id = table
            .try_insert_with(|id| {
                seen = Some(id);
                Ok::<_, ()>("ok")
            })
            .unwrap();
        assert_eq!(Some(id), seen);
        assert_eq!(id, PortId::from_raw(1));
    }

    #[test]
    fn memory_transport_records_sends() {
        let dest = PortId::from_raw(4);
        let mut transport = MemoryTransport::with_destinations([dest]);
        transport.send_message(dest, &[0x90, 60, 64]).unwrap();
        assert!(matches!(
            transport.send_message(PortId::from_raw(9), &[0x80, 60, 64]),
            Err(MidiError::UnknownPort(_))
        ));
        assert_eq!(transport.sent(), vec![(dest, vec![0x90, 60, 64])]);
    }
}
