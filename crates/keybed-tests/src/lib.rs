//! Shared fixtures for the end-to-end tests.

use keybed_core::{ControlHandle, ControlQueue, KeyboardModel, ManualContext};
use keybed_layout::KeyIndex;
use keybed_midi::{MemoryTransport, PortId};

/// Panics outside 0..88; test input only.
pub fn key(index: usize) -> KeyIndex {
    KeyIndex::new(index).unwrap_or_else(|| panic!("no key at index {index}"))
}

/// A model driven by a [`ManualContext`] whose transport records every send
/// to the given destination ids.
pub fn connected(destinations: &[u32]) -> (ManualContext, ControlHandle, MemoryTransport) {
    let transport =
        MemoryTransport::with_destinations(destinations.iter().copied().map(PortId::from_raw));
    let queue = ControlQueue::new(64);
    let handle = queue.handle();
    let context = ManualContext::new(queue, KeyboardModel::new(Box::new(transport.clone())));
    (context, handle, transport)
}
