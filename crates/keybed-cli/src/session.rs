use std::sync::Arc;

use anyhow::Result;
use keybed_core::{ControlHandle, ControlQueue, KeybedConfig, KeyboardModel, ThreadContext};
use keybed_midi::{HotplugWatcher, MidirTransport, PortListing, RescanDebouncer};
use tracing::warn;

/// A live connection to the system's MIDI ports driving one keyboard model.
///
/// Fields drop in order: hotplug polling stops before the control thread.
pub struct Session {
    _hotplug: HotplugWatcher,
    context: Option<ThreadContext>,
    transport: MidirTransport,
    handle: ControlHandle,
}

impl Session {
    pub fn open(config: &KeybedConfig) -> Result<Self> {
        let queue = ControlQueue::new(config.control_queue_capacity);
        let handle = queue.handle();
        let transport = MidirTransport::open(config.midi.clone(), Arc::new(handle.clone()))?;
        let model = KeyboardModel::with_config(Box::new(transport.clone()), config);
        let context = ThreadContext::spawn(queue, model)?;

        let rescanner = transport.clone();
        let debouncer = RescanDebouncer::spawn(config.midi.rescan_delay(), move || {
            if let Err(err) = rescanner.rescan() {
                warn!(?err, "MIDI rescan failed");
            }
        })?;
        let client = config.midi.client_name.clone();
        let hotplug = HotplugWatcher::spawn(
            config.midi.hotplug_poll_interval(),
            move || MidirTransport::list_ports(&client).map(|listing| listing.snapshot()),
            move |_| debouncer.notify(),
        )?;

        Ok(Self {
            _hotplug: hotplug,
            context: Some(context),
            transport,
            handle,
        })
    }

    pub fn handle(&self) -> &ControlHandle {
        &self.handle
    }

    pub fn transport(&self) -> &MidirTransport {
        &self.transport
    }

    /// Drain the control queue and stop the control thread.
    pub fn close(mut self) -> Option<KeyboardModel> {
        self.context.take().and_then(ThreadContext::shutdown)
    }
}

pub fn print_listing(listing: &PortListing) {
    if listing.inputs.is_empty() {
        println!("No MIDI inputs reported by the system.");
    } else {
        println!("MIDI inputs:");
        for name in &listing.inputs {
            println!("  {name}");
        }
    }
    if listing.outputs.is_empty() {
        println!("No MIDI outputs reported by the system.");
    } else {
        println!("MIDI outputs:");
        for name in &listing.outputs {
            println!("  {name}");
        }
    }
}
