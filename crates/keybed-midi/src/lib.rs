//! MIDI boundary of the keyboard: the wire codec, port bookkeeping and a
//! `midir` backend with debounced hotplug rescans.

use thiserror::Error;

pub mod backend_midir;
pub mod config;
pub mod device;
pub mod hotplug;
pub mod message;

pub use backend_midir::{MidirTransport, PortListing};
pub use config::MidiSettings;
pub use device::{InboundSink, MemoryTransport, MidiTransport, NullTransport, PortId, PortTable};
pub use hotplug::{DebounceCounter, HotplugWatcher, RescanDebouncer};
pub use message::{DecodeError, KeyboardMessage, Pedal};

/// Errors that can be produced while dealing with MIDI backends.
#[derive(Debug, Error)]
pub enum MidiError {
    /// The requested port is not open.
    #[error("unknown MIDI port {0}")]
    UnknownPort(PortId),
    /// Backend specific failure with additional context.
    #[error("backend error: {0}")]
    Backend(String),
}
