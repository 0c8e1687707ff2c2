use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::hotplug::{DEFAULT_POLL_INTERVAL, DEFAULT_RESCAN_DELAY};

/// Settings for the MIDI backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiSettings {
    /// Client name registered with the OS MIDI service.
    pub client_name: String,
    /// Only connect inputs whose name contains this text (case-insensitive).
    pub input_filter: Option<String>,
    /// Only connect outputs whose name contains this text (case-insensitive).
    pub output_filter: Option<String>,
    /// Publish a virtual input and output named after the client (Unix only).
    pub virtual_ports: bool,
    /// Channel (0-15) used for outbound messages. Larger values are
    /// clamped to 15, see [`MidiSettings::channel`].
    pub output_channel: u8,
    pub rescan_delay_ms: u64,
    pub hotplug_poll_ms: u64,
}

impl Default for MidiSettings {
    fn default() -> Self {
        Self {
            client_name: "keybed".to_string(),
            input_filter: None,
            output_filter: None,
            virtual_ports: false,
            output_channel: 0,
            rescan_delay_ms: DEFAULT_RESCAN_DELAY.as_millis() as u64,
            hotplug_poll_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
        }
    }
}

impl MidiSettings {
    pub fn with_client_name<S: Into<String>>(mut self, name: S) -> Self {
        self.client_name = name.into();
        self
    }

    pub fn with_input_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.input_filter = Some(filter.into());
        self
    }

    pub fn with_output_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.output_filter = Some(filter.into());
        self
    }

    pub fn with_virtual_ports(mut self, enabled: bool) -> Self {
        self.virtual_ports = enabled;
        self
    }

    pub fn with_output_channel(mut self, channel: u8) -> Self {
        self.output_channel = channel.min(15);
        self
    }

    /// Outbound channel as it goes on the wire.
    pub fn channel(&self) -> u8 {
        self.output_channel.min(15)
    }

    pub fn rescan_delay(&self) -> Duration {
        Duration::from_millis(self.rescan_delay_ms)
    }

    pub fn hotplug_poll_interval(&self) -> Duration {
        Duration::from_millis(self.hotplug_poll_ms.max(1))
    }

    /// Whether a system input port should be connected.
    pub fn accepts_input(&self, name: &str) -> bool {
        !self.is_own_port(name) && matches_filter(self.input_filter.as_deref(), name)
    }

    /// Whether a system output port should be connected.
    pub fn accepts_output(&self, name: &str) -> bool {
        !self.is_own_port(name) && matches_filter(self.output_filter.as_deref(), name)
    }

    /// Our own virtual ports show up in the system list; connecting to them
    /// would loop our output back into our input.
    fn is_own_port(&self, name: &str) -> bool {
        self.virtual_ports && name.to_lowercase().contains(&self.client_name.to_lowercase())
    }
}

fn matches_filter(filter: Option<&str>, name: &str) -> bool {
    match filter.map(str::trim) {
        None | Some("") => true,
        Some(filter) => name.to_lowercase().contains(&filter.to_lowercase()),
    }
}
