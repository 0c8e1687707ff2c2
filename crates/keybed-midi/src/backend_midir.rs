use std::sync::Arc;

use anyhow::{anyhow, Context};
use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::config::MidiSettings;
use crate::device::{InboundSink, MidiTransport, PortId, PortTable};
use crate::MidiError;

/// Port names reported by the OS.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortListing {
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

impl PortListing {
    /// Flat, sorted snapshot used to detect hotplug changes.
    pub fn snapshot(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inputs
            .iter()
            .map(|name| format!("in:{name}"))
            .chain(self.outputs.iter().map(|name| format!("out:{name}")))
            .collect();
        names.sort();
        names
    }
}

struct InputPort {
    name: Arc<str>,
    is_virtual: bool,
    _connection: MidiInputConnection<PortId>,
}

struct OutputPort {
    name: Arc<str>,
    is_virtual: bool,
    connection: MidiOutputConnection,
}

#[derive(Default)]
struct MidirState {
    inputs: PortTable<InputPort>,
    outputs: PortTable<OutputPort>,
}

/// Transport implemented using the `midir` crate.
///
/// Every connected input forwards its bytes to the [`InboundSink`] tagged
/// with the input's [`PortId`]. Clones share the same connections, so one
/// clone can be owned by the keyboard model while another is rescanned from
/// the hotplug thread.
#[derive(Clone)]
pub struct MidirTransport {
    settings: Arc<MidiSettings>,
    sink: Arc<dyn InboundSink>,
    state: Arc<Mutex<MidirState>>,
}

impl MidirTransport {
    /// Connect to every matching port and, if configured, publish virtual ports.
    pub fn open(settings: MidiSettings, sink: Arc<dyn InboundSink>) -> anyhow::Result<Self> {
        let transport = Self {
            settings: Arc::new(settings),
            sink,
            state: Arc::new(Mutex::new(MidirState::default())),
        };
        if transport.settings.virtual_ports {
            transport.open_virtual_ports()?;
        }
        transport.rescan()?;
        Ok(transport)
    }

    /// Enumerate the OS port names without connecting.
    pub fn list_ports(client_name: &str) -> anyhow::Result<PortListing> {
        let input = MidiInput::new(client_name).context("initialise midir for enumeration")?;
        let inputs = input
            .ports()
            .iter()
            .enumerate()
            .map(|(index, port)| {
                input
                    .port_name(port)
                    .unwrap_or_else(|_| format!("Input {index}"))
            })
            .collect();
        let output = MidiOutput::new(client_name).context("initialise midir for enumeration")?;
        let outputs = output
            .ports()
            .iter()
            .enumerate()
            .map(|(index, port)| {
                output
                    .port_name(port)
                    .unwrap_or_else(|_| format!("Output {index}"))
            })
            .collect();
        Ok(PortListing { inputs, outputs })
    }

    pub fn settings(&self) -> &MidiSettings {
        &self.settings
    }

    /// Reconcile connections with the current OS port list.
    ///
    /// Ports that vanished are closed, new matching ports are connected and
    /// keep their id for as long as they stay connected. The sink is told
    /// about the resulting destination set.
    pub fn rescan(&self) -> anyhow::Result<()> {
        let listing = Self::list_ports(&self.settings.client_name)?;
        let mut state = self.state.lock();

        state.inputs.retain(|id, port| {
            let keep = port.is_virtual || listing.inputs.iter().any(|name| **name == *port.name);
            if !keep {
                info!(port = %port.name, %id, "MIDI input disconnected");
            }
            keep
        });
        state.outputs.retain(|id, port| {
            let keep = port.is_virtual || listing.outputs.iter().any(|name| **name == *port.name);
            if !keep {
                info!(port = %port.name, %id, "MIDI output disconnected");
            }
            keep
        });

        for name in &listing.inputs {
            let connected = state.inputs.iter().any(|(_, port)| *port.name == **name);
            if connected || !self.settings.accepts_input(name) {
                continue;
            }
            match self.connect_input(&mut state.inputs, name) {
                Ok(id) => info!(port = %name, %id, "Connected MIDI input"),
                Err(err) => warn!(?err, port = %name, "failed to connect MIDI input"),
            }
        }
        for name in &listing.outputs {
            let connected = state.outputs.iter().any(|(_, port)| *port.name == **name);
            if connected || !self.settings.accepts_output(name) {
                continue;
            }
            match self.connect_output(&mut state.outputs, name) {
                Ok(id) => info!(port = %name, %id, "Connected MIDI output"),
                Err(err) => warn!(?err, port = %name, "failed to connect MIDI output"),
            }
        }

        let destinations = state.outputs.ids();
        drop(state);
        self.sink.destinations_changed(destinations);
        Ok(())
    }

    /// Connected inputs with their ids.
    pub fn inputs(&self) -> Vec<(PortId, String)> {
        self.state
            .lock()
            .inputs
            .iter()
            .map(|(id, port)| (id, port.name.to_string()))
            .collect()
    }

    /// Connected outputs with their ids.
    pub fn outputs(&self) -> Vec<(PortId, String)> {
        self.state
            .lock()
            .outputs
            .iter()
            .map(|(id, port)| (id, port.name.to_string()))
            .collect()
    }

    fn connect_input(&self, table: &mut PortTable<InputPort>, name: &str) -> anyhow::Result<PortId> {
        let mut input =
            MidiInput::new(&self.settings.client_name).context("initialise midir for input")?;
        input.ignore(Ignore::All);
        let port = input
            .ports()
            .into_iter()
            .find(|port| input.port_name(port).is_ok_and(|candidate| candidate == name))
            .ok_or_else(|| anyhow!("MIDI input '{name}' is no longer available"))?;
        let sink = Arc::clone(&self.sink);
        let client = self.settings.client_name.clone();
        table.try_insert_with(|id| {
            let connection = input
                .connect(
                    &port,
                    &format!("{client}-in-{}", id.raw()),
                    move |_timestamp, message, port: &mut PortId| {
                        sink.message_received(*port, message);
                    },
                    id,
                )
                .map_err(|err| anyhow!("failed to connect midi input: {err}"))?;
            Ok(InputPort {
                name: Arc::from(name),
                is_virtual: false,
                _connection: connection,
            })
        })
    }

    fn connect_output(
        &self,
        table: &mut PortTable<OutputPort>,
        name: &str,
    ) -> anyhow::Result<PortId> {
        let output =
            MidiOutput::new(&self.settings.client_name).context("initialise midir for output")?;
        let port = output
            .ports()
            .into_iter()
            .find(|port| output.port_name(port).is_ok_and(|candidate| candidate == name))
            .ok_or_else(|| anyhow!("MIDI output '{name}' is no longer available"))?;
        let client = self.settings.client_name.clone();
        table.try_insert_with(|id| {
            let connection = output
                .connect(&port, &format!("{client}-out-{}", id.raw()))
                .map_err(|err| anyhow!("failed to open MIDI output: {err}"))?;
            Ok(OutputPort {
                name: Arc::from(name),
                is_virtual: false,
                connection,
            })
        })
    }

    #[cfg(unix)]
    fn open_virtual_ports(&self) -> anyhow::Result<()> {
        use midir::os::unix::{VirtualInput, VirtualOutput};

        let client = self.settings.client_name.clone();
        let mut state = self.state.lock();

        let mut input = MidiInput::new(&client).context("initialise midir for virtual input")?;
        input.ignore(Ignore::All);
        let sink = Arc::clone(&self.sink);
        let input_name = format!("{client}-in");
        let id = state.inputs.try_insert_with(|id| {
            let connection = input
                .create_virtual(
                    &input_name,
                    move |_timestamp, message, port: &mut PortId| {
                        sink.message_received(*port, message);
                    },
                    id,
                )
                .map_err(|err| anyhow!("failed to create virtual MIDI input: {err}"))?;
            Ok::<_, anyhow::Error>(InputPort {
                name: Arc::from(input_name.as_str()),
                is_virtual: true,
                _connection: connection,
            })
        })?;
        info!(port = %input_name, %id, "Published virtual MIDI input");

        let output = MidiOutput::new(&client).context("initialise midir for virtual output")?;
        let output_name = format!("{client}-out");
        let id = state.outputs.try_insert_with(|_| {
            let connection = output
                .create_virtual(&output_name)
                .map_err(|err| anyhow!("failed to create virtual MIDI output: {err}"))?;
            Ok::<_, anyhow::Error>(OutputPort {
                name: Arc::from(output_name.as_str()),
                is_virtual: true,
                connection,
            })
        })?;
        info!(port = %output_name, %id, "Published virtual MIDI output");
        Ok(())
    }

    #[cfg(not(unix))]
    fn open_virtual_ports(&self) -> anyhow::Result<()> {
        warn!("virtual MIDI ports are not supported on this platform");
        Ok(())
    }
}

impl MidiTransport for MidirTransport {
    fn send_message(&mut self, destination: PortId, bytes: &[u8]) -> Result<(), MidiError> {
        let mut state = self.state.lock();
        let port = state
            .outputs
            .get_mut(destination)
            .ok_or(MidiError::UnknownPort(destination))?;
        port.connection
            .send(bytes)
            .map_err(|err| MidiError::Backend(format!("send to '{}' failed: {err}", port.name)))
    }

    fn destinations(&self) -> Vec<PortId> {
        self.state.lock().outputs.ids()
    }
}
