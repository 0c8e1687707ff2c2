//! Press state of the 88 keys and both pedals.

use crossbeam_channel::{Receiver, Sender};
use keybed_layout::{KeyIndex, KEY_COUNT};
use keybed_midi::{DecodeError, KeyboardMessage, MidiTransport, Pedal, PortId};
use tracing::{debug, warn};

use crate::config::KeybedConfig;
use crate::mirror::PressMirror;
use crate::subscribe::Watchers;
use crate::throttle::{Admit, LogThrottle};

/// Where a state change came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Pointer input or programmatic calls; mirrored to every destination.
    Local,
    /// A device; only updates state so nothing is echoed back.
    Remote(PortId),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PedalState {
    pub damper: bool,
    pub soft: bool,
}

impl PedalState {
    pub fn get(self, pedal: Pedal) -> bool {
        match pedal {
            Pedal::Damper => self.damper,
            Pedal::Soft => self.soft,
        }
    }

    fn set(&mut self, pedal: Pedal, on: bool) {
        match pedal {
            Pedal::Damper => self.damper = on,
            Pedal::Soft => self.soft = on,
        }
    }
}

/// Single owner of press, glissando and pedal state.
///
/// Every change is idempotent: setting a key or pedal to the state it is
/// already in neither notifies subscribers nor sends anything. The model is
/// not shared; other threads reach it through a
/// [`ControlHandle`](crate::ControlHandle).
pub struct KeyboardModel {
    pressed: [bool; KEY_COUNT],
    glissando: Option<KeyIndex>,
    pedals: PedalState,
    key_watchers: Vec<Watchers<bool>>,
    pedal_watchers: Watchers<PedalState>,
    transport: Box<dyn MidiTransport>,
    destinations: Vec<PortId>,
    output_channel: u8,
    mirror: PressMirror,
    malformed: LogThrottle,
    send_failures: LogThrottle,
}

impl KeyboardModel {
    pub fn new(transport: Box<dyn MidiTransport>) -> Self {
        Self::with_config(transport, &KeybedConfig::default())
    }

    pub fn with_config(transport: Box<dyn MidiTransport>, config: &KeybedConfig) -> Self {
        let destinations = transport.destinations();
        Self {
            pressed: [false; KEY_COUNT],
            glissando: None,
            pedals: PedalState::default(),
            key_watchers: (0..KEY_COUNT).map(|_| Watchers::default()).collect(),
            pedal_watchers: Watchers::default(),
            transport,
            destinations,
            output_channel: config.midi.channel(),
            mirror: PressMirror::default(),
            malformed: LogThrottle::new(config.malformed_log_limit),
            send_failures: LogThrottle::new(config.malformed_log_limit),
        }
    }

    pub fn is_pressed(&self, key: KeyIndex) -> bool {
        self.pressed[key.get()]
    }

    pub fn pressed_keys(&self) -> impl Iterator<Item = KeyIndex> + '_ {
        KeyIndex::all().filter(|key| self.pressed[key.get()])
    }

    pub fn glissando(&self) -> Option<KeyIndex> {
        self.glissando
    }

    pub fn pedals(&self) -> PedalState {
        self.pedals
    }

    pub fn destinations(&self) -> &[PortId] {
        &self.destinations
    }

    pub fn output_channel(&self) -> u8 {
        self.output_channel
    }

    /// Shared lock-free copy of the state.
    pub fn mirror(&self) -> &PressMirror {
        &self.mirror
    }

    /// Replace the mirror, copying the current state into it.
    pub(crate) fn attach_mirror(&mut self, mirror: PressMirror) {
        for key in KeyIndex::all() {
            mirror.store_key(key, self.pressed[key.get()]);
        }
        for pedal in Pedal::ALL {
            mirror.store_pedal(pedal, self.pedals.get(pedal));
        }
        self.mirror = mirror;
    }

    /// Inbound messages rejected as malformed so far.
    pub fn malformed_total(&self) -> u64 {
        self.malformed.total()
    }

    /// Outbound sends that failed so far.
    pub fn send_failure_total(&self) -> u64 {
        self.send_failures.total()
    }

    /// Local press or release. Returns whether the state changed.
    pub fn set_pressed(&mut self, key: KeyIndex, pressed: bool) -> bool {
        self.apply_key(key, pressed, Origin::Local)
    }

    /// Local pedal change. Returns whether the state changed.
    pub fn set_pedal(&mut self, pedal: Pedal, on: bool) -> bool {
        self.apply_pedal(pedal, on, Origin::Local)
    }

    pub fn apply_key(&mut self, key: KeyIndex, pressed: bool, origin: Origin) -> bool {
        let slot = key.get();
        if self.pressed[slot] == pressed {
            return false;
        }
        self.pressed[slot] = pressed;
        self.mirror.store_key(key, pressed);
        self.key_watchers[slot].publish(&pressed);
        debug!(%key, pressed, ?origin, "key state changed");
        if origin == Origin::Local {
            self.send(KeyboardMessage::key(key, pressed));
        }
        true
    }

    pub fn apply_pedal(&mut self, pedal: Pedal, on: bool, origin: Origin) -> bool {
        if self.pedals.get(pedal) == on {
            return false;
        }
        self.pedals.set(pedal, on);
        self.mirror.store_pedal(pedal, on);
        let state = self.pedals;
        self.pedal_watchers.publish(&state);
        debug!(?pedal, on, ?origin, "pedal state changed");
        if origin == Origin::Local {
            self.send(KeyboardMessage::Pedal { pedal, on });
        }
        true
    }

    pub fn apply_message(&mut self, message: KeyboardMessage, origin: Origin) -> bool {
        match message {
            KeyboardMessage::NoteOn(key) => self.apply_key(key, true, origin),
            KeyboardMessage::NoteOff(key) => self.apply_key(key, false, origin),
            KeyboardMessage::Pedal { pedal, on } => self.apply_pedal(pedal, on, origin),
        }
    }

    /// Move the glissando cursor onto `key`.
    ///
    /// The previous cursor key is released before `key` is pressed, so at most
    /// one glissando key is ever down.
    pub fn glissando_to(&mut self, key: KeyIndex) {
        if self.glissando == Some(key) {
            return;
        }
        if let Some(previous) = self.glissando.take() {
            self.apply_key(previous, false, Origin::Local);
        }
        self.apply_key(key, true, Origin::Local);
        self.glissando = Some(key);
    }

    pub fn end_glissando(&mut self) {
        if let Some(previous) = self.glissando.take() {
            self.apply_key(previous, false, Origin::Local);
        }
    }

    /// All notes off: releases every key and pedal as local changes.
    pub fn reset(&mut self) {
        self.end_glissando();
        for key in KeyIndex::all() {
            self.apply_key(key, false, Origin::Local);
        }
        for pedal in Pedal::ALL {
            self.apply_pedal(pedal, false, Origin::Local);
        }
        self.mirror.mark_reset();
    }

    /// Decode and apply bytes received from `port`.
    pub fn receive(&mut self, port: PortId, bytes: &[u8]) {
        match KeyboardMessage::decode(bytes) {
            Ok(Some(message)) => {
                self.apply_message(message, Origin::Remote(port));
            }
            Ok(None) => {}
            Err(err) => self.report_malformed(port, bytes, err),
        }
    }

    pub fn set_destinations(&mut self, destinations: Vec<PortId>) {
        debug!(count = destinations.len(), "MIDI destinations changed");
        self.destinations = destinations;
    }

    /// Subscribe to one key. The current state arrives first.
    pub fn subscribe_key(&mut self, key: KeyIndex) -> Receiver<bool> {
        let current = self.pressed[key.get()];
        self.key_watchers[key.get()].subscribe(current)
    }

    pub fn register_key_watcher(&mut self, key: KeyIndex, sender: Sender<bool>) {
        let current = self.pressed[key.get()];
        self.key_watchers[key.get()].register(sender, current);
    }

    pub fn subscribe_pedals(&mut self) -> Receiver<PedalState> {
        self.pedal_watchers.subscribe(self.pedals)
    }

    pub fn register_pedal_watcher(&mut self, sender: Sender<PedalState>) {
        self.pedal_watchers.register(sender, self.pedals);
    }

    fn send(&mut self, message: KeyboardMessage) {
        let bytes = message.encode(self.output_channel);
        for &destination in &self.destinations {
            let Err(err) = self.transport.send_message(destination, &bytes) else {
                continue;
            };
            match self.send_failures.admit() {
                Admit::Log => warn!(%err, %destination, "failed to send MIDI message"),
                Admit::Last => warn!(
                    %err,
                    %destination,
                    "failed to send MIDI message; suppressing further send errors"
                ),
                Admit::Suppressed => {}
            }
        }
    }

    fn report_malformed(&mut self, port: PortId, bytes: &[u8], err: DecodeError) {
        match self.malformed.admit() {
            Admit::Log => warn!(%err, %port, ?bytes, "dropping malformed MIDI message"),
            Admit::Last => warn!(
                %err,
                %port,
                ?bytes,
                "dropping malformed MIDI message; suppressing further reports"
            ),
            Admit::Suppressed => {}
        }
    }
}
