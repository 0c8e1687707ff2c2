//! Three-byte channel messages exchanged with MIDI devices.

use keybed_layout::KeyIndex;
use thiserror::Error;

pub const NOTE_OFF: u8 = 0x80;
pub const NOTE_ON: u8 = 0x90;
pub const CONTROL_CHANGE: u8 = 0xB0;

/// Controller number of the damper (sustain) pedal.
pub const DAMPER_CONTROLLER: u8 = 0x40;
/// Controller number of the soft pedal.
pub const SOFT_CONTROLLER: u8 = 0x43;

/// Velocity attached to every outbound note message.
pub const OUTBOUND_VELOCITY: u8 = 0x40;
pub const PEDAL_ON_VALUE: u8 = 127;
pub const PEDAL_OFF_VALUE: u8 = 0;

/// Why an inbound message was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("expected a 3-byte message, got {0} bytes")]
    Length(usize),
    #[error("first byte 0x{0:02x} is not a status byte")]
    Status(u8),
    #[error("data byte 0x{0:02x} has its high bit set")]
    Data(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pedal {
    Damper,
    Soft,
}

impl Pedal {
    pub const ALL: [Pedal; 2] = [Pedal::Damper, Pedal::Soft];

    pub const fn controller(self) -> u8 {
        match self {
            Pedal::Damper => DAMPER_CONTROLLER,
            Pedal::Soft => SOFT_CONTROLLER,
        }
    }

    pub const fn from_controller(controller: u8) -> Option<Self> {
        match controller {
            DAMPER_CONTROLLER => Some(Pedal::Damper),
            SOFT_CONTROLLER => Some(Pedal::Soft),
            _ => None,
        }
    }
}

/// The subset of MIDI the keyboard reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyboardMessage {
    NoteOn(KeyIndex),
    NoteOff(KeyIndex),
    Pedal { pedal: Pedal, on: bool },
}

impl KeyboardMessage {
    pub fn key(key: KeyIndex, pressed: bool) -> Self {
        if pressed {
            KeyboardMessage::NoteOn(key)
        } else {
            KeyboardMessage::NoteOff(key)
        }
    }

    /// Parses raw bytes received from a device.
    ///
    /// Messages the keyboard has no use for (other commands, other
    /// controllers, notes outside the 88-key range) decode to `Ok(None)`.
    /// Note and controller messages must be exactly three bytes long.
    pub fn decode(bytes: &[u8]) -> Result<Option<Self>, DecodeError> {
        let Some(&status) = bytes.first() else {
            return Err(DecodeError::Length(0));
        };
        if status & 0x80 == 0 {
            return Err(DecodeError::Status(status));
        }
        if !matches!(status & 0xF0, NOTE_OFF | NOTE_ON | CONTROL_CHANGE) {
            return Ok(None);
        }
        let [_, data1, data2] = <[u8; 3]>::try_from(bytes)
            .map_err(|_| DecodeError::Length(bytes.len()))?;
        if let Some(bad) = [data1, data2].into_iter().find(|byte| byte & 0x80 != 0) {
            return Err(DecodeError::Data(bad));
        }

        let message = match status & 0xF0 {
            NOTE_OFF => KeyIndex::from_note(data1).map(KeyboardMessage::NoteOff),
            NOTE_ON if data2 == 0 => KeyIndex::from_note(data1).map(KeyboardMessage::NoteOff),
            NOTE_ON => KeyIndex::from_note(data1).map(KeyboardMessage::NoteOn),
            CONTROL_CHANGE => Pedal::from_controller(data1).map(|pedal| KeyboardMessage::Pedal {
                pedal,
                on: data2 != 0,
            }),
            _ => None,
        };
        Ok(message)
    }

    /// Encodes the message on `channel` (only the low nibble is used).
    pub fn encode(self, channel: u8) -> [u8; 3] {
        let channel = channel & 0x0F;
        match self {
            KeyboardMessage::NoteOn(key) => [NOTE_ON | channel, key.note(), OUTBOUND_VELOCITY],
            KeyboardMessage::NoteOff(key) => [NOTE_OFF | channel, key.note(), OUTBOUND_VELOCITY],
            KeyboardMessage::Pedal { pedal, on } => [
                CONTROL_CHANGE | channel,
                pedal.controller(),
                if on { PEDAL_ON_VALUE } else { PEDAL_OFF_VALUE },
            ],
        }
    }
}
