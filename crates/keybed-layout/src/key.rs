//! Numbering of the 88 keys, from A0 (index 0) to C8 (index 87).

use std::fmt;

/// Number of keys on the keyboard.
pub const KEY_COUNT: usize = 88;
/// Number of white keys (7 full octaves plus A0, B0 and C8).
pub const WHITE_KEY_COUNT: usize = 52;
/// Number of black keys.
pub const BLACK_KEY_COUNT: usize = KEY_COUNT - WHITE_KEY_COUNT;
/// MIDI note number of key index 0.
pub const LOWEST_NOTE: u8 = 21;
/// MIDI note number of key index 87.
pub const HIGHEST_NOTE: u8 = LOWEST_NOTE + (KEY_COUNT as u8 - 1);

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Returned when a raw number does not name one of the 88 keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("key index {0} is outside 0..88")]
pub struct KeyOutOfRange(pub usize);

/// Whether the key at `index` is black.
///
/// The first three keys (A0, A#0, B0) form a partial octave; from C1 onwards
/// every 12-key block starting at index 3 has its black keys at block offsets
/// 1, 3, 6, 8 and 10.
pub const fn is_black_index(index: usize) -> bool {
    if index < 3 {
        return index == 1;
    }
    matches!((index - 3) % 12, 1 | 3 | 6 | 8 | 10)
}

/// Validated index of one of the 88 keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "usize", into = "usize")
)]
pub struct KeyIndex(u8);

impl KeyIndex {
    pub const LOWEST: KeyIndex = KeyIndex(0);
    pub const HIGHEST: KeyIndex = KeyIndex(KEY_COUNT as u8 - 1);

    /// Returns `None` when `index >= 88`.
    pub const fn new(index: usize) -> Option<Self> {
        if index < KEY_COUNT {
            Some(Self(index as u8))
        } else {
            None
        }
    }

    /// Maps a MIDI note number onto the keyboard (`note + 3 - 24`).
    pub const fn from_note(note: u8) -> Option<Self> {
        if note < LOWEST_NOTE || note > HIGHEST_NOTE {
            return None;
        }
        Some(Self(note + 3 - 24))
    }

    /// MIDI note number sounded by this key.
    pub const fn note(self) -> u8 {
        self.0 + 24 - 3
    }

    pub const fn get(self) -> usize {
        self.0 as usize
    }

    pub const fn is_black(self) -> bool {
        is_black_index(self.0 as usize)
    }

    /// Every key from lowest to highest.
    pub fn all() -> impl DoubleEndedIterator<Item = KeyIndex> + ExactSizeIterator {
        (0..KEY_COUNT as u8).map(KeyIndex)
    }
}

impl TryFrom<usize> for KeyIndex {
    type Error = KeyOutOfRange;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        KeyIndex::new(value).ok_or(KeyOutOfRange(value))
    }
}

impl From<KeyIndex> for usize {
    fn from(key: KeyIndex) -> Self {
        key.get()
    }
}

/// Scientific pitch name, e.g. `A0`, `C#4`.
impl fmt::Display for KeyIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let note = self.note() as usize;
        let octave = note as i32 / 12 - 1;
        write!(f, "{}{}", NOTE_NAMES[note % 12], octave)
    }
}
