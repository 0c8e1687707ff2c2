use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use keybed_layout::{KeyIndex, KEY_COUNT};
use keybed_midi::Pedal;

use crate::model::PedalState;

#[derive(Debug)]
struct MirrorCells {
    keys: [AtomicBool; KEY_COUNT],
    damper: AtomicBool,
    soft: AtomicBool,
    resets: AtomicU64,
}

/// Lock-free copy of the press state for readers outside the control
/// context. Only the model writes to it.
#[derive(Debug, Clone)]
pub struct PressMirror {
    cells: Arc<MirrorCells>,
}

impl Default for PressMirror {
    fn default() -> Self {
        Self {
            cells: Arc::new(MirrorCells {
                keys: std::array::from_fn(|_| AtomicBool::new(false)),
                damper: AtomicBool::new(false),
                soft: AtomicBool::new(false),
                resets: AtomicU64::new(0),
            }),
        }
    }
}

impl PressMirror {
    pub fn is_pressed(&self, key: KeyIndex) -> bool {
        self.cells.keys[key.get()].load(Ordering::Acquire)
    }

    pub fn pressed_keys(&self) -> Vec<KeyIndex> {
        KeyIndex::all().filter(|key| self.is_pressed(*key)).collect()
    }

    pub fn pedals(&self) -> PedalState {
        PedalState {
            damper: self.cells.damper.load(Ordering::Acquire),
            soft: self.cells.soft.load(Ordering::Acquire),
        }
    }

    /// Bumped after every reset, once all keys have been released.
    pub fn reset_count(&self) -> u64 {
        self.cells.resets.load(Ordering::Acquire)
    }

    pub(crate) fn store_key(&self, key: KeyIndex, pressed: bool) {
        self.cells.keys[key.get()].store(pressed, Ordering::Release);
    }

    pub(crate) fn store_pedal(&self, pedal: Pedal, on: bool) {
        let cell = match pedal {
            Pedal::Damper => &self.cells.damper,
            Pedal::Soft => &self.cells.soft,
        };
        cell.store(on, Ordering::Release);
    }

    pub(crate) fn mark_reset(&self) {
        self.cells.resets.fetch_add(1, Ordering::AcqRel);
    }
}
