use std::sync::Arc;

use keybed_layout::{GeometryCache, KeyIndex, KeyboardGeometry, Point};
use tracing::warn;

use crate::config::LayoutSettings;
use crate::control::ControlHandle;

/// Pointer side of the keyboard, living on the gesture/UI thread.
///
/// Holds the geometry for the current surface size and turns pointer
/// events into glissando commands. Only key changes are submitted, so
/// moving within one key does not touch the control queue. A reset seen
/// through the mirror forgets the held key, so the next move presses it
/// again.
pub struct KeyboardSurface {
    cache: GeometryCache,
    min_pixel_unit: f32,
    geometry: Option<Arc<KeyboardGeometry>>,
    handle: ControlHandle,
    dragging: bool,
    current: Option<KeyIndex>,
    resets_seen: u64,
}

impl KeyboardSurface {
    pub fn new(handle: ControlHandle, settings: LayoutSettings) -> Self {
        Self {
            cache: GeometryCache::new(settings.mode),
            min_pixel_unit: settings.min_pixel_unit,
            geometry: None,
            dragging: false,
            current: None,
            resets_seen: handle.mirror().reset_count(),
            handle,
        }
    }

    /// Layout pass: recompute geometry if the size changed.
    pub fn resize(&mut self, width: f32, height: f32) -> Arc<KeyboardGeometry> {
        let geometry = self.cache.layout(width, height, self.min_pixel_unit);
        self.geometry = Some(Arc::clone(&geometry));
        geometry
    }

    pub fn geometry(&self) -> Option<&Arc<KeyboardGeometry>> {
        self.geometry.as_ref()
    }

    /// Key currently held by the pointer.
    pub fn current(&self) -> Option<KeyIndex> {
        self.current
    }

    pub fn pointer_down(&mut self, point: Point) -> Option<KeyIndex> {
        self.dragging = true;
        self.track(point)
    }

    /// Ignored unless the pointer is down.
    pub fn pointer_moved(&mut self, point: Point) -> Option<KeyIndex> {
        if !self.dragging {
            return None;
        }
        self.track(point)
    }

    pub fn pointer_up(&mut self) {
        if !self.dragging {
            return;
        }
        self.dragging = false;
        self.current = None;
        if let Err(err) = self.handle.end_glissando() {
            warn!(%err, "failed to end glissando");
        }
    }

    fn track(&mut self, point: Point) -> Option<KeyIndex> {
        let key = self.geometry.as_ref()?.locate(point);
        let resets = self.handle.mirror().reset_count();
        if resets != self.resets_seen {
            self.resets_seen = resets;
            self.current = None;
        }
        if self.current != Some(key) {
            match self.handle.glissando_to(key) {
                Ok(()) => self.current = Some(key),
                Err(err) => warn!(%err, %key, "failed to move glissando"),
            }
        }
        self.current
    }
}
