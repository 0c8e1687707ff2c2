//! Pointer-to-key resolution.
//!
//! Below the black keys only white keys are reachable and they share a uniform
//! pitch, so the key is found by division. In the band where black keys
//! protrude, key widths vary and the key is found by binary search over all
//! 88 keys in positional order.

use crate::geometry::KeyboardGeometry;
use crate::key::{KeyIndex, KEY_COUNT, WHITE_KEY_COUNT};

/// A position in the container's coordinate space, `y` growing downwards.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl KeyboardGeometry {
    /// Vertical position from which only white keys can be hit.
    pub fn white_band_start(&self) -> f32 {
        1.5 * self.gap() + self.black_key_length()
    }

    /// Half-open horizontal interval that claims pointer hits for `key` in the
    /// black-key band: the top edge widened by half a gap on each side.
    pub fn hit_interval(&self, key: KeyIndex) -> (f32, f32) {
        let rect = self.key(key);
        let half_gap = self.gap() / 2.0;
        (rect.top_left - half_gap, rect.top_right + half_gap)
    }

    /// Resolves the key under `point`. Always succeeds; positions outside the
    /// keyboard clamp to the nearest edge key.
    pub fn locate(&self, point: Point) -> KeyIndex {
        if point.y >= self.white_band_start() {
            self.locate_white(point.x)
        } else {
            self.locate_any(point.x)
        }
    }

    fn locate_white(&self, x: f32) -> KeyIndex {
        let offset = (x - self.origin()) / self.white_key_width();
        // NaN and negative offsets saturate to zero, +inf to the last slot.
        let mut slot = (offset.floor().max(0.0) as usize).min(WHITE_KEY_COUNT - 1);
        // Bottom edges sit on the alignment grid, so the estimate can be a
        // slot off near an edge. Settle it against the edges themselves.
        let whites = self.white_keys();
        while slot > 0 && x < self.key(whites[slot]).bottom_left {
            slot -= 1;
        }
        while slot + 1 < WHITE_KEY_COUNT {
            let left = self.key(whites[slot]).bottom_left;
            let next = self.key(whites[slot + 1]).bottom_left;
            // Collapsed keys share one edge; never walk across them.
            if x < next || next <= left {
                break;
            }
            slot += 1;
        }
        whites[slot]
    }

    /// Binary search over keys ordered by position.
    ///
    /// Alignment rounding can leave a sliver between two neighbours' hit
    /// intervals. A query in such a sliver matches no interval; the bounds
    /// still converge and the key they settle on is returned.
    fn locate_any(&self, x: f32) -> KeyIndex {
        let mut lo = 0usize;
        let mut hi = KEY_COUNT - 1;
        while lo < hi {
            let mid = (lo + hi) / 2;
            let key = KeyIndex::new(mid).unwrap_or(KeyIndex::HIGHEST);
            let (start, end) = self.hit_interval(key);
            if x < start {
                hi = mid.saturating_sub(1).max(lo);
            } else if x >= end {
                lo = mid + 1;
            } else {
                return key;
            }
        }
        KeyIndex::new(lo).unwrap_or(KeyIndex::HIGHEST)
    }
}

/// Convenience wrapper around [`KeyboardGeometry::locate`].
pub fn locate_key(point: Point, geometry: &KeyboardGeometry) -> KeyIndex {
    geometry.locate(point)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::SizingMode;

    fn reference() -> KeyboardGeometry {
        KeyboardGeometry::compute(1040.0, 120.0, 1.0, SizingMode::ExactFit)
    }

    #[test]
    fn lower_band_uses_white_keys_only() {
        let geometry = reference();
        let y = geometry.white_band_start() + 1.0;
        for (slot, key) in geometry.white_keys().iter().enumerate() {
            let rect = geometry.key(*key);
            let centre = (rect.bottom_left + rect.bottom_right) / 2.0;
            assert_eq!(geometry.locate(Point::new(centre, y)), *key, "slot {slot}");
        }
    }

    #[test]
    fn lower_band_respects_aligned_edges() {
        let geometry = reference();
        let y = geometry.white_band_start() + 1.0;
        for key in geometry.white_keys() {
            let rect = geometry.key(*key);
            let inside_left = Point::new(rect.bottom_left + 0.1, y);
            let inside_right = Point::new(rect.bottom_right - 0.1, y);
            assert_eq!(geometry.locate(inside_left), *key, "left edge of {key}");
            assert_eq!(geometry.locate(inside_right), *key, "right edge of {key}");
        }
    }

    #[test]
    fn upper_band_finds_black_keys() {
        let geometry = reference();
        let y = geometry.gap() + 1.0;
        for key in geometry.black_keys() {
            let rect = geometry.key(*key);
            let centre = (rect.top_left + rect.top_right) / 2.0;
            assert_eq!(geometry.locate(Point::new(centre, y)), *key);
        }
    }

    #[test]
    fn upper_band_finds_narrowed_white_keys() {
        let geometry = reference();
        let d1 = KeyIndex::new(5).unwrap();
        let rect = geometry.key(d1);
        let x = (rect.top_left + rect.top_right) / 2.0;
        assert_eq!(geometry.locate(Point::new(x, 2.0)), d1);
    }

    #[test]
    fn half_gap_between_black_and_white_is_split() {
        let geometry = reference();
        let c_sharp = KeyIndex::new(4).unwrap();
        let c1 = KeyIndex::new(3).unwrap();
        let rect = geometry.key(c_sharp);
        let quarter_gap = geometry.gap() / 4.0;
        assert_eq!(geometry.locate(Point::new(rect.top_left - quarter_gap, 2.0)), c_sharp);
        assert_eq!(
            geometry.locate(Point::new(rect.top_left - 3.0 * quarter_gap, 2.0)),
            c1
        );
    }

    #[test]
    fn out_of_range_points_clamp_to_edge_keys() {
        let geometry = reference();
        let low = geometry.white_band_start() + 5.0;
        assert_eq!(geometry.locate(Point::new(-50.0, low)), KeyIndex::LOWEST);
        assert_eq!(geometry.locate(Point::new(5000.0, low)), KeyIndex::HIGHEST);
        assert_eq!(geometry.locate(Point::new(-50.0, 0.0)), KeyIndex::LOWEST);
        assert_eq!(geometry.locate(Point::new(5000.0, 0.0)), KeyIndex::HIGHEST);
        assert_eq!(geometry.locate(Point::new(-50.0, -10.0)), KeyIndex::LOWEST);
    }

    #[test]
    fn non_finite_points_do_not_panic() {
        let geometry = reference();
        for point in [
            Point::new(f32::NAN, 10.0),
            Point::new(10.0, f32::NAN),
            Point::new(f32::INFINITY, 500.0),
            Point::new(f32::NEG_INFINITY, 500.0),
        ] {
            let key = geometry.locate(point);
            assert!(key.get() < KEY_COUNT);
        }
    }

    #[test]
    fn zero_width_keyboard_still_resolves() {
        let geometry = KeyboardGeometry::compute(0.0, 0.0, 0.0, SizingMode::ExactFit);
        assert_eq!(geometry.locate(Point::new(0.0, 0.0)), KeyIndex::LOWEST);
        assert!(geometry.locate(Point::new(3.0, -3.0)).get() < KEY_COUNT);
    }
}
