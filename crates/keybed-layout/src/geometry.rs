//! Pixel-aligned key geometry for the full 88-key keyboard.
//!
//! Every edge is snapped to the caller's minimum pixel unit so that edges
//! shared by neighbouring keys land on the same physical pixel.

use crate::key::{is_black_index, KeyIndex, KEY_COUNT, WHITE_KEY_COUNT};

/// Black key width relative to a white key (14/24 on a real keyboard).
const BLACK_WIDTH_RATIO: f32 = 14.0 / 24.0;
/// White key length relative to its width in [`SizingMode::PreferredAspect`].
const WHITE_ASPECT: f32 = 5.25;
const BLACK_LENGTH_RATIO: f32 = 0.63;
/// Centre-to-centre distance of C# and D#, in white key widths.
const TWO_GROUP_SPACING: f32 = 1.2;
/// Centre-to-centre distance of neighbours in F#/G#/A#, in white key widths.
const THREE_GROUP_SPACING: f32 = 8.0 / 7.0;
const WHITE_RADIUS_RATIO: f32 = 0.1;
const BLACK_RADIUS_RATIO: f32 = 0.15;
/// Gap between keys per unit of keyboard width.
const GAP_RATIO: f32 = 1.0 / 1000.0;

/// How key length is derived from the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum SizingMode {
    /// Keys fill the container height, one gap from the top and bottom edges.
    #[default]
    ExactFit,
    /// Keys keep a fixed length-to-width ratio and ignore the container height.
    PreferredAspect,
}

/// Rounds `value` to the nearest multiple of `unit`; identity when `unit` is zero.
pub fn align(value: f32, unit: f32) -> f32 {
    if unit > 0.0 {
        (value / unit).round() * unit
    } else {
        value
    }
}

fn sanitize(value: f32) -> f32 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Horizontal extent of one key.
///
/// Black keys do not narrow, so their top and bottom edges coincide. White
/// keys narrow at the top wherever a black neighbour intrudes.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KeyRect {
    pub is_black: bool,
    pub top_left: f32,
    pub top_right: f32,
    pub bottom_left: f32,
    pub bottom_right: f32,
}

impl KeyRect {
    fn black(left: f32, right: f32) -> Self {
        Self {
            is_black: true,
            top_left: left,
            top_right: right,
            bottom_left: left,
            bottom_right: right,
        }
    }

    pub fn top_width(&self) -> f32 {
        self.top_right - self.top_left
    }

    pub fn bottom_width(&self) -> f32 {
        self.bottom_right - self.bottom_left
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CornerRadii {
    pub white: f32,
    pub black: f32,
}

/// Lengths derived once per container size.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeometryParams {
    pub gap: f32,
    /// Unaligned white key pitch; white edges are aligned individually.
    pub white_key_width: f32,
    pub black_key_width: f32,
    pub white_key_length: f32,
    pub black_key_length: f32,
    pub two_group_spacing: f32,
    pub three_group_spacing: f32,
    pub radii: CornerRadii,
}

impl GeometryParams {
    /// Derives all lengths for a container. Degenerate inputs (negative,
    /// zero or non-finite) are treated as zero.
    pub fn derive(width: f32, height: f32, min_pixel_unit: f32, mode: SizingMode) -> Self {
        let width = sanitize(width);
        let height = sanitize(height);
        let unit = sanitize(min_pixel_unit);

        let gap = align(width * GAP_RATIO, unit).max(unit);
        let white = ((width - gap) / WHITE_KEY_COUNT as f32).max(0.0);
        let black = white * BLACK_WIDTH_RATIO;
        let raw_length = match mode {
            SizingMode::ExactFit => height - 2.0 * gap,
            SizingMode::PreferredAspect => white * WHITE_ASPECT,
        };

        let white_key_length = align(raw_length.max(0.0), unit).max(unit);
        let black_key_length = align(white_key_length * BLACK_LENGTH_RATIO, unit);
        let black_key_width = align(black, unit);

        Self {
            gap,
            white_key_width: white,
            black_key_width,
            white_key_length,
            black_key_length,
            two_group_spacing: align(white * TWO_GROUP_SPACING, unit),
            three_group_spacing: align(white * THREE_GROUP_SPACING, unit),
            radii: CornerRadii {
                white: align(white * WHITE_RADIUS_RATIO, unit),
                black: align(black_key_width * BLACK_RADIUS_RATIO, unit),
            },
        }
    }
}

/// Immutable geometry of all 88 keys for one container size.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KeyboardGeometry {
    width: f32,
    height: f32,
    min_pixel_unit: f32,
    mode: SizingMode,
    params: GeometryParams,
    /// Left edge of the first white slot.
    origin: f32,
    keys: Vec<KeyRect>,
    white_keys: Vec<KeyIndex>,
    black_keys: Vec<KeyIndex>,
}

impl KeyboardGeometry {
    /// Lays out the keyboard for a `width` x `height` container.
    pub fn compute(width: f32, height: f32, min_pixel_unit: f32, mode: SizingMode) -> Self {
        let params = GeometryParams::derive(width, height, min_pixel_unit, mode);
        let unit = sanitize(min_pixel_unit);
        let gap = params.gap;
        let white = params.white_key_width;
        let origin = gap / 2.0;

        let mut keys = vec![KeyRect::default(); KEY_COUNT];

        let mut place_black = |index: i32, centre: f32| {
            if !(0..KEY_COUNT as i32).contains(&index) {
                return;
            }
            let index = index as usize;
            debug_assert!(is_black_index(index), "key {index} is not black");
            let left = align(centre - params.black_key_width / 2.0, unit);
            keys[index] = KeyRect::black(left, left + params.black_key_width);
        };

        // C# and D# straddle the centre of D.
        for octave in 0..7 {
            let d_slot = 3 + 7 * octave;
            let mid = origin + (d_slot as f32 + 0.5) * white;
            let base = 12 * octave;
            place_black(base + 4, mid - params.two_group_spacing / 2.0);
            place_black(base + 6, mid + params.two_group_spacing / 2.0);
        }

        // F#, G# and A# centre on the G/A boundary. Octave -1 seeds A#0.
        for octave in -1..7 {
            let a_slot = 7 + 7 * octave;
            let mid = origin + a_slot as f32 * white;
            let base = 12 * octave;
            place_black(base + 9, mid - params.three_group_spacing);
            place_black(base + 11, mid);
            place_black(base + 13, mid + params.three_group_spacing);
        }

        let white_keys: Vec<KeyIndex> = KeyIndex::all()
            .filter(|key| !keys[key.get()].is_black)
            .collect();
        let black_keys: Vec<KeyIndex> = KeyIndex::all()
            .filter(|key| keys[key.get()].is_black)
            .collect();
        debug_assert_eq!(white_keys.len(), WHITE_KEY_COUNT);

        let edge = |slot: usize| align(origin + slot as f32 * white, unit);
        for (slot, key) in white_keys.iter().enumerate() {
            let rect = &mut keys[key.get()];
            rect.bottom_left = edge(slot);
            rect.bottom_right = edge(slot + 1);
        }

        for key in &white_keys {
            let index = key.get();
            let left_black = index
                .checked_sub(1)
                .map(|left| keys[left])
                .filter(|rect| rect.is_black);
            let right_black = keys.get(index + 1).copied().filter(|rect| rect.is_black);

            let rect = &mut keys[index];
            let mut top_left = left_black.map_or(rect.bottom_left, |b| b.top_right + gap);
            let mut top_right = right_black.map_or(rect.bottom_right, |b| b.top_left - gap);

            // Narrowing only ever moves inwards.
            top_left = top_left.max(rect.bottom_left).min(rect.bottom_right);
            top_right = top_right.max(rect.bottom_left).min(rect.bottom_right);
            if top_left > top_right {
                let mid = (top_left + top_right) / 2.0;
                top_left = mid;
                top_right = mid;
            }
            rect.top_left = top_left;
            rect.top_right = top_right;
        }

        Self {
            width: sanitize(width),
            height: sanitize(height),
            min_pixel_unit: unit,
            mode,
            params,
            origin,
            keys,
            white_keys,
            black_keys,
        }
    }

    pub fn keys(&self) -> &[KeyRect] {
        &self.keys
    }

    pub fn key(&self, key: KeyIndex) -> &KeyRect {
        &self.keys[key.get()]
    }

    /// White keys from left to right.
    pub fn white_keys(&self) -> &[KeyIndex] {
        &self.white_keys
    }

    /// Black keys from left to right.
    pub fn black_keys(&self) -> &[KeyIndex] {
        &self.black_keys
    }

    pub fn params(&self) -> &GeometryParams {
        &self.params
    }

    pub fn gap(&self) -> f32 {
        self.params.gap
    }

    pub fn white_key_width(&self) -> f32 {
        self.params.white_key_width
    }

    pub fn white_key_length(&self) -> f32 {
        self.params.white_key_length
    }

    pub fn black_key_length(&self) -> f32 {
        self.params.black_key_length
    }

    pub fn radii(&self) -> CornerRadii {
        self.params.radii
    }

    pub fn origin(&self) -> f32 {
        self.origin
    }

    pub fn mode(&self) -> SizingMode {
        self.mode
    }

    pub fn min_pixel_unit(&self) -> f32 {
        self.min_pixel_unit
    }

    /// Container size this geometry was computed for.
    pub fn size(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    /// Height a surface should request to show the keys without clipping.
    pub fn preferred_height(&self) -> f32 {
        self.params.white_key_length + 2.0 * self.params.gap
    }

    /// Horizontal span from the left edge of the first white key to the right
    /// edge of the last.
    pub fn span(&self) -> (f32, f32) {
        let first = self.white_keys.first().map(|key| self.key(*key).bottom_left);
        let last = self.white_keys.last().map(|key| self.key(*key).bottom_right);
        (first.unwrap_or(0.0), last.unwrap_or(0.0))
    }
}

/// Recomputes geometry only when the surface reports a different size.
#[derive(Debug, Default)]
pub struct GeometryCache {
    mode: SizingMode,
    current: Option<std::sync::Arc<KeyboardGeometry>>,
}

impl GeometryCache {
    pub fn new(mode: SizingMode) -> Self {
        Self {
            mode,
            current: None,
        }
    }

    /// Returns geometry for the given layout pass, reusing the previous
    /// result when nothing changed.
    pub fn layout(
        &mut self,
        width: f32,
        height: f32,
        min_pixel_unit: f32,
    ) -> std::sync::Arc<KeyboardGeometry> {
        let target = (sanitize(width), sanitize(height), sanitize(min_pixel_unit));
        if let Some(current) = &self.current {
            let (w, h) = current.size();
            if (w, h, current.min_pixel_unit()) == target {
                return std::sync::Arc::clone(current);
            }
        }
        let geometry = std::sync::Arc::new(KeyboardGeometry::compute(
            width,
            height,
            min_pixel_unit,
            self.mode,
        ));
        self.current = Some(std::sync::Arc::clone(&geometry));
        geometry
    }

    pub fn set_mode(&mut self, mode: SizingMode) {
        if self.mode != mode {
            self.mode = mode;
            self.current = None;
        }
    }
}

/// Convenience wrapper around [`KeyboardGeometry::compute`].
pub fn compute_geometry(
    width: f32,
    height: f32,
    min_pixel_unit: f32,
    mode: SizingMode,
) -> KeyboardGeometry {
    KeyboardGeometry::compute(width, height, min_pixel_unit, mode)
}
