//! Geometry and hit-testing for an on-screen 88-key piano keyboard.

pub mod geometry;
pub mod hit_test;
pub mod key;

pub use geometry::{
    align, compute_geometry, CornerRadii, GeometryCache, GeometryParams, KeyRect,
    KeyboardGeometry, SizingMode,
};
pub use hit_test::{locate_key, Point};
pub use key::{
    is_black_index, KeyIndex, KeyOutOfRange, BLACK_KEY_COUNT, HIGHEST_NOTE, KEY_COUNT,
    LOWEST_NOTE, WHITE_KEY_COUNT,
};
