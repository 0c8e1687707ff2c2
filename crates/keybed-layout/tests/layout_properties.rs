use keybed_layout::{
    is_black_index, KeyIndex, KeyboardGeometry, Point, SizingMode, BLACK_KEY_COUNT, KEY_COUNT,
    WHITE_KEY_COUNT,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const UNITS: [f32; 6] = [0.0, 0.25, 0.5, 1.0, 2.0, 3.0];
const MODES: [SizingMode; 2] = [SizingMode::ExactFit, SizingMode::PreferredAspect];

fn random_geometry(rng: &mut StdRng, min_width: f32) -> KeyboardGeometry {
    let width = rng.gen_range(min_width..8000.0);
    let height = rng.gen_range(60.0..600.0);
    let unit = UNITS[rng.gen_range(0..UNITS.len())];
    let mode = MODES[rng.gen_range(0..MODES.len())];
    KeyboardGeometry::compute(width, height, unit, mode)
}

#[test]
fn every_layout_has_the_piano_key_pattern() {
    let mut rng = StdRng::seed_from_u64(0x88);
    for _ in 0..500 {
        let geometry = random_geometry(&mut rng, 0.01);
        assert_eq!(geometry.keys().len(), KEY_COUNT);
        assert_eq!(geometry.white_keys().len(), WHITE_KEY_COUNT);
        assert_eq!(geometry.black_keys().len(), BLACK_KEY_COUNT);
        for (index, rect) in geometry.keys().iter().enumerate() {
            assert_eq!(rect.is_black, is_black_index(index));
        }
    }
}

#[test]
fn edges_are_ordered_and_white_bottoms_are_contiguous() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..500 {
        let geometry = random_geometry(&mut rng, 0.01);
        for rect in geometry.keys() {
            assert!(rect.top_left <= rect.top_right, "{rect:?}");
            assert!(rect.bottom_left <= rect.bottom_right, "{rect:?}");
            if !rect.is_black {
                assert!(rect.top_left >= rect.bottom_left, "{rect:?}");
                assert!(rect.top_right <= rect.bottom_right, "{rect:?}");
            }
        }
        for pair in geometry.white_keys().windows(2) {
            assert_eq!(
                geometry.key(pair[0]).bottom_right,
                geometry.key(pair[1]).bottom_left
            );
        }
    }
}

#[test]
fn locate_is_total_over_the_container() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..200 {
        let geometry = random_geometry(&mut rng, 0.01);
        let (width, height) = geometry.size();
        for _ in 0..50 {
            let x = rng.gen_range(0.0..width.max(f32::MIN_POSITIVE));
            let y = rng.gen_range(0.0..height.max(f32::MIN_POSITIVE));
            assert!(geometry.locate(Point::new(x, y)).get() < KEY_COUNT);
        }
    }
}

#[test]
fn locate_agrees_with_each_keys_own_region() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..200 {
        let geometry = random_geometry(&mut rng, 520.0);
        let gap = geometry.gap();
        let upper_y = gap + geometry.black_key_length() / 2.0;
        let lower_y = (geometry.white_band_start() + gap + geometry.white_key_length()) / 2.0;

        for key in KeyIndex::all() {
            let rect = *geometry.key(key);

            // Upper band: stay clear of the half gap shared with neighbours.
            let reach = rect.top_width() - gap;
            if reach > 0.02 {
                let x = rect.top_left + gap / 2.0 + reach * rng.gen_range(0.05..0.95);
                assert_eq!(geometry.locate(Point::new(x, upper_y)), key, "{key} top");
            }

            // Lower band: any point between the aligned bottom edges.
            if !rect.is_black {
                let margin = 0.01;
                let reach = rect.bottom_width() - 2.0 * margin;
                if reach > 0.0 {
                    let x = rect.bottom_left + margin + reach * rng.gen_range(0.0..1.0);
                    assert_eq!(geometry.locate(Point::new(x, lower_y)), key, "{key} bottom");
                }
            }
        }
    }
}

#[test]
fn reference_scenario_spans_the_container() {
    let geometry = KeyboardGeometry::compute(1040.0, 120.0, 1.0, SizingMode::ExactFit);
    assert_eq!(geometry.gap(), 1.0);
    let (start, end) = geometry.span();
    assert!((end - start - 1040.0).abs() <= 2.0);

    let mut previous_right = f32::MIN;
    for key in geometry.white_keys() {
        let rect = geometry.key(*key);
        assert!(rect.bottom_left >= previous_right);
        previous_right = rect.bottom_right;
    }
}
