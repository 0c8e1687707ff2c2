use keybed_core::{ControlQueue, KeyboardModel, KeyboardSurface, LayoutSettings, ManualContext};
use keybed_layout::{KeyIndex, Point, SizingMode};
use keybed_midi::{MemoryTransport, PortId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[test]
fn random_drag_keeps_at_most_one_key_down() {
    let transport = MemoryTransport::with_destinations([PortId::from_raw(1)]);
    let queue = ControlQueue::new(0);
    let mut surface = KeyboardSurface::new(
        queue.handle(),
        LayoutSettings {
            mode: SizingMode::ExactFit,
            min_pixel_unit: 1.0,
        },
    );
    let mut context = ManualContext::new(queue, KeyboardModel::new(Box::new(transport.clone())));
    let geometry = surface.resize(1280.0, 160.0);
    let mut rng = StdRng::seed_from_u64(0x6b65_7962);

    for _ in 0..20 {
        surface.pointer_down(Point::new(rng.gen_range(0.0..1280.0), rng.gen_range(0.0..160.0)));
        for _ in 0..50 {
            let point = Point::new(rng.gen_range(-20.0..1300.0), rng.gen_range(-10.0..170.0));
            let current = surface.pointer_moved(point);
            context.run_pending();
            let down: Vec<KeyIndex> = context.model().pressed_keys().collect();
            assert_eq!(down.len(), 1);
            assert_eq!(Some(down[0]), current);
            assert_eq!(down[0], geometry.locate(point));
        }
        surface.pointer_up();
        context.run_pending();
        assert_eq!(context.model().pressed_keys().count(), 0);
        assert_eq!(context.model().glissando(), None);
    }

    let mut balance = 0i32;
    for (_, bytes) in transport.sent() {
        match bytes[0] & 0xF0 {
            0x90 => balance += 1,
            0x80 => balance -= 1,
            other => panic!("unexpected status {other:#x}"),
        }
        assert!((0..=1).contains(&balance));
    }
    assert_eq!(balance, 0);
}

#[test]
fn reset_ends_a_drag_in_progress() {
    let queue = ControlQueue::new(0);
    let handle = queue.handle();
    let mut surface = KeyboardSurface::new(handle.clone(), LayoutSettings::default());
    let mut context =
        ManualContext::new(queue, KeyboardModel::new(Box::new(keybed_midi::NullTransport)));
    let geometry = surface.resize(1040.0, 120.0);

    let y = geometry.white_band_start() + 10.0;
    let key = surface.pointer_down(Point::new(500.0, y)).unwrap();
    context.run_pending();
    assert!(handle.is_pressed(key));

    handle.reset().unwrap();
    context.run_pending();
    assert!(!handle.is_pressed(key));
    assert_eq!(context.model().glissando(), None);
}
