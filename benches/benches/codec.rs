use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use keybed_midi::KeyboardMessage;

fn decode(c: &mut Criterion) {
    let stream: Vec<[u8; 3]> = (0u8..128)
        .flat_map(|note| [[0x90, note, 100], [0x80, note, 0], [0xB0, 0x40, note]])
        .collect();

    c.bench_function("decode_note_and_pedal_stream", |b| {
        b.iter(|| {
            for bytes in &stream {
                let _ = black_box(KeyboardMessage::decode(black_box(bytes)));
            }
        });
    });
}

criterion_group!(benches, decode);
criterion_main!(benches);
