use criterion::{criterion_group, criterion_main, Criterion};
use rt1090::demod;

/// One synthetic frame surrounded by silence, repeated to fill a block
fn magnitude_block() -> Vec<u16> {
    let frame: [u8; 14] = [
        0x8D, 0x40, 0x6B, 0x90, 0x20, 0x15, 0xA6, 0x78, 0xD4, 0xD2, 0x20,
        0xAA, 0x4B, 0xDA,
    ];
    let mut m = Vec::new();
    for _ in 0..64 {
        m.extend(std::iter::repeat(0u16).take(64));
        let mut preamble = [100u16; 16];
        for k in [0, 2, 7, 9] {
            preamble[k] = 3000;
        }
        m.extend_from_slice(&preamble);
        for byte in frame {
            for bit in (0..8).rev() {
                if byte & (1 << bit) != 0 {
                    m.extend_from_slice(&[3000, 100]);
                } else {
                    m.extend_from_slice(&[100, 3000]);
                }
            }
        }
    }
    m.extend(std::iter::repeat(0u16).take(512));
    m
}

fn demodulation(c: &mut Criterion) {
    let block = magnitude_block();
    c.bench_function("detect_modes", |b| {
        b.iter(|| {
            let mut m = block.clone();
            demod::detect_modes(&mut m)
        })
    });

    let iq: Vec<u8> = (0..rt1090::pool::BLOCK_SIZE)
        .map(|i| (i % 251) as u8)
        .collect();
    c.bench_function("magnitude", |b| {
        b.iter(|| demod::magnitude(&demod::iq_samples(&iq)))
    });
}

criterion_group!(benches, demodulation);
criterion_main!(benches);
