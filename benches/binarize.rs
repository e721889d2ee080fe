use criterion::{black_box, criterion_group, criterion_main, Criterion};

use qrscan::utils::binarize::binarize;
use qrscan::{decode_luminance, GreyImage};

/// Synthetic frame: soft gradient background with a checkered patch, the
/// kind of input the block binarizer sees from a camera.
fn gradient_frame(side: usize) -> GreyImage {
    let mut pixels = Vec::with_capacity(side * side);
    for y in 0..side {
        for x in 0..side {
            let base = (80 + (x + y) * 100 / (2 * side)) as u8;
            let checker = if (x / 8 + y / 8) % 2 == 0 { 0 } else { 60 };
            pixels.push(base.saturating_add(checker));
        }
    }
    GreyImage::new(pixels, side, side).unwrap()
}

fn symbol_frame() -> GreyImage {
    // Version 1 finder geometry only; enough for the detector to chew on.
    let scale = 8;
    let quiet = 4 * scale;
    let side = 21 * scale + 2 * quiet;
    let mut pixels = vec![255u8; side * side];
    let mut paint = |left: usize, top: usize| {
        for my in 0..7 {
            for mx in 0..7 {
                let ring = mx == 0 || mx == 6 || my == 0 || my == 6;
                let core = (2..=4).contains(&mx) && (2..=4).contains(&my);
                if ring || core {
                    for y in 0..scale {
                        for x in 0..scale {
                            pixels[(top + my * scale + y) * side + left + mx * scale + x] = 0;
                        }
                    }
                }
            }
        }
    };
    paint(quiet, quiet);
    paint(quiet + 14 * scale, quiet);
    paint(quiet, quiet + 14 * scale);
    GreyImage::new(pixels, side, side).unwrap()
}

fn bench_binarize(c: &mut Criterion) {
    let frame = gradient_frame(640);
    c.bench_function("binarize_640", |b| {
        b.iter(|| binarize(black_box(&frame)).unwrap())
    });

    let small = gradient_frame(32);
    c.bench_function("binarize_histogram_32", |b| {
        b.iter(|| binarize(black_box(&small)))
    });
}

fn bench_pipeline(c: &mut Criterion) {
    let frame = symbol_frame();
    c.bench_function("full_decode_attempt", |b| {
        b.iter(|| {
            // No data modules present, so the decode fails after detection;
            // this measures binarize + finder + sampling cost.
            let _ = decode_luminance(black_box(&frame));
        })
    });
}

criterion_group!(benches, bench_binarize, bench_pipeline);
criterion_main!(benches);
