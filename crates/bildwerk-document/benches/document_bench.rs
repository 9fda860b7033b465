// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the bildwerk-document crate: single-image
// normalisation and rendering a small multi-page PDF.

use std::io::Cursor;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

use bildwerk_core::types::PageSize;
use bildwerk_document::{DocumentComposer, ImageNormalizer};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A 640x480 gradient encoded as JPEG, roughly what a phone thumbnail is.
fn gradient_jpeg() -> Vec<u8> {
    let img = RgbImage::from_fn(640, 480, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut buffer = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Jpeg)
        .expect("encode fixture");
    buffer
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_normalize(c: &mut Criterion) {
    let data = gradient_jpeg();
    let normalizer = ImageNormalizer::new();

    c.bench_function("normalize jpeg (640x480, q80)", |b| {
        b.iter(|| {
            let processed = normalizer
                .normalize(black_box(&data), "bench.jpg", "image/jpeg", 80)
                .expect("normalize");
            black_box(processed);
        });
    });
}

/// Render four pages with captions. Exercises decode-for-embed, layout and
/// printpdf serialisation; nothing touches the filesystem.
fn bench_render(c: &mut Criterion) {
    let data = gradient_jpeg();
    let image = ImageNormalizer::new()
        .normalize(&data, "bench.jpg", "image/jpeg", 80)
        .expect("normalize")
        .expect("decodable");
    let images = vec![image; 4];
    let composer = DocumentComposer::new(PageSize::A4, true);

    c.bench_function("render pdf (4 pages, A4)", |b| {
        b.iter(|| black_box(composer.render(black_box(&images)).expect("render")));
    });
}

criterion_group!(benches, bench_normalize, bench_render);
criterion_main!(benches);
