use criterion::{criterion_group, criterion_main, Criterion};
use docshot::normalize::normalize_surface;
use docshot::pdf::{assemble, PageSize};
use image::{Rgba, RgbaImage};

// Run with:
//    cargo bench --bench export_bench

/// A page-sized canvas: transparent background with a few opaque text-like bands
fn sample_surface() -> RgbaImage {
    let mut img = RgbaImage::new(1224, 1584);
    for y in (80..1500).step_by(40) {
        for x in 100..1100 {
            img.put_pixel(x, y, Rgba([20, 20, 20, 255]));
        }
    }
    img
}

fn bench_normalize(c: &mut Criterion) {
    let surface = sample_surface();
    c.bench_function("normalize_surface", |b| {
        b.iter(|| normalize_surface(&surface).unwrap())
    });
}

fn bench_assemble(c: &mut Criterion) {
    let page = normalize_surface(&sample_surface()).unwrap();
    let pages = vec![page; 20];
    c.bench_function("assemble_20_pages", |b| {
        b.iter(|| assemble(&pages, PageSize::A4, Some("Bench")).unwrap())
    });
}

criterion_group!(benches, bench_normalize, bench_assemble);
criterion_main!(benches);
