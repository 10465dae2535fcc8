use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{DynamicImage, Rgb, RgbImage};
use pixelsheet::{export_to_buffer, import_from_reader, GridSize, Upscale};
use std::hint::black_box;
use std::io::Cursor;

fn workbook(size: u32) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_fn(size, size, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    }));
    let grid = GridSize::new(i64::from(size), i64::from(size)).unwrap();
    export_to_buffer(&image, grid).unwrap().0
}

fn bench_import_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("import_grid");
    group.sample_size(20);

    for size in [16u32, 64, 128] {
        let xlsx = workbook(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &xlsx, |b, xlsx| {
            b.iter(|| import_from_reader(Cursor::new(black_box(xlsx.as_slice())), Upscale::ONE).unwrap())
        });
    }

    group.finish();
}

fn bench_import_upscaled(c: &mut Criterion) {
    let xlsx = workbook(64);
    let factor = Upscale::new(8).unwrap();
    c.bench_function("import_64_upscale_8", |b| {
        b.iter(|| import_from_reader(Cursor::new(black_box(xlsx.as_slice())), factor).unwrap())
    });
}

criterion_group!(benches, bench_import_sizes, bench_import_upscaled);
criterion_main!(benches);
