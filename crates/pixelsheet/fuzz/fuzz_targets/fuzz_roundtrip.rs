#![no_main]

use arbitrary::Arbitrary;
use image::{DynamicImage, RgbImage};
use libfuzzer_sys::fuzz_target;
use pixelsheet::{export_to_buffer, import_from_reader, GridSize, Upscale};
use std::io::Cursor;

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    width: u8,
    height: u8,
    pixels: Vec<u8>,
}

fuzz_target!(|input: FuzzInput| {
    let width = u32::from(input.width).clamp(1, 32);
    let height = u32::from(input.height).clamp(1, 32);

    // RGB = 3 bytes per pixel
    let expected_size = (width * height * 3) as usize;
    if input.pixels.len() < expected_size {
        return;
    }

    let source = match RgbImage::from_raw(width, height, input.pixels[..expected_size].to_vec()) {
        Some(img) => img,
        None => return,
    };
    let grid = GridSize::new(i64::from(width), i64::from(height)).unwrap();

    let (xlsx, stats) = export_to_buffer(&DynamicImage::ImageRgb8(source.clone()), grid).unwrap();
    let (decoded, outcome) = import_from_reader(Cursor::new(xlsx), Upscale::ONE).unwrap();

    assert_eq!(outcome.filled_cells, stats.cells_written);
    assert_eq!(decoded, source, "round trip must reproduce every pixel");
});
