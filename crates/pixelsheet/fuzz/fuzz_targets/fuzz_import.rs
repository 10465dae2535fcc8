#![no_main]

use libfuzzer_sys::fuzz_target;
use pixelsheet::{import_from_reader, Upscale};
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    // Should never panic, only return errors
    let _ = import_from_reader(Cursor::new(data), Upscale::ONE);
});
