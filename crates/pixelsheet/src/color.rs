//! Pixel colors and their 6-hex-digit spreadsheet encoding.

use std::fmt;

use image::{Rgb as ImageRgb, Rgba};

/// An opaque 8-bit-per-channel color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// Background for empty cells and the backdrop alpha is composited against.
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Lowercase `rrggbb`.
    pub fn to_hex(self) -> String {
        format!("{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// `0xRRGGBB`, the form the spreadsheet writer takes.
    #[inline]
    pub fn to_u32(self) -> u32 {
        (u32::from(self.r) << 16) | (u32::from(self.g) << 8) | u32::from(self.b)
    }

    /// Parses `RRGGBB` or `AARRGGBB`, with or without a leading `#`.
    ///
    /// Spreadsheet files store colors as ARGB; the alpha byte carries no
    /// meaning for a cell fill and is ignored. Writers disagree on whether it
    /// is `FF` or `00`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        let rgb = match hex.len() {
            6 => hex,
            8 => &hex[2..],
            _ => return None,
        };
        if !rgb.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let value = u32::from_str_radix(rgb, 16).ok()?;
        Some(Rgb::new((value >> 16) as u8, (value >> 8) as u8, value as u8))
    }

    /// Flattens a translucent pixel onto opaque white.
    ///
    /// Opaque pixels come through unchanged.
    pub fn composite_over_white(pixel: Rgba<u8>) -> Self {
        let [r, g, b, a] = pixel.0;
        if a == u8::MAX {
            return Rgb::new(r, g, b);
        }
        let a = u32::from(a);
        let blend = |c: u8| -> u8 { ((u32::from(c) * a + 255 * (255 - a) + 127) / 255) as u8 };
        Rgb::new(blend(r), blend(g), blend(b))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl From<ImageRgb<u8>> for Rgb {
    fn from(pixel: ImageRgb<u8>) -> Self {
        let [r, g, b] = pixel.0;
        Rgb::new(r, g, b)
    }
}

impl From<Rgb> for ImageRgb<u8> {
    fn from(color: Rgb) -> Self {
        ImageRgb([color.r, color.g, color.b])
    }
}
