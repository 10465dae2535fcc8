//! Image to spreadsheet conversion.
//!
//! The source image is resized to the target grid with nearest-neighbour
//! sampling, flattened onto white and written as one solid-filled blank cell
//! per pixel. Cell formats are cached per color so that an image with N
//! distinct colors produces exactly N fill styles.

use std::collections::HashMap;
use std::path::Path;

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageReader, RgbImage, RgbaImage};
use log::{debug, info};
use rust_xlsxwriter::{Color, ColNum, Format, FormatPattern, RowNum, Workbook};

use crate::color::Rgb;
use crate::io::write_atomically;
use crate::{PixelSheetError, Result, Stage, MAX_COLUMNS, MAX_ROWS};

/// Name of the single worksheet the exporter writes.
pub const SHEET_NAME: &str = "Pixel Art";

/// Column width in character units. Together with [`CELL_HEIGHT`] this
/// renders cells roughly square.
pub const CELL_WIDTH: f64 = 3.0;

/// Row height in points.
pub const CELL_HEIGHT: f64 = 18.0;

/// Validated target grid dimensions (GX columns by GY rows).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSize {
    width: u32,
    height: u32,
}

impl GridSize {
    /// Checks both dimensions are at least 1 and fit in a worksheet.
    pub fn new(width: i64, height: i64) -> Result<Self> {
        let width = checked_dimension("grid width", width, MAX_COLUMNS)?;
        let height = checked_dimension("grid height", height, MAX_ROWS)?;
        Ok(Self { width, height })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }
}

fn checked_dimension(parameter: &'static str, value: i64, max: u32) -> Result<u32> {
    if value < 1 {
        return Err(PixelSheetError::config(
            parameter,
            format!("{value} (must be at least 1)"),
        ));
    }
    if value > i64::from(max) {
        return Err(PixelSheetError::config(
            parameter,
            format!("{value} (a worksheet holds at most {max})"),
        ));
    }
    Ok(value as u32)
}

/// Summary of one export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportStats {
    /// Grid columns written
    pub width: u32,
    /// Grid rows written
    pub height: u32,
    /// Colored cells written (always `width * height`)
    pub cells_written: u64,
    /// Distinct fill styles allocated
    pub styles_created: usize,
}

/// Per-export memo from color to its fill format.
#[derive(Debug, Default)]
pub struct StyleCache {
    formats: HashMap<Rgb, Format>,
}

impl StyleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the format for `color`, allocating it on first use.
    pub fn get_or_insert(&mut self, color: Rgb) -> &Format {
        self.formats
            .entry(color)
            .or_insert_with(|| fill_format(color))
    }

    /// Number of distinct colors seen, which is also the number of formats allocated.
    pub fn len(&self) -> usize {
        self.formats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }
}

fn fill_format(color: Rgb) -> Format {
    Format::new()
        .set_pattern(FormatPattern::Solid)
        .set_background_color(Color::RGB(color.to_u32()))
}

/// Decodes the image at `path`, sniffing the format from its contents.
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    let input_err = |reason: String| {
        PixelSheetError::input(Stage::Export, format!("'{}': {}", path.display(), reason))
    };
    ImageReader::open(path)
        .map_err(|e| input_err(e.to_string()))?
        .with_guessed_format()
        .map_err(|e| input_err(e.to_string()))?
        .decode()
        .map_err(|e| input_err(e.to_string()))
}

/// Nearest-neighbour resize to the grid; a no-op when sizes already match.
pub fn resize_to_grid(image: &RgbaImage, grid: GridSize) -> RgbaImage {
    if image.dimensions() == (grid.width(), grid.height()) {
        return image.clone();
    }
    imageops::resize(image, grid.width(), grid.height(), FilterType::Nearest)
}

/// Resizes and drops alpha by compositing onto white.
pub fn prepare_pixels(image: &DynamicImage, grid: GridSize) -> RgbImage {
    let resized = resize_to_grid(&image.to_rgba8(), grid);
    RgbImage::from_fn(resized.width(), resized.height(), |x, y| {
        Rgb::composite_over_white(*resized.get_pixel(x, y)).into()
    })
}

/// Builds the workbook for `pixels` in memory.
///
/// Pixel `(x, y)` lands in the cell at zero-based row `y`, column `x`,
/// which is row `y + 1`, column `x + 1` in spreadsheet terms.
pub fn write_grid(pixels: &RgbImage) -> Result<(Vec<u8>, ExportStats)> {
    let (width, height) = pixels.dimensions();
    if width > MAX_COLUMNS || height > MAX_ROWS {
        return Err(PixelSheetError::config(
            "grid size",
            format!("{width}x{height} does not fit in a worksheet"),
        ));
    }
    let xlsx_err = |e: rust_xlsxwriter::XlsxError| PixelSheetError::output(Stage::Export, e);

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME).map_err(xlsx_err)?;

    let mut cache = StyleCache::new();
    for (x, y, pixel) in pixels.enumerate_pixels() {
        let format = cache.get_or_insert(Rgb::from(*pixel));
        worksheet
            .write_blank(y as RowNum, x as ColNum, format)
            .map_err(xlsx_err)?;
    }

    for col in 0..width {
        worksheet
            .set_column_width(col as ColNum, CELL_WIDTH)
            .map_err(xlsx_err)?;
    }
    for row in 0..height {
        worksheet
            .set_row_height(row as RowNum, CELL_HEIGHT)
            .map_err(xlsx_err)?;
    }

    debug!(
        "style cache holds {} fills for {} cells",
        cache.len(),
        u64::from(width) * u64::from(height)
    );

    let buffer = workbook.save_to_buffer().map_err(xlsx_err)?;
    let stats = ExportStats {
        width,
        height,
        cells_written: u64::from(width) * u64::from(height),
        styles_created: cache.len(),
    };
    Ok((buffer, stats))
}

/// Converts an already decoded image into workbook bytes.
pub fn export_to_buffer(image: &DynamicImage, grid: GridSize) -> Result<(Vec<u8>, ExportStats)> {
    write_grid(&prepare_pixels(image, grid))
}

/// Converts the image at `input` into a spreadsheet at `output`.
pub fn export_image(input: &Path, output: &Path, grid: GridSize) -> Result<ExportStats> {
    info!("Exporting '{}' to '{}'", input.display(), output.display());
    let image = load_image(input)?;
    debug!(
        "decoded {}x{} source, resizing to {}x{}",
        image.width(),
        image.height(),
        grid.width(),
        grid.height()
    );

    let (buffer, stats) = export_to_buffer(&image, grid)?;
    write_atomically(output, &buffer, Stage::Export)?;

    info!(
        "Wrote {}x{} grid with {} distinct colors to '{}'",
        stats.width,
        stats.height,
        stats.styles_created,
        output.display()
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb as ImageRgb, Rgba};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_grid_size_valid() {
        let grid = GridSize::new(5568, 3132).unwrap();
        assert_eq!((grid.width(), grid.height()), (5568, 3132));
    }

    #[test]
    fn test_grid_size_rejects_non_positive() {
        for (w, h) in [(0, 10), (10, 0), (10, -1), (-5, -5)] {
            let err = GridSize::new(w, h).unwrap_err();
            assert!(
                matches!(err, PixelSheetError::Config { .. }),
                "{w}x{h} should be a config error"
            );
        }
    }

    #[test]
    fn test_grid_size_rejects_oversized() {
        assert!(GridSize::new(16_384, 1).is_ok());
        assert!(GridSize::new(16_385, 1).is_err());
        assert!(GridSize::new(1, 1_048_577).is_err());
    }

    #[test]
    fn test_style_cache_reuses_formats() {
        let mut cache = StyleCache::new();
        let red = Rgb::new(255, 0, 0);
        let blue = Rgb::new(0, 0, 255);
        for _ in 0..10 {
            cache.get_or_insert(red);
            cache.get_or_insert(blue);
        }
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_resize_keeps_exact_size() {
        let image = RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 255]));
        let grid = GridSize::new(3, 2).unwrap();
        assert_eq!(resize_to_grid(&image, grid), image);
    }

    #[test]
    fn test_resize_nearest_keeps_palette() {
        // Left half red, right half blue; nearest sampling must not invent colors
        let image = RgbaImage::from_fn(8, 8, |x, _| {
            if x < 4 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        });
        let resized = resize_to_grid(&image, GridSize::new(2, 3).unwrap());
        assert_eq!(resized.dimensions(), (2, 3));
        for y in 0..3 {
            assert_eq!(*resized.get_pixel(0, y), Rgba([255, 0, 0, 255]));
            assert_eq!(*resized.get_pixel(1, y), Rgba([0, 0, 255, 255]));
        }
    }

    #[test]
    fn test_prepare_pixels_composites_alpha() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 0])));
        let pixels = prepare_pixels(&image, GridSize::new(1, 1).unwrap());
        assert_eq!(*pixels.get_pixel(0, 0), ImageRgb([255, 255, 255]));
    }

    #[test]
    fn test_write_grid_counts_distinct_styles() {
        let colors = [
            ImageRgb([255, 0, 0]),
            ImageRgb([0, 255, 0]),
            ImageRgb([0, 0, 255]),
        ];
        let pixels = RgbImage::from_fn(30, 20, |x, y| colors[((x + y) % 3) as usize]);
        let (buffer, stats) = write_grid(&pixels).unwrap();
        assert!(!buffer.is_empty());
        assert_eq!(stats.styles_created, 3);
        assert_eq!(stats.cells_written, 600);
        assert_eq!((stats.width, stats.height), (30, 20));
    }

    #[test]
    fn test_load_image_missing_file() {
        let err = load_image(Path::new("definitely/not/here.png")).unwrap_err();
        assert!(matches!(
            err,
            PixelSheetError::Input {
                stage: Stage::Export,
                ..
            }
        ));
    }
}
