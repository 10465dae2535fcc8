//! Spreadsheet to image conversion.
//!
//! The active worksheet is streamed twice: the first pass finds the occupied
//! extent (the largest row and column holding a recognized fill), the second
//! paints a white canvas of that size. The result is then enlarged by integer
//! block replication so pixel edges stay hard.

use std::io::{Read, Seek};
use std::path::Path;

use image::RgbImage;
use log::{debug, info, warn};

use crate::color::Rgb;
use crate::io::{encode_image, output_format, write_atomically};
use crate::sheet::{FillRow, SheetReader};
use crate::{PixelSheetError, Result, Stage, MAX_IMAGE_PIXELS};

/// Validated integer upscale factor K (at least 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Upscale(u32);

impl Upscale {
    /// No enlargement.
    pub const ONE: Upscale = Upscale(1);

    pub fn new(factor: i64) -> Result<Self> {
        if factor < 1 {
            return Err(PixelSheetError::config(
                "upscale factor",
                format!("{factor} (must be at least 1)"),
            ));
        }
        let factor = u32::try_from(factor).map_err(|_| {
            PixelSheetError::config("upscale factor", format!("{factor} is too large"))
        })?;
        Ok(Upscale(factor))
    }

    #[inline]
    pub fn get(self) -> u32 {
        self.0
    }
}

/// Non-fatal conditions noticed while importing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportWarning {
    /// No cell carried a recognized fill; a single white pixel was produced.
    EmptyGrid,
}

/// Summary of one import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOutcome {
    /// Detected grid columns (base image width)
    pub grid_width: u32,
    /// Detected grid rows (base image height)
    pub grid_height: u32,
    /// Final image width after upscaling
    pub image_width: u32,
    /// Final image height after upscaling
    pub image_height: u32,
    /// Cells that carried a recognized fill
    pub filled_cells: u64,
    pub warnings: Vec<ImportWarning>,
}

/// Largest `(column, row)` among filled cells, or `None` if there are none.
pub fn occupied_extent<I>(rows: I) -> Result<Option<(u32, u32)>>
where
    I: IntoIterator<Item = Result<FillRow>>,
{
    let mut extent: Option<(u32, u32)> = None;
    for row in rows {
        let row = row?;
        if let Some(max_col) = row.cells.iter().map(|&(col, _)| col).max() {
            let (width, height) = extent.unwrap_or((0, 0));
            extent = Some((width.max(max_col), height.max(row.row)));
        }
    }
    Ok(extent)
}

/// Paints filled cells onto a white `width` x `height` canvas.
///
/// Cell `(row r, column c)` becomes pixel `(c - 1, r - 1)`; cells outside the
/// canvas are ignored. Returns the image and the number of cells painted.
pub fn build_pixels<I>(rows: I, width: u32, height: u32) -> Result<(RgbImage, u64)>
where
    I: IntoIterator<Item = Result<FillRow>>,
{
    let mut image = RgbImage::from_pixel(width, height, Rgb::WHITE.into());
    let mut painted = 0u64;
    for row in rows {
        let row = row?;
        if row.row == 0 || row.row > height {
            continue;
        }
        for (col, color) in row.cells {
            if col == 0 || col > width {
                continue;
            }
            image.put_pixel(col - 1, row.row - 1, color.into());
            painted += 1;
        }
    }
    Ok((image, painted))
}

/// Enlarges `image` by replicating every pixel into a K x K block.
///
/// Results larger than [`MAX_IMAGE_PIXELS`] are refused.
pub fn upscale(image: &RgbImage, factor: Upscale) -> Result<RgbImage> {
    let k = factor.get();
    if k == 1 {
        return Ok(image.clone());
    }
    let too_large = || {
        PixelSheetError::config(
            "upscale factor",
            format!(
                "{k} makes a {}x{} image too large",
                image.width(),
                image.height()
            ),
        )
    };
    let width = image.width().checked_mul(k).ok_or_else(too_large)?;
    let height = image.height().checked_mul(k).ok_or_else(too_large)?;
    if u64::from(width) * u64::from(height) > MAX_IMAGE_PIXELS {
        return Err(too_large());
    }

    Ok(RgbImage::from_fn(width, height, |x, y| {
        *image.get_pixel(x / k, y / k)
    }))
}

/// Reads the grid from an opened workbook at grid resolution.
pub fn read_grid<R: Read + Seek>(sheet: &mut SheetReader<R>) -> Result<(RgbImage, u64)> {
    let extent = occupied_extent(sheet.rows()?)?;
    match extent {
        Some((width, height)) => {
            debug!("occupied extent {width}x{height}");
            if u64::from(width) * u64::from(height) > MAX_IMAGE_PIXELS {
                return Err(PixelSheetError::input(
                    Stage::Import,
                    format!("{width}x{height} grid exceeds {MAX_IMAGE_PIXELS} pixels"),
                ));
            }
            build_pixels(sheet.rows()?, width, height)
        }
        None => Ok((RgbImage::from_pixel(1, 1, Rgb::WHITE.into()), 0)),
    }
}

/// Decodes a workbook from `reader` into an upscaled image.
pub fn import_from_reader<R: Read + Seek>(
    reader: R,
    factor: Upscale,
) -> Result<(RgbImage, ImportOutcome)> {
    let mut sheet = SheetReader::new(reader)?;
    let (base, filled_cells) = read_grid(&mut sheet)?;

    let mut warnings = Vec::new();
    if filled_cells == 0 {
        warn!("no colored cells found, producing a single white pixel");
        warnings.push(ImportWarning::EmptyGrid);
    }

    let image = upscale(&base, factor)?;
    let outcome = ImportOutcome {
        grid_width: base.width(),
        grid_height: base.height(),
        image_width: image.width(),
        image_height: image.height(),
        filled_cells,
        warnings,
    };
    Ok((image, outcome))
}

/// Converts the spreadsheet at `input` into an image at `output`.
///
/// The image format follows the extension of `output`; a name without one
/// is written as PNG.
pub fn import_grid(input: &Path, output: &Path, factor: Upscale) -> Result<ImportOutcome> {
    info!("Importing '{}' to '{}'", input.display(), output.display());
    let format = output_format(output)?;
    let file = std::fs::File::open(input).map_err(|e| {
        PixelSheetError::input(Stage::Import, format!("'{}': {}", input.display(), e))
    })?;
    let (image, outcome) = import_from_reader(std::io::BufReader::new(file), factor)?;

    let bytes = encode_image(&image, format)?;
    write_atomically(output, &bytes, Stage::Import)?;

    info!(
        "Read {}x{} grid, wrote {}x{} image to '{}'",
        outcome.grid_width,
        outcome.grid_height,
        outcome.image_width,
        outcome.image_height,
        output.display()
    );
    Ok(outcome)
}
