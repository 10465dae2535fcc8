//! # pixelsheet
//!
//! Converts raster images into spreadsheets whose cells are colored like pixels,
//! and reads such spreadsheets back into images.
//!
//! ## Features
//!
//! - **Exporter**: decodes any image the `image` crate understands, resizes it to a
//!   target grid with nearest-neighbour sampling and writes one solid-filled cell per pixel
//! - **Importer**: streams the active worksheet of an `.xlsx` file row by row, rebuilds the
//!   pixel buffer from cell fills and enlarges it by integer block replication
//!
//! ## Quick Start
//!
//! ### Exporting an image to a spreadsheet
//!
//! ```ignore
//! use pixelsheet::{export_image, GridSize};
//!
//! let grid = GridSize::new(64, 64)?;
//! let stats = export_image("photo.png".as_ref(), "pixels.xlsx".as_ref(), grid)?;
//! println!("{} styles for {} cells", stats.styles_created, stats.cells_written);
//! ```
//!
//! ### Importing a spreadsheet back into an image
//!
//! ```ignore
//! use pixelsheet::{import_grid, Upscale};
//!
//! let outcome = import_grid("pixels.xlsx".as_ref(), "pixels.png".as_ref(), Upscale::new(8)?)?;
//! println!("{}x{}", outcome.image_width, outcome.image_height);
//! ```

use std::fmt;

use thiserror::Error;

pub mod color;
pub mod export;
pub mod import;
mod io;
pub mod pipeline;
pub mod sheet;

pub use color::Rgb;
pub use export::{export_image, export_to_buffer, ExportStats, GridSize, StyleCache};
pub use import::{
    import_from_reader, import_grid, upscale, ImportOutcome, ImportWarning, Upscale,
};
pub use pipeline::{run, Config, Mode, RunReport};
pub use sheet::{FillRow, SheetReader};

/// Largest column count a worksheet can hold (column `XFD`).
pub const MAX_COLUMNS: u32 = 16_384;

/// Largest row count a worksheet can hold.
pub const MAX_ROWS: u32 = 1_048_576;

/// Largest pixel count the importer will allocate, before or after upscaling.
pub const MAX_IMAGE_PIXELS: u64 = 1 << 28;

/// The pipeline a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Image to spreadsheet
    Export,
    /// Spreadsheet to image
    Import,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Export => f.write_str("export"),
            Stage::Import => f.write_str("import"),
        }
    }
}

/// Errors that can occur while exporting or importing a pixel grid.
#[derive(Debug, Error)]
pub enum PixelSheetError {
    /// Source file is missing, unreadable or cannot be decoded
    #[error("{stage}: cannot read input: {message}")]
    Input { stage: Stage, message: String },

    /// A parameter is out of its valid range or missing
    #[error("invalid {parameter}: {reason}")]
    Config {
        parameter: &'static str,
        reason: String,
    },

    /// The result could not be encoded or written
    #[error("{stage}: cannot write output: {message}")]
    Output { stage: Stage, message: String },
}

impl PixelSheetError {
    pub(crate) fn input(stage: Stage, message: impl fmt::Display) -> Self {
        PixelSheetError::Input {
            stage,
            message: message.to_string(),
        }
    }

    pub(crate) fn output(stage: Stage, message: impl fmt::Display) -> Self {
        PixelSheetError::Output {
            stage,
            message: message.to_string(),
        }
    }

    pub(crate) fn config(parameter: &'static str, reason: impl Into<String>) -> Self {
        PixelSheetError::Config {
            parameter,
            reason: reason.into(),
        }
    }
}

/// Result type for pixelsheet operations.
pub type Result<T> = core::result::Result<T, PixelSheetError>;
