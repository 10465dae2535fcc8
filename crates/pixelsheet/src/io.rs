//! File output helpers shared by both pipelines.

use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbImage};

use crate::{PixelSheetError, Result, Stage};

/// Writes `bytes` to `path` so that either the complete file appears or nothing does.
///
/// The data lands in a hidden sibling first and is renamed over `path`
/// once it has been flushed to disk.
pub(crate) fn write_atomically(path: &Path, bytes: &[u8], stage: Stage) -> Result<()> {
    let partial = partial_path(path);
    let written = fs::File::create(&partial).and_then(|mut file| {
        file.write_all(bytes)?;
        file.sync_all()
    });
    let renamed = written.and_then(|()| fs::rename(&partial, path));
    if let Err(e) = renamed {
        let _ = fs::remove_file(&partial);
        return Err(PixelSheetError::output(
            stage,
            format!("'{}': {}", path.display(), e),
        ));
    }
    Ok(())
}

fn partial_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.partial"))
}

/// Picks the encoder from the file extension; extension-less names get PNG.
pub(crate) fn output_format(path: &Path) -> Result<ImageFormat> {
    match path.extension() {
        None => Ok(ImageFormat::Png),
        Some(ext) => ImageFormat::from_extension(ext).ok_or_else(|| {
            PixelSheetError::output(
                Stage::Import,
                format!(
                    "'{}': unsupported image extension '{}'",
                    path.display(),
                    ext.to_string_lossy()
                ),
            )
        }),
    }
}

/// Encodes `image` in memory in the given format.
pub(crate) fn encode_image(image: &RgbImage, format: ImageFormat) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, format)
        .map_err(|e| PixelSheetError::output(Stage::Import, e))?;
    Ok(buffer.into_inner())
}
