//! Runs the exporter, the importer, or both in sequence.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use crate::export::{export_image, ExportStats, GridSize};
use crate::import::{import_grid, ImportOutcome, Upscale};
use crate::io::output_format;
use crate::{PixelSheetError, Result};

/// Default grid width and height.
pub const DEFAULT_GRID_SIZE: i64 = 64;

/// Default upscale factor for imported images.
pub const DEFAULT_UPSCALE: i64 = 8;

/// Which conversions to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Image to spreadsheet
    #[serde(alias = "to_excel")]
    Export,
    /// Spreadsheet to image
    #[serde(alias = "to_image")]
    Import,
    /// Export, then import the spreadsheet just written
    Both,
}

impl Mode {
    pub fn exports(self) -> bool {
        matches!(self, Mode::Export | Mode::Both)
    }

    pub fn imports(self) -> bool {
        matches!(self, Mode::Import | Mode::Both)
    }
}

/// Everything one run needs.
///
/// Numeric fields are signed so that out-of-range values survive parsing
/// and are reported by [`Config::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub mode: Mode,
    /// Source image, required when exporting
    #[serde(default)]
    pub input_image: Option<PathBuf>,
    /// Spreadsheet written by the export and read by the import
    pub spreadsheet: PathBuf,
    /// Destination image, required when importing
    #[serde(default)]
    pub output_image: Option<PathBuf>,
    #[serde(default = "default_grid_size")]
    pub grid_width: i64,
    #[serde(default = "default_grid_size")]
    pub grid_height: i64,
    #[serde(default = "default_upscale")]
    pub upscale: i64,
}

fn default_grid_size() -> i64 {
    DEFAULT_GRID_SIZE
}

fn default_upscale() -> i64 {
    DEFAULT_UPSCALE
}

struct ExportJob<'a> {
    input: &'a Path,
    grid: GridSize,
}

struct ImportJob<'a> {
    output: &'a Path,
    factor: Upscale,
}

impl Config {
    /// Reads a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            PixelSheetError::config("config file", format!("'{}': {}", path.display(), e))
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            PixelSheetError::config("config file", format!("'{}': {}", path.display(), e))
        })
    }

    /// Checks every parameter the selected mode uses, including the output
    /// image extension, without touching any file.
    pub fn validate(&self) -> Result<()> {
        self.plan().map(|_| ())
    }

    fn plan(&self) -> Result<(Option<ExportJob<'_>>, Option<ImportJob<'_>>)> {
        let export = if self.mode.exports() {
            let input = self.input_image.as_deref().ok_or_else(|| {
                PixelSheetError::config("input image", "required when exporting")
            })?;
            Some(ExportJob {
                input,
                grid: GridSize::new(self.grid_width, self.grid_height)?,
            })
        } else {
            None
        };

        let import = if self.mode.imports() {
            let output = self.output_image.as_deref().ok_or_else(|| {
                PixelSheetError::config("output image", "required when importing")
            })?;
            let factor = Upscale::new(self.upscale)?;
            output_format(output)?;
            Some(ImportJob { output, factor })
        } else {
            None
        };

        Ok((export, import))
    }
}

/// What a run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub export: Option<ExportStats>,
    pub import: Option<ImportOutcome>,
}

/// Validates `config`, then runs the conversions it selects.
///
/// In [`Mode::Both`] the import reads the spreadsheet the export has just
/// written; nothing else is shared between the two.
pub fn run(config: &Config) -> Result<RunReport> {
    let (export, import) = config.plan()?;
    let mut report = RunReport::default();

    if let Some(job) = export {
        info!("--- Image to spreadsheet ---");
        report.export = Some(export_image(job.input, &config.spreadsheet, job.grid)?);
    }
    if let Some(job) = import {
        info!("--- Spreadsheet to image ---");
        report.import = Some(import_grid(&config.spreadsheet, job.output, job.factor)?);
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config(mode: Mode) -> Config {
        Config {
            mode,
            input_image: Some("in.png".into()),
            spreadsheet: "grid.xlsx".into(),
            output_image: Some("out.png".into()),
            grid_width: 4,
            grid_height: 4,
            upscale: 2,
        }
    }

    #[test]
    fn test_mode_selects_stages() {
        assert!(Mode::Export.exports() && !Mode::Export.imports());
        assert!(!Mode::Import.exports() && Mode::Import.imports());
        assert!(Mode::Both.exports() && Mode::Both.imports());
    }

    #[test]
    fn test_validate_ignores_unused_parameters() {
        let mut cfg = config(Mode::Import);
        cfg.grid_width = 0;
        cfg.input_image = None;
        assert!(cfg.validate().is_ok());

        let mut cfg = config(Mode::Export);
        cfg.upscale = 0;
        cfg.output_image = None;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_both_checks_everything() {
        let tweaks: [fn(&mut Config); 5] = [
            |c| c.grid_width = 0,
            |c| c.grid_height = -1,
            |c| c.upscale = 0,
            |c| c.input_image = None,
            |c| c.output_image = None,
        ];
        for tweak in tweaks {
            let mut cfg = config(Mode::Both);
            tweak(&mut cfg);
            assert!(matches!(
                cfg.validate().unwrap_err(),
                PixelSheetError::Config { .. }
            ));
        }
    }

    #[test]
    fn test_validate_rejects_unknown_output_extension() {
        let mut cfg = config(Mode::Both);
        cfg.output_image = Some("out.xyz".into());
        assert!(matches!(
            cfg.validate().unwrap_err(),
            PixelSheetError::Output {
                stage: crate::Stage::Import,
                ..
            }
        ));
    }

    #[test]
    fn test_config_from_json_with_defaults() {
        let cfg: Config = serde_json::from_str(
            r#"{ "mode": "to_excel", "input_image": "a.png", "spreadsheet": "a.xlsx" }"#,
        )
        .unwrap();
        assert_eq!(cfg.mode, Mode::Export);
        assert_eq!(cfg.grid_width, DEFAULT_GRID_SIZE);
        assert_eq!(cfg.grid_height, DEFAULT_GRID_SIZE);
        assert_eq!(cfg.upscale, DEFAULT_UPSCALE);
        assert_eq!(cfg.output_image, None);
    }

    #[test]
    fn test_config_load_missing_file() {
        let err = Config::load(Path::new("no/such/config.json")).unwrap_err();
        assert!(matches!(err, PixelSheetError::Config { .. }));
    }
}
