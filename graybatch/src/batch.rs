//! Directory driver: enumerate, then decode → convert → save one file at a time.

use anyhow::{Context, Result};
use walkdir::WalkDir;

use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::BatchConfig;
use crate::convert::{ConvertError, Converter};
use crate::image::{decode, encode};

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Converted {
        output: PathBuf,
        width: u32,
        height: u32,
        channels: u8,
    },
    DecodeFailed { error: String },
    ConvertFailed { error: String },
    WriteFailed { output: PathBuf, error: String },
}

impl FileOutcome {
    pub fn is_converted(&self) -> bool {
        matches!(self, FileOutcome::Converted { .. })
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct FileReport {
    pub input: PathBuf,
    #[serde(flatten)]
    pub outcome: FileOutcome,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct BatchReport {
    /// Name of the converter that ran, e.g. the GPU adapter.
    pub backend: String,
    pub files: Vec<FileReport>,
}

impl BatchReport {
    pub fn converted(&self) -> usize {
        self.files.iter().filter(|f| f.outcome.is_converted()).count()
    }

    pub fn failed(&self) -> usize {
        self.files.len() - self.converted()
    }
}

/// Every entry directly inside `dir`, sorted by file name.
///
/// No extension filtering: whatever does not decode is skipped later.
pub fn list_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let meta = std::fs::metadata(dir)
        .with_context(|| format!("Error opening input folder {}", dir.display()))?;
    if !meta.is_dir() {
        anyhow::bail!("Error opening input folder {}: not a directory", dir.display());
    }

    let mut entries = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        match entry {
            Ok(entry) => entries.push(entry.into_path()),
            // the root itself could not be read
            Err(e) if e.depth() == 0 => {
                return Err(e).with_context(|| {
                    format!("Error opening input folder {}", dir.display())
                });
            }
            Err(e) => log::warn!("Failed to read directory entry: {e}"),
        }
    }
    Ok(entries)
}

/// Convert every image in `config.input_dir`.
///
/// Fails only when the input directory cannot be listed; per-file failures
/// are logged and recorded in the report.
pub fn run(config: &BatchConfig) -> Result<BatchReport> {
    let entries = list_entries(&config.input_dir)?;
    log::info!(
        "Found {} entries in {}",
        entries.len(),
        config.input_dir.display()
    );

    prepare_output_dir(&config.output_dir);
    Ok(convert_all(entries, config.backend.converter(), config))
}

/// Create the output directory when missing.
///
/// A failure is logged once; every save then fails on its own and is
/// reported as `WriteFailed`.
fn prepare_output_dir(dir: &Path) {
    if dir.exists() {
        return;
    }
    if let Err(e) = std::fs::create_dir_all(dir) {
        log::error!("Error creating output folder {}: {e}", dir.display());
    }
}

/// Run `entries` through the converter built for this batch.
///
/// The converter is built once; a failure to build it is logged once and
/// then charged to every entry as `ConvertFailed`.
pub fn convert_all(
    entries: Vec<PathBuf>,
    converter: Result<Box<dyn Converter>, ConvertError>,
    config: &BatchConfig,
) -> BatchReport {
    let converter = match converter {
        Ok(converter) => {
            log::info!("Converting with {}", converter.name());
            Ok(converter)
        }
        Err(e) => {
            log::error!("Error setting up {} backend: {e}", config.backend);
            Err(e.to_string())
        }
    };

    let backend = match &converter {
        Ok(c) => c.name().to_string(),
        Err(_) => config.backend.to_string(),
    };

    let start = Instant::now();
    let files: Vec<FileReport> = entries
        .into_iter()
        .map(|input| {
            let outcome = match &converter {
                Ok(converter) => process_file(&input, converter.as_ref(), config),
                Err(e) => {
                    let err = ConvertError::Unavailable(e.clone());
                    log::error!("Error converting image {}: {err}", input.display());
                    FileOutcome::ConvertFailed {
                        error: err.to_string(),
                    }
                }
            };
            FileReport { input, outcome }
        })
        .collect();

    let report = BatchReport { backend, files };
    log::info!(
        "Converted {} of {} files in {:.2?} ({} skipped)",
        report.converted(),
        report.files.len(),
        start.elapsed(),
        report.failed()
    );

    report
}

/// Decode → convert → save for one entry. Never fails the batch.
pub fn process_file(input: &Path, converter: &dyn Converter, config: &BatchConfig) -> FileOutcome {
    let pixels = match decode::open(input) {
        Ok(pixels) => pixels,
        Err(e) => {
            log::warn!("Error loading image: {}: {e:#}", input.display());
            return FileOutcome::DecodeFailed {
                error: format!("{e:#}"),
            };
        }
    };
    log::info!("Image loaded successfully: {}", input.display());

    let (width, height) = pixels.dimensions();
    let channels = pixels.channels();
    log::debug!("{}: {width}x{height}, {channels} channels", input.display());

    let gray = match converter.convert(&pixels) {
        Ok(gray) => gray,
        Err(e) => {
            log::error!("Error converting image {}: {e}", input.display());
            return FileOutcome::ConvertFailed {
                error: e.to_string(),
            };
        }
    };

    // entries come from read_dir so they always have a file name
    let Some(file_name) = input.file_name() else {
        return FileOutcome::WriteFailed {
            output: config.output_dir.clone(),
            error: "input has no file name".to_string(),
        };
    };
    let output = config.output_path(Path::new(file_name));

    match encode::save(&gray, &output, config.image_format) {
        Ok(()) => {
            log::info!("Grayscale image saved: {}", output.display());
            FileOutcome::Converted {
                output,
                width,
                height,
                channels,
            }
        }
        Err(e) => {
            log::error!("Error writing grayscale image: {}: {e:#}", output.display());
            FileOutcome::WriteFailed {
                output,
                error: format!("{e:#}"),
            }
        }
    }
}
