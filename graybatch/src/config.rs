use anyhow::{Context, Result};

use std::path::{Path, PathBuf};
use std::fs;

use crate::convert::Backend;
use crate::image::ImageFormat;

/// How an output file is named after its input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum OutputNaming {
    /// Keep the input file name byte for byte, whatever the encoding.
    #[default]
    SameName,
    /// Swap the last extension for the output format's extension.
    ReplaceExtension,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub backend: Backend,
    pub image_format: ImageFormat,
    pub naming: OutputNaming,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("ISIC_2020_Test_Input"),
            output_dir: PathBuf::from("ISIC_2020_Test_Output"),
            backend: Backend::Auto,
            image_format: ImageFormat::default(),
            naming: OutputNaming::SameName,
        }
    }
}

impl BatchConfig {
    /// Load the per-user config, if there is a readable one.
    pub fn load() -> Option<Self> {
        let config_path = Self::config_path()?;

        fs::read_to_string(&config_path)
            .ok()
            .and_then(|contents| serde_json::from_str(&contents).ok())
    }

    /// Store as the per-user config read by `load`.
    pub fn save(&self) -> Option<()> {
        let config_path = Self::config_path()?;
        self.save_to(&config_path).ok()
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("Failed to write config {}", path.display()))
    }

    /// Load an explicitly requested config file; unlike `load`, failures are errors.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Invalid config {}", path.display()))
    }

    fn config_path() -> Option<PathBuf> {
        #[allow(deprecated)]
        let home = std::env::home_dir()?;
        Some(home.join(".config").join("graybatch").join("config.json"))
    }

    /// Where the grayscale version of `file_name` is written.
    pub fn output_path(&self, file_name: &Path) -> PathBuf {
        let target = self.output_dir.join(file_name);
        match self.naming {
            OutputNaming::SameName => target,
            OutputNaming::ReplaceExtension => target.with_extension(self.image_format.extension()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::PngCompression;

    #[test]
    fn same_name_keeps_extension() {
        let config = BatchConfig {
            output_dir: PathBuf::from("out"),
            ..Default::default()
        };
        assert_eq!(
            config.output_path(Path::new("ISIC_0052060.jpg")),
            PathBuf::from("out/ISIC_0052060.jpg")
        );
    }

    #[test]
    fn replace_extension_only_touches_last_dot() {
        let config = BatchConfig {
            output_dir: PathBuf::from("out"),
            naming: OutputNaming::ReplaceExtension,
            image_format: ImageFormat::Jpeg { quality: 90 },
            ..Default::default()
        };
        assert_eq!(
            config.output_path(Path::new("Dr. STONE v01.scan.png")),
            PathBuf::from("out/Dr. STONE v01.scan.jpg")
        );
        assert_eq!(
            config.output_path(Path::new("no_extension")),
            PathBuf::from("out/no_extension.jpg")
        );
    }

    #[test]
    fn partial_config_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "backend": "cpu", "output_dir": "gray" }"#).unwrap();

        let config = BatchConfig::load_from(&path).unwrap();
        assert_eq!(config.backend, Backend::Cpu);
        assert_eq!(config.output_dir, PathBuf::from("gray"));
        assert_eq!(config.input_dir, PathBuf::from("ISIC_2020_Test_Input"));
        assert_eq!(
            config.image_format,
            ImageFormat::Png {
                compression: PngCompression::Default
            }
        );
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graybatch").join("config.json");
        let config = BatchConfig {
            backend: Backend::Gpu,
            image_format: ImageFormat::WebP { quality: 40 },
            naming: OutputNaming::ReplaceExtension,
            ..Default::default()
        };

        config.save_to(&path).unwrap();
        assert_eq!(BatchConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn malformed_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let err = BatchConfig::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid config"));
    }
}
