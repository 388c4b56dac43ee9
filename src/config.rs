// logbook-pdf: application configuration

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::AppError;
use crate::layout::PageGeometry;
use crate::normalize::CompressionConfig;

/// Limits and tuning for a logbook session.
///
/// Every field can be overridden from a JSON file; missing fields keep the
/// defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub max_photos: usize,
    pub max_students: usize,
    pub allowed_file_types: Vec<String>,
    /// Largest accepted original upload, in bytes
    pub max_file_size: u64,
    pub image_compression: CompressionConfig,
    pub layout: PageGeometry,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_photos: 6,
            max_students: 10,
            allowed_file_types: vec![
                "image/jpeg".to_string(),
                "image/jpg".to_string(),
                "image/png".to_string(),
            ],
            max_file_size: 10 * 1024 * 1024,
            image_compression: CompressionConfig::default(),
            layout: PageGeometry::default(),
        }
    }
}

impl AppConfig {
    pub fn is_allowed_type(&self, mime: &str) -> bool {
        self.allowed_file_types.iter().any(|t| t.eq_ignore_ascii_case(mime))
    }

    pub fn from_json(content: &str) -> Result<Self, AppError> {
        let config: AppConfig =
            serde_json::from_str(content).map_err(|e| AppError::ConfigError(format!("Invalid JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Everything a session accepts must also be compressible and placeable
    pub fn validate(&self) -> Result<(), AppError> {
        self.layout.validate()?;

        // Any count up to the cap is admitted by the tier admitting the cap
        if self.max_photos > 0 && self.layout.select_tier(self.max_photos).is_err() {
            return Err(AppError::ConfigError(format!(
                "cell tier table does not cover max_photos = {}",
                self.max_photos
            )));
        }

        let compression = &self.image_compression;
        if compression.max_width == 0 || compression.max_height == 0 {
            return Err(AppError::ConfigError(format!(
                "image_compression bounds {}x{} must be positive",
                compression.max_width, compression.max_height
            )));
        }
        if !(0.0..=1.0).contains(&compression.quality) {
            return Err(AppError::ConfigError(format!(
                "image_compression.quality {} must be between 0.0 and 1.0",
                compression.quality
            )));
        }
        Ok(())
    }
}

/// Load the config file if one was given, otherwise use the defaults
pub fn load_config(path: &Option<String>) -> Result<AppConfig, AppError> {
    match path {
        Some(p) => {
            let content = std::fs::read_to_string(Path::new(p))
                .map_err(|e| AppError::ConfigError(format!("{}: {}", p, e)))?;
            AppConfig::from_json(&content)
        }
        None => Ok(AppConfig::default()),
    }
}
