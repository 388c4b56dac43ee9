// logbook-pdf: error types

use thiserror::Error;
use uuid::Uuid;

/// Failure for a single uploaded file. Never aborts the rest of a batch.
#[derive(Error, Debug)]
pub enum PhotoError {
    #[error("Failed to read {name}: {reason}")]
    Unreadable { name: String, reason: String },
    #[error("Failed to decode image {name}: {source}")]
    ImageDecode {
        name: String,
        #[source]
        source: ::image::ImageError,
    },
    #[error("Failed to encode {name} as JPEG: {source}")]
    ImageEncode {
        name: String,
        #[source]
        source: ::image::ImageError,
    },
    #[error("File type not allowed for {name}: {mime} (use JPG or PNG)")]
    InvalidFileType { name: String, mime: String },
    #[error("File too large: {name} is {size} bytes (max {max})")]
    FileTooLarge { name: String, size: u64, max: u64 },
    #[error("Maximum of {max} photos allowed, skipped {skipped} remaining file(s)")]
    PhotoCapExceeded { max: usize, skipped: usize },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayoutError {
    #[error("Photo {photo_id} has invalid dimensions {width}x{height}")]
    InvalidDimensions { photo_id: Uuid, width: u32, height: u32 },
    #[error("Invalid page geometry: {0}")]
    InvalidGeometry(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Failed to create PDF: {0}")]
    PdfError(String),
    #[error("Failed to load config: {0}")]
    ConfigError(String),
    #[error("Invalid form: {0}")]
    FormError(String),
    #[error("Failed to share logbook: {0}")]
    ShareError(String),
    #[error("Layout failed: {0}")]
    Layout(#[from] LayoutError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
