// logbook-pdf: editing session state (class, students, photos)

use log::{info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::{AppError, PhotoError};
use crate::normalize::{normalize, NormalizedPhoto, RawImageInput};

/// Outcome of one upload batch
#[derive(Debug, Default)]
pub struct BatchReport {
    pub accepted: Vec<Uuid>,
    pub rejected: Vec<PhotoError>,
    /// Files left unprocessed because the photo cap was reached
    pub skipped: usize,
}

/// Everything the user has entered so far.
///
/// Photos keep submission order, which is also their layout order.
#[derive(Debug, Clone)]
pub struct Session {
    pub class_name: String,
    students: Vec<String>,
    photos: Vec<NormalizedPhoto>,
    config: AppConfig,
}

impl Session {
    pub fn new(config: AppConfig) -> Self {
        Self {
            class_name: String::new(),
            students: Vec::new(),
            photos: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn photos(&self) -> &[NormalizedPhoto] {
        &self.photos
    }

    pub fn set_class_name(&mut self, name: impl Into<String>) {
        self.class_name = name.into();
    }

    pub fn add_student(&mut self, name: impl Into<String>) -> Result<(), AppError> {
        if self.students.len() >= self.config.max_students {
            return Err(AppError::FormError(format!(
                "Maximum of {} students allowed",
                self.config.max_students
            )));
        }
        self.students.push(name.into());
        Ok(())
    }

    /// Trimmed, non-empty student names joined with ", "
    pub fn student_names(&self) -> String {
        self.students
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Check, normalize and append each file in order.
    ///
    /// Per-file failures are collected and the batch continues. Once the cap
    /// is reached the rest of the batch is dropped and reported once.
    pub fn add_photos<I>(&mut self, batch: I) -> BatchReport
    where
        I: IntoIterator<Item = RawImageInput>,
    {
        let mut report = BatchReport::default();
        let mut batch = batch.into_iter();

        while let Some(input) = batch.next() {
            if self.photos.len() >= self.config.max_photos {
                report.skipped = 1 + batch.by_ref().count();
                let err = PhotoError::PhotoCapExceeded {
                    max: self.config.max_photos,
                    skipped: report.skipped,
                };
                warn!("{}", err);
                report.rejected.push(err);
                break;
            }

            match self.check_and_normalize(&input) {
                Ok(photo) => {
                    report.accepted.push(photo.id);
                    self.photos.push(photo);
                }
                Err(err) => {
                    warn!("{}", err);
                    report.rejected.push(err);
                }
            }
        }

        info!(
            "photo batch: {} accepted, {} rejected, {} skipped ({})",
            report.accepted.len(),
            report.rejected.len(),
            report.skipped,
            self.photo_counter()
        );
        report
    }

    fn check_and_normalize(&self, input: &RawImageInput) -> Result<NormalizedPhoto, PhotoError> {
        if !self.config.is_allowed_type(&input.mime_type) {
            return Err(PhotoError::InvalidFileType {
                name: input.file_name.clone(),
                mime: input.mime_type.clone(),
            });
        }
        if input.byte_len > self.config.max_file_size {
            return Err(PhotoError::FileTooLarge {
                name: input.file_name.clone(),
                size: input.byte_len,
                max: self.config.max_file_size,
            });
        }
        normalize(input, &self.config.image_compression)
    }

    /// Returns false if no photo had that id
    pub fn remove_photo(&mut self, id: Uuid) -> bool {
        let before = self.photos.len();
        self.photos.retain(|p| p.id != id);
        self.photos.len() != before
    }

    pub fn photo_counter(&self) -> String {
        format!("{} / {}", self.photos.len(), self.config.max_photos)
    }

    /// Reset the form, keeping the configuration
    pub fn clear(&mut self) {
        self.class_name.clear();
        self.students.clear();
        self.photos.clear();
    }

    /// Class name and at least one student are required
    pub fn validate(&self) -> Result<(), AppError> {
        if self.class_name.trim().is_empty() || self.student_names().is_empty() {
            return Err(AppError::FormError(
                "class name and at least one student are required".to_string(),
            ));
        }
        Ok(())
    }
}
