// logbook-pdf: delivering the finished logbook (local file, file.io, EmailJS)

use chrono::NaiveDate;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::AppError;

pub const FILE_IO_URL: &str = "https://file.io";
pub const DEFAULT_EXPIRES: &str = "14d";
pub const EMAILJS_URL: &str = "https://api.emailjs.com/api/v1.0/email/send";

/// Characters of the student list kept in generated file names
const FILE_NAME_STUDENT_CHARS: usize = 20;

// ============================================================================
// File Naming and Local Save
// ============================================================================

/// `DDMMYYYY-<class>-<students>.pdf`, anything but ASCII letters and digits
/// replaced by '-'
pub fn pdf_file_name(class_name: &str, students: &str, date: NaiveDate) -> String {
    let students: String = students.chars().take(FILE_NAME_STUDENT_CHARS).collect();
    format!(
        "{}-{}-{}.pdf",
        date.format("%d%m%Y"),
        sanitize(class_name),
        sanitize(&students)
    )
}

fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

pub fn save_local(bytes: &[u8], path: &Path) -> Result<PathBuf, AppError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, bytes)?;
    info!("saved {} bytes to {}", bytes.len(), path.display());
    Ok(path.to_path_buf())
}

// ============================================================================
// file.io Upload
// ============================================================================

/// A public download link and how long it lives
#[derive(Debug, Clone, PartialEq)]
pub struct ShareLink {
    pub link: String,
    pub expires: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    success: bool,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

pub struct FileIoClient {
    pub url: String,
    pub expires: String,
}

impl Default for FileIoClient {
    fn default() -> Self {
        Self {
            url: FILE_IO_URL.to_string(),
            expires: DEFAULT_EXPIRES.to_string(),
        }
    }
}

impl FileIoClient {
    pub fn upload(&self, bytes: &[u8], file_name: &str) -> Result<ShareLink, AppError> {
        let boundary = format!("logbook-{}", Uuid::new_v4().simple());
        let body = multipart_body(&boundary, file_name, bytes);

        let response = ureq::post(&self.url)
            .query("expires", &self.expires)
            .set("Content-Type", &format!("multipart/form-data; boundary={}", boundary))
            .send_bytes(&body)
            .map_err(|e| AppError::ShareError(format!("Upload failed: {}", e)))?;

        let text = response
            .into_string()
            .map_err(|e| AppError::ShareError(format!("Failed to read response: {}", e)))?;
        let link = parse_upload_response(&text)?;

        info!("uploaded {} to {}", file_name, link);
        Ok(ShareLink {
            link,
            expires: self.expires.clone(),
        })
    }
}

fn multipart_body(boundary: &str, file_name: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(bytes.len() + 256);
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: application/pdf\r\n\r\n",
            boundary,
            file_name.replace('"', "")
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}

fn parse_upload_response(text: &str) -> Result<String, AppError> {
    let response: UploadResponse = serde_json::from_str(text)
        .map_err(|e| AppError::ShareError(format!("Invalid upload response: {}", e)))?;

    match (response.success, response.link) {
        (true, Some(link)) => Ok(link),
        (true, None) => Err(AppError::ShareError("upload response has no link".to_string())),
        (false, _) => Err(AppError::ShareError(
            response.message.unwrap_or_else(|| "unknown error".to_string()),
        )),
    }
}

// ============================================================================
// EmailJS Notification
// ============================================================================

/// Everything needed to tell a recipient where the logbook is
#[derive(Debug, Clone)]
pub struct EmailNotice {
    pub from_email: String,
    pub to_email: String,
    pub class_name: String,
    pub students: String,
    pub link: ShareLink,
    pub message: Option<String>,
}

impl EmailNotice {
    pub fn subject(&self) -> String {
        format!("{} - {}", self.class_name, self.students)
    }

    pub fn body(&self) -> String {
        let extra = match self.message.as_deref().map(str::trim) {
            Some(m) if !m.is_empty() => format!("Mensagem adicional:\n{}\n\n", m),
            _ => String::new(),
        };
        format!(
            "Olá,\n\nSegue o diário de bordo da turma {}.\n\nEstudantes: {}\n\nLink para download: {}\n\n{}---\nEste link expira em {} ou após o primeiro download.\nSistema de Diário de Bordo - CETEP/LNAB",
            self.class_name,
            self.students,
            self.link.link,
            extra,
            describe_expiry(&self.link.expires)
        )
    }
}

fn describe_expiry(expires: &str) -> String {
    match expires.strip_suffix('d').and_then(|n| n.parse::<u32>().ok()) {
        Some(days) => format!("{} dias", days),
        None => expires.to_string(),
    }
}

#[derive(Debug, Serialize)]
struct TemplateParams<'a> {
    from_email: &'a str,
    to_email: &'a str,
    subject: String,
    message: String,
    student_names: &'a str,
    turma: &'a str,
    download_link: &'a str,
}

#[derive(Debug, Serialize)]
struct EmailJsRequest<'a> {
    service_id: &'a str,
    template_id: &'a str,
    user_id: &'a str,
    template_params: TemplateParams<'a>,
}

pub struct EmailJsClient {
    pub url: String,
    pub service_id: String,
    pub template_id: String,
    pub public_key: String,
}

impl EmailJsClient {
    pub fn new(service_id: String, template_id: String, public_key: String) -> Self {
        Self {
            url: EMAILJS_URL.to_string(),
            service_id,
            template_id,
            public_key,
        }
    }

    fn request_json(&self, notice: &EmailNotice) -> Result<String, AppError> {
        let request = EmailJsRequest {
            service_id: &self.service_id,
            template_id: &self.template_id,
            user_id: &self.public_key,
            template_params: TemplateParams {
                from_email: &notice.from_email,
                to_email: &notice.to_email,
                subject: notice.subject(),
                message: notice.body(),
                student_names: &notice.students,
                turma: &notice.class_name,
                download_link: &notice.link.link,
            },
        };
        serde_json::to_string(&request).map_err(|e| AppError::ShareError(e.to_string()))
    }

    pub fn send(&self, notice: &EmailNotice) -> Result<(), AppError> {
        let json = self.request_json(notice)?;

        match ureq::post(&self.url)
            .set("Content-Type", "application/json")
            .send_string(&json)
        {
            Ok(_) => {
                info!("email sent to {}", notice.to_email);
                Ok(())
            }
            Err(ureq::Error::Status(412, _)) => Err(AppError::ShareError(
                "EmailJS authentication failed, reconnect the mail account".to_string(),
            )),
            Err(ureq::Error::Status(code, response)) => {
                let text = response.into_string().unwrap_or_default();
                Err(AppError::ShareError(format!("EmailJS returned {}: {}", code, text)))
            }
            Err(e) => Err(AppError::ShareError(format!("Failed to send email: {}", e))),
        }
    }
}
