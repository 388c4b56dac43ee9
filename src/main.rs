// logbook-pdf: Generate class logbooks with photo evidence

use chrono::Local;
use clap::Parser;
use log::warn;
use std::path::{Path, PathBuf};

use logbook_pdf::config::load_config;
use logbook_pdf::error::AppError;
use logbook_pdf::normalize::RawImageInput;
use logbook_pdf::pdf::{compose_logbook, DEFAULT_TITLE};
use logbook_pdf::session::Session;
use logbook_pdf::share::{
    pdf_file_name, save_local, EmailJsClient, EmailNotice, FileIoClient, ShareLink, DEFAULT_EXPIRES,
};

// ============================================================================
// Data Structures
// ============================================================================

/// CLI Arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "Generate class logbook PDFs with photos")]
struct Args {
    /// Class name (turma)
    #[arg(short, long)]
    class: String,

    /// Student name (repeat for each student)
    #[arg(short, long = "student")]
    students: Vec<String>,

    /// Photo file (JPG or PNG, repeat for each photo)
    #[arg(short, long = "photo")]
    photos: Vec<PathBuf>,

    /// Output filename (defaults to DDMMYYYY-class-students.pdf)
    #[arg(short, long)]
    output: Option<String>,

    /// Document title
    #[arg(long, default_value = DEFAULT_TITLE)]
    title: String,

    /// JSON config file overriding limits, compression and layout
    #[arg(long)]
    config: Option<String>,

    /// Upload the PDF to file.io and print the link
    #[arg(long)]
    upload: bool,

    /// file.io link lifetime
    #[arg(long, default_value = DEFAULT_EXPIRES)]
    expires: String,

    /// Email the download link to this address (uploads first)
    #[arg(long, requires = "sender")]
    notify: Option<String>,

    /// Sender address for the notification
    #[arg(long)]
    sender: Option<String>,

    /// Extra message appended to the notification
    #[arg(long)]
    message: Option<String>,

    #[arg(long, env = "EMAILJS_SERVICE_ID")]
    emailjs_service: Option<String>,

    #[arg(long, env = "EMAILJS_TEMPLATE_ID")]
    emailjs_template: Option<String>,

    #[arg(long, env = "EMAILJS_PUBLIC_KEY")]
    emailjs_key: Option<String>,
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), AppError> {
    let args = Args::parse();

    let config = load_config(&args.config)?;
    let mut session = Session::new(config);

    // Form fields
    session.set_class_name(args.class.as_str());
    for student in &args.students {
        session.add_student(student.as_str())?;
    }
    session.validate()?;

    // Photos
    let inputs = read_photos(&args.photos, session.config().max_file_size);
    let report = session.add_photos(inputs);
    if !report.rejected.is_empty() {
        eprintln!("⚠ {} file(s) could not be added", report.rejected.len());
    }

    // Generate PDF
    let now = Local::now();
    let pdf = compose_logbook(&session, &args.title, &now.format("%d/%m/%Y %H:%M:%S").to_string())?;

    let file_name = args
        .output
        .clone()
        .unwrap_or_else(|| pdf_file_name(&session.class_name, &session.student_names(), now.date_naive()));
    let output_path = save_local(&pdf, Path::new(&file_name))?;

    println!("✓ Generated: {}", output_path.display());
    println!("  Class: {}", session.class_name);
    println!("  Students: {}", session.student_names());
    println!("  Photos: {}", session.photo_counter());

    // Share
    let mailer = match &args.notify {
        Some(_) => Some(emailjs_client(&args)?),
        None => None,
    };

    if args.upload || mailer.is_some() {
        let link = upload(&args, &pdf, &output_path)?;
        if let (Some(client), Some(to_email)) = (&mailer, &args.notify) {
            notify(client, &args, &session, to_email, link)?;
        }
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Read every photo path, dropping unreadable files with a warning.
/// Files over `max_len` are passed on unread so the size check rejects them.
fn read_photos(paths: &[PathBuf], max_len: u64) -> Vec<RawImageInput> {
    paths
        .iter()
        .filter_map(|path| match RawImageInput::from_path(path, max_len) {
            Ok(input) => Some(input),
            Err(e) => {
                warn!("{}", e);
                None
            }
        })
        .collect()
}

fn upload(args: &Args, pdf: &[u8], output_path: &Path) -> Result<ShareLink, AppError> {
    let client = FileIoClient {
        expires: args.expires.clone(),
        ..FileIoClient::default()
    };
    let file_name = output_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "logbook.pdf".to_string());

    let link = client.upload(pdf, &file_name)?;
    println!("✓ Link: {} (expires in {})", link.link, link.expires);
    Ok(link)
}

fn missing_option(name: &str) -> AppError {
    AppError::ShareError(format!("missing --{} for email notification", name))
}

/// Checked before uploading so a missing credential fails early
fn emailjs_client(args: &Args) -> Result<EmailJsClient, AppError> {
    Ok(EmailJsClient::new(
        args.emailjs_service.clone().ok_or_else(|| missing_option("emailjs-service"))?,
        args.emailjs_template.clone().ok_or_else(|| missing_option("emailjs-template"))?,
        args.emailjs_key.clone().ok_or_else(|| missing_option("emailjs-key"))?,
    ))
}

fn notify(
    client: &EmailJsClient,
    args: &Args,
    session: &Session,
    to_email: &str,
    link: ShareLink,
) -> Result<(), AppError> {
    let notice = EmailNotice {
        from_email: args.sender.clone().ok_or_else(|| missing_option("sender"))?,
        to_email: to_email.to_string(),
        class_name: session.class_name.clone(),
        students: session.student_names(),
        link,
        message: args.message.clone(),
    };

    client.send(&notice)?;
    println!("✓ Email sent to {}", to_email);
    Ok(())
}
