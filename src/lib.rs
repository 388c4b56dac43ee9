//! logbook-pdf: class logbook ("diário de bordo") generation.
//!
//! Photos are normalized ([`normalize::normalize`]), tiled two per row by
//! [`layout::layout`], drawn into a PDF by [`pdf::compose_logbook`] and
//! optionally delivered through [`share`].

pub mod config;
pub mod error;
pub mod layout;
pub mod normalize;
pub mod pdf;
pub mod session;
pub mod share;

pub use config::AppConfig;
pub use error::{AppError, LayoutError, PhotoError};
pub use layout::{layout, CellTier, PageGeometry, PlacementCommand};
pub use normalize::{normalize, CompressionConfig, NormalizedPhoto, RawImageInput};
pub use session::{BatchReport, Session};
