// logbook-pdf: PDF composition

use log::{debug, info};
use printpdf::*;
use ::image::ImageDecoder;
use std::collections::HashMap;
use std::io::Cursor;
use uuid::Uuid;

use crate::error::AppError;
use crate::layout::{layout, PageGeometry, PlacementCommand};
use crate::normalize::NormalizedPhoto;
use crate::session::Session;

// ============================================================================
// Constants
// ============================================================================

/// Default document title
pub const DEFAULT_TITLE: &str = "DIÁRIO DE BORDO - CETEP/LNAB";

/// Font sizes in points
const TITLE_FONT_SIZE: f32 = 16.0;
const NORMAL_FONT_SIZE: f32 = 12.0;

/// Header baselines, measured from the top of the first page
const TITLE_Y_MM: f32 = 30.0;
const CLASS_Y_MM: f32 = 50.0;
const STUDENTS_Y_MM: f32 = 60.0;
const DATE_Y_MM: f32 = 70.0;

const MM_PER_POINT: f32 = 25.4 / 72.0;

/// Average Helvetica glyph width as a fraction of the font size
const AVG_GLYPH_WIDTH: f32 = 0.5;

// ============================================================================
// Drawing Interface
// ============================================================================

/// Something that can realize placement commands as a document
pub trait DocumentSink {
    fn page_count(&self) -> usize;
    fn add_page(&mut self) -> Result<(), AppError>;
    fn draw_image(&mut self, encoded_data: &[u8], placement: &PlacementCommand) -> Result<(), AppError>;
}

/// Draw every command, appending pages until its page index exists
pub fn render_placements<S: DocumentSink>(
    sink: &mut S,
    photos: &[NormalizedPhoto],
    commands: &[PlacementCommand],
) -> Result<(), AppError> {
    let by_id: HashMap<Uuid, &NormalizedPhoto> = photos.iter().map(|p| (p.id, p)).collect();

    for cmd in commands {
        while sink.page_count() <= cmd.page_index {
            sink.add_page()?;
        }
        let photo = by_id
            .get(&cmd.photo_id)
            .ok_or_else(|| AppError::PdfError(format!("no photo with id {}", cmd.photo_id)))?;
        sink.draw_image(&photo.encoded_data, cmd)?;
    }
    Ok(())
}

// ============================================================================
// Logbook Document
// ============================================================================

/// Header text printed on the first page
#[derive(Debug, Clone)]
pub struct LogbookHeader {
    pub title: String,
    pub class_name: String,
    pub students: String,
    pub timestamp: String,
}

pub struct PdfLogbook {
    doc: PdfDocumentReference,
    layers: Vec<PdfLayerReference>,
    page_width: f32,
    page_height: f32,
    font_regular: IndirectFontRef,
    font_bold: IndirectFontRef,
}

impl PdfLogbook {
    pub fn new(header: &LogbookHeader, geometry: &PageGeometry) -> Result<Self, AppError> {
        let (doc, page1, layer1) = PdfDocument::new(
            header.title.as_str(),
            Mm(geometry.page_width),
            Mm(geometry.page_height),
            "Layer 1",
        );
        let first_layer = doc.get_page(page1).get_layer(layer1);

        let font_regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| AppError::PdfError(e.to_string()))?;
        let font_bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| AppError::PdfError(e.to_string()))?;

        let book = Self {
            doc,
            layers: vec![first_layer],
            page_width: geometry.page_width,
            page_height: geometry.page_height,
            font_regular,
            font_bold,
        };
        book.draw_header(header, geometry.margin);
        Ok(book)
    }

    fn draw_header(&self, header: &LogbookHeader, margin: f32) {
        let layer = &self.layers[0];

        let title_width = estimate_text_width(&header.title, TITLE_FONT_SIZE);
        layer.use_text(
            header.title.as_str(),
            TITLE_FONT_SIZE,
            Mm((self.page_width - title_width) / 2.0),
            Mm(self.page_height - TITLE_Y_MM),
            &self.font_bold,
        );

        let lines = [
            (format!("Turma: {}", header.class_name), CLASS_Y_MM),
            (format!("Estudantes: {}", header.students), STUDENTS_Y_MM),
            (format!("Data/Hora: {}", header.timestamp), DATE_Y_MM),
        ];
        for (text, y) in &lines {
            layer.use_text(
                text.as_str(),
                NORMAL_FONT_SIZE,
                Mm(margin),
                Mm(self.page_height - y),
                &self.font_regular,
            );
        }
    }

    /// Serialize the finished document
    pub fn finish(self) -> Result<Vec<u8>, AppError> {
        self.doc.save_to_bytes().map_err(|e| AppError::PdfError(e.to_string()))
    }
}

impl DocumentSink for PdfLogbook {
    fn page_count(&self) -> usize {
        self.layers.len()
    }

    fn add_page(&mut self) -> Result<(), AppError> {
        let (page, layer) = self
            .doc
            .add_page(Mm(self.page_width), Mm(self.page_height), "Layer 1");
        self.layers.push(self.doc.get_page(page).get_layer(layer));
        Ok(())
    }

    fn draw_image(&mut self, encoded_data: &[u8], placement: &PlacementCommand) -> Result<(), AppError> {
        let layer = self
            .layers
            .get(placement.page_index)
            .ok_or_else(|| AppError::PdfError(format!("page {} does not exist", placement.page_index)))?;

        // Only the header is parsed; the JPEG stream is embedded as-is
        let (width_px, height_px) = jpeg_dimensions(encoded_data)?;

        let image = Image::from(ImageXObject {
            width: Px(width_px as usize),
            height: Px(height_px as usize),
            color_space: ColorSpace::Rgb,
            bits_per_component: ColorBits::Bit8,
            interpolate: true,
            image_data: encoded_data.to_vec(),
            image_filter: Some(ImageFilter::DCT),
            clipping_bbox: None,
            smask: None,
        });

        // DPI that makes the pixel width come out at the placed width
        let dpi = (width_px as f32) / (placement.width / 25.4);

        // PDF origin is bottom-left
        image.add_to_layer(
            layer.clone(),
            ImageTransform {
                translate_x: Some(Mm(placement.x)),
                translate_y: Some(Mm(self.page_height - placement.y - placement.height)),
                dpi: Some(dpi),
                ..Default::default()
            },
        );

        debug!(
            "drew {}x{} px photo at page {} ({:.1}, {:.1}) size {:.1}x{:.1} mm",
            width_px, height_px, placement.page_index, placement.x, placement.y, placement.width, placement.height
        );
        Ok(())
    }
}

/// Pixel size of an RGB JPEG, rejecting anything else
fn jpeg_dimensions(encoded_data: &[u8]) -> Result<(u32, u32), AppError> {
    let reader = ::image::ImageReader::with_format(Cursor::new(encoded_data), ::image::ImageFormat::Jpeg);
    let decoder = reader
        .into_decoder()
        .map_err(|e| AppError::PdfError(format!("Failed to read photo: {}", e)))?;
    if decoder.color_type() != ::image::ColorType::Rgb8 {
        return Err(AppError::PdfError(format!(
            "photo must be an RGB JPEG, got {:?}",
            decoder.color_type()
        )));
    }
    Ok(decoder.dimensions())
}

fn estimate_text_width(text: &str, font_size: f32) -> f32 {
    text.chars().count() as f32 * font_size * AVG_GLYPH_WIDTH * MM_PER_POINT
}

// ============================================================================
// Composition
// ============================================================================

/// Lay out the session's photos and draw the whole logbook
pub fn compose_logbook(session: &Session, title: &str, timestamp: &str) -> Result<Vec<u8>, AppError> {
    let geometry = &session.config().layout;
    let commands = layout(session.photos(), geometry)?;

    let header = LogbookHeader {
        title: title.to_string(),
        class_name: session.class_name.trim().to_string(),
        students: session.student_names(),
        timestamp: timestamp.to_string(),
    };

    let mut book = PdfLogbook::new(&header, geometry)?;
    render_placements(&mut book, session.photos(), &commands)?;
    info!(
        "composed logbook: {} photo(s) on {} page(s)",
        commands.len(),
        book.page_count()
    );
    book.finish()
}
