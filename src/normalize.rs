// logbook-pdf: photo normalization (decode, bound, recompress)

use ::image::codecs::jpeg::JpegEncoder;
use ::image::imageops::FilterType;
use ::image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader, Rgba, RgbImage};
use log::debug;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::Path;
use uuid::Uuid;

use crate::error::PhotoError;

/// MIME reported for files whose extension is not a known image format
const UNKNOWN_MIME: &str = "application/octet-stream";

// ============================================================================
// Data Structures
// ============================================================================

/// Resize and recompress settings applied to every uploaded photo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    pub max_width: u32,
    pub max_height: u32,
    /// JPEG quality on a 0.0-1.0 scale
    pub quality: f32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            max_width: 800,
            max_height: 600,
            quality: 0.8,
        }
    }
}

/// An uploaded file as delivered by the caller, before any checks
#[derive(Debug, Clone)]
pub struct RawImageInput {
    /// Empty when the declared length was over the read limit
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub byte_len: u64,
    pub file_name: String,
}

impl RawImageInput {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>, file_name: impl Into<String>) -> Self {
        let byte_len = bytes.len() as u64;
        Self {
            bytes,
            mime_type: mime_type.into(),
            byte_len,
            file_name: file_name.into(),
        }
    }

    /// Read a file from disk, declaring its MIME type from the extension.
    ///
    /// Files larger than `max_len` are not read; only their size is recorded
    /// so the size check can reject them.
    pub fn from_path(path: &Path, max_len: u64) -> Result<Self, PhotoError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let unreadable = |e: std::io::Error| PhotoError::Unreadable {
            name: file_name.clone(),
            reason: e.to_string(),
        };

        let mime_type = ImageFormat::from_path(path)
            .map(|f| f.to_mime_type())
            .unwrap_or(UNKNOWN_MIME);

        let byte_len = std::fs::metadata(path).map_err(unreadable)?.len();
        if byte_len > max_len {
            debug!("not reading {}: {} bytes over limit {}", file_name, byte_len, max_len);
            return Ok(Self {
                bytes: Vec::new(),
                mime_type: mime_type.to_string(),
                byte_len,
                file_name,
            });
        }

        let bytes = std::fs::read(path).map_err(unreadable)?;
        Ok(Self::new(bytes, mime_type, file_name))
    }
}

/// A photo after resize + JPEG recompression, ready for layout
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedPhoto {
    pub id: Uuid,
    pub encoded_data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub source_name: String,
}

// ============================================================================
// Normalization
// ============================================================================

/// Decode, shrink to fit `max_width` x `max_height` and re-encode as JPEG.
///
/// Both axes are bounded by one uniform scale factor, so the aspect ratio is
/// kept and images already inside the bounds are never upscaled.
pub fn normalize(raw: &RawImageInput, config: &CompressionConfig) -> Result<NormalizedPhoto, PhotoError> {
    let decoded = decode_upright(&raw.bytes).map_err(|source| PhotoError::ImageDecode {
        name: raw.file_name.clone(),
        source,
    })?;

    let (w0, h0) = (decoded.width(), decoded.height());
    let (width, height) = bounded_dimensions(w0, h0, config.max_width, config.max_height);

    let scaled = if (width, height) == (w0, h0) {
        decoded
    } else {
        decoded.resize_exact(width, height, FilterType::Triangle)
    };

    let encoded_data = encode_jpeg(&scaled, config.quality).map_err(|source| PhotoError::ImageEncode {
        name: raw.file_name.clone(),
        source,
    })?;

    debug!(
        "normalized {}: {}x{} -> {}x{} ({} -> {} bytes)",
        raw.file_name,
        w0,
        h0,
        width,
        height,
        raw.byte_len,
        encoded_data.len()
    );

    Ok(NormalizedPhoto {
        id: Uuid::now_v7(),
        encoded_data,
        width,
        height,
        source_name: raw.file_name.clone(),
    })
}

/// Decode and apply the EXIF orientation, so camera photos come out upright
fn decode_upright(bytes: &[u8]) -> Result<DynamicImage, ::image::ImageError> {
    let mut decoder = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .into_decoder()?;
    let orientation = decoder.orientation()?;
    let mut image = DynamicImage::from_decoder(decoder)?;
    image.apply_orientation(orientation);
    Ok(image)
}

/// Output size for a `w0` x `h0` image under the uniform two-axis bound.
/// Fractional results are truncated, with a floor of one pixel.
pub fn bounded_dimensions(w0: u32, h0: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if w0 == 0 || h0 == 0 || (w0 <= max_width && h0 <= max_height) {
        return (w0, h0);
    }

    let (w0, h0, max_w, max_h) = (w0 as u64, h0 as u64, max_width as u64, max_height as u64);

    // Scale is min(max_w / w0, max_h / h0); compare cross products to stay in integers
    let (width, height) = if max_w * h0 <= max_h * w0 {
        (max_w, h0 * max_w / w0)
    } else {
        (w0 * max_h / h0, max_h)
    };
    (width.max(1) as u32, height.max(1) as u32)
}

fn encode_jpeg(image: &DynamicImage, quality: f32) -> Result<Vec<u8>, ::image::ImageError> {
    let rgb = flatten_onto_white(image);
    let quality = (quality.clamp(0.0, 1.0) * 100.0).round().max(1.0) as u8;

    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    encoder.encode_image(&rgb)?;
    Ok(buf)
}

/// JPEG has no alpha channel; composite transparent pixels against white
fn flatten_onto_white(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }

    let rgba_image = image.to_rgba8();
    let (width, height) = rgba_image.dimensions();
    let mut rgb_image = RgbImage::new(width, height);
    for (x, y, pixel) in rgba_image.enumerate_pixels() {
        let Rgba([r, g, b, a]) = *pixel;
        let alpha = a as f32 / 255.0;
        let bg = 255.0;
        let out_r = (r as f32 * alpha + bg * (1.0 - alpha)) as u8;
        let out_g = (g as f32 * alpha + bg * (1.0 - alpha)) as u8;
        let out_b = (b as f32 * alpha + bg * (1.0 - alpha)) as u8;
        rgb_image.put_pixel(x, y, ::image::Rgb([out_r, out_g, out_b]));
    }
    rgb_image
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::image::RgbaImage;
    use std::io::Cursor;

    fn png_input(width: u32, height: u32, name: &str) -> RawImageInput {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, ::image::Rgb([40, 120, 200])));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png).unwrap();
        RawImageInput::new(bytes, "image/png", name)
    }

    #[test]
    fn test_large_landscape_is_bounded() {
        let photo = normalize(&png_input(1600, 1200, "wide.png"), &CompressionConfig::default()).unwrap();
        assert_eq!((photo.width, photo.height), (800, 600));
        assert_eq!(photo.source_name, "wide.png");
    }

    #[test]
    fn test_tall_image_bounded_by_height() {
        let photo = normalize(&png_input(1000, 3000, "tall.png"), &CompressionConfig::default()).unwrap();
        assert_eq!((photo.width, photo.height), (200, 600));
    }

    #[test]
    fn test_small_image_not_upscaled() {
        let photo = normalize(&png_input(400, 300, "small.png"), &CompressionConfig::default()).unwrap();
        assert_eq!((photo.width, photo.height), (400, 300));
    }

    #[test]
    fn test_output_is_jpeg() {
        let photo = normalize(&png_input(120, 80, "x.png"), &CompressionConfig::default()).unwrap();
        assert_eq!(::image::guess_format(&photo.encoded_data).unwrap(), ImageFormat::Jpeg);
        let decoded = ::image::load_from_memory(&photo.encoded_data).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (120, 80));
    }

    #[test]
    fn test_transparent_png_is_flattened() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 0])));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png).unwrap();
        let input = RawImageInput::new(bytes, "image/png", "clear.png");

        let photo = normalize(&input, &CompressionConfig::default()).unwrap();
        let decoded = ::image::load_from_memory(&photo.encoded_data).unwrap().to_rgb8();
        let ::image::Rgb([r, g, b]) = *decoded.get_pixel(5, 5);
        assert!(r > 240 && g > 240 && b > 240, "expected white, got {:?}", (r, g, b));
    }

    #[test]
    fn test_corrupt_data_fails_with_decode_error() {
        let input = RawImageInput::new(b"not an image at all".to_vec(), "image/jpeg", "broken.jpg");
        match normalize(&input, &CompressionConfig::default()) {
            Err(PhotoError::ImageDecode { name, .. }) => assert_eq!(name, "broken.jpg"),
            other => panic!("expected decode error, got {:?}", other),
        }
    }

    #[test]
    fn test_ids_are_unique() {
        let input = png_input(8, 8, "a.png");
        let a = normalize(&input, &CompressionConfig::default()).unwrap();
        let b = normalize(&input, &CompressionConfig::default()).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_bounded_dimensions_never_exceed_bounds() {
        for &(w, h) in &[(801, 601), (1234, 987), (4000, 10), (10, 4000), (799, 6000), (3, 3)] {
            let (bw, bh) = bounded_dimensions(w, h, 800, 600);
            assert!(bw <= 800 && bh <= 600, "{}x{} -> {}x{}", w, h, bw, bh);
            assert!(bw <= w && bh <= h, "upscaled {}x{} -> {}x{}", w, h, bw, bh);
            assert!(bw >= 1 && bh >= 1);
        }
    }

    #[test]
    fn test_bounded_dimensions_keeps_aspect_ratio() {
        let (w, h) = bounded_dimensions(3000, 2000, 800, 600);
        assert_eq!((w, h), (800, 533));
        let original = 3000.0 / 2000.0;
        let scaled = w as f64 / h as f64;
        assert!((original - scaled).abs() < 0.01);
    }

    #[test]
    fn test_mime_from_extension() {
        let dir = std::env::temp_dir().join(format!("logbook-normalize-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("photo.JPG");
        std::fs::write(&path, b"abc").unwrap();

        let input = RawImageInput::from_path(&path, u64::MAX).unwrap();
        assert_eq!(input.mime_type, "image/jpeg");
        assert_eq!(input.byte_len, 3);
        assert_eq!(input.bytes, b"abc");
        assert_eq!(input.file_name, "photo.JPG");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_oversized_file_is_not_read() {
        let dir = std::env::temp_dir().join(format!("logbook-normalize-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("huge.png");
        std::fs::write(&path, vec![0u8; 2000]).unwrap();

        let input = RawImageInput::from_path(&path, 1000).unwrap();
        assert_eq!(input.byte_len, 2000);
        assert!(input.bytes.is_empty());
        assert_eq!(input.mime_type, "image/png");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        let path = std::env::temp_dir().join(format!("logbook-missing-{}.png", Uuid::new_v4()));
        assert!(matches!(
            RawImageInput::from_path(&path, u64::MAX),
            Err(PhotoError::Unreadable { .. })
        ));
    }

    /// JPEG whose APP1 segment carries only an orientation tag
    fn jpeg_with_orientation(width: u32, height: u32, orientation: u8) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, ::image::Rgb([200, 30, 30]));
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, 90).encode_image(&img).unwrap();

        let mut app1 = vec![0xFF, 0xE1, 0x00, 0x22];
        app1.extend_from_slice(b"Exif\0\0");
        app1.extend_from_slice(&[b'M', b'M', 0x00, 0x2A, 0x00, 0x00, 0x00, 0x08]);
        app1.extend_from_slice(&[0x00, 0x01]);
        app1.extend_from_slice(&[0x01, 0x12, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01, 0x00, orientation, 0x00, 0x00]);
        app1.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);

        // Right after SOI
        let mut out = jpeg[..2].to_vec();
        out.extend_from_slice(&app1);
        out.extend_from_slice(&jpeg[2..]);
        out
    }

    #[test]
    fn test_exif_rotation_applied() {
        let input = RawImageInput::new(jpeg_with_orientation(40, 20, 6), "image/jpeg", "phone.jpg");
        let photo = normalize(&input, &CompressionConfig::default()).unwrap();
        assert_eq!((photo.width, photo.height), (20, 40));
    }

    #[test]
    fn test_exif_normal_orientation_unchanged() {
        let input = RawImageInput::new(jpeg_with_orientation(40, 20, 1), "image/jpeg", "flat.jpg");
        let photo = normalize(&input, &CompressionConfig::default()).unwrap();
        assert_eq!((photo.width, photo.height), (40, 20));
    }
}
