//! Upload image normalization.
//!
//! Every uploaded image is validated (mime, byte size, minimum dimensions),
//! shrunk to fit a fixed bounding box and re-encoded as JPEG so that themes
//! only ever see one format. CPU bound: async callers should run
//! [`normalize`] inside `tokio::task::spawn_blocking`.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::ImageReader;

use crate::error::CoreError;

/// Upload size ceiling (5 MiB).
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Longest allowed edge after normalization.
pub const MAX_DIMENSION: u32 = 2000;

/// JPEG quality used for re-encoding.
pub const JPEG_QUALITY: u8 = 85;

/// Mime type of every normalized image.
pub const OUTPUT_MIME: &str = "image/jpeg";

/// File extension of every normalized image.
pub const OUTPUT_EXTENSION: &str = "jpg";

/// Per-field constraints declared by the theme.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageConstraints {
    pub min_width: Option<u32>,
    pub min_height: Option<u32>,
    /// Accepted mime types. Empty means any `image/*`.
    pub accept: Vec<String>,
}

/// A re-encoded image ready for the blob store.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub mime_type: &'static str,
}

/// Validate and transcode an uploaded image.
///
/// Rejects with `CoreError::Validation` when the mime type is not an image
/// (or not in `constraints.accept`), the payload exceeds [`MAX_UPLOAD_BYTES`],
/// the bytes do not decode, or the decoded image is smaller than the declared
/// minimum dimensions. Images larger than [`MAX_DIMENSION`] on either edge are
/// shrunk preserving aspect ratio; smaller images are never enlarged.
pub fn normalize(
    raw: &[u8],
    mime_type: &str,
    constraints: &ImageConstraints,
) -> Result<NormalizedImage, CoreError> {
    let mime_type = mime_type.trim().to_ascii_lowercase();
    if !mime_type.starts_with("image/") {
        return Err(CoreError::Validation(format!(
            "Unsupported file type '{mime_type}'. Only images can be uploaded"
        )));
    }
    if !constraints.accept.is_empty()
        && !constraints
            .accept
            .iter()
            .any(|accepted| accepted.eq_ignore_ascii_case(&mime_type))
    {
        return Err(CoreError::Validation(format!(
            "Image type '{mime_type}' is not accepted here. Allowed: {}",
            constraints.accept.join(", ")
        )));
    }
    if raw.len() > MAX_UPLOAD_BYTES {
        return Err(CoreError::Validation(format!(
            "Image is {} bytes; the limit is {MAX_UPLOAD_BYTES} bytes",
            raw.len()
        )));
    }

    let decoded = image::load_from_memory(raw)
        .map_err(|e| CoreError::Validation(format!("Could not decode image: {e}")))?;
    let (width, height) = (decoded.width(), decoded.height());

    if let Some(min_width) = constraints.min_width {
        if width < min_width {
            return Err(CoreError::Validation(format!(
                "Image is {width}px wide; at least {min_width}px is required"
            )));
        }
    }
    if let Some(min_height) = constraints.min_height {
        if height < min_height {
            return Err(CoreError::Validation(format!(
                "Image is {height}px tall; at least {min_height}px is required"
            )));
        }
    }

    let (target_w, target_h) = fit_within((width, height), MAX_DIMENSION);
    let resized = if (target_w, target_h) == (width, height) {
        decoded
    } else {
        decoded.resize_exact(target_w, target_h, FilterType::Lanczos3)
    };

    // JPEG has no alpha channel.
    let rgb = resized.to_rgb8();
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY)
        .encode_image(&rgb)
        .map_err(|e| CoreError::Internal(format!("JPEG encoding failed: {e}")))?;

    Ok(NormalizedImage {
        bytes,
        width: rgb.width(),
        height: rgb.height(),
        mime_type: OUTPUT_MIME,
    })
}

/// Scale `source` down so neither edge exceeds `bound`, keeping the aspect
/// ratio. Never enlarges; never returns a zero edge.
pub fn fit_within(source: (u32, u32), bound: u32) -> (u32, u32) {
    let (w, h) = source;
    if w <= bound && h <= bound {
        return (w, h);
    }
    let scale = bound as f64 / w.max(h) as f64;
    let scaled = |edge: u32| ((edge as f64 * scale).round() as u32).clamp(1, bound);
    (scaled(w), scaled(h))
}

/// Read pixel dimensions from an encoded image header without decoding it.
pub fn probe_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

#[cfg(test)]
mod tests {
    use image::{DynamicImage, ImageFormat, RgbImage, RgbaImage};

    use super::*;

    fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }

    fn jpeg(width: u32, height: u32) -> Vec<u8> {
        encode(
            DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb([200, 40, 40]))),
            ImageFormat::Jpeg,
        )
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        encode(
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, image::Rgba([0, 0, 255, 128]))),
            ImageFormat::Png,
        )
    }

    #[test]
    fn fit_within_only_shrinks() {
        assert_eq!(fit_within((3000, 1000), 2000), (2000, 667));
        assert_eq!(fit_within((1000, 3000), 2000), (667, 2000));
        assert_eq!(fit_within((800, 600), 2000), (800, 600));
        assert_eq!(fit_within((2000, 2000), 2000), (2000, 2000));
        assert_eq!(fit_within((100_000, 10), 2000), (2000, 1));
    }

    #[test]
    fn rejects_non_image_mime() {
        let err = normalize(b"%PDF-1.4", "application/pdf", &ImageConstraints::default()).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn rejects_mime_outside_accept_list() {
        let constraints = ImageConstraints {
            accept: vec!["image/png".into()],
            ..Default::default()
        };
        let err = normalize(&jpeg(10, 10), "image/jpeg", &constraints).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert!(normalize(&png(10, 10), "IMAGE/PNG", &constraints).is_ok());
    }

    #[test]
    fn rejects_payload_over_size_ceiling() {
        let mut big = jpeg(16, 16);
        big.resize(6 * 1024 * 1024, 0);
        let err = normalize(&big, "image/jpeg", &ImageConstraints::default()).unwrap_err();
        match err {
            CoreError::Validation(msg) => assert!(msg.contains("limit"), "{msg}"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_images_below_minimum_width() {
        let constraints = ImageConstraints {
            min_width: Some(200),
            ..Default::default()
        };
        let err = normalize(&png(100, 100), "image/png", &constraints).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn rejects_images_below_minimum_height() {
        let constraints = ImageConstraints {
            min_height: Some(50),
            ..Default::default()
        };
        assert!(normalize(&png(100, 40), "image/png", &constraints).is_err());
        assert!(normalize(&png(100, 60), "image/png", &constraints).is_ok());
    }

    #[test]
    fn rejects_undecodable_bytes() {
        let err = normalize(b"definitely not an image", "image/png", &ImageConstraints::default())
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn large_jpeg_is_bounded_and_reencoded() {
        let out = normalize(&jpeg(3000, 1000), "image/jpeg", &ImageConstraints::default()).unwrap();
        assert_eq!((out.width, out.height), (2000, 667));
        assert_eq!(out.mime_type, "image/jpeg");

        let decoded = image::load_from_memory(&out.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (2000, 667));
        assert_eq!(image::guess_format(&out.bytes).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn small_png_keeps_size_but_becomes_jpeg() {
        let out = normalize(&png(120, 80), "image/png", &ImageConstraints::default()).unwrap();
        assert_eq!((out.width, out.height), (120, 80));
        assert_eq!(image::guess_format(&out.bytes).unwrap(), ImageFormat::Jpeg);
        assert_eq!(probe_dimensions(&out.bytes), Some((120, 80)));
    }

    #[test]
    fn probe_dimensions_of_garbage_is_none() {
        assert_eq!(probe_dimensions(b"garbage"), None);
    }
}
