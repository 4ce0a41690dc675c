//! Image encoding: rendered slides to JPEG, and image bytes to `ImageData`
//! for the vision model.
//!
//! Slides are stored as JPEG (the format the front end and PDF.co both use);
//! a 300-DPI slide is a few hundred KB at quality 90 against several MB as PNG.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use tracing::debug;

/// Encode a rendered slide as JPEG.
///
/// JPEG has no alpha channel, so the image is flattened to RGB first.
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.to_rgb8()
        .write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))?;
    debug!(
        "Encoded {}x{} slide → {} bytes JPEG",
        img.width(),
        img.height(),
        buf.len()
    );
    Ok(buf)
}

/// Wrap raw image bytes as a base64 attachment for a vision model.
///
/// `detail: "high"` keeps small slide text legible to GPT-4-class models.
pub fn image_data(bytes: &[u8], mime_type: &str) -> ImageData {
    ImageData::new(STANDARD.encode(bytes), mime_type).with_detail("high")
}

/// MIME type for a screenshot extension (lower-case, no dot).
pub fn image_mime_type(ext: &str) -> Option<&'static str> {
    match ext {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}
