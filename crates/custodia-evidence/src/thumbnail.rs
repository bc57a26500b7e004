//! Derived preview generation for image media.
//!
//! Thumbnails are aspect-preserving, longest edge at most 1024 px,
//! re-encoded as JPEG. Rendering is pure; storing the result and keying
//! it by its own content hash is the pipeline's job. Failures here are
//! never fatal to an ingestion.

use image::codecs::jpeg::JpegEncoder;
use image::GenericImageView;

pub const MAX_EDGE: u32 = 1024;
pub const JPEG_QUALITY: u8 = 80;

/// An encoded thumbnail plus the dimensions that produced it.
#[derive(Debug, Clone)]
pub struct RenderedThumbnail {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub original_width: u32,
    pub original_height: u32,
}

/// Decode `media_bytes` and render its JPEG thumbnail.
///
/// The error string becomes the `ThumbnailSkipped` reason.
pub fn render(media_bytes: &[u8]) -> Result<RenderedThumbnail, String> {
    let original = image::load_from_memory(media_bytes).map_err(|e| format!("decode: {e}"))?;
    let (original_width, original_height) = original.dimensions();

    let thumb = if original_width <= MAX_EDGE && original_height <= MAX_EDGE {
        original
    } else {
        original.thumbnail(MAX_EDGE, MAX_EDGE)
    };
    let (width, height) = thumb.dimensions();

    let mut bytes = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY);
    // JPEG has no alpha channel.
    thumb
        .to_rgb8()
        .write_with_encoder(encoder)
        .map_err(|e| format!("encode: {e}"))?;

    Ok(RenderedThumbnail {
        bytes,
        width,
        height,
        original_width,
        original_height,
    })
}
