//! Image encoding: PNG for the archival copy, JPEG for the photos.
//!
//! PNG keeps every pixel and the alpha channel, so the document a user
//! downloads is a faithful copy of the sticker. The photos are JPEG at
//! quality 100: chat clients recompress photos anyway, and starting from
//! the best possible source keeps that second generation clean.

use crate::config::{Scale, JPEG_QUALITY};
use crate::error::StickerError;
use crate::model::{ArtifactRole, CompositedPhoto, DecodedImage, OutputArtifact};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::{self, FilterType};
use image::{ExtendedColorType, ImageEncoder, RgbImage};
use tracing::debug;

/// Encode the decoded sticker, alpha included, as PNG.
pub fn encode_archival(decoded: &DecodedImage, filename: String) -> Result<OutputArtifact, StickerError> {
    let img = &decoded.pixels;
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf)
        .write_image(img.as_raw(), img.width(), img.height(), ExtendedColorType::Rgba8)
        .map_err(|e| StickerError::EncodeFailed {
            format: "png",
            detail: e.to_string(),
        })?;

    debug!("Encoded {} → {} bytes", filename, buf.len());
    Ok(OutputArtifact {
        role: ArtifactRole::Archival,
        filename,
        bytes: buf,
    })
}

/// Encode the full-size photo as JPEG.
pub fn encode_full_photo(photo: &CompositedPhoto, filename: String) -> Result<OutputArtifact, StickerError> {
    let bytes = encode_jpeg(&photo.pixels)?;
    debug!("Encoded {} → {} bytes", filename, bytes.len());
    Ok(OutputArtifact {
        role: ArtifactRole::FullPhoto,
        filename,
        bytes,
    })
}

/// Downscale the photo by `scale` (bilinear) and encode it as JPEG.
///
/// Returns `Ok(None)` when either scaled side rounds down to zero: a tiny
/// sticker simply gets no small copy.
pub fn encode_scaled_photo(
    photo: &CompositedPhoto,
    scale: Scale,
    filename: String,
) -> Result<Option<OutputArtifact>, StickerError> {
    let (width, height) = scaled_dimensions(photo.pixels.dimensions(), scale);
    if width == 0 || height == 0 {
        debug!(
            "Skipping scaled photo: {}x{} scales to {}x{}",
            photo.pixels.width(),
            photo.pixels.height(),
            width,
            height
        );
        return Ok(None);
    }

    let small = imageops::resize(&photo.pixels, width, height, FilterType::Triangle);
    let bytes = encode_jpeg(&small)?;
    debug!("Encoded {} ({}x{}) → {} bytes", filename, width, height, bytes.len());

    Ok(Some(OutputArtifact {
        role: ArtifactRole::ScaledPhoto,
        filename,
        bytes,
    }))
}

/// Size of the small photo for a `(width, height)` source.
pub fn scaled_dimensions((width, height): (u32, u32), scale: Scale) -> (u32, u32) {
    (scale.apply(width), scale.apply(height))
}

fn encode_jpeg(img: &RgbImage) -> Result<Vec<u8>, StickerError> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY)
        .write_image(img.as_raw(), img.width(), img.height(), ExtendedColorType::Rgb8)
        .map_err(|e| StickerError::EncodeFailed {
            format: "jpeg",
            detail: e.to_string(),
        })?;
    Ok(buf)
}
