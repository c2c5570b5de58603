//! WebP decoding with content-type sniffing on failure.
//!
//! Decoding is all-or-nothing: either the full RGBA grid comes back or an
//! error does. When the bytes are not WebP the error carries a best-effort
//! MIME type of what was actually received, so the sender can be told
//! "unsupported file format image/jpeg" instead of a decoder message.

use crate::error::StickerError;
use crate::model::{DecodedImage, RawAsset};
use image::{ImageError, ImageFormat, ImageReader, Limits};
use std::io::Cursor;
use tracing::debug;

/// Decode a downloaded sticker as WebP, allocating at most `max_alloc`
/// bytes for the pixel buffer.
///
/// # Errors
/// * [`StickerError::TooLarge`] with `limit = max_alloc` when the declared
///   canvas needs a bigger buffer.
/// * [`StickerError::UnsupportedFormat`] for anything else that fails.
pub fn decode_sticker(asset: &RawAsset, max_alloc: u64) -> Result<DecodedImage, StickerError> {
    let bytes = asset.bytes();
    let mut limits = Limits::default();
    limits.max_alloc = Some(max_alloc);

    let mut reader = ImageReader::with_format(Cursor::new(bytes), ImageFormat::WebP);
    reader.limits(limits);

    match reader.decode() {
        Ok(img) => {
            let pixels = img.into_rgba8();
            debug!("Decoded sticker → {}x{} px", pixels.width(), pixels.height());
            Ok(DecodedImage { pixels })
        }
        Err(ImageError::Limits(e)) => {
            debug!("Decoder refused image: {}", e);
            Err(StickerError::TooLarge { limit: max_alloc })
        }
        Err(e) => Err(StickerError::UnsupportedFormat {
            content_type: sniff_content_type(bytes).to_string(),
            detail: e.to_string(),
        }),
    }
}

/// Best-effort MIME type of `bytes`, from magic numbers.
///
/// Falls back to `text/plain; charset=utf-8` for UTF-8 without binary
/// control bytes and `application/octet-stream` for everything else.
pub fn sniff_content_type(bytes: &[u8]) -> &'static str {
    if let Some(kind) = infer::get(bytes) {
        return kind.mime_type();
    }
    if !bytes.is_empty() && !bytes.iter().any(|&b| is_binary_byte(b)) && std::str::from_utf8(bytes).is_ok() {
        "text/plain; charset=utf-8"
    } else {
        "application/octet-stream"
    }
}

fn is_binary_byte(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}
