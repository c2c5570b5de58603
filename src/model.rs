//! Data model shared by the pipeline stages.
//!
//! Values flow strictly forward:
//!
//! ```text
//! StickerMessage ─▶ RawAsset ─▶ DecodedImage ─┬─▶ OutputArtifact (png)
//!                                             └─▶ CompositedPhoto ─▶ OutputArtifact ×2 (jpg)
//!                                                                  ─▶ OutboundBatch
//! ```
//!
//! Every value is owned by exactly one orchestrator run and is never shared
//! with a concurrent run.

use crate::error::{FailureKind, StickerError};
use image::{RgbImage, RgbaImage};
use std::fmt;

/// Reply correlation: the chat and the message a response threads under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReplyTo {
    pub chat_id: i64,
    pub message_id: i64,
}

/// An inbound sticker, as extracted from a chat update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StickerMessage {
    pub chat_id: i64,
    pub message_id: i64,
    /// Sender's display name, used for logging only.
    pub sender: String,
    /// Opaque remote file identifier.
    pub file_id: String,
    /// Short label attached to the sticker; becomes the filename prefix.
    pub emoji: String,
    /// Declared width in pixels. May be zero or negative on malformed input.
    pub width: i32,
    /// Declared height in pixels.
    pub height: i32,
}

impl StickerMessage {
    pub fn reply_to(&self) -> ReplyTo {
        ReplyTo {
            chat_id: self.chat_id,
            message_id: self.message_id,
        }
    }

    /// Declared dimensions as unsigned pixel counts.
    ///
    /// # Errors
    /// [`StickerError::InvalidDimensions`] when either side is zero or negative.
    pub fn target_dimensions(&self) -> Result<(u32, u32), StickerError> {
        match (u32::try_from(self.width), u32::try_from(self.height)) {
            (Ok(w), Ok(h)) if w > 0 && h > 0 => Ok((w, h)),
            _ => Err(StickerError::InvalidDimensions {
                width: self.width,
                height: self.height,
            }),
        }
    }
}

/// Downloaded bytes, guaranteed to be within the fetcher's ceiling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAsset {
    bytes: Vec<u8>,
}

impl RawAsset {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A decoded sticker with per-pixel alpha. Read-only after decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub pixels: RgbaImage,
}

impl DecodedImage {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

/// A fully opaque rendition of the sticker at its declared size.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositedPhoto {
    pub pixels: RgbImage,
}

/// Which rendition an artifact carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactRole {
    /// Lossless PNG with alpha, sent as a document.
    Archival,
    /// Full-size JPEG.
    FullPhoto,
    /// Downscaled JPEG.
    ScaledPhoto,
}

/// A named, immutable encoded buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputArtifact {
    pub role: ArtifactRole,
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl OutputArtifact {
    /// Items in a grouped send are captioned with their filename.
    pub fn caption(&self) -> &str {
        &self.filename
    }
}

/// A grouped photo send, ordered by filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundBatch {
    pub reply: ReplyTo,
    pub items: Vec<OutputArtifact>,
}

/// The working stages of a conversion run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Fetching,
    Decoding,
    Compositing,
    Encoding,
    Delivering,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Fetching => "fetching",
            Stage::Decoding => "decoding",
            Stage::Compositing => "compositing",
            Stage::Encoding => "encoding",
            Stage::Delivering => "delivering",
        };
        f.write_str(s)
    }
}

/// Where a run ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running(Stage),
    Done,
    Failed { stage: Stage, kind: FailureKind },
}

impl RunState {
    pub fn is_done(&self) -> bool {
        matches!(self, RunState::Done)
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            RunState::Failed { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Summary of one orchestrator run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionReport {
    pub reply: ReplyTo,
    pub state: RunState,
    /// Filenames that reached the chat, in send order.
    pub delivered: Vec<String>,
    /// Whether a failure notice was sent to the chat.
    pub notified: bool,
    pub duration_ms: u64,
}
