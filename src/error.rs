//! Error types for the sticker2img library.
//!
//! Three error types reflect three distinct failure scopes:
//!
//! * [`StickerError`]: **Per-message**. One sticker could not be converted
//!   or delivered. The orchestrator catches it at the run boundary, logs it
//!   and (for input-caused kinds only) tells the sender. It never escapes to
//!   the dispatch loop or to sibling conversions.
//!
//! * [`ClientError`]: a call to the chat collaborator failed (transport,
//!   Bot API envelope, malformed payload). Stages wrap it into the matching
//!   [`StickerError`] variant.
//!
//! * [`RelayError`]: **Fatal**. The process cannot keep relaying (bad
//!   configuration, token rejected, polling retries exhausted). Returned from
//!   [`crate::dispatch::run`] and the config builder.

use crate::model::Stage;
use std::fmt;
use thiserror::Error;

/// Everything that can end a single sticker conversion.
#[derive(Debug, Error)]
pub enum StickerError {
    // ── Input errors (the sender is notified) ────────────────────────────
    /// The remote file exceeded the configured size ceiling.
    #[error("file is too big (limit {limit} bytes)")]
    TooLarge { limit: u64 },

    /// The bytes are not a WebP container.
    #[error("unsupported file format {content_type}")]
    UnsupportedFormat { content_type: String, detail: String },

    // ── Internal errors (logged only) ────────────────────────────────────
    /// Resolving or downloading the file failed, including timeouts.
    #[error("transfer failed: {reason}")]
    TransferFailed { reason: String },

    /// PNG or JPEG serialisation failed.
    #[error("{format} encoding failed: {detail}")]
    EncodeFailed { format: &'static str, detail: String },

    /// The converted artifacts could not be sent back to the chat.
    #[error("delivery failed: {reason}")]
    DeliveryFailed { reason: String },

    /// The sticker declared a non-positive width or height.
    #[error("invalid sticker dimensions {width}x{height}")]
    InvalidDimensions { width: i32, height: i32 },

    /// A blocking stage panicked; the fault was contained at its boundary.
    #[error("{stage} stage panicked: {detail}")]
    Panicked { stage: Stage, detail: String },
}

/// Coarse classification of a [`StickerError`], used for the `Failed` run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    TransferFailed,
    TooLarge,
    UnsupportedFormat,
    EncodeFailed,
    DeliveryFailed,
    InvalidDimensions,
    Panicked,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::TransferFailed => "transfer_failed",
            FailureKind::TooLarge => "too_large",
            FailureKind::UnsupportedFormat => "unsupported_format",
            FailureKind::EncodeFailed => "encode_failed",
            FailureKind::DeliveryFailed => "delivery_failed",
            FailureKind::InvalidDimensions => "invalid_dimensions",
            FailureKind::Panicked => "panicked",
        };
        f.write_str(s)
    }
}

impl StickerError {
    pub fn kind(&self) -> FailureKind {
        match self {
            StickerError::TooLarge { .. } => FailureKind::TooLarge,
            StickerError::UnsupportedFormat { .. } => FailureKind::UnsupportedFormat,
            StickerError::TransferFailed { .. } => FailureKind::TransferFailed,
            StickerError::EncodeFailed { .. } => FailureKind::EncodeFailed,
            StickerError::DeliveryFailed { .. } => FailureKind::DeliveryFailed,
            StickerError::InvalidDimensions { .. } => FailureKind::InvalidDimensions,
            StickerError::Panicked { .. } => FailureKind::Panicked,
        }
    }

    /// Text to send back to the chat, if this failure was caused by the input.
    ///
    /// Internal failures return `None`: the sender learns nothing about
    /// network, encoder or delivery problems.
    pub fn user_notice(&self) -> Option<String> {
        match self {
            StickerError::TooLarge { .. } | StickerError::UnsupportedFormat { .. } => {
                Some(self.to_string())
            }
            _ => None,
        }
    }
}

/// A failed call to the chat collaborator.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport-level failure (connect, TLS, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The Bot API answered with `ok: false`.
    #[error("API error {code}: {description}")]
    Api { code: i64, description: String },

    /// The response did not have the expected shape.
    #[error("unexpected response: {0}")]
    InvalidResponse(String),
}

/// Fatal errors that stop the relay.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The HTTP client could not be constructed.
    #[error("Failed to initialise HTTP client: {0}")]
    HttpClient(String),

    /// The bot token was rejected or the API is unreachable at start-up.
    #[error("Failed to start the bot: {0}")]
    Startup(#[source] ClientError),

    /// Update polling failed too many times in a row.
    #[error("Update polling failed {failures} times in a row.\nLast error: {last_error}")]
    PollingExhausted { failures: u32, last_error: String },
}
