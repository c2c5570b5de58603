//! Bounded download of a sticker file.
//!
//! ## Why stream instead of `response.bytes()`?
//!
//! Stickers are small, but the file host serves whatever the sender
//! uploaded. Reading the body chunk by chunk lets us stop at `max_size + 1`
//! bytes: at most one byte past the ceiling is ever buffered, and a file
//! that reaches it is rejected as a whole rather than truncated into
//! something that might still decode.

use crate::config::RelayConfig;
use crate::error::{RelayError, StickerError};
use crate::model::RawAsset;
use futures::StreamExt;
use std::time::Duration;
use tracing::debug;

/// HTTP downloader with a hard byte ceiling and an overall timeout.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    max_size: u64,
    timeout: Duration,
}

impl Fetcher {
    pub fn new(max_size: u64, timeout: Duration) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            max_size,
            timeout,
        })
    }

    pub fn from_config(config: &RelayConfig) -> Result<Self, RelayError> {
        Self::new(config.max_file_size, config.download_timeout())
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Download `url`, failing with [`StickerError::TooLarge`] if the body
    /// exceeds the ceiling.
    ///
    /// The URL embeds the bot token, so it is never logged.
    pub async fn fetch(&self, url: &str) -> Result<RawAsset, StickerError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.transfer_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StickerError::TransferFailed {
                reason: status.to_string(),
            });
        }

        let too_large = StickerError::TooLarge {
            limit: self.max_size,
        };

        // A declared length over the limit is rejected before reading the body.
        if let Some(len) = response.content_length() {
            if len > self.max_size {
                debug!("Rejecting download: Content-Length {} > {}", len, self.max_size);
                return Err(too_large);
            }
        }

        let limit = self.max_size.saturating_add(1);
        let capacity = response.content_length().unwrap_or(0).min(limit) as usize;
        let mut body: Vec<u8> = Vec::with_capacity(capacity);
        let mut chunks = response.bytes_stream();

        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(|e| self.transfer_error(e))?;
            let room = (limit - body.len() as u64) as usize;
            body.extend_from_slice(&chunk[..chunk.len().min(room)]);

            if body.len() as u64 > self.max_size {
                debug!("Rejecting download: body exceeded {} bytes", self.max_size);
                return Err(too_large);
            }
        }

        debug!("Downloaded {} bytes", body.len());
        Ok(RawAsset::new(body))
    }

    fn transfer_error(&self, e: reqwest::Error) -> StickerError {
        let reason = if e.is_timeout() {
            format!("timed out after {}s", self.timeout.as_secs())
        } else {
            // Strip the URL: it carries the bot token.
            e.without_url().to_string()
        };
        StickerError::TransferFailed { reason }
    }
}
