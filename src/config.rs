//! Relay configuration.
//!
//! All tunable behaviour lives in [`RelayConfig`], built via its
//! [`RelayConfigBuilder`]. The bot token is deliberately not part of it: the
//! config is cloned into every conversion task and logged at start-up, the
//! token is handed to [`crate::telegram::TelegramClient`] only.

use crate::error::RelayError;
use crate::governor::MAX_LIMIT;
use std::time::Duration;

/// JPEG quality used for both photo renditions.
pub const JPEG_QUALITY: u8 = 100;

/// Default ceiling for downloaded stickers: 1 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1024 * 1024;

/// Default ceiling for the decoder's pixel buffer: 64 MiB.
pub const DEFAULT_MAX_DECODED_BYTES: u64 = 64 * 1024 * 1024;

/// Configuration for the sticker relay.
///
/// # Example
/// ```rust
/// use sticker2img::{OverlayPolicy, RelayConfig};
///
/// let config = RelayConfig::builder()
///     .max_concurrent_jobs(4)
///     .overlay_policy(OverlayPolicy::ResizeToFit)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_concurrent_jobs, 4);
/// ```
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Maximum accepted sticker size in bytes. Default: 1 MiB.
    ///
    /// The fetcher reads at most one byte past this limit; reaching it
    /// rejects the file outright rather than truncating it.
    pub max_file_size: u64,

    /// Largest pixel buffer the WebP decoder may allocate. Default: 64 MiB.
    ///
    /// A small file can declare a huge canvas; the decoder refuses it
    /// before allocating.
    pub max_decoded_bytes: u64,

    /// Overall timeout for a single file download, in seconds. Default: 60.
    pub download_timeout_secs: u64,

    /// Number of conversions allowed to run at once. Default: available cores.
    ///
    /// The dispatch loop waits for a free slot before starting another
    /// conversion, so a burst of stickers never queues unbounded work.
    pub max_concurrent_jobs: usize,

    /// How a decoded sticker is placed on the white backdrop. Default: [`OverlayPolicy::Preserve`].
    pub overlay_policy: OverlayPolicy,

    /// Downscale factor of the small photo. Default: 3/7.
    pub scale: Scale,

    /// Long-poll timeout for update retrieval, in seconds. Default: 120.
    pub poll_timeout_secs: u64,

    /// Consecutive failed polls tolerated before giving up. Default: 3.
    pub max_consecutive_failures: u32,

    /// Fixed delay between failed polls, in seconds. Default: 10.
    pub retry_delay_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_decoded_bytes: DEFAULT_MAX_DECODED_BYTES,
            download_timeout_secs: 60,
            max_concurrent_jobs: default_concurrency(),
            overlay_policy: OverlayPolicy::default(),
            scale: Scale::default(),
            poll_timeout_secs: 120,
            max_consecutive_failures: 3,
            retry_delay_secs: 10,
        }
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl RelayConfig {
    /// Create a new builder for `RelayConfig`.
    pub fn builder() -> RelayConfigBuilder {
        RelayConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

/// Builder for [`RelayConfig`].
#[derive(Debug)]
pub struct RelayConfigBuilder {
    config: RelayConfig,
}

impl RelayConfigBuilder {
    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.config.max_file_size = bytes;
        self
    }

    pub fn max_decoded_bytes(mut self, bytes: u64) -> Self {
        self.config.max_decoded_bytes = bytes;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn max_concurrent_jobs(mut self, n: usize) -> Self {
        self.config.max_concurrent_jobs = n;
        self
    }

    pub fn overlay_policy(mut self, policy: OverlayPolicy) -> Self {
        self.config.overlay_policy = policy;
        self
    }

    pub fn scale(mut self, scale: Scale) -> Self {
        self.config.scale = scale;
        self
    }

    pub fn poll_timeout_secs(mut self, secs: u64) -> Self {
        self.config.poll_timeout_secs = secs;
        self
    }

    pub fn max_consecutive_failures(mut self, n: u32) -> Self {
        self.config.max_consecutive_failures = n;
        self
    }

    pub fn retry_delay_secs(mut self, secs: u64) -> Self {
        self.config.retry_delay_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<RelayConfig, RelayError> {
        let c = &self.config;
        if c.max_file_size == 0 {
            return Err(RelayError::InvalidConfig(
                "Maximum file size must be ≥ 1 byte".into(),
            ));
        }
        if c.max_decoded_bytes == 0 {
            return Err(RelayError::InvalidConfig(
                "Decoded size limit must be ≥ 1 byte".into(),
            ));
        }
        if c.download_timeout_secs == 0 {
            return Err(RelayError::InvalidConfig(
                "Download timeout must be ≥ 1 second".into(),
            ));
        }
        if c.max_concurrent_jobs == 0 {
            return Err(RelayError::InvalidConfig(
                "Concurrent jobs must be ≥ 1".into(),
            ));
        }
        if c.max_concurrent_jobs > MAX_LIMIT {
            return Err(RelayError::InvalidConfig(format!(
                "Concurrent jobs must be ≤ {MAX_LIMIT}, got {}",
                c.max_concurrent_jobs
            )));
        }
        if c.scale.numerator == 0 || c.scale.numerator >= c.scale.denominator {
            return Err(RelayError::InvalidConfig(format!(
                "Scale must shrink the image, got {}/{}",
                c.scale.numerator, c.scale.denominator
            )));
        }
        if c.max_consecutive_failures == 0 {
            return Err(RelayError::InvalidConfig(
                "Consecutive failure budget must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Placement of the decoded sticker on the backdrop.
///
/// The backdrop always has the sticker's *declared* size. The decoded image
/// may not: a sticker can declare 512×512 while its WebP payload is 512×480.
///
/// | Policy | Decoded smaller | Decoded larger |
/// |--------|-----------------|----------------|
/// | `Preserve` | white margin right/bottom | clipped right/bottom |
/// | `ResizeToFit` | stretched to fill | shrunk to fit |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlayPolicy {
    /// Draw the decoded image unscaled at the top-left corner. (default)
    #[default]
    Preserve,
    /// Resize the decoded image to the declared bounds first (bilinear).
    ResizeToFit,
}

/// A rational downscale factor applied to both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scale {
    pub numerator: u32,
    pub denominator: u32,
}

impl Default for Scale {
    fn default() -> Self {
        Self {
            numerator: 3,
            denominator: 7,
        }
    }
}

impl Scale {
    /// Scaled size of one side, rounded down.
    pub fn apply(&self, side: u32) -> u32 {
        (u64::from(side) * u64::from(self.numerator) / u64::from(self.denominator)) as u32
    }
}
