//! # sticker2img
//!
//! A Telegram relay that turns WebP stickers into files people can keep.
//!
//! ## Why this crate?
//!
//! Stickers are WebP images with transparency. Many tools (and most photo
//! galleries) handle neither well, and saving a sticker from a chat client
//! usually isn't possible at all. Send a sticker to the bot and it replies
//! with a lossless PNG document plus two JPEG photos flattened onto white.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Sticker message
//!  │
//!  ├─ 1. Fetch      resolve file id → URL, download with a 1 MiB ceiling
//!  ├─ 2. Decode     WebP → RGBA (spawn_blocking)
//!  ├─ 3. Composite  blend over an opaque white backdrop
//!  ├─ 4. Encode     PNG (alpha kept) + JPEG q100 full size + JPEG at 3/7
//!  └─ 5. Deliver    PNG as a document, then the photos as one album
//! ```
//!
//! Each sticker is converted by its own task; a [`Governor`] caps how many
//! run at once. A failing or panicking conversion never affects another.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sticker2img::{dispatch, RelayConfig, TelegramClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Arc::new(TelegramClient::new(std::env::var("TELEGRAM_BOT_TOKEN")?)?);
//!     let config = RelayConfig::default();
//!     dispatch::run(client, config).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `sticker2img` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod client;
pub mod config;
pub mod convert;
pub mod dispatch;
pub mod error;
pub mod governor;
pub mod model;
pub mod pipeline;
pub mod telegram;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use client::ChatClient;
pub use config::{OverlayPolicy, RelayConfig, RelayConfigBuilder, Scale};
pub use convert::Relay;
pub use error::{ClientError, FailureKind, RelayError, StickerError};
pub use governor::Governor;
pub use model::{
    ArtifactRole, ConversionReport, OutboundBatch, OutputArtifact, ReplyTo, RunState, Stage,
    StickerMessage,
};
pub use telegram::TelegramClient;
