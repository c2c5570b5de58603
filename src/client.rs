//! The chat collaborator seam.
//!
//! The orchestrator never talks HTTP to the chat service directly; it goes
//! through [`ChatClient`]. [`crate::telegram::TelegramClient`] is the
//! production implementation, tests plug in a recording fake.

use crate::error::ClientError;
use crate::model::{OutboundBatch, OutputArtifact, ReplyTo};
use async_trait::async_trait;

/// Operations the relay needs from a chat service.
///
/// Implementations must be `Send + Sync`: one client is shared by every
/// concurrent conversion.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Resolve a file identifier to a direct, time-limited download URL.
    ///
    /// Called once per conversion; the result must not be cached.
    async fn file_url(&self, file_id: &str) -> Result<String, ClientError>;

    /// Send one artifact as a document, replying to `reply`.
    async fn send_document(&self, reply: ReplyTo, artifact: &OutputArtifact) -> Result<(), ClientError>;

    /// Send a batch of photos as one grouped message, in batch order.
    async fn send_media_group(&self, batch: &OutboundBatch) -> Result<(), ClientError>;

    /// Send a plain-text reply.
    async fn send_text(&self, reply: ReplyTo, text: &str) -> Result<(), ClientError>;
}
