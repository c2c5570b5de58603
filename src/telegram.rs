//! A minimal Telegram Bot API client.
//!
//! Covers exactly what the relay needs: long-polling for updates, resolving
//! file identifiers, and sending documents, photos and text replies. All
//! calls go through one [`reqwest::Client`]; timeouts are set per request
//! because long polls must outlive ordinary calls.
//!
//! The bot token is part of every URL, so URLs are stripped from transport
//! errors and never logged.

use crate::client::ChatClient;
use crate::error::ClientError;
use crate::model::{OutboundBatch, OutputArtifact, ReplyTo, StickerMessage};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::RequestBuilder;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Public Bot API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Timeout for every call except long polls.
const CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Extra time granted to a long poll beyond its server-side timeout.
const POLL_GRACE: Duration = Duration::from_secs(10);

pub struct TelegramClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
}

impl fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramClient")
            .field("api_url", &self.api_url)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl TelegramClient {
    pub fn new(token: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_api_url(token, DEFAULT_API_URL)
    }

    /// Point the client at another Bot API server (self-hosted, or a test double).
    pub fn with_api_url(token: impl Into<String>, api_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    /// Check the token; returns the bot's own account.
    pub async fn get_me(&self) -> Result<User, ClientError> {
        self.call(self.request("getMe")).await
    }

    /// Long-poll for updates with `update_id >= offset`.
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>, ClientError> {
        let req = self
            .request("getUpdates")
            .timeout(Duration::from_secs(timeout_secs) + POLL_GRACE)
            .json(&json!({
                "offset": offset,
                "timeout": timeout_secs,
                "allowed_updates": ["message"],
            }));
        self.call(req).await
    }

    fn request(&self, method: &str) -> RequestBuilder {
        let url = format!("{}/bot{}/{}", self.api_url, self.token, method);
        self.http.post(url).timeout(CALL_TIMEOUT)
    }

    async fn call<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ClientError> {
        let response = req.send().await.map_err(|e| e.without_url())?;
        let envelope: ApiResponse<T> = response.json().await.map_err(|e| e.without_url())?;
        envelope.into_result()
    }

    async fn send_photo(&self, reply: ReplyTo, artifact: &OutputArtifact) -> Result<(), ClientError> {
        let form = reply_form(reply)
            .text("caption", artifact.caption().to_string())
            .part("photo", file_part(artifact));
        let _: IgnoredAny = self.call(self.request("sendPhoto").multipart(form)).await?;
        Ok(())
    }
}

#[async_trait]
impl ChatClient for TelegramClient {
    async fn file_url(&self, file_id: &str) -> Result<String, ClientError> {
        let file: File = self
            .call(self.request("getFile").json(&json!({ "file_id": file_id })))
            .await?;
        let path = file
            .file_path
            .ok_or_else(|| ClientError::InvalidResponse(format!("file {file_id} has no file_path")))?;
        Ok(format!("{}/file/bot{}/{}", self.api_url, self.token, path))
    }

    async fn send_document(&self, reply: ReplyTo, artifact: &OutputArtifact) -> Result<(), ClientError> {
        debug!("sendDocument {} ({} bytes)", artifact.filename, artifact.bytes.len());
        let form = reply_form(reply).part("document", file_part(artifact));
        let _: IgnoredAny = self.call(self.request("sendDocument").multipart(form)).await?;
        Ok(())
    }

    async fn send_media_group(&self, batch: &OutboundBatch) -> Result<(), ClientError> {
        // The Bot API rejects media groups with fewer than two items.
        if let [only] = batch.items.as_slice() {
            return self.send_photo(batch.reply, only).await;
        }

        debug!("sendMediaGroup with {} photos", batch.items.len());
        let media: Vec<_> = batch
            .items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                json!({
                    "type": "photo",
                    "media": format!("attach://file{i}"),
                    "caption": item.caption(),
                })
            })
            .collect();

        let mut form = reply_form(batch.reply).text("media", serde_json::Value::from(media).to_string());
        for (i, item) in batch.items.iter().enumerate() {
            form = form.part(format!("file{i}"), file_part(item));
        }

        let _: IgnoredAny = self.call(self.request("sendMediaGroup").multipart(form)).await?;
        Ok(())
    }

    async fn send_text(&self, reply: ReplyTo, text: &str) -> Result<(), ClientError> {
        let req = self.request("sendMessage").json(&json!({
            "chat_id": reply.chat_id,
            "text": text,
            "reply_parameters": { "message_id": reply.message_id },
        }));
        let _: IgnoredAny = self.call(req).await?;
        Ok(())
    }
}

fn reply_form(reply: ReplyTo) -> Form {
    Form::new()
        .text("chat_id", reply.chat_id.to_string())
        .text(
            "reply_parameters",
            json!({ "message_id": reply.message_id }).to_string(),
        )
}

fn file_part(artifact: &OutputArtifact) -> Part {
    Part::bytes(artifact.bytes.clone()).file_name(artifact.filename.clone())
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i64>,
}

impl<T> ApiResponse<T> {
    fn into_result(self) -> Result<T, ClientError> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            (true, None) => Err(ClientError::InvalidResponse("ok response without result".into())),
            (false, _) => Err(ClientError::Api {
                code: self.error_code.unwrap_or(0),
                description: self.description.unwrap_or_else(|| "unknown error".into()),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct File {
    file_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
    pub sticker: Option<Sticker>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Sticker {
    pub file_id: String,
    pub width: i32,
    pub height: i32,
    pub emoji: Option<String>,
}

impl User {
    /// `username` if set, else the first name.
    pub fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.first_name)
    }
}

impl Message {
    /// The sticker carried by this message, if any.
    pub fn sticker_message(&self) -> Option<StickerMessage> {
        let sticker = self.sticker.as_ref()?;
        Some(StickerMessage {
            chat_id: self.chat.id,
            message_id: self.message_id,
            sender: self
                .from
                .as_ref()
                .map(|u| u.display_name().to_string())
                .unwrap_or_else(|| "unknown".into()),
            file_id: sticker.file_id.clone(),
            emoji: sticker.emoji.clone().unwrap_or_default(),
            width: sticker.width,
            height: sticker.height,
        })
    }

    /// The bot command this message starts with, without `/` or `@botname`.
    pub fn command(&self) -> Option<&str> {
        let text = self.text.as_deref()?.strip_prefix('/')?;
        let word = text.split_whitespace().next()?;
        let name = word.split('@').next().unwrap_or(word);
        (!name.is_empty()).then_some(name)
    }

    pub fn reply_to(&self) -> ReplyTo {
        ReplyTo {
            chat_id: self.chat.id,
            message_id: self.message_id,
        }
    }
}
