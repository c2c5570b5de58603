//! The update loop: poll, classify, spawn.
//!
//! Stickers are handed to the [`Governor`], which blocks the loop while all
//! conversion slots are busy. `/start` and `/help` get a short usage reply;
//! everything else is ignored.
//!
//! ## Retry Strategy
//!
//! A failed poll is retried after a fixed delay (10 s by default). After
//! `max_consecutive_failures` failures in a row (3 by default) the loop
//! gives up and [`run`] returns [`RelayError::PollingExhausted`], letting the
//! process exit with an error. Any successful poll resets the count.

use crate::client::ChatClient;
use crate::config::RelayConfig;
use crate::convert::Relay;
use crate::error::RelayError;
use crate::governor::Governor;
use crate::telegram::{Message, TelegramClient};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, info_span, warn, Instrument};

/// Reply to `/start` and `/help`.
pub const HELP_TEXT: &str = "Send me a sticker and I will reply with a PNG file \
and two JPEG photos (full size and small).";

/// What to do after a failed poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait this long, then poll again.
    Retry(Duration),
    /// The failure budget is spent.
    GiveUp,
}

/// Consecutive-failure counter with a fixed back-off.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_failures: u32,
    delay: Duration,
    failures: u32,
}

impl RetryPolicy {
    pub fn new(max_failures: u32, delay: Duration) -> Self {
        Self {
            max_failures,
            delay,
            failures: 0,
        }
    }

    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(config.max_consecutive_failures, config.retry_delay())
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn record_failure(&mut self) -> RetryDecision {
        self.failures += 1;
        if self.failures >= self.max_failures {
            RetryDecision::GiveUp
        } else {
            RetryDecision::Retry(self.delay)
        }
    }

    pub fn record_success(&mut self) {
        self.failures = 0;
    }
}

/// Poll updates and relay stickers until Ctrl-C or the retry budget runs out.
///
/// In-flight conversions are allowed to finish before this returns.
pub async fn run(client: Arc<TelegramClient>, config: RelayConfig) -> Result<(), RelayError> {
    let me = client.get_me().await.map_err(RelayError::Startup)?;
    info!("Authorized as @{}", me.display_name());

    let relay = Arc::new(Relay::new(Arc::clone(&client) as Arc<dyn ChatClient>, config.clone())?);
    let governor = Governor::new(config.max_concurrent_jobs);
    info!("Relaying stickers with up to {} concurrent jobs", governor.limit());

    let result = tokio::select! {
        r = poll_loop(&client, &relay, &governor, &config) => r,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
            Ok(())
        }
    };

    governor.drain().await;
    info!("All conversions finished");
    result
}

async fn poll_loop(
    client: &TelegramClient,
    relay: &Arc<Relay>,
    governor: &Governor,
    config: &RelayConfig,
) -> Result<(), RelayError> {
    let mut policy = RetryPolicy::from_config(config);
    let mut offset = 0i64;

    loop {
        let updates = match client.get_updates(offset, config.poll_timeout_secs).await {
            Ok(updates) => {
                policy.record_success();
                updates
            }
            Err(e) => match policy.record_failure() {
                RetryDecision::Retry(delay) => {
                    warn!(
                        "Polling failed ({}/{}): {}; retrying in {}s",
                        policy.failures(),
                        config.max_consecutive_failures,
                        e,
                        delay.as_secs()
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                RetryDecision::GiveUp => {
                    return Err(RelayError::PollingExhausted {
                        failures: policy.failures(),
                        last_error: e.to_string(),
                    });
                }
            },
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            if let Some(message) = update.message {
                dispatch_message(client, relay, governor, message).await;
            }
        }
    }
}

async fn dispatch_message(client: &TelegramClient, relay: &Arc<Relay>, governor: &Governor, message: Message) {
    if let Some(sticker) = message.sticker_message() {
        let span = info_span!("sticker", chat_id = sticker.chat_id, message_id = sticker.message_id);
        let relay = Arc::clone(relay);
        // Waits here while every slot is taken.
        let spawned = governor
            .spawn(async move { relay.process(sticker).await }.instrument(span))
            .await;
        if spawned.is_none() {
            warn!("Dropping sticker: relay is shutting down");
        }
        return;
    }

    match message.command() {
        Some("start") | Some("help") => {
            if let Err(e) = client.send_text(message.reply_to(), HELP_TEXT).await {
                warn!("Failed to send help text: {}", e);
            }
        }
        _ => debug!("Ignoring message {} in chat {}", message.message_id, message.chat.id),
    }
}
