//! The conversion orchestrator: one sticker in, artifacts out.
//!
//! A run walks `Fetching → Decoding → Compositing → Encoding → Delivering`
//! strictly in order and stops at the first error. Failures never leave
//! the run: [`Relay::process`] always returns a [`ConversionReport`].
//!
//! ## Who hears about a failure?
//!
//! Only input-caused failures (file too big, not a WebP) are reported to the
//! sender. Network, encoder and delivery failures are logged and otherwise
//! silent, so internal details never reach a chat.

use crate::client::ChatClient;
use crate::config::RelayConfig;
use crate::error::{ClientError, RelayError, StickerError};
use crate::model::{
    ArtifactRole, ConversionReport, OutputArtifact, RawAsset, ReplyTo, RunState, Stage,
    StickerMessage,
};
use crate::pipeline::{composite, decode, deliver, encode, fetch::Fetcher};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Everything a conversion run needs, shared read-only by all runs.
pub struct Relay {
    client: Arc<dyn ChatClient>,
    fetcher: Fetcher,
    config: RelayConfig,
}

/// Artifacts produced by the CPU-bound stages.
struct Encoded {
    archival: OutputArtifact,
    photos: Vec<OutputArtifact>,
}

impl Relay {
    pub fn new(client: Arc<dyn ChatClient>, config: RelayConfig) -> Result<Self, RelayError> {
        let fetcher = Fetcher::from_config(&config)?;
        Ok(Self {
            client,
            fetcher,
            config,
        })
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn client(&self) -> &Arc<dyn ChatClient> {
        &self.client
    }

    /// Convert one sticker and deliver the results to its chat.
    ///
    /// Never fails: the outcome, including any failure, is in the report.
    pub async fn process(&self, message: StickerMessage) -> ConversionReport {
        let start = Instant::now();
        let reply = message.reply_to();
        info!("@{} -> {}", message.sender, message.file_id);

        let mut run = Run {
            state: RunState::Running(Stage::Fetching),
            delivered: Vec::new(),
        };

        let mut notified = false;
        if let Err(e) = self.drive(&message, &mut run).await {
            let stage = match run.state {
                RunState::Running(stage) => stage,
                _ => Stage::Fetching,
            };
            run.state = RunState::Failed {
                stage,
                kind: e.kind(),
            };

            match e.user_notice() {
                Some(notice) => {
                    warn!("Sticker failed while {}: {}", stage, e);
                    notified = self.notify(reply, &notice).await;
                }
                None => error!("Sticker failed while {}: {}", stage, e),
            }
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        if run.state.is_done() {
            info!("Sticker converted: {} files in {}ms", run.delivered.len(), duration_ms);
        }

        ConversionReport {
            reply,
            state: run.state,
            delivered: run.delivered,
            notified,
            duration_ms,
        }
    }

    async fn drive(&self, message: &StickerMessage, run: &mut Run) -> Result<(), StickerError> {
        // Reject malformed dimensions before any I/O.
        let (width, height) = message.target_dimensions()?;

        // ── Fetching ─────────────────────────────────────────────────────
        let asset = self.fetch(&message.file_id).await?;

        // ── Decoding ─────────────────────────────────────────────────────
        run.enter(Stage::Decoding);
        let max_alloc = self.config.max_decoded_bytes;
        let decoded =
            blocking(Stage::Decoding, move || decode::decode_sticker(&asset, max_alloc)).await??;
        if (decoded.width(), decoded.height()) != (width, height) {
            debug!(
                "Decoded size {}x{} differs from declared {}x{}",
                decoded.width(),
                decoded.height(),
                width,
                height
            );
        }
        let decoded = Arc::new(decoded);

        // ── Compositing ──────────────────────────────────────────────────
        run.enter(Stage::Compositing);
        let policy = self.config.overlay_policy;
        let source = Arc::clone(&decoded);
        let photo = blocking(Stage::Compositing, move || {
            composite::composite_photo(&source, width, height, policy)
        })
        .await?;

        // ── Encoding ─────────────────────────────────────────────────────
        run.enter(Stage::Encoding);
        let stem = deliver::FileStem::generate(&message.emoji);
        let scale = self.config.scale;
        let encoded = blocking(Stage::Encoding, move || -> Result<Encoded, StickerError> {
            let archival = encode::encode_archival(&decoded, stem.filename(ArtifactRole::Archival))?;
            let mut photos = vec![encode::encode_full_photo(
                &photo,
                stem.filename(ArtifactRole::FullPhoto),
            )?];
            if let Some(small) =
                encode::encode_scaled_photo(&photo, scale, stem.filename(ArtifactRole::ScaledPhoto))?
            {
                photos.push(small);
            }
            Ok(Encoded { archival, photos })
        })
        .await??;

        // ── Delivering ───────────────────────────────────────────────────
        run.enter(Stage::Delivering);
        let reply = message.reply_to();

        // The lossless copy goes out on its own first, before the photos.
        self.client
            .send_document(reply, &encoded.archival)
            .await
            .map_err(delivery_error)?;
        run.delivered.push(encoded.archival.filename.clone());

        if let Some(batch) = deliver::compose_batch(reply, encoded.photos) {
            self.client
                .send_media_group(&batch)
                .await
                .map_err(delivery_error)?;
            run.delivered
                .extend(batch.items.iter().map(|a| a.filename.clone()));
        }

        run.state = RunState::Done;
        Ok(())
    }

    async fn fetch(&self, file_id: &str) -> Result<RawAsset, StickerError> {
        let url = self
            .client
            .file_url(file_id)
            .await
            .map_err(|e| StickerError::TransferFailed {
                reason: format!("resolving file: {e}"),
            })?;
        self.fetcher.fetch(&url).await
    }

    /// Send a failure notice; returns whether it was delivered.
    async fn notify(&self, reply: ReplyTo, text: &str) -> bool {
        match self.client.send_text(reply, text).await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to send failure notice: {}", e);
                false
            }
        }
    }
}

struct Run {
    state: RunState,
    delivered: Vec<String>,
}

impl Run {
    fn enter(&mut self, stage: Stage) {
        debug!("→ {}", stage);
        self.state = RunState::Running(stage);
    }
}

fn delivery_error(e: ClientError) -> StickerError {
    StickerError::DeliveryFailed {
        reason: e.to_string(),
    }
}

/// Run a CPU-bound stage on the blocking pool, turning a panic into
/// [`StickerError::Panicked`].
async fn blocking<T, F>(stage: Stage, f: F) -> Result<T, StickerError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StickerError::Panicked {
            stage,
            detail: if e.is_panic() {
                crate::governor::panic_message(e.into_panic())
            } else {
                e.to_string()
            },
        })
}
