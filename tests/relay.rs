//! End-to-end tests for the conversion orchestrator.
//!
//! A local wiremock server plays the file host; a recording `ChatClient`
//! stands in for Telegram and captures everything the relay sends.

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sticker2img::{
    ArtifactRole, ChatClient, ClientError, FailureKind, Governor, OutboundBatch, OutputArtifact,
    Relay, RelayConfig, ReplyTo, RunState, Stage, StickerMessage,
};
use tracing_subscriber::EnvFilter;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Test helpers ─────────────────────────────────────────────────────────────

const PANIC_FILE_ID: &str = "explode";

#[derive(Default)]
struct RecordingClient {
    base_url: String,
    fail_media_group: bool,
    documents: Mutex<Vec<(ReplyTo, OutputArtifact)>>,
    groups: Mutex<Vec<OutboundBatch>>,
    texts: Mutex<Vec<(ReplyTo, String)>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl RecordingClient {
    fn new(server: &MockServer) -> Self {
        Self {
            base_url: server.uri(),
            ..Self::default()
        }
    }

    fn finish(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn documents(&self) -> Vec<(ReplyTo, OutputArtifact)> {
        self.documents.lock().unwrap().clone()
    }

    fn groups(&self) -> Vec<OutboundBatch> {
        self.groups.lock().unwrap().clone()
    }

    fn texts(&self) -> Vec<(ReplyTo, String)> {
        self.texts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatClient for RecordingClient {
    async fn file_url(&self, file_id: &str) -> Result<String, ClientError> {
        if file_id == PANIC_FILE_ID {
            panic!("forced fault for {file_id}");
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        Ok(format!("{}/files/{}", self.base_url, file_id))
    }

    async fn send_document(&self, reply: ReplyTo, artifact: &OutputArtifact) -> Result<(), ClientError> {
        self.documents.lock().unwrap().push((reply, artifact.clone()));
        Ok(())
    }

    async fn send_media_group(&self, batch: &OutboundBatch) -> Result<(), ClientError> {
        self.finish();
        if self.fail_media_group {
            return Err(ClientError::Api {
                code: 400,
                description: "Bad Request: group send refused".into(),
            });
        }
        self.groups.lock().unwrap().push(batch.clone());
        Ok(())
    }

    async fn send_text(&self, reply: ReplyTo, text: &str) -> Result<(), ClientError> {
        self.finish();
        self.texts.lock().unwrap().push((reply, text.to_string()));
        Ok(())
    }
}

fn sticker(file_id: &str, width: i32, height: i32) -> StickerMessage {
    StickerMessage {
        chat_id: 1001,
        message_id: 77,
        sender: "tester".into(),
        file_id: file_id.into(),
        emoji: "🟥".into(),
        width,
        height,
    }
}

fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), format).expect("fixture encode");
    buf
}

fn red_webp(width: u32, height: u32) -> Vec<u8> {
    encode(
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([255, 0, 0, 255]))),
        ImageFormat::WebP,
    )
}

async fn serve(server: &MockServer, file_id: &str, body: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(format!("/files/{file_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(server)
        .await;
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_test_writer()
        .try_init();
}

fn relay(client: &Arc<RecordingClient>, config: RelayConfig) -> Relay {
    init_tracing();
    Relay::new(Arc::clone(client) as Arc<dyn ChatClient>, config).expect("relay")
}

fn assert_reddish(p: &Rgb<u8>) {
    assert!(p[0] > 240 && p[1] < 16 && p[2] < 16, "not red: {p:?}");
}

// ── Scenario A: opaque red square ────────────────────────────────────────────

#[tokio::test]
async fn red_square_produces_png_and_two_photos() {
    let server = MockServer::start().await;
    serve(&server, "red", red_webp(100, 100)).await;
    let client = Arc::new(RecordingClient::new(&server));

    let report = relay(&client, RelayConfig::default())
        .process(sticker("red", 100, 100))
        .await;

    assert_eq!(report.state, RunState::Done);
    assert!(!report.notified);
    let reply = ReplyTo { chat_id: 1001, message_id: 77 };
    assert_eq!(report.reply, reply);

    // Archival PNG: exact red, opaque.
    let documents = client.documents();
    assert_eq!(documents.len(), 1);
    let (doc_reply, png) = &documents[0];
    assert_eq!(*doc_reply, reply);
    assert_eq!(png.role, ArtifactRole::Archival);
    assert!(png.filename.starts_with("🟥_") && png.filename.ends_with(".png"), "{}", png.filename);
    let decoded = image::load_from_memory_with_format(&png.bytes, ImageFormat::Png)
        .unwrap()
        .into_rgba8();
    assert_eq!(decoded.dimensions(), (100, 100));
    assert!(decoded.pixels().all(|p| *p == Rgba([255, 0, 0, 255])));

    // Photos: one album, full then small, captioned with filenames.
    let groups = client.groups();
    assert_eq!(groups.len(), 1);
    let batch = &groups[0];
    assert_eq!(batch.reply, reply);
    assert_eq!(batch.items.len(), 2);

    let stem = png.filename.trim_end_matches(".png");
    assert_eq!(batch.items[0].filename, format!("{stem}.jpg"));
    assert_eq!(batch.items[1].filename, format!("{stem}_small.jpg"));
    for item in &batch.items {
        assert_eq!(item.caption(), item.filename);
    }

    let full = image::load_from_memory(&batch.items[0].bytes).unwrap().into_rgb8();
    assert_eq!(full.dimensions(), (100, 100));
    assert_reddish(full.get_pixel(50, 50));

    let small = image::load_from_memory(&batch.items[1].bytes).unwrap().into_rgb8();
    assert_eq!(small.dimensions(), (42, 42));
    assert_reddish(small.get_pixel(21, 21));

    assert!(client.texts().is_empty());
    assert_eq!(report.delivered.len(), 3);
    assert_eq!(report.delivered[0], png.filename);
}

#[tokio::test]
async fn transparent_sticker_photos_are_white() {
    let server = MockServer::start().await;
    let clear = RgbaImage::from_pixel(70, 70, Rgba([0, 0, 0, 0]));
    serve(&server, "clear", encode(DynamicImage::ImageRgba8(clear), ImageFormat::WebP)).await;
    let client = Arc::new(RecordingClient::new(&server));

    let report = relay(&client, RelayConfig::default())
        .process(sticker("clear", 70, 70))
        .await;
    assert!(report.state.is_done());

    let groups = client.groups();
    let full = image::load_from_memory(&groups[0].items[0].bytes).unwrap().into_rgb8();
    assert!(full.pixels().all(|p| p.0.iter().all(|&c| c > 250)), "expected white photo");

    // The PNG keeps the transparency the photos dropped.
    let png = image::load_from_memory(&client.documents()[0].1.bytes).unwrap().into_rgba8();
    assert!(png.pixels().all(|p| p[3] == 0));
}

// ── Scenario B: JPEG payload ─────────────────────────────────────────────────

#[tokio::test]
async fn jpeg_payload_is_rejected_with_notice() {
    let server = MockServer::start().await;
    let jpeg = encode(
        DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, Rgb([0, 0, 255]))),
        ImageFormat::Jpeg,
    );
    serve(&server, "jpeg", jpeg).await;
    let client = Arc::new(RecordingClient::new(&server));

    let report = relay(&client, RelayConfig::default())
        .process(sticker("jpeg", 16, 16))
        .await;

    assert_eq!(
        report.state,
        RunState::Failed { stage: Stage::Decoding, kind: FailureKind::UnsupportedFormat }
    );
    assert!(report.notified);

    let texts = client.texts();
    assert_eq!(texts.len(), 1);
    assert!(texts[0].1.contains("image/jpeg"), "notice: {}", texts[0].1);
    assert!(client.documents().is_empty());
    assert!(client.groups().is_empty());
}

// ── Scenario C: size ceiling ─────────────────────────────────────────────────

#[tokio::test]
async fn one_byte_over_ceiling_is_too_large() {
    let server = MockServer::start().await;
    let config = RelayConfig::default();
    let body = vec![0u8; config.max_file_size as usize + 1];
    serve(&server, "huge", body).await;
    let client = Arc::new(RecordingClient::new(&server));

    let report = relay(&client, config).process(sticker("huge", 512, 512)).await;

    // Failed while fetching: the decoder never saw the bytes.
    assert_eq!(
        report.state,
        RunState::Failed { stage: Stage::Fetching, kind: FailureKind::TooLarge }
    );
    let texts = client.texts();
    assert_eq!(texts.len(), 1);
    assert!(texts[0].1.contains("too big"), "notice: {}", texts[0].1);
    assert!(client.documents().is_empty());
    assert!(client.groups().is_empty());
}

#[tokio::test]
async fn exactly_at_ceiling_reaches_decoder() {
    let server = MockServer::start().await;
    let config = RelayConfig::builder().max_file_size(1024).build().unwrap();
    serve(&server, "edge", vec![0u8; 1024]).await;
    let client = Arc::new(RecordingClient::new(&server));

    let report = relay(&client, config).process(sticker("edge", 10, 10)).await;

    assert_eq!(
        report.state,
        RunState::Failed { stage: Stage::Decoding, kind: FailureKind::UnsupportedFormat }
    );
    assert!(client.texts()[0].1.contains("application/octet-stream"));
}

// ── Internal failures stay silent ────────────────────────────────────────────

#[tokio::test]
async fn missing_file_is_transfer_failure_without_notice() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let client = Arc::new(RecordingClient::new(&server));

    let report = relay(&client, RelayConfig::default())
        .process(sticker("gone", 64, 64))
        .await;

    assert_eq!(
        report.state,
        RunState::Failed { stage: Stage::Fetching, kind: FailureKind::TransferFailed }
    );
    assert!(!report.notified);
    assert!(client.texts().is_empty());
}

#[tokio::test]
async fn group_send_failure_keeps_document_and_stays_silent() {
    let server = MockServer::start().await;
    serve(&server, "red", red_webp(64, 64)).await;
    let client = Arc::new(RecordingClient {
        fail_media_group: true,
        ..RecordingClient::new(&server)
    });

    let report = relay(&client, RelayConfig::default())
        .process(sticker("red", 64, 64))
        .await;

    assert_eq!(
        report.state,
        RunState::Failed { stage: Stage::Delivering, kind: FailureKind::DeliveryFailed }
    );
    assert_eq!(client.documents().len(), 1, "document goes out before the album");
    assert_eq!(report.delivered.len(), 1);
    assert!(client.texts().is_empty());
}

#[tokio::test]
async fn non_positive_dimensions_fail_before_download() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let client = Arc::new(RecordingClient::new(&server));

    let report = relay(&client, RelayConfig::default())
        .process(sticker("zero", 0, 512))
        .await;

    assert_eq!(report.state.failure_kind(), Some(FailureKind::InvalidDimensions));
    assert!(client.texts().is_empty());
}

// ── Degenerate scale ─────────────────────────────────────────────────────────

#[tokio::test]
async fn tiny_sticker_skips_small_photo() {
    let server = MockServer::start().await;
    serve(&server, "thin", red_webp(2, 100)).await;
    let client = Arc::new(RecordingClient::new(&server));

    let report = relay(&client, RelayConfig::default())
        .process(sticker("thin", 2, 100))
        .await;

    assert_eq!(report.state, RunState::Done);
    let groups = client.groups();
    assert_eq!(groups[0].items.len(), 1);
    assert_eq!(groups[0].items[0].role, ArtifactRole::FullPhoto);
}

#[tokio::test]
async fn declared_size_wins_over_payload_size() {
    let server = MockServer::start().await;
    serve(&server, "short", red_webp(50, 40)).await;
    let client = Arc::new(RecordingClient::new(&server));

    relay(&client, RelayConfig::default())
        .process(sticker("short", 50, 50))
        .await;

    let full = image::load_from_memory(&client.groups()[0].items[0].bytes)
        .unwrap()
        .into_rgb8();
    assert_eq!(full.dimensions(), (50, 50));
    assert_reddish(full.get_pixel(25, 20));
    assert!(full.get_pixel(25, 47).0.iter().all(|&c| c > 240), "uncovered area stays white");
}

// ── Concurrency ──────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn compositing_panic_is_contained_to_its_run() {
    let server = MockServer::start().await;
    serve(&server, "huge-canvas", red_webp(32, 32)).await;
    serve(&server, "fine", red_webp(32, 32)).await;
    let client = Arc::new(RecordingClient::new(&server));
    let relay = relay(&client, RelayConfig::default());

    // A canvas this large cannot be allocated; the backdrop crop panics.
    let (faulted, sibling) = tokio::join!(
        relay.process(sticker("huge-canvas", i32::MAX, i32::MAX)),
        relay.process(sticker("fine", 32, 32)),
    );

    assert_eq!(
        faulted.state,
        RunState::Failed { stage: Stage::Compositing, kind: FailureKind::Panicked }
    );
    assert!(!faulted.notified);
    assert!(faulted.delivered.is_empty());

    assert_eq!(sibling.state, RunState::Done);
    assert_eq!(sibling.delivered.len(), 3);
    assert_eq!(client.documents().len(), 1);
    assert_eq!(client.groups().len(), 1);
    assert!(client.texts().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn governor_bounds_runs_and_isolates_faults() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(red_webp(32, 32))
                .set_delay(Duration::from_millis(100)),
        )
        .mount(&server)
        .await;
    let client = Arc::new(RecordingClient::new(&server));
    let relay = Arc::new(relay(&client, RelayConfig::default()));
    let governor = Governor::new(2);

    let mut handles = Vec::new();
    for i in 0..7 {
        let file_id = if i == 3 { PANIC_FILE_ID.to_string() } else { format!("s{i}") };
        let relay = Arc::clone(&relay);
        let handle = governor
            .spawn(async move { relay.process(sticker(&file_id, 32, 32)).await })
            .await
            .expect("governor open");
        handles.push(handle);
    }

    let mut done = 0;
    let mut panicked = 0;
    for handle in handles {
        match handle.await.expect("task joined") {
            Some(report) => {
                assert_eq!(report.state, RunState::Done);
                done += 1;
            }
            None => panicked += 1,
        }
    }

    assert_eq!((done, panicked), (6, 1));
    assert!(client.peak.load(Ordering::SeqCst) <= 2, "peak {}", client.peak.load(Ordering::SeqCst));
    assert_eq!(client.groups().len(), 6);
    assert_eq!(governor.available(), 2);
}
