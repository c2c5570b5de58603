//! CLI binary for sticker2img.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `RelayConfig`, sets up logging and runs the update loop.

use anyhow::{Context, Result};
use clap::Parser;
use sticker2img::{dispatch, OverlayPolicy, RelayConfig, TelegramClient};
use std::io;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run with the token from the environment
  TELEGRAM_BOT_TOKEN=123456:ABC... sticker2img

  # Limit concurrent conversions and accept stickers up to 2 MiB
  sticker2img --token 123456:ABC... --max-jobs 4 --max-size 2097152

  # Stretch stickers whose payload size differs from the declared size
  sticker2img --resize-overlay

WHAT THE BOT SENDS BACK:
  <emoji>_<suffix>.png        lossless copy with transparency (document)
  <emoji>_<suffix>.jpg        full-size photo on white
  <emoji>_<suffix>_small.jpg  3/7-scale photo on white

ENVIRONMENT VARIABLES:
  TELEGRAM_BOT_TOKEN      Bot API token
  TELEGRAM_API_URL        Bot API server (default: https://api.telegram.org)
  RUST_LOG                Log filter, overrides --verbose/--quiet
"#;

/// Telegram bot that converts WebP stickers to PNG and JPEG.
#[derive(Parser, Debug)]
#[command(
    name = "sticker2img",
    version,
    about = "Telegram bot that converts WebP stickers to PNG and JPEG",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Telegram Bot API token.
    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    token: String,

    /// Bot API server URL.
    #[arg(long, env = "TELEGRAM_API_URL", default_value = sticker2img::telegram::DEFAULT_API_URL)]
    api_url: String,

    /// Maximum concurrent conversions (default: number of CPU cores).
    #[arg(short = 'j', long, env = "STICKER2IMG_MAX_JOBS")]
    max_jobs: Option<usize>,

    /// Maximum sticker size in bytes.
    #[arg(long, env = "STICKER2IMG_MAX_SIZE", default_value_t = sticker2img::config::DEFAULT_MAX_FILE_SIZE)]
    max_size: u64,

    /// Download timeout in seconds.
    #[arg(long, env = "STICKER2IMG_DOWNLOAD_TIMEOUT", default_value_t = 60)]
    download_timeout: u64,

    /// Long-poll timeout in seconds.
    #[arg(long, env = "STICKER2IMG_POLL_TIMEOUT", default_value_t = 120)]
    poll_timeout: u64,

    /// Resize stickers to their declared size before compositing.
    #[arg(long, env = "STICKER2IMG_RESIZE_OVERLAY")]
    resize_overlay: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "STICKER2IMG_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "STICKER2IMG_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;
    info!(
        "Starting sticker2img {} (max {} bytes, {} jobs)",
        env!("CARGO_PKG_VERSION"),
        config.max_file_size,
        config.max_concurrent_jobs
    );

    let client = TelegramClient::with_api_url(&cli.token, &cli.api_url)
        .context("Failed to create Telegram client")?;

    dispatch::run(Arc::new(client), config)
        .await
        .context("Relay stopped")?;

    Ok(())
}

/// Map CLI args to `RelayConfig`.
fn build_config(cli: &Cli) -> Result<RelayConfig> {
    let mut builder = RelayConfig::builder()
        .max_file_size(cli.max_size)
        .download_timeout_secs(cli.download_timeout)
        .poll_timeout_secs(cli.poll_timeout);

    if let Some(jobs) = cli.max_jobs {
        builder = builder.max_concurrent_jobs(jobs);
    }
    if cli.resize_overlay {
        builder = builder.overlay_policy(OverlayPolicy::ResizeToFit);
    }

    builder.build().context("Invalid configuration")
}
