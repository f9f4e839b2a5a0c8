//! vidcast binary.
//!
//! Wires the media/push server, the channel library and the update
//! scheduler together and serves until the process is terminated.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `vidcast.yaml` (or the first argument)
//! 3. Build the feed client and seed the library with known channels
//! 4. Spawn the update scheduler, if enabled
//! 5. Serve HTTP

mod config;
mod error;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vidcast_server::feed::{Feed, HttpFeed};
use vidcast_server::{AppState, Library, UpdateScheduler};

use crate::config::{DEFAULT_CONFIG_PATH, VidcastConfig};
use crate::error::AppError;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration is invalid, the feed client cannot
/// be built, or the server fails to bind.
#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("vidcast starting");

    // 2. Load configuration.
    let config = load_config()?;
    info!(
        host = config.server.host,
        port = config.server.port,
        data_dir = %config.media.data_dir.display(),
        channels = config.library.channels.len(),
        "Configuration loaded"
    );

    // 3. Feed and library.
    let feed = match &config.feed.url {
        Some(url) => {
            info!(url, timeout_secs = config.feed.timeout_secs, "Using HTTP feed");
            Feed::Http(HttpFeed::new(url.clone(), config.feed.timeout())?)
        }
        None => {
            warn!("No feed URL configured, channel fetches are disabled");
            Feed::disabled()
        }
    };

    info!(feed = feed.name(), "Feed ready");

    let mut state = AppState::new(config.media_config())
        .with_library(Library::with_channels(config.library.channels.iter().cloned()))
        .with_feed(feed)
        .with_jobs(config.job_commands());

    if config.media.client_dir.is_dir() {
        info!(client_dir = %config.media.client_dir.display(), "Serving client files");
        state = state.with_client_dir(&config.media.client_dir);
    } else {
        warn!(
            client_dir = %config.media.client_dir.display(),
            "Client directory not found, static files disabled"
        );
    }
    let state = Arc::new(state);

    // 4. Update scheduler.
    let _scheduler = if config.scheduler.enabled {
        Some(UpdateScheduler::new(Arc::clone(&state), config.scheduler.interval()).spawn())
    } else {
        info!("Update scheduler disabled");
        None
    };

    // 5. Serve.
    vidcast_server::start_server(&config.server_config(), state).await?;
    Ok(())
}

/// Load configuration from the first argument or `vidcast.yaml`.
///
/// A missing default file means all defaults (plus environment
/// overrides). An explicitly named file must exist.
fn load_config() -> Result<VidcastConfig, AppError> {
    let explicit = std::env::args_os().nth(1).map(PathBuf::from);
    let path = explicit
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    if explicit.is_some() || path.exists() {
        info!(path = %path.display(), "Reading config file");
        return Ok(VidcastConfig::from_file(&path)?);
    }

    info!("Config file not found, using defaults");
    let mut config = VidcastConfig::default();
    config.apply_overrides(|var| std::env::var(var).ok())?;
    Ok(config)
}
