//! Shared application state for the vidcast server.
//!
//! [`AppState`] bundles the broadcast hub, the catalog, the upstream feed
//! and the on-disk media layout. Handlers receive it through Axum's
//! `State` extractor; the update scheduler and background jobs hold their
//! own `Arc` to it.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, warn};
use vidcast_types::Notification;

use crate::feed::Feed;
use crate::hub::{BroadcastHub, Subscription};
use crate::jobs::JobCommands;
use crate::library::Library;
use crate::media::MediaConfig;

/// Shared state for the Axum application.
#[derive(Clone)]
pub struct AppState {
    /// Registry of live push connections.
    pub hub: BroadcastHub,
    /// The video catalog.
    pub library: Arc<RwLock<Library>>,
    /// Where fresh videos come from.
    pub feed: Arc<Feed>,
    /// On-disk media layout.
    pub media: MediaConfig,
    /// Commands run by background jobs.
    pub jobs: JobCommands,
    /// Static client assets served for unmatched paths.
    pub client_dir: Option<PathBuf>,
}

impl AppState {
    /// State with an empty catalog, no upstream feed and no jobs.
    pub fn new(media: MediaConfig) -> Self {
        Self {
            hub: BroadcastHub::default(),
            library: Arc::new(RwLock::new(Library::new())),
            feed: Arc::new(Feed::disabled()),
            media,
            jobs: JobCommands::default(),
            client_dir: None,
        }
    }

    /// Replace the catalog.
    #[must_use]
    pub fn with_library(mut self, library: Library) -> Self {
        self.library = Arc::new(RwLock::new(library));
        self
    }

    /// Replace the upstream feed.
    #[must_use]
    pub fn with_feed(mut self, feed: Feed) -> Self {
        self.feed = Arc::new(feed);
        self
    }

    /// Configure background job commands.
    #[must_use]
    pub fn with_jobs(mut self, jobs: JobCommands) -> Self {
        self.jobs = jobs;
        self
    }

    /// Serve static client files from `dir`.
    #[must_use]
    pub fn with_client_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.client_dir = Some(dir.into());
        self
    }

    /// Publish a pre-encoded message to all connected clients.
    ///
    /// Returns the number of connections it was queued for. Zero is not
    /// an error; it just means nobody is listening.
    pub fn broadcast(&self, message: &str) -> usize {
        self.hub.broadcast(message)
    }

    /// Encode and publish a notification.
    pub fn publish(&self, notification: &Notification) -> usize {
        match notification.to_message() {
            Ok(message) => {
                let receivers = self.hub.broadcast(&message);
                debug!(kind = notification.kind(), receivers, "Notification published");
                receivers
            }
            Err(e) => {
                warn!(kind = notification.kind(), "Failed to encode notification: {e}");
                0
            }
        }
    }

    /// Register a push connection whose first frame is the catalog snapshot.
    ///
    /// The catalog read lock is held until the connection is registered.
    /// Writers publish only after releasing the write lock, so every change
    /// reaches the new connection either in the snapshot or as a later event.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be serialized.
    pub async fn subscribe_with_snapshot(&self) -> Result<Subscription, serde_json::Error> {
        let library = self.library.read().await;
        let snapshot = library.snapshot().to_message()?;
        let subscription = self.hub.register_with(&snapshot);
        drop(library);
        Ok(subscription)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(MediaConfig::default())
    }
}
