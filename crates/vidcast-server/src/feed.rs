//! Upstream feed: where fresh videos for a channel come from.
//!
//! Uses enum dispatch rather than a trait object so the async fetch stays
//! usable from spawned tasks. [`Feed::Http`] talks to an external service;
//! [`Feed::Static`] answers from an in-process table and is what runs when
//! no upstream is configured.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use reqwest::StatusCode;
use vidcast_types::Video;

/// Errors from a single upstream fetch.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// The HTTP request could not be completed or decoded.
    #[error("feed request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The upstream answered with an unexpected status.
    #[error("feed returned status {status} for {channel}")]
    Status {
        /// Channel being fetched.
        channel: String,
        /// Status code received.
        status: u16,
    },

    /// The upstream is unavailable for this channel.
    #[error("feed unavailable for {channel}: {message}")]
    Unavailable {
        /// Channel being fetched.
        channel: String,
        /// What went wrong.
        message: String,
    },
}

/// A source of fresh videos per channel.
#[derive(Debug)]
pub enum Feed {
    /// An external HTTP service.
    Http(HttpFeed),
    /// An in-process table.
    Static(StaticFeed),
}

impl Feed {
    /// A feed that knows no channels.
    pub fn disabled() -> Self {
        Self::Static(StaticFeed::default())
    }

    /// Fetch the latest videos of `channel`.
    ///
    /// `Ok(None)` means the upstream does not know the channel.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError`] if the upstream could not be reached or gave
    /// an unusable answer.
    pub async fn fetch(&self, channel: &str) -> Result<Option<Vec<Video>>, FeedError> {
        match self {
            Self::Http(feed) => feed.fetch(channel).await,
            Self::Static(feed) => feed.fetch(channel),
        }
    }

    /// Human-readable name for logging.
    pub const fn name(&self) -> &str {
        match self {
            Self::Http(_) => "http",
            Self::Static(_) => "static",
        }
    }
}

impl Default for Feed {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Feed backed by `GET <base_url>?channel=<name>` returning a JSON array.
#[derive(Debug)]
pub struct HttpFeed {
    client: reqwest::Client,
    base_url: String,
}

impl HttpFeed {
    /// Create a feed for `base_url` with a per-request `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    async fn fetch(&self, channel: &str) -> Result<Option<Vec<Video>>, FeedError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("channel", channel)])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(FeedError::Status {
                channel: channel.to_owned(),
                status: status.as_u16(),
            });
        }

        let videos: Vec<Video> = response.json().await?;
        Ok(Some(videos))
    }
}

/// What a [`StaticFeed`] answers for one channel.
#[derive(Debug, Clone)]
pub enum StaticEntry {
    /// Return these videos.
    Videos(Vec<Video>),
    /// Fail the fetch with this message.
    Failing(String),
}

/// Feed answering from an in-memory table. Unknown channels yield `None`.
#[derive(Debug, Default)]
pub struct StaticFeed {
    entries: RwLock<BTreeMap<String, StaticEntry>>,
}

impl StaticFeed {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `videos` for `channel` from now on.
    pub fn set_videos(&self, channel: impl Into<String>, videos: Vec<Video>) {
        self.set(channel.into(), StaticEntry::Videos(videos));
    }

    /// Fail every fetch of `channel` from now on.
    pub fn set_failing(&self, channel: impl Into<String>, message: impl Into<String>) {
        self.set(channel.into(), StaticEntry::Failing(message.into()));
    }

    fn set(&self, channel: String, entry: StaticEntry) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(channel, entry);
    }

    fn fetch(&self, channel: &str) -> Result<Option<Vec<Video>>, FeedError> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        match entries.get(channel) {
            None => Ok(None),
            Some(StaticEntry::Videos(videos)) => Ok(Some(videos.clone())),
            Some(StaticEntry::Failing(message)) => Err(FeedError::Unavailable {
                channel: channel.to_owned(),
                message: message.clone(),
            }),
        }
    }
}
