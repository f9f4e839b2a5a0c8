//! Catalog entry for a single video.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A video as known to the catalog and as delivered to clients.
///
/// Only the fields the server reasons about are typed. Anything else the
/// upstream feed provides (thumbnails, durations, descriptions, ...) is
/// carried through untouched in [`Video::extra`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    /// Upstream identifier, also the media file stem on disk.
    pub id: String,
    /// Human-readable title.
    #[serde(default)]
    pub title: String,
    /// Name of the channel (source) this video belongs to.
    #[serde(default)]
    pub channel_name: String,
    /// When the upstream published the video.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    /// When the catalog first saw this video.
    ///
    /// Assigned by the catalog, never trusted from upstream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_at: Option<DateTime<Utc>>,
    /// Remaining upstream fields, passed through verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Video {
    /// Create a video with only an id and a title.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            channel_name: String::new(),
            published_at: None,
            added_at: None,
            extra: Map::new(),
        }
    }

    /// Whether the catalog first saw this video strictly after `cutoff`.
    pub fn added_after(&self, cutoff: DateTime<Utc>) -> bool {
        self.added_at.is_some_and(|at| at > cutoff)
    }

    /// Overwrite this entry with fresher upstream data.
    ///
    /// Typed fields from `incoming` replace ours, except `added_at` which
    /// is kept. Extra fields are merged so locally-attached keys survive.
    pub fn merge_from(&mut self, incoming: Self) {
        self.title = incoming.title;
        self.channel_name = incoming.channel_name;
        if incoming.published_at.is_some() {
            self.published_at = incoming.published_at;
        }
        self.extra.extend(incoming.extra);
    }
}
