//! In-memory video catalog.
//!
//! Tracks the known channels and every video seen for them. It is the
//! source of the snapshot each push connection receives on connect, and
//! it stamps `added_at` on videos the first time they are seen, which is
//! what the update scheduler compares against its watermark.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use vidcast_types::{Notification, Video};

/// Known channels and their videos.
#[derive(Debug, Clone, Default)]
pub struct Library {
    channels: BTreeSet<String>,
    videos: BTreeMap<String, Video>,
}

impl Library {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog tracking `channels` with no videos yet.
    pub fn with_channels<I, S>(channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            channels: channels.into_iter().map(Into::into).collect(),
            videos: BTreeMap::new(),
        }
    }

    /// Names of all tracked channels, in name order.
    pub fn channels(&self) -> Vec<String> {
        self.channels.iter().cloned().collect()
    }

    /// Whether `name` is already tracked.
    pub fn has_channel(&self, name: &str) -> bool {
        self.channels.contains(name)
    }

    /// Start tracking `name`. Returns `false` if it already was.
    pub fn add_channel(&mut self, name: impl Into<String>) -> bool {
        self.channels.insert(name.into())
    }

    /// Number of videos in the catalog.
    pub fn len(&self) -> usize {
        self.videos.len()
    }

    /// Whether the catalog holds no videos.
    pub fn is_empty(&self) -> bool {
        self.videos.is_empty()
    }

    /// Insert or refresh `incoming`, returning the stored versions.
    ///
    /// Unknown videos are stamped with `added_at = seen_at`. Known ones
    /// keep their original stamp; see [`Video::merge_from`].
    pub fn upsert_videos(&mut self, incoming: Vec<Video>, seen_at: DateTime<Utc>) -> Vec<Video> {
        incoming
            .into_iter()
            .map(|video| {
                let stored = match self.videos.remove(&video.id) {
                    Some(mut existing) => {
                        existing.merge_from(video);
                        existing
                    }
                    None => Video {
                        added_at: Some(seen_at),
                        ..video
                    },
                };
                self.videos.insert(stored.id.clone(), stored.clone());
                stored
            })
            .collect()
    }

    /// Every video, newest publication first.
    ///
    /// Videos without a publication date sort last.
    pub fn videos(&self) -> Vec<Video> {
        let mut videos: Vec<Video> = self.videos.values().cloned().collect();
        videos.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        videos
    }

    /// The full-state event sent to a freshly registered connection.
    pub fn snapshot(&self) -> Notification {
        Notification::All {
            videos: self.videos(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn first_sighting_is_stamped_and_kept() {
        let mut lib = Library::new();
        let stored = lib.upsert_videos(vec![Video::new("a", "A")], at(1));
        assert_eq!(stored[0].added_at, Some(at(1)));

        let stored = lib.upsert_videos(vec![Video::new("a", "A2")], at(2));
        assert_eq!(stored[0].added_at, Some(at(1)));
        assert_eq!(stored[0].title, "A2");
        assert_eq!(lib.len(), 1);
    }

    #[test]
    fn upstream_added_at_is_not_trusted() {
        let mut lib = Library::new();
        let mut video = Video::new("a", "A");
        video.added_at = Some(at(9));
        let stored = lib.upsert_videos(vec![video], at(1));
        assert_eq!(stored[0].added_at, Some(at(1)));
    }

    #[test]
    fn snapshot_orders_newest_first() {
        let mut lib = Library::new();
        let mut old = Video::new("old", "Old");
        old.published_at = Some(at(1));
        let mut new = Video::new("new", "New");
        new.published_at = Some(at(5));
        let undated = Video::new("undated", "Undated");
        lib.upsert_videos(vec![old, undated, new], at(6));

        let Notification::All { videos } = lib.snapshot() else {
            panic!("snapshot must be an `all` event");
        };
        let ids: Vec<_> = videos.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, ["new", "old", "undated"]);
    }

    #[test]
    fn channels_are_a_set() {
        let mut lib = Library::with_channels(["b", "a"]);
        assert!(lib.has_channel("a"));
        assert!(!lib.add_channel("a"));
        assert!(lib.add_channel("c"));
        assert_eq!(lib.channels(), ["a", "b", "c"]);
    }
}
