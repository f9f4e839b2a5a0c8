//! Periodic channel refresh.
//!
//! The [`UpdateScheduler`] runs once immediately and then on a fixed
//! period. Each run walks every tracked channel in turn, one fetch at a
//! time, stores what the feed returns and announces videos the catalog
//! had not seen before as a `new-videos` event.
//!
//! # Watermark
//!
//! A single watermark is shared by all channels. Every run stamps newly
//! seen videos with the run's start time, announces videos stamped after
//! the watermark, and finally moves the watermark to the run's start
//! time. The initial watermark is the scheduler's creation time.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use vidcast_types::{Notification, Video};

use crate::state::AppState;

/// Default period between runs (10 minutes).
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(600);

const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// What one run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Channels checked.
    pub sources: usize,
    /// Channels whose fetch failed.
    pub failed: usize,
    /// Videos announced as new.
    pub announced: usize,
}

/// Drives periodic refreshes of every tracked channel.
pub struct UpdateScheduler {
    state: Arc<AppState>,
    interval: Duration,
    watermark: DateTime<Utc>,
}

impl UpdateScheduler {
    /// Create a scheduler with the watermark set to now.
    pub fn new(state: Arc<AppState>, interval: Duration) -> Self {
        Self {
            state,
            interval: interval.max(MIN_INTERVAL),
            watermark: Utc::now(),
        }
    }

    /// Start from an explicit watermark instead of now.
    #[must_use]
    pub fn with_watermark(mut self, watermark: DateTime<Utc>) -> Self {
        self.watermark = watermark;
        self
    }

    /// The current watermark.
    pub const fn watermark(&self) -> DateTime<Utc> {
        self.watermark
    }

    /// Refresh every tracked channel once.
    ///
    /// Feed failures and empty answers skip the channel for this run
    /// only; they never abort the run.
    pub async fn run_once(&mut self) -> RunReport {
        let started = Utc::now();
        let cutoff = self.watermark;
        let channels = self.state.library.read().await.channels();
        info!(channels = channels.len(), "Checking channels for new videos");

        let mut report = RunReport {
            sources: channels.len(),
            ..RunReport::default()
        };

        for channel in channels {
            match self.state.feed.fetch(&channel).await {
                Ok(Some(videos)) => {
                    let stored = self
                        .state
                        .library
                        .write()
                        .await
                        .upsert_videos(videos, started);
                    let fresh: Vec<Video> = stored
                        .into_iter()
                        .filter(|video| video.added_after(cutoff))
                        .collect();
                    if fresh.is_empty() {
                        debug!(channel, "No new videos");
                        continue;
                    }
                    info!(channel, count = fresh.len(), "New videos for channel");
                    report.announced = report.announced.saturating_add(fresh.len());
                    self.state.publish(&Notification::NewVideos {
                        name: channel,
                        videos: fresh,
                    });
                }
                Ok(None) => debug!(channel, "Feed returned nothing, skipping"),
                Err(e) => {
                    report.failed = report.failed.saturating_add(1);
                    warn!(channel, error = %e, "Feed fetch failed, skipping channel");
                }
            }
        }

        self.watermark = started;
        report
    }

    /// Run now and then every interval, on a background task.
    pub fn spawn(mut self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_secs = self.interval.as_secs(), "Update scheduler started");
            loop {
                ticker.tick().await;
                let report = self.run_once().await;
                info!(
                    sources = report.sources,
                    failed = report.failed,
                    announced = report.announced,
                    "Update run finished"
                );
            }
        })
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::unreachable,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]
mod tests {
    use chrono::TimeDelta;

    use super::*;
    use crate::feed::{Feed, StaticFeed};
    use crate::hub::{Subscription, frame};
    use crate::library::Library;

    fn state_with(feed: StaticFeed, channels: &[&str]) -> Arc<AppState> {
        Arc::new(
            AppState::default()
                .with_library(Library::with_channels(channels.iter().copied()))
                .with_feed(Feed::Static(feed)),
        )
    }

    fn static_feed(state: &AppState) -> &StaticFeed {
        match state.feed.as_ref() {
            Feed::Static(table) => table,
            Feed::Http(_) => unreachable!("tests use a static feed"),
        }
    }

    /// Frames queued for `sub` so far, drained up to a marker broadcast.
    async fn frames_until_marker(sub: &mut Subscription, state: &AppState) -> Vec<String> {
        state.broadcast("marker");
        let mut out = Vec::new();
        loop {
            let bytes = sub.recv().await.unwrap();
            if bytes == frame("marker") {
                return out;
            }
            out.push(String::from_utf8(bytes.to_vec()).unwrap());
        }
    }

    fn past() -> DateTime<Utc> {
        Utc::now() - TimeDelta::minutes(5)
    }

    #[tokio::test]
    async fn first_run_announces_everything_new() {
        let feed = StaticFeed::new();
        feed.set_videos("rust", vec![Video::new("a", "A"), Video::new("b", "B")]);
        let state = state_with(feed, &["rust"]);
        let mut sub = state.hub.register();

        let mut scheduler = UpdateScheduler::new(Arc::clone(&state), DEFAULT_INTERVAL)
            .with_watermark(past());
        let report = scheduler.run_once().await;

        assert_eq!(report, RunReport { sources: 1, failed: 0, announced: 2 });
        let frames = frames_until_marker(&mut sub, &state).await;
        assert_eq!(frames.len(), 1);
        assert!(frames[0].contains(r#""type":"new-videos""#));
        assert!(frames[0].contains(r#""name":"rust""#));
    }

    #[tokio::test]
    async fn known_videos_are_not_announced_twice() {
        let feed = StaticFeed::new();
        feed.set_videos("rust", vec![Video::new("a", "A")]);
        let state = state_with(feed, &["rust"]);
        let mut scheduler = UpdateScheduler::new(Arc::clone(&state), DEFAULT_INTERVAL)
            .with_watermark(past());
        scheduler.run_once().await;

        let mut sub = state.hub.register();
        let report = scheduler.run_once().await;
        assert_eq!(report.announced, 0);
        assert!(frames_until_marker(&mut sub, &state).await.is_empty());

        static_feed(&state).set_videos("rust", vec![Video::new("a", "A"), Video::new("c", "C")]);
        let report = scheduler.run_once().await;
        assert_eq!(report.announced, 1);
        let frames = frames_until_marker(&mut sub, &state).await;
        assert_eq!(frames.len(), 1);
        assert!(frames[0].contains(r#""id":"c""#));
        assert!(!frames[0].contains(r#""id":"a""#));
    }

    #[tokio::test]
    async fn failing_source_does_not_stop_the_others() {
        let feed = StaticFeed::new();
        feed.set_failing("broken", "connection refused");
        feed.set_videos("fine", vec![Video::new("x", "X")]);
        let state = state_with(feed, &["broken", "fine", "missing"]);
        let mut sub = state.hub.register();

        let mut scheduler = UpdateScheduler::new(Arc::clone(&state), DEFAULT_INTERVAL)
            .with_watermark(past());
        let report = scheduler.run_once().await;

        assert_eq!(report, RunReport { sources: 3, failed: 1, announced: 1 });
        let frames = frames_until_marker(&mut sub, &state).await;
        assert_eq!(frames.len(), 1);
        assert!(frames[0].contains(r#""name":"fine""#));
    }

    #[tokio::test]
    async fn watermark_advances_to_run_start() {
        let state = state_with(StaticFeed::new(), &[]);
        let before = Utc::now();
        let mut scheduler =
            UpdateScheduler::new(Arc::clone(&state), DEFAULT_INTERVAL).with_watermark(past());
        scheduler.run_once().await;
        assert!(scheduler.watermark() >= before);
        assert!(scheduler.watermark() <= Utc::now());
    }

    #[tokio::test]
    async fn spawned_scheduler_runs_immediately() {
        let feed = StaticFeed::new();
        feed.set_videos("rust", vec![Video::new("a", "A")]);
        let state = state_with(feed, &["rust"]);
        let mut sub = state.hub.register();

        let handle = UpdateScheduler::new(Arc::clone(&state), DEFAULT_INTERVAL)
            .with_watermark(past())
            .spawn();

        let first = sub.recv().await.unwrap();
        assert!(String::from_utf8(first.to_vec()).unwrap().contains("new-videos"));
        handle.abort();
    }
}
