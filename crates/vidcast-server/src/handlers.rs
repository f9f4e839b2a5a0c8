//! REST endpoints that change shared state and announce it.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/channels` | Start tracking a channel, announce its videos |
//! | `POST` | `/download-video` | Start a background download |
//! | `POST` | `/summarize-video` | Start a background summary |

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use tracing::{info, warn};
use vidcast_types::Notification;

use crate::error::ApiError;
use crate::jobs::{self, JobError, JobKind};
use crate::state::AppState;

/// Body of `POST /channels`.
#[derive(Debug, serde::Deserialize)]
pub struct ChannelRequest {
    /// Channel name; surrounding whitespace is ignored.
    pub name: String,
}

/// Body of `POST /download-video` and `POST /summarize-video`.
#[derive(Debug, serde::Deserialize)]
pub struct VideoRequest {
    /// Video to act on.
    pub id: String,
}

// ---------------------------------------------------------------------------
// POST /channels
// ---------------------------------------------------------------------------

/// Track a new channel.
///
/// Fetches the channel from the feed, stores its videos and announces them
/// as `new-videos`. Answers 409 if the channel is already tracked, 404 if
/// the feed does not know it and 503 if the feed fails.
pub async fn add_channel(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChannelRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = request.name.trim().to_owned();
    if name.is_empty() {
        return Err(ApiError::BadRequest(String::from("Channel name is empty")));
    }
    if state.library.read().await.has_channel(&name) {
        return Err(ApiError::Conflict(String::from("Channel already added")));
    }

    let fetched = state.feed.fetch(&name).await.map_err(|e| {
        warn!(channel = name, error = %e, "Feed fetch failed while adding channel");
        ApiError::Unavailable(e.to_string())
    })?;
    let Some(videos) = fetched else {
        return Err(ApiError::NotFound(String::from("Channel not found")));
    };

    let stored = {
        let mut library = state.library.write().await;
        if !library.add_channel(name.clone()) {
            return Err(ApiError::Conflict(String::from("Channel already added")));
        }
        library.upsert_videos(videos, Utc::now())
    };

    let count = stored.len();
    let receivers = state.publish(&Notification::NewVideos {
        name: name.clone(),
        videos: stored,
    });
    info!(channel = name, videos = count, receivers, "Channel added");

    Ok((StatusCode::CREATED, "Channel added"))
}

// ---------------------------------------------------------------------------
// POST /download-video, POST /summarize-video
// ---------------------------------------------------------------------------

/// Start downloading a video. Progress and outcome arrive as events.
pub async fn download_video(
    State(state): State<Arc<AppState>>,
    Json(request): Json<VideoRequest>,
) -> Result<impl IntoResponse, ApiError> {
    start_job(&state, JobKind::Download, request.id)?;
    Ok((StatusCode::OK, "Download started"))
}

/// Start summarizing a video. Progress and outcome arrive as events.
pub async fn summarize_video(
    State(state): State<Arc<AppState>>,
    Json(request): Json<VideoRequest>,
) -> Result<impl IntoResponse, ApiError> {
    start_job(&state, JobKind::Summarize, request.id)?;
    Ok((StatusCode::OK, "Summary started"))
}

fn start_job(state: &Arc<AppState>, kind: JobKind, video_id: String) -> Result<(), ApiError> {
    match jobs::spawn_job(state, kind, video_id) {
        // The task reports its own outcome; nobody awaits the handle.
        Ok(_handle) => Ok(()),
        Err(e @ JobError::NotConfigured(_)) => Err(ApiError::Unavailable(e.to_string())),
        Err(e @ JobError::InvalidId(_)) => Err(ApiError::BadRequest(e.to_string())),
        Err(e) => Err(ApiError::Internal(e.to_string())),
    }
}
