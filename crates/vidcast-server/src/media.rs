//! Media endpoints: range-aware video streaming and caption files.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`, `HEAD` | `/videos/{name}` | `<data_dir>/videos/<name>.mp4`, honouring `Range` |
//! | `GET` | `/captions/{name}` | `<data_dir>/videos/<name><captions_suffix>` |
//!
//! Missing files answer 404 with no body. A failure opening the file
//! before headers go out answers 500; a failure after that simply ends
//! the body stream, which aborts the connection.

use std::io::{self, SeekFrom};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path as UrlPath, State};
use axum::http::header::{ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, RANGE};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::TryStreamExt;
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::{debug, error, warn};

use crate::range;
use crate::state::AppState;

/// Subdirectory of the data dir holding videos and their captions.
pub const VIDEOS_DIR: &str = "videos";

const VIDEO_EXTENSION: &str = ".mp4";
const VIDEO_CONTENT_TYPE: &str = "video/mp4";
const CAPTIONS_CONTENT_TYPE: &str = "text/vtt";

/// Where media lives on disk.
#[derive(Debug, Clone)]
pub struct MediaConfig {
    /// Root data directory.
    pub data_dir: PathBuf,
    /// Suffix appended to a video name to find its captions.
    pub captions_suffix: String,
}

impl MediaConfig {
    /// Media rooted at `data_dir` with the default `.en.vtt` captions.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            captions_suffix: String::from(".en.vtt"),
        }
    }

    /// File backing the video `name`, or `None` if the name would escape
    /// the videos directory.
    pub fn video_path(&self, name: &str) -> Option<PathBuf> {
        self.resolve(name, VIDEO_EXTENSION)
    }

    /// Caption file for the video `name`.
    pub fn captions_path(&self, name: &str) -> Option<PathBuf> {
        self.resolve(name, &self.captions_suffix)
    }

    fn resolve(&self, name: &str, suffix: &str) -> Option<PathBuf> {
        let relative = Path::new(name);
        let plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if name.is_empty() || !plain {
            return None;
        }
        let mut path = self.data_dir.join(VIDEOS_DIR).join(relative).into_os_string();
        path.push(suffix);
        Some(PathBuf::from(path))
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self::new("data")
    }
}

/// Serve a video, whole or by byte range.
///
/// # Route
///
/// `GET /videos/{*name}`, `HEAD /videos/{*name}`
pub async fn stream_video(
    State(state): State<Arc<AppState>>,
    method: Method,
    UrlPath(name): UrlPath<String>,
    headers: HeaderMap,
) -> Response {
    let Some(path) = state.media.video_path(&name) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let Some(size) = file_size(&path).await else {
        debug!(path = %path.display(), "Video not found");
        return StatusCode::NOT_FOUND.into_response();
    };

    // A header that is not visible ASCII still counts as "present".
    let range_header = headers
        .get(RANGE)
        .map(|value| value.to_str().unwrap_or_default());
    let plan = range::plan(&method, size, range_header);

    let mut builder = Response::builder()
        .status(plan.status)
        .header(CONTENT_TYPE, VIDEO_CONTENT_TYPE)
        .header(CONTENT_LENGTH, plan.content_length);
    if let Some(content_range) = &plan.content_range {
        builder = builder.header(CONTENT_RANGE, content_range);
    }
    if plan.accept_ranges {
        builder = builder.header(ACCEPT_RANGES, "bytes");
    }

    let body = if plan.send_body {
        match open_span(&path, plan.offset, plan.content_length).await {
            Ok(body) => body,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to open video");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        }
    } else {
        Body::empty()
    };

    builder.body(body).unwrap_or_else(|e| {
        error!(error = %e, "Failed to build video response");
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    })
}

/// Serve the caption file of a video in full.
///
/// # Route
///
/// `GET /captions/{*name}`
pub async fn stream_captions(
    State(state): State<Arc<AppState>>,
    UrlPath(name): UrlPath<String>,
) -> Response {
    let Some(path) = state.media.captions_path(&name) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let Some(size) = file_size(&path).await else {
        debug!(path = %path.display(), "Captions not found");
        return StatusCode::NOT_FOUND.into_response();
    };

    let body = match open_span(&path, 0, size).await {
        Ok(body) => body,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to open captions");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    (
        [
            (CONTENT_TYPE, CAPTIONS_CONTENT_TYPE.to_owned()),
            (CONTENT_LENGTH, size.to_string()),
        ],
        body,
    )
        .into_response()
}

async fn file_size(path: &Path) -> Option<u64> {
    fs::metadata(path)
        .await
        .ok()
        .filter(std::fs::Metadata::is_file)
        .map(|meta| meta.len())
}

/// Open `path` and stream `length` bytes starting at `offset`.
async fn open_span(path: &Path, offset: u64, length: u64) -> io::Result<Body> {
    let mut file = File::open(path).await?;
    if offset > 0 {
        file.seek(SeekFrom::Start(offset)).await?;
    }

    let shown = path.display().to_string();
    let stream = ReaderStream::new(file.take(length)).inspect_err(move |e| {
        warn!(path = %shown, error = %e, "Media stream aborted");
    });
    Ok(Body::from_stream(stream))
}
