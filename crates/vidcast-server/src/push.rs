//! Event-stream push connections.
//!
//! Any request whose `Accept` header asks for `text/event-stream` is
//! turned into a push connection, whatever its path. The connection is
//! registered with the [`BroadcastHub`](crate::hub::BroadcastHub) with the
//! catalog snapshot queued as its first event, then kept open until the
//! client goes away. There is no replay of earlier broadcasts.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::{ACCEPT, CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{error, info};

use crate::error::ApiError;
use crate::state::AppState;

/// Content type of the push channel.
pub const EVENT_STREAM: &str = "text/event-stream";

/// Whether the request asks for an event stream.
pub fn wants_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get_all(ACCEPT)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| value.contains(EVENT_STREAM))
}

/// Middleware diverting event-stream requests to [`open_push`].
pub async fn accept_push(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if wants_event_stream(request.headers()) {
        return open_push(&state).await;
    }
    next.run(request).await
}

/// Register a push connection and answer with its stream.
///
/// Headers make the response a long-lived, unbuffered stream; the first
/// event on it is the full catalog snapshot.
pub async fn open_push(state: &AppState) -> Response {
    let subscription = match state.subscribe_with_snapshot().await {
        Ok(subscription) => subscription,
        Err(e) => return ApiError::from(e).into_response(),
    };
    info!(id = %subscription.id(), live = state.hub.len(), "Push connection opened");

    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, EVENT_STREAM)
        .header(CACHE_CONTROL, "no-cache")
        .header(CONNECTION, "keep-alive")
        .header("x-accel-buffering", "no")
        .body(Body::from_stream(subscription.into_stream()))
        .unwrap_or_else(|e| {
            error!(error = %e, "Failed to build push response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        })
}
