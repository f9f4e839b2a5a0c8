//! Axum router construction for the vidcast server.
//!
//! Assembles media, API and push handling into a single [`Router`] with
//! request tracing and permissive CORS.

use std::sync::Arc;

use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{handlers, media, push};

/// Build the complete Axum router.
///
/// The router includes:
/// - any path with `Accept: text/event-stream` -- push connection
/// - `GET|HEAD /videos/{*name}` -- range-aware video stream
/// - `GET /captions/{*name}` -- caption file
/// - `POST /channels` -- track a channel
/// - `POST /download-video` -- start a download job
/// - `POST /summarize-video` -- start a summary job
/// - anything else -- static client files, if a client dir is configured
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let router = Router::new()
        // Media
        .route(
            "/videos/{*name}",
            get(media::stream_video).head(media::stream_video),
        )
        .route("/captions/{*name}", get(media::stream_captions))
        // API
        .route("/channels", post(handlers::add_channel))
        .route("/download-video", post(handlers::download_video))
        .route("/summarize-video", post(handlers::summarize_video));

    let router = match &state.client_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    };

    router
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            push::accept_push,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
