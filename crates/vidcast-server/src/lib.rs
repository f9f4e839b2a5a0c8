//! Media and push server for vidcast.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **Range-aware media** (`/videos/...`, `/captions/...`) streamed
//!   straight from disk with `206 Partial Content` support
//! - **Push connections** for any request accepting `text/event-stream`,
//!   fed by a [`BroadcastHub`] that fans every notification out to all
//!   open connections
//! - **Producer endpoints** that add channels and start background
//!   download/summary jobs, each announcing its result through the hub
//!
//! # Architecture
//!
//! The hub is the only shared mutable state on the push path. It is a
//! mutex-guarded registry of per-connection queues: broadcasts never
//! await while holding it, and a connection whose client has gone is
//! dropped rather than retried. Media requests never touch it.
//!
//! The [`UpdateScheduler`] is the hub's main internal producer. It
//! periodically asks the [`Feed`] for each tracked channel and announces
//! videos the [`Library`] had not seen before.
//!
//! [`BroadcastHub`]: hub::BroadcastHub
//! [`UpdateScheduler`]: scheduler::UpdateScheduler
//! [`Feed`]: feed::Feed
//! [`Library`]: library::Library

pub mod error;
pub mod feed;
pub mod handlers;
pub mod hub;
pub mod jobs;
pub mod library;
pub mod media;
pub mod push;
pub mod range;
pub mod router;
pub mod scheduler;
pub mod server;
pub mod state;

// Re-export primary types for convenience.
pub use feed::{Feed, HttpFeed, StaticFeed};
pub use hub::{BroadcastHub, Subscription};
pub use jobs::JobCommands;
pub use library::Library;
pub use media::MediaConfig;
pub use router::build_router;
pub use scheduler::UpdateScheduler;
pub use server::{ServerConfig, ServerError, start_server};
pub use state::AppState;
