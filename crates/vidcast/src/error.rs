//! Error types for the vidcast binary.
//!
//! [`AppError`] is the top-level error type that wraps every failure mode
//! during startup and serving.

use vidcast_server::ServerError;
use vidcast_server::feed::FeedError;

use crate::config::ConfigError;

/// Top-level error for the vidcast binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },

    /// The feed client could not be built.
    #[error("feed error: {source}")]
    Feed {
        /// The underlying feed error.
        #[from]
        source: FeedError,
    },

    /// The HTTP server failed to bind or serve.
    #[error("server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: ServerError,
    },
}
