//! Event messages pushed to connected clients.
//!
//! Every message is a JSON object with a `type` discriminator. The server
//! never routes on `type`; clients do. Serializing through this enum keeps
//! the producers honest about field names.

use serde::{Deserialize, Serialize};

use crate::video::Video;

/// A notification delivered to every connected client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum Notification {
    /// Full catalog snapshot, sent once to each new connection.
    All {
        /// Every video in the catalog.
        videos: Vec<Video>,
    },
    /// Videos a channel gained since the last check.
    NewVideos {
        /// Channel name.
        name: String,
        /// The newly seen videos.
        videos: Vec<Video>,
    },
    /// A download job finished successfully.
    Downloaded {
        /// The downloaded video.
        video_id: String,
    },
    /// A summary job finished successfully.
    Summary {
        /// Generated summary text.
        summary: String,
        /// Transcript the summary was derived from.
        transcript: String,
        /// The summarized video.
        video_id: String,
    },
    /// A summary job failed.
    SummaryError {
        /// The video whose summary failed.
        video_id: String,
    },
    /// One line of job output.
    DownloadLogLine {
        /// The output line, without its trailing newline.
        line: String,
    },
}

impl Notification {
    /// The `type` tag this notification serializes with.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::All { .. } => "all",
            Self::NewVideos { .. } => "new-videos",
            Self::Downloaded { .. } => "downloaded",
            Self::Summary { .. } => "summary",
            Self::SummaryError { .. } => "summary-error",
            Self::DownloadLogLine { .. } => "download-log-line",
        }
    }

    /// Serialize to the pre-encoded text handed to the broadcast hub.
    ///
    /// # Errors
    ///
    /// Returns an error only if a carried [`Video`] holds values
    /// `serde_json` cannot encode.
    pub fn to_message(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
