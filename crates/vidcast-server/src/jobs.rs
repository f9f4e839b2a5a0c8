//! Background download and summary jobs.
//!
//! Each job is an independent Tokio task that runs a configured command
//! for one video. Every line the command prints goes out as a
//! `download-log-line` notification while it runs, and the task ends by
//! publishing exactly one outcome:
//!
//! | Job | Success | Failure |
//! |-----|---------|---------|
//! | download | `downloaded` | `download-log-line` with the error |
//! | summarize | `summary` (stdout parsed as JSON) | `download-log-line`, then `summary-error` |
//!
//! Jobs share nothing but the hub; there is no job registry or result
//! store.

use std::fmt;
use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use vidcast_types::Notification;

use crate::state::AppState;

/// Placeholder replaced by the video id in command arguments.
pub const ID_PLACEHOLDER: &str = "{id}";

/// Argument vectors for each job kind. Empty means not configured.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobCommands {
    /// Download command, e.g. `["yt-dlp", "-o", "data/videos/{id}.mp4", "{id}"]`.
    pub download: Vec<String>,
    /// Summary command; must print `{"summary": .., "transcript": ..}`.
    pub summarize: Vec<String>,
}

impl JobCommands {
    fn template(&self, kind: JobKind) -> &[String] {
        match kind {
            JobKind::Download => &self.download,
            JobKind::Summarize => &self.summarize,
        }
    }
}

/// Which job to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    /// Fetch the media file.
    Download,
    /// Produce a transcript summary.
    Summarize,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Download => f.write_str("download"),
            Self::Summarize => f.write_str("summarize"),
        }
    }
}

/// Errors from starting or running a job.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// No command is configured for this job kind.
    #[error("{0} command is not configured")]
    NotConfigured(JobKind),

    /// The video id is not safe to pass to a command.
    #[error("invalid video id: {0:?}")]
    InvalidId(String),

    /// The command could not be started.
    #[error("failed to start {program}: {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// The underlying I/O error.
        source: io::Error,
    },

    /// Reading the command's output failed.
    #[error("job I/O error: {0}")]
    Io(#[from] io::Error),

    /// The command exited unsuccessfully.
    #[error("{kind} failed: {status}")]
    Exit {
        /// Which job failed.
        kind: JobKind,
        /// How the command exited.
        status: ExitStatus,
    },

    /// The summary command printed something other than the expected JSON.
    #[error("malformed summary output: {0}")]
    Output(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct SummaryOutput {
    summary: String,
    transcript: String,
}

/// Check that `id` can be substituted into a command safely.
///
/// Ids must be non-empty, must not start with `-`, and may only contain
/// ASCII letters, digits, `-` and `_`.
pub fn validate_video_id(id: &str) -> Result<(), JobError> {
    let valid = !id.is_empty()
        && !id.starts_with('-')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(JobError::InvalidId(id.to_owned()))
    }
}

/// Start a job for `video_id` on a background task.
///
/// # Errors
///
/// Returns [`JobError::NotConfigured`] if no command is set for `kind`, or
/// [`JobError::InvalidId`] if the id fails [`validate_video_id`]. Failures
/// after the task starts are reported to clients, not to the caller.
pub fn spawn_job(
    state: &Arc<AppState>,
    kind: JobKind,
    video_id: String,
) -> Result<JoinHandle<()>, JobError> {
    validate_video_id(&video_id)?;
    let template = state.jobs.template(kind);
    if template.is_empty() {
        return Err(JobError::NotConfigured(kind));
    }
    let argv: Vec<String> = template
        .iter()
        .map(|arg| arg.replace(ID_PLACEHOLDER, &video_id))
        .collect();

    let state = Arc::clone(state);
    info!(%kind, video_id, "Job started");
    Ok(tokio::spawn(async move {
        match kind {
            JobKind::Download => run_download(&state, &argv, video_id).await,
            JobKind::Summarize => run_summarize(&state, &argv, video_id).await,
        }
    }))
}

async fn run_download(state: &AppState, argv: &[String], video_id: String) {
    let outcome = match run_command(state, JobKind::Download, argv, false).await {
        Ok(_) => {
            info!(video_id, "Download finished");
            Notification::Downloaded { video_id }
        }
        Err(e) => {
            warn!(video_id, error = %e, "Download failed");
            Notification::DownloadLogLine { line: e.to_string() }
        }
    };
    state.publish(&outcome);
}

async fn run_summarize(state: &AppState, argv: &[String], video_id: String) {
    let result = run_command(state, JobKind::Summarize, argv, true)
        .await
        .and_then(|stdout| serde_json::from_str::<SummaryOutput>(&stdout).map_err(JobError::from));

    match result {
        Ok(SummaryOutput {
            summary,
            transcript,
        }) => {
            info!(video_id, "Summary finished");
            state.publish(&Notification::Summary {
                summary,
                transcript,
                video_id,
            });
        }
        Err(e) => {
            warn!(video_id, error = %e, "Summary failed");
            state.publish(&Notification::DownloadLogLine { line: e.to_string() });
            state.publish(&Notification::SummaryError { video_id });
        }
    }
}

/// Run `argv`, forwarding stderr (and stdout unless captured) as log lines.
///
/// Returns captured stdout, or an empty string when not capturing.
async fn run_command(
    state: &AppState,
    kind: JobKind,
    argv: &[String],
    capture_stdout: bool,
) -> Result<String, JobError> {
    let (program, args) = argv.split_first().ok_or(JobError::NotConfigured(kind))?;
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| JobError::Spawn {
            program: program.clone(),
            source,
        })?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let (captured, forwarded) = tokio::join!(
        pump_lines(state, stdout, capture_stdout),
        pump_lines(state, stderr, false),
    );
    let status = child.wait().await?;
    let captured = captured?;
    forwarded?;

    if !status.success() {
        return Err(JobError::Exit { kind, status });
    }
    Ok(captured)
}

async fn pump_lines<R>(state: &AppState, reader: Option<R>, capture: bool) -> io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut captured = String::new();
    let Some(reader) = reader else {
        return Ok(captured);
    };

    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await? {
        if capture {
            captured.push_str(&line);
            captured.push('\n');
        } else {
            state.publish(&Notification::DownloadLogLine { line });
        }
    }
    Ok(captured)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_ids_are_restricted() {
        assert!(validate_video_id("dQw4w9WgXcQ").is_ok());
        assert!(validate_video_id("a_b-c").is_ok());
        assert!(validate_video_id("").is_err());
        assert!(validate_video_id("-rf").is_err());
        assert!(validate_video_id("a b").is_err());
        assert!(validate_video_id("../x").is_err());
    }

    #[tokio::test]
    async fn unconfigured_job_is_rejected() {
        let state = Arc::new(AppState::default());
        assert!(matches!(
            spawn_job(&state, JobKind::Download, "abc".into()),
            Err(JobError::NotConfigured(JobKind::Download))
        ));
    }
}
