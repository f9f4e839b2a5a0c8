//! Typed configuration for the vidcast binary.
//!
//! The configuration lives in `vidcast.yaml` next to the binary (or at the
//! path given as the first command-line argument). Every section is
//! optional; anything left out takes the default shown on its field.
//!
//! A handful of deployment knobs can also be set from the environment,
//! which wins over the file:
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `VIDCAST_HOST` | `server.host` |
//! | `VIDCAST_PORT` | `server.port` |
//! | `VIDCAST_DATA_DIR` | `media.data_dir` |
//! | `VIDCAST_FEED_URL` | `feed.url` |

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use vidcast_server::jobs::JobCommands;
use vidcast_server::{MediaConfig, ServerConfig};

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "vidcast.yaml";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        #[from]
        source: serde_yml::Error,
    },

    /// An environment override held an unusable value.
    #[error("invalid value {value:?} for {var}: {reason}")]
    InvalidEnv {
        /// The variable name.
        var: &'static str,
        /// The rejected value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Top-level vidcast configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct VidcastConfig {
    /// Listener address.
    #[serde(default)]
    pub server: ServerSection,

    /// Where media and client files live.
    #[serde(default)]
    pub media: MediaSection,

    /// Periodic channel refresh.
    #[serde(default)]
    pub scheduler: SchedulerSection,

    /// Channels known at startup.
    #[serde(default)]
    pub library: LibrarySection,

    /// External channel feed.
    #[serde(default)]
    pub feed: FeedSection,

    /// Download and summary commands.
    #[serde(default)]
    pub jobs: JobsSection,
}

impl VidcastConfig {
    /// Load configuration from a YAML file and apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if it is not valid YAML, or
    /// [`ConfigError::InvalidEnv`] if an override cannot be used.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.apply_overrides(|var| std::env::var(var).ok())?;
        Ok(config)
    }

    /// Parse configuration from a YAML string, without environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        // An empty file deserializes to unit, not to an empty mapping.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Apply overrides looked up through `lookup`.
    ///
    /// `lookup` returns the value of a variable if it is set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnv`] if `VIDCAST_PORT` is not a port.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("VIDCAST_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("VIDCAST_PORT") {
            self.server.port = port.trim().parse().map_err(|e| ConfigError::InvalidEnv {
                var: "VIDCAST_PORT",
                value: port.clone(),
                reason: format!("{e}"),
            })?;
        }
        if let Some(dir) = lookup("VIDCAST_DATA_DIR") {
            self.media.data_dir = PathBuf::from(dir);
        }
        if let Some(url) = lookup("VIDCAST_FEED_URL") {
            self.feed.url = Some(url).filter(|u| !u.trim().is_empty());
        }
        Ok(())
    }

    /// Network settings for the server.
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.server.host.clone(),
            port: self.server.port,
        }
    }

    /// Media locations for the range responder.
    pub fn media_config(&self) -> MediaConfig {
        let mut media = MediaConfig::new(&self.media.data_dir);
        media.captions_suffix.clone_from(&self.media.captions_suffix);
        media
    }

    /// Job command templates.
    pub fn job_commands(&self) -> JobCommands {
        JobCommands {
            download: self.jobs.download_command.clone(),
            summarize: self.jobs.summarize_command.clone(),
        }
    }
}

/// Listener address.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerSection {
    /// Host to bind (default `0.0.0.0`).
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind (default `3000`).
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Media and client file locations.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MediaSection {
    /// Root directory; videos live under `<data_dir>/videos`.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Suffix appended to a video id to find its captions.
    #[serde(default = "default_captions_suffix")]
    pub captions_suffix: String,

    /// Static client assets served for unmatched paths.
    #[serde(default = "default_client_dir")]
    pub client_dir: PathBuf,
}

impl Default for MediaSection {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            captions_suffix: default_captions_suffix(),
            client_dir: default_client_dir(),
        }
    }
}

/// Periodic refresh settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SchedulerSection {
    /// Whether the scheduler runs at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seconds between runs.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl SchedulerSection {
    /// Period between runs.
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_interval_secs(),
        }
    }
}

/// Channels seeded at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LibrarySection {
    /// Channel names.
    #[serde(default)]
    pub channels: Vec<String>,
}

/// External feed settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedSection {
    /// Base URL queried as `<url>?channel=<name>`. Unset disables fetching.
    #[serde(default)]
    pub url: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_feed_timeout_secs")]
    pub timeout_secs: u64,
}

impl FeedSection {
    /// Request timeout.
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for FeedSection {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: default_feed_timeout_secs(),
        }
    }
}

/// Job command templates; `{id}` in any argument becomes the video id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct JobsSection {
    /// Argv for downloads.
    #[serde(default)]
    pub download_command: Vec<String>,

    /// Argv for summaries. Must print `{"summary", "transcript"}` JSON.
    #[serde(default)]
    pub summarize_command: Vec<String>,
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_port() -> u16 {
    3000
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_captions_suffix() -> String {
    ".en.vtt".to_owned()
}

fn default_client_dir() -> PathBuf {
    PathBuf::from("client")
}

const fn default_true() -> bool {
    true
}

const fn default_interval_secs() -> u64 {
    600
}

const fn default_feed_timeout_secs() -> u64 {
    30
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = VidcastConfig::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.media.data_dir, PathBuf::from("data"));
        assert_eq!(config.media.captions_suffix, ".en.vtt");
        assert!(config.scheduler.enabled);
        assert_eq!(config.scheduler.interval(), Duration::from_secs(600));
        assert!(config.library.channels.is_empty());
        assert_eq!(config.feed.url, None);
        assert!(config.jobs.download_command.is_empty());
    }

    #[test]
    fn empty_file_is_all_defaults() {
        assert!(matches!(VidcastConfig::parse(""), Ok(c) if c == VidcastConfig::default()));
        assert!(matches!(VidcastConfig::parse("\n  \n"), Ok(c) if c == VidcastConfig::default()));
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
server:
  host: "127.0.0.1"
  port: 8080
media:
  data_dir: /srv/vidcast
  captions_suffix: ".vtt"
scheduler:
  enabled: false
  interval_secs: 60
library:
  channels: [rustconf, fosdem]
feed:
  url: "http://localhost:9000/feed"
  timeout_secs: 5
jobs:
  download_command: ["yt-dlp", "{id}"]
  summarize_command: ["summarize", "--id", "{id}"]
"#;
        let Ok(config) = VidcastConfig::parse(yaml) else {
            panic!("config should parse");
        };
        assert_eq!(config.server_config().port, 8080);
        assert_eq!(config.media.data_dir, PathBuf::from("/srv/vidcast"));
        assert_eq!(config.media_config().captions_suffix, ".vtt");
        assert!(!config.scheduler.enabled);
        assert_eq!(config.library.channels, vec!["rustconf", "fosdem"]);
        assert_eq!(config.feed.url.as_deref(), Some("http://localhost:9000/feed"));
        assert_eq!(config.feed.timeout(), Duration::from_secs(5));
        assert_eq!(config.job_commands().download, vec!["yt-dlp", "{id}"]);
    }

    #[test]
    fn partial_sections_keep_field_defaults() {
        let Ok(config) = VidcastConfig::parse("server:\n  port: 4000\n") else {
            panic!("config should parse");
        };
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 4000);
        assert!(config.scheduler.enabled);
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        assert!(matches!(
            VidcastConfig::parse("server: [unclosed"),
            Err(ConfigError::Yaml { .. })
        ));
    }

    #[test]
    fn environment_overrides_win() {
        let mut config = VidcastConfig::default();
        let result = config.apply_overrides(env(&[
            ("VIDCAST_HOST", "::1"),
            ("VIDCAST_PORT", "9999"),
            ("VIDCAST_DATA_DIR", "/tmp/media"),
            ("VIDCAST_FEED_URL", "http://feed"),
        ]));
        assert!(result.is_ok());
        assert_eq!(config.server.host, "::1");
        assert_eq!(config.server.port, 9999);
        assert_eq!(config.media.data_dir, PathBuf::from("/tmp/media"));
        assert_eq!(config.feed.url.as_deref(), Some("http://feed"));
    }

    #[test]
    fn bad_port_override_is_rejected() {
        let mut config = VidcastConfig::default();
        let result = config.apply_overrides(env(&[("VIDCAST_PORT", "eighty")]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidEnv { var: "VIDCAST_PORT", .. })
        ));
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn no_overrides_leave_config_untouched() {
        let mut config = VidcastConfig::default();
        assert!(config.apply_overrides(env(&[])).is_ok());
        assert_eq!(config, VidcastConfig::default());
    }
}
