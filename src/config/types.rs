use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub tmdb: TmdbConfig,

    #[serde(default)]
    pub matching: MatchPolicy,

    #[serde(default)]
    pub transcode: TranscodeConfig,

    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./reelvault.db")
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TmdbConfig {
    /// TMDB API key. The provider reports itself unavailable when unset.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Requests per second allowed against the TMDB API.
    #[serde(default = "default_tmdb_rate")]
    pub requests_per_second: u32,
}

fn default_tmdb_rate() -> u32 {
    4
}

/// Thresholds governing when a search result is linked without user review.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MatchPolicy {
    /// Minimum confidence for linking the top result automatically.
    #[serde(default = "default_auto_match_threshold")]
    pub auto_match_threshold: f64,

    /// Minimum confidence gap between the top two results. A smaller gap
    /// means the match is ambiguous and candidates are surfaced instead.
    #[serde(default = "default_ambiguity_margin")]
    pub ambiguity_margin: f64,
}

fn default_auto_match_threshold() -> f64 {
    0.7
}

fn default_ambiguity_margin() -> f64 {
    0.1
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            auto_match_threshold: default_auto_match_threshold(),
            ambiguity_margin: default_ambiguity_margin(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranscodeConfig {
    /// Directory holding per-session HLS playlists and segments.
    #[serde(default = "default_segment_dir")]
    pub segment_dir: PathBuf,

    /// HLS segment duration in seconds.
    #[serde(default = "default_segment_secs")]
    pub segment_secs: u32,

    /// Seconds without playlist or segment access before a session is
    /// stopped by the cleanup task.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Fraction of runtime at which playback counts as finished.
    #[serde(default = "default_completion_threshold")]
    pub completion_threshold: f64,
}

fn default_segment_dir() -> PathBuf {
    PathBuf::from("./transcodes")
}

fn default_segment_secs() -> u32 {
    6
}

fn default_idle_timeout() -> u64 {
    300
}

fn default_completion_threshold() -> f64 {
    0.9
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            segment_dir: default_segment_dir(),
            segment_secs: default_segment_secs(),
            idle_timeout_secs: default_idle_timeout(),
            completion_threshold: default_completion_threshold(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,
}

impl ToolsConfig {
    pub fn ffmpeg(&self) -> PathBuf {
        self.ffmpeg_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("ffmpeg"))
    }

    pub fn ffprobe(&self) -> PathBuf {
        self.ffprobe_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("ffprobe"))
    }
}
