//! ffmpeg HLS transcode jobs.

use reelvault_common::{Error, Result, SessionToken};
use std::path::{Path, PathBuf};
use tokio::process::{Child, Command};
use tracing::info;

use crate::config::TranscodeConfig;

const PLAYLIST_NAME: &str = "playlist.m3u8";

/// Spawns per-session ffmpeg jobs that write HLS output to disk.
#[derive(Debug, Clone)]
pub struct Transcoder {
    ffmpeg: PathBuf,
    segment_dir: PathBuf,
    segment_secs: u32,
}

impl Transcoder {
    pub fn new(config: &TranscodeConfig, ffmpeg: PathBuf) -> Self {
        Self {
            ffmpeg,
            segment_dir: config.segment_dir.clone(),
            segment_secs: config.segment_secs,
        }
    }

    /// Directory holding one session's playlist and segments.
    pub fn session_dir(&self, token: SessionToken) -> PathBuf {
        self.segment_dir.join(token.to_string())
    }

    pub fn playlist_path(&self, token: SessionToken) -> PathBuf {
        self.session_dir(token).join(PLAYLIST_NAME)
    }

    /// Spawn ffmpeg transcoding `input` into the session directory.
    ///
    /// The child is killed when dropped, so an abandoned session cannot leak
    /// a transcode process.
    pub fn spawn(&self, token: SessionToken, input: &Path) -> Result<Child> {
        let dir = self.session_dir(token);
        std::fs::create_dir_all(&dir)?;

        let child = Command::new(&self.ffmpeg)
            .arg("-i")
            .arg(input)
            .args(["-c:v", "libx264", "-preset", "veryfast"])
            .args(["-c:a", "aac", "-ac", "2"])
            .args(["-f", "hls"])
            .args(["-hls_time", &self.segment_secs.to_string()])
            .args(["-hls_playlist_type", "event"])
            .arg("-hls_segment_filename")
            .arg(dir.join("segment_%05d.ts"))
            .arg(dir.join(PLAYLIST_NAME))
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::transcode("ffmpeg binary not found")
                } else {
                    Error::Io(e)
                }
            })?;

        info!(
            token = %token,
            input = %input.display(),
            dir = %dir.display(),
            "Started transcode"
        );
        Ok(child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_dir_is_per_token() {
        let transcoder = Transcoder::new(&TranscodeConfig::default(), PathBuf::from("ffmpeg"));
        let a = SessionToken::new();
        let b = SessionToken::new();
        assert_ne!(transcoder.session_dir(a), transcoder.session_dir(b));
        assert!(transcoder.playlist_path(a).ends_with("playlist.m3u8"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_transcode_error() {
        let tmp = tempfile::tempdir().unwrap();
        let config = TranscodeConfig {
            segment_dir: tmp.path().join("out"),
            ..TranscodeConfig::default()
        };
        let transcoder = Transcoder::new(&config, tmp.path().join("missing-ffmpeg"));

        let err = transcoder
            .spawn(SessionToken::new(), Path::new("/tmp/in.mkv"))
            .unwrap_err();
        assert!(matches!(err, Error::Transcode(_)));
    }
}
