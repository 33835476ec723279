//! FFprobe-based stream analysis.
//!
//! Runs `ffprobe -v quiet -print_format json -show_format -show_streams` and
//! parses the JSON into stream descriptions ready to persist as encodings.

use reelvault_common::{Error, Result, StreamKind};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// One elementary stream reported by ffprobe.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbedStream {
    pub kind: StreamKind,
    pub index: i32,
    pub codec: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub channels: Option<i32>,
    pub language: Option<String>,
    pub is_default: bool,
}

/// Full probe result for one file.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub streams: Vec<ProbedStream>,
    /// Container duration in seconds, when the format reports one.
    pub duration_secs: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    index: i32,
    codec_type: String,
    codec_name: Option<String>,
    width: Option<i32>,
    height: Option<i32>,
    channels: Option<i32>,
    #[serde(default)]
    disposition: FfprobeDisposition,
    #[serde(default)]
    tags: FfprobeTags,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeDisposition {
    #[serde(default)]
    default: u8,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeTags {
    language: Option<String>,
}

/// Prober wrapping the ffprobe binary.
#[derive(Debug, Clone)]
pub struct FileProber {
    ffprobe: PathBuf,
}

impl FileProber {
    pub fn new(ffprobe: PathBuf) -> Self {
        Self { ffprobe }
    }

    /// Probe a media file.
    ///
    /// A missing binary, a non-zero exit, a hung process, and malformed JSON
    /// all surface as analysis errors so batch callers can skip the file.
    pub async fn probe(&self, path: &Path) -> Result<ProbeResult> {
        let output = tokio::time::timeout(
            PROBE_TIMEOUT,
            Command::new(&self.ffprobe)
                .args([
                    "-v",
                    "quiet",
                    "-print_format",
                    "json",
                    "-show_format",
                    "-show_streams",
                ])
                .arg(path)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| Error::analysis(format!("ffprobe timed out on {}", path.display())))?
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::analysis("ffprobe binary not found")
            } else {
                Error::Io(e)
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::analysis(format!(
                "ffprobe failed on {}: {}",
                path.display(),
                stderr.trim()
            )));
        }

        let parsed: FfprobeOutput = serde_json::from_slice(&output.stdout)
            .map_err(|e| Error::analysis(format!("invalid ffprobe output: {e}")))?;

        Ok(convert_output(parsed))
    }
}

fn convert_output(output: FfprobeOutput) -> ProbeResult {
    let duration_secs = output.format.duration.and_then(|s| s.parse::<f64>().ok());

    let streams = output
        .streams
        .into_iter()
        .filter_map(|stream| {
            let kind = match stream.codec_type.as_str() {
                "video" => StreamKind::Video,
                "audio" => StreamKind::Audio,
                "subtitle" => StreamKind::Subtitle,
                // Data and attachment streams are not served.
                _ => return None,
            };
            Some(ProbedStream {
                kind,
                index: stream.index,
                codec: stream.codec_name.unwrap_or_default(),
                width: stream.width,
                height: stream.height,
                channels: stream.channels,
                language: stream.tags.language,
                is_default: stream.disposition.default == 1,
            })
        })
        .collect();

    ProbeResult {
        streams,
        duration_secs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "streams": [
            {
                "index": 0,
                "codec_name": "h264",
                "codec_type": "video",
                "width": 1920,
                "height": 1080,
                "disposition": {"default": 1}
            },
            {
                "index": 1,
                "codec_name": "aac",
                "codec_type": "audio",
                "channels": 6,
                "disposition": {"default": 1},
                "tags": {"language": "eng"}
            },
            {
                "index": 2,
                "codec_name": "subrip",
                "codec_type": "subtitle",
                "tags": {"language": "fre"}
            },
            {
                "index": 3,
                "codec_type": "attachment"
            }
        ],
        "format": {
            "duration": "8880.064000"
        }
    }"#;

    #[test]
    fn test_convert_sample_output() {
        let parsed: FfprobeOutput = serde_json::from_str(SAMPLE).unwrap();
        let result = convert_output(parsed);

        assert_eq!(result.streams.len(), 3);
        assert_eq!(result.duration_secs, Some(8880.064));

        let video = &result.streams[0];
        assert_eq!(video.kind, StreamKind::Video);
        assert_eq!(video.codec, "h264");
        assert_eq!(video.width, Some(1920));
        assert!(video.is_default);

        let audio = &result.streams[1];
        assert_eq!(audio.kind, StreamKind::Audio);
        assert_eq!(audio.channels, Some(6));
        assert_eq!(audio.language.as_deref(), Some("eng"));

        let sub = &result.streams[2];
        assert_eq!(sub.kind, StreamKind::Subtitle);
        assert!(!sub.is_default);
    }

    #[test]
    fn test_missing_duration_is_none() {
        let json = r#"{"streams": [], "format": {}}"#;
        let parsed: FfprobeOutput = serde_json::from_str(json).unwrap();
        assert_eq!(convert_output(parsed).duration_secs, None);
    }

    #[tokio::test]
    async fn test_missing_binary_is_analysis_error() {
        let prober = FileProber::new(PathBuf::from("/nonexistent/ffprobe"));
        let err = prober.probe(Path::new("/tmp/file.mkv")).await.unwrap_err();
        assert!(matches!(err, Error::Analysis(_)));
    }
}
