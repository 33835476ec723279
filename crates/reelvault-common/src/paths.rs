//! Path utilities for inferring a media link descriptor from a file extension.
//!
//! The scanner routes every discovered file through [`descriptor_for_path`];
//! files whose extension matches none of the known sets are ignored entirely.

use crate::types::Descriptor;
use std::path::Path;

/// List of supported video file extensions.
const VIDEO_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "avi", "m4v", "ts", "webm", "mov", "wmv", "flv",
];

/// List of supported audio file extensions.
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "m4a", "aac", "ogg", "opus", "wav"];

/// List of supported subtitle file extensions.
const SUBTITLE_EXTENSIONS: &[&str] = &["srt", "ass", "ssa", "sub", "vtt", "idx"];

/// List of supported image file extensions.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp"];

fn ext_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// Check if a path has a video file extension.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use reelvault_common::paths::is_video_file;
///
/// assert!(is_video_file(Path::new("movie.mkv")));
/// assert!(!is_video_file(Path::new("subtitle.srt")));
/// ```
pub fn is_video_file(path: &Path) -> bool {
    ext_of(path).is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
}

/// Check if a path has an audio file extension.
pub fn is_audio_file(path: &Path) -> bool {
    ext_of(path).is_some_and(|ext| AUDIO_EXTENSIONS.contains(&ext.as_str()))
}

/// Check if a path has a subtitle file extension.
pub fn is_subtitle_file(path: &Path) -> bool {
    ext_of(path).is_some_and(|ext| SUBTITLE_EXTENSIONS.contains(&ext.as_str()))
}

/// Check if a path has an image file extension.
pub fn is_image_file(path: &Path) -> bool {
    ext_of(path).is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// Infer the media link descriptor for a file path from its extension.
///
/// Returns `None` for files that are not library material (documents,
/// archives, nfo files, and so on). Directories are handled by the scanner
/// itself and never reach this function.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use reelvault_common::paths::descriptor_for_path;
/// use reelvault_common::Descriptor;
///
/// assert_eq!(descriptor_for_path(Path::new("a.mkv")), Some(Descriptor::Video));
/// assert_eq!(descriptor_for_path(Path::new("a.srt")), Some(Descriptor::Subtitle));
/// assert_eq!(descriptor_for_path(Path::new("a.nfo")), None);
/// ```
pub fn descriptor_for_path(path: &Path) -> Option<Descriptor> {
    let ext = ext_of(path)?;
    let ext = ext.as_str();
    if VIDEO_EXTENSIONS.contains(&ext) {
        Some(Descriptor::Video)
    } else if AUDIO_EXTENSIONS.contains(&ext) {
        Some(Descriptor::Audio)
    } else if SUBTITLE_EXTENSIONS.contains(&ext) {
        Some(Descriptor::Subtitle)
    } else if IMAGE_EXTENSIONS.contains(&ext) {
        Some(Descriptor::Image)
    } else {
        None
    }
}

/// Get the list of video file extensions.
#[must_use]
pub fn video_extensions() -> &'static [&'static str] {
    VIDEO_EXTENSIONS
}

/// Get the list of audio file extensions.
#[must_use]
pub fn audio_extensions() -> &'static [&'static str] {
    AUDIO_EXTENSIONS
}

/// Get the list of subtitle file extensions.
#[must_use]
pub fn subtitle_extensions() -> &'static [&'static str] {
    SUBTITLE_EXTENSIONS
}
