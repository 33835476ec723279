//! Reelvault: media library import, metadata matching, and stream sessions.
//!
//! The pipeline runs in four stages. The library manager registers root
//! folders and scans them into media links. The matcher parses filenames and
//! reconciles links against metadata providers. The analyzer probes files
//! with ffprobe and persists their streams. The stream manager serves HLS
//! transcode sessions and tracks per-user playback progress.

pub mod config;
pub mod library;
pub mod metadata;
pub mod probe;
pub mod processors;
pub mod state;
pub mod streaming;
