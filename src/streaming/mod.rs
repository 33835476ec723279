//! Stream serving: transcode sessions, HLS output, and playback progress.

mod playback;
pub mod sessions;
pub mod transcoder;

pub use sessions::{start_cleanup_task, SessionState, StreamManager, TranscodeSession};
pub use transcoder::Transcoder;
