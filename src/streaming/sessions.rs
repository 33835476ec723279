//! Transcode session tracking.
//!
//! Each playing client holds a session token. The first playlist request for
//! a token spawns an ffmpeg HLS transcode; later requests and segment fetches
//! touch the session so the idle cleanup task leaves it alone. Stopping a
//! session kills the transcode and removes its segment directory.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use reelvault_common::{Descriptor, Error, MediaLinkId, Result, SessionToken, UserId};
use reelvault_db::pool::{get_conn, DbPool};
use reelvault_db::queries::media_links;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Child;
use tracing::{debug, info, warn};

use crate::config::TranscodeConfig;
use super::transcoder::Transcoder;

/// How long to wait for ffmpeg to produce a playable playlist.
const READY_TIMEOUT: Duration = Duration::from_secs(60);
const READY_POLL: Duration = Duration::from_millis(200);

/// Lifecycle of a transcode session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Session created, transcode not yet spawned.
    Requested,
    /// ffmpeg is running but no playable output exists yet.
    Transcoding,
    /// Playlist and first segments exist on disk.
    Ready,
    /// At least one segment has been fetched.
    Streaming,
    /// Session ended; `deleted` records whether playback state was cleared.
    Stopped { deleted: bool },
}

/// Snapshot of one session.
#[derive(Debug, Clone)]
pub struct TranscodeSession {
    pub token: SessionToken,
    pub media_link_id: MediaLinkId,
    pub user_id: UserId,
    pub state: SessionState,
    pub dir: PathBuf,
    pub started_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

struct SessionEntry {
    session: TranscodeSession,
    child: Option<Child>,
}

/// Thread-safe manager for active transcode sessions.
#[derive(Clone)]
pub struct StreamManager {
    pool: DbPool,
    sessions: Arc<DashMap<SessionToken, SessionEntry>>,
    transcoder: Transcoder,
    idle_timeout: Duration,
    pub(crate) completion_threshold: f64,
}

impl StreamManager {
    pub fn new(pool: DbPool, config: &TranscodeConfig, ffmpeg: PathBuf) -> Self {
        Self {
            pool,
            sessions: Arc::new(DashMap::new()),
            transcoder: Transcoder::new(config, ffmpeg),
            idle_timeout: Duration::from_secs(config.idle_timeout_secs),
            completion_threshold: config.completion_threshold,
        }
    }

    pub(crate) fn conn(&self) -> Result<reelvault_db::pool::PooledConnection> {
        get_conn(&self.pool)
    }

    /// Get the HLS playlist for a media link, starting a transcode on the
    /// first call for this token.
    pub async fn get_playlist(
        &self,
        user_id: UserId,
        media_link_id: MediaLinkId,
        token: SessionToken,
    ) -> Result<String> {
        if let Some(mut entry) = self.sessions.get_mut(&token) {
            if entry.session.media_link_id != media_link_id {
                return Err(Error::invalid_input(format!(
                    "session {token} is bound to another media link"
                )));
            }
            entry.session.last_seen = Utc::now();
            drop(entry);
            return self.read_playlist(token);
        }

        let link = {
            let conn = self.conn()?;
            media_links::get_link(&conn, media_link_id)?
                .ok_or_else(|| Error::not_found(format!("media link {media_link_id}")))?
        };
        match link.descriptor {
            Descriptor::Video | Descriptor::Audio => {}
            other => {
                return Err(Error::invalid_input(format!(
                    "cannot stream a {other} link"
                )));
            }
        }
        if !Path::new(&link.file_path).is_file() {
            return Err(Error::filesystem(format!(
                "{} is missing on disk",
                link.file_path
            )));
        }

        let now = Utc::now();
        self.sessions.insert(
            token,
            SessionEntry {
                session: TranscodeSession {
                    token,
                    media_link_id,
                    user_id,
                    state: SessionState::Requested,
                    dir: self.transcoder.session_dir(token),
                    started_at: now,
                    last_seen: now,
                },
                child: None,
            },
        );

        match self.transcoder.spawn(token, Path::new(&link.file_path)) {
            Ok(child) => {
                if let Some(mut entry) = self.sessions.get_mut(&token) {
                    entry.child = Some(child);
                    entry.session.state = SessionState::Transcoding;
                }
            }
            Err(e) => {
                self.sessions.remove(&token);
                return Err(e);
            }
        }

        if let Err(e) = self.wait_until_ready(token).await {
            self.stop_session(token, false)?;
            return Err(e);
        }

        self.read_playlist(token)
    }

    /// Poll until the playlist references at least one segment, or the
    /// transcode dies or times out.
    async fn wait_until_ready(&self, token: SessionToken) -> Result<()> {
        let playlist = self.transcoder.playlist_path(token);
        let deadline = tokio::time::Instant::now() + READY_TIMEOUT;

        loop {
            if playlist_has_segment(&playlist) {
                if let Some(mut entry) = self.sessions.get_mut(&token) {
                    entry.session.state = SessionState::Ready;
                }
                debug!(token = %token, "Transcode ready");
                return Ok(());
            }

            // ffmpeg exiting cleanly means the playlist is final; a failure
            // exit means it never will be.
            let exit = self
                .sessions
                .get_mut(&token)
                .and_then(|mut entry| entry.child.as_mut().and_then(|c| c.try_wait().ok()))
                .flatten();
            if let Some(status) = exit {
                if status.success() && playlist_has_segment(&playlist) {
                    if let Some(mut entry) = self.sessions.get_mut(&token) {
                        entry.session.state = SessionState::Ready;
                    }
                    return Ok(());
                }
                return Err(Error::transcode(format!(
                    "ffmpeg exited with {status} before producing output"
                )));
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(Error::transcode("transcode did not become ready in time"));
            }
            tokio::time::sleep(READY_POLL).await;
        }
    }

    fn read_playlist(&self, token: SessionToken) -> Result<String> {
        let playlist = self.transcoder.playlist_path(token);
        std::fs::read_to_string(&playlist).map_err(|e| {
            Error::transcode(format!("playlist {} unreadable: {e}", playlist.display()))
        })
    }

    /// Resolve a segment name to its on-disk path, marking the session as
    /// actively streaming.
    pub fn get_file_path_for_segment(
        &self,
        token: SessionToken,
        segment_name: &str,
    ) -> Result<PathBuf> {
        // Segment names come from clients; never let them escape the dir.
        if segment_name.contains('/') || segment_name.contains('\\') || segment_name.contains("..")
        {
            return Err(Error::invalid_input(format!(
                "bad segment name: {segment_name}"
            )));
        }

        let mut entry = self
            .sessions
            .get_mut(&token)
            .ok_or_else(|| Error::not_found(format!("session {token}")))?;
        entry.session.last_seen = Utc::now();
        if entry.session.state == SessionState::Ready {
            entry.session.state = SessionState::Streaming;
        }

        let path = entry.session.dir.join(segment_name);
        if !path.is_file() {
            return Err(Error::not_found(format!("segment {segment_name}")));
        }
        Ok(path)
    }

    /// Stop a session: kill the transcode, remove its segment directory, and
    /// optionally clear the user's playback state for the link.
    ///
    /// Returns false when the token is unknown.
    pub fn stop_session(&self, token: SessionToken, delete: bool) -> Result<bool> {
        let Some((_, mut entry)) = self.sessions.remove(&token) else {
            return Ok(false);
        };

        if let Some(mut child) = entry.child.take() {
            if let Err(e) = child.start_kill() {
                debug!(token = %token, error = %e, "Transcode already exited");
            }
        }

        if entry.session.dir.exists() {
            if let Err(e) = std::fs::remove_dir_all(&entry.session.dir) {
                warn!(dir = %entry.session.dir.display(), error = %e, "Failed to remove segment dir");
            }
        }

        if delete {
            self.clear_playback_state(entry.session.user_id, entry.session.media_link_id)?;
        }

        info!(
            token = %token,
            media_link_id = %entry.session.media_link_id,
            duration_secs = (Utc::now() - entry.session.started_at).num_seconds(),
            deleted = delete,
            "Stopped session"
        );
        Ok(true)
    }

    /// Get a snapshot of one session.
    pub fn session(&self, token: SessionToken) -> Option<TranscodeSession> {
        self.sessions.get(&token).map(|e| e.session.clone())
    }

    /// Snapshots of all active sessions.
    pub fn active_sessions(&self) -> Vec<TranscodeSession> {
        self.sessions.iter().map(|e| e.session.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Stop sessions that have not been touched within the idle timeout.
    ///
    /// Returns the number of sessions stopped.
    pub fn cleanup_idle_sessions(&self) -> usize {
        let now = Utc::now();
        let idle = chrono::Duration::from_std(self.idle_timeout)
            .unwrap_or_else(|_| chrono::Duration::seconds(300));

        let expired: Vec<SessionToken> = self
            .sessions
            .iter()
            .filter(|entry| now - entry.session.last_seen > idle)
            .map(|entry| entry.session.token)
            .collect();

        let mut stopped = 0;
        for token in expired {
            match self.stop_session(token, false) {
                Ok(true) => {
                    info!(token = %token, "Stopped idle session");
                    stopped += 1;
                }
                Ok(false) => {}
                Err(e) => warn!(token = %token, error = %e, "Failed to stop idle session"),
            }
        }
        stopped
    }

    /// Sessions a user holds against one media link.
    pub(crate) fn sessions_for(
        &self,
        user_id: UserId,
        media_link_id: MediaLinkId,
    ) -> Vec<SessionToken> {
        self.sessions
            .iter()
            .filter(|entry| {
                entry.session.user_id == user_id && entry.session.media_link_id == media_link_id
            })
            .map(|entry| entry.session.token)
            .collect()
    }
}

fn playlist_has_segment(playlist: &Path) -> bool {
    match std::fs::read_to_string(playlist) {
        Ok(text) => text.lines().any(|l| l.trim_end().ends_with(".ts")),
        Err(_) => false,
    }
}

/// Start a background task that periodically stops idle sessions.
pub fn start_cleanup_task(
    manager: StreamManager,
    interval_secs: u64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            manager.cleanup_idle_sessions();
        }
    })
}
