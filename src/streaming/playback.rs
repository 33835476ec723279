//! Playback progress tracking.
//!
//! One state row per (user, media link), created on the first heartbeat.
//! Positions are clamped to the runtime, updates carrying a timestamp older
//! than the stored row are dropped, and crossing the completion threshold
//! deletes the row and tears down the user's sessions for that link.

use chrono::{DateTime, Utc};
use reelvault_common::{Error, MediaLinkId, PlaybackStateId, Result, UserId};
use reelvault_db::models::PlaybackState;
use reelvault_db::queries::{media_links, metadata, playback};
use tracing::{debug, info};

use super::sessions::StreamManager;

impl StreamManager {
    /// Fetch a user's playback state for a link, optionally creating one at
    /// position zero. With `create` unset, a missing state is `None`.
    pub fn get_playback_state(
        &self,
        media_link_id: MediaLinkId,
        user_id: UserId,
        create: bool,
    ) -> Result<Option<PlaybackState>> {
        let conn = self.conn()?;

        if let Some(state) = playback::get_state(&conn, user_id, media_link_id)? {
            return Ok(Some(state));
        }
        if !create {
            return Ok(None);
        }

        let link = media_links::get_link(&conn, media_link_id)?
            .ok_or_else(|| Error::not_found(format!("media link {media_link_id}")))?;

        // Runtime comes from the matched metadata; zero means unknown, which
        // disables clamping and completion.
        let runtime = match link.metadata_id {
            Some(id) => metadata::get_metadata(&conn, id)?
                .and_then(|m| m.runtime_secs)
                .unwrap_or(0.0),
            None => 0.0,
        };

        let state = playback::create_state(&conn, user_id, media_link_id, link.metadata_id, runtime)?;
        debug!(
            user_id = %user_id,
            media_link_id = %media_link_id,
            runtime,
            "Created playback state"
        );
        Ok(Some(state))
    }

    /// Record a position heartbeat.
    ///
    /// Returns false for an unknown state or a stale update. Crossing the
    /// completion threshold deletes the state and stops the user's sessions
    /// for the link with delete set, then returns true.
    pub fn update_state_position(
        &self,
        state_id: PlaybackStateId,
        position: f64,
        reported_at: DateTime<Utc>,
    ) -> Result<bool> {
        let state = {
            let conn = self.conn()?;
            match playback::get_state_by_id(&conn, state_id)? {
                Some(state) => state,
                None => return Ok(false),
            }
        };

        if reported_at < state.updated_at {
            debug!(state_id = %state_id, "Dropping stale position update");
            return Ok(false);
        }

        let mut clamped = position.max(0.0);
        if state.runtime > 0.0 {
            clamped = clamped.min(state.runtime);
        }

        if state.runtime > 0.0 && clamped / state.runtime >= self.completion_threshold {
            {
                let conn = self.conn()?;
                playback::delete_state(&conn, state_id)?;
            }
            for token in self.sessions_for(state.user_id, state.media_link_id) {
                self.stop_session(token, true)?;
            }
            info!(
                state_id = %state_id,
                media_link_id = %state.media_link_id,
                position = clamped,
                runtime = state.runtime,
                "Playback completed"
            );
            return Ok(true);
        }

        let conn = self.conn()?;
        playback::update_position(&conn, state_id, clamped)
    }

    /// A user's in-progress items, most recently watched first.
    pub fn continue_watching(&self, user_id: UserId) -> Result<Vec<PlaybackState>> {
        let conn = self.conn()?;
        playback::list_states_for_user(&conn, user_id)
    }

    /// Remove the user's playback state for a link, if any.
    pub(crate) fn clear_playback_state(
        &self,
        user_id: UserId,
        media_link_id: MediaLinkId,
    ) -> Result<()> {
        let conn = self.conn()?;
        if let Some(state) = playback::get_state(&conn, user_id, media_link_id)? {
            playback::delete_state(&conn, state.id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::sessions::tests::{insert_video, test_manager};
    use reelvault_common::{MediaType, SessionToken};
    use reelvault_db::models::Metadata;
    use reelvault_db::pool::init_memory_pool;

    fn linked_video_with_runtime(
        pool: &reelvault_db::pool::DbPool,
        path: &std::path::Path,
        runtime_secs: f64,
    ) -> MediaLinkId {
        let link_id = insert_video(pool, path);
        let conn = pool.get().unwrap();
        let mut meta = Metadata::new(MediaType::Movie, "Film");
        meta.runtime_secs = Some(runtime_secs);
        metadata::insert_metadata(&conn, &meta).unwrap();
        media_links::set_link_metadata(&conn, link_id, Some(meta.id), None).unwrap();
        link_id
    }

    #[test]
    fn test_state_absent_until_first_heartbeat() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("film.mkv");
        std::fs::write(&input, b"x").unwrap();

        let pool = init_memory_pool().unwrap();
        let manager = test_manager(pool.clone(), tmp.path());
        let link_id = linked_video_with_runtime(&pool, &input, 7200.0);
        let user = UserId::new();

        assert!(manager
            .get_playback_state(link_id, user, false)
            .unwrap()
            .is_none());

        let state = manager
            .get_playback_state(link_id, user, true)
            .unwrap()
            .unwrap();
        assert_eq!(state.position, 0.0);
        assert_eq!(state.runtime, 7200.0);

        // Second fetch returns the same row.
        let again = manager
            .get_playback_state(link_id, user, false)
            .unwrap()
            .unwrap();
        assert_eq!(again.id, state.id);
    }

    #[test]
    fn test_position_clamped_to_runtime() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("film.mkv");
        std::fs::write(&input, b"x").unwrap();

        let pool = init_memory_pool().unwrap();
        let manager = test_manager(pool.clone(), tmp.path());
        let link_id = linked_video_with_runtime(&pool, &input, 7200.0);
        let user = UserId::new();

        let state = manager
            .get_playback_state(link_id, user, true)
            .unwrap()
            .unwrap();

        // Below zero clamps to zero.
        assert!(manager
            .update_state_position(state.id, -40.0, Utc::now())
            .unwrap());
        let fetched = manager
            .get_playback_state(link_id, user, false)
            .unwrap()
            .unwrap();
        assert_eq!(fetched.position, 0.0);

        // A mid-film position persists as-is.
        assert!(manager
            .update_state_position(state.id, 3600.0, Utc::now())
            .unwrap());
        let fetched = manager
            .get_playback_state(link_id, user, false)
            .unwrap()
            .unwrap();
        assert_eq!(fetched.position, 3600.0);
    }

    #[test]
    fn test_stale_update_is_dropped() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("film.mkv");
        std::fs::write(&input, b"x").unwrap();

        let pool = init_memory_pool().unwrap();
        let manager = test_manager(pool.clone(), tmp.path());
        let link_id = linked_video_with_runtime(&pool, &input, 7200.0);
        let user = UserId::new();

        let state = manager
            .get_playback_state(link_id, user, true)
            .unwrap()
            .unwrap();

        let stale = state.updated_at - chrono::Duration::seconds(30);
        assert!(!manager.update_state_position(state.id, 100.0, stale).unwrap());

        let fetched = manager
            .get_playback_state(link_id, user, false)
            .unwrap()
            .unwrap();
        assert_eq!(fetched.position, 0.0);
    }

    #[tokio::test]
    async fn test_completion_deletes_state_and_session() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("film.mkv");
        std::fs::write(&input, b"x").unwrap();

        let pool = init_memory_pool().unwrap();
        let manager = test_manager(pool.clone(), tmp.path());
        let link_id = linked_video_with_runtime(&pool, &input, 7200.0);
        let user = UserId::new();
        let token = SessionToken::new();

        manager.get_playlist(user, link_id, token).await.unwrap();
        let state = manager
            .get_playback_state(link_id, user, true)
            .unwrap()
            .unwrap();

        // 95% of runtime crosses the 90% threshold.
        assert!(manager
            .update_state_position(state.id, 7200.0 * 0.95, Utc::now())
            .unwrap());

        assert!(manager
            .get_playback_state(link_id, user, false)
            .unwrap()
            .is_none());
        assert!(manager.session(token).is_none());
    }

    #[test]
    fn test_unknown_state_returns_false() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = test_manager(init_memory_pool().unwrap(), tmp.path());
        assert!(!manager
            .update_state_position(PlaybackStateId::new(), 10.0, Utc::now())
            .unwrap());
    }

    #[test]
    fn test_unknown_runtime_never_completes() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("film.mkv");
        std::fs::write(&input, b"x").unwrap();

        let pool = init_memory_pool().unwrap();
        let manager = test_manager(pool.clone(), tmp.path());
        // Unmatched link: runtime unknown.
        let link_id = insert_video(&pool, &input);
        let user = UserId::new();

        let state = manager
            .get_playback_state(link_id, user, true)
            .unwrap()
            .unwrap();
        assert_eq!(state.runtime, 0.0);

        assert!(manager
            .update_state_position(state.id, 99999.0, Utc::now())
            .unwrap());
        let fetched = manager
            .get_playback_state(link_id, user, false)
            .unwrap()
            .unwrap();
        assert_eq!(fetched.position, 99999.0);
    }

    #[test]
    fn test_continue_watching_ordering() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("a.mkv");
        let b = tmp.path().join("b.mkv");
        std::fs::write(&a, b"x").unwrap();
        std::fs::write(&b, b"x").unwrap();

        let pool = init_memory_pool().unwrap();
        let manager = test_manager(pool.clone(), tmp.path());
        let link_a = linked_video_with_runtime(&pool, &a, 7200.0);
        let link_b = linked_video_with_runtime(&pool, &b, 7200.0);
        let user = UserId::new();

        let state_a = manager
            .get_playback_state(link_a, user, true)
            .unwrap()
            .unwrap();
        manager.get_playback_state(link_b, user, true).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(10));
        manager
            .update_state_position(state_a.id, 60.0, Utc::now())
            .unwrap();

        let watching = manager.continue_watching(user).unwrap();
        assert_eq!(watching.len(), 2);
        assert_eq!(watching[0].media_link_id, link_a);
    }
}
