//! Playback state database queries.
//!
//! One row per (user, media link), created on the first heartbeat and deleted
//! when playback crosses the completion threshold. Position clamping and
//! stale-update rejection live in the streaming service; these queries only
//! persist what they are handed.

use chrono::{DateTime, Utc};
use reelvault_common::{Error, MediaLinkId, MetadataId, PlaybackStateId, Result, UserId};
use rusqlite::Connection;
use uuid::Uuid;

use crate::models::PlaybackState;

const STATE_COLUMNS: &str =
    "id, media_link_id, metadata_id, user_id, position, runtime, created_at, updated_at";

fn parse_state_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PlaybackState> {
    Ok(PlaybackState {
        id: PlaybackStateId::from(Uuid::parse_str(&row.get::<_, String>(0)?).unwrap()),
        media_link_id: MediaLinkId::from(Uuid::parse_str(&row.get::<_, String>(1)?).unwrap()),
        metadata_id: row
            .get::<_, Option<String>>(2)?
            .map(|s| MetadataId::from(Uuid::parse_str(&s).unwrap())),
        user_id: UserId::from(Uuid::parse_str(&row.get::<_, String>(3)?).unwrap()),
        position: row.get(4)?,
        runtime: row.get(5)?,
        created_at: DateTime::parse_from_rfc3339(&row.get::<_, String>(6)?)
            .unwrap()
            .with_timezone(&Utc),
        updated_at: DateTime::parse_from_rfc3339(&row.get::<_, String>(7)?)
            .unwrap()
            .with_timezone(&Utc),
    })
}

/// Get the playback state for a (user, media link) pair, if one exists.
pub fn get_state(
    conn: &Connection,
    user_id: UserId,
    media_link_id: MediaLinkId,
) -> Result<Option<PlaybackState>> {
    let result = conn.query_row(
        &format!(
            "SELECT {STATE_COLUMNS} FROM playback_states
             WHERE user_id = :user_id AND media_link_id = :media_link_id"
        ),
        rusqlite::named_params! {
            ":user_id": user_id.to_string(),
            ":media_link_id": media_link_id.to_string(),
        },
        parse_state_row,
    );

    match result {
        Ok(state) => Ok(Some(state)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Get a playback state by id.
pub fn get_state_by_id(conn: &Connection, id: PlaybackStateId) -> Result<Option<PlaybackState>> {
    let result = conn.query_row(
        &format!("SELECT {STATE_COLUMNS} FROM playback_states WHERE id = :id"),
        rusqlite::named_params! { ":id": id.to_string() },
        parse_state_row,
    );

    match result {
        Ok(state) => Ok(Some(state)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Create a playback state at position zero.
pub fn create_state(
    conn: &Connection,
    user_id: UserId,
    media_link_id: MediaLinkId,
    metadata_id: Option<MetadataId>,
    runtime: f64,
) -> Result<PlaybackState> {
    let now = Utc::now();
    let state = PlaybackState {
        id: PlaybackStateId::new(),
        media_link_id,
        metadata_id,
        user_id,
        position: 0.0,
        runtime,
        created_at: now,
        updated_at: now,
    };

    conn.execute(
        "INSERT INTO playback_states (id, media_link_id, metadata_id, user_id,
             position, runtime, created_at, updated_at)
         VALUES (:id, :media_link_id, :metadata_id, :user_id,
             :position, :runtime, :created_at, :updated_at)",
        rusqlite::named_params! {
            ":id": state.id.to_string(),
            ":media_link_id": state.media_link_id.to_string(),
            ":metadata_id": state.metadata_id.map(|id| id.to_string()),
            ":user_id": state.user_id.to_string(),
            ":position": state.position,
            ":runtime": state.runtime,
            ":created_at": state.created_at.to_rfc3339(),
            ":updated_at": state.updated_at.to_rfc3339(),
        },
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(state)
}

/// Persist a new position for a state. Returns false when the state is gone.
pub fn update_position(conn: &Connection, id: PlaybackStateId, position: f64) -> Result<bool> {
    let affected = conn
        .execute(
            "UPDATE playback_states
             SET position = :position,
                 updated_at = :updated_at
             WHERE id = :id",
            rusqlite::named_params! {
                ":id": id.to_string(),
                ":position": position,
                ":updated_at": Utc::now().to_rfc3339(),
            },
        )
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(affected > 0)
}

/// Delete a playback state. Returns true when a row was removed.
pub fn delete_state(conn: &Connection, id: PlaybackStateId) -> Result<bool> {
    let affected = conn
        .execute(
            "DELETE FROM playback_states WHERE id = :id",
            rusqlite::named_params! { ":id": id.to_string() },
        )
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(affected > 0)
}

/// List a user's in-progress states, most recently updated first.
pub fn list_states_for_user(conn: &Connection, user_id: UserId) -> Result<Vec<PlaybackState>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {STATE_COLUMNS} FROM playback_states
             WHERE user_id = :user_id
             ORDER BY updated_at DESC"
        ))
        .map_err(|e| Error::database(e.to_string()))?;

    let states = stmt
        .query_map(
            rusqlite::named_params! { ":user_id": user_id.to_string() },
            parse_state_row,
        )
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(states)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaLink;
    use crate::pool::init_memory_pool;
    use crate::queries::media_links;
    use reelvault_common::{Descriptor, LinkType, MediaKind};

    fn setup_link(conn: &Connection) -> MediaLinkId {
        let link = MediaLink::new(
            LinkType::Local,
            Descriptor::Video,
            "/movies/test.mkv",
            MediaKind::Movie,
        );
        media_links::insert_link(conn, &link).unwrap();
        link.id
    }

    #[test]
    fn test_state_absent_until_created() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let link_id = setup_link(&conn);
        let user_id = UserId::new();

        assert!(get_state(&conn, user_id, link_id).unwrap().is_none());

        let state = create_state(&conn, user_id, link_id, None, 7200.0).unwrap();
        assert_eq!(state.position, 0.0);

        let fetched = get_state(&conn, user_id, link_id).unwrap().unwrap();
        assert_eq!(fetched.id, state.id);
    }

    #[test]
    fn test_unique_per_user_and_link() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let link_id = setup_link(&conn);
        let user_id = UserId::new();

        create_state(&conn, user_id, link_id, None, 7200.0).unwrap();
        assert!(create_state(&conn, user_id, link_id, None, 7200.0).is_err());

        // A different user gets their own row.
        create_state(&conn, UserId::new(), link_id, None, 7200.0).unwrap();
    }

    #[test]
    fn test_update_position() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let link_id = setup_link(&conn);
        let user_id = UserId::new();

        let state = create_state(&conn, user_id, link_id, None, 7200.0).unwrap();
        assert!(update_position(&conn, state.id, 1234.5).unwrap());

        let fetched = get_state_by_id(&conn, state.id).unwrap().unwrap();
        assert_eq!(fetched.position, 1234.5);
    }

    #[test]
    fn test_update_missing_state_returns_false() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        assert!(!update_position(&conn, PlaybackStateId::new(), 10.0).unwrap());
    }

    #[test]
    fn test_delete_state() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let link_id = setup_link(&conn);
        let user_id = UserId::new();

        let state = create_state(&conn, user_id, link_id, None, 7200.0).unwrap();
        assert!(delete_state(&conn, state.id).unwrap());
        assert!(get_state(&conn, user_id, link_id).unwrap().is_none());
    }

    #[test]
    fn test_deleting_link_cascades_states() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let link_id = setup_link(&conn);
        let user_id = UserId::new();

        let state = create_state(&conn, user_id, link_id, None, 7200.0).unwrap();
        media_links::delete_link(&conn, link_id).unwrap();
        assert!(get_state_by_id(&conn, state.id).unwrap().is_none());
    }
}
