//! Metadata database queries.
//!
//! Metadata rows form a tree (show → season → episode) flattened into a table
//! with parent/root foreign keys. Remote-sourced records are deduplicated on
//! (tmdb_id, media_type); deleting a root cascades through the parent chain
//! while referencing media links are unlinked by the schema's ON DELETE SET
//! NULL, never deleted.

use chrono::{DateTime, Utc};
use reelvault_common::{Error, MediaType, MetadataId, Result};
use rusqlite::Connection;
use uuid::Uuid;

use crate::models::Metadata;

const METADATA_COLUMNS: &str = "id, media_type, tmdb_id, title, overview, release_date, \
     runtime_secs, index_number, parent_index_number, parent_id, root_id, created_at, updated_at";

fn parse_metadata_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Metadata> {
    Ok(Metadata {
        id: MetadataId::from(Uuid::parse_str(&row.get::<_, String>(0)?).unwrap()),
        media_type: row.get::<_, String>(1)?.parse().unwrap(),
        tmdb_id: row.get(2)?,
        title: row.get(3)?,
        overview: row.get(4)?,
        release_date: row.get(5)?,
        runtime_secs: row.get(6)?,
        index_number: row.get(7)?,
        parent_index_number: row.get(8)?,
        parent_id: row
            .get::<_, Option<String>>(9)?
            .map(|s| MetadataId::from(Uuid::parse_str(&s).unwrap())),
        root_id: row
            .get::<_, Option<String>>(10)?
            .map(|s| MetadataId::from(Uuid::parse_str(&s).unwrap())),
        created_at: DateTime::parse_from_rfc3339(&row.get::<_, String>(11)?)
            .unwrap()
            .with_timezone(&Utc),
        updated_at: DateTime::parse_from_rfc3339(&row.get::<_, String>(12)?)
            .unwrap()
            .with_timezone(&Utc),
    })
}

/// Insert a new metadata record.
pub fn insert_metadata(conn: &Connection, meta: &Metadata) -> Result<()> {
    conn.execute(
        "INSERT INTO metadata (id, media_type, tmdb_id, title, overview, release_date,
             runtime_secs, index_number, parent_index_number, parent_id, root_id,
             created_at, updated_at)
         VALUES (:id, :media_type, :tmdb_id, :title, :overview, :release_date,
             :runtime_secs, :index_number, :parent_index_number, :parent_id, :root_id,
             :created_at, :updated_at)",
        rusqlite::named_params! {
            ":id": meta.id.to_string(),
            ":media_type": meta.media_type.to_string(),
            ":tmdb_id": meta.tmdb_id,
            ":title": meta.title,
            ":overview": meta.overview,
            ":release_date": meta.release_date,
            ":runtime_secs": meta.runtime_secs,
            ":index_number": meta.index_number,
            ":parent_index_number": meta.parent_index_number,
            ":parent_id": meta.parent_id.map(|id| id.to_string()),
            ":root_id": meta.root_id.map(|id| id.to_string()),
            ":created_at": meta.created_at.to_rfc3339(),
            ":updated_at": meta.updated_at.to_rfc3339(),
        },
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(())
}

/// Get a metadata record by id.
pub fn get_metadata(conn: &Connection, id: MetadataId) -> Result<Option<Metadata>> {
    let result = conn.query_row(
        &format!("SELECT {METADATA_COLUMNS} FROM metadata WHERE id = :id"),
        rusqlite::named_params! { ":id": id.to_string() },
        parse_metadata_row,
    );

    match result {
        Ok(meta) => Ok(Some(meta)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Get a metadata record by remote provider id and type.
pub fn get_metadata_by_tmdb(
    conn: &Connection,
    tmdb_id: i64,
    media_type: MediaType,
) -> Result<Option<Metadata>> {
    let result = conn.query_row(
        &format!(
            "SELECT {METADATA_COLUMNS} FROM metadata
             WHERE tmdb_id = :tmdb_id AND media_type = :media_type"
        ),
        rusqlite::named_params! {
            ":tmdb_id": tmdb_id,
            ":media_type": media_type.to_string(),
        },
        parse_metadata_row,
    );

    match result {
        Ok(meta) => Ok(Some(meta)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Insert a record unless one with the same (tmdb_id, media_type) already
/// exists; returns the persisted record either way.
///
/// This is the dedup point that keeps concurrent matchers from racing in two
/// rows for the same remote entity: the UNIQUE constraint backs it up, and a
/// constraint violation from a lost race resolves to the winner's row.
pub fn find_or_insert_metadata(conn: &Connection, meta: &Metadata) -> Result<Metadata> {
    if let Some(tmdb_id) = meta.tmdb_id {
        if let Some(existing) = get_metadata_by_tmdb(conn, tmdb_id, meta.media_type)? {
            return Ok(existing);
        }
    }

    match insert_metadata(conn, meta) {
        Ok(()) => Ok(meta.clone()),
        Err(e) => {
            // Lost a race on the UNIQUE(tmdb_id, media_type) index.
            if let Some(tmdb_id) = meta.tmdb_id {
                if let Some(existing) = get_metadata_by_tmdb(conn, tmdb_id, meta.media_type)? {
                    return Ok(existing);
                }
            }
            Err(e)
        }
    }
}

/// Update the descriptive fields of an existing record (metadata refresh).
pub fn update_metadata(conn: &Connection, meta: &Metadata) -> Result<()> {
    conn.execute(
        "UPDATE metadata
         SET title = :title,
             overview = :overview,
             release_date = :release_date,
             runtime_secs = :runtime_secs,
             tmdb_id = :tmdb_id,
             updated_at = :updated_at
         WHERE id = :id",
        rusqlite::named_params! {
            ":id": meta.id.to_string(),
            ":title": meta.title,
            ":overview": meta.overview,
            ":release_date": meta.release_date,
            ":runtime_secs": meta.runtime_secs,
            ":tmdb_id": meta.tmdb_id,
            ":updated_at": Utc::now().to_rfc3339(),
        },
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(())
}

/// List direct children of a metadata record (seasons of a show, episodes of
/// a season), ordered by index number.
pub fn list_children(conn: &Connection, parent_id: MetadataId) -> Result<Vec<Metadata>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {METADATA_COLUMNS} FROM metadata
             WHERE parent_id = :parent_id
             ORDER BY index_number ASC"
        ))
        .map_err(|e| Error::database(e.to_string()))?;

    let rows = stmt
        .query_map(
            rusqlite::named_params! { ":parent_id": parent_id.to_string() },
            parse_metadata_row,
        )
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(rows)
}

/// List every record belonging to a hierarchy root (the root itself excluded).
pub fn list_by_root(conn: &Connection, root_id: MetadataId) -> Result<Vec<Metadata>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {METADATA_COLUMNS} FROM metadata
             WHERE root_id = :root_id AND id != :root_id
             ORDER BY parent_index_number ASC, index_number ASC"
        ))
        .map_err(|e| Error::database(e.to_string()))?;

    let rows = stmt
        .query_map(
            rusqlite::named_params! { ":root_id": root_id.to_string() },
            parse_metadata_row,
        )
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(rows)
}

/// Delete a metadata record. Returns true when a row was removed.
///
/// Children cascade through the parent_id foreign key; media links that
/// referenced any deleted record are unlinked by the schema, not removed.
pub fn delete_metadata(conn: &Connection, id: MetadataId) -> Result<bool> {
    let affected = conn
        .execute(
            "DELETE FROM metadata WHERE id = :id",
            rusqlite::named_params! { ":id": id.to_string() },
        )
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(affected > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaLink;
    use crate::pool::init_memory_pool;
    use crate::queries::media_links;
    use reelvault_common::{Descriptor, LinkType, MediaKind};

    fn show_with_episode(conn: &Connection) -> (Metadata, Metadata, Metadata) {
        let mut show = Metadata::new(MediaType::TvShow, "Breaking Bad");
        show.tmdb_id = Some(1396);
        insert_metadata(conn, &show).unwrap();

        let mut season = Metadata::new(MediaType::TvSeason, "Season 1");
        season.index_number = Some(1);
        season.parent_id = Some(show.id);
        season.root_id = Some(show.id);
        insert_metadata(conn, &season).unwrap();

        let mut episode = Metadata::new(MediaType::TvEpisode, "Pilot");
        episode.tmdb_id = Some(62085);
        episode.index_number = Some(1);
        episode.parent_index_number = Some(1);
        episode.parent_id = Some(season.id);
        episode.root_id = Some(show.id);
        insert_metadata(conn, &episode).unwrap();

        (show, season, episode)
    }

    #[test]
    fn test_insert_and_get_metadata() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        let mut meta = Metadata::new(MediaType::Movie, "Inception");
        meta.tmdb_id = Some(27205);
        meta.release_date = Some("2010-07-16".to_string());
        insert_metadata(&conn, &meta).unwrap();

        let fetched = get_metadata(&conn, meta.id).unwrap().unwrap();
        assert_eq!(fetched.title, "Inception");
        assert_eq!(fetched.tmdb_id, Some(27205));
    }

    #[test]
    fn test_tmdb_dedup() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        let mut first = Metadata::new(MediaType::Movie, "Inception");
        first.tmdb_id = Some(27205);
        let persisted = find_or_insert_metadata(&conn, &first).unwrap();
        assert_eq!(persisted.id, first.id);

        let mut second = Metadata::new(MediaType::Movie, "Inception");
        second.tmdb_id = Some(27205);
        let deduped = find_or_insert_metadata(&conn, &second).unwrap();
        assert_eq!(deduped.id, first.id);
    }

    #[test]
    fn test_same_tmdb_id_different_type_allowed() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        let mut movie = Metadata::new(MediaType::Movie, "Fargo");
        movie.tmdb_id = Some(275);
        insert_metadata(&conn, &movie).unwrap();

        let mut show = Metadata::new(MediaType::TvShow, "Fargo");
        show.tmdb_id = Some(275);
        insert_metadata(&conn, &show).unwrap();
    }

    #[test]
    fn test_episode_root_resolves_to_show() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        let (show, _season, episode) = show_with_episode(&conn);

        let root = get_metadata(&conn, episode.root_id.unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(root.id, show.id);
        assert_eq!(root.media_type, MediaType::TvShow);
    }

    #[test]
    fn test_hierarchy_listing() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        let (show, season, episode) = show_with_episode(&conn);

        let seasons = list_children(&conn, show.id).unwrap();
        assert_eq!(seasons.len(), 1);
        assert_eq!(seasons[0].id, season.id);

        let descendants = list_by_root(&conn, show.id).unwrap();
        assert_eq!(descendants.len(), 2);
        assert!(descendants.iter().any(|m| m.id == episode.id));
    }

    #[test]
    fn test_delete_root_cascades_children_and_unlinks_media() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        let (show, _season, episode) = show_with_episode(&conn);

        let link = MediaLink::new(
            LinkType::Local,
            Descriptor::Video,
            "/tv/Breaking Bad/S01E01.mkv",
            MediaKind::Tv,
        );
        media_links::insert_link(&conn, &link).unwrap();
        media_links::set_link_metadata(&conn, link.id, Some(episode.id), Some(show.id)).unwrap();

        assert!(delete_metadata(&conn, show.id).unwrap());

        // Children are gone.
        assert!(get_metadata(&conn, episode.id).unwrap().is_none());

        // The media link survives, unlinked.
        let unlinked = media_links::get_link(&conn, link.id).unwrap().unwrap();
        assert!(unlinked.metadata_id.is_none());
        assert!(unlinked.root_metadata_id.is_none());
    }

    #[test]
    fn test_update_metadata() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        let meta = Metadata::new(MediaType::Movie, "Working Title");
        insert_metadata(&conn, &meta).unwrap();

        let mut refreshed = meta.clone();
        refreshed.title = "Final Title".to_string();
        refreshed.overview = Some("A plot.".to_string());
        update_metadata(&conn, &refreshed).unwrap();

        let fetched = get_metadata(&conn, meta.id).unwrap().unwrap();
        assert_eq!(fetched.title, "Final Title");
        assert_eq!(fetched.overview.as_deref(), Some("A plot."));
    }
}
