//! Media link database queries.
//!
//! Media links are looked up by id, by exact file path, and by base-path
//! prefix (for root-directory cascade deletes). The matching step updates a
//! link's metadata association in place.

use chrono::{DateTime, Utc};
use reelvault_common::{Descriptor, Error, MediaLinkId, MetadataId, Result};
use rusqlite::Connection;
use uuid::Uuid;

use crate::models::MediaLink;

const LINK_COLUMNS: &str = "id, link_type, descriptor, file_path, parent_id, \
     metadata_id, root_metadata_id, media_kind, created_at, updated_at";

fn parse_link_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MediaLink> {
    Ok(MediaLink {
        id: MediaLinkId::from(Uuid::parse_str(&row.get::<_, String>(0)?).unwrap()),
        link_type: row.get::<_, String>(1)?.parse().unwrap(),
        descriptor: row.get::<_, String>(2)?.parse().unwrap(),
        file_path: row.get(3)?,
        parent_id: row
            .get::<_, Option<String>>(4)?
            .map(|s| MediaLinkId::from(Uuid::parse_str(&s).unwrap())),
        metadata_id: row
            .get::<_, Option<String>>(5)?
            .map(|s| MetadataId::from(Uuid::parse_str(&s).unwrap())),
        root_metadata_id: row
            .get::<_, Option<String>>(6)?
            .map(|s| MetadataId::from(Uuid::parse_str(&s).unwrap())),
        media_kind: row.get::<_, String>(7)?.parse().unwrap(),
        created_at: DateTime::parse_from_rfc3339(&row.get::<_, String>(8)?)
            .unwrap()
            .with_timezone(&Utc),
        updated_at: DateTime::parse_from_rfc3339(&row.get::<_, String>(9)?)
            .unwrap()
            .with_timezone(&Utc),
    })
}

/// Insert a new media link.
pub fn insert_link(conn: &Connection, link: &MediaLink) -> Result<()> {
    conn.execute(
        "INSERT INTO media_links (id, link_type, descriptor, file_path, parent_id,
             metadata_id, root_metadata_id, media_kind, created_at, updated_at)
         VALUES (:id, :link_type, :descriptor, :file_path, :parent_id,
             :metadata_id, :root_metadata_id, :media_kind, :created_at, :updated_at)",
        rusqlite::named_params! {
            ":id": link.id.to_string(),
            ":link_type": link.link_type.to_string(),
            ":descriptor": link.descriptor.to_string(),
            ":file_path": link.file_path,
            ":parent_id": link.parent_id.map(|id| id.to_string()),
            ":metadata_id": link.metadata_id.map(|id| id.to_string()),
            ":root_metadata_id": link.root_metadata_id.map(|id| id.to_string()),
            ":media_kind": link.media_kind.to_string(),
            ":created_at": link.created_at.to_rfc3339(),
            ":updated_at": link.updated_at.to_rfc3339(),
        },
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(())
}

/// Get a media link by id.
pub fn get_link(conn: &Connection, id: MediaLinkId) -> Result<Option<MediaLink>> {
    let result = conn.query_row(
        &format!("SELECT {LINK_COLUMNS} FROM media_links WHERE id = :id"),
        rusqlite::named_params! { ":id": id.to_string() },
        parse_link_row,
    );

    match result {
        Ok(link) => Ok(Some(link)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Get a media link by exact file path.
pub fn get_link_by_path(conn: &Connection, file_path: &str) -> Result<Option<MediaLink>> {
    let result = conn.query_row(
        &format!("SELECT {LINK_COLUMNS} FROM media_links WHERE file_path = :file_path"),
        rusqlite::named_params! { ":file_path": file_path },
        parse_link_row,
    );

    match result {
        Ok(link) => Ok(Some(link)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// List all registered root-directory links.
pub fn list_roots(conn: &Connection) -> Result<Vec<MediaLink>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {LINK_COLUMNS} FROM media_links
             WHERE descriptor = :descriptor
             ORDER BY file_path ASC"
        ))
        .map_err(|e| Error::database(e.to_string()))?;

    let links = stmt
        .query_map(
            rusqlite::named_params! { ":descriptor": Descriptor::RootDirectory.to_string() },
            parse_link_row,
        )
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(links)
}

/// List all links whose file path sits under the given base path.
///
/// The base path itself is excluded. A separator is appended to the prefix so
/// `/movies` does not also match `/movies2`.
pub fn list_links_under(conn: &Connection, base_path: &str) -> Result<Vec<MediaLink>> {
    let prefix = format!("{}/", base_path.trim_end_matches('/'));
    let pattern = format!("{}%", prefix.replace('%', "\\%").replace('_', "\\_"));

    let mut stmt = conn
        .prepare(&format!(
            "SELECT {LINK_COLUMNS} FROM media_links
             WHERE file_path LIKE :pattern ESCAPE '\\'
             ORDER BY file_path ASC"
        ))
        .map_err(|e| Error::database(e.to_string()))?;

    let links = stmt
        .query_map(
            rusqlite::named_params! { ":pattern": pattern },
            parse_link_row,
        )
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(links)
}

/// List links directly associated with a metadata record.
pub fn list_links_by_metadata(conn: &Connection, metadata_id: MetadataId) -> Result<Vec<MediaLink>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {LINK_COLUMNS} FROM media_links
             WHERE metadata_id = :metadata_id
             ORDER BY file_path ASC"
        ))
        .map_err(|e| Error::database(e.to_string()))?;

    let links = stmt
        .query_map(
            rusqlite::named_params! { ":metadata_id": metadata_id.to_string() },
            parse_link_row,
        )
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(links)
}

/// Set (or clear) a link's metadata association.
pub fn set_link_metadata(
    conn: &Connection,
    link_id: MediaLinkId,
    metadata_id: Option<MetadataId>,
    root_metadata_id: Option<MetadataId>,
) -> Result<()> {
    conn.execute(
        "UPDATE media_links
         SET metadata_id = :metadata_id,
             root_metadata_id = :root_metadata_id,
             updated_at = :updated_at
         WHERE id = :id",
        rusqlite::named_params! {
            ":id": link_id.to_string(),
            ":metadata_id": metadata_id.map(|id| id.to_string()),
            ":root_metadata_id": root_metadata_id.map(|id| id.to_string()),
            ":updated_at": Utc::now().to_rfc3339(),
        },
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(())
}

/// Delete a media link by id. Returns true when a row was removed.
pub fn delete_link(conn: &Connection, id: MediaLinkId) -> Result<bool> {
    let affected = conn
        .execute(
            "DELETE FROM media_links WHERE id = :id",
            rusqlite::named_params! { ":id": id.to_string() },
        )
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(affected > 0)
}

/// Delete every link under a base path. Returns the number of rows removed.
///
/// Used when a root-directory link is removed: the cascade is by path prefix,
/// not by parent chain, so files discovered before parent tracking existed are
/// still cleaned up.
pub fn delete_links_under(conn: &Connection, base_path: &str) -> Result<usize> {
    let prefix = format!("{}/", base_path.trim_end_matches('/'));
    let pattern = format!("{}%", prefix.replace('%', "\\%").replace('_', "\\_"));

    let affected = conn
        .execute(
            "DELETE FROM media_links WHERE file_path LIKE :pattern ESCAPE '\\'",
            rusqlite::named_params! { ":pattern": pattern },
        )
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(affected)
}
