//! Stream encoding database queries.
//!
//! Encodings are the probed elementary streams of a media link. Re-analysis
//! replaces a link's rows wholesale inside one transaction; there is no
//! per-stream update path.

use chrono::{DateTime, Utc};
use reelvault_common::{Error, MediaLinkId, Result, StreamEncodingId};
use rusqlite::Connection;
use uuid::Uuid;

use crate::models::StreamEncoding;

const ENCODING_COLUMNS: &str = "id, media_link_id, stream_kind, stream_index, codec, \
     width, height, channels, language, is_default, created_at";

fn parse_encoding_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StreamEncoding> {
    Ok(StreamEncoding {
        id: StreamEncodingId::from(Uuid::parse_str(&row.get::<_, String>(0)?).unwrap()),
        media_link_id: MediaLinkId::from(Uuid::parse_str(&row.get::<_, String>(1)?).unwrap()),
        stream_kind: row.get::<_, String>(2)?.parse().unwrap(),
        stream_index: row.get(3)?,
        codec: row.get(4)?,
        width: row.get(5)?,
        height: row.get(6)?,
        channels: row.get(7)?,
        language: row.get(8)?,
        is_default: row.get::<_, i32>(9)? != 0,
        created_at: DateTime::parse_from_rfc3339(&row.get::<_, String>(10)?)
            .unwrap()
            .with_timezone(&Utc),
    })
}

/// List the probed encodings of a media link, in container stream order.
pub fn list_encodings(conn: &Connection, media_link_id: MediaLinkId) -> Result<Vec<StreamEncoding>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {ENCODING_COLUMNS} FROM stream_encodings
             WHERE media_link_id = :media_link_id
             ORDER BY stream_index ASC"
        ))
        .map_err(|e| Error::database(e.to_string()))?;

    let encodings = stmt
        .query_map(
            rusqlite::named_params! { ":media_link_id": media_link_id.to_string() },
            parse_encoding_row,
        )
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(encodings)
}

/// Check whether a media link has any persisted encodings.
pub fn has_encodings(conn: &Connection, media_link_id: MediaLinkId) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM stream_encodings WHERE media_link_id = :media_link_id",
            rusqlite::named_params! { ":media_link_id": media_link_id.to_string() },
            |row| row.get(0),
        )
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(count > 0)
}

/// Replace a link's encodings wholesale inside one transaction.
pub fn replace_encodings(
    conn: &mut Connection,
    media_link_id: MediaLinkId,
    encodings: &[StreamEncoding],
) -> Result<()> {
    let tx = conn
        .transaction()
        .map_err(|e| Error::database(e.to_string()))?;

    tx.execute(
        "DELETE FROM stream_encodings WHERE media_link_id = :media_link_id",
        rusqlite::named_params! { ":media_link_id": media_link_id.to_string() },
    )
    .map_err(|e| Error::database(e.to_string()))?;

    for enc in encodings {
        tx.execute(
            "INSERT INTO stream_encodings (id, media_link_id, stream_kind, stream_index,
                 codec, width, height, channels, language, is_default, created_at)
             VALUES (:id, :media_link_id, :stream_kind, :stream_index,
                 :codec, :width, :height, :channels, :language, :is_default, :created_at)",
            rusqlite::named_params! {
                ":id": enc.id.to_string(),
                ":media_link_id": media_link_id.to_string(),
                ":stream_kind": enc.stream_kind.to_string(),
                ":stream_index": enc.stream_index,
                ":codec": enc.codec,
                ":width": enc.width,
                ":height": enc.height,
                ":channels": enc.channels,
                ":language": enc.language,
                ":is_default": enc.is_default as i32,
                ":created_at": enc.created_at.to_rfc3339(),
            },
        )
        .map_err(|e| Error::database(e.to_string()))?;
    }

    tx.commit().map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}
