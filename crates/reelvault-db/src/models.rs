//! Internal Rust models matching the database schema.
//!
//! This module provides strongly-typed structures that map to database tables.
//! All models use ID and enum types from reelvault-common.

use chrono::{DateTime, Utc};
use reelvault_common::{
    Descriptor, LinkType, MediaKind, MediaLinkId, MediaType, MetadataId, PlaybackStateId,
    StreamEncodingId, StreamKind, UserId,
};
use serde::{Deserialize, Serialize};

/// One filesystem entity known to the library: a registered root directory,
/// or a discovered video/audio/subtitle/image file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaLink {
    pub id: MediaLinkId,
    pub link_type: LinkType,
    pub descriptor: Descriptor,
    pub file_path: String,
    /// The root-directory link this file was discovered under, if any.
    pub parent_id: Option<MediaLinkId>,
    /// Logical content record this file resolves to, set by matching.
    pub metadata_id: Option<MetadataId>,
    /// Top-level show record when `metadata_id` points into a hierarchy.
    pub root_metadata_id: Option<MetadataId>,
    pub media_kind: MediaKind,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MediaLink {
    /// Build a new link with fresh id and timestamps.
    pub fn new(
        link_type: LinkType,
        descriptor: Descriptor,
        file_path: impl Into<String>,
        media_kind: MediaKind,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: MediaLinkId::new(),
            link_type,
            descriptor,
            file_path: file_path.into(),
            parent_id: None,
            metadata_id: None,
            root_metadata_id: None,
            media_kind,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A logical content record (movie, show, season, or episode) sourced from a
/// metadata provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Metadata {
    pub id: MetadataId,
    pub media_type: MediaType,
    pub tmdb_id: Option<i64>,
    pub title: String,
    pub overview: Option<String>,
    /// ISO-8601 date (YYYY-MM-DD) of release or first air.
    pub release_date: Option<String>,
    /// Runtime in seconds, when the provider reports one.
    pub runtime_secs: Option<f64>,
    /// Episode number for episodes, season number for seasons.
    pub index_number: Option<i32>,
    /// Season number for episodes.
    pub parent_index_number: Option<i32>,
    pub parent_id: Option<MetadataId>,
    /// Show id for seasons/episodes; `None` for top-level records.
    pub root_id: Option<MetadataId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Metadata {
    /// Build a new top-level record with fresh id and timestamps.
    pub fn new(media_type: MediaType, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: MetadataId::new(),
            media_type,
            tmdb_id: None,
            title: title.into(),
            overview: None,
            release_date: None,
            runtime_secs: None,
            index_number: None,
            parent_index_number: None,
            parent_id: None,
            root_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Per-user, per-link playback progress.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaybackState {
    pub id: PlaybackStateId,
    pub media_link_id: MediaLinkId,
    pub metadata_id: Option<MetadataId>,
    pub user_id: UserId,
    /// Playback position in seconds; never exceeds `runtime`.
    pub position: f64,
    /// Media runtime in seconds.
    pub runtime: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One probed elementary stream of a media link.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamEncoding {
    pub id: StreamEncodingId,
    pub media_link_id: MediaLinkId,
    pub stream_kind: StreamKind,
    /// Index of the stream within its container.
    pub stream_index: i32,
    pub codec: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub channels: Option<i32>,
    pub language: Option<String>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_link_new() {
        let link = MediaLink::new(
            LinkType::Local,
            Descriptor::Video,
            "/movies/Inception (2010).mkv",
            MediaKind::Movie,
        );
        assert_eq!(link.descriptor, Descriptor::Video);
        assert!(link.metadata_id.is_none());
        assert!(link.parent_id.is_none());
        assert_eq!(link.created_at, link.updated_at);
    }

    #[test]
    fn test_metadata_new_is_top_level() {
        let meta = Metadata::new(MediaType::Movie, "Inception");
        assert!(meta.root_id.is_none());
        assert!(meta.parent_id.is_none());
        assert!(meta.tmdb_id.is_none());
    }

    #[test]
    fn test_model_serde_roundtrip() {
        let link = MediaLink::new(
            LinkType::Download,
            Descriptor::Subtitle,
            "/tv/show.en.srt",
            MediaKind::Tv,
        );
        let json = serde_json::to_string(&link).unwrap();
        let back: MediaLink = serde_json::from_str(&json).unwrap();
        assert_eq!(link, back);
    }
}
