//! Trait definition and types for metadata providers.
//!
//! This module defines the [`MetadataProvider`] trait that metadata backends
//! implement, along with the shared data types returned by provider queries.

use async_trait::async_trait;
use reelvault_common::{MediaKind, MediaType};
use serde::{Deserialize, Serialize};

/// A search request against a metadata provider.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataQuery {
    /// Title to search for, as parsed from the filename.
    pub title: String,
    /// Release year constraint, if the filename carried one.
    pub year: Option<u16>,
    /// Whether movie or TV results are wanted.
    pub media_kind: MediaKind,
    /// One-based result page.
    pub page: u32,
}

impl MetadataQuery {
    pub fn new(title: impl Into<String>, year: Option<u16>, media_kind: MediaKind) -> Self {
        Self {
            title: title.into(),
            year,
            media_kind,
            page: 1,
        }
    }

    /// Same query pointed at a different result page.
    pub fn with_page(&self, page: u32) -> Self {
        Self {
            page,
            ..self.clone()
        }
    }
}

/// A single candidate returned from a metadata search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataMatch {
    /// Name of the provider that returned this result (e.g. "tmdb").
    pub provider: String,
    /// Provider-specific identifier for this item.
    pub remote_id: String,
    /// Display title of the item.
    pub title: String,
    /// Release or premiere year, if known.
    pub year: Option<u16>,
    /// Short synopsis text.
    pub overview: Option<String>,
    /// Whether this is a movie or a TV show.
    pub media_type: MediaType,
    /// How confident the provider is that this result matches (0.0 - 1.0).
    pub confidence: f64,
}

/// One page of search results.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub matches: Vec<MetadataMatch>,
    /// Whether the provider has further pages for this query.
    pub has_more: bool,
}

/// Full metadata for one item, fetched after a match is chosen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataDetails {
    pub remote_id: String,
    pub media_type: MediaType,
    pub title: String,
    pub overview: Option<String>,
    /// ISO-8601 date string (YYYY-MM-DD).
    pub release_date: Option<String>,
    /// Runtime in seconds.
    pub runtime_secs: Option<f64>,
    /// Episode number within its season, for TV_EPISODE details.
    pub index_number: Option<i32>,
    /// Season number, for TV_SEASON and TV_EPISODE details.
    pub parent_index_number: Option<i32>,
}

/// Async trait that all metadata providers implement.
///
/// Providers are expected to be wrapped in an `Arc` so they can be shared
/// across tasks.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Short, lowercase identifier for this provider (e.g. `"tmdb"`).
    fn name(&self) -> &'static str;

    /// Returns `true` when the provider has been configured with valid
    /// credentials and is ready to serve requests.
    fn is_available(&self) -> bool;

    /// Search for items matching the query.
    ///
    /// Matches are sorted by descending `confidence`.
    async fn search(&self, query: &MetadataQuery) -> anyhow::Result<SearchPage>;

    /// Fetch full metadata for a movie or TV show identified by `remote_id`.
    async fn details(&self, remote_id: &str, media_type: MediaType)
        -> anyhow::Result<MetadataDetails>;

    /// Fetch metadata for one episode of a show, for hierarchy fill.
    async fn episode_details(
        &self,
        show_remote_id: &str,
        season: u16,
        episode: u16,
    ) -> anyhow::Result<MetadataDetails>;
}
