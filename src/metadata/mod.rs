//! Metadata lookup: provider trait, TMDB backend, and the fan-out manager.

mod manager;
pub mod provider;
mod tmdb;

pub use manager::{MetadataManager, QueryResult, SearchPager};
pub use provider::{MetadataDetails, MetadataMatch, MetadataProvider, MetadataQuery, SearchPage};
pub use tmdb::TmdbProvider;
