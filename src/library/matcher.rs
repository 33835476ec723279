//! Metadata matching for media links.
//!
//! Refresh parses the link's filename, searches the metadata providers, and
//! either links the top candidate automatically or surfaces the candidate
//! list. Auto-linking requires the top confidence to clear the configured
//! threshold and to lead the runner-up by the ambiguity margin.
//!
//! All mutation paths hold the link's advisory lock, so overlapping refreshes
//! of one link serialize and the (tmdb_id, media_type) dedup in the database
//! keeps concurrent matchers from creating duplicate metadata rows.

use reelvault_common::{Error, MediaLinkId, MediaType, Result, UserId};
use reelvault_db::models::{MediaLink, Metadata};
use reelvault_db::queries::{media_links, metadata};
use rusqlite::Connection;
use std::path::Path;
use tracing::{debug, info};

use super::LibraryManager;
use crate::metadata::{MetadataDetails, MetadataMatch, MetadataQuery, QueryResult};
use crate::processors::ParsedGuess;

/// Outcome of a metadata refresh on one link.
#[derive(Debug)]
pub enum MatchOutcome {
    /// The link now points at this metadata record.
    Matched(Metadata),
    /// Search produced candidates but none was safe to auto-link.
    Candidates(Vec<MetadataMatch>),
    /// Providers answered and found nothing.
    NoMatch,
}

impl LibraryManager {
    /// Parse, search, and match a link against the metadata providers.
    ///
    /// An already-matched link short-circuits unless `force` is set. Provider
    /// outages surface as errors, distinct from a clean no-result search.
    pub async fn refresh_metadata(
        &self,
        user_id: UserId,
        link_id: MediaLinkId,
        force: bool,
    ) -> Result<MatchOutcome> {
        let _guard = self.locks().lock(link_id).await;

        let link = self.load_link(link_id)?;

        if !force {
            if let Some(metadata_id) = link.metadata_id {
                let conn = self.conn()?;
                if let Some(existing) = metadata::get_metadata(&conn, metadata_id)? {
                    debug!(link_id = %link_id, "Link already matched, skipping refresh");
                    return Ok(MatchOutcome::Matched(existing));
                }
            }
        }

        let guess = self
            .processors()
            .parse(link.media_kind, Path::new(&link.file_path));
        debug!(
            link_id = %link_id,
            title = %guess.title,
            year = ?guess.year,
            confidence = guess.confidence,
            "Parsed filename"
        );

        let query = MetadataQuery::new(guess.title.clone(), guess.year, link.media_kind);
        match self.metadata_manager().search(&query).await {
            QueryResult::ProviderError(msg) => Err(Error::provider(msg)),
            QueryResult::NotFound => Ok(MatchOutcome::NoMatch),
            QueryResult::Success(matches) => {
                let top = &matches[0];
                let unambiguous = matches.get(1).map_or(true, |second| {
                    top.confidence - second.confidence >= self.policy().ambiguity_margin
                });

                if top.confidence >= self.policy().auto_match_threshold && unambiguous {
                    let top = top.clone();
                    let matched = self.apply_match(&link, &top, &guess).await?;
                    info!(
                        user_id = %user_id,
                        link_id = %link_id,
                        title = %matched.title,
                        confidence = top.confidence,
                        "Auto-matched link"
                    );
                    Ok(MatchOutcome::Matched(matched))
                } else {
                    debug!(
                        link_id = %link_id,
                        candidates = matches.len(),
                        top_confidence = top.confidence,
                        "Match ambiguous, surfacing candidates"
                    );
                    Ok(MatchOutcome::Candidates(matches))
                }
            }
        }
    }

    /// Explicitly match a link to a chosen search candidate, overriding any
    /// existing association.
    pub async fn match_media_link(
        &self,
        user_id: UserId,
        link_id: MediaLinkId,
        chosen: &MetadataMatch,
    ) -> Result<Metadata> {
        let _guard = self.locks().lock(link_id).await;

        let link = self.load_link(link_id)?;
        let guess = self
            .processors()
            .parse(link.media_kind, Path::new(&link.file_path));

        let matched = self.apply_match(&link, chosen, &guess).await?;
        info!(
            user_id = %user_id,
            link_id = %link_id,
            title = %matched.title,
            "Explicitly matched link"
        );
        Ok(matched)
    }

    /// Clear a link's metadata association without touching the record.
    pub async fn unmatch_media_link(&self, link_id: MediaLinkId) -> Result<()> {
        let _guard = self.locks().lock(link_id).await;
        self.load_link(link_id)?;

        let conn = self.conn()?;
        media_links::set_link_metadata(&conn, link_id, None, None)?;
        info!(link_id = %link_id, "Unmatched link");
        Ok(())
    }

    pub(crate) fn load_link(&self, link_id: MediaLinkId) -> Result<MediaLink> {
        let conn = self.conn()?;
        media_links::get_link(&conn, link_id)?
            .ok_or_else(|| Error::not_found(format!("media link {link_id}")))
    }

    /// Resolve full details for the chosen match and persist the association.
    ///
    /// Caller must hold the link's advisory lock.
    async fn apply_match(
        &self,
        link: &MediaLink,
        chosen: &MetadataMatch,
        guess: &ParsedGuess,
    ) -> Result<Metadata> {
        match chosen.media_type {
            MediaType::Movie => self.apply_movie_match(link, chosen).await,
            MediaType::TvShow => self.apply_tv_match(link, chosen, guess).await,
            other => Err(Error::invalid_input(format!(
                "cannot match a link directly to a {other} record"
            ))),
        }
    }

    async fn apply_movie_match(
        &self,
        link: &MediaLink,
        chosen: &MetadataMatch,
    ) -> Result<Metadata> {
        let details = self
            .metadata_manager()
            .details(&chosen.provider, &chosen.remote_id, MediaType::Movie)
            .await?;
        let record = metadata_from_details(&details)?;

        let conn = self.conn()?;
        let persisted = upsert_metadata(&conn, &record)?;
        media_links::set_link_metadata(&conn, link.id, Some(persisted.id), None)?;
        Ok(persisted)
    }

    async fn apply_tv_match(
        &self,
        link: &MediaLink,
        chosen: &MetadataMatch,
        guess: &ParsedGuess,
    ) -> Result<Metadata> {
        let show_details = self
            .metadata_manager()
            .details(&chosen.provider, &chosen.remote_id, MediaType::TvShow)
            .await?;

        let episode_numbers = match (guess.season, guess.episodes.first()) {
            (Some(season), Some(&episode)) => Some((season, episode)),
            _ => None,
        };

        // Fetch remote data before touching the database.
        let episode_details = match episode_numbers {
            Some((season, episode)) => Some(
                self.metadata_manager()
                    .episode_details(&chosen.provider, &chosen.remote_id, season, episode)
                    .await?,
            ),
            None => None,
        };

        let conn = self.conn()?;
        let show_record = metadata_from_details(&show_details)?;
        let show = upsert_metadata(&conn, &show_record)?;

        let Some(((season_number, _), details)) = episode_numbers.zip(episode_details) else {
            // No episode numbers in the filename: the show itself is the best
            // association we can make.
            media_links::set_link_metadata(&conn, link.id, Some(show.id), Some(show.id))?;
            return Ok(show);
        };

        let season = find_or_create_season(&conn, &show, i32::from(season_number))?;

        let mut episode_record = metadata_from_details(&details)?;
        episode_record.parent_id = Some(season.id);
        episode_record.root_id = Some(show.id);
        let episode = upsert_metadata(&conn, &episode_record)?;

        media_links::set_link_metadata(&conn, link.id, Some(episode.id), Some(show.id))?;
        Ok(episode)
    }
}

/// Build a database record from provider details.
fn metadata_from_details(details: &MetadataDetails) -> Result<Metadata> {
    let tmdb_id: i64 = details
        .remote_id
        .parse()
        .map_err(|_| Error::invalid_input(format!("bad remote id: {}", details.remote_id)))?;

    let mut record = Metadata::new(details.media_type, details.title.clone());
    record.tmdb_id = Some(tmdb_id);
    record.overview = details.overview.clone();
    record.release_date = details.release_date.clone();
    record.runtime_secs = details.runtime_secs;
    record.index_number = details.index_number;
    record.parent_index_number = details.parent_index_number;
    Ok(record)
}

/// Insert the record, or refresh the descriptive fields of the existing row
/// with the same (tmdb_id, media_type).
fn upsert_metadata(conn: &Connection, record: &Metadata) -> Result<Metadata> {
    let persisted = metadata::find_or_insert_metadata(conn, record)?;
    if persisted.id == record.id {
        return Ok(persisted);
    }

    let mut refreshed = persisted;
    refreshed.title = record.title.clone();
    refreshed.overview = record.overview.clone();
    refreshed.release_date = record.release_date.clone();
    refreshed.runtime_secs = record.runtime_secs;
    metadata::update_metadata(conn, &refreshed)?;
    Ok(refreshed)
}

/// Find a show's season record by number, creating it if absent.
///
/// Seasons have no remote id of their own here, so dedup is by
/// (parent, index_number) under the link lock.
fn find_or_create_season(conn: &Connection, show: &Metadata, number: i32) -> Result<Metadata> {
    if let Some(existing) = metadata::list_children(conn, show.id)?
        .into_iter()
        .find(|child| child.media_type == MediaType::TvSeason && child.index_number == Some(number))
    {
        return Ok(existing);
    }

    let mut season = Metadata::new(MediaType::TvSeason, format!("Season {number}"));
    season.index_number = Some(number);
    season.parent_id = Some(show.id);
    season.root_id = Some(show.id);
    metadata::insert_metadata(conn, &season)?;
    Ok(season)
}
