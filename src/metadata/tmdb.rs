//! TMDB (The Movie Database) metadata provider.
//!
//! Implements [`MetadataProvider`] by querying the TMDB v3 REST API.
//!
//! Features:
//! - Token-bucket rate limiting via [`governor`].
//! - Automatic retry on HTTP 429 with `Retry-After` header support (max 3 retries).
//! - 30-second request timeout.
//! - Confidence scoring based on title similarity and year proximity.

use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reelvault_common::{MediaKind, MediaType};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};

use super::provider::{
    MetadataDetails, MetadataMatch, MetadataProvider, MetadataQuery, SearchPage,
};

const TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RETRIES: u32 = 3;

// ---------------------------------------------------------------------------
// TMDB API response types (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TmdbSearchResponse<T> {
    page: u32,
    total_pages: u32,
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct TmdbMovieSearchResult {
    id: u64,
    title: Option<String>,
    release_date: Option<String>,
    overview: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmdbTvSearchResult {
    id: u64,
    name: Option<String>,
    first_air_date: Option<String>,
    overview: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmdbMovieDetail {
    id: u64,
    title: Option<String>,
    overview: Option<String>,
    release_date: Option<String>,
    runtime: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct TmdbTvDetail {
    id: u64,
    name: Option<String>,
    overview: Option<String>,
    first_air_date: Option<String>,
    episode_run_time: Option<Vec<u32>>,
}

#[derive(Debug, Deserialize)]
struct TmdbEpisodeDetail {
    id: u64,
    name: Option<String>,
    overview: Option<String>,
    air_date: Option<String>,
    runtime: Option<u32>,
    season_number: Option<i32>,
    episode_number: Option<i32>,
}

// ---------------------------------------------------------------------------
// Provider implementation
// ---------------------------------------------------------------------------

/// TMDB metadata provider.
///
/// Wraps the TMDB v3 REST API with built-in rate limiting, retry logic, and
/// confidence-scored search results.
pub struct TmdbProvider {
    client: reqwest::Client,
    api_key: String,
    rate_limiter: governor::RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl TmdbProvider {
    /// Create a new TMDB provider.
    ///
    /// `requests_per_second` bounds the API rate; TMDB allows around 50 req/s
    /// but 4 is plenty for a scan.
    pub fn new(api_key: String, requests_per_second: u32) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build reqwest client");

        let rate = NonZeroU32::new(requests_per_second.max(1)).expect("nonzero rate");
        let rate_limiter = RateLimiter::direct(Quota::per_second(rate));

        Self {
            client,
            api_key,
            rate_limiter,
        }
    }

    /// Execute a GET request with rate limiting and 429-retry logic.
    async fn get(&self, url: &str) -> anyhow::Result<reqwest::Response> {
        let mut retries = 0u32;
        loop {
            self.rate_limiter.until_ready().await;

            let resp = self
                .client
                .get(url)
                .send()
                .await
                .with_context(|| format!("TMDB request failed: {url}"))?;

            if resp.status() == StatusCode::TOO_MANY_REQUESTS && retries < MAX_RETRIES {
                retries += 1;
                let wait = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(1);
                warn!(
                    retry = retries,
                    wait_secs = wait,
                    "TMDB returned 429, backing off"
                );
                tokio::time::sleep(Duration::from_secs(wait)).await;
                continue;
            }

            let resp = resp
                .error_for_status()
                .with_context(|| format!("TMDB request returned error: {url}"))?;

            return Ok(resp);
        }
    }

    /// Build a full API URL with the API key query parameter.
    fn url(&self, path: &str, extra_params: &[(&str, &str)]) -> String {
        let mut url = format!("{TMDB_BASE_URL}{path}?api_key={}", self.api_key);
        for (key, value) in extra_params {
            url.push('&');
            url.push_str(key);
            url.push('=');
            url.push_str(&urlencoded(value));
        }
        url
    }

    /// Compute confidence score for a search result based on title similarity
    /// and year proximity.
    fn confidence(
        query_title: &str,
        result_title: &str,
        query_year: Option<u16>,
        result_year: Option<u16>,
    ) -> f64 {
        let base = if query_title == result_title {
            0.5
        } else if query_title.eq_ignore_ascii_case(result_title) {
            0.4
        } else if result_title
            .to_ascii_lowercase()
            .contains(&query_title.to_ascii_lowercase())
        {
            0.2
        } else {
            0.1
        };

        let year_bonus = match (query_year, result_year) {
            (Some(q), Some(r)) if q == r => 0.3,
            (Some(q), Some(r)) if q.abs_diff(r) <= 1 => 0.15,
            _ => 0.0,
        };

        base + year_bonus
    }

    async fn search_movie(&self, query: &MetadataQuery) -> anyhow::Result<SearchPage> {
        let page_str = query.page.to_string();
        let mut params = vec![("query", query.title.as_str()), ("page", page_str.as_str())];
        let year_str = query.year.map(|y| y.to_string());
        if let Some(ref y) = year_str {
            params.push(("year", y.as_str()));
        }

        let url = self.url("/search/movie", &params);
        debug!(url = %url, "TMDB search movie");

        let body: TmdbSearchResponse<TmdbMovieSearchResult> = self
            .get(&url)
            .await?
            .json()
            .await
            .context("failed to parse TMDB movie search response")?;

        let has_more = body.page < body.total_pages;
        let matches = body
            .results
            .into_iter()
            .map(|r| {
                let result_title = r.title.unwrap_or_default();
                let result_year = parse_year(&r.release_date);
                let confidence =
                    Self::confidence(&query.title, &result_title, query.year, result_year);
                MetadataMatch {
                    provider: "tmdb".to_string(),
                    remote_id: r.id.to_string(),
                    title: result_title,
                    year: result_year,
                    overview: r.overview,
                    media_type: MediaType::Movie,
                    confidence,
                }
            })
            .collect();

        Ok(sorted_page(matches, has_more))
    }

    async fn search_tv(&self, query: &MetadataQuery) -> anyhow::Result<SearchPage> {
        let page_str = query.page.to_string();
        let params = [("query", query.title.as_str()), ("page", page_str.as_str())];

        let url = self.url("/search/tv", &params);
        debug!(url = %url, "TMDB search TV");

        let body: TmdbSearchResponse<TmdbTvSearchResult> = self
            .get(&url)
            .await?
            .json()
            .await
            .context("failed to parse TMDB TV search response")?;

        let has_more = body.page < body.total_pages;
        let matches = body
            .results
            .into_iter()
            .map(|r| {
                let result_title = r.name.unwrap_or_default();
                let result_year = parse_year(&r.first_air_date);
                let confidence =
                    Self::confidence(&query.title, &result_title, query.year, result_year);
                MetadataMatch {
                    provider: "tmdb".to_string(),
                    remote_id: r.id.to_string(),
                    title: result_title,
                    year: result_year,
                    overview: r.overview,
                    media_type: MediaType::TvShow,
                    confidence,
                }
            })
            .collect();

        Ok(sorted_page(matches, has_more))
    }
}

fn sorted_page(mut matches: Vec<MetadataMatch>, has_more: bool) -> SearchPage {
    matches.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    SearchPage { matches, has_more }
}

/// Minimal percent-encoding for query parameter values.
fn urlencoded(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char);
            }
            b' ' => out.push('+'),
            _ => {
                out.push('%');
                out.push(char::from(HEX[(b >> 4) as usize]));
                out.push(char::from(HEX[(b & 0x0f) as usize]));
            }
        }
    }
    out
}

const HEX: [u8; 16] = *b"0123456789ABCDEF";

/// Extract a four-digit year from a date string like `"2023-04-15"`.
fn parse_year(date: &Option<String>) -> Option<u16> {
    date.as_deref()
        .and_then(|d| d.get(..4))
        .and_then(|y| y.parse::<u16>().ok())
}

fn minutes_to_secs(minutes: Option<u32>) -> Option<f64> {
    minutes.map(|m| f64::from(m) * 60.0)
}

#[async_trait]
impl MetadataProvider for TmdbProvider {
    fn name(&self) -> &'static str {
        "tmdb"
    }

    fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn search(&self, query: &MetadataQuery) -> anyhow::Result<SearchPage> {
        match query.media_kind {
            MediaKind::Movie => self.search_movie(query).await,
            MediaKind::Tv => self.search_tv(query).await,
        }
    }

    async fn details(
        &self,
        remote_id: &str,
        media_type: MediaType,
    ) -> anyhow::Result<MetadataDetails> {
        match media_type {
            MediaType::Movie => {
                let url = self.url(&format!("/movie/{remote_id}"), &[]);
                debug!(url = %url, "TMDB get movie details");

                let detail: TmdbMovieDetail = self
                    .get(&url)
                    .await?
                    .json()
                    .await
                    .context("failed to parse TMDB movie detail response")?;

                Ok(MetadataDetails {
                    remote_id: detail.id.to_string(),
                    media_type: MediaType::Movie,
                    title: detail.title.unwrap_or_default(),
                    overview: detail.overview,
                    release_date: detail.release_date,
                    runtime_secs: minutes_to_secs(detail.runtime),
                    index_number: None,
                    parent_index_number: None,
                })
            }
            MediaType::TvShow => {
                let url = self.url(&format!("/tv/{remote_id}"), &[]);
                debug!(url = %url, "TMDB get TV details");

                let detail: TmdbTvDetail = self
                    .get(&url)
                    .await?
                    .json()
                    .await
                    .context("failed to parse TMDB TV detail response")?;

                let runtime = detail
                    .episode_run_time
                    .as_ref()
                    .and_then(|v| v.first().copied());

                Ok(MetadataDetails {
                    remote_id: detail.id.to_string(),
                    media_type: MediaType::TvShow,
                    title: detail.name.unwrap_or_default(),
                    overview: detail.overview,
                    release_date: detail.first_air_date,
                    runtime_secs: minutes_to_secs(runtime),
                    index_number: None,
                    parent_index_number: None,
                })
            }
            MediaType::TvSeason | MediaType::TvEpisode => {
                anyhow::bail!("season and episode details require a show id and numbers")
            }
        }
    }

    async fn episode_details(
        &self,
        show_remote_id: &str,
        season: u16,
        episode: u16,
    ) -> anyhow::Result<MetadataDetails> {
        let url = self.url(
            &format!("/tv/{show_remote_id}/season/{season}/episode/{episode}"),
            &[],
        );
        debug!(url = %url, "TMDB get episode details");

        let detail: TmdbEpisodeDetail = self
            .get(&url)
            .await?
            .json()
            .await
            .context("failed to parse TMDB episode detail response")?;

        Ok(MetadataDetails {
            remote_id: detail.id.to_string(),
            media_type: MediaType::TvEpisode,
            title: detail.name.unwrap_or_default(),
            overview: detail.overview,
            release_date: detail.air_date,
            runtime_secs: minutes_to_secs(detail.runtime),
            index_number: detail.episode_number,
            parent_index_number: detail.season_number,
        })
    }
}
