//! Metadata manager: fan-out search across providers.
//!
//! The [`MetadataManager`] aggregates metadata providers and exposes a
//! unified search interface. Every *available* provider is queried
//! concurrently with a bounded timeout; results are merged, deduplicated on
//! (lowercased title, year) keeping the highest-confidence hit, and sorted by
//! descending confidence.
//!
//! Outcome semantics: a query where every provider fails is a
//! [`QueryResult::ProviderError`], not `NotFound`. `NotFound` means at least
//! one provider answered and none had results.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use super::provider::{
    MetadataDetails, MetadataMatch, MetadataProvider, MetadataQuery, SearchPage,
};
use reelvault_common::{Error, MediaType, Result};

const PROVIDER_TIMEOUT: Duration = Duration::from_secs(20);

/// Outcome of a metadata search across all providers.
#[derive(Debug, Clone)]
pub enum QueryResult {
    /// At least one provider returned candidates.
    Success(Vec<MetadataMatch>),
    /// Providers answered but none had results.
    NotFound,
    /// Every queried provider failed.
    ProviderError(String),
}

/// Aggregates metadata providers behind one search interface.
pub struct MetadataManager {
    providers: Vec<Arc<dyn MetadataProvider>>,
    provider_timeout: Duration,
}

impl MetadataManager {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            provider_timeout: PROVIDER_TIMEOUT,
        }
    }

    /// Register a new metadata provider. Providers are queried in
    /// registration order.
    pub fn register(&mut self, provider: Arc<dyn MetadataProvider>) {
        self.providers.push(provider);
    }

    /// Look up a provider by its [`MetadataProvider::name`].
    pub fn get(&self, name: &str) -> Option<&dyn MetadataProvider> {
        self.providers
            .iter()
            .find(|p| p.name() == name)
            .map(|p| p.as_ref())
    }

    fn available(&self) -> Vec<Arc<dyn MetadataProvider>> {
        self.providers
            .iter()
            .filter(|p| p.is_available())
            .cloned()
            .collect()
    }

    /// Search all available providers for the query's first page.
    pub async fn search(&self, query: &MetadataQuery) -> QueryResult {
        match self.search_page(query).await {
            Ok(page) if page.matches.is_empty() => QueryResult::NotFound,
            Ok(page) => QueryResult::Success(page.matches),
            Err(e) => QueryResult::ProviderError(e.to_string()),
        }
    }

    /// Fetch one merged result page across providers.
    ///
    /// Errors only when no provider produced an answer.
    pub(crate) async fn search_page(&self, query: &MetadataQuery) -> Result<SearchPage> {
        let available = self.available();
        if available.is_empty() {
            return Err(Error::provider("no metadata providers available"));
        }

        let futures = available.iter().map(|provider| {
            let provider = provider.clone();
            let query = query.clone();
            let timeout = self.provider_timeout;
            async move {
                let name = provider.name();
                match tokio::time::timeout(timeout, provider.search(&query)).await {
                    Ok(Ok(page)) => Ok(page),
                    Ok(Err(e)) => {
                        warn!(provider = name, error = %e, "provider search failed");
                        Err(format!("{name}: {e}"))
                    }
                    Err(_) => {
                        warn!(provider = name, "provider search timed out");
                        Err(format!("{name}: timed out"))
                    }
                }
            }
        });

        let outcomes = futures::future::join_all(futures).await;

        let mut matches = Vec::new();
        let mut has_more = false;
        let mut errors = Vec::new();
        let mut any_ok = false;

        for outcome in outcomes {
            match outcome {
                Ok(page) => {
                    any_ok = true;
                    has_more |= page.has_more;
                    matches.extend(page.matches);
                }
                Err(msg) => errors.push(msg),
            }
        }

        if !any_ok {
            return Err(Error::provider(errors.join("; ")));
        }

        Ok(SearchPage {
            matches: merge_and_rank(matches),
            has_more,
        })
    }

    /// Fetch full details for a chosen match from the provider that
    /// produced it.
    pub async fn details(
        &self,
        provider_name: &str,
        remote_id: &str,
        media_type: MediaType,
    ) -> Result<MetadataDetails> {
        let provider = self
            .get(provider_name)
            .ok_or_else(|| Error::provider(format!("unknown provider: {provider_name}")))?;

        provider
            .details(remote_id, media_type)
            .await
            .map_err(|e| Error::provider(e.to_string()))
    }

    /// Fetch details for one episode of a show.
    pub async fn episode_details(
        &self,
        provider_name: &str,
        show_remote_id: &str,
        season: u16,
        episode: u16,
    ) -> Result<MetadataDetails> {
        let provider = self
            .get(provider_name)
            .ok_or_else(|| Error::provider(format!("unknown provider: {provider_name}")))?;

        provider
            .episode_details(show_remote_id, season, episode)
            .await
            .map_err(|e| Error::provider(e.to_string()))
    }

    /// Begin a pull-based paged search.
    pub fn paged_search(self: &Arc<Self>, query: MetadataQuery) -> SearchPager {
        SearchPager::new(self.clone(), query)
    }
}

impl Default for MetadataManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Deduplicate on (lowercased title, year) keeping max confidence, then sort
/// by descending confidence.
fn merge_and_rank(all: Vec<MetadataMatch>) -> Vec<MetadataMatch> {
    let mut seen = std::collections::HashMap::<(String, Option<u16>), usize>::new();
    let mut deduped: Vec<MetadataMatch> = Vec::new();

    for result in all {
        let key = (result.title.to_lowercase(), result.year);
        if let Some(&idx) = seen.get(&key) {
            if result.confidence > deduped[idx].confidence {
                deduped[idx] = result;
            }
        } else {
            seen.insert(key, deduped.len());
            deduped.push(result);
        }
    }

    deduped.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    deduped
}

/// Pull-based pagination over a metadata search.
///
/// Each [`SearchPager::next_page`] call fetches and merges the next page from
/// all providers. The caller drives paging; nothing is fetched ahead of time.
pub struct SearchPager {
    manager: Arc<MetadataManager>,
    query: MetadataQuery,
    next_page: u32,
    exhausted: bool,
}

impl SearchPager {
    fn new(manager: Arc<MetadataManager>, query: MetadataQuery) -> Self {
        Self {
            manager,
            query,
            next_page: 1,
            exhausted: false,
        }
    }

    /// Fetch the next page of matches.
    ///
    /// Returns the page's matches and whether more pages remain. After
    /// exhaustion every further call returns an empty page.
    pub async fn next_page(&mut self) -> Result<(Vec<MetadataMatch>, bool)> {
        if self.exhausted {
            return Ok((Vec::new(), false));
        }

        let query = self.query.with_page(self.next_page);
        let page = self.manager.search_page(&query).await?;

        self.next_page += 1;
        if !page.has_more {
            self.exhausted = true;
        }

        Ok((page.matches, page.has_more))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use reelvault_common::MediaKind;

    /// A minimal stub provider used for testing.
    struct StubProvider {
        provider_name: &'static str,
        available: bool,
        pages: Vec<Vec<MetadataMatch>>,
        fail: bool,
    }

    impl StubProvider {
        fn with_matches(name: &'static str, matches: Vec<MetadataMatch>) -> Self {
            Self {
                provider_name: name,
                available: true,
                pages: vec![matches],
                fail: false,
            }
        }

        fn failing(name: &'static str) -> Self {
            Self {
                provider_name: name,
                available: true,
                pages: Vec::new(),
                fail: true,
            }
        }
    }

    #[async_trait]
    impl MetadataProvider for StubProvider {
        fn name(&self) -> &'static str {
            self.provider_name
        }

        fn is_available(&self) -> bool {
            self.available
        }

        async fn search(&self, query: &MetadataQuery) -> anyhow::Result<SearchPage> {
            if self.fail {
                anyhow::bail!("stub provider down");
            }
            let idx = (query.page as usize).saturating_sub(1);
            Ok(SearchPage {
                matches: self.pages.get(idx).cloned().unwrap_or_default(),
                has_more: idx + 1 < self.pages.len(),
            })
        }

        async fn details(
            &self,
            _remote_id: &str,
            _media_type: MediaType,
        ) -> anyhow::Result<MetadataDetails> {
            anyhow::bail!("not implemented")
        }

        async fn episode_details(
            &self,
            _show_remote_id: &str,
            _season: u16,
            _episode: u16,
        ) -> anyhow::Result<MetadataDetails> {
            anyhow::bail!("not implemented")
        }
    }

    fn make_match(title: &str, year: Option<u16>, confidence: f64, provider: &str) -> MetadataMatch {
        MetadataMatch {
            provider: provider.to_string(),
            remote_id: format!("{provider}-{title}"),
            title: title.to_string(),
            year,
            overview: None,
            media_type: MediaType::Movie,
            confidence,
        }
    }

    fn query(title: &str) -> MetadataQuery {
        MetadataQuery::new(title, None, MediaKind::Movie)
    }

    #[tokio::test]
    async fn search_merges_providers_sorted_by_confidence() {
        let mut manager = MetadataManager::new();
        manager.register(Arc::new(StubProvider::with_matches(
            "provider_a",
            vec![make_match("The Martian", Some(2015), 0.90, "provider_a")],
        )));
        manager.register(Arc::new(StubProvider::with_matches(
            "provider_b",
            vec![make_match("Interstellar", Some(2014), 0.95, "provider_b")],
        )));

        match manager.search(&query("test")).await {
            QueryResult::Success(matches) => {
                assert_eq!(matches.len(), 2);
                assert_eq!(matches[0].title, "Interstellar");
                assert_eq!(matches[1].title, "The Martian");
            }
            other => panic!("expected Success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn search_deduplicates_by_title_and_year() {
        let mut manager = MetadataManager::new();
        manager.register(Arc::new(StubProvider::with_matches(
            "low",
            vec![make_match("interstellar", Some(2014), 0.80, "low")],
        )));
        manager.register(Arc::new(StubProvider::with_matches(
            "high",
            vec![make_match("Interstellar", Some(2014), 0.99, "high")],
        )));

        match manager.search(&query("Interstellar")).await {
            QueryResult::Success(matches) => {
                assert_eq!(matches.len(), 1);
                assert_eq!(matches[0].provider, "high");
            }
            other => panic!("expected Success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn one_failing_provider_does_not_kill_the_query() {
        let mut manager = MetadataManager::new();
        manager.register(Arc::new(StubProvider::failing("down")));
        manager.register(Arc::new(StubProvider::with_matches(
            "up",
            vec![make_match("Inception", Some(2010), 0.9, "up")],
        )));

        match manager.search(&query("Inception")).await {
            QueryResult::Success(matches) => {
                assert_eq!(matches.len(), 1);
                assert_eq!(matches[0].provider, "up");
            }
            other => panic!("expected Success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn all_providers_failing_is_provider_error_not_not_found() {
        let mut manager = MetadataManager::new();
        manager.register(Arc::new(StubProvider::failing("down_a")));
        manager.register(Arc::new(StubProvider::failing("down_b")));

        match manager.search(&query("anything")).await {
            QueryResult::ProviderError(msg) => {
                assert!(msg.contains("down_a"));
                assert!(msg.contains("down_b"));
            }
            other => panic!("expected ProviderError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_results_are_not_found() {
        let mut manager = MetadataManager::new();
        manager.register(Arc::new(StubProvider::with_matches("empty", Vec::new())));

        assert!(matches!(
            manager.search(&query("obscure")).await,
            QueryResult::NotFound
        ));
    }

    #[tokio::test]
    async fn no_available_providers_is_provider_error() {
        let mut manager = MetadataManager::new();
        manager.register(Arc::new(StubProvider {
            provider_name: "offline",
            available: false,
            pages: Vec::new(),
            fail: false,
        }));

        assert!(matches!(
            manager.search(&query("x")).await,
            QueryResult::ProviderError(_)
        ));
    }

    #[tokio::test]
    async fn pager_pulls_pages_until_exhausted() {
        let mut manager = MetadataManager::new();
        manager.register(Arc::new(StubProvider {
            provider_name: "paged",
            available: true,
            pages: vec![
                vec![make_match("Dune", Some(2021), 0.9, "paged")],
                vec![make_match("Dune Part Two", Some(2024), 0.7, "paged")],
            ],
            fail: false,
        }));
        let manager = Arc::new(manager);

        let mut pager = manager.paged_search(query("Dune"));

        let (first, more) = pager.next_page().await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].title, "Dune");
        assert!(more);

        let (second, more) = pager.next_page().await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].title, "Dune Part Two");
        assert!(!more);

        // Exhausted pagers keep returning empty pages.
        let (third, more) = pager.next_page().await.unwrap();
        assert!(third.is_empty());
        assert!(!more);
    }
}
