use std::collections::BTreeMap;
use std::sync::Arc;

use crate::backend::SearchBackend;
use crate::classifier::FailureKind;
use crate::config::SearchConfig;
use crate::data_models::{RawContentResult, SearchQuery, SearchResult};
use crate::error::{AdapterError, Result};
use crate::fetcher::ContentFetcher;
use crate::normalizer::normalize;

/// Query the backend, shape its hits, and optionally attach each page's
/// sanitized text as `raw_content`.
pub struct SearchService {
    backend: Arc<dyn SearchBackend>,
    fetcher: ContentFetcher,
    config: SearchConfig,
}

impl SearchService {
    pub fn new(
        backend: Arc<dyn SearchBackend>,
        fetcher: ContentFetcher,
        config: SearchConfig,
    ) -> SearchService {
        SearchService {
            backend,
            fetcher,
            config,
        }
    }

    /// Validates raw request fields. A missing `max_results` takes the
    /// configured default; anything above the cap is clamped to it.
    pub fn build_query(
        &self,
        query: &str,
        max_results: Option<i64>,
        include_raw_content: bool,
    ) -> Result<SearchQuery> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AdapterError::InvalidRequest(
                "Query cannot be empty".to_string(),
            ));
        }

        let max_results = match max_results {
            None => self.config.default_max_results,
            Some(n) if n <= 0 => {
                return Err(AdapterError::InvalidRequest(format!(
                    "max_results must be positive, got {n}"
                )));
            }
            Some(n) => usize::try_from(n)
                .unwrap_or(usize::MAX)
                .min(self.config.max_results_cap),
        };

        Ok(SearchQuery {
            query: query.to_string(),
            max_results,
            include_raw_content,
        })
    }

    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>> {
        tracing::info!(
            "searching {} for {:?} (max_results={}, raw_content={})",
            self.backend.name(),
            query.query,
            query.max_results,
            query.include_raw_content
        );

        let raw = self
            .backend
            .search(&query.query, query.max_results)
            .await
            .inspect_err(|e| tracing::error!("search backend failed: {e}"))?;
        let mut results = normalize(&raw, query.max_results)?;

        if query.include_raw_content && !results.is_empty() {
            let urls = results.iter().map(|r| r.url.clone()).collect();
            let fetched = self.fetcher.fetch_all(urls).await;
            log_scrape_summary(&fetched);
            for raw_content in fetched {
                if let Some(slot) = results.get_mut(raw_content.index) {
                    slot.raw_content = raw_content.outcome.ok();
                }
            }
        }

        Ok(results)
    }
}

fn log_scrape_summary(fetched: &[RawContentResult]) {
    let succeeded = fetched.iter().filter(|r| r.outcome.is_ok()).count();
    let mut failures: BTreeMap<FailureKind, usize> = BTreeMap::new();
    for kind in fetched.iter().filter_map(RawContentResult::failure) {
        *failures.entry(kind).or_default() += 1;
    }
    let breakdown = failures
        .iter()
        .map(|(kind, count)| format!("{kind}={count}"))
        .collect::<Vec<String>>()
        .join(", ");

    let slowest = fetched
        .iter()
        .map(|r| r.elapsed)
        .max()
        .unwrap_or_default()
        .as_secs_f64();

    if failures.is_empty() {
        tracing::info!(
            "raw content: {succeeded}/{} fetched, slowest {slowest:.2}s",
            fetched.len()
        );
    } else {
        tracing::info!(
            "raw content: {succeeded}/{} fetched, slowest {slowest:.2}s, failures: {breakdown}",
            fetched.len()
        );
    }
}
