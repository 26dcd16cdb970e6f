use std::sync::Arc;
use std::time::Duration;

use crate::classifier::PageFailure;
use crate::config::ScraperConfig;
use crate::data_models::{ExtractDepth, RawContentResult};
use crate::document::{BodyKind, pdf_to_text, unsupported};
use crate::pool::run_indexed;
use crate::renderer::{PageRenderer, RenderOptions};
use crate::sanitizer::ContentSanitizer;
use crate::truncator::truncate;

/// Fetches raw page content for search results: one task per URL under a
/// bounded pool, each page reduced to plain text and truncated.
pub struct ContentFetcher {
    renderer: Arc<dyn PageRenderer>,
    sanitizer: Arc<ContentSanitizer>,
    timeout: Duration,
    max_content_length: usize,
    pool_size: usize,
}

impl ContentFetcher {
    pub fn new(
        renderer: Arc<dyn PageRenderer>,
        sanitizer: Arc<ContentSanitizer>,
        config: &ScraperConfig,
    ) -> ContentFetcher {
        ContentFetcher {
            renderer,
            sanitizer,
            timeout: config.timeout,
            max_content_length: config.max_content_length,
            pool_size: config.pool_size,
        }
    }

    /// Returns one entry per input URL, in input order.
    pub async fn fetch_all(&self, urls: Vec<String>) -> Vec<RawContentResult> {
        let options = RenderOptions {
            depth: ExtractDepth::Basic,
            timeout: self.timeout,
        };
        let renderer = self.renderer.clone();
        let sanitizer = self.sanitizer.clone();
        let max_len = self.max_content_length;

        let outcomes = run_indexed(urls.clone(), self.pool_size, self.timeout, move |url| {
            let renderer = renderer.clone();
            let sanitizer = sanitizer.clone();
            async move {
                fetch_one(renderer.as_ref(), &sanitizer, &url, &options, max_len).await
            }
        })
        .await;

        outcomes
            .into_iter()
            .zip(urls)
            .map(|(outcome, url)| {
                let secs = outcome.elapsed.as_secs_f64();
                let (status, outcome_result) = match outcome.result {
                    Ok((status, text)) => {
                        let chars = text.chars().count();
                        tracing::debug!("fetched {url} in {secs:.2}s ({chars} chars)");
                        (Some(status), Ok(text))
                    }
                    Err(failure) => {
                        let status = match failure {
                            PageFailure::HttpStatus(code) => Some(code),
                            _ => None,
                        };
                        let failed = failure.into_failed(&url);
                        tracing::warn!(
                            "raw content fetch failed for {url} after {secs:.2}s: {} ({})",
                            failed.error,
                            failed.detail
                        );
                        (status, Err(failed))
                    }
                };
                RawContentResult {
                    index: outcome.index,
                    url,
                    status,
                    outcome: outcome_result,
                    elapsed: outcome.elapsed,
                }
            })
            .collect()
    }
}

async fn fetch_one(
    renderer: &dyn PageRenderer,
    sanitizer: &ContentSanitizer,
    url: &str,
    options: &RenderOptions,
    max_len: usize,
) -> Result<(u16, String), PageFailure> {
    let page = renderer
        .render(url, options)
        .await
        .map_err(PageFailure::Render)?;
    if !page.is_success() {
        return Err(PageFailure::HttpStatus(page.status));
    }
    let text = match BodyKind::detect(page.content_type.as_deref(), &page.body) {
        BodyKind::Html => sanitizer.sanitize(&page.body),
        BodyKind::Text => sanitizer.sanitize_plain(&page.body),
        BodyKind::Pdf => sanitizer.sanitize_plain(pdf_to_text(&page).await?.as_bytes()),
        BodyKind::Binary => return Err(unsupported(&page)),
    }
    .ok_or(PageFailure::EmptyContent)?;
    tracing::trace!("{url}: {} chars before truncation", text.chars().count());
    Ok((page.status, truncate(&text, max_len)))
}
