use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};

use crate::classifier::PageFailure;
use crate::config::ExtractConfig;
use crate::data_models::{ExtractDepth, ExtractRequest, ExtractResult, FailedResult, OutputFormat};
use crate::document::{BodyKind, is_pdf_url, pdf_title_from_url, pdf_to_text, unsupported};
use crate::error::{AdapterError, Result};
use crate::page_meta::PageMeta;
use crate::pool::run_indexed;
use crate::renderer::{PageRenderer, RenderOptions, RenderedPage};
use crate::sanitizer::{ContentSanitizer, MarkdownOptions, markdown_to_text};
use crate::truncator::truncate;

/// Longest per-URL timeout a caller may ask for.
const MAX_TIMEOUT_SECS: f64 = 120.0;

/// Every requested URL lands in exactly one of the two lists, each list in
/// request order.
#[derive(Debug, Default)]
pub struct ExtractOutcome {
    pub results: Vec<ExtractResult>,
    pub failed_results: Vec<FailedResult>,
}

pub struct ExtractOrchestrator {
    renderer: Arc<dyn PageRenderer>,
    /// Used instead of `renderer` for `.pdf` URLs when set.
    document_renderer: Option<Arc<dyn PageRenderer>>,
    sanitizer: Arc<ContentSanitizer>,
    config: ExtractConfig,
    pool_size: usize,
}

/// Raw request fields, before validation.
#[derive(Debug, Default, Clone)]
pub struct ExtractParams {
    pub urls: Vec<String>,
    pub depth: ExtractDepth,
    pub format: Option<OutputFormat>,
    pub include_images: bool,
    pub include_favicon: bool,
    pub include_links: bool,
    pub timeout_secs: Option<f64>,
}

impl ExtractOrchestrator {
    pub fn new(
        renderer: Arc<dyn PageRenderer>,
        sanitizer: Arc<ContentSanitizer>,
        config: ExtractConfig,
        pool_size: usize,
    ) -> ExtractOrchestrator {
        ExtractOrchestrator {
            renderer,
            document_renderer: None,
            sanitizer,
            config,
            pool_size,
        }
    }

    /// A headless browser shows PDFs in a viewer rather than returning the
    /// file, so PDF URLs can be sent to a plain fetcher instead.
    pub fn with_document_renderer(mut self, renderer: Arc<dyn PageRenderer>) -> Self {
        self.document_renderer = Some(renderer);
        self
    }

    pub fn build_request(&self, params: ExtractParams) -> Result<ExtractRequest> {
        let urls: Vec<String> = params
            .urls
            .into_iter()
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .collect();

        if urls.is_empty() {
            return Err(AdapterError::InvalidRequest("No URLs provided".to_string()));
        }
        if urls.len() > self.config.max_urls {
            return Err(AdapterError::InvalidRequest(format!(
                "Too many URLs: {} (max {})",
                urls.len(),
                self.config.max_urls
            )));
        }

        let timeout = match params.timeout_secs {
            None => match params.depth {
                ExtractDepth::Basic => self.config.timeout_basic,
                ExtractDepth::Advanced => self.config.timeout_advanced,
            },
            Some(secs) if secs.is_finite() && secs > 0.0 && secs <= MAX_TIMEOUT_SECS => {
                Duration::from_secs_f64(secs)
            }
            Some(secs) => {
                return Err(AdapterError::InvalidRequest(format!(
                    "timeout must be between 0 and {MAX_TIMEOUT_SECS} seconds, got {secs}"
                )));
            }
        };

        Ok(ExtractRequest {
            urls,
            depth: params.depth,
            format: params.format.unwrap_or(self.config.default_format),
            include_images: params.include_images,
            include_favicon: params.include_favicon,
            include_links: params.include_links,
            timeout,
        })
    }

    pub async fn extract(&self, request: &ExtractRequest) -> ExtractOutcome {
        tracing::info!(
            "extracting {} url(s) with {} renderer (depth={:?}, format={:?})",
            request.urls.len(),
            self.renderer.name(),
            request.depth,
            request.format
        );

        let renderer = self.renderer.clone();
        let document_renderer = self.document_renderer.clone();
        let sanitizer = self.sanitizer.clone();
        let settings = PageSettings {
            options: RenderOptions {
                depth: request.depth,
                timeout: request.timeout,
            },
            format: request.format,
            include_images: request.include_images,
            include_favicon: request.include_favicon,
            include_links: request.include_links,
            max_content_length: self.config.max_content_length,
        };

        let outcomes = run_indexed(
            request.urls.clone(),
            self.pool_size,
            request.timeout,
            move |url| {
                let renderer = match &document_renderer {
                    Some(document) if is_pdf_url(&url) => document.clone(),
                    _ => renderer.clone(),
                };
                let sanitizer = sanitizer.clone();
                async move { extract_one(renderer.as_ref(), &sanitizer, &url, &settings).await }
            },
        )
        .await;

        let mut outcome = ExtractOutcome::default();
        for (indexed, url) in outcomes.into_iter().zip(&request.urls) {
            let secs = indexed.elapsed.as_secs_f64();
            match indexed.result {
                Ok(result) => {
                    tracing::debug!("extracted {url} in {secs:.2}s");
                    outcome.results.push(result);
                }
                Err(failure) => {
                    let failed = failure.into_failed(url);
                    tracing::warn!(
                        "extract failed for {url} after {secs:.2}s: {} ({})",
                        failed.error,
                        failed.detail
                    );
                    outcome.failed_results.push(failed);
                }
            }
        }
        tracing::info!(
            "extract finished: {} succeeded, {} failed",
            outcome.results.len(),
            outcome.failed_results.len()
        );
        outcome
    }
}

#[derive(Debug, Clone, Copy)]
struct PageSettings {
    options: RenderOptions,
    format: OutputFormat,
    include_images: bool,
    include_favicon: bool,
    include_links: bool,
    max_content_length: usize,
}

async fn extract_one(
    renderer: &dyn PageRenderer,
    sanitizer: &ContentSanitizer,
    url: &str,
    settings: &PageSettings,
) -> std::result::Result<ExtractResult, PageFailure> {
    let page = renderer
        .render(url, &settings.options)
        .await
        .map_err(PageFailure::Render)?;
    if !page.is_success() {
        return Err(PageFailure::HttpStatus(page.status));
    }

    let kind = BodyKind::detect(page.content_type.as_deref(), &page.body);
    let content = match kind {
        BodyKind::Html => html_content(sanitizer, &page.body, settings),
        BodyKind::Text => sanitizer.sanitize_plain(&page.body),
        BodyKind::Pdf => sanitizer.sanitize_plain(pdf_to_text(&page).await?.as_bytes()),
        BodyKind::Binary => return Err(unsupported(&page)),
    }
    .ok_or(PageFailure::EmptyContent)?;

    // only HTML carries a title, images and a favicon to speak of.
    let meta = match kind {
        BodyKind::Html => PageMeta::parse(&String::from_utf8_lossy(&page.body), &page.final_url),
        BodyKind::Pdf => PageMeta {
            title: pdf_title_from_url(&page.final_url),
            ..PageMeta::default()
        },
        BodyKind::Text | BodyKind::Binary => PageMeta::default(),
    };
    let depth = settings.options.depth;
    let mut metadata = page_metadata(&page, renderer.name(), depth, meta.description);
    if kind == BodyKind::Pdf {
        metadata.insert("source".to_string(), json!("pdf"));
        metadata.insert("extractor".to_string(), json!("pdf-extract"));
    }

    Ok(ExtractResult {
        url: url.to_string(),
        title: meta.title,
        language: meta.language,
        raw_content: truncate(&content, settings.max_content_length),
        images: if settings.include_images {
            meta.images
        } else {
            Vec::new()
        },
        favicon: if settings.include_favicon {
            meta.favicon
        } else {
            None
        },
        metadata,
    })
}

fn html_content(
    sanitizer: &ContentSanitizer,
    html: &[u8],
    settings: &PageSettings,
) -> Option<String> {
    match settings.format {
        OutputFormat::Markdown => sanitizer.to_markdown(
            html,
            MarkdownOptions {
                include_links: settings.include_links,
                include_images: settings.include_images,
            },
        ),
        OutputFormat::Text => sanitizer
            .to_markdown(
                html,
                MarkdownOptions {
                    include_links: false,
                    include_images: false,
                },
            )
            .map(|markdown| markdown_to_text(&markdown))
            .filter(|text| !text.is_empty()),
    }
}

fn page_metadata(
    page: &RenderedPage,
    renderer: &str,
    depth: ExtractDepth,
    description: Option<String>,
) -> BTreeMap<String, Value> {
    let mut metadata = BTreeMap::new();
    metadata.insert("status_code".to_string(), json!(page.status));
    metadata.insert("final_url".to_string(), json!(page.final_url));
    metadata.insert("renderer".to_string(), json!(renderer));
    metadata.insert("extract_depth".to_string(), json!(depth));
    if let Some(content_type) = &page.content_type {
        metadata.insert("content_type".to_string(), json!(content_type));
    }
    if let Some(description) = description {
        metadata.insert("description".to_string(), json!(description));
    }
    metadata
}
