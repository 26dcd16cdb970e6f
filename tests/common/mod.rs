#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use tavily_adapter::backend::SearchBackend;
use tavily_adapter::config::Config;
use tavily_adapter::error::UpstreamError;
use tavily_adapter::extract::ExtractOrchestrator;
use tavily_adapter::fetcher::ContentFetcher;
use tavily_adapter::renderer::{PageRenderer, RenderError, RenderOptions, RenderedPage};
use tavily_adapter::sanitizer::ContentSanitizer;
use tavily_adapter::search::SearchService;

/// What the scripted renderer does for one URL.
#[derive(Clone)]
pub enum Script {
    Page {
        status: u16,
        content_type: Option<String>,
        body: Vec<u8>,
        delay: Duration,
    },
    Fail(RenderError),
}

const HTML: &str = "text/html; charset=utf-8";

impl Script {
    pub fn ok(body: &str) -> Script {
        Script::status(200, body)
    }

    pub fn status(status: u16, body: &str) -> Script {
        Script::Page {
            status,
            content_type: Some(HTML.to_string()),
            body: body.as_bytes().to_vec(),
            delay: Duration::ZERO,
        }
    }

    pub fn slow(delay: Duration, body: &str) -> Script {
        Script::Page {
            status: 200,
            content_type: Some(HTML.to_string()),
            body: body.as_bytes().to_vec(),
            delay,
        }
    }

    /// A 200 response with an arbitrary body and declared type.
    pub fn typed(content_type: Option<&str>, body: &[u8]) -> Script {
        Script::Page {
            status: 200,
            content_type: content_type.map(str::to_string),
            body: body.to_vec(),
            delay: Duration::ZERO,
        }
    }
}

/// Renderer test double: returns canned pages and records how many calls
/// were in flight at once.
#[derive(Default)]
pub struct ScriptedRenderer {
    scripts: HashMap<String, Script>,
    pub calls: AtomicUsize,
    in_flight: Arc<AtomicUsize>,
    pub peak_in_flight: AtomicUsize,
}

struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ScriptedRenderer {
    pub fn new() -> ScriptedRenderer {
        ScriptedRenderer::default()
    }

    pub fn with(mut self, url: &str, script: Script) -> ScriptedRenderer {
        self.scripts.insert(url.to_string(), script);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageRenderer for ScriptedRenderer {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn render(
        &self,
        url: &str,
        _options: &RenderOptions,
    ) -> Result<RenderedPage, RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlightGuard(self.in_flight.clone());
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        let script = self
            .scripts
            .get(url)
            .cloned()
            .unwrap_or_else(|| Script::Fail(RenderError::Connect(format!("no route to {url}"))));
        match script {
            Script::Page {
                status,
                content_type,
                body,
                delay,
            } => {
                // always yield so concurrent calls overlap.
                tokio::time::sleep(delay.max(Duration::from_millis(10))).await;
                Ok(RenderedPage {
                    final_url: url.to_string(),
                    status,
                    content_type,
                    body,
                    truncated: false,
                })
            }
            Script::Fail(err) => Err(err),
        }
    }
}

/// Backend test double returning a fixed payload or error.
pub struct FakeBackend {
    response: Result<Value, fn() -> UpstreamError>,
    pub calls: AtomicUsize,
}

impl FakeBackend {
    pub fn returning(response: Value) -> FakeBackend {
        FakeBackend {
            response: Ok(response),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(make_error: fn() -> UpstreamError) -> FakeBackend {
        FakeBackend {
            response: Err(make_error),
            calls: AtomicUsize::new(0),
        }
    }

    /// SearXNG-shaped payload with one hit per URL, in the given order.
    pub fn with_urls(urls: &[&str]) -> FakeBackend {
        let results: Vec<Value> = urls
            .iter()
            .enumerate()
            .map(|(i, url)| {
                json!({
                    "url": url,
                    "title": format!("Result {i}"),
                    "content": format!("snippet {i}"),
                    "score": 1.0 - i as f64 * 0.1,
                })
            })
            .collect();
        FakeBackend::returning(json!({ "results": results }))
    }
}

#[async_trait]
impl SearchBackend for FakeBackend {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn search(&self, _query: &str, _max_results: usize) -> Result<Value, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.response {
            Ok(value) => Ok(value.clone()),
            Err(make_error) => Err(make_error()),
        }
    }
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.scraper.timeout = Duration::from_secs(2);
    config.scraper.pool_size = 3;
    config
}

pub fn search_service(
    backend: Arc<FakeBackend>,
    renderer: Arc<dyn PageRenderer>,
    config: &Config,
) -> SearchService {
    let fetcher = ContentFetcher::new(
        renderer,
        Arc::new(ContentSanitizer::default()),
        &config.scraper,
    );
    SearchService::new(backend, fetcher, config.search.clone())
}

pub fn extract_orchestrator(
    renderer: Arc<dyn PageRenderer>,
    config: &Config,
) -> ExtractOrchestrator {
    ExtractOrchestrator::new(
        renderer,
        Arc::new(ContentSanitizer::default()),
        config.extract.clone(),
        config.scraper.pool_size,
    )
}

/// A page with boilerplate around an article of `article_chars` characters.
pub fn article_page(title: &str, article_chars: usize) -> String {
    let article = "lorem ipsum ".repeat(article_chars / 12 + 1);
    let article: String = article.chars().take(article_chars).collect();
    format!(
        r#"<html lang="en"><head><title>{title}</title><script>var tracker = "SCRIPT_TEXT";</script></head>
<body>
<nav><a href="/">NAV_TEXT</a></nav>
<article><h1>{title}</h1><p>{article}</p></article>
<footer>FOOTER_TEXT</footer>
<script>console.log("SCRIPT_TEXT")</script>
</body></html>"#
    )
}

/// A one-page PDF whose text layer is `text`, with a valid xref table.
pub fn minimal_pdf(text: &str) -> Vec<u8> {
    let stream = format!("BT /F1 24 Tf 72 720 Td ({text}) Tj ET");
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
         /Resources << /Font << /F1 4 0 R >> >> /Contents 5 0 R >>"
            .to_string(),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_string(),
        format!("<< /Length {} >>\nstream\n{stream}\nendstream", stream.len()),
    ];

    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::new();
    for (i, object) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{object}\nendobj\n", i + 1).as_bytes());
    }
    let xref_at = pdf.len();
    let mut tail = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        tail.push_str(&format!("{offset:010} 00000 n \n"));
    }
    tail.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_at}\n%%EOF\n",
        objects.len() + 1
    ));
    pdf.extend_from_slice(tail.as_bytes());
    pdf
}
