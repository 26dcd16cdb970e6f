//! Page retrieval capability.
//!
//! [`PageRenderer`] is the seam between the pipelines and whatever actually
//! loads a page. [`HttpRenderer`] is a plain HTTP fetch; [`HeadlessRenderer`]
//! asks a browserless-compatible service to execute the page's scripts and
//! hand back the rendered DOM.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response, redirect::Policy};
use serde_json::json;
use url::Url;

use crate::data_models::ExtractDepth;

#[derive(Debug, Clone, thiserror::Error)]
pub enum RenderError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("renderer failed: {0}")]
    Renderer(String),

    #[error("{0}")]
    Other(String),
}

impl RenderError {
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RenderError::Timeout(err.to_string())
        } else if err.is_connect() {
            RenderError::Connect(err.to_string())
        } else if err.is_request() || err.is_redirect() || err.is_body() || err.is_builder() {
            RenderError::Transport(err.to_string())
        } else {
            RenderError::Other(err.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub depth: ExtractDepth,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    /// The body hit the byte cap and was cut short.
    pub truncated: bool,
}

impl RenderedPage {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait PageRenderer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn render(&self, url: &str, options: &RenderOptions)
    -> Result<RenderedPage, RenderError>;
}

/// Only absolute http(s) URLs are ever handed to a renderer.
pub fn parse_page_url(url: &str) -> Result<Url, RenderError> {
    let parsed =
        Url::parse(url).map_err(|e| RenderError::Transport(format!("invalid url {url}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(RenderError::Transport(format!(
            "unsupported url scheme {scheme}: {url}"
        ))),
    }
}

pub struct HttpRenderer {
    basic: Client,
    advanced: Client,
    max_page_bytes: usize,
}

impl HttpRenderer {
    pub fn new(user_agent: &str, max_page_bytes: usize) -> Result<HttpRenderer, RenderError> {
        Ok(HttpRenderer {
            basic: build_client(user_agent, 5)?,
            advanced: build_client(user_agent, 10)?,
            max_page_bytes,
        })
    }
}

fn build_client(user_agent: &str, max_redirects: usize) -> Result<Client, RenderError> {
    Client::builder()
        .user_agent(user_agent)
        .redirect(Policy::limited(max_redirects))
        .build()
        .map_err(|e| RenderError::Other(format!("failed to build HTTP client: {e}")))
}

#[async_trait]
impl PageRenderer for HttpRenderer {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn render(
        &self,
        url: &str,
        options: &RenderOptions,
    ) -> Result<RenderedPage, RenderError> {
        let target = parse_page_url(url)?;
        let client = match options.depth {
            ExtractDepth::Basic => &self.basic,
            ExtractDepth::Advanced => &self.advanced,
        };

        let mut response = client
            .get(target)
            .timeout(options.timeout)
            .send()
            .await
            .map_err(RenderError::from_reqwest)?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let (body, truncated) = read_capped(&mut response, self.max_page_bytes).await?;

        Ok(RenderedPage {
            final_url,
            status,
            content_type,
            body,
            truncated,
        })
    }
}

/// Reads the body up to `limit` bytes; anything past that is dropped and the
/// returned flag is set.
async fn read_capped(
    response: &mut Response,
    limit: usize,
) -> Result<(Vec<u8>, bool), RenderError> {
    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(RenderError::from_reqwest)? {
        let room = limit.saturating_sub(body.len());
        if chunk.len() > room {
            body.extend_from_slice(&chunk[..room]);
            tracing::debug!("page body capped at {limit} bytes");
            return Ok((body, true));
        }
        body.extend_from_slice(&chunk);
    }
    Ok((body, false))
}

/// Scripted rendering through a browserless-style `/content` endpoint.
pub struct HeadlessRenderer {
    client: Client,
    endpoint: String,
    token: Option<String>,
    user_agent: String,
    max_page_bytes: usize,
}

impl HeadlessRenderer {
    pub fn new(
        endpoint: &str,
        token: Option<String>,
        user_agent: &str,
        max_page_bytes: usize,
    ) -> Result<HeadlessRenderer, RenderError> {
        let client = Client::builder()
            .build()
            .map_err(|e| RenderError::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(HeadlessRenderer {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token,
            user_agent: user_agent.to_string(),
            max_page_bytes,
        })
    }

    fn payload(&self, url: &str, options: &RenderOptions) -> serde_json::Value {
        let (wait_until, settle_ms) = match options.depth {
            ExtractDepth::Basic => ("domcontentloaded", 300),
            ExtractDepth::Advanced => ("networkidle2", 1500),
        };
        json!({
            "url": url,
            "userAgent": self.user_agent,
            "gotoOptions": {
                "waitUntil": wait_until,
                "timeout": options.timeout.as_millis() as u64,
            },
            "waitForTimeout": settle_ms,
        })
    }
}

#[async_trait]
impl PageRenderer for HeadlessRenderer {
    fn name(&self) -> &'static str {
        "headless"
    }

    async fn render(
        &self,
        url: &str,
        options: &RenderOptions,
    ) -> Result<RenderedPage, RenderError> {
        parse_page_url(url)?;

        let mut request = self
            .client
            .post(format!("{}/content", self.endpoint))
            .json(&self.payload(url, options))
            // the renderer enforces its own navigation timeout; leave it room to report it.
            .timeout(options.timeout + Duration::from_secs(2));
        if let Some(token) = &self.token {
            request = request.query(&[("token", token)]);
        }

        let mut response = request.send().await.map_err(RenderError::from_reqwest)?;
        let service_status = response.status();
        if !service_status.is_success() {
            let message = response.text().await.unwrap_or_default();
            let message: String = message.chars().take(300).collect();
            return Err(RenderError::Renderer(format!(
                "renderer returned {service_status}: {message}"
            )));
        }

        let status = header_value(&response, "x-response-code")
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(200);
        let final_url =
            header_value(&response, "x-response-url").unwrap_or_else(|| url.to_string());
        let content_type = header_value(&response, CONTENT_TYPE.as_str())
            .unwrap_or_else(|| "text/html".to_string());
        let (body, truncated) = read_capped(&mut response, self.max_page_bytes).await?;

        Ok(RenderedPage {
            final_url,
            status,
            content_type: Some(content_type),
            body,
            truncated,
        })
    }
}

fn header_value(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
