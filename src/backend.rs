//! Search backends. Each returns the backend's raw JSON; shaping it into
//! results is [`crate::normalizer`]'s job.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE};
use serde_json::Value;

use crate::config::{BackendConfig, BackendKind};
use crate::error::UpstreamError;

const GOOGLE_CSE_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";
/// Google Custom Search refuses `num` above 10.
const GOOGLE_MAX_NUM: usize = 10;

#[async_trait]
pub trait SearchBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn search(&self, query: &str, max_results: usize) -> Result<Value, UpstreamError>;
}

pub struct SearxngBackend {
    client: Client,
    base_url: String,
    engines: String,
}

impl SearxngBackend {
    pub fn new(config: &BackendConfig, user_agent: &str) -> Result<SearxngBackend, UpstreamError> {
        Ok(SearxngBackend {
            client: build_client(config, user_agent)?,
            base_url: config.searxng_url.trim_end_matches('/').to_string(),
            engines: config.engines.clone(),
        })
    }

    fn form<'a>(&'a self, query: &'a str) -> Vec<(&'static str, &'a str)> {
        vec![
            ("q", query),
            ("format", "json"),
            ("categories", "general"),
            ("engines", self.engines.as_str()),
            ("pageno", "1"),
            ("language", "auto"),
            ("safesearch", "1"),
        ]
    }
}

#[async_trait]
impl SearchBackend for SearxngBackend {
    fn name(&self) -> &'static str {
        "searxng"
    }

    async fn search(&self, query: &str, _max_results: usize) -> Result<Value, UpstreamError> {
        // SearXNG has no result-count parameter; the normalizer applies the bound.
        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .header(ACCEPT, "application/json")
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .form(&self.form(query))
            .send()
            .await
            .map_err(UpstreamError::from_reqwest)?;
        read_json(response).await
    }
}

pub struct GoogleBackend {
    client: Client,
    endpoint: String,
    api_key: String,
    cse_id: String,
}

impl GoogleBackend {
    pub fn new(config: &BackendConfig, user_agent: &str) -> Result<GoogleBackend, UpstreamError> {
        let (Some(api_key), Some(cse_id)) = (&config.google_api_key, &config.google_cse_id) else {
            return Err(UpstreamError::Unreachable(
                "google backend needs an API key and a CSE id".to_string(),
            ));
        };
        Ok(GoogleBackend {
            client: build_client(config, user_agent)?,
            endpoint: GOOGLE_CSE_ENDPOINT.to_string(),
            api_key: api_key.clone(),
            cse_id: cse_id.clone(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> GoogleBackend {
        self.endpoint = endpoint.to_string();
        self
    }
}

#[async_trait]
impl SearchBackend for GoogleBackend {
    fn name(&self) -> &'static str {
        "google"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Value, UpstreamError> {
        let num = max_results.clamp(1, GOOGLE_MAX_NUM).to_string();
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.cse_id.as_str()),
                ("q", query),
                ("num", num.as_str()),
            ])
            .send()
            .await
            .map_err(UpstreamError::from_reqwest)?;
        read_json(response).await
    }
}

/// Builds the backend selected by configuration.
pub fn from_config(
    config: &BackendConfig,
    user_agent: &str,
) -> Result<Arc<dyn SearchBackend>, UpstreamError> {
    Ok(match config.kind {
        BackendKind::Searxng => Arc::new(SearxngBackend::new(config, user_agent)?),
        BackendKind::Google => Arc::new(GoogleBackend::new(config, user_agent)?),
    })
}

fn build_client(config: &BackendConfig, user_agent: &str) -> Result<Client, UpstreamError> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(config.timeout)
        .build()
        .map_err(|e| UpstreamError::Unreachable(format!("failed to build HTTP client: {e}")))
}

async fn read_json(response: reqwest::Response) -> Result<Value, UpstreamError> {
    let status = response.status();
    if !status.is_success() {
        tracing::warn!("search backend returned {status}");
        return Err(UpstreamError::Status(status.as_u16()));
    }
    response.json::<Value>().await.map_err(UpstreamError::from_reqwest)
}
