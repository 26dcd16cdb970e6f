use serde::{Deserialize, Serialize};

use crate::data_models::{ExtractDepth, ExtractResult, FailedResult, OutputFormat, SearchResult};

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub max_results: Option<i64>,
    #[serde(default)]
    pub include_raw_content: RawContentFlag,
}

/// Tavily clients send either a boolean or a format name here.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawContentFlag {
    Flag(bool),
    Format(String),
}

impl Default for RawContentFlag {
    fn default() -> Self {
        RawContentFlag::Flag(false)
    }
}

impl RawContentFlag {
    pub fn enabled(&self) -> bool {
        match self {
            RawContentFlag::Flag(flag) => *flag,
            RawContentFlag::Format(format) => {
                !matches!(format.trim().to_lowercase().as_str(), "" | "false" | "none")
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub follow_up_questions: Option<Vec<String>>,
    pub answer: Option<String>,
    pub images: Vec<String>,
    pub results: Vec<SearchResult>,
    pub response_time: f64,
    pub request_id: String,
}

/// One URL or several.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum UrlList {
    One(String),
    Many(Vec<String>),
}

impl Default for UrlList {
    fn default() -> Self {
        UrlList::Many(Vec::new())
    }
}

impl UrlList {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            UrlList::One(url) => vec![url],
            UrlList::Many(urls) => urls,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ExtractRequestBody {
    #[serde(default)]
    pub urls: UrlList,
    #[serde(default)]
    pub include_images: bool,
    #[serde(default)]
    pub include_links: bool,
    #[serde(default)]
    pub include_favicon: bool,
    #[serde(default)]
    pub extract_depth: ExtractDepth,
    #[serde(default)]
    pub format: Option<OutputFormat>,
    #[serde(default)]
    pub timeout: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct ExtractResponse {
    pub request_id: String,
    pub response_time: f64,
    pub results: Vec<ExtractResult>,
    pub failed_results: Vec<FailedResult>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
}
