use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::classifier::FailureKind;

/// A validated search request.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub query: String,
    pub max_results: usize,
    pub include_raw_content: bool,
}

/// One ranked search hit in the canonical (Tavily) shape.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub url: String,
    pub title: String,
    pub content: String,
    pub score: f64,
    pub raw_content: Option<String>,
}

impl SearchResult {
    pub fn new(url: String, title: String, content: String, score: f64) -> SearchResult {
        SearchResult {
            url,
            title,
            content,
            score,
            raw_content: None, // filled in later when raw content was requested.
        }
    }
}

/// Outcome of fetching, sanitizing and truncating one result page.
#[derive(Debug, Clone)]
pub struct RawContentResult {
    pub index: usize,
    pub url: String,
    pub status: Option<u16>,
    pub outcome: Result<String, FailedResult>,
    pub elapsed: Duration,
}

impl RawContentResult {
    pub fn text(&self) -> Option<&str> {
        self.outcome.as_ref().ok().map(String::as_str)
    }

    pub fn failure(&self) -> Option<FailureKind> {
        self.outcome.as_ref().err().map(|f| f.error)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExtractDepth {
    #[default]
    Basic,
    Advanced,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Markdown,
    Text,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Option<OutputFormat> {
        match value.trim().to_lowercase().as_str() {
            "markdown" => Some(OutputFormat::Markdown),
            "text" => Some(OutputFormat::Text),
            _ => None,
        }
    }
}

/// A validated extract request.
#[derive(Debug, Clone)]
pub struct ExtractRequest {
    pub urls: Vec<String>,
    pub depth: ExtractDepth,
    pub format: OutputFormat,
    pub include_images: bool,
    pub include_favicon: bool,
    pub include_links: bool,
    pub timeout: Duration,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ImageDescriptor {
    pub url: String,
    pub description: Option<String>,
    pub score: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ExtractResult {
    pub url: String,
    pub title: Option<String>,
    pub language: Option<String>,
    pub raw_content: String,
    pub images: Vec<ImageDescriptor>,
    pub favicon: Option<String>,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FailedResult {
    pub url: String,
    pub error: FailureKind,
    pub detail: String,
}

impl FailedResult {
    pub fn new(url: String, error: FailureKind, detail: String) -> FailedResult {
        FailedResult { url, error, detail }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_result_serializes_absent_raw_content_as_null() {
        let result = SearchResult::new(
            "https://example.com".into(),
            "Example".into(),
            "snippet".into(),
            0.9,
        );
        let json = serde_json::to_value(&result).unwrap();
        assert!(json["raw_content"].is_null());
        assert_eq!(json["score"], 0.9);
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!(OutputFormat::parse("Markdown"), Some(OutputFormat::Markdown));
        assert_eq!(OutputFormat::parse(" text "), Some(OutputFormat::Text));
        assert_eq!(OutputFormat::parse("html"), None);
    }

    #[test]
    fn test_failed_result_shape() {
        let failed = FailedResult::new(
            "https://slow.example".into(),
            FailureKind::Timeout,
            "no response within 12s".into(),
        );
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["url"], "https://slow.example");
        assert_eq!(json["error"], "timeout");
    }

    #[test]
    fn test_depth_deserializes_lowercase() {
        let depth: ExtractDepth = serde_json::from_str("\"advanced\"").unwrap();
        assert_eq!(depth, ExtractDepth::Advanced);
        assert!(serde_json::from_str::<ExtractDepth>("\"deep\"").is_err());
    }
}
