use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::data_models::FailedResult;
use crate::renderer::RenderError;

/// Per-URL failure taxonomy shared by raw-content fetches and extraction.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    NoContent,
    CrawlFailed,
    UnknownError,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Timeout => "timeout",
            FailureKind::NoContent => "no_content",
            FailureKind::CrawlFailed => "crawl_failed",
            FailureKind::UnknownError => "unknown_error",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything that can go wrong for a single page, before classification.
#[derive(Debug, Clone)]
pub enum PageFailure {
    /// The task's own deadline elapsed.
    Deadline(Duration),
    Render(RenderError),
    /// A response arrived but with a non-2xx status.
    HttpStatus(u16),
    /// A response arrived but sanitizing it left nothing.
    EmptyContent,
    /// A response arrived in a form that cannot be turned into text.
    Unreadable(String),
    /// The task died without producing an outcome (panic or cancellation).
    Aborted(String),
}

impl PageFailure {
    pub fn detail(&self) -> String {
        match self {
            PageFailure::Deadline(limit) => {
                format!("no response within {:.1}s", limit.as_secs_f64())
            }
            PageFailure::Render(err) => err.to_string(),
            PageFailure::HttpStatus(code) => format!("HTTP status {code}"),
            PageFailure::EmptyContent => "page yielded no extractable text".to_string(),
            PageFailure::Unreadable(reason) => reason.clone(),
            PageFailure::Aborted(reason) => format!("task aborted: {reason}"),
        }
    }

    pub fn into_failed(self, url: &str) -> FailedResult {
        FailedResult::new(url.to_string(), classify(&self), self.detail())
    }
}

/// Maps a low-level failure onto the four-member taxonomy. Total: anything
/// not recognised ends up as `unknown_error`.
pub fn classify(failure: &PageFailure) -> FailureKind {
    match failure {
        PageFailure::Deadline(_) => FailureKind::Timeout,
        PageFailure::HttpStatus(_) => FailureKind::CrawlFailed,
        PageFailure::EmptyContent | PageFailure::Unreadable(_) => FailureKind::NoContent,
        PageFailure::Aborted(_) => FailureKind::UnknownError,
        PageFailure::Render(err) => classify_render(err),
    }
}

fn classify_render(err: &RenderError) -> FailureKind {
    match err {
        RenderError::Timeout(_) => FailureKind::Timeout,
        RenderError::Connect(_) | RenderError::Transport(_) => FailureKind::CrawlFailed,
        RenderError::Renderer(message) => classify_renderer_message(message),
        RenderError::Other(_) => FailureKind::UnknownError,
    }
}

/// Headless renderers report navigation problems as free text; pick out the
/// ones we can name.
fn classify_renderer_message(message: &str) -> FailureKind {
    let lower = message.to_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") {
        FailureKind::Timeout
    } else if lower.contains("net::err_")
        || lower.contains("ns_error_")
        || lower.contains("navigation failed")
        || lower.contains("dns")
    {
        FailureKind::CrawlFailed
    } else {
        FailureKind::UnknownError
    }
}
