use serde_json::Value;

use crate::data_models::SearchResult;
use crate::error::UpstreamError;

/// Score given to the hit at `position` when the backend did not rank it.
pub fn positional_score(position: usize) -> f64 {
    (0.9 - 0.05 * position as f64).max(0.0)
}

/// Shapes a backend response into canonical results, preserving backend
/// order and keeping at most `bound` of them.
///
/// Both SearXNG (`results[] {url, title, content, score}`) and Google Custom
/// Search (`items[] {link, title, snippet}`) payloads are understood. Hits with
/// no usable URL are skipped before the bound is applied.
pub fn normalize(raw: &Value, bound: usize) -> Result<Vec<SearchResult>, UpstreamError> {
    let object = raw.as_object().ok_or_else(|| {
        UpstreamError::Malformed("search backend response is not a JSON object".to_string())
    })?;

    let hits = match (object.get("results"), object.get("items")) {
        (Some(results), _) => results,
        (None, Some(items)) => items,
        // Google omits `items` entirely when nothing matched.
        (None, None) => return Ok(Vec::new()),
    };
    let hits = hits.as_array().ok_or_else(|| {
        UpstreamError::Malformed("search backend hit list is not an array".to_string())
    })?;

    let results = hits
        .iter()
        .filter_map(|hit| {
            let url = string_field(hit, &["url", "link"])?;
            Some((hit, url))
        })
        .take(bound)
        .enumerate()
        .map(|(position, (hit, url))| {
            let title = string_field(hit, &["title"]).unwrap_or_default();
            let content = string_field(hit, &["content", "snippet"]).unwrap_or_default();
            let score = hit
                .get("score")
                .and_then(Value::as_f64)
                .filter(|s| s.is_finite())
                .unwrap_or_else(|| positional_score(position));
            SearchResult::new(url, title, content, score)
        })
        .collect();

    Ok(results)
}

fn string_field(hit: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| hit.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
}
