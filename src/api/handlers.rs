use axum::extract::rejection::JsonRejection;
use axum::http::header;
use axum::response::IntoResponse;
use axum::{Json, extract::State};
use std::time::Instant;
use uuid::Uuid;

use crate::error::AdapterError;
use crate::extract::ExtractParams;

use super::AppState;
use super::models::{
    ExtractRequestBody, ExtractResponse, HealthResponse, SearchRequest, SearchResponse,
};

pub const SERVICE_NAME: &str = "searxng-tavily-adapter";

fn rejected(rejection: JsonRejection) -> AdapterError {
    AdapterError::InvalidRequest(rejection.body_text())
}

/// Seconds, rounded to two decimals.
fn response_time(start: Instant) -> f64 {
    (start.elapsed().as_secs_f64() * 100.0).round() / 100.0
}

pub async fn search_handler(
    State(state): State<AppState>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, AdapterError> {
    let start = Instant::now();
    let Json(request) = payload.map_err(rejected)?;

    let query = state.search.build_query(
        &request.query,
        request.max_results,
        request.include_raw_content.enabled(),
    )?;
    let results = state.search.search(&query).await?;

    let request_id = Uuid::new_v4().to_string();
    tracing::info!(
        "search {request_id}: {} result(s) for {:?} in {:?}",
        results.len(),
        query.query,
        start.elapsed()
    );

    Ok(Json(SearchResponse {
        query: query.query,
        follow_up_questions: None,
        answer: None,
        images: Vec::new(),
        results,
        response_time: response_time(start),
        request_id,
    }))
}

pub async fn extract_handler(
    State(state): State<AppState>,
    payload: Result<Json<ExtractRequestBody>, JsonRejection>,
) -> Result<Json<ExtractResponse>, AdapterError> {
    let start = Instant::now();
    let Json(body) = payload.map_err(rejected)?;

    let request = state.extract.build_request(ExtractParams {
        urls: body.urls.into_vec(),
        depth: body.extract_depth,
        format: body.format,
        include_images: body.include_images,
        include_favicon: body.include_favicon,
        include_links: body.include_links,
        timeout_secs: body.timeout,
    })?;
    let outcome = state.extract.extract(&request).await;

    Ok(Json(ExtractResponse {
        request_id: Uuid::new_v4().to_string(),
        response_time: response_time(start),
        results: outcome.results,
        failed_results: outcome.failed_results,
    }))
}

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: SERVICE_NAME,
    })
}

pub async fn robots_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        "User-agent: *\nDisallow: /\n",
    )
}
