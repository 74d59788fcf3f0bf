use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use newsdex_core::cache::{CacheState, IndexStats};
use newsdex_core::docstore::MAX_SUGGESTIONS;
use newsdex_core::rank::RankMethod;
use newsdex_core::search::{SearchEngine, SearchPage};
use newsdex_core::SearchError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}
fn default_method() -> String { "tfidf".into() }
fn default_page() -> usize { 1 }
fn default_limit() -> usize { DEFAULT_PAGE_SIZE }

#[derive(Serialize)]
pub struct SearchResponse {
    #[serde(flatten)]
    pub page: SearchPage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchResponse {
    fn failed(error: impl ToString) -> Self { Self { page: SearchPage::default(), error: Some(error.to_string()) } }
}

#[derive(Deserialize)]
pub struct SuggestParams {
    #[serde(default)]
    pub query: String,
}

#[derive(Serialize)]
pub struct SuggestionsResponse {
    pub suggestions: Vec<String>,
}

#[derive(Serialize)]
pub struct IndexStatsBody {
    #[serde(flatten)]
    pub index: IndexStats,
    pub stored_documents: usize,
    pub cache_state: CacheState,
    /// `loaded` once a snapshot is in memory, `unavailable` when every tier failed.
    pub status: &'static str,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub index_stats: IndexStatsBody,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SearchEngine>,
}

/// CORS_ALLOW_ORIGIN is a comma-separated origin list; unset or unparsable means any origin.
fn cors_layer() -> CorsLayer {
    let origins: Vec<_> = std::env::var("CORS_ALLOW_ORIGIN")
        .map(|val| val.split(',').filter_map(|s| s.trim().parse().ok()).collect())
        .unwrap_or_default();
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(AllowOrigin::list(origins))
    }
}

pub fn build_app(engine: Arc<SearchEngine>) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/search", get(search_handler))
        .route("/api/suggestions", get(suggestions_handler))
        .route("/api/stats", get(stats_handler))
        .with_state(AppState { engine })
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
}

fn internal_error(error: impl std::fmt::Display) -> (StatusCode, Json<serde_json::Value>) {
    tracing::error!(%error, "request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({ "error": error.to_string() })))
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Response {
    if params.query.trim().is_empty() {
        return Json(SearchResponse { page: SearchPage::default(), error: None }).into_response();
    }
    let method = RankMethod::from_param(&params.method);
    let limit = params.limit.clamp(1, MAX_PAGE_SIZE);
    let engine = Arc::clone(&state.engine);
    let query = params.query.clone();
    let outcome = tokio::task::spawn_blocking(move || engine.search(&query, method, params.page, limit)).await;

    match outcome {
        Ok(Ok(page)) => Json(SearchResponse { page, error: None }).into_response(),
        Ok(Err(e @ SearchError::InvalidFormat { .. })) => {
            tracing::info!(query = %params.query, error = %e, "rejected query");
            (StatusCode::BAD_REQUEST, Json(SearchResponse::failed(e))).into_response()
        }
        Ok(Err(e @ SearchError::NoValidKeywords)) => Json(SearchResponse::failed(e)).into_response(),
        Ok(Err(e)) => {
            tracing::error!(query = %params.query, error = %e, "search failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(SearchResponse::failed(e))).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "search task panicked");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(SearchResponse::failed("internal error"))).into_response()
        }
    }
}

pub async fn suggestions_handler(State(state): State<AppState>, Query(params): Query<SuggestParams>) -> Response {
    let engine = Arc::clone(&state.engine);
    let outcome =
        tokio::task::spawn_blocking(move || engine.documents().suggest_titles(&params.query, MAX_SUGGESTIONS)).await;
    match outcome {
        Ok(Ok(suggestions)) => Json(SuggestionsResponse { suggestions }).into_response(),
        Ok(Err(e)) => internal_error(e).into_response(),
        Err(e) => internal_error(e).into_response(),
    }
}

fn stats_error(error: impl std::fmt::Display) -> Response {
    tracing::error!(%error, "stats failed");
    let body = serde_json::json!({ "error": error.to_string(), "index_stats": { "status": "error" } });
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

pub async fn stats_handler(State(state): State<AppState>) -> Response {
    let engine = Arc::clone(&state.engine);
    let outcome = tokio::task::spawn_blocking(move || {
        let index = engine.cache().get_index().stats();
        let stored_documents = engine.documents().len()?;
        let cache_state = engine.cache().state();
        let status = if cache_state == CacheState::Ready { "loaded" } else { "unavailable" };
        Ok::<_, newsdex_core::StoreError>(StatsResponse {
            index_stats: IndexStatsBody { index, stored_documents, cache_state, status },
        })
    })
    .await;
    match outcome {
        Ok(Ok(stats)) => Json(stats).into_response(),
        Ok(Err(e)) => stats_error(e),
        Err(e) => stats_error(e),
    }
}
