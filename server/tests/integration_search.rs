use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use newsdex_core::builder::build;
use newsdex_core::cache::{CacheConfig, IndexCache};
use newsdex_core::docstore::MemoryDocumentStore;
use newsdex_core::persist::{save_raw_index, IndexPaths};
use newsdex_core::search::SearchEngine;
use newsdex_core::store::MemoryStore;
use newsdex_core::NewsRecord;
use serde_json::Value;
use std::sync::Arc;
use tempfile::{tempdir, TempDir};
use tower::ServiceExt;

fn article(id: &str, title: &str, content: &str) -> NewsRecord {
    NewsRecord {
        id: id.into(),
        title: title.into(),
        description: content.into(),
        content: content.into(),
        url: format!("https://news.example/{id}"),
        published_at: "2024-05-01T00:00:00Z".into(),
        source_name: "Example News".into(),
        source_url: "https://news.example".into(),
    }
}

fn tiny_app() -> (TempDir, Router) {
    let dir = tempdir().unwrap();
    let paths = IndexPaths::new(dir.path());
    let docs = vec![
        article("a1", "Rust release", "the rust compiler ships a new edition"),
        article("a2", "Rust belt", "factories reopen across the rust belt"),
        article("a3", "Weather", "rain expected"),
    ];
    save_raw_index(&paths.raw_index(), &build(&docs).index).unwrap();
    let cache = Arc::new(IndexCache::new(CacheConfig::new(paths), Arc::new(MemoryStore::new())));
    let engine = Arc::new(SearchEngine::new(cache, Arc::new(MemoryDocumentStore::with_records(docs))));
    (dir, server::build_app(engine))
}

async fn call(app: Router, uri: &str) -> (StatusCode, Bytes) {
    let req = Request::get(uri).body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, body)
}

async fn call_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let (status, body) = call(app, uri).await;
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn health_is_ok() {
    let (_dir, app) = tiny_app();
    let (status, body) = call(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"ok");
}

#[tokio::test]
async fn search_returns_paginated_hits() {
    let (_dir, app) = tiny_app();
    let (status, json) = call_json(app, "/api/search?query=rust&method=bm25&page=1&limit=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["totalResults"], 2);
    assert_eq!(json["totalPages"], 2);
    let results = json["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["source"], "Example News");
    assert!(results[0]["publishedDate"].is_string());
    assert!(json.get("error").is_none());
}

#[tokio::test]
async fn phrase_query_over_http() {
    let (_dir, app) = tiny_app();
    let (status, json) = call_json(app, "/api/search?query=%22rust%20belt%22").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["totalResults"], 1);
    assert_eq!(json["results"][0]["id"], "a2");
}

#[tokio::test]
async fn empty_query_is_empty_response() {
    let (_dir, app) = tiny_app();
    let (status, json) = call_json(app, "/api/search?query=").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["totalResults"], 0);
    assert_eq!(json["results"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn invalid_format_is_bad_request() {
    let (_dir, app) = tiny_app();
    let (status, json) = call_json(app, "/api/search?query=%2399999999999%20rust%20belt").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("proximity"));
}

#[tokio::test]
async fn stopword_query_reports_error_with_empty_results() {
    let (_dir, app) = tiny_app();
    let (status, json) = call_json(app, "/api/search?query=the").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["totalResults"], 0);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn suggestions_and_stats() {
    let (_dir, app) = tiny_app();
    let (status, json) = call_json(app.clone(), "/api/suggestions?query=rust").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["suggestions"].as_array().unwrap().len(), 2);

    let (_, json) = call_json(app.clone(), "/api/suggestions?query=r").await;
    assert_eq!(json["suggestions"].as_array().unwrap().len(), 0);

    let (status, json) = call_json(app, "/api/stats").await;
    assert_eq!(status, StatusCode::OK);
    let stats = &json["index_stats"];
    assert_eq!(stats["status"], "loaded");
    assert_eq!(stats["terms_count"], 13);
    assert_eq!(stats["documents_count"], 3);
    assert_eq!(stats["stored_documents"], 3);
    assert_eq!(stats["source"], "shared_store");
}
