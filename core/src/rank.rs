//! Re-ranking of a retrieved candidate list.
//!
//! Statistics are computed over the candidates only, on lowercased whitespace tokens of
//! `title + " " + content`, matched exactly against the lowercased query words.
//! Sorting is stable, so equal scores keep their input order.

use crate::index::NewsRecord;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub const BM25_K1: f64 = 1.5;
pub const BM25_B: f64 = 0.75;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankMethod {
    #[default]
    TfIdf,
    Bm25,
    /// Any other method name: keep retrieval order.
    Unranked,
}

impl RankMethod {
    pub fn from_param(method: &str) -> Self {
        match method.trim().to_lowercase().as_str() {
            "tfidf" => RankMethod::TfIdf,
            "bm25" => RankMethod::Bm25,
            _ => RankMethod::Unranked,
        }
    }
}

pub fn rank(records: Vec<NewsRecord>, query: &str, method: RankMethod) -> Vec<NewsRecord> {
    match method {
        RankMethod::TfIdf => tfidf(records, query),
        RankMethod::Bm25 => bm25(records, query),
        RankMethod::Unranked => records,
    }
}

fn ranking_tokens(record: &NewsRecord) -> Vec<String> {
    format!("{} {}", record.title, record.content)
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn query_terms(query: &str) -> Vec<String> { query.to_lowercase().split_whitespace().map(str::to_string).collect() }

fn count(term: &str, tokens: &[String]) -> usize { tokens.iter().filter(|t| t.as_str() == term).count() }

fn document_frequency(term: &str, docs: &[Vec<String>]) -> usize {
    docs.iter().filter(|tokens| tokens.iter().any(|t| t == term)).count()
}

fn sort_by_score(records: Vec<NewsRecord>, scores: Vec<f64>) -> Vec<NewsRecord> {
    let mut scored: Vec<(f64, NewsRecord)> = scores.into_iter().zip(records).collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
    scored.into_iter().map(|(_, r)| r).collect()
}

pub fn tfidf(records: Vec<NewsRecord>, query: &str) -> Vec<NewsRecord> {
    let terms = query_terms(query);
    if records.is_empty() || terms.is_empty() {
        return records;
    }
    let docs: Vec<Vec<String>> = records.iter().map(ranking_tokens).collect();
    let n = records.len() as f64;
    let mut scores = vec![0.0f64; records.len()];

    for term in &terms {
        let df = document_frequency(term, &docs);
        if df == 0 {
            continue;
        }
        let idf = ((n + 1.0) / (df as f64 + 1.0)).ln() + 1.0;
        for (score, tokens) in scores.iter_mut().zip(&docs) {
            if tokens.is_empty() {
                continue;
            }
            let tf = count(term, tokens) as f64 / tokens.len() as f64;
            *score += tf * idf;
        }
    }
    tracing::debug!(candidates = records.len(), "tf-idf scored");
    sort_by_score(records, scores)
}

pub fn bm25(records: Vec<NewsRecord>, query: &str) -> Vec<NewsRecord> {
    let terms = query_terms(query);
    if records.is_empty() || terms.is_empty() {
        return records;
    }
    let docs: Vec<Vec<String>> = records.iter().map(ranking_tokens).collect();
    let n = records.len() as f64;
    let avg_len = docs.iter().map(Vec::len).sum::<usize>() as f64 / n;
    let mut scores = vec![0.0f64; records.len()];

    for term in &terms {
        let df = document_frequency(term, &docs) as f64;
        if df == 0.0 {
            continue;
        }
        let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
        for (score, tokens) in scores.iter_mut().zip(&docs) {
            let tf = count(term, tokens) as f64;
            let norm_len = if avg_len > 0.0 { tokens.len() as f64 / avg_len } else { 0.0 };
            *score += idf * (tf * (BM25_K1 + 1.0)) / (tf + BM25_K1 * (1.0 - BM25_B + BM25_B * norm_len));
        }
    }
    tracing::debug!(candidates = records.len(), avg_len, "bm25 scored");
    sort_by_score(records, scores)
}
