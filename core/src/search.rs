//! Retrieval engine: classify, match against the cached index, hydrate, rank, paginate.

use crate::cache::{IndexCache, IndexSnapshot};
use crate::docstore::DocumentStore;
use crate::error::SearchError;
use crate::index::{DocId, NewsRecord, Position};
use crate::query::{self, classify, RetrievalMode};
use crate::rank::{rank, RankMethod};
use crate::tokenizer::{normalize, stem_word};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

pub const SNIPPET_CHARS: usize = 300;

pub type DocSet = BTreeSet<DocId>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub id: DocId,
    pub title: String,
    pub snippet: String,
    pub content: String,
    pub url: String,
    pub published_date: String,
    pub source: String,
    pub source_url: String,
}

impl From<NewsRecord> for SearchHit {
    fn from(r: NewsRecord) -> Self {
        SearchHit {
            id: r.id,
            title: r.title,
            snippet: truncate_snippet(&r.description),
            content: r.content,
            url: r.url,
            published_date: r.published_at,
            source: r.source_name,
            source_url: r.source_url,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    pub results: Vec<SearchHit>,
    pub total_results: usize,
    pub total_pages: usize,
}

/// At most 300 characters, with an ellipsis appended when cut.
pub fn truncate_snippet(text: &str) -> String {
    match text.char_indices().nth(SNIPPET_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

pub struct SearchEngine {
    cache: Arc<IndexCache>,
    documents: Arc<dyn DocumentStore>,
}

impl SearchEngine {
    pub fn new(cache: Arc<IndexCache>, documents: Arc<dyn DocumentStore>) -> Self { Self { cache, documents } }

    pub fn cache(&self) -> &Arc<IndexCache> { &self.cache }

    pub fn documents(&self) -> &Arc<dyn DocumentStore> { &self.documents }

    /// Matching document IDs for a raw query, routed by `classify`.
    pub fn retrieve(&self, query: &str) -> Result<DocSet, SearchError> { self.retrieve_as(classify(query), query) }

    pub fn retrieve_as(&self, mode: RetrievalMode, query: &str) -> Result<DocSet, SearchError> {
        let snapshot = self.cache.get_index();
        let start = Instant::now();
        let ids = match mode {
            RetrievalMode::Keyword => keyword(&snapshot, query),
            RetrievalMode::Phrase => phrase(&snapshot, query),
            RetrievalMode::Proximity => proximity(&snapshot, query),
            RetrievalMode::And | RetrievalMode::Or | RetrievalMode::AndNot => boolean(&snapshot, mode, query),
        }?;
        tracing::debug!(%mode, matches = ids.len(), took_s = start.elapsed().as_secs_f64(), "retrieved");
        Ok(ids)
    }

    /// One batched lookup; IDs without a record are dropped.
    pub fn hydrate(&self, ids: &DocSet) -> Result<Vec<NewsRecord>, SearchError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let records = self.documents.fetch(ids)?;
        if records.len() < ids.len() {
            tracing::debug!(matched = ids.len(), hydrated = records.len(), "records missing from document store");
        }
        Ok(records)
    }

    /// Full pipeline. Counts are taken after hydration, so pages never point past real records.
    pub fn search(&self, query: &str, method: RankMethod, page: usize, page_size: usize) -> Result<SearchPage, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(SearchPage::default());
        }
        let start = Instant::now();
        let ids = self.retrieve(query)?;
        let records = rank(self.hydrate(&ids)?, query, method);

        let page = page.max(1);
        let page_size = page_size.max(1);
        let total_results = records.len();
        let total_pages = total_results.div_ceil(page_size);
        let results: Vec<SearchHit> = records
            .into_iter()
            .skip((page - 1).saturating_mul(page_size))
            .take(page_size)
            .map(SearchHit::from)
            .collect();

        tracing::info!(query, ?method, total_results, took_s = start.elapsed().as_secs_f64(), "search complete");
        Ok(SearchPage { results, total_results, total_pages })
    }
}

/// Union of `doc_ids(term)` over the terms; absent terms contribute nothing.
fn union_of(snapshot: &IndexSnapshot, terms: &[String]) -> DocSet {
    let mut out = DocSet::new();
    for term in terms {
        let postings = snapshot.term_postings(term);
        if postings.is_empty() {
            tracing::debug!(term = %term, "term not in index");
        }
        out.extend(postings.into_keys());
    }
    out
}

fn keyword(snapshot: &IndexSnapshot, query: &str) -> Result<DocSet, SearchError> {
    let terms = normalize(query);
    if terms.is_empty() {
        return Err(SearchError::NoValidKeywords);
    }
    Ok(union_of(snapshot, &terms))
}

fn phrase(snapshot: &IndexSnapshot, query: &str) -> Result<DocSet, SearchError> {
    let terms = normalize(&query::parse_phrase(query)?);
    if terms.is_empty() {
        return Ok(DocSet::new());
    }
    let mut all_postings = Vec::with_capacity(terms.len());
    for term in &terms {
        let postings = snapshot.term_postings(term);
        if postings.is_empty() {
            tracing::debug!(term = %term, "phrase term not in index");
            return Ok(DocSet::new());
        }
        all_postings.push(postings);
    }

    let mut common: DocSet = all_postings[0].keys().cloned().collect();
    for postings in &all_postings[1..] {
        common.retain(|doc| postings.contains_key(doc));
    }
    common.retain(|doc| {
        let lists: Vec<&[Position]> = all_postings.iter().map(|p| p[doc].as_slice()).collect();
        is_phrase_match(&lists)
    });
    Ok(common)
}

/// Multi-pointer walk over aligned positions `pos - i` for the i-th phrase term. The phrase
/// occurs where every aligned value is equal; otherwise the pointer with the smallest aligned
/// value advances, until any list runs out.
pub fn is_phrase_match(lists: &[&[Position]]) -> bool {
    if lists.is_empty() || lists.iter().any(|l| l.is_empty()) {
        return false;
    }
    let aligned = |term: usize, ptr: usize| i64::from(lists[term][ptr]) - term as i64;
    let mut ptrs = vec![0usize; lists.len()];
    loop {
        let current: Vec<i64> = ptrs.iter().enumerate().map(|(term, &ptr)| aligned(term, ptr)).collect();
        if current.windows(2).all(|w| w[0] == w[1]) {
            return true;
        }
        let Some((idx, _)) = current.iter().enumerate().min_by_key(|&(_, v)| *v) else {
            return false;
        };
        ptrs[idx] += 1;
        if ptrs[idx] >= lists[idx].len() {
            return false;
        }
    }
}

fn proximity(snapshot: &IndexSnapshot, query: &str) -> Result<DocSet, SearchError> {
    let parsed = query::parse_proximity(query)?;
    let first = snapshot.term_postings(&stem_word(&parsed.first));
    let second = snapshot.term_postings(&stem_word(&parsed.second));
    if first.is_empty() || second.is_empty() {
        return Ok(DocSet::new());
    }
    Ok(first
        .iter()
        .filter_map(|(doc, p1)| {
            let p2 = second.get(doc)?;
            within_distance(p1, p2, parsed.distance).then(|| doc.clone())
        })
        .collect())
}

/// Two-pointer scan over sorted lists for any pair with `|p1 - p2| <= distance`.
pub fn within_distance(p1: &[Position], p2: &[Position], distance: u32) -> bool {
    let (mut i, mut j) = (0, 0);
    while i < p1.len() && j < p2.len() {
        if p1[i].abs_diff(p2[j]) <= distance {
            return true;
        }
        if p1[i] < p2[j] {
            i += 1;
        } else {
            j += 1;
        }
    }
    false
}

fn boolean(snapshot: &IndexSnapshot, mode: RetrievalMode, query: &str) -> Result<DocSet, SearchError> {
    let (left, right) = query::split_boolean(mode, query)?;
    let left_terms = normalize(&left);
    let right_terms = normalize(&right);

    let satisfied = match mode {
        RetrievalMode::And => !left_terms.is_empty() && !right_terms.is_empty(),
        RetrievalMode::Or => !left_terms.is_empty() || !right_terms.is_empty(),
        _ => !left_terms.is_empty(),
    };
    if !satisfied {
        return Ok(DocSet::new());
    }

    let a = union_of(snapshot, &left_terms);
    let b = union_of(snapshot, &right_terms);
    Ok(match mode {
        RetrievalMode::And => a.intersection(&b).cloned().collect(),
        RetrievalMode::Or => a.union(&b).cloned().collect(),
        _ => a.difference(&b).cloned().collect(),
    })
}
