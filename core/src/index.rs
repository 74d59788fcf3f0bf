use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub type DocId = String;
pub type Position = u32;
/// Strictly increasing token offsets of one term inside one document.
pub type PositionList = Vec<Position>;
pub type TermPostings = BTreeMap<DocId, PositionList>;

/// A full article record as held by the document store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsRecord {
    pub id: DocId,
    pub title: String,
    /// Short description from the news feed, served as the result snippet.
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub published_at: String,
    #[serde(default)]
    pub source_name: String,
    #[serde(default)]
    pub source_url: String,
}

/// Positional inverted index keyed by external document IDs.
///
/// Serializes to the human-readable raw index layout
/// `{term: {doc_id: {"positions": [..]}}}`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawIndexFile", into = "RawIndexFile")]
pub struct InvertedIndex {
    terms: BTreeMap<String, TermPostings>,
}

impl InvertedIndex {
    pub fn new() -> Self { Self::default() }

    /// Appends one occurrence. Callers feed positions in scan order, so lists stay ascending.
    pub fn record(&mut self, term: &str, doc_id: &str, position: Position) {
        self.terms
            .entry(term.to_string())
            .or_default()
            .entry(doc_id.to_string())
            .or_default()
            .push(position);
    }

    pub fn insert_postings(&mut self, term: impl Into<String>, postings: TermPostings) {
        if postings.is_empty() {
            return;
        }
        self.terms.insert(term.into(), postings);
    }

    pub fn postings(&self, term: &str) -> Option<&TermPostings> { self.terms.get(term) }

    pub fn doc_ids(&self, term: &str) -> BTreeSet<DocId> {
        self.terms.get(term).map(|p| p.keys().cloned().collect()).unwrap_or_default()
    }

    pub fn terms(&self) -> impl Iterator<Item = (&String, &TermPostings)> { self.terms.iter() }

    pub fn term_count(&self) -> usize { self.terms.len() }

    pub fn is_empty(&self) -> bool { self.terms.is_empty() }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawPosting {
    #[serde(default)]
    positions: PositionList,
}

#[derive(Serialize, Deserialize)]
#[serde(transparent)]
struct RawIndexFile(BTreeMap<String, BTreeMap<DocId, RawPosting>>);

impl From<RawIndexFile> for InvertedIndex {
    fn from(raw: RawIndexFile) -> Self {
        let terms = raw
            .0
            .into_iter()
            .filter(|(_, docs)| !docs.is_empty())
            .map(|(term, docs)| {
                let postings = docs.into_iter().map(|(doc, p)| (doc, p.positions)).collect();
                (term, postings)
            })
            .collect();
        Self { terms }
    }
}

impl From<InvertedIndex> for RawIndexFile {
    fn from(index: InvertedIndex) -> Self {
        RawIndexFile(
            index
                .terms
                .into_iter()
                .map(|(term, docs)| {
                    let docs = docs.into_iter().map(|(doc, positions)| (doc, RawPosting { positions })).collect();
                    (term, docs)
                })
                .collect(),
        )
    }
}

/// Term counts before and after a case-normalization pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CaseMergeReport {
    pub original_terms: usize,
    pub normalized_terms: usize,
}

impl CaseMergeReport {
    pub fn reduction(&self) -> usize { self.original_terms.saturating_sub(self.normalized_terms) }
}

/// Merges case-variant terms of an index built before query-time lowercasing was enforced.
///
/// Position lists of a document that appears under several variants are unioned,
/// deduplicated and re-sorted.
pub fn normalize_case(raw: &InvertedIndex) -> InvertedIndex {
    let mut merged: BTreeMap<String, TermPostings> = BTreeMap::new();
    for (term, postings) in raw.terms() {
        let target = merged.entry(term.to_lowercase()).or_default();
        for (doc_id, positions) in postings {
            let list = target.entry(doc_id.clone()).or_default();
            list.extend_from_slice(positions);
            list.sort_unstable();
            list.dedup();
        }
    }
    InvertedIndex { terms: merged }
}

pub fn case_merge_report(raw: &InvertedIndex, merged: &InvertedIndex) -> CaseMergeReport {
    CaseMergeReport { original_terms: raw.term_count(), normalized_terms: merged.term_count() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn postings(entries: &[(&str, &[Position])]) -> TermPostings {
        entries.iter().map(|(d, p)| (d.to_string(), p.to_vec())).collect()
    }

    #[test]
    fn merges_case_variants() {
        let mut raw = InvertedIndex::new();
        raw.insert_postings("Apple", postings(&[("doc1", &[0, 4])]));
        raw.insert_postings("apple", postings(&[("doc1", &[4, 9]), ("doc2", &[3])]));
        raw.insert_postings("pear", postings(&[("doc2", &[1])]));

        let merged = normalize_case(&raw);
        assert_eq!(merged.term_count(), 2);
        let apple = merged.postings("apple").unwrap();
        assert_eq!(apple["doc1"], vec![0, 4, 9]);
        assert_eq!(apple["doc2"], vec![3]);
        assert!(merged.postings("Apple").is_none());

        let report = case_merge_report(&raw, &merged);
        assert_eq!(report.reduction(), 1);
    }

    #[test]
    fn raw_json_layout() {
        let mut index = InvertedIndex::new();
        index.record("rust", "a1", 0);
        index.record("rust", "a1", 3);
        let json = serde_json::to_value(&index).unwrap();
        assert_eq!(json, serde_json::json!({"rust": {"a1": {"positions": [0, 3]}}}));

        let parsed: InvertedIndex =
            serde_json::from_str(r#"{"rust": {"a1": {"positions": [0, 3], "bm25": 1.2}}, "gone": {}}"#).unwrap();
        assert_eq!(parsed, index);
    }
}
