//! Document store: full article records looked up by content-derived ID.

use crate::error::StoreError;
use crate::index::{DocId, NewsRecord};
use parking_lot::RwLock;
use sha1::{Digest, Sha1};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

pub const MAX_SUGGESTIONS: usize = 10;

/// Stable identifier derived from title and publish timestamp.
pub fn content_id(title: &str, published_at: &str) -> DocId {
    let mut hasher = Sha1::new();
    hasher.update(title.as_bytes());
    hasher.update(published_at.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub trait DocumentStore: Send + Sync {
    /// Batched lookup. Unknown IDs are silently omitted; an empty set yields an empty list.
    fn fetch(&self, ids: &BTreeSet<DocId>) -> Result<Vec<NewsRecord>, StoreError>;

    /// Every record, for a full index build.
    fn scan(&self) -> Result<Vec<NewsRecord>, StoreError>;

    /// Inserts unless the ID is already present. Returns whether the record was new.
    fn insert(&self, record: NewsRecord) -> Result<bool, StoreError>;

    fn len(&self) -> Result<usize, StoreError>;

    fn is_empty(&self) -> Result<bool, StoreError> { Ok(self.len()? == 0) }

    /// Distinct titles containing `fragment` case-insensitively.
    fn suggest_titles(&self, fragment: &str, limit: usize) -> Result<Vec<String>, StoreError> {
        let needle = fragment.trim().to_lowercase();
        if needle.chars().count() < 2 {
            return Ok(Vec::new());
        }
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        for record in self.scan()? {
            if out.len() >= limit.min(MAX_SUGGESTIONS) {
                break;
            }
            if record.title.to_lowercase().contains(&needle) && seen.insert(record.title.clone()) {
                out.push(record.title);
            }
        }
        Ok(out)
    }
}

/// sled tree of bincode-encoded records keyed by document ID.
pub struct SledDocumentStore {
    db: sled::Db,
    tree: sled::Tree,
}

impl SledDocumentStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        let tree = db.open_tree("news")?;
        Ok(Self { db, tree })
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }
}

impl DocumentStore for SledDocumentStore {
    fn fetch(&self, ids: &BTreeSet<DocId>) -> Result<Vec<NewsRecord>, StoreError> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(bytes) = self.tree.get(id.as_bytes())? {
                out.push(bincode::deserialize(&bytes)?);
            }
        }
        Ok(out)
    }

    fn scan(&self) -> Result<Vec<NewsRecord>, StoreError> {
        let mut out = Vec::with_capacity(self.tree.len());
        for entry in self.tree.iter() {
            let (_, bytes) = entry?;
            out.push(bincode::deserialize(&bytes)?);
        }
        Ok(out)
    }

    fn insert(&self, record: NewsRecord) -> Result<bool, StoreError> {
        let bytes = bincode::serialize(&record)?;
        let outcome = self.tree.compare_and_swap(record.id.as_bytes(), None as Option<&[u8]>, Some(bytes))?;
        Ok(outcome.is_ok())
    }

    fn len(&self) -> Result<usize, StoreError> { Ok(self.tree.len()) }
}

#[derive(Default)]
pub struct MemoryDocumentStore {
    records: RwLock<BTreeMap<DocId, NewsRecord>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self { Self::default() }

    pub fn with_records<I: IntoIterator<Item = NewsRecord>>(records: I) -> Self {
        let store = Self::new();
        store.records.write().extend(records.into_iter().map(|r| (r.id.clone(), r)));
        store
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn fetch(&self, ids: &BTreeSet<DocId>) -> Result<Vec<NewsRecord>, StoreError> {
        let records = self.records.read();
        Ok(ids.iter().filter_map(|id| records.get(id).cloned()).collect())
    }

    fn scan(&self) -> Result<Vec<NewsRecord>, StoreError> { Ok(self.records.read().values().cloned().collect()) }

    fn insert(&self, record: NewsRecord) -> Result<bool, StoreError> {
        let mut records = self.records.write();
        if records.contains_key(&record.id) {
            return Ok(false);
        }
        records.insert(record.id.clone(), record);
        Ok(true)
    }

    fn len(&self) -> Result<usize, StoreError> { Ok(self.records.read().len()) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(title: &str, published_at: &str) -> NewsRecord {
        NewsRecord {
            id: content_id(title, published_at),
            title: title.into(),
            published_at: published_at.into(),
            content: "body".into(),
            ..Default::default()
        }
    }

    #[test]
    fn content_id_is_stable() {
        assert_eq!(content_id("a", "2024"), content_id("a", "2024"));
        assert_ne!(content_id("a", "2024"), content_id("a", "2025"));
        assert_eq!(content_id("a", "2024").len(), 40);
    }

    #[test]
    fn sled_store_dedups_and_skips_missing() {
        let dir = tempdir().unwrap();
        let store = SledDocumentStore::open(dir.path().join("news.sled")).unwrap();
        let first = record("Rates rise", "2024-05-01T00:00:00Z");
        assert!(store.insert(first.clone()).unwrap());
        assert!(!store.insert(first.clone()).unwrap());
        assert_eq!(store.len().unwrap(), 1);

        let ids: BTreeSet<DocId> = [first.id.clone(), "missing".to_string()].into_iter().collect();
        let fetched = store.fetch(&ids).unwrap();
        assert_eq!(fetched, vec![first]);
        assert!(store.fetch(&BTreeSet::new()).unwrap().is_empty());
    }

    #[test]
    fn suggestions_are_distinct_and_need_two_chars() {
        let store = MemoryDocumentStore::with_records([
            record("Rates rise again", "1"),
            record("Rates rise again", "2"),
            record("Markets rally", "3"),
        ]);
        assert_eq!(store.suggest_titles("RATES", 10).unwrap(), vec!["Rates rise again".to_string()]);
        assert!(store.suggest_titles("r", 10).unwrap().is_empty());
    }
}
