//! Tiered cache of the decoded index.
//!
//! Lookup order: process memory, shared cache store, local compressed artifact, raw JSON
//! index. A tier failure falls through to the next one; when every tier fails callers get an
//! empty snapshot and the failure is only logged.
//!
//! The decoded index is published as an immutable `Arc<IndexSnapshot>`. Loads are serialized
//! by a guard so concurrent first callers decode once, and `reset` swaps the snapshot out
//! instead of mutating it, so in-flight queries keep a consistent view.

use crate::codec::{self, CompressedIndex, DeltaPostings, IntDocId};
use crate::index::{DocId, InvertedIndex, TermPostings};
use crate::persist::{self, IndexPaths};
use crate::store::{SharedStore, DEFAULT_INDEX_KEY};
use anyhow::{anyhow, Result};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheState {
    Empty,
    Loading,
    Ready,
    Failed,
}

/// Tier a snapshot was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexSource {
    SharedStore,
    LocalArtifact,
    RawIndex,
    Unavailable,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub key: String,
    pub paths: IndexPaths,
}

impl CacheConfig {
    pub fn new(paths: IndexPaths) -> Self {
        Self { key: DEFAULT_INDEX_KEY.to_string(), paths }
    }
}

enum SnapshotPostings {
    Delta(HashMap<String, DeltaPostings>),
    Raw(InvertedIndex),
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub terms_count: usize,
    pub documents_count: usize,
    pub source: IndexSource,
}

/// One immutable decoded index plus its document ID bijection.
pub struct IndexSnapshot {
    postings: SnapshotPostings,
    doc_id_map: HashMap<DocId, IntDocId>,
    reverse: HashMap<IntDocId, DocId>,
    source: IndexSource,
}

impl IndexSnapshot {
    fn from_compressed(compressed: CompressedIndex, source: IndexSource) -> Self {
        let reverse = compressed.reverse_map();
        Self { postings: SnapshotPostings::Delta(compressed.index), doc_id_map: compressed.doc_id_map, reverse, source }
    }

    /// Raw tier: no remapping, postings are keyed by external IDs already.
    fn from_raw(index: InvertedIndex) -> Self {
        Self {
            postings: SnapshotPostings::Raw(index),
            doc_id_map: HashMap::new(),
            reverse: HashMap::new(),
            source: IndexSource::RawIndex,
        }
    }

    pub fn empty() -> Self { Self::from_raw(InvertedIndex::new()).with_source(IndexSource::Unavailable) }

    fn with_source(mut self, source: IndexSource) -> Self {
        self.source = source;
        self
    }

    pub fn source(&self) -> IndexSource { self.source }

    pub fn doc_id_map(&self) -> &HashMap<DocId, IntDocId> { &self.doc_id_map }

    pub fn term_count(&self) -> usize {
        match &self.postings {
            SnapshotPostings::Delta(index) => index.len(),
            SnapshotPostings::Raw(index) => index.term_count(),
        }
    }

    pub fn is_empty(&self) -> bool { self.term_count() == 0 }

    pub fn stats(&self) -> IndexStats {
        IndexStats { terms_count: self.term_count(), documents_count: self.doc_id_map.len(), source: self.source }
    }

    /// Absolute positions per external document ID. Absent terms yield an empty map.
    ///
    /// The term is lowercased first; if that misses, a case-insensitive scan over the keys
    /// covers indexes built before terms were case-normalized.
    pub fn term_postings(&self, term: &str) -> TermPostings {
        let wanted = term.to_lowercase();
        match &self.postings {
            SnapshotPostings::Delta(index) => {
                let found = index
                    .get(&wanted)
                    .or_else(|| index.iter().find(|(k, _)| k.to_lowercase() == wanted).map(|(_, v)| v));
                found.map(|postings| self.expand(postings)).unwrap_or_default()
            }
            SnapshotPostings::Raw(index) => index
                .postings(&wanted)
                .or_else(|| index.terms().find(|(k, _)| k.to_lowercase() == wanted).map(|(_, v)| v))
                .cloned()
                .unwrap_or_default(),
        }
    }

    fn expand(&self, postings: &DeltaPostings) -> TermPostings {
        postings
            .iter()
            .map(|(int_id, gaps)| {
                let doc = self.reverse.get(int_id).cloned().unwrap_or_else(|| {
                    tracing::debug!(int_id, "document id missing from reverse map");
                    int_id.to_string()
                });
                (doc, codec::delta_decode(gaps))
            })
            .collect()
    }
}

pub struct IndexCache {
    config: CacheConfig,
    store: Arc<dyn SharedStore>,
    snapshot: RwLock<Option<Arc<IndexSnapshot>>>,
    state: Mutex<CacheState>,
    load_guard: Mutex<()>,
}

impl IndexCache {
    pub fn new(config: CacheConfig, store: Arc<dyn SharedStore>) -> Self {
        Self {
            config,
            store,
            snapshot: RwLock::new(None),
            state: Mutex::new(CacheState::Empty),
            load_guard: Mutex::new(()),
        }
    }

    pub fn state(&self) -> CacheState { *self.state.lock() }

    fn set_state(&self, state: CacheState) { *self.state.lock() = state; }

    /// Returns the memoized snapshot, loading it through the tiers on first use.
    pub fn get_index(&self) -> Arc<IndexSnapshot> {
        if let Some(snapshot) = self.snapshot.read().as_ref() {
            return Arc::clone(snapshot);
        }
        let _guard = self.load_guard.lock();
        if let Some(snapshot) = self.snapshot.read().as_ref() {
            return Arc::clone(snapshot);
        }

        self.set_state(CacheState::Loading);
        match self.load_tiers() {
            Some(snapshot) => {
                let snapshot = Arc::new(snapshot);
                tracing::info!(
                    terms = snapshot.term_count(),
                    documents = snapshot.doc_id_map.len(),
                    source = ?snapshot.source,
                    "index loaded into memory"
                );
                *self.snapshot.write() = Some(Arc::clone(&snapshot));
                self.set_state(CacheState::Ready);
                snapshot
            }
            None => {
                tracing::error!("all index tiers failed; serving an empty index");
                self.set_state(CacheState::Failed);
                Arc::new(IndexSnapshot::empty())
            }
        }
    }

    pub fn get_term_postings(&self, term: &str) -> TermPostings { self.get_index().term_postings(term) }

    fn load_tiers(&self) -> Option<IndexSnapshot> {
        match self.load_from_store() {
            Ok(compressed) => return Some(IndexSnapshot::from_compressed(compressed, IndexSource::SharedStore)),
            Err(e) => tracing::warn!(error = %e, "shared cache store tier failed, trying local artifact"),
        }
        match self.load_from_artifact() {
            Ok(compressed) => return Some(IndexSnapshot::from_compressed(compressed, IndexSource::LocalArtifact)),
            Err(e) => tracing::warn!(error = %e, "local artifact tier failed, trying raw index"),
        }
        match persist::load_raw_index(&self.config.paths.raw_index()) {
            Ok(index) => Some(IndexSnapshot::from_raw(index)),
            Err(e) => {
                tracing::warn!(error = %e, "raw index tier failed");
                None
            }
        }
    }

    fn load_from_store(&self) -> Result<CompressedIndex> {
        let bytes = match self.store.get(&self.config.key)? {
            Some(bytes) => bytes,
            None => {
                self.load_into_store()?;
                self.store
                    .get(&self.config.key)?
                    .ok_or_else(|| anyhow!("key {} still absent after upload", self.config.key))?
            }
        };
        Ok(codec::decode(&bytes)?)
    }

    fn load_from_artifact(&self) -> Result<CompressedIndex> {
        let bytes = persist::load_artifact(&self.config.paths.artifact())?;
        Ok(codec::decode(&bytes)?)
    }

    pub fn is_in_store(&self) -> Result<bool> { Ok(self.store.exists(&self.config.key)?) }

    /// Uploads the local artifact to the shared store, compressing the raw index first if the
    /// artifact does not exist yet. Returns the uploaded size in bytes.
    pub fn load_into_store(&self) -> Result<usize> {
        let artifact = self.config.paths.artifact();
        if !artifact.exists() {
            tracing::info!(path = %artifact.display(), "artifact missing, compressing raw index");
            persist::optimize_index(&self.config.paths.raw_index(), &artifact)?;
        }
        let bytes = persist::load_artifact(&artifact)?;
        self.store.set(&self.config.key, &bytes)?;
        tracing::info!(key = %self.config.key, bytes = bytes.len(), "artifact uploaded to shared cache store");
        Ok(bytes.len())
    }

    /// Evicts and re-uploads the shared copy, then drops the in-memory snapshot so the next
    /// `get_index` repopulates it. The snapshot is cleared even when the re-upload fails.
    pub fn reset(&self) -> Result<()> {
        if let Err(e) = self.store.delete(&self.config.key) {
            tracing::warn!(error = %e, "failed to evict shared cache copy");
        }
        let reload = self.load_into_store();
        {
            let _guard = self.load_guard.lock();
            *self.snapshot.write() = None;
            self.set_state(CacheState::Empty);
        }
        reload.map(|_| ())
    }

    /// Makes sure the shared store holds the artifact, then loads the snapshot.
    pub fn warm(&self) -> Arc<IndexSnapshot> {
        match self.is_in_store() {
            Ok(true) => tracing::info!("index already present in shared cache store"),
            Ok(false) => {
                if let Err(e) = self.load_into_store() {
                    tracing::warn!(error = %e, "could not upload artifact while warming");
                }
            }
            Err(e) => tracing::warn!(error = %e, "shared cache store unreachable while warming"),
        }
        let snapshot = self.get_index();
        tracing::info!(terms = snapshot.term_count(), documents = snapshot.doc_id_map.len(), "index warm");
        snapshot
    }
}
