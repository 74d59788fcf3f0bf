use crate::docstore::DocumentStore;
use crate::error::StoreError;
use crate::index::{DocId, InvertedIndex, NewsRecord, Position};
use crate::tokenizer::normalize;
use std::collections::BTreeMap;

/// Result of a full corpus scan.
#[derive(Debug, Default)]
pub struct BuildOutput {
    pub index: InvertedIndex,
    pub doc_lengths: BTreeMap<DocId, usize>,
    /// Mean normalized token count; 1.0 for an empty corpus.
    pub avg_doc_length: f64,
}

impl BuildOutput {
    pub fn num_docs(&self) -> usize { self.doc_lengths.len() }
}

/// Builds the positional index over `title + " " + content` of every document.
pub fn build<'a, I>(documents: I) -> BuildOutput
where
    I: IntoIterator<Item = &'a NewsRecord>,
{
    let mut index = InvertedIndex::new();
    let mut doc_lengths = BTreeMap::new();
    let mut total_tokens = 0usize;

    for doc in documents {
        let tokens = normalize(&format!("{} {}", doc.title, doc.content));
        total_tokens += tokens.len();
        for (pos, term) in tokens.iter().enumerate() {
            index.record(term, &doc.id, pos as Position);
        }
        doc_lengths.insert(doc.id.clone(), tokens.len());
    }

    let avg_doc_length = if doc_lengths.is_empty() { 1.0 } else { total_tokens as f64 / doc_lengths.len() as f64 };
    tracing::info!(num_docs = doc_lengths.len(), num_terms = index.term_count(), avg_doc_length, "built positional index");
    BuildOutput { index, doc_lengths, avg_doc_length }
}

pub fn build_from_store(store: &dyn DocumentStore) -> Result<BuildOutput, StoreError> {
    let documents = store.scan()?;
    Ok(build(&documents))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, title: &str, content: &str) -> NewsRecord {
        NewsRecord { id: id.into(), title: title.into(), content: content.into(), ..Default::default() }
    }

    #[test]
    fn records_positions_over_title_and_content() {
        let docs = vec![doc("d1", "Rust Release", "the rust compiler ships"), doc("d2", "Markets", "stocks fall")];
        let out = build(&docs);

        // d1 tokens: rust release rust compil ship
        let rust = out.index.postings("rust").unwrap();
        assert_eq!(rust["d1"], vec![0, 2]);
        assert_eq!(out.doc_lengths["d1"], 5);
        assert_eq!(out.doc_lengths["d2"], 3);
        assert!((out.avg_doc_length - 4.0).abs() < 1e-9);
    }

    #[test]
    fn empty_corpus_average_is_one() {
        let out = build(std::iter::empty::<&NewsRecord>());
        assert_eq!(out.num_docs(), 0);
        assert_eq!(out.avg_doc_length, 1.0);
        assert!(out.index.is_empty());
    }
}
