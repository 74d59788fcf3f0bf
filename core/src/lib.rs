//! Positional full-text index and query pipeline for a news-article corpus.

pub mod builder;
pub mod cache;
pub mod codec;
pub mod docstore;
pub mod error;
pub mod index;
pub mod persist;
pub mod query;
pub mod rank;
pub mod search;
pub mod store;
pub mod tokenizer;

pub use error::{CodecError, SearchError, StoreError};
pub use index::{DocId, InvertedIndex, NewsRecord, Position, PositionList, TermPostings};
