use thiserror::Error;

/// Failure of an external collaborator: document store, shared cache store or local disk.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("sled: {0}")]
    Sled(#[from] sled::Error),
    #[error("record encoding: {0}")]
    Encoding(#[from] bincode::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("corrupt compressed artifact: {0}")]
    Decompress(#[from] flate2::DecompressError),
    #[error("compressed artifact is truncated")]
    Truncated,
    #[error("artifact payload does not decode: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
    #[error("artifact payload does not encode: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum SearchError {
    /// The query was routed to a mode whose syntax it does not satisfy.
    #[error("invalid {mode} query format: {query:?}")]
    InvalidFormat { mode: &'static str, query: String },
    #[error("no valid keywords in the query")]
    NoValidKeywords,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SearchError {
    pub fn invalid(mode: &'static str, query: &str) -> Self {
        SearchError::InvalidFormat { mode, query: query.to_string() }
    }
}
