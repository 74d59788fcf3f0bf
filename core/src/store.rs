//! Shared key/value cache store holding the compressed artifact blob.

use crate::error::StoreError;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Duration;

pub const DEFAULT_INDEX_KEY: &str = "inverted_index";

pub trait SharedStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;
    fn delete(&self, key: &str) -> Result<(), StoreError>;
    fn exists(&self, key: &str) -> Result<bool, StoreError>;
}

/// Redis (or Valkey) backed store. Every call opens a bounded-time connection.
pub struct RedisStore {
    client: redis::Client,
    timeout: Duration,
}

impl RedisStore {
    pub fn open(url: &str) -> Result<Self, StoreError> {
        Ok(Self { client: redis::Client::open(url)?, timeout: Duration::from_secs(5) })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn connection(&self) -> Result<redis::Connection, StoreError> {
        let conn = self.client.get_connection_with_timeout(self.timeout)?;
        conn.set_read_timeout(Some(self.timeout))?;
        conn.set_write_timeout(Some(self.timeout))?;
        Ok(conn)
    }
}

impl SharedStore for RedisStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self.connection()?;
        Ok(redis::cmd("GET").arg(key).query::<Option<Vec<u8>>>(&mut conn)?)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut conn = self.connection()?;
        redis::cmd("SET").arg(key).arg(value).query::<()>(&mut conn)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.connection()?;
        redis::cmd("DEL").arg(key).query::<i64>(&mut conn)?;
        Ok(())
    }

    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.connection()?;
        Ok(redis::cmd("EXISTS").arg(key).query::<i64>(&mut conn)? > 0)
    }
}

/// In-process store, for tests and single-binary deployments that still want the tier.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }
}

impl SharedStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> { Ok(self.entries.read().get(key).cloned()) }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.entries.write().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn exists(&self, key: &str) -> Result<bool, StoreError> { Ok(self.entries.read().contains_key(key)) }
}

/// Pure-local deployment: the tier is always unavailable, so loads go straight to disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalOnlyStore;

impl SharedStore for LocalOnlyStore {
    fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Err(StoreError::Unavailable("no shared cache store configured".into()))
    }

    fn set(&self, _key: &str, _value: &[u8]) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("no shared cache store configured".into()))
    }

    fn delete(&self, _key: &str) -> Result<(), StoreError> { Ok(()) }

    fn exists(&self, _key: &str) -> Result<bool, StoreError> { Ok(false) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert!(!store.exists(DEFAULT_INDEX_KEY).unwrap());
        store.set(DEFAULT_INDEX_KEY, b"blob").unwrap();
        assert_eq!(store.get(DEFAULT_INDEX_KEY).unwrap().as_deref(), Some(&b"blob"[..]));
        store.delete(DEFAULT_INDEX_KEY).unwrap();
        assert!(store.get(DEFAULT_INDEX_KEY).unwrap().is_none());
    }

    #[test]
    fn unreachable_redis_fails_within_timeout() {
        let store = RedisStore::open("redis://127.0.0.1:1/").unwrap().with_timeout(Duration::from_millis(200));
        assert_eq!(store.timeout, Duration::from_millis(200));
        assert!(store.get(DEFAULT_INDEX_KEY).is_err());
        assert!(store.exists(DEFAULT_INDEX_KEY).is_err());
    }

    #[test]
    fn local_only_is_unavailable() {
        assert!(LocalOnlyStore.get(DEFAULT_INDEX_KEY).is_err());
        assert!(!LocalOnlyStore.exists(DEFAULT_INDEX_KEY).unwrap());
    }
}
