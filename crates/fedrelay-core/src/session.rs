//! Session storage capability.
//!
//! The federation subsystem never owns protocol state between requests: the
//! initiation→callback binding and the resulting user identity live in the
//! caller's session, behind this opaque key/value interface. Production
//! deployments back it with a shared cache; the in-memory implementation
//! covers single-node use and tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Session store failure. The backend is opaque to callers, so there is a
/// single error shape carrying the backend's message.
#[derive(Debug, thiserror::Error)]
#[error("session store error: {0}")]
pub struct SessionError(pub String);

/// Opaque key/value session store.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Look up a value. Absent keys yield `Ok(None)`.
    async fn get(&self, key: &str) -> Result<Option<Value>, SessionError>;

    /// Store a value under a key, replacing any previous value.
    async fn set(&self, key: &str, value: Value) -> Result<(), SessionError>;

    /// Store several entries atomically with respect to readers.
    async fn set_batch(&self, entries: HashMap<String, Value>) -> Result<(), SessionError>;

    /// Remove a key, returning the removed value.
    ///
    /// This is the consume-once primitive: callback processing removes the
    /// initiation binding before using it, so a replayed callback finds
    /// nothing.
    async fn remove(&self, key: &str) -> Result<Option<Value>, SessionError>;
}

/// Shared handle to a session store.
pub type SharedSessionStore = Arc<dyn SessionStore>;

/// In-memory session store for single-node deployments and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemorySessionStore {
    entries: Arc<RwLock<HashMap<String, Value>>>,
}

impl InMemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, SessionError> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), SessionError> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn set_batch(&self, batch: HashMap<String, Value>) -> Result<(), SessionError> {
        let mut entries = self.entries.write().await;
        entries.extend(batch);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<Option<Value>, SessionError> {
        let mut entries = self.entries.write().await;
        Ok(entries.remove(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_then_get() {
        let store = InMemorySessionStore::new();
        store.set("k", json!({"state": "abc"})).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!({"state": "abc"})));
    }

    #[tokio::test]
    async fn test_get_absent_key_is_none() {
        let store = InMemorySessionStore::new();
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_remove_consumes_exactly_once() {
        let store = InMemorySessionStore::new();
        store.set("binding", json!("v")).await.unwrap();

        let first = store.remove("binding").await.unwrap();
        assert_eq!(first, Some(json!("v")));

        // Second removal finds nothing: replay protection relies on this
        let second = store.remove("binding").await.unwrap();
        assert_eq!(second, None);
    }

    #[tokio::test]
    async fn test_set_batch_stores_all_entries() {
        let store = InMemorySessionStore::new();
        let mut batch = HashMap::new();
        batch.insert("user.subject".to_string(), json!("alice@fed-1"));
        batch.insert("user.auth_time".to_string(), json!(1_700_000_000));
        store.set_batch(batch).await.unwrap();

        assert_eq!(
            store.get("user.subject").await.unwrap(),
            Some(json!("alice@fed-1"))
        );
        assert_eq!(
            store.get("user.auth_time").await.unwrap(),
            Some(json!(1_700_000_000))
        );
    }
}
