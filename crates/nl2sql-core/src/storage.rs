use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;

use crate::record::ConnectionRecord;

/// Errors produced by config store implementations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Underlying storage failure (filesystem, key material).
    #[error("storage failure: {reason}")]
    Storage { reason: String },
}

/// Outcome of reading the stored configuration.
///
/// Unreadable data (wrong key, truncated or tampered file) is reported as
/// `Absent`, the same as a configuration that was never saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Loaded {
    Present(ConnectionRecord),
    Absent,
}

impl Loaded {
    pub fn into_option(self) -> Option<ConnectionRecord> {
        match self {
            Loaded::Present(record) => Some(record),
            Loaded::Absent => None,
        }
    }
}

/// Contract for the single-record, encrypted-at-rest connection store.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Replace the stored record wholesale.
    async fn save(&self, record: &ConnectionRecord) -> Result<(), StoreError>;

    /// Read the stored record, if a readable one exists.
    async fn load(&self) -> Result<Loaded, StoreError>;
}

/// In-memory config store for tests and smoke runs. Not encrypted.
#[derive(Debug, Default, Clone)]
pub struct InMemoryConfigStore {
    inner: Arc<Mutex<Option<ConnectionRecord>>>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: ConnectionRecord) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(record))),
        }
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn save(&self, record: &ConnectionRecord) -> Result<(), StoreError> {
        let mut slot = self.inner.lock().map_err(|err| StoreError::Storage {
            reason: format!("lock poisoned: {err}"),
        })?;
        *slot = Some(record.clone());
        Ok(())
    }

    async fn load(&self) -> Result<Loaded, StoreError> {
        let slot = self.inner.lock().map_err(|err| StoreError::Storage {
            reason: format!("lock poisoned: {err}"),
        })?;
        Ok(match slot.as_ref() {
            Some(record) => Loaded::Present(record.clone()),
            None => Loaded::Absent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(user: &str) -> ConnectionRecord {
        ConnectionRecord {
            user: user.into(),
            password: "pw".into(),
            host: "localhost".into(),
            port: "3306".into(),
            database: "shop".into(),
        }
    }

    #[tokio::test]
    async fn empty_store_is_absent() {
        let store = InMemoryConfigStore::new();
        assert_eq!(store.load().await.expect("load"), Loaded::Absent);
    }

    #[tokio::test]
    async fn save_replaces_previous_record() {
        let store = InMemoryConfigStore::new();
        store.save(&record("first")).await.expect("save");
        store.save(&record("second")).await.expect("save");

        let loaded = store.load().await.expect("load").into_option();
        assert_eq!(loaded, Some(record("second")));
    }
}
