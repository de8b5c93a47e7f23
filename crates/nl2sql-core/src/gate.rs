//! Guard for operations that need a stored connection record.

use std::{future::Future, sync::Arc};

use thiserror::Error;
use tracing::debug;

use crate::{
    record::ConnectionRecord,
    storage::{ConfigStore, Loaded, StoreError},
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GateError {
    /// No readable configuration exists; the caller should ask for one.
    #[error("Database not configured")]
    NotConfigured,
    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// Blocks configuration-dependent work until a record has been saved.
///
/// The record is reloaded on every call so a new `save` applies to the very
/// next request.
#[derive(Clone)]
pub struct AccessGate {
    store: Arc<dyn ConfigStore>,
}

impl AccessGate {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn ConfigStore> {
        &self.store
    }

    /// Load the current record or fail with `NotConfigured`.
    pub async fn require(&self) -> Result<ConnectionRecord, GateError> {
        match self.store.load().await? {
            Loaded::Present(record) => Ok(record),
            Loaded::Absent => {
                debug!("no stored connection record");
                Err(GateError::NotConfigured)
            }
        }
    }

    /// Run `op` with the current record. `op` is never invoked when the store
    /// has no readable record.
    pub async fn run<F, Fut, T>(&self, op: F) -> Result<T, GateError>
    where
        F: FnOnce(ConnectionRecord) -> Fut,
        Fut: Future<Output = T>,
    {
        let record = self.require().await?;
        Ok(op(record).await)
    }
}
