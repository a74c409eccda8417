use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use course_core::model::ProgressState;
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Serialize a snapshot into the persisted JSON payload.
///
/// # Errors
///
/// Returns `StorageError::Serialization` if encoding fails.
pub fn encode_snapshot(state: &ProgressState) -> Result<String, StorageError> {
    serde_json::to_string(state).map_err(|err| StorageError::Serialization(err.to_string()))
}

/// Parse a persisted JSON payload back into a snapshot.
///
/// # Errors
///
/// Returns `StorageError::Serialization` for malformed or mis-shaped payloads.
pub fn decode_snapshot(payload: &str) -> Result<ProgressState, StorageError> {
    serde_json::from_str(payload).map_err(|err| StorageError::Serialization(err.to_string()))
}

/// Repository contract for the single progress snapshot of a profile.
///
/// Writes replace the previous snapshot wholesale (last write wins).
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Fetch the stored snapshot, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend is unreachable or the payload is malformed.
    async fn load_snapshot(&self) -> Result<Option<ProgressState>, StorageError>;

    /// Overwrite the stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the snapshot cannot be stored.
    async fn save_snapshot(&self, state: &ProgressState) -> Result<(), StorageError>;

    /// Remove the stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend rejects the delete.
    async fn clear(&self) -> Result<(), StorageError>;
}

/// In-memory repository holding the raw JSON payload, for tests and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    payload: Arc<Mutex<Option<String>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the repository with an arbitrary payload, valid or not.
    #[must_use]
    pub fn with_raw_payload(payload: impl Into<String>) -> Self {
        Self {
            payload: Arc::new(Mutex::new(Some(payload.into()))),
        }
    }

    /// The currently stored payload, if any.
    #[must_use]
    pub fn raw_payload(&self) -> Option<String> {
        self.payload.lock().ok().and_then(|guard| guard.clone())
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn load_snapshot(&self) -> Result<Option<ProgressState>, StorageError> {
        let guard = self
            .payload
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.as_deref().map(decode_snapshot).transpose()
    }

    async fn save_snapshot(&self, state: &ProgressState) -> Result<(), StorageError> {
        let encoded = encode_snapshot(state)?;
        let mut guard = self
            .payload
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        *guard = Some(encoded);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        let mut guard = self
            .payload
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        *guard = None;
        Ok(())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn ProgressRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            progress: Arc::new(InMemoryRepository::new()),
        }
    }
}
