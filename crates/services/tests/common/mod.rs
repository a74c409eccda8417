use std::time::Duration;

use async_trait::async_trait;
use course_core::model::ProgressState;
use storage::{InMemoryRepository, ProgressRepository, StorageError};

/// In-memory repository whose reads and writes give up the runtime before
/// touching the payload, like a real database round trip.
#[derive(Clone, Default)]
pub struct YieldingRepository {
    inner: InMemoryRepository,
    save_delay: Option<Duration>,
}

impl YieldingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Saves sleep for `delay` instead of yielding once. Meant for paused time.
    pub fn with_save_delay(delay: Duration) -> Self {
        Self {
            inner: InMemoryRepository::new(),
            save_delay: Some(delay),
        }
    }

    pub async fn stored(&self) -> ProgressState {
        self.inner
            .load_snapshot()
            .await
            .unwrap()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ProgressRepository for YieldingRepository {
    async fn load_snapshot(&self) -> Result<Option<ProgressState>, StorageError> {
        tokio::task::yield_now().await;
        self.inner.load_snapshot().await
    }

    async fn save_snapshot(&self, state: &ProgressState) -> Result<(), StorageError> {
        match self.save_delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }
        self.inner.save_snapshot(state).await
    }

    async fn clear(&self) -> Result<(), StorageError> {
        tokio::task::yield_now().await;
        self.inner.clear().await
    }
}
