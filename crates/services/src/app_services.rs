use std::sync::Arc;

use storage::{ProgressStore, Storage};

use crate::Clock;
use crate::catalogue_service::QuizCatalogueService;
use crate::error::AppServicesError;
use crate::progress_service::ProgressService;

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    progress: Arc<ProgressService>,
    catalogue: Arc<QuizCatalogueService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage and load stored progress.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage, clock).await)
    }

    /// Build services over volatile storage.
    pub async fn in_memory(clock: Clock) -> Self {
        Self::from_storage(&Storage::in_memory(), clock).await
    }

    async fn from_storage(storage: &Storage, clock: Clock) -> Self {
        let store = ProgressStore::new(Arc::clone(&storage.progress));
        let progress = Arc::new(ProgressService::open(store, clock).await);
        Self {
            progress,
            catalogue: Arc::new(QuizCatalogueService::builtin()),
        }
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn catalogue(&self) -> Arc<QuizCatalogueService> {
        Arc::clone(&self.catalogue)
    }
}
