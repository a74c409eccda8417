use std::sync::Arc;

use course_core::model::ProgressState;
use tracing::{debug, error, warn};

use crate::repository::ProgressRepository;

/// Durable home of the progress snapshot.
///
/// Never fails towards callers: unreadable data loads as an empty snapshot and
/// failed writes are logged and reported as `false`.
#[derive(Clone)]
pub struct ProgressStore {
    repo: Arc<dyn ProgressRepository>,
}

impl ProgressStore {
    #[must_use]
    pub fn new(repo: Arc<dyn ProgressRepository>) -> Self {
        Self { repo }
    }

    pub async fn load(&self) -> ProgressState {
        match self.repo.load_snapshot().await {
            Ok(Some(state)) => {
                debug!(subjects = state.subjects.len(), "loaded progress snapshot");
                state
            }
            Ok(None) => {
                debug!("no progress snapshot stored, starting empty");
                ProgressState::default()
            }
            Err(err) => {
                warn!(error = %err, "progress snapshot unreadable, starting empty");
                ProgressState::default()
            }
        }
    }

    /// Overwrite the stored snapshot. Returns whether the write went through.
    pub async fn save(&self, state: &ProgressState) -> bool {
        match self.repo.save_snapshot(state).await {
            Ok(()) => true,
            Err(err) => {
                error!(error = %err, "failed to persist progress snapshot");
                false
            }
        }
    }

    pub async fn clear(&self) -> bool {
        match self.repo.clear().await {
            Ok(()) => true,
            Err(err) => {
                error!(error = %err, "failed to clear progress snapshot");
                false
            }
        }
    }
}
