use async_trait::async_trait;
use chrono::Utc;
use course_core::model::ProgressState;
use sqlx::Row;

use crate::repository::{ProgressRepository, StorageError, decode_snapshot, encode_snapshot};

use super::SqliteRepository;

const SNAPSHOT_ROW_ID: i64 = 1;

#[async_trait]
impl ProgressRepository for SqliteRepository {
    async fn load_snapshot(&self) -> Result<Option<ProgressState>, StorageError> {
        let row = sqlx::query("SELECT payload FROM progress_snapshots WHERE id = ?1")
            .bind(SNAPSHOT_ROW_ID)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let payload: String = row
            .try_get("payload")
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        decode_snapshot(&payload).map(Some)
    }

    async fn save_snapshot(&self, state: &ProgressState) -> Result<(), StorageError> {
        let payload = encode_snapshot(state)?;
        sqlx::query(
            r"
            INSERT INTO progress_snapshots (id, payload, saved_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET
                payload = excluded.payload,
                saved_at = excluded.saved_at
            ",
        )
        .bind(SNAPSHOT_ROW_ID)
        .bind(payload)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM progress_snapshots WHERE id = ?1")
            .bind(SNAPSHOT_ROW_ID)
            .execute(&self.pool)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;
        Ok(())
    }
}
