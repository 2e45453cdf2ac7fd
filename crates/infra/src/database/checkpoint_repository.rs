//! SQLite implementation of the checkpoint store port.

use std::sync::Arc;

use async_trait::async_trait;
use darceo_core::CheckpointStore;
use darceo_domain::{ItemId, Result, WorkCycleCheckpoint, WorkerName};
use rusqlite::{params, OptionalExtension, Row};

use super::manager::{
    map_sql_error, millis_column, optional_millis_column, to_millis, with_connection, DbManager,
};

const SELECT_COLUMNS: &str =
    "SELECT worker_name, cursor_item_id, started_on, updated_on, finished_on FROM work_cycle_checkpoints";

const UPSERT_SQL: &str = "INSERT INTO work_cycle_checkpoints
        (worker_name, cursor_item_id, started_on, updated_on, finished_on)
    VALUES (?1, ?2, ?3, ?4, ?5)
    ON CONFLICT(worker_name) DO UPDATE SET
        cursor_item_id = excluded.cursor_item_id,
        started_on = excluded.started_on,
        updated_on = excluded.updated_on,
        finished_on = excluded.finished_on";

/// Checkpoints stored in the `work_cycle_checkpoints` table.
pub struct SqliteCheckpointRepository {
    db: Arc<DbManager>,
}

impl SqliteCheckpointRepository {
    /// Construct a repository backed by the shared manager.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointRepository {
    async fn load(&self, worker: &WorkerName) -> Result<Option<WorkCycleCheckpoint>> {
        let worker = worker.clone();

        with_connection(&self.db, move |conn| {
            conn.query_row(
                &format!("{SELECT_COLUMNS} WHERE worker_name = ?1"),
                params![worker.as_str()],
                map_checkpoint_row,
            )
            .optional()
            .map_err(map_sql_error)
        })
        .await
    }

    async fn save(&self, checkpoint: &WorkCycleCheckpoint) -> Result<()> {
        let checkpoint = checkpoint.clone();

        with_connection(&self.db, move |conn| {
            conn.execute(
                UPSERT_SQL,
                params![
                    checkpoint.worker_name.as_str(),
                    checkpoint.cursor.as_ref().map(ItemId::as_str),
                    to_millis(checkpoint.started_on),
                    checkpoint.updated_on.map(to_millis),
                    checkpoint.finished_on.map(to_millis),
                ],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, worker: &WorkerName) -> Result<bool> {
        let worker = worker.clone();

        with_connection(&self.db, move |conn| {
            let removed = conn
                .execute(
                    "DELETE FROM work_cycle_checkpoints WHERE worker_name = ?1",
                    params![worker.as_str()],
                )
                .map_err(map_sql_error)?;
            Ok(removed > 0)
        })
        .await
    }

    async fn list_unfinished(&self) -> Result<Vec<WorkCycleCheckpoint>> {
        with_connection(&self.db, move |conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "{SELECT_COLUMNS} WHERE finished_on IS NULL ORDER BY worker_name ASC"
                ))
                .map_err(map_sql_error)?;
            let rows = stmt.query_map([], map_checkpoint_row).map_err(map_sql_error)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
        })
        .await
    }
}

fn map_checkpoint_row(row: &Row<'_>) -> rusqlite::Result<WorkCycleCheckpoint> {
    Ok(WorkCycleCheckpoint {
        worker_name: WorkerName::new(row.get::<_, String>(0)?),
        cursor: row.get::<_, Option<String>>(1)?.map(ItemId::new),
        started_on: millis_column(row, 2)?,
        updated_on: optional_millis_column(row, 3)?,
        finished_on: optional_millis_column(row, 4)?,
    })
}
