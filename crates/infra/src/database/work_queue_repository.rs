//! SQLite implementation of the work queue port.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use darceo_core::WorkQueueStore;
use darceo_domain::{ItemId, PendingWorkItem, Result, WorkerName};
use rusqlite::{params, OptionalExtension, Row};
use tracing::debug;

use super::manager::{
    map_sql_error, millis_column, optional_millis_column, to_millis, with_connection, DbManager,
};

const FIND_FIRST_SQL: &str = "SELECT item_id, discovered_on, started_on, finished_on
    FROM pending_work_items
    WHERE worker_name = ?1
    ORDER BY discovered_on ASC, item_id ASC
    LIMIT 1";

// A cursor missing from the queue makes the subquery NULL, so nothing matches.
const FIND_AFTER_SQL: &str = "SELECT item_id, discovered_on, started_on, finished_on
    FROM pending_work_items
    WHERE worker_name = ?1
      AND (discovered_on, item_id) > (
          SELECT discovered_on, item_id FROM pending_work_items
          WHERE worker_name = ?1 AND item_id = ?2
      )
    ORDER BY discovered_on ASC, item_id ASC
    LIMIT 1";

const INSERT_SQL: &str = "INSERT OR IGNORE INTO pending_work_items
    (worker_name, item_id, discovered_on, started_on, finished_on)
    VALUES (?1, ?2, ?3, ?4, ?5)";

/// Work queue stored in the `pending_work_items` table.
pub struct SqliteWorkQueueRepository {
    db: Arc<DbManager>,
}

impl SqliteWorkQueueRepository {
    /// Construct a repository backed by the shared manager.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl WorkQueueStore for SqliteWorkQueueRepository {
    async fn enqueue(&self, worker: &WorkerName, items: &[PendingWorkItem]) -> Result<usize> {
        let worker = worker.clone();
        let items = items.to_vec();

        with_connection(&self.db, move |conn| {
            let tx = conn.transaction().map_err(map_sql_error)?;
            let mut inserted = 0;
            {
                let mut stmt = tx.prepare_cached(INSERT_SQL).map_err(map_sql_error)?;
                for item in &items {
                    inserted += stmt
                        .execute(params![
                            worker.as_str(),
                            item.item_id.as_str(),
                            to_millis(item.discovered_on),
                            item.started_on.map(to_millis),
                            item.finished_on.map(to_millis),
                        ])
                        .map_err(map_sql_error)?;
                }
            }
            tx.commit().map_err(map_sql_error)?;
            debug!(worker = %worker, inserted, offered = items.len(), "work items enqueued");
            Ok(inserted)
        })
        .await
    }

    async fn find_next(
        &self,
        worker: &WorkerName,
        after: Option<&ItemId>,
    ) -> Result<Option<PendingWorkItem>> {
        let worker = worker.clone();
        let after = after.cloned();

        with_connection(&self.db, move |conn| {
            let found = match &after {
                None => conn
                    .query_row(FIND_FIRST_SQL, params![worker.as_str()], map_item_row)
                    .optional(),
                Some(cursor) => conn
                    .query_row(
                        FIND_AFTER_SQL,
                        params![worker.as_str(), cursor.as_str()],
                        map_item_row,
                    )
                    .optional(),
            };
            found.map_err(map_sql_error)
        })
        .await
    }

    async fn mark_processed(
        &self,
        worker: &WorkerName,
        item: &ItemId,
        started_on: DateTime<Utc>,
        finished_on: DateTime<Utc>,
    ) -> Result<()> {
        let worker = worker.clone();
        let item = item.clone();

        with_connection(&self.db, move |conn| {
            conn.execute(
                "UPDATE pending_work_items SET started_on = ?3, finished_on = ?4
                 WHERE worker_name = ?1 AND item_id = ?2",
                params![
                    worker.as_str(),
                    item.as_str(),
                    to_millis(started_on),
                    to_millis(finished_on)
                ],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
    }

    async fn count_all(&self, worker: &WorkerName) -> Result<u64> {
        let worker = worker.clone();

        with_connection(&self.db, move |conn| {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM pending_work_items WHERE worker_name = ?1",
                    params![worker.as_str()],
                    |row| row.get(0),
                )
                .map_err(map_sql_error)?;
            Ok(u64::try_from(count).unwrap_or(0))
        })
        .await
    }

    async fn delete_all(&self, worker: &WorkerName) -> Result<u64> {
        let worker = worker.clone();

        with_connection(&self.db, move |conn| {
            let removed = conn
                .execute(
                    "DELETE FROM pending_work_items WHERE worker_name = ?1",
                    params![worker.as_str()],
                )
                .map_err(map_sql_error)?;
            Ok(removed as u64)
        })
        .await
    }

    async fn first_started(&self, worker: &WorkerName) -> Result<Option<DateTime<Utc>>> {
        self.aggregate_timestamp(
            "SELECT MIN(started_on) FROM pending_work_items WHERE worker_name = ?1",
            worker,
        )
        .await
    }

    async fn last_finished(&self, worker: &WorkerName) -> Result<Option<DateTime<Utc>>> {
        self.aggregate_timestamp(
            "SELECT MAX(finished_on) FROM pending_work_items WHERE worker_name = ?1",
            worker,
        )
        .await
    }
}

impl SqliteWorkQueueRepository {
    async fn aggregate_timestamp(
        &self,
        sql: &'static str,
        worker: &WorkerName,
    ) -> Result<Option<DateTime<Utc>>> {
        let worker = worker.clone();

        with_connection(&self.db, move |conn| {
            conn.query_row(sql, params![worker.as_str()], |row| optional_millis_column(row, 0))
                .map_err(map_sql_error)
        })
        .await
    }
}

fn map_item_row(row: &Row<'_>) -> rusqlite::Result<PendingWorkItem> {
    Ok(PendingWorkItem {
        item_id: ItemId::new(row.get::<_, String>(0)?),
        discovered_on: millis_column(row, 1)?,
        started_on: optional_millis_column(row, 2)?,
        finished_on: optional_millis_column(row, 3)?,
    })
}
