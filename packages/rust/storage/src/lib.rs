//! libSQL storage layer for ingested submissions.
//!
//! [`SqliteStore`] wraps a local libSQL database holding the append-only
//! submissions table and the ingestion run history. It implements the
//! core [`RecordStore`] contract; the `id` PRIMARY KEY enforces uniqueness
//! at the storage layer, independent of any in-process check.

mod migrations;

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database, params};
use uuid::Uuid;

use subharvest_core::ports::RecordStore;
use subharvest_shared::{Result, Submission, SubharvestError};

/// Primary storage handle wrapping a libSQL database.
pub struct SqliteStore {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

/// One row of the ingestion run history.
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: String,
    pub subreddit: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub stats_json: Option<String>,
}

impl SqliteStore {
    /// Open or create a database at `path` and bring the schema up to date.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| SubharvestError::io(parent, e))?;
            }
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        let store = Self { db, conn };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run pending schema migrations. Idempotent.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    SubharvestError::storage(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    // -----------------------------------------------------------------------
    // Run history
    // -----------------------------------------------------------------------

    /// Insert a new ingestion run. Returns the generated run id.
    pub async fn insert_run(&self, subreddit: &str) -> Result<String> {
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO ingest_runs (id, subreddit, started_at) VALUES (?1, ?2, ?3)",
                params![id.as_str(), subreddit, now.as_str()],
            )
            .await
            .map_err(storage_err)?;
        Ok(id)
    }

    /// Mark a run finished and attach its stats payload.
    pub async fn finish_run(&self, run_id: &str, stats_json: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE ingest_runs SET finished_at = ?1, stats_json = ?2 WHERE id = ?3",
                params![now.as_str(), stats_json, run_id],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// The most recent ingestion runs, newest first.
    pub async fn recent_runs(&self, count: u32) -> Result<Vec<RunRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, subreddit, started_at, finished_at, stats_json
                 FROM ingest_runs ORDER BY started_at DESC LIMIT ?1",
                params![count as i64],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            results.push(RunRecord {
                id: row.get::<String>(0).map_err(storage_err)?,
                subreddit: row.get::<String>(1).map_err(storage_err)?,
                started_at: row.get::<String>(2).map_err(storage_err)?,
                finished_at: row.get::<String>(3).ok(),
                stats_json: row.get::<String>(4).ok(),
            });
        }
        Ok(results)
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn existing_ids(&self) -> Result<HashSet<String>> {
        let mut rows = self
            .conn
            .query("SELECT id FROM submissions", params![])
            .await
            .map_err(storage_err)?;

        let mut ids = HashSet::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            ids.insert(row.get::<String>(0).map_err(storage_err)?);
        }
        Ok(ids)
    }

    async fn insert_many(&self, records: &[Submission]) -> Result<()> {
        let tx = self.conn.transaction().await.map_err(storage_err)?;

        for record in records {
            let outcome = tx
                .execute(
                    "INSERT INTO submissions
                     (id, title, score, url, num_comments, created_utc, author, body)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        record.id.as_str(),
                        record.title.as_str(),
                        record.score,
                        record.url.as_str(),
                        record.num_comments,
                        record.created_utc,
                        record.author.as_deref(),
                        record.body.as_deref(),
                    ],
                )
                .await;

            if let Err(e) = outcome {
                // Dropping the transaction rolls the whole batch back.
                let message = e.to_string();
                return Err(if message.contains("UNIQUE constraint failed") {
                    SubharvestError::Duplicate {
                        id: record.id.clone(),
                    }
                } else {
                    SubharvestError::Storage(message)
                });
            }
        }

        tx.commit().await.map_err(storage_err)
    }

    async fn read_all(&self) -> Result<Vec<Submission>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, title, score, url, num_comments, created_utc, author, body
                 FROM submissions",
                params![],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            results.push(row_to_submission(&row)?);
        }
        Ok(results)
    }
}

fn storage_err(e: libsql::Error) -> SubharvestError {
    SubharvestError::Storage(e.to_string())
}

/// Convert a database row to a [`Submission`].
fn row_to_submission(row: &libsql::Row) -> Result<Submission> {
    Ok(Submission {
        id: row.get::<String>(0).map_err(storage_err)?,
        title: row.get::<String>(1).map_err(storage_err)?,
        score: row.get::<i64>(2).map_err(storage_err)?,
        url: row.get::<String>(3).map_err(storage_err)?,
        num_comments: row.get::<i64>(4).map_err(storage_err)?,
        created_utc: row.get::<f64>(5).map_err(storage_err)?,
        author: row.get::<String>(6).ok(),
        body: row.get::<String>(7).ok(),
    })
}
