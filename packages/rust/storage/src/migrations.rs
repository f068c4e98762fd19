//! SQL migration definitions for the submissions database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements executed as one batch.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: submissions, ingest_runs",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Ingested submissions, append-only. The PRIMARY KEY on id is the
-- uniqueness backstop for concurrent runs racing on the same
-- existence-check snapshot.
CREATE TABLE IF NOT EXISTS submissions (
    id           TEXT PRIMARY KEY,
    title        TEXT NOT NULL,
    score        INTEGER NOT NULL,
    url          TEXT NOT NULL,
    num_comments INTEGER NOT NULL,
    created_utc  REAL NOT NULL,
    author       TEXT,
    body         TEXT
);

CREATE INDEX IF NOT EXISTS idx_submissions_created ON submissions(created_utc DESC);

-- Ingestion run history
CREATE TABLE IF NOT EXISTS ingest_runs (
    id          TEXT PRIMARY KEY,
    subreddit   TEXT NOT NULL,
    started_at  TEXT NOT NULL,
    finished_at TEXT,
    stats_json  TEXT
);

CREATE INDEX IF NOT EXISTS idx_ingest_runs_started ON ingest_runs(started_at);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
