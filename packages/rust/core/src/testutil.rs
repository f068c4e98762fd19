//! In-memory fakes for exercising stages without network or disk.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use subharvest_shared::{Result, Submission, SubharvestError};

use crate::ports::{RecordStore, SourceClient};

pub(crate) fn submission(id: &str, created_utc: f64) -> Submission {
    Submission {
        id: id.into(),
        title: format!("post {id}"),
        score: 1,
        url: format!("https://example.com/{id}"),
        num_comments: 0,
        created_utc,
        author: Some("tester".into()),
        body: None,
    }
}

/// Source fake returning a canned newest-first listing.
pub(crate) struct FakeSource {
    submissions: Vec<Submission>,
}

impl FakeSource {
    pub(crate) fn new(submissions: Vec<Submission>) -> Self {
        Self { submissions }
    }
}

#[async_trait]
impl SourceClient for FakeSource {
    async fn fetch_recent(&self, _feed_id: &str, limit: u32) -> Result<Vec<Submission>> {
        Ok(self
            .submissions
            .iter()
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

/// Store fake with the same strict insert semantics as the real store:
/// duplicate ids reject the whole batch.
#[derive(Default)]
pub(crate) struct MemoryStore {
    rows: Mutex<Vec<Submission>>,
    insert_calls: Mutex<usize>,
    /// When set, the next insert_many commits this row (the "concurrent
    /// run") and fails with Duplicate for its id.
    racing_insert: Mutex<Option<Submission>>,
    /// When set, the next insert_many fails with this storage error.
    storage_failure: Mutex<Option<String>>,
}

impl MemoryStore {
    pub(crate) fn with_rows(rows: Vec<Submission>) -> Self {
        Self {
            rows: Mutex::new(rows),
            ..Self::default()
        }
    }

    pub(crate) fn rows(&self) -> Vec<Submission> {
        self.rows.lock().unwrap().clone()
    }

    pub(crate) fn insert_calls(&self) -> usize {
        *self.insert_calls.lock().unwrap()
    }

    pub(crate) fn arm_racing_insert(&self, row: Submission) {
        *self.racing_insert.lock().unwrap() = Some(row);
    }

    pub(crate) fn arm_storage_failure(&self, message: &str) {
        *self.storage_failure.lock().unwrap() = Some(message.into());
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn existing_ids(&self) -> Result<HashSet<String>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.id.clone())
            .collect())
    }

    async fn insert_many(&self, records: &[Submission]) -> Result<()> {
        *self.insert_calls.lock().unwrap() += 1;

        if let Some(message) = self.storage_failure.lock().unwrap().take() {
            return Err(SubharvestError::Storage(message));
        }

        if let Some(row) = self.racing_insert.lock().unwrap().take() {
            let id = row.id.clone();
            self.rows.lock().unwrap().push(row);
            return Err(SubharvestError::Duplicate { id });
        }

        let mut rows = self.rows.lock().unwrap();
        for record in records {
            if rows.iter().any(|s| s.id == record.id) {
                return Err(SubharvestError::Duplicate {
                    id: record.id.clone(),
                });
            }
        }
        rows.extend(records.iter().cloned());
        Ok(())
    }

    async fn read_all(&self) -> Result<Vec<Submission>> {
        Ok(self.rows.lock().unwrap().clone())
    }
}
