//! Ingestion stage: bounded fetch, dedup by id, atomic persistence.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{info, instrument, warn};

use subharvest_shared::{Result, Submission, SubharvestError};

use crate::ports::{RecordStore, SourceClient};

/// Counts and ids produced by one ingestion run.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    /// Candidates fetched from the source.
    pub fetched: usize,
    /// Records newly persisted this run.
    pub inserted: usize,
    /// Candidates dropped because their id was already stored.
    pub skipped_duplicates: usize,
    /// Ids of the newly persisted records, in fetch order.
    pub inserted_ids: Vec<String>,
}

/// Fetch up to `limit` recent submissions from `subreddit` and persist the
/// ones not yet stored.
///
/// The existence-check snapshot defines the dedup key space at the instant
/// of the read; candidate order is preserved through the filter. An empty
/// remainder short-circuits without touching the store, which makes replays
/// against an unchanged source a no-op (`inserted: 0`).
#[instrument(skip(source, store))]
pub async fn ingest(
    source: &dyn SourceClient,
    store: &dyn RecordStore,
    subreddit: &str,
    limit: u32,
) -> Result<IngestReport> {
    let fetched = source.fetch_recent(subreddit, limit).await?;
    info!(count = fetched.len(), subreddit, "fetched candidate submissions");

    let existing = store.existing_ids().await?;
    let mut new_records: Vec<Submission> = fetched
        .iter()
        .filter(|s| !existing.contains(&s.id))
        .cloned()
        .collect();

    if new_records.is_empty() {
        info!("no new submissions to add");
        return Ok(IngestReport {
            fetched: fetched.len(),
            inserted: 0,
            skipped_duplicates: fetched.len(),
            inserted_ids: Vec::new(),
        });
    }

    if let Err(err) = store.insert_many(&new_records).await {
        match err {
            SubharvestError::Duplicate { id } => {
                // A concurrent run landed some of these ids after our
                // snapshot. Refresh it and retry the remainder once; the
                // store's unique key rolled the first attempt back whole.
                warn!(%id, "duplicate id during insert, refreshing snapshot");
                let existing: HashSet<String> = store.existing_ids().await?;
                new_records.retain(|s| !existing.contains(&s.id));
                if !new_records.is_empty() {
                    store.insert_many(&new_records).await?;
                }
            }
            other => return Err(other),
        }
    }

    let inserted_ids: Vec<String> = new_records.iter().map(|s| s.id.clone()).collect();
    info!(
        inserted = inserted_ids.len(),
        skipped = fetched.len() - inserted_ids.len(),
        "ingestion committed"
    );

    Ok(IngestReport {
        fetched: fetched.len(),
        inserted: inserted_ids.len(),
        skipped_duplicates: fetched.len() - inserted_ids.len(),
        inserted_ids,
    })
}
