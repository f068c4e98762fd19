//! Capability contracts between the pipeline stages and their collaborators.
//!
//! Stage entry points require these explicitly, so tests substitute
//! in-memory fakes and the CLI wires the real client and store.

use std::collections::HashSet;

use async_trait::async_trait;
use subharvest_shared::{Result, Submission};

/// Authenticated, paginated retrieval from the external source.
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Fetch up to `limit` most-recent submissions from `feed_id`,
    /// preserving the source's newest-first ordering. Pages internally
    /// until `limit` items are collected or the source is exhausted.
    async fn fetch_recent(&self, feed_id: &str, limit: u32) -> Result<Vec<Submission>>;
}

/// Durable keyed storage with append-only semantics.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// The set of all persisted submission ids.
    async fn existing_ids(&self) -> Result<HashSet<String>>;

    /// Insert a batch as one atomic unit: either every record is durably
    /// visible afterwards or none is. Fails with `SubharvestError::Duplicate`
    /// if any id is already present — callers pre-filter, the store
    /// enforces uniqueness as a backstop.
    async fn insert_many(&self, records: &[Submission]) -> Result<()>;

    /// All stored submissions, in unspecified order.
    async fn read_all(&self) -> Result<Vec<Submission>>;
}
