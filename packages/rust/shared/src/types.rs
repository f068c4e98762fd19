//! Core domain types for ingested submissions.

use serde::{Deserialize, Serialize};

/// One ingested submission, keyed by its source-assigned id.
///
/// The `id` is the sole deduplication key. Once stored, a submission is
/// never updated or removed by the pipeline — upstream-mutable fields
/// like `score` keep the value observed at first ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    /// Source-assigned base-36 id, globally unique per source, immutable.
    pub id: String,
    /// Submission title.
    pub title: String,
    /// Vote score at the time of first observation.
    pub score: i64,
    /// Link target (external URL or permalink for self posts).
    pub url: String,
    /// Comment count at the time of first observation.
    pub num_comments: i64,
    /// Creation time, seconds since epoch, UTC.
    pub created_utc: f64,
    /// Author account name; `None` for deleted accounts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Self-post text; `None` for link posts and empty bodies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}
