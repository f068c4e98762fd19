//! Materialization stage: derived most-recent view over the store.

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::{info, instrument};

use subharvest_shared::{Result, Submission};

use crate::ports::RecordStore;

/// Read-only projection of the most recent stored submissions, newest
/// first. Recomputed on every materialization; no independent lifecycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct View {
    pub rows: Vec<Submission>,
}

/// Re-read the store and project the `top_n` most recent submissions.
///
/// Ordered by `created_utc` descending, ties broken by `id` ascending.
/// A pure read: an empty store yields an empty view, never an error.
#[instrument(skip(store))]
pub async fn materialize(store: &dyn RecordStore, top_n: usize) -> Result<View> {
    let mut rows = store.read_all().await?;
    rows.sort_by(|a, b| {
        b.created_utc
            .total_cmp(&a.created_utc)
            .then_with(|| a.id.cmp(&b.id))
    });
    rows.truncate(top_n);
    info!(rows = rows.len(), "view materialized");
    Ok(View { rows })
}

impl View {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Tabular rendering of the view: id, title, score, author, and the
    /// creation time localized to the machine's timezone.
    pub fn render_table(&self) -> String {
        if self.rows.is_empty() {
            return "(no submissions stored)".into();
        }

        let mut out = String::new();
        out.push_str(&format!(
            "{:<8} {:<48} {:>6}  {:<20} {:<19}\n",
            "id", "title", "score", "author", "created"
        ));
        for row in &self.rows {
            out.push_str(&format!(
                "{:<8} {:<48} {:>6}  {:<20} {:<19}\n",
                row.id,
                truncate(&row.title, 48),
                row.score,
                row.author.as_deref().unwrap_or("[deleted]"),
                local_time(row.created_utc),
            ));
        }
        out
    }
}

/// Format an epoch-seconds timestamp in the local timezone.
fn local_time(created_utc: f64) -> String {
    DateTime::from_timestamp(created_utc as i64, 0)
        .map(|utc| {
            utc.with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|| format!("{created_utc}"))
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.into()
    } else {
        let cut: String = text.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MemoryStore, submission};

    #[tokio::test]
    async fn orders_by_created_desc_with_id_tiebreak() {
        let store = MemoryStore::with_rows(vec![
            submission("b", 100.0),
            submission("a", 300.0),
            submission("d", 200.0),
            submission("c", 200.0),
        ]);

        let view = materialize(&store, 10).await.expect("materialize");
        let ids: Vec<&str> = view.rows.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "d", "b"]);
    }

    #[tokio::test]
    async fn truncates_to_top_n() {
        let store = MemoryStore::with_rows(vec![
            submission("a", 1.0),
            submission("b", 2.0),
            submission("c", 3.0),
        ]);

        let view = materialize(&store, 2).await.expect("materialize");
        assert_eq!(view.len(), 2);
        assert_eq!(view.rows[0].id, "c");
        assert_eq!(view.rows[1].id, "b");
    }

    #[tokio::test]
    async fn empty_store_yields_empty_view() {
        let store = MemoryStore::default();
        let view = materialize(&store, 10).await.expect("materialize");
        assert!(view.is_empty());
        assert_eq!(view.render_table(), "(no submissions stored)");
    }

    #[tokio::test]
    async fn table_shows_deleted_authors_and_headers() {
        let mut gone = submission("x", 1.0);
        gone.author = None;
        let store = MemoryStore::with_rows(vec![gone]);

        let view = materialize(&store, 10).await.expect("materialize");
        let table = view.render_table();
        assert!(table.starts_with("id"));
        assert!(table.contains("[deleted]"));
        assert!(table.contains('x'));
    }

    #[test]
    fn long_titles_are_truncated() {
        let long = "t".repeat(80);
        let short = truncate(&long, 48);
        assert_eq!(short.chars().count(), 48);
        assert!(short.ends_with('…'));
    }
}
