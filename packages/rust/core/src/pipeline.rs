//! The built-in two-node pipeline: ingest new submissions, then preview
//! the most recent stored ones.
//!
//! Safe to re-execute on a schedule without operator intervention: the
//! ingestion node is idempotent, and the preview node re-reads store state
//! after the ingestion commit in the same run.

use async_trait::async_trait;
use serde_json::json;
use tracing::instrument;

use subharvest_shared::Result;

use crate::graph::{NodeId, PipelineGraph, PipelineNode, RunContext, RunObserver, RunReport};
use crate::{ingest, materialize};

/// Node id of the ingestion stage.
pub const INGEST_NODE: NodeId = "reddit_submissions";
/// Node id of the dependent preview stage.
pub const PREVIEW_NODE: NodeId = "preview_top_submissions";

/// Fetches new posts from a subreddit and stores them, deduplicated by id.
struct IngestionNode;

#[async_trait]
impl PipelineNode for IngestionNode {
    fn id(&self) -> NodeId {
        INGEST_NODE
    }

    async fn execute(&self, ctx: &RunContext<'_>) -> Result<serde_json::Value> {
        let report = ingest::ingest(
            ctx.source,
            ctx.store,
            &ctx.settings.subreddit,
            ctx.settings.limit,
        )
        .await?;
        Ok(json!({
            "fetched": report.fetched,
            "inserted": report.inserted,
            "skipped_duplicates": report.skipped_duplicates,
            "ids": report.inserted_ids,
        }))
    }
}

/// Previews the most recent stored submissions; depends on ingestion.
struct PreviewNode;

#[async_trait]
impl PipelineNode for PreviewNode {
    fn id(&self) -> NodeId {
        PREVIEW_NODE
    }

    fn depends_on(&self) -> Vec<NodeId> {
        vec![INGEST_NODE]
    }

    async fn execute(&self, ctx: &RunContext<'_>) -> Result<serde_json::Value> {
        let view = materialize::materialize(ctx.store, ctx.settings.top_n).await?;
        Ok(json!({
            "rows": view.len(),
            "preview": view.render_table(),
        }))
    }
}

/// The default ingestion → preview graph.
pub fn build_graph() -> PipelineGraph {
    let mut graph = PipelineGraph::new();
    graph.add_node(Box::new(IngestionNode));
    graph.add_node(Box::new(PreviewNode));
    graph
}

/// Run the default graph once against the given collaborators.
#[instrument(skip_all, fields(subreddit = %ctx.settings.subreddit))]
pub async fn run_pipeline(ctx: &RunContext<'_>, observer: &dyn RunObserver) -> Result<RunReport> {
    build_graph().execute(ctx, observer).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{NodeStatus, SilentObserver};
    use crate::testutil::{FakeSource, MemoryStore, submission};
    use subharvest_shared::RunSettings;

    fn settings(limit: u32, top_n: usize) -> RunSettings {
        RunSettings {
            subreddit: "test".into(),
            limit,
            top_n,
        }
    }

    #[tokio::test]
    async fn freshly_ingested_record_is_visible_in_the_preview() {
        let source = FakeSource::new(vec![submission("e", 900.0)]);
        let store = MemoryStore::with_rows(vec![submission("a", 100.0)]);
        let settings = settings(10, 10);
        let ctx = RunContext {
            source: &source,
            store: &store,
            settings: &settings,
        };

        let report = run_pipeline(&ctx, &SilentObserver).await.expect("run");
        assert!(report.is_success());

        let NodeStatus::Succeeded { metadata } =
            &report.node(PREVIEW_NODE).expect("preview node").status
        else {
            panic!("preview did not succeed");
        };
        assert_eq!(metadata["rows"], 2);
        let preview = metadata["preview"].as_str().expect("preview text");
        assert!(preview.contains('e'), "new record must appear in the view");
    }

    #[tokio::test]
    async fn source_failure_skips_the_preview() {
        struct BrokenSource;

        #[async_trait]
        impl crate::ports::SourceClient for BrokenSource {
            async fn fetch_recent(
                &self,
                _feed_id: &str,
                _limit: u32,
            ) -> Result<Vec<subharvest_shared::Submission>> {
                Err(subharvest_shared::SubharvestError::source(
                    "connection refused",
                ))
            }
        }

        let source = BrokenSource;
        let store = MemoryStore::default();
        let settings = settings(10, 10);
        let ctx = RunContext {
            source: &source,
            store: &store,
            settings: &settings,
        };

        let report = run_pipeline(&ctx, &SilentObserver).await.expect("run");
        assert!(!report.is_success());

        let failed = report.first_failure().expect("ingestion failure");
        assert_eq!(failed.node, INGEST_NODE);
        assert!(matches!(
            report.node(PREVIEW_NODE).expect("preview").status,
            NodeStatus::Skipped { .. }
        ));
    }

    #[tokio::test]
    async fn replayed_run_reports_zero_inserted() {
        let source = FakeSource::new(vec![submission("a", 1.0), submission("b", 2.0)]);
        let store = MemoryStore::default();
        let settings = settings(10, 10);
        let ctx = RunContext {
            source: &source,
            store: &store,
            settings: &settings,
        };

        let first = run_pipeline(&ctx, &SilentObserver).await.expect("first");
        let second = run_pipeline(&ctx, &SilentObserver).await.expect("second");
        assert!(first.is_success() && second.is_success());

        let NodeStatus::Succeeded { metadata } =
            &second.node(INGEST_NODE).expect("ingest node").status
        else {
            panic!("ingestion did not succeed");
        };
        assert_eq!(metadata["inserted"], 0);
        assert_eq!(metadata["skipped_duplicates"], 2);
        assert_eq!(store.rows().len(), 2);
    }
}
