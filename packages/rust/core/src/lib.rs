//! Ingestion-and-deduplication pipeline core.
//!
//! The stages are pure over two capability contracts ([`ports::SourceClient`]
//! and [`ports::RecordStore`]), sequenced by an explicit dependency graph:
//! - [`ingest`] — bounded fetch, dedup by id, atomic persistence
//! - [`materialize`] — derived most-recent view over the store
//! - [`graph`] — topological-order execution with per-node reporting
//! - [`pipeline`] — the built-in ingestion → preview graph

pub mod graph;
pub mod ingest;
pub mod materialize;
pub mod pipeline;
pub mod ports;

#[cfg(test)]
pub(crate) mod testutil;

pub use graph::{
    NodeId, NodeReport, NodeStatus, PipelineGraph, PipelineNode, RunContext, RunObserver,
    RunReport, SilentObserver,
};
pub use ingest::IngestReport;
pub use materialize::View;
pub use ports::{RecordStore, SourceClient};
