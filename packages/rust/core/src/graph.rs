//! Orchestration graph: explicit dependency edges, topological execution.
//!
//! Nodes declare the nodes they depend on; the executor validates the
//! declarations, orders the nodes with Kahn's algorithm (insertion-order
//! tie-breaking for determinism), and runs them sequentially. A failed
//! node is reported under its own identity — never as success — and its
//! transitive dependents are skipped.

use std::collections::{HashMap, HashSet, VecDeque};

use async_trait::async_trait;
use serde::Serialize;
use tracing::{error, info};

use subharvest_shared::{Result, RunSettings, SubharvestError};

use crate::ports::{RecordStore, SourceClient};

/// Stable node identifier within a graph.
pub type NodeId = &'static str;

/// Capabilities handed to each node on execution.
pub struct RunContext<'a> {
    pub source: &'a dyn SourceClient,
    pub store: &'a dyn RecordStore,
    pub settings: &'a RunSettings,
}

/// One executable unit in the pipeline graph.
#[async_trait]
pub trait PipelineNode: Send + Sync {
    fn id(&self) -> NodeId;

    /// Nodes that must complete successfully before this one runs.
    fn depends_on(&self) -> Vec<NodeId> {
        Vec::new()
    }

    /// Execute the node, returning a metadata payload for observability.
    async fn execute(&self, ctx: &RunContext<'_>) -> Result<serde_json::Value>;
}

/// Observer for node lifecycle events during a run.
pub trait RunObserver: Send + Sync {
    fn node_started(&self, _node: NodeId) {}
    fn node_finished(&self, _report: &NodeReport) {}
}

/// No-op observer for headless/test usage.
pub struct SilentObserver;

impl RunObserver for SilentObserver {}

/// Terminal state of one node in a finished run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NodeStatus {
    Succeeded { metadata: serde_json::Value },
    Failed { error: String },
    Skipped { blocked_on: String },
}

/// Outcome of one node, tagged with its identity.
#[derive(Debug, Clone, Serialize)]
pub struct NodeReport {
    pub node: String,
    #[serde(flatten)]
    pub status: NodeStatus,
}

/// Outcome of a whole-graph execution, in execution order.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub nodes: Vec<NodeReport>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.nodes
            .iter()
            .all(|n| matches!(n.status, NodeStatus::Succeeded { .. }))
    }

    /// The first node that failed, if any.
    pub fn first_failure(&self) -> Option<&NodeReport> {
        self.nodes
            .iter()
            .find(|n| matches!(n.status, NodeStatus::Failed { .. }))
    }

    /// Look up a node's report by id.
    pub fn node(&self, id: &str) -> Option<&NodeReport> {
        self.nodes.iter().find(|n| n.node == id)
    }

    /// The whole report as a JSON stats payload.
    pub fn stats_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}))
    }
}

/// A small directed graph of pipeline nodes, executed in topological order.
#[derive(Default)]
pub struct PipelineGraph {
    nodes: Vec<Box<dyn PipelineNode>>,
}

impl PipelineGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: Box<dyn PipelineNode>) -> &mut Self {
        self.nodes.push(node);
        self
    }

    /// Topological order over node positions: Kahn's algorithm with
    /// insertion-order tie-breaking, so repeated runs execute nodes in a
    /// reproducible sequence. Rejects duplicate ids, unknown dependencies,
    /// and cycles.
    fn toposort(&self) -> Result<Vec<usize>> {
        let mut position: HashMap<NodeId, usize> = HashMap::with_capacity(self.nodes.len());
        for (idx, node) in self.nodes.iter().enumerate() {
            if position.insert(node.id(), idx).is_some() {
                return Err(SubharvestError::config(format!(
                    "duplicate pipeline node id '{}'",
                    node.id()
                )));
            }
        }

        let mut in_degree = vec![0usize; self.nodes.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.nodes.len()];
        for (idx, node) in self.nodes.iter().enumerate() {
            for dep in node.depends_on() {
                let &dep_idx = position.get(dep).ok_or_else(|| {
                    SubharvestError::config(format!(
                        "pipeline node '{}' depends on unknown node '{dep}'",
                        node.id()
                    ))
                })?;
                dependents[dep_idx].push(idx);
                in_degree[idx] += 1;
            }
        }

        let mut queue: VecDeque<usize> = (0..self.nodes.len())
            .filter(|&idx| in_degree[idx] == 0)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(idx) = queue.pop_front() {
            order.push(idx);
            for &next in &dependents[idx] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    queue.push_back(next);
                }
            }
        }

        if order.len() != self.nodes.len() {
            return Err(SubharvestError::config(
                "pipeline graph contains a dependency cycle",
            ));
        }
        Ok(order)
    }

    /// Execute every node sequentially in topological order.
    ///
    /// A node runs only once all of its dependencies have succeeded;
    /// otherwise it is reported as skipped with the blocking node's id.
    /// Node failures land in the report, not in this function's `Err` —
    /// the `Err` path is reserved for a misdeclared graph.
    pub async fn execute(
        &self,
        ctx: &RunContext<'_>,
        observer: &dyn RunObserver,
    ) -> Result<RunReport> {
        let order = self.toposort()?;

        let mut reports: Vec<NodeReport> = Vec::with_capacity(order.len());
        let mut unusable: HashSet<NodeId> = HashSet::new();

        for idx in order {
            let node = &self.nodes[idx];
            let id = node.id();

            let blocked_on = node.depends_on().into_iter().find(|d| unusable.contains(d));
            let report = if let Some(blocked_on) = blocked_on {
                info!(node = id, blocked_on, "skipping node, dependency did not succeed");
                unusable.insert(id);
                NodeReport {
                    node: id.into(),
                    status: NodeStatus::Skipped {
                        blocked_on: blocked_on.into(),
                    },
                }
            } else {
                observer.node_started(id);
                info!(node = id, "executing pipeline node");
                match node.execute(ctx).await {
                    Ok(metadata) => NodeReport {
                        node: id.into(),
                        status: NodeStatus::Succeeded { metadata },
                    },
                    Err(err) => {
                        error!(node = id, error = %err, "pipeline node failed");
                        unusable.insert(id);
                        NodeReport {
                            node: id.into(),
                            status: NodeStatus::Failed {
                                error: err.to_string(),
                            },
                        }
                    }
                }
            };

            observer.node_finished(&report);
            reports.push(report);
        }

        Ok(RunReport { nodes: reports })
    }
}
