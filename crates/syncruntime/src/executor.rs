use crate::data::DataManager;
use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{HashMap, HashSet, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use synccore::{
    EngineError, EventBus, EventEmitter, ExecutionEvent, ExecutionId, ExecutionState, GraphError,
    OpContext, Value, Workflow, WorkflowNode,
};

/// What to do with a node whose upstream dependency failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpstreamFailurePolicy {
    /// Dispatch the node anyway; connection-fed inputs from the failed
    /// upstream are simply left unresolved.
    #[default]
    Attempt,
    /// Record the node as failed without invoking its body. Applies
    /// transitively: dependents of a skipped node are skipped too.
    SkipDependents,
}

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Worker-pool width per level
    pub max_workers: usize,
    /// Reuse memoized results keyed by input hash
    pub use_cache: bool,
    pub upstream_failure: UpstreamFailurePolicy,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            use_cache: true,
            upstream_failure: UpstreamFailurePolicy::default(),
        }
    }
}

/// One entry in the per-run execution log
#[derive(Debug, Clone)]
pub struct ExecutionLogEntry {
    pub node_id: String,
    pub success: bool,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Aggregated outcome of one workflow run
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub execution_id: ExecutionId,
    pub success: bool,
    pub node_results: HashMap<String, HashMap<String, Value>>,
    pub errors: HashMap<String, String>,
    pub duration: Duration,
    pub total_nodes: usize,
    pub completed_nodes: usize,
    pub failed_nodes: usize,
}

enum NodeOutcome {
    Completed {
        outputs: HashMap<String, Value>,
        cached: bool,
    },
    Failed(String),
}

/// Executes workflows as leveled DAGs with bounded parallelism.
///
/// Levels run in order with a hard barrier between them; nodes within a
/// level run concurrently through a pool of `max_workers` slots. A node's
/// resolved inputs are only ever read after every upstream producer has
/// reached a terminal state.
pub struct WorkflowExecutor {
    config: ExecutorConfig,
    event_bus: Arc<EventBus>,
    execution_log: Vec<ExecutionLogEntry>,
}

impl WorkflowExecutor {
    pub fn new(config: ExecutorConfig, event_bus: Arc<EventBus>) -> Self {
        Self {
            config,
            event_bus,
            execution_log: Vec::new(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(ExecutorConfig::default(), Arc::new(EventBus::new(256)))
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Ordered log of node outcomes from the most recent run
    pub fn execution_log(&self) -> &[ExecutionLogEntry] {
        &self.execution_log
    }

    /// Map each node id to the ids it depends on, derived from connections.
    pub fn build_dependencies(workflow: &Workflow) -> HashMap<String, Vec<String>> {
        let mut dependencies: HashMap<String, Vec<String>> = HashMap::new();
        for conn in &workflow.connections {
            let deps = dependencies.entry(conn.to_node.clone()).or_default();
            if !deps.contains(&conn.from_node) {
                deps.push(conn.from_node.clone());
            }
        }
        dependencies
    }

    /// Group nodes into topologically ordered levels.
    ///
    /// Every node in a level depends only on nodes in strictly earlier
    /// levels, so each level is safe to execute concurrently. Nodes that
    /// never reach in-degree zero cannot be scheduled; they are reported as
    /// a cycle rather than silently dropped.
    pub fn execution_levels(workflow: &Workflow) -> Result<Vec<Vec<String>>, GraphError> {
        let mut graph: DiGraph<String, ()> = DiGraph::new();
        let mut index: HashMap<&str, NodeIndex> = HashMap::new();

        let mut node_ids: Vec<&String> = workflow.nodes.keys().collect();
        node_ids.sort();
        for id in &node_ids {
            let ix = graph.add_node((*id).clone());
            index.insert(id.as_str(), ix);
        }

        for conn in &workflow.connections {
            let from = *index
                .get(conn.from_node.as_str())
                .ok_or_else(|| GraphError::UnknownNode(conn.from_node.clone()))?;
            let to = *index
                .get(conn.to_node.as_str())
                .ok_or_else(|| GraphError::UnknownNode(conn.to_node.clone()))?;
            // Parallel port connections between the same pair are one edge.
            graph.update_edge(from, to, ());
        }

        let mut in_degree: HashMap<NodeIndex, usize> = graph
            .node_indices()
            .map(|ix| (ix, graph.neighbors_directed(ix, Direction::Incoming).count()))
            .collect();

        let mut ready: Vec<NodeIndex> = graph
            .node_indices()
            .filter(|ix| in_degree[ix] == 0)
            .collect();

        let mut levels: Vec<Vec<String>> = Vec::new();
        let mut scheduled = 0usize;

        while !ready.is_empty() {
            let mut level: Vec<String> = ready.iter().map(|ix| graph[*ix].clone()).collect();
            level.sort();
            scheduled += level.len();

            let mut next = Vec::new();
            for ix in &ready {
                for dependent in graph.neighbors_directed(*ix, Direction::Outgoing) {
                    let degree = in_degree
                        .get_mut(&dependent)
                        .expect("dependent indexed at graph build");
                    *degree -= 1;
                    if *degree == 0 {
                        next.push(dependent);
                    }
                }
            }

            levels.push(level);
            ready = next;
        }

        if scheduled < workflow.nodes.len() {
            let mut unscheduled: Vec<String> = graph
                .node_indices()
                .filter(|ix| in_degree[ix] > 0)
                .map(|ix| graph[ix].clone())
                .collect();
            unscheduled.sort();
            return Err(GraphError::CyclicDependency { unscheduled });
        }

        Ok(levels)
    }

    /// Execute a complete workflow.
    ///
    /// Graph problems (bad endpoints, cycles) abort before any node runs;
    /// node-level failures are recorded per node and never cross the node
    /// boundary.
    pub async fn execute(
        &mut self,
        workflow: &mut Workflow,
    ) -> Result<ExecutionResult, EngineError> {
        let execution_id = ExecutionId::new_v4();
        let started = Instant::now();

        workflow.validate()?;
        let levels = Self::execution_levels(workflow)?;
        let dependencies = Self::build_dependencies(workflow);

        self.execution_log.clear();
        self.event_bus.emit(ExecutionEvent::WorkflowStarted {
            execution_id,
            timestamp: Utc::now(),
        });
        tracing::info!(
            %execution_id,
            nodes = workflow.nodes.len(),
            levels = levels.len(),
            "starting workflow run"
        );

        let mut data = DataManager::new()?;
        for conn in &workflow.connections {
            data.add_connection(conn.clone());
        }

        let total_nodes = workflow.nodes.len();
        let mut node_results: HashMap<String, HashMap<String, Value>> = HashMap::new();
        let mut errors: HashMap<String, String> = HashMap::new();
        let mut completed = 0usize;
        let mut failed = 0usize;

        for level in &levels {
            let mut pending: VecDeque<String> = level.iter().cloned().collect();
            let mut running = FuturesUnordered::new();

            loop {
                while running.len() < self.config.max_workers {
                    let Some(node_id) = pending.pop_front() else {
                        break;
                    };

                    if self.config.upstream_failure == UpstreamFailurePolicy::SkipDependents {
                        let failed_upstream = dependencies
                            .get(&node_id)
                            .and_then(|deps| deps.iter().find(|d| errors.contains_key(*d)));
                        if let Some(upstream) = failed_upstream {
                            let message = format!("Skipped: upstream node {} failed", upstream);
                            if let Some(node) = workflow.nodes.get_mut(&node_id) {
                                node.set_error(message.clone());
                            }
                            self.record_failure(
                                execution_id,
                                &node_id,
                                message,
                                &mut errors,
                                &mut failed,
                            );
                            continue;
                        }
                    }

                    let node = workflow
                        .nodes
                        .remove(&node_id)
                        .ok_or_else(|| GraphError::UnknownNode(node_id.clone()))?;

                    let inputs = data.resolve_node_inputs(&node);
                    let connected = data.connected_inputs(&node_id);
                    let scratch_dir = data.create_scratch_dir(&node_id)?;
                    let events = self.event_bus.create_emitter(execution_id, node_id.clone());
                    let use_cache = self.config.use_cache;

                    self.event_bus.emit(ExecutionEvent::NodeStarted {
                        execution_id,
                        node_id: node_id.clone(),
                        node_type: node.node_type().to_string(),
                        timestamp: Utc::now(),
                    });

                    running.push(tokio::spawn(async move {
                        let node_started = Instant::now();
                        let (node, outcome) =
                            run_node(node, inputs, connected, scratch_dir, events, use_cache).await;
                        (node, outcome, node_started.elapsed())
                    }));
                }

                if running.is_empty() {
                    break;
                }

                if let Some(joined) = running.next().await {
                    let (node, outcome, elapsed) = joined
                        .map_err(|e| EngineError::Execution(format!("Task join error: {}", e)))?;
                    let node_id = node.id().to_string();

                    match outcome {
                        NodeOutcome::Completed { outputs, cached } => {
                            tracing::info!(
                                node_id = %node_id,
                                cached,
                                elapsed_ms = elapsed.as_millis() as u64,
                                "node completed"
                            );
                            data.set_node_result(&node_id, outputs.clone());
                            node_results.insert(node_id.clone(), outputs.clone());
                            completed += 1;

                            self.event_bus.emit(ExecutionEvent::NodeCompleted {
                                execution_id,
                                node_id: node_id.clone(),
                                outputs,
                                duration_ms: elapsed.as_millis() as u64,
                                cached,
                                timestamp: Utc::now(),
                            });
                            self.execution_log.push(ExecutionLogEntry {
                                node_id: node_id.clone(),
                                success: true,
                                error: None,
                                timestamp: Utc::now(),
                            });
                        }
                        NodeOutcome::Failed(message) => {
                            tracing::warn!(node_id = %node_id, error = %message, "node failed");
                            self.record_failure(
                                execution_id,
                                &node_id,
                                message,
                                &mut errors,
                                &mut failed,
                            );
                        }
                    }

                    workflow.nodes.insert(node_id, node);
                }
            }
        }

        let duration = started.elapsed();
        let success = errors.is_empty();

        self.event_bus.emit(ExecutionEvent::WorkflowCompleted {
            execution_id,
            success,
            duration_ms: duration.as_millis() as u64,
            timestamp: Utc::now(),
        });
        tracing::info!(
            %execution_id,
            success,
            completed,
            failed,
            duration_ms = duration.as_millis() as u64,
            "workflow run finished"
        );

        Ok(ExecutionResult {
            execution_id,
            success,
            node_results,
            errors,
            duration,
            total_nodes,
            completed_nodes: completed,
            failed_nodes: failed,
        })
    }

    fn record_failure(
        &mut self,
        execution_id: ExecutionId,
        node_id: &str,
        message: String,
        errors: &mut HashMap<String, String>,
        failed: &mut usize,
    ) {
        errors.insert(node_id.to_string(), message.clone());
        *failed += 1;

        self.event_bus.emit(ExecutionEvent::NodeFailed {
            execution_id,
            node_id: node_id.to_string(),
            error: message.clone(),
            timestamp: Utc::now(),
        });
        self.execution_log.push(ExecutionLogEntry {
            node_id: node_id.to_string(),
            success: false,
            error: Some(message),
            timestamp: Utc::now(),
        });
    }
}

/// Run one node through the cache/validate/execute pipeline.
///
/// Owns the node for the duration so no two workers ever share an instance;
/// returns it for reinsertion into the workflow. Failures, including panics
/// in the operation body, become the node's recorded error.
async fn run_node(
    mut node: WorkflowNode,
    inputs: HashMap<String, Value>,
    connected: HashSet<String>,
    scratch_dir: std::path::PathBuf,
    events: EventEmitter,
    use_cache: bool,
) -> (WorkflowNode, NodeOutcome) {
    let input_hash = node.input_hash();

    if use_cache {
        if let Some(outputs) = node.cached_result(&input_hash) {
            let outputs = outputs.clone();
            node.set_state(ExecutionState::Completed);
            node.set_progress(1.0);
            return (
                node,
                NodeOutcome::Completed {
                    outputs,
                    cached: true,
                },
            );
        }
    }

    if let Err(e) = node.validate(&connected) {
        let message = e.to_string();
        node.set_error(message.clone());
        return (node, NodeOutcome::Failed(message));
    }

    node.set_state(ExecutionState::Running);
    node.set_progress(0.0);

    let ctx = OpContext {
        node_id: node.id().to_string(),
        inputs,
        scratch_dir,
        events,
    };

    let result = AssertUnwindSafe(node.execute(ctx)).catch_unwind().await;

    match result {
        Ok(Ok(outputs)) => {
            if use_cache {
                node.cache_result(input_hash, outputs.clone());
            }
            node.set_state(ExecutionState::Completed);
            node.set_progress(1.0);
            (
                node,
                NodeOutcome::Completed {
                    outputs,
                    cached: false,
                },
            )
        }
        Ok(Err(e)) => {
            let message = e.to_string();
            node.set_error(message.clone());
            (node, NodeOutcome::Failed(message))
        }
        Err(panic) => {
            let message = format!("Operation panicked: {}", panic_message(&panic));
            node.set_error(message.clone());
            (node, NodeOutcome::Failed(message))
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
