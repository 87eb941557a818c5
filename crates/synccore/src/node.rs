use crate::{EventEmitter, NodeError, Ports, Position, Value};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;

/// Core trait that all executable operations implement
#[async_trait]
pub trait Operation: Send + Sync {
    /// Unique type identifier (e.g., "input.load_video", "util.filter_files")
    fn node_type(&self) -> &str;

    /// Declare the input/output port maps for this node type
    fn define_ports(&self) -> Ports;

    /// Execute the operation with fully resolved inputs
    async fn execute(&self, ctx: OpContext) -> Result<HashMap<String, Value>, NodeError>;
}

/// Execution context passed to each operation body
pub struct OpContext {
    /// Node instance id within the workflow
    pub node_id: String,

    /// Resolved input values (static config, defaults, connected outputs)
    pub inputs: HashMap<String, Value>,

    /// Per-invocation scratch directory, released after the run
    pub scratch_dir: PathBuf,

    /// Event emitter for real-time progress updates
    pub events: EventEmitter,
}

impl OpContext {
    /// Get required input or return error
    pub fn require(&self, name: &str) -> Result<&Value, NodeError> {
        self.inputs
            .get(name)
            .filter(|v| !v.is_null())
            .ok_or_else(|| NodeError::MissingInput(name.to_string()))
    }

    /// Get required string input or return error
    pub fn require_str(&self, name: &str) -> Result<&str, NodeError> {
        self.require(name)?
            .as_str()
            .ok_or_else(|| NodeError::InvalidInput {
                input: name.to_string(),
                reason: "expected a string".to_string(),
            })
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.inputs.get(name).filter(|v| !v.is_null())
    }
}

/// Execution state of one node within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    Pending,
    Running,
    Completed,
    Failed,
}

impl ExecutionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionState::Completed | ExecutionState::Failed)
    }
}

/// Memoized outputs from a prior execution, keyed by input hash
#[derive(Debug, Clone)]
struct CachedResult {
    input_hash: String,
    outputs: HashMap<String, Value>,
}

/// One operation instance in a workflow.
///
/// Owns the operation body plus everything the executor tracks per node:
/// static configuration, declared ports, state, progress, last error, and
/// the memoized result of a prior run.
pub struct WorkflowNode {
    id: String,
    node_type: String,
    pub config: HashMap<String, Value>,
    pub position: Position,
    ports: Ports,
    state: ExecutionState,
    progress: f32,
    error: Option<String>,
    cached: Option<CachedResult>,
    op: Box<dyn Operation>,
}

impl std::fmt::Debug for WorkflowNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowNode")
            .field("id", &self.id)
            .field("node_type", &self.node_type)
            .field("config", &self.config)
            .field("position", &self.position)
            .field("ports", &self.ports)
            .field("state", &self.state)
            .field("progress", &self.progress)
            .field("error", &self.error)
            .field("cached", &self.cached)
            .finish_non_exhaustive()
    }
}

impl WorkflowNode {
    /// Create a node instance; ports are declared once, here.
    pub fn new(id: impl Into<String>, config: HashMap<String, Value>, op: Box<dyn Operation>) -> Self {
        let ports = op.define_ports();
        let node_type = op.node_type().to_string();
        Self {
            id: id.into(),
            node_type,
            config,
            position: Position::default(),
            ports,
            state: ExecutionState::Pending,
            progress: 0.0,
            error: None,
            cached: None,
            op,
        }
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn node_type(&self) -> &str {
        &self.node_type
    }

    pub fn ports(&self) -> &Ports {
        &self.ports
    }

    pub fn state(&self) -> ExecutionState {
        self.state
    }

    pub fn set_state(&mut self, state: ExecutionState) {
        self.state = state;
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    /// Update execution progress, clamped to [0, 1]
    pub fn set_progress(&mut self, progress: f32) {
        self.progress = progress.clamp(0.0, 1.0);
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn set_error(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
        self.state = ExecutionState::Failed;
    }

    /// Check that every required input is satisfiable before execution.
    ///
    /// A required port without a default must have a static config value or
    /// an incoming connection (`connected_inputs`); connection-fed values
    /// arrive later, during input resolution, and are exempt from the static
    /// check. Custom port validators run against static values when present.
    pub fn validate(&self, connected_inputs: &HashSet<String>) -> Result<(), NodeError> {
        for (name, port) in &self.ports.inputs {
            let value = self.config.get(name);
            if port.required
                && port.default.is_none()
                && value.is_none()
                && !connected_inputs.contains(name)
            {
                return Err(NodeError::MissingInput(name.clone()));
            }
            if value.is_some() && !port.validate(value) {
                return Err(NodeError::InvalidInput {
                    input: name.clone(),
                    reason: "rejected by port validator".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Stable hash over node type, node id, and declared input values.
    ///
    /// This is the cache key: config edits (or default changes) to this node
    /// change the hash, while other nodes' keys are unaffected.
    pub fn input_hash(&self) -> String {
        let mut declared: BTreeMap<&str, serde_json::Value> = BTreeMap::new();
        for (name, port) in &self.ports.inputs {
            let value = self.config.get(name).or(port.default.as_ref());
            declared.insert(
                name.as_str(),
                value.map_or(serde_json::Value::Null, Value::to_json),
            );
        }

        // serde_json maps are ordered, so the encoding is canonical.
        let key = serde_json::json!({
            "node_type": self.node_type,
            "node_id": self.id,
            "inputs": declared,
        });

        let mut hasher = Sha256::new();
        hasher.update(key.to_string().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Run the operation body.
    pub async fn execute(&self, ctx: OpContext) -> Result<HashMap<String, Value>, NodeError> {
        self.op.execute(ctx).await
    }

    /// Memoize a run's outputs under the input hash they were produced with.
    pub fn cache_result(&mut self, input_hash: String, outputs: HashMap<String, Value>) {
        self.cached = Some(CachedResult {
            input_hash,
            outputs,
        });
    }

    /// Get the memoized outputs, if any exist for the given input hash.
    /// A stale hash never serves a cached value.
    pub fn cached_result(&self, input_hash: &str) -> Option<&HashMap<String, Value>> {
        self.cached
            .as_ref()
            .filter(|c| c.input_hash == input_hash)
            .map(|c| &c.outputs)
    }
}
