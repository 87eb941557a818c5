use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use synccore::{Connection, Value, WorkflowNode};
use tempfile::TempDir;

/// Manages data flow between nodes for the duration of one run.
///
/// Owns the connection list, the id-keyed store of produced outputs, and the
/// per-node scratch directories. All scratch space lives under one run-scoped
/// temp dir and is removed when the manager is dropped, failure or not.
pub struct DataManager {
    connections: Vec<Connection>,
    node_results: HashMap<String, HashMap<String, Value>>,
    workspace: TempDir,
    scratch_dirs: Vec<TempDir>,
}

impl DataManager {
    pub fn new() -> io::Result<Self> {
        let workspace = tempfile::Builder::new()
            .prefix("synckit-run-")
            .tempdir()?;

        Ok(Self {
            connections: Vec::new(),
            node_results: HashMap::new(),
            workspace,
            scratch_dirs: Vec::new(),
        })
    }

    pub fn add_connection(&mut self, connection: Connection) {
        self.connections.push(connection);
    }

    /// Store execution results for a node
    pub fn set_node_result(&mut self, node_id: impl Into<String>, outputs: HashMap<String, Value>) {
        self.node_results.insert(node_id.into(), outputs);
    }

    /// Get a specific output from a node's stored results
    pub fn node_result(&self, node_id: &str, output: &str) -> Option<&Value> {
        self.node_results.get(node_id)?.get(output)
    }

    /// Input names on `node_id` fed by an incoming connection
    pub fn connected_inputs(&self, node_id: &str) -> HashSet<String> {
        self.connections
            .iter()
            .filter(|c| c.to_node == node_id)
            .map(|c| c.to_input.clone())
            .collect()
    }

    /// Resolve all inputs for a node.
    ///
    /// Starts from static configuration, falls back to each port's default,
    /// then overrides any connected input with the upstream node's stored
    /// output when that output is present. An upstream that failed simply
    /// leaves its inputs unresolved.
    pub fn resolve_node_inputs(&self, node: &WorkflowNode) -> HashMap<String, Value> {
        let mut resolved = HashMap::new();

        for (name, port) in &node.ports().inputs {
            if let Some(value) = node.config.get(name) {
                resolved.insert(name.clone(), value.clone());
            } else if let Some(default) = &port.default {
                resolved.insert(name.clone(), default.clone());
            }
        }

        for conn in &self.connections {
            if conn.to_node == node.id() && node.ports().inputs.contains_key(&conn.to_input) {
                if let Some(value) = self.node_result(&conn.from_node, &conn.from_output) {
                    resolved.insert(conn.to_input.clone(), value.clone());
                }
            }
        }

        resolved
    }

    /// Create a scratch directory for one node invocation.
    ///
    /// Never shared between concurrently running nodes; released when the
    /// manager is dropped.
    pub fn create_scratch_dir(&mut self, node_id: &str) -> io::Result<PathBuf> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("{}_", node_id))
            .tempdir_in(self.workspace.path())?;
        let path = dir.path().to_path_buf();
        self.scratch_dirs.push(dir);
        Ok(path)
    }

    pub fn workspace_path(&self) -> &Path {
        self.workspace.path()
    }
}
