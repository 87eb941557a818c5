use crate::{GraphError, WorkflowNode};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Directed edge routing one node's output to another node's input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub from_node: String,
    pub from_output: String,
    pub to_node: String,
    pub to_input: String,
}

impl Connection {
    pub fn new(
        from_node: impl Into<String>,
        from_output: impl Into<String>,
        to_node: impl Into<String>,
        to_input: impl Into<String>,
    ) -> Self {
        Self {
            from_node: from_node.into(),
            from_output: from_output.into(),
            to_node: to_node.into(),
            to_input: to_input.into(),
        }
    }
}

/// Node position in a visual editor
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

/// A node-id-keyed collection of nodes plus their connections and metadata
#[derive(Debug, Default)]
pub struct Workflow {
    pub nodes: HashMap<String, WorkflowNode>,
    pub connections: Vec<Connection>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Workflow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node; node ids are unique within a workflow.
    pub fn add_node(&mut self, node: WorkflowNode) -> Result<(), GraphError> {
        let id = node.id().to_string();
        if self.nodes.contains_key(&id) {
            return Err(GraphError::DuplicateNodeId(id));
        }
        self.nodes.insert(id, node);
        Ok(())
    }

    pub fn connect(
        &mut self,
        from_node: impl Into<String>,
        from_output: impl Into<String>,
        to_node: impl Into<String>,
        to_input: impl Into<String>,
    ) {
        self.connections
            .push(Connection::new(from_node, from_output, to_node, to_input));
    }

    /// Input names on `node_id` that are fed by an incoming connection.
    pub fn connected_inputs(&self, node_id: &str) -> HashSet<String> {
        self.connections
            .iter()
            .filter(|c| c.to_node == node_id)
            .map(|c| c.to_input.clone())
            .collect()
    }

    /// Check that every connection endpoint names an existing node and an
    /// existing port on that node.
    pub fn validate(&self) -> Result<(), GraphError> {
        for conn in &self.connections {
            let from = self
                .nodes
                .get(&conn.from_node)
                .ok_or_else(|| GraphError::UnknownNode(conn.from_node.clone()))?;
            let to = self
                .nodes
                .get(&conn.to_node)
                .ok_or_else(|| GraphError::UnknownNode(conn.to_node.clone()))?;

            if !from.ports().outputs.contains_key(&conn.from_output) {
                return Err(GraphError::UnknownPort {
                    node: conn.from_node.clone(),
                    port: conn.from_output.clone(),
                });
            }
            if !to.ports().inputs.contains_key(&conn.to_input) {
                return Err(GraphError::UnknownPort {
                    node: conn.to_node.clone(),
                    port: conn.to_input.clone(),
                });
            }
        }
        Ok(())
    }
}
