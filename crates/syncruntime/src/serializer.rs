use crate::registry::NodeRegistry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use synccore::{Connection, EngineError, GraphError, Position, Value, Workflow};

pub const FORMAT_VERSION: &str = "1.0";

/// Persisted workflow description.
///
/// Input values are stored as plain JSON so workflow files stay
/// hand-editable; `Value::from_json`/`to_json` bridge the two forms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowFile {
    pub version: String,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub nodes: Vec<NodeEntry>,
    #[serde(default)]
    pub connections: Vec<ConnectionEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub inputs: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionEntry {
    pub from: OutputRef,
    pub to: InputRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputRef {
    pub node: String,
    pub output: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputRef {
    pub node: String,
    pub input: String,
}

/// Converts between in-memory workflows and the persisted description.
///
/// Holds the registry that materializes node instances on deserialize.
pub struct WorkflowSerializer<'a> {
    registry: &'a NodeRegistry,
}

impl<'a> WorkflowSerializer<'a> {
    pub fn new(registry: &'a NodeRegistry) -> Self {
        Self { registry }
    }

    /// Serialize a workflow.
    ///
    /// Per node, only input values not supplied by an incoming connection
    /// are persisted (falling back to the port default when configuration
    /// is absent); connection-fed values are never duplicated into the file.
    pub fn serialize(&self, workflow: &Workflow) -> WorkflowFile {
        let mut node_ids: Vec<&String> = workflow.nodes.keys().collect();
        node_ids.sort();

        let mut nodes = Vec::with_capacity(node_ids.len());
        for id in node_ids {
            let node = &workflow.nodes[id];
            let mut inputs = HashMap::new();

            for (name, port) in &node.ports().inputs {
                let is_connected = workflow
                    .connections
                    .iter()
                    .any(|c| c.to_node == *id && c.to_input == *name);
                if is_connected {
                    continue;
                }
                if let Some(value) = node.config.get(name).or(port.default.as_ref()) {
                    inputs.insert(name.clone(), value.to_json());
                }
            }

            nodes.push(NodeEntry {
                id: id.clone(),
                node_type: node.node_type().to_string(),
                position: node.position,
                inputs,
            });
        }

        let connections = workflow
            .connections
            .iter()
            .map(|c| ConnectionEntry {
                from: OutputRef {
                    node: c.from_node.clone(),
                    output: c.from_output.clone(),
                },
                to: InputRef {
                    node: c.to_node.clone(),
                    input: c.to_input.clone(),
                },
            })
            .collect();

        WorkflowFile {
            version: FORMAT_VERSION.to_string(),
            metadata: workflow.metadata.clone(),
            nodes,
            connections,
        }
    }

    /// Reconstruct a workflow, materializing nodes through the registry.
    pub fn deserialize(&self, file: &WorkflowFile) -> Result<Workflow, GraphError> {
        let mut workflow = Workflow::new();
        workflow.metadata = file.metadata.clone();

        for entry in &file.nodes {
            let config: HashMap<String, Value> = entry
                .inputs
                .iter()
                .map(|(name, json)| (name.clone(), Value::from_json(json.clone())))
                .collect();

            let node = self
                .registry
                .create_node(&entry.node_type, &entry.id, config)?
                .with_position(entry.position);
            workflow.add_node(node)?;
        }

        for conn in &file.connections {
            workflow.connections.push(Connection::new(
                &conn.from.node,
                &conn.from.output,
                &conn.to.node,
                &conn.to.input,
            ));
        }

        Ok(workflow)
    }

    /// Save a workflow to a JSON file
    pub fn save(&self, path: &Path, workflow: &Workflow) -> Result<(), EngineError> {
        let file = self.serialize(workflow);
        let json = serde_json::to_string_pretty(&file)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a workflow from a JSON file
    pub fn load(&self, path: &Path) -> Result<Workflow, EngineError> {
        let json = std::fs::read_to_string(path)?;
        let file: WorkflowFile = serde_json::from_str(&json)?;
        Ok(self.deserialize(&file)?)
    }
}
