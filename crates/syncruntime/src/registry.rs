use std::collections::HashMap;
use std::sync::Arc;
use synccore::{GraphError, Operation, Value, WorkflowNode};

/// Factory trait for creating operation instances
pub trait NodeFactory: Send + Sync {
    /// Node type identifier this factory produces
    fn node_type(&self) -> &str;

    /// Create a fresh operation instance
    fn create(&self) -> Box<dyn Operation>;

    /// Descriptive metadata for front-end introspection
    fn info(&self) -> NodeTypeInfo {
        NodeTypeInfo::default()
    }
}

/// Metadata about a node type
#[derive(Debug, Clone)]
pub struct NodeTypeInfo {
    pub description: String,
    pub category: String,
}

impl Default for NodeTypeInfo {
    fn default() -> Self {
        Self {
            description: String::new(),
            category: "general".to_string(),
        }
    }
}

impl NodeTypeInfo {
    pub fn new(category: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            category: category.into(),
        }
    }
}

/// Registry of available node types.
///
/// Populated by explicit `register` calls at startup (see
/// `syncnodes::register_all`); constructed once and passed by reference to
/// whoever needs to construct nodes.
pub struct NodeRegistry {
    factories: HashMap<String, Arc<dyn NodeFactory>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a node factory
    pub fn register(&mut self, factory: Arc<dyn NodeFactory>) {
        let node_type = factory.node_type().to_string();
        tracing::debug!("Registering node type: {}", node_type);
        self.factories.insert(node_type, factory);
    }

    /// Create a node instance from a type name, id, and static configuration
    pub fn create_node(
        &self,
        node_type: &str,
        id: impl Into<String>,
        config: HashMap<String, Value>,
    ) -> Result<WorkflowNode, GraphError> {
        let factory = self
            .factories
            .get(node_type)
            .ok_or_else(|| GraphError::UnknownNodeType(node_type.to_string()))?;

        Ok(WorkflowNode::new(id, config, factory.create()))
    }

    /// All registered node types, sorted
    pub fn node_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.factories.keys().cloned().collect();
        types.sort();
        types
    }

    /// Metadata for a node type
    pub fn info(&self, node_type: &str) -> Option<NodeTypeInfo> {
        self.factories.get(node_type).map(|f| f.info())
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
