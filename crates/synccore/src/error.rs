use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Node error: {0}")]
    Node(#[from] NodeError),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug, Clone)]
pub enum NodeError {
    #[error("Missing required input: {0}")]
    MissingInput(String),

    #[error("Invalid value for input '{input}': {reason}")]
    InvalidInput { input: String, reason: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

impl From<std::io::Error> for NodeError {
    fn from(e: std::io::Error) -> Self {
        NodeError::ExecutionFailed(e.to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Connection references unknown node: {0}")]
    UnknownNode(String),

    #[error("Connection references unknown port '{port}' on node '{node}'")]
    UnknownPort { node: String, port: String },

    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("Duplicate node id: {0}")]
    DuplicateNodeId(String),

    #[error("Cyclic dependency leaves nodes unscheduled: {unscheduled:?}")]
    CyclicDependency { unscheduled: Vec<String> },
}
