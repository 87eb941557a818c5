//! Workflow execution runtime
//!
//! This crate provides the execution engine that runs workflows: the node
//! registry, the data manager that routes values between nodes, the leveled
//! DAG executor, and the workflow serializer.

mod data;
mod executor;
mod registry;
mod serializer;

pub use data::DataManager;
pub use executor::{
    ExecutionLogEntry, ExecutionResult, ExecutorConfig, UpstreamFailurePolicy, WorkflowExecutor,
};
pub use registry::{NodeFactory, NodeRegistry, NodeTypeInfo};
pub use serializer::{
    ConnectionEntry, InputRef, NodeEntry, OutputRef, WorkflowFile, WorkflowSerializer,
    FORMAT_VERSION,
};
