//! Core abstractions for the synckit workflow engine
//!
//! This crate provides the fundamental types and traits that all other
//! components depend on: the port/type system, the dynamic `Value`, the
//! `Operation` contract, the workflow data model, and execution events.

mod error;
mod events;
mod node;
mod port;
mod value;
mod workflow;

pub use error::{EngineError, GraphError, NodeError};
pub use events::{EventBus, EventEmitter, ExecutionEvent, ExecutionId, NodeEvent};
pub use node::{ExecutionState, OpContext, Operation, WorkflowNode};
pub use port::{InputPort, OutputPort, PortType, Ports};
pub use value::Value;
pub use workflow::{Connection, Position, Workflow};

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
