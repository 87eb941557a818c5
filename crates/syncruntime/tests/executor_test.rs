use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use synccore::{
    EngineError, EventBus, ExecutionState, GraphError, InputPort, NodeError, OpContext, Operation,
    OutputPort, PortType, Ports, Value, Workflow, WorkflowNode,
};
use syncruntime::{ExecutorConfig, UpstreamFailurePolicy, WorkflowExecutor};

/// Emits its configured integer on port "x", counting invocations
struct SourceOp {
    executions: Arc<AtomicUsize>,
}

#[async_trait]
impl Operation for SourceOp {
    fn node_type(&self) -> &str {
        "test.source"
    }

    fn define_ports(&self) -> Ports {
        Ports::new()
            .input(InputPort::new("value", PortType::Integer).with_default(0i64))
            .output(OutputPort::new("x", PortType::Integer))
    }

    async fn execute(&self, ctx: OpContext) -> Result<HashMap<String, Value>, NodeError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        let value = ctx.get("value").and_then(|v| v.as_i64()).unwrap_or(0);
        Ok([("x".to_string(), Value::Integer(value))].into())
    }
}

/// Adds inputs "a" and "b" into output "sum"
struct AddOp;

#[async_trait]
impl Operation for AddOp {
    fn node_type(&self) -> &str {
        "test.add"
    }

    fn define_ports(&self) -> Ports {
        Ports::new()
            .input(InputPort::new("a", PortType::Integer).with_default(0i64))
            .input(InputPort::new("b", PortType::Integer).with_default(0i64))
            .output(OutputPort::new("sum", PortType::Integer))
    }

    async fn execute(&self, ctx: OpContext) -> Result<HashMap<String, Value>, NodeError> {
        let a = ctx.get("a").and_then(|v| v.as_i64()).unwrap_or(0);
        let b = ctx.get("b").and_then(|v| v.as_i64()).unwrap_or(0);
        Ok([("sum".to_string(), Value::Integer(a + b))].into())
    }
}

/// Requires input "y" (connection-fed in tests) and reports whether it
/// actually resolved
struct ProbeOp {
    executions: Arc<AtomicUsize>,
}

#[async_trait]
impl Operation for ProbeOp {
    fn node_type(&self) -> &str {
        "test.probe"
    }

    fn define_ports(&self) -> Ports {
        Ports::new()
            .input(InputPort::new("y", PortType::Integer))
            .output(OutputPort::new("had_y", PortType::Boolean))
    }

    async fn execute(&self, ctx: OpContext) -> Result<HashMap<String, Value>, NodeError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        let had_y = ctx.inputs.contains_key("y");
        Ok([("had_y".to_string(), Value::Bool(had_y))].into())
    }
}

/// Always fails
struct FailOp;

#[async_trait]
impl Operation for FailOp {
    fn node_type(&self) -> &str {
        "test.fail"
    }

    fn define_ports(&self) -> Ports {
        Ports::new().output(OutputPort::new("x", PortType::Integer))
    }

    async fn execute(&self, _ctx: OpContext) -> Result<HashMap<String, Value>, NodeError> {
        Err(NodeError::ExecutionFailed("boom".to_string()))
    }
}

/// Panics in the operation body
struct PanicOp;

#[async_trait]
impl Operation for PanicOp {
    fn node_type(&self) -> &str {
        "test.panic"
    }

    fn define_ports(&self) -> Ports {
        Ports::new().output(OutputPort::new("x", PortType::Integer))
    }

    async fn execute(&self, _ctx: OpContext) -> Result<HashMap<String, Value>, NodeError> {
        panic!("kaboom");
    }
}

/// Sleeps while tracking how many instances run at once
struct SleeperOp {
    current: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

#[async_trait]
impl Operation for SleeperOp {
    fn node_type(&self) -> &str {
        "test.sleeper"
    }

    fn define_ports(&self) -> Ports {
        Ports::new().output(OutputPort::new("x", PortType::Integer))
    }

    async fn execute(&self, _ctx: OpContext) -> Result<HashMap<String, Value>, NodeError> {
        let running = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok([("x".to_string(), Value::Integer(1))].into())
    }
}

fn node(id: &str, op: impl Operation + 'static) -> WorkflowNode {
    WorkflowNode::new(id, HashMap::new(), Box::new(op))
}

fn node_with_config(id: &str, config: &[(&str, Value)], op: impl Operation + 'static) -> WorkflowNode {
    let config = config
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();
    WorkflowNode::new(id, config, Box::new(op))
}

fn executor(config: ExecutorConfig) -> WorkflowExecutor {
    WorkflowExecutor::new(config, Arc::new(EventBus::new(64)))
}

fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

#[test]
fn diamond_levels_respect_dependencies() {
    let mut workflow = Workflow::new();
    workflow.add_node(node("a", SourceOp { executions: counter() })).unwrap();
    workflow.add_node(node("b", AddOp)).unwrap();
    workflow.add_node(node("c", AddOp)).unwrap();
    workflow.add_node(node("d", AddOp)).unwrap();
    workflow.connect("a", "x", "b", "a");
    workflow.connect("a", "x", "c", "a");
    workflow.connect("b", "sum", "d", "a");
    workflow.connect("c", "sum", "d", "b");

    let levels = WorkflowExecutor::execution_levels(&workflow).unwrap();
    assert_eq!(levels, vec![vec!["a"], vec!["b", "c"], vec!["d"]]);

    // Every dependency appears in a strictly earlier level.
    let level_of: HashMap<&str, usize> = levels
        .iter()
        .enumerate()
        .flat_map(|(i, level)| level.iter().map(move |id| (id.as_str(), i)))
        .collect();
    for conn in &workflow.connections {
        assert!(level_of[conn.from_node.as_str()] < level_of[conn.to_node.as_str()]);
    }
}

#[test]
fn disconnected_nodes_share_level_zero() {
    let mut workflow = Workflow::new();
    for i in 0..8 {
        workflow
            .add_node(node(&format!("n{}", i), SourceOp { executions: counter() }))
            .unwrap();
    }

    let levels = WorkflowExecutor::execution_levels(&workflow).unwrap();
    assert_eq!(levels.len(), 1);
    assert_eq!(levels[0].len(), 8);
}

#[test]
fn cycle_is_a_preflight_error() {
    let mut workflow = Workflow::new();
    workflow.add_node(node("a", AddOp)).unwrap();
    workflow.add_node(node("b", AddOp)).unwrap();
    workflow.connect("a", "sum", "b", "a");
    workflow.connect("b", "sum", "a", "a");

    let err = WorkflowExecutor::execution_levels(&workflow).unwrap_err();
    assert_eq!(
        err,
        GraphError::CyclicDependency {
            unscheduled: vec!["a".to_string(), "b".to_string()],
        }
    );
}

#[tokio::test]
async fn cyclic_workflow_never_starts() {
    let executions = counter();
    let mut workflow = Workflow::new();
    workflow
        .add_node(node("a", SourceOp { executions: executions.clone() }))
        .unwrap();
    workflow.add_node(node("b", AddOp)).unwrap();
    workflow.add_node(node("c", AddOp)).unwrap();
    workflow.connect("b", "sum", "c", "a");
    workflow.connect("c", "sum", "b", "a");

    let result = executor(ExecutorConfig::default())
        .execute(&mut workflow)
        .await;

    assert!(matches!(
        result,
        Err(EngineError::Graph(GraphError::CyclicDependency { .. }))
    ));
    // Pre-flight failure: not even the acyclic node ran.
    assert_eq!(executions.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn connection_to_unknown_port_is_a_graph_error() {
    let mut workflow = Workflow::new();
    workflow.add_node(node("a", SourceOp { executions: counter() })).unwrap();
    workflow.add_node(node("b", AddOp)).unwrap();
    workflow.connect("a", "nope", "b", "a");

    let result = executor(ExecutorConfig::default())
        .execute(&mut workflow)
        .await;

    assert!(matches!(
        result,
        Err(EngineError::Graph(GraphError::UnknownPort { .. }))
    ));
}

#[tokio::test]
async fn values_flow_through_connections() {
    let mut workflow = Workflow::new();
    workflow
        .add_node(node_with_config(
            "one",
            &[("value", Value::Integer(1))],
            SourceOp { executions: counter() },
        ))
        .unwrap();
    workflow
        .add_node(node_with_config(
            "two",
            &[("value", Value::Integer(2))],
            SourceOp { executions: counter() },
        ))
        .unwrap();
    workflow.add_node(node("sum", AddOp)).unwrap();
    workflow.connect("one", "x", "sum", "a");
    workflow.connect("two", "x", "sum", "b");

    let result = executor(ExecutorConfig::default())
        .execute(&mut workflow)
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.node_results["sum"]["sum"], Value::Integer(3));
    assert_eq!(result.completed_nodes, 3);
    assert_eq!(result.failed_nodes, 0);
}

#[tokio::test]
async fn level_concurrency_is_bounded_by_max_workers() {
    let current = counter();
    let peak = counter();

    let mut workflow = Workflow::new();
    for i in 0..8 {
        workflow
            .add_node(node(
                &format!("n{}", i),
                SleeperOp {
                    current: current.clone(),
                    peak: peak.clone(),
                },
            ))
            .unwrap();
    }

    let config = ExecutorConfig {
        max_workers: 3,
        ..Default::default()
    };
    let result = executor(config).execute(&mut workflow).await.unwrap();

    assert!(result.success);
    assert_eq!(result.completed_nodes, 8);
    assert!(
        peak.load(Ordering::SeqCst) <= 3,
        "worker pool exceeded max_workers: {}",
        peak.load(Ordering::SeqCst)
    );
}

#[tokio::test]
async fn second_run_is_served_from_cache() {
    let executions = counter();

    let mut workflow = Workflow::new();
    workflow
        .add_node(node_with_config(
            "src",
            &[("value", Value::Integer(7))],
            SourceOp { executions: executions.clone() },
        ))
        .unwrap();
    workflow.add_node(node("sum", AddOp)).unwrap();
    workflow.connect("src", "x", "sum", "a");

    let mut exec = executor(ExecutorConfig::default());
    let first = exec.execute(&mut workflow).await.unwrap();
    let second = exec.execute(&mut workflow).await.unwrap();

    assert!(first.success && second.success);
    assert_eq!(executions.load(Ordering::SeqCst), 1);
    assert_eq!(first.node_results["sum"]["sum"], second.node_results["sum"]["sum"]);
    assert_eq!(second.completed_nodes, 2);
}

#[tokio::test]
async fn config_change_invalidates_only_that_node() {
    let a_runs = counter();
    let b_runs = counter();

    let mut workflow = Workflow::new();
    workflow
        .add_node(node_with_config(
            "a",
            &[("value", Value::Integer(1))],
            SourceOp { executions: a_runs.clone() },
        ))
        .unwrap();
    workflow
        .add_node(node_with_config(
            "b",
            &[("value", Value::Integer(2))],
            SourceOp { executions: b_runs.clone() },
        ))
        .unwrap();

    let mut exec = executor(ExecutorConfig::default());
    exec.execute(&mut workflow).await.unwrap();

    workflow
        .nodes
        .get_mut("a")
        .unwrap()
        .config
        .insert("value".to_string(), Value::Integer(42));

    let result = exec.execute(&mut workflow).await.unwrap();

    assert_eq!(a_runs.load(Ordering::SeqCst), 2, "edited node must re-run");
    assert_eq!(b_runs.load(Ordering::SeqCst), 1, "untouched branch stays cached");
    assert_eq!(result.node_results["a"]["x"], Value::Integer(42));
}

#[tokio::test]
async fn failed_node_lands_in_error_map_not_results() {
    let mut workflow = Workflow::new();
    workflow.add_node(node("ok", SourceOp { executions: counter() })).unwrap();
    workflow.add_node(node("bad", FailOp)).unwrap();

    let result = executor(ExecutorConfig::default())
        .execute(&mut workflow)
        .await
        .unwrap();

    assert!(!result.success);
    assert!(result.errors.contains_key("bad"));
    assert!(!result.node_results.contains_key("bad"));
    assert!(result.node_results.contains_key("ok"));
    assert_eq!(result.completed_nodes + result.failed_nodes, result.total_nodes);
    assert_eq!(workflow.nodes["bad"].state(), ExecutionState::Failed);
    assert!(workflow.nodes["bad"].error().is_some());
}

#[tokio::test]
async fn panic_in_operation_body_is_isolated() {
    let mut workflow = Workflow::new();
    workflow.add_node(node("ok", SourceOp { executions: counter() })).unwrap();
    workflow.add_node(node("explodes", PanicOp)).unwrap();

    let result = executor(ExecutorConfig::default())
        .execute(&mut workflow)
        .await
        .unwrap();

    assert!(!result.success);
    assert!(result.errors["explodes"].contains("panicked"));
    assert!(result.node_results.contains_key("ok"));
}

#[tokio::test]
async fn validation_failure_skips_the_operation_body() {
    let executions = counter();
    let mut workflow = Workflow::new();
    // "y" is required, unconfigured, and not fed by any connection.
    workflow
        .add_node(node("probe", ProbeOp { executions: executions.clone() }))
        .unwrap();

    let result = executor(ExecutorConfig::default())
        .execute(&mut workflow)
        .await
        .unwrap();

    assert!(!result.success);
    assert!(result.errors["probe"].contains("Missing required input"));
    assert_eq!(executions.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn upstream_failure_leaves_input_unresolved() {
    let executions = counter();
    let mut workflow = Workflow::new();
    workflow.add_node(node("a", FailOp)).unwrap();
    workflow
        .add_node(node("b", ProbeOp { executions: executions.clone() }))
        .unwrap();
    workflow.connect("a", "x", "b", "y");

    let result = executor(ExecutorConfig::default())
        .execute(&mut workflow)
        .await
        .unwrap();

    // Default policy: b is still dispatched in the next level and observes
    // its connected input as unresolved.
    assert_eq!(executions.load(Ordering::SeqCst), 1);
    assert!(result.errors.contains_key("a"));
    assert_eq!(result.node_results["b"]["had_y"], Value::Bool(false));
    assert_eq!(result.completed_nodes, 1);
    assert_eq!(result.failed_nodes, 1);
}

#[tokio::test]
async fn skip_dependents_policy_cascades() {
    let b_runs = counter();
    let c_runs = counter();

    let mut workflow = Workflow::new();
    workflow.add_node(node("a", FailOp)).unwrap();
    workflow
        .add_node(node("b", ProbeOp { executions: b_runs.clone() }))
        .unwrap();
    workflow
        .add_node(node("c", ProbeOp { executions: c_runs.clone() }))
        .unwrap();
    workflow.connect("a", "x", "b", "y");
    workflow.connect("b", "had_y", "c", "y");

    let config = ExecutorConfig {
        upstream_failure: UpstreamFailurePolicy::SkipDependents,
        ..Default::default()
    };
    let result = executor(config).execute(&mut workflow).await.unwrap();

    assert!(!result.success);
    assert_eq!(result.failed_nodes, 3);
    assert!(result.errors["b"].contains("Skipped"));
    assert!(result.errors["c"].contains("Skipped"));
    assert_eq!(b_runs.load(Ordering::SeqCst), 0);
    assert_eq!(c_runs.load(Ordering::SeqCst), 0);
    assert_eq!(workflow.nodes["b"].state(), ExecutionState::Failed);
}

#[tokio::test]
async fn execution_log_records_every_outcome() {
    let mut workflow = Workflow::new();
    workflow.add_node(node("ok", SourceOp { executions: counter() })).unwrap();
    workflow.add_node(node("bad", FailOp)).unwrap();

    let mut exec = executor(ExecutorConfig::default());
    exec.execute(&mut workflow).await.unwrap();

    let log = exec.execution_log();
    assert_eq!(log.len(), 2);

    let ok_entry = log.iter().find(|e| e.node_id == "ok").unwrap();
    assert!(ok_entry.success);
    assert!(ok_entry.error.is_none());

    let bad_entry = log.iter().find(|e| e.node_id == "bad").unwrap();
    assert!(!bad_entry.success);
    assert!(bad_entry.error.as_deref().unwrap().contains("boom"));
}

#[tokio::test]
async fn progress_and_state_reach_terminal_values() {
    let mut workflow = Workflow::new();
    workflow
        .add_node(node_with_config(
            "src",
            &[("value", Value::Integer(5))],
            SourceOp { executions: counter() },
        ))
        .unwrap();

    executor(ExecutorConfig::default())
        .execute(&mut workflow)
        .await
        .unwrap();

    let src = &workflow.nodes["src"];
    assert_eq!(src.state(), ExecutionState::Completed);
    assert_eq!(src.progress(), 1.0);
}
