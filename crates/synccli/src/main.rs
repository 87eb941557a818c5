use anyhow::Result;
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use synccore::{EventBus, ExecutionEvent, NodeEvent, Position};
use syncruntime::{
    ExecutorConfig, NodeRegistry, UpstreamFailurePolicy, WorkflowExecutor, WorkflowSerializer,
};

#[derive(Parser)]
#[command(name = "synckit")]
#[command(about = "Node-based media workflow engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow file
    Run {
        /// Path to workflow JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Maximum number of parallel node executions
        #[arg(long, default_value_t = 4)]
        max_workers: usize,

        /// Disable result caching
        #[arg(long)]
        no_cache: bool,

        /// Skip dependents of failed nodes instead of attempting them
        #[arg(long)]
        skip_downstream: bool,

        /// Save execution results to a JSON file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a workflow file without executing it
    Validate {
        /// Path to workflow JSON file
        file: PathBuf,
    },

    /// List available node types
    Nodes,

    /// Create a new example workflow
    Init {
        /// Output file path
        #[arg(short, long, default_value = "workflow.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            max_workers,
            no_cache,
            skip_downstream,
            output,
            verbose,
        } => {
            init_tracing(verbose);
            run_workflow(file, max_workers, no_cache, skip_downstream, output).await?;
        }

        Commands::Validate { file } => {
            validate_workflow(file)?;
        }

        Commands::Nodes => {
            list_nodes();
        }

        Commands::Init { output } => {
            create_example_workflow(output)?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default_filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();
}

fn build_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    syncnodes::register_all(&mut registry);
    registry
}

async fn run_workflow(
    file: PathBuf,
    max_workers: usize,
    no_cache: bool,
    skip_downstream: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let registry = build_registry();
    let serializer = WorkflowSerializer::new(&registry);
    let mut workflow = serializer.load(&file)?;

    println!("🚀 Executing workflow: {}", file.display());
    println!(
        "   Nodes: {}, Connections: {}",
        workflow.nodes.len(),
        workflow.connections.len()
    );
    println!();

    let config = ExecutorConfig {
        max_workers,
        use_cache: !no_cache,
        upstream_failure: if skip_downstream {
            UpstreamFailurePolicy::SkipDependents
        } else {
            UpstreamFailurePolicy::Attempt
        },
    };
    let event_bus = Arc::new(EventBus::new(256));
    let mut executor = WorkflowExecutor::new(config, event_bus.clone());

    // Stream events for real-time output
    let mut events = event_bus.subscribe();
    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            print_event(event);
        }
    });

    let result = executor.execute(&mut workflow).await?;

    // Let the event printer drain before the summary
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    event_task.abort();

    println!();
    println!("📊 Execution Summary:");
    println!("   Execution ID: {}", result.execution_id);
    println!("   Success: {}", result.success);
    println!(
        "   Completed: {}/{} nodes ({} failed)",
        result.completed_nodes, result.total_nodes, result.failed_nodes
    );
    println!("   Execution time: {:.2}s", result.duration.as_secs_f64());

    if !result.errors.is_empty() {
        println!();
        println!("Errors:");
        for (node_id, error) in &result.errors {
            println!("   {}: {}", node_id, error);
        }
    }

    if let Some(path) = output {
        let node_results: serde_json::Map<String, serde_json::Value> = result
            .node_results
            .iter()
            .map(|(id, outputs)| {
                let object: serde_json::Map<String, serde_json::Value> = outputs
                    .iter()
                    .map(|(port, value)| (port.clone(), value.to_json()))
                    .collect();
                (id.clone(), serde_json::Value::Object(object))
            })
            .collect();

        let report = serde_json::json!({
            "success": result.success,
            "node_results": node_results,
            "errors": result.errors,
            "execution_time_secs": result.duration.as_secs_f64(),
            "total_nodes": result.total_nodes,
            "completed_nodes": result.completed_nodes,
            "failed_nodes": result.failed_nodes,
        });
        std::fs::write(&path, serde_json::to_string_pretty(&report)?)?;
        println!();
        println!("Results saved to: {}", path.display());
    }

    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}

fn print_event(event: ExecutionEvent) {
    match event {
        ExecutionEvent::WorkflowStarted { .. } => {
            println!("▶️  Workflow started");
        }
        ExecutionEvent::NodeStarted {
            node_id, node_type, ..
        } => {
            println!("  ⚡ Starting node: {} ({})", node_id, node_type);
        }
        ExecutionEvent::NodeCompleted {
            node_id,
            duration_ms,
            cached,
            ..
        } => {
            if cached {
                println!("  ✅ Node {} served from cache", node_id);
            } else {
                println!("  ✅ Node {} completed in {}ms", node_id, duration_ms);
            }
        }
        ExecutionEvent::NodeFailed { node_id, error, .. } => {
            println!("  ❌ Node {} failed: {}", node_id, error);
        }
        ExecutionEvent::NodeEvent { node_id, event, .. } => match event {
            NodeEvent::Info { message } => {
                println!("     ℹ️  [{}] {}", node_id, message);
            }
            NodeEvent::Warning { message } => {
                println!("     ⚠️  [{}] {}", node_id, message);
            }
            NodeEvent::Progress { percent, message } => {
                if let Some(message) = message {
                    println!("     📊 [{}] {:.0}% - {}", node_id, percent, message);
                } else {
                    println!("     📊 [{}] {:.0}%", node_id, percent);
                }
            }
        },
        ExecutionEvent::WorkflowCompleted {
            success,
            duration_ms,
            ..
        } => {
            if success {
                println!("✨ Workflow completed successfully in {}ms", duration_ms);
            } else {
                println!("💥 Workflow failed after {}ms", duration_ms);
            }
        }
    }
}

fn validate_workflow(file: PathBuf) -> Result<()> {
    println!("🔍 Validating workflow: {}", file.display());

    let registry = build_registry();
    let serializer = WorkflowSerializer::new(&registry);
    let workflow = serializer.load(&file)?;

    workflow.validate()?;
    let levels = WorkflowExecutor::execution_levels(&workflow)?;

    println!("✅ Workflow is valid:");
    println!("   Nodes: {}", workflow.nodes.len());
    println!("   Connections: {}", workflow.connections.len());
    println!("   Execution levels: {}", levels.len());

    Ok(())
}

fn list_nodes() {
    let registry = build_registry();

    println!("📦 Available Node Types:");

    let mut by_category: BTreeMap<String, Vec<(String, String)>> = BTreeMap::new();
    for node_type in registry.node_types() {
        let info = registry.info(&node_type).unwrap_or_default();
        by_category
            .entry(info.category)
            .or_default()
            .push((node_type, info.description));
    }

    for (category, entries) in by_category {
        println!();
        println!("{}:", category.to_uppercase());
        for (node_type, description) in entries {
            println!("  {:28} - {}", node_type, description);
        }
    }
}

fn create_example_workflow(output: PathBuf) -> Result<()> {
    use synccore::Workflow;

    let registry = build_registry();

    let mut workflow = Workflow::new();
    workflow.metadata.insert(
        "name".to_string(),
        serde_json::Value::String("Example media workflow".to_string()),
    );

    let load = registry
        .create_node(
            "input.load_video",
            "load_videos",
            [(
                "video_path".to_string(),
                synccore::Value::String("./media".to_string()),
            )]
            .into(),
        )?
        .with_position(Position { x: 100.0, y: 100.0 });

    let filter = registry
        .create_node(
            "util.filter_files",
            "filter_mov",
            [(
                "extensions".to_string(),
                synccore::Value::String("mov,mp4".to_string()),
            )]
            .into(),
        )?
        .with_position(Position { x: 300.0, y: 100.0 });

    let log = registry
        .create_node("debug.log", "log_files", Default::default())?
        .with_position(Position { x: 500.0, y: 100.0 });

    workflow.add_node(load)?;
    workflow.add_node(filter)?;
    workflow.add_node(log)?;
    workflow.connect("load_videos", "video_list", "filter_mov", "files");
    workflow.connect("filter_mov", "files", "log_files", "message");

    let serializer = WorkflowSerializer::new(&registry);
    serializer.save(&output, &workflow)?;

    println!("✨ Created example workflow: {}", output.display());
    println!();
    println!("Run it with:");
    println!("  synckit run --file {}", output.display());

    Ok(())
}
