use async_trait::async_trait;
use std::collections::HashMap;
use synccore::{InputPort, NodeError, OpContext, Operation, OutputPort, PortType, Ports, Value};
use syncruntime::{NodeFactory, NodeTypeInfo};

/// Simple debug node that logs its inputs
pub struct DebugNode;

#[async_trait]
impl Operation for DebugNode {
    fn node_type(&self) -> &str {
        "debug.log"
    }

    fn define_ports(&self) -> Ports {
        Ports::new()
            .input(
                InputPort::new("message", PortType::String)
                    .optional()
                    .describe("Message to log"),
            )
            .output(OutputPort::new("message", PortType::String))
    }

    async fn execute(&self, ctx: OpContext) -> Result<HashMap<String, Value>, NodeError> {
        let message = ctx
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("(no message)")
            .to_string();

        ctx.events.info(format!("DEBUG: {}", message));

        // Also log all inputs for visibility
        for (key, value) in &ctx.inputs {
            ctx.events.info(format!("  {}: {:?}", key, value));
        }

        let mut outputs = HashMap::new();
        outputs.insert("message".to_string(), Value::String(message));
        Ok(outputs)
    }
}

pub struct DebugFactory;

impl NodeFactory for DebugFactory {
    fn node_type(&self) -> &str {
        "debug.log"
    }

    fn create(&self) -> Box<dyn Operation> {
        Box::new(DebugNode)
    }

    fn info(&self) -> NodeTypeInfo {
        NodeTypeInfo::new("debug", "Logs input values for debugging")
    }
}
