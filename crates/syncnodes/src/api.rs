use async_trait::async_trait;
use std::collections::HashMap;
use synccore::{InputPort, NodeError, OpContext, Operation, OutputPort, PortType, Ports, Value};
use syncruntime::{NodeFactory, NodeTypeInfo};

/// HTTP request node
pub struct HttpRequestNode {
    client: reqwest::Client,
}

impl HttpRequestNode {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpRequestNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Operation for HttpRequestNode {
    fn node_type(&self) -> &str {
        "api.http_request"
    }

    fn define_ports(&self) -> Ports {
        Ports::new()
            .input(InputPort::new("url", PortType::String).describe("Request URL"))
            .input(
                InputPort::new("method", PortType::String)
                    .optional()
                    .with_default("GET"),
            )
            .input(
                InputPort::new("body", PortType::JsonData)
                    .optional()
                    .describe("JSON or text request body"),
            )
            .input(
                InputPort::new("headers", PortType::JsonData)
                    .optional()
                    .describe("Header name to value object"),
            )
            .output(OutputPort::new("status", PortType::Integer))
            .output(OutputPort::new("body", PortType::String))
            .output(OutputPort::new("headers", PortType::JsonData))
    }

    async fn execute(&self, ctx: OpContext) -> Result<HashMap<String, Value>, NodeError> {
        let url = ctx.require_str("url")?;
        let method = ctx
            .get("method")
            .and_then(|v| v.as_str())
            .unwrap_or("GET")
            .to_uppercase();

        ctx.events.info(format!("{} {}", method, url));

        let mut request = match method.as_str() {
            "GET" => self.client.get(url),
            "POST" => self.client.post(url),
            "PUT" => self.client.put(url),
            "DELETE" => self.client.delete(url),
            _ => {
                return Err(NodeError::Configuration(format!(
                    "Unsupported method: {}",
                    method
                )))
            }
        };

        if let Some(body) = ctx.get("body") {
            if let Some(json) = body.as_json() {
                request = request.json(json);
            } else if let Some(text) = body.as_str() {
                request = request.body(text.to_string());
            }
        }

        if let Some(headers) = ctx
            .get("headers")
            .and_then(|v| v.as_json())
            .and_then(|json| json.as_object())
        {
            for (name, value) in headers {
                if let Some(value) = value.as_str() {
                    request = request.header(name.as_str(), value);
                }
            }
        }

        let response = request
            .send()
            .await
            .map_err(|e| NodeError::ExecutionFailed(format!("HTTP request failed: {}", e)))?;

        let status = response.status().as_u16();
        let header_map: serde_json::Map<String, serde_json::Value> = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    serde_json::Value::String(value.to_str().unwrap_or("").to_string()),
                )
            })
            .collect();

        let body_text = response
            .text()
            .await
            .map_err(|e| NodeError::ExecutionFailed(format!("Failed to read response: {}", e)))?;

        ctx.events.info(format!("Response status: {}", status));

        let mut outputs = HashMap::new();
        outputs.insert("status".to_string(), Value::Integer(status as i64));
        outputs.insert("body".to_string(), Value::String(body_text));
        outputs.insert(
            "headers".to_string(),
            Value::Json(serde_json::Value::Object(header_map)),
        );
        Ok(outputs)
    }
}

pub struct HttpRequestFactory;

impl NodeFactory for HttpRequestFactory {
    fn node_type(&self) -> &str {
        "api.http_request"
    }

    fn create(&self) -> Box<dyn Operation> {
        Box::new(HttpRequestNode::new())
    }

    fn info(&self) -> NodeTypeInfo {
        NodeTypeInfo::new("api", "Make HTTP requests")
    }
}
