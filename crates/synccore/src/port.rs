use crate::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Data types for node ports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortType {
    /// Single file path
    File,
    /// Directory path
    Directory,
    /// List of file paths
    FileList,
    /// List of URLs
    UrlList,
    /// Manifest file structure
    Manifest,
    /// CSV data structure
    CsvData,
    /// Generic JSON data
    JsonData,
    /// Video properties
    VideoMetadata,
    /// Scene detection results
    SceneList,
    String,
    Integer,
    Float,
    Boolean,
}

type Validator = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// An input slot on a node.
///
/// A required input with no default must receive a value from static
/// configuration or from a connection before execution.
#[derive(Clone)]
pub struct InputPort {
    pub name: String,
    pub port_type: PortType,
    pub required: bool,
    pub default: Option<Value>,
    pub description: String,
    validator: Option<Validator>,
}

impl InputPort {
    pub fn new(name: impl Into<String>, port_type: PortType) -> Self {
        Self {
            name: name.into(),
            port_type,
            required: true,
            default: None,
            description: String::new(),
            validator: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_validator(
        mut self,
        validator: impl Fn(&Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Validate a candidate value for this port.
    ///
    /// A missing or null value passes when the port is optional or has a
    /// default; a present value passes unless a custom validator rejects it.
    pub fn validate(&self, value: Option<&Value>) -> bool {
        match value {
            None => !self.required || self.default.is_some(),
            Some(v) if v.is_null() => !self.required || self.default.is_some(),
            Some(v) => self.validator.as_ref().map_or(true, |check| check(v)),
        }
    }
}

impl fmt::Debug for InputPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputPort")
            .field("name", &self.name)
            .field("port_type", &self.port_type)
            .field("required", &self.required)
            .field("default", &self.default)
            .field("has_validator", &self.validator.is_some())
            .finish()
    }
}

/// An output slot on a node.
#[derive(Debug, Clone)]
pub struct OutputPort {
    pub name: String,
    pub port_type: PortType,
    pub description: String,
}

impl OutputPort {
    pub fn new(name: impl Into<String>, port_type: PortType) -> Self {
        Self {
            name: name.into(),
            port_type,
            description: String::new(),
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Declared input/output port maps for one node type.
#[derive(Debug, Clone, Default)]
pub struct Ports {
    pub inputs: HashMap<String, InputPort>,
    pub outputs: HashMap<String, OutputPort>,
}

impl Ports {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(mut self, port: InputPort) -> Self {
        self.inputs.insert(port.name.clone(), port);
        self
    }

    pub fn output(mut self, port: OutputPort) -> Self {
        self.outputs.insert(port.name.clone(), port);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_port_rejects_missing_value() {
        let port = InputPort::new("video_path", PortType::File);
        assert!(!port.validate(None));
        assert!(!port.validate(Some(&Value::Null)));
        assert!(port.validate(Some(&Value::String("/a.mov".into()))));
    }

    #[test]
    fn optional_port_accepts_missing_value() {
        let port = InputPort::new("pattern", PortType::String).optional();
        assert!(port.validate(None));
    }

    #[test]
    fn default_satisfies_required_port() {
        let port = InputPort::new("interval", PortType::Integer).with_default(180i64);
        assert!(port.validate(None));
    }

    #[test]
    fn custom_validator_runs_on_present_values() {
        let port = InputPort::new("fps", PortType::Float)
            .with_validator(|v| v.as_f64().is_some_and(|fps| fps > 0.0));
        assert!(port.validate(Some(&Value::Float(23.976))));
        assert!(!port.validate(Some(&Value::Float(-1.0))));
    }
}
