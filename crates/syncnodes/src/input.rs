use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use synccore::{InputPort, NodeError, OpContext, Operation, OutputPort, PortType, Ports, Value};
use syncruntime::{NodeFactory, NodeTypeInfo};

const VIDEO_EXTENSIONS: &[&str] = &["mov", "mp4", "avi", "mkv", "mxf", "m4v"];
const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "aac", "flac", "aif", "aiff", "m4a"];

fn collect_files(dir: &Path, extensions: &[&str]) -> Result<Vec<String>, NodeError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let matched = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .is_some_and(|ext| extensions.contains(&ext.as_str()));
        if matched {
            files.push(path.to_string_lossy().into_owned());
        }
    }
    files.sort();
    Ok(files)
}

fn load_media(
    path_input: &str,
    ctx: &OpContext,
    path_port: &str,
    list_port: &str,
    extensions: &[&str],
) -> Result<HashMap<String, Value>, NodeError> {
    let path = PathBuf::from(path_input);

    if !path.exists() {
        return Err(NodeError::ExecutionFailed(format!(
            "Path does not exist: {}",
            path.display()
        )));
    }

    let (single, list) = if path.is_file() {
        (path_input.to_string(), vec![path_input.to_string()])
    } else if path.is_dir() {
        let files = collect_files(&path, extensions)?;
        ctx.events
            .info(format!("Found {} files in {}", files.len(), path.display()));
        (path_input.to_string(), files)
    } else {
        return Err(NodeError::ExecutionFailed(format!(
            "Invalid path: {}",
            path.display()
        )));
    };

    let mut outputs = HashMap::new();
    outputs.insert(path_port.to_string(), Value::String(single));
    outputs.insert(
        list_port.to_string(),
        Value::List(list.into_iter().map(Value::String).collect()),
    );
    Ok(outputs)
}

/// Load video file(s) from a local path
pub struct LoadVideoNode;

#[async_trait]
impl Operation for LoadVideoNode {
    fn node_type(&self) -> &str {
        "input.load_video"
    }

    fn define_ports(&self) -> Ports {
        Ports::new()
            .input(
                InputPort::new("video_path", PortType::File)
                    .describe("Path to video file or directory containing videos"),
            )
            .output(OutputPort::new("video_path", PortType::File))
            .output(
                OutputPort::new("video_list", PortType::FileList)
                    .describe("Sorted list of video file paths"),
            )
    }

    async fn execute(&self, ctx: OpContext) -> Result<HashMap<String, Value>, NodeError> {
        let path = ctx.require_str("video_path")?.to_string();
        load_media(&path, &ctx, "video_path", "video_list", VIDEO_EXTENSIONS)
    }
}

pub struct LoadVideoFactory;

impl NodeFactory for LoadVideoFactory {
    fn node_type(&self) -> &str {
        "input.load_video"
    }

    fn create(&self) -> Box<dyn Operation> {
        Box::new(LoadVideoNode)
    }

    fn info(&self) -> NodeTypeInfo {
        NodeTypeInfo::new("input", "Load video file(s) from local path")
    }
}

/// Load audio file(s) from a local path
pub struct LoadAudioNode;

#[async_trait]
impl Operation for LoadAudioNode {
    fn node_type(&self) -> &str {
        "input.load_audio"
    }

    fn define_ports(&self) -> Ports {
        Ports::new()
            .input(
                InputPort::new("audio_path", PortType::File)
                    .describe("Path to audio file or directory containing audio files"),
            )
            .output(OutputPort::new("audio_path", PortType::File))
            .output(
                OutputPort::new("audio_list", PortType::FileList)
                    .describe("Sorted list of audio file paths"),
            )
    }

    async fn execute(&self, ctx: OpContext) -> Result<HashMap<String, Value>, NodeError> {
        let path = ctx.require_str("audio_path")?.to_string();
        load_media(&path, &ctx, "audio_path", "audio_list", AUDIO_EXTENSIONS)
    }
}

pub struct LoadAudioFactory;

impl NodeFactory for LoadAudioFactory {
    fn node_type(&self) -> &str {
        "input.load_audio"
    }

    fn create(&self) -> Box<dyn Operation> {
        Box::new(LoadAudioNode)
    }

    fn info(&self) -> NodeTypeInfo {
        NodeTypeInfo::new("input", "Load audio file(s) from local path")
    }
}
