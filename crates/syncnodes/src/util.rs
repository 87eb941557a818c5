use async_trait::async_trait;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use synccore::{InputPort, NodeError, OpContext, Operation, OutputPort, PortType, Ports, Value};
use syncruntime::{NodeFactory, NodeTypeInfo};

fn string_list(value: &Value, input: &str) -> Result<Vec<String>, NodeError> {
    let items = value.as_list().ok_or_else(|| NodeError::InvalidInput {
        input: input.to_string(),
        reason: "expected a list".to_string(),
    })?;
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| NodeError::InvalidInput {
                    input: input.to_string(),
                    reason: "expected a list of strings".to_string(),
                })
        })
        .collect()
}

/// Filter a file list by extension and substring pattern
pub struct FilterFilesNode;

#[async_trait]
impl Operation for FilterFilesNode {
    fn node_type(&self) -> &str {
        "util.filter_files"
    }

    fn define_ports(&self) -> Ports {
        Ports::new()
            .input(InputPort::new("files", PortType::FileList).describe("Files to filter"))
            .input(
                InputPort::new("extensions", PortType::String)
                    .optional()
                    .describe("Comma-separated extensions to keep (e.g. \"mov,mp4\")"),
            )
            .input(
                InputPort::new("pattern", PortType::String)
                    .optional()
                    .describe("Substring the file name must contain"),
            )
            .output(OutputPort::new("files", PortType::FileList))
            .output(OutputPort::new("count", PortType::Integer))
    }

    async fn execute(&self, ctx: OpContext) -> Result<HashMap<String, Value>, NodeError> {
        let files = string_list(ctx.require("files")?, "files")?;

        let extensions: Option<Vec<String>> = ctx.get("extensions").and_then(|v| v.as_str()).map(|s| {
            s.split(',')
                .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect()
        });
        let pattern = ctx.get("pattern").and_then(|v| v.as_str());

        let kept: Vec<String> = files
            .into_iter()
            .filter(|file| {
                let path = Path::new(file);
                if let Some(exts) = &extensions {
                    let matched = path
                        .extension()
                        .and_then(|e| e.to_str())
                        .map(|e| e.to_ascii_lowercase())
                        .is_some_and(|ext| exts.contains(&ext));
                    if !matched {
                        return false;
                    }
                }
                if let Some(needle) = pattern {
                    let name = path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .unwrap_or(file.as_str());
                    if !name.contains(needle) {
                        return false;
                    }
                }
                true
            })
            .collect();

        ctx.events
            .info(format!("Kept {} files after filtering", kept.len()));

        let mut outputs = HashMap::new();
        outputs.insert("count".to_string(), Value::Integer(kept.len() as i64));
        outputs.insert(
            "files".to_string(),
            Value::List(kept.into_iter().map(Value::String).collect()),
        );
        Ok(outputs)
    }
}

pub struct FilterFilesFactory;

impl NodeFactory for FilterFilesFactory {
    fn node_type(&self) -> &str {
        "util.filter_files"
    }

    fn create(&self) -> Box<dyn Operation> {
        Box::new(FilterFilesNode)
    }

    fn info(&self) -> NodeTypeInfo {
        NodeTypeInfo::new("utility", "Filter a file list by extension or name pattern")
    }
}

/// Rename files in place with prefix/suffix/find-replace rules
pub struct RenameFilesNode;

#[async_trait]
impl Operation for RenameFilesNode {
    fn node_type(&self) -> &str {
        "util.rename_files"
    }

    fn define_ports(&self) -> Ports {
        Ports::new()
            .input(InputPort::new("files", PortType::FileList).describe("Files to rename"))
            .input(
                InputPort::new("find", PortType::String)
                    .optional()
                    .with_default("")
                    .describe("Substring to replace in each file stem"),
            )
            .input(
                InputPort::new("replace_with", PortType::String)
                    .optional()
                    .with_default(""),
            )
            .input(
                InputPort::new("prefix", PortType::String)
                    .optional()
                    .with_default(""),
            )
            .input(
                InputPort::new("suffix", PortType::String)
                    .optional()
                    .with_default("")
                    .describe("Appended to the stem, before the extension"),
            )
            .output(OutputPort::new("files", PortType::FileList))
    }

    async fn execute(&self, ctx: OpContext) -> Result<HashMap<String, Value>, NodeError> {
        let files = string_list(ctx.require("files")?, "files")?;
        let find = ctx.get("find").and_then(|v| v.as_str()).unwrap_or("");
        let replace_with = ctx.get("replace_with").and_then(|v| v.as_str()).unwrap_or("");
        let prefix = ctx.get("prefix").and_then(|v| v.as_str()).unwrap_or("");
        let suffix = ctx.get("suffix").and_then(|v| v.as_str()).unwrap_or("");

        let mut renamed = Vec::with_capacity(files.len());
        for file in files {
            let path = PathBuf::from(&file);
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| NodeError::ExecutionFailed(format!("Bad file name: {}", file)))?;

            let mut new_stem = if find.is_empty() {
                stem.to_string()
            } else {
                stem.replace(find, replace_with)
            };
            new_stem = format!("{}{}{}", prefix, new_stem, suffix);

            let mut new_name = new_stem;
            if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
                new_name = format!("{}.{}", new_name, ext);
            }

            let new_path = path.with_file_name(&new_name);
            if new_path != path {
                std::fs::rename(&path, &new_path)?;
            }
            renamed.push(new_path.to_string_lossy().into_owned());
        }

        let mut outputs = HashMap::new();
        outputs.insert(
            "files".to_string(),
            Value::List(renamed.into_iter().map(Value::String).collect()),
        );
        Ok(outputs)
    }
}

pub struct RenameFilesFactory;

impl NodeFactory for RenameFilesFactory {
    fn node_type(&self) -> &str {
        "util.rename_files"
    }

    fn create(&self) -> Box<dyn Operation> {
        Box::new(RenameFilesNode)
    }

    fn info(&self) -> NodeTypeInfo {
        NodeTypeInfo::new("utility", "Rename files with prefix/suffix/find-replace rules")
    }
}

/// Merge the files of several directories into one target directory
pub struct MergeDirectoriesNode;

#[async_trait]
impl Operation for MergeDirectoriesNode {
    fn node_type(&self) -> &str {
        "util.merge_directories"
    }

    fn define_ports(&self) -> Ports {
        Ports::new()
            .input(
                InputPort::new("sources", PortType::FileList)
                    .describe("Directories whose files are merged"),
            )
            .input(InputPort::new("target", PortType::Directory))
            .output(OutputPort::new("target", PortType::Directory))
            .output(OutputPort::new("count", PortType::Integer))
    }

    async fn execute(&self, ctx: OpContext) -> Result<HashMap<String, Value>, NodeError> {
        let sources = string_list(ctx.require("sources")?, "sources")?;
        let target = PathBuf::from(ctx.require_str("target")?);
        std::fs::create_dir_all(&target)?;

        let mut count = 0i64;
        for source in &sources {
            let source = Path::new(source);
            if !source.is_dir() {
                return Err(NodeError::ExecutionFailed(format!(
                    "Not a directory: {}",
                    source.display()
                )));
            }
            for entry in std::fs::read_dir(source)? {
                let path = entry?.path();
                if !path.is_file() {
                    continue;
                }
                let name = path
                    .file_name()
                    .ok_or_else(|| {
                        NodeError::ExecutionFailed(format!("Bad file name: {}", path.display()))
                    })?;
                std::fs::copy(&path, target.join(name))?;
                count += 1;
            }
        }

        ctx.events.info(format!(
            "Merged {} files from {} directories",
            count,
            sources.len()
        ));

        let mut outputs = HashMap::new();
        outputs.insert(
            "target".to_string(),
            Value::String(target.to_string_lossy().into_owned()),
        );
        outputs.insert("count".to_string(), Value::Integer(count));
        Ok(outputs)
    }
}

pub struct MergeDirectoriesFactory;

impl NodeFactory for MergeDirectoriesFactory {
    fn node_type(&self) -> &str {
        "util.merge_directories"
    }

    fn create(&self) -> Box<dyn Operation> {
        Box::new(MergeDirectoriesNode)
    }

    fn info(&self) -> NodeTypeInfo {
        NodeTypeInfo::new("utility", "Merge directory contents into one directory")
    }
}

/// Create a manifest file from video/audio URL lists
pub struct CreateManifestNode;

#[async_trait]
impl Operation for CreateManifestNode {
    fn node_type(&self) -> &str {
        "util.create_manifest"
    }

    fn define_ports(&self) -> Ports {
        Ports::new()
            .input(InputPort::new("video_urls", PortType::UrlList).optional())
            .input(InputPort::new("audio_urls", PortType::UrlList).optional())
            .input(
                InputPort::new("output_file", PortType::File)
                    .optional()
                    .describe("Manifest path; defaults to the scratch directory"),
            )
            .output(OutputPort::new("manifest_file", PortType::Manifest))
    }

    async fn execute(&self, ctx: OpContext) -> Result<HashMap<String, Value>, NodeError> {
        let video_urls = ctx
            .get("video_urls")
            .map(|v| string_list(v, "video_urls"))
            .transpose()?
            .unwrap_or_default();
        let audio_urls = ctx
            .get("audio_urls")
            .map(|v| string_list(v, "audio_urls"))
            .transpose()?
            .unwrap_or_default();

        let output_file = ctx
            .get("output_file")
            .and_then(|v| v.as_str())
            .map(PathBuf::from)
            .unwrap_or_else(|| ctx.scratch_dir.join("uploaded_urls.txt"));

        let mut file = std::fs::File::create(&output_file)?;
        if !video_urls.is_empty() {
            writeln!(file, "VIDEOS")?;
            for url in &video_urls {
                writeln!(file, "{}", url)?;
            }
            writeln!(file)?;
        }
        if !audio_urls.is_empty() {
            writeln!(file, "AUDIOS")?;
            for url in &audio_urls {
                writeln!(file, "{}", url)?;
            }
        }

        let mut outputs = HashMap::new();
        outputs.insert(
            "manifest_file".to_string(),
            Value::String(output_file.to_string_lossy().into_owned()),
        );
        Ok(outputs)
    }
}

pub struct CreateManifestFactory;

impl NodeFactory for CreateManifestFactory {
    fn node_type(&self) -> &str {
        "util.create_manifest"
    }

    fn create(&self) -> Box<dyn Operation> {
        Box::new(CreateManifestNode)
    }

    fn info(&self) -> NodeTypeInfo {
        NodeTypeInfo::new("utility", "Create a manifest file from URL lists")
    }
}
