use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use synccore::{InputPort, NodeError, OpContext, Operation, OutputPort, PortType, Ports, Value};
use syncruntime::{NodeFactory, NodeTypeInfo};

fn parse_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                // Doubled quote inside a quoted field is a literal quote
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut field));
            }
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}

fn format_csv_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Convert HH:MM:SS:FF timecode to an absolute frame index.
fn tc_to_frames(tc: &str, fps: f64) -> Result<i64, NodeError> {
    let parts: Vec<&str> = tc.split(':').collect();
    let bad = || NodeError::ExecutionFailed(format!("Bad timecode format: {:?}", tc));
    if parts.len() != 4 {
        return Err(bad());
    }
    let mut numbers = [0i64; 4];
    for (slot, part) in numbers.iter_mut().zip(&parts) {
        *slot = part.parse().map_err(|_| bad())?;
    }
    let [h, m, s, f] = numbers;

    if f as f64 >= fps {
        return Err(NodeError::ExecutionFailed(format!(
            "Frame number {} exceeds frame rate {}",
            f, fps
        )));
    }

    Ok((((h * 3600) + (m * 60) + s) as f64 * fps) as i64 + f)
}

/// Convert an absolute frame index to an HH:MM:SS:FF timecode.
fn frames_to_tc(frames: i64, fps: f64) -> String {
    let total_seconds = frames as f64 / fps;
    let hours = (total_seconds / 3600.0) as i64;
    let minutes = ((total_seconds % 3600.0) / 60.0) as i64;
    let seconds = (total_seconds % 60.0) as i64;
    let frame = (frames as f64 % fps) as i64;

    format!("{:02}:{:02}:{:02}:{:02}", hours, minutes, seconds, frame)
}

fn looks_like_timecode(field: &str) -> bool {
    let parts: Vec<&str> = field.split(':').collect();
    parts.len() == 4
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}

/// Parse a CSV file into row records
pub struct ProcessCsvNode;

#[async_trait]
impl Operation for ProcessCsvNode {
    fn node_type(&self) -> &str {
        "csv.process"
    }

    fn define_ports(&self) -> Ports {
        Ports::new()
            .input(InputPort::new("csv_path", PortType::File).describe("CSV file to parse"))
            .input(
                InputPort::new("required_columns", PortType::String)
                    .optional()
                    .describe("Comma-separated column names that must be present"),
            )
            .input(
                InputPort::new("limit", PortType::Integer)
                    .optional()
                    .with_default(0i64)
                    .describe("Maximum rows to keep; 0 means no limit"),
            )
            .output(OutputPort::new("rows", PortType::CsvData))
            .output(OutputPort::new("headers", PortType::JsonData))
            .output(OutputPort::new("row_count", PortType::Integer))
    }

    async fn execute(&self, ctx: OpContext) -> Result<HashMap<String, Value>, NodeError> {
        let csv_path = ctx.require_str("csv_path")?;
        let content = std::fs::read_to_string(csv_path)?;

        let mut lines = content.lines().filter(|l| !l.trim().is_empty());
        let headers: Vec<String> = lines
            .next()
            .map(|l| parse_csv_line(l).iter().map(|h| h.trim().to_string()).collect())
            .ok_or_else(|| NodeError::ExecutionFailed(format!("Empty CSV file: {}", csv_path)))?;

        if let Some(required) = ctx.get("required_columns").and_then(|v| v.as_str()) {
            let missing: Vec<&str> = required
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty() && !headers.iter().any(|h| h == c))
                .collect();
            if !missing.is_empty() {
                return Err(NodeError::ExecutionFailed(format!(
                    "CSV is missing required columns: {}",
                    missing.join(", ")
                )));
            }
        }

        let limit = ctx.get("limit").and_then(|v| v.as_i64()).unwrap_or(0);
        let mut rows = Vec::new();
        for line in lines {
            if limit > 0 && rows.len() as i64 >= limit {
                break;
            }
            let fields = parse_csv_line(line);
            let record: serde_json::Map<String, serde_json::Value> = headers
                .iter()
                .zip(fields)
                .map(|(header, field)| (header.clone(), serde_json::Value::String(field)))
                .collect();
            rows.push(serde_json::Value::Object(record));
        }

        ctx.events.info(format!("Parsed {} rows", rows.len()));

        let mut outputs = HashMap::new();
        outputs.insert("row_count".to_string(), Value::Integer(rows.len() as i64));
        outputs.insert(
            "headers".to_string(),
            Value::List(headers.into_iter().map(Value::String).collect()),
        );
        outputs.insert("rows".to_string(), Value::Json(serde_json::Value::Array(rows)));
        Ok(outputs)
    }
}

pub struct ProcessCsvFactory;

impl NodeFactory for ProcessCsvFactory {
    fn node_type(&self) -> &str {
        "csv.process"
    }

    fn create(&self) -> Box<dyn Operation> {
        Box::new(ProcessCsvNode)
    }

    fn info(&self) -> NodeTypeInfo {
        NodeTypeInfo::new("csv", "Parse a CSV file into row records")
    }
}

/// Re-time every timecode field in a CSV between frame rates
pub struct ConvertTimecodesNode;

#[async_trait]
impl Operation for ConvertTimecodesNode {
    fn node_type(&self) -> &str {
        "csv.convert_timecodes"
    }

    fn define_ports(&self) -> Ports {
        let fps_ok = |v: &Value| v.as_f64().is_some_and(|fps| fps > 0.0);
        Ports::new()
            .input(InputPort::new("input_csv", PortType::File).describe("CSV with timecodes"))
            .input(
                InputPort::new("source_fps", PortType::Float)
                    .describe("Source frame rate (e.g. 24, 23.976)")
                    .with_validator(fps_ok),
            )
            .input(
                InputPort::new("target_fps", PortType::Float)
                    .describe("Target frame rate")
                    .with_validator(fps_ok),
            )
            .input(
                InputPort::new("output_csv", PortType::File)
                    .optional()
                    .describe("Defaults to <input stem>_converted.csv next to the input"),
            )
            .output(OutputPort::new("output_csv", PortType::File))
    }

    async fn execute(&self, ctx: OpContext) -> Result<HashMap<String, Value>, NodeError> {
        let input_csv = PathBuf::from(ctx.require_str("input_csv")?);
        let source_fps = ctx
            .require("source_fps")?
            .as_f64()
            .ok_or_else(|| NodeError::InvalidInput {
                input: "source_fps".to_string(),
                reason: "expected a number".to_string(),
            })?;
        let target_fps = ctx
            .require("target_fps")?
            .as_f64()
            .ok_or_else(|| NodeError::InvalidInput {
                input: "target_fps".to_string(),
                reason: "expected a number".to_string(),
            })?;

        let output_csv = ctx
            .get("output_csv")
            .and_then(|v| v.as_str())
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                let stem = input_csv
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("output");
                input_csv.with_file_name(format!("{}_converted.csv", stem))
            });

        let content = std::fs::read_to_string(&input_csv)?;
        let mut out_lines = Vec::new();
        for (index, line) in content.lines().enumerate() {
            if index == 0 || line.trim().is_empty() {
                out_lines.push(line.to_string());
                continue;
            }
            let converted: Vec<String> = parse_csv_line(line)
                .into_iter()
                .map(|field| {
                    if looks_like_timecode(&field) {
                        tc_to_frames(&field, source_fps)
                            .map(|frames| frames_to_tc(frames, target_fps))
                    } else {
                        Ok(field)
                    }
                })
                .collect::<Result<Vec<String>, NodeError>>()?
                .into_iter()
                .map(|field| format_csv_field(&field))
                .collect();
            out_lines.push(converted.join(","));
        }

        std::fs::write(&output_csv, out_lines.join("\n") + "\n")?;

        let mut outputs = HashMap::new();
        outputs.insert(
            "output_csv".to_string(),
            Value::String(output_csv.to_string_lossy().into_owned()),
        );
        Ok(outputs)
    }
}

pub struct ConvertTimecodesFactory;

impl NodeFactory for ConvertTimecodesFactory {
    fn node_type(&self) -> &str {
        "csv.convert_timecodes"
    }

    fn create(&self) -> Box<dyn Operation> {
        Box::new(ConvertTimecodesNode)
    }

    fn info(&self) -> NodeTypeInfo {
        NodeTypeInfo::new("csv", "Convert timecodes between frame rates")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timecode_to_frames_at_24fps() {
        assert_eq!(tc_to_frames("00:00:15:01", 24.0).unwrap(), 361);
    }

    #[test]
    fn frames_to_timecode_round_trips() {
        assert_eq!(frames_to_tc(361, 24.0), "00:00:15:01");
    }

    #[test]
    fn frame_number_must_fit_frame_rate() {
        assert!(tc_to_frames("00:00:01:24", 24.0).is_err());
    }

    #[test]
    fn quoted_fields_keep_commas() {
        let fields = parse_csv_line("a,\"b,c\",d");
        assert_eq!(fields, vec!["a", "b,c", "d"]);
    }

    #[test]
    fn doubled_quotes_are_literal() {
        let fields = parse_csv_line("\"say \"\"hi\"\"\",x");
        assert_eq!(fields, vec!["say \"hi\"", "x"]);
    }

    #[test]
    fn timecode_detection_is_strict() {
        assert!(looks_like_timecode("00:00:15:01"));
        assert!(!looks_like_timecode("00:00:15"));
        assert!(!looks_like_timecode("name"));
        assert!(!looks_like_timecode("a:b:c:d"));
    }
}
