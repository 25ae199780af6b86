use crate::config::AppConfig;
use log::debug;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use thiserror::Error;

/// Metadata keys mapped to their string values, as reported by an external tool.
pub type MetadataMap = BTreeMap<String, String>;

const EXIFTOOL_DEVICE_ARGS: &[&str] = &["-Make", "-Model", "-AndroidMake", "-AndroidModel", "-j"];
const FFPROBE_CREATION_ARGS: &[&str] = &[
    "-v",
    "quiet",
    "-print_format",
    "json",
    "-show_entries",
    "format_tags=creation_time:stream_tags=creation_time",
];

/// Key prefix for tags that came from an individual stream rather than the container.
pub const STREAM_KEY_PREFIX: &str = "stream.";

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{tool} exited with {status}: {stderr}")]
    Exit {
        tool: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("could not parse {tool} output: {source}")]
    Parse {
        tool: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Given a path, return a mapping of metadata keys to string values, or fail.
pub trait MetadataTool {
    fn read(&self, path: &Path) -> Result<MetadataMap, ProbeError>;
}

/// The two collaborators the planner consults for every file.
pub struct MetadataTools {
    pub reader: Box<dyn MetadataTool>,
    pub prober: Box<dyn MetadataTool>,
}

impl MetadataTools {
    pub fn new(reader: impl MetadataTool + 'static, prober: impl MetadataTool + 'static) -> Self {
        Self {
            reader: Box::new(reader),
            prober: Box::new(prober),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            ExifTool::new(config.exiftool_path.clone()),
            FfProbe::new(config.ffprobe_path.clone()),
        )
    }
}

/// Reads make/model fields through `exiftool -j`.
#[derive(Debug, Clone)]
pub struct ExifTool {
    program: PathBuf,
}

impl ExifTool {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for ExifTool {
    fn default() -> Self {
        Self::new("exiftool")
    }
}

impl MetadataTool for ExifTool {
    fn read(&self, path: &Path) -> Result<MetadataMap, ProbeError> {
        let tool = self.program.display().to_string();
        let stdout = run_json_tool(&self.program, EXIFTOOL_DEVICE_ARGS, path)?;
        parse_exiftool_json(&stdout).map_err(|source| ProbeError::Parse { tool, source })
    }
}

/// Reads `creation_time` tags through `ffprobe`.
#[derive(Debug, Clone)]
pub struct FfProbe {
    program: PathBuf,
}

impl FfProbe {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for FfProbe {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

impl MetadataTool for FfProbe {
    fn read(&self, path: &Path) -> Result<MetadataMap, ProbeError> {
        let tool = self.program.display().to_string();
        let stdout = run_json_tool(&self.program, FFPROBE_CREATION_ARGS, path)?;
        parse_ffprobe_json(&stdout).map_err(|source| ProbeError::Parse { tool, source })
    }
}

fn run_json_tool(program: &Path, args: &[&str], path: &Path) -> Result<Vec<u8>, ProbeError> {
    let tool = program.display().to_string();
    debug!("running {} on {}", tool, path.display());

    let output = Command::new(program)
        .args(args)
        .arg(path)
        .output()
        .map_err(|source| ProbeError::Spawn {
            tool: tool.clone(),
            source,
        })?;

    if !output.status.success() {
        return Err(ProbeError::Exit {
            tool,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(output.stdout)
}

fn parse_exiftool_json(raw: &[u8]) -> Result<MetadataMap, serde_json::Error> {
    let text = String::from_utf8_lossy(raw);
    let records: Vec<BTreeMap<String, Value>> = serde_json::from_str(&text)?;

    let mut out = MetadataMap::new();
    if let Some(first) = records.into_iter().next() {
        for (key, value) in first {
            if let Some(value) = scalar_to_string(value) {
                out.insert(key, value);
            }
        }
    }
    Ok(out)
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<TagSection>,
    #[serde(default)]
    streams: Vec<TagSection>,
}

#[derive(Debug, Default, Deserialize)]
struct TagSection {
    #[serde(default)]
    tags: BTreeMap<String, Value>,
}

/// Container tags keep their own key; stream tags become `stream.<index>.<key>`.
fn parse_ffprobe_json(raw: &[u8]) -> Result<MetadataMap, serde_json::Error> {
    let text = String::from_utf8_lossy(raw);
    let probe: FfprobeOutput = serde_json::from_str(&text)?;

    let mut out = MetadataMap::new();
    if let Some(format) = probe.format {
        for (key, value) in format.tags {
            if let Some(value) = scalar_to_string(value) {
                out.insert(key, value);
            }
        }
    }
    for (index, stream) in probe.streams.into_iter().enumerate() {
        for (key, value) in stream.tags {
            if let Some(value) = scalar_to_string(value) {
                out.insert(format!("{STREAM_KEY_PREFIX}{index}.{key}"), value);
            }
        }
    }
    Ok(out)
}

fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_exiftool_json, parse_ffprobe_json, ExifTool, MetadataTool, ProbeError};
    use std::path::Path;

    #[test]
    fn exiftool_output_keeps_scalar_fields_of_first_record() {
        let raw = br#"[{"SourceFile":"IMG_1234.mov","Make":"Apple","Model":"iPhone 15 Pro","Rotation":90,"Tags":["a"]}]"#;
        let map = parse_exiftool_json(raw).expect("valid exiftool json");

        assert_eq!(map.get("Make").map(String::as_str), Some("Apple"));
        assert_eq!(map.get("Model").map(String::as_str), Some("iPhone 15 Pro"));
        assert_eq!(map.get("Rotation").map(String::as_str), Some("90"));
        assert!(!map.contains_key("Tags"));
    }

    #[test]
    fn exiftool_empty_array_yields_empty_map() {
        let map = parse_exiftool_json(b"[]").expect("valid exiftool json");
        assert!(map.is_empty());
    }

    #[test]
    fn ffprobe_output_separates_container_and_stream_tags() {
        let raw = br#"{
            "programs": [],
            "streams": [
                {"tags": {"creation_time": "2024-08-20T21:30:23.000000Z"}},
                {},
                {"tags": {"creation_time": "2024-08-20T21:30:24.000000Z"}}
            ],
            "format": {"tags": {"creation_time": "2024-08-20T21:30:22.000000Z"}}
        }"#;
        let map = parse_ffprobe_json(raw).expect("valid ffprobe json");

        assert_eq!(
            map.get("creation_time").map(String::as_str),
            Some("2024-08-20T21:30:22.000000Z")
        );
        assert_eq!(
            map.get("stream.0.creation_time").map(String::as_str),
            Some("2024-08-20T21:30:23.000000Z")
        );
        assert_eq!(
            map.get("stream.2.creation_time").map(String::as_str),
            Some("2024-08-20T21:30:24.000000Z")
        );
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn malformed_output_is_a_parse_error() {
        assert!(parse_ffprobe_json(b"not json").is_err());
        assert!(parse_exiftool_json(b"{}").is_err());
    }

    #[test]
    fn missing_binary_reports_spawn_error() {
        let tool = ExifTool::new("/nonexistent/bin/exiftool-for-tests");
        let err = tool
            .read(Path::new("IMG_0001.jpg"))
            .expect_err("missing binary must fail");
        assert!(matches!(err, ProbeError::Spawn { .. }));
    }
}
