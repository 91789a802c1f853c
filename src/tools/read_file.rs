//! Read File tool implementation.
//!
//! Reads a UTF-8 text file and returns it wrapped in a fenced block.
//! Every outcome, including failures, is returned as text for the model.

use std::path::Path;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::io::AsyncReadExt;

use super::filter::SensitiveFilter;
use super::Tool;
use crate::error::ToolError;
use crate::types::ParameterSpec;

const MAX_CONTENT_BYTES: usize = 100_000;

pub struct ReadFileTool {
    filter: SensitiveFilter,
}

impl ReadFileTool {
    pub fn new(filter: SensitiveFilter) -> Self {
        Self { filter }
    }

    /// Read `path` and render the result (or the failure) as text.
    pub async fn read(&self, path: &str) -> String {
        if self.filter.is_sensitive_path(Path::new(path)) {
            return SensitiveFilter::refusal(path);
        }

        let metadata = match tokio::fs::metadata(path).await {
            Ok(m) if m.is_dir() => {
                return format!("Error: '{}' is a directory, not a file", path);
            }
            // FIFOs, sockets and devices can block or never end.
            Ok(m) if !m.is_file() => {
                return format!("Error: '{}' is not a regular file", path);
            }
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return format!("Error: File '{}' does not exist", path);
            }
            Err(e) => return format!("Error reading file: {}", e),
        };

        match read_bounded(path, MAX_CONTENT_BYTES).await {
            Ok((content, false)) => format!("Contents of '{}':\n```\n{}\n```", path, content),
            Ok((content, true)) => format!(
                "Contents of '{}':\n```\n{}\n... (truncated, {} bytes total)\n```",
                path,
                content,
                metadata.len()
            ),
            Err(e) => format!("Error reading file: {}", e),
        }
    }
}

/// Read at most `max_bytes` of UTF-8 text. The flag is true when the file
/// was longer than that.
async fn read_bounded(path: &str, max_bytes: usize) -> std::io::Result<(String, bool)> {
    let file = tokio::fs::File::open(path).await?;
    let mut buf = Vec::new();
    file.take(max_bytes as u64 + 1).read_to_end(&mut buf).await?;

    let truncated = buf.len() > max_bytes;
    if truncated {
        buf.truncate(max_bytes);
        // Drop a multi-byte character split by the cut.
        if let Err(e) = std::str::from_utf8(&buf) {
            if e.error_len().is_none() {
                buf.truncate(e.valid_up_to());
            }
        }
    }
    let text = String::from_utf8(buf)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    Ok((text, truncated))
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file (cannot read files starting with .env for security)"
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![ParameterSpec::required(
            "filepath",
            "The path to the file to read",
        )]
    }

    async fn execute(&self, params: &Map<String, Value>) -> Result<String, ToolError> {
        let path = params
            .get("filepath")
            .and_then(|v| v.as_str())
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ToolError::MissingArgument {
                tool: self.name().to_string(),
                name: "filepath".to_string(),
            })?;

        Ok(self.read(path).await)
    }
}
