//! List Files tool implementation.
//!
//! Lists the entries of one directory, directories first, hiding anything
//! whose name matches the sensitive filter.

use std::path::Path;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::filter::SensitiveFilter;
use super::Tool;
use crate::error::ToolError;
use crate::types::ParameterSpec;

const MAX_ENTRIES: usize = 500;

pub struct ListFilesTool {
    filter: SensitiveFilter,
}

impl ListFilesTool {
    pub fn new(filter: SensitiveFilter) -> Self {
        Self { filter }
    }

    /// Produce the textual listing for `path`, or an error text.
    pub fn list(&self, path: &str) -> String {
        if self.filter.is_sensitive_path(Path::new(path)) {
            return SensitiveFilter::refusal(path);
        }

        let dir_path = Path::new(path);
        let metadata = match std::fs::metadata(dir_path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return format!("Error: Path '{}' does not exist", path);
            }
            Err(e) => return format!("Error listing files: {}", e),
        };
        if !metadata.is_dir() {
            return format!("Error: '{}' is not a directory", path);
        }

        let read_dir = match std::fs::read_dir(dir_path) {
            Ok(rd) => rd,
            Err(e) => return format!("Error listing files: {}", e),
        };
        let mut entries: Vec<_> = read_dir.filter_map(|e| e.ok()).collect();
        if entries.is_empty() {
            return format!("Directory '{}' is empty", path);
        }
        entries.sort_by_key(|e| e.file_name());

        let mut dirs = Vec::new();
        let mut files = Vec::new();
        let mut hidden = 0usize;
        let mut truncated = false;

        for entry in entries {
            let name = entry.file_name().to_string_lossy().into_owned();
            if self.filter.is_sensitive_name(&name) {
                hidden += 1;
                continue;
            }
            // Past the cap, keep scanning so the hidden count stays exact.
            if dirs.len() + files.len() >= MAX_ENTRIES {
                truncated = true;
                continue;
            }
            if entry.path().is_dir() {
                dirs.push(format!("📁 {}/", name));
            } else {
                files.push(format!("📄 {}", name));
            }
        }

        let mut output = format!("Contents of '{}':\n", path);
        if !dirs.is_empty() {
            output.push_str("\nDirectories:\n");
            output.push_str(&dirs.join("\n"));
            output.push('\n');
        }
        if !files.is_empty() {
            output.push_str("\nFiles:\n");
            output.push_str(&files.join("\n"));
            output.push('\n');
        }
        if truncated {
            output.push_str(&format!("\n... (truncated at {} entries)\n", MAX_ENTRIES));
        }
        if hidden > 0 {
            output.push_str(&format!(
                "\n(Hidden {} file(s) for security reasons)",
                hidden
            ));
        }

        output
    }
}

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "List files and directories in a given path \
         (excludes files starting with .env for security)"
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![ParameterSpec::optional(
            "path",
            "The directory path to list files from (default: current directory)",
        )]
    }

    async fn execute(&self, params: &Map<String, Value>) -> Result<String, ToolError> {
        let path = match params.get("path") {
            None | Some(Value::Null) => ".",
            Some(Value::String(p)) if p.trim().is_empty() => ".",
            Some(Value::String(p)) => p.as_str(),
            Some(other) => {
                return Err(ToolError::InvalidArgument {
                    tool: self.name().to_string(),
                    name: "path".to_string(),
                    reason: format!("expected a string, got {}", other),
                })
            }
        };

        Ok(self.list(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rt() -> tokio::runtime::Runtime {
        tokio::runtime::Runtime::new().unwrap()
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn tool() -> ListFilesTool {
        ListFilesTool::new(SensitiveFilter::default())
    }

    #[test]
    fn test_metadata() {
        let t = tool();
        assert_eq!(t.name(), "list_files");
        let schema = t.descriptor().input_schema();
        assert_eq!(schema["required"], json!([]));
        assert_eq!(schema["properties"]["path"]["type"], "string");
    }

    #[test]
    fn test_lists_dirs_and_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "bb").unwrap();
        std::fs::write(dir.path().join("a.txt"), "aaa").unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();

        let p = dir.path().to_str().unwrap();
        let out = tool().list(p);
        assert!(out.starts_with(&format!("Contents of '{}':", p)));
        assert!(out.contains("Directories:\n📁 src/"));
        assert!(out.contains("Files:\n📄 a.txt\n📄 b.txt"));
        assert!(!out.contains("Hidden"));
    }

    #[test]
    fn test_hides_sensitive_entries() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".env"), "SECRET=1").unwrap();
        std::fs::write(dir.path().join(".env.local"), "SECRET=2").unwrap();
        std::fs::write(dir.path().join("main.rs"), "fn main() {}").unwrap();

        let out = tool().list(dir.path().to_str().unwrap());
        assert!(out.contains("main.rs"));
        assert!(!out.contains(".env"));
        assert!(out.contains("(Hidden 2 file(s) for security reasons)"));
    }

    #[test]
    fn test_hidden_count_includes_entries_past_the_cap() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..MAX_ENTRIES + 5 {
            std::fs::write(dir.path().join(format!("f{:04}.txt", i)), "").unwrap();
        }
        // Sorted after every visible file.
        std::fs::write(dir.path().join("zz_secret"), "").unwrap();
        std::fs::write(dir.path().join("zz_token"), "").unwrap();

        let tool = ListFilesTool::new(SensitiveFilter::new(vec![".env", "zz"]));
        let out = tool.list(dir.path().to_str().unwrap());
        assert_eq!(out.matches("📄 ").count(), MAX_ENTRIES);
        assert!(out.contains("(truncated at 500 entries)"));
        assert!(out.ends_with("(Hidden 2 file(s) for security reasons)"));
    }

    #[test]
    fn test_refuses_sensitive_directory_without_touching_it() {
        // The directory does not exist; a refusal proves no lookup happened.
        let out = tool().list("/no/such/.envdir");
        assert_eq!(out, SensitiveFilter::refusal("/no/such/.envdir"));
    }

    #[test]
    fn test_missing_and_non_directory_paths() {
        let out = tool().list("/tmp/__fileagent_no_such_dir__");
        assert!(out.contains("does not exist"));

        let tmp = tempfile::NamedTempFile::new().unwrap();
        let out = tool().list(tmp.path().to_str().unwrap());
        assert!(out.contains("is not a directory"));
    }

    #[test]
    fn test_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().to_str().unwrap();
        assert_eq!(tool().list(p), format!("Directory '{}' is empty", p));
    }

    #[test]
    fn test_execute_defaults_to_current_dir_and_is_stable() {
        let rt = rt();
        rt.block_on(async {
            let t = tool();
            let first = t.execute(&Map::new()).await.unwrap();
            let second = t.execute(&args(json!({ "path": "." }))).await.unwrap();
            assert!(first.starts_with("Contents of '.':"));
            assert_eq!(first, second);
        });
    }

    #[test]
    fn test_execute_rejects_non_string_path() {
        let rt = rt();
        rt.block_on(async {
            let err = tool().execute(&args(json!({ "path": 3 }))).await.unwrap_err();
            assert!(matches!(err, ToolError::InvalidArgument { .. }));
        });
    }
}
