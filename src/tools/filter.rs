//! Sensitive-name filtering for the filesystem tools.
//!
//! Any path with a component whose name starts with one of the configured
//! prefixes (by default `.env`) is refused before the filesystem is touched.

use std::path::{Component, Path};

pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[".env"];

#[derive(Debug, Clone)]
pub struct SensitiveFilter {
    prefixes: Vec<String>,
}

impl SensitiveFilter {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes
                .into_iter()
                .map(Into::<String>::into)
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// True if a bare file name matches a sensitive prefix.
    pub fn is_sensitive_name(&self, name: &str) -> bool {
        self.prefixes.iter().any(|p| name.starts_with(p.as_str()))
    }

    /// True if any named component of `path` is sensitive.
    pub fn is_sensitive_path(&self, path: &Path) -> bool {
        path.components().any(|c| match c {
            Component::Normal(name) => self.is_sensitive_name(&name.to_string_lossy()),
            _ => false,
        })
    }

    pub fn refusal(path: &str) -> String {
        format!(
            "Error: Access to '{}' is restricted for security reasons",
            path
        )
    }
}

impl Default for SensitiveFilter {
    fn default() -> Self {
        Self::new(DEFAULT_IGNORE_PATTERNS.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_env_prefix() {
        let f = SensitiveFilter::default();
        assert!(f.is_sensitive_name(".env"));
        assert!(f.is_sensitive_name(".env.local"));
        assert!(!f.is_sensitive_name("env"));
        assert!(!f.is_sensitive_name("my.env"));
    }

    #[test]
    fn test_path_components() {
        let f = SensitiveFilter::default();
        assert!(f.is_sensitive_path(Path::new(".env")));
        assert!(f.is_sensitive_path(Path::new("./config/.env.production")));
        assert!(f.is_sensitive_path(Path::new(".envs/secrets.txt")));
        assert!(!f.is_sensitive_path(Path::new(".")));
        assert!(!f.is_sensitive_path(Path::new("../src/main.rs")));
    }

    #[test]
    fn test_custom_prefixes_skip_empty() {
        let f = SensitiveFilter::new(vec!["", "secret"]);
        assert!(f.is_sensitive_name("secret.key"));
        assert!(!f.is_sensitive_name("readme.md"));
    }
}
