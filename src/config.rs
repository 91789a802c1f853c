//! Configuration management for fileagent.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::tools::filter::DEFAULT_IGNORE_PATTERNS;
use crate::types::ProviderKind;

pub const OLLAMA_DEFAULT_BASE: &str = "http://localhost:11434/v1";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful agent that can read files and list directory contents.
You have access to two tools:
1. list_files - to list files in a directory
2. read_file - to read the contents of a file

Use these tools when the user asks questions about files or directories.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub llm: LlmConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Env var holding the key; defaults per provider when unset
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    /// Azure deployment name; defaults to `model`
    #[serde(default)]
    pub deployment: Option<String>,
    /// Azure `api-version` query parameter
    #[serde(default)]
    pub api_version: Option<String>,
}

fn default_max_tokens() -> u32 {
    1024
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

fn default_max_iterations() -> u32 {
    20
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            system_prompt: default_system_prompt(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_enabled_tools")]
    pub enabled: Vec<String>,
    /// File name prefixes the filesystem tools refuse to touch
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,
}

fn default_enabled_tools() -> Vec<String> {
    vec!["list_files".to_string(), "read_file".to_string()]
}

fn default_ignore_patterns() -> Vec<String> {
    DEFAULT_IGNORE_PATTERNS.iter().map(|p| p.to_string()).collect()
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled_tools(),
            ignore_patterns: default_ignore_patterns(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                provider: "openai".to_string(),
                model: "gpt-4o".to_string(),
                api_base: None,
                api_key: None,
                api_key_env: None,
                max_tokens: default_max_tokens(),
                request_timeout_secs: None,
                deployment: None,
                api_version: None,
            },
            agent: AgentConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

impl LlmConfig {
    /// Default model for a provider, used when only the provider is overridden.
    pub fn default_model(kind: ProviderKind) -> &'static str {
        match kind {
            ProviderKind::OpenAi => "gpt-4o",
            ProviderKind::Anthropic => "claude-3-5-sonnet-20241022",
        }
    }

    /// The env var consulted for the API key.
    pub fn key_env_name(&self) -> String {
        if let Some(name) = &self.api_key_env {
            return name.clone();
        }
        if self.is_azure() {
            return "AZURE_OPENAI_API_KEY".to_string();
        }
        match self.provider.parse::<ProviderKind>() {
            Ok(ProviderKind::Anthropic) => "ANTHROPIC_API_KEY".to_string(),
            _ => "OPENAI_API_KEY".to_string(),
        }
    }

    fn provider_is(&self, names: &[&str]) -> bool {
        let provider = self.provider.trim().to_lowercase();
        names.iter().any(|n| *n == provider)
    }

    pub fn is_azure(&self) -> bool {
        self.provider_is(&["azure", "azure_openai"])
    }

    pub fn is_ollama(&self) -> bool {
        self.provider_is(&["ollama"])
    }

    /// `api_base`, falling back to the local Ollama server for `ollama`.
    pub fn resolved_api_base(&self) -> Option<String> {
        match &self.api_base {
            Some(base) => Some(base.clone()),
            None if self.is_ollama() => Some(OLLAMA_DEFAULT_BASE.to_string()),
            None => None,
        }
    }

    /// Local servers (Ollama, or any loopback `api_base`) need no key.
    pub fn requires_api_key(&self) -> bool {
        if self.is_ollama() {
            return false;
        }
        let Some(base) = &self.api_base else {
            return true;
        };
        let host = reqwest::Url::parse(base)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_string()));
        !matches!(
            host.as_deref(),
            Some("localhost") | Some("127.0.0.1") | Some("[::1]")
        )
    }
}

impl AppConfig {
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".fileagent").join("config.toml"))
    }

    /// Load from `path` (or the default location), then apply env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        let mut config = if config_path.exists() {
            Self::from_file(&config_path)?
        } else {
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Apply `FILEAGENT_*` overrides looked up through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(provider) = lookup("FILEAGENT_PROVIDER") {
            self.set_provider(provider);
        }
        if self.llm.is_azure() {
            if let Some(endpoint) = lookup("AZURE_OPENAI_API_BASE_URL") {
                self.llm.api_base = Some(endpoint);
            }
            if let Some(deployment) = lookup("AZURE_OPENAI_DEPLOYMENT_NAME") {
                self.llm.deployment = Some(deployment);
            }
            if let Some(version) = lookup("AZURE_OPENAI_API_VERSION") {
                self.llm.api_version = Some(version);
            }
        }
        if let Some(model) = lookup("FILEAGENT_MODEL") {
            self.llm.model = model;
        }
        if let Some(api_base) = lookup("FILEAGENT_API_BASE") {
            self.llm.api_base = Some(api_base);
        }
    }

    /// Switch provider, resetting the model to that provider's default if
    /// the current model belongs to the other family.
    pub fn set_provider(&mut self, provider: String) {
        let previous = self.llm.provider.parse::<ProviderKind>().ok();
        let next = provider.parse::<ProviderKind>().ok();
        self.llm.provider = provider;
        if let (Some(prev), Some(next)) = (previous, next) {
            if prev != next && self.llm.model == LlmConfig::default_model(prev) {
                self.llm.model = LlmConfig::default_model(next).to_string();
            }
        }
    }

    pub fn api_key(&self) -> Result<String> {
        self.api_key_with(|key| std::env::var(key).ok())
    }

    /// Resolve the API key, reading env vars through `lookup`. Servers that
    /// need no key get an empty one.
    pub fn api_key_with<F>(&self, lookup: F) -> Result<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = &self.llm.api_key {
            if !key.is_empty() {
                return Ok(key.clone());
            }
        }
        let env_name = self.llm.key_env_name();
        if let Some(key) = lookup(&env_name).filter(|k| !k.is_empty()) {
            return Ok(key);
        }
        if !self.llm.requires_api_key() {
            return Ok(String::new());
        }
        anyhow::bail!(
            "API key not found. Either:\n  \
             1. Set api_key in config file: {}\n  \
             2. Set environment variable (or a .env entry): {}=your-key",
            Self::config_path()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            env_name
        )
    }

    pub fn save_default() -> Result<PathBuf> {
        let config_path = Self::config_path()?;
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let content =
            toml::to_string_pretty(&Self::default()).context("Failed to serialize config")?;
        std::fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;
        Ok(config_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_minimal_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[llm]\nprovider = \"anthropic\"\nmodel = \"claude-3-5-sonnet-20241022\"\n",
        )
        .unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.llm.max_tokens, 1024);
        assert_eq!(config.agent.max_iterations, 20);
        assert_eq!(config.tools.enabled, vec!["list_files", "read_file"]);
        assert_eq!(config.tools.ignore_patterns, vec![".env"]);
        assert_eq!(config.llm.key_env_name(), "ANTHROPIC_API_KEY");
    }

    #[test]
    fn test_default_roundtrips_through_toml() {
        let text = toml::to_string_pretty(&AppConfig::default()).unwrap();
        let back: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.llm.provider, "openai");
        assert_eq!(back.agent.system_prompt, DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("FILEAGENT_PROVIDER", "anthropic"),
            ("FILEAGENT_API_BASE", "http://localhost:9000"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.llm.provider, "anthropic");
        // Model followed the provider because it was the old default.
        assert_eq!(config.llm.model, "claude-3-5-sonnet-20241022");
        assert_eq!(config.llm.api_base.as_deref(), Some("http://localhost:9000"));
    }

    #[test]
    fn test_custom_model_survives_provider_switch() {
        let mut config = AppConfig::default();
        config.llm.model = "llama3.2".into();
        config.set_provider("anthropic".into());
        assert_eq!(config.llm.model, "llama3.2");
    }

    #[test]
    fn test_explicit_key_wins() {
        let mut config = AppConfig::default();
        config.llm.api_key = Some("sk-test".into());
        assert_eq!(config.api_key().unwrap(), "sk-test");
        config.llm.api_key_env = Some("FILEAGENT_TEST_KEY_VAR".into());
        assert_eq!(config.llm.key_env_name(), "FILEAGENT_TEST_KEY_VAR");
    }

    #[test]
    fn test_missing_key_is_an_error_for_hosted_providers() {
        let config = AppConfig::default();
        let err = config.api_key_with(|_| None).unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
        let found = config
            .api_key_with(|k| (k == "OPENAI_API_KEY").then(|| "sk-env".to_string()))
            .unwrap();
        assert_eq!(found, "sk-env");
    }

    #[test]
    fn test_ollama_needs_no_key() {
        let mut config = AppConfig::default();
        config.set_provider("ollama".into());
        assert!(!config.llm.requires_api_key());
        assert_eq!(config.api_key_with(|_| None).unwrap(), "");
        assert_eq!(
            config.llm.resolved_api_base().as_deref(),
            Some(OLLAMA_DEFAULT_BASE)
        );
    }

    #[test]
    fn test_loopback_base_needs_no_key() {
        let mut config = AppConfig::default();
        config.llm.api_base = Some("http://127.0.0.1:8080/v1".into());
        assert_eq!(config.api_key_with(|_| None).unwrap(), "");
        config.llm.api_base = Some("http://localhost:11434/v1".into());
        assert!(!config.llm.requires_api_key());
        config.llm.api_base = Some("https://llm.example.com/v1".into());
        assert!(config.llm.requires_api_key());
    }

    #[test]
    fn test_azure_settings_from_env() {
        let env: HashMap<&str, &str> = [
            ("FILEAGENT_PROVIDER", "azure"),
            ("AZURE_OPENAI_API_BASE_URL", "https://myres.openai.azure.com"),
            ("AZURE_OPENAI_DEPLOYMENT_NAME", "gpt4o"),
            ("AZURE_OPENAI_API_VERSION", "2024-06-01"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert!(config.llm.is_azure());
        assert_eq!(config.llm.key_env_name(), "AZURE_OPENAI_API_KEY");
        assert_eq!(config.llm.api_base.as_deref(), Some("https://myres.openai.azure.com"));
        assert_eq!(config.llm.deployment.as_deref(), Some("gpt4o"));
        assert_eq!(config.llm.api_version.as_deref(), Some("2024-06-01"));
        assert!(config.api_key_with(|_| None).is_err());
    }
}
