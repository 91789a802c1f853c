//! Model client: the network half of a provider call.
//!
//! The client takes the body an adapter built, POSTs it to the right
//! endpoint with the right auth headers, and hands back the JSON body. It
//! never looks inside either one.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::config::LlmConfig;
use crate::error::AgentError;
use crate::types::{ProviderKind, ProviderRequest};

const OPENAI_DEFAULT_BASE: &str = "https://api.openai.com/v1";
const ANTHROPIC_DEFAULT_BASE: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const AZURE_DEFAULT_API_VERSION: &str = "2024-10-21";

#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Deliver `request` and return the raw response body.
    async fn send(&self, request: &ProviderRequest) -> Result<Value, AgentError>;

    /// Return the client's display name (for logging).
    fn name(&self) -> &str;
}

/// Azure OpenAI routes chat completions through a named deployment.
#[derive(Debug, Clone, PartialEq)]
pub struct AzureDeployment {
    pub deployment: String,
    pub api_version: String,
}

/// HTTP client for both supported provider families.
pub struct HttpModelClient {
    /// Empty for local servers that take no key.
    api_key: String,
    api_base: Option<String>,
    azure: Option<AzureDeployment>,
    client: reqwest::Client,
}

impl HttpModelClient {
    pub fn new(api_key: String, api_base: Option<String>) -> Self {
        Self {
            api_key,
            api_base,
            azure: None,
            client: reqwest::Client::new(),
        }
    }

    /// Send OpenAI-style requests to an Azure deployment instead.
    pub fn with_azure(mut self, azure: AzureDeployment) -> Self {
        self.azure = Some(azure);
        self
    }

    pub fn from_config(config: &LlmConfig, api_key: String) -> Result<Self, AgentError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| AgentError::Configuration(format!("failed to build HTTP client: {}", e)))?;
        let api_base = config.resolved_api_base();
        let azure = if config.is_azure() {
            if api_base.is_none() {
                return Err(AgentError::Configuration(
                    "Azure provider needs llm.api_base (or AZURE_OPENAI_API_BASE_URL)".to_string(),
                ));
            }
            Some(AzureDeployment {
                deployment: config
                    .deployment
                    .clone()
                    .unwrap_or_else(|| config.model.clone()),
                api_version: config
                    .api_version
                    .clone()
                    .unwrap_or_else(|| AZURE_DEFAULT_API_VERSION.to_string()),
            })
        } else {
            None
        };
        Ok(Self {
            api_key,
            api_base,
            azure,
            client,
        })
    }

    /// The endpoint URL for a provider family.
    pub fn endpoint(&self, provider: ProviderKind) -> String {
        match provider {
            ProviderKind::OpenAi if self.azure.is_some() => self.azure_endpoint(),
            ProviderKind::OpenAi => format!(
                "{}/chat/completions",
                self.api_base
                    .as_deref()
                    .unwrap_or(OPENAI_DEFAULT_BASE)
                    .trim_end_matches('/')
            ),
            ProviderKind::Anthropic => format!(
                "{}/v1/messages",
                self.api_base
                    .as_deref()
                    .unwrap_or(ANTHROPIC_DEFAULT_BASE)
                    .trim_end_matches('/')
            ),
        }
    }

    /// `api_base` is either the resource endpoint or a full deployment URL.
    fn azure_endpoint(&self) -> String {
        let base = self.api_base.as_deref().unwrap_or("").trim_end_matches('/');
        let (deployment, api_version) = match &self.azure {
            Some(a) => (a.deployment.as_str(), a.api_version.as_str()),
            None => ("", AZURE_DEFAULT_API_VERSION),
        };
        if base.contains("/openai/deployments/") {
            format!("{}/chat/completions?api-version={}", base, api_version)
        } else {
            format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                base, deployment, api_version
            )
        }
    }
}

#[async_trait]
impl ModelClient for HttpModelClient {
    async fn send(&self, request: &ProviderRequest) -> Result<Value, AgentError> {
        let url = self.endpoint(request.provider);
        let builder = self
            .client
            .post(&url)
            .header("content-type", "application/json");
        let builder = match request.provider {
            ProviderKind::OpenAi if self.azure.is_some() => builder.header("api-key", &self.api_key),
            ProviderKind::OpenAi if self.api_key.is_empty() => builder,
            ProviderKind::OpenAi => {
                builder.header("Authorization", format!("Bearer {}", self.api_key))
            }
            ProviderKind::Anthropic => builder
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION),
        };

        debug!(url = %url, "Sending provider request");
        let response = builder
            .json(&request.body)
            .send()
            .await
            .map_err(|e| AgentError::Transport(format!("failed to send request to {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(AgentError::Transport(format!(
                "{} API error ({}): {}",
                request.provider, status, error_body
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AgentError::Transport(format!("failed to read response body: {}", e)))?;
        serde_json::from_str(&body).map_err(|e| {
            AgentError::protocol(request.provider.to_string(), format!("response is not JSON: {}", e))
        })
    }

    fn name(&self) -> &str {
        "HTTP"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_endpoints() {
        let client = HttpModelClient::new("k".into(), None);
        assert_eq!(
            client.endpoint(ProviderKind::OpenAi),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            client.endpoint(ProviderKind::Anthropic),
            "https://api.anthropic.com/v1/messages"
        );
    }

    #[test]
    fn test_custom_base_trailing_slash() {
        let client = HttpModelClient::new("k".into(), Some("http://localhost:11434/v1/".into()));
        assert_eq!(
            client.endpoint(ProviderKind::OpenAi),
            "http://localhost:11434/v1/chat/completions"
        );
    }

    #[test]
    fn test_from_config_with_timeout() {
        let mut config = crate::config::AppConfig::default().llm;
        config.request_timeout_secs = Some(5);
        config.api_base = Some("http://example.test".into());
        let client = HttpModelClient::from_config(&config, "k".into()).unwrap();
        assert_eq!(
            client.endpoint(ProviderKind::Anthropic),
            "http://example.test/v1/messages"
        );
    }

    #[test]
    fn test_azure_endpoints() {
        let azure = AzureDeployment {
            deployment: "gpt4o".into(),
            api_version: "2024-06-01".into(),
        };
        let client = HttpModelClient::new("k".into(), Some("https://myres.openai.azure.com/".into()))
            .with_azure(azure.clone());
        assert_eq!(
            client.endpoint(ProviderKind::OpenAi),
            "https://myres.openai.azure.com/openai/deployments/gpt4o/chat/completions?api-version=2024-06-01"
        );

        let client = HttpModelClient::new(
            "k".into(),
            Some("https://myres.openai.azure.com/openai/deployments/gpt4o".into()),
        )
        .with_azure(azure);
        assert_eq!(
            client.endpoint(ProviderKind::OpenAi),
            "https://myres.openai.azure.com/openai/deployments/gpt4o/chat/completions?api-version=2024-06-01"
        );
    }

    #[test]
    fn test_azure_from_config() {
        let mut config = crate::config::AppConfig::default().llm;
        config.provider = "azure".into();
        assert!(matches!(
            HttpModelClient::from_config(&config, "k".into()),
            Err(AgentError::Configuration(_))
        ));

        config.api_base = Some("https://myres.openai.azure.com".into());
        let client = HttpModelClient::from_config(&config, "k".into()).unwrap();
        assert_eq!(
            client.endpoint(ProviderKind::OpenAi),
            format!(
                "https://myres.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version={}",
                AZURE_DEFAULT_API_VERSION
            )
        );
    }

    #[test]
    fn test_ollama_defaults_to_local_server() {
        let mut config = crate::config::AppConfig::default().llm;
        config.provider = "ollama".into();
        let client = HttpModelClient::from_config(&config, String::new()).unwrap();
        assert_eq!(
            client.endpoint(ProviderKind::OpenAi),
            "http://localhost:11434/v1/chat/completions"
        );
    }

    fn openai_request() -> ProviderRequest {
        ProviderRequest {
            provider: ProviderKind::OpenAi,
            body: serde_json::json!({"model": "m", "messages": []}),
        }
    }

    /// Serve one canned HTTP response on a loopback port. The handle yields
    /// the raw request (lowercased) once it has been answered.
    async fn serve_once(response: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&raw).to_lowercase();
                if let Some(end) = text.find("\r\n\r\n") {
                    let body_len = text[..end]
                        .lines()
                        .find_map(|l| l.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if raw.len() >= end + 4 + body_len {
                        break;
                    }
                }
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&raw).to_lowercase()
        });
        (base, handle)
    }

    #[tokio::test]
    async fn test_success_returns_json_body() {
        let (base, server) = serve_once(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 11\r\nconnection: close\r\n\r\n{\"ok\":true}",
        )
        .await;
        let client = HttpModelClient::new("sk-test".into(), Some(base));
        let body = client.send(&openai_request()).await.unwrap();
        assert_eq!(body, serde_json::json!({"ok": true}));

        let request = server.await.unwrap();
        assert!(request.starts_with("post /chat/completions"));
        assert!(request.contains("authorization: bearer sk-test"));
    }

    #[tokio::test]
    async fn test_error_status_is_transport_error() {
        let (base, _server) = serve_once(
            "HTTP/1.1 500 Internal Server Error\r\ncontent-length: 5\r\nconnection: close\r\n\r\noops!",
        )
        .await;
        let client = HttpModelClient::new("k".into(), Some(base));
        match client.send(&openai_request()).await {
            Err(AgentError::Transport(msg)) => {
                assert!(msg.contains("500"));
                assert!(msg.contains("oops!"));
            }
            other => panic!("expected transport error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_json_body_is_protocol_error() {
        let (base, _server) = serve_once(
            "HTTP/1.1 200 OK\r\ncontent-type: text/html\r\ncontent-length: 9\r\nconnection: close\r\n\r\nnot json!",
        )
        .await;
        let client = HttpModelClient::new("k".into(), Some(base));
        let err = client.send(&openai_request()).await.unwrap_err();
        assert!(matches!(err, AgentError::Protocol { .. }));
    }

    #[tokio::test]
    async fn test_empty_key_sends_no_authorization() {
        let (base, server) = serve_once(
            "HTTP/1.1 200 OK\r\ncontent-length: 2\r\nconnection: close\r\n\r\n{}",
        )
        .await;
        let client = HttpModelClient::new(String::new(), Some(base));
        client.send(&openai_request()).await.unwrap();
        let request = server.await.unwrap();
        assert!(!request.contains("authorization:"));
    }

    #[tokio::test]
    async fn test_azure_uses_api_key_header() {
        let (base, server) = serve_once(
            "HTTP/1.1 200 OK\r\ncontent-length: 2\r\nconnection: close\r\n\r\n{}",
        )
        .await;
        let client = HttpModelClient::new("az-key".into(), Some(base)).with_azure(AzureDeployment {
            deployment: "gpt4o".into(),
            api_version: "2024-06-01".into(),
        });
        client.send(&openai_request()).await.unwrap();
        let request = server.await.unwrap();
        assert!(request
            .starts_with("post /openai/deployments/gpt4o/chat/completions?api-version=2024-06-01"));
        assert!(request.contains("api-key: az-key"));
        assert!(!request.contains("authorization:"));
    }

    #[tokio::test]
    async fn test_connection_failure_is_transport_error() {
        // Port 9 (discard) on localhost is essentially never listening.
        let client = HttpModelClient::new("k".into(), Some("http://127.0.0.1:9".into()));
        let err = client.send(&openai_request()).await.unwrap_err();
        assert!(matches!(err, AgentError::Transport(_)));
    }
}
