//! Tool System module.
//!
//! - **Tool trait**: every tool provides its name, description, parameter
//!   list and an execute method
//! - **ToolRegistry**: holds the registered tools and their descriptors
//! - **ToolExecutor**: resolves a `ToolInvocation` to a tool and always
//!   produces result text, even for failures, so the model can react
//!
//! Adding a tool means writing a `Tool` impl and registering it in
//! `create_default_registry`; nothing else changes.

pub mod filter;
pub mod list_files;
pub mod read_file;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::ToolsConfig;
use crate::error::ToolError;
use crate::types::{ParameterSpec, ToolDescriptor, ToolInvocation};
use filter::SensitiveFilter;

/// Trait that all tools must implement.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g. "read_file").
    fn name(&self) -> &str;

    /// A human-readable description the model reads to decide when to call it.
    fn description(&self) -> &str;

    /// String-typed parameters this tool accepts.
    fn parameters(&self) -> Vec<ParameterSpec>;

    /// Execute the tool with the given arguments.
    async fn execute(&self, params: &Map<String, Value>) -> Result<String, ToolError>;

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Runs tool invocations on behalf of the agent loop.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Descriptors for every tool this executor can run.
    fn descriptors(&self) -> Vec<ToolDescriptor>;

    /// Run one invocation. Failures come back as text, never as an error.
    async fn execute(&self, invocation: &ToolInvocation) -> String;
}

/// The set of tools available to a session, in registration order.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Register a tool. A tool with the same name replaces the earlier one.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.retain(|t| t.name() != tool.name());
        self.tools.push(tool);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|t| t.descriptor()).collect()
    }

    async fn execute(&self, invocation: &ToolInvocation) -> String {
        let Some(tool) = self.get(&invocation.name) else {
            warn!(tool = %invocation.name, "Model requested an unknown tool");
            return format!("Error: Unknown tool '{}'", invocation.name);
        };

        debug!(tool = %invocation.name, id = %invocation.id, "Executing tool");
        match tool.execute(&invocation.arguments).await {
            Ok(output) => output,
            Err(e) => {
                debug!(tool = %invocation.name, error = %e, "Tool rejected its arguments");
                format!("Error: {}", e)
            }
        }
    }
}

/// Create a registry with the built-in tools enabled in `config`.
pub fn create_default_registry(config: &ToolsConfig) -> ToolRegistry {
    let filter = SensitiveFilter::new(config.ignore_patterns.iter().cloned());
    let enabled = |name: &str| config.enabled.iter().any(|e| e == name);

    let mut registry = ToolRegistry::new();
    if enabled("list_files") {
        registry.register(Box::new(list_files::ListFilesTool::new(filter.clone())));
    }
    if enabled("read_file") {
        registry.register(Box::new(read_file::ReadFileTool::new(filter)));
    }
    registry
}
