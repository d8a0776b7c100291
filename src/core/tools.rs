//! # Tools
//!
//! Tools the model can call during a turn. Each tool is a unit struct
//! implementing [`Tool`]; its argument type doubles as the JSON schema
//! advertised to the model (via `schemars`).
//!
//! [`ToolRegistry`] erases the tool types so they can live in one list and
//! be dispatched by name. [`ToolRunner`] is what backends actually call: it
//! wraps the registry with a timeout and reports each call to the streaming
//! session so the transcript shows it while it runs.

pub mod builtin;

use async_trait::async_trait;
use log::{debug, warn};
use schemars::JsonSchema;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::streaming::StreamingSession;
use crate::inference::{ToolDefinition, ToolHandler};

pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolError(pub String);

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ToolError {}

#[async_trait]
pub trait Tool: Send + Sync {
    const NAME: &'static str;
    const DESCRIPTION: &'static str;
    type Args: DeserializeOwned + JsonSchema + Send;
    type Output: Serialize;

    async fn call(&self, args: Self::Args) -> Result<Self::Output, ToolError>;
}

/// Object-safe view of a [`Tool`], so different tools share one registry.
#[async_trait]
trait ErasedTool: Send + Sync {
    fn name(&self) -> &'static str;
    fn definition(&self) -> ToolDefinition;
    async fn invoke(&self, arguments: &str) -> String;
}

#[async_trait]
impl<T: Tool> ErasedTool for T {
    fn name(&self) -> &'static str {
        T::NAME
    }

    fn definition(&self) -> ToolDefinition {
        let schema = schemars::schema_for!(T::Args);
        let parameters = serde_json::to_value(&schema)
            .unwrap_or_else(|_| serde_json::json!({ "type": "object" }));
        ToolDefinition {
            name: T::NAME.to_string(),
            description: T::DESCRIPTION.to_string(),
            parameters,
        }
    }

    async fn invoke(&self, arguments: &str) -> String {
        let raw = if arguments.trim().is_empty() { "{}" } else { arguments };
        let args = match serde_json::from_str::<T::Args>(raw) {
            Ok(args) => args,
            Err(e) => return error_json(&format!("Invalid arguments for {}: {e}", T::NAME)),
        };
        match self.call(args).await {
            Ok(output) => serde_json::to_string(&output)
                .unwrap_or_else(|e| error_json(&format!("Failed to encode result: {e}"))),
            Err(e) => error_json(&e.0),
        }
    }
}

fn error_json(message: &str) -> String {
    serde_json::json!({ "error": message }).to_string()
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn ErasedTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.tools.push(Box::new(tool));
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    /// Runs the named tool. Failures come back as `{"error": ...}` JSON so
    /// the model can see them.
    pub async fn execute(&self, name: &str, arguments: &str) -> String {
        match self.tools.iter().find(|t| t.name() == name) {
            Some(tool) => tool.invoke(arguments).await,
            None => error_json(&format!("Unknown tool: {name}")),
        }
    }
}

/// The registry every session starts with.
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(builtin::CurrentTimeTool);
    registry.register(builtin::CalculateTool);
    registry
}

pub struct ToolRunner {
    registry: Arc<ToolRegistry>,
    session: Arc<StreamingSession>,
    timeout: Duration,
}

impl ToolRunner {
    pub fn new(registry: Arc<ToolRegistry>, session: Arc<StreamingSession>) -> Self {
        Self {
            registry,
            session,
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl ToolHandler for ToolRunner {
    fn definitions(&self) -> Vec<ToolDefinition> {
        self.registry.definitions()
    }

    async fn invoke(&self, name: &str, arguments: &str) -> String {
        debug!("Tool call: {}({})", name, arguments);
        let slot = self.session.record_tool_started(name, arguments);

        let output =
            match tokio::time::timeout(self.timeout, self.registry.execute(name, arguments)).await
            {
                Ok(output) => output,
                Err(_) => {
                    warn!("Tool {} timed out after {:?}", name, self.timeout);
                    error_json(&format!("Tool {name} timed out"))
                }
            };

        if let Some(slot) = slot {
            self.session.record_tool_finished(slot, &output);
        }
        output
    }
}
