//! Tool registry
//!
//! Tools are named, schema-described functions the model may ask to invoke.
//! The registry advertises them to the server, validates the arguments the
//! model supplies, and turns every outcome (including failures) into a JSON
//! string suitable for a tool-result message.

pub mod crypto;

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, info};

use crate::api::{ChatToolDefinition, ChatToolFunction};

// ============================================================================
// Types and Traits
// ============================================================================

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("{0}")]
    Execution(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("a tool named '{0}' is already registered")]
    DuplicateName(String),

    #[error("tool '{name}' declares an invalid parameter schema: {reason}")]
    InvalidSchema { name: String, reason: String },
}

/// A function the model can call.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema describing the accepted arguments.
    fn parameters(&self) -> Value;

    async fn invoke(&self, arguments: Map<String, Value>) -> Result<Value, ToolError>;

    /// Optional human-readable rendering of a successful result.
    fn render(&self, _result: &Value) -> Option<String> {
        None
    }
}

/// What the server is told about a tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(into = "ChatToolDefinition")]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl From<ToolDefinition> for ChatToolDefinition {
    fn from(definition: ToolDefinition) -> Self {
        ChatToolDefinition {
            kind: "function".to_string(),
            function: ChatToolFunction {
                name: definition.name,
                description: definition.description,
                parameters: definition.parameters,
            },
        }
    }
}

type Handler = dyn Fn(Map<String, Value>) -> Result<Value, ToolError> + Send + Sync;

/// Adapts a plain closure into a [`Tool`].
pub struct FunctionTool {
    name: String,
    description: String,
    parameters: Value,
    handler: Box<Handler>,
}

impl FunctionTool {
    pub fn new<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
        handler: F,
    ) -> Self
    where
        F: Fn(Map<String, Value>) -> Result<Value, ToolError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            handler: Box::new(handler),
        }
    }
}

#[async_trait::async_trait]
impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        self.parameters.clone()
    }

    async fn invoke(&self, arguments: Map<String, Value>) -> Result<Value, ToolError> {
        (self.handler)(arguments)
    }
}

/// `{"error": message}` as a compact JSON string.
pub fn error_payload(message: impl Into<String>) -> String {
    json!({ "error": message.into() }).to_string()
}

// ============================================================================
// Registry
// ============================================================================

struct RegisteredTool {
    tool: Arc<dyn Tool>,
    validator: jsonschema::Validator,
}

impl RegisteredTool {
    fn compile(tool: Arc<dyn Tool>) -> Result<Self, RegistryError> {
        let validator = jsonschema::validator_for(&tool.parameters()).map_err(|err| {
            RegistryError::InvalidSchema {
                name: tool.name().to_string(),
                reason: err.to_string(),
            }
        })?;
        Ok(Self { tool, validator })
    }
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_tools() -> Self {
        let mut registry = Self::new();
        // A fresh registry can't hold a duplicate and the schema is static.
        if let Err(err) = registry.register(Arc::new(crypto::TopCryptocurrencies::new())) {
            tracing::error!(error = %err, "Failed to register built-in tool");
        }
        registry
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        if self.position(tool.name()).is_some() {
            return Err(RegistryError::DuplicateName(tool.name().to_string()));
        }
        let entry = RegisteredTool::compile(tool)?;
        debug!(tool = entry.tool.name(), "Registered tool");
        self.tools.push(entry);
        Ok(())
    }

    pub fn register_fn<F>(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
        handler: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn(Map<String, Value>) -> Result<Value, ToolError> + Send + Sync + 'static,
    {
        self.register(Arc::new(FunctionTool::new(
            name,
            description,
            parameters,
            handler,
        )))
    }

    /// Register `tool`, overwriting any existing tool of the same name in
    /// place. Returns whether something was replaced.
    pub fn replace(&mut self, tool: Arc<dyn Tool>) -> Result<bool, RegistryError> {
        let entry = RegisteredTool::compile(tool)?;
        match self.position(entry.tool.name()) {
            Some(index) => {
                info!(tool = entry.tool.name(), "Replacing registered tool");
                self.tools[index] = entry;
                Ok(true)
            }
            None => {
                self.tools.push(entry);
                Ok(false)
            }
        }
    }

    pub fn unregister(&mut self, name: &str) -> Option<Arc<dyn Tool>> {
        let index = self.position(name)?;
        Some(self.tools.remove(index).tool)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.position(name).map(|index| Arc::clone(&self.tools[index].tool))
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|entry| entry.tool.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Definitions in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|entry| ToolDefinition {
                name: entry.tool.name().to_string(),
                description: entry.tool.description().to_string(),
                parameters: entry.tool.parameters(),
            })
            .collect()
    }

    /// Human-readable view of a tool result, when the tool offers one and the
    /// result is JSON.
    pub fn render(&self, name: &str, result: &str) -> Option<String> {
        let tool = self.get(name)?;
        let value: Value = serde_json::from_str(result).ok()?;
        tool.render(&value)
    }

    /// Run a tool. Never fails: every problem is reported as an
    /// `{"error": ...}` payload the model can read.
    pub async fn execute(&self, name: &str, arguments: Map<String, Value>) -> String {
        let Some(index) = self.position(name) else {
            return error_payload(format!("Tool '{name}' not found"));
        };
        let entry = &self.tools[index];

        let instance = Value::Object(arguments);
        let problems: Vec<String> = entry
            .validator
            .iter_errors(&instance)
            .map(|err| err.to_string())
            .collect();
        if !problems.is_empty() {
            return error_payload(format!(
                "Invalid arguments for tool '{name}': {}",
                problems.join("; ")
            ));
        }
        let Value::Object(arguments) = instance else {
            return error_payload(format!("Invalid arguments for tool '{name}'"));
        };

        info!(tool = name, "Executing tool");
        match entry.tool.invoke(arguments).await {
            Ok(value) => serde_json::to_string_pretty(&value)
                .unwrap_or_else(|err| error_payload(format!("Error executing tool: {err}"))),
            Err(err) => error_payload(format!("Error executing tool: {err}")),
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.tools.iter().position(|entry| entry.tool.name() == name)
    }
}
