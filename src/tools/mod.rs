//! Tools the coding agent can call
//!
//! ```text
//! model tool call ──► ToolRegistry::dispatch ──► AgentTool::call
//!                                                   │
//!                                   StepExecutor::run("terminal:N", ...)
//!                                                   │
//!                                   SandboxProvider::resolve(id) ──► Sandbox
//! ```
//!
//! Tool failures never escape as errors: they come back as text so the agent
//! can read them and adapt. The only `Err` a tool returns is a [`StepError`]
//! from the journal, which is fatal to the job.

pub mod files;
pub mod terminal;

pub use files::{ReadFilesTool, WriteFilesTool};
pub use terminal::TerminalTool;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::llm::{Tool, ToolCall};
use crate::metrics::TOOL_CALLS;
use crate::sandbox::{SandboxId, SandboxProvider};
use crate::state::AgentState;
use crate::step::{StepError, StepExecutor};

/// What a tool hands back to the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub content: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

/// A capability exposed to the agent
#[async_trait]
pub trait AgentTool: Send + Sync {
    fn name(&self) -> &'static str;

    /// Definition sent to the model
    fn definition(&self) -> Tool;

    async fn call(&self, arguments: &Value, state: &mut AgentState) -> Result<ToolOutput, StepError>;
}

/// Everything a sandbox tool needs, injected when the network is built
#[derive(Clone)]
pub struct SandboxAccess {
    pub provider: Arc<dyn SandboxProvider>,
    pub sandbox_id: SandboxId,
    pub steps: Arc<StepExecutor>,
}

impl SandboxAccess {
    pub fn new(
        provider: Arc<dyn SandboxProvider>,
        sandbox_id: SandboxId,
        steps: Arc<StepExecutor>,
    ) -> Self {
        Self {
            provider,
            sandbox_id,
            steps,
        }
    }
}

/// Parse tool arguments, turning a mismatch into a tool error message
pub(crate) fn parse_arguments<T: serde::de::DeserializeOwned>(
    tool: &str,
    arguments: &Value,
) -> Result<T, ToolOutput> {
    serde_json::from_value(arguments.clone())
        .map_err(|e| ToolOutput::error(format!("Error: invalid arguments for {}: {}", tool, e)))
}

/// The set of tools available to an agent
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn AgentTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// terminal, createOrUpdateFiles and readFiles against one sandbox
    pub fn for_sandbox(access: SandboxAccess) -> Self {
        Self::new()
            .with(TerminalTool::new(access.clone()))
            .with(WriteFilesTool::new(access.clone()))
            .with(ReadFilesTool::new(access))
    }

    pub fn with(mut self, tool: impl AgentTool + 'static) -> Self {
        self.tools.push(Box::new(tool));
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|tool| tool.name()).collect()
    }

    pub fn definitions(&self) -> Vec<Tool> {
        self.tools.iter().map(|tool| tool.definition()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run one tool call against the shared state
    pub async fn dispatch(
        &self,
        call: &ToolCall,
        state: &mut AgentState,
    ) -> Result<ToolOutput, StepError> {
        let name = call.function.name.as_str();
        let Some(tool) = self.tools.iter().find(|tool| tool.name() == name) else {
            warn!(tool = name, "Model called an unknown tool");
            TOOL_CALLS.with_label_values(&["unknown", "error"]).inc();
            return Ok(ToolOutput::error(format!(
                "Error: unknown tool '{}'. Available tools: {}",
                name,
                self.names().join(", ")
            )));
        };

        let output = tool.call(&call.function.arguments, state).await?;
        let status = if output.is_error { "error" } else { "ok" };
        TOOL_CALLS.with_label_values(&[tool.name(), status]).inc();
        info!(tool = tool.name(), status, output_len = output.content.len(), "Tool call finished");
        Ok(output)
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry").field("tools", &self.names()).finish()
    }
}
