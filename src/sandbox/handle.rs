//! Sandbox handles - the interface jobs and tools talk to

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::SandboxError;

/// Opaque sandbox identifier (e.g., "sbx-01926abc...")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SandboxId(pub String);

impl SandboxId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SandboxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Accumulation buffers filled while a command streams its output
///
/// Owned by the caller so whatever was captured before a failure is still
/// available afterwards.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Final result of a command that exited successfully
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration_ms: f64,
}

/// A live reference to one sandbox
#[async_trait]
pub trait Sandbox: Send + Sync {
    fn id(&self) -> &SandboxId;

    /// Run a shell command to completion, streaming into `output`
    ///
    /// A non-zero exit status is reported as [`SandboxError::CommandFailed`].
    async fn execute(
        &self,
        command: &str,
        output: &mut CommandOutput,
    ) -> Result<CommandResult, SandboxError>;

    async fn write_file(&self, path: &str, content: &str) -> Result<(), SandboxError>;

    async fn read_file(&self, path: &str) -> Result<String, SandboxError>;

    /// URL at which `port` inside the sandbox is reachable
    fn exposed_endpoint(&self, port: u16) -> Result<String, SandboxError>;
}

/// Provisions sandboxes and looks them up again by id
#[async_trait]
pub trait SandboxProvider: Send + Sync {
    /// Provision a fresh sandbox from `template` that expires after `timeout`
    async fn acquire(&self, template: &str, timeout: Duration) -> Result<SandboxId, SandboxError>;

    /// Re-obtain a live reference to an already provisioned sandbox
    async fn resolve(&self, id: &SandboxId) -> Result<Arc<dyn Sandbox>, SandboxError>;
}
