//! Sandbox management module
//!
//! A sandbox is an isolated, time-boxed environment with its own file store
//! and command execution. Jobs acquire one sandbox at the start of a run and
//! then resolve it by id in every later step; the job never destroys it, it
//! simply expires after its timeout.
//!
//! - `handle` - the [`Sandbox`] and [`SandboxProvider`] seams
//! - `local` - process-and-directory backed provider

pub mod handle;
pub mod local;

pub use handle::{CommandOutput, CommandResult, Sandbox, SandboxId, SandboxProvider};
pub use local::{LocalSandbox, LocalSandboxProvider};

use std::time::Duration;

/// Error type for sandbox operations
#[derive(Debug)]
pub enum SandboxError {
    /// The environment could not be provisioned
    Provision(String),
    /// No sandbox with this id exists
    NotFound(String),
    /// The sandbox outlived its timeout
    Expired(String),
    /// A command ran but exited unsuccessfully
    CommandFailed { exit_code: i32 },
    /// A command did not finish within the command timeout
    Timeout(Duration),
    /// A path escapes the sandbox root
    InvalidPath(String),
    /// Underlying filesystem or process error
    Io(std::io::Error),
}

impl std::fmt::Display for SandboxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SandboxError::Provision(msg) => write!(f, "Failed to provision sandbox: {}", msg),
            SandboxError::NotFound(id) => write!(f, "Sandbox {} not found", id),
            SandboxError::Expired(id) => write!(f, "Sandbox {} has expired", id),
            SandboxError::CommandFailed { exit_code } => {
                write!(f, "Command exited with code {}", exit_code)
            }
            SandboxError::Timeout(d) => write!(f, "Command timed out after {:?}", d),
            SandboxError::InvalidPath(path) => write!(f, "Invalid sandbox path: {}", path),
            SandboxError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for SandboxError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SandboxError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SandboxError {
    fn from(e: std::io::Error) -> Self {
        SandboxError::Io(e)
    }
}
