//! `createOrUpdateFiles` and `readFiles`

use std::convert::Infallible;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{parse_arguments, AgentTool, SandboxAccess, ToolOutput};
use crate::llm::Tool;
use crate::sandbox::SandboxError;
use crate::state::AgentState;
use crate::step::StepError;
use crate::store::FileMap;

pub const CREATE_OR_UPDATE_FILES: &str = "createOrUpdateFiles";
pub const READ_FILES: &str = "readFiles";

#[derive(Debug, Deserialize)]
struct FileEntry {
    path: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct WriteArgs {
    files: Vec<FileEntry>,
}

#[derive(Debug, Deserialize)]
struct ReadArgs {
    files: Vec<String>,
}

/// Journaled result of one write-files step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum WriteOutcome {
    Written { files: FileMap },
    Failed { error: String },
}

#[derive(Debug, Serialize)]
struct FileContent {
    path: String,
    content: String,
}

pub struct WriteFilesTool {
    access: SandboxAccess,
}

impl WriteFilesTool {
    pub fn new(access: SandboxAccess) -> Self {
        Self { access }
    }

    /// Write every file; any failure aborts the batch
    async fn write_all(&self, files: &[FileEntry]) -> Result<FileMap, SandboxError> {
        let sandbox = self.access.provider.resolve(&self.access.sandbox_id).await?;
        let mut written = FileMap::new();
        for file in files {
            sandbox.write_file(&file.path, &file.content).await?;
            written.insert(file.path.clone(), file.content.clone());
        }
        Ok(written)
    }
}

#[async_trait]
impl AgentTool for WriteFilesTool {
    fn name(&self) -> &'static str {
        CREATE_OR_UPDATE_FILES
    }

    fn definition(&self) -> Tool {
        Tool::function(
            CREATE_OR_UPDATE_FILES,
            "Create or update files in the sandbox",
            json!({
                "type": "object",
                "properties": {
                    "files": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "path": {"type": "string", "description": "Relative file path, e.g. app/page.tsx"},
                                "content": {"type": "string"}
                            },
                            "required": ["path", "content"]
                        }
                    }
                },
                "required": ["files"]
            }),
        )
    }

    async fn call(&self, arguments: &Value, state: &mut AgentState) -> Result<ToolOutput, StepError> {
        let args: WriteArgs = match parse_arguments(CREATE_OR_UPDATE_FILES, arguments) {
            Ok(args) => args,
            Err(output) => return Ok(output),
        };

        let step = self.access.steps.sequenced(CREATE_OR_UPDATE_FILES);
        let outcome = self
            .access
            .steps
            .run(&step, || async {
                let outcome = match self.write_all(&args.files).await {
                    Ok(files) => WriteOutcome::Written { files },
                    Err(e) => WriteOutcome::Failed { error: e.to_string() },
                };
                Ok::<_, Infallible>(outcome)
            })
            .await?;

        // Committed after the step so a replayed run rebuilds the same map
        match outcome {
            WriteOutcome::Written { files } => {
                let paths: Vec<String> = files.keys().cloned().collect();
                debug!(files = ?paths, "Files written");
                state.commit_files(files);
                Ok(ToolOutput::ok(format!("Wrote {} file(s): {}", paths.len(), paths.join(", "))))
            }
            WriteOutcome::Failed { error } => {
                warn!(error = %error, "Writing files failed");
                Ok(ToolOutput::error(format!("Error: {}", error)))
            }
        }
    }
}

pub struct ReadFilesTool {
    access: SandboxAccess,
}

impl ReadFilesTool {
    pub fn new(access: SandboxAccess) -> Self {
        Self { access }
    }

    async fn read_all(&self, paths: &[String]) -> Result<String, SandboxError> {
        let sandbox = self.access.provider.resolve(&self.access.sandbox_id).await?;
        let mut contents = Vec::with_capacity(paths.len());
        for path in paths {
            let content = sandbox.read_file(path).await?;
            contents.push(FileContent {
                path: path.clone(),
                content,
            });
        }
        serde_json::to_string(&contents)
            .map_err(|e| SandboxError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
    }
}

#[async_trait]
impl AgentTool for ReadFilesTool {
    fn name(&self) -> &'static str {
        READ_FILES
    }

    fn definition(&self) -> Tool {
        Tool::function(
            READ_FILES,
            "Read files from the sandbox",
            json!({
                "type": "object",
                "properties": {
                    "files": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Paths to read, e.g. /home/user/components/ui/button.tsx"
                    }
                },
                "required": ["files"]
            }),
        )
    }

    async fn call(&self, arguments: &Value, _state: &mut AgentState) -> Result<ToolOutput, StepError> {
        let args: ReadArgs = match parse_arguments(READ_FILES, arguments) {
            Ok(args) => args,
            Err(output) => return Ok(output),
        };

        let step = self.access.steps.sequenced(READ_FILES);
        self.access
            .steps
            .run(&step, || async {
                let output = match self.read_all(&args.files).await {
                    Ok(json) => ToolOutput::ok(json),
                    Err(e) => {
                        warn!(error = %e, "Reading files failed");
                        ToolOutput::error(format!("Error: {}", e))
                    }
                };
                Ok::<_, Infallible>(output)
            })
            .await
    }
}
