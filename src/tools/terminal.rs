//! `terminal` - run a shell command inside the sandbox

use std::convert::Infallible;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{parse_arguments, AgentTool, SandboxAccess, ToolOutput};
use crate::llm::Tool;
use crate::sandbox::{CommandOutput, CommandResult, SandboxError};
use crate::state::AgentState;
use crate::step::StepError;

pub const TERMINAL: &str = "terminal";

#[derive(Debug, Deserialize)]
struct TerminalArgs {
    command: String,
}

pub struct TerminalTool {
    access: SandboxAccess,
}

impl TerminalTool {
    pub fn new(access: SandboxAccess) -> Self {
        Self { access }
    }

    async fn execute(&self, command: &str, output: &mut CommandOutput) -> Result<CommandResult, SandboxError> {
        let sandbox = self.access.provider.resolve(&self.access.sandbox_id).await?;
        sandbox.execute(command, output).await
    }
}

/// Text handed back to the agent when a command could not complete
fn failure_report(error: &SandboxError, output: &CommandOutput) -> String {
    format!(
        "Command failed: {}\nstdout: {}\nstderr: {}",
        error, output.stdout, output.stderr
    )
}

#[async_trait]
impl AgentTool for TerminalTool {
    fn name(&self) -> &'static str {
        TERMINAL
    }

    fn definition(&self) -> Tool {
        Tool::function(
            TERMINAL,
            "Use the terminal to run commands in the sandbox",
            json!({
                "type": "object",
                "properties": {
                    "command": {
                        "type": "string",
                        "description": "Shell command to run, e.g. npm install <package> --yes"
                    }
                },
                "required": ["command"]
            }),
        )
    }

    async fn call(&self, arguments: &Value, _state: &mut AgentState) -> Result<ToolOutput, StepError> {
        let args: TerminalArgs = match parse_arguments(TERMINAL, arguments) {
            Ok(args) => args,
            Err(output) => return Ok(output),
        };
        if args.command.trim().is_empty() {
            return Ok(ToolOutput::error("Error: command must not be empty"));
        }

        let step = self.access.steps.sequenced(TERMINAL);
        self.access
            .steps
            .run(&step, || async {
                let mut output = CommandOutput::default();
                match self.execute(&args.command, &mut output).await {
                    Ok(result) => {
                        debug!(
                            command = %args.command,
                            exit_code = result.exit_code,
                            duration_ms = result.duration_ms,
                            "Command succeeded"
                        );
                        let content = if result.stdout.is_empty() {
                            "Command completed with no output".to_string()
                        } else {
                            result.stdout
                        };
                        Ok::<_, Infallible>(ToolOutput::ok(content))
                    }
                    Err(e) => {
                        let report = failure_report(&e, &output);
                        warn!(command = %args.command, error = %e, "Command failed");
                        Ok(ToolOutput::error(report))
                    }
                }
            })
            .await
    }
}
