//! The code-agent job
//!
//! ```text
//! JobTrigger { project_id, value }
//!     │
//!     ├── get-sandbox-id          acquire a sandbox from the template
//!     ├── get-previous-messages   last N messages, oldest first
//!     ├── code-agent[:N]          network turns, tool steps in between
//!     ├── fragment-title-generator / response-generator
//!     ├── get-sandbox-url         preview endpoint
//!     ├── save-error              ERROR message, only when the run failed
//!     └── save-result             RESULT with fragment
//!     ▼
//! JobOutput { url, title, files, summary }
//! ```
//!
//! Every step goes through the run's [`StepExecutor`], so re-running a job
//! with the same run id resumes after the last completed step.

pub mod outcome;
pub mod submit;

pub use outcome::{classify, persist_result, Outcome, SavedResult, ERROR_MESSAGE, SAVE_ERROR, SAVE_RESULT};
pub use submit::{submit, validate_prompt, SubmitError, MAX_PROMPT_CHARS};

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{error, info, info_span, Instrument};

use crate::config::JobConfig;
use crate::llm::{ChatMessage, ChatModel};
use crate::metrics::{JOB_DURATION, JOB_RUNS};
use crate::network::{
    Agent, AgentNetwork, SecondaryGenerators, TerminationReason, CODE_AGENT, CODING_AGENT_PROMPT,
};
use crate::sandbox::{SandboxError, SandboxId, SandboxProvider};
use crate::state::AgentState;
use crate::step::{StepError, StepExecutor, StepJournal};
use crate::store::{load_recent, FileMap, MessageStore, NewFragment};
use crate::tools::{SandboxAccess, ToolRegistry};

pub const GET_SANDBOX_ID: &str = "get-sandbox-id";
pub const GET_PREVIOUS_MESSAGES: &str = "get-previous-messages";
pub const GET_SANDBOX_URL: &str = "get-sandbox-url";

/// Event that starts a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobTrigger {
    pub project_id: String,
    pub value: String,
}

/// What a finished job returns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOutput {
    pub url: String,
    pub title: String,
    pub files: FileMap,
    pub summary: String,
}

/// Error type for job runs
#[derive(Debug)]
pub enum JobError {
    /// No sandbox could be acquired
    Provision(StepError),
    /// A step of the run failed or the journal is unusable
    Step(StepError),
    /// The result could not be saved
    Persist(StepError),
}

impl std::fmt::Display for JobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobError::Provision(e) => write!(f, "Sandbox provisioning failed: {}", e),
            JobError::Step(e) => write!(f, "Job step failed: {}", e),
            JobError::Persist(e) => write!(f, "Failed to save result: {}", e),
        }
    }
}

impl std::error::Error for JobError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            JobError::Provision(e) | JobError::Step(e) | JobError::Persist(e) => Some(e),
        }
    }
}

impl From<StepError> for JobError {
    fn from(e: StepError) -> Self {
        JobError::Step(e)
    }
}

/// Runs code-agent jobs against injected sandbox, store, journal and models
#[derive(Clone)]
pub struct CodeAgentJob {
    config: JobConfig,
    sandboxes: Arc<dyn SandboxProvider>,
    store: Arc<dyn MessageStore>,
    journal: Arc<dyn StepJournal>,
    coding_client: Arc<dyn ChatModel>,
    generator_client: Arc<dyn ChatModel>,
}

impl CodeAgentJob {
    pub fn new(
        config: JobConfig,
        sandboxes: Arc<dyn SandboxProvider>,
        store: Arc<dyn MessageStore>,
        journal: Arc<dyn StepJournal>,
        client: Arc<dyn ChatModel>,
    ) -> Self {
        Self {
            config,
            sandboxes,
            store,
            journal,
            coding_client: client.clone(),
            generator_client: client,
        }
    }

    /// Use a separate model client for the title and response generators
    pub fn with_generator_client(mut self, client: Arc<dyn ChatModel>) -> Self {
        self.generator_client = client;
        self
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    /// Run the job for `trigger`; `run_id` keys the step journal
    pub async fn run(&self, trigger: &JobTrigger, run_id: &str) -> Result<JobOutput, JobError> {
        let span = info_span!(
            "code_agent_job",
            run_id = %run_id,
            project_id = %trigger.project_id,
            otel.name = "code_agent_job"
        );

        let start = Instant::now();
        let result = self.execute(trigger, run_id).instrument(span).await;
        JOB_DURATION.observe(start.elapsed().as_secs_f64());

        match &result {
            Ok((_, outcome)) => {
                let label = if outcome.is_error { "error" } else { "success" };
                JOB_RUNS.with_label_values(&[label]).inc();
            }
            Err(e) => {
                error!(run_id = %run_id, project_id = %trigger.project_id, error = %e, "Job failed");
                JOB_RUNS.with_label_values(&["failed"]).inc();
            }
        }
        result.map(|(output, _)| output)
    }

    async fn execute(&self, trigger: &JobTrigger, run_id: &str) -> Result<(JobOutput, Outcome), JobError> {
        info!(value_len = trigger.value.len(), "Starting code-agent job");
        let steps = Arc::new(StepExecutor::open(self.journal.clone(), run_id).await?);

        let sandbox_id: SandboxId = steps
            .run(GET_SANDBOX_ID, || {
                self.sandboxes
                    .acquire(&self.config.sandbox_template, self.config.sandbox_timeout)
            })
            .await
            .map_err(JobError::Provision)?;

        let history: Vec<ChatMessage> = steps
            .run(GET_PREVIOUS_MESSAGES, || {
                load_recent(self.store.as_ref(), &trigger.project_id, self.config.history_limit)
            })
            .await?;

        let mut state = AgentState::new();
        let network = self.network(sandbox_id.clone(), steps.clone());
        let run = network.run(&trigger.value, history, &mut state).await?;
        if run.reason == TerminationReason::MaxIterations {
            info!(iterations = run.iterations, "Continuing without a summary");
        }

        let generators =
            SecondaryGenerators::with_model(self.generator_client.clone(), &self.config.generator_model);
        let copy = generators.generate(&state.summary, &steps).await?;

        let outcome = classify(&state);

        let sandbox_url: String = steps
            .run(GET_SANDBOX_URL, || self.sandbox_url(&sandbox_id))
            .await?;

        persist_result(
            self.store.as_ref(),
            &steps,
            &trigger.project_id,
            outcome,
            &copy.response,
            NewFragment {
                sandbox_url: sandbox_url.clone(),
                title: copy.title,
                files: state.files.clone(),
            },
        )
        .await
        .map_err(JobError::Persist)?;

        info!(
            sandbox_id = %sandbox_id,
            is_error = outcome.is_error,
            files = state.files.len(),
            "Code-agent job finished"
        );

        let output = JobOutput {
            url: sandbox_url,
            title: "Fragment".to_string(),
            files: state.files,
            summary: state.summary,
        };
        Ok((output, outcome))
    }

    fn network(&self, sandbox_id: SandboxId, steps: Arc<StepExecutor>) -> AgentNetwork {
        let system_prompt = self
            .config
            .system_prompt
            .clone()
            .unwrap_or_else(|| CODING_AGENT_PROMPT.to_string());
        let agent = Agent::new(
            CODE_AGENT,
            system_prompt,
            self.config.coding_model.clone(),
            self.coding_client.clone(),
        );
        let tools = ToolRegistry::for_sandbox(SandboxAccess::new(
            self.sandboxes.clone(),
            sandbox_id,
            steps.clone(),
        ));

        AgentNetwork::new(agent, tools, steps)
            .with_max_iterations(self.config.max_iterations)
            .with_max_tool_rounds(self.config.max_tool_rounds)
    }

    async fn sandbox_url(&self, sandbox_id: &SandboxId) -> Result<String, SandboxError> {
        let sandbox = self.sandboxes.resolve(sandbox_id).await?;
        sandbox.exposed_endpoint(self.config.preview_port)
    }
}

impl std::fmt::Debug for CodeAgentJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeAgentJob")
            .field("coding_model", &self.config.coding_model)
            .field("generator_model", &self.config.generator_model)
            .field("max_iterations", &self.config.max_iterations)
            .finish()
    }
}
