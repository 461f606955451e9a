//! codeagent - durable, sandboxed code-generation jobs driven by an LLM agent
//!
//! A job takes a user prompt for a project, provisions a sandbox, replays the
//! project's recent conversation and lets a coding agent work in the sandbox
//! through tools until it reports completion. The generated files, a title
//! and a user-facing response are saved as a result message with a fragment.
//!
//! # Modules
//!
//! - `job` - the job pipeline, prompt submission and result persistence
//! - `network` - coding agent, router, lifecycle hook and generators
//! - `tools` - terminal, createOrUpdateFiles and readFiles
//! - `sandbox` - sandbox seams and the local directory-backed provider
//! - `step` - durable, memoized steps over a journal
//! - `store` - message store and conversation history
//! - `llm` - chat wire types and the Ollama-compatible client
//! - `state` - shared agent state and the termination marker
//! - `config` - job configuration
//! - `metrics` - Prometheus metrics for observability
//! - `telemetry` - tracing subscriber and OTLP export
//!
//! # Quick Start
//!
//! ```ignore
//! use codeagent::{CodeAgentJob, JobConfig, JobTrigger};
//!
//! let job = CodeAgentJob::new(JobConfig::from_env(), sandboxes, store, journal, client);
//! let trigger = JobTrigger { project_id: "p1".into(), value: "Add a footer".into() };
//! let output = job.run(&trigger, "run-1").await?;
//! println!("{}", output.url);
//! ```

pub mod config;
pub mod job;
pub mod llm;
pub mod metrics;
pub mod network;
pub mod sandbox;
pub mod state;
pub mod step;
pub mod store;
pub mod telemetry;
pub mod tools;

// Re-export commonly used types at crate root for convenience
pub use config::JobConfig;
pub use job::{CodeAgentJob, JobError, JobOutput, JobTrigger};
pub use state::AgentState;
