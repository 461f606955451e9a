//! Prometheus metrics for the code-agent pipeline
//!
//! All metrics live in the default registry and are rendered with
//! [`encode_metrics`] in the Prometheus text exposition format.

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram, register_histogram_vec,
    CounterVec, Encoder, Gauge, Histogram, HistogramVec, TextEncoder,
};

lazy_static! {
    // ─────────────────────────────────────────────────────────────────────────────
    // Job Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Completed job runs by outcome.
    ///
    /// Labels:
    /// - outcome: "success", "error" (classified error outcome) or "failed" (fatal)
    pub static ref JOB_RUNS: CounterVec = register_counter_vec!(
        "codeagent_job_runs_total",
        "Code agent job runs by outcome",
        &["outcome"]
    ).expect("failed to register JOB_RUNS metric");

    /// Wall-clock duration of whole job runs.
    pub static ref JOB_DURATION: Histogram = register_histogram!(
        "codeagent_job_duration_seconds",
        "Duration of code agent job runs",
        vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0]
    ).expect("failed to register JOB_DURATION metric");

    // ─────────────────────────────────────────────────────────────────────────────
    // Durable Step Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Step invocations by outcome.
    ///
    /// Labels:
    /// - outcome: "executed", "memoized" or "failed"
    pub static ref STEP_EXECUTIONS: CounterVec = register_counter_vec!(
        "codeagent_step_executions_total",
        "Durable step invocations by outcome",
        &["outcome"]
    ).expect("failed to register STEP_EXECUTIONS metric");

    // ─────────────────────────────────────────────────────────────────────────────
    // Agent Network Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Router iterations used per job.
    pub static ref AGENT_ITERATIONS_TOTAL: Histogram = register_histogram!(
        "codeagent_agent_iterations",
        "Agent network iterations per job",
        vec![1.0, 2.0, 3.0, 5.0, 8.0, 13.0, 21.0]
    ).expect("failed to register AGENT_ITERATIONS_TOTAL metric");

    /// Network terminations by reason ("summary" or "max_iterations").
    pub static ref AGENT_TERMINATIONS: CounterVec = register_counter_vec!(
        "codeagent_agent_terminations_total",
        "Agent network terminations by reason",
        &["reason"]
    ).expect("failed to register AGENT_TERMINATIONS metric");

    /// Tool calls by tool name and status ("ok" or "error").
    pub static ref TOOL_CALLS: CounterVec = register_counter_vec!(
        "codeagent_tool_calls_total",
        "Agent tool calls by tool and status",
        &["tool", "status"]
    ).expect("failed to register TOOL_CALLS metric");

    /// LLM call latency per model.
    pub static ref LLM_CALL_TIME: HistogramVec = register_histogram_vec!(
        "codeagent_llm_call_duration_seconds",
        "Latency of model chat calls",
        &["model"],
        vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    ).expect("failed to register LLM_CALL_TIME metric");

    // ─────────────────────────────────────────────────────────────────────────────
    // Sandbox Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Sandboxes currently registered and not yet expired.
    pub static ref SANDBOXES_ACTIVE: Gauge = register_gauge!(
        "codeagent_sandboxes_active",
        "Sandboxes currently alive"
    ).expect("failed to register SANDBOXES_ACTIVE metric");

    /// Time taken to provision a sandbox.
    pub static ref SANDBOX_ACQUIRE_DURATION: Histogram = register_histogram!(
        "codeagent_sandbox_acquire_duration_seconds",
        "Time to provision a sandbox",
        vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]
    ).expect("failed to register SANDBOX_ACQUIRE_DURATION metric");

    /// Sandbox command executions by status ("success", "error", "timeout").
    pub static ref SANDBOX_COMMANDS: CounterVec = register_counter_vec!(
        "codeagent_sandbox_commands_total",
        "Commands executed in sandboxes by status",
        &["status"]
    ).expect("failed to register SANDBOX_COMMANDS metric");
}

/// Render every registered metric in the Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
