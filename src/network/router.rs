//! Agent network - runs the coding agent until it declares completion
//!
//! ```text
//!            ┌──────────────────────────────────────────────┐
//!            ▼                                              │
//!   route(state, iterations)                                │
//!     ├── summary set ───────────► Terminated(Summary)      │
//!     ├── iterations == max ─────► Terminated(MaxIterations)│
//!     └── Running ──► turn: model call ⇄ tool calls ──► on_response
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, info_span, warn, Instrument};

use super::agent::Agent;
use super::lifecycle;
use crate::llm::{parse_tool_calls_from_text, ChatMessage, ChatResponse};
use crate::metrics::{AGENT_ITERATIONS_TOTAL, AGENT_TERMINATIONS};
use crate::state::AgentState;
use crate::step::{StepError, StepExecutor};
use crate::tools::ToolRegistry;

pub const DEFAULT_MAX_ITERATIONS: usize = 5;
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 20;

/// Why the network stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// The agent emitted a termination marker
    Summary,
    /// The iteration cap was reached first
    MaxIterations,
}

impl TerminationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminationReason::Summary => "summary",
            TerminationReason::MaxIterations => "max_iterations",
        }
    }
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterState {
    Running,
    Terminated(TerminationReason),
}

/// Decide whether another iteration runs; never mutates state
pub fn route(state: &AgentState, iterations: usize, max_iterations: usize) -> RouterState {
    if state.has_summary() {
        RouterState::Terminated(TerminationReason::Summary)
    } else if iterations >= max_iterations {
        RouterState::Terminated(TerminationReason::MaxIterations)
    } else {
        RouterState::Running
    }
}

/// Result of a network run
#[derive(Debug, Clone)]
pub struct NetworkRun {
    /// Agent turns executed
    pub iterations: usize,
    pub reason: TerminationReason,
    /// Full conversation, history included, system prompt excluded
    pub messages: Vec<ChatMessage>,
    /// Tool calls dispatched across all turns
    pub tool_calls: usize,
}

/// Single-agent network with a summary-driven router
pub struct AgentNetwork {
    agent: Agent,
    tools: ToolRegistry,
    steps: Arc<StepExecutor>,
    max_iterations: usize,
    max_tool_rounds: usize,
}

impl AgentNetwork {
    pub fn new(agent: Agent, tools: ToolRegistry, steps: Arc<StepExecutor>) -> Self {
        Self {
            agent,
            tools,
            steps,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Cap on model calls within one turn
    pub fn with_max_tool_rounds(mut self, max_tool_rounds: usize) -> Self {
        self.max_tool_rounds = max_tool_rounds.max(1);
        self
    }

    /// Run the network on `input` until the router terminates it
    pub async fn run(
        &self,
        input: &str,
        history: Vec<ChatMessage>,
        state: &mut AgentState,
    ) -> Result<NetworkRun, StepError> {
        let mut conversation = history;
        conversation.push(ChatMessage::user(input));

        let mut iterations = 0;
        let mut tool_calls = 0;

        let reason = loop {
            if let RouterState::Terminated(reason) = route(state, iterations, self.max_iterations) {
                break reason;
            }
            iterations += 1;

            let span = info_span!(
                "agent_iteration",
                agent = %self.agent.name(),
                iteration = iterations,
                otel.name = "agent_iteration"
            );
            let last_text = self
                .turn(&mut conversation, state, &mut tool_calls)
                .instrument(span)
                .await?;

            if let Some(text) = last_text {
                lifecycle::on_response(&text, state);
            }
        };

        AGENT_ITERATIONS_TOTAL.observe(iterations as f64);
        AGENT_TERMINATIONS.with_label_values(&[reason.as_str()]).inc();
        match reason {
            TerminationReason::Summary => {
                info!(iterations, tool_calls, "Agent network finished with a summary")
            }
            TerminationReason::MaxIterations => {
                warn!(iterations, tool_calls, "Agent network hit the iteration cap")
            }
        }

        Ok(NetworkRun {
            iterations,
            reason,
            messages: conversation,
            tool_calls,
        })
    }

    /// One agent turn: call the model, run its tool calls, repeat until it
    /// answers without any
    ///
    /// Returns the last non-empty assistant text of the turn.
    async fn turn(
        &self,
        conversation: &mut Vec<ChatMessage>,
        state: &mut AgentState,
        tool_calls: &mut usize,
    ) -> Result<Option<String>, StepError> {
        let names = self.tools.names();
        let definitions = if self.tools.is_empty() {
            None
        } else {
            Some(self.tools.definitions())
        };
        let mut last_text = None;

        for _ in 0..self.max_tool_rounds {
            let step = self.steps.sequenced(self.agent.name());
            let response: ChatResponse = {
                let history = conversation.as_slice();
                let tools = definitions.clone();
                self.steps
                    .run(&step, || self.agent.infer(history, tools))
                    .await?
            };

            let message = response.message;
            // Native tool calls first, then calls printed as text
            let calls = message
                .tool_calls
                .clone()
                .filter(|calls| !calls.is_empty())
                .unwrap_or_else(|| parse_tool_calls_from_text(&message.content, &names));

            if !message.content.trim().is_empty() {
                last_text = Some(message.content.clone());
            }
            conversation.push(message);

            if calls.is_empty() {
                return Ok(last_text);
            }

            for call in &calls {
                info!(tool = %call.function.name, "Dispatching tool call");
                let output = self.tools.dispatch(call, state).await?;
                *tool_calls += 1;
                conversation.push(ChatMessage::tool(output.content));
            }
        }

        warn!(
            max_tool_rounds = self.max_tool_rounds,
            "Tool round limit reached, ending turn"
        );
        Ok(last_text)
    }
}
