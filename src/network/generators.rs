//! Title and response generators run once the network has finished

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::agent::Agent;
use super::prompts::{FRAGMENT_TITLE_PROMPT, RESPONSE_PROMPT};
use crate::llm::{ChatMessage, ChatModel, ChatResponse};
use crate::state::strip_marker;
use crate::step::{StepError, StepExecutor};

pub const FRAGMENT_TITLE_GENERATOR: &str = "fragment-title-generator";
pub const RESPONSE_GENERATOR: &str = "response-generator";

pub const FALLBACK_TITLE: &str = "Fragment";
pub const FALLBACK_RESPONSE: &str = "Here's what I built for you.";

/// User-facing copy derived from the summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedCopy {
    pub title: String,
    pub response: String,
}

pub struct SecondaryGenerators {
    title: Agent,
    response: Agent,
}

impl SecondaryGenerators {
    pub fn new(title: Agent, response: Agent) -> Self {
        Self { title, response }
    }

    /// Both generators on one model with the stock prompts
    pub fn with_model(client: Arc<dyn ChatModel>, model: &str) -> Self {
        Self::new(
            Agent::new(FRAGMENT_TITLE_GENERATOR, FRAGMENT_TITLE_PROMPT, model, client.clone()),
            Agent::new(RESPONSE_GENERATOR, RESPONSE_PROMPT, model, client),
        )
    }

    /// Produce the fragment title and the response text for `summary`
    ///
    /// `summary` may be empty when the network hit its iteration cap.
    pub async fn generate(&self, summary: &str, steps: &StepExecutor) -> Result<GeneratedCopy, StepError> {
        let title = single_shot(&self.title, summary, steps).await?;
        let response = single_shot(&self.response, summary, steps).await?;

        Ok(GeneratedCopy {
            title: non_empty_or(title, FALLBACK_TITLE),
            response: non_empty_or(response, FALLBACK_RESPONSE),
        })
    }
}

/// One tool-less model call, journaled under the agent's name
async fn single_shot(agent: &Agent, input: &str, steps: &StepExecutor) -> Result<String, StepError> {
    let step = steps.sequenced(agent.name());
    let conversation = [ChatMessage::user(input)];
    let response: ChatResponse = steps
        .run(&step, || agent.infer(&conversation, None))
        .await?;

    let text = strip_marker(&response.message.content);
    debug!(agent = %agent.name(), output = %text, "Generator finished");
    Ok(text)
}

fn non_empty_or(text: String, fallback: &str) -> String {
    if text.is_empty() {
        fallback.to_string()
    } else {
        text
    }
}
