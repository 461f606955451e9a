//! A named model persona: system prompt + model + client

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info_span, Instrument};

use crate::llm::{ChatError, ChatMessage, ChatModel, ChatResponse, Tool};
use crate::metrics::LLM_CALL_TIME;

#[derive(Clone)]
pub struct Agent {
    name: String,
    system_prompt: String,
    model: String,
    client: Arc<dyn ChatModel>,
}

impl Agent {
    pub fn new(
        name: impl Into<String>,
        system_prompt: impl Into<String>,
        model: impl Into<String>,
        client: Arc<dyn ChatModel>,
    ) -> Self {
        Self {
            name: name.into(),
            system_prompt: system_prompt.into(),
            model: model.into(),
            client,
        }
    }

    /// Name of the agent, also the base name of its model-call steps
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// One model call over `conversation`, with the system prompt prepended
    pub async fn infer(
        &self,
        conversation: &[ChatMessage],
        tools: Option<Vec<Tool>>,
    ) -> Result<ChatResponse, ChatError> {
        let mut messages = Vec::with_capacity(conversation.len() + 1);
        messages.push(ChatMessage::system(self.system_prompt.clone()));
        messages.extend_from_slice(conversation);

        let span = info_span!(
            "llm_call",
            agent = %self.name,
            model = %self.model,
            messages = messages.len(),
            otel.name = "llm_call"
        );

        let start = Instant::now();
        let response = self
            .client
            .chat(messages, &self.model, tools)
            .instrument(span)
            .await?;
        let elapsed = start.elapsed().as_secs_f64();

        LLM_CALL_TIME.with_label_values(&[&self.model]).observe(elapsed);
        debug!(
            agent = %self.name,
            duration_ms = elapsed * 1000.0,
            eval_count = response.eval_count,
            "LLM call completed"
        );
        Ok(response)
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("model", &self.model)
            .finish()
    }
}
