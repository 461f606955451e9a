//! Accepting a prompt for a project

use tracing::info;

use super::JobTrigger;
use crate::store::{MessageStore, NewMessage, StoreError};

/// Longest prompt accepted, in characters
pub const MAX_PROMPT_CHARS: usize = 10_000;

#[derive(Debug)]
pub enum SubmitError {
    EmptyPrompt,
    PromptTooLong { chars: usize },
    Store(StoreError),
}

impl std::fmt::Display for SubmitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmitError::EmptyPrompt => write!(f, "Prompt is required"),
            SubmitError::PromptTooLong { chars } => write!(
                f,
                "Prompt is too long ({} characters, at most {})",
                chars, MAX_PROMPT_CHARS
            ),
            SubmitError::Store(e) => write!(f, "Failed to save prompt: {}", e),
        }
    }
}

impl std::error::Error for SubmitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SubmitError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for SubmitError {
    fn from(e: StoreError) -> Self {
        SubmitError::Store(e)
    }
}

/// Check a prompt before anything is stored
pub fn validate_prompt(value: &str) -> Result<(), SubmitError> {
    if value.trim().is_empty() {
        return Err(SubmitError::EmptyPrompt);
    }
    let chars = value.chars().count();
    if chars > MAX_PROMPT_CHARS {
        return Err(SubmitError::PromptTooLong { chars });
    }
    Ok(())
}

/// Persist the user's prompt and return the trigger that runs the job
pub async fn submit(
    store: &dyn MessageStore,
    project_id: &str,
    value: &str,
) -> Result<JobTrigger, SubmitError> {
    validate_prompt(value)?;

    let message = store.create_message(NewMessage::user(project_id, value)).await?;
    info!(project_id, message_id = %message.id, "Prompt accepted");

    Ok(JobTrigger {
        project_id: project_id.to_string(),
        value: value.to_string(),
    })
}
