//! Classifying a finished run and persisting its result

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::state::AgentState;
use crate::step::{StepError, StepExecutor};
use crate::store::{MessageStore, MessageType, NewFragment, NewMessage, StoreError};

pub const SAVE_ERROR: &str = "save-error";
pub const SAVE_RESULT: &str = "save-result";

/// Content of the ERROR message written for unsuccessful runs
pub const ERROR_MESSAGE: &str = "Something went wrong. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub is_error: bool,
}

/// A run is an error unless it produced both a summary and at least one file
pub fn classify(state: &AgentState) -> Outcome {
    Outcome {
        is_error: !state.has_summary() || state.files.is_empty(),
    }
}

/// Ids of the messages written by [`persist_result`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedResult {
    pub error_message_id: Option<Uuid>,
    pub result_message_id: Uuid,
}

/// Write the run's messages
///
/// On error the ERROR message is written first as the step `save-error`; the
/// RESULT message with its fragment follows as `save-result`. A resumed run
/// replays whichever of the two already completed.
pub async fn persist_result(
    store: &dyn MessageStore,
    steps: &StepExecutor,
    project_id: &str,
    outcome: Outcome,
    response: &str,
    fragment: NewFragment,
) -> Result<SavedResult, StepError> {
    let error_message_id = if outcome.is_error {
        let id = steps
            .run(SAVE_ERROR, || async {
                let message = store
                    .create_message(NewMessage::assistant(project_id, ERROR_MESSAGE, MessageType::Error))
                    .await?;
                warn!(project_id, message_id = %message.id, "Run classified as error");
                Ok::<_, StoreError>(message.id)
            })
            .await?;
        Some(id)
    } else {
        None
    };

    let result_message_id = steps
        .run(SAVE_RESULT, || async {
            let message = store
                .create_message(
                    NewMessage::assistant(project_id, response, MessageType::Result)
                        .with_fragment(fragment),
                )
                .await?;
            info!(project_id, message_id = %message.id, "Result saved");
            Ok::<_, StoreError>(message.id)
        })
        .await?;

    Ok(SavedResult {
        error_message_id,
        result_message_id,
    })
}
