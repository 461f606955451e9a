//! Conversation history replayed into a new job

use super::types::{Message, MessageRole};
use super::{MessageStore, StoreError};
use crate::llm::ChatMessage;

/// Load the last `limit` messages of a project as chat messages, oldest first
///
/// Persisted assistant messages become assistant turns; everything else is
/// replayed as a user turn.
pub async fn load_recent(
    store: &dyn MessageStore,
    project_id: &str,
    limit: usize,
) -> Result<Vec<ChatMessage>, StoreError> {
    let mut messages: Vec<ChatMessage> = store
        .recent_messages(project_id, limit)
        .await?
        .into_iter()
        .map(to_chat_message)
        .collect();
    messages.reverse();
    Ok(messages)
}

fn to_chat_message(message: Message) -> ChatMessage {
    match message.role {
        MessageRole::Assistant => ChatMessage::assistant(message.content),
        MessageRole::User => ChatMessage::user(message.content),
    }
}
