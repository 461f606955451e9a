//! Persisted conversation records

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Path → content map of generated files
pub type FileMap = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Result,
    Error,
}

/// Generated artifact attached to a RESULT message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub id: Uuid,
    pub message_id: Uuid,
    pub sandbox_url: String,
    pub title: String,
    pub files: FileMap,
    pub created_at: DateTime<Utc>,
}

/// A stored conversation message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub project_id: String,
    pub content: String,
    pub role: MessageRole,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fragment: Option<Fragment>,
}

/// Fragment fields supplied by the writer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFragment {
    pub sandbox_url: String,
    pub title: String,
    pub files: FileMap,
}

/// Message fields supplied by the writer; ids and timestamps are assigned
/// by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMessage {
    pub project_id: String,
    pub content: String,
    pub role: MessageRole,
    pub message_type: MessageType,
    pub fragment: Option<NewFragment>,
}

impl NewMessage {
    pub fn user(project_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            content: content.into(),
            role: MessageRole::User,
            message_type: MessageType::Result,
            fragment: None,
        }
    }

    pub fn assistant(
        project_id: impl Into<String>,
        content: impl Into<String>,
        message_type: MessageType,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            content: content.into(),
            role: MessageRole::Assistant,
            message_type,
            fragment: None,
        }
    }

    pub fn with_fragment(mut self, fragment: NewFragment) -> Self {
        self.fragment = Some(fragment);
        self
    }
}

impl Message {
    /// Materialize a new message, creating its fragment alongside it
    pub fn create(new: NewMessage) -> Self {
        let id = Uuid::now_v7();
        let created_at = Utc::now();
        let fragment = new.fragment.map(|f| Fragment {
            id: Uuid::now_v7(),
            message_id: id,
            sandbox_url: f.sandbox_url,
            title: f.title,
            files: f.files,
            created_at,
        });

        Self {
            id,
            project_id: new.project_id,
            content: new.content,
            role: new.role,
            message_type: new.message_type,
            created_at,
            fragment,
        }
    }
}
