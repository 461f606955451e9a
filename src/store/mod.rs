//! Conversation store
//!
//! Only the two operations the pipeline needs: read the most recent messages
//! of a project, and create a message (with its fragment, if any).

pub mod file;
pub mod history;
pub mod memory;
pub mod types;

pub use file::FileMessageStore;
pub use history::load_recent;
pub use memory::MemoryMessageStore;
pub use types::{FileMap, Fragment, Message, MessageRole, MessageType, NewFragment, NewMessage};

use async_trait::async_trait;

/// Read/write access to persisted messages
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Up to `limit` messages of a project, newest first
    async fn recent_messages(&self, project_id: &str, limit: usize)
        -> Result<Vec<Message>, StoreError>;

    /// Persist a message; its fragment, if any, is created with it
    async fn create_message(&self, message: NewMessage) -> Result<Message, StoreError>;
}

/// Error type for store operations
#[derive(Debug)]
pub enum StoreError {
    /// Project id cannot be used as a storage key
    InvalidProject(String),
    /// Stored data could not be decoded or encoded
    Corrupt(String),
    Io(std::io::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::InvalidProject(id) => write!(f, "Invalid project id: {}", id),
            StoreError::Corrupt(msg) => write!(f, "Corrupt store data: {}", msg),
            StoreError::Io(e) => write!(f, "Store I/O error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e)
    }
}
