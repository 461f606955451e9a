//! File-backed message store
//!
//! One pretty-printed JSON document per project under a base directory.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::types::{Message, NewMessage};
use super::{MessageStore, StoreError};

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProjectFile {
    project_id: String,
    /// Oldest first
    messages: Vec<Message>,
}

/// Message store persisted to disk
#[derive(Debug)]
pub struct FileMessageStore {
    base_dir: PathBuf,
    /// Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl FileMessageStore {
    /// Create a store rooted at `base_dir`, creating it if needed
    pub fn new(base_dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self {
            base_dir,
            write_lock: Mutex::new(()),
        })
    }

    fn project_path(&self, project_id: &str) -> Result<PathBuf, StoreError> {
        let valid = !project_id.is_empty()
            && project_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StoreError::InvalidProject(project_id.to_string()));
        }
        Ok(self.base_dir.join(format!("{}.json", project_id)))
    }

    async fn read_project(&self, project_id: &str) -> Result<ProjectFile, StoreError> {
        let path = self.project_path(project_id)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(json) => serde_json::from_str(&json)
                .map_err(|e| StoreError::Corrupt(format!("{}: {}", path.display(), e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ProjectFile {
                project_id: project_id.to_string(),
                messages: Vec::new(),
            }),
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}

#[async_trait]
impl MessageStore for FileMessageStore {
    async fn recent_messages(
        &self,
        project_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, StoreError> {
        let project = self.read_project(project_id).await?;
        Ok(project.messages.into_iter().rev().take(limit).collect())
    }

    async fn create_message(&self, message: NewMessage) -> Result<Message, StoreError> {
        let _guard = self.write_lock.lock().await;

        let message = Message::create(message);
        let mut project = self.read_project(&message.project_id).await?;
        project.messages.push(message.clone());

        let path = self.project_path(&message.project_id)?;
        let json = serde_json::to_string_pretty(&project)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;

        Ok(message)
    }
}
