//! In-memory message store

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::types::{Message, NewMessage};
use super::{MessageStore, StoreError};

/// Message store held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryMessageStore {
    /// Messages per project, oldest first
    projects: Mutex<HashMap<String, Vec<Message>>>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages of a project, oldest first
    pub async fn messages(&self, project_id: &str) -> Vec<Message> {
        let projects = self.projects.lock().await;
        projects.get(project_id).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn recent_messages(
        &self,
        project_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, StoreError> {
        let projects = self.projects.lock().await;
        Ok(projects
            .get(project_id)
            .map(|messages| messages.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn create_message(&self, message: NewMessage) -> Result<Message, StoreError> {
        let message = Message::create(message);
        let mut projects = self.projects.lock().await;
        projects
            .entry(message.project_id.clone())
            .or_default()
            .push(message.clone());
        Ok(message)
    }
}
