//! Shared agent state and the termination marker
//!
//! The coding agent signals completion by ending its reply with
//! `<task_summary>...</task_summary>`. The lifecycle hook is the only writer
//! of [`AgentState::summary`]; the write-files tool is the only writer of
//! [`AgentState::files`].

use serde::{Deserialize, Serialize};

use crate::store::FileMap;

pub const SUMMARY_OPEN: &str = "<task_summary>";
pub const SUMMARY_CLOSE: &str = "</task_summary>";

/// State accumulated across the iterations of one job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    /// Completion summary, empty until a termination marker is seen
    pub summary: String,
    /// Every file written so far, path → latest content
    pub files: FileMap,
}

impl AgentState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_summary(&self) -> bool {
        !self.summary.is_empty()
    }

    /// Store `summary` unless one is already set
    ///
    /// Returns whether the summary was stored. First write wins.
    pub fn record_summary(&mut self, summary: &str) -> bool {
        if self.has_summary() || summary.is_empty() {
            return false;
        }
        self.summary = summary.to_string();
        true
    }

    /// Merge written files into the map; paths are never removed
    pub fn commit_files(&mut self, files: FileMap) {
        self.files.extend(files);
    }
}

/// Content of a complete `<task_summary>...</task_summary>` pair
///
/// Missing, unterminated or empty markers all yield `None`.
pub fn extract_summary(text: &str) -> Option<&str> {
    let start = text.find(SUMMARY_OPEN)? + SUMMARY_OPEN.len();
    let len = text[start..].find(SUMMARY_CLOSE)?;
    let inner = text[start..start + len].trim();
    if inner.is_empty() {
        None
    } else {
        Some(inner)
    }
}

/// Remove the termination marker wrapper from model output
///
/// Text inside a complete marker pair wins; stray tags are dropped; the
/// result is trimmed. Tags are removed until none remain, including ones
/// formed by an earlier removal, so applying this twice changes nothing.
pub fn strip_marker(text: &str) -> String {
    let mut stripped = extract_summary(text).unwrap_or(text).to_string();
    while stripped.contains(SUMMARY_OPEN) || stripped.contains(SUMMARY_CLOSE) {
        stripped = stripped.replace(SUMMARY_OPEN, "").replace(SUMMARY_CLOSE, "");
    }
    stripped.trim().to_string()
}
