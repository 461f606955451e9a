//! Step journals - where completed step results are recorded
//!
//! A journal maps `(run_id, step name)` to the JSON value the step produced.
//! The executor loads a run's records once when it is opened and appends a
//! record after every completed step.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::StepError;

/// A completed step as stored in a journal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub name: String,
    pub output: Value,
    pub completed_at: chrono::DateTime<chrono::Utc>,
}

/// Storage for completed step results
#[async_trait]
pub trait StepJournal: Send + Sync {
    /// All records of a run, in completion order
    async fn load(&self, run_id: &str) -> Result<Vec<StepRecord>, StepError>;

    /// Append a completed step to a run
    async fn record(&self, run_id: &str, record: StepRecord) -> Result<(), StepError>;
}

/// In-process journal, lost when the process exits
#[derive(Debug, Default)]
pub struct MemoryJournal {
    runs: Mutex<HashMap<String, Vec<StepRecord>>>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StepJournal for MemoryJournal {
    async fn load(&self, run_id: &str) -> Result<Vec<StepRecord>, StepError> {
        let runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());
        Ok(runs.get(run_id).cloned().unwrap_or_default())
    }

    async fn record(&self, run_id: &str, record: StepRecord) -> Result<(), StepError> {
        let mut runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());
        runs.entry(run_id.to_string()).or_default().push(record);
        Ok(())
    }
}

/// On-disk run file
#[derive(Debug, Default, Serialize, Deserialize)]
struct RunFile {
    run_id: String,
    steps: Vec<StepRecord>,
}

/// Journal persisted as one JSON file per run
///
/// Files are rewritten through a temporary file and a rename so a crash
/// mid-write leaves the previous version intact.
#[derive(Debug)]
pub struct FileJournal {
    base_dir: PathBuf,
}

impl FileJournal {
    /// Create a journal rooted at `base_dir`, creating it if needed
    pub fn new(base_dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn run_path(&self, run_id: &str) -> Result<PathBuf, StepError> {
        let valid = !run_id.is_empty()
            && run_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StepError::Journal(format!("invalid run id '{}'", run_id)));
        }
        Ok(self.base_dir.join(format!("{}.json", run_id)))
    }

    async fn read_run(&self, run_id: &str) -> Result<RunFile, StepError> {
        let path = self.run_path(run_id)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(json) => serde_json::from_str(&json)
                .map_err(|e| StepError::Journal(format!("corrupt journal {}: {}", path.display(), e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(RunFile {
                run_id: run_id.to_string(),
                steps: Vec::new(),
            }),
            Err(e) => Err(StepError::Journal(format!(
                "failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

#[async_trait]
impl StepJournal for FileJournal {
    async fn load(&self, run_id: &str) -> Result<Vec<StepRecord>, StepError> {
        Ok(self.read_run(run_id).await?.steps)
    }

    async fn record(&self, run_id: &str, record: StepRecord) -> Result<(), StepError> {
        let mut run = self.read_run(run_id).await?;
        run.steps.push(record);

        let json = serde_json::to_string_pretty(&run)
            .map_err(|e| StepError::Journal(format!("failed to encode journal: {}", e)))?;

        let path = self.run_path(run_id)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| StepError::Journal(format!("failed to write {}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| StepError::Journal(format!("failed to replace {}: {}", path.display(), e)))?;
        Ok(())
    }
}
