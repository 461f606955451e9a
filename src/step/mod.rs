//! Durable steps for job runs
//!
//! A job is a sequence of named steps. Each completed step's result is
//! written to a [`StepJournal`]; when a run is retried or resumed after a
//! crash, the [`StepExecutor`] returns the recorded results instead of doing
//! the work again. Retry policy belongs to whoever re-runs the job.

pub mod executor;
pub mod journal;

pub use executor::StepExecutor;
pub use journal::{FileJournal, MemoryJournal, StepJournal, StepRecord};

/// Error type for step execution
#[derive(Debug)]
pub enum StepError {
    /// The step's own work failed; nothing was recorded
    Failed {
        step: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// The step's output could not be serialized for the journal
    Encode {
        step: String,
        source: serde_json::Error,
    },
    /// A recorded output does not match the type the step now expects
    Decode {
        step: String,
        source: serde_json::Error,
    },
    /// The journal could not be read or written
    Journal(String),
}

impl std::fmt::Display for StepError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepError::Failed { step, source } => write!(f, "Step '{}' failed: {}", step, source),
            StepError::Encode { step, source } => {
                write!(f, "Failed to record output of step '{}': {}", step, source)
            }
            StepError::Decode { step, source } => {
                write!(f, "Recorded output of step '{}' is unreadable: {}", step, source)
            }
            StepError::Journal(msg) => write!(f, "Journal error: {}", msg),
        }
    }
}

impl std::error::Error for StepError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StepError::Failed { source, .. } => Some(source.as_ref()),
            StepError::Encode { source, .. } | StepError::Decode { source, .. } => Some(source),
            StepError::Journal(_) => None,
        }
    }
}
