//! Step executor - memoized, named units of work for one job run
//!
//! ```text
//! run("get-sandbox-id", f)
//!     │
//!     ├── recorded in journal? ──yes──► deserialize recorded value, skip f
//!     │
//!     └── no ──► f().await ──Ok──► record ──► return
//!                         └─Err──► StepError::Failed (nothing recorded)
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info_span, warn, Instrument};

use super::journal::{StepJournal, StepRecord};
use super::StepError;
use crate::metrics::STEP_EXECUTIONS;

#[derive(Debug, Default)]
struct ExecutorState {
    /// Results of completed steps, by name
    completed: HashMap<String, Value>,
    /// How many times each base name has been handed out by `sequenced`
    occurrences: HashMap<String, usize>,
}

/// Executes named steps at most once per run
pub struct StepExecutor {
    run_id: String,
    journal: Arc<dyn StepJournal>,
    state: Mutex<ExecutorState>,
}

impl StepExecutor {
    /// Open the executor for `run_id`, loading whatever the journal already
    /// recorded for it
    pub async fn open(
        journal: Arc<dyn StepJournal>,
        run_id: impl Into<String>,
    ) -> Result<Self, StepError> {
        let run_id = run_id.into();
        let records = journal.load(&run_id).await?;
        if !records.is_empty() {
            debug!(run_id = %run_id, steps = records.len(), "Resuming run from journal");
        }

        let completed = records
            .into_iter()
            .map(|record| (record.name, record.output))
            .collect();

        Ok(Self {
            run_id,
            journal,
            state: Mutex::new(ExecutorState {
                completed,
                occurrences: HashMap::new(),
            }),
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Whether a step with this exact name has completed in this run
    pub fn is_completed(&self, name: &str) -> bool {
        self.lock().completed.contains_key(name)
    }

    /// Deterministic name for a step issued repeatedly in program order
    ///
    /// The first call for `base` returns `base`, later calls return
    /// `base:1`, `base:2`, ... Counters start over for every executor, so a
    /// replayed run hands out the same names in the same order.
    pub fn sequenced(&self, base: &str) -> String {
        let mut state = self.lock();
        let count = state.occurrences.entry(base.to_string()).or_insert(0);
        let name = if *count == 0 {
            base.to_string()
        } else {
            format!("{}:{}", base, count)
        };
        *count += 1;
        name
    }

    /// Run `f` as the step `name`, or return its recorded result
    pub async fn run<T, E, F, Fut>(&self, name: &str, f: F) -> Result<T, StepError>
    where
        T: Serialize + DeserializeOwned,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let recorded = self.lock().completed.get(name).cloned();
        if let Some(value) = recorded {
            debug!(run_id = %self.run_id, step = name, "Step memoized");
            STEP_EXECUTIONS.with_label_values(&["memoized"]).inc();
            return serde_json::from_value(value).map_err(|source| StepError::Decode {
                step: name.to_string(),
                source,
            });
        }

        let span = info_span!("step", run_id = %self.run_id, step = name, otel.name = name);
        let output = match f().instrument(span).await {
            Ok(output) => output,
            Err(e) => {
                let source = e.into();
                warn!(run_id = %self.run_id, step = name, error = %source, "Step failed");
                STEP_EXECUTIONS.with_label_values(&["failed"]).inc();
                return Err(StepError::Failed {
                    step: name.to_string(),
                    source,
                });
            }
        };

        let value = serde_json::to_value(&output).map_err(|source| StepError::Encode {
            step: name.to_string(),
            source,
        })?;

        self.journal
            .record(
                &self.run_id,
                StepRecord {
                    name: name.to_string(),
                    output: value.clone(),
                    completed_at: chrono::Utc::now(),
                },
            )
            .await?;
        self.lock().completed.insert(name.to_string(), value);

        debug!(run_id = %self.run_id, step = name, "Step completed");
        STEP_EXECUTIONS.with_label_values(&["executed"]).inc();
        Ok(output)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ExecutorState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for StepExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("StepExecutor")
            .field("run_id", &self.run_id)
            .field("completed", &state.completed.len())
            .finish()
    }
}
