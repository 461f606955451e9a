//! Hook run after every coding-agent turn

use tracing::info;

use crate::state::{extract_summary, AgentState};

/// Record the summary if `text` carries a complete termination marker
///
/// Returns whether the state now holds a summary written by this call.
pub fn on_response(text: &str, state: &mut AgentState) -> bool {
    match extract_summary(text) {
        Some(summary) => {
            let recorded = state.record_summary(summary);
            if recorded {
                info!(summary_len = summary.len(), "Termination marker seen");
            }
            recorded
        }
        None => false,
    }
}
