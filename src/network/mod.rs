//! Agent network - the coding agent, its router and the follow-up generators
//!
//! - `agent` - a named persona bound to a model
//! - `router` - iteration loop, routing decision and termination
//! - `lifecycle` - post-turn hook that records the completion summary
//! - `generators` - title and response agents run after termination
//! - `prompts` - system prompts

pub mod agent;
pub mod generators;
pub mod lifecycle;
pub mod prompts;
pub mod router;

pub use agent::Agent;
pub use generators::{GeneratedCopy, SecondaryGenerators, FRAGMENT_TITLE_GENERATOR, RESPONSE_GENERATOR};
pub use lifecycle::on_response;
pub use prompts::{CODING_AGENT_PROMPT, FRAGMENT_TITLE_PROMPT, RESPONSE_PROMPT};
pub use router::{route, AgentNetwork, NetworkRun, RouterState, TerminationReason};

/// Name of the coding agent, also the base name of its model-call steps
pub const CODE_AGENT: &str = "code-agent";
