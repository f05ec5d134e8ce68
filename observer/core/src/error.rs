//! Reconciliation Errors
//!
//! Every failure the core can observe is recoverable: the offending event is
//! dropped, a warning is logged, and the prior state is kept. Nothing here is
//! ever surfaced to the observer as a dialog.

use thiserror::Error;

use crate::agent::AgentId;
use crate::binder::Slot;

/// Errors raised while applying an inbound event
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A render instruction addressed a slot with no bound target
    #[error("no render target bound for {0}")]
    MissingTarget(Slot),

    /// An event arrived with an absent or wrong-typed field
    #[error("malformed {event} payload: {reason}")]
    MalformedPayload {
        /// Wire name of the event
        event: String,
        /// What was wrong with it
        reason: String,
    },

    /// The agent has no built pipeline yet
    #[error("agent {0} has no pipeline")]
    NoPipeline(AgentId),

    /// A stage name that is not part of the agent's pipeline
    #[error("stage {stage:?} is not part of agent {agent}'s pipeline")]
    UnknownStage {
        /// Agent whose pipeline was addressed
        agent: AgentId,
        /// The stage that was announced
        stage: String,
    },

    /// A stage update without a stage name
    #[error("empty stage name for agent {0}")]
    EmptyStage(AgentId),

    /// An event name with no handler
    #[error("unknown event {0:?}")]
    UnknownEvent(String),
}

impl ReconcileError {
    /// Build a malformed-payload error from a serde failure
    pub fn malformed(event: &str, err: impl std::fmt::Display) -> Self {
        Self::MalformedPayload {
            event: event.to_string(),
            reason: err.to_string(),
        }
    }

    /// Whether this error only concerns an event nobody subscribes to
    #[must_use]
    pub fn is_unknown_event(&self) -> bool {
        matches!(self, Self::UnknownEvent(_))
    }
}
