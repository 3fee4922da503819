//! Error taxonomy for the deep research orchestrator.
//!
//! Every component-level error (`ProviderTransportError`, `PersistenceError`,
//! …) eventually collapses into [`ResearchError`] at the orchestrator
//! boundary, matching the closed taxonomy in the design's error-handling
//! section. Component crates may keep their own `thiserror` error type and
//! convert with `From`; they should never let an unmodeled panic escape.

use thiserror::Error;

/// Closed error taxonomy for the orchestrator and its collaborators.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ResearchError {
    /// Malformed request or out-of-range parameter. Reported locally, never wrapped.
    #[error("invalid input: {0}")]
    InputError(String),

    /// Network/timeout/5xx/429 failure after the retry budget was exhausted.
    #[error("provider transport error ({capability}): {message}")]
    ProviderTransportError {
        /// Which gateway capability failed (`complete-text` or `search-web`).
        capability: String,
        /// Human-readable failure detail.
        message: String,
    },

    /// Structured output could not be parsed even after a repair attempt.
    #[error("provider returned an unparseable shape: {0}")]
    ProviderShapeError(String),

    /// Not a real error: signals the orchestrator to move to the Writing
    /// state early because the remaining budget cannot fund another search.
    #[error("budget exhausted")]
    BudgetExhausted,

    /// The task-level deadline elapsed; triggers cancellation.
    #[error("task deadline exceeded")]
    DeadlineExceeded,

    /// The task was cancelled by an external caller.
    #[error("task cancelled")]
    Cancelled,

    /// The durable persistence backend became unavailable mid-task.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// Anything else unexpected.
    #[error("internal error: {0}")]
    InternalError(String),
}

impl ResearchError {
    /// Short machine-readable reason string, used in progress events and
    /// the task record's `details` field (e.g. `failed(reason)`).
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        match self {
            ResearchError::InputError(_) => "input_error",
            ResearchError::ProviderTransportError { .. } => "provider_transport_error",
            ResearchError::ProviderShapeError(_) => "provider_shape_error",
            ResearchError::BudgetExhausted => "budget_exhausted",
            ResearchError::DeadlineExceeded => "deadline_exceeded",
            ResearchError::Cancelled => "cancelled",
            ResearchError::PersistenceError(_) => "persistence_error",
            ResearchError::InternalError(_) => "internal_error",
        }
    }

    /// Whether this error is terminal for the owning task (all except
    /// `BudgetExhausted`, which is a convergence signal, not a failure).
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ResearchError::BudgetExhausted)
    }
}

/// Result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, ResearchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_codes_are_stable() {
        assert_eq!(ResearchError::Cancelled.reason_code(), "cancelled");
        assert_eq!(
            ResearchError::DeadlineExceeded.reason_code(),
            "deadline_exceeded"
        );
        assert_eq!(
            ResearchError::InputError("bad".into()).reason_code(),
            "input_error"
        );
    }

    #[test]
    fn budget_exhausted_is_not_terminal() {
        assert!(!ResearchError::BudgetExhausted.is_terminal());
        assert!(ResearchError::Cancelled.is_terminal());
    }

    #[test]
    fn display_messages_include_detail() {
        let err = ResearchError::ProviderTransportError {
            capability: "search-web".into(),
            message: "timeout".into(),
        };
        assert!(err.to_string().contains("search-web"));
        assert!(err.to_string().contains("timeout"));
    }
}
