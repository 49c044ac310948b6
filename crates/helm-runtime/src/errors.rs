//! Runtime error types.

use helm_core::ids::SessionId;
use helm_llm::gateway::GatewayError;

/// Errors surfaced by the orchestration runtime.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Gateway error (transport, auth, rate limit, provider API).
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Session not found.
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    /// Session already has a turn in flight.
    #[error("Session busy: {0}")]
    SessionBusy(SessionId),

    /// Session is paused awaiting an interaction answer.
    #[error("Session awaiting answer: {0}")]
    AwaitingAnswer(SessionId),

    /// Maximum concurrent session count reached; creation refused.
    #[error("Session limit reached ({0})")]
    SessionLimit(usize),

    /// Driving mode requires a goal before it can start.
    #[error("Driving mode requires an initial goal")]
    GoalRequired,

    /// Internal / unexpected error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RuntimeError {
    /// Whether the caller can sensibly retry.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Gateway(e) => e.is_retryable(),
            Self::SessionBusy(_) | Self::AwaitingAnswer(_) | Self::GoalRequired => true,
            Self::SessionNotFound(_) | Self::SessionLimit(_) | Self::Internal(_) => false,
        }
    }

    /// Error category string for event emission and logs.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Gateway(_) => "gateway",
            Self::SessionNotFound(_) => "session_not_found",
            Self::SessionBusy(_) => "session_busy",
            Self::AwaitingAnswer(_) => "awaiting_answer",
            Self::SessionLimit(_) => "session_limit",
            Self::GoalRequired => "goal_required",
            Self::Internal(_) => "internal",
        }
    }
}
