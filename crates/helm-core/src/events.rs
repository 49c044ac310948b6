//! Session lifecycle events broadcast to the rendering layer.
//!
//! Purely in-memory: the runtime's emitter fans these out on a broadcast
//! channel and the UI renders the session log from them. They are never
//! persisted.

use serde::{Deserialize, Serialize};

use crate::ids::{MessageId, SessionId};
use crate::personas::{Specialist, SpecialistStatus};

/// An observable change inside one session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A user message and its trailing model placeholder were appended.
    TurnOpened {
        /// Owning session.
        session_id: SessionId,
        /// The appended user message.
        user_id: MessageId,
        /// The open trailing model message.
        model_id: MessageId,
    },

    /// Text was appended to the open trailing model message.
    MessageDelta {
        /// Owning session.
        session_id: SessionId,
        /// The open trailing model message.
        message_id: MessageId,
        /// The appended text fragment.
        delta: String,
    },

    /// The model paused the turn awaiting a required answer.
    InteractionRequested {
        /// Owning session.
        session_id: SessionId,
        /// The message carrying the interaction prompt.
        message_id: MessageId,
        /// The extracted prompt text.
        prompt: String,
    },

    /// A specialist's status changed during a delegation round.
    SpecialistUpdate {
        /// Owning session.
        session_id: SessionId,
        /// The specialist whose status changed.
        specialist: Specialist,
        /// The new status.
        status: SpecialistStatus,
    },

    /// The turn finished normally.
    TurnCompleted {
        /// Owning session.
        session_id: SessionId,
    },

    /// The turn failed; the trailing model message now carries the apology.
    TurnFailed {
        /// Owning session.
        session_id: SessionId,
        /// Error description (for logs and status surfaces, not the log).
        error: String,
    },

    /// Driving mode switched off (user request, empty meta-completion, or
    /// meta-conversation failure).
    DrivingStopped {
        /// Owning session.
        session_id: SessionId,
    },
}

impl SessionEvent {
    /// The session this event belongs to.
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        match self {
            Self::TurnOpened { session_id, .. }
            | Self::MessageDelta { session_id, .. }
            | Self::InteractionRequested { session_id, .. }
            | Self::SpecialistUpdate { session_id, .. }
            | Self::TurnCompleted { session_id }
            | Self::TurnFailed { session_id, .. }
            | Self::DrivingStopped { session_id } => session_id,
        }
    }

    /// Snake-case tag, mirroring the serde representation.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::TurnOpened { .. } => "turn_opened",
            Self::MessageDelta { .. } => "message_delta",
            Self::InteractionRequested { .. } => "interaction_requested",
            Self::SpecialistUpdate { .. } => "specialist_update",
            Self::TurnCompleted { .. } => "turn_completed",
            Self::TurnFailed { .. } => "turn_failed",
            Self::DrivingStopped { .. } => "driving_stopped",
        }
    }
}
