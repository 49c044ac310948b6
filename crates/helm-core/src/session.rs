//! Conversation sessions.
//!
//! A session owns an append-only message log plus the flags that gate the
//! per-session turn state machine. The provider-side conversation handle is
//! deliberately absent here: it is rebuilt from the log on load and owned by
//! the runtime for exactly one session at a time.

use serde_json::Value;

use crate::ids::{MessageId, SessionId};
use crate::journey::JourneyState;
use crate::messages::{ChatMessage, Sender};
use crate::personas::Mode;

/// A delegation function call observed before an interaction pause ended the
/// turn. Retained so the call can still be dispatched when the paused turn
/// resumes.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingDelegation {
    /// Provider-assigned call identifier.
    pub call_id: String,
    /// Delegation function name.
    pub name: String,
    /// Raw argument payload of the call.
    pub args: Value,
}

/// One conversation session.
#[derive(Clone, Debug)]
pub struct ChatSession {
    /// Unique handle.
    pub id: SessionId,
    /// Display name (mode name, or the journey program title).
    pub name: String,
    /// Persona mode.
    pub mode: Mode,
    /// Ordered message log. Append-only except for in-place content mutation
    /// of the trailing model message during streaming.
    pub messages: Vec<ChatMessage>,
    /// Self-driving flag.
    pub driving: bool,
    /// Goal text frozen when driving started.
    pub goal: Option<String>,
    /// Guided-lesson state, for journey sessions.
    pub journey: Option<JourneyState>,
    /// Set by an interaction pause; blocks further sends until answered.
    pub awaiting_answer: bool,
    /// Delegation calls deferred by an interaction pause.
    pub pending_delegations: Vec<PendingDelegation>,
    next_seq: u64,
}

impl ChatSession {
    /// Create a session with the mode's synthetic welcome message.
    #[must_use]
    pub fn new(mode: Mode) -> Self {
        let mut session = Self::empty(mode, mode.display_name().to_owned());
        let id = session.allocate_id();
        session.messages.push(ChatMessage::model(
            id,
            format!(
                "Welcome to your new **{}** session! How can I help?",
                mode.display_name()
            ),
        ));
        session
    }

    /// Create a session with no messages (journeys open with a lesson prompt
    /// instead of a welcome).
    #[must_use]
    pub fn empty(mode: Mode, name: String) -> Self {
        Self {
            id: SessionId::new(),
            name,
            mode,
            messages: Vec::new(),
            driving: false,
            goal: None,
            journey: None,
            awaiting_answer: false,
            pending_delegations: Vec::new(),
            next_seq: 0,
        }
    }

    /// Rebuild a session from persisted parts. `messages` must already carry
    /// their sequence ids; the allocator continues after the highest one.
    #[must_use]
    pub fn restore(
        id: SessionId,
        name: String,
        mode: Mode,
        messages: Vec<ChatMessage>,
        driving: bool,
        goal: Option<String>,
        journey: Option<JourneyState>,
    ) -> Self {
        let next_seq = messages.iter().map(|m| m.id.value() + 1).max().unwrap_or(0);
        let awaiting_answer = messages.last().is_some_and(ChatMessage::awaits_answer);
        Self {
            id,
            name,
            mode,
            messages,
            driving,
            goal,
            journey,
            awaiting_answer,
            pending_delegations: Vec::new(),
            next_seq,
        }
    }

    /// Allocate the next message identity.
    pub fn allocate_id(&mut self) -> MessageId {
        let id = MessageId::new(self.next_seq);
        self.next_seq += 1;
        id
    }

    /// Append a user message and the empty trailing model message that a new
    /// turn streams into. Returns `(user_id, model_id)`.
    pub fn open_turn(
        &mut self,
        text: impl Into<String>,
        attached: Vec<String>,
        auto: bool,
    ) -> (MessageId, MessageId) {
        let parent = self.messages.last().map(|m| m.id);
        let user_id = self.allocate_id();
        let mut user = ChatMessage::user(user_id, text)
            .with_parent(parent)
            .with_attachments(attached);
        if auto {
            user = user.auto_prompt();
        }
        self.messages.push(user);

        let model_id = self.allocate_id();
        self.messages
            .push(ChatMessage::model_placeholder(model_id, user_id));
        (user_id, model_id)
    }

    /// The trailing message, if any.
    #[must_use]
    pub fn last_message(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// Mutable access to the trailing model message of the current turn.
    pub fn trailing_model_mut(&mut self) -> Option<&mut ChatMessage> {
        self.messages
            .last_mut()
            .filter(|m| m.sender == Sender::Model)
    }

    /// Find a message by identity.
    pub fn find_mut(&mut self, id: MessageId) -> Option<&mut ChatMessage> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    /// Content of the most recent model message, if any.
    #[must_use]
    pub fn last_model_content(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.sender == Sender::Model)
            .map(|m| m.content.as_str())
    }

    /// Whether the trailing message is a completed, non-empty model message.
    /// The driver only re-arms in this state.
    #[must_use]
    pub fn turn_settled(&self) -> bool {
        self.messages
            .last()
            .is_some_and(|m| m.sender == Sender::Model && !m.content.is_empty())
            && !self.awaiting_answer
    }
}
