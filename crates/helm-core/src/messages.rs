//! Conversation turn messages.
//!
//! Model message content accumulates in place while a turn streams; every
//! other field is immutable after creation except `interaction`, whose
//! `submitted_answer` is set exactly once when the user responds to a pause.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::MessageId;

/// Who produced a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    /// Typed (or synthesized on behalf of) the human.
    User,
    /// Produced by the model.
    Model,
}

/// A blocking question raised mid-turn by the model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionPrompt {
    /// The literal prompt text extracted from the pause marker.
    pub prompt: String,
    /// The user's answer. Set once on submission, never cleared.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_answer: Option<String>,
}

impl InteractionPrompt {
    /// A fresh, unanswered prompt.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            submitted_answer: None,
        }
    }
}

/// One message in a session's log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Per-session sequence identity.
    pub id: MessageId,
    /// Who produced the message.
    pub sender: Sender,
    /// Text content. For model messages this accumulates during a turn and
    /// is replaced wholesale on stream failure.
    pub content: String,
    /// Creation instant (display and snapshot fidelity only, not identity).
    pub timestamp: DateTime<Utc>,
    /// Back-reference to the message this one replies to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<MessageId>,
    /// Filenames attached to a user message (content not retained once sent).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attached_files: Vec<String>,
    /// Synthesized by the system rather than typed by a human.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub auto: bool,
    /// Present exactly when the model paused this turn awaiting an answer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interaction: Option<InteractionPrompt>,
}

impl ChatMessage {
    /// A user message.
    #[must_use]
    pub fn user(id: MessageId, content: impl Into<String>) -> Self {
        Self {
            id,
            sender: Sender::User,
            content: content.into(),
            timestamp: Utc::now(),
            parent: None,
            attached_files: Vec::new(),
            auto: false,
            interaction: None,
        }
    }

    /// A completed model message (welcome text, restored snapshots).
    #[must_use]
    pub fn model(id: MessageId, content: impl Into<String>) -> Self {
        Self {
            id,
            sender: Sender::Model,
            content: content.into(),
            timestamp: Utc::now(),
            parent: None,
            attached_files: Vec::new(),
            auto: false,
            interaction: None,
        }
    }

    /// An empty model message opened at the start of a turn, to be appended
    /// to as the stream progresses.
    #[must_use]
    pub fn model_placeholder(id: MessageId, parent: MessageId) -> Self {
        let mut msg = Self::model(id, "");
        msg.parent = Some(parent);
        msg
    }

    /// Set the parent back-reference.
    #[must_use]
    pub fn with_parent(mut self, parent: Option<MessageId>) -> Self {
        self.parent = parent;
        self
    }

    /// Record attached filenames.
    #[must_use]
    pub fn with_attachments(mut self, names: Vec<String>) -> Self {
        self.attached_files = names;
        self
    }

    /// Mark as synthesized by the system.
    #[must_use]
    pub fn auto_prompt(mut self) -> Self {
        self.auto = true;
        self
    }

    /// Whether this message still awaits an interaction answer.
    #[must_use]
    pub fn awaits_answer(&self) -> bool {
        self.interaction
            .as_ref()
            .is_some_and(|i| i.submitted_answer.is_none())
    }
}

/// Reconstruct the reply chain ending at `id` by walking parent links.
///
/// Returns the chain root-first. Empty when `id` is not in `messages`.
/// A dangling or cyclic parent link terminates the walk rather than erroring.
#[must_use]
pub fn thread_to(messages: &[ChatMessage], id: MessageId) -> Vec<&ChatMessage> {
    let mut thread = Vec::new();
    let mut current = messages.iter().find(|m| m.id == id);
    while let Some(msg) = current {
        thread.push(msg);
        // Guard against a cycle introduced by a corrupted snapshot.
        if thread.len() > messages.len() {
            break;
        }
        current = msg
            .parent
            .and_then(|pid| messages.iter().find(|m| m.id == pid));
    }
    thread.reverse();
    thread
}
