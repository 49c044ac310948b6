//! Snapshot wire types and conversions to/from runtime sessions.
//!
//! Wire names are camelCase and timestamps are ISO-8601, so snapshots
//! written by earlier front-end builds stay loadable. Message identity and
//! parent links are sequence numbers (`seq`/`parentSeq`); the timestamp is
//! carried for display fidelity only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use helm_core::ids::{MessageId, SessionId};
use helm_core::journey::JourneyState;
use helm_core::messages::{ChatMessage, InteractionPrompt, Sender};
use helm_core::personas::Mode;
use helm_core::session::ChatSession;

/// One persisted message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSnapshot {
    /// Sequence identity within the session.
    pub seq: u64,
    /// Who produced the message.
    pub sender: Sender,
    /// Text content.
    pub content: String,
    /// Creation instant.
    pub timestamp: DateTime<Utc>,
    /// Parent message sequence number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_seq: Option<u64>,
    /// Attached filenames.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attached_files: Vec<String>,
    /// Synthesized by the system.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_auto_prompt: bool,
    /// Interaction prompt, when the message paused its turn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interaction_prompt: Option<InteractionPrompt>,
}

/// One persisted session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Session handle.
    pub id: String,
    /// Persona mode.
    pub mode: Mode,
    /// Display name.
    pub name: String,
    /// Driving flag.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_driving: bool,
    /// Goal frozen when driving started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_goal: Option<String>,
    /// Journey progress.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub journey: Option<JourneyState>,
    /// Ordered message log.
    pub messages: Vec<MessageSnapshot>,
}

impl From<&ChatMessage> for MessageSnapshot {
    fn from(msg: &ChatMessage) -> Self {
        Self {
            seq: msg.id.value(),
            sender: msg.sender,
            content: msg.content.clone(),
            timestamp: msg.timestamp,
            parent_seq: msg.parent.map(MessageId::value),
            attached_files: msg.attached_files.clone(),
            is_auto_prompt: msg.auto,
            interaction_prompt: msg.interaction.clone(),
        }
    }
}

impl From<MessageSnapshot> for ChatMessage {
    fn from(snap: MessageSnapshot) -> Self {
        Self {
            id: MessageId::new(snap.seq),
            sender: snap.sender,
            content: snap.content,
            timestamp: snap.timestamp,
            parent: snap.parent_seq.map(MessageId::new),
            attached_files: snap.attached_files,
            auto: snap.is_auto_prompt,
            interaction: snap.interaction_prompt,
        }
    }
}

impl From<&ChatSession> for SessionSnapshot {
    fn from(session: &ChatSession) -> Self {
        Self {
            id: session.id.to_string(),
            mode: session.mode,
            name: session.name.clone(),
            is_driving: session.driving,
            initial_goal: session.goal.clone(),
            journey: session.journey.clone(),
            messages: session.messages.iter().map(MessageSnapshot::from).collect(),
        }
    }
}

impl From<SessionSnapshot> for ChatSession {
    fn from(snap: SessionSnapshot) -> Self {
        let messages = snap.messages.into_iter().map(ChatMessage::from).collect();
        Self::restore(
            SessionId::from_string(snap.id),
            snap.name,
            snap.mode,
            messages,
            snap.is_driving,
            snap.initial_goal,
            snap.journey,
        )
    }
}
