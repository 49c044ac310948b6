//! Replay-history construction.
//!
//! Gateway handles are never persisted; on load the provider history is
//! rebuilt from the stored message log. The leading synthetic welcome
//! message and any empty-text turns are dropped — neither was ever part of
//! the provider's view of the conversation.

use helm_core::messages::{ChatMessage, Sender};

use crate::gateway::{Role, Turn};

/// Build provider-native history from a session's message log.
#[must_use]
pub fn replay_history(messages: &[ChatMessage]) -> Vec<Turn> {
    let mut log = messages;
    if let Some(first) = log.first() {
        if first.sender == Sender::Model && first.content.starts_with("Welcome") {
            log = &log[1..];
        }
    }
    log.iter()
        .filter(|m| !m.content.is_empty())
        .map(|m| {
            let role = match m.sender {
                Sender::User => Role::User,
                Sender::Model => Role::Model,
            };
            Turn::text(role, m.content.clone())
        })
        .collect()
}
