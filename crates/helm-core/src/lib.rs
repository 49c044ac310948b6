//! # helm-core
//!
//! Foundation types for the Helm chat orchestrator.
//!
//! This crate provides the shared vocabulary that all other Helm crates
//! depend on:
//!
//! - **Branded IDs**: `SessionId` (UUID v7) and `MessageId` (per-session
//!   monotonic sequence number)
//! - **Messages**: `ChatMessage` with sender, mutable content, parent links
//!   and optional interaction prompts
//! - **Sessions**: `ChatSession` owning an append-only message log
//! - **Personas**: the fixed `Mode` enumeration, the eight-specialist
//!   taxonomy and the specialist status vocabulary
//! - **Journeys**: guided-lesson programs and per-session journey state
//! - **Markers**: interaction-pause marker scanning
//! - **Events**: `SessionEvent` broadcast to the rendering layer

#![deny(unsafe_code)]

pub mod events;
pub mod ids;
pub mod journey;
pub mod marker;
pub mod messages;
pub mod personas;
pub mod session;
pub mod text;

pub use events::SessionEvent;
pub use ids::{MessageId, SessionId};
pub use journey::{JourneyProgram, JourneyState, Lesson};
pub use marker::{MarkerMatch, find_interaction_marker};
pub use messages::{ChatMessage, InteractionPrompt, Sender, thread_to};
pub use personas::{Mode, Specialist, SpecialistStatus};
pub use session::{ChatSession, PendingDelegation};
