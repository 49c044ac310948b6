//! Turn execution: the round loop and per-round stream processing.
//!
//! A *turn* is one full user-to-final-model-output exchange; a *round* is
//! one request/stream-response cycle within it. Delegation rounds feed the
//! specialists' combined results back into the same turn; an interaction
//! pause terminates the turn early.

pub mod runner;
pub mod stream_processor;

pub use runner::{TurnOutcome, run_turn};
pub use stream_processor::{RoundOutcome, TurnEvent, process_round};
