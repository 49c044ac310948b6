//! Turn runner — the round loop.
//!
//! Submits the initial message, processes the stream, and while the model
//! keeps requesting delegations, dispatches them concurrently and submits
//! the combined results as the next round of the same turn. A pause marker
//! terminates the whole turn; calls collected before the pause are returned
//! undispatched for the session to resume later.

use std::sync::Arc;

use tracing::{debug, instrument};

use helm_llm::gateway::{ChatGateway, ChatRequest, FunctionCall, Part, Role, Turn};

use crate::errors::RuntimeError;
use crate::specialist::{SpecialistDispatcher, StatusBoard};
use crate::turn::stream_processor::{TurnEvent, process_round};

/// How a turn ended.
#[derive(Debug, Default)]
pub struct TurnOutcome {
    /// The pause prompt when the turn ended awaiting an answer.
    pub paused: Option<String>,
    /// Calls observed before the pause, left undispatched.
    pub pending_calls: Vec<FunctionCall>,
    /// Number of rounds run.
    pub rounds: u32,
}

/// Run one turn to completion (or to an interaction pause).
#[instrument(skip_all, fields(model = gateway.model()))]
pub async fn run_turn<F>(
    gateway: &Arc<dyn ChatGateway>,
    dispatcher: &SpecialistDispatcher,
    board: &StatusBoard,
    mut request: ChatRequest,
    on_event: &mut F,
) -> Result<TurnOutcome, RuntimeError>
where
    F: FnMut(TurnEvent),
{
    let mut rounds = 0u32;

    loop {
        rounds += 1;
        let stream = gateway.stream(&request).await?;
        let outcome = process_round(stream, on_event).await?;

        if let Some(prompt) = outcome.paused {
            debug!(rounds, "turn paused awaiting answer");
            return Ok(TurnOutcome {
                paused: Some(prompt),
                pending_calls: outcome.calls,
                rounds,
            });
        }

        if outcome.calls.is_empty() {
            debug!(rounds, "turn completed");
            return Ok(TurnOutcome {
                paused: None,
                pending_calls: Vec::new(),
                rounds,
            });
        }

        // All dispatches resolve before anything is submitted — partial
        // submission is not possible.
        let responses = dispatcher.dispatch_calls(&outcome.calls, board).await;
        if responses.is_empty() {
            debug!(rounds, "no mapped delegations; turn ends");
            return Ok(TurnOutcome {
                paused: None,
                pending_calls: Vec::new(),
                rounds,
            });
        }

        // Fold this round into the history: the submitted parts as the user
        // turn, then the model's text and calls, then continue with the
        // combined function responses.
        let submitted = std::mem::take(&mut request.parts);
        request.history.push(Turn {
            role: Role::User,
            parts: submitted,
        });
        let mut model_parts = Vec::with_capacity(outcome.calls.len() + 1);
        if !outcome.text.is_empty() {
            model_parts.push(Part::text(outcome.text));
        }
        for call in outcome.calls {
            model_parts.push(Part::FunctionCall {
                id: call.id,
                name: call.name,
                args: call.args,
            });
        }
        request.history.push(Turn {
            role: Role::Model,
            parts: model_parts,
        });
        request.parts = responses;
    }
}
