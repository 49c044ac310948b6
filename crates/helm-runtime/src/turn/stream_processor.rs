//! Round stream processing — fragments in, normalized turn events out.
//!
//! Fragments are forwarded as [`TurnEvent::TextChunk`]s the moment they
//! arrive; only a pause-marker match withholds text. Marker detection runs
//! against a cumulative round buffer so a marker split across fragment
//! boundaries still fires. An emitted-bytes watermark guarantees that no
//! byte is forwarded twice and that on a match only the not-yet-emitted
//! prefix strictly before the marker start is flushed. Text forwarded
//! before a late match became visible is never retracted.

use futures::StreamExt;

use helm_core::marker::find_interaction_marker;
use helm_llm::gateway::{FunctionCall, GatewayEvent, GatewayEventStream, GatewayResult};

/// Normalized output of the orchestrator, consumed in order by the caller.
///
/// An `Interaction` event is always the last event of a turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnEvent {
    /// A text chunk to append to the open model message.
    TextChunk(String),
    /// The model paused the turn awaiting a required answer.
    Interaction {
        /// The extracted prompt text.
        prompt: String,
    },
}

/// What one round produced.
#[derive(Debug, Default)]
pub struct RoundOutcome {
    /// Round text, for the model-side history of a follow-up round. Cut at
    /// the marker start when the round paused.
    pub text: String,
    /// Function calls collected across the round.
    pub calls: Vec<FunctionCall>,
    /// The pause prompt, when a marker terminated the round (and the turn).
    pub paused: Option<String>,
}

/// Consume one round's stream, forwarding normalized events to `on_event`.
pub async fn process_round<F>(
    mut stream: GatewayEventStream,
    on_event: &mut F,
) -> GatewayResult<RoundOutcome>
where
    F: FnMut(TurnEvent),
{
    let mut buffer = String::with_capacity(4096);
    let mut emitted = 0usize;
    let mut calls: Vec<FunctionCall> = Vec::new();

    while let Some(event) = stream.next().await {
        match event? {
            GatewayEvent::TextFragment { text } => {
                buffer.push_str(&text);
                if let Some(marker) = find_interaction_marker(&buffer) {
                    if marker.start > emitted {
                        on_event(TurnEvent::TextChunk(buffer[emitted..marker.start].to_owned()));
                    }
                    on_event(TurnEvent::Interaction {
                        prompt: marker.prompt.clone(),
                    });
                    return Ok(RoundOutcome {
                        text: buffer[..marker.start].to_owned(),
                        calls,
                        paused: Some(marker.prompt),
                    });
                }
                on_event(TurnEvent::TextChunk(text));
                emitted = buffer.len();
            }
            GatewayEvent::FunctionCalls { calls: batch } => {
                calls.extend(batch);
            }
        }
    }

    Ok(RoundOutcome {
        text: buffer,
        calls,
        paused: None,
    })
}
