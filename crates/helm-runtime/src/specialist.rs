//! Specialist dispatch.
//!
//! Each delegation function call opens an isolated, single-turn conversation
//! scoped to the specialist persona's system instruction — no tools, no
//! shared history with the parent conversation. Failures never propagate:
//! a fixed error string is substituted so the outer conversation still
//! receives a function response for every call, and one specialist's
//! failure never aborts its siblings.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use futures::future::join_all;
use tracing::{debug, instrument, warn};

use helm_core::events::SessionEvent;
use helm_core::ids::SessionId;
use helm_core::personas::{Specialist, SpecialistStatus};
use helm_llm::gateway::{ChatGateway, ChatRequest, FunctionCall, Part};

use crate::emitter::EventEmitter;

/// Substituted when the provider returns no text for a dispatch.
pub const NO_RESPONSE_FALLBACK: &str = "No response from specialist.";

/// Substituted when a dispatch fails outright.
pub const DISPATCH_ERROR_RESULT: &str = "Specialist AI encountered an error.";

/// Per-session specialist status map, reset wholesale at the start of each
/// delegation-bearing turn. Concurrent dispatches each own a single key.
pub struct StatusBoard {
    session_id: SessionId,
    statuses: DashMap<Specialist, SpecialistStatus>,
    emitter: Arc<EventEmitter>,
}

impl StatusBoard {
    /// Create a board for one session.
    #[must_use]
    pub fn new(session_id: SessionId, emitter: Arc<EventEmitter>) -> Self {
        Self {
            session_id,
            statuses: DashMap::new(),
            emitter,
        }
    }

    /// Clear every entry (start of a squad-mode turn).
    pub fn reset(&self) {
        self.statuses.clear();
    }

    /// Record a status change and broadcast it.
    pub fn set(&self, specialist: Specialist, status: SpecialistStatus) {
        let _ = self.statuses.insert(specialist, status);
        let _ = self.emitter.emit(SessionEvent::SpecialistUpdate {
            session_id: self.session_id.clone(),
            specialist,
            status,
        });
    }

    /// Current status of one specialist (`Idle` when untouched this turn).
    #[must_use]
    pub fn get(&self, specialist: Specialist) -> SpecialistStatus {
        self.statuses
            .get(&specialist)
            .map_or(SpecialistStatus::Idle, |s| *s)
    }

    /// Snapshot of all non-idle entries.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<Specialist, SpecialistStatus> {
        self.statuses
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect()
    }
}

/// The outcome of one dispatch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchResult {
    /// Result text (a real result or a substituted string).
    pub text: String,
    /// Whether the dispatch failed and the text was substituted.
    pub failed: bool,
}

/// Opens isolated specialist conversations and joins concurrent rounds.
pub struct SpecialistDispatcher {
    gateway: Arc<dyn ChatGateway>,
}

impl SpecialistDispatcher {
    /// Create a dispatcher over the given gateway.
    #[must_use]
    pub fn new(gateway: Arc<dyn ChatGateway>) -> Self {
        Self { gateway }
    }

    /// Run one specialist task to completion. Never errors: failures are
    /// converted to [`DISPATCH_ERROR_RESULT`].
    #[instrument(skip(self, task), fields(specialist = %specialist))]
    pub async fn dispatch(&self, specialist: Specialist, task: &str) -> DispatchResult {
        let request = ChatRequest::new(specialist.mode().system_instruction())
            .with_parts(vec![Part::text(task)]);
        match self.gateway.complete(&request).await {
            Ok(text) if text.is_empty() => DispatchResult {
                text: NO_RESPONSE_FALLBACK.to_owned(),
                failed: false,
            },
            Ok(text) => DispatchResult {
                text,
                failed: false,
            },
            Err(e) => {
                warn!(specialist = %specialist, error = %e, "specialist dispatch failed");
                DispatchResult {
                    text: DISPATCH_ERROR_RESULT.to_owned(),
                    failed: true,
                }
            }
        }
    }

    /// Dispatch every call of a round concurrently, driving the status board
    /// through `Working` → `Complete`/`Error`. Resolves only when all calls
    /// have settled; returns one function-response part per mapped call.
    ///
    /// Calls whose function name maps to no specialist are skipped, matching
    /// the provider contract that unknown functions produce no response.
    pub async fn dispatch_calls(
        &self,
        calls: &[FunctionCall],
        board: &StatusBoard,
    ) -> Vec<Part> {
        let dispatches = calls.iter().map(|call| async move {
            let specialist = Specialist::from_function_name(&call.name)?;
            board.set(specialist, SpecialistStatus::Working);
            let task = call.task().unwrap_or_default();
            debug!(specialist = %specialist, "dispatching delegated task");
            let result = self.dispatch(specialist, task).await;
            board.set(
                specialist,
                if result.failed {
                    SpecialistStatus::Error
                } else {
                    SpecialistStatus::Complete
                },
            );
            Some(Part::function_result(&call.name, result.text))
        });
        join_all(dispatches).await.into_iter().flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::ScriptedGateway;
    use serde_json::json;

    fn board() -> StatusBoard {
        StatusBoard::new(
            SessionId::from_string("s1".into()),
            Arc::new(EventEmitter::new()),
        )
    }

    fn call(name: &str, task: &str) -> FunctionCall {
        FunctionCall {
            id: String::new(),
            name: name.into(),
            args: json!({ "task": task }),
        }
    }

    #[tokio::test]
    async fn dispatch_returns_specialist_text() {
        let gateway = ScriptedGateway::new().with_completion(Ok("refactored".into()));
        let dispatcher = SpecialistDispatcher::new(gateway.clone());

        let result = dispatcher.dispatch(Specialist::Refactor, "simplify foo()").await;
        assert_eq!(result.text, "refactored");
        assert!(!result.failed);

        // The specialist conversation is isolated: no history, no tools.
        let requests = gateway.completion_requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].history.is_empty());
        assert_eq!(requests[0].tools, helm_llm::gateway::ToolSet::None);
        assert_eq!(
            requests[0].system_instruction,
            helm_core::personas::Mode::Refactor.system_instruction()
        );
    }

    #[tokio::test]
    async fn empty_completion_substitutes_fallback() {
        let gateway = ScriptedGateway::new().with_completion(Ok(String::new()));
        let dispatcher = SpecialistDispatcher::new(gateway);

        let result = dispatcher.dispatch(Specialist::Logic, "sort").await;
        assert_eq!(result.text, NO_RESPONSE_FALLBACK);
        assert!(!result.failed);
    }

    #[tokio::test]
    async fn failure_substitutes_error_string() {
        let gateway = ScriptedGateway::new().with_completion(Err(
            helm_llm::gateway::GatewayError::Other {
                message: "down".into(),
            },
        ));
        let dispatcher = SpecialistDispatcher::new(gateway);

        let result = dispatcher.dispatch(Specialist::Security, "audit").await;
        assert_eq!(result.text, DISPATCH_ERROR_RESULT);
        assert!(result.failed);
    }

    #[tokio::test]
    async fn dispatch_calls_transitions_statuses() {
        let gateway = ScriptedGateway::new().with_completion(Ok("done".into()));
        let dispatcher = SpecialistDispatcher::new(gateway);
        let board = board();

        let parts = dispatcher
            .dispatch_calls(&[call("delegateToRefactor", "simplify foo()")], &board)
            .await;

        assert_eq!(parts.len(), 1);
        assert_eq!(board.get(Specialist::Refactor), SpecialistStatus::Complete);
        match &parts[0] {
            Part::FunctionResponse { name, response } => {
                assert_eq!(name, "delegateToRefactor");
                assert_eq!(response["result"], "done");
            }
            other => panic!("unexpected part: {other:?}"),
        }
    }

    #[tokio::test]
    async fn one_failure_never_aborts_siblings() {
        let gateway = ScriptedGateway::new()
            .with_completion(Err(helm_llm::gateway::GatewayError::Other {
                message: "boom".into(),
            }))
            .with_completion(Ok("fine".into()));
        let dispatcher = SpecialistDispatcher::new(gateway);
        let board = board();

        let parts = dispatcher
            .dispatch_calls(
                &[
                    call("delegateToDebugger", "find bug"),
                    call("delegateToDocumenter", "write docs"),
                ],
                &board,
            )
            .await;

        // Every call still got a function response.
        assert_eq!(parts.len(), 2);
        let statuses = board.snapshot();
        // One Error, one Complete — which call failed depends on completion
        // order, but every dispatch settled.
        assert_eq!(statuses.len(), 2);
        assert!(statuses
            .values()
            .all(|s| matches!(s, SpecialistStatus::Complete | SpecialistStatus::Error)));
    }

    #[tokio::test]
    async fn unknown_function_name_is_skipped() {
        let gateway = ScriptedGateway::new();
        let dispatcher = SpecialistDispatcher::new(gateway);
        let board = board();

        let parts = dispatcher
            .dispatch_calls(&[call("delegateToNobody", "x")], &board)
            .await;
        assert!(parts.is_empty());
        assert!(board.snapshot().is_empty());
    }

    #[tokio::test]
    async fn status_events_are_broadcast() {
        let emitter = Arc::new(EventEmitter::new());
        let mut rx = emitter.subscribe();
        let board = StatusBoard::new(SessionId::from_string("s1".into()), emitter);

        board.set(Specialist::Optimizer, SpecialistStatus::Working);
        board.set(Specialist::Optimizer, SpecialistStatus::Complete);

        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let SessionEvent::SpecialistUpdate { status, .. } = event {
                seen.push(status);
            }
        }
        assert_eq!(
            seen,
            vec![SpecialistStatus::Working, SpecialistStatus::Complete]
        );
    }

    #[test]
    fn reset_clears_the_board() {
        let board = board();
        board.set(Specialist::Architect, SpecialistStatus::Complete);
        board.reset();
        assert!(board.snapshot().is_empty());
        assert_eq!(board.get(Specialist::Architect), SpecialistStatus::Idle);
    }
}
