//! Session controller — multi-session coordinator.
//!
//! Owns the capped session registry, enforces strict per-session turn
//! serialization, translates send actions into turns, and applies turn
//! events to the owning session's message log. Failures inside one
//! session's turn never affect other sessions, and mutation of a closed
//! session is a silent no-op.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use helm_core::events::SessionEvent;
use helm_core::ids::{MessageId, SessionId};
use helm_core::journey::{JourneyProgram, JourneyState};
use helm_core::messages::{ChatMessage, InteractionPrompt};
use helm_core::personas::{Mode, Specialist, SpecialistStatus};
use helm_core::session::{ChatSession, PendingDelegation};
use helm_llm::attachments::{AttachedFile, build_submission};
use helm_llm::gateway::{ChatGateway, ChatRequest, FunctionCall, ToolSet};
use helm_llm::history::replay_history;

use crate::emitter::EventEmitter;
use crate::errors::RuntimeError;
use crate::journey::{self, Direction};
use crate::specialist::{SpecialistDispatcher, StatusBoard};
use crate::turn::{TurnEvent, run_turn};

/// Substituted into the trailing model message when a turn fails.
pub const APOLOGY: &str = "Sorry, I encountered an error. Please try again.";

/// Controller tunables.
#[derive(Clone, Debug)]
pub struct ControllerConfig {
    /// Maximum concurrent sessions; creation beyond this is refused.
    pub max_sessions: usize,
    /// Delay before a driving step fires after a completed model message.
    pub drive_delay: Duration,
    /// Byte budget for the last-output excerpt in the driver meta-prompt.
    pub drive_excerpt_bytes: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_sessions: 6,
            drive_delay: Duration::from_secs(2),
            drive_excerpt_bytes: 300,
        }
    }
}

/// Listing entry for the session dock.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionOverview {
    /// Session handle.
    pub id: SessionId,
    /// Display name.
    pub name: String,
    /// Persona mode.
    pub mode: Mode,
    /// Driving flag.
    pub driving: bool,
    /// Whether the session is blocked on an interaction answer.
    pub awaiting_answer: bool,
}

struct SessionSlot {
    session: Mutex<ChatSession>,
    board: Arc<StatusBoard>,
}

/// Multi-session controller.
pub struct SessionController {
    gateway: Arc<dyn ChatGateway>,
    dispatcher: SpecialistDispatcher,
    emitter: Arc<EventEmitter>,
    sessions: DashMap<SessionId, Arc<SessionSlot>>,
    /// Creation order, for the dock listing and active fallback.
    order: Mutex<Vec<SessionId>>,
    active: Mutex<Option<SessionId>>,
    /// Sessions with a turn in flight.
    active_turns: Mutex<HashSet<SessionId>>,
    /// Files staged for the next non-automatic send.
    staged: Mutex<Vec<AttachedFile>>,
    config: ControllerConfig,
}

/// RAII busy marker — released when the turn leaves flight.
struct TurnGuard {
    controller: Arc<SessionController>,
    id: SessionId,
    slot: Arc<SessionSlot>,
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        let _ = self.controller.active_turns.lock().remove(&self.id);
    }
}

impl SessionController {
    /// Create a controller over the given gateway.
    #[must_use]
    pub fn new(gateway: Arc<dyn ChatGateway>, config: ControllerConfig) -> Arc<Self> {
        let dispatcher = SpecialistDispatcher::new(Arc::clone(&gateway));
        Arc::new(Self {
            gateway,
            dispatcher,
            emitter: Arc::new(EventEmitter::new()),
            sessions: DashMap::new(),
            order: Mutex::new(Vec::new()),
            active: Mutex::new(None),
            active_turns: Mutex::new(HashSet::new()),
            staged: Mutex::new(Vec::new()),
            config,
        })
    }

    /// The event emitter.
    #[must_use]
    pub fn emitter(&self) -> &Arc<EventEmitter> {
        &self.emitter
    }

    /// Subscribe to session events.
    #[must_use]
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SessionEvent> {
        self.emitter.subscribe()
    }

    /// Current session count.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Whether another session can be created.
    #[must_use]
    pub fn can_accept_session(&self) -> bool {
        self.sessions.len() < self.config.max_sessions
    }

    // ── Lifecycle ──────────────────────────────────────────────────────

    /// Create a session in `mode` (with its welcome message) and make it
    /// active. Refused at the cap, leaving the registry unchanged.
    #[instrument(skip(self))]
    pub fn create_session(&self, mode: Mode) -> Result<SessionId, RuntimeError> {
        if !self.can_accept_session() {
            return Err(RuntimeError::SessionLimit(self.config.max_sessions));
        }
        let id = self.insert_session(ChatSession::new(mode));
        *self.active.lock() = Some(id.clone());
        info!(session_id = %id, mode = %mode, "session created");
        Ok(id)
    }

    /// Create a journey session and send its opening lesson prompt.
    pub async fn start_journey(
        self: &Arc<Self>,
        program: JourneyProgram,
    ) -> Result<SessionId, RuntimeError> {
        if !self.can_accept_session() {
            return Err(RuntimeError::SessionLimit(self.config.max_sessions));
        }
        let Some(prompt) = journey::opening_prompt(&program) else {
            return Err(RuntimeError::Internal("journey program has no lessons".into()));
        };
        let mut session = ChatSession::empty(Mode::Journey, program.title.clone());
        session.journey = Some(JourneyState::new(program));
        let id = self.insert_session(session);
        *self.active.lock() = Some(id.clone());
        self.send_message(&id, &prompt, true).await?;
        Ok(id)
    }

    /// Close a session. An in-flight turn is not cancelled; its later
    /// mutations become silent no-ops.
    pub fn close_session(&self, id: &SessionId) {
        let _ = self.sessions.remove(id);
        let mut order = self.order.lock();
        order.retain(|s| s != id);
        let mut active = self.active.lock();
        if active.as_ref() == Some(id) {
            *active = order.first().cloned();
        }
        debug!(session_id = %id, "session closed");
    }

    /// Switch the active session. Unknown ids are ignored.
    pub fn set_active(&self, id: &SessionId) {
        if self.sessions.contains_key(id) {
            *self.active.lock() = Some(id.clone());
        }
    }

    /// The active session, if any.
    #[must_use]
    pub fn active_session(&self) -> Option<SessionId> {
        self.active.lock().clone()
    }

    /// Dock listing in creation order.
    #[must_use]
    pub fn overview(&self) -> Vec<SessionOverview> {
        let order = self.order.lock().clone();
        order
            .iter()
            .filter_map(|id| {
                self.with_session(id, |s| SessionOverview {
                    id: s.id.clone(),
                    name: s.name.clone(),
                    mode: s.mode,
                    driving: s.driving,
                    awaiting_answer: s.awaiting_answer,
                })
            })
            .collect()
    }

    /// Snapshot of a session's message log.
    #[must_use]
    pub fn message_log(&self, id: &SessionId) -> Option<Vec<ChatMessage>> {
        self.with_session(id, |s| s.messages.clone())
    }

    /// Current status of one specialist in a session's status map.
    #[must_use]
    pub fn specialist_status(
        &self,
        id: &SessionId,
        specialist: Specialist,
    ) -> Option<SpecialistStatus> {
        let slot = self.slot(id)?;
        Some(slot.board.get(specialist))
    }

    // ── Attachments ────────────────────────────────────────────────────

    /// Stage a file for the next non-automatic send.
    pub fn attach_file(&self, file: AttachedFile) {
        self.staged.lock().push(file);
    }

    /// Unstage a file by name.
    pub fn remove_file(&self, name: &str) {
        self.staged.lock().retain(|f| f.name != name);
    }

    /// Names of currently staged files.
    #[must_use]
    pub fn staged_files(&self) -> Vec<String> {
        self.staged.lock().iter().map(|f| f.name.clone()).collect()
    }

    // ── Sending ────────────────────────────────────────────────────────

    /// Run one turn: append the user message and the trailing model
    /// message, stream the response into it, and settle the session back
    /// to idle (or awaiting-answer on a pause).
    ///
    /// Gating errors (`SessionBusy`, `AwaitingAnswer`, `SessionNotFound`,
    /// and the empty-send no-op) surface to the caller; gateway failures
    /// inside the turn degrade to the apology message and return `Ok`.
    #[instrument(skip(self, text), fields(session_id = %id, auto))]
    pub async fn send_message(
        self: &Arc<Self>,
        id: &SessionId,
        text: &str,
        auto: bool,
    ) -> Result<(), RuntimeError> {
        let files: Vec<AttachedFile> = if auto {
            Vec::new()
        } else {
            let mut staged = self.staged.lock();
            if text.trim().is_empty() && staged.is_empty() {
                return Ok(());
            }
            // Cleared here, regardless of how the turn ends.
            staged.drain(..).collect()
        };

        let guard = self.begin_turn(id)?;

        let (mut request, model_id) = {
            let mut session = guard.slot.session.lock();
            if session.mode == Mode::Squad {
                guard.slot.board.reset();
            }
            let history = replay_history(&session.messages);
            let names: Vec<String> = files.iter().map(|f| f.name.clone()).collect();
            let (user_id, model_id) = session.open_turn(text, names, auto);
            let parts = build_submission(text, &files, session.mode);
            let request = ChatRequest::new(session.mode.system_instruction())
                .with_history(history)
                .with_parts(parts)
                .with_tools(ToolSet::for_mode(session.mode));
            let _ = self.emitter.emit(SessionEvent::TurnOpened {
                session_id: id.clone(),
                user_id,
                model_id,
            });
            (request, model_id)
        };

        // Delegation calls deferred by an earlier pause are dispatched now,
        // their responses prepended so the provider conversation still gets
        // a response for every call it made.
        let deferred: Vec<PendingDelegation> = self
            .with_session(id, |s| std::mem::take(&mut s.pending_delegations))
            .unwrap_or_default();
        if !deferred.is_empty() {
            let calls: Vec<FunctionCall> = deferred
                .into_iter()
                .map(|d| FunctionCall {
                    id: d.call_id,
                    name: d.name,
                    args: d.args,
                })
                .collect();
            let mut parts = self.dispatcher.dispatch_calls(&calls, &guard.slot.board).await;
            parts.append(&mut request.parts);
            request.parts = parts;
        }

        let result = run_turn(
            &self.gateway,
            &self.dispatcher,
            &guard.slot.board,
            request,
            &mut |event| match event {
                TurnEvent::TextChunk(chunk) => {
                    {
                        let mut session = guard.slot.session.lock();
                        if let Some(msg) = session.find_mut(model_id) {
                            msg.content.push_str(&chunk);
                        }
                    }
                    let _ = self.emitter.emit(SessionEvent::MessageDelta {
                        session_id: id.clone(),
                        message_id: model_id,
                        delta: chunk,
                    });
                }
                TurnEvent::Interaction { prompt } => {
                    {
                        let mut session = guard.slot.session.lock();
                        if let Some(msg) = session.find_mut(model_id) {
                            msg.interaction = Some(InteractionPrompt::new(prompt.clone()));
                        }
                        session.awaiting_answer = true;
                    }
                    let _ = self.emitter.emit(SessionEvent::InteractionRequested {
                        session_id: id.clone(),
                        message_id: model_id,
                        prompt,
                    });
                }
            },
        )
        .await;

        match result {
            Ok(outcome) => {
                if outcome.paused.is_some() {
                    let _ = self.with_session(id, |session| {
                        session.pending_delegations = outcome
                            .pending_calls
                            .iter()
                            .map(|c| PendingDelegation {
                                call_id: c.id.clone(),
                                name: c.name.clone(),
                                args: c.args.clone(),
                            })
                            .collect();
                    });
                    info!(session_id = %id, "turn paused awaiting answer");
                } else {
                    let _ = self
                        .emitter
                        .emit(SessionEvent::TurnCompleted {
                            session_id: id.clone(),
                        });
                    let driving = self.with_session(id, |s| s.driving).unwrap_or(false);
                    if driving {
                        self.schedule_drive(id);
                    }
                }
                Ok(())
            }
            Err(e) => {
                warn!(session_id = %id, error = %e, category = e.category(), "turn failed");
                let _ = self.with_session(id, |session| {
                    if let Some(msg) = session.find_mut(model_id) {
                        msg.content = APOLOGY.to_owned();
                    }
                });
                let _ = self.emitter.emit(SessionEvent::TurnFailed {
                    session_id: id.clone(),
                    error: e.to_string(),
                });
                Ok(())
            }
        }
    }

    /// Record the answer to an interaction prompt (set once, never
    /// cleared), unblock the session, and send the answer as an automatic
    /// message. Unknown sessions and already-answered prompts are silent
    /// no-ops.
    pub async fn submit_answer(
        self: &Arc<Self>,
        id: &SessionId,
        message_id: MessageId,
        answer: &str,
    ) -> Result<(), RuntimeError> {
        let recorded = self
            .with_session(id, |session| {
                let Some(msg) = session.find_mut(message_id) else {
                    return false;
                };
                let Some(interaction) = msg.interaction.as_mut() else {
                    return false;
                };
                if interaction.submitted_answer.is_some() {
                    return false;
                }
                interaction.submitted_answer = Some(answer.to_owned());
                session.awaiting_answer = false;
                true
            })
            .unwrap_or(false);

        if recorded {
            self.send_message(id, answer, true).await
        } else {
            Ok(())
        }
    }

    // ── Journeys ───────────────────────────────────────────────────────

    /// Navigate the journey session's lesson. Out-of-range steps are
    /// no-ops: the index is unchanged and no prompt is emitted.
    pub async fn navigate_lesson(
        self: &Arc<Self>,
        id: &SessionId,
        direction: Direction,
    ) -> Result<(), RuntimeError> {
        let prompt = self
            .with_session(id, |session| {
                let state = session.journey.as_mut()?;
                let len = state.program.lessons.len();
                let next = journey::step(state.current_lesson_index, len, direction)?;
                state.current_lesson_index = next;
                state.program.lessons.get(next).map(journey::advance_prompt)
            })
            .flatten();
        match prompt {
            Some(prompt) => self.send_message(id, &prompt, true).await,
            None => Ok(()),
        }
    }

    /// A session's journey lesson index, if it is a journey session.
    #[must_use]
    pub fn lesson_index(&self, id: &SessionId) -> Option<usize> {
        self.with_session(id, |s| s.journey.as_ref().map(|j| j.current_lesson_index))
            .flatten()
    }

    // ── Driving ────────────────────────────────────────────────────────

    /// Toggle driving mode. Enabling freezes `goal` and sends it as the
    /// first (non-automatic) message; enabling without a goal is refused.
    pub async fn toggle_driving(
        self: &Arc<Self>,
        id: &SessionId,
        goal: &str,
    ) -> Result<(), RuntimeError> {
        let currently = self
            .with_session(id, |s| s.driving)
            .ok_or_else(|| RuntimeError::SessionNotFound(id.clone()))?;
        if currently {
            self.stop_driving(id);
            return Ok(());
        }
        let goal = goal.trim();
        if goal.is_empty() {
            return Err(RuntimeError::GoalRequired);
        }
        let _ = self.with_session(id, |s| {
            s.driving = true;
            s.goal = Some(goal.to_owned());
        });
        self.send_message(id, goal, false).await
    }

    /// Turn driving off and announce it. No-op when not driving.
    pub fn stop_driving(&self, id: &SessionId) {
        let was_driving = self
            .with_session(id, |s| {
                let was = s.driving;
                s.driving = false;
                was
            })
            .unwrap_or(false);
        if was_driving {
            let _ = self.emitter.emit(SessionEvent::DrivingStopped {
                session_id: id.clone(),
            });
        }
    }

    // ── Persistence plumbing ───────────────────────────────────────────

    /// Clone all sessions in creation order (for snapshotting).
    #[must_use]
    pub fn export_sessions(&self) -> Vec<ChatSession> {
        let order = self.order.lock().clone();
        order
            .iter()
            .filter_map(|id| self.with_session(id, |s| s.clone()))
            .collect()
    }

    /// Install restored sessions (capped), making the first one active.
    pub fn restore_sessions(&self, sessions: Vec<ChatSession>) {
        for session in sessions.into_iter().take(self.config.max_sessions) {
            let _ = self.insert_session(session);
        }
        let first = self.order.lock().first().cloned();
        *self.active.lock() = first;
    }

    // ── Internals ──────────────────────────────────────────────────────

    fn insert_session(&self, session: ChatSession) -> SessionId {
        let id = session.id.clone();
        let board = Arc::new(StatusBoard::new(id.clone(), Arc::clone(&self.emitter)));
        let _ = self.sessions.insert(
            id.clone(),
            Arc::new(SessionSlot {
                session: Mutex::new(session),
                board,
            }),
        );
        self.order.lock().push(id.clone());
        id
    }

    fn slot(&self, id: &SessionId) -> Option<Arc<SessionSlot>> {
        let entry = self.sessions.get(id)?;
        Some(Arc::clone(entry.value()))
    }

    /// Run `f` against a session's state. Missing sessions return `None`
    /// (mutation-by-id of a closed session must be a silent no-op).
    fn with_session<R>(&self, id: &SessionId, f: impl FnOnce(&mut ChatSession) -> R) -> Option<R> {
        let slot = self.slot(id)?;
        let mut session = slot.session.lock();
        Some(f(&mut session))
    }

    /// Mark a turn in flight, enforcing one turn per session.
    fn begin_turn(self: &Arc<Self>, id: &SessionId) -> Result<TurnGuard, RuntimeError> {
        let slot = self
            .slot(id)
            .ok_or_else(|| RuntimeError::SessionNotFound(id.clone()))?;
        {
            let mut turns = self.active_turns.lock();
            if turns.contains(id) {
                return Err(RuntimeError::SessionBusy(id.clone()));
            }
            if slot.session.lock().awaiting_answer {
                return Err(RuntimeError::AwaitingAnswer(id.clone()));
            }
            let _ = turns.insert(id.clone());
        }
        Ok(TurnGuard {
            controller: Arc::clone(self),
            id: id.clone(),
            slot,
        })
    }

    pub(crate) fn drive_state(
        &self,
        id: &SessionId,
    ) -> Option<(bool, bool, Option<String>, Option<String>)> {
        self.with_session(id, |s| {
            (
                s.driving,
                s.turn_settled(),
                s.goal.clone(),
                s.last_model_content().map(ToOwned::to_owned),
            )
        })
    }

    pub(crate) fn is_turn_active(&self, id: &SessionId) -> bool {
        self.active_turns.lock().contains(id)
    }

    pub(crate) fn gateway(&self) -> &Arc<dyn ChatGateway> {
        &self.gateway
    }

    pub(crate) fn config(&self) -> &ControllerConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{ScriptedGateway, call_batch, delegation, fragments};
    use helm_core::journey::Lesson;
    use helm_core::messages::Sender;
    use helm_llm::gateway::Part;

    fn config(max_sessions: usize) -> ControllerConfig {
        ControllerConfig {
            max_sessions,
            // Long enough that auto-scheduled driver steps never fire inside
            // a test; driving tests call drive_once directly.
            drive_delay: Duration::from_secs(600),
            drive_excerpt_bytes: 300,
        }
    }

    fn controller_with(gateway: Arc<ScriptedGateway>) -> Arc<SessionController> {
        SessionController::new(gateway, config(6))
    }

    fn program() -> JourneyProgram {
        JourneyProgram {
            id: "p1".into(),
            title: "Rust Foundations".into(),
            description: String::new(),
            lessons: vec![
                Lesson {
                    id: "l1".into(),
                    title: "Ownership".into(),
                    description: String::new(),
                    content: "Teach ownership".into(),
                },
                Lesson {
                    id: "l2".into(),
                    title: "Lifetimes".into(),
                    description: String::new(),
                    content: "Teach lifetimes".into(),
                },
            ],
        }
    }

    // ── Lifecycle ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn session_cap_refuses_creation_and_leaves_list_unchanged() {
        let controller = SessionController::new(ScriptedGateway::new(), config(2));
        let _ = controller.create_session(Mode::Learn).unwrap();
        let _ = controller.create_session(Mode::Build).unwrap();

        let before = controller.overview();
        let err = controller.create_session(Mode::Debug).unwrap_err();
        assert!(matches!(err, RuntimeError::SessionLimit(2)));
        assert_eq!(controller.overview(), before);
        assert_eq!(controller.session_count(), 2);
    }

    #[tokio::test]
    async fn create_session_sets_active_and_welcome() {
        let controller = controller_with(ScriptedGateway::new());
        let id = controller.create_session(Mode::Debug).unwrap();
        assert_eq!(controller.active_session(), Some(id.clone()));

        let log = controller.message_log(&id).unwrap();
        assert_eq!(log.len(), 1);
        assert!(log[0].content.contains("**Debug**"));
    }

    #[tokio::test]
    async fn close_session_falls_back_to_first_remaining() {
        let controller = controller_with(ScriptedGateway::new());
        let first = controller.create_session(Mode::Learn).unwrap();
        let second = controller.create_session(Mode::Build).unwrap();
        assert_eq!(controller.active_session(), Some(second.clone()));

        controller.close_session(&second);
        assert_eq!(controller.active_session(), Some(first.clone()));

        controller.close_session(&first);
        assert_eq!(controller.active_session(), None);
    }

    #[tokio::test]
    async fn sends_to_closed_sessions_are_rejected_and_answers_noop() {
        let controller = controller_with(ScriptedGateway::new());
        let id = controller.create_session(Mode::Learn).unwrap();
        controller.close_session(&id);

        let err = controller.send_message(&id, "hello?", false).await.unwrap_err();
        assert!(matches!(err, RuntimeError::SessionNotFound(_)));

        // Mutation by id of a missing session is a silent no-op.
        controller
            .submit_answer(&id, MessageId::new(1), "answer")
            .await
            .unwrap();
    }

    // ── Plain turns ────────────────────────────────────────────────────

    #[tokio::test]
    async fn debug_turn_appends_user_and_streams_model_content() {
        let gateway = ScriptedGateway::new().with_stream(fragments(&["Here", "'s the fix"]));
        let controller = controller_with(gateway);
        let id = controller.create_session(Mode::Debug).unwrap();

        controller.send_message(&id, "fix this bug", false).await.unwrap();

        let log = controller.message_log(&id).unwrap();
        assert_eq!(log.len(), 3); // welcome + user + model
        let user = &log[1];
        assert_eq!(user.sender, Sender::User);
        assert_eq!(user.content, "fix this bug");
        assert_eq!(user.parent, Some(log[0].id));
        assert!(!user.auto);

        let model = &log[2];
        assert_eq!(model.sender, Sender::Model);
        assert_eq!(model.content, "Here's the fix");
        assert_eq!(model.parent, Some(user.id));
        assert!(model.interaction.is_none());
    }

    #[tokio::test]
    async fn turn_events_are_broadcast_in_order() {
        let gateway = ScriptedGateway::new().with_stream(fragments(&["a", "b"]));
        let controller = controller_with(gateway);
        let mut rx = controller.subscribe();
        let id = controller.create_session(Mode::Learn).unwrap();

        controller.send_message(&id, "go", false).await.unwrap();

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(event.event_type());
        }
        assert_eq!(
            kinds,
            vec!["turn_opened", "message_delta", "message_delta", "turn_completed"]
        );
    }

    #[tokio::test]
    async fn empty_send_is_a_noop() {
        let gateway = ScriptedGateway::new();
        let controller = controller_with(gateway.clone());
        let id = controller.create_session(Mode::Learn).unwrap();

        controller.send_message(&id, "   ", false).await.unwrap();
        assert_eq!(controller.message_log(&id).unwrap().len(), 1);
        assert!(gateway.stream_requests().is_empty());
    }

    #[tokio::test]
    async fn replay_history_excludes_welcome_and_open_placeholder() {
        let gateway = ScriptedGateway::new()
            .with_stream(fragments(&["first answer"]))
            .with_stream(fragments(&["second answer"]));
        let controller = controller_with(gateway.clone());
        let id = controller.create_session(Mode::Learn).unwrap();

        controller.send_message(&id, "one", false).await.unwrap();
        controller.send_message(&id, "two", false).await.unwrap();

        let requests = gateway.stream_requests();
        assert!(requests[0].history.is_empty());
        // Second turn: the first exchange, without the welcome message.
        assert_eq!(requests[1].history.len(), 2);
        assert_eq!(requests[1].history[0].parts, vec![Part::text("one")]);
        assert_eq!(requests[1].history[1].parts, vec![Part::text("first answer")]);
    }

    #[tokio::test]
    async fn turn_failure_substitutes_apology_and_returns_to_idle() {
        // No scripted stream: the gateway errors immediately.
        let controller = controller_with(ScriptedGateway::new());
        let id = controller.create_session(Mode::Debug).unwrap();
        let mut rx = controller.subscribe();

        controller.send_message(&id, "break", false).await.unwrap();

        let log = controller.message_log(&id).unwrap();
        assert_eq!(log.last().unwrap().content, APOLOGY);

        let mut saw_failure = false;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, SessionEvent::TurnFailed { .. }) {
                saw_failure = true;
            }
        }
        assert!(saw_failure);

        // The session is idle again: a new turn can start.
        assert!(!controller.is_turn_active(&id));
    }

    #[tokio::test]
    async fn concurrent_send_is_rejected_as_busy() {
        let gate = Arc::new(tokio::sync::Notify::new());
        let gateway = ScriptedGateway::new().with_gated_stream(fragments(&["ok"]), gate.clone());
        let controller = controller_with(gateway);
        let id = controller.create_session(Mode::Build).unwrap();

        let spawned = Arc::clone(&controller);
        let spawned_id = id.clone();
        let handle =
            tokio::spawn(async move { spawned.send_message(&spawned_id, "first", false).await });
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        let err = controller.send_message(&id, "second", false).await.unwrap_err();
        assert!(matches!(err, RuntimeError::SessionBusy(_)));

        gate.notify_one();
        handle.await.unwrap().unwrap();
        assert!(!controller.is_turn_active(&id));
    }

    // ── Attachments ────────────────────────────────────────────────────

    #[tokio::test]
    async fn attachments_are_sent_inline_and_cleared() {
        let gateway = ScriptedGateway::new().with_stream(fragments(&["reviewed"]));
        let controller = controller_with(gateway.clone());
        let id = controller.create_session(Mode::Refactor).unwrap();

        controller.attach_file(AttachedFile::from_bytes("main.rs", b"fn main() {}"));
        assert_eq!(controller.staged_files(), vec!["main.rs"]);

        controller.send_message(&id, "review this", false).await.unwrap();

        assert!(controller.staged_files().is_empty());
        let log = controller.message_log(&id).unwrap();
        assert_eq!(log[1].attached_files, vec!["main.rs"]);

        let request = &gateway.stream_requests()[0];
        assert!(matches!(request.parts[0], Part::InlineData { .. }));
        match request.parts.last().unwrap() {
            Part::Text { text } => assert!(text.contains("main.rs")),
            other => panic!("expected text part, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn attachments_cleared_even_when_the_turn_fails() {
        let controller = controller_with(ScriptedGateway::new()); // no stream → failure
        let id = controller.create_session(Mode::Debug).unwrap();
        controller.attach_file(AttachedFile::from_bytes("x.txt", b"data"));

        controller.send_message(&id, "go", false).await.unwrap();
        assert!(controller.staged_files().is_empty());
    }

    // ── Delegation ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn squad_turn_runs_delegation_round_and_continues() {
        let gateway = ScriptedGateway::new()
            .with_stream(vec![call_batch(vec![delegation(
                "delegateToRefactor",
                "simplify foo()",
            )])])
            .with_completion(Ok("simplified".into()))
            .with_stream(fragments(&["All simplified."]));
        let controller = controller_with(gateway.clone());
        let id = controller.create_session(Mode::Squad).unwrap();

        controller.send_message(&id, "clean this up", false).await.unwrap();

        assert_eq!(
            controller.specialist_status(&id, Specialist::Refactor),
            Some(SpecialistStatus::Complete)
        );
        let log = controller.message_log(&id).unwrap();
        assert_eq!(log.last().unwrap().content, "All simplified.");

        let requests = gateway.stream_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].tools, ToolSet::Delegation);
        assert!(matches!(
            requests[1].parts[0],
            Part::FunctionResponse { .. }
        ));
    }

    // ── Interaction pauses ─────────────────────────────────────────────

    #[tokio::test]
    async fn pause_attaches_prompt_and_blocks_sends_until_answered() {
        let gateway = ScriptedGateway::new()
            .with_stream(fragments(&[
                r#"Before. [PAUSE_INTERACTION: "Pick a name"] After"#,
            ]))
            .with_stream(fragments(&["Thanks, helm it is."]));
        let controller = controller_with(gateway);
        let id = controller.create_session(Mode::Learn).unwrap();

        controller.send_message(&id, "name my crate", false).await.unwrap();

        let log = controller.message_log(&id).unwrap();
        let paused = log.last().unwrap();
        assert_eq!(paused.content, "Before. ");
        let interaction = paused.interaction.as_ref().unwrap();
        assert_eq!(interaction.prompt, "Pick a name");
        assert!(interaction.submitted_answer.is_none());

        let err = controller.send_message(&id, "hello?", false).await.unwrap_err();
        assert!(matches!(err, RuntimeError::AwaitingAnswer(_)));

        controller.submit_answer(&id, paused.id, "helm").await.unwrap();

        let log = controller.message_log(&id).unwrap();
        let answered = log.iter().find(|m| m.id == paused.id).unwrap();
        assert_eq!(
            answered.interaction.as_ref().unwrap().submitted_answer.as_deref(),
            Some("helm")
        );
        // The answer went out as an automatic message and streamed a reply.
        let answer_msg = log.iter().find(|m| m.content == "helm").unwrap();
        assert!(answer_msg.auto);
        assert_eq!(log.last().unwrap().content, "Thanks, helm it is.");
    }

    #[tokio::test]
    async fn answers_are_recorded_once() {
        let gateway = ScriptedGateway::new()
            .with_stream(fragments(&[r#"[PAUSE_INTERACTION: "Q"]"#]))
            .with_stream(fragments(&["ok"]));
        let controller = controller_with(gateway.clone());
        let id = controller.create_session(Mode::Learn).unwrap();
        controller.send_message(&id, "ask me", false).await.unwrap();

        let paused_id = controller.message_log(&id).unwrap().last().unwrap().id;
        controller.submit_answer(&id, paused_id, "first").await.unwrap();
        controller.submit_answer(&id, paused_id, "second").await.unwrap();

        let log = controller.message_log(&id).unwrap();
        let msg = log.iter().find(|m| m.id == paused_id).unwrap();
        assert_eq!(
            msg.interaction.as_ref().unwrap().submitted_answer.as_deref(),
            Some("first")
        );
        // Only the first answer produced a send.
        assert_eq!(gateway.stream_requests().len(), 2);
    }

    #[tokio::test]
    async fn calls_deferred_by_a_pause_resume_with_the_answer() {
        let gateway = ScriptedGateway::new()
            .with_stream(vec![
                call_batch(vec![delegation("delegateToLogic", "derive the bound")]),
                fragments(&[r#"[PAUSE_INTERACTION: "Tight or loose bound?"]"#]).remove(0),
            ])
            .with_completion(Ok("derived".into()))
            .with_stream(fragments(&["Resumed with the bound."]));
        let controller = controller_with(gateway.clone());
        let id = controller.create_session(Mode::Squad).unwrap();

        controller.send_message(&id, "prove it", false).await.unwrap();
        // Paused: nothing dispatched yet.
        assert!(gateway.completion_requests().is_empty());

        let paused_id = controller.message_log(&id).unwrap().last().unwrap().id;
        controller.submit_answer(&id, paused_id, "tight").await.unwrap();

        // The deferred call was dispatched at resumption and its response
        // prepended to the answer submission.
        assert_eq!(gateway.completion_requests().len(), 1);
        assert_eq!(
            controller.specialist_status(&id, Specialist::Logic),
            Some(SpecialistStatus::Complete)
        );
        let resumed = &gateway.stream_requests()[1];
        assert!(matches!(resumed.parts[0], Part::FunctionResponse { .. }));
        match resumed.parts.last().unwrap() {
            Part::Text { text } => assert!(text.contains("tight")),
            other => panic!("expected text part, got {other:?}"),
        }
    }

    // ── Journeys ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn journey_opens_with_first_lesson_and_clamps_navigation() {
        let gateway = ScriptedGateway::new()
            .with_stream(fragments(&["Lesson one content."]))
            .with_stream(fragments(&["Lesson two content."]));
        let controller = controller_with(gateway.clone());

        let id = controller.start_journey(program()).await.unwrap();
        assert_eq!(controller.lesson_index(&id), Some(0));
        let log = controller.message_log(&id).unwrap();
        assert!(log[0].auto);
        assert!(log[0].content.contains("first lesson: \"Ownership\""));

        // Prev at index 0 is a no-op: no prompt, index unchanged.
        controller.navigate_lesson(&id, Direction::Prev).await.unwrap();
        assert_eq!(controller.lesson_index(&id), Some(0));
        assert_eq!(gateway.stream_requests().len(), 1);

        controller.navigate_lesson(&id, Direction::Next).await.unwrap();
        assert_eq!(controller.lesson_index(&id), Some(1));
        assert_eq!(gateway.stream_requests().len(), 2);
        let log = controller.message_log(&id).unwrap();
        assert!(log.iter().any(|m| m.content.contains("next lesson: \"Lifetimes\"")));

        // Next at the last lesson is a no-op.
        controller.navigate_lesson(&id, Direction::Next).await.unwrap();
        assert_eq!(controller.lesson_index(&id), Some(1));
        assert_eq!(gateway.stream_requests().len(), 2);
    }

    // ── Driving ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn driving_requires_a_goal() {
        let controller = controller_with(ScriptedGateway::new());
        let id = controller.create_session(Mode::Build).unwrap();
        let err = controller.toggle_driving(&id, "  ").await.unwrap_err();
        assert!(matches!(err, RuntimeError::GoalRequired));
        assert!(!controller.overview()[0].driving);
    }

    #[tokio::test]
    async fn driving_sends_goal_then_self_prompts() {
        let gateway = ScriptedGateway::new()
            .with_stream(fragments(&["scaffold built"]))
            .with_completion(Ok("Add the parser module".into()))
            .with_stream(fragments(&["parser added"]));
        let controller = controller_with(gateway.clone());
        let id = controller.create_session(Mode::Build).unwrap();

        controller.toggle_driving(&id, "build a compiler").await.unwrap();
        assert!(controller.overview()[0].driving);

        controller.drive_once(&id).await;

        let log = controller.message_log(&id).unwrap();
        let auto_prompt = log.iter().find(|m| m.content == "Add the parser module").unwrap();
        assert!(auto_prompt.auto);
        assert_eq!(log.last().unwrap().content, "parser added");

        // The meta-conversation used the driver instruction and the goal.
        let meta = &gateway.completion_requests()[0];
        assert_eq!(meta.system_instruction, crate::driver::DRIVER_INSTRUCTION);
        match &meta.parts[0] {
            Part::Text { text } => {
                assert!(text.contains("\"build a compiler\""));
                assert!(text.contains("scaffold built"));
            }
            other => panic!("expected text part, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_meta_completion_stops_driving() {
        let gateway = ScriptedGateway::new()
            .with_stream(fragments(&["done"]))
            .with_completion(Ok(String::new()));
        let controller = controller_with(gateway);
        let id = controller.create_session(Mode::Build).unwrap();
        let mut rx = controller.subscribe();

        controller.toggle_driving(&id, "a goal").await.unwrap();
        controller.drive_once(&id).await;

        assert!(!controller.overview()[0].driving);
        let mut saw_stop = false;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, SessionEvent::DrivingStopped { .. }) {
                saw_stop = true;
            }
        }
        assert!(saw_stop);
    }

    #[tokio::test]
    async fn meta_conversation_failure_stops_driving() {
        let gateway = ScriptedGateway::new()
            .with_stream(fragments(&["done"]))
            .with_completion(Err(helm_llm::gateway::GatewayError::Other {
                message: "meta down".into(),
            }));
        let controller = controller_with(gateway);
        let id = controller.create_session(Mode::Build).unwrap();

        controller.toggle_driving(&id, "a goal").await.unwrap();
        controller.drive_once(&id).await;
        assert!(!controller.overview()[0].driving);
    }

    #[tokio::test]
    async fn toggling_twice_stops_driving_and_keeps_goal() {
        let gateway = ScriptedGateway::new().with_stream(fragments(&["ok"]));
        let controller = controller_with(gateway);
        let id = controller.create_session(Mode::Build).unwrap();

        controller.toggle_driving(&id, "the goal").await.unwrap();
        controller.toggle_driving(&id, "").await.unwrap(); // disable: no goal needed
        assert!(!controller.overview()[0].driving);
        let exported = controller.export_sessions();
        assert_eq!(exported[0].goal.as_deref(), Some("the goal"));
    }

    // ── Persistence plumbing ───────────────────────────────────────────

    #[tokio::test]
    async fn export_and_restore_round_trip() {
        let gateway = ScriptedGateway::new().with_stream(fragments(&["answer"]));
        let controller = controller_with(gateway);
        let id = controller.create_session(Mode::Debug).unwrap();
        controller.send_message(&id, "question", false).await.unwrap();

        let exported = controller.export_sessions();
        assert_eq!(exported.len(), 1);

        let restored = controller_with(ScriptedGateway::new());
        restored.restore_sessions(exported);
        assert_eq!(restored.session_count(), 1);
        assert_eq!(restored.active_session(), Some(id.clone()));
        let log = restored.message_log(&id).unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(log.last().unwrap().content, "answer");
    }
}
