//! Autonomous driving — the self-prompting feedback loop.
//!
//! While a session drives, every completed model message re-arms a delayed
//! step: a one-off meta-conversation turns the frozen goal plus an excerpt
//! of the last output into the next prompt, which is fed back through the
//! session controller as an automatic send. An empty meta-completion or a
//! meta-conversation failure turns driving off.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use helm_core::ids::SessionId;
use helm_core::text::truncate_with_suffix;
use helm_llm::gateway::{ChatRequest, Part};

use crate::session::SessionController;

/// Controlling instruction for the ephemeral meta-conversation.
pub const DRIVER_INSTRUCTION: &str =
    "You are a meta-controller for an AI developer. Your job is to determine the next step.";

/// Build the meta-prompt from the frozen goal and the last model output.
#[must_use]
pub fn meta_prompt(goal: &str, last_output: &str, excerpt_bytes: usize) -> String {
    let excerpt = truncate_with_suffix(last_output, excerpt_bytes, "...");
    format!(
        "You are in 'Driving Mode'. Your overall goal is: \"{goal}\". The last step you \
         completed was to generate the following output: \"{excerpt}\". Based on this, what is \
         the single next logical step to continue development? Formulate this step as a short, \
         clear prompt that you will execute next. Respond with ONLY the prompt text, nothing else."
    )
}

impl SessionController {
    /// Re-arm the driver: after the configured delay, run one driving step.
    pub(crate) fn schedule_drive(self: &Arc<Self>, id: &SessionId) {
        let controller = Arc::clone(self);
        let id = id.clone();
        let delay = controller.config().drive_delay;
        drop(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            controller.drive_once(&id).await;
        }));
    }

    /// Run one driving step now, if the session still qualifies: driving
    /// enabled, no turn in flight, and the log settled on a completed model
    /// message.
    #[instrument(skip(self))]
    pub async fn drive_once(self: &Arc<Self>, id: &SessionId) {
        let Some((driving, settled, goal, last_output)) = self.drive_state(id) else {
            return; // session closed — silent no-op
        };
        if !driving || !settled || self.is_turn_active(id) {
            return;
        }

        let prompt = meta_prompt(
            goal.as_deref().unwrap_or_default(),
            &last_output.unwrap_or_default(),
            self.config().drive_excerpt_bytes,
        );
        let request =
            ChatRequest::new(DRIVER_INSTRUCTION).with_parts(vec![Part::text(prompt)]);

        match self.gateway().complete(&request).await {
            Ok(next) if !next.trim().is_empty() => {
                debug!(session_id = %id, "driver produced next prompt");
                if let Err(e) = self.send_message(id, next.trim(), true).await {
                    warn!(session_id = %id, error = %e, "driver send rejected");
                }
            }
            Ok(_) => {
                debug!(session_id = %id, "driver got no text; stopping");
                self.stop_driving(id);
            }
            Err(e) => {
                warn!(session_id = %id, error = %e, "driver meta-conversation failed; stopping");
                self.stop_driving(id);
            }
        }
    }
}
