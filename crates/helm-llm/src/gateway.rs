//! # Gateway Trait
//!
//! Core abstraction over the hosted LLM backend. The runtime consumes a
//! boxed [`futures::Stream`] of [`GatewayEvent`]s for streamed turns and a
//! plain `String` for one-shot completions (specialist dispatches, the
//! driver's meta-conversation).
//!
//! The gateway is stateless: the caller owns the conversation history and
//! passes it with every request, which is what lets session handles be
//! rebuilt from the persisted message log on load.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result type alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Boxed stream of [`GatewayEvent`]s returned by [`ChatGateway::stream`].
pub type GatewayEventStream =
    Pin<Box<dyn Stream<Item = Result<GatewayEvent, GatewayError>> + Send>>;

/// Errors surfaced by the gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// SSE stream parsing failed.
    #[error("SSE parse error: {message}")]
    SseParse {
        /// Error description.
        message: String,
    },

    /// Authentication failed (missing or invalid API key).
    #[error("Auth error: {message}")]
    Auth {
        /// Error description.
        message: String,
    },

    /// Rate limited by the provider.
    #[error("Rate limited: retry after {retry_after_ms}ms")]
    RateLimited {
        /// Suggested retry delay in milliseconds.
        retry_after_ms: u64,
        /// Error description.
        message: String,
    },

    /// Provider returned an API error.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error description.
        message: String,
        /// Provider-specific error code.
        code: Option<String>,
        /// Whether this error can be retried.
        retryable: bool,
    },

    /// Gateway-specific error.
    #[error("{message}")]
    Other {
        /// Error description.
        message: String,
    },
}

impl GatewayError {
    /// Whether this error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| {
                        s == reqwest::StatusCode::TOO_MANY_REQUESTS || s.is_server_error()
                    })
            }
            Self::RateLimited { .. } => true,
            Self::Api { retryable, .. } => *retryable,
            Self::SseParse { .. } | Self::Auth { .. } | Self::Json(_) | Self::Other { .. } => {
                false
            }
        }
    }

    /// Error category string for event emission and logs.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Http(_) => "network",
            Self::Json(_) | Self::SseParse { .. } => "parse",
            Self::Auth { .. } => "auth",
            Self::RateLimited { .. } => "rate_limit",
            Self::Api { .. } => "api",
            Self::Other { .. } => "unknown",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Request model
// ─────────────────────────────────────────────────────────────────────────────

/// Role of a history turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human side of the conversation.
    User,
    /// The model side of the conversation.
    Model,
}

/// One part of a message or history turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    /// Plain text.
    Text {
        /// The text content.
        text: String,
    },
    /// Inline binary data (base64).
    InlineData {
        /// MIME type of the payload.
        mime_type: String,
        /// Base64-encoded bytes.
        data: String,
    },
    /// A function call the model made (model-side history of a delegation
    /// round).
    FunctionCall {
        /// Provider-assigned call identifier, when present.
        #[serde(default, skip_serializing_if = "String::is_empty")]
        id: String,
        /// Function name.
        name: String,
        /// Argument payload.
        args: Value,
    },
    /// A function response fed back to the model.
    FunctionResponse {
        /// Function name the response answers.
        name: String,
        /// Response payload.
        response: Value,
    },
}

impl Part {
    /// A plain text part.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// A function response part wrapping `result` the way the delegation
    /// protocol expects.
    #[must_use]
    pub fn function_result(name: impl Into<String>, result: impl Into<String>) -> Self {
        Self::FunctionResponse {
            name: name.into(),
            response: serde_json::json!({ "result": result.into() }),
        }
    }
}

/// One prior exchange in the conversation history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Who produced the turn.
    pub role: Role,
    /// Turn content.
    pub parts: Vec<Part>,
}

impl Turn {
    /// A single-text turn.
    #[must_use]
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![Part::text(text)],
        }
    }
}

/// The tool set attached to a conversation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolSet {
    /// No tools.
    #[default]
    None,
    /// The eight delegation functions (squad mode).
    Delegation,
    /// The provider's web-search tool (academic mode).
    WebSearch,
}

impl ToolSet {
    /// The tool set a persona mode carries. Exactly two modes have one.
    #[must_use]
    pub fn for_mode(mode: helm_core::personas::Mode) -> Self {
        use helm_core::personas::Mode;
        match mode {
            Mode::Squad => Self::Delegation,
            Mode::Academic => Self::WebSearch,
            _ => Self::None,
        }
    }
}

/// A full request: system instruction, replayed history, the new message
/// parts, and the mode's tool set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// System instruction for the conversation.
    pub system_instruction: String,
    /// Prior turns, oldest first.
    pub history: Vec<Turn>,
    /// Parts of the message being submitted.
    pub parts: Vec<Part>,
    /// Tool set for the conversation.
    pub tools: ToolSet,
}

impl ChatRequest {
    /// A request with no history and no tools.
    #[must_use]
    pub fn new(system_instruction: impl Into<String>) -> Self {
        Self {
            system_instruction: system_instruction.into(),
            history: Vec::new(),
            parts: Vec::new(),
            tools: ToolSet::None,
        }
    }

    /// Attach prior history.
    #[must_use]
    pub fn with_history(mut self, history: Vec<Turn>) -> Self {
        self.history = history;
        self
    }

    /// Set the submitted message parts.
    #[must_use]
    pub fn with_parts(mut self, parts: Vec<Part>) -> Self {
        self.parts = parts;
        self
    }

    /// Set the tool set.
    #[must_use]
    pub fn with_tools(mut self, tools: ToolSet) -> Self {
        self.tools = tools;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Stream events
// ─────────────────────────────────────────────────────────────────────────────

/// A function call extracted from the stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Provider-assigned call identifier (may be empty).
    #[serde(default)]
    pub id: String,
    /// Function name.
    pub name: String,
    /// Argument payload.
    pub args: Value,
}

impl FunctionCall {
    /// The `task` argument of a delegation call, if present.
    #[must_use]
    pub fn task(&self) -> Option<&str> {
        self.args.get("task").and_then(Value::as_str)
    }
}

/// Events yielded per incremental provider response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayEvent {
    /// An incremental text fragment.
    TextFragment {
        /// The fragment.
        text: String,
    },
    /// A batch of function-call requests.
    FunctionCalls {
        /// The calls, in provider order.
        calls: Vec<FunctionCall>,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Gateway trait
// ─────────────────────────────────────────────────────────────────────────────

/// Contract to the external LLM provider.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Current model ID.
    fn model(&self) -> &str;

    /// Stream a response. The caller consumes events until the stream ends
    /// or yields an error.
    async fn stream(&self, request: &ChatRequest) -> GatewayResult<GatewayEventStream>;

    /// One-shot, non-streamed completion. Returns the full concatenated
    /// response text (empty when the provider returned none).
    async fn complete(&self, request: &ChatRequest) -> GatewayResult<String>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_categories() {
        let err = GatewayError::RateLimited {
            retry_after_ms: 5000,
            message: "slow down".into(),
        };
        assert!(err.is_retryable());
        assert_eq!(err.category(), "rate_limit");

        let err = GatewayError::Auth {
            message: "bad key".into(),
        };
        assert!(!err.is_retryable());
        assert_eq!(err.category(), "auth");
    }

    #[test]
    fn api_error_retryability_is_explicit() {
        let retryable = GatewayError::Api {
            status: 500,
            message: "server".into(),
            code: None,
            retryable: true,
        };
        let terminal = GatewayError::Api {
            status: 400,
            message: "bad request".into(),
            code: Some("INVALID_ARGUMENT".into()),
            retryable: false,
        };
        assert!(retryable.is_retryable());
        assert!(!terminal.is_retryable());
    }

    #[test]
    fn error_display() {
        let err = GatewayError::Api {
            status: 429,
            message: "Rate limited".into(),
            code: None,
            retryable: true,
        };
        assert_eq!(err.to_string(), "API error (429): Rate limited");
    }

    #[test]
    fn part_function_result_wraps_payload() {
        let part = Part::function_result("delegateToRefactor", "done");
        match part {
            Part::FunctionResponse { name, response } => {
                assert_eq!(name, "delegateToRefactor");
                assert_eq!(response["result"], "done");
            }
            other => panic!("unexpected part: {other:?}"),
        }
    }

    #[test]
    fn function_call_task_extraction() {
        let call = FunctionCall {
            id: "c1".into(),
            name: "delegateToRefactor".into(),
            args: serde_json::json!({ "task": "simplify foo()" }),
        };
        assert_eq!(call.task(), Some("simplify foo()"));

        let no_task = FunctionCall {
            id: String::new(),
            name: "delegateToLogic".into(),
            args: serde_json::json!({}),
        };
        assert!(no_task.task().is_none());
    }

    #[test]
    fn gateway_event_serde_tagging() {
        let event = GatewayEvent::TextFragment { text: "hi".into() };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "text_fragment");
    }

    #[test]
    fn request_builder_chain() {
        let request = ChatRequest::new("instruction")
            .with_history(vec![Turn::text(Role::User, "hi")])
            .with_parts(vec![Part::text("next")])
            .with_tools(ToolSet::Delegation);
        assert_eq!(request.history.len(), 1);
        assert_eq!(request.tools, ToolSet::Delegation);
    }

    #[test]
    fn tool_sets_per_mode() {
        use helm_core::personas::Mode;
        assert_eq!(ToolSet::for_mode(Mode::Squad), ToolSet::Delegation);
        assert_eq!(ToolSet::for_mode(Mode::Academic), ToolSet::WebSearch);
        assert_eq!(ToolSet::for_mode(Mode::Debug), ToolSet::None);
        assert_eq!(ToolSet::for_mode(Mode::Journey), ToolSet::None);
    }

    #[test]
    fn gateway_trait_is_object_safe() {
        fn assert_object_safe(_: &dyn ChatGateway) {}
        let _ = assert_object_safe;
    }
}
