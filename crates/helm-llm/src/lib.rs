//! # helm-llm
//!
//! The model gateway: a thin contract to the hosted LLM provider.
//!
//! - [`ChatGateway`]: unified trait over streaming and one-shot completions
//! - [`GatewayEvent`]: tagged stream events (`TextFragment | FunctionCalls`)
//! - [`ChatRequest`] / [`Turn`] / [`Part`]: provider-agnostic request model
//! - [`replay_history`]: rebuild provider history from a persisted log
//! - [`attachments`]: inline-data encoding, binary exclusion, preambles
//! - [`gemini`]: the Gemini REST backend (SSE streaming over `reqwest`)

#![deny(unsafe_code)]

pub mod attachments;
pub mod gateway;
pub mod gemini;
pub mod history;
pub mod sse;

pub use attachments::AttachedFile;
pub use gateway::{
    ChatGateway, ChatRequest, FunctionCall, GatewayError, GatewayEvent, GatewayEventStream,
    GatewayResult, Part, Role, ToolSet, Turn,
};
pub use gemini::{GeminiConfig, GeminiGateway};
pub use history::replay_history;
