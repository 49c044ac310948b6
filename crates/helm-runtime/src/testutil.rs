//! Scripted gateway for runtime tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream;
use parking_lot::Mutex;
use tokio::sync::Notify;

use helm_llm::gateway::{
    ChatGateway, ChatRequest, FunctionCall, GatewayError, GatewayEvent, GatewayEventStream,
    GatewayResult,
};

/// One scripted stream response.
struct ScriptedStream {
    events: Vec<Result<GatewayEvent, GatewayError>>,
    /// When set, the stream yields nothing until notified.
    gate: Option<Arc<Notify>>,
}

/// A gateway that replays scripted responses and records every request.
pub(crate) struct ScriptedGateway {
    streams: Mutex<VecDeque<ScriptedStream>>,
    completions: Mutex<VecDeque<GatewayResult<String>>>,
    stream_requests: Mutex<Vec<ChatRequest>>,
    completion_requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedGateway {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            streams: Mutex::new(VecDeque::new()),
            completions: Mutex::new(VecDeque::new()),
            stream_requests: Mutex::new(Vec::new()),
            completion_requests: Mutex::new(Vec::new()),
        })
    }

    /// Queue a stream response.
    pub(crate) fn with_stream(
        self: Arc<Self>,
        events: Vec<Result<GatewayEvent, GatewayError>>,
    ) -> Arc<Self> {
        self.streams.lock().push_back(ScriptedStream {
            events,
            gate: None,
        });
        self
    }

    /// Queue a stream response that blocks until `gate` is notified.
    pub(crate) fn with_gated_stream(
        self: Arc<Self>,
        events: Vec<Result<GatewayEvent, GatewayError>>,
        gate: Arc<Notify>,
    ) -> Arc<Self> {
        self.streams.lock().push_back(ScriptedStream {
            events,
            gate: Some(gate),
        });
        self
    }

    /// Queue a one-shot completion response.
    pub(crate) fn with_completion(self: Arc<Self>, result: GatewayResult<String>) -> Arc<Self> {
        self.completions.lock().push_back(result);
        self
    }

    /// Requests seen by `stream`.
    pub(crate) fn stream_requests(&self) -> Vec<ChatRequest> {
        self.stream_requests.lock().clone()
    }

    /// Requests seen by `complete`.
    pub(crate) fn completion_requests(&self) -> Vec<ChatRequest> {
        self.completion_requests.lock().clone()
    }
}

#[async_trait]
impl ChatGateway for ScriptedGateway {
    fn model(&self) -> &str {
        "scripted-model"
    }

    async fn stream(&self, request: &ChatRequest) -> GatewayResult<GatewayEventStream> {
        self.stream_requests.lock().push(request.clone());
        let scripted = self
            .streams
            .lock()
            .pop_front()
            .ok_or_else(|| GatewayError::Other {
                message: "no scripted stream response".into(),
            })?;
        let events = scripted.events;
        let gate = scripted.gate;
        let s = async_stream::stream! {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            for event in events {
                yield event;
            }
        };
        Ok(Box::pin(s))
    }

    async fn complete(&self, request: &ChatRequest) -> GatewayResult<String> {
        self.completion_requests.lock().push(request.clone());
        self.completions
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(String::new()))
    }
}

/// Text fragments as gateway events.
pub(crate) fn fragments(texts: &[&str]) -> Vec<Result<GatewayEvent, GatewayError>> {
    texts
        .iter()
        .map(|t| {
            Ok(GatewayEvent::TextFragment {
                text: (*t).to_owned(),
            })
        })
        .collect()
}

/// A single function-call batch event.
pub(crate) fn call_batch(calls: Vec<FunctionCall>) -> Result<GatewayEvent, GatewayError> {
    Ok(GatewayEvent::FunctionCalls { calls })
}

/// A delegation call with a `task` argument.
pub(crate) fn delegation(name: &str, task: &str) -> FunctionCall {
    FunctionCall {
        id: String::new(),
        name: name.to_owned(),
        args: serde_json::json!({ "task": task }),
    }
}

/// Build a boxed event stream directly from events (stream-processor tests).
pub(crate) fn event_stream(
    events: Vec<Result<GatewayEvent, GatewayError>>,
) -> GatewayEventStream {
    Box::pin(stream::iter(events))
}
