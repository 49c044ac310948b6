//! Gemini wire types and request/response conversion.
//!
//! The wire shapes mirror the `generateContent` / `streamGenerateContent`
//! REST surface: `contents` with role-tagged parts, an optional
//! `systemInstruction`, and a `tools` list carrying either function
//! declarations or the built-in `googleSearch` tool.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use helm_core::personas::Specialist;

use crate::gateway::{ChatRequest, FunctionCall, GatewayEvent, Part, Role, ToolSet};

// ─────────────────────────────────────────────────────────────────────────────
// Request wire shapes
// ─────────────────────────────────────────────────────────────────────────────

/// A request body for `generateContent`/`streamGenerateContent`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireRequest {
    /// Conversation contents, oldest first, ending with the new message.
    pub contents: Vec<WireContent>,
    /// System instruction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<WireSystemInstruction>,
    /// Tool set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<WireTool>>,
    /// Generation parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<WireGenerationConfig>,
}

/// System instruction wrapper.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WireSystemInstruction {
    /// Instruction parts (text only).
    pub parts: Vec<WirePart>,
}

/// One role-tagged content entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WireContent {
    /// `"user"` or `"model"`.
    pub role: String,
    /// Content parts.
    pub parts: Vec<WirePart>,
}

/// One wire part. The REST surface multiplexes part kinds through optional
/// fields; exactly one is set per part.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePart {
    /// Text content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Inline binary data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<WireInlineData>,
    /// A function call (model responses).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_call: Option<WireFunctionCall>,
    /// A function response (submitted back to the model).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_response: Option<WireFunctionResponse>,
}

impl WirePart {
    /// A text-only part.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }
}

/// Inline base64 payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireInlineData {
    /// MIME type.
    pub mime_type: String,
    /// Base64-encoded bytes.
    pub data: String,
}

/// A function call emitted by the model.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WireFunctionCall {
    /// Call identifier (not always present).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Function name.
    pub name: String,
    /// Argument payload.
    #[serde(default)]
    pub args: Value,
}

/// A function response submitted back to the model.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WireFunctionResponse {
    /// Function name the response answers.
    pub name: String,
    /// Response payload.
    pub response: Value,
}

/// One tool entry: either function declarations or the built-in search tool.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireTool {
    /// Declared callable functions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_declarations: Option<Vec<WireFunctionDeclaration>>,
    /// The provider's web-search tool (empty object enables it).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_search: Option<Value>,
}

/// One declared function.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WireFunctionDeclaration {
    /// Function name.
    pub name: String,
    /// Human-facing description.
    pub description: String,
    /// JSON schema of the parameters.
    pub parameters: Value,
}

/// Generation parameters.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireGenerationConfig {
    /// Maximum output tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Response wire shapes
// ─────────────────────────────────────────────────────────────────────────────

/// One streamed chunk (or a full non-streamed response body).
#[derive(Clone, Debug, Deserialize)]
pub struct WireChunk {
    /// Response candidates.
    #[serde(default)]
    pub candidates: Option<Vec<WireCandidate>>,
}

/// One response candidate.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireCandidate {
    /// Generated content.
    #[serde(default)]
    pub content: Option<WireCandidateContent>,
    /// Why generation stopped, when this is the final chunk.
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Candidate content.
#[derive(Clone, Debug, Deserialize)]
pub struct WireCandidateContent {
    /// Generated parts.
    #[serde(default)]
    pub parts: Option<Vec<WirePart>>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Conversion
// ─────────────────────────────────────────────────────────────────────────────

/// Build the wire request body from a gateway request.
#[must_use]
pub fn to_wire_request(request: &ChatRequest, config: WireGenerationConfig) -> WireRequest {
    let mut contents: Vec<WireContent> = request
        .history
        .iter()
        .map(|turn| WireContent {
            role: role_str(turn.role).to_owned(),
            parts: turn.parts.iter().map(to_wire_part).collect(),
        })
        .collect();

    contents.push(WireContent {
        role: "user".to_owned(),
        parts: request.parts.iter().map(to_wire_part).collect(),
    });

    let system_instruction = if request.system_instruction.is_empty() {
        None
    } else {
        Some(WireSystemInstruction {
            parts: vec![WirePart::text(request.system_instruction.clone())],
        })
    };

    let generation_config = if config.max_output_tokens.is_none() && config.temperature.is_none() {
        None
    } else {
        Some(config)
    };

    WireRequest {
        contents,
        system_instruction,
        tools: tools_for(request.tools),
        generation_config,
    }
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Model => "model",
    }
}

fn to_wire_part(part: &Part) -> WirePart {
    match part {
        Part::Text { text } => WirePart::text(text.clone()),
        Part::InlineData { mime_type, data } => WirePart {
            inline_data: Some(WireInlineData {
                mime_type: mime_type.clone(),
                data: data.clone(),
            }),
            ..WirePart::default()
        },
        Part::FunctionCall { id, name, args } => WirePart {
            function_call: Some(WireFunctionCall {
                id: if id.is_empty() { None } else { Some(id.clone()) },
                name: name.clone(),
                args: args.clone(),
            }),
            ..WirePart::default()
        },
        Part::FunctionResponse { name, response } => WirePart {
            function_response: Some(WireFunctionResponse {
                name: name.clone(),
                response: response.clone(),
            }),
            ..WirePart::default()
        },
    }
}

/// The tool declarations for a given tool set.
#[must_use]
pub fn tools_for(tools: ToolSet) -> Option<Vec<WireTool>> {
    match tools {
        ToolSet::None => None,
        ToolSet::Delegation => Some(vec![WireTool {
            function_declarations: Some(delegation_declarations()),
            google_search: None,
        }]),
        ToolSet::WebSearch => Some(vec![WireTool {
            function_declarations: None,
            google_search: Some(json!({})),
        }]),
    }
}

/// The eight delegation function declarations, all sharing the single
/// `task` parameter.
fn delegation_declarations() -> Vec<WireFunctionDeclaration> {
    let task_parameter = json!({
        "type": "OBJECT",
        "properties": {
            "task": {
                "type": "STRING",
                "description": "The specific sub-task to be performed."
            }
        },
        "required": ["task"]
    });
    Specialist::ALL
        .into_iter()
        .map(|s| WireFunctionDeclaration {
            name: s.function_name().to_owned(),
            description: s.task_description().to_owned(),
            parameters: task_parameter.clone(),
        })
        .collect()
}

/// Normalize a chunk into gateway events: text fragments in part order,
/// then one batch event for any function calls in the chunk.
#[must_use]
pub fn chunk_events(chunk: &WireChunk) -> Vec<GatewayEvent> {
    let mut events = Vec::new();
    let mut calls = Vec::new();

    let parts = chunk
        .candidates
        .as_deref()
        .and_then(<[WireCandidate]>::first)
        .and_then(|c| c.content.as_ref())
        .and_then(|c| c.parts.as_deref())
        .unwrap_or_default();

    for part in parts {
        if let Some(ref text) = part.text {
            if !text.is_empty() {
                events.push(GatewayEvent::TextFragment { text: text.clone() });
            }
        }
        if let Some(ref call) = part.function_call {
            calls.push(FunctionCall {
                id: call.id.clone().unwrap_or_default(),
                name: call.name.clone(),
                args: call.args.clone(),
            });
        }
    }

    if !calls.is_empty() {
        events.push(GatewayEvent::FunctionCalls { calls });
    }
    events
}

/// Concatenated text of a full (non-streamed) response body.
#[must_use]
pub fn chunk_text(chunk: &WireChunk) -> String {
    chunk
        .candidates
        .as_deref()
        .and_then(<[WireCandidate]>::first)
        .and_then(|c| c.content.as_ref())
        .and_then(|c| c.parts.as_deref())
        .unwrap_or_default()
        .iter()
        .filter_map(|p| p.text.as_deref())
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
