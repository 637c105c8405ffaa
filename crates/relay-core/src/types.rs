//! Canonical request/response/stream-event/session-event value types.
//!
//! These are the provider-agnostic shapes every layer above the
//! `ProviderAdapter` boundary consumes. Nothing here knows about any
//! specific wire format.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Session identifier — cheaply cloneable.
#[derive(Clone, Debug, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct SessionKey(Arc<str>);

impl SessionKey {
    pub fn new(s: impl Into<String>) -> Self {
        Self(Arc::from(s.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SessionKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// One unit of assistant (or streamed) content.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ToolCall { id: String, name: String, args: Value },
    Thinking { text: String, signature: Option<String> },
    RedactedThinking { data: String },
}

/// A history entry. Append-only within a submit cycle (§3 invariant).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Turn {
    User { content: String },
    Assistant { content: Vec<ContentPart> },
    ToolResults { results: Vec<ToolResultEntry> },
    Steering { content: String },
    System { content: String },
}

impl Turn {
    pub fn assistant_tool_call_ids(&self) -> Vec<&str> {
        match self {
            Turn::Assistant { content } => content
                .iter()
                .filter_map(|p| match p {
                    ContentPart::ToolCall { id, .. } => Some(id.as_str()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn text(&self) -> Option<String> {
        match self {
            Turn::Assistant { content } => {
                let joined: String = content
                    .iter()
                    .filter_map(|p| match p {
                        ContentPart::Text { text } => Some(text.as_str()),
                        _ => None,
                    })
                    .collect();
                if joined.is_empty() {
                    None
                } else {
                    Some(joined)
                }
            }
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolResultEntry {
    pub tool_call_id: String,
    pub content: String,
    pub is_error: bool,
}

/// Tool-choice directive on a `CanonicalRequest`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ToolChoice {
    #[default]
    Auto,
    None,
    Required,
    Named {
        name: String,
    },
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningEffort {
    Low,
    Medium,
    High,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    #[default]
    Free,
    JsonSchema {
        schema: Value,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct SamplingParams {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub stop: Vec<String>,
    pub reasoning_effort: Option<ReasoningEffort>,
}

/// A tool definition as sent to the provider. The executor lives at the
/// registry layer (`relay-tools`); the canonical type only carries the
/// schema shape the provider needs to see.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Runs a tool's body against parsed arguments, returning its textual
/// result or an error message. Implemented by `relay-tools`'s concrete
/// tool bodies; consumed here only through the trait object so that the
/// LLM request layer's sub-loop (§4.D) does not depend on `relay-tools`.
#[async_trait::async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, args: Value) -> Result<String, String>;
}

impl fmt::Debug for dyn ToolExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<tool executor>")
    }
}

/// `{name, description, parameters, executor?}` (§3). A tool with no
/// executor is passive: the model may call it but the runtime will not
/// auto-execute it.
#[derive(Clone)]
pub struct Tool {
    pub schema: ToolSchema,
    pub executor: Option<Arc<dyn ToolExecutor>>,
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("schema", &self.schema)
            .field("is_active", &self.executor.is_some())
            .finish()
    }
}

impl Tool {
    pub fn passive(schema: ToolSchema) -> Self {
        Self { schema, executor: None }
    }

    pub fn active(schema: ToolSchema, executor: Arc<dyn ToolExecutor>) -> Self {
        Self {
            schema,
            executor: Some(executor),
        }
    }

    pub fn name(&self) -> &str {
        &self.schema.name
    }

    pub fn is_active(&self) -> bool {
        self.executor.is_some()
    }
}

/// Either `messages` or `prompt` is populated, never both (§3).
#[derive(Clone, Debug, Default)]
pub enum RequestInput {
    #[default]
    Empty,
    Prompt(String),
    Messages(Vec<Turn>),
}

#[derive(Clone, Debug, Default)]
pub struct CanonicalRequest {
    pub model: String,
    pub provider_hint: Option<String>,
    pub input: RequestInput,
    pub system: Option<String>,
    pub tools: Vec<ToolSchema>,
    pub tool_choice: ToolChoice,
    pub sampling: SamplingParams,
    pub response_format: ResponseFormat,
    pub timeout_ms: Option<u64>,
    pub cancel: tokio_util::sync::CancellationToken,
    pub provider_options: HashMap<String, HashMap<String, Value>>,
}

impl CanonicalRequest {
    pub fn validate(&self) -> crate::error::SdkResult<()> {
        match &self.input {
            RequestInput::Empty => Err(crate::error::SdkError::Validation(
                "exactly one of prompt|messages must be set".into(),
            )),
            _ => Ok(()),
        }
    }

    /// Normalizes `prompt` into a single `User` message and prepends
    /// `system` if set, per §4.D step 2.
    pub fn normalized_messages(&self) -> Vec<Turn> {
        let mut messages = match &self.input {
            RequestInput::Messages(m) => m.clone(),
            RequestInput::Prompt(p) => vec![Turn::User { content: p.clone() }],
            RequestInput::Empty => Vec::new(),
        };
        if let Some(system) = &self.system {
            messages.insert(0, Turn::System { content: system.clone() });
        }
        messages
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Error,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Usage {
    pub input: u64,
    pub output: u64,
    pub total: u64,
    pub reasoning: u64,
    pub cache_read: u64,
    pub cache_write: u64,
}

impl Usage {
    pub fn add(&mut self, other: &Usage) {
        self.input += other.input;
        self.output += other.output;
        self.total += other.total;
        self.reasoning += other.reasoning;
        self.cache_read += other.cache_read;
        self.cache_write += other.cache_write;
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CanonicalResponse {
    pub id: String,
    pub model: String,
    pub content: Vec<ContentPart>,
    pub finish_reason: FinishReason,
    pub usage: Usage,
    pub warnings: Vec<String>,
    pub provider_metadata: HashMap<String, Value>,
}

impl CanonicalResponse {
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn tool_calls(&self) -> Vec<&ContentPart> {
        self.content
            .iter()
            .filter(|p| matches!(p, ContentPart::ToolCall { .. }))
            .collect()
    }

    pub fn has_only_passive_tool_calls(&self, active_tool_names: &[String]) -> bool {
        self.tool_calls().iter().all(|p| match p {
            ContentPart::ToolCall { name, .. } => !active_tool_names.iter().any(|n| n == name),
            _ => true,
        })
    }
}

/// Ordered streaming event. A `ToolCallDelta{X}` only appears between
/// `ToolCallStart{X}` and `ToolCallEnd{X}`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    StreamStart { id: String, model: String },
    TextDelta { text: String },
    ThinkingDelta { text: String },
    ToolCallStart { id: String, name: String },
    ToolCallDelta { id: String, args_chunk: String },
    ToolCallEnd { id: String },
    /// Marks the boundary between rounds of the request layer's internal
    /// tool-execution sub-loop. Never emitted by `complete()`.
    StepFinish { finish_reason: FinishReason, usage: Usage },
    Finish { finish_reason: FinishReason, usage: Usage },
    Error { message: String },
}

/// Observer-facing event published by the session loop's event bus.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    SessionStart { session_id: String },
    AssistantTextStart,
    AssistantTextDelta { text: String },
    AssistantTextEnd,
    ToolCallStart { id: String, name: String, args: Value },
    ToolCallEnd { id: String, name: String, output: String, is_error: bool },
    ContextWarning { usage_percent: f64 },
    LoopDetection { reason: String },
    TurnLimit { reason: TurnLimitReason },
    Error { kind: String, message: String },
    SessionEnd { session_id: String },
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TurnLimitReason {
    MaxToolRounds,
    MaxTurns,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Processing,
    Closed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubAgentStatus {
    Running,
    Completed,
    Aborted,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_prompt_with_system() {
        let req = CanonicalRequest {
            model: "test-model".into(),
            input: RequestInput::Prompt("hello".into()),
            system: Some("be terse".into()),
            ..Default::default()
        };
        let messages = req.normalized_messages();
        assert_eq!(messages.len(), 2);
        assert!(matches!(&messages[0], Turn::System { content } if content == "be terse"));
        assert!(matches!(&messages[1], Turn::User { content } if content == "hello"));
    }

    #[test]
    fn validate_rejects_empty_input() {
        let req = CanonicalRequest {
            model: "test-model".into(),
            ..Default::default()
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn response_text_concatenates_in_order() {
        let resp = CanonicalResponse {
            id: "r1".into(),
            model: "test-model".into(),
            content: vec![
                ContentPart::Text { text: "Hello ".into() },
                ContentPart::ToolCall {
                    id: "t1".into(),
                    name: "read_file".into(),
                    args: serde_json::json!({}),
                },
                ContentPart::Text { text: "world".into() },
            ],
            finish_reason: FinishReason::Stop,
            usage: Usage::default(),
            warnings: Vec::new(),
            provider_metadata: HashMap::new(),
        };
        assert_eq!(resp.text(), "Hello world");
        assert_eq!(resp.tool_calls().len(), 1);
    }
}
