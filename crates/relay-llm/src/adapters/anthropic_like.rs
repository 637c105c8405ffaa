//! Reference `ProviderAdapter` for an Anthropic-shaped messages API with
//! SSE streaming. Exists to exercise the canonical layer against a real
//! wire format and to give integration tests something concrete to run
//! against — provider wire-format fidelity itself is out of scope.

use crate::provider::{EventStream, ProviderAdapter};
use futures::StreamExt;
use relay_core::{
    CanonicalRequest, ContentPart, ProviderError, ProviderErrorKind, SdkError, SdkResult,
    StreamEvent, Turn,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicLikeAdapter {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicLikeAdapter {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for AnthropicLikeAdapter {
    fn name(&self) -> &str {
        "anthropic-like"
    }

    async fn stream(&self, request: CanonicalRequest) -> SdkResult<EventStream> {
        let messages = request.normalized_messages();
        let (system, wire_messages) = split_system(&messages);

        let body = WireRequest {
            model: request.model.clone(),
            messages: wire_messages,
            max_tokens: request.sampling.max_tokens.unwrap_or(8192),
            stream: true,
            system,
            tools: if request.tools.is_empty() {
                None
            } else {
                Some(
                    request
                        .tools
                        .iter()
                        .map(|t| WireTool {
                            name: t.name.clone(),
                            description: t.description.clone(),
                            input_schema: t.parameters.clone(),
                        })
                        .collect(),
                )
            },
        };

        debug!("anthropic-like request: model={}", body.model);

        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| SdkError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_header = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(relay_core::error::parse_retry_after);
            let body_text = response.text().await.unwrap_or_default();
            error!("anthropic-like error {}: {}", status, body_text);
            let kind = relay_core::error::classify_status(status.as_u16(), &body_text);
            let mut provider_error = ProviderError::new(self.name(), kind, body_text.clone()).with_status(status.as_u16());
            if kind == ProviderErrorKind::RateLimit {
                if let Some(retry_after) = retry_after_header {
                    provider_error = provider_error.with_retry_after_ms(retry_after);
                }
            }
            return Err(SdkError::Provider(provider_error));
        }

        let byte_stream = response.bytes_stream();
        Ok(Box::pin(parse_sse_stream(byte_stream, self.name().to_string())))
    }
}

fn split_system(messages: &[Turn]) -> (Option<String>, Vec<WireMessage>) {
    let mut system = None;
    let mut wire = Vec::new();
    for m in messages {
        match m {
            Turn::System { content } => system = Some(content.clone()),
            Turn::User { content } => wire.push(WireMessage {
                role: "user".into(),
                content: serde_json::json!(content),
            }),
            Turn::Steering { content } => wire.push(WireMessage {
                role: "user".into(),
                content: serde_json::json!(content),
            }),
            Turn::Assistant { content } => wire.push(WireMessage {
                role: "assistant".into(),
                content: serde_json::to_value(content_parts_to_blocks(content)).unwrap_or_default(),
            }),
            Turn::ToolResults { results } => {
                let blocks: Vec<_> = results
                    .iter()
                    .map(|r| {
                        serde_json::json!({
                            "type": "tool_result",
                            "tool_use_id": r.tool_call_id,
                            "content": r.content,
                            "is_error": r.is_error,
                        })
                    })
                    .collect();
                wire.push(WireMessage {
                    role: "user".into(),
                    content: serde_json::Value::Array(blocks),
                });
            }
        }
    }
    (system, wire)
}

fn content_parts_to_blocks(parts: &[ContentPart]) -> Vec<serde_json::Value> {
    parts
        .iter()
        .map(|p| match p {
            ContentPart::Text { text } => serde_json::json!({"type": "text", "text": text}),
            ContentPart::ToolCall { id, name, args } => {
                serde_json::json!({"type": "tool_use", "id": id, "name": name, "input": args})
            }
            ContentPart::Thinking { text, .. } => serde_json::json!({"type": "text", "text": text}),
            ContentPart::RedactedThinking { .. } => serde_json::json!({"type": "text", "text": ""}),
        })
        .collect()
}

fn parse_sse_stream(
    byte_stream: impl futures::Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static,
    provider_name: String,
) -> impl futures::Stream<Item = SdkResult<StreamEvent>> + Send {
    async_stream::stream! {
        let mut buffer = String::new();
        let mut current_tool_id: Option<String> = None;
        let mut sent_start = false;

        tokio::pin!(byte_stream);

        while let Some(chunk_result) = byte_stream.next().await {
            let chunk = match chunk_result {
                Ok(c) => c,
                Err(e) => {
                    yield Err(SdkError::Network(e.to_string()));
                    continue;
                }
            };
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(event_end) = buffer.find("\n\n") {
                let event_str = buffer[..event_end].to_string();
                buffer = buffer[event_end + 2..].to_string();

                let mut event_type = String::new();
                let mut event_data = String::new();
                for line in event_str.lines() {
                    if let Some(rest) = line.strip_prefix("event: ") {
                        event_type = rest.to_string();
                    } else if let Some(rest) = line.strip_prefix("data: ") {
                        event_data = rest.to_string();
                    }
                }
                if event_data.is_empty() {
                    continue;
                }

                match event_type.as_str() {
                    "message_start" => {
                        if !sent_start {
                            sent_start = true;
                            if let Ok(data) = serde_json::from_str::<MessageStart>(&event_data) {
                                yield Ok(StreamEvent::StreamStart { id: data.message.id, model: data.message.model });
                            }
                        }
                    }
                    "content_block_start" => {
                        if let Ok(data) = serde_json::from_str::<ContentBlockStart>(&event_data) {
                            if let WireContentBlockType::ToolUse { id, name } = data.content_block {
                                current_tool_id = Some(id.clone());
                                yield Ok(StreamEvent::ToolCallStart { id, name });
                            }
                        }
                    }
                    "content_block_delta" => {
                        if let Ok(data) = serde_json::from_str::<ContentBlockDelta>(&event_data) {
                            match data.delta {
                                WireDeltaType::TextDelta { text } => yield Ok(StreamEvent::TextDelta { text }),
                                WireDeltaType::ThinkingDelta { thinking } => {
                                    yield Ok(StreamEvent::ThinkingDelta { text: thinking })
                                }
                                WireDeltaType::InputJsonDelta { partial_json } => {
                                    if let Some(id) = &current_tool_id {
                                        yield Ok(StreamEvent::ToolCallDelta { id: id.clone(), args_chunk: partial_json });
                                    }
                                }
                            }
                        }
                    }
                    "content_block_stop" => {
                        if let Some(id) = current_tool_id.take() {
                            yield Ok(StreamEvent::ToolCallEnd { id });
                        }
                    }
                    "message_delta" => {
                        if let Ok(data) = serde_json::from_str::<WireMessageDelta>(&event_data) {
                            if let Some(reason) = data.delta.stop_reason {
                                let finish_reason = map_stop_reason(&reason);
                                let usage = data.usage.map(map_usage).unwrap_or_default();
                                yield Ok(StreamEvent::Finish { finish_reason, usage });
                            }
                        }
                    }
                    "error" => {
                        if let Ok(data) = serde_json::from_str::<WireErrorEvent>(&event_data) {
                            yield Err(SdkError::Provider(ProviderError::new(
                                provider_name.clone(),
                                ProviderErrorKind::Server,
                                data.error.message,
                            )));
                        }
                    }
                    _ => {}
                }
            }
        }
    }
}

fn map_stop_reason(reason: &str) -> relay_core::FinishReason {
    match reason {
        "tool_use" => relay_core::FinishReason::ToolCalls,
        "max_tokens" => relay_core::FinishReason::Length,
        "stop_sequence" | "end_turn" => relay_core::FinishReason::Stop,
        _ => relay_core::FinishReason::Stop,
    }
}

fn map_usage(u: WireUsage) -> relay_core::Usage {
    relay_core::Usage {
        input: u.input_tokens as u64,
        output: u.output_tokens as u64,
        total: (u.input_tokens + u.output_tokens) as u64,
        reasoning: 0,
        cache_read: u.cache_read_input_tokens.unwrap_or(0) as u64,
        cache_write: u.cache_creation_input_tokens.unwrap_or(0) as u64,
    }
}

#[derive(Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
}

#[derive(Serialize)]
struct WireMessage {
    role: String,
    content: serde_json::Value,
}

#[derive(Serialize)]
struct WireTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Deserialize)]
struct MessageStart {
    message: MessageStartInner,
}

#[derive(Deserialize)]
struct MessageStartInner {
    id: String,
    model: String,
}

#[derive(Deserialize)]
struct ContentBlockStart {
    #[allow(dead_code)]
    index: u32,
    content_block: WireContentBlockType,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum WireContentBlockType {
    #[serde(rename = "tool_use")]
    ToolUse { id: String, name: String },
    #[serde(rename = "text")]
    #[allow(dead_code)]
    Text { text: String },
}

#[derive(Deserialize)]
struct ContentBlockDelta {
    #[allow(dead_code)]
    index: u32,
    delta: WireDeltaType,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum WireDeltaType {
    #[serde(rename = "text_delta")]
    TextDelta { text: String },
    #[serde(rename = "thinking_delta")]
    ThinkingDelta { thinking: String },
    #[serde(rename = "input_json_delta")]
    InputJsonDelta { partial_json: String },
}

#[derive(Deserialize)]
struct WireMessageDelta {
    delta: WireMessageDeltaContent,
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct WireMessageDeltaContent {
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct WireUsage {
    input_tokens: u32,
    output_tokens: u32,
    cache_read_input_tokens: Option<u32>,
    cache_creation_input_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct WireErrorEvent {
    error: WireErrorDetail,
}

#[derive(Deserialize)]
struct WireErrorDetail {
    message: String,
}

/// Reads the environment variables the LLM layer observes (§6). Empty
/// strings are treated as absent; `GEMINI_API_KEY` wins over
/// `GOOGLE_API_KEY`.
pub struct EnvConfig {
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub openai_org_id: Option<String>,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        Self {
            openai_api_key: non_empty_env("OPENAI_API_KEY"),
            anthropic_api_key: non_empty_env("ANTHROPIC_API_KEY"),
            gemini_api_key: non_empty_env("GEMINI_API_KEY").or_else(|| non_empty_env("GOOGLE_API_KEY")),
            openai_base_url: non_empty_env("OPENAI_BASE_URL"),
            openai_org_id: non_empty_env("OPENAI_ORG_ID"),
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
