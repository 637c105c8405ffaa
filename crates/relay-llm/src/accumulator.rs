//! Folds an ordered `StreamEvent` sequence into a `CanonicalResponse` (§4.B).

use futures::{Stream, StreamExt};
use relay_core::{CanonicalResponse, ContentPart, FinishReason, SdkResult, StreamEvent, Usage};
use std::collections::HashMap;

#[derive(Default)]
struct PendingToolCall {
    name: String,
    arguments: String,
}

/// Incrementally folds `StreamEvent`s. Exposed as both an incremental
/// `push` (for the session loop, which needs to observe events as they
/// arrive) and a one-shot `fold` over a whole stream (for `complete()`'s
/// default implementation and for round-trip testing against `stream()`).
pub struct StreamAccumulator {
    id: String,
    model: String,
    text: String,
    thinking: String,
    tool_order: Vec<String>,
    tool_calls: HashMap<String, PendingToolCall>,
    finish_reason: Option<FinishReason>,
    usage: Usage,
    warnings: Vec<String>,
    started: bool,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self {
            id: String::new(),
            model: String::new(),
            text: String::new(),
            thinking: String::new(),
            tool_order: Vec::new(),
            tool_calls: HashMap::new(),
            finish_reason: None,
            usage: Usage::default(),
            warnings: Vec::new(),
            started: false,
        }
    }

    /// Feeds one event. Returns a warning string if the event violates
    /// the accumulator's ordering contract (e.g. a delta with no prior
    /// matching start) — callers may choose to log and continue.
    pub fn push(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::StreamStart { id, model } => {
                self.id = id.clone();
                self.model = model.clone();
                self.started = true;
            }
            StreamEvent::TextDelta { text } => self.text.push_str(text),
            StreamEvent::ThinkingDelta { text } => self.thinking.push_str(text),
            StreamEvent::ToolCallStart { id, name } => {
                self.tool_order.push(id.clone());
                self.tool_calls.insert(
                    id.clone(),
                    PendingToolCall {
                        name: name.clone(),
                        arguments: String::new(),
                    },
                );
            }
            StreamEvent::ToolCallDelta { id, args_chunk } => {
                if let Some(pending) = self.tool_calls.get_mut(id) {
                    pending.arguments.push_str(args_chunk);
                } else {
                    self.warnings
                        .push(format!("tool_call_delta for unknown id {id}"));
                }
            }
            StreamEvent::ToolCallEnd { .. } => {}
            StreamEvent::StepFinish { .. } => {}
            StreamEvent::Finish { finish_reason, usage } => {
                self.finish_reason = Some(*finish_reason);
                self.usage = *usage;
            }
            StreamEvent::Error { message } => {
                self.warnings.push(message.clone());
            }
        }
    }

    /// Finalizes accumulated state into a `CanonicalResponse`. Parts are
    /// ordered text-first, then thinking, then tool calls in Start order
    /// (§4.B). Malformed tool-call JSON degrades to an empty object plus
    /// a warning rather than failing the whole response.
    pub fn finish(mut self) -> CanonicalResponse {
        let mut content = Vec::new();
        if !self.text.is_empty() {
            content.push(ContentPart::Text { text: self.text });
        }
        if !self.thinking.is_empty() {
            content.push(ContentPart::Thinking {
                text: self.thinking,
                signature: None,
            });
        }
        for id in &self.tool_order {
            let Some(pending) = self.tool_calls.remove(id) else {
                continue;
            };
            let args = match serde_json::from_str(&pending.arguments) {
                Ok(v) => v,
                Err(_) => {
                    self.warnings
                        .push(format!("malformed tool-call arguments for {id}, using {{}}"));
                    serde_json::json!({})
                }
            };
            content.push(ContentPart::ToolCall {
                id: id.clone(),
                name: pending.name,
                args,
            });
        }

        let finish_reason = self.finish_reason.unwrap_or_else(|| {
            self.warnings
                .push("stream truncated before Finish; defaulting to stop".into());
            FinishReason::Stop
        });

        CanonicalResponse {
            id: self.id,
            model: self.model,
            content,
            finish_reason,
            usage: self.usage,
            warnings: self.warnings,
            provider_metadata: HashMap::new(),
        }
    }

    /// Consumes a whole stream and folds it into a single response.
    pub async fn fold(
        mut events: impl Stream<Item = SdkResult<StreamEvent>> + Unpin,
    ) -> SdkResult<CanonicalResponse> {
        let mut acc = Self::new();
        while let Some(event) = events.next().await {
            acc.push(&event?);
        }
        Ok(acc.finish())
    }
}

impl Default for StreamAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
