//! A scripted `ProviderAdapter` for tests — no network access. Each call
//! to `stream`/`complete` pops the next behavior off a queue, falling
//! back to a configured default once the queue is drained.

use crate::provider::{EventStream, ProviderAdapter};
use futures::stream;
use relay_core::{CanonicalRequest, CanonicalResponse, FinishReason, SdkError, SdkResult, StreamEvent, Usage};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

const CHUNK_SIZE: usize = 20;

#[derive(Clone, Debug)]
pub enum MockBehavior {
    Text(String),
    ToolCall { id: String, name: String, args: Value },
    MultiToolCall(Vec<(String, String, Value)>),
    TextThenTool { text: String, id: String, name: String, args: Value },
    Malformed { id: String, name: String, raw_json: String },
    Error(String),
}

/// One scripted round, as consumed by `MockAdapter::new`.
#[derive(Clone, Debug)]
pub struct MockRound(pub MockBehavior);

impl MockRound {
    pub fn text(text: impl Into<String>) -> Self {
        Self(MockBehavior::Text(text.into()))
    }

    pub fn tool_call(id: impl Into<String>, name: impl Into<String>, args: Value) -> Self {
        Self(MockBehavior::ToolCall {
            id: id.into(),
            name: name.into(),
            args,
        })
    }

    pub fn multi_tool_call(calls: Vec<(&str, &str, Value)>) -> Self {
        Self(MockBehavior::MultiToolCall(
            calls.into_iter().map(|(id, name, args)| (id.to_string(), name.to_string(), args)).collect(),
        ))
    }

    pub fn text_then_tool(text: impl Into<String>, id: impl Into<String>, name: impl Into<String>, args: Value) -> Self {
        Self(MockBehavior::TextThenTool {
            text: text.into(),
            id: id.into(),
            name: name.into(),
            args,
        })
    }

    pub fn malformed(id: impl Into<String>, name: impl Into<String>, raw_json: impl Into<String>) -> Self {
        Self(MockBehavior::Malformed {
            id: id.into(),
            name: name.into(),
            raw_json: raw_json.into(),
        })
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self(MockBehavior::Error(message.into()))
    }
}

pub struct MockAdapter {
    behaviors: Mutex<std::collections::VecDeque<MockBehavior>>,
    default_behavior: MockBehavior,
    call_count: AtomicUsize,
}

impl MockAdapter {
    pub fn new(rounds: Vec<MockRound>) -> Self {
        Self {
            behaviors: Mutex::new(rounds.into_iter().map(|r| r.0).collect()),
            default_behavior: MockBehavior::Text("".into()),
            call_count: AtomicUsize::new(0),
        }
    }

    /// Repeats the same behavior on every call — useful for loop-detection
    /// scenarios that need the identical tool call N times in a row.
    pub fn constant(behavior: MockRound) -> Self {
        Self {
            behaviors: Mutex::new(std::collections::VecDeque::new()),
            default_behavior: behavior.0,
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    fn next_behavior(&self) -> MockBehavior {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        let mut queue = self.behaviors.lock().expect("mock adapter mutex poisoned");
        queue.pop_front().unwrap_or_else(|| self.default_behavior.clone())
    }
}

fn behavior_to_events(behavior: MockBehavior, id: String) -> SdkResult<Vec<StreamEvent>> {
    let mut events = vec![StreamEvent::StreamStart { id: id.clone(), model: "mock".into() }];
    match behavior {
        MockBehavior::Text(text) => {
            events.extend(chunk_text(&text));
            events.push(StreamEvent::Finish {
                finish_reason: FinishReason::Stop,
                usage: Usage::default(),
            });
        }
        MockBehavior::ToolCall { id: call_id, name, args } => {
            events.extend(tool_call_events(&call_id, &name, &args));
            events.push(StreamEvent::Finish {
                finish_reason: FinishReason::ToolCalls,
                usage: Usage::default(),
            });
        }
        MockBehavior::MultiToolCall(calls) => {
            for (call_id, name, args) in &calls {
                events.extend(tool_call_events(call_id, name, args));
            }
            events.push(StreamEvent::Finish {
                finish_reason: FinishReason::ToolCalls,
                usage: Usage::default(),
            });
        }
        MockBehavior::TextThenTool { text, id: call_id, name, args } => {
            events.extend(chunk_text(&text));
            events.extend(tool_call_events(&call_id, &name, &args));
            events.push(StreamEvent::Finish {
                finish_reason: FinishReason::ToolCalls,
                usage: Usage::default(),
            });
        }
        MockBehavior::Malformed { id: call_id, name, raw_json } => {
            events.push(StreamEvent::ToolCallStart { id: call_id.clone(), name });
            events.push(StreamEvent::ToolCallDelta { id: call_id.clone(), args_chunk: raw_json });
            events.push(StreamEvent::ToolCallEnd { id: call_id });
            events.push(StreamEvent::Finish {
                finish_reason: FinishReason::ToolCalls,
                usage: Usage::default(),
            });
        }
        MockBehavior::Error(message) => {
            return Err(SdkError::Stream(message));
        }
    }
    Ok(events)
}

fn chunk_text(text: &str) -> Vec<StreamEvent> {
    text.as_bytes()
        .chunks(CHUNK_SIZE)
        .map(|chunk| StreamEvent::TextDelta {
            text: String::from_utf8_lossy(chunk).into_owned(),
        })
        .collect()
}

fn tool_call_events(id: &str, name: &str, args: &Value) -> Vec<StreamEvent> {
    vec![
        StreamEvent::ToolCallStart { id: id.to_string(), name: name.to_string() },
        StreamEvent::ToolCallDelta { id: id.to_string(), args_chunk: args.to_string() },
        StreamEvent::ToolCallEnd { id: id.to_string() },
    ]
}

#[async_trait::async_trait]
impl ProviderAdapter for MockAdapter {
    fn name(&self) -> &str {
        "mock"
    }

    async fn stream(&self, _request: CanonicalRequest) -> SdkResult<EventStream> {
        let n = self.call_count.load(Ordering::SeqCst);
        let behavior = self.next_behavior();
        let events = behavior_to_events(behavior, format!("mock-{n}"))?;
        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }

    async fn complete(&self, request: CanonicalRequest) -> SdkResult<CanonicalResponse> {
        let stream = self.stream(request).await?;
        crate::accumulator::StreamAccumulator::fold(stream).await
    }
}
