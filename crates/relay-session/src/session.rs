//! Session Loop (§4.J): the per-session turn state machine. Grounded on
//! the fusion of the teacher's two competing loop shapes —
//! `AgentRuntime::run_turn_cancellable` (`runtime.rs`, for the
//! `tokio::select! { biased; cancel ... stream.next() ... }` cancellation
//! idiom and sequential tool-execution loop) and `ConsciousnessLoop`
//! (`queue.rs`, for the broadcast event-bus wiring) — adopting the
//! simpler synchronous shape over the queue-driven one, since a
//! programmable session loop has no outer scheduler to hand control
//! back to between turns.

use crate::context_tracker::ContextTracker;
use crate::dispatcher::{self, PendingToolCall};
use crate::event_bus::{EventBus, EventBusReceiver};
use crate::loop_detector::LoopDetector;
use crate::steering::SteeringQueue;
use futures::StreamExt;
use relay_core::{
    CanonicalRequest, ContentPart, FinishReason, RequestInput, SamplingParams, SdkError, SessionEvent, SessionKey,
    SessionState, ToolChoice, ToolSchema, Turn,
};
use relay_llm::{ProviderAdapter, StreamAccumulator};
use relay_tools::ToolRegistry;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, RwLock as StdRwLock};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub model: String,
    pub max_turns: u32,
    pub max_tool_rounds_per_input: u32,
    pub max_context_tokens: usize,
    pub supports_parallel_tool_calls: bool,
    pub default_command_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            max_turns: 50,
            max_tool_rounds_per_input: 10,
            max_context_tokens: 128_000,
            supports_parallel_tool_calls: false,
            default_command_timeout_ms: 120_000,
        }
    }
}

/// Carries a machine-readable `kind` alongside the human-readable message
/// so `submit`'s `SessionEvent::Error` can distinguish a context-length
/// failure from an opaque provider/stream error.
struct LoopError {
    kind: String,
    message: String,
}

/// Why a `Closed` session got there — `SessionState` alone can't tell the
/// sub-agent map whether a child was aborted, errored out, or (in the
/// plain-completion case) never left `Idle` at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ClosedReason {
    Aborted,
    Error,
}

impl LoopError {
    fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// How `run_tool_round_loop` finished: either it ran its course (a
/// text-only stop, a cancellation, or a `max_tool_rounds` limit all just
/// break the inner loop) or the Loop Detector fired, which per §4.J
/// breaks the outer turn loop too — `submit` must not drain the
/// follow-up queue or start a new turn in that case.
enum LoopOutcome {
    Completed,
    LoopDetected,
}

struct SessionInner {
    history: RwLock<Vec<Turn>>,
    context: RwLock<ContextTracker>,
    loop_detector: RwLock<LoopDetector>,
    turn_counter: AtomicU32,
    started: AtomicBool,
}

pub struct Session {
    pub key: SessionKey,
    config: SessionConfig,
    provider: Option<Arc<dyn ProviderAdapter>>,
    registry: Option<Arc<ToolRegistry>>,
    steering: SteeringQueue,
    bus: EventBus,
    cancel: CancellationToken,
    state: StdRwLock<SessionState>,
    closed_reason: StdRwLock<Option<ClosedReason>>,
    inner: SessionInner,
}

impl Session {
    pub fn new(
        key: SessionKey,
        config: SessionConfig,
        provider: Arc<dyn ProviderAdapter>,
        registry: Arc<ToolRegistry>,
    ) -> Arc<Self> {
        let session = Arc::new(Self {
            key: key.clone(),
            provider: Some(provider),
            registry: Some(registry),
            steering: SteeringQueue::new(),
            bus: EventBus::new(),
            cancel: CancellationToken::new(),
            state: StdRwLock::new(SessionState::Idle),
            closed_reason: StdRwLock::new(None),
            inner: SessionInner {
                history: RwLock::new(Vec::new()),
                context: RwLock::new(ContextTracker::new(config.max_context_tokens)),
                loop_detector: RwLock::new(LoopDetector::new()),
                turn_counter: AtomicU32::new(0),
                started: AtomicBool::new(false),
            },
            config,
        });
        session
    }

    /// Constructs a session with no wired provider/registry, usable only
    /// as an inert placeholder in tests that exercise the sub-agent map's
    /// bookkeeping rather than the turn algorithm itself.
    #[doc(hidden)]
    pub fn test_placeholder() -> Self {
        Self {
            key: SessionKey::new("test"),
            provider: None,
            registry: None,
            steering: SteeringQueue::new(),
            bus: EventBus::new(),
            cancel: CancellationToken::new(),
            state: StdRwLock::new(SessionState::Idle),
            closed_reason: StdRwLock::new(None),
            inner: SessionInner {
                history: RwLock::new(Vec::new()),
                context: RwLock::new(ContextTracker::new(128_000)),
                loop_detector: RwLock::new(LoopDetector::new()),
                turn_counter: AtomicU32::new(0),
                started: AtomicBool::new(false),
            },
            config: SessionConfig::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.read().unwrap()
    }

    pub(crate) fn closed_reason(&self) -> Option<ClosedReason> {
        *self.closed_reason.read().unwrap()
    }

    pub fn subscribe(&self) -> EventBusReceiver {
        self.bus.subscribe()
    }

    pub fn steer(&self, message: impl Into<String>) {
        self.steering.steer(message);
    }

    pub fn follow_up(&self, message: impl Into<String>) {
        self.steering.follow_up(message);
    }

    pub fn dropped_event_count(&self) -> u64 {
        self.bus.dropped_event_count()
    }

    /// Idempotent. First call cancels in-flight work, emits `SessionEnd`,
    /// and transitions to `Closed`; subsequent calls are no-ops.
    pub async fn abort(&self) {
        {
            let mut state = self.state.write().unwrap();
            if *state == SessionState::Closed {
                return;
            }
            *state = SessionState::Closed;
        }
        *self.closed_reason.write().unwrap() = Some(ClosedReason::Aborted);
        self.cancel.cancel();
        self.bus.publish(SessionEvent::SessionEnd {
            session_id: self.key.as_str().to_string(),
        });
    }

    /// Runs one `submit` cycle to completion: the outer turn loop, its
    /// nested tool-round loop, and the follow-up drain that may chain
    /// into a further outer-loop iteration (§4.J).
    pub async fn submit(&self, input: impl Into<String>) -> Result<(), String> {
        {
            let mut state = self.state.write().unwrap();
            if *state == SessionState::Closed {
                return Err("Session is closed".to_string());
            }
            *state = SessionState::Processing;
        }

        if !self.inner.started.swap(true, Ordering::SeqCst) {
            self.bus.publish(SessionEvent::SessionStart {
                session_id: self.key.as_str().to_string(),
            });
        }

        let mut next_input = Some(input.into());

        while let Some(user_input) = next_input.take() {
            self.inner.history.write().await.push(Turn::User { content: user_input });

            let turn = self.inner.turn_counter.fetch_add(1, Ordering::SeqCst) + 1;
            if turn > self.config.max_turns {
                self.bus.publish(SessionEvent::TurnLimit {
                    reason: relay_core::TurnLimitReason::MaxTurns,
                });
                break;
            }

            for steered in self.steering.drain_steering() {
                self.inner.history.write().await.push(Turn::Steering { content: steered });
            }

            match self.run_tool_round_loop().await {
                Ok(LoopOutcome::LoopDetected) => {
                    // §4.J: a detected loop breaks both the inner tool-round
                    // loop and this outer turn loop — no follow-up drain, no
                    // new turn.
                    break;
                }
                Ok(LoopOutcome::Completed) => {}
                Err(error) => {
                    *self.state.write().unwrap() = SessionState::Closed;
                    *self.closed_reason.write().unwrap() = Some(ClosedReason::Error);
                    self.bus.publish(SessionEvent::Error {
                        kind: error.kind,
                        message: error.message,
                    });
                    self.bus.publish(SessionEvent::SessionEnd {
                        session_id: self.key.as_str().to_string(),
                    });
                    return Ok(());
                }
            }

            next_input = self.steering.pop_follow_up();
        }

        let mut state = self.state.write().unwrap();
        if *state != SessionState::Closed {
            *state = SessionState::Idle;
        }
        Ok(())
    }

    async fn run_tool_round_loop(&self) -> Result<LoopOutcome, LoopError> {
        let provider = self.provider.as_ref().expect("submit requires a wired provider");
        let registry = self.registry.as_ref().expect("submit requires a wired registry").clone();
        let tool_schemas: Vec<ToolSchema> = registry.definitions();

        let mut round: u32 = 0;
        loop {
            if self.cancel.is_cancelled() {
                return Ok(LoopOutcome::Completed);
            }

            let history = self.inner.history.read().await.clone();
            let request = CanonicalRequest {
                model: self.config.model.clone(),
                provider_hint: None,
                input: RequestInput::Messages(history),
                system: None,
                tools: tool_schemas.clone(),
                tool_choice: ToolChoice::Auto,
                sampling: SamplingParams::default(),
                response_format: relay_core::ResponseFormat::Free,
                timeout_ms: Some(self.config.default_command_timeout_ms),
                cancel: self.cancel.clone(),
                provider_options: Default::default(),
            };

            let stream_result = provider.stream(request).await;
            let mut stream = match stream_result {
                Ok(s) => s,
                Err(SdkError::Provider(e)) if e.kind == relay_core::ProviderErrorKind::ContextLength => {
                    if let Some(warn) = self.inner.context.write().await.record_context_length_error() {
                        self.bus.publish(SessionEvent::ContextWarning { usage_percent: warn });
                    }
                    return Err(LoopError::new("context_length", e.message));
                }
                Err(other) => return Err(LoopError::new("provider_error", other.to_string())),
            };

            let mut accumulator = StreamAccumulator::new();
            let mut text_open = false;

            loop {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => {
                        debug!(session = %self.key, "turn cancelled mid-stream");
                        return Ok(LoopOutcome::Completed);
                    }
                    next = stream.next() => {
                        match next {
                            Some(Ok(event)) => {
                                self.forward_stream_event(&event, &mut text_open).await;
                                accumulator.push(&event);
                            }
                            Some(Err(err)) => return Err(LoopError::new("stream_error", err.to_string())),
                            None => break,
                        }
                    }
                }
            }
            if text_open {
                self.bus.publish(SessionEvent::AssistantTextEnd);
            }

            let response = accumulator.finish();
            if response.usage.total > 0 {
                if let Some(percent) = self.inner.context.write().await.record_usage(response.usage.total as usize) {
                    self.bus.publish(SessionEvent::ContextWarning { usage_percent: percent });
                }
            }

            let tool_calls: Vec<PendingToolCall> = response
                .content
                .iter()
                .filter_map(|p| match p {
                    ContentPart::ToolCall { id, name, args } => Some(PendingToolCall {
                        id: id.clone(),
                        name: name.clone(),
                        args: args.clone(),
                    }),
                    _ => None,
                })
                .collect();

            if response.finish_reason != FinishReason::ToolCalls || tool_calls.is_empty() {
                self.inner.history.write().await.push(Turn::Assistant { content: response.content });
                return Ok(LoopOutcome::Completed);
            }

            if round >= self.config.max_tool_rounds_per_input {
                self.bus.publish(SessionEvent::TurnLimit {
                    reason: relay_core::TurnLimitReason::MaxToolRounds,
                });
                return Ok(LoopOutcome::Completed);
            }

            // §4.J step c.iii: dispatch unconditionally, then feed the Loop
            // Detector, then branch. A detected loop discards this round's
            // Assistant/ToolResults turns entirely rather than leaving a
            // ToolCall with no matching ToolResults in history.
            let results =
                dispatcher::dispatch(tool_calls.clone(), &registry, self.config.supports_parallel_tool_calls, &self.cancel).await;
            for r in &results {
                self.bus.publish(SessionEvent::ToolCallEnd {
                    id: r.id.clone(),
                    name: r.name.clone(),
                    output: r.output.clone(),
                    is_error: r.is_error,
                });
            }

            let mut looped = false;
            {
                let mut detector = self.inner.loop_detector.write().await;
                for call in &tool_calls {
                    if detector.record(&call.name, &call.args) {
                        looped = true;
                    }
                }
            }
            if looped {
                self.bus.publish(SessionEvent::LoopDetection {
                    reason: "repeating tool-call pattern detected".to_string(),
                });
                return Ok(LoopOutcome::LoopDetected);
            }

            self.inner.history.write().await.push(Turn::Assistant {
                content: response.content,
            });
            self.inner.history.write().await.push(Turn::ToolResults {
                results: results
                    .into_iter()
                    .map(|r| relay_core::ToolResultEntry {
                        tool_call_id: r.id,
                        content: r.output,
                        is_error: r.is_error,
                    })
                    .collect(),
            });

            round += 1;
        }
    }

    async fn forward_stream_event(&self, event: &relay_core::StreamEvent, text_open: &mut bool) {
        match event {
            relay_core::StreamEvent::TextDelta { text } => {
                if !*text_open {
                    self.bus.publish(SessionEvent::AssistantTextStart);
                    *text_open = true;
                }
                self.bus.publish(SessionEvent::AssistantTextDelta { text: text.clone() });
            }
            relay_core::StreamEvent::ToolCallStart { id, name } => {
                self.bus.publish(SessionEvent::ToolCallStart {
                    id: id.clone(),
                    name: name.clone(),
                    args: serde_json::json!({}),
                });
            }
            _ => {}
        }
    }

    pub async fn history_snapshot(&self) -> Vec<Turn> {
        self.inner.history.read().await.clone()
    }
}
