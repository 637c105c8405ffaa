//! `generate`/`stream` entry points with an automatic tool-execution
//! sub-loop, for standalone use of the LLM layer outside a full session
//! (§4.D). The session loop (component J) drives its own round-by-round
//! iteration instead of this sub-loop, since it needs to interleave
//! context tracking, loop detection, and event publication per event —
//! see `relay_session::session`.

use crate::accumulator::StreamAccumulator;
use crate::provider::ProviderAdapter;
use crate::retry::{retry_call, RetryPolicy};
use futures::StreamExt;
use relay_core::{
    CanonicalRequest, CanonicalResponse, ContentPart, RequestInput, SdkResult, Tool, ToolResultEntry,
    Turn, Usage,
};

pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 10;

pub struct GenerateOutput {
    pub response: CanonicalResponse,
    pub steps: Vec<CanonicalResponse>,
    pub total_usage: Usage,
    pub text: String,
    pub tool_calls: Vec<ContentPart>,
}

fn active_tool_names(tools: &[Tool]) -> Vec<String> {
    tools
        .iter()
        .filter(|t| t.is_active())
        .map(|t| t.name().to_string())
        .collect()
}

async fn execute_tool_calls(tools: &[Tool], calls: &[&ContentPart]) -> Vec<ToolResultEntry> {
    let mut results = Vec::with_capacity(calls.len());
    for call in calls {
        let ContentPart::ToolCall { id, name, args } = call else {
            continue;
        };
        let tool = tools.iter().find(|t| t.name() == name);
        let (content, is_error) = match tool.and_then(|t| t.executor.as_ref()) {
            None => (format!("Unknown or passive tool: {name}"), true),
            Some(executor) => match executor.execute(args.clone()).await {
                Ok(output) => (output, false),
                Err(message) => (format!("Tool error in {name}: {message}"), true),
            },
        };
        results.push(ToolResultEntry {
            tool_call_id: id.clone(),
            content,
            is_error,
        });
    }
    results
}

/// Blocking path (§4.D): validates, normalizes, then repeats complete+tool
/// rounds up to `max_tool_rounds` until a text-only (or round-budget)
/// stop.
pub async fn generate(
    provider: &dyn ProviderAdapter,
    policy: &RetryPolicy,
    mut request: CanonicalRequest,
    tools: &[Tool],
    max_tool_rounds: usize,
) -> SdkResult<GenerateOutput> {
    request.validate()?;
    let mut messages = request.normalized_messages();
    let active = active_tool_names(tools);
    let mut steps = Vec::new();
    let mut total_usage = Usage::default();

    loop {
        request.input = RequestInput::Messages(messages.clone());
        let response = retry_call(policy, || provider.complete(request.clone())).await?;
        total_usage.add(&response.usage);
        steps.push(response.clone());

        let calls = response.tool_calls();
        let budget_exhausted = steps.len() >= max_tool_rounds;
        let all_passive = response.has_only_passive_tool_calls(&active);

        if calls.is_empty() || all_passive || budget_exhausted {
            let text = response.text();
            let tool_calls = response.content.iter().filter(|p| matches!(p, ContentPart::ToolCall { .. })).cloned().collect();
            return Ok(GenerateOutput {
                response,
                steps,
                total_usage,
                text,
                tool_calls,
            });
        }

        let results = execute_tool_calls(tools, &calls).await;
        messages.push(Turn::Assistant { content: response.content.clone() });
        messages.push(Turn::ToolResults { results });
    }
}

/// Streaming path (§4.D). Wraps retry only around stream *creation* —
/// once the first event has been yielded, no retry occurs (§4.C, §9).
/// Returns the raw per-round event stream; round boundaries within a
/// multi-round tool sub-loop are marked with a synthetic `StepFinish`.
pub struct RequestStreamOutput {
    pub events: Vec<SdkResult<relay_core::StreamEvent>>,
    pub response: CanonicalResponse,
}

/// Drives the same round/tool-loop as `generate`, but collects every
/// `StreamEvent` along the way (including synthetic `StepFinish`
/// boundaries) instead of only the final response. Kept eager (`Vec`)
/// rather than a lazy generator: the one true lazy consumer in this
/// system is the session loop's own round-by-round drive, which talks to
/// `ProviderAdapter::stream` directly rather than through here.
pub async fn stream(
    provider: &dyn ProviderAdapter,
    policy: &RetryPolicy,
    mut request: CanonicalRequest,
    tools: &[Tool],
    max_tool_rounds: usize,
) -> SdkResult<RequestStreamOutput> {
    request.validate()?;
    let mut messages = request.normalized_messages();
    let active = active_tool_names(tools);
    let mut all_events = Vec::new();
    let mut total_usage = Usage::default();
    let mut round = 0usize;

    loop {
        request.input = RequestInput::Messages(messages.clone());
        let stream = retry_call(policy, || provider.stream(request.clone())).await?;
        tokio::pin!(stream);
        let mut acc = StreamAccumulator::new();
        while let Some(event) = stream.next().await {
            match event {
                Ok(ev) => {
                    acc.push(&ev);
                    all_events.push(Ok(ev));
                }
                Err(e) => {
                    all_events.push(Err(e.clone()));
                    return Err(e);
                }
            }
        }
        let response = acc.finish();
        total_usage.add(&response.usage);
        round += 1;

        let calls = response.tool_calls();
        let budget_exhausted = round >= max_tool_rounds;
        let all_passive = response.has_only_passive_tool_calls(&active);

        if calls.is_empty() || all_passive || budget_exhausted {
            return Ok(RequestStreamOutput {
                events: all_events,
                response,
            });
        }

        all_events.push(Ok(relay_core::StreamEvent::StepFinish {
            finish_reason: response.finish_reason,
            usage: response.usage,
        }));

        let results = execute_tool_calls(tools, &calls).await;
        messages.push(Turn::Assistant { content: response.content.clone() });
        messages.push(Turn::ToolResults { results });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{MockAdapter, MockRound};
    use relay_core::{ToolChoice, ToolExecutor, ToolSchema};
    use std::sync::Arc;

    struct EchoExecutor;

    #[async_trait::async_trait]
    impl ToolExecutor for EchoExecutor {
        async fn execute(&self, args: serde_json::Value) -> Result<String, String> {
            Ok(format!("echo:{args}"))
        }
    }

    fn req(prompt: &str) -> CanonicalRequest {
        CanonicalRequest {
            model: "test-model".into(),
            input: RequestInput::Prompt(prompt.into()),
            tool_choice: ToolChoice::Auto,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn generate_stops_on_text_only_response() {
        let adapter = MockAdapter::new(vec![MockRound::text("Hi")]);
        let policy = RetryPolicy::default();
        let out = generate(&adapter, &policy, req("hello"), &[], DEFAULT_MAX_TOOL_ROUNDS)
            .await
            .unwrap();
        assert_eq!(out.text, "Hi");
        assert_eq!(out.steps.len(), 1);
    }

    #[tokio::test]
    async fn generate_executes_active_tool_then_stops() {
        let adapter = MockAdapter::new(vec![
            MockRound::tool_call("t1", "echo", serde_json::json!({"x": 1})),
            MockRound::text("done"),
        ]);
        let tools = vec![Tool::active(
            ToolSchema {
                name: "echo".into(),
                description: "echoes".into(),
                parameters: serde_json::json!({}),
            },
            Arc::new(EchoExecutor),
        )];
        let policy = RetryPolicy::default();
        let out = generate(&adapter, &policy, req("go"), &tools, DEFAULT_MAX_TOOL_ROUNDS)
            .await
            .unwrap();
        assert_eq!(out.text, "done");
        assert_eq!(out.steps.len(), 2);
        assert_eq!(out.total_usage.output, 0);
    }

    #[tokio::test]
    async fn generate_returns_passive_tool_calls_unexecuted() {
        let adapter = MockAdapter::new(vec![MockRound::tool_call("t1", "noop", serde_json::json!({}))]);
        let tools = vec![Tool::passive(ToolSchema {
            name: "noop".into(),
            description: "passive".into(),
            parameters: serde_json::json!({}),
        })];
        let policy = RetryPolicy::default();
        let out = generate(&adapter, &policy, req("go"), &tools, DEFAULT_MAX_TOOL_ROUNDS)
            .await
            .unwrap();
        assert_eq!(out.tool_calls.len(), 1);
        assert_eq!(out.steps.len(), 1);
    }

    #[tokio::test]
    async fn generate_stops_at_round_budget() {
        let adapter = MockAdapter::new(vec![
            MockRound::tool_call("t1", "echo", serde_json::json!({})),
            MockRound::tool_call("t2", "echo", serde_json::json!({})),
            MockRound::tool_call("t3", "echo", serde_json::json!({})),
        ]);
        let tools = vec![Tool::active(
            ToolSchema {
                name: "echo".into(),
                description: "echoes".into(),
                parameters: serde_json::json!({}),
            },
            Arc::new(EchoExecutor),
        )];
        let policy = RetryPolicy::default();
        let out = generate(&adapter, &policy, req("go"), &tools, 2).await.unwrap();
        assert_eq!(out.steps.len(), 2);
    }

    #[tokio::test]
    async fn stream_emits_step_finish_between_rounds() {
        let adapter = MockAdapter::new(vec![
            MockRound::tool_call("t1", "echo", serde_json::json!({})),
            MockRound::text("done"),
        ]);
        let tools = vec![Tool::active(
            ToolSchema {
                name: "echo".into(),
                description: "echoes".into(),
                parameters: serde_json::json!({}),
            },
            Arc::new(EchoExecutor),
        )];
        let policy = RetryPolicy::default();
        let out = stream(&adapter, &policy, req("go"), &tools, DEFAULT_MAX_TOOL_ROUNDS)
            .await
            .unwrap();
        let has_step_finish = out
            .events
            .iter()
            .any(|e| matches!(e, Ok(relay_core::StreamEvent::StepFinish { .. })));
        assert!(has_step_finish);
        assert_eq!(out.response.text(), "done");
    }
}
