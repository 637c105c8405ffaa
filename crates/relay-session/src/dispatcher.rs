//! Tool Dispatcher (§4.I): executes a batch of pending tool calls against
//! a registry snapshot, either sequentially or in parallel depending on
//! the profile's `supports_parallel_tool_calls` flag. Grounded on the
//! teacher's sequential tool-execution loop in `runtime.rs`
//! (`execute_cancellable`, per-call error capture), generalized to also
//! support the parallel, order-preserving case the teacher never needed.

use futures::future::join_all;
use relay_tools::ToolRegistry;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct PendingToolCall {
    pub id: String,
    pub name: String,
    pub args: Value,
}

#[derive(Debug, Clone)]
pub struct ToolCallResult {
    pub id: String,
    pub name: String,
    pub output: String,
    pub is_error: bool,
}

pub async fn dispatch(
    calls: Vec<PendingToolCall>,
    registry: &ToolRegistry,
    parallel: bool,
    cancel: &CancellationToken,
) -> Vec<ToolCallResult> {
    if parallel {
        dispatch_parallel(calls, registry, cancel).await
    } else {
        dispatch_sequential(calls, registry, cancel).await
    }
}

async fn dispatch_sequential(
    calls: Vec<PendingToolCall>,
    registry: &ToolRegistry,
    cancel: &CancellationToken,
) -> Vec<ToolCallResult> {
    let mut results = Vec::with_capacity(calls.len());
    for call in calls {
        results.push(run_one(call, registry, cancel).await);
    }
    results
}

async fn dispatch_parallel(
    calls: Vec<PendingToolCall>,
    registry: &ToolRegistry,
    cancel: &CancellationToken,
) -> Vec<ToolCallResult> {
    let futures = calls.into_iter().map(|call| run_one(call, registry, cancel));
    join_all(futures).await
}

async fn run_one(call: PendingToolCall, registry: &ToolRegistry, cancel: &CancellationToken) -> ToolCallResult {
    let PendingToolCall { id, name, args } = call;

    let Some(tool) = registry.get(&name) else {
        let available: Vec<&str> = registry.list().map(|t| t.name()).collect();
        return ToolCallResult {
            id,
            name: name.clone(),
            output: format!("Unknown tool: {name}. Available: {}", available.join(", ")),
            is_error: true,
        };
    };

    let Some(executor) = &tool.executor else {
        return ToolCallResult {
            id,
            name: name.clone(),
            output: format!("Unknown tool: {name}. Available: no active executor for this tool"),
            is_error: true,
        };
    };

    if !args.is_object() {
        return ToolCallResult {
            id,
            name,
            output: "Invalid tool arguments".to_string(),
            is_error: true,
        };
    }

    if cancel.is_cancelled() {
        return ToolCallResult {
            id,
            name,
            output: "Tool execution cancelled".to_string(),
            is_error: true,
        };
    }

    match executor.execute(args).await {
        Ok(output) => ToolCallResult {
            id,
            name,
            output,
            is_error: false,
        },
        Err(message) => ToolCallResult {
            id,
            name: name.clone(),
            output: format!("Tool error in {name}: {message}"),
            is_error: true,
        },
    }
}
