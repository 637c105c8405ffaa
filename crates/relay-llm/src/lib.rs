//! Canonical LLM request layer: provider abstraction, stream folding,
//! retry, and the standalone generate/stream entry points.

pub mod accumulator;
pub mod adapters;
pub mod provider;
pub mod request;
pub mod retry;

pub use accumulator::StreamAccumulator;
pub use adapters::anthropic_like::{AnthropicLikeAdapter, EnvConfig};
pub use adapters::mock::{MockAdapter, MockBehavior, MockRound};
pub use provider::{EventStream, ProviderAdapter};
pub use request::{generate, stream, GenerateOutput, RequestStreamOutput, DEFAULT_MAX_TOOL_ROUNDS};
pub use retry::{retry_call, RetryPolicy};
