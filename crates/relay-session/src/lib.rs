//! The Session Loop: a state machine that drives multi-turn conversations
//! with a provider, dispatching tool calls, accepting mid-turn steering,
//! detecting repetition, and tracking context-window usage.

pub mod context_tracker;
pub mod dispatcher;
pub mod event_bus;
pub mod loop_detector;
pub mod session;
pub mod steering;
pub mod subagent;
pub mod truncation;

pub use context_tracker::{estimate_tokens, ContextTracker};
pub use dispatcher::{dispatch, PendingToolCall, ToolCallResult};
pub use event_bus::{EventBus, EventBusReceiver};
pub use loop_detector::LoopDetector;
pub use session::{Session, SessionConfig};
pub use steering::SteeringQueue;
pub use subagent::{SubAgentMap, SubAgentOutcome, SubAgentSnapshot};
pub use truncation::Truncator;
