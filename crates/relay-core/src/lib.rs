//! Canonical types and error hierarchy shared by the LLM layer and the
//! session loop.

pub mod error;
pub mod types;

pub use error::{ProviderError, ProviderErrorKind, SdkError, SdkResult};
pub use types::*;
