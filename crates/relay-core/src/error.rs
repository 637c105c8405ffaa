//! Error hierarchy shared by every layer above the canonical types.

use thiserror::Error;

/// Top-level error type returned by the LLM request layer and the session loop.
#[derive(Error, Debug, Clone)]
pub enum SdkError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("operation aborted")]
    Abort,

    #[error("stream error: {0}")]
    Stream(String),

    #[error("no object could be generated from the response")]
    NoObjectGenerated,

    #[error("invalid tool call: {0}")]
    InvalidToolCall(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl SdkError {
    /// Wraps a non-`Error` throw (e.g. a raw string from an executor) per §7's
    /// "non-error throws are converted to an error with that string as message".
    pub fn from_raw(message: impl Into<String>) -> Self {
        SdkError::Internal(message.into())
    }

    /// True for errors the retry engine is allowed to retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            SdkError::Provider(p) => p.retryable,
            SdkError::Network(_) | SdkError::Timeout => true,
            _ => false,
        }
    }

    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            SdkError::Provider(p) => p.retry_after_ms,
            _ => None,
        }
    }
}

impl From<std::io::Error> for SdkError {
    fn from(e: std::io::Error) -> Self {
        SdkError::Internal(e.to_string())
    }
}

impl From<serde_json::Error> for SdkError {
    fn from(e: serde_json::Error) -> Self {
        SdkError::Stream(e.to_string())
    }
}

/// The classification a `ProviderAdapter` assigns to a failed call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{provider}: {kind:?} (status {status_code:?}): {message}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
    pub provider: String,
    pub status_code: Option<u16>,
    pub retryable: bool,
    pub retry_after_ms: Option<u64>,
    pub error_code: Option<String>,
}

impl ProviderError {
    pub fn new(provider: impl Into<String>, kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        let retryable = kind.is_retryable();
        Self {
            kind,
            message: message.into(),
            provider: provider.into(),
            status_code: None,
            retryable,
            retry_after_ms: None,
            error_code: None,
        }
    }

    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn with_retry_after_ms(mut self, ms: u64) -> Self {
        self.retry_after_ms = Some(ms);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    Authentication,
    AccessDenied,
    NotFound,
    InvalidRequest,
    ContextLength,
    ContentFilter,
    RateLimit,
    Quota,
    Server,
}

impl ProviderErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(self, ProviderErrorKind::RateLimit | ProviderErrorKind::Server)
    }
}

/// Classifies an HTTP status + response body per the table in §4.A.
///
/// 400 is disambiguated by scanning the body for a content-filter or
/// context-length signature before falling back to `InvalidRequest`.
pub fn classify_status(status: u16, body: &str) -> ProviderErrorKind {
    match status {
        401 => ProviderErrorKind::Authentication,
        403 => ProviderErrorKind::AccessDenied,
        404 => ProviderErrorKind::NotFound,
        413 => ProviderErrorKind::ContextLength,
        422 => ProviderErrorKind::InvalidRequest,
        429 => ProviderErrorKind::RateLimit,
        400 => classify_400_body(body),
        s if (500..600).contains(&s) => ProviderErrorKind::Server,
        _ => ProviderErrorKind::InvalidRequest,
    }
}

fn classify_400_body(body: &str) -> ProviderErrorKind {
    let lower = body.to_ascii_lowercase();
    let content_filter = ["content_filter", "content_policy", "safety"];
    let context_length = ["context_length", "too many tokens", "maximum context"];
    if content_filter.iter().any(|needle| lower.contains(needle)) {
        ProviderErrorKind::ContentFilter
    } else if context_length.iter().any(|needle| lower.contains(needle)) {
        ProviderErrorKind::ContextLength
    } else {
        ProviderErrorKind::InvalidRequest
    }
}

/// Parses a `Retry-After` header value: decimal seconds, an HTTP-date, or
/// neither (returns `None`).
pub fn parse_retry_after(value: &str) -> Option<u64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(seconds) = trimmed.parse::<u64>() {
        return Some(seconds * 1000);
    }
    parse_http_date_retry_after(trimmed)
}

fn parse_http_date_retry_after(value: &str) -> Option<u64> {
    let target = httpdate::parse_http_date(value).ok()?;
    let now = std::time::SystemTime::now();
    let delta = target.duration_since(now).unwrap_or(std::time::Duration::ZERO);
    Some(delta.as_millis() as u64)
}

pub type SdkResult<T> = std::result::Result<T, SdkError>;
