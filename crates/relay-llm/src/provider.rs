//! The `ProviderAdapter` trait — the opaque boundary between the canonical
//! request/response layer and any concrete wire format.

use futures::Stream;
use relay_core::{CanonicalRequest, CanonicalResponse, SdkResult, StreamEvent};
use std::pin::Pin;

pub type EventStream = Pin<Box<dyn Stream<Item = SdkResult<StreamEvent>> + Send>>;

/// Maps a canonical request onto a concrete provider's wire format and
/// back. Implementations classify HTTP errors onto the hierarchy in
/// `relay_core::error` themselves — nothing above this boundary knows
/// about status codes or response bodies.
#[async_trait::async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn name(&self) -> &str;

    /// Non-streaming call. The default implementation folds `stream()`
    /// through a `StreamAccumulator`, which is correct for any adapter
    /// that has no cheaper non-streaming transport of its own.
    async fn complete(&self, request: CanonicalRequest) -> SdkResult<CanonicalResponse> {
        let stream = self.stream(request).await?;
        crate::accumulator::StreamAccumulator::fold(stream).await
    }

    async fn stream(&self, request: CanonicalRequest) -> SdkResult<EventStream>;

    /// Releases any held connections. No-op by default.
    async fn close(&self) {}
}
