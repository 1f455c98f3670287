//! The `Dispatcher` trait: the narrow contract every backend adapter
//! implements.

use async_trait::async_trait;

use waypoint_types::{CapabilitySet, DispatchResult, GatewayError, GenerationRequest, Pricing};

/// A pluggable backend adapter.
///
/// The gateway treats implementations as opaque: it invokes [`dispatch`]
/// under a deadline (the future is dropped on timeout, which is the
/// cancellation signal) and reads the static declarations.
///
/// Contract:
/// - Implementations must be reentrant; the gateway invokes the same
///   dispatcher concurrently for different requests and never under a held
///   lock.
/// - Errors must be classified into the gateway taxonomy. Anything reported
///   as `Transient`, `RateLimited`, `Timeout`, or `ProviderUnavailable` is
///   retried on a fallback backend; other kinds are surfaced to the caller.
/// - [`DispatchResult`] must report actual input/output units (tokens or
///   equivalent) so billing and free-quota reconciliation stay truthful.
///
/// [`dispatch`]: Dispatcher::dispatch
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Execute one request against the backend.
    ///
    /// # Errors
    /// Returns a [`GatewayError`] classified into the dispatch taxonomy.
    async fn dispatch(&self, request: &GenerationRequest) -> Result<DispatchResult, GatewayError>;

    /// Capability tags this backend serves.
    fn capabilities(&self) -> CapabilitySet;

    /// Per-unit pricing and free-tier declaration.
    fn pricing(&self) -> Pricing;
}
