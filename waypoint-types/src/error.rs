use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::BackendId;

/// Unified error type for the waypoint workspace.
///
/// This wraps routing failures, backend-tagged dispatch failures, resource
/// exhaustion, and an aggregate for multi-backend attempts. Every variant
/// maps to a stable [`ErrorKind`] so callers and telemetry consumers never
/// parse message text.
#[derive(Debug, Error, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GatewayError {
    /// The router's eligible set was empty and no default backend is
    /// configured.
    #[error("no eligible backends: {reason}")]
    NoEligibleBackends {
        /// Why each candidate was excluded (circuit open, missing capability, ...).
        reason: String,
    },

    /// The fallback chain was exhausted; contains the individual failures.
    #[error("all providers failed: {0:?}")]
    AllProvidersFailed(Vec<GatewayError>),

    /// Network-level or upstream 5xx failure; retryable on a fallback.
    #[error("{backend} transient failure: {msg}")]
    Transient {
        /// Backend that failed.
        backend: BackendId,
        /// Human-readable upstream message.
        msg: String,
    },

    /// Upstream throttle or local bucket refusal; retryable on a fallback.
    #[error("{backend} rate limited: retry_in_ms={retry_in_ms}")]
    RateLimited {
        /// Backend that refused the request.
        backend: BackendId,
        /// Milliseconds until the limiting window resets, when known.
        retry_in_ms: u64,
    },

    /// A single dispatch exceeded its deadline; retryable on a fallback.
    #[error("dispatch timed out on {backend}")]
    Timeout {
        /// Backend that timed out.
        backend: BackendId,
    },

    /// Circuit-open refusal or adapter initialization failure; retryable.
    #[error("provider unavailable: {backend} ({msg})")]
    ProviderUnavailable {
        /// Backend that was unavailable.
        backend: BackendId,
        /// Why the backend was unavailable.
        msg: String,
    },

    /// Credentials were rejected; terminal, the caller must fix configuration.
    #[error("authentication failed for {backend}")]
    AuthFailed {
        /// Backend that rejected the credentials.
        backend: BackendId,
    },

    /// The request was rejected for structural reasons; terminal.
    #[error("malformed request: {msg}")]
    Malformed {
        /// Description of the structural problem.
        msg: String,
    },

    /// The request exceeds the selected backend's context window; terminal.
    #[error("context window exceeded on {backend}: requested={requested} limit={limit}")]
    ContextExceeded {
        /// Backend whose window was exceeded.
        backend: BackendId,
        /// Units the request required.
        requested: u64,
        /// Units the backend accepts.
        limit: u64,
    },

    /// Declared quotas are consumed and no paid fallback is eligible; terminal
    /// unless the caller raises budget.
    #[error("quota exhausted on {backend}: next_reset_in_ms={next_reset_in_ms}")]
    QuotaExhausted {
        /// Backend whose quota ran out.
        backend: BackendId,
        /// Milliseconds until the quota window resets.
        next_reset_in_ms: u64,
    },

    /// Gateway configuration is invalid (unknown key, unregistered default
    /// backend, out-of-range value).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid caller-supplied argument.
    #[error("invalid argument: {0}")]
    InvalidArg(String),

    /// A snapshot blob failed validation (bad schema, checksum mismatch,
    /// truncated body).
    #[error("snapshot rejected: {0}")]
    Snapshot(String),
}

/// Stable machine-readable classification of a [`GatewayError`].
///
/// This is the tag telemetry events and dispatch reports carry; it is a
/// closed set per the error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// See [`GatewayError::NoEligibleBackends`].
    NoEligibleBackends,
    /// See [`GatewayError::AllProvidersFailed`].
    AllProvidersFailed,
    /// See [`GatewayError::Transient`].
    Transient,
    /// See [`GatewayError::RateLimited`].
    RateLimited,
    /// See [`GatewayError::Timeout`].
    Timeout,
    /// See [`GatewayError::ProviderUnavailable`].
    ProviderUnavailable,
    /// See [`GatewayError::AuthFailed`].
    AuthFailed,
    /// See [`GatewayError::Malformed`].
    Malformed,
    /// See [`GatewayError::ContextExceeded`].
    ContextExceeded,
    /// See [`GatewayError::QuotaExhausted`].
    QuotaExhausted,
    /// Configuration, argument, or snapshot failures outside the dispatch
    /// taxonomy.
    Internal,
}

impl ErrorKind {
    /// Stable, kebab-case code for logs and caller-facing payloads.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NoEligibleBackends => "no-eligible-backends",
            Self::AllProvidersFailed => "all-providers-failed",
            Self::Transient => "transient",
            Self::RateLimited => "rate-limited",
            Self::Timeout => "timeout",
            Self::ProviderUnavailable => "provider-unavailable",
            Self::AuthFailed => "auth-failed",
            Self::Malformed => "malformed",
            Self::ContextExceeded => "context-exceeded",
            Self::QuotaExhausted => "quota-exhausted",
            Self::Internal => "internal",
        }
    }

    /// True when a failure of this kind may be retried on another backend.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Transient | Self::RateLimited | Self::Timeout | Self::ProviderUnavailable
        )
    }

    /// True when the failure pattern suggests a backend cold start (model
    /// spin-up) rather than a hard fault. Feeds circuit-breaker hysteresis.
    #[must_use]
    pub const fn is_cold_start(self) -> bool {
        matches!(self, Self::Timeout | Self::ProviderUnavailable)
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.code())
    }
}

impl GatewayError {
    /// Helper: build a `Transient` error with the backend name and message.
    pub fn transient(backend: impl Into<BackendId>, msg: impl Into<String>) -> Self {
        Self::Transient {
            backend: backend.into(),
            msg: msg.into(),
        }
    }

    /// Helper: build a `ProviderUnavailable` error.
    pub fn unavailable(backend: impl Into<BackendId>, msg: impl Into<String>) -> Self {
        Self::ProviderUnavailable {
            backend: backend.into(),
            msg: msg.into(),
        }
    }

    /// Helper: build a `NoEligibleBackends` error from an exclusion summary.
    #[must_use]
    pub fn no_eligible(reason: impl Into<String>) -> Self {
        Self::NoEligibleBackends {
            reason: reason.into(),
        }
    }

    /// Helper: build a `Malformed` error.
    #[must_use]
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed { msg: msg.into() }
    }

    /// Classification used by the execution engine and telemetry.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NoEligibleBackends { .. } => ErrorKind::NoEligibleBackends,
            Self::AllProvidersFailed(_) => ErrorKind::AllProvidersFailed,
            Self::Transient { .. } => ErrorKind::Transient,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::ProviderUnavailable { .. } => ErrorKind::ProviderUnavailable,
            Self::AuthFailed { .. } => ErrorKind::AuthFailed,
            Self::Malformed { .. } => ErrorKind::Malformed,
            Self::ContextExceeded { .. } => ErrorKind::ContextExceeded,
            Self::QuotaExhausted { .. } => ErrorKind::QuotaExhausted,
            Self::InvalidConfig(_) | Self::InvalidArg(_) | Self::Snapshot(_) => ErrorKind::Internal,
        }
    }

    /// True when the engine should advance to the next fallback after this
    /// error instead of surfacing it.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// Backend this error is attributed to, when it names one.
    #[must_use]
    pub const fn backend(&self) -> Option<&BackendId> {
        match self {
            Self::Transient { backend, .. }
            | Self::RateLimited { backend, .. }
            | Self::Timeout { backend }
            | Self::ProviderUnavailable { backend, .. }
            | Self::AuthFailed { backend }
            | Self::ContextExceeded { backend, .. }
            | Self::QuotaExhausted { backend, .. } => Some(backend),
            _ => None,
        }
    }

    /// Flatten nested `AllProvidersFailed` structures into a plain vector.
    ///
    /// This preserves other error variants as-is and unwraps recursively.
    #[must_use]
    pub fn flatten(self) -> Vec<Self> {
        match self {
            Self::AllProvidersFailed(list) => list.into_iter().flat_map(Self::flatten).collect(),
            other => vec![other],
        }
    }
}
