//! Error taxonomy and retry-policy types for the Switchyard routing domain.
//!
//! [`ProviderError`] is the classified failure a provider reports for a single
//! call. [`ErrorCode`] is the stable, machine-readable code attached to every
//! failure that crosses a component boundary (router errors, pipeline results).
//! Component-level error enums (`RouteError`, `StageError`) live in their
//! respective crates and map onto these codes.
//!
//! [`RetryPolicy`] is a cross-cutting concern: any error type that participates
//! in failover or caller retry decisions must be able to produce one.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// - `Retryable` errors: timeouts, transient rate-limit responses, 5xx.
///   The router moves on to the next candidate.
/// - `NonRetryable` errors: bad requests, content policy refusals. The router
///   returns the failure immediately without trying further candidates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    Retryable {
        /// Minimum back-off before the next attempt. `None` means retry
        /// immediately or apply the caller's own back-off schedule.
        after: Option<Duration>,
    },
    /// The operation must not be retried.
    NonRetryable,
}

impl RetryPolicy {
    /// Retryable with no minimum delay.
    pub fn retryable() -> Self {
        Self::Retryable { after: None }
    }

    /// Returns `true` for [`RetryPolicy::Retryable`].
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable { .. })
    }
}

// ---------------------------------------------------------------------------
// Stable error codes
// ---------------------------------------------------------------------------

/// Machine-readable code for every failure surfaced by the router or pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// No registered provider supports the requested capability kind.
    NoProviderAvailable,
    /// The rolling spend ceiling has been reached.
    BudgetExceeded,
    /// A provider reported a classified failure.
    ProviderError,
    /// Every candidate failed or was skipped by an open circuit.
    AllProvidersFailed,
    /// The validation gate stopped a pipeline run.
    ValidationFailed,
    /// A stage failed unexpectedly.
    PipelineError,
}

impl ErrorCode {
    /// Returns the wire form, e.g. `"VALIDATION_FAILED"`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoProviderAvailable => "NO_PROVIDER_AVAILABLE",
            Self::BudgetExceeded => "BUDGET_EXCEEDED",
            Self::ProviderError => "PROVIDER_ERROR",
            Self::AllProvidersFailed => "ALL_PROVIDERS_FAILED",
            Self::ValidationFailed => "VALIDATION_FAILED",
            Self::PipelineError => "PIPELINE_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Provider failures
// ---------------------------------------------------------------------------

/// Classification of a provider failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    /// Rate limited (429).
    RateLimited,
    /// Server-side failure (5xx) or overload.
    ServerError,
    /// Connection could not be established or was reset.
    Network,
    /// The provider did not answer within its own deadline.
    Timeout,
    /// The request was rejected (400/401/403/404); sending it again will not help.
    ClientError,
    /// The response could not be interpreted.
    InvalidResponse,
    /// The provider refused the content.
    ContentPolicy,
    /// The provider panicked while handling the call.
    Panicked,
}

impl ProviderErrorKind {
    /// Default retry classification for this kind.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            Self::RateLimited
                | Self::ServerError
                | Self::Network
                | Self::Timeout
                | Self::Panicked
        )
    }
}

impl std::fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::RateLimited => "rate limited",
            Self::ServerError => "server error",
            Self::Network => "network error",
            Self::Timeout => "timeout",
            Self::ClientError => "client error",
            Self::InvalidResponse => "invalid response",
            Self::ContentPolicy => "content policy",
            Self::Panicked => "provider panicked",
        };
        f.write_str(s)
    }
}

/// A classified failure reported by a provider for a single call.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct ProviderError {
    /// What went wrong.
    pub kind: ProviderErrorKind,
    /// Provider-supplied description.
    pub message: String,
    /// Whether failover may continue past this error.
    pub retry: RetryPolicy,
}

impl ProviderError {
    /// Creates an error whose retry policy follows [`ProviderErrorKind::is_transient`].
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        let retry = if kind.is_transient() {
            RetryPolicy::retryable()
        } else {
            RetryPolicy::NonRetryable
        };
        Self {
            kind,
            message: message.into(),
            retry,
        }
    }

    /// Creates an error that explicitly allows failover.
    pub fn retryable(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retry: RetryPolicy::retryable(),
        }
    }

    /// Creates an error that stops failover.
    pub fn non_retryable(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retry: RetryPolicy::NonRetryable,
        }
    }

    /// Returns `true` if failover may continue past this error.
    pub fn is_retryable(&self) -> bool {
        self.retry.is_retryable()
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors raised while assembling a router or pipeline from configuration.
///
/// Produced at construction time; nothing starts routing with an invalid
/// configuration.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// Two providers were registered under the same name.
    #[error("duplicate provider name '{0}'")]
    DuplicateProvider(String),

    /// A configuration value is out of range or malformed.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
