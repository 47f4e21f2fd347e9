//! Errors raised by [`crate::Router::route`].
//!
//! Non-fatal provider failures never appear here: a non-retryable provider
//! failure comes back as a failed [`domain::Outcome`]. These variants are the
//! conditions under which no outcome can be produced at all.

use domain::{CapabilityKind, Cost, ErrorCode, ProviderError, ProviderName};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum RouteError {
    /// No registered (and allowed) provider supports the requested kind.
    #[error("no provider available for {kind}")]
    NoProviderAvailable { kind: CapabilityKind },

    /// The pre-flight budget gate refused the call.
    #[error("budget exceeded (today {daily}, this month {monthly})")]
    BudgetExceeded { daily: Cost, monthly: Cost },

    /// Every candidate failed with a retryable error or was skipped by an
    /// open circuit.
    #[error("all providers failed for {kind}: {}", describe(.last_error))]
    AllProvidersFailed {
        kind: CapabilityKind,
        /// Providers that were executed and failed, in attempt order.
        attempted: Vec<ProviderName>,
        /// Providers skipped because their circuit was open.
        skipped: Vec<ProviderName>,
        /// The last provider error seen, if any provider was executed.
        last_error: Option<ProviderError>,
    },
}

impl RouteError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NoProviderAvailable { .. } => ErrorCode::NoProviderAvailable,
            Self::BudgetExceeded { .. } => ErrorCode::BudgetExceeded,
            Self::AllProvidersFailed { .. } => ErrorCode::AllProvidersFailed,
        }
    }
}

fn describe(last_error: &Option<ProviderError>) -> String {
    match last_error {
        Some(err) => err.to_string(),
        None => "every candidate skipped by an open circuit".to_string(),
    }
}
