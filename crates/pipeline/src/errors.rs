//! Stage-level errors and the failure record a run ends with.

use domain::{CapabilityKind, ErrorCode, ProviderError, ProviderName};
use router::RouteError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Stage errors
// ---------------------------------------------------------------------------

/// Why a single stage adapter could not produce its output.
///
/// A failed validation is *not* a stage error: the adapter returns the report
/// and the pipeline decides whether to gate on it.
#[derive(Debug, Error, PartialEq)]
pub enum StageError {
    /// The router could not produce an outcome.
    ///
    /// Produced by: no capable provider, budget gate, exhausted failover.
    #[error(transparent)]
    Route(#[from] RouteError),

    /// The router returned a failed outcome (non-retryable provider error).
    #[error("provider '{provider}' failed: {error}")]
    Provider {
        provider: ProviderName,
        error: ProviderError,
    },

    /// The provider answered with a payload for a different capability kind.
    #[error("expected {expected} output, got {actual}")]
    UnexpectedOutput {
        expected: CapabilityKind,
        actual: CapabilityKind,
    },
}

impl StageError {
    /// Code of the underlying cause.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Route(err) => err.code(),
            Self::Provider { .. } => ErrorCode::ProviderError,
            Self::UnexpectedOutput { .. } => ErrorCode::PipelineError,
        }
    }
}

// ---------------------------------------------------------------------------
// Run failure
// ---------------------------------------------------------------------------

/// Terminal failure attached to an unsuccessful [`crate::PipelineResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineFailure {
    /// `VALIDATION_FAILED` for a gated stop, `PIPELINE_ERROR` otherwise.
    pub code: ErrorCode,
    pub message: String,
    pub retryable: bool,
    /// Code of the stage error behind a `PIPELINE_ERROR`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<ErrorCode>,
}

impl PipelineFailure {
    /// A gated stop on a failed validation. Always retryable: a revised
    /// brief is expected to pass.
    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::ValidationFailed,
            message: message.into(),
            retryable: true,
            cause: None,
        }
    }

    /// A hard failure raised by a stage.
    pub fn stage_error(error: &StageError, retryable: bool) -> Self {
        Self {
            code: ErrorCode::PipelineError,
            message: error.to_string(),
            retryable,
            cause: Some(error.code()),
        }
    }
}

#[cfg(test)]
mod tests {
    use domain::ProviderErrorKind;

    use super::*;

    #[test]
    fn stage_error_codes_follow_the_cause() {
        let route = StageError::from(RouteError::NoProviderAvailable {
            kind: CapabilityKind::ImageSynthesis,
        });
        assert_eq!(route.code(), ErrorCode::NoProviderAvailable);

        let provider = StageError::Provider {
            provider: ProviderName::new("p").unwrap(),
            error: ProviderError::new(ProviderErrorKind::ContentPolicy, "refused"),
        };
        assert_eq!(provider.code(), ErrorCode::ProviderError);

        let failure = PipelineFailure::stage_error(&provider, false);
        assert_eq!(failure.code, ErrorCode::PipelineError);
        assert_eq!(failure.cause, Some(ErrorCode::ProviderError));
        assert!(!failure.retryable);
    }

    #[test]
    fn validation_failure_serializes_with_wire_code() {
        let json = serde_json::to_value(PipelineFailure::validation_failed("blocked")).unwrap();
        assert_eq!(json["code"], "VALIDATION_FAILED");
        assert_eq!(json["retryable"], true);
        assert!(json.get("cause").is_none());
    }
}
