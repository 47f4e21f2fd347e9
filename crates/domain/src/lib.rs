//! Core routing domain for Switchyard.
//!
//! This crate contains every domain concept, newtype identifier, shared primitive
//! type, and cross-cutting error type used by the router and the pipeline.
//! Adapter crates implement the traits defined here; they never add domain rules.
//!
//! ## Architectural Layer
//!
//! **Business types + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; adapter crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`ProviderName`, `PipelineRunId`) |
//! | [`types`] | Shared value types (`CapabilityKind`, `Cost`, `CostLimit`, `Timestamp`, etc.) |
//! | [`task`] | `Task`, tagged request/response payloads, `Outcome` |
//! | [`errors`] | Error taxonomy, `ErrorCode` and `RetryPolicy` |
//! | [`provider`] | The `Provider` port and its descriptor |
//! | [`clock`] | The `Clock` port with system and manual implementations |

pub mod clock;
pub mod errors;
pub mod identifiers;
pub mod provider;
pub mod task;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::{ConfigError, ErrorCode, ProviderError, ProviderErrorKind, RetryPolicy};
pub use identifiers::{PipelineRunId, ProviderName};
pub use provider::{Provider, ProviderDescriptor, ProviderReply};
pub use task::{
    AnalysisResult, GenerationResult, ImageAsset, ImageSource, Outcome, Task, TaskInput,
    TaskOptions, TaskOutput, ValidationReport,
};
pub use types::{
    CapabilityKind, Cost, CostLimit, IssueSeverity, Timestamp, ValidationIssue, ValidationScore,
};
