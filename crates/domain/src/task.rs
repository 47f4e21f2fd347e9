//! Units of work and their results.
//!
//! Both request and response payloads are tagged unions keyed by
//! [`CapabilityKind`]. A [`Task`] derives its kind from its input, so the two
//! can never disagree, and stage adapters pattern-match [`TaskOutput`] instead
//! of probing loosely-typed JSON.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    CapabilityKind, Cost, ProviderError, ProviderName, Timestamp, ValidationIssue,
    ValidationScore,
};

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Where a vision provider should read an image from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ImageSource {
    /// A URL the provider can fetch itself.
    Url {
        /// Absolute URL.
        url: String,
    },
    /// Inline, base64-encoded image bytes.
    Inline {
        /// MIME type, e.g. `"image/png"`.
        mime_type: String,
        /// Base64 payload.
        data: String,
    },
}

/// Request payload, one variant per capability kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TaskInput {
    /// Describe an image.
    VisionAnalysis {
        /// Image to analyse.
        image: ImageSource,
        /// Optional focus for the analysis.
        instructions: Option<String>,
    },
    /// Generate text from a brief.
    TextGeneration {
        /// The brief.
        prompt: String,
        /// Structured result of a prior vision analysis, if any.
        context: Option<AnalysisResult>,
    },
    /// Judge text against criteria.
    TextValidation {
        /// Text under review.
        content: String,
        /// Criteria the text must satisfy; empty means provider defaults.
        criteria: Vec<String>,
    },
    /// Render one image from a prompt.
    ImageSynthesis {
        /// Rendering prompt.
        prompt: String,
        /// Zero-based index when several variants are requested.
        variant: u32,
    },
}

impl TaskInput {
    /// The capability kind this payload requests.
    pub fn kind(&self) -> CapabilityKind {
        match self {
            Self::VisionAnalysis { .. } => CapabilityKind::VisionAnalysis,
            Self::TextGeneration { .. } => CapabilityKind::TextGeneration,
            Self::TextValidation { .. } => CapabilityKind::TextValidation,
            Self::ImageSynthesis { .. } => CapabilityKind::ImageSynthesis,
        }
    }
}

/// Provider-agnostic tuning knobs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskOptions {
    /// Upper bound on generated tokens.
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Provider-specific extras, passed through untouched.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// An immutable unit of work routed to exactly one provider per attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    input: TaskInput,
    options: TaskOptions,
}

impl Task {
    /// Creates a task with default options.
    pub fn new(input: TaskInput) -> Self {
        Self {
            input,
            options: TaskOptions::default(),
        }
    }

    /// Creates a task with explicit options.
    pub fn with_options(input: TaskInput, options: TaskOptions) -> Self {
        Self { input, options }
    }

    /// The requested capability kind.
    pub fn kind(&self) -> CapabilityKind {
        self.input.kind()
    }

    /// The request payload.
    pub fn input(&self) -> &TaskInput {
        &self.input
    }

    /// The tuning options.
    pub fn options(&self) -> &TaskOptions {
        &self.options
    }
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

/// Structured result of a vision analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Free-text description of the image.
    pub description: String,
    /// Short labels (objects, styles, colours).
    #[serde(default)]
    pub labels: Vec<String>,
    /// Named attributes extracted from the image.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

/// Generated text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    /// The generated text.
    pub text: String,
}

/// Verdict of a text validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Whether the text is acceptable.
    pub passes: bool,
    /// Provider confidence, if reported.
    pub score: Option<ValidationScore>,
    /// Individual findings.
    #[serde(default)]
    pub issues: Vec<ValidationIssue>,
    /// Suggested revisions.
    #[serde(default)]
    pub suggestions: Vec<String>,
}

/// A rendered image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAsset {
    /// Location of the rendered image (URL or data URI).
    pub uri: String,
    /// MIME type, e.g. `"image/png"`.
    pub mime_type: String,
    /// Width in pixels, if known.
    pub width: Option<u32>,
    /// Height in pixels, if known.
    pub height: Option<u32>,
}

/// Response payload, one variant per capability kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum TaskOutput {
    /// Answer to [`TaskInput::VisionAnalysis`].
    #[serde(rename = "vision-analysis")]
    Analysis(AnalysisResult),
    /// Answer to [`TaskInput::TextGeneration`].
    #[serde(rename = "text-generation")]
    Generation(GenerationResult),
    /// Answer to [`TaskInput::TextValidation`].
    #[serde(rename = "text-validation")]
    Validation(ValidationReport),
    /// Answer to [`TaskInput::ImageSynthesis`].
    #[serde(rename = "image-synthesis")]
    Synthesis(ImageAsset),
}

impl TaskOutput {
    /// The capability kind this payload answers.
    pub fn kind(&self) -> CapabilityKind {
        match self {
            Self::Analysis(_) => CapabilityKind::VisionAnalysis,
            Self::Generation(_) => CapabilityKind::TextGeneration,
            Self::Validation(_) => CapabilityKind::TextValidation,
            Self::Synthesis(_) => CapabilityKind::ImageSynthesis,
        }
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// The result of one provider attempt, as returned by the router.
///
/// Failed outcomes carry zero cost; only successful outcomes are recorded in
/// the spend ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    /// Provider that handled the attempt.
    pub provider: ProviderName,
    /// Capability kind that was requested.
    pub kind: CapabilityKind,
    /// Payload on success, classified error on failure.
    pub result: Result<TaskOutput, ProviderError>,
    /// Cost charged by the provider.
    pub cost: Cost,
    /// When the attempt finished.
    pub timestamp: Timestamp,
    /// Wall-clock duration of the attempt.
    pub elapsed: Duration,
}

impl Outcome {
    /// Returns `true` if the attempt produced a payload.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// The payload, if the attempt succeeded.
    pub fn output(&self) -> Option<&TaskOutput> {
        self.result.as_ref().ok()
    }

    /// The classified error, if the attempt failed.
    pub fn error(&self) -> Option<&ProviderError> {
        self.result.as_ref().err()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_kind_follows_input() {
        let task = Task::new(TaskInput::TextValidation {
            content: "hello".into(),
            criteria: vec![],
        });
        assert_eq!(task.kind(), CapabilityKind::TextValidation);
    }

    #[test]
    fn output_is_tagged_by_capability_kind() {
        let output = TaskOutput::Generation(GenerationResult {
            text: "a red fox".into(),
        });
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["kind"], "text-generation");
        assert_eq!(json["text"], "a red fox");
        let back: TaskOutput = serde_json::from_value(json).unwrap();
        assert_eq!(back.kind(), CapabilityKind::TextGeneration);
    }
}
