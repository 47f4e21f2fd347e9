//! Pipeline inputs, options and results.

use std::time::Duration;

use domain::{
    AnalysisResult, Cost, GenerationResult, ImageAsset, ImageSource, PipelineRunId, ProviderName,
    Timestamp, ValidationReport,
};
use serde::{Deserialize, Serialize};

use crate::errors::PipelineFailure;

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// Where a run is, or where it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    #[serde(rename = "image-analysis")]
    Analysis,
    #[serde(rename = "text-generation")]
    Generation,
    #[serde(rename = "cultural-validation")]
    Validation,
    #[serde(rename = "image-synthesis")]
    Synthesis,
    #[serde(rename = "complete")]
    Complete,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Analysis => "image-analysis",
            Self::Generation => "text-generation",
            Self::Validation => "cultural-validation",
            Self::Synthesis => "image-synthesis",
            Self::Complete => "complete",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What one routed call produced for a stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord<T> {
    pub output: T,
    pub provider: ProviderName,
    pub cost: Cost,
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// Input and options
// ---------------------------------------------------------------------------

/// Caller-tunable run behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    /// Skip analysis even when an image is supplied.
    pub skip_analysis: bool,
    pub skip_validation: bool,
    /// End the run with `VALIDATION_FAILED` when validation does not pass.
    pub stop_on_validation_failure: bool,
    /// Number of images to synthesize. Values below 1 are treated as 1.
    pub asset_count: u32,
    /// Retry classification attached to `PIPELINE_ERROR` failures.
    pub error_retryable: bool,
    /// Criteria handed to the validator.
    pub validation_criteria: Vec<String>,
}

impl PipelineOptions {
    /// Effective asset count (at least 1).
    pub fn asset_count(&self) -> u32 {
        self.asset_count.max(1)
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            skip_analysis: false,
            skip_validation: false,
            stop_on_validation_failure: true,
            asset_count: 1,
            error_retryable: true,
            validation_criteria: Vec::new(),
        }
    }
}

/// One pipeline request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineInput {
    /// Creative brief fed to generation.
    pub brief: String,
    /// Reference image; enables the analysis stage.
    #[serde(default)]
    pub image: Option<ImageSource>,
    #[serde(default)]
    pub options: PipelineOptions,
}

impl PipelineInput {
    pub fn new(brief: impl Into<String>) -> Self {
        Self {
            brief: brief.into(),
            image: None,
            options: PipelineOptions::default(),
        }
    }

    pub fn with_image(mut self, image: ImageSource) -> Self {
        self.image = Some(image);
        self
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// Whether the analysis stage will run.
    pub fn runs_analysis(&self) -> bool {
        self.image.is_some() && !self.options.skip_analysis
    }
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// Frozen record of a finished run, successful or not.
///
/// Stage fields hold whatever had been produced when the run ended; on failure
/// they are the partial results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub run_id: PipelineRunId,
    pub success: bool,
    /// `Complete` on success, otherwise the stage the run stopped in.
    pub stage: Stage,
    /// Wall-clock start, read from the router's [`domain::Clock`].
    pub started_at: Timestamp,
    /// Wall-clock end, read from the router's [`domain::Clock`].
    pub finished_at: Timestamp,
    pub analysis: Option<StageRecord<AnalysisResult>>,
    pub generation: Option<StageRecord<GenerationResult>>,
    pub validation: Option<StageRecord<ValidationReport>>,
    pub synthesis: Vec<StageRecord<ImageAsset>>,
    /// Sum of the costs of every executed stage call.
    pub total_cost: Cost,
    /// Monotonic run duration, measured like each stage's `elapsed`. Does not
    /// follow the injected clock, so under a manual clock it can differ from
    /// `finished_at - started_at`.
    pub total_time: Duration,
    /// Providers used, first-use order, without repeats.
    pub providers: Vec<ProviderName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<PipelineFailure>,
}

// ---------------------------------------------------------------------------
// Estimates
// ---------------------------------------------------------------------------

/// Fixed per-call cost assumptions for [`crate::Pipeline::estimate_cost`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageCostHeuristics {
    pub analysis: Cost,
    pub generation: Cost,
    pub validation: Cost,
    pub synthesis_per_asset: Cost,
}

impl Default for StageCostHeuristics {
    fn default() -> Self {
        Self {
            analysis: Cost::new(0.01).unwrap_or_default(),
            generation: Cost::new(0.02).unwrap_or_default(),
            validation: Cost::new(0.01).unwrap_or_default(),
            synthesis_per_asset: Cost::new(0.04).unwrap_or_default(),
        }
    }
}

/// One line of a [`PipelineEstimate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageEstimate {
    pub stage: Stage,
    /// Provider calls the stage will make.
    pub calls: u32,
    pub cost: Cost,
}

/// Pre-flight cost breakdown for a pipeline input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineEstimate {
    pub stages: Vec<StageEstimate>,
    pub total: Cost,
}
