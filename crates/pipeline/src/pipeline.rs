//! The run state machine.
//!
//! ```text
//! [analysis]? → generation → [validation]? ─┬─ passes / gate off → synthesis × N → complete
//!                                           └─ fails, gate on    → VALIDATION_FAILED
//! any stage error → PIPELINE_ERROR at that stage
//! ```
//!
//! Stages run strictly in sequence. The pipeline never retries a stage;
//! retries and failover belong to the router.

use std::sync::Arc;
use std::time::Instant;

use domain::{
    AnalysisResult, Clock, Cost, GenerationResult, ImageAsset, ImageSource, IssueSeverity,
    PipelineRunId, ProviderName, Timestamp, ValidationReport,
};
use router::Router;
use tracing::Instrument;

use crate::errors::{PipelineFailure, StageError};
use crate::stages::{self, SynthesisBatch};
use crate::types::{
    PipelineEstimate, PipelineInput, PipelineOptions, PipelineResult, Stage, StageCostHeuristics,
    StageEstimate, StageRecord,
};

/// Drives pipeline runs through a shared [`Router`].
///
/// Runs are independent; the only state they share is the router's circuit
/// breaker and spend ledger.
#[derive(Debug, Clone)]
pub struct Pipeline {
    router: Arc<Router>,
    heuristics: StageCostHeuristics,
}

impl Pipeline {
    pub fn new(router: Arc<Router>) -> Self {
        Self {
            router,
            heuristics: StageCostHeuristics::default(),
        }
    }

    /// Replaces the per-stage cost assumptions used by [`Self::estimate_cost`].
    pub fn with_heuristics(mut self, heuristics: StageCostHeuristics) -> Self {
        self.heuristics = heuristics;
        self
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    /// Runs every applicable stage for `input`.
    ///
    /// Never fails: gated stops and stage errors are reported through
    /// [`PipelineResult::error`] together with every partial result gathered
    /// before the run ended.
    pub async fn execute(&self, input: &PipelineInput) -> PipelineResult {
        let run_id = PipelineRunId::new_random();
        let span = tracing::info_span!("pipeline_run", run_id = %run_id);
        self.run(run_id, input).instrument(span).await
    }

    async fn run(&self, run_id: PipelineRunId, input: &PipelineInput) -> PipelineResult {
        let options = &input.options;
        let mut run = RunState::new(run_id, self.router.clock().now());
        tracing::info!(
            analysis = input.runs_analysis(),
            validation = !options.skip_validation,
            assets = options.asset_count(),
            "Pipeline run started"
        );

        if let Some(image) = input.image.as_ref().filter(|_| !options.skip_analysis) {
            match stages::analyze(&self.router, image, None).await {
                Ok(record) => run.analysis = Some(run.charge(record)),
                Err(error) => return self.fail(run, Stage::Analysis, &error, options),
            }
        }

        let context = run.analysis.as_ref().map(|r| &r.output);
        let text = match stages::generate(&self.router, &input.brief, context).await {
            Ok(record) => {
                let text = record.output.text.clone();
                run.generation = Some(run.charge(record));
                text
            }
            Err(error) => return self.fail(run, Stage::Generation, &error, options),
        };

        if !options.skip_validation {
            match stages::validate(&self.router, &text, &options.validation_criteria).await {
                Ok(record) => {
                    let verdict = (!record.output.passes).then(|| rejection(&record.output));
                    run.validation = Some(run.charge(record));
                    if let Some(message) = verdict {
                        if options.stop_on_validation_failure {
                            tracing::warn!(reason = %message, "Validation gate stopped the run");
                            let failure = PipelineFailure::validation_failed(message);
                            return self.finish(run, Stage::Validation, Some(failure));
                        }
                        tracing::info!(reason = %message, "Validation failed, gate disabled");
                    }
                }
                Err(error) => return self.fail(run, Stage::Validation, &error, options),
            }
        }

        let batch = stages::synthesize(&self.router, &text, options.asset_count()).await;
        for asset in batch.assets {
            let asset = run.charge(asset);
            run.synthesis.push(asset);
        }
        if let Some(error) = batch.error {
            return self.fail(run, Stage::Synthesis, &error, options);
        }

        self.finish(run, Stage::Complete, None)
    }

    fn fail(
        &self,
        run: RunState,
        stage: Stage,
        error: &StageError,
        options: &PipelineOptions,
    ) -> PipelineResult {
        tracing::error!(stage = %stage, error = %error, "Pipeline stage failed");
        let failure = PipelineFailure::stage_error(error, options.error_retryable);
        self.finish(run, stage, Some(failure))
    }

    fn finish(
        &self,
        run: RunState,
        stage: Stage,
        error: Option<PipelineFailure>,
    ) -> PipelineResult {
        let result = run.freeze(stage, error, self.router.clock().now());
        tracing::info!(
            stage = %result.stage,
            success = result.success,
            total_cost = %result.total_cost,
            total_ms = result.total_time.as_millis() as u64,
            "Pipeline run finished"
        );
        result
    }

    // -----------------------------------------------------------------------
    // Single-stage entry points
    // -----------------------------------------------------------------------

    /// Runs only the analysis stage.
    pub async fn analyze(
        &self,
        image: &ImageSource,
        instructions: Option<&str>,
    ) -> Result<StageRecord<AnalysisResult>, StageError> {
        stages::analyze(&self.router, image, instructions).await
    }

    /// Runs only the generation stage.
    pub async fn generate(
        &self,
        brief: &str,
        context: Option<&AnalysisResult>,
    ) -> Result<StageRecord<GenerationResult>, StageError> {
        stages::generate(&self.router, brief, context).await
    }

    /// Runs only the validation stage. A failing report is returned, not gated.
    pub async fn validate(
        &self,
        content: &str,
        criteria: &[String],
    ) -> Result<StageRecord<ValidationReport>, StageError> {
        stages::validate(&self.router, content, criteria).await
    }

    /// Runs only the synthesis stage.
    pub async fn synthesize(&self, prompt: &str, count: u32) -> SynthesisBatch {
        stages::synthesize(&self.router, prompt, count.max(1)).await
    }

    // -----------------------------------------------------------------------
    // Estimate
    // -----------------------------------------------------------------------

    /// Heuristic pre-flight cost of running `input`. Does not consult the
    /// router; assumes every stage that could run does.
    pub fn estimate_cost(&self, input: &PipelineInput) -> PipelineEstimate {
        let h = &self.heuristics;
        let options = &input.options;
        let mut stages = Vec::with_capacity(4);
        if input.runs_analysis() {
            stages.push(estimate(Stage::Analysis, 1, h.analysis));
        }
        stages.push(estimate(Stage::Generation, 1, h.generation));
        if !options.skip_validation {
            stages.push(estimate(Stage::Validation, 1, h.validation));
        }
        stages.push(estimate(Stage::Synthesis, options.asset_count(), h.synthesis_per_asset));

        let total = stages.iter().map(|s| s.cost).sum();
        PipelineEstimate { stages, total }
    }
}

fn estimate(stage: Stage, calls: u32, per_call: Cost) -> StageEstimate {
    StageEstimate {
        stage,
        calls,
        cost: Cost::new(per_call.as_f64() * f64::from(calls)).unwrap_or_default(),
    }
}

fn rejection(report: &ValidationReport) -> String {
    let blocking = report
        .issues
        .iter()
        .find(|issue| issue.severity == IssueSeverity::Blocking);
    match blocking {
        Some(issue) => format!("content did not pass validation: {}", issue.message),
        None => format!(
            "content did not pass validation ({} issue(s))",
            report.issues.len()
        ),
    }
}

// ---------------------------------------------------------------------------
// Run state
// ---------------------------------------------------------------------------

/// Accumulation state owned by a single run until it is frozen.
struct RunState {
    run_id: PipelineRunId,
    started_at: Timestamp,
    started: Instant,
    analysis: Option<StageRecord<AnalysisResult>>,
    generation: Option<StageRecord<GenerationResult>>,
    validation: Option<StageRecord<ValidationReport>>,
    synthesis: Vec<StageRecord<ImageAsset>>,
    total_cost: Cost,
    providers: Vec<ProviderName>,
}

impl RunState {
    fn new(run_id: PipelineRunId, started_at: Timestamp) -> Self {
        Self {
            run_id,
            started_at,
            started: Instant::now(),
            analysis: None,
            generation: None,
            validation: None,
            synthesis: Vec::new(),
            total_cost: Cost::zero(),
            providers: Vec::new(),
        }
    }

    /// Adds a stage call's cost and provider to the run totals.
    fn charge<T>(&mut self, record: StageRecord<T>) -> StageRecord<T> {
        self.total_cost += record.cost;
        if !self.providers.contains(&record.provider) {
            self.providers.push(record.provider.clone());
        }
        record
    }

    fn freeze(
        self,
        stage: Stage,
        error: Option<PipelineFailure>,
        finished_at: Timestamp,
    ) -> PipelineResult {
        PipelineResult {
            run_id: self.run_id,
            success: error.is_none(),
            stage,
            started_at: self.started_at,
            finished_at,
            analysis: self.analysis,
            generation: self.generation,
            validation: self.validation,
            synthesis: self.synthesis,
            total_cost: self.total_cost,
            total_time: self.started.elapsed(),
            providers: self.providers,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use domain::{CapabilityKind, ValidationIssue};
    use providers::ScriptedProvider;

    use super::*;

    fn pipeline() -> Pipeline {
        let router = Router::builder()
            .provider(ScriptedProvider::new(
                ProviderName::new("all").unwrap(),
                &CapabilityKind::ALL,
                Cost::new(0.5).unwrap(),
            ))
            .build()
            .unwrap();
        Pipeline::new(Arc::new(router))
    }

    fn cost(v: f64) -> Cost {
        Cost::new(v).unwrap()
    }

    #[test]
    fn estimate_counts_only_stages_that_would_run() {
        let heuristics = StageCostHeuristics {
            analysis: cost(0.25),
            generation: cost(0.5),
            validation: cost(0.125),
            synthesis_per_asset: cost(1.0),
        };
        let p = pipeline().with_heuristics(heuristics);

        let plain = p.estimate_cost(&PipelineInput::new("brief"));
        let stages: Vec<Stage> = plain.stages.iter().map(|s| s.stage).collect();
        assert_eq!(stages, vec![Stage::Generation, Stage::Validation, Stage::Synthesis]);
        assert_eq!(plain.total, cost(1.625));

        let full = p.estimate_cost(
            &PipelineInput::new("brief")
                .with_image(ImageSource::Url {
                    url: "https://example.com/ref.png".into(),
                })
                .with_options(PipelineOptions {
                    asset_count: 3,
                    skip_validation: true,
                    ..PipelineOptions::default()
                }),
        );
        assert_eq!(full.stages.len(), 3);
        assert_eq!(full.stages[2].calls, 3);
        assert_eq!(full.total, cost(3.75));
    }

    #[test]
    fn rejection_prefers_blocking_issue() {
        let report = ValidationReport {
            passes: false,
            score: None,
            issues: vec![
                ValidationIssue {
                    severity: IssueSeverity::Warning,
                    category: "tone".into(),
                    message: "a bit flat".into(),
                },
                ValidationIssue {
                    severity: IssueSeverity::Blocking,
                    category: "cultural".into(),
                    message: "misuses a sacred symbol".into(),
                },
            ],
            suggestions: vec![],
        };
        assert_eq!(
            rejection(&report),
            "content did not pass validation: misuses a sacred symbol"
        );
    }

    #[tokio::test]
    async fn single_stage_entry_points_route_directly() {
        let p = pipeline();
        let record = p.generate("a poster", None).await.unwrap();
        assert_eq!(record.output.text, "a poster");
        assert_eq!(record.provider.as_str(), "all");

        let batch = p.synthesize("a poster", 0).await;
        assert!(batch.error.is_none());
        assert_eq!(batch.assets.len(), 1);
        assert_eq!(p.router().get_cost_stats().await.record_count, 2);
    }
}
