//! Stage adapters.
//!
//! Each adapter builds one [`Task`], routes it, and pattern-matches the
//! payload it expects out of the [`Outcome`]. The full run and the
//! single-stage entry points on [`crate::Pipeline`] share these functions.

use std::time::Duration;

use domain::{
    AnalysisResult, CapabilityKind, Cost, GenerationResult, ImageAsset, ImageSource, Outcome,
    ProviderName, Task, TaskInput, TaskOutput, ValidationReport,
};
use futures::future::join_all;
use router::Router;

use crate::errors::StageError;
use crate::types::StageRecord;

/// Where a routed call landed and what it cost.
struct Routed {
    provider: ProviderName,
    cost: Cost,
    elapsed: Duration,
}

impl Routed {
    fn record<T>(self, output: T) -> StageRecord<T> {
        StageRecord {
            output,
            provider: self.provider,
            cost: self.cost,
            elapsed: self.elapsed,
        }
    }
}

/// Routes `task` and unwraps a successful outcome.
async fn route(router: &Router, task: &Task) -> Result<(Routed, TaskOutput), StageError> {
    let Outcome {
        provider,
        result,
        cost,
        elapsed,
        ..
    } = router.route(task).await?;
    match result {
        Ok(output) => Ok((
            Routed {
                provider,
                cost,
                elapsed,
            },
            output,
        )),
        Err(error) => Err(StageError::Provider { provider, error }),
    }
}

fn unexpected(task_kind: CapabilityKind, output: &TaskOutput) -> StageError {
    StageError::UnexpectedOutput {
        expected: task_kind,
        actual: output.kind(),
    }
}

/// Describes a reference image.
pub async fn analyze(
    router: &Router,
    image: &ImageSource,
    instructions: Option<&str>,
) -> Result<StageRecord<AnalysisResult>, StageError> {
    let task = Task::new(TaskInput::VisionAnalysis {
        image: image.clone(),
        instructions: instructions.map(str::to_owned),
    });
    let kind = task.kind();
    match route(router, &task).await? {
        (routed, TaskOutput::Analysis(result)) => Ok(routed.record(result)),
        (_, other) => Err(unexpected(kind, &other)),
    }
}

/// Generates text for `brief`, optionally grounded in a prior analysis.
pub async fn generate(
    router: &Router,
    brief: &str,
    context: Option<&AnalysisResult>,
) -> Result<StageRecord<GenerationResult>, StageError> {
    let task = Task::new(TaskInput::TextGeneration {
        prompt: brief.to_owned(),
        context: context.cloned(),
    });
    let kind = task.kind();
    match route(router, &task).await? {
        (routed, TaskOutput::Generation(result)) => Ok(routed.record(result)),
        (_, other) => Err(unexpected(kind, &other)),
    }
}

/// Judges `content` against `criteria`.
///
/// A report with `passes == false` is still `Ok`; gating is the caller's call.
pub async fn validate(
    router: &Router,
    content: &str,
    criteria: &[String],
) -> Result<StageRecord<ValidationReport>, StageError> {
    let task = Task::new(TaskInput::TextValidation {
        content: content.to_owned(),
        criteria: criteria.to_vec(),
    });
    let kind = task.kind();
    match route(router, &task).await? {
        (routed, TaskOutput::Validation(report)) => Ok(routed.record(report)),
        (_, other) => Err(unexpected(kind, &other)),
    }
}

/// Assets produced by one synthesis stage.
#[derive(Debug)]
pub struct SynthesisBatch {
    /// Successful assets, in variant order.
    pub assets: Vec<StageRecord<ImageAsset>>,
    /// First failure among the per-asset calls, if any.
    pub error: Option<StageError>,
}

/// Synthesizes `count` images from `prompt`, one routed call per image.
///
/// Calls are issued concurrently and every one is awaited to completion;
/// successful assets are returned even when a sibling fails.
pub async fn synthesize(router: &Router, prompt: &str, count: u32) -> SynthesisBatch {
    let calls = (0..count).map(|variant| synthesize_one(router, prompt, variant));

    let mut batch = SynthesisBatch {
        assets: Vec::new(),
        error: None,
    };
    for result in join_all(calls).await {
        match result {
            Ok(asset) => batch.assets.push(asset),
            Err(error) => {
                tracing::warn!(error = %error, "Synthesis call failed");
                batch.error.get_or_insert(error);
            }
        }
    }
    batch
}

async fn synthesize_one(
    router: &Router,
    prompt: &str,
    variant: u32,
) -> Result<StageRecord<ImageAsset>, StageError> {
    let task = Task::new(TaskInput::ImageSynthesis {
        prompt: prompt.to_owned(),
        variant,
    });
    let kind = task.kind();
    match route(router, &task).await? {
        (routed, TaskOutput::Synthesis(asset)) => Ok(routed.record(asset)),
        (_, other) => Err(unexpected(kind, &other)),
    }
}
