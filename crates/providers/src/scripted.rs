//! A provider that replays a script instead of calling a backend.
//!
//! Each call pops the next scripted step; once the script is exhausted the
//! provider falls back to its default behaviour (a canned reply for the task's
//! kind, or a repeating failure). Every task received is kept so tests can
//! assert on what was routed where.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use domain::{
    AnalysisResult, CapabilityKind, Cost, GenerationResult, ImageAsset, Provider,
    ProviderDescriptor, ProviderError, ProviderName, ProviderReply, Task, TaskInput, TaskOutput,
    ValidationReport,
};
use tokio::sync::Mutex;

/// One scripted response.
#[derive(Debug, Clone)]
pub enum Step {
    /// Succeed with this payload and cost.
    Reply(ProviderReply),
    /// Fail with this error.
    Fail(ProviderError),
}

/// What happens once the script runs out.
#[derive(Debug, Clone)]
enum Fallback {
    Canned { validation_passes: bool },
    Fail(ProviderError),
}

/// In-process [`Provider`] driven by a script.
#[derive(Debug)]
pub struct ScriptedProvider {
    descriptor: ProviderDescriptor,
    script: Mutex<VecDeque<Step>>,
    fallback: Fallback,
    simulate_latency: bool,
    calls: AtomicUsize,
    received: Mutex<Vec<Task>>,
}

impl ScriptedProvider {
    /// A provider for `capabilities` charging `cost_per_call` per successful call.
    pub fn new(name: ProviderName, capabilities: &[CapabilityKind], cost_per_call: Cost) -> Self {
        Self {
            descriptor: ProviderDescriptor {
                name,
                capabilities: capabilities.to_vec(),
                cost_per_call,
                avg_latency: Duration::ZERO,
            },
            script: Mutex::new(VecDeque::new()),
            fallback: Fallback::Canned {
                validation_passes: true,
            },
            simulate_latency: false,
            calls: AtomicUsize::new(0),
            received: Mutex::new(Vec::new()),
        }
    }

    /// Declares the average latency used by the speed-first strategy.
    pub fn with_latency(mut self, avg_latency: Duration) -> Self {
        self.descriptor.avg_latency = avg_latency;
        self
    }

    /// Sleeps for the declared latency on every call.
    pub fn simulating_latency(mut self) -> Self {
        self.simulate_latency = true;
        self
    }

    /// Canned validation replies report `passes = false`.
    pub fn rejecting_validation(mut self) -> Self {
        self.fallback = Fallback::Canned {
            validation_passes: false,
        };
        self
    }

    /// Fails with `error` whenever the script is empty.
    pub fn always_failing(mut self, error: ProviderError) -> Self {
        self.fallback = Fallback::Fail(error);
        self
    }

    /// Appends a successful step charged at `cost_per_call`.
    pub fn then_reply(self, output: TaskOutput) -> Self {
        let cost = self.descriptor.cost_per_call;
        self.then(Step::Reply(ProviderReply { output, cost }))
    }

    /// Appends a failing step.
    pub fn then_fail(self, error: ProviderError) -> Self {
        self.then(Step::Fail(error))
    }

    /// Appends an arbitrary step.
    pub fn then(mut self, step: Step) -> Self {
        self.script.get_mut().push_back(step);
        self
    }

    /// Number of times `execute` has been called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every task received, in call order.
    pub async fn received(&self) -> Vec<Task> {
        self.received.lock().await.clone()
    }

    fn canned(&self, task: &Task, validation_passes: bool) -> TaskOutput {
        let name = &self.descriptor.name;
        match task.input() {
            TaskInput::VisionAnalysis { instructions, .. } => TaskOutput::Analysis(AnalysisResult {
                description: match instructions {
                    Some(focus) => format!("{name} analysis ({focus})"),
                    None => format!("{name} analysis"),
                },
                ..AnalysisResult::default()
            }),
            TaskInput::TextGeneration { prompt, context } => {
                let text = match context {
                    Some(ctx) => format!("{prompt} [{}]", ctx.description),
                    None => prompt.clone(),
                };
                TaskOutput::Generation(GenerationResult { text })
            }
            TaskInput::TextValidation { .. } => TaskOutput::Validation(ValidationReport {
                passes: validation_passes,
                score: None,
                issues: Vec::new(),
                suggestions: Vec::new(),
            }),
            TaskInput::ImageSynthesis { variant, .. } => TaskOutput::Synthesis(ImageAsset {
                uri: format!("scripted://{name}/{variant}.png"),
                mime_type: "image/png".to_string(),
                width: Some(1024),
                height: Some(1024),
            }),
        }
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn execute(&self, task: &Task) -> Result<ProviderReply, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.received.lock().await.push(task.clone());
        if self.simulate_latency {
            tokio::time::sleep(self.descriptor.avg_latency).await;
        }

        let step = self.script.lock().await.pop_front();
        let result = match step {
            Some(Step::Reply(reply)) => Ok(reply),
            Some(Step::Fail(error)) => Err(error),
            None => match &self.fallback {
                Fallback::Canned { validation_passes } => Ok(ProviderReply {
                    output: self.canned(task, *validation_passes),
                    cost: self.descriptor.cost_per_call,
                }),
                Fallback::Fail(error) => Err(error.clone()),
            },
        };

        tracing::debug!(
            provider = %self.descriptor.name,
            kind = %task.kind(),
            ok = result.is_ok(),
            "Scripted provider answered"
        );
        result
    }
}
