//! Switchyard CLI entry point.
//!
//! This binary is the composition root. Responsibilities:
//!
//! 1. **Parse configuration**: load the TOML config named by `--config`.
//! 2. **Wire observability**: `tracing-subscriber` with a JSON layer and, when
//!    `OTEL_EXPORTER_OTLP_ENDPOINT` is set, an OpenTelemetry OTLP exporter.
//! 3. **Construct infrastructure**: build the configured providers and inject
//!    them into a [`router::Router`] and [`pipeline::Pipeline`].
//! 4. **Dispatch**: `run` executes one pipeline run, `estimate` prints the
//!    pre-flight cost estimate, `providers` lists providers with their routing
//!    order and circuit state. All output is JSON on stdout.

mod config;
mod telemetry;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use domain::{CapabilityKind, ImageSource, ProviderName, Task, TaskInput};
use pipeline::{Pipeline, PipelineInput, PipelineOptions};
use router::{CostEstimate, RoutingStrategy};
use serde::Serialize;

use crate::config::CliConfig;
use crate::telemetry::Telemetry;

#[derive(Debug, Parser)]
#[command(name = "switchyard", version, about = "Route AI tasks across providers with failover and budgets")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, short, global = true, default_value = "switchyard.toml")]
    config: PathBuf,

    /// Overrides the configured routing strategy.
    #[arg(long, global = true, value_parser = parse_strategy)]
    strategy: Option<RoutingStrategy>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Execute one pipeline run and print its result.
    Run(RunArgs),
    /// Print the heuristic and per-provider cost estimate for a run.
    Estimate(RunArgs),
    /// List configured providers, routing order per capability and circuit state.
    Providers,
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Creative brief handed to text generation.
    #[arg(long)]
    brief: String,

    /// Reference image URL; enables image analysis.
    #[arg(long)]
    image_url: Option<String>,

    #[arg(long)]
    skip_analysis: bool,

    #[arg(long)]
    skip_validation: bool,

    /// Continue to synthesis even when validation fails.
    #[arg(long)]
    no_validation_gate: bool,

    /// Number of images to synthesize.
    #[arg(long, default_value_t = 1)]
    assets: u32,

    /// Validation criterion; repeatable.
    #[arg(long = "criterion")]
    criteria: Vec<String>,

    /// Mark stage failures as non-retryable.
    #[arg(long)]
    errors_not_retryable: bool,
}

impl RunArgs {
    fn to_input(&self) -> PipelineInput {
        let options = PipelineOptions {
            skip_analysis: self.skip_analysis,
            skip_validation: self.skip_validation,
            stop_on_validation_failure: !self.no_validation_gate,
            asset_count: self.assets,
            error_retryable: !self.errors_not_retryable,
            validation_criteria: self.criteria.clone(),
        };
        let input = PipelineInput::new(self.brief.clone()).with_options(options);
        match &self.image_url {
            Some(url) => input.with_image(ImageSource::Url { url: url.clone() }),
            None => input,
        }
    }
}

fn parse_strategy(value: &str) -> Result<RoutingStrategy, String> {
    match value {
        "cost-optimized" => Ok(RoutingStrategy::CostOptimized),
        "quality-first" => Ok(RoutingStrategy::QualityFirst),
        "speed-first" => Ok(RoutingStrategy::SpeedFirst),
        other => Err(format!(
            "unknown strategy '{other}' (expected cost-optimized, quality-first or speed-first)"
        )),
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let telemetry = Telemetry::init()?;
    let result = dispatch(cli).await;
    telemetry.shutdown();
    result
}

async fn dispatch(cli: Cli) -> Result<ExitCode> {
    let mut config = CliConfig::load(&cli.config)?;
    if let Some(strategy) = cli.strategy {
        config.router.strategy = strategy;
    }
    let pipeline = config.build_pipeline()?;
    tracing::info!(
        config = %cli.config.display(),
        providers = config.providers.len(),
        "Configuration loaded"
    );

    match cli.command {
        Command::Run(args) => run(&pipeline, &args).await,
        Command::Estimate(args) => estimate(&pipeline, &args),
        Command::Providers => providers(&pipeline).await,
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct RunReport<'a> {
    result: &'a pipeline::PipelineResult,
    costs: router::CostStats,
}

async fn run(pipeline: &Pipeline, args: &RunArgs) -> Result<ExitCode> {
    let result = pipeline.execute(&args.to_input()).await;
    let report = RunReport {
        result: &result,
        costs: pipeline.router().get_cost_stats().await,
    };
    print_json(&report)?;
    Ok(if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[derive(Serialize)]
struct EstimateReport {
    heuristic: pipeline::PipelineEstimate,
    /// Spread of provider estimates for the generation call; absent when no
    /// provider can generate text.
    generation: Option<CostEstimate>,
}

fn estimate(pipeline: &Pipeline, args: &RunArgs) -> Result<ExitCode> {
    let input = args.to_input();
    let generation = Task::new(TaskInput::TextGeneration {
        prompt: input.brief.clone(),
        context: None,
    });
    let report = EstimateReport {
        heuristic: pipeline.estimate_cost(&input),
        generation: pipeline.router().estimate_cost(&generation).ok(),
    };
    print_json(&report)?;
    Ok(ExitCode::SUCCESS)
}

#[derive(Serialize)]
struct ProvidersReport<'a> {
    providers: Vec<&'a domain::ProviderDescriptor>,
    routing: Vec<RoutingPlan>,
    circuits: Vec<router::CircuitSnapshot>,
}

#[derive(Serialize)]
struct RoutingPlan {
    kind: CapabilityKind,
    order: Vec<ProviderName>,
}

async fn providers(pipeline: &Pipeline) -> Result<ExitCode> {
    let router = pipeline.router();
    let report = ProvidersReport {
        providers: router.providers(),
        routing: CapabilityKind::ALL
            .iter()
            .map(|&kind| RoutingPlan {
                kind,
                order: router.plan(kind),
            })
            .collect(),
        circuits: router.get_circuit_breaker_status().await,
    };
    print_json(&report)?;
    Ok(ExitCode::SUCCESS)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn run_args_map_to_pipeline_input() {
        let cli = Cli::try_parse_from([
            "switchyard",
            "run",
            "--brief",
            "harvest poster",
            "--image-url",
            "https://example.com/ref.png",
            "--no-validation-gate",
            "--assets",
            "3",
            "--criterion",
            "respectful",
            "--criterion",
            "on-brand",
        ])
        .unwrap();

        let Command::Run(args) = cli.command else {
            panic!("expected run command");
        };
        let input = args.to_input();
        assert_eq!(input.brief, "harvest poster");
        assert!(input.runs_analysis());
        assert!(!input.options.stop_on_validation_failure);
        assert_eq!(input.options.asset_count(), 3);
        assert_eq!(input.options.validation_criteria, vec!["respectful", "on-brand"]);
        assert!(input.options.error_retryable);
    }

    #[test]
    fn strategy_flag_is_validated() {
        let cli = Cli::try_parse_from(["switchyard", "--strategy", "speed-first", "providers"])
            .unwrap();
        assert_eq!(cli.strategy, Some(RoutingStrategy::SpeedFirst));
        assert!(Cli::try_parse_from(["switchyard", "--strategy", "fastest", "providers"]).is_err());
    }
}
