//! End-to-end routing behaviour against scripted providers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use domain::{
    CapabilityKind, Clock, ConfigError, Cost, CostLimit, GenerationResult, ManualClock, Provider,
    ProviderDescriptor, ProviderError, ProviderErrorKind, ProviderName, ProviderReply, Task,
    TaskInput, TaskOutput, Timestamp,
};
use providers::ScriptedProvider;
use router::{
    BudgetConfig, CircuitBreakerConfig, CircuitState, CostRecord, QualityOverride, RouteError,
    Router, RouterConfig, RoutingStrategy,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn name(s: &str) -> ProviderName {
    ProviderName::new(s).unwrap()
}

fn cost(v: f64) -> Cost {
    Cost::new(v).unwrap()
}

fn clock() -> Arc<ManualClock> {
    let start = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
    Arc::new(ManualClock::new(Timestamp::from_utc(start)))
}

fn text_provider(n: &str, c: f64) -> ScriptedProvider {
    ScriptedProvider::new(name(n), &[CapabilityKind::TextGeneration], cost(c))
}

fn generate() -> Task {
    Task::new(TaskInput::TextGeneration {
        prompt: "write a caption".into(),
        context: None,
    })
}

fn utc_budget() -> BudgetConfig {
    BudgetConfig {
        utc_offset_minutes: Some(0),
        ..BudgetConfig::default()
    }
}

fn build(providers: &[Arc<ScriptedProvider>], mut config: RouterConfig, clock: Arc<ManualClock>) -> Router {
    config.budget.utc_offset_minutes = Some(0);
    providers
        .iter()
        .fold(Router::builder(), |b, p| b.shared_provider(p.clone() as Arc<dyn Provider>))
        .config(config)
        .clock(clock)
        .build()
        .unwrap()
}

fn server_error() -> ProviderError {
    ProviderError::new(ProviderErrorKind::ServerError, "upstream 503")
}

/// Cheapest text generator on the roster; panics on every call.
struct Crashing {
    descriptor: ProviderDescriptor,
}

impl Crashing {
    fn new(n: &str) -> Self {
        Self {
            descriptor: ProviderDescriptor {
                name: name(n),
                capabilities: vec![CapabilityKind::TextGeneration],
                cost_per_call: cost(0.001),
                avg_latency: Duration::from_millis(10),
            },
        }
    }
}

#[async_trait]
impl Provider for Crashing {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn execute(&self, _task: &Task) -> Result<ProviderReply, ProviderError> {
        panic!("connection pool poisoned");
    }
}

// ---------------------------------------------------------------------------
// Strategy ordering
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_cost_optimized_picks_cheapest_then_ascending_cost() {
    let a = Arc::new(text_provider("a", 0.10));
    let b = Arc::new(text_provider("b", 0.01));
    let c = Arc::new(text_provider("c", 0.05));
    let router = build(&[a.clone(), b.clone(), c.clone()], RouterConfig::default(), clock());

    assert_eq!(router.plan(CapabilityKind::TextGeneration), vec![name("b"), name("c"), name("a")]);

    let outcome = router.route(&generate()).await.unwrap();
    assert_eq!(outcome.provider, name("b"));
    assert_eq!(outcome.cost, cost(0.01));
    assert_eq!((a.calls(), b.calls(), c.calls()), (0, 1, 0));
}

#[tokio::test]
async fn test_quality_first_falls_back_by_cost_not_quality() {
    let a = Arc::new(text_provider("a", 0.10));
    let b = Arc::new(text_provider("b", 0.01));
    let c = Arc::new(text_provider("c", 0.05));
    let config = RouterConfig {
        strategy: RoutingStrategy::QualityFirst,
        quality_overrides: vec![
            QualityOverride {
                kind: CapabilityKind::TextGeneration,
                provider: name("a"),
                score: 10,
            },
            QualityOverride {
                kind: CapabilityKind::TextGeneration,
                provider: name("c"),
                score: 9,
            },
        ],
        ..RouterConfig::default()
    };
    let router = build(&[a, b, c], config, clock());

    // c outranks b on quality but the fallback tail is cost-ordered.
    assert_eq!(router.plan(CapabilityKind::TextGeneration), vec![name("a"), name("b"), name("c")]);
}

#[tokio::test]
async fn test_speed_first_uses_declared_latency() {
    let a = Arc::new(text_provider("a", 0.10).with_latency(Duration::from_millis(100)));
    let b = Arc::new(text_provider("b", 0.01).with_latency(Duration::from_millis(900)));
    let c = Arc::new(text_provider("c", 0.05).with_latency(Duration::from_millis(50)));
    let config = RouterConfig {
        strategy: RoutingStrategy::SpeedFirst,
        ..RouterConfig::default()
    };
    let router = build(&[a, b, c], config, clock());

    assert_eq!(router.plan(CapabilityKind::TextGeneration), vec![name("c"), name("b"), name("a")]);
}

#[tokio::test]
async fn test_ties_go_to_earliest_registered() {
    let first = Arc::new(text_provider("first", 0.02));
    let second = Arc::new(text_provider("second", 0.02));
    let router = build(&[first, second], RouterConfig::default(), clock());

    let outcome = router.route(&generate()).await.unwrap();
    assert_eq!(outcome.provider, name("first"));
}

#[tokio::test]
async fn test_preferred_providers_restrict_candidates() {
    let a = Arc::new(text_provider("a", 0.01));
    let b = Arc::new(text_provider("b", 0.05));
    let config = RouterConfig {
        preferred_providers: vec![name("b")],
        ..RouterConfig::default()
    };
    let router = build(&[a.clone(), b], config, clock());

    let outcome = router.route(&generate()).await.unwrap();
    assert_eq!(outcome.provider, name("b"));
    assert_eq!(a.calls(), 0);
}

#[tokio::test]
async fn test_preferred_providers_with_no_capable_member_is_no_provider() {
    let a = Arc::new(text_provider("a", 0.01));
    let config = RouterConfig {
        preferred_providers: vec![name("ghost")],
        ..RouterConfig::default()
    };
    let router = build(&[a.clone()], config, clock());

    let err = router.route(&generate()).await.unwrap_err();
    assert_eq!(
        err,
        RouteError::NoProviderAvailable {
            kind: CapabilityKind::TextGeneration
        }
    );
    assert_eq!(a.calls(), 0);
}

// ---------------------------------------------------------------------------
// Failover
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_retryable_failure_fails_over_to_next_provider() {
    let a = Arc::new(text_provider("a", 0.01).then_fail(server_error()));
    let b = Arc::new(text_provider("b", 0.05));
    let router = build(&[a.clone(), b.clone()], RouterConfig::default(), clock());

    let outcome = router.route(&generate()).await.unwrap();

    assert_eq!(outcome.provider, name("b"));
    assert!(outcome.is_success());
    assert_eq!(router.circuit_breaker().failure_count(&name("a")).await, 1);
    assert_eq!(router.circuit_breaker().failure_count(&name("b")).await, 0);

    let ledger = router.cost_tracker().export().await;
    assert_eq!(ledger.records.len(), 1);
    assert_eq!(ledger.records[0].provider, name("b"));
    assert_eq!(ledger.total, cost(0.05));

    let json = serde_json::to_value(&ledger).unwrap();
    assert_eq!(json["records"][0]["provider"], "b");
    assert_eq!(json["records"][0]["kind"], "text-generation");
}

#[tokio::test]
async fn test_non_retryable_failure_returns_failed_outcome_without_failover() {
    let a = Arc::new(
        text_provider("a", 0.01)
            .then_fail(ProviderError::new(ProviderErrorKind::ClientError, "bad prompt")),
    );
    let b = Arc::new(text_provider("b", 0.05));
    let router = build(&[a.clone(), b.clone()], RouterConfig::default(), clock());

    let outcome = router.route(&generate()).await.unwrap();

    assert_eq!(outcome.provider, name("a"));
    assert!(!outcome.is_success());
    assert_eq!(outcome.error().map(|e| e.kind), Some(ProviderErrorKind::ClientError));
    assert_eq!(outcome.cost, Cost::zero());
    assert_eq!(b.calls(), 0);
    assert_eq!(router.circuit_breaker().failure_count(&name("a")).await, 1);
    assert_eq!(router.circuit_breaker().state(&name("b")).await, CircuitState::Closed);
    assert!(router.cost_tracker().is_empty().await);
}

#[tokio::test]
async fn test_wrong_payload_kind_is_treated_as_retryable() {
    let a = Arc::new(
        ScriptedProvider::new(name("a"), &[CapabilityKind::TextValidation], cost(0.01))
            .then_reply(TaskOutput::Generation(GenerationResult { text: "oops".into() })),
    );
    let b = Arc::new(ScriptedProvider::new(name("b"), &[CapabilityKind::TextValidation], cost(0.02)));
    let router = build(&[a, b], RouterConfig::default(), clock());

    let task = Task::new(TaskInput::TextValidation {
        content: "caption".into(),
        criteria: vec![],
    });
    let outcome = router.route(&task).await.unwrap();
    assert_eq!(outcome.provider, name("b"));
    assert_eq!(outcome.output().map(TaskOutput::kind), Some(CapabilityKind::TextValidation));
}

#[tokio::test]
async fn test_panicking_provider_counts_as_retryable_failure() {
    let backup = Arc::new(text_provider("backup", 0.05));
    let config = RouterConfig {
        budget: utc_budget(),
        ..RouterConfig::default()
    };
    let router = Router::builder()
        .provider(Crashing::new("crashy"))
        .shared_provider(backup.clone() as Arc<dyn Provider>)
        .config(config)
        .clock(clock())
        .build()
        .unwrap();

    let outcome = router.route(&generate()).await.unwrap();

    assert_eq!(outcome.provider, name("backup"));
    assert!(outcome.is_success());
    assert_eq!(router.circuit_breaker().failure_count(&name("crashy")).await, 1);

    let fallback_off = RouterConfig {
        fallback_enabled: false,
        ..RouterConfig::default()
    };
    let lone = Router::builder()
        .provider(Crashing::new("crashy"))
        .config(fallback_off)
        .build()
        .unwrap();
    match lone.route(&generate()).await.unwrap_err() {
        RouteError::AllProvidersFailed { attempted, last_error, .. } => {
            assert_eq!(attempted, vec![name("crashy")]);
            let error = last_error.unwrap();
            assert_eq!(error.kind, ProviderErrorKind::Panicked);
            assert!(error.is_retryable());
            assert!(error.message.contains("connection pool poisoned"));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn test_fallback_disabled_tries_only_primary() {
    let a = Arc::new(text_provider("a", 0.01).then_fail(server_error()));
    let b = Arc::new(text_provider("b", 0.05));
    let config = RouterConfig {
        fallback_enabled: false,
        ..RouterConfig::default()
    };
    let router = build(&[a, b.clone()], config, clock());

    assert_eq!(router.plan(CapabilityKind::TextGeneration), vec![name("a")]);
    match router.route(&generate()).await.unwrap_err() {
        RouteError::AllProvidersFailed { attempted, skipped, last_error, .. } => {
            assert_eq!(attempted, vec![name("a")]);
            assert!(skipped.is_empty());
            assert_eq!(last_error.map(|e| e.kind), Some(ProviderErrorKind::ServerError));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(b.calls(), 0);
}

#[tokio::test]
async fn test_all_failed_then_all_skipped_by_open_circuits() {
    let a = Arc::new(text_provider("a", 0.01).always_failing(server_error()));
    let b = Arc::new(text_provider("b", 0.05).always_failing(server_error()));
    let config = RouterConfig {
        circuit_breaker: CircuitBreakerConfig {
            failure_threshold: 1,
            cooldown_secs: 60,
        },
        ..RouterConfig::default()
    };
    let router = build(&[a.clone(), b.clone()], config, clock());

    match router.route(&generate()).await.unwrap_err() {
        RouteError::AllProvidersFailed { attempted, skipped, .. } => {
            assert_eq!(attempted, vec![name("a"), name("b")]);
            assert!(skipped.is_empty());
        }
        other => panic!("unexpected error {other:?}"),
    }

    match router.route(&generate()).await.unwrap_err() {
        RouteError::AllProvidersFailed { attempted, skipped, last_error, .. } => {
            assert!(attempted.is_empty());
            assert_eq!(skipped, vec![name("a"), name("b")]);
            assert!(last_error.is_none());
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!((a.calls(), b.calls()), (1, 1));
}

#[tokio::test]
async fn test_open_circuit_recovers_through_half_open_probe() {
    let clock = clock();
    let a = Arc::new(text_provider("a", 0.01).then_fail(server_error()));
    let b = Arc::new(text_provider("b", 0.05));
    let config = RouterConfig {
        circuit_breaker: CircuitBreakerConfig {
            failure_threshold: 1,
            cooldown_secs: 60,
        },
        ..RouterConfig::default()
    };
    let router = build(&[a.clone(), b.clone()], config, clock.clone());

    assert_eq!(router.route(&generate()).await.unwrap().provider, name("b"));
    assert_eq!(router.circuit_breaker().state(&name("a")).await, CircuitState::Open);

    // Still cooling down: a is skipped without being called.
    assert_eq!(router.route(&generate()).await.unwrap().provider, name("b"));
    assert_eq!(a.calls(), 1);

    clock.advance(Duration::from_secs(61));
    assert_eq!(router.route(&generate()).await.unwrap().provider, name("a"));
    assert_eq!(router.circuit_breaker().state(&name("a")).await, CircuitState::Closed);
    assert_eq!(router.circuit_breaker().failure_count(&name("a")).await, 0);
}

#[tokio::test]
async fn test_unsupported_cheap_provider_is_ignored_and_failover_reaches_backup() {
    let a = Arc::new(ScriptedProvider::new(
        name("a"),
        &[CapabilityKind::ImageSynthesis],
        cost(0.10),
    ));
    let b = Arc::new(text_provider("b", 0.01).then_fail(server_error()));
    let c = Arc::new(text_provider("c", 0.05));
    let router = build(&[a.clone(), b.clone(), c.clone()], RouterConfig::default(), clock());

    let outcome = router.route(&generate()).await.unwrap();

    assert_eq!(outcome.provider, name("c"));
    assert_eq!(a.calls(), 0);
    assert_eq!(b.calls(), 1);
    assert_eq!(router.circuit_breaker().failure_count(&name("b")).await, 1);
    let ledger = router.cost_tracker().export().await;
    assert_eq!(ledger.records.len(), 1);
    assert_eq!(ledger.records[0].provider, name("c"));
}

// ---------------------------------------------------------------------------
// Budget gate
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_budget_gate_refuses_once_daily_limit_reached() {
    let a = Arc::new(text_provider("a", 0.5));
    let config = RouterConfig {
        budget: BudgetConfig {
            daily_limit: CostLimit::new(1.0),
            ..utc_budget()
        },
        ..RouterConfig::default()
    };
    let router = build(&[a.clone()], config, clock());

    router.route(&generate()).await.unwrap();
    router.route(&generate()).await.unwrap();
    let err = router.route(&generate()).await.unwrap_err();

    assert_eq!(
        err,
        RouteError::BudgetExceeded {
            daily: cost(1.0),
            monthly: cost(1.0)
        }
    );
    assert_eq!(a.calls(), 2);
}

#[tokio::test]
async fn test_budget_gate_reopens_next_day() {
    let clock = clock();
    let a = Arc::new(text_provider("a", 0.5));
    let config = RouterConfig {
        budget: BudgetConfig {
            daily_limit: CostLimit::new(0.5),
            ..utc_budget()
        },
        ..RouterConfig::default()
    };
    let router = build(&[a], config, clock.clone());

    router.route(&generate()).await.unwrap();
    assert!(matches!(
        router.route(&generate()).await,
        Err(RouteError::BudgetExceeded { .. })
    ));

    clock.advance(Duration::from_secs(24 * 60 * 60));
    assert!(router.route(&generate()).await.is_ok());
}

#[tokio::test]
async fn test_missing_capability_is_reported_before_budget() {
    let clock = clock();
    let a = Arc::new(text_provider("a", 0.5));
    let config = RouterConfig {
        budget: BudgetConfig {
            daily_limit: CostLimit::new(0.5),
            ..utc_budget()
        },
        ..RouterConfig::default()
    };
    let router = build(&[a], config, clock.clone());
    router
        .cost_tracker()
        .record(CostRecord {
            timestamp: clock.now(),
            cost: cost(5.0),
            provider: name("a"),
            kind: CapabilityKind::TextGeneration,
        })
        .await;

    let synth = Task::new(TaskInput::ImageSynthesis {
        prompt: "a lighthouse".into(),
        variant: 0,
    });
    assert_eq!(
        router.route(&synth).await.unwrap_err(),
        RouteError::NoProviderAvailable {
            kind: CapabilityKind::ImageSynthesis
        }
    );
    assert!(matches!(
        router.route(&generate()).await,
        Err(RouteError::BudgetExceeded { .. })
    ));
}

// ---------------------------------------------------------------------------
// Estimates, status, construction
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_estimate_cost_spans_every_capable_provider() {
    let a = Arc::new(text_provider("a", 0.5));
    let b = Arc::new(text_provider("b", 0.25));
    let c = Arc::new(text_provider("c", 0.75));
    let config = RouterConfig {
        preferred_providers: vec![name("a")],
        ..RouterConfig::default()
    };
    let router = build(&[a, b, c], config, clock());

    let estimate = router.estimate_cost(&generate()).unwrap();
    assert_eq!(estimate.min, cost(0.25));
    assert_eq!(estimate.max, cost(0.75));
    assert_eq!(estimate.mean, cost(0.5));
    assert_eq!(estimate.per_provider.len(), 3);

    let synth = Task::new(TaskInput::ImageSynthesis {
        prompt: "x".into(),
        variant: 0,
    });
    assert!(matches!(
        router.estimate_cost(&synth),
        Err(RouteError::NoProviderAvailable { .. })
    ));
}

#[tokio::test]
async fn test_status_and_reset() {
    let a = Arc::new(text_provider("a", 0.01).always_failing(server_error()));
    let b = Arc::new(text_provider("b", 0.05));
    let config = RouterConfig {
        circuit_breaker: CircuitBreakerConfig {
            failure_threshold: 1,
            cooldown_secs: 60,
        },
        ..RouterConfig::default()
    };
    let router = build(&[a, b], config, clock());
    router.route(&generate()).await.unwrap();

    let status = router.get_circuit_breaker_status().await;
    assert_eq!(status.len(), 2);
    assert_eq!(status[0].provider, name("a"));
    assert_eq!(status[0].state, CircuitState::Open);
    assert_eq!(status[1].state, CircuitState::Closed);

    router.reset_circuit_breaker(Some(&name("a"))).await;
    assert_eq!(router.circuit_breaker().state(&name("a")).await, CircuitState::Closed);

    let stats = router.get_cost_stats().await;
    assert_eq!(stats.record_count, 1);
    assert_eq!(stats.by_provider.get(&name("b")), Some(&cost(0.05)));
}

#[test]
fn test_duplicate_provider_names_are_rejected() {
    let result = Router::builder()
        .provider(text_provider("dup", 0.01))
        .provider(text_provider("dup", 0.02))
        .build();
    assert!(matches!(result, Err(ConfigError::DuplicateProvider(n)) if n == "dup"));
}
