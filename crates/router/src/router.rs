//! Strategy-based provider selection with ordered failover.
//!
//! ```text
//! route(task)
//!   1. candidates = providers supporting task.kind      (none → NoProviderAvailable)
//!   2. budget gate                                      (closed → BudgetExceeded)
//!   3. narrow to preferred_providers, pick primary by strategy
//!   4. attempt list = [primary] + rest by ascending cost  ([primary] if fallback off)
//!   5. for each: skip if circuit open; execute
//!        (a panic inside execute counts as a retryable failure)
//!        ok            → record success + cost, return outcome
//!        non-retryable → record failure, return failed outcome
//!        retryable     → record failure, next
//!   6. exhausted → AllProvidersFailed
//! ```
//!
//! The remaining candidates are always tried cheapest first, whatever the
//! primary strategy. The budget gate is consulted once per `route` call, not
//! between failover attempts, so a long failover chain can take spend past a
//! limit; the next call's gate will see it.

use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use domain::{
    CapabilityKind, Clock, ConfigError, Cost, Outcome, Provider, ProviderDescriptor,
    ProviderError, ProviderErrorKind, ProviderName, ProviderReply, SystemClock, Task,
};
use futures::FutureExt;
use serde::Serialize;

use crate::circuit_breaker::{CircuitBreaker, CircuitSnapshot};
use crate::config::{RouterConfig, RoutingStrategy};
use crate::cost_tracker::{CostStats, CostTracker};
use crate::error::RouteError;
use crate::quality::QualityTable;

/// One provider's advisory estimate for a task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderEstimate {
    pub provider: ProviderName,
    pub cost: Cost,
}

/// Spread of estimates across every capable provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostEstimate {
    pub min: Cost,
    pub max: Cost,
    pub mean: Cost,
    /// In registration order.
    pub per_provider: Vec<ProviderEstimate>,
}

/// Routes tasks to registered providers.
///
/// Owns its circuit breaker and spend ledger; two routers never share state.
pub struct Router {
    providers: Vec<Arc<dyn Provider>>,
    config: RouterConfig,
    quality: QualityTable,
    breaker: CircuitBreaker,
    costs: CostTracker,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.providers.iter().map(|p| p.name().as_str()).collect();
        f.debug_struct("Router")
            .field("providers", &names)
            .field("config", &self.config)
            .field("breaker", &self.breaker)
            .field("costs", &self.costs)
            .finish_non_exhaustive()
    }
}

/// Assembles a [`Router`].
pub struct RouterBuilder {
    providers: Vec<Arc<dyn Provider>>,
    config: RouterConfig,
    quality: QualityTable,
    clock: Arc<dyn Clock>,
}

impl RouterBuilder {
    /// Registers a provider. Registration order breaks strategy ties.
    pub fn provider(mut self, provider: impl Provider + 'static) -> Self {
        self.providers.push(Arc::new(provider));
        self
    }

    /// Registers an already-shared provider.
    pub fn shared_provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the built-in quality table (configured overrides still apply).
    pub fn quality_table(mut self, quality: QualityTable) -> Self {
        self.quality = quality;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validates provider names and builds the router.
    ///
    /// # Errors
    ///
    /// [`ConfigError::DuplicateProvider`] if two providers share a name.
    pub fn build(self) -> Result<Router, ConfigError> {
        let mut seen = HashSet::new();
        for provider in &self.providers {
            if !seen.insert(provider.name().clone()) {
                return Err(ConfigError::DuplicateProvider(provider.name().to_string()));
            }
        }

        let config = self.config.sanitize();
        for preferred in &config.preferred_providers {
            if !seen.contains(preferred) {
                tracing::warn!(provider = %preferred, "Preferred provider is not registered");
            }
        }

        let quality = self.quality.with_overrides(&config.quality_overrides);
        let breaker = CircuitBreaker::new(config.circuit_breaker.clone(), self.clock.clone());
        let costs = CostTracker::new(config.budget.clone(), self.clock.clone());

        tracing::info!(
            providers = self.providers.len(),
            strategy = ?config.strategy,
            fallback_enabled = config.fallback_enabled,
            "Router ready"
        );

        Ok(Router {
            providers: self.providers,
            config,
            quality,
            breaker,
            costs,
            clock: self.clock,
        })
    }
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder {
            providers: Vec::new(),
            config: RouterConfig::default(),
            quality: QualityTable::default(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Routes `task` to one provider, failing over as configured.
    ///
    /// # Errors
    ///
    /// - [`RouteError::NoProviderAvailable`]: nothing supports the kind (or
    ///   nothing allowed by `preferred_providers` does).
    /// - [`RouteError::BudgetExceeded`]: the spend gate is closed.
    /// - [`RouteError::AllProvidersFailed`]: every attempt failed retryably
    ///   or was skipped by an open circuit.
    ///
    /// A non-retryable provider failure is returned as `Ok` with a failed
    /// [`Outcome`].
    #[tracing::instrument(skip_all, fields(kind = %task.kind()))]
    pub async fn route(&self, task: &Task) -> Result<Outcome, RouteError> {
        let kind = task.kind();
        if !self.providers.iter().any(|p| p.supports(kind)) {
            tracing::warn!("No provider supports capability");
            return Err(RouteError::NoProviderAvailable { kind });
        }

        if !self.costs.can_proceed().await {
            let stats = self.costs.stats().await;
            tracing::warn!(daily = %stats.daily, monthly = %stats.monthly, "Budget exceeded, refusing call");
            return Err(RouteError::BudgetExceeded {
                daily: stats.daily,
                monthly: stats.monthly,
            });
        }

        let plan = self.attempt_list(kind);
        let Some(primary) = plan.first() else {
            tracing::warn!("No preferred provider supports capability");
            return Err(RouteError::NoProviderAvailable { kind });
        };
        tracing::debug!(primary = %primary.name(), candidates = plan.len(), "Selected primary");

        let mut attempted = Vec::new();
        let mut skipped = Vec::new();
        let mut last_error = None;

        for provider in &plan {
            let name = provider.name();
            if !self.breaker.can_attempt(name).await {
                tracing::debug!(provider = %name, "Circuit open, skipping provider");
                skipped.push(name.clone());
                continue;
            }

            let started = Instant::now();
            let result = execute_guarded(provider.as_ref(), task).await.and_then(|reply| {
                if reply.output.kind() == kind {
                    Ok(reply)
                } else {
                    Err(ProviderError::retryable(
                        ProviderErrorKind::InvalidResponse,
                        format!("expected {kind} payload, got {}", reply.output.kind()),
                    ))
                }
            });
            let elapsed = started.elapsed();
            let timestamp = self.clock.now();

            match result {
                Ok(reply) => {
                    self.breaker.record_success(name).await;
                    let outcome = Outcome {
                        provider: name.clone(),
                        kind,
                        result: Ok(reply.output),
                        cost: reply.cost,
                        timestamp,
                        elapsed,
                    };
                    self.costs.record_outcome(&outcome).await;
                    tracing::info!(
                        provider = %name,
                        cost = %outcome.cost,
                        elapsed_ms = elapsed.as_millis() as u64,
                        failovers = attempted.len(),
                        "Task routed"
                    );
                    return Ok(outcome);
                }
                Err(error) if !error.is_retryable() => {
                    self.breaker.record_failure(name).await;
                    tracing::warn!(provider = %name, error = %error, "Non-retryable provider failure");
                    return Ok(Outcome {
                        provider: name.clone(),
                        kind,
                        result: Err(error),
                        cost: Cost::zero(),
                        timestamp,
                        elapsed,
                    });
                }
                Err(error) => {
                    self.breaker.record_failure(name).await;
                    tracing::warn!(provider = %name, error = %error, "Provider failed, failing over");
                    attempted.push(name.clone());
                    last_error = Some(error);
                }
            }
        }

        tracing::error!(
            attempted = attempted.len(),
            skipped = skipped.len(),
            "All providers failed"
        );
        Err(RouteError::AllProvidersFailed {
            kind,
            attempted,
            skipped,
            last_error,
        })
    }

    /// Names of the providers `route` would try for `kind`, in order,
    /// ignoring circuit state and budget.
    pub fn plan(&self, kind: CapabilityKind) -> Vec<ProviderName> {
        self.attempt_list(kind)
            .iter()
            .map(|p| p.name().clone())
            .collect()
    }

    /// Advisory spread of every capable provider's own estimate.
    ///
    /// Ignores strategy, allow-list, circuits and budget.
    ///
    /// # Errors
    ///
    /// [`RouteError::NoProviderAvailable`] if nothing supports the kind.
    pub fn estimate_cost(&self, task: &Task) -> Result<CostEstimate, RouteError> {
        let kind = task.kind();
        let per_provider: Vec<ProviderEstimate> = self
            .providers
            .iter()
            .filter(|p| p.supports(kind))
            .map(|p| ProviderEstimate {
                provider: p.name().clone(),
                cost: p.estimate_cost(task),
            })
            .collect();
        if per_provider.is_empty() {
            return Err(RouteError::NoProviderAvailable { kind });
        }

        let costs = per_provider.iter().map(|e| e.cost);
        let min = costs.clone().min_by(Cost::total_cmp).unwrap_or_default();
        let max = costs.clone().max_by(Cost::total_cmp).unwrap_or_default();
        let total: Cost = costs.sum();
        let mean = Cost::new(total.as_f64() / per_provider.len() as f64).unwrap_or_default();

        Ok(CostEstimate {
            min,
            max,
            mean,
            per_provider,
        })
    }

    /// Ledger aggregates.
    pub async fn get_cost_stats(&self) -> CostStats {
        self.costs.stats().await
    }

    /// Circuit status of every registered provider, in registration order.
    pub async fn get_circuit_breaker_status(&self) -> Vec<CircuitSnapshot> {
        let mut status = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            status.push(self.breaker.status(provider.name()).await);
        }
        status
    }

    /// Forces one circuit (or, with `None`, every circuit) closed.
    pub async fn reset_circuit_breaker(&self, provider: Option<&ProviderName>) {
        match provider {
            Some(name) => self.breaker.reset(name).await,
            None => self.breaker.reset_all().await,
        }
    }

    /// Registered provider profiles, in registration order.
    pub fn providers(&self) -> Vec<&ProviderDescriptor> {
        self.providers.iter().map(|p| p.descriptor()).collect()
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn cost_tracker(&self) -> &CostTracker {
        &self.costs
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn attempt_list(&self, kind: CapabilityKind) -> Vec<Arc<dyn Provider>> {
        let preferred = &self.config.preferred_providers;
        let mut candidates: Vec<Arc<dyn Provider>> = self
            .providers
            .iter()
            .filter(|p| p.supports(kind))
            .filter(|p| preferred.is_empty() || preferred.contains(p.name()))
            .cloned()
            .collect();
        if candidates.is_empty() {
            return candidates;
        }

        let primary_index = self.primary_index(kind, &candidates);
        let primary = candidates.remove(primary_index);
        if !self.config.fallback_enabled {
            return vec![primary];
        }

        // Stable sort: equal costs keep registration order.
        candidates.sort_by(|a, b| {
            a.descriptor()
                .cost_per_call
                .total_cmp(&b.descriptor().cost_per_call)
        });
        candidates.insert(0, primary);
        candidates
    }

    /// Index of the primary candidate; ties go to the earliest registered.
    fn primary_index(&self, kind: CapabilityKind, candidates: &[Arc<dyn Provider>]) -> usize {
        let mut best = 0;
        for (i, candidate) in candidates.iter().enumerate().skip(1) {
            let current = candidates[best].descriptor();
            let other = candidate.descriptor();
            let better = match self.config.strategy {
                RoutingStrategy::CostOptimized => other.cost_per_call < current.cost_per_call,
                RoutingStrategy::SpeedFirst => other.avg_latency < current.avg_latency,
                RoutingStrategy::QualityFirst => {
                    self.quality.score(kind, &other.name) > self.quality.score(kind, &current.name)
                }
            };
            if better {
                best = i;
            }
        }
        best
    }
}

/// Runs one provider call, turning a panic inside `execute` into a retryable
/// [`ProviderErrorKind::Panicked`] failure.
async fn execute_guarded(
    provider: &dyn Provider,
    task: &Task,
) -> Result<ProviderReply, ProviderError> {
    match AssertUnwindSafe(provider.execute(task)).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!(provider = %provider.name(), panic = %message, "Provider panicked");
            Err(ProviderError::retryable(ProviderErrorKind::Panicked, message))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
