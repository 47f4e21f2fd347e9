//! Router configuration.
//!
//! All structs deserialize with defaults for every missing field, so a config
//! file only needs to state what differs. [`RouterConfig::sanitize`] is applied
//! by the router builder and normalises values a hand-edited file may get wrong.

use std::time::Duration;

use domain::{CapabilityKind, CostLimit, ProviderName};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

/// How the router picks the primary candidate for a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoutingStrategy {
    /// Cheapest `cost_per_call` first.
    #[default]
    CostOptimized,
    /// Highest quality score for the capability kind first.
    QualityFirst,
    /// Lowest average latency first.
    SpeedFirst,
}

// ---------------------------------------------------------------------------
// Circuit breaker
// ---------------------------------------------------------------------------

/// Thresholds for the per-provider circuit breaker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// Seconds after the last failure before an open circuit admits a probe.
    pub cooldown_secs: u64,
}

impl CircuitBreakerConfig {
    /// Cooldown as a [`Duration`].
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown_secs: 60,
        }
    }
}

// ---------------------------------------------------------------------------
// Budget
// ---------------------------------------------------------------------------

/// Spend ceilings enforced by the pre-flight budget gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// When `false` the gate always admits and no alerts are raised.
    pub enabled: bool,
    /// Ceiling for the current calendar day.
    pub daily_limit: Option<CostLimit>,
    /// Ceiling for the current calendar month.
    pub monthly_limit: Option<CostLimit>,
    /// Fraction of a limit at which an advisory alert is raised.
    pub alert_threshold: f64,
    /// Offset from UTC, in minutes, used for day and month boundaries.
    /// `None` uses the host's local time zone.
    pub utc_offset_minutes: Option<i32>,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            daily_limit: None,
            monthly_limit: None,
            alert_threshold: DEFAULT_ALERT_THRESHOLD,
            utc_offset_minutes: None,
        }
    }
}

const DEFAULT_ALERT_THRESHOLD: f64 = 0.8;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// A quality score override for one provider and capability kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityOverride {
    /// Capability kind the score applies to.
    pub kind: CapabilityKind,
    /// Provider being scored.
    pub provider: ProviderName,
    /// Higher is better.
    pub score: u32,
}

/// Everything a [`crate::Router`] is configured with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Primary candidate selection.
    pub strategy: RoutingStrategy,
    /// Allow-list narrowing the candidates; empty means every provider.
    pub preferred_providers: Vec<ProviderName>,
    /// When `false` only the primary candidate is attempted.
    pub fallback_enabled: bool,
    /// Spend ceilings.
    pub budget: BudgetConfig,
    /// Failure isolation thresholds.
    pub circuit_breaker: CircuitBreakerConfig,
    /// Adjustments to the built-in quality table.
    pub quality_overrides: Vec<QualityOverride>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            strategy: RoutingStrategy::default(),
            preferred_providers: Vec::new(),
            fallback_enabled: true,
            budget: BudgetConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            quality_overrides: Vec::new(),
        }
    }
}

impl RouterConfig {
    /// Normalises values that would otherwise produce surprising behaviour.
    ///
    /// - duplicate preferred providers are dropped (first occurrence wins);
    /// - an alert threshold outside `(0, 1]` is clamped (non-finite or
    ///   non-positive values fall back to the default);
    /// - a failure threshold of zero becomes one.
    pub fn sanitize(mut self) -> Self {
        let mut seen = std::collections::HashSet::new();
        self.preferred_providers
            .retain(|name| seen.insert(name.as_str().to_owned()));

        let threshold = self.budget.alert_threshold;
        if !threshold.is_finite() || threshold <= 0.0 {
            tracing::warn!(
                alert_threshold = threshold,
                "Invalid budget alert threshold, using default"
            );
            self.budget.alert_threshold = DEFAULT_ALERT_THRESHOLD;
        } else if threshold > 1.0 {
            tracing::warn!(alert_threshold = threshold, "Budget alert threshold clamped to 1.0");
            self.budget.alert_threshold = 1.0;
        }

        if self.circuit_breaker.failure_threshold == 0 {
            tracing::warn!("Circuit breaker failure threshold of 0 raised to 1");
            self.circuit_breaker.failure_threshold = 1;
        }

        self
    }
}
