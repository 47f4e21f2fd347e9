//! Per-provider circuit breaker.
//!
//! The circuit breaker tracks consecutive failures per [`ProviderName`]. When
//! failures reach a configurable threshold the circuit *opens* and the
//! provider is skipped. Once the cooldown since the last failure has elapsed
//! the next [`CircuitBreaker::can_attempt`] moves the circuit to *half-open*
//! and admits a single probe; the probe's outcome closes or re-opens it.
//!
//! ```text
//! Closed ──(failures >= threshold)──▶ Open
//! Open ──(can_attempt after cooldown)──▶ HalfOpen   [probe granted]
//! HalfOpen ──(record_success)──▶ Closed
//! HalfOpen ──(record_failure)──▶ Open
//! any ──(record_success | reset)──▶ Closed, failures = 0
//! ```
//!
//! There is no timer: the open → half-open transition is evaluated lazily
//! against the injected [`Clock`].

use std::collections::HashMap;
use std::sync::Arc;

use domain::{Clock, ProviderName, Timestamp};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::config::CircuitBreakerConfig;

/// Circuit state for a single provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    /// Healthy; attempts allowed.
    #[default]
    Closed,
    /// Tripped; attempts blocked until the cooldown expires.
    Open,
    /// Cooldown expired; one probe attempt allowed.
    HalfOpen,
}

#[derive(Debug, Clone, Default)]
struct CircuitEntry {
    consecutive_failures: u32,
    state: CircuitState,
    last_failure: Option<Timestamp>,
    /// When the outstanding half-open probe was granted.
    probe_granted_at: Option<Timestamp>,
}

/// Serializable view of one provider's circuit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircuitSnapshot {
    pub provider: ProviderName,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub last_failure: Option<Timestamp>,
    /// Whether a half-open probe has been granted and not yet recorded.
    pub probe_in_flight: bool,
}

/// Per-provider circuit breaker tracking consecutive failures.
///
/// Thread-safe; shared by every route call made through one router.
#[derive(Debug)]
pub struct CircuitBreaker {
    circuits: RwLock<HashMap<ProviderName, CircuitEntry>>,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            circuits: RwLock::new(HashMap::new()),
            config,
            clock,
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Whether `provider` may be attempted now.
    ///
    /// Unknown providers are closed. An open circuit whose cooldown has
    /// elapsed transitions to half-open here and grants exactly one probe;
    /// further calls are refused until that probe is recorded. A probe that is
    /// never recorded is re-granted after another full cooldown.
    pub async fn can_attempt(&self, provider: &ProviderName) -> bool {
        let now = self.clock.now();
        let cooldown = self.config.cooldown();
        let mut circuits = self.circuits.write().await;
        let Some(entry) = circuits.get_mut(provider) else {
            return true;
        };

        match entry.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let since = entry
                    .last_failure
                    .map(|at| now.saturating_duration_since(at))
                    .unwrap_or(cooldown);
                if since < cooldown {
                    return false;
                }
                entry.state = CircuitState::HalfOpen;
                entry.probe_granted_at = Some(now);
                tracing::info!(
                    provider = %provider,
                    consecutive_failures = entry.consecutive_failures,
                    "Circuit half-open, admitting probe"
                );
                true
            }
            CircuitState::HalfOpen => match entry.probe_granted_at {
                Some(granted) if now.saturating_duration_since(granted) < cooldown => false,
                _ => {
                    entry.probe_granted_at = Some(now);
                    true
                }
            },
        }
    }

    /// Record a success; resets the circuit to closed with zero failures.
    pub async fn record_success(&self, provider: &ProviderName) {
        let mut circuits = self.circuits.write().await;
        let entry = circuits.entry(provider.clone()).or_default();
        if entry.state != CircuitState::Closed {
            tracing::info!(provider = %provider, "Circuit closed after successful attempt");
        }
        entry.consecutive_failures = 0;
        entry.state = CircuitState::Closed;
        entry.probe_granted_at = None;
    }

    /// Record a failure; may trip the circuit to open.
    pub async fn record_failure(&self, provider: &ProviderName) {
        let now = self.clock.now();
        let mut circuits = self.circuits.write().await;
        let entry = circuits.entry(provider.clone()).or_default();
        entry.consecutive_failures = entry.consecutive_failures.saturating_add(1);
        entry.last_failure = Some(now);
        entry.probe_granted_at = None;

        let trips = entry.state == CircuitState::HalfOpen
            || entry.consecutive_failures >= self.config.failure_threshold;
        if trips && entry.state != CircuitState::Open {
            tracing::warn!(
                provider = %provider,
                consecutive_failures = entry.consecutive_failures,
                cooldown_secs = self.config.cooldown_secs,
                "Circuit opened"
            );
        }
        if trips {
            entry.state = CircuitState::Open;
        }
    }

    /// Stored state of the circuit for `provider`.
    ///
    /// An open circuit whose cooldown has elapsed still reports `Open` until
    /// the next [`CircuitBreaker::can_attempt`].
    pub async fn state(&self, provider: &ProviderName) -> CircuitState {
        self.circuits
            .read()
            .await
            .get(provider)
            .map(|e| e.state)
            .unwrap_or_default()
    }

    /// Consecutive failures recorded for `provider`.
    pub async fn failure_count(&self, provider: &ProviderName) -> u32 {
        self.circuits
            .read()
            .await
            .get(provider)
            .map(|e| e.consecutive_failures)
            .unwrap_or(0)
    }

    /// Snapshot of one provider's circuit (closed if never seen).
    pub async fn status(&self, provider: &ProviderName) -> CircuitSnapshot {
        let circuits = self.circuits.read().await;
        let entry = circuits.get(provider).cloned().unwrap_or_default();
        Self::snapshot(provider, &entry)
    }

    /// Snapshots of every provider that has recorded an attempt, sorted by name.
    pub async fn snapshot_all(&self) -> Vec<CircuitSnapshot> {
        let circuits = self.circuits.read().await;
        let mut all: Vec<_> = circuits
            .iter()
            .map(|(name, entry)| Self::snapshot(name, entry))
            .collect();
        all.sort_by(|a, b| a.provider.cmp(&b.provider));
        all
    }

    /// Force `provider` closed with zero failures.
    pub async fn reset(&self, provider: &ProviderName) {
        if self.circuits.write().await.remove(provider).is_some() {
            tracing::info!(provider = %provider, "Circuit reset");
        }
    }

    /// Force every circuit closed with zero failures.
    pub async fn reset_all(&self) {
        self.circuits.write().await.clear();
        tracing::info!("All circuits reset");
    }

    fn snapshot(provider: &ProviderName, entry: &CircuitEntry) -> CircuitSnapshot {
        CircuitSnapshot {
            provider: provider.clone(),
            state: entry.state,
            consecutive_failures: entry.consecutive_failures,
            last_failure: entry.last_failure,
            probe_in_flight: entry.state == CircuitState::HalfOpen
                && entry.probe_granted_at.is_some(),
        }
    }
}
