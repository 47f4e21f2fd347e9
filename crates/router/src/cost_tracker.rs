//! Append-only spend ledger with a pre-flight budget gate.
//!
//! # Invariants
//! - Records are only ever appended; every aggregate is a read-time reduction
//!   over the ledger.
//! - The gate is pre-flight only: [`CostTracker::record`] always appends, even
//!   when the entry takes spend past a limit.
//!
//! Day and month windows follow calendar boundaries (midnight, first of the
//! month) in the configured zone: host local time by default, or a fixed UTC
//! offset.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, FixedOffset, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use domain::{CapabilityKind, Clock, Cost, CostLimit, Outcome, ProviderName, Timestamp};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::config::BudgetConfig;

/// One charged provider call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostRecord {
    pub timestamp: Timestamp,
    pub cost: Cost,
    pub provider: ProviderName,
    pub kind: CapabilityKind,
}

impl CostRecord {
    /// Builds the ledger entry for a successful outcome.
    pub fn from_outcome(outcome: &Outcome) -> Self {
        Self {
            timestamp: outcome.timestamp,
            cost: outcome.cost,
            provider: outcome.provider.clone(),
            kind: outcome.kind,
        }
    }
}

/// Calendar window a limit applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetWindow {
    Daily,
    Monthly,
}

/// How close a window is to its limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    /// Spend crossed `alert_threshold × limit`.
    ThresholdReached,
    /// Spend crossed the limit itself; the next route call will be refused.
    LimitReached,
}

/// Advisory warning raised by [`CostTracker::record`]. Never blocks anything.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetAlert {
    pub window: BudgetWindow,
    pub level: AlertLevel,
    pub spent: Cost,
    pub limit: CostLimit,
}

/// Aggregate view of the ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostStats {
    pub daily: Cost,
    pub monthly: Cost,
    pub total: Cost,
    pub record_count: usize,
    pub daily_limit: Option<CostLimit>,
    pub monthly_limit: Option<CostLimit>,
    pub by_provider: BTreeMap<ProviderName, Cost>,
    pub by_kind: BTreeMap<CapabilityKind, Cost>,
}

/// Snapshot of the whole ledger for downstream reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerExport {
    pub exported_at: Timestamp,
    pub total: Cost,
    pub records: Vec<CostRecord>,
}

/// Spend ledger shared by every route call made through one router.
#[derive(Debug)]
pub struct CostTracker {
    ledger: RwLock<Vec<CostRecord>>,
    config: BudgetConfig,
    clock: Arc<dyn Clock>,
}

impl CostTracker {
    pub fn new(config: BudgetConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            ledger: RwLock::new(Vec::new()),
            config,
            clock,
        }
    }

    pub fn config(&self) -> &BudgetConfig {
        &self.config
    }

    /// Whether a new call may start.
    ///
    /// Always `true` when tracking is disabled; otherwise `true` only while
    /// today's spend is below the daily limit and this month's spend is below
    /// the monthly limit (each checked only if set).
    pub async fn can_proceed(&self) -> bool {
        if !self.config.enabled {
            return true;
        }
        let ledger = self.ledger.read().await;
        let windows = self.windows();
        let (daily, monthly) = windows.sums(&ledger);

        let daily_ok = self
            .config
            .daily_limit
            .map_or(true, |limit| !limit.is_exceeded_by(daily));
        let monthly_ok = self
            .config
            .monthly_limit
            .map_or(true, |limit| !limit.is_exceeded_by(monthly));
        if !(daily_ok && monthly_ok) {
            tracing::debug!(daily = %daily, monthly = %monthly, "Budget gate closed");
        }
        daily_ok && monthly_ok
    }

    /// Appends `record` and returns any advisory alerts it triggered.
    ///
    /// An alert is raised when appending this record moves a window's spend
    /// across the alert threshold or across the limit. A record dated outside
    /// a window leaves that window's spend unchanged and raises nothing for it.
    pub async fn record(&self, record: CostRecord) -> Vec<BudgetAlert> {
        let mut ledger = self.ledger.write().await;
        if !self.config.enabled {
            ledger.push(record);
            return Vec::new();
        }

        let windows = self.windows();
        let (daily_before, monthly_before) = windows.sums(&ledger);
        ledger.push(record);
        let (daily, monthly) = windows.sums(&ledger);
        drop(ledger);

        let mut alerts = Vec::new();
        let checks = [
            (BudgetWindow::Daily, daily_before, daily, self.config.daily_limit),
            (BudgetWindow::Monthly, monthly_before, monthly, self.config.monthly_limit),
        ];
        for (window, before, spent, limit) in checks {
            let Some(limit) = limit else { continue };
            if let Some(level) = self.crossed(limit, before, spent) {
                tracing::warn!(
                    window = ?window,
                    level = ?level,
                    spent = %spent,
                    limit = %limit,
                    "Budget alert"
                );
                alerts.push(BudgetAlert {
                    window,
                    level,
                    spent,
                    limit,
                });
            }
        }
        alerts
    }

    /// Appends the ledger entry for a successful outcome. Alerts are logged
    /// by [`Self::record`] and not returned.
    pub async fn record_outcome(&self, outcome: &Outcome) {
        self.record(CostRecord::from_outcome(outcome)).await;
    }

    /// Sum of entries from the start of today up to now.
    pub async fn daily_cost(&self) -> Cost {
        let ledger = self.ledger.read().await;
        self.windows().sums(&ledger).0
    }

    /// Sum of entries from the first of this month up to now.
    pub async fn monthly_cost(&self) -> Cost {
        let ledger = self.ledger.read().await;
        self.windows().sums(&ledger).1
    }

    /// Sum of every entry ever recorded.
    pub async fn total_cost(&self) -> Cost {
        self.ledger.read().await.iter().map(|r| r.cost).sum()
    }

    /// Unwindowed spend grouped by provider.
    pub async fn costs_by_provider(&self) -> BTreeMap<ProviderName, Cost> {
        let ledger = self.ledger.read().await;
        group_by(&ledger, |r| r.provider.clone())
    }

    /// Unwindowed spend grouped by capability kind.
    pub async fn costs_by_kind(&self) -> BTreeMap<CapabilityKind, Cost> {
        let ledger = self.ledger.read().await;
        group_by(&ledger, |r| r.kind)
    }

    /// Number of ledger entries.
    pub async fn len(&self) -> usize {
        self.ledger.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.ledger.read().await.is_empty()
    }

    /// All aggregates computed against a single consistent read of the ledger.
    pub async fn stats(&self) -> CostStats {
        let ledger = self.ledger.read().await;
        let (daily, monthly) = self.windows().sums(&ledger);
        CostStats {
            daily,
            monthly,
            total: ledger.iter().map(|r| r.cost).sum(),
            record_count: ledger.len(),
            daily_limit: self.config.daily_limit,
            monthly_limit: self.config.monthly_limit,
            by_provider: group_by(&ledger, |r| r.provider.clone()),
            by_kind: group_by(&ledger, |r| r.kind),
        }
    }

    /// Copies the ledger out.
    pub async fn export(&self) -> LedgerExport {
        let ledger = self.ledger.read().await;
        LedgerExport {
            exported_at: self.clock.now(),
            total: ledger.iter().map(|r| r.cost).sum(),
            records: ledger.clone(),
        }
    }

    /// Empties the ledger.
    pub async fn clear(&self) {
        let mut ledger = self.ledger.write().await;
        tracing::info!(records = ledger.len(), "Cost ledger cleared");
        ledger.clear();
    }

    fn crossed(&self, limit: CostLimit, before: Cost, after: Cost) -> Option<AlertLevel> {
        let threshold = self.config.alert_threshold;
        if !limit.is_exceeded_by(before) && limit.is_exceeded_by(after) {
            Some(AlertLevel::LimitReached)
        } else if limit.utilisation(before) < threshold && limit.utilisation(after) >= threshold {
            Some(AlertLevel::ThresholdReached)
        } else {
            None
        }
    }

    fn windows(&self) -> Windows {
        let now = self.clock.now().as_datetime();
        let offset = self
            .config
            .utc_offset_minutes
            .and_then(|minutes| FixedOffset::east_opt(minutes.saturating_mul(60)));
        let (day_start, month_start) = match offset {
            Some(offset) => window_starts(&offset, now),
            None => window_starts(&Local, now),
        };
        Windows {
            now,
            day_start,
            month_start,
        }
    }
}

/// Window boundaries captured once per aggregate so both sums agree on "now".
struct Windows {
    now: DateTime<Utc>,
    day_start: DateTime<Utc>,
    month_start: DateTime<Utc>,
}

impl Windows {
    fn sums(&self, ledger: &[CostRecord]) -> (Cost, Cost) {
        let mut daily = Cost::zero();
        let mut monthly = Cost::zero();
        for record in ledger {
            let at = record.timestamp.as_datetime();
            if at > self.now {
                continue;
            }
            if at >= self.month_start {
                monthly += record.cost;
            }
            if at >= self.day_start {
                daily += record.cost;
            }
        }
        (daily, monthly)
    }
}

fn window_starts<Tz: TimeZone>(tz: &Tz, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let today = now.with_timezone(tz).date_naive();
    let first_of_month = today.with_day(1).unwrap_or(today);
    (midnight(tz, today), midnight(tz, first_of_month))
}

fn midnight<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::default());
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}

fn group_by<K: Ord>(ledger: &[CostRecord], key: impl Fn(&CostRecord) -> K) -> BTreeMap<K, Cost> {
    let mut grouped = BTreeMap::new();
    for record in ledger {
        *grouped.entry(key(record)).or_insert_with(Cost::zero) += record.cost;
    }
    grouped
}
