//! Switchyard provider router.
//!
//! Selects a provider for each [`domain::Task`] by strategy, fails over in a
//! fixed order, isolates repeatedly-failing providers behind a circuit
//! breaker, and refuses calls once a rolling spend ceiling is reached.
//!
//! ## Architectural Layer
//!
//! **Routing core.** Talks to providers only through the [`domain::Provider`]
//! port; never performs I/O of its own.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`router`] | `Router`, its builder, strategy ordering and failover |
//! | [`circuit_breaker`] | Per-provider closed / open / half-open state machine |
//! | [`cost_tracker`] | Append-only spend ledger and budget gate |
//! | [`quality`] | Quality scores for the quality-first strategy |
//! | [`config`] | Serde-deserializable router, budget and breaker configuration |
//! | [`error`] | `RouteError` |

pub mod circuit_breaker;
pub mod config;
pub mod cost_tracker;
pub mod error;
pub mod quality;
pub mod router;

pub use circuit_breaker::{CircuitBreaker, CircuitSnapshot, CircuitState};
pub use config::{
    BudgetConfig, CircuitBreakerConfig, QualityOverride, RouterConfig, RoutingStrategy,
};
pub use cost_tracker::{
    AlertLevel, BudgetAlert, BudgetWindow, CostRecord, CostStats, CostTracker, LedgerExport,
};
pub use error::RouteError;
pub use quality::QualityTable;
pub use router::{CostEstimate, ProviderEstimate, Router, RouterBuilder};
