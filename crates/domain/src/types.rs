//! Shared value types for the Switchyard routing domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! meaningful values with invariants (costs are finite and non-negative, scores
//! are in `[0.0, 1.0]`) and participate in domain computations.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Capability kinds
// ---------------------------------------------------------------------------

/// The closed set of operations a provider can be asked to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CapabilityKind {
    /// Describe or extract structure from an image.
    VisionAnalysis,
    /// Produce text from a prompt.
    TextGeneration,
    /// Judge a piece of text against a set of criteria.
    TextValidation,
    /// Produce an image from a prompt.
    ImageSynthesis,
}

impl CapabilityKind {
    /// Every capability kind, in declaration order.
    pub const ALL: [CapabilityKind; 4] = [
        CapabilityKind::VisionAnalysis,
        CapabilityKind::TextGeneration,
        CapabilityKind::TextValidation,
        CapabilityKind::ImageSynthesis,
    ];

    /// Returns the kebab-case wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VisionAnalysis => "vision-analysis",
            Self::TextGeneration => "text-generation",
            Self::TextValidation => "text-validation",
            Self::ImageSynthesis => "image-synthesis",
        }
    }
}

impl std::fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Cost types
// ---------------------------------------------------------------------------

/// Monetary cost of a provider call, expressed in US dollars.
///
/// Used for per-call, per-stage, and per-run cost tracking. Arithmetic
/// operations are provided; callers are responsible for rounding to suitable
/// display precision.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Cost(f64);

impl Cost {
    /// Creates a [`Cost`] from a raw float value (USD).
    ///
    /// Returns `None` if `value` is negative, infinite, or NaN.
    #[must_use]
    pub fn new(value: f64) -> Option<Self> {
        if value.is_finite() && value >= 0.0 {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Creates a [`Cost`] of exactly zero.
    pub fn zero() -> Self {
        Self(0.0)
    }

    /// Returns the underlying `f64` value (USD).
    pub fn as_f64(self) -> f64 {
        self.0
    }

    /// Total ordering for sorting candidates; costs are never NaN.
    pub fn total_cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl std::fmt::Display for Cost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${:.6}", self.0)
    }
}

impl std::ops::Add for Cost {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl std::ops::AddAssign for Cost {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl std::iter::Sum for Cost {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, c| acc + c)
    }
}

impl TryFrom<f64> for Cost {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("cost must be finite and non-negative, got {value}"))
    }
}

impl From<Cost> for f64 {
    fn from(value: Cost) -> Self {
        value.0
    }
}

// ---------------------------------------------------------------------------

/// Spend ceiling for a calendar window (a day or a month).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct CostLimit(f64);

impl CostLimit {
    /// Creates a [`CostLimit`] cap (USD).
    ///
    /// Returns `None` if `limit` is not strictly positive, infinite, or NaN.
    #[must_use]
    pub fn new(limit: f64) -> Option<Self> {
        if limit.is_finite() && limit > 0.0 {
            Some(Self(limit))
        } else {
            None
        }
    }

    /// Returns the limit as a `f64` (USD).
    pub fn as_f64(self) -> f64 {
        self.0
    }

    /// Returns `true` if `accumulated` equals or exceeds this limit.
    pub fn is_exceeded_by(self, accumulated: Cost) -> bool {
        accumulated.as_f64() >= self.0
    }

    /// Fraction of the limit consumed by `accumulated` (may exceed `1.0`).
    pub fn utilisation(self, accumulated: Cost) -> f64 {
        accumulated.as_f64() / self.0
    }
}

impl std::fmt::Display for CostLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${:.6}", self.0)
    }
}

impl TryFrom<f64> for CostLimit {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("limit must be finite and positive, got {value}"))
    }
}

impl From<CostLimit> for f64 {
    fn from(value: CostLimit) -> Self {
        value.0
    }
}

// ---------------------------------------------------------------------------
// Score types
// ---------------------------------------------------------------------------

/// A validation confidence score in the range `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct ValidationScore(f64);

impl ValidationScore {
    /// Creates a [`ValidationScore`], returning `None` if `value` is outside
    /// the valid range `[0.0, 1.0]`.
    #[must_use]
    pub fn new(value: f64) -> Option<Self> {
        if value.is_finite() && (0.0..=1.0).contains(&value) {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Returns the score as an `f64` in `[0.0, 1.0]`.
    pub fn as_f64(self) -> f64 {
        self.0
    }
}

impl std::fmt::Display for ValidationScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Findings
// ---------------------------------------------------------------------------

/// Severity level for a [`ValidationIssue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    /// Finding that fails the validation on its own.
    Blocking,
    /// Finding that should be addressed but does not fail the validation.
    Warning,
    /// Contextual information with no impact on the verdict.
    Informational,
}

/// A single finding reported by a text-validation provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Severity of this finding.
    pub severity: IssueSeverity,

    /// Free-form category tag (e.g. `"cultural_sensitivity"`, `"trademark"`).
    pub category: String,

    /// Human-readable description of the finding.
    pub message: String,
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly; the underlying representation can change without affecting the
/// domain API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Creates a [`Timestamp`] from milliseconds since the Unix epoch.
    ///
    /// Out-of-range values clamp to the epoch.
    pub fn from_unix_millis(millis: i64) -> Self {
        Self(Utc.timestamp_millis_opt(millis).single().unwrap_or_default())
    }

    /// Milliseconds since the Unix epoch.
    pub fn unix_millis(self) -> i64 {
        self.0.timestamp_millis()
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }

    /// Time elapsed from `earlier` to `self`, zero if `earlier` is later.
    pub fn saturating_duration_since(self, earlier: Timestamp) -> Duration {
        (self.0 - earlier.0).to_std().unwrap_or(Duration::ZERO)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}
