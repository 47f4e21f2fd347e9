//! Quality scores used by [`RoutingStrategy::QualityFirst`](crate::RoutingStrategy).
//!
//! Scores are relative integers per capability kind; a provider missing from
//! a kind's table scores 0.

use std::collections::HashMap;

use domain::{CapabilityKind, ProviderName};

use crate::config::QualityOverride;

/// Per-capability-kind `{provider → score}` table.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityTable {
    scores: HashMap<CapabilityKind, HashMap<String, u32>>,
}

impl QualityTable {
    /// An empty table: every provider scores 0.
    pub fn empty() -> Self {
        Self {
            scores: HashMap::new(),
        }
    }

    /// Score of `provider` for `kind`; 0 if absent.
    pub fn score(&self, kind: CapabilityKind, provider: &ProviderName) -> u32 {
        self.scores
            .get(&kind)
            .and_then(|table| table.get(provider.as_str()))
            .copied()
            .unwrap_or(0)
    }

    /// Sets (or replaces) one score.
    pub fn set(&mut self, kind: CapabilityKind, provider: &ProviderName, score: u32) {
        self.scores
            .entry(kind)
            .or_default()
            .insert(provider.as_str().to_owned(), score);
    }

    /// Applies configured overrides on top of this table.
    pub fn with_overrides(mut self, overrides: &[QualityOverride]) -> Self {
        for o in overrides {
            self.set(o.kind, &o.provider, o.score);
        }
        self
    }

    fn insert_builtin(&mut self, kind: CapabilityKind, entries: &[(&str, u32)]) {
        let table = self.scores.entry(kind).or_default();
        for (name, score) in entries {
            table.insert((*name).to_owned(), *score);
        }
    }
}

impl Default for QualityTable {
    /// The built-in table for the commonly deployed providers.
    fn default() -> Self {
        let mut table = Self::empty();
        table.insert_builtin(
            CapabilityKind::VisionAnalysis,
            &[("openai", 9), ("anthropic", 9), ("gemini", 8)],
        );
        table.insert_builtin(
            CapabilityKind::TextGeneration,
            &[("anthropic", 10), ("openai", 9), ("gemini", 8), ("mistral", 7)],
        );
        table.insert_builtin(
            CapabilityKind::TextValidation,
            &[("anthropic", 10), ("openai", 9), ("gemini", 8)],
        );
        table.insert_builtin(
            CapabilityKind::ImageSynthesis,
            &[("openai", 9), ("stability", 8), ("replicate", 7)],
        );
        table
    }
}
