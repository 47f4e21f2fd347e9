//! CLI configuration file.
//!
//! ```toml
//! [router]
//! strategy = "quality-first"
//! fallback_enabled = true
//!
//! [router.budget]
//! daily_limit = 5.0
//!
//! [heuristics]
//! synthesis_per_asset = 0.08
//!
//! [[providers]]
//! name = "anthropic"
//! capabilities = ["text-generation", "text-validation"]
//! cost_per_call = 0.015
//! avg_latency_ms = 1200
//! ```

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use domain::ConfigError;
use pipeline::{Pipeline, StageCostHeuristics};
use providers::ProviderSpec;
use router::{Router, RouterConfig};
use serde::Deserialize;

/// Everything the binary needs to assemble a router and pipeline.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    pub router: RouterConfig,
    pub heuristics: StageCostHeuristics,
    pub providers: Vec<ProviderSpec>,
}

impl CliConfig {
    /// Reads and parses a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Builds the router described by this config.
    pub fn build_router(&self) -> Result<Router, ConfigError> {
        if self.providers.is_empty() {
            return Err(ConfigError::Invalid("no providers configured".into()));
        }
        let mut builder = Router::builder().config(self.router.clone());
        for spec in &self.providers {
            builder = builder.provider(spec.build()?);
        }
        builder.build()
    }

    /// Builds the pipeline (and its router) described by this config.
    pub fn build_pipeline(&self) -> Result<Pipeline, ConfigError> {
        let router = self.build_router()?;
        Ok(Pipeline::new(Arc::new(router)).with_heuristics(self.heuristics.clone()))
    }
}

#[cfg(test)]
mod tests {
    use domain::{CapabilityKind, Cost};
    use router::RoutingStrategy;

    use super::*;

    const SAMPLE: &str = r#"
        [router]
        strategy = "speed-first"
        preferred_providers = ["fast", "slow"]

        [router.budget]
        daily_limit = 5.0
        alert_threshold = 0.5

        [heuristics]
        synthesis_per_asset = 0.5

        [[providers]]
        name = "fast"
        capabilities = ["text-generation"]
        cost_per_call = 0.25
        avg_latency_ms = 100

        [[providers]]
        name = "slow"
        capabilities = ["text-generation", "image-synthesis"]
        cost_per_call = 0.125
        avg_latency_ms = 900
    "#;

    #[test]
    fn parses_full_config() {
        let config = CliConfig::parse(SAMPLE).unwrap();
        assert_eq!(config.router.strategy, RoutingStrategy::SpeedFirst);
        assert_eq!(config.router.preferred_providers.len(), 2);
        assert_eq!(config.router.budget.alert_threshold, 0.5);
        assert_eq!(config.heuristics.synthesis_per_asset, Cost::new(0.5).unwrap());
        assert_eq!(config.heuristics.generation, StageCostHeuristics::default().generation);
        assert_eq!(config.providers.len(), 2);
    }

    #[test]
    fn builds_router_in_registration_order() {
        let router = CliConfig::parse(SAMPLE).unwrap().build_router().unwrap();
        let names: Vec<&str> = router.providers().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["fast", "slow"]);
        assert_eq!(
            router.plan(CapabilityKind::TextGeneration)[0].as_str(),
            "fast"
        );
    }

    #[test]
    fn rejects_unknown_keys_and_empty_provider_list() {
        assert!(CliConfig::parse("[routr]\nstrategy = \"speed-first\"").is_err());
        assert!(matches!(
            CliConfig::default().build_router(),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn duplicate_provider_names_fail_to_build() {
        let text = r#"
            [[providers]]
            name = "twin"
            capabilities = ["text-generation"]
            cost_per_call = 0.1

            [[providers]]
            name = "twin"
            capabilities = ["image-synthesis"]
            cost_per_call = 0.2
        "#;
        let result = CliConfig::parse(text).unwrap().build_router();
        assert!(matches!(result, Err(ConfigError::DuplicateProvider(_))));
    }
}
