//! Serde-deserializable provider declarations.
//!
//! Lets a config file stand up scripted providers for dry runs:
//!
//! ```toml
//! [[providers]]
//! name = "openai"
//! capabilities = ["text-generation", "image-synthesis"]
//! cost_per_call = 0.02
//! avg_latency_ms = 800
//! ```

use std::time::Duration;

use domain::{CapabilityKind, ConfigError, Cost, ProviderError, ProviderErrorKind, ProviderName};
use serde::Deserialize;

use crate::scripted::ScriptedProvider;

/// One provider entry from a config file.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ProviderSpec {
    pub name: ProviderName,
    pub capabilities: Vec<CapabilityKind>,
    pub cost_per_call: Cost,
    #[serde(default)]
    pub avg_latency_ms: u64,
    /// Sleep for `avg_latency_ms` on every call.
    #[serde(default)]
    pub simulate_latency: bool,
    /// Canned validation replies fail.
    #[serde(default)]
    pub reject_validation: bool,
    /// Fail every call with this error kind.
    #[serde(default)]
    pub fail_with: Option<ProviderErrorKind>,
}

impl ProviderSpec {
    /// Builds the scripted provider this entry describes.
    pub fn build(&self) -> Result<ScriptedProvider, ConfigError> {
        if self.capabilities.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "provider '{}' declares no capabilities",
                self.name
            )));
        }

        let mut provider =
            ScriptedProvider::new(self.name.clone(), &self.capabilities, self.cost_per_call)
                .with_latency(Duration::from_millis(self.avg_latency_ms));
        if self.simulate_latency {
            provider = provider.simulating_latency();
        }
        if self.reject_validation {
            provider = provider.rejecting_validation();
        }
        if let Some(kind) = self.fail_with {
            provider = provider.always_failing(ProviderError::new(
                kind,
                format!("{} configured to fail", self.name),
            ));
        }
        Ok(provider)
    }
}
