//! The provider port.
//!
//! A provider is an external capability backend (an HTTP API, an SDK, a local
//! model, a test double). This crate defines *what* the router needs from one;
//! adapter crates define *how* each backend supplies it.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{CapabilityKind, Cost, ProviderError, ProviderName, Task, TaskOutput};

/// Static profile of a provider, registered once at router construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    /// Unique key.
    pub name: ProviderName,
    /// Capability kinds this provider can execute.
    pub capabilities: Vec<CapabilityKind>,
    /// Typical cost of one call (USD).
    pub cost_per_call: Cost,
    /// Typical end-to-end latency of one call.
    pub avg_latency: Duration,
}

impl ProviderDescriptor {
    /// Returns `true` if `kind` is among the declared capabilities.
    pub fn supports(&self, kind: CapabilityKind) -> bool {
        self.capabilities.contains(&kind)
    }
}

/// What a provider hands back on success.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderReply {
    /// The payload.
    pub output: TaskOutput,
    /// What the call actually cost.
    pub cost: Cost,
}

/// A backend capable of executing one or more capability kinds.
///
/// Implementations own their transport, credentials and timeouts. A timeout
/// must surface as a retryable [`ProviderError`] so it flows into the
/// router's failover path.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Static profile of this provider.
    fn descriptor(&self) -> &ProviderDescriptor;

    /// The unique key of this provider.
    fn name(&self) -> &ProviderName {
        &self.descriptor().name
    }

    /// Returns `true` if this provider can execute `kind`.
    fn supports(&self, kind: CapabilityKind) -> bool {
        self.descriptor().supports(kind)
    }

    /// Advisory estimate of what executing `task` would cost.
    fn estimate_cost(&self, _task: &Task) -> Cost {
        self.descriptor().cost_per_call
    }

    /// Executes `task`, returning the payload and its cost or a classified error.
    async fn execute(&self, task: &Task) -> Result<ProviderReply, ProviderError>;
}
