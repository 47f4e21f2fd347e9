//! Newtype domain identifiers.
//!
//! Every domain concept that has an identity is represented as a distinct newtype
//! wrapping a primitive, so a provider name can never be confused with an
//! arbitrary string payload and a run id can never be confused with any other UUID.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display, Borrow<str>.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty
            /// or whitespace only.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                let trimmed = v.trim();
                if trimmed.is_empty() {
                    None
                } else if trimmed.len() == v.len() {
                    Some(Self(v))
                } else {
                    Some(Self(trimmed.to_string()))
                }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = String;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value).ok_or_else(|| format!("{} must not be empty", stringify!($name)))
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers: string-backed (configuration names)
// ---------------------------------------------------------------------------

string_id! {
    /// Identifies a registered provider.
    ///
    /// Provider names are the unique key for circuit state, ledger grouping,
    /// quality scores and the preferred-provider allow-list.
    ProviderName
}

// ---------------------------------------------------------------------------
// Identifiers: UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Identifies a single pipeline run.
///
/// Generated fresh for every `Pipeline::execute` call; propagated through spans
/// so all activity from a single run can be correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PipelineRunId(Uuid);

impl PipelineRunId {
    /// Generates a new random run identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for PipelineRunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_name_rejects_blank_values() {
        assert!(ProviderName::new("").is_none());
        assert!(ProviderName::new("   ").is_none());
    }

    #[test]
    fn provider_name_trims_surrounding_whitespace() {
        let name = ProviderName::new("  openai ").unwrap();
        assert_eq!(name.as_str(), "openai");
    }

    #[test]
    fn provider_name_deserialisation_validates() {
        let ok: ProviderName = serde_json::from_str("\"gemini\"").unwrap();
        assert_eq!(ok.to_string(), "gemini");
        assert!(serde_json::from_str::<ProviderName>("\"\"").is_err());
    }

    #[test]
    fn run_ids_are_unique() {
        assert_ne!(PipelineRunId::new_random(), PipelineRunId::new_random());
    }
}
