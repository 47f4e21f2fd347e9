//! Switchyard provider adapters.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Implements the [`domain::Provider`] port. Real network
//! backends plug in here beside [`ScriptedProvider`], which replays a script
//! in-process for dry runs and tests.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`scripted`] | `ScriptedProvider` and its `Step` script |
//! | [`config`] | `ProviderSpec`, the config-file form of a scripted provider |

pub mod config;
pub mod scripted;

pub use config::ProviderSpec;
pub use scripted::{ScriptedProvider, Step};
