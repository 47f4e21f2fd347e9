//! Switchyard pipeline.
//!
//! Chains four routed calls (image analysis, text generation, validation and
//! image synthesis) into one run with a validation gate. Every run ends in a
//! structured [`PipelineResult`]; partial results survive any failure.
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** Sequences stage adapters over [`router::Router`].
//! Holds no provider, circuit or budget logic of its own.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`pipeline`] | `Pipeline`: run state machine, single-stage entry points, cost estimate |
//! | [`stages`] | Router-backed stage adapters shared by runs and entry points |
//! | [`types`] | `PipelineInput`, `PipelineOptions`, `PipelineResult`, `Stage`, estimates |
//! | [`errors`] | `StageError`, `PipelineFailure` |

pub mod errors;
pub mod pipeline;
pub mod stages;
pub mod types;

pub use errors::{PipelineFailure, StageError};
pub use pipeline::Pipeline;
pub use stages::SynthesisBatch;
pub use types::{
    PipelineEstimate, PipelineInput, PipelineOptions, PipelineResult, Stage, StageCostHeuristics,
    StageEstimate, StageRecord,
};
