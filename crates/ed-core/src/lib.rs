//! # ed-core
//!
//! Core types shared across edstan-rs:
//! - error type and result alias,
//! - the registry of the six IRT model variants and their step layouts,
//! - the data dictionary handed to the sampling engine,
//! - posterior draw storage,
//! - the [`Sampler`] trait behind which the external engine lives.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod draws;
pub mod error;
pub mod model;
pub mod traits;
pub mod types;

pub use config::SamplerConfig;
pub use draws::{Chain, ParamDiagnostics, ParamKey, PosteriorDraws};
pub use error::{EngineError, Entity, Error, Result};
pub use model::{
    ModelArtifact, ModelKind, ModelRegistry, ModelSpec, ParamRole, ResponseFloor, StepLayout,
    StepStructure, lookup,
};
pub use traits::Sampler;
pub use types::{StanData, StepCounts};
