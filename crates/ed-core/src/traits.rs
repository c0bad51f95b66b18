//! Core traits for edstan-rs
//!
//! The sampling engine sits behind [`Sampler`], so the fit orchestrator in
//! `ed-inference` never depends on a concrete engine.

use crate::config::SamplerConfig;
use crate::draws::PosteriorDraws;
use crate::error::EngineError;
use crate::model::ModelArtifact;
use crate::types::StanData;

/// External MCMC engine.
///
/// Implementations run the artifact on the data dictionary and return the full
/// draw set once sampling has completed.
pub trait Sampler {
    /// Engine name used in error messages (e.g. `"cmdstan"`).
    fn name(&self) -> &str;

    /// Run the artifact on `data` with `config`.
    fn sample(
        &self,
        artifact: &ModelArtifact,
        data: &StanData,
        config: &SamplerConfig,
    ) -> std::result::Result<PosteriorDraws, EngineError>;
}

impl<S: Sampler + ?Sized> Sampler for &S {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn sample(
        &self,
        artifact: &ModelArtifact,
        data: &StanData,
        config: &SamplerConfig,
    ) -> std::result::Result<PosteriorDraws, EngineError> {
        (**self).sample(artifact, data, config)
    }
}
