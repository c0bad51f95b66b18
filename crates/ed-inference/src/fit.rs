//! Fit orchestration: validate, hand the data to the sampler, keep the draws
//! together with everything needed to label them.

use ed_core::{
    Error, ModelArtifact, ModelRegistry, ModelSpec, PosteriorDraws, Result, Sampler,
    SamplerConfig, StepLayout,
};
use ed_data::{CanonicalDataset, IdentifierMap};

use crate::aggregate::{
    ItemSummaryTable, PersonSummaryTable, summarize_ability, summarize_items, summarize_persons,
};
use crate::diagnostics::{QualityGates, QualityStatus, QualitySummary, quality_summary};
use crate::summary::SummaryOptions;

/// Runs a model variant on a dataset through a [`Sampler`].
pub struct Fitter<S> {
    registry: ModelRegistry,
    sampler: S,
}

impl<S: Sampler> Fitter<S> {
    /// Fitter with the default artifact registry.
    pub fn new(sampler: S) -> Self {
        Self { registry: ModelRegistry::default(), sampler }
    }

    /// Fitter resolving artifacts through `registry`.
    pub fn with_registry(registry: ModelRegistry, sampler: S) -> Self {
        Self { registry, sampler }
    }

    /// Artifact registry.
    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Underlying sampler.
    pub fn sampler(&self) -> &S {
        &self.sampler
    }

    /// Fit the registered variant `model` (`"rasch"`, `"2pl"`, ...).
    pub fn fit(
        &self,
        model: &str,
        dataset: &CanonicalDataset,
        config: &SamplerConfig,
    ) -> Result<IrtFit> {
        let artifact = self.registry.resolve(model)?;
        self.fit_artifact(artifact, dataset, config)
    }

    /// Fit a specific artifact.
    ///
    /// Configuration and response floors are checked before the sampler is
    /// invoked; the returned draws must be complete and finite.
    pub fn fit_artifact(
        &self,
        artifact: ModelArtifact,
        dataset: &CanonicalDataset,
        config: &SamplerConfig,
    ) -> Result<IrtFit> {
        config.validate()?;
        let spec = artifact.spec;
        dataset.check_model(spec)?;
        let data = dataset.to_stan_data(spec);
        log::debug!(
            "{}: I={} J={} N={} K={}",
            spec.name,
            data.n_items,
            data.n_persons,
            data.n_obs,
            data.n_covariates
        );

        let engine = self.sampler.name().to_string();
        log::info!(
            "sampling {} with {engine}: {} chains, {} warmup + {} draws",
            artifact.path.display(),
            config.chains,
            config.iter_warmup,
            config.iter_sampling
        );
        let draws = self.sampler.sample(&artifact, &data, config).map_err(|e| Error::Sampling {
            engine: engine.clone(),
            message: e.to_string(),
            source: Some(e),
        })?;
        if let Some(problem) = draws.completeness_problem() {
            return Err(Error::Sampling {
                engine,
                message: format!("unusable draws: {problem}"),
                source: None,
            });
        }
        log::info!(
            "{} finished: {} parameters, {} draws",
            spec.name,
            draws.param_names.len(),
            draws.total_draws()
        );

        Ok(IrtFit {
            layout: dataset.step_layout(spec),
            artifact,
            items: dataset.items().clone(),
            persons: dataset.persons().clone(),
            covariate_names: dataset.design().column_names().to_vec(),
            raw_scores: dataset.raw_scores(),
            draws,
        })
    }
}

/// A completed fit: draws plus the labels needed to summarize them.
#[derive(Debug, Clone)]
pub struct IrtFit {
    artifact: ModelArtifact,
    layout: StepLayout,
    items: IdentifierMap,
    persons: IdentifierMap,
    covariate_names: Vec<String>,
    raw_scores: Vec<u64>,
    draws: PosteriorDraws,
}

impl IrtFit {
    /// Variant specification.
    pub fn spec(&self) -> &'static ModelSpec {
        self.artifact.spec
    }

    /// Artifact that produced the draws.
    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    /// Step layout the data dictionary was built with.
    pub fn layout(&self) -> &StepLayout {
        &self.layout
    }

    /// Raw posterior draws.
    pub fn draws(&self) -> &PosteriorDraws {
        &self.draws
    }

    /// Item label map.
    pub fn items(&self) -> &IdentifierMap {
        &self.items
    }

    /// Person label map.
    pub fn persons(&self) -> &IdentifierMap {
        &self.persons
    }

    /// Design matrix column names, in λ order.
    pub fn covariate_names(&self) -> &[String] {
        &self.covariate_names
    }

    /// Item table including the ability distribution rows.
    pub fn item_summary(&self, options: &SummaryOptions) -> Result<ItemSummaryTable> {
        let spec = self.spec();
        let ability = summarize_ability(&self.draws, spec, &self.covariate_names, options)?;
        Ok(summarize_items(&self.draws, &self.items, spec, &self.layout, options)?
            .with_ability(ability))
    }

    /// Person table with raw scores.
    pub fn person_summary(&self, options: &SummaryOptions) -> Result<PersonSummaryTable> {
        summarize_persons(&self.draws, &self.persons, options)?.with_raw_scores(&self.raw_scores)
    }

    /// Apply convergence gates to every reported parameter.
    pub fn quality(
        &self,
        options: &SummaryOptions,
        gates: &QualityGates,
    ) -> Result<QualitySummary> {
        let items = self.item_summary(options)?;
        let persons = self.person_summary(options)?;
        let params = items.params().chain(persons.persons.iter().map(|p| &p.theta));
        let summary =
            quality_summary(params, self.draws.chains.len(), self.draws.n_samples, gates);
        if summary.status != QualityStatus::Ok {
            log::warn!("{} fit quality: {}", self.spec().name, summary.status);
            for msg in summary.failures.iter().chain(&summary.warnings) {
                log::warn!("  {msg}");
            }
        }
        Ok(summary)
    }
}
