//! # ed-inference
//!
//! Fitting and posterior summaries for edstan-rs.
//!
//! This crate provides:
//! - the fit orchestrator that runs a model variant through a [`Sampler`],
//! - item, person and ability-distribution summary tables,
//! - split R-hat, bulk/tail ESS and convergence quality gates.
//!
//! ## Architecture
//!
//! The engine is only reached through the `Sampler` trait from ed-core, so
//! everything here runs against any backend (or a test double).
//!
//! [`Sampler`]: ed_core::Sampler

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Draw aggregation onto items, persons and the ability distribution.
pub mod aggregate;
/// MCMC diagnostics and quality gates.
pub mod diagnostics;
/// Fit orchestration.
pub mod fit;
/// Quantiles and central credible intervals.
pub mod interval;
/// Text rendering of summary tables.
pub mod render;
/// Per-parameter summaries.
pub mod summary;

pub use aggregate::{
    ABILITY_GROUP, AbilityRow, ItemEntry, ItemSummaryTable, PersonRow, PersonSummaryTable,
    RATING_SCALE_GROUP, StepSummary, SummaryRow, summarize_ability, summarize_items,
    summarize_persons,
};
pub use diagnostics::{
    QualityGates, QualityStatus, QualitySummary, compute_param_diagnostics, quality_summary,
};
pub use fit::{Fitter, IrtFit};
pub use interval::central_interval;
pub use summary::{ParamSummary, SummaryOptions, summarize_param};
