//! # ed-data
//!
//! Response data shaping for edstan-rs.
//!
//! This crate turns raw response data into the canonical dataset every model
//! variant consumes:
//! - wide matrices and long item/person/response triplets,
//! - person covariates encoded into a design matrix (explicitly or via a
//!   small formula grammar),
//! - response floor checks per model variant.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Response checks (hard floors and logged advisories).
pub mod checks;
/// Covariate table and encoding configuration.
pub mod covariates;
/// Canonical dataset and builder.
pub mod dataset;
/// Design matrix construction.
pub mod design;
/// Formula parsing into a covariate specification.
pub mod formula;
/// Label/index maps.
pub mod identifiers;
/// Input shapes.
pub mod input;

pub use checks::Advisory;
pub use covariates::{CovariateColumn, CovariateSpec, CovariateTable, CovariateTerm, Encoding};
pub use dataset::{CanonicalDataset, DatasetBuilder, Observation};
pub use design::{DesignMatrix, INTERCEPT, build_design};
pub use formula::parse_formula;
pub use identifiers::IdentifierMap;
pub use input::{LongResponses, ResponseMatrix};
