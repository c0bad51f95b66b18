//! Error types for edstan-rs

use std::fmt;

use thiserror::Error;

/// Boxed error returned by an external sampling engine.
pub type EngineError = Box<dyn std::error::Error + Send + Sync>;

/// Kind of entity a [`Error::DataRange`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    /// An item (column of a response matrix).
    Item,
    /// A person (row of a response matrix).
    Person,
    /// A single observation in long data.
    Observation,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Item => write!(f, "item"),
            Entity::Person => write!(f, "person"),
            Entity::Observation => write!(f, "observation"),
        }
    }
}

/// edstan-rs error type
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or mismatched input shapes
    #[error("Schema error: {0}")]
    Schema(String),

    /// Response values or indices outside what the data or model allows
    #[error("Data range error for {entity} '{label}': {reason}")]
    DataRange {
        /// Which kind of entity is affected.
        entity: Entity,
        /// Identifier of the offending item/person/observation.
        label: String,
        /// Human-readable description.
        reason: String,
    },

    /// Model name not in the registry
    #[error("Unknown model '{0}' (expected one of: rasch, 2pl, pcm, gpcm, rsm, grsm)")]
    UnknownModel(String),

    /// The sampling engine failed or returned an unusable draw set
    #[error("Sampling error ({engine}): {message}")]
    Sampling {
        /// Engine name as reported by the sampler.
        engine: String,
        /// Engine diagnostic message.
        message: String,
        /// Underlying engine error, if any.
        #[source]
        source: Option<EngineError>,
    },

    /// Draws do not match the parameter layout expected for the model
    #[error("Aggregation error: {0}")]
    Aggregation(String),

    /// Invalid options or arguments
    #[error("Validation error: {0}")]
    Validation(String),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a [`Error::DataRange`] about an item.
    pub fn item_range(label: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::DataRange { entity: Entity::Item, label: label.into(), reason: reason.into() }
    }

    /// Shorthand for a [`Error::DataRange`] about a person.
    pub fn person_range(label: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::DataRange { entity: Entity::Person, label: label.into(), reason: reason.into() }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
