//! Sampler configuration passed through to the engine.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Engine configuration. The core never interprets these values beyond basic
/// sanity checks; they are handed to [`crate::traits::Sampler::sample`] as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Number of chains.
    pub chains: usize,
    /// Warmup iterations per chain.
    pub iter_warmup: usize,
    /// Post-warmup iterations per chain.
    pub iter_sampling: usize,
    /// Random seed (`None` lets the engine choose).
    pub seed: Option<u64>,
    /// Wall-clock limit in seconds, if the engine supports one.
    pub timeout_secs: Option<u64>,
    /// Engine-specific options forwarded verbatim.
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            chains: 4,
            iter_warmup: 1000,
            iter_sampling: 1000,
            seed: None,
            timeout_secs: None,
            extra: BTreeMap::new(),
        }
    }
}

impl SamplerConfig {
    /// Set the number of chains.
    pub fn chains(mut self, chains: usize) -> Self {
        self.chains = chains;
        self
    }

    /// Set warmup and sampling iterations.
    pub fn iterations(mut self, warmup: usize, sampling: usize) -> Self {
        self.iter_warmup = warmup;
        self.iter_sampling = sampling;
        self
    }

    /// Set the seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the timeout.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Forward an engine-specific option.
    pub fn option(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json(s: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject configurations no engine can honour.
    pub fn validate(&self) -> Result<()> {
        if self.chains == 0 {
            return Err(Error::Validation("chains must be >= 1".to_string()));
        }
        if self.iter_sampling == 0 {
            return Err(Error::Validation("iter_sampling must be >= 1".to_string()));
        }
        Ok(())
    }
}
