//! Model registry: the six fixed IRT variants and their data contracts.
//!
//! All variants share the canonical data schema (`I, J, N, ii, jj, y, K, W`).
//! They differ along a small set of structural axes:
//!
//! | name   | α  | steps    | σ     | response floor |
//! |--------|----|----------|-------|----------------|
//! | rasch  | no | none     | free  | binary         |
//! | 2pl    | yes| none     | fixed | binary         |
//! | pcm    | no | per item | free  | per-item zero  |
//! | gpcm   | yes| per item | fixed | per-item zero  |
//! | rsm    | no | shared   | free  | shared zero    |
//! | grsm   | yes| shared   | fixed | shared zero    |
//!
//! σ is fixed at 1 whenever α is estimated; otherwise the α and σ scales are
//! not jointly identified.

use std::fmt;
use std::ops::Range;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// One of the six supported variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// Rasch model.
    Rasch,
    /// Two-parameter logistic model.
    #[serde(rename = "2pl")]
    TwoPl,
    /// Partial credit model.
    Pcm,
    /// Generalized partial credit model.
    Gpcm,
    /// Rating scale model.
    Rsm,
    /// Generalized rating scale model.
    Grsm,
}

impl ModelKind {
    /// All variants in registry order.
    pub const ALL: [ModelKind; 6] = [
        ModelKind::Rasch,
        ModelKind::TwoPl,
        ModelKind::Pcm,
        ModelKind::Gpcm,
        ModelKind::Rsm,
        ModelKind::Grsm,
    ];

    /// Static specification for this variant.
    pub fn spec(self) -> &'static ModelSpec {
        &MODELS[self as usize]
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.spec().name)
    }
}

/// How β (and κ) are sized from observed responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStructure {
    /// Dichotomous: one β per item.
    None,
    /// Partial-credit family: `m_i` steps per item, β item-contiguous.
    PerItem,
    /// Rating-scale family: one β per item plus `m` shared κ steps.
    Shared,
}

/// Minimum-response requirement a dataset must satisfy for a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFloor {
    /// Responses are 0 or 1.
    Binary,
    /// Every item's minimum observed response is 0.
    PerItemZero,
    /// The minimum response across all items is 0.
    SharedZero,
}

/// Latent parameter roles a variant may define.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamRole {
    /// Item discrimination α.
    Alpha,
    /// Item (or item-step) difficulty β.
    Beta,
    /// Shared rating-scale step κ.
    Kappa,
    /// Person ability θ.
    Theta,
    /// Latent regression coefficients λ.
    Lambda,
    /// Ability standard deviation σ.
    Sigma,
}

impl ParamRole {
    /// Parameter name used by the model artifacts.
    pub fn stan_name(self) -> &'static str {
        match self {
            ParamRole::Alpha => "alpha",
            ParamRole::Beta => "beta",
            ParamRole::Kappa => "kappa",
            ParamRole::Theta => "theta",
            ParamRole::Lambda => "lambda",
            ParamRole::Sigma => "sigma",
        }
    }
}

impl fmt::Display for ParamRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stan_name())
    }
}

/// Fixed specification of one variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelSpec {
    /// Variant tag.
    pub kind: ModelKind,
    /// Registry name (`"rasch"`, `"2pl"`, ...).
    pub name: &'static str,
    /// Display title.
    pub title: &'static str,
    /// File name of the precompiled artifact.
    pub artifact: &'static str,
    /// Whether item discrimination α is estimated.
    pub has_alpha: bool,
    /// Step structure of β/κ.
    pub steps: StepStructure,
    /// Whether σ is estimated (otherwise fixed at 1).
    pub sigma_free: bool,
    /// Response floor enforced on the data.
    pub floor: ResponseFloor,
}

static MODELS: [ModelSpec; 6] = [
    ModelSpec {
        kind: ModelKind::Rasch,
        name: "rasch",
        title: "Rasch model",
        artifact: "rasch_latent_reg.stan",
        has_alpha: false,
        steps: StepStructure::None,
        sigma_free: true,
        floor: ResponseFloor::Binary,
    },
    ModelSpec {
        kind: ModelKind::TwoPl,
        name: "2pl",
        title: "Two-parameter logistic model",
        artifact: "2pl_latent_reg.stan",
        has_alpha: true,
        steps: StepStructure::None,
        sigma_free: false,
        floor: ResponseFloor::Binary,
    },
    ModelSpec {
        kind: ModelKind::Pcm,
        name: "pcm",
        title: "Partial credit model",
        artifact: "pcm_latent_reg.stan",
        has_alpha: false,
        steps: StepStructure::PerItem,
        sigma_free: true,
        floor: ResponseFloor::PerItemZero,
    },
    ModelSpec {
        kind: ModelKind::Gpcm,
        name: "gpcm",
        title: "Generalized partial credit model",
        artifact: "gpcm_latent_reg.stan",
        has_alpha: true,
        steps: StepStructure::PerItem,
        sigma_free: false,
        floor: ResponseFloor::PerItemZero,
    },
    ModelSpec {
        kind: ModelKind::Rsm,
        name: "rsm",
        title: "Rating scale model",
        artifact: "rsm_latent_reg.stan",
        has_alpha: false,
        steps: StepStructure::Shared,
        sigma_free: true,
        floor: ResponseFloor::SharedZero,
    },
    ModelSpec {
        kind: ModelKind::Grsm,
        name: "grsm",
        title: "Generalized rating scale model",
        artifact: "grsm_latent_reg.stan",
        has_alpha: true,
        steps: StepStructure::Shared,
        sigma_free: false,
        floor: ResponseFloor::SharedZero,
    },
];

impl ModelSpec {
    /// Parameter roles defined by this variant, in reporting order.
    pub fn roles(&self) -> Vec<ParamRole> {
        let mut roles = Vec::with_capacity(6);
        if self.has_alpha {
            roles.push(ParamRole::Alpha);
        }
        roles.push(ParamRole::Beta);
        if self.steps == StepStructure::Shared {
            roles.push(ParamRole::Kappa);
        }
        roles.push(ParamRole::Theta);
        roles.push(ParamRole::Lambda);
        if self.sigma_free {
            roles.push(ParamRole::Sigma);
        }
        roles
    }

    /// Whether the variant defines `role`.
    pub fn has_role(&self, role: ParamRole) -> bool {
        self.roles().contains(&role)
    }

    /// β is sum-to-zero constrained when σ is free (location fixed by items).
    pub fn beta_sum_to_zero(&self) -> bool {
        self.sigma_free
    }

    /// κ is sum-to-zero constrained in both rating-scale variants.
    pub fn kappa_sum_to_zero(&self) -> bool {
        self.steps == StepStructure::Shared
    }

    /// Derive the step layout from per-item maximum observed responses.
    pub fn step_layout(&self, item_max: &[u32]) -> StepLayout {
        match self.steps {
            StepStructure::None => StepLayout::None,
            StepStructure::PerItem => StepLayout::per_item(item_max.to_vec()),
            StepStructure::Shared => {
                StepLayout::Shared { m: item_max.iter().copied().max().unwrap_or(0) }
            }
        }
    }
}

/// Look up a variant by name (trimmed, ASCII case-insensitive).
pub fn lookup(name: &str) -> Result<&'static ModelSpec> {
    let needle = name.trim();
    MODELS
        .iter()
        .find(|spec| spec.name.eq_ignore_ascii_case(needle))
        .ok_or_else(|| Error::UnknownModel(name.to_string()))
}

/// Sizing of β/κ for a given dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepLayout {
    /// No step structure; β has one entry per item.
    None,
    /// Per-item step counts and 1-based offsets into β.
    PerItem {
        /// `m[i]`: number of steps of item `i` (0-based vector index).
        m: Vec<u32>,
        /// `pos[i]`: 1-based start of item `i` in β.
        pos: Vec<usize>,
    },
    /// One step count shared by all items; κ has `m` entries.
    Shared {
        /// Shared number of steps.
        m: u32,
    },
}

impl StepLayout {
    /// Build the per-item layout: `pos[0] = 1`, `pos[i+1] = pos[i] + m[i]`.
    pub fn per_item(m: Vec<u32>) -> Self {
        let mut pos = Vec::with_capacity(m.len());
        let mut next = 1usize;
        for &mi in &m {
            pos.push(next);
            next += mi as usize;
        }
        StepLayout::PerItem { m, pos }
    }

    /// Length of the β vector for `n_items` items.
    pub fn beta_len(&self, n_items: usize) -> usize {
        match self {
            StepLayout::None | StepLayout::Shared { .. } => n_items,
            StepLayout::PerItem { m, .. } => m.iter().map(|&mi| mi as usize).sum(),
        }
    }

    /// Length of the κ vector.
    pub fn kappa_len(&self) -> usize {
        match self {
            StepLayout::Shared { m } => *m as usize,
            _ => 0,
        }
    }

    /// 0-based range of item `item` (0-based) within β.
    pub fn beta_range(&self, item: usize) -> Range<usize> {
        match self {
            StepLayout::None | StepLayout::Shared { .. } => item..item + 1,
            StepLayout::PerItem { m, pos } => {
                let start = pos[item] - 1;
                start..start + m[item] as usize
            }
        }
    }

    /// Whether β rows carry step numbers.
    pub fn has_item_steps(&self) -> bool {
        matches!(self, StepLayout::PerItem { .. })
    }
}

/// Reference to the artifact a sampler should run for a variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelArtifact {
    /// Variant whose data contract the artifact implements.
    pub spec: &'static ModelSpec,
    /// Location of the artifact.
    pub path: PathBuf,
}

impl ModelArtifact {
    /// Point a variant at a caller-supplied artifact.
    ///
    /// The artifact must accept exactly the data contract of `kind`.
    pub fn custom(kind: ModelKind, path: impl Into<PathBuf>) -> Self {
        Self { spec: kind.spec(), path: path.into() }
    }
}

/// Resolves variant names to artifacts under a base directory.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    artifact_dir: PathBuf,
}

impl ModelRegistry {
    /// Create a registry rooted at `artifact_dir`.
    pub fn new(artifact_dir: impl Into<PathBuf>) -> Self {
        Self { artifact_dir: artifact_dir.into() }
    }

    /// Directory holding the precompiled artifacts.
    pub fn artifact_dir(&self) -> &Path {
        &self.artifact_dir
    }

    /// Specification for `name`.
    pub fn spec(&self, name: &str) -> Result<&'static ModelSpec> {
        lookup(name)
    }

    /// Artifact reference for `name`.
    pub fn resolve(&self, name: &str) -> Result<ModelArtifact> {
        let spec = lookup(name)?;
        Ok(ModelArtifact { spec, path: self.artifact_dir.join(spec.artifact) })
    }

    /// All specifications in registry order.
    pub fn specs(&self) -> impl Iterator<Item = &'static ModelSpec> {
        MODELS.iter()
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new("models")
    }
}
