//! Response checks against a model variant.
//!
//! Floors are hard errors; advisories are only logged.

use std::collections::BTreeSet;
use std::fmt;

use ed_core::{Entity, Error, ModelSpec, ResponseFloor, Result, StepStructure};

use crate::dataset::CanonicalDataset;

/// Enforce the response floor of `spec` on `dataset`.
pub fn check_floor(dataset: &CanonicalDataset, spec: &ModelSpec) -> Result<()> {
    let items = dataset.items();
    match spec.floor {
        ResponseFloor::Binary => {
            if let Some(obs) = dataset.observations().find(|o| o.response > 1) {
                return Err(Error::item_range(
                    obs.item,
                    format!(
                        "response {} from person '{}' is not 0 or 1, as the {} requires",
                        obs.response,
                        obs.person,
                        spec.title.to_lowercase()
                    ),
                ));
            }
        }
        ResponseFloor::PerItemZero => {
            for (i, &min) in dataset.item_min_scores().iter().enumerate() {
                if min > 0 {
                    return Err(Error::item_range(
                        &items.labels()[i],
                        format!("minimum observed response is {min}, expected 0"),
                    ));
                }
            }
        }
        ResponseFloor::SharedZero => {
            let mins = dataset.item_min_scores();
            let global = mins.iter().copied().min().unwrap_or(0);
            if global > 0 {
                let i = mins.iter().position(|&m| m == global).unwrap_or(0);
                return Err(Error::item_range(
                    &items.labels()[i],
                    format!("minimum response across all items is {global}, expected 0"),
                ));
            }
        }
    }
    if spec.steps != StepStructure::None && dataset.max_score() == 0 {
        return Err(Error::DataRange {
            entity: Entity::Item,
            label: items.labels().join(", "),
            reason: format!(
                "every response is 0; the {} needs at least one response above 0",
                spec.title.to_lowercase()
            ),
        });
    }
    Ok(())
}

/// Non-fatal observation about an item's response pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advisory {
    /// Only one distinct response value was observed.
    SingleValue {
        /// Item label.
        item: String,
        /// The single value.
        value: u32,
    },
    /// Categories strictly between the item's min and max were never observed.
    CategoryGap {
        /// Item label.
        item: String,
        /// The lowest unobserved categories, at most [`MAX_LISTED_CATEGORIES`].
        missing: Vec<u32>,
        /// Total number of unobserved categories.
        n_missing: u64,
    },
    /// A rating-scale item never uses category 0.
    NoZeroCategory {
        /// Item label.
        item: String,
        /// The item's minimum observed response.
        min: u32,
    },
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Advisory::SingleValue { item, value } => {
                write!(f, "item '{item}' has only one observed response value ({value})")
            }
            Advisory::CategoryGap { item, missing, n_missing } => {
                let cats: Vec<String> = missing.iter().map(|c| c.to_string()).collect();
                write!(f, "item '{item}' has no responses in category {}", cats.join(", "))?;
                if *n_missing > missing.len() as u64 {
                    write!(f, ", ... ({n_missing} categories in total)")?;
                }
                Ok(())
            }
            Advisory::NoZeroCategory { item, min } => {
                write!(f, "item '{item}' never uses category 0 (lowest observed is {min})")
            }
        }
    }
}

/// Upper bound on the categories listed in [`Advisory::CategoryGap`].
pub const MAX_LISTED_CATEGORIES: usize = 10;

/// Collect advisories for `dataset`, optionally specialised to a variant.
pub fn advisories(dataset: &CanonicalDataset, spec: Option<&ModelSpec>) -> Vec<Advisory> {
    let mut seen: Vec<BTreeSet<u32>> = vec![BTreeSet::new(); dataset.n_items()];
    for (&i, &y) in dataset.item_index().iter().zip(dataset.responses()) {
        seen[i - 1].insert(y);
    }

    let shared = spec.is_some_and(|s| s.steps == StepStructure::Shared);
    let mut out = Vec::new();
    for ((_, label), cats) in dataset.items().iter().zip(&seen) {
        let (Some(&min), Some(&max)) = (cats.first(), cats.last()) else { continue };
        if min == max {
            out.push(Advisory::SingleValue { item: label.to_string(), value: min });
        }
        let mut missing = Vec::new();
        let mut n_missing = 0u64;
        for (&lo, &hi) in cats.iter().zip(cats.iter().skip(1)) {
            n_missing += u64::from(hi - lo - 1);
            let room = MAX_LISTED_CATEGORIES - missing.len();
            missing.extend((lo + 1..hi).take(room));
        }
        if n_missing > 0 {
            out.push(Advisory::CategoryGap { item: label.to_string(), missing, n_missing });
        }
        if shared && min > 0 {
            out.push(Advisory::NoZeroCategory { item: label.to_string(), min });
        }
    }
    out
}
