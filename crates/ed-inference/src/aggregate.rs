//! Posterior aggregation: flat draws back onto items, persons and the ability
//! distribution.
//!
//! β rows are laid out by the model's [`StepLayout`]: one row per item for
//! dichotomous and rating-scale variants, one row per (item, step) for the
//! partial-credit family. Rating-scale κ steps are reported once, separately
//! from the items. λ and σ are reported under the ability distribution only.

use std::collections::HashMap;

use ed_core::{
    Error, ModelKind, ModelSpec, ParamKey, ParamRole, PosteriorDraws, Result, StepLayout,
    StepStructure,
};
use ed_data::IdentifierMap;
use serde::Serialize;

use crate::summary::{ParamSummary, SummaryOptions, summarize_column};

/// Group heading of the shared rating-scale steps.
pub const RATING_SCALE_GROUP: &str = "Rating scale step parameters";
/// Group heading of λ and σ.
pub const ABILITY_GROUP: &str = "Ability distribution";

/// A summary tagged with its step number, if the parameter is a step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepSummary {
    /// 1-based step number (`None` for non-step β).
    pub step: Option<usize>,
    /// Posterior summary.
    #[serde(flatten)]
    pub summary: ParamSummary,
}

/// All item-level parameters of one item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemEntry {
    /// External item label.
    pub label: String,
    /// 1-based item index.
    pub index: usize,
    /// Discrimination, for variants that estimate it.
    pub alpha: Option<ParamSummary>,
    /// Difficulty rows; empty for a partial-credit item with no steps.
    pub difficulty: Vec<StepSummary>,
}

/// A labeled ability-distribution parameter (λ by design column, or σ).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AbilityRow {
    /// Design column name, or `"sigma"`.
    pub label: String,
    /// [`ParamRole::Lambda`] or [`ParamRole::Sigma`].
    pub role: ParamRole,
    /// Posterior summary.
    #[serde(flatten)]
    pub summary: ParamSummary,
}

/// Item summary table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemSummaryTable {
    /// Model variant.
    pub model: ModelKind,
    /// Credible level of the intervals.
    pub ci_level: f64,
    /// One entry per item in item-index order.
    pub items: Vec<ItemEntry>,
    /// Shared κ steps (rating-scale variants only).
    pub rating_scale_steps: Vec<StepSummary>,
    /// λ and σ rows; filled by [`ItemSummaryTable::with_ability`].
    pub ability: Vec<AbilityRow>,
}

/// Person row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonRow {
    /// External person label.
    pub label: String,
    /// 1-based person index.
    pub index: usize,
    /// Sum of the person's observed responses, when known.
    pub raw_score: Option<u64>,
    /// Ability θ.
    #[serde(flatten)]
    pub theta: ParamSummary,
}

/// Person summary table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonSummaryTable {
    /// Credible level of the intervals.
    pub ci_level: f64,
    /// One row per person in person-index order.
    pub persons: Vec<PersonRow>,
}

/// One flattened table row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    /// Item label, [`RATING_SCALE_GROUP`] or [`ABILITY_GROUP`].
    pub group: String,
    /// Parameter role.
    pub role: ParamRole,
    /// Step number for step parameters.
    pub step: Option<usize>,
    /// Row label: item label, `"step k"`, design column name or `"sigma"`.
    pub label: String,
    /// Posterior summary.
    #[serde(flatten)]
    pub summary: ParamSummary,
}

impl ItemSummaryTable {
    /// Append ability-distribution rows.
    pub fn with_ability(mut self, rows: Vec<AbilityRow>) -> Self {
        self.ability = rows;
        self
    }

    /// Flatten to rows in display order.
    pub fn rows(&self) -> Vec<SummaryRow> {
        let mut out = Vec::with_capacity(self.n_rows());
        for item in &self.items {
            if let Some(alpha) = &item.alpha {
                out.push(SummaryRow {
                    group: item.label.clone(),
                    role: ParamRole::Alpha,
                    step: None,
                    label: item.label.clone(),
                    summary: alpha.clone(),
                });
            }
            out.extend(item.difficulty.iter().map(|b| SummaryRow {
                group: item.label.clone(),
                role: ParamRole::Beta,
                step: b.step,
                label: item.label.clone(),
                summary: b.summary.clone(),
            }));
        }
        out.extend(self.rating_scale_steps.iter().map(|k| SummaryRow {
            group: RATING_SCALE_GROUP.to_string(),
            role: ParamRole::Kappa,
            step: k.step,
            label: format!("step {}", k.step.unwrap_or_default()),
            summary: k.summary.clone(),
        }));
        out.extend(self.ability.iter().map(|a| SummaryRow {
            group: ABILITY_GROUP.to_string(),
            role: a.role,
            step: None,
            label: a.label.clone(),
            summary: a.summary.clone(),
        }));
        out
    }

    /// Number of rows [`ItemSummaryTable::rows`] yields.
    pub fn n_rows(&self) -> usize {
        let item_rows: usize =
            self.items.iter().map(|i| usize::from(i.alpha.is_some()) + i.difficulty.len()).sum();
        item_rows + self.rating_scale_steps.len() + self.ability.len()
    }

    /// Every parameter summary in the table.
    pub fn params(&self) -> impl Iterator<Item = &ParamSummary> {
        self.items
            .iter()
            .flat_map(|i| i.alpha.iter().chain(i.difficulty.iter().map(|d| &d.summary)))
            .chain(self.rating_scale_steps.iter().map(|k| &k.summary))
            .chain(self.ability.iter().map(|a| &a.summary))
    }

    /// Entry for an item label.
    pub fn item(&self, label: &str) -> Option<&ItemEntry> {
        self.items.iter().find(|i| i.label == label)
    }
}

impl PersonSummaryTable {
    /// Attach raw scores, one per person in person-index order.
    pub fn with_raw_scores(mut self, scores: &[u64]) -> Result<Self> {
        if scores.len() != self.persons.len() {
            return Err(Error::Aggregation(format!(
                "{} raw scores for {} persons",
                scores.len(),
                self.persons.len()
            )));
        }
        for (row, &s) in self.persons.iter_mut().zip(scores) {
            row.raw_score = Some(s);
        }
        Ok(self)
    }

    /// Row for a person label.
    pub fn person(&self, label: &str) -> Option<&PersonRow> {
        self.persons.iter().find(|p| p.label == label)
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.persons.len()
    }
}

/// Resolves expected parameter elements against the draw columns.
struct Resolver<'a> {
    draws: &'a PosteriorDraws,
    columns: HashMap<ParamKey, usize>,
    options: &'a SummaryOptions,
}

impl<'a> Resolver<'a> {
    fn new(draws: &'a PosteriorDraws, options: &'a SummaryOptions) -> Result<Self> {
        options.validate()?;
        if draws.chains.is_empty() || draws.total_draws() == 0 {
            return Err(Error::Aggregation("draws contain no post-warmup samples".to_string()));
        }
        if let Some(problem) = draws.completeness_problem() {
            return Err(Error::Aggregation(format!("malformed draws: {problem}")));
        }
        Ok(Self { draws, columns: draws.key_index(), options })
    }

    fn expect_len(&self, role: ParamRole, expected: usize) -> Result<()> {
        let found = self.draws.count_elements(role.stan_name());
        if found != expected {
            return Err(Error::Aggregation(format!(
                "draws have {found} '{role}' element(s), expected {expected}"
            )));
        }
        Ok(())
    }

    fn summarize(&self, key: ParamKey) -> Result<ParamSummary> {
        let name = key.to_flat_name();
        let idx = self
            .columns
            .get(&key)
            .copied()
            .ok_or_else(|| Error::Aggregation(format!("draws have no parameter '{name}'")))?;
        Ok(summarize_column(self.draws, idx, name, self.options))
    }

    fn element(&self, role: ParamRole, i: usize) -> Result<ParamSummary> {
        self.summarize(ParamKey::element(role.stan_name(), i))
    }
}

fn check_layout(spec: &ModelSpec, layout: &StepLayout, n_items: usize) -> Result<()> {
    let ok = match (spec.steps, layout) {
        (StepStructure::None, StepLayout::None) => true,
        (StepStructure::PerItem, StepLayout::PerItem { m, pos }) => {
            m.len() == n_items && pos.len() == n_items
        }
        (StepStructure::Shared, StepLayout::Shared { .. }) => true,
        _ => false,
    };
    if !ok {
        return Err(Error::Aggregation(format!(
            "step layout {layout:?} does not fit model '{}' with {n_items} items",
            spec.name
        )));
    }
    Ok(())
}

/// Summarize α, β and κ per item.
pub fn summarize_items(
    draws: &PosteriorDraws,
    items: &IdentifierMap,
    spec: &ModelSpec,
    layout: &StepLayout,
    options: &SummaryOptions,
) -> Result<ItemSummaryTable> {
    let resolver = Resolver::new(draws, options)?;
    let n_items = items.len();
    check_layout(spec, layout, n_items)?;
    if spec.has_alpha {
        resolver.expect_len(ParamRole::Alpha, n_items)?;
    }
    resolver.expect_len(ParamRole::Beta, layout.beta_len(n_items))?;
    if spec.steps == StepStructure::Shared {
        resolver.expect_len(ParamRole::Kappa, layout.kappa_len())?;
    }

    let mut entries = Vec::with_capacity(n_items);
    for (index, label) in items.iter() {
        let alpha = if spec.has_alpha {
            Some(resolver.element(ParamRole::Alpha, index)?)
        } else {
            None
        };
        let range = layout.beta_range(index - 1);
        let start = range.start;
        let difficulty = range
            .map(|k| {
                Ok(StepSummary {
                    step: layout.has_item_steps().then_some(k - start + 1),
                    summary: resolver.element(ParamRole::Beta, k + 1)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        entries.push(ItemEntry { label: label.to_string(), index, alpha, difficulty });
    }

    let rating_scale_steps = (1..=layout.kappa_len())
        .map(|k| {
            Ok(StepSummary { step: Some(k), summary: resolver.element(ParamRole::Kappa, k)? })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ItemSummaryTable {
        model: spec.kind,
        ci_level: options.ci_level,
        items: entries,
        rating_scale_steps,
        ability: Vec::new(),
    })
}

/// Summarize θ per person.
pub fn summarize_persons(
    draws: &PosteriorDraws,
    persons: &IdentifierMap,
    options: &SummaryOptions,
) -> Result<PersonSummaryTable> {
    let resolver = Resolver::new(draws, options)?;
    resolver.expect_len(ParamRole::Theta, persons.len())?;
    let persons = persons
        .iter()
        .map(|(index, label)| {
            Ok(PersonRow {
                label: label.to_string(),
                index,
                raw_score: None,
                theta: resolver.element(ParamRole::Theta, index)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(PersonSummaryTable { ci_level: options.ci_level, persons })
}

/// Summarize λ (labeled by design column) and σ when the variant estimates it.
pub fn summarize_ability(
    draws: &PosteriorDraws,
    spec: &ModelSpec,
    covariate_names: &[String],
    options: &SummaryOptions,
) -> Result<Vec<AbilityRow>> {
    let resolver = Resolver::new(draws, options)?;
    resolver.expect_len(ParamRole::Lambda, covariate_names.len())?;
    let mut rows = covariate_names
        .iter()
        .enumerate()
        .map(|(k, name)| {
            Ok(AbilityRow {
                label: name.clone(),
                role: ParamRole::Lambda,
                summary: resolver.element(ParamRole::Lambda, k + 1)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    if spec.sigma_free {
        rows.push(AbilityRow {
            label: ParamRole::Sigma.stan_name().to_string(),
            role: ParamRole::Sigma,
            summary: resolver.summarize(ParamKey::scalar(ParamRole::Sigma.stan_name()))?,
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed_core::Chain;

    /// Deterministic draws: parameter `p` at draw `t` of chain `c` is `p + 0.01 * t + c`.
    fn fake_draws(names: &[String]) -> PosteriorDraws {
        let chains = (0..2)
            .map(|c| Chain {
                draws: (0..20)
                    .map(|t| {
                        (0..names.len()).map(|p| p as f64 + 0.01 * t as f64 + c as f64).collect()
                    })
                    .collect(),
            })
            .collect();
        PosteriorDraws::new(names.to_vec(), chains, 20)
    }

    fn names(spec: &[(&str, usize)]) -> Vec<String> {
        spec.iter()
            .flat_map(|&(base, n)| {
                if n == 0 {
                    vec![base.to_string()]
                } else {
                    (1..=n).map(|i| format!("{base}[{i}]")).collect()
                }
            })
            .collect()
    }

    fn items(labels: &[&str]) -> IdentifierMap {
        IdentifierMap::from_labels(labels.iter().copied(), "item").unwrap()
    }

    #[test]
    fn test_rasch_rows() {
        let d = fake_draws(&names(&[("beta", 3), ("theta", 4), ("lambda", 1), ("sigma", 0)]));
        let spec = ModelKind::Rasch.spec();
        let opts = SummaryOptions::default();
        let table = summarize_items(&d, &items(&["A", "B", "C"]), spec, &StepLayout::None, &opts)
            .unwrap()
            .with_ability(
                summarize_ability(&d, spec, &["(Intercept)".to_string()], &opts).unwrap(),
            );
        assert_eq!(table.n_rows(), 3 + 1 + 1);
        assert_eq!(table.rows().len(), table.n_rows());
        let b = table.item("B").unwrap();
        assert!(b.alpha.is_none());
        assert_eq!(b.difficulty.len(), 1);
        assert_eq!(b.difficulty[0].step, None);
        assert_eq!(b.difficulty[0].summary.name, "beta[2]");
        assert_eq!(table.ability[1].label, "sigma");
    }

    #[test]
    fn test_pcm_item_steps_and_empty_item() {
        let d = fake_draws(&names(&[("beta", 3), ("theta", 2), ("lambda", 1), ("sigma", 0)]));
        let layout = StepLayout::per_item(vec![2, 0, 1]);
        let t = summarize_items(
            &d,
            &items(&["A", "B", "C"]),
            ModelKind::Pcm.spec(),
            &layout,
            &SummaryOptions::default(),
        )
        .unwrap();
        let a = t.item("A").unwrap();
        let steps: Vec<_> = a.difficulty.iter().map(|s| s.step).collect();
        assert_eq!(steps, vec![Some(1), Some(2)]);
        assert_eq!(a.difficulty[1].summary.name, "beta[2]");
        assert!(t.item("B").unwrap().difficulty.is_empty());
        assert_eq!(t.item("C").unwrap().difficulty[0].summary.name, "beta[3]");
    }

    #[test]
    fn test_grsm_kappa_reported_once() {
        let d = fake_draws(&names(&[
            ("alpha", 2),
            ("beta", 2),
            ("kappa", 3),
            ("theta", 2),
            ("lambda", 2),
        ]));
        let spec = ModelKind::Grsm.spec();
        let opts = SummaryOptions::default();
        let cov = vec!["(Intercept)".to_string(), "age".to_string()];
        let t = summarize_items(&d, &items(&["A", "B"]), spec, &StepLayout::Shared { m: 3 }, &opts)
            .unwrap()
            .with_ability(summarize_ability(&d, spec, &cov, &opts).unwrap());
        assert_eq!(t.rating_scale_steps.len(), 3);
        assert_eq!(t.n_rows(), 2 * 2 + 3 + 2);
        let rows = t.rows();
        assert_eq!(rows[4].group, RATING_SCALE_GROUP);
        assert_eq!(rows[4].label, "step 1");
        assert_eq!(rows[8].label, "age");
        assert_eq!(rows[8].role, ParamRole::Lambda);
    }

    #[test]
    fn test_count_mismatch_is_aggregation_error() {
        let d = fake_draws(&names(&[("beta", 2), ("theta", 2)]));
        let err = summarize_items(
            &d,
            &items(&["A", "B", "C"]),
            ModelKind::Rasch.spec(),
            &StepLayout::None,
            &SummaryOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Aggregation(ref m) if m.contains("expected 3")));
    }

    #[test]
    fn test_missing_alpha_is_aggregation_error() {
        let d = fake_draws(&names(&[("beta", 2), ("theta", 2)]));
        let err = summarize_items(
            &d,
            &items(&["A", "B"]),
            ModelKind::TwoPl.spec(),
            &StepLayout::None,
            &SummaryOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Aggregation(ref m) if m.contains("alpha")));
    }

    #[test]
    fn test_gap_in_names_is_aggregation_error() {
        let d = fake_draws(&["beta[1]".to_string(), "beta[3]".to_string()]);
        let err = summarize_items(
            &d,
            &items(&["A", "B"]),
            ModelKind::Rasch.spec(),
            &StepLayout::None,
            &SummaryOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Aggregation(ref m) if m.contains("beta[2]")));
    }

    #[test]
    fn test_layout_must_match_model() {
        let d = fake_draws(&names(&[("beta", 2)]));
        let err = summarize_items(
            &d,
            &items(&["A", "B"]),
            ModelKind::Pcm.spec(),
            &StepLayout::None,
            &SummaryOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Aggregation(_)));
    }

    #[test]
    fn test_ragged_draws_are_aggregation_error() {
        let chains = vec![Chain { draws: vec![vec![0.1, 0.2], vec![0.3]] }];
        let d = PosteriorDraws::new(names(&[("beta", 1), ("theta", 1)]), chains, 2);
        let opts = SummaryOptions::default();
        let items = items(&["A"]);
        let err = summarize_items(&d, &items, ModelKind::Rasch.spec(), &StepLayout::None, &opts)
            .unwrap_err();
        assert!(matches!(err, Error::Aggregation(ref m) if m.contains("draw 2")), "{err}");
        let persons = IdentifierMap::from_labels(["p1"], "person").unwrap();
        assert!(matches!(summarize_persons(&d, &persons, &opts), Err(Error::Aggregation(_))));
    }

    #[test]
    fn test_covariate_named_sigma_stays_lambda() {
        let d = fake_draws(&names(&[("beta", 1), ("theta", 1), ("lambda", 2), ("sigma", 0)]));
        let spec = ModelKind::Rasch.spec();
        let opts = SummaryOptions::default();
        let cov = vec!["(Intercept)".to_string(), "sigma".to_string()];
        let t = summarize_items(&d, &items(&["A"]), spec, &StepLayout::None, &opts)
            .unwrap()
            .with_ability(summarize_ability(&d, spec, &cov, &opts).unwrap());
        let ability: Vec<_> = t
            .rows()
            .into_iter()
            .filter(|r| r.group == ABILITY_GROUP)
            .map(|r| (r.label, r.role, r.summary.name))
            .collect();
        assert_eq!(
            ability,
            vec![
                ("(Intercept)".to_string(), ParamRole::Lambda, "lambda[1]".to_string()),
                ("sigma".to_string(), ParamRole::Lambda, "lambda[2]".to_string()),
                ("sigma".to_string(), ParamRole::Sigma, "sigma".to_string()),
            ]
        );
    }

    #[test]
    fn test_persons_and_raw_scores() {
        let d = fake_draws(&names(&[("beta", 1), ("theta", 3)]));
        let persons = IdentifierMap::from_labels(["ann", "bob", "cy"], "person").unwrap();
        let t = summarize_persons(&d, &persons, &SummaryOptions::default())
            .unwrap()
            .with_raw_scores(&[3, 0, 5_000_000_000])
            .unwrap();
        let bob = t.person("bob").unwrap();
        assert_eq!(bob.index, 2);
        assert_eq!(bob.raw_score, Some(0));
        assert_eq!(bob.theta.name, "theta[2]");
        // theta[2] sits in column 2: mean of 2 + 0.01 t + c over t < 20, c < 2
        assert!((bob.theta.mean - (2.0 + 0.095 + 0.5)).abs() < 1e-12);
        assert!(t.clone().with_raw_scores(&[1]).is_err());
    }
}
