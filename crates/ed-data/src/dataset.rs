//! Canonical index-based dataset and its builder.
//!
//! Both the wide and the long entry modes end in the same representation:
//! parallel 1-based `item_index`/`person_index`/`responses` arrays, ordered
//! label maps, and a person design matrix with an intercept column.

use ed_core::{Error, ModelSpec, Result, StanData, StepCounts, StepLayout, lookup};
use serde::Serialize;

use crate::checks;
use crate::covariates::{CovariateSpec, CovariateTable};
use crate::design::{DesignMatrix, build_design};
use crate::formula::parse_formula;
use crate::identifiers::IdentifierMap;
use crate::input::{LongResponses, ResponseMatrix};

/// One observed response, by label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation<'a> {
    /// Item label.
    pub item: &'a str,
    /// Person label.
    pub person: &'a str,
    /// Response score.
    pub response: u32,
}

/// Validated dataset shared by every model variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalDataset {
    items: IdentifierMap,
    persons: IdentifierMap,
    item_index: Vec<usize>,
    person_index: Vec<usize>,
    responses: Vec<u32>,
    design: DesignMatrix,
}

impl CanonicalDataset {
    /// Assemble a dataset from a wide matrix with an intercept-only design.
    pub fn from_wide(matrix: ResponseMatrix) -> Result<Self> {
        DatasetBuilder::new().wide(matrix).build()
    }

    /// Assemble a dataset from long triplets with an intercept-only design.
    pub fn from_long(long: LongResponses) -> Result<Self> {
        DatasetBuilder::new().long(long).build()
    }

    /// Item label map.
    pub fn items(&self) -> &IdentifierMap {
        &self.items
    }

    /// Person label map.
    pub fn persons(&self) -> &IdentifierMap {
        &self.persons
    }

    /// 1-based item index per observation.
    pub fn item_index(&self) -> &[usize] {
        &self.item_index
    }

    /// 1-based person index per observation.
    pub fn person_index(&self) -> &[usize] {
        &self.person_index
    }

    /// Response per observation.
    pub fn responses(&self) -> &[u32] {
        &self.responses
    }

    /// Person design matrix.
    pub fn design(&self) -> &DesignMatrix {
        &self.design
    }

    /// `I`
    pub fn n_items(&self) -> usize {
        self.items.len()
    }

    /// `J`
    pub fn n_persons(&self) -> usize {
        self.persons.len()
    }

    /// `N`
    pub fn n_obs(&self) -> usize {
        self.responses.len()
    }

    /// `K`
    pub fn n_covariates(&self) -> usize {
        self.design.n_cols()
    }

    /// Maximum observed response per item, in item-index order.
    pub fn item_max_scores(&self) -> Vec<u32> {
        let mut out = vec![0u32; self.n_items()];
        for (&i, &y) in self.item_index.iter().zip(&self.responses) {
            out[i - 1] = out[i - 1].max(y);
        }
        out
    }

    /// Minimum observed response per item, in item-index order.
    pub fn item_min_scores(&self) -> Vec<u32> {
        let mut out = vec![u32::MAX; self.n_items()];
        for (&i, &y) in self.item_index.iter().zip(&self.responses) {
            out[i - 1] = out[i - 1].min(y);
        }
        out
    }

    /// Largest response in the dataset.
    pub fn max_score(&self) -> u32 {
        self.responses.iter().copied().max().unwrap_or(0)
    }

    /// Sum of observed responses per person, in person-index order.
    pub fn raw_scores(&self) -> Vec<u64> {
        let mut out = vec![0u64; self.n_persons()];
        for (&j, &y) in self.person_index.iter().zip(&self.responses) {
            out[j - 1] += u64::from(y);
        }
        out
    }

    /// Observations in canonical order, by label.
    pub fn observations(&self) -> impl Iterator<Item = Observation<'_>> + '_ {
        self.item_index.iter().zip(&self.person_index).zip(&self.responses).map(
            move |((&i, &j), &response)| Observation {
                item: &self.items.labels()[i - 1],
                person: &self.persons.labels()[j - 1],
                response,
            },
        )
    }

    /// Step layout of `spec` for this dataset's observed maxima.
    pub fn step_layout(&self, spec: &ModelSpec) -> StepLayout {
        spec.step_layout(&self.item_max_scores())
    }

    /// Check the response floor of `spec`.
    pub fn check_model(&self, spec: &ModelSpec) -> Result<()> {
        checks::check_floor(self, spec)
    }

    /// Data dictionary for `spec`.
    pub fn to_stan_data(&self, spec: &ModelSpec) -> StanData {
        let (m, pos) = match self.step_layout(spec) {
            StepLayout::None => (None, None),
            StepLayout::PerItem { m, pos } => (Some(StepCounts::PerItem(m)), Some(pos)),
            StepLayout::Shared { m } => (Some(StepCounts::Shared(m)), None),
        };
        StanData {
            n_items: self.n_items(),
            n_persons: self.n_persons(),
            n_obs: self.n_obs(),
            ii: self.item_index.clone(),
            jj: self.person_index.clone(),
            y: self.responses.clone(),
            n_covariates: self.n_covariates(),
            design: self.design.to_rows(),
            m,
            pos,
        }
    }
}

enum ResponseInput {
    Wide(ResponseMatrix),
    Long(LongResponses),
}

enum DesignSource {
    Intercept,
    Spec(CovariateTable, CovariateSpec),
    Formula(CovariateTable, String),
    Rows(Vec<Vec<f64>>, Option<Vec<String>>),
}

/// Builder for [`CanonicalDataset`].
///
/// ```
/// use ed_data::{DatasetBuilder, ResponseMatrix};
///
/// let m = ResponseMatrix::from_rows(vec![
///     vec![Some(0), Some(1)],
///     vec![Some(1), None],
/// ])?;
/// let data = DatasetBuilder::new().wide(m).model("rasch").build()?;
/// assert_eq!(data.n_obs(), 3);
/// # Ok::<(), ed_core::Error>(())
/// ```
pub struct DatasetBuilder {
    responses: Option<ResponseInput>,
    design: DesignSource,
    model: Option<String>,
}

impl Default for DatasetBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasetBuilder {
    /// Builder with no responses and an intercept-only design.
    pub fn new() -> Self {
        Self { responses: None, design: DesignSource::Intercept, model: None }
    }

    /// Use a wide response matrix.
    pub fn wide(mut self, matrix: ResponseMatrix) -> Self {
        self.responses = Some(ResponseInput::Wide(matrix));
        self
    }

    /// Use long triplets.
    pub fn long(mut self, long: LongResponses) -> Self {
        self.responses = Some(ResponseInput::Long(long));
        self
    }

    /// Build `W` from a covariate table and an explicit encoding.
    pub fn covariates(mut self, table: CovariateTable, spec: CovariateSpec) -> Self {
        self.design = DesignSource::Spec(table, spec);
        self
    }

    /// Build `W` from a covariate table and a formula such as `"~ age + C(grade)"`.
    pub fn formula(mut self, table: CovariateTable, formula: impl Into<String>) -> Self {
        self.design = DesignSource::Formula(table, formula.into());
        self
    }

    /// Use precomputed design rows (first column all ones).
    ///
    /// Either one row per person in person-index order, or, for long input,
    /// one row per observation.
    pub fn design_rows(mut self, rows: Vec<Vec<f64>>) -> Self {
        self.design = DesignSource::Rows(rows, None);
        self
    }

    /// Like [`DatasetBuilder::design_rows`] with explicit column names.
    pub fn design_rows_named(mut self, rows: Vec<Vec<f64>>, names: Vec<String>) -> Self {
        self.design = DesignSource::Rows(rows, Some(names));
        self
    }

    /// Check the data against a model variant while building.
    pub fn model(mut self, name: impl Into<String>) -> Self {
        self.model = Some(name.into());
        self
    }

    /// Validate and assemble.
    pub fn build(self) -> Result<CanonicalDataset> {
        let spec = self.model.as_deref().map(lookup).transpose()?;
        let is_long = matches!(self.responses, Some(ResponseInput::Long(_)));
        let responses = match self.responses {
            Some(ResponseInput::Wide(m)) => assemble_wide(m)?,
            Some(ResponseInput::Long(l)) => assemble_long(l)?,
            None => return Err(Error::Schema("no responses supplied".to_string())),
        };
        check_coverage(&responses)?;

        let design = match self.design {
            DesignSource::Intercept => DesignMatrix::intercept(responses.persons.len()),
            DesignSource::Spec(table, spec) => build_design(&table, &spec, &responses.persons)?,
            DesignSource::Formula(table, formula) => {
                build_design(&table, &parse_formula(&formula)?, &responses.persons)?
            }
            DesignSource::Rows(rows, names) => design_from_rows(rows, names, &responses, is_long)?,
        };

        let dataset = CanonicalDataset {
            items: responses.items,
            persons: responses.persons,
            item_index: responses.item_index,
            person_index: responses.person_index,
            responses: responses.values,
            design,
        };
        log::debug!(
            "assembled dataset: I={}, J={}, N={}, K={}",
            dataset.n_items(),
            dataset.n_persons(),
            dataset.n_obs(),
            dataset.n_covariates()
        );
        if let Some(spec) = spec {
            dataset.check_model(spec)?;
        }
        for advisory in checks::advisories(&dataset, spec) {
            log::warn!("{advisory}");
        }
        Ok(dataset)
    }
}

/// Index arrays before the design matrix is attached.
struct Assembled {
    items: IdentifierMap,
    persons: IdentifierMap,
    item_index: Vec<usize>,
    person_index: Vec<usize>,
    values: Vec<u32>,
}

fn assemble_wide(matrix: ResponseMatrix) -> Result<Assembled> {
    let items = IdentifierMap::from_labels(matrix.item_labels.iter().cloned(), "item")?;
    let persons = IdentifierMap::from_labels(matrix.person_labels.iter().cloned(), "person")?;
    let n_items = matrix.n_items();
    let mut out = Assembled {
        items,
        persons,
        item_index: Vec::new(),
        person_index: Vec::new(),
        values: Vec::new(),
    };
    for (cell, v) in matrix.cells.iter().enumerate() {
        let Some(v) = *v else { continue };
        let (j, i) = (cell / n_items, cell % n_items);
        let y = to_score(v, &matrix.item_labels[i], &matrix.person_labels[j])?;
        out.item_index.push(i + 1);
        out.person_index.push(j + 1);
        out.values.push(y);
    }
    Ok(out)
}

fn assemble_long(long: LongResponses) -> Result<Assembled> {
    let (items, persons, item_index, person_index) = if long.pre_indexed {
        let ii = parse_indices(&long.items, "item")?;
        let jj = parse_indices(&long.persons, "person")?;
        let numbered = |idx: &[usize], what: &str| {
            let n = dense_index_count(idx, what)?;
            IdentifierMap::from_labels((1..=n).map(|k| k.to_string()), what)
        };
        (numbered(&ii, "item")?, numbered(&jj, "person")?, ii, jj)
    } else {
        let mut items = IdentifierMap::new();
        let mut persons = IdentifierMap::new();
        let ii: Vec<usize> = long.items.iter().map(|l| items.intern(l.as_str())).collect();
        let jj: Vec<usize> = long.persons.iter().map(|l| persons.intern(l.as_str())).collect();
        (items, persons, ii, jj)
    };
    let values = long
        .responses
        .iter()
        .zip(long.items.iter().zip(&long.persons))
        .map(|(&v, (item, person))| to_score(v, item, person))
        .collect::<Result<Vec<_>>>()?;
    Ok(Assembled { items, persons, item_index, person_index, values })
}

fn parse_indices(ids: &[String], what: &str) -> Result<Vec<usize>> {
    ids.iter()
        .map(|s| {
            s.parse::<usize>()
                .map_err(|_| Error::Schema(format!("{what} id '{s}' is not a 1-based index")))
        })
        .collect()
}

/// Largest 1-based index, once every index below it is known to occur.
fn dense_index_count(idx: &[usize], what: &str) -> Result<usize> {
    let mut distinct = idx.to_vec();
    distinct.sort_unstable();
    distinct.dedup();
    if let Some(k) = distinct.iter().enumerate().position(|(k, &v)| v != k + 1) {
        let label = (k + 1).to_string();
        return Err(if what == "item" {
            Error::item_range(label, "no observed responses")
        } else {
            Error::person_range(label, "no observed responses")
        });
    }
    Ok(distinct.len())
}

fn to_score(v: i64, item: &str, person: &str) -> Result<u32> {
    if v < 0 {
        return Err(Error::item_range(
            item,
            format!("negative response {v} from person '{person}'"),
        ));
    }
    u32::try_from(v).map_err(|_| {
        Error::item_range(item, format!("response {v} from person '{person}' is too large"))
    })
}

/// Every item and every person must be observed at least once.
fn check_coverage(data: &Assembled) -> Result<()> {
    if data.values.is_empty() {
        return Err(Error::Schema("no observed responses".to_string()));
    }
    let mut item_seen = vec![false; data.items.len()];
    let mut person_seen = vec![false; data.persons.len()];
    for (&i, &j) in data.item_index.iter().zip(&data.person_index) {
        item_seen[i - 1] = true;
        person_seen[j - 1] = true;
    }
    if let Some(i) = item_seen.iter().position(|s| !s) {
        return Err(Error::item_range(&data.items.labels()[i], "no observed responses"));
    }
    if let Some(j) = person_seen.iter().position(|s| !s) {
        return Err(Error::person_range(&data.persons.labels()[j], "no observed responses"));
    }
    Ok(())
}

fn design_from_rows(
    rows: Vec<Vec<f64>>,
    names: Option<Vec<String>>,
    data: &Assembled,
    is_long: bool,
) -> Result<DesignMatrix> {
    let n_persons = data.persons.len();
    let n_obs = data.values.len();
    if rows.len() == n_persons {
        return DesignMatrix::from_rows(rows, names);
    }
    if !is_long || rows.len() != n_obs {
        return Err(Error::Schema(format!(
            "design has {} rows; expected one per person ({n_persons}){}",
            rows.len(),
            if is_long { format!(" or one per observation ({n_obs})") } else { String::new() }
        )));
    }
    let mut per_person: Vec<Option<Vec<f64>>> = vec![None; n_persons];
    for (row, &j) in rows.into_iter().zip(&data.person_index) {
        if let Some(first) = &per_person[j - 1] {
            if *first != row {
                return Err(Error::Schema(format!(
                    "design rows disagree for person '{}'",
                    data.persons.labels()[j - 1]
                )));
            }
        } else {
            per_person[j - 1] = Some(row);
        }
    }
    let rows = per_person.into_iter().flatten().collect();
    DesignMatrix::from_rows(rows, names)
}
