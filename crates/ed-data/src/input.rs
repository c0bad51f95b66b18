//! Accepted input shapes: wide response matrices and long triplets.

use ed_core::{Entity, Error, Result};

/// Persons × items response matrix. `None` marks a non-response.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseMatrix {
    pub(crate) person_labels: Vec<String>,
    pub(crate) item_labels: Vec<String>,
    /// Row-major cells, `person_labels.len() * item_labels.len()` long.
    pub(crate) cells: Vec<Option<i64>>,
}

impl ResponseMatrix {
    /// Labeled matrix; `rows[j][i]` is person `j`'s response to item `i`.
    pub fn new<P, I, SP, SI>(
        person_labels: P,
        item_labels: I,
        rows: Vec<Vec<Option<i64>>>,
    ) -> Result<Self>
    where
        P: IntoIterator<Item = SP>,
        I: IntoIterator<Item = SI>,
        SP: Into<String>,
        SI: Into<String>,
    {
        let person_labels: Vec<String> = person_labels.into_iter().map(Into::into).collect();
        let item_labels: Vec<String> = item_labels.into_iter().map(Into::into).collect();
        if rows.len() != person_labels.len() {
            return Err(Error::Schema(format!(
                "response matrix has {} rows but {} person labels",
                rows.len(),
                person_labels.len()
            )));
        }
        let n_items = item_labels.len();
        let mut cells = Vec::with_capacity(rows.len() * n_items);
        for (j, row) in rows.into_iter().enumerate() {
            if row.len() != n_items {
                return Err(Error::Schema(format!(
                    "response matrix must be rectangular: row {} has {} cells, expected {}",
                    j + 1,
                    row.len(),
                    n_items
                )));
            }
            cells.extend(row);
        }
        if person_labels.is_empty() || n_items == 0 {
            return Err(Error::Schema(
                "response matrix must have at least one row and column".to_string(),
            ));
        }
        Ok(Self { person_labels, item_labels, cells })
    }

    /// Unlabeled matrix; persons and items are labeled `"1"`, `"2"`, ... in order.
    pub fn from_rows(rows: Vec<Vec<Option<i64>>>) -> Result<Self> {
        let n_persons = rows.len();
        let n_items = rows.first().map(|r| r.len()).unwrap_or(0);
        Self::new(numbered(n_persons), numbered(n_items), rows)
    }

    /// Unlabeled matrix of floating-point scores; NaN marks a non-response.
    ///
    /// Every non-missing value must be an integer.
    pub fn from_scores(rows: Vec<Vec<f64>>) -> Result<Self> {
        let mut converted = Vec::with_capacity(rows.len());
        for (j, row) in rows.into_iter().enumerate() {
            let mut out = Vec::with_capacity(row.len());
            for (i, v) in row.into_iter().enumerate() {
                out.push(score_from_f64(v, || {
                    Error::DataRange {
                        entity: Entity::Observation,
                        label: format!("row {}, column {}", j + 1, i + 1),
                        reason: format!("response {v} is not an integer"),
                    }
                })?);
            }
            converted.push(out);
        }
        Self::from_rows(converted)
    }

    /// Number of persons (rows).
    pub fn n_persons(&self) -> usize {
        self.person_labels.len()
    }

    /// Number of items (columns).
    pub fn n_items(&self) -> usize {
        self.item_labels.len()
    }

    /// Cell for person row `j` and item column `i` (both 0-based).
    pub fn get(&self, j: usize, i: usize) -> Option<i64> {
        self.cells.get(j * self.n_items() + i).copied().flatten()
    }
}

/// Parallel item id, person id, response arrays.
#[derive(Debug, Clone, PartialEq)]
pub struct LongResponses {
    pub(crate) items: Vec<String>,
    pub(crate) persons: Vec<String>,
    pub(crate) responses: Vec<i64>,
    /// Ids are already 1-based indices and are used as-is.
    pub(crate) pre_indexed: bool,
}

impl LongResponses {
    /// Long data with arbitrary labels; indices follow first appearance.
    pub fn new<I, P, SI, SP>(items: I, persons: P, responses: Vec<i64>) -> Result<Self>
    where
        I: IntoIterator<Item = SI>,
        P: IntoIterator<Item = SP>,
        SI: Into<String>,
        SP: Into<String>,
    {
        let items: Vec<String> = items.into_iter().map(Into::into).collect();
        let persons: Vec<String> = persons.into_iter().map(Into::into).collect();
        if items.len() != responses.len() || persons.len() != responses.len() {
            return Err(Error::Schema(format!(
                "item ids ({}), person ids ({}) and responses ({}) must have the same length",
                items.len(),
                persons.len(),
                responses.len()
            )));
        }
        if responses.is_empty() {
            return Err(Error::Schema(
                "long data must contain at least one observation".to_string(),
            ));
        }
        Ok(Self { items, persons, responses, pre_indexed: false })
    }

    /// Long data whose ids are already 1-based indices.
    ///
    /// Indices are used directly, so every index from 1 to the largest one
    /// must occur at least once.
    pub fn from_indices(ii: &[usize], jj: &[usize], y: Vec<i64>) -> Result<Self> {
        if let Some(n) = ii.iter().chain(jj).position(|&v| v == 0) {
            let (entity, at) = if n < ii.len() { ("ii", n) } else { ("jj", n - ii.len()) };
            return Err(Error::Schema(format!("{entity}[{}] is 0; indices are 1-based", at + 1)));
        }
        let items = ii.iter().map(|i| i.to_string()).collect::<Vec<_>>();
        let persons = jj.iter().map(|j| j.to_string()).collect::<Vec<_>>();
        let mut out = Self::new(items, persons, y)?;
        out.pre_indexed = true;
        Ok(out)
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.responses.len()
    }

    /// Whether there are no observations.
    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }
}

fn numbered(n: usize) -> Vec<String> {
    (1..=n).map(|i| i.to_string()).collect()
}

fn score_from_f64(v: f64, err: impl FnOnce() -> Error) -> Result<Option<i64>> {
    if v.is_nan() {
        return Ok(None);
    }
    if !v.is_finite() || v.fract() != 0.0 || v.abs() > i64::MAX as f64 {
        return Err(err());
    }
    Ok(Some(v as i64))
}
