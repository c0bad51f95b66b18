//! Person design matrix `W` and the covariate encoder that builds it.

use std::collections::{BTreeSet, HashMap};

use ed_core::{Error, Result};
use serde::Serialize;

use crate::covariates::{CovariateColumn, CovariateSpec, CovariateTable, Encoding};
use crate::identifiers::IdentifierMap;

/// Name of the mandatory first design column.
pub const INTERCEPT: &str = "(Intercept)";

/// Dense row-major `J × K` design matrix whose first column is all ones.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DesignMatrix {
    n_rows: usize,
    column_names: Vec<String>,
    data: Vec<f64>, // length n_rows * n_cols, row-major
}

impl DesignMatrix {
    /// Intercept-only design with `n_rows` rows.
    pub fn intercept(n_rows: usize) -> Self {
        Self { n_rows, column_names: vec![INTERCEPT.to_string()], data: vec![1.0; n_rows] }
    }

    /// Design from caller-supplied rows.
    ///
    /// Columns after the first are named `w2`, `w3`, ... unless `names` is given.
    pub fn from_rows(rows: Vec<Vec<f64>>, names: Option<Vec<String>>) -> Result<Self> {
        let n_rows = rows.len();
        let n_cols = rows.first().map(|r| r.len()).unwrap_or(0);
        if n_rows == 0 || n_cols == 0 {
            return Err(Error::Schema("design matrix must be non-empty".to_string()));
        }
        let mut data = Vec::with_capacity(n_rows * n_cols);
        for (j, row) in rows.into_iter().enumerate() {
            if row.len() != n_cols {
                return Err(Error::Schema(format!(
                    "design matrix must be rectangular: row {} has {} values, expected {}",
                    j + 1,
                    row.len(),
                    n_cols
                )));
            }
            if row[0] != 1.0 {
                return Err(Error::Schema(format!(
                    "first design column must be the intercept (all ones); row {} has {}",
                    j + 1,
                    row[0]
                )));
            }
            if row.iter().any(|v| !v.is_finite()) {
                return Err(Error::Schema(format!(
                    "design matrix row {} contains a non-finite value",
                    j + 1
                )));
            }
            data.extend(row);
        }
        let column_names = match names {
            Some(names) if names.len() == n_cols => names,
            Some(names) => {
                return Err(Error::Schema(format!(
                    "{} design column names for {} columns",
                    names.len(),
                    n_cols
                )));
            }
            None => std::iter::once(INTERCEPT.to_string())
                .chain((2..=n_cols).map(|k| format!("w{k}")))
                .collect(),
        };
        Ok(Self { n_rows, column_names, data })
    }

    /// Number of rows (persons).
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of columns `K`.
    pub fn n_cols(&self) -> usize {
        self.column_names.len()
    }

    /// Column names, intercept first.
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Row `j` (0-based).
    #[inline]
    pub fn row(&self, j: usize) -> &[f64] {
        let k = self.n_cols();
        &self.data[j * k..(j + 1) * k]
    }

    /// Nested rows, as the data dictionary wants them.
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        (0..self.n_rows).map(|j| self.row(j).to_vec()).collect()
    }
}

/// One encoded column in covariate-table row order.
struct Encoded {
    name: String,
    values: Vec<f64>,
}

/// Build `W` for the persons of a dataset.
///
/// Rows come out in `persons` index order regardless of the table's row order.
/// The table must cover exactly the person set.
pub fn build_design(
    table: &CovariateTable,
    spec: &CovariateSpec,
    persons: &IdentifierMap,
) -> Result<DesignMatrix> {
    if table.n_rows() != persons.len() {
        return Err(Error::Schema(format!(
            "covariate table has {} rows but the data has {} persons",
            table.n_rows(),
            persons.len()
        )));
    }
    let table_row: HashMap<&str, usize> =
        table.persons().iter().enumerate().map(|(r, p)| (p.as_str(), r)).collect();
    if let Some((_, missing)) = persons.iter().find(|(_, p)| !table_row.contains_key(p)) {
        return Err(Error::Schema(format!("covariate table has no row for person '{missing}'")));
    }
    if let Some(extra) = table.persons().iter().find(|p| persons.index_of(p).is_none()) {
        return Err(Error::Schema(format!(
            "covariate table names person '{extra}' who has no responses"
        )));
    }

    let mut encoded: HashMap<&str, Vec<Encoded>> = HashMap::new();
    for name in spec.referenced_columns() {
        let column = table
            .column(name)
            .ok_or_else(|| Error::Schema(format!("unknown covariate column '{name}'")))?;
        encoded.insert(name, encode_column(name, column, spec.encodings.get(name))?);
    }

    let mut columns: Vec<Encoded> = Vec::new();
    for term in &spec.terms {
        let mut product = vec![Encoded { name: String::new(), values: vec![1.0; table.n_rows()] }];
        for factor in &term.columns {
            let parts = &encoded[factor.as_str()];
            product = product
                .iter()
                .flat_map(|left| {
                    parts.iter().map(move |right| Encoded {
                        name: if left.name.is_empty() {
                            right.name.clone()
                        } else {
                            format!("{}:{}", left.name, right.name)
                        },
                        values: left.values.iter().zip(&right.values).map(|(a, b)| a * b).collect(),
                    })
                })
                .collect();
        }
        columns.extend(product);
    }
    if columns.iter().any(|c| c.name == INTERCEPT) {
        return Err(Error::Schema(format!("covariate column may not be named '{INTERCEPT}'")));
    }

    let n_cols = columns.len() + 1;
    let mut data = Vec::with_capacity(persons.len() * n_cols);
    for (_, label) in persons.iter() {
        let r = table_row[label];
        data.push(1.0);
        data.extend(columns.iter().map(|c| c.values[r]));
    }
    let column_names = std::iter::once(INTERCEPT.to_string())
        .chain(columns.into_iter().map(|c| c.name))
        .collect();
    Ok(DesignMatrix { n_rows: persons.len(), column_names, data })
}

fn encode_column(
    name: &str,
    column: &CovariateColumn,
    encoding: Option<&Encoding>,
) -> Result<Vec<Encoded>> {
    match (column, encoding) {
        (CovariateColumn::Numeric(values), None | Some(Encoding::Numeric)) => {
            Ok(vec![Encoded { name: name.to_string(), values: values.clone() }])
        }
        (CovariateColumn::Categorical(_), Some(Encoding::Numeric)) => Err(Error::Schema(format!(
            "categorical covariate '{name}' cannot be encoded as numeric"
        ))),
        (CovariateColumn::Categorical(labels), None) => {
            indicators(name, &level_strings(labels), None)
        }
        (CovariateColumn::Categorical(labels), Some(Encoding::Indicator { reference })) => {
            indicators(name, &level_strings(labels), reference.as_deref())
        }
        (CovariateColumn::Numeric(values), Some(Encoding::Indicator { reference })) => {
            indicators(name, &numeric_levels(values), reference.as_deref())
        }
    }
}

/// Per-row level label plus the sorted distinct levels.
struct Levels {
    rows: Vec<String>,
    sorted: Vec<String>,
}

fn level_strings(labels: &[String]) -> Levels {
    let sorted: BTreeSet<&String> = labels.iter().collect();
    Levels { rows: labels.to_vec(), sorted: sorted.into_iter().cloned().collect() }
}

fn numeric_levels(values: &[f64]) -> Levels {
    let mut distinct = values.to_vec();
    distinct.sort_by(f64::total_cmp);
    distinct.dedup();
    Levels {
        rows: values.iter().map(|v| v.to_string()).collect(),
        sorted: distinct.iter().map(|v| v.to_string()).collect(),
    }
}

fn indicators(name: &str, levels: &Levels, reference: Option<&str>) -> Result<Vec<Encoded>> {
    let reference = match reference {
        Some(r) if levels.sorted.iter().any(|l| l == r) => r,
        Some(r) => {
            return Err(Error::Schema(format!(
                "reference level '{r}' does not occur in covariate '{name}'"
            )));
        }
        None => match levels.sorted.first() {
            Some(first) => first.as_str(),
            None => return Ok(Vec::new()),
        },
    };
    if levels.sorted.len() == 1 {
        log::warn!("covariate '{name}' has a single level and contributes no design columns");
    }
    Ok(levels
        .sorted
        .iter()
        .filter(|l| l.as_str() != reference)
        .map(|level| Encoded {
            name: format!("{name}[T.{level}]"),
            values: levels.rows.iter().map(|r| if r == level { 1.0 } else { 0.0 }).collect(),
        })
        .collect())
}
