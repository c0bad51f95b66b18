//! Person covariate table and the explicit encoding configuration.

use std::collections::{BTreeMap, HashSet};

use ed_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// One covariate column.
#[derive(Debug, Clone, PartialEq)]
pub enum CovariateColumn {
    /// Continuous values; must be finite.
    Numeric(Vec<f64>),
    /// Level labels.
    Categorical(Vec<String>),
}

impl CovariateColumn {
    fn len(&self) -> usize {
        match self {
            CovariateColumn::Numeric(v) => v.len(),
            CovariateColumn::Categorical(v) => v.len(),
        }
    }
}

/// Person-level covariates keyed by person label.
///
/// Row order is arbitrary; the design builder reorders rows to match the
/// dataset's person index.
#[derive(Debug, Clone, PartialEq)]
pub struct CovariateTable {
    persons: Vec<String>,
    columns: Vec<(String, CovariateColumn)>,
}

impl CovariateTable {
    /// Empty table over `persons`. Person labels must be unique.
    pub fn new<I, S>(persons: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let persons: Vec<String> = persons.into_iter().map(Into::into).collect();
        let mut seen = HashSet::with_capacity(persons.len());
        for p in &persons {
            if !seen.insert(p.as_str()) {
                return Err(Error::Schema(format!(
                    "duplicate person label '{p}' in covariate table"
                )));
            }
        }
        Ok(Self { persons, columns: Vec::new() })
    }

    /// Add a numeric column.
    pub fn with_numeric(self, name: impl Into<String>, values: Vec<f64>) -> Result<Self> {
        self.push(name.into(), CovariateColumn::Numeric(values))
    }

    /// Add a categorical column.
    pub fn with_categorical<S: Into<String>>(
        self,
        name: impl Into<String>,
        values: Vec<S>,
    ) -> Result<Self> {
        let values = values.into_iter().map(Into::into).collect();
        self.push(name.into(), CovariateColumn::Categorical(values))
    }

    fn push(mut self, name: String, column: CovariateColumn) -> Result<Self> {
        if column.len() != self.persons.len() {
            return Err(Error::Schema(format!(
                "covariate '{name}' has {} values, expected {} (one per person)",
                column.len(),
                self.persons.len()
            )));
        }
        if self.column(&name).is_some() {
            return Err(Error::Schema(format!("duplicate covariate column '{name}'")));
        }
        if let CovariateColumn::Numeric(values) = &column {
            if let Some(r) = values.iter().position(|v| !v.is_finite()) {
                return Err(Error::Schema(format!(
                    "covariate '{name}' has a non-finite value for person '{}'",
                    self.persons[r]
                )));
            }
        }
        self.columns.push((name, column));
        Ok(self)
    }

    /// Person labels in table row order.
    pub fn persons(&self) -> &[String] {
        &self.persons
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.persons.len()
    }

    /// Column names in insertion order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }

    /// Column by name.
    pub fn column(&self, name: &str) -> Option<&CovariateColumn> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }
}

/// How a column enters the design matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Encoding {
    /// Values used as-is (numeric columns only).
    Numeric,
    /// Treatment coding: one 0/1 column per non-reference level.
    Indicator {
        /// Dropped level; the first sorted level when `None`.
        reference: Option<String>,
    },
}

/// One design term: a single column or an interaction of several.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CovariateTerm {
    /// Component columns in the order written.
    pub columns: Vec<String>,
}

impl CovariateTerm {
    /// Main effect of `column`.
    pub fn main(column: impl Into<String>) -> Self {
        Self { columns: vec![column.into()] }
    }

    /// Display name (`"age:group"`).
    pub fn name(&self) -> String {
        self.columns.join(":")
    }

    fn same_columns(&self, other: &CovariateTerm) -> bool {
        let mut a: Vec<&String> = self.columns.iter().collect();
        let mut b: Vec<&String> = other.columns.iter().collect();
        a.sort();
        b.sort();
        a == b
    }
}

/// Ordered list of terms plus per-column encoding overrides.
///
/// The intercept is implicit and always present. Columns without an override
/// use [`Encoding::Numeric`] when numeric and [`Encoding::Indicator`] when
/// categorical.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CovariateSpec {
    /// Terms in design column order.
    pub terms: Vec<CovariateTerm>,
    /// Per-column encoding overrides.
    #[serde(default)]
    pub encodings: BTreeMap<String, Encoding>,
}

impl CovariateSpec {
    /// Intercept-only specification.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a term unless an equivalent one (same column set) is present.
    pub fn term(mut self, term: CovariateTerm) -> Self {
        if !term.columns.is_empty() && !self.terms.iter().any(|t| t.same_columns(&term)) {
            self.terms.push(term);
        }
        self
    }

    /// Append a main effect.
    pub fn main(self, column: impl Into<String>) -> Self {
        self.term(CovariateTerm::main(column))
    }

    /// Append an interaction of `columns`.
    pub fn interaction<S: AsRef<str>>(self, columns: &[S]) -> Self {
        let columns = columns.iter().map(|c| c.as_ref().to_string()).collect();
        self.term(CovariateTerm { columns })
    }

    /// Override the encoding of `column`.
    pub fn encoding(mut self, column: impl Into<String>, encoding: Encoding) -> Self {
        self.encodings.insert(column.into(), encoding);
        self
    }

    /// Force indicator coding for `column` with the default reference.
    pub fn categorical(self, column: impl Into<String>) -> Self {
        self.encoding(column, Encoding::Indicator { reference: None })
    }

    /// Force indicator coding for `column` with `level` as reference.
    pub fn reference(self, column: impl Into<String>, level: impl Into<String>) -> Self {
        self.encoding(column, Encoding::Indicator { reference: Some(level.into()) })
    }

    /// Whether the specification has no terms.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Every referenced column, each once, in first-use order.
    pub fn referenced_columns(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for c in self.terms.iter().flat_map(|t| t.columns.iter()) {
            if !out.contains(&c.as_str()) {
                out.push(c);
            }
        }
        out
    }
}
