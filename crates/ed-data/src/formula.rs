//! Narrow formula grammar for person covariates.
//!
//! ```text
//! formula := ["~"] term ("+" term)*
//! term    := "1" | product
//! product := inter ("*" inter)*
//! inter   := atom (":" atom)*
//! atom    := name | "C(" name ")"
//! ```
//!
//! `a*b` expands to `a + b + a:b`. `C(x)` forces indicator coding of `x`.
//! The intercept is always present, so `1` is accepted and ignored while `0`
//! and `-1` are rejected. The parser only produces a [`CovariateSpec`].

use ed_core::{Error, Result};

use crate::covariates::{CovariateSpec, CovariateTerm};

/// Parse a right-hand-side formula into a covariate specification.
pub fn parse_formula(formula: &str) -> Result<CovariateSpec> {
    let rhs = match formula.split_once('~') {
        Some((lhs, rhs)) => {
            if !lhs.trim().is_empty() {
                return Err(schema(formula, "a response variable is not allowed before '~'"));
            }
            rhs
        }
        None => formula,
    };
    if rhs.trim().is_empty() {
        return Err(schema(formula, "no terms"));
    }

    let mut spec = CovariateSpec::new();
    for raw in split_top_level(rhs, '+') {
        let t = raw.as_str();
        if t.is_empty() {
            return Err(schema(formula, "empty term"));
        }
        if t == "1" {
            continue;
        }
        if t == "0" || t == "-1" || t.starts_with('-') {
            return Err(schema(formula, "the intercept cannot be removed"));
        }
        let groups = split_top_level(t, '*')
            .into_iter()
            .map(|g| parse_interaction(&g, formula, &mut spec))
            .collect::<Result<Vec<_>>>()?;
        for columns in expand_product(&groups) {
            spec = spec.term(CovariateTerm { columns });
        }
    }
    Ok(spec)
}

fn schema(formula: &str, reason: &str) -> Error {
    Error::Schema(format!("invalid formula '{}': {reason}", formula.trim()))
}

fn parse_interaction(raw: &str, formula: &str, spec: &mut CovariateSpec) -> Result<Vec<String>> {
    let mut columns = Vec::new();
    for atom in split_top_level(raw, ':') {
        let name = match parse_call(&atom, "C") {
            Some(inner) => {
                let inner = inner.trim();
                check_name(inner, formula)?;
                *spec = std::mem::take(spec).categorical(inner);
                inner.to_string()
            }
            None => {
                check_name(&atom, formula)?;
                atom
            }
        };
        if !columns.contains(&name) {
            columns.push(name);
        }
    }
    Ok(columns)
}

fn check_name(name: &str, formula: &str) -> Result<()> {
    if name.is_empty() {
        return Err(schema(formula, "empty variable name"));
    }
    if let Some(c) = name.chars().find(|c| !(c.is_alphanumeric() || *c == '_' || *c == '.')) {
        return Err(schema(formula, &format!("unexpected '{c}' in '{name}'")));
    }
    if name.chars().all(|c| c.is_ascii_digit()) {
        return Err(schema(formula, &format!("'{name}' is not a variable name")));
    }
    Ok(())
}

/// All non-empty combinations of the groups, smaller combinations first.
fn expand_product(groups: &[Vec<String>]) -> Vec<Vec<String>> {
    let n = groups.len();
    let mut out = Vec::new();
    for size in 1..=n {
        let mut idx: Vec<usize> = (0..size).collect();
        loop {
            let mut columns: Vec<String> = Vec::new();
            for &g in &idx {
                for c in &groups[g] {
                    if !columns.contains(c) {
                        columns.push(c.clone());
                    }
                }
            }
            out.push(columns);

            // Advance to the next combination in lexicographic order.
            let Some(k) = (0..size).rev().find(|&k| idx[k] != k + n - size) else { break };
            idx[k] += 1;
            for j in k + 1..size {
                idx[j] = idx[j - 1] + 1;
            }
        }
    }
    out
}

fn parse_call<'a>(raw: &'a str, name: &str) -> Option<&'a str> {
    raw.strip_prefix(name)?.trim_start().strip_prefix('(')?.strip_suffix(')')
}

fn split_top_level(input: &str, delim: char) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut depth = 0isize;
    for ch in input.chars() {
        match ch {
            '(' => {
                depth += 1;
                cur.push(ch);
            }
            ')' => {
                depth -= 1;
                cur.push(ch);
            }
            c if c == delim && depth == 0 => {
                out.push(cur.trim().to_string());
                cur.clear();
            }
            c => cur.push(c),
        }
    }
    out.push(cur.trim().to_string());
    out
}
