//! Posterior draw storage as returned by a sampling engine.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Draws from one chain: `draws[t][p]` is parameter `p` at post-warmup iteration `t`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Chain {
    /// Post-warmup draws, one vector of parameter values per iteration.
    pub draws: Vec<Vec<f64>>,
}

/// Convergence diagnostics for one flat parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamDiagnostics {
    /// Bulk effective sample size.
    pub ess_bulk: Option<f64>,
    /// Tail effective sample size.
    pub ess_tail: Option<f64>,
    /// Potential scale reduction factor.
    pub r_hat: Option<f64>,
}

/// Result of an engine run: draws for every flat parameter across all chains.
///
/// Parameter names are flat (`"beta[3]"`, `"sigma"`). Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosteriorDraws {
    /// Individual chains.
    pub chains: Vec<Chain>,
    /// Flat parameter names, one per column of each draw.
    pub param_names: Vec<String>,
    /// Number of warmup iterations per chain.
    pub n_warmup: usize,
    /// Number of post-warmup samples per chain.
    pub n_samples: usize,
    /// Engine-reported diagnostics keyed by flat parameter name.
    #[serde(default)]
    pub diagnostics: BTreeMap<String, ParamDiagnostics>,
}

impl PosteriorDraws {
    /// Create draws without engine diagnostics.
    pub fn new(param_names: Vec<String>, chains: Vec<Chain>, n_warmup: usize) -> Self {
        let n_samples = chains.first().map(|c| c.draws.len()).unwrap_or(0);
        Self { chains, param_names, n_warmup, n_samples, diagnostics: BTreeMap::new() }
    }

    /// Attach engine-reported diagnostics.
    pub fn with_diagnostics(mut self, diagnostics: BTreeMap<String, ParamDiagnostics>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Total number of post-warmup draws across all chains.
    pub fn total_draws(&self) -> usize {
        self.chains.iter().map(|c| c.draws.len()).sum()
    }

    /// Column of a flat parameter name, accepting `beta[3]` and `beta.3` spellings.
    pub fn param_index(&self, name: &str) -> Option<usize> {
        if let Some(i) = self.param_names.iter().position(|n| n == name) {
            return Some(i);
        }
        let key = ParamKey::parse(name)?;
        self.param_names.iter().position(|n| ParamKey::parse(n).as_ref() == Some(&key))
    }

    /// Map every parseable flat name to its column.
    pub fn key_index(&self) -> HashMap<ParamKey, usize> {
        self.param_names
            .iter()
            .enumerate()
            .filter_map(|(i, n)| ParamKey::parse(n).map(|k| (k, i)))
            .collect()
    }

    /// Draws for a single parameter (column) split by chain.
    pub fn param_draws(&self, param_idx: usize) -> Vec<Vec<f64>> {
        self.chains.iter().map(|c| c.draws.iter().map(|d| d[param_idx]).collect()).collect()
    }

    /// Draws for a single parameter pooled across chains.
    pub fn pooled_draws(&self, param_idx: usize) -> Vec<f64> {
        self.chains.iter().flat_map(|c| c.draws.iter().map(move |d| d[param_idx])).collect()
    }

    /// Number of flat elements whose base name is `base` (`beta[1]`, `beta[2]`, ... -> 2).
    pub fn count_elements(&self, base: &str) -> usize {
        self.param_names
            .iter()
            .filter_map(|n| ParamKey::parse(n))
            .filter(|k| k.base == base)
            .count()
    }

    /// Engine-reported diagnostics for a flat name.
    pub fn reported_diagnostics(&self, name: &str) -> Option<&ParamDiagnostics> {
        self.diagnostics.get(name).or_else(|| {
            let key = ParamKey::parse(name)?;
            self.diagnostics
                .iter()
                .find(|(n, _)| ParamKey::parse(n).as_ref() == Some(&key))
                .map(|(_, d)| d)
        })
    }

    /// Check that the draw set is complete and numerically valid.
    ///
    /// Returns a description of the first problem found.
    pub fn completeness_problem(&self) -> Option<String> {
        if self.chains.is_empty() {
            return Some("no chains returned".to_string());
        }
        if self.param_names.is_empty() {
            return Some("no parameters returned".to_string());
        }
        let n_params = self.param_names.len();
        for (ci, chain) in self.chains.iter().enumerate() {
            if chain.draws.len() != self.n_samples {
                return Some(format!(
                    "chain {} has {} draws, expected {}",
                    ci + 1,
                    chain.draws.len(),
                    self.n_samples
                ));
            }
            for (t, draw) in chain.draws.iter().enumerate() {
                if draw.len() != n_params {
                    return Some(format!(
                        "chain {} draw {} has {} values, expected {}",
                        ci + 1,
                        t + 1,
                        draw.len(),
                        n_params
                    ));
                }
                if let Some(p) = draw.iter().position(|v| !v.is_finite()) {
                    return Some(format!(
                        "non-finite value for '{}' in chain {} draw {}",
                        self.param_names[p],
                        ci + 1,
                        t + 1
                    ));
                }
            }
        }
        if self.n_samples == 0 {
            return Some("no post-warmup draws returned".to_string());
        }
        None
    }
}

/// Parsed flat parameter name: base plus 1-based indices.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParamKey {
    /// Base name (`"beta"`).
    pub base: String,
    /// 1-based indices (empty for scalars).
    pub index: Vec<usize>,
}

impl ParamKey {
    /// Scalar key.
    pub fn scalar(base: &str) -> Self {
        Self { base: base.to_string(), index: Vec::new() }
    }

    /// Vector element key.
    pub fn element(base: &str, i: usize) -> Self {
        Self { base: base.to_string(), index: vec![i] }
    }

    /// Parse `name`, `name[i,j]` or `name.i.j`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }
        if let Some(open) = s.find('[') {
            let inner = s[open + 1..].strip_suffix(']')?;
            let index = inner
                .split(',')
                .map(|t| t.trim().parse::<usize>().ok())
                .collect::<Option<Vec<_>>>()?;
            return Some(Self { base: s[..open].to_string(), index });
        }
        let mut parts = s.split('.');
        let base = parts.next()?.to_string();
        let index = parts.map(|t| t.parse::<usize>().ok()).collect::<Option<Vec<_>>>()?;
        Some(Self { base, index })
    }

    /// Canonical bracket spelling.
    pub fn to_flat_name(&self) -> String {
        if self.index.is_empty() {
            return self.base.clone();
        }
        let idx: Vec<String> = self.index.iter().map(|i| i.to_string()).collect();
        format!("{}[{}]", self.base, idx.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_chain_draws() -> PosteriorDraws {
        let names = vec!["beta.1".to_string(), "beta.2".to_string(), "sigma".to_string()];
        let c1 = Chain { draws: vec![vec![0.1, -0.1, 1.0], vec![0.2, -0.2, 1.1]] };
        let c2 = Chain { draws: vec![vec![0.3, -0.3, 0.9], vec![0.4, -0.4, 1.2]] };
        PosteriorDraws::new(names, vec![c1, c2], 100)
    }

    #[test]
    fn test_param_key_spellings() {
        assert_eq!(ParamKey::parse("beta[3]"), Some(ParamKey::element("beta", 3)));
        assert_eq!(ParamKey::parse("beta.3"), Some(ParamKey::element("beta", 3)));
        assert_eq!(ParamKey::parse("sigma"), Some(ParamKey::scalar("sigma")));
        assert_eq!(ParamKey::parse("W[2, 1]").unwrap().index, vec![2, 1]);
        assert_eq!(ParamKey::parse("beta[x]"), None);
        assert_eq!(ParamKey::element("kappa", 2).to_flat_name(), "kappa[2]");
    }

    #[test]
    fn test_param_index_accepts_both_spellings() {
        let d = two_chain_draws();
        assert_eq!(d.param_index("beta[2]"), Some(1));
        assert_eq!(d.param_index("beta.2"), Some(1));
        assert_eq!(d.param_index("sigma"), Some(2));
        assert_eq!(d.param_index("alpha[1]"), None);
        assert_eq!(d.count_elements("beta"), 2);
    }

    #[test]
    fn test_param_draws_by_chain() {
        let d = two_chain_draws();
        assert_eq!(d.total_draws(), 4);
        assert_eq!(d.n_samples, 2);
        assert_eq!(d.param_draws(2), vec![vec![1.0, 1.1], vec![0.9, 1.2]]);
        assert_eq!(d.pooled_draws(0), vec![0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn test_completeness() {
        let d = two_chain_draws();
        assert!(d.completeness_problem().is_none());

        let mut ragged = d.clone();
        ragged.chains[1].draws.pop();
        assert!(ragged.completeness_problem().unwrap().contains("chain 2"));

        let mut nan = d.clone();
        nan.chains[0].draws[1][2] = f64::NAN;
        assert!(nan.completeness_problem().unwrap().contains("sigma"));

        let empty = PosteriorDraws::new(vec!["sigma".into()], vec![], 0);
        assert!(empty.completeness_problem().is_some());
    }

    #[test]
    fn test_reported_diagnostics_lookup() {
        let mut diag = BTreeMap::new();
        diag.insert(
            "beta.1".to_string(),
            ParamDiagnostics { ess_bulk: Some(410.0), ess_tail: None, r_hat: Some(1.01) },
        );
        let d = two_chain_draws().with_diagnostics(diag);
        assert_eq!(d.reported_diagnostics("beta[1]").unwrap().r_hat, Some(1.01));
        assert!(d.reported_diagnostics("beta[2]").is_none());
    }
}
