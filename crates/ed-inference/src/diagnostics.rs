//! MCMC diagnostics computed from draws: split R-hat, bulk ESS, tail ESS.
//!
//! Used when the engine did not report diagnostics for a parameter:
//! - rank-normalized, folded split R-hat (Vehtari et al. 2021),
//! - bulk ESS on rank-normalized draws (Geyer initial monotone sequence on
//!   variogram autocorrelations),
//! - tail ESS on 5% / 95% quantile indicator chains.
//!
//! Every estimator returns `None` when the chains are too short to split.

use std::fmt;

use ed_core::ParamDiagnostics;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

use crate::interval::{quantile_sorted, sorted};
use crate::summary::ParamSummary;

/// Shortest half-chain the ESS estimator accepts.
const MIN_HALF_LEN: usize = 4;

/// Split R-hat on raw draws.
///
/// Each chain is split in half, giving `2M` half-chains truncated to a common
/// length `n`. `R-hat = sqrt(var+ / W)` with `var+ = (n-1)/n * W + B/n`.
pub fn split_r_hat(chains: &[&[f64]]) -> Option<f64> {
    let halves = split_halves(chains, 2)?;
    let (w, var_plus) = variance_components(&halves);
    if w < 1e-30 {
        return None;
    }
    Some((var_plus / w).sqrt())
}

/// Rank-normalized folded split R-hat: the larger of R-hat on rank-normalized
/// draws and on rank-normalized distances from the median.
pub fn r_hat(chains: &[Vec<f64>]) -> Option<f64> {
    let bulk = split_r_hat(&as_slices(&rank_normalize(chains)));
    let med = quantile_sorted(&sorted(&chains.concat()), 0.5);
    let folded: Vec<Vec<f64>> =
        chains.iter().map(|c| c.iter().map(|x| (x - med).abs()).collect()).collect();
    let tail = split_r_hat(&as_slices(&rank_normalize(&folded)));
    match (bulk, tail) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

/// Bulk ESS on rank-normalized draws.
pub fn ess_bulk(chains: &[Vec<f64>]) -> Option<f64> {
    ess(&as_slices(&rank_normalize(chains)))
}

/// Tail ESS: `min(ESS(I[x <= q05]), ESS(I[x >= q95]))`.
pub fn ess_tail(chains: &[Vec<f64>]) -> Option<f64> {
    let all = sorted(&chains.concat());
    let q05 = quantile_sorted(&all, 0.05);
    let q95 = quantile_sorted(&all, 0.95);
    let indicator = |keep: &dyn Fn(f64) -> bool| -> Vec<Vec<f64>> {
        chains
            .iter()
            .map(|c| c.iter().map(|&x| if keep(x) { 1.0 } else { 0.0 }).collect())
            .collect()
    };
    let lower = ess(&as_slices(&indicator(&|x| x <= q05)))?;
    let upper = ess(&as_slices(&indicator(&|x| x >= q95)))?;
    Some(lower.min(upper))
}

/// Effective sample size of raw draws.
///
/// Autocorrelations come from the variogram, `rho_t = 1 - V_t / (2 var+)`,
/// summed in pairs until a pair goes negative, with the pair sums forced to be
/// non-increasing.
pub fn ess(chains: &[&[f64]]) -> Option<f64> {
    let halves = split_halves(chains, MIN_HALF_LEN)?;
    let m = halves.len();
    let n = halves[0].len();
    let total = (m * n) as f64;

    let (_, var_plus) = variance_components(&halves);
    if !var_plus.is_finite() || var_plus < 1e-30 {
        return Some(total);
    }

    let variogram = |lag: usize| -> f64 {
        let sq: f64 = halves
            .iter()
            .map(|c| c.windows(lag + 1).map(|w| (w[0] - w[lag]).powi(2)).sum::<f64>())
            .sum();
        sq / (m * (n - lag)) as f64
    };
    let rho = |lag: usize| (1.0 - variogram(lag) / (2.0 * var_plus)).clamp(-1.0, 1.0);

    let mut tau = 1.0;
    let mut prev_pair = f64::INFINITY;
    let mut lag = 1;
    while lag + 1 < n {
        let pair = rho(lag) + rho(lag + 1);
        if pair < 0.0 {
            break;
        }
        let pair = pair.min(prev_pair);
        tau += 2.0 * pair;
        prev_pair = pair;
        lag += 2;
    }
    if !tau.is_finite() || tau <= 0.0 {
        return Some(total);
    }
    Some((total / tau).clamp(1.0, total))
}

/// R-hat, bulk ESS and tail ESS for one parameter's per-chain draws.
pub fn compute_param_diagnostics(chains: &[Vec<f64>]) -> ParamDiagnostics {
    ParamDiagnostics {
        ess_bulk: ess_bulk(chains),
        ess_tail: ess_tail(chains),
        r_hat: r_hat(chains),
    }
}

fn as_slices(chains: &[Vec<f64>]) -> Vec<&[f64]> {
    chains.iter().map(Vec::as_slice).collect()
}

/// Split every chain in half and truncate the halves to a common length.
fn split_halves<'a>(chains: &[&'a [f64]], min_half: usize) -> Option<Vec<&'a [f64]>> {
    if chains.is_empty() || chains.iter().any(|c| c.len() < 2 * min_half) {
        return None;
    }
    let len = chains.iter().map(|c| c.len() / 2).min()?;
    Some(
        chains
            .iter()
            .flat_map(|&c| {
                let mid = c.len() / 2;
                [&c[..len], &c[mid..mid + len]]
            })
            .collect(),
    )
}

/// Within-chain variance `W` and the pooled estimate `var+`.
fn variance_components(chains: &[&[f64]]) -> (f64, f64) {
    let m = chains.len() as f64;
    let n = chains[0].len() as f64;
    let (means, vars): (Vec<f64>, Vec<f64>) = chains
        .iter()
        .map(|c| {
            let mean = c.iter().sum::<f64>() / n;
            let var = c.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
            (mean, var)
        })
        .unzip();
    let grand = means.iter().sum::<f64>() / m;
    let b = if m > 1.0 {
        means.iter().map(|mu| (mu - grand).powi(2)).sum::<f64>() * n / (m - 1.0)
    } else {
        0.0
    };
    let w = vars.iter().sum::<f64>() / m;
    (w, (n - 1.0) / n * w + b / n)
}

#[inline]
fn standard_normal() -> Normal {
    // Mean 0 and unit sd are always valid parameters.
    Normal::new(0.0, 1.0).expect("standard normal should be constructible")
}

/// Replace draws by normal scores of their pooled ranks (ties share the average rank).
fn rank_normalize(chains: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let normal = standard_normal();
    let mut flat: Vec<(f64, usize, usize)> = chains
        .iter()
        .enumerate()
        .flat_map(|(ci, c)| c.iter().enumerate().map(move |(t, &x)| (x, ci, t)))
        .collect();
    flat.sort_by(|a, b| a.0.total_cmp(&b.0));

    let total = flat.len() as f64;
    let mut out: Vec<Vec<f64>> = chains.iter().map(|c| vec![0.0; c.len()]).collect();
    let mut start = 0;
    while start < flat.len() {
        let end = start + flat[start..].iter().take_while(|e| e.0 == flat[start].0).count();
        let rank = 0.5 * ((start + 1) as f64 + end as f64);
        let z = normal.inverse_cdf(((rank - 0.5) / total).clamp(1e-12, 1.0 - 1e-12));
        for &(_, ci, t) in &flat[start..end] {
            out[ci][t] = z;
        }
        start = end;
    }
    out
}

/// Overall outcome of the quality gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityStatus {
    /// Every gate passed.
    Ok,
    /// Some gates emitted warnings.
    Warn,
    /// One or more gates failed.
    Fail,
}

impl fmt::Display for QualityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityStatus::Ok => write!(f, "ok"),
            QualityStatus::Warn => write!(f, "warn"),
            QualityStatus::Fail => write!(f, "fail"),
        }
    }
}

/// Thresholds for convergence gates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityGates {
    /// Gates are only enabled with at least this many chains.
    pub min_chains: usize,
    /// Gates are only enabled with at least this many post-warmup draws per chain.
    pub min_draws_per_chain: usize,
    /// Warn if any R-hat exceeds this.
    pub max_rhat_warn: f64,
    /// Fail if any R-hat exceeds this.
    pub max_rhat_fail: f64,
    /// Warn if any ESS falls below this fraction of total draws.
    pub min_ess_frac_warn: f64,
    /// Fail if any ESS falls below this fraction of total draws.
    pub min_ess_frac_fail: f64,
}

impl Default for QualityGates {
    fn default() -> Self {
        Self {
            min_chains: 2,
            min_draws_per_chain: 50,
            max_rhat_warn: 1.05,
            max_rhat_fail: 1.20,
            min_ess_frac_warn: 0.05,
            min_ess_frac_fail: 0.01,
        }
    }
}

/// Result of applying [`QualityGates`] to a set of parameter summaries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualitySummary {
    /// Aggregated status.
    pub status: QualityStatus,
    /// Non-fatal issues, each `"<gate>: <parameter> (<value>)"`.
    pub warnings: Vec<String>,
    /// Hard failures in the same format.
    pub failures: Vec<String>,
    /// Whether R-hat/ESS gates were enabled (enough chains and draws).
    pub enabled: bool,
    /// Total post-warmup draws.
    pub total_draws: usize,
    /// Largest R-hat across parameters.
    pub max_r_hat: Option<f64>,
    /// Smallest bulk ESS across parameters.
    pub min_ess_bulk: Option<f64>,
    /// Smallest tail ESS across parameters.
    pub min_ess_tail: Option<f64>,
}

/// Apply `gates` to `params` from a run of `n_chains` × `n_samples` draws.
pub fn quality_summary<'a, I>(
    params: I,
    n_chains: usize,
    n_samples: usize,
    gates: &QualityGates,
) -> QualitySummary
where
    I: IntoIterator<Item = &'a ParamSummary>,
{
    let total_draws = n_chains.saturating_mul(n_samples);
    let enabled = n_chains >= gates.min_chains && n_samples >= gates.min_draws_per_chain;

    let mut warnings = Vec::new();
    let mut failures = Vec::new();
    let mut max_r_hat: Option<f64> = None;
    let mut min_ess_bulk: Option<f64> = None;
    let mut min_ess_tail: Option<f64> = None;
    let mut n_without = 0usize;

    let warn_ess = gates.min_ess_frac_warn * total_draws as f64;
    let fail_ess = gates.min_ess_frac_fail * total_draws as f64;

    for p in params {
        if p.r_hat.is_none() && p.ess_bulk.is_none() && p.ess_tail.is_none() {
            n_without += 1;
        }
        if let Some(r) = p.r_hat {
            max_r_hat = Some(max_r_hat.map_or(r, |m| m.max(r)));
            if enabled && r > gates.max_rhat_fail {
                failures.push(format!("r_hat_high: {} ({r:.3})", p.name));
            } else if enabled && r > gates.max_rhat_warn {
                warnings.push(format!("r_hat_high: {} ({r:.3})", p.name));
            }
        }
        for (gate, value, min) in [
            ("ess_bulk_low", p.ess_bulk, &mut min_ess_bulk),
            ("ess_tail_low", p.ess_tail, &mut min_ess_tail),
        ] {
            let Some(v) = value else { continue };
            *min = Some(min.map_or(v, |m| m.min(v)));
            if enabled && v < fail_ess {
                failures.push(format!("{gate}: {} ({v:.0})", p.name));
            } else if enabled && v < warn_ess {
                warnings.push(format!("{gate}: {} ({v:.0})", p.name));
            }
        }
    }

    if !enabled {
        warnings.push("gates_disabled_short_run".to_string());
    }
    if n_without > 0 {
        warnings.push(format!("diagnostics_missing: {n_without} parameter(s)"));
    }

    let status = if !failures.is_empty() {
        QualityStatus::Fail
    } else if !warnings.is_empty() {
        QualityStatus::Warn
    } else {
        QualityStatus::Ok
    };

    QualitySummary {
        status,
        warnings,
        failures,
        enabled,
        total_draws,
        max_r_hat,
        min_ess_bulk,
        min_ess_tail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand_distr::{Distribution, Normal as NormalDist};

    fn iid(seed: u64, n: usize) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let normal = NormalDist::new(0.0, 1.0).unwrap();
        (0..n).map(|_| normal.sample(&mut rng)).collect()
    }

    fn random_walk(seed: u64, n: usize) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let normal = NormalDist::new(0.0, 0.01).unwrap();
        let mut x = 0.0;
        (0..n)
            .map(|_| {
                x += normal.sample(&mut rng);
                x
            })
            .collect()
    }

    fn summary(name: &str, r_hat: Option<f64>, ess: Option<f64>) -> ParamSummary {
        ParamSummary {
            name: name.to_string(),
            mean: 0.0,
            sd: 1.0,
            lower: -2.0,
            upper: 2.0,
            ess_bulk: ess,
            ess_tail: ess,
            r_hat,
        }
    }

    #[test]
    fn test_split_r_hat_well_mixed() {
        let (a, b) = (iid(1, 500), iid(2, 500));
        let r = split_r_hat(&[&a, &b]).unwrap();
        assert!(r < 1.05, "split R-hat for iid chains should be ~1: {r}");
    }

    #[test]
    fn test_split_r_hat_diverged() {
        let a: Vec<f64> = (0..100).map(|i| i as f64 * 0.01).collect();
        let b: Vec<f64> = (0..100).map(|i| 100.0 + i as f64 * 0.01).collect();
        assert!(split_r_hat(&[&a, &b]).unwrap() > 1.5);
    }

    #[test]
    fn test_rank_r_hat() {
        let r = r_hat(&[iid(3, 500), iid(4, 500)]).unwrap();
        assert!(r < 1.05, "rank-normalized R-hat for iid chains should be ~1: {r}");

        let a: Vec<f64> = (0..200).map(|i| i as f64 * 0.01).collect();
        let b: Vec<f64> = (0..200).map(|i| 10.0 + i as f64 * 0.01).collect();
        assert!(r_hat(&[a, b]).unwrap() > 1.5);
    }

    #[test]
    fn test_too_short_is_none() {
        let d = compute_param_diagnostics(&[vec![0.1, 0.2, 0.3], vec![0.0, 0.5, 0.4]]);
        assert_eq!(d, ParamDiagnostics { ess_bulk: None, ess_tail: None, r_hat: None });
    }

    #[test]
    fn test_constant_chain_ess_is_total() {
        let chain = vec![1.0; 100];
        assert_eq!(ess(&[&chain]), Some(100.0));
    }

    #[test]
    fn test_ess_iid_vs_random_walk() {
        let chain = iid(42, 1000);
        assert!(ess(&[&chain]).unwrap() > 500.0);
        let walk = random_walk(42, 1000);
        assert!(ess(&[&walk]).unwrap() < 500.0);
    }

    #[test]
    fn test_ess_tail() {
        assert!(ess_tail(&[iid(7, 1000)]).unwrap() > 500.0);
        assert!(ess_tail(&[random_walk(11, 1000)]).unwrap() < 500.0);
    }

    #[test]
    fn test_quality_summary_gates() {
        let params = vec![
            summary("beta[1]", Some(1.01), Some(3000.0)),
            summary("beta[2]", Some(1.10), Some(150.0)),
            summary("sigma", Some(1.01), Some(10.0)),
        ];
        let q = quality_summary(&params, 4, 1000, &QualityGates::default());
        assert_eq!(q.status, QualityStatus::Fail);
        assert_eq!(q.max_r_hat, Some(1.10));
        assert_eq!(q.min_ess_bulk, Some(10.0));
        assert!(q.warnings.iter().any(|w| w.starts_with("r_hat_high: beta[2]")));
        assert!(q.warnings.iter().any(|w| w.starts_with("ess_bulk_low: beta[2]")));
        assert!(q.failures.iter().any(|w| w.starts_with("ess_tail_low: sigma")));
    }

    #[test]
    fn test_quality_summary_short_run_disabled() {
        let params = vec![summary("beta[1]", Some(2.0), None), summary("beta[2]", None, None)];
        let q = quality_summary(&params, 1, 10, &QualityGates::default());
        assert!(!q.enabled);
        assert_eq!(q.status, QualityStatus::Warn);
        assert!(q.failures.is_empty());
        assert!(q.warnings.contains(&"diagnostics_missing: 1 parameter(s)".to_string()));
    }
}
